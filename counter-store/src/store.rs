use {
    std::sync::Arc,
    futures::future::{BoxFuture, FutureExt},
    crate::{
        entity::{Entity, EntityKey, EntityLookup, UpdateMode},
        error::TableStoreError,
    },
};

/// Row interface of a durable table. Every call is a single attempt: implementations
/// do not retry and writes are unconditional (no version check).
pub trait TableStore: Send + Sync {
    fn get_entity<'a>(&'a self, key: &'a EntityKey) -> BoxFuture<'a, Result<EntityLookup, TableStoreError>>;

    /// Fails with `EntityAlreadyExists` if a row with the same key is present.
    fn create_entity<'a>(&'a self, entity: &'a Entity) -> BoxFuture<'a, Result<(), TableStoreError>>;

    /// Fails with `EntityNotFound` if there is no row with this key.
    fn update_entity<'a>(&'a self, entity: &'a Entity, mode: UpdateMode) -> BoxFuture<'a, Result<(), TableStoreError>>;
}

impl<T: TableStore + ?Sized> TableStore for Arc<T> {
    fn get_entity<'a>(&'a self, key: &'a EntityKey) -> BoxFuture<'a, Result<EntityLookup, TableStoreError>> {
        (**self).get_entity(key)
    }

    fn create_entity<'a>(&'a self, entity: &'a Entity) -> BoxFuture<'a, Result<(), TableStoreError>> {
        (**self).create_entity(entity)
    }

    fn update_entity<'a>(&'a self, entity: &'a Entity, mode: UpdateMode) -> BoxFuture<'a, Result<(), TableStoreError>> {
        (**self).update_entity(entity, mode)
    }
}

#[derive(Clone)]
pub struct BoxedTableStore {
    inner: Arc<dyn TableStore>,
}

impl BoxedTableStore {
    pub fn new<T: TableStore + 'static>(inner: T) -> Self {
        Self {
            inner: Arc::new(inner),
        }
    }
}

impl TableStore for BoxedTableStore {
    fn get_entity<'a>(&'a self, key: &'a EntityKey) -> BoxFuture<'a, Result<EntityLookup, TableStoreError>> {
        self.inner.get_entity(key)
    }

    fn create_entity<'a>(&'a self, entity: &'a Entity) -> BoxFuture<'a, Result<(), TableStoreError>> {
        self.inner.create_entity(entity)
    }

    fn update_entity<'a>(&'a self, entity: &'a Entity, mode: UpdateMode) -> BoxFuture<'a, Result<(), TableStoreError>> {
        self.inner.update_entity(entity, mode)
    }
}

/// Stands in when no connection string is configured. Every operation fails.
pub struct EmptyTableStore;

impl EmptyTableStore {
    fn not_configured<T: Send + 'static>() -> BoxFuture<'static, Result<T, TableStoreError>> {
        async {
            Err(TableStoreError::InternalError { description: "table store is not configured".to_owned() })
        }.boxed()
    }
}

impl TableStore for EmptyTableStore {
    fn get_entity<'a>(&'a self, _key: &'a EntityKey) -> BoxFuture<'a, Result<EntityLookup, TableStoreError>> {
        Self::not_configured()
    }

    fn create_entity<'a>(&'a self, _entity: &'a Entity) -> BoxFuture<'a, Result<(), TableStoreError>> {
        Self::not_configured()
    }

    fn update_entity<'a>(&'a self, _entity: &'a Entity, _mode: UpdateMode) -> BoxFuture<'a, Result<(), TableStoreError>> {
        Self::not_configured()
    }
}

/// Stands in when the configured connection string could not be turned into a store.
/// Every operation fails with the reason the connection failed.
pub struct UnavailableTableStore {
    reason: String,
}

impl UnavailableTableStore {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }

    fn unavailable<T: Send + 'static>(&self) -> BoxFuture<'static, Result<T, TableStoreError>> {
        let description = format!("table store is unavailable: {}", self.reason);
        async move { Err(TableStoreError::InternalError { description }) }.boxed()
    }
}

impl TableStore for UnavailableTableStore {
    fn get_entity<'a>(&'a self, _key: &'a EntityKey) -> BoxFuture<'a, Result<EntityLookup, TableStoreError>> {
        self.unavailable()
    }

    fn create_entity<'a>(&'a self, _entity: &'a Entity) -> BoxFuture<'a, Result<(), TableStoreError>> {
        self.unavailable()
    }

    fn update_entity<'a>(&'a self, _entity: &'a Entity, _mode: UpdateMode) -> BoxFuture<'a, Result<(), TableStoreError>> {
        self.unavailable()
    }
}
