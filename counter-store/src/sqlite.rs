use {
    std::sync::{Arc, Mutex, MutexGuard},
    futures::future::{BoxFuture, FutureExt},
    rusqlite::{Connection, ErrorCode, OptionalExtension},
    serde_json::{Map, Value},
    thiserror::Error,
    crate::{
        entity::{Entity, EntityKey, EntityLookup, UpdateMode},
        error::TableStoreError,
        store::TableStore,
    },
};

/// Table store kept in a local sqlite database. Several logical tables can share one
/// database file; rows are told apart by table name.
#[derive(Clone)]
pub struct SqliteTableStore {
    connection: Arc<Mutex<Connection>>,
    table_name: String,
}

#[derive(Error, Debug)]
pub enum SqliteTableStoreConnectionError {
    #[error("failed to open connection: {0:?}")]
    ConnectionOpenError(rusqlite::Error),

    #[error("failed to init database: {0:?}")]
    DatabaseInitError(rusqlite::Error),
}

impl SqliteTableStore {
    pub fn new(path: impl AsRef<std::path::Path>, table_name: impl Into<String>) -> Result<Self, SqliteTableStoreConnectionError> {
        Self::from_connection(
            Connection::open(path)
                .map_err(SqliteTableStoreConnectionError::ConnectionOpenError)?,
            table_name,
        )
    }

    pub fn in_memory(table_name: impl Into<String>) -> Result<Self, SqliteTableStoreConnectionError> {
        Self::from_connection(
            Connection::open_in_memory()
                .map_err(SqliteTableStoreConnectionError::ConnectionOpenError)?,
            table_name,
        )
    }

    fn from_connection(connection: Connection, table_name: impl Into<String>) -> Result<Self, SqliteTableStoreConnectionError> {
        connection.execute(
            "create table if not exists entities (
                table_name text not null,
                partition_key text not null,
                row_key text not null,
                properties text not null,
                primary key (table_name, partition_key, row_key)
            )",
            (),
        ).map_err(SqliteTableStoreConnectionError::DatabaseInitError)?;

        Ok(Self {
            connection: Arc::new(Mutex::new(connection)),
            table_name: table_name.into(),
        })
    }

    /// Another logical table in the same database.
    pub fn table(&self, table_name: impl Into<String>) -> Self {
        Self {
            connection: self.connection.clone(),
            table_name: table_name.into(),
        }
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>, TableStoreError> {
        self.connection.lock()
            .map_err(|err| TableStoreError::InternalError { description: format!("failed to acquire sqlite connection: {err:?}") })
    }

    fn get_sync(&self, key: &EntityKey) -> Result<EntityLookup, TableStoreError> {
        let connection = self.lock()?;
        let properties = read_properties(&connection, &self.table_name, key)?;
        Ok(match properties {
            Some(properties) => EntityLookup::Found(Entity::with_properties(key.clone(), properties)),
            None => EntityLookup::NotFound,
        })
    }

    fn create_sync(&self, entity: &Entity) -> Result<(), TableStoreError> {
        let properties = encode_properties(&entity.properties)?;
        let connection = self.lock()?;
        connection.execute(
            "insert into entities (table_name, partition_key, row_key, properties) values (?1, ?2, ?3, ?4)",
            (&self.table_name, &entity.key.partition_key, &entity.key.row_key, &properties),
        )
            .map_err(|err| match err.sqlite_error_code() {
                Some(ErrorCode::ConstraintViolation) => TableStoreError::EntityAlreadyExists,
                _ => TableStoreError::InternalError { description: format!("failed to insert entity: {err:?}") },
            })
            .map(|_| ())
    }

    fn update_sync(&self, entity: &Entity, mode: UpdateMode) -> Result<(), TableStoreError> {
        let mut connection = self.lock()?;
        let transaction = connection.transaction()
            .map_err(|err| TableStoreError::InternalError { description: format!("failed to start sqlite transaction: {err:?}") })?;

        let properties = match mode {
            UpdateMode::Replace => entity.properties.clone(),
            UpdateMode::Merge => {
                let mut stored = read_properties(&transaction, &self.table_name, &entity.key)?
                    .ok_or(TableStoreError::EntityNotFound)?;
                stored.extend(entity.properties.clone());
                stored
            },
        };

        let updated = transaction.execute(
            "update entities set properties = ?4 where table_name = ?1 and partition_key = ?2 and row_key = ?3",
            (&self.table_name, &entity.key.partition_key, &entity.key.row_key, &encode_properties(&properties)?),
        ).map_err(|err| TableStoreError::InternalError { description: format!("failed to update entity: {err:?}") })?;

        if updated == 0 {
            return Err(TableStoreError::EntityNotFound);
        }

        transaction.commit()
            .map_err(|err| TableStoreError::InternalError { description: format!("failed to commit sqlite transaction: {err:?}") })
    }
}

impl TableStore for SqliteTableStore {
    fn get_entity<'a>(&'a self, key: &'a EntityKey) -> BoxFuture<'a, Result<EntityLookup, TableStoreError>> {
        async move { self.get_sync(key) }.boxed()
    }

    fn create_entity<'a>(&'a self, entity: &'a Entity) -> BoxFuture<'a, Result<(), TableStoreError>> {
        async move { self.create_sync(entity) }.boxed()
    }

    fn update_entity<'a>(&'a self, entity: &'a Entity, mode: UpdateMode) -> BoxFuture<'a, Result<(), TableStoreError>> {
        async move { self.update_sync(entity, mode) }.boxed()
    }
}

fn read_properties(connection: &Connection, table_name: &str, key: &EntityKey) -> Result<Option<Map<String, Value>>, TableStoreError> {
    let properties: Option<String> = connection.query_row(
        "select properties from entities where table_name = ?1 and partition_key = ?2 and row_key = ?3",
        (table_name, &key.partition_key, &key.row_key),
        |row| row.get(0),
    )
        .optional()
        .map_err(|err| TableStoreError::InternalError { description: format!("failed to read entity: {err:?}") })?;

    properties
        .map(|v| serde_json::from_str(&v)
            .map_err(|err| TableStoreError::Serialization { reason: format!("failed to decode stored properties: {err:?}") }))
        .transpose()
}

fn encode_properties(properties: &Map<String, Value>) -> Result<String, TableStoreError> {
    serde_json::to_string(properties)
        .map_err(|err| TableStoreError::Serialization { reason: format!("failed to encode properties: {err:?}") })
}
