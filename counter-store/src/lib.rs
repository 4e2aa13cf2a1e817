pub use crate::{
    azure::AzureTableStore,
    connection::{AccountKey, AzureTablesAccount, ConnectionString, SqlitePath, connect},
    entity::{Entity, EntityKey, EntityLookup, UpdateMode},
    error::{ConnectError, ConnectionStringError, TableStoreError},
    sqlite::{SqliteTableStore, SqliteTableStoreConnectionError},
    store::{BoxedTableStore, EmptyTableStore, TableStore, UnavailableTableStore},
};

pub mod azure;
pub mod connection;
pub mod entity;
pub mod error;
pub mod sqlite;
pub mod store;
