use {
    std::{collections::HashMap, fmt, path::PathBuf},
    base64::prelude::*,
    tracing::info,
    crate::{
        azure::AzureTableStore,
        error::{ConnectError, ConnectionStringError},
        sqlite::SqliteTableStore,
        store::BoxedTableStore,
    },
};

const DEVELOPMENT_ACCOUNT_NAME: &str = "devstoreaccount1";
// well-known key of the local storage emulator, not a secret
const DEVELOPMENT_ACCOUNT_KEY: &str = "Eby8vdM02xNOcqFlqUwJPLlmEtlCDXJ1OUzFT50uSRZ6IFsuFq2UVErCz4I6tq/K1SZFPTOtr/KBHBeksoGMGw==";
const DEVELOPMENT_TABLE_ENDPOINT: &str = "http://127.0.0.1:10002/devstoreaccount1";
const DEFAULT_ENDPOINT_SUFFIX: &str = "core.windows.net";

/// Where the rows live, as described by the configured connection string.
#[derive(Debug, Clone, Eq, PartialEq)]
pub enum ConnectionString {
    /// `sqlite::memory:` or `sqlite:<path>`
    Sqlite(SqlitePath),
    /// `AccountName=...;AccountKey=...` as issued for storage accounts and Cosmos DB Table API.
    AzureTables(AzureTablesAccount),
}

#[derive(Debug, Clone, Eq, PartialEq)]
pub enum SqlitePath {
    InMemory,
    File(PathBuf),
}

#[derive(Debug, Clone, Eq, PartialEq)]
pub struct AzureTablesAccount {
    pub account_name: String,
    pub account_key: AccountKey,
    /// Base url of the table service, without trailing slash.
    pub table_endpoint: String,
}

/// Decoded shared key. Never printed.
#[derive(Clone, Eq, PartialEq)]
pub struct AccountKey(Vec<u8>);

impl AccountKey {
    pub fn from_base64(encoded: &str) -> Result<Self, ConnectionStringError> {
        BASE64_STANDARD.decode(encoded.trim())
            .map(Self)
            .map_err(|_| ConnectionStringError::InvalidAccountKey)
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

impl fmt::Debug for AccountKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("AccountKey(<redacted>)")
    }
}

impl ConnectionString {
    pub fn parse(value: &str) -> Result<Self, ConnectionStringError> {
        let value = value.trim();
        if value.is_empty() {
            return Err(ConnectionStringError::Empty);
        }

        if let Some(path) = value.strip_prefix("sqlite:") {
            return Ok(Self::Sqlite(match path {
                ":memory:" => SqlitePath::InMemory,
                "" | "//" => return Err(ConnectionStringError::MissingField { field: "path" }),
                path => SqlitePath::File(PathBuf::from(path.strip_prefix("//").unwrap_or(path))),
            }));
        }

        AzureTablesAccount::parse(value).map(Self::AzureTables)
    }
}

impl AzureTablesAccount {
    fn parse(value: &str) -> Result<Self, ConnectionStringError> {
        let mut fields = HashMap::new();
        for (position, segment) in value.split(';').enumerate() {
            let segment = segment.trim();
            if segment.is_empty() {
                continue;
            }

            let (name, field_value) = segment.split_once('=')
                .ok_or(ConnectionStringError::MalformedSegment { position })?;
            fields.insert(name.trim().to_ascii_lowercase(), field_value.trim().to_owned());
        }

        if fields.get("usedevelopmentstorage").is_some_and(|v| v.eq_ignore_ascii_case("true")) {
            return Ok(Self {
                account_name: DEVELOPMENT_ACCOUNT_NAME.to_owned(),
                account_key: AccountKey::from_base64(DEVELOPMENT_ACCOUNT_KEY)?,
                table_endpoint: DEVELOPMENT_TABLE_ENDPOINT.to_owned(),
            });
        }

        let account_name = fields.remove("accountname")
            .filter(|v| !v.is_empty())
            .ok_or(ConnectionStringError::MissingField { field: "AccountName" })?;
        let account_key = fields.remove("accountkey")
            .filter(|v| !v.is_empty())
            .ok_or(ConnectionStringError::MissingField { field: "AccountKey" })
            .and_then(|v| AccountKey::from_base64(&v))?;

        let table_endpoint = match fields.remove("tableendpoint").filter(|v| !v.is_empty()) {
            Some(endpoint) => endpoint.trim_end_matches('/').to_owned(),
            None => {
                let protocol = fields.remove("defaultendpointsprotocol").unwrap_or_else(|| "https".to_owned());
                if protocol != "https" && protocol != "http" {
                    return Err(ConnectionStringError::UnsupportedProtocol { protocol });
                }
                let suffix = fields.remove("endpointsuffix").unwrap_or_else(|| DEFAULT_ENDPOINT_SUFFIX.to_owned());
                format!("{protocol}://{account_name}.table.{suffix}")
            },
        };

        Ok(Self {
            account_name,
            account_key,
            table_endpoint,
        })
    }
}

/// Opens the table store described by `connection_string`.
pub fn connect(connection_string: &str, table_name: &str) -> Result<BoxedTableStore, ConnectError> {
    Ok(match ConnectionString::parse(connection_string)? {
        ConnectionString::Sqlite(SqlitePath::InMemory) => {
            info!("using in-memory sqlite table store for table {table_name}");
            BoxedTableStore::new(SqliteTableStore::in_memory(table_name)?)
        },
        ConnectionString::Sqlite(SqlitePath::File(path)) => {
            info!("using sqlite table store at {path:?} for table {table_name}");
            BoxedTableStore::new(SqliteTableStore::new(path, table_name)?)
        },
        ConnectionString::AzureTables(account) => {
            info!("using table service at {} for table {table_name}", account.table_endpoint);
            BoxedTableStore::new(AzureTableStore::new(account, table_name)?)
        },
    })
}
