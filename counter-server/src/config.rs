use {
    std::{fmt, net::SocketAddr, path::PathBuf},
    tokio::{fs, io},
    serde::Deserialize,
    thiserror::Error,
    counter_store::EntityKey,
};

pub const CONNECTION_STRING_ENV: &str = "COSMOS_CONNECTION_STRING";
pub const DEFAULT_ROUTE: &str = "/api/GetVisitorCount";
pub const DEFAULT_TABLE_NAME: &str = "VisitorStats";
pub const COUNTER_PARTITION_KEY: &str = "site-stats";
pub const COUNTER_ROW_KEY: &str = "visitor-counter";

/// Server settings, optionally read from a yaml file. Every field has a default.
#[derive(Deserialize, Debug, Clone, Eq, PartialEq)]
pub struct ServerConfig {
    #[serde(skip_deserializing)]
    pub config_path: Option<PathBuf>,

    #[serde(default = "default_listen")]
    pub listen: SocketAddr,

    #[serde(default = "default_route")]
    pub route: String,

    #[serde(default = "default_table")]
    pub table: String,

    #[serde(default)]
    pub metrics_listen: Option<SocketAddr>,
}

fn default_listen() -> SocketAddr {
    ([0, 0, 0, 0], 8080).into()
}

fn default_route() -> String {
    DEFAULT_ROUTE.to_owned()
}

fn default_table() -> String {
    DEFAULT_TABLE_NAME.to_owned()
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            config_path: None,
            listen: default_listen(),
            route: default_route(),
            table: default_table(),
            metrics_listen: None,
        }
    }
}

#[derive(Error, Debug)]
pub enum ConfigLoadError {
    #[error("failed to read config file: {0:?}")]
    FailedToRead(io::Error),

    #[error("failed to parse config file: {0}")]
    FailedToParse(serde_yml::Error),
}

impl ServerConfig {
    pub async fn load(file_path: PathBuf) -> Result<Self, ConfigLoadError> {
        let mut config = Self::parse(
            &fs::read(&file_path).await
                .map_err(ConfigLoadError::FailedToRead)?
        )?;
        config.config_path = Some(file_path);
        Ok(config)
    }

    pub fn parse(config: &[u8]) -> Result<Self, ConfigLoadError> {
        serde_yml::from_slice(config).map_err(ConfigLoadError::FailedToParse)
    }
}

/// Everything the counter handler needs, resolved once at startup.
#[derive(Clone)]
pub struct CounterConfig {
    pub connection_string: Option<String>,
    pub table_name: String,
    pub partition_key: String,
    pub row_key: String,
}

impl CounterConfig {
    pub fn new(connection_string: Option<String>) -> Self {
        Self {
            connection_string,
            table_name: DEFAULT_TABLE_NAME.to_owned(),
            partition_key: COUNTER_PARTITION_KEY.to_owned(),
            row_key: COUNTER_ROW_KEY.to_owned(),
        }
    }

    pub fn with_table_name(mut self, table_name: impl Into<String>) -> Self {
        self.table_name = table_name.into();
        self
    }

    /// Connection string, unless it is missing or blank.
    pub fn connection_string(&self) -> Option<&str> {
        self.connection_string.as_deref()
            .map(str::trim)
            .filter(|v| !v.is_empty())
    }

    pub fn counter_key(&self) -> EntityKey {
        EntityKey::new(self.partition_key.clone(), self.row_key.clone())
    }
}

impl fmt::Debug for CounterConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CounterConfig")
            .field("connection_string", &self.connection_string().map(|_| "<redacted>"))
            .field("table_name", &self.table_name)
            .field("partition_key", &self.partition_key)
            .field("row_key", &self.row_key)
            .finish()
    }
}
