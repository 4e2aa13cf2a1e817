use {
    thiserror::Error,
    crate::sqlite::SqliteTableStoreConnectionError,
};

/// Error returned by table store operations. A row that does not exist on lookup
/// is reported through `EntityLookup::NotFound` instead.
#[derive(Error, Debug)]
pub enum TableStoreError {
    /// Update targeted a row that does not exist.
    #[error("entity not found")]
    EntityNotFound,

    /// Create targeted a key that is already taken.
    #[error("entity already exists")]
    EntityAlreadyExists,

    /// Request never reached the table service or its response could not be read.
    /// Outcome of a write is unknown in this case.
    #[error("transport error: {reason}")]
    Transport { reason: String },

    /// Table service rejected the request.
    #[error("table service responded with {status}: {code}: {message}")]
    Service {
        status: u16,
        code: String,
        message: String,
    },

    #[error("serialization error: {reason}")]
    Serialization { reason: String },

    /// Storage operation failed because of internal error in storage implementation.
    #[error("internal storage error: {description}")]
    InternalError { description: String },
}

#[derive(Error, Debug, Eq, PartialEq)]
pub enum ConnectionStringError {
    #[error("connection string is empty")]
    Empty,

    // position only: segments may carry secrets
    #[error("malformed connection string segment at position {position}")]
    MalformedSegment { position: usize },

    #[error("connection string is missing required field: {field}")]
    MissingField { field: &'static str },

    #[error("account key is not valid base64")]
    InvalidAccountKey,

    #[error("unsupported endpoints protocol: {protocol}")]
    UnsupportedProtocol { protocol: String },
}

#[derive(Error, Debug)]
pub enum ConnectError {
    #[error("invalid connection string: {0}")]
    InvalidConnectionString(#[from] ConnectionStringError),

    #[error("failed to open sqlite table store: {0}")]
    Sqlite(#[from] SqliteTableStoreConnectionError),

    #[error("failed to create http client: {reason}")]
    HttpClient { reason: String },
}
