use {
    std::net::SocketAddr,
    thiserror::Error,
    crate::{config::ConfigLoadError, metrics::MetricsError},
};

/// Errors that stop the server from starting.
#[derive(Error, Debug)]
pub enum ServerError {
    #[error("failed to load config: {0}")]
    Config(#[from] ConfigLoadError),

    #[error("failed to init metrics: {0}")]
    Metrics(#[from] MetricsError),

    #[error("failed to bind {addr}: {reason}")]
    FailedToBind { addr: SocketAddr, reason: String },
}
