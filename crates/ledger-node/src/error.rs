use thiserror::Error;
use tokio::time::error::Elapsed;

/// Failure talking to a single peer. Never escapes the transport's public helpers.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("peer operation timed out")]
    Timeout(#[from] Elapsed),
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
    #[error("malformed message: {0}")]
    Decode(#[from] serde_json::Error),
    #[error("response exceeds {limit} bytes")]
    TooLarge { limit: usize },
    #[error("expected a chain response, got `{0}`")]
    UnexpectedResponse(&'static str),
}

/// Failure handling one inbound connection.
#[derive(Debug, Error)]
pub enum HandleError {
    #[error("connection timed out")]
    Timeout(#[from] Elapsed),
    #[error("connection closed without a message")]
    Empty,
    #[error("request exceeds {limit} bytes")]
    TooLarge { limit: usize },
    #[error("malformed message: {0}")]
    Decode(#[from] serde_json::Error),
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
}
