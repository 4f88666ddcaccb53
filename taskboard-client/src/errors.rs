use taskboard_core::SyncError;
use thiserror::Error;
use tokio_tungstenite::tungstenite;

#[derive(Error, Debug)]
pub enum ClientError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("WebSocket error: {0}")]
    WebSocket(#[from] tungstenite::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Sync error: {0}")]
    Sync(#[from] SyncError),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Failed to acquire lock: {0}")]
    LockError(String),

    #[error("Thread safety violation: process_events() must be called on the registration thread")]
    ThreadSafetyViolation,

    #[error("No callbacks registered yet")]
    NoCallbacksRegistered,
}

pub type ClientResult<T> = Result<T, ClientError>;

impl From<ClientError> for SyncError {
    fn from(err: ClientError) -> Self {
        match err {
            ClientError::Sync(inner) => inner,
            ClientError::Http(e) => SyncError::Transport(e.to_string()),
            ClientError::WebSocket(e) => SyncError::Transport(e.to_string()),
            ClientError::Serialization(e) => SyncError::Serialization(e.to_string()),
            other => SyncError::InvalidState(other.to_string()),
        }
    }
}
