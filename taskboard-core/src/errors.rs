use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum SyncError {
    /// Bad local input. Raised before any network call or store mutation.
    #[error("Validation failed: {0}")]
    Validation(String),

    /// Non-2xx response from the board service.
    #[error("Request failed ({status}): {message}")]
    Request { status: u16, message: String },

    #[error("Transport error: {0}")]
    Transport(String),

    /// Id absent from local state. Callers log and swallow this one.
    #[error("Not found locally: {0}")]
    NotFoundLocal(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Invalid state: {0}")]
    InvalidState(String),
}

impl SyncError {
    pub fn validation(message: impl Into<String>) -> Self {
        SyncError::Validation(message.into())
    }

    pub fn request(status: u16, message: impl Into<String>) -> Self {
        SyncError::Request {
            status,
            message: message.into(),
        }
    }

    /// Whether the error came from the remote side rather than local input.
    pub fn is_remote(&self) -> bool {
        matches!(self, SyncError::Request { .. } | SyncError::Transport(_))
    }
}

impl From<serde_json::Error> for SyncError {
    fn from(err: serde_json::Error) -> Self {
        SyncError::Serialization(err.to_string())
    }
}

impl From<uuid::Error> for SyncError {
    fn from(err: uuid::Error) -> Self {
        SyncError::Serialization(err.to_string())
    }
}

pub type SyncResult<T> = Result<T, SyncError>;
