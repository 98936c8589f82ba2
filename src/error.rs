use std::fmt;

#[derive(Debug, Clone, PartialEq)]
pub enum AppError {
    /// Malformed snapshot or caller input
    Validation(String),
    /// Transport or permission failure on write/patch/delete
    RemoteWrite(String),
    /// Target path is absent
    NotFound(String),
    /// Caller lacks the admin capability for a gated operation
    Unauthorized(String),
    /// Same action on the same subject is already in flight
    Conflict(String),
    ConfigurationError(String),
    SerializationError(String),
    Internal(String),
}

impl AppError {
    /// Deletes treat an absent target as success
    pub fn is_not_found(&self) -> bool {
        matches!(self, AppError::NotFound(_))
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::Validation(msg) => write!(f, "Validation error: {}", msg),
            AppError::RemoteWrite(msg) => write!(f, "Remote write failed: {}", msg),
            AppError::NotFound(msg) => write!(f, "Not found: {}", msg),
            AppError::Unauthorized(msg) => write!(f, "Unauthorized: {}", msg),
            AppError::Conflict(msg) => write!(f, "Conflict: {}", msg),
            AppError::ConfigurationError(msg) => write!(f, "Configuration error: {}", msg),
            AppError::SerializationError(msg) => write!(f, "Serialization error: {}", msg),
            AppError::Internal(msg) => write!(f, "Internal error: {}", msg),
        }
    }
}

impl std::error::Error for AppError {}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::SerializationError(err.to_string())
    }
}

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        AppError::Internal(err.to_string())
    }
}

pub type AppResult<T> = Result<T, AppError>;
