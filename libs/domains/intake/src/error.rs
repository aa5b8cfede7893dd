//! Error types for the intake domain.

use thiserror::Error;

/// Result type for intake operations.
pub type IntakeResult<T> = Result<T, IntakeError>;

/// Errors that can occur while scanning and notifying.
#[derive(Debug, Error)]
pub enum IntakeError {
    /// Document store request failed.
    #[error("Store error: {0}")]
    Store(String),

    /// Document addressed by an update does not exist.
    #[error("Document not found: {collection}/{id}")]
    DocumentNotFound { collection: String, id: String },

    /// Identity provider request failed.
    #[error("Directory error: {0}")]
    Directory(String),

    /// Identity provider has no user with this id.
    #[error("User not found: {0}")]
    UserNotFound(String),

    /// Service-account authentication failed.
    #[error("Authentication error: {0}")]
    Auth(String),

    /// Template could not be read or rendered.
    #[error("Template error: {0}")]
    Template(String),

    /// Response payload could not be decoded.
    #[error("Decode error: {0}")]
    Decode(String),

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),
}

impl From<email::EmailError> for IntakeError {
    fn from(err: email::EmailError) -> Self {
        IntakeError::Template(err.to_string())
    }
}

impl From<serde_json::Error> for IntakeError {
    fn from(err: serde_json::Error) -> Self {
        IntakeError::Decode(err.to_string())
    }
}
