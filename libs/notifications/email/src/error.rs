//! Error types for email composition and delivery.

use std::fmt;

/// Result type for email operations.
pub type EmailResult<T> = Result<T, EmailError>;

/// Errors raised while preparing or sending an email.
#[derive(Debug)]
pub enum EmailError {
    /// Template could not be read
    TemplateNotFound { name: String, reason: String },
    /// Provider configuration is invalid
    ConfigError(String),
    /// Transport failure (SMTP, network)
    ProviderError(String),
    /// Send did not finish within the configured timeout
    Timeout { to: String, secs: u64 },
}

impl fmt::Display for EmailError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::TemplateNotFound { name, reason } => {
                write!(f, "Template '{}' unavailable: {}", name, reason)
            }
            Self::ConfigError(msg) => write!(f, "Configuration error: {}", msg),
            Self::ProviderError(msg) => write!(f, "Provider error: {}", msg),
            Self::Timeout { to, secs } => {
                write!(f, "Send to {} timed out after {}s", to, secs)
            }
        }
    }
}

impl std::error::Error for EmailError {}

impl From<eyre::Report> for EmailError {
    fn from(err: eyre::Report) -> Self {
        Self::ProviderError(format!("{:#}", err))
    }
}
