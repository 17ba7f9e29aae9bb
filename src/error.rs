use miette::{Diagnostic, Result};
use thiserror::Error;

/// Main error type for the application
#[derive(Debug, Error, Diagnostic)]
pub enum Error {
    #[error("Configuration error: {0}")]
    #[diagnostic(
        code(agenda_push::config),
        help("check the .env file and the provisioned credential files")
    )]
    Config(String),

    #[error("Authorization error: {0}")]
    #[diagnostic(
        code(agenda_push::auth),
        help("run `get_calendar_token` to authorize the calendar again")
    )]
    Auth(String),

    #[error("Google Calendar API error: {0}")]
    #[diagnostic(code(agenda_push::provider))]
    Provider(String),

    #[error("LINE delivery error: {0}")]
    #[diagnostic(code(agenda_push::delivery))]
    Delivery(String),

    #[error(transparent)]
    #[diagnostic(code(agenda_push::io))]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    #[diagnostic(code(agenda_push::serialization))]
    Serialization(String),
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Serialization(err.to_string())
    }
}

impl From<toml::de::Error> for Error {
    fn from(err: toml::de::Error) -> Self {
        Error::Serialization(err.to_string())
    }
}

/// Type alias for Result with our Error type
pub type AgendaResult<T> = Result<T, Error>;

/// Helper to create configuration errors
pub fn config_error(message: &str) -> Error {
    Error::Config(message.to_string())
}

/// Helper to create authorization errors
pub fn auth_error(message: &str) -> Error {
    Error::Auth(message.to_string())
}

/// Helper to create calendar provider errors
pub fn provider_error(message: &str) -> Error {
    Error::Provider(message.to_string())
}

/// Helper to create delivery errors
pub fn delivery_error(message: &str) -> Error {
    Error::Delivery(message.to_string())
}

impl Error {
    /// Whether the run must stop when this error reaches the orchestrator
    pub fn is_fatal(&self) -> bool {
        !matches!(self, Error::Delivery(_))
    }
}
