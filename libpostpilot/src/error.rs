//! Error types for Postpilot

use thiserror::Error;

pub type Result<T> = std::result::Result<T, PostpilotError>;

#[derive(Error, Debug)]
pub enum PostpilotError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Database error: {0}")]
    Database(#[from] DbError),

    #[error("Platform error: {0}")]
    Platform(#[from] PlatformError),

    #[error("Generation error: {0}")]
    Generation(#[from] GenerationError),

    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

impl PostpilotError {
    /// Returns the appropriate exit code for this error
    pub fn exit_code(&self) -> i32 {
        match self {
            PostpilotError::InvalidInput(_) => 3,
            PostpilotError::Config(_) => 2,
            PostpilotError::Platform(_) => 1,
            PostpilotError::Generation(_) => 1,
            PostpilotError::Database(_) => 1,
        }
    }
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    ReadError(#[from] std::io::Error),

    #[error("Failed to parse config: {0}")]
    ParseError(#[from] toml::de::Error),

    #[error("Missing required field: {0}")]
    MissingField(String),
}

#[derive(Error, Debug)]
pub enum DbError {
    #[error("Database operation failed: {0}")]
    SqlxError(#[from] sqlx::Error),

    #[error("Migration failed: {0}")]
    MigrationError(#[from] sqlx::migrate::MigrateError),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Corrupt column {column}: {reason}")]
    Corrupt { column: String, reason: String },
}

/// Errors surfaced by a platform adapter
///
/// `RemoteApi` carries whatever the Graph API reported in its `error` object;
/// `Transport` covers everything that never produced a decodable answer.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum PlatformError {
    #[error("No connected account for {0}")]
    NoConnectedAccount(String),

    #[error("Missing account linkage: {0}")]
    MissingLinkage(String),

    #[error("{message}")]
    RemoteApi {
        message: String,
        code: Option<i64>,
        subcode: Option<i64>,
    },

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Unsupported platform: {0}")]
    Unsupported(String),
}

impl PlatformError {
    /// Build a remote API error with just a message
    pub fn remote(message: impl Into<String>) -> Self {
        PlatformError::RemoteApi {
            message: message.into(),
            code: None,
            subcode: None,
        }
    }
}

#[derive(Error, Debug, Clone)]
pub enum GenerationError {
    #[error("Generation provider not configured: {0}")]
    NotConfigured(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("API error: {0}")]
    Api(String),

    #[error("Unexpected response: {0}")]
    Parse(String),
}
