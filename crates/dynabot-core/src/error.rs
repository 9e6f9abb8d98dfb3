use thiserror::Error;

/// Top-level error type for the Dynabot system.
///
/// Subsystem crates define their own error types and convert into or out of
/// `DynabotError` so that the `?` operator works across crate boundaries.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum DynabotError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("API error: {0}")]
    Api(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl From<toml::de::Error> for DynabotError {
    fn from(err: toml::de::Error) -> Self {
        DynabotError::Config(err.to_string())
    }
}

impl From<toml::ser::Error> for DynabotError {
    fn from(err: toml::ser::Error) -> Self {
        DynabotError::Config(err.to_string())
    }
}

impl From<serde_json::Error> for DynabotError {
    fn from(err: serde_json::Error) -> Self {
        DynabotError::Serialization(err.to_string())
    }
}

/// A specialized `Result` type for Dynabot operations.
pub type Result<T> = std::result::Result<T, DynabotError>;
