//! Error types for the spark_core library.

use std::io;

/// Result type alias using our Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for spark_core operations
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// IO error occurred
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// CSV error
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// TOML parsing error
    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    /// Configuration validation error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Stored catalog breaks its invariants
    #[error("Catalog validation error: {0}")]
    CatalogValidation(String),

    /// Store read/write failure
    #[error("Store error: {0}")]
    Store(String),

    /// A mission id that is not in the store
    #[error("Unknown mission: {0}")]
    UnknownMission(String),
}
