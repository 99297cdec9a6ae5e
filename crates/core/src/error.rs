//! Error types for sdkdeps
//!
//! Centralized error handling using thiserror.

use thiserror::Error;

/// Error type for configuration and component declarations
#[derive(Error, Debug)]
pub enum SdkError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("TOML serialize error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),

    #[error("Don't know how to handle the extension \"{0}\" (expected \"zip\" or \"tar.gz\")")]
    UnsupportedExtension(String),

    #[error("Invalid component {name}: {reason}")]
    InvalidComponent { name: String, reason: String },
}

/// Result type alias for core operations
pub type Result<T> = std::result::Result<T, SdkError>;
