//! Error types for apkforge
//!
//! Centralized error handling using thiserror.

use thiserror::Error;

/// Main error type for configuration and project handling
#[derive(Error, Debug)]
pub enum ForgeError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),
}

/// Result type alias for apkforge operations
pub type Result<T> = std::result::Result<T, ForgeError>;

impl ForgeError {
    /// Get a user-friendly error message
    pub fn user_message(&self) -> String {
        match self {
            ForgeError::Io(e) => format!("File operation failed: {}", e),
            ForgeError::Config(msg) => format!("Configuration error: {}", msg),
            ForgeError::TomlParse(e) => {
                format!("Could not read {}: {}", crate::CONFIG_FILE_NAME, e)
            }
        }
    }
}
