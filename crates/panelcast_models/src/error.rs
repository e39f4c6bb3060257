//! Error types for panelcast_models.

use thiserror::Error;

/// Result type alias using [`ModelError`].
pub type Result<T> = std::result::Result<T, ModelError>;

/// Errors that can occur when building models.
#[derive(Error, Debug)]
pub enum ModelError {
    /// Requested model name has no registered constructor.
    #[error("Model '{0}' not found in registry")]
    UnknownModel(String),

    /// Configuration value missing or of the wrong type.
    #[error("Invalid model configuration: {0}")]
    InvalidConfig(String),

    /// Architecture parameters are inconsistent.
    #[error("Invalid architecture: {0}")]
    InvalidArchitecture(String),
}
