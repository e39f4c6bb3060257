//! Error types for panelcast_core.

use thiserror::Error;

/// Result type alias using [`CoreError`].
pub type Result<T> = std::result::Result<T, CoreError>;

/// Core errors that can occur in panelcast_core operations.
#[derive(Error, Debug)]
pub enum CoreError {
    /// A tensor did not have the expected shape.
    #[error("Invalid shape: expected {expected}, got {got}")]
    InvalidShape {
        /// Expected shape description.
        expected: String,
        /// Actual shape description.
        got: String,
    },

    /// Two tensors that must agree on a dimension do not.
    #[error("Shape mismatch: {0}")]
    ShapeMismatch(String),

    /// An unrecognized frequency code.
    #[error("Unknown frequency code: {0}")]
    UnknownFrequency(String),

    /// Generic error.
    #[error("{0}")]
    Other(String),
}
