//! Error types for training and experiment orchestration.

use thiserror::Error;

/// Result type alias using [`TrainError`].
pub type Result<T> = std::result::Result<T, TrainError>;

/// Errors that can occur while fitting, predicting or orchestrating
/// experiments.
#[derive(Error, Debug)]
pub enum TrainError {
    /// Scaling was requested for a panel it does not support yet.
    #[error("Unsupported scaling: {0}")]
    UnsupportedScaling(String),

    /// The test tail does not line up with the evaluation stride.
    #[error(
        "ds_in_test ({ds_in_test}) must be a multiple of val_idx_to_sample_freq ({stride})"
    )]
    SplitAlignment {
        /// Rows held out for test per series.
        ds_in_test: usize,
        /// Evaluation sampling stride.
        stride: usize,
    },

    /// Invalid experiment configuration.
    #[error("Invalid experiment configuration: {0}")]
    InvalidConfig(String),

    /// No loader was available to predict on.
    #[error("Nothing to predict on: {0}")]
    NoPredictionSplit(String),

    /// Series produced different window counts, so predictions cannot
    /// be stacked per series.
    #[error(
        "Ragged prediction windows: series produced between {min} and {max} windows"
    )]
    RaggedPrediction {
        /// Smallest per-series window count.
        min: usize,
        /// Largest per-series window count.
        max: usize,
    },

    /// Data pipeline error.
    #[error("Data error: {0}")]
    Data(#[from] panelcast_data::DataError),

    /// Model construction error.
    #[error("Model error: {0}")]
    Model(#[from] panelcast_models::ModelError),

    /// Core error.
    #[error("Core error: {0}")]
    Core(#[from] panelcast_core::CoreError),

    /// Configuration serialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Other error.
    #[error("{0}")]
    Other(String),
}
