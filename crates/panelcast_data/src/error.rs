//! Error types for panelcast_data.

use thiserror::Error;

/// Result type alias using [`DataError`].
pub type Result<T> = std::result::Result<T, DataError>;

/// Errors that can occur in panel data operations.
#[derive(Error, Debug)]
pub enum DataError {
    /// Columns of a table have different lengths.
    #[error("Column length mismatch: {0}")]
    ColumnMismatch(String),

    /// A (series, timestamp) key appears more than once.
    #[error("Duplicate key: series '{uid}' at timestamp {ds}")]
    DuplicateKey {
        /// Series identifier.
        uid: String,
        /// Timestamp.
        ds: i64,
    },

    /// A requested split does not fit a series.
    #[error(
        "Series '{uid}' has {length} rows, fewer than the {requested} requested for validation + test"
    )]
    SplitTooLarge {
        /// Series identifier.
        uid: String,
        /// Series length.
        length: usize,
        /// Rows requested for the held-out splits.
        requested: usize,
    },

    /// Randomized split asked for more draws than there are candidates.
    #[error("Cannot sample {requested} {what} from {available}")]
    NotEnoughCandidates {
        /// What was being sampled.
        what: String,
        /// Draws requested.
        requested: usize,
        /// Candidates available.
        available: usize,
    },

    /// A mask does not line up with its panel.
    #[error("Mask has {mask_rows} rows but panel has {panel_rows}")]
    MaskMismatch {
        /// Rows in the mask.
        mask_rows: usize,
        /// Rows in the panel.
        panel_rows: usize,
    },

    /// A scaler was fit on an empty mask.
    #[error("Cannot fit scaler: mask selects no entries")]
    EmptyMask,

    /// A scaler was used before fitting.
    #[error("Scaler used before fit")]
    UnfittedScaler,

    /// A table is missing a required series.
    #[error("Series '{0}' missing from {1}")]
    MissingSeries(String, String),

    /// Invalid loader configuration.
    #[error("Invalid loader configuration: {0}")]
    InvalidLoader(String),

    /// The dataset or loader ended up empty.
    #[error("Empty dataset: {0}")]
    EmptyDataset(String),

    /// Core error.
    #[error("Core error: {0}")]
    Core(#[from] panelcast_core::CoreError),

    /// Other error.
    #[error("{0}")]
    Other(String),
}
