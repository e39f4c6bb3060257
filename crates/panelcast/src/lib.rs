//! # panelcast
//!
//! Neural panel time series forecasting in Rust: windowed dataset
//! construction with leak-free masking, a hybrid convolutional
//! autoregressive forecaster, and sequential hyperparameter tuning.
//!
//! - **Data handling**: panel tables, split masks, scalers, windowed
//!   datasets and loaders
//! - **Models**: distribution heads, causal convolution encoders, the
//!   DeepAR-style forecaster, model registry
//! - **Training**: iteration-budget trainer, experiment orchestration,
//!   masked metrics, hyperparameter tuner
//!
//! ## Quick start
//!
//! ```rust,ignore
//! use panelcast::prelude::*;
//!
//! let panel = PanelFrame::from_columns(uids, timestamps, values)?;
//! let config = ExperimentConfig::default();
//! let data = ExperimentData { panel: &panel, exog: None, stat: None, f_cols: &[] };
//! let split = SplitSpec::fixed(28, 14, Frequency::Daily);
//! let result = evaluate_model::<Backend, _>(&config, data, &split, &device, metrics::mae)?;
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]

// Re-export all crates
pub use panelcast_core as core;
pub use panelcast_data as data;
pub use panelcast_models as models;
pub use panelcast_train as train;

/// Prelude module for convenient imports.
pub mod prelude {
    pub use panelcast_core::{ComputeSettings, Frequency, Seed, Split, WindowBatch};
    pub use panelcast_data::{
        fixed_split, random_split, scale_data, ExogFrame, MaskFrame, NormalizerKind, PanelFrame,
        Scaler, StaticFrame, WindowLoader, WindowLoaderConfig, WindowedDataset,
    };
    pub use panelcast_models::{
        default_registry, DeepAr, DeepArConfig, DistributionKind, ModelRegistry,
        WindowedForecaster,
    };
    pub use panelcast_train::{
        evaluate_model, metrics, model_fit_predict, predict, ExperimentConfig, ExperimentData,
        ExperimentResult, SearchSpace, SplitSpec, Trainer, TrainerConfig, Tuner, ValLossKind,
    };
}
