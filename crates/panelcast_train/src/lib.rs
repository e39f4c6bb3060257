//! # panelcast_train
//!
//! Training, experiment orchestration and hyperparameter tuning for
//! panelcast.
//!
//! This crate provides:
//! - [`Trainer`] iteration-budget training with step-decayed Adam and
//!   early stopping, plus [`predict`] for frozen-weight forecasting
//! - [`evaluate_model`] / [`model_fit_predict`] wiring masks, scalers,
//!   datasets, loaders and a registered model into one scored run
//! - [`Tuner`] sequential hyperparameter search over a [`SearchSpace`]
//! - [`metrics`] masked panel scoring functions
//!
//! ## Example
//!
//! ```rust,ignore
//! use panelcast_train::{evaluate_model, metrics, ExperimentConfig, ExperimentData, SplitSpec};
//!
//! let config = ExperimentConfig::default();
//! let data = ExperimentData { panel: &panel, exog: None, stat: None, f_cols: &[] };
//! let split = SplitSpec::fixed(28, 14, Frequency::Daily);
//! let result = evaluate_model::<Backend, _>(&config, data, &split, &device, metrics::mae)?;
//! println!("loss: {}", result.loss);
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]

mod error;
pub mod experiment;
pub mod metrics;
mod trainer;
mod tuner;

pub use error::{Result, TrainError};
pub use experiment::{
    create_datasets, evaluate_model, model_fit_predict, ExperimentConfig, ExperimentData,
    ExperimentDatasets, ExperimentResult, FitPredictOutput, SplitSpec, TrialStatus,
};
pub use trainer::{
    predict, PredictionOutput, Trainer, TrainerConfig, TrainingOutput, Trajectories, ValLossKind,
};
pub use tuner::{
    ParamSet, ParamValue, SearchSpace, TrialRecord, TuneResult, Tuner, TunerError,
};
