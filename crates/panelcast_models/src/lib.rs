//! # panelcast_models
//!
//! Forecast model architectures for panelcast.
//!
//! This crate provides:
//! - [`DistributionKind`] pluggable predictive-distribution heads
//! - [`StaticCovariateEncoder`] and [`CausalConvEncoder`] building blocks
//! - [`DeepAr`] the hybrid convolutional autoregressive forecaster
//! - [`WindowedForecaster`] the shared windowed training/prediction
//!   protocol trainers are generic over
//! - [`ModelRegistry`] for creating model configurations by name
//!
//! ## Output contract
//!
//! A forecaster maps a [`WindowBatch`](panelcast_core::WindowBatch) with
//! `N` windows of history `L` and horizon `h` to a tensor
//! `[N, L, h, P]`: distribution parameters for every horizon step
//! reachable from every input timestep.

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]

mod deepar;
mod distribution;
mod encoders;
mod error;
mod registry;
mod traits;

pub use deepar::{DeepAr, DeepArConfig};
pub use distribution::DistributionKind;
pub use encoders::{CausalConvEncoder, CausalConvEncoderConfig, StaticCovariateEncoder};
pub use error::{ModelError, Result};
pub use registry::{default_registry, ModelRegistry};
pub use traits::WindowedForecaster;
