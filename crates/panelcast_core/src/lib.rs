//! # panelcast_core
//!
//! Core types for panelcast neural panel forecasting.
//!
//! This crate provides:
//! - [`Seed`] for deterministic random number generation
//! - [`Split`] tags for train/validation/test data
//! - [`Frequency`] for timestamp spacing of panel series
//! - [`WindowBatch`] the tensor bundle produced by window loaders and
//!   consumed by forecast models
//! - [`ComputeSettings`] for explicit numerical-backend thread capping
//!
//! ## Shape convention
//!
//! Window batches follow the convention `(N, L, h)`:
//! - `N`: number of windows in the batch
//! - `L`: input size (history length per window)
//! - `h`: forecast horizon

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]

mod batch;
mod compute;
mod error;
mod frequency;
mod seed;
mod split;

pub use batch::WindowBatch;
pub use compute::ComputeSettings;
pub use error::{CoreError, Result};
pub use frequency::Frequency;
pub use seed::Seed;
pub use split::Split;
