//! # panelcast_data
//!
//! Panel tables, split masks, leak-free scaling, windowed datasets and
//! window loaders for panelcast.
//!
//! The pipeline turns a long-format table of (series, timestamp, value)
//! observations into batched training windows:
//!
//! 1. [`PanelFrame`] / [`ExogFrame`] / [`StaticFrame`] hold the input
//!    tables sorted by (series, timestamp).
//! 2. [`fixed_split`] / [`random_split`] partition the panel into
//!    train/validation/test [`MaskFrame`]s.
//! 3. [`scale_data`] fits a [`Scaler`] on the train mask only and
//!    rescales every row.
//! 4. [`WindowedDataset`] regroups the scaled tables per series.
//! 5. [`WindowLoader`] slices fixed `(input_size, horizon)` windows,
//!    enforces completeness rules and yields
//!    [`WindowBatch`](panelcast_core::WindowBatch) tensors.

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]

mod dataset;
mod error;
mod loader;
mod mask;
mod panel;
mod scaler;

pub use dataset::{SeriesData, WindowedDataset};
pub use error::{DataError, Result};
pub use loader::{WindowBatchIter, WindowLoader, WindowLoaderConfig};
pub use mask::{fixed_split, random_split, MaskFrame};
pub use panel::{ExogFrame, PanelFrame, StaticFrame};
pub use scaler::{scale_data, NormalizerKind, Scaler};
