//! The shared windowed training/prediction protocol.

use burn::prelude::*;

use panelcast_core::WindowBatch;

use crate::distribution::DistributionKind;

/// A model that consumes windowed batches and emits per-timestep
/// predictive distribution parameters.
///
/// Trainers and the experiment orchestrator are generic over this
/// capability interface instead of a model class hierarchy; every
/// architecture implements it once for any backend, so the same
/// implementation serves the autodiff backend during training and the
/// frozen inner backend during prediction.
pub trait WindowedForecaster<B: Backend> {
    /// Forward pass over a window batch.
    ///
    /// Returns `[N, L, h, P]` where `P` is the configured
    /// distribution's parameter count.
    fn forward(&self, batch: &WindowBatch<B>) -> Tensor<B, 4>;

    /// The predictive distribution this model was configured with.
    fn distribution(&self) -> DistributionKind;

    /// Forecast horizon the model was built for.
    fn horizon(&self) -> usize;

    /// History length the model was built for.
    fn input_size(&self) -> usize;
}
