//! Window batch tensors.

use burn::prelude::*;

use crate::error::{CoreError, Result};

/// A batch of fixed-size forecasting windows.
///
/// Produced by window loaders and consumed by forecast models. With `N`
/// windows of history length `L` and horizon `h`:
///
/// - `insample_y`: target history, `[N, L, 1]`
/// - `insample_mask`: availability of the history, `[N, L, 1]`
/// - `hist_exog`: historic exogenous channels, `[N, C, L, 1]`
/// - `futr_exog`: future-known exogenous channels over history and
///   horizon, `[N, F, L + h, 1]`
/// - `stat_exog`: per-window static features, `[N, S]`
/// - `outsample_y`: forking targets, `[N, L, h]`; row `t` holds the
///   `h` values that follow input step `t`
/// - `outsample_mask`: available ∧ active-sample flag per forking
///   target, `[N, L, h]`; loss and scoring only count positions where
///   this is 1
#[derive(Debug, Clone)]
pub struct WindowBatch<B: Backend> {
    /// Target history.
    pub insample_y: Tensor<B, 3>,
    /// Availability of the target history.
    pub insample_mask: Tensor<B, 3>,
    /// Historic exogenous channels, if the dataset has any.
    pub hist_exog: Option<Tensor<B, 4>>,
    /// Future-known exogenous channels, if the dataset has any.
    pub futr_exog: Option<Tensor<B, 4>>,
    /// Static features, if the dataset has any.
    pub stat_exog: Option<Tensor<B, 2>>,
    /// Forking targets.
    pub outsample_y: Tensor<B, 3>,
    /// Sample/availability mask over the forking targets.
    pub outsample_mask: Tensor<B, 3>,
}

impl<B: Backend> WindowBatch<B> {
    /// Validate that all tensors agree on the batch dimensions.
    pub fn validated(self) -> Result<Self> {
        let [n, l, _] = self.insample_y.dims();
        let [on, ol, _] = self.outsample_y.dims();
        if (n, l) != (on, ol) {
            return Err(CoreError::ShapeMismatch(format!(
                "insample [{n}, {l}] does not line up with outsample [{on}, {ol}]"
            )));
        }
        if self.outsample_mask.dims() != self.outsample_y.dims() {
            return Err(CoreError::ShapeMismatch(
                "outsample mask and target shapes differ".to_string(),
            ));
        }
        if let Some(ref he) = self.hist_exog {
            let dims = he.dims();
            if dims[0] != n || dims[2] != l {
                return Err(CoreError::InvalidShape {
                    expected: format!("[{n}, C, {l}, 1]"),
                    got: format!("{dims:?}"),
                });
            }
        }
        if let Some(ref fe) = self.futr_exog {
            let dims = fe.dims();
            let h = self.horizon();
            if dims[0] != n || dims[2] != l + h {
                return Err(CoreError::InvalidShape {
                    expected: format!("[{n}, F, {}, 1]", l + h),
                    got: format!("{dims:?}"),
                });
            }
        }
        if let Some(ref se) = self.stat_exog {
            if se.dims()[0] != n {
                return Err(CoreError::ShapeMismatch(format!(
                    "static features have batch {} but windows have batch {n}",
                    se.dims()[0]
                )));
            }
        }
        Ok(self)
    }

    /// Number of windows in the batch.
    #[must_use]
    pub fn batch_size(&self) -> usize {
        self.insample_y.dims()[0]
    }

    /// History length per window.
    #[must_use]
    pub fn input_size(&self) -> usize {
        self.insample_y.dims()[1]
    }

    /// Forecast horizon per window.
    #[must_use]
    pub fn horizon(&self) -> usize {
        self.outsample_y.dims()[2]
    }

    /// Device the batch lives on.
    pub fn device(&self) -> B::Device {
        self.insample_y.device()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn_ndarray::NdArray;

    type B = NdArray;

    fn batch(n: usize, l: usize, h: usize) -> WindowBatch<B> {
        let device = Default::default();
        WindowBatch {
            insample_y: Tensor::zeros([n, l, 1], &device),
            insample_mask: Tensor::ones([n, l, 1], &device),
            hist_exog: None,
            futr_exog: None,
            stat_exog: None,
            outsample_y: Tensor::zeros([n, l, h], &device),
            outsample_mask: Tensor::ones([n, l, h], &device),
        }
    }

    #[test]
    fn test_batch_dims() {
        let b = batch(4, 8, 3).validated().unwrap();
        assert_eq!(b.batch_size(), 4);
        assert_eq!(b.input_size(), 8);
        assert_eq!(b.horizon(), 3);
    }

    #[test]
    fn test_batch_validation_rejects_mismatch() {
        let device = Default::default();
        let mut b = batch(4, 8, 3);
        b.stat_exog = Some(Tensor::zeros([3, 2], &device));
        assert!(b.validated().is_err());
    }
}
