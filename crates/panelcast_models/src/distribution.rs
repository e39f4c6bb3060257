//! Predictive distribution heads.

use burn::nn::{Linear, LinearConfig};
use burn::prelude::*;
use burn::tensor::activation::softplus;
use serde::{Deserialize, Serialize};
use statrs::function::gamma::ln_gamma;

/// Floor added to the scale parameter after the domain map.
const SCALE_FLOOR: f32 = 1e-6;

/// The predictive distribution a forecaster emits, fixed at
/// configuration time.
///
/// A kind bundles the three capabilities the model needs from its loss:
/// the adapter projection size ([`param_count`](Self::param_count)),
/// the forward transform from raw projections to valid parameters
/// ([`domain_map`](Self::domain_map)), and the scoring/forecast rules
/// ([`neg_log_likelihood`](Self::neg_log_likelihood),
/// [`point_forecast`](Self::point_forecast)).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "name", rename_all = "snake_case")]
pub enum DistributionKind {
    /// Gaussian location/scale.
    Normal,
    /// Student-t location/scale with fixed degrees of freedom.
    StudentT {
        /// Degrees of freedom, fixed as a hyperparameter.
        df: f32,
    },
}

impl Default for DistributionKind {
    fn default() -> Self {
        Self::StudentT { df: 3.0 }
    }
}

impl std::fmt::Display for DistributionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{self:?}")
    }
}

// `DistributionKind` is carried inside `#[derive(Module)]` structs as a
// fixed hyperparameter, not a learnable parameter. `constant!` gives it the
// no-op `Module`/`AutodiffModule`/`ModuleDisplay` impls burn requires of such
// fields, exactly as burn does for `usize`, `bool`, etc.
use burn::constant;
constant!(DistributionKind);

impl DistributionKind {
    /// Number of distribution parameters per (window, timestep,
    /// horizon step).
    #[must_use]
    pub const fn param_count(&self) -> usize {
        match self {
            Self::Normal | Self::StudentT { .. } => 2,
        }
    }

    /// The final projection from decoder hidden state to raw
    /// distribution parameters.
    pub fn init_adapter<B: Backend>(&self, in_features: usize, device: &B::Device) -> Linear<B> {
        LinearConfig::new(in_features, self.param_count()).init(device)
    }

    /// Map raw projections `[N, L, h, P]` onto the distribution's
    /// parameter domain: location stays unconstrained, scale goes
    /// through softplus with a small floor.
    pub fn domain_map<B: Backend>(&self, raw: Tensor<B, 4>) -> Tensor<B, 4> {
        let [n, l, h, p] = raw.dims();
        let location = raw.clone().slice([0..n, 0..l, 0..h, 0..1]);
        let scale = softplus(raw.slice([0..n, 0..l, 0..h, 1..p]), 1.0) + SCALE_FLOOR;
        Tensor::cat(vec![location, scale], 3)
    }

    /// Masked mean negative log-likelihood of `target` under the
    /// parameters, `[N, L, h, P]` against `[N, L, h]`. Positions where
    /// `mask` is zero do not contribute.
    pub fn neg_log_likelihood<B: Backend>(
        &self,
        params: Tensor<B, 4>,
        target: Tensor<B, 3>,
        mask: Tensor<B, 3>,
    ) -> Tensor<B, 1> {
        let [n, l, h, _] = params.dims();
        let location: Tensor<B, 3> = params.clone().slice([0..n, 0..l, 0..h, 0..1]).squeeze(3);
        let scale: Tensor<B, 3> = params.slice([0..n, 0..l, 0..h, 1..2]).squeeze(3);
        let z = (target - location) / scale.clone();

        let nll = match *self {
            Self::Normal => {
                let half_log_two_pi = 0.5 * (2.0 * std::f64::consts::PI).ln() as f32;
                scale.log() + z.clone() * z * 0.5 + half_log_two_pi
            }
            Self::StudentT { df } => {
                // log C(df) = lnΓ((df+1)/2) − lnΓ(df/2) − ½ln(df·π)
                let df64 = f64::from(df);
                let log_norm = (ln_gamma((df64 + 1.0) / 2.0)
                    - ln_gamma(df64 / 2.0)
                    - 0.5 * (df64 * std::f64::consts::PI).ln()) as f32;
                let kernel = (z.clone() * z / df + 1.0).log() * ((df + 1.0) / 2.0);
                scale.log() + kernel - log_norm
            }
        };

        let weighted = nll * mask.clone();
        weighted.sum() / mask.sum().clamp_min(1e-9)
    }

    /// The point forecast (distribution location), `[N, L, h]`.
    pub fn point_forecast<B: Backend>(&self, params: Tensor<B, 4>) -> Tensor<B, 3> {
        let [n, l, h, _] = params.dims();
        params.slice([0..n, 0..l, 0..h, 0..1]).squeeze(3)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn_ndarray::NdArray;

    type B = NdArray;

    #[test]
    fn test_param_counts() {
        assert_eq!(DistributionKind::Normal.param_count(), 2);
        assert_eq!(DistributionKind::StudentT { df: 3.0 }.param_count(), 2);
    }

    #[test]
    fn test_domain_map_makes_scale_positive() {
        let device = Default::default();
        let raw = Tensor::<B, 1>::from_floats([0.5, -10.0, -1.0, -10.0], &device)
            .reshape([1, 1, 2, 2]);
        for kind in [DistributionKind::Normal, DistributionKind::StudentT { df: 3.0 }] {
            let params = kind.domain_map(raw.clone());
            let flat: Vec<f32> = params.into_data().to_vec().unwrap();
            // Locations pass through, scales are strictly positive.
            assert_eq!(flat[0], 0.5);
            assert_eq!(flat[2], -1.0);
            assert!(flat[1] > 0.0);
            assert!(flat[3] > 0.0);
        }
    }

    #[test]
    fn test_normal_nll_at_mode() {
        let device = Default::default();
        // loc 0, scale 1, target 0: nll = ½ln(2π).
        let params = Tensor::<B, 1>::from_floats([0.0, 1.0], &device).reshape([1, 1, 1, 2]);
        let target = Tensor::<B, 1>::from_floats([0.0], &device).reshape([1, 1, 1]);
        let mask = Tensor::<B, 1>::from_floats([1.0], &device).reshape([1, 1, 1]);
        let nll = DistributionKind::Normal
            .neg_log_likelihood(params, target, mask)
            .into_scalar();
        let expected = 0.5 * (2.0 * std::f32::consts::PI).ln();
        assert!((nll - expected).abs() < 1e-5);
    }

    #[test]
    fn test_nll_ignores_masked_positions() {
        let device = Default::default();
        let params =
            Tensor::<B, 1>::from_floats([0.0, 1.0, 0.0, 1.0], &device).reshape([1, 1, 2, 2]);
        // Second position has an absurd target but is masked out.
        let target = Tensor::<B, 1>::from_floats([0.0, 1e6], &device).reshape([1, 1, 2]);
        let mask = Tensor::<B, 1>::from_floats([1.0, 0.0], &device).reshape([1, 1, 2]);
        let nll = DistributionKind::Normal
            .neg_log_likelihood(params, target, mask)
            .into_scalar();
        let expected = 0.5 * (2.0 * std::f32::consts::PI).ln();
        assert!((nll - expected).abs() < 1e-5);
    }

    #[test]
    fn test_student_t_penalizes_outliers_less() {
        let device = Default::default();
        let params =
            Tensor::<B, 1>::from_floats([0.0, 1.0], &device).reshape([1, 1, 1, 2]);
        let target = Tensor::<B, 1>::from_floats([8.0], &device).reshape([1, 1, 1]);
        let mask = Tensor::<B, 1>::from_floats([1.0], &device).reshape([1, 1, 1]);
        let normal = DistributionKind::Normal
            .neg_log_likelihood(params.clone(), target.clone(), mask.clone())
            .into_scalar();
        let student = DistributionKind::StudentT { df: 3.0 }
            .neg_log_likelihood(params, target, mask)
            .into_scalar();
        assert!(student < normal);
    }

    #[test]
    fn test_point_forecast_is_location() {
        let device = Default::default();
        let params = Tensor::<B, 1>::from_floats([2.5, 1.0, -3.0, 0.5], &device)
            .reshape([1, 1, 2, 2]);
        let point = DistributionKind::Normal.point_forecast(params);
        let flat: Vec<f32> = point.into_data().to_vec().unwrap();
        assert_eq!(flat, vec![2.5, -3.0]);
    }
}
