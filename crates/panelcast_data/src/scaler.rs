//! Leak-free column scaling.

use serde::{Deserialize, Serialize};

use crate::error::{DataError, Result};
use crate::mask::MaskFrame;
use crate::panel::{ExogFrame, PanelFrame};

/// The normalization applied to a column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NormalizerKind {
    /// Subtract the mean, divide by the standard deviation.
    Standard,
    /// Subtract the median, divide by the interquartile range.
    Robust,
    /// Map the observed range onto `[0, 1]`.
    MinMax,
}

/// Linear interpolation quantile of a sorted slice.
fn quantile(sorted: &[f64], q: f64) -> f64 {
    if sorted.len() == 1 {
        return sorted[0];
    }
    let pos = q * (sorted.len() - 1) as f64;
    let lo = pos.floor() as usize;
    let hi = pos.ceil() as usize;
    let frac = pos - lo as f64;
    sorted[lo] * (1.0 - frac) + sorted[hi] * frac
}

/// A fitted shift/scale transform over one column.
///
/// Statistics are computed only over entries selected by the fit mask;
/// the transform is then applied to every entry, so held-out values are
/// scaled consistently, possibly landing outside the fitted range.
/// Columns with no dispersion under the mask fall
/// back to scale 1 instead of dividing by zero.
#[derive(Debug, Clone)]
pub struct Scaler {
    kind: NormalizerKind,
    shift: f64,
    scale: f64,
    fitted: bool,
}

impl Scaler {
    /// Create an unfitted scaler of the given kind.
    #[must_use]
    pub fn new(kind: NormalizerKind) -> Self {
        Self {
            kind,
            shift: 0.0,
            scale: 1.0,
            fitted: false,
        }
    }

    /// Fit on the masked entries of `x` and return the scaled column.
    ///
    /// Entries where `mask` is zero do not contribute to the statistic
    /// but are scaled like every other entry.
    pub fn fit_scale(&mut self, x: &[f32], mask: &[f32]) -> Result<Vec<f32>> {
        if x.len() != mask.len() {
            return Err(DataError::ColumnMismatch(format!(
                "values: {}, mask: {}",
                x.len(),
                mask.len()
            )));
        }
        let selected: Vec<f64> = x
            .iter()
            .zip(mask)
            .filter(|(_, &m)| m != 0.0)
            .map(|(&v, _)| f64::from(v))
            .collect();
        if selected.is_empty() {
            return Err(DataError::EmptyMask);
        }

        let (shift, scale) = match self.kind {
            NormalizerKind::Standard => {
                let n = selected.len() as f64;
                let mean = selected.iter().sum::<f64>() / n;
                let var = selected.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
                (mean, var.sqrt())
            }
            NormalizerKind::Robust => {
                let mut sorted = selected.clone();
                sorted.sort_by(|a, b| a.total_cmp(b));
                let median = quantile(&sorted, 0.5);
                let iqr = quantile(&sorted, 0.75) - quantile(&sorted, 0.25);
                (median, iqr)
            }
            NormalizerKind::MinMax => {
                let min = selected.iter().copied().fold(f64::INFINITY, f64::min);
                let max = selected.iter().copied().fold(f64::NEG_INFINITY, f64::max);
                (min, max - min)
            }
        };
        self.shift = shift;
        self.scale = if scale.abs() < 1e-12 { 1.0 } else { scale };
        self.fitted = true;
        Ok(self.transform(x))
    }

    /// Apply the fitted transform.
    #[must_use]
    pub fn transform(&self, x: &[f32]) -> Vec<f32> {
        x.iter()
            .map(|&v| ((f64::from(v) - self.shift) / self.scale) as f32)
            .collect()
    }

    /// Exact algebraic inverse of the fitted transform.
    pub fn inverse(&self, x: &[f32]) -> Result<Vec<f32>> {
        if !self.fitted {
            return Err(DataError::UnfittedScaler);
        }
        Ok(x.iter()
            .map(|&v| (f64::from(v) * self.scale + self.shift) as f32)
            .collect())
    }
}

/// Scale a panel's target and feature columns in place.
///
/// The fit mask is `available ∧ sample` of the given (train) mask, so
/// validation and test values never leak into the statistics. Each
/// feature column gets its own scaler; the fitted target scaler is
/// returned for inverse-scaling predictions later.
pub fn scale_data(
    panel: &mut PanelFrame,
    exog: Option<&mut ExogFrame>,
    train_mask: &MaskFrame,
    normalizer_y: Option<NormalizerKind>,
    normalizer_x: Option<NormalizerKind>,
) -> Result<Option<Scaler>> {
    train_mask.check_aligned(panel)?;
    let fit_mask: Vec<f32> = train_mask
        .available
        .iter()
        .zip(&train_mask.sample)
        .map(|(&a, &s)| a * s)
        .collect();

    let scaler_y = match normalizer_y {
        Some(kind) => {
            let mut scaler = Scaler::new(kind);
            let scaled = scaler.fit_scale(panel.y(), &fit_mask)?;
            panel.y_mut().copy_from_slice(&scaled);
            Some(scaler)
        }
        None => None,
    };

    if let (Some(kind), Some(exog)) = (normalizer_x, exog) {
        for j in 0..exog.n_features() {
            let column: Vec<f32> = exog.column(j).to_vec();
            let mut scaler = Scaler::new(kind);
            let scaled = scaler.fit_scale(&column, &fit_mask)?;
            for (dst, src) in exog.column_mut(j).iter_mut().zip(&scaled) {
                *dst = *src;
            }
        }
    }

    Ok(scaler_y)
}
