//! Masked panel forecasting metrics.
//!
//! Each metric scores `[n_series, n_windows, h]` prediction arrays
//! under a weight array of the same shape, and matches the signature
//! [`evaluate_model`](crate::experiment::evaluate_model) expects from
//! its caller-supplied loss function.

use ndarray::Array3;

/// Guard against division by a vanishing denominator.
const EPS: f32 = 1e-9;

fn weighted_mean<F>(y: &Array3<f32>, y_hat: &Array3<f32>, weights: &Array3<f32>, f: F) -> f32
where
    F: Fn(f32, f32) -> f32,
{
    let mut total = 0.0f64;
    let mut weight_sum = 0.0f64;
    for ((&t, &p), &w) in y.iter().zip(y_hat.iter()).zip(weights.iter()) {
        if w != 0.0 {
            total += f64::from(f(t, p)) * f64::from(w);
            weight_sum += f64::from(w);
        }
    }
    if weight_sum == 0.0 {
        f32::NAN
    } else {
        (total / weight_sum) as f32
    }
}

/// Weighted mean absolute error.
pub fn mae(y: &Array3<f32>, y_hat: &Array3<f32>, weights: &Array3<f32>) -> f32 {
    weighted_mean(y, y_hat, weights, |t, p| (t - p).abs())
}

/// Weighted mean squared error.
pub fn mse(y: &Array3<f32>, y_hat: &Array3<f32>, weights: &Array3<f32>) -> f32 {
    weighted_mean(y, y_hat, weights, |t, p| (t - p) * (t - p))
}

/// Root of the weighted mean squared error.
pub fn rmse(y: &Array3<f32>, y_hat: &Array3<f32>, weights: &Array3<f32>) -> f32 {
    mse(y, y_hat, weights).sqrt()
}

/// Weighted mean absolute percentage error.
pub fn mape(y: &Array3<f32>, y_hat: &Array3<f32>, weights: &Array3<f32>) -> f32 {
    weighted_mean(y, y_hat, weights, |t, p| (t - p).abs() / t.abs().max(EPS))
}

/// Weighted symmetric mean absolute percentage error, in percent.
pub fn smape(y: &Array3<f32>, y_hat: &Array3<f32>, weights: &Array3<f32>) -> f32 {
    weighted_mean(y, y_hat, weights, |t, p| {
        200.0 * (t - p).abs() / (t.abs() + p.abs()).max(EPS)
    })
}
