//! Iteration-based training and prediction.

use std::time::Instant;

use burn::module::AutodiffModule;
use burn::optim::{AdamConfig, GradientsParams, Optimizer};
use burn::prelude::*;
use burn::tensor::backend::AutodiffBackend;
use ndarray::Array3;
use serde::{Deserialize, Serialize};

use panelcast_data::WindowLoader;
use panelcast_models::WindowedForecaster;

use crate::error::{Result, TrainError};

/// Which loss the validation loop tracks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ValLossKind {
    /// The training distribution's negative log-likelihood.
    #[default]
    Nll,
    /// Masked mean absolute error of the point forecast.
    Mae,
}

/// Configuration for the iteration-based trainer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainerConfig {
    /// Total optimizer steps.
    pub n_iterations: usize,
    /// Initial learning rate.
    pub learning_rate: f64,
    /// Multiplicative decay applied every `n_lr_decay_steps`.
    pub lr_decay: f64,
    /// Steps between learning-rate decays.
    pub n_lr_decay_steps: usize,
    /// Steps between validation evaluations.
    pub eval_freq: usize,
    /// Evaluations without improvement before stopping (0 disables).
    pub early_stopping_patience: usize,
    /// Print progress lines.
    pub verbose: bool,
}

impl Default for TrainerConfig {
    fn default() -> Self {
        Self {
            n_iterations: 300,
            learning_rate: 1e-3,
            lr_decay: 0.5,
            n_lr_decay_steps: 100,
            eval_freq: 50,
            early_stopping_patience: 0,
            verbose: true,
        }
    }
}

/// Loss trajectories recorded during a fit, for diagnostics.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Trajectories {
    /// Iteration numbers at which losses were recorded.
    pub iteration: Vec<usize>,
    /// Mean training loss since the previous record.
    pub train_loss: Vec<f32>,
    /// Validation loss at the record (NaN when no validation loader).
    pub val_loss: Vec<f32>,
}

/// Result of a fit: the selected weights plus diagnostics.
#[derive(Debug)]
pub struct TrainingOutput<M> {
    /// The trained model: best validation weights when a validation
    /// loader was given, else the final weights.
    pub model: M,
    /// Recorded loss trajectories.
    pub trajectories: Trajectories,
    /// Best validation loss seen (infinite without validation).
    pub best_val_loss: f32,
    /// Wall-clock fit time in seconds.
    pub training_time_secs: f64,
}

/// Arrays produced by [`predict`]: `[n_series, n_windows, h]` each.
#[derive(Debug, Clone)]
pub struct PredictionOutput {
    /// Ground truth.
    pub y_true: Array3<f32>,
    /// Point forecasts.
    pub y_hat: Array3<f32>,
    /// Scoring mask (available ∧ sample).
    pub mask: Array3<f32>,
}

/// Trains a windowed forecaster with Adam under a step-decayed
/// learning rate and an iteration budget.
pub struct Trainer<B: AutodiffBackend> {
    config: TrainerConfig,
    val_loss: ValLossKind,
    device: B::Device,
}

impl<B: AutodiffBackend> Trainer<B> {
    /// Create a trainer.
    pub fn new(config: TrainerConfig, val_loss: ValLossKind, device: B::Device) -> Self {
        Self {
            config,
            val_loss,
            device,
        }
    }

    /// Fit a model, cycling the train loader until the iteration
    /// budget or the early-stopping patience triggers.
    ///
    /// A zero-iteration budget is not an error: the randomly
    /// initialized weights are returned unchanged so prediction can
    /// still run.
    pub fn fit<M>(
        &self,
        model: M,
        train: &WindowLoader,
        val: Option<&WindowLoader>,
    ) -> Result<TrainingOutput<M>>
    where
        M: AutodiffModule<B> + WindowedForecaster<B> + Clone,
        M::InnerModule: WindowedForecaster<B::InnerBackend>,
    {
        let start = Instant::now();
        let mut trajectories = Trajectories::default();
        let mut best_val_loss = f32::INFINITY;

        if self.config.n_iterations == 0 {
            return Ok(TrainingOutput {
                model,
                trajectories,
                best_val_loss,
                training_time_secs: start.elapsed().as_secs_f64(),
            });
        }

        let mut optim = AdamConfig::new().init::<B, M>();
        let mut model = model;
        let mut best_model = model.clone();

        let mut step = 0usize;
        let mut running_loss = 0.0f32;
        let mut running_count = 0usize;
        let mut evals_without_improvement = 0usize;
        let patience = self.config.early_stopping_patience;

        'training: loop {
            for batch in train.iter::<B>(&self.device) {
                let batch = batch?;

                let decays = if self.config.n_lr_decay_steps > 0 {
                    (step / self.config.n_lr_decay_steps) as i32
                } else {
                    0
                };
                let lr = self.config.learning_rate * self.config.lr_decay.powi(decays);

                let params = model.forward(&batch);
                let loss = model.distribution().neg_log_likelihood(
                    params,
                    batch.outsample_y.clone(),
                    batch.outsample_mask.clone(),
                );
                running_loss += loss.clone().into_scalar().elem::<f32>();
                running_count += 1;

                let grads = loss.backward();
                let grads = GradientsParams::from_grads(grads, &model);
                model = optim.step(lr, model, grads);
                step += 1;

                let at_eval = (self.config.eval_freq > 0 && step % self.config.eval_freq == 0)
                    || step == self.config.n_iterations;
                if at_eval {
                    let train_loss = running_loss / running_count as f32;
                    running_loss = 0.0;
                    running_count = 0;

                    let val_loss = match val {
                        Some(loader) => Some(self.validate(&model, loader)?),
                        None => None,
                    };
                    trajectories.iteration.push(step);
                    trajectories.train_loss.push(train_loss);
                    trajectories.val_loss.push(val_loss.unwrap_or(f32::NAN));

                    if let Some(val_loss) = val_loss {
                        let improved = val_loss < best_val_loss;
                        if improved {
                            best_val_loss = val_loss;
                            best_model = model.clone();
                            evals_without_improvement = 0;
                        } else {
                            evals_without_improvement += 1;
                        }
                        if self.config.verbose {
                            let marker = if improved { " *" } else { "" };
                            println!(
                                "Step {:5}/{}: train_loss={:.5}, val_loss={:.5}{}",
                                step, self.config.n_iterations, train_loss, val_loss, marker
                            );
                        }
                        if patience > 0 && evals_without_improvement >= patience {
                            if self.config.verbose {
                                println!(
                                    "\nEarly stopping after {patience} evaluations without improvement"
                                );
                            }
                            break 'training;
                        }
                    } else if self.config.verbose {
                        println!(
                            "Step {:5}/{}: train_loss={:.5}",
                            step, self.config.n_iterations, train_loss
                        );
                    }
                }

                if step >= self.config.n_iterations {
                    break 'training;
                }
            }
        }

        let model = if val.is_some() && best_val_loss.is_finite() {
            best_model
        } else {
            model
        };
        let training_time_secs = start.elapsed().as_secs_f64();
        if self.config.verbose {
            println!("\nTraining complete in {training_time_secs:.1}s");
        }

        Ok(TrainingOutput {
            model,
            trajectories,
            best_val_loss,
            training_time_secs,
        })
    }

    fn validate<M>(&self, model: &M, loader: &WindowLoader) -> Result<f32>
    where
        M: AutodiffModule<B> + WindowedForecaster<B>,
        M::InnerModule: WindowedForecaster<B::InnerBackend>,
    {
        let inner = model.clone().valid();
        let inner_device: <B::InnerBackend as Backend>::Device = self.device.clone().into();

        let mut total = 0.0f32;
        let mut n_batches = 0usize;
        for batch in loader.iter::<B::InnerBackend>(&inner_device) {
            let batch = batch?;
            let params = inner.forward(&batch);
            let loss = match self.val_loss {
                ValLossKind::Nll => inner.distribution().neg_log_likelihood(
                    params,
                    batch.outsample_y.clone(),
                    batch.outsample_mask.clone(),
                ),
                ValLossKind::Mae => {
                    let point = inner.distribution().point_forecast(params);
                    let abs_err = (batch.outsample_y.clone() - point).abs()
                        * batch.outsample_mask.clone();
                    abs_err.sum() / batch.outsample_mask.clone().sum().clamp_min(1e-9)
                }
            };
            total += loss.into_scalar().elem::<f32>();
            n_batches += 1;
        }
        if n_batches == 0 {
            return Err(TrainError::Other(
                "validation loader yielded no batches".to_string(),
            ));
        }
        Ok(total / n_batches as f32)
    }
}

/// Predict with frozen weights on an unshuffled loader.
///
/// Takes the last input timestep's horizon distribution of every
/// window and stacks windows per series, producing
/// `[n_series, n_windows, h]` arrays. Fails if surviving series
/// produced unequal window counts.
pub fn predict<B, M>(
    model: &M,
    loader: &WindowLoader,
    device: &B::Device,
) -> Result<PredictionOutput>
where
    B: Backend,
    M: WindowedForecaster<B>,
{
    let l = loader.input_size();
    let h = loader.output_size();

    let mut y_true = Vec::with_capacity(loader.n_windows() * h);
    let mut y_hat = Vec::with_capacity(loader.n_windows() * h);
    let mut mask = Vec::with_capacity(loader.n_windows() * h);

    for batch in loader.iter::<B>(device) {
        let batch = batch?;
        let n = batch.batch_size();
        let params = model.forward(&batch);
        let point = model.distribution().point_forecast(params);

        let take = |t: Tensor<B, 3>| -> Result<Vec<f32>> {
            t.slice([0..n, l - 1..l, 0..h])
                .into_data()
                .to_vec()
                .map_err(|e| TrainError::Other(format!("tensor readback failed: {e:?}")))
        };
        y_hat.extend(take(point)?);
        y_true.extend(take(batch.outsample_y.clone())?);
        mask.extend(take(batch.outsample_mask.clone())?);
    }

    let counts = loader.windows_per_series();
    let n_series = counts.len();
    let n_windows = counts.first().map_or(0, |&(_, c)| c);
    let min = counts.iter().map(|&(_, c)| c).min().unwrap_or(0);
    let max = counts.iter().map(|&(_, c)| c).max().unwrap_or(0);
    if min != max {
        return Err(TrainError::RaggedPrediction { min, max });
    }

    let shape = (n_series, n_windows, h);
    let build = |data: Vec<f32>| -> Result<Array3<f32>> {
        Array3::from_shape_vec(shape, data)
            .map_err(|e| TrainError::Other(format!("prediction reshape failed: {e}")))
    };
    Ok(PredictionOutput {
        y_true: build(y_true)?,
        y_hat: build(y_hat)?,
        mask: build(mask)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_trainer_config_default() {
        let config = TrainerConfig::default();
        assert_eq!(config.n_iterations, 300);
        assert_eq!(config.learning_rate, 1e-3);
        assert_eq!(config.early_stopping_patience, 0);
    }

    #[test]
    fn test_val_loss_kind_serde() {
        let json = serde_json::to_string(&ValLossKind::Mae).unwrap();
        assert_eq!(json, "\"mae\"");
        let back: ValLossKind = serde_json::from_str("\"nll\"").unwrap();
        assert_eq!(back, ValLossKind::Nll);
    }
}
