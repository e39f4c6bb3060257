//! Experiment orchestration: one hyperparameter configuration from
//! tables to score.

use std::time::Instant;

use burn::prelude::*;
use burn::tensor::backend::AutodiffBackend;
use ndarray::Array3;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use panelcast_core::{Frequency, Seed, Split};
use panelcast_data::{
    fixed_split, random_split, scale_data, DataError, ExogFrame, NormalizerKind, PanelFrame,
    Scaler, StaticFrame, WindowLoader, WindowLoaderConfig, WindowedDataset,
};
use panelcast_models::{default_registry, DistributionKind};

use crate::error::{Result, TrainError};
use crate::trainer::{predict, Trainer, TrainerConfig, Trajectories, ValLossKind};

/// The configuration dictionary of a single experiment.
///
/// Serializes to the JSON dictionary the model registry parses, so a
/// tuner can move between [`ExperimentConfig`] and sampled parameter
/// sets freely.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExperimentConfig {
    /// Registered model variant name.
    pub model: String,
    /// History length as a multiple of `output_size`.
    pub input_size_multiplier: usize,
    /// Forecast horizon.
    pub output_size: usize,
    /// Target normalizer; `None` trains in original units.
    pub normalizer_y: Option<NormalizerKind>,
    /// Feature normalizer; `None` leaves features unscaled.
    pub normalizer_x: Option<NormalizerKind>,
    /// Maximum lookback of sampled windows from each series' end.
    pub window_sampling_limit: usize,
    /// Training window stride.
    pub idx_to_sample_freq: usize,
    /// Validation/test window stride.
    pub val_idx_to_sample_freq: usize,
    /// Windows per training batch.
    pub batch_size: usize,
    /// Series grouped per batch.
    pub n_series_per_batch: usize,
    /// Reject windows with unavailable history points.
    pub complete_inputs: bool,
    /// Reject training windows with partially-sampled horizons.
    pub complete_sample: bool,
    /// Static embedding size.
    pub stat_hidden_size: usize,
    /// Temporal encoder hidden size.
    pub encoder_hidden_size: usize,
    /// Temporal encoder kernel size.
    pub kernel_size: usize,
    /// Temporal encoder dilation schedule.
    pub dilations: Vec<usize>,
    /// Context vector size per horizon step.
    pub context_size: usize,
    /// Decoder MLP hidden size.
    pub decoder_hidden_size: usize,
    /// Decoder MLP layer count.
    pub decoder_layers: usize,
    /// Initial learning rate.
    pub learning_rate: f64,
    /// Learning-rate decay factor.
    pub lr_decay: f64,
    /// Steps between learning-rate decays.
    pub n_lr_decay_steps: usize,
    /// Optimizer step budget.
    pub n_iterations: usize,
    /// Early-stopping patience in evaluations (0 disables).
    pub early_stopping_patience: usize,
    /// Steps between validation evaluations.
    pub eval_freq: usize,
    /// Training loss / predictive distribution.
    pub loss: DistributionKind,
    /// Validation loss selector.
    pub val_loss: ValLossKind,
    /// Seed for model weights and batch shuffling.
    pub random_seed: u64,
}

impl Default for ExperimentConfig {
    fn default() -> Self {
        Self {
            model: "deepar".to_string(),
            input_size_multiplier: 2,
            output_size: 7,
            normalizer_y: None,
            normalizer_x: None,
            window_sampling_limit: 100_000,
            idx_to_sample_freq: 1,
            val_idx_to_sample_freq: 1,
            batch_size: 32,
            n_series_per_batch: 8,
            complete_inputs: false,
            complete_sample: false,
            stat_hidden_size: 10,
            encoder_hidden_size: 200,
            kernel_size: 2,
            dilations: vec![1, 2, 4, 8, 16],
            context_size: 10,
            decoder_hidden_size: 200,
            decoder_layers: 2,
            learning_rate: 1e-3,
            lr_decay: 0.5,
            n_lr_decay_steps: 100,
            n_iterations: 300,
            early_stopping_patience: 0,
            eval_freq: 50,
            loss: DistributionKind::default(),
            val_loss: ValLossKind::default(),
            random_seed: 1,
        }
    }
}

impl ExperimentConfig {
    /// History length in rows.
    #[must_use]
    pub fn input_size(&self) -> usize {
        self.input_size_multiplier * self.output_size
    }
}

/// The input tables of an experiment. Borrowed; the orchestrator
/// clones before any mutation, so the caller's data is never touched.
#[derive(Debug, Clone, Copy)]
pub struct ExperimentData<'a> {
    /// Target table.
    pub panel: &'a PanelFrame,
    /// Optional exogenous table.
    pub exog: Option<&'a ExogFrame>,
    /// Optional static table.
    pub stat: Option<&'a StaticFrame>,
    /// Names of exogenous columns known through the horizon.
    pub f_cols: &'a [String],
}

/// How the panel is partitioned for this experiment.
#[derive(Debug, Clone)]
pub struct SplitSpec {
    /// Rows held out for test per series.
    pub ds_in_test: usize,
    /// Rows held out for validation per series.
    pub ds_in_val: usize,
    /// Series drawn for randomized validation.
    pub n_val_series: usize,
    /// Validation windows drawn for randomized validation.
    pub n_val_windows: usize,
    /// Timestamp spacing of the panel.
    pub freq: Frequency,
    /// Randomized-window validation instead of a fixed tail.
    pub is_val_random: bool,
    /// Seed for mask randomization, fixed at call time and independent
    /// of the model's own seed.
    pub mask_seed: Seed,
}

impl SplitSpec {
    /// A fixed-tail split.
    #[must_use]
    pub fn fixed(ds_in_val: usize, ds_in_test: usize, freq: Frequency) -> Self {
        Self {
            ds_in_test,
            ds_in_val,
            n_val_series: 0,
            n_val_windows: 0,
            freq,
            is_val_random: false,
            mask_seed: Seed::new(1),
        }
    }

    /// A randomized-window validation split.
    #[must_use]
    pub fn randomized(
        ds_in_val: usize,
        ds_in_test: usize,
        n_val_series: usize,
        n_val_windows: usize,
        freq: Frequency,
    ) -> Self {
        Self {
            ds_in_test,
            ds_in_val,
            n_val_series,
            n_val_windows,
            freq,
            is_val_random: true,
            mask_seed: Seed::new(1),
        }
    }
}

/// Datasets and the fitted target scaler for one experiment run.
pub struct ExperimentDatasets {
    /// Train-split dataset.
    pub train: WindowedDataset,
    /// Validation-split dataset.
    pub val: WindowedDataset,
    /// Test-split dataset, absent when `ds_in_test == 0`.
    pub test: Option<WindowedDataset>,
    /// Fitted target scaler, absent without a target normalizer.
    pub scaler_y: Option<Scaler>,
}

/// Build masks, scale without leakage, and regroup the tables into the
/// three split datasets.
pub fn create_datasets(
    config: &ExperimentConfig,
    data: ExperimentData<'_>,
    split: &SplitSpec,
) -> Result<ExperimentDatasets> {
    // Defensive copies: scaling mutates, the caller's tables must not.
    let mut panel = data.panel.clone();
    let mut exog = data.exog.cloned();

    let (train_mask, val_mask, test_mask) = if split.is_val_random {
        if split.n_val_windows == 0 {
            return Err(TrainError::InvalidConfig(
                "randomized validation needs n_val_windows > 0".to_string(),
            ));
        }
        random_split(
            &panel,
            split.ds_in_test,
            split.n_val_series,
            split.n_val_windows,
            split.ds_in_val / split.n_val_windows,
            split.freq,
            split.mask_seed,
        )?
    } else {
        fixed_split(&panel, split.ds_in_val, split.ds_in_test)?
    };

    let scaler_y = scale_data(
        &mut panel,
        exog.as_mut(),
        &train_mask,
        config.normalizer_y,
        config.normalizer_x,
    )?;

    let dataset = |mask, tag| {
        WindowedDataset::new(&panel, exog.as_ref(), data.stat, data.f_cols, mask, tag)
    };
    let train = dataset(&train_mask, Split::Train)?;
    let val = dataset(&val_mask, Split::Valid)?;
    let test = if split.ds_in_test > 0 {
        Some(dataset(&test_mask, Split::Test)?)
    } else {
        None
    };
    debug!(%train, %val, "datasets built");

    Ok(ExperimentDatasets {
        train,
        val,
        test,
        scaler_y,
    })
}

/// Predictions and diagnostics from a fitted model.
#[derive(Debug, Clone)]
pub struct FitPredictOutput {
    /// Ground truth, `[n_series, n_windows, h]`, original units when a
    /// target normalizer was configured.
    pub y_true: Array3<f32>,
    /// Point forecasts, same shape and units as `y_true`.
    pub y_hat: Array3<f32>,
    /// Scoring mask, same shape.
    pub mask: Array3<f32>,
    /// Loss trajectories recorded during the fit.
    pub trajectories: Trajectories,
}

/// Fit one configuration and predict its evaluation split.
///
/// Builds datasets and loaders, instantiates the configured model
/// variant, trains under the iteration budget, predicts on the test
/// split when `ds_in_test > 0` (falling back to validation), and
/// rescales predictions back to original units when a target
/// normalizer was configured.
pub fn model_fit_predict<B: AutodiffBackend>(
    config: &ExperimentConfig,
    data: ExperimentData<'_>,
    split: &SplitSpec,
    device: &B::Device,
) -> Result<FitPredictOutput> {
    info!(model = %config.model, "fitting configuration");
    let registry = default_registry();
    if !registry.contains(&config.model) {
        return Err(panelcast_models::ModelError::UnknownModel(config.model.clone()).into());
    }
    let datasets = create_datasets(config, data, split)?;

    let stat = datasets.train.stat_features();
    let hist = datasets.train.hist_channels();
    let futr = datasets.train.futr_channels();

    let input_size = config.input_size();
    let train_loader = WindowLoader::new(
        datasets.train,
        WindowLoaderConfig::new(input_size, config.output_size)
            .with_stride(config.idx_to_sample_freq)
            .with_sampling_limit(config.window_sampling_limit)
            .with_batching(config.n_series_per_batch, config.batch_size)
            .with_completeness(config.complete_inputs, config.complete_sample)
            .with_shuffle(true),
        Some(Seed::new(config.random_seed).derive("shuffle")),
    )?;
    let val_loader = if split.ds_in_val > 0 {
        // Randomized validation windows can miss the evaluation
        // stride entirely; an empty validation split disables early
        // stopping instead of killing the run.
        match WindowLoader::new(
            datasets.val,
            WindowLoaderConfig::new(input_size, config.output_size)
                .with_stride(config.val_idx_to_sample_freq)
                .with_sampling_limit(config.window_sampling_limit)
                .with_batching(config.n_series_per_batch, 1)
                .with_completeness(config.complete_inputs, true),
            None,
        ) {
            Ok(loader) => Some(loader),
            Err(DataError::EmptyDataset(msg)) => {
                tracing::warn!(%msg, "validation split has no windows, training without validation");
                None
            }
            Err(err) => return Err(err.into()),
        }
    } else {
        None
    };
    let test_loader = match datasets.test {
        Some(test) => Some(WindowLoader::new(
            test,
            WindowLoaderConfig::new(input_size, config.output_size)
                .with_stride(config.val_idx_to_sample_freq)
                .with_sampling_limit(config.window_sampling_limit)
                .with_batching(config.n_series_per_batch, 1),
            None,
        )?),
        None => None,
    };

    let model_config = registry
        .build(&config.model, &serde_json::to_value(config)?)?
        .with_channels(stat, hist, futr);

    B::seed(config.random_seed);
    let model = model_config.init::<B>(device)?;

    let trainer = Trainer::<B>::new(
        TrainerConfig {
            n_iterations: config.n_iterations,
            learning_rate: config.learning_rate,
            lr_decay: config.lr_decay,
            n_lr_decay_steps: config.n_lr_decay_steps,
            eval_freq: config.eval_freq,
            early_stopping_patience: config.early_stopping_patience,
            verbose: true,
        },
        config.val_loss,
        device.clone(),
    );
    let fitted = trainer.fit(model, &train_loader, val_loader.as_ref())?;

    let predict_loader = match (&test_loader, &val_loader) {
        (Some(test), _) => test,
        (None, Some(val)) => val,
        (None, None) => {
            return Err(TrainError::NoPredictionSplit(
                "ds_in_test and ds_in_val are both zero".to_string(),
            ))
        }
    };
    let inner_model = burn::module::AutodiffModule::valid(&fitted.model);
    let inner_device: <B::InnerBackend as Backend>::Device = device.clone().into();
    let prediction = predict::<B::InnerBackend, _>(&inner_model, predict_loader, &inner_device)?;

    let (mut y_true, mut y_hat) = (prediction.y_true, prediction.y_hat);
    if let Some(scaler) = &datasets.scaler_y {
        let rescale = |a: &Array3<f32>| -> Result<Array3<f32>> {
            let flat: Vec<f32> = a.iter().copied().collect();
            let restored = scaler.inverse(&flat)?;
            Array3::from_shape_vec(a.dim(), restored)
                .map_err(|e| TrainError::Other(format!("rescale reshape failed: {e}")))
        };
        y_true = rescale(&y_true)?;
        y_hat = rescale(&y_hat)?;
    }

    info!(
        shape = ?y_hat.dim(),
        "prediction complete (n_series, n_windows, horizon)"
    );
    Ok(FitPredictOutput {
        y_true,
        y_hat,
        mask: prediction.mask,
        trajectories: fitted.trajectories,
    })
}

/// Trial outcome marker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrialStatus {
    /// The run completed and was scored.
    Ok,
    /// The run failed; the loss is not meaningful.
    Failed,
}

/// The structured result of one scored experiment.
#[derive(Debug, Clone)]
pub struct ExperimentResult {
    /// Score from the caller-supplied loss function.
    pub loss: f32,
    /// The configuration that produced it.
    pub config: ExperimentConfig,
    /// Ground truth in original units.
    pub y_true: Array3<f32>,
    /// Predictions in original units.
    pub y_hat: Array3<f32>,
    /// Training trajectories for diagnostics.
    pub trajectories: Trajectories,
    /// Wall-clock run time in seconds.
    pub run_time_secs: f64,
    /// Outcome marker.
    pub status: TrialStatus,
}

/// Fit, predict and score one configuration.
///
/// Fails fast, before any training compute, when preconditions do not
/// hold: scaling is not yet supported with multiple series (per-series
/// statistics would be required), and the test tail must be an exact
/// multiple of the evaluation stride so test windows tile it.
pub fn evaluate_model<B, F>(
    config: &ExperimentConfig,
    data: ExperimentData<'_>,
    split: &SplitSpec,
    device: &B::Device,
    loss_function: F,
) -> Result<ExperimentResult>
where
    B: AutodiffBackend,
    F: Fn(&Array3<f32>, &Array3<f32>, &Array3<f32>) -> f32,
{
    if data.panel.n_series() > 1
        && (config.normalizer_y.is_some() || config.normalizer_x.is_some())
    {
        return Err(TrainError::UnsupportedScaling(
            "scaling is not implemented for panels with multiple series".to_string(),
        ));
    }
    if config.val_idx_to_sample_freq == 0
        || split.ds_in_test % config.val_idx_to_sample_freq != 0
    {
        return Err(TrainError::SplitAlignment {
            ds_in_test: split.ds_in_test,
            stride: config.val_idx_to_sample_freq,
        });
    }

    let start = Instant::now();
    let output = model_fit_predict::<B>(config, data, split, device)?;
    let run_time_secs = start.elapsed().as_secs_f64();

    let loss = loss_function(&output.y_true, &output.y_hat, &output.mask);
    info!(loss, run_time_secs, "configuration evaluated");

    Ok(ExperimentResult {
        loss,
        config: config.clone(),
        y_true: output.y_true,
        y_hat: output.y_hat,
        trajectories: output.trajectories,
        run_time_secs,
        status: TrialStatus::Ok,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    type B = burn::backend::Autodiff<burn_ndarray::NdArray>;

    fn daily_panel(n_series: usize, len: usize) -> PanelFrame {
        let tick = Frequency::Daily.tick_seconds();
        let mut uid = Vec::new();
        let mut ds = Vec::new();
        let mut y = Vec::new();
        for s in 0..n_series {
            for t in 0..len {
                uid.push(format!("series_{s}"));
                ds.push(t as i64 * tick);
                y.push(((t as f32) * 0.1).sin() + s as f32);
            }
        }
        PanelFrame::from_columns(uid, ds, y).unwrap()
    }

    fn tiny_config() -> ExperimentConfig {
        ExperimentConfig {
            output_size: 5,
            input_size_multiplier: 2,
            encoder_hidden_size: 8,
            decoder_hidden_size: 8,
            context_size: 4,
            dilations: vec![1, 2],
            batch_size: 16,
            n_series_per_batch: 4,
            val_idx_to_sample_freq: 5,
            idx_to_sample_freq: 3,
            n_iterations: 0,
            eval_freq: 1,
            ..Default::default()
        }
    }

    #[test]
    fn test_multi_series_scaling_rejected() {
        let panel = daily_panel(3, 60);
        let mut config = tiny_config();
        config.normalizer_y = Some(NormalizerKind::Standard);
        let data = ExperimentData {
            panel: &panel,
            exog: None,
            stat: None,
            f_cols: &[],
        };
        let split = SplitSpec::fixed(10, 10, Frequency::Daily);
        let device = Default::default();
        let res = evaluate_model::<B, _>(&config, data, &split, &device, crate::metrics::mae);
        assert!(matches!(res, Err(TrainError::UnsupportedScaling(_))));
    }

    #[test]
    fn test_split_alignment_rejected() {
        let panel = daily_panel(2, 60);
        let mut config = tiny_config();
        config.val_idx_to_sample_freq = 3;
        let data = ExperimentData {
            panel: &panel,
            exog: None,
            stat: None,
            f_cols: &[],
        };
        let split = SplitSpec::fixed(10, 10, Frequency::Daily);
        let device = Default::default();
        let res = evaluate_model::<B, _>(&config, data, &split, &device, crate::metrics::mae);
        assert!(matches!(res, Err(TrainError::SplitAlignment { .. })));
    }

    #[test]
    fn test_unknown_model_rejected_before_training() {
        let panel = daily_panel(2, 60);
        let mut config = tiny_config();
        config.model = "nbeats".to_string();
        let data = ExperimentData {
            panel: &panel,
            exog: None,
            stat: None,
            f_cols: &[],
        };
        let split = SplitSpec::fixed(10, 10, Frequency::Daily);
        let device = Default::default();
        let res = model_fit_predict::<B>(&config, data, &split, &device);
        assert!(matches!(res, Err(TrainError::Model(_))));
    }

    #[test]
    fn test_caller_tables_not_mutated() {
        let panel = daily_panel(1, 80);
        let before = panel.y().to_vec();
        let mut config = tiny_config();
        config.normalizer_y = Some(NormalizerKind::Standard);
        let data = ExperimentData {
            panel: &panel,
            exog: None,
            stat: None,
            f_cols: &[],
        };
        let split = SplitSpec::fixed(10, 10, Frequency::Daily);
        create_datasets(&config, data, &split).unwrap();
        assert_eq!(panel.y(), before.as_slice());
    }

    #[test]
    fn test_create_datasets_omits_test_when_empty_tail() {
        let panel = daily_panel(2, 60);
        let config = tiny_config();
        let data = ExperimentData {
            panel: &panel,
            exog: None,
            stat: None,
            f_cols: &[],
        };
        let split = SplitSpec::fixed(10, 0, Frequency::Daily);
        let datasets = create_datasets(&config, data, &split).unwrap();
        assert!(datasets.test.is_none());
        assert_eq!(datasets.val.sample_count(), 20);
    }
}
