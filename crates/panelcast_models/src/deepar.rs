//! Autoregressive forecaster with a convolutional history encoder.

use burn::nn::{Linear, LinearConfig, Relu};
use burn::prelude::*;
use serde::{Deserialize, Serialize};

use panelcast_core::WindowBatch;

use crate::distribution::DistributionKind;
use crate::encoders::{CausalConvEncoder, CausalConvEncoderConfig, StaticCovariateEncoder};
use crate::error::{ModelError, Result};
use crate::traits::WindowedForecaster;

/// Configuration for [`DeepAr`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeepArConfig {
    /// History length per window.
    pub input_size: usize,
    /// Forecast horizon.
    pub h: usize,
    /// Number of static features (0 disables the static path).
    pub stat_exog_size: usize,
    /// Number of historic exogenous channels.
    pub hist_exog_size: usize,
    /// Number of future-known exogenous channels.
    pub futr_exog_size: usize,
    /// Hidden size of the static covariate embedding.
    pub stat_hidden_size: usize,
    /// Dropout applied before the static embedding.
    pub stat_dropout: f64,
    /// Hidden state size of the temporal encoder.
    pub encoder_hidden_size: usize,
    /// Kernel size of the temporal encoder.
    pub kernel_size: usize,
    /// Dilation schedule of the temporal encoder.
    pub dilations: Vec<usize>,
    /// Context vector size per horizon step.
    pub context_size: usize,
    /// Hidden size of the decoder MLP.
    pub decoder_hidden_size: usize,
    /// Number of decoder MLP layers.
    pub decoder_layers: usize,
    /// Predictive distribution head.
    pub distribution: DistributionKind,
}

impl Default for DeepArConfig {
    fn default() -> Self {
        Self {
            input_size: 28,
            h: 7,
            stat_exog_size: 0,
            hist_exog_size: 0,
            futr_exog_size: 0,
            stat_hidden_size: 10,
            stat_dropout: 0.5,
            encoder_hidden_size: 200,
            kernel_size: 2,
            dilations: vec![1, 2, 4, 8, 16],
            context_size: 10,
            decoder_hidden_size: 200,
            decoder_layers: 2,
            distribution: DistributionKind::default(),
        }
    }
}

impl DeepArConfig {
    /// Create a config for the given window geometry.
    #[must_use]
    pub fn new(input_size: usize, h: usize) -> Self {
        Self {
            input_size,
            h,
            ..Default::default()
        }
    }

    /// Set the exogenous/static channel counts, normally taken from the
    /// dataset.
    #[must_use]
    pub fn with_channels(mut self, stat: usize, hist: usize, futr: usize) -> Self {
        self.stat_exog_size = stat;
        self.hist_exog_size = hist;
        self.futr_exog_size = futr;
        self
    }

    /// Set the distribution head.
    #[must_use]
    pub fn with_distribution(mut self, distribution: DistributionKind) -> Self {
        self.distribution = distribution;
        self
    }

    /// Initialize the model on a device.
    pub fn init<B: Backend>(&self, device: &B::Device) -> Result<DeepAr<B>> {
        if self.h == 0 || self.input_size == 0 {
            return Err(ModelError::InvalidArchitecture(
                "input_size and h must be positive".to_string(),
            ));
        }
        if self.dilations.is_empty() {
            return Err(ModelError::InvalidArchitecture(
                "dilation schedule must not be empty".to_string(),
            ));
        }
        if self.decoder_layers == 0 {
            return Err(ModelError::InvalidArchitecture(
                "decoder needs at least one layer".to_string(),
            ));
        }

        // The static path disappears entirely without static features.
        let stat_hidden_size = if self.stat_exog_size > 0 {
            self.stat_hidden_size
        } else {
            0
        };
        let stat_encoder = (self.stat_exog_size > 0).then(|| {
            StaticCovariateEncoder::new(
                self.stat_exog_size,
                stat_hidden_size,
                self.stat_dropout,
                device,
            )
        });

        let encoder_input = 1 + self.hist_exog_size + stat_hidden_size;
        let hist_encoder = CausalConvEncoderConfig::new(
            encoder_input,
            self.encoder_hidden_size,
            self.kernel_size,
        )
        .with_dilations(self.dilations.clone())
        .init(device);

        let context_adapter = LinearConfig::new(
            self.encoder_hidden_size + self.futr_exog_size * self.h,
            self.context_size * self.h,
        )
        .init(device);

        let decoder = MlpDecoder::new(
            self.context_size + self.futr_exog_size,
            self.decoder_hidden_size,
            self.decoder_layers,
            device,
        );

        let adapter = self
            .distribution
            .init_adapter(self.decoder_hidden_size, device);

        Ok(DeepAr {
            stat_encoder,
            hist_encoder,
            context_adapter,
            decoder,
            adapter,
            input_size: self.input_size,
            h: self.h,
            context_size: self.context_size,
            stat_exog_size: self.stat_exog_size,
            hist_exog_size: self.hist_exog_size,
            futr_exog_size: self.futr_exog_size,
            distribution: self.distribution,
        })
    }
}

/// Fully connected decoder applied per (timestep, horizon step).
#[derive(Module, Debug)]
struct MlpDecoder<B: Backend> {
    layers: Vec<Linear<B>>,
}

impl<B: Backend> MlpDecoder<B> {
    fn new(in_features: usize, hidden_size: usize, num_layers: usize, device: &B::Device) -> Self {
        let mut layers = Vec::with_capacity(num_layers);
        let mut prev = in_features;
        for _ in 0..num_layers {
            layers.push(LinearConfig::new(prev, hidden_size).init(device));
            prev = hidden_size;
        }
        Self { layers }
    }

    fn forward(&self, x: Tensor<B, 4>) -> Tensor<B, 4> {
        let mut out = x;
        let last = self.layers.len() - 1;
        for (i, layer) in self.layers.iter().enumerate() {
            out = layer.forward(out);
            if i < last {
                out = Relu::new().forward(out);
            }
        }
        out
    }
}

/// Autoregressive forecaster producing predictive distributions.
///
/// The forward pass is a pure function of (window batch, weights):
///
/// 1. static features are embedded and broadcast along the time axis;
/// 2. target history, historic exogenous channels and the static
///    embedding are concatenated per timestep;
/// 3. a causal dilated convolution stack encodes the history;
/// 4. a linear context adapter produces, for every input timestep, one
///    context vector per horizon step;
/// 5. future-known exogenous values are concatenated onto each context
///    vector as a residual path;
/// 6. an MLP decoder and the distribution adapter map each context to
///    distribution parameters.
///
/// Output: `[N, input_size, h, param_count]`.
#[derive(Module, Debug)]
pub struct DeepAr<B: Backend> {
    stat_encoder: Option<StaticCovariateEncoder<B>>,
    hist_encoder: CausalConvEncoder<B>,
    context_adapter: Linear<B>,
    decoder: MlpDecoder<B>,
    adapter: Linear<B>,
    #[module(skip)]
    input_size: usize,
    #[module(skip)]
    h: usize,
    #[module(skip)]
    context_size: usize,
    #[module(skip)]
    stat_exog_size: usize,
    #[module(skip)]
    hist_exog_size: usize,
    #[module(skip)]
    futr_exog_size: usize,
    #[module(skip)]
    distribution: DistributionKind,
}

impl<B: Backend> DeepAr<B> {
    /// Forward pass over a window batch, returning `[N, L, h, P]`.
    pub fn forward(&self, batch: &WindowBatch<B>) -> Tensor<B, 4> {
        let insample_y = batch.insample_y.clone() * batch.insample_mask.clone();
        let [n, l, _] = insample_y.dims();

        // Assemble [ y_t | historic exog | static hidden ] per timestep.
        let mut encoder_input = insample_y;
        if self.hist_exog_size > 0 {
            let hist = batch
                .hist_exog
                .clone()
                .expect("model configured with historic exogenous channels")
                .squeeze::<3>(3)
                .swap_dims(1, 2);
            encoder_input = Tensor::cat(vec![encoder_input, hist], 2);
        }
        if let Some(stat_encoder) = &self.stat_encoder {
            let stat = batch
                .stat_exog
                .clone()
                .expect("model configured with static features");
            let stat_hidden = stat_encoder.forward(stat, l);
            encoder_input = Tensor::cat(vec![encoder_input, stat_hidden], 2);
        }

        let hidden = self.hist_encoder.forward(encoder_input);

        // Per-timestep view of the future-known covariates over the
        // horizon steps it predicts, the "now" column excluded.
        let futr_view = (self.futr_exog_size > 0).then(|| {
            self.horizon_view(
                batch
                    .futr_exog
                    .clone()
                    .expect("model configured with future exogenous channels"),
                l,
            )
        });

        let context_input = match &futr_view {
            Some(view) => {
                let flat = view
                    .clone()
                    .reshape([n, l, self.h * self.futr_exog_size]);
                Tensor::cat(vec![hidden, flat], 2)
            }
            None => hidden,
        };

        let context = self
            .context_adapter
            .forward(context_input)
            .reshape([n, l, self.h, self.context_size]);
        let context = match futr_view {
            Some(view) => Tensor::cat(vec![context, view], 3),
            None => context,
        };

        let decoded = self.decoder.forward(context);
        let raw = self.adapter.forward(decoded);
        self.distribution.domain_map(raw)
    }

    /// Build `[N, L, h, F]` from `[N, F, L + h, 1]`: for input step `t`
    /// and horizon step `tau`, the covariates at window position
    /// `t + tau` (1-based `tau`).
    fn horizon_view(&self, futr: Tensor<B, 4>, l: usize) -> Tensor<B, 4> {
        let [n, f, _, _] = futr.dims();
        let base = futr.squeeze::<3>(3);
        let mut parts = Vec::with_capacity(self.h);
        for tau in 1..=self.h {
            parts.push(
                base.clone()
                    .slice([0..n, 0..f, tau..tau + l])
                    .unsqueeze_dim::<4>(3),
            );
        }
        // [N, F, L, h] -> [N, L, F, h] -> [N, L, h, F]
        Tensor::cat(parts, 3).swap_dims(1, 2).swap_dims(2, 3)
    }
}

impl<B: Backend> WindowedForecaster<B> for DeepAr<B> {
    fn forward(&self, batch: &WindowBatch<B>) -> Tensor<B, 4> {
        self.forward(batch)
    }

    fn distribution(&self) -> DistributionKind {
        self.distribution
    }

    fn horizon(&self) -> usize {
        self.h
    }

    fn input_size(&self) -> usize {
        self.input_size
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn_ndarray::NdArray;

    type B = NdArray;

    fn batch(
        n: usize,
        l: usize,
        h: usize,
        stat: usize,
        hist: usize,
        futr: usize,
    ) -> WindowBatch<B> {
        let device = Default::default();
        WindowBatch {
            insample_y: Tensor::random(
                [n, l, 1],
                burn::tensor::Distribution::Normal(0.0, 1.0),
                &device,
            ),
            insample_mask: Tensor::ones([n, l, 1], &device),
            hist_exog: (hist > 0).then(|| Tensor::ones([n, hist, l, 1], &device)),
            futr_exog: (futr > 0).then(|| Tensor::ones([n, futr, l + h, 1], &device)),
            stat_exog: (stat > 0).then(|| Tensor::ones([n, stat], &device)),
            outsample_y: Tensor::zeros([n, l, h], &device),
            outsample_mask: Tensor::ones([n, l, h], &device),
        }
    }

    fn tiny_config(l: usize, h: usize) -> DeepArConfig {
        let mut config = DeepArConfig::new(l, h);
        config.encoder_hidden_size = 8;
        config.decoder_hidden_size = 8;
        config.context_size = 4;
        config.stat_hidden_size = 3;
        config.dilations = vec![1, 2];
        config
    }

    #[test]
    fn test_output_shape_all_channel_combinations() {
        let device = Default::default();
        for (stat, hist, futr) in [
            (0, 0, 0),
            (2, 0, 0),
            (0, 3, 0),
            (0, 0, 2),
            (2, 3, 2),
        ] {
            let model = tiny_config(12, 4)
                .with_channels(stat, hist, futr)
                .init::<B>(&device)
                .unwrap();
            let out = model.forward(&batch(5, 12, 4, stat, hist, futr));
            assert_eq!(
                out.dims(),
                [5, 12, 4, 2],
                "wrong shape for channels ({stat}, {hist}, {futr})"
            );
        }
    }

    #[test]
    fn test_scale_parameters_are_positive() {
        let device = Default::default();
        let model = tiny_config(10, 3).init::<B>(&device).unwrap();
        let out = model.forward(&batch(2, 10, 3, 0, 0, 0));
        let scale: Vec<f32> = out
            .slice([0..2, 0..10, 0..3, 1..2])
            .into_data()
            .to_vec()
            .unwrap();
        assert!(scale.iter().all(|&s| s > 0.0));
    }

    #[test]
    fn test_invalid_architecture_rejected() {
        let device: <B as Backend>::Device = Default::default();
        let mut config = tiny_config(10, 3);
        config.dilations.clear();
        assert!(matches!(
            config.init::<B>(&device),
            Err(ModelError::InvalidArchitecture(_))
        ));

        let mut config = tiny_config(10, 0);
        config.h = 0;
        assert!(config.init::<B>(&device).is_err());
    }

    #[test]
    fn test_forward_is_deterministic() {
        let device = Default::default();
        let model = tiny_config(8, 2).init::<B>(&device).unwrap();
        let b = batch(3, 8, 2, 0, 0, 0);
        let a: Vec<f32> = model.forward(&b).into_data().to_vec().unwrap();
        let c: Vec<f32> = model.forward(&b).into_data().to_vec().unwrap();
        assert_eq!(a, c);
    }
}
