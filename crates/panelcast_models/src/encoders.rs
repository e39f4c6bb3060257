//! Encoder building blocks for windowed forecasters.

use burn::nn::{
    conv::{Conv1d, Conv1dConfig},
    Dropout, DropoutConfig, Linear, LinearConfig, PaddingConfig1d, Relu,
};
use burn::prelude::*;
use serde::{Deserialize, Serialize};

/// Compresses a window's static features and broadcasts them along the
/// time axis.
///
/// Structure: dropout → linear → ReLU, then the hidden vector is
/// repeated at every input timestep so it can be concatenated with the
/// per-timestep encoder input.
#[derive(Module, Debug)]
pub struct StaticCovariateEncoder<B: Backend> {
    dropout: Dropout,
    linear: Linear<B>,
}

impl<B: Backend> StaticCovariateEncoder<B> {
    /// Create an encoder from `in_features` static features to an
    /// `out_features`-sized hidden vector.
    pub fn new(in_features: usize, out_features: usize, dropout: f64, device: &B::Device) -> Self {
        Self {
            dropout: DropoutConfig::new(dropout).init(),
            linear: LinearConfig::new(in_features, out_features).init(device),
        }
    }

    /// Encode `[N, S]` static features and repeat across `repeats`
    /// timesteps, producing `[N, repeats, out_features]`.
    pub fn forward(&self, x: Tensor<B, 2>, repeats: usize) -> Tensor<B, 3> {
        let hidden = Relu::new().forward(self.linear.forward(self.dropout.forward(x)));
        hidden.unsqueeze_dim::<3>(1).repeat_dim(1, repeats)
    }
}

/// Configuration for [`CausalConvEncoder`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CausalConvEncoderConfig {
    /// Input channels per timestep.
    pub in_channels: usize,
    /// Hidden state size produced per timestep.
    pub out_channels: usize,
    /// Convolution kernel size.
    pub kernel_size: usize,
    /// Dilation of each stacked layer.
    pub dilations: Vec<usize>,
}

impl CausalConvEncoderConfig {
    /// Create a config with the default dilation schedule `1,2,4,8,16`.
    #[must_use]
    pub fn new(in_channels: usize, out_channels: usize, kernel_size: usize) -> Self {
        Self {
            in_channels,
            out_channels,
            kernel_size,
            dilations: vec![1, 2, 4, 8, 16],
        }
    }

    /// Set the dilation schedule.
    #[must_use]
    pub fn with_dilations(mut self, dilations: Vec<usize>) -> Self {
        self.dilations = dilations;
        self
    }

    /// Receptive field of the stack, in timesteps.
    #[must_use]
    pub fn receptive_field(&self) -> usize {
        1 + (self.kernel_size - 1) * self.dilations.iter().sum::<usize>()
    }

    /// Initialize the encoder.
    pub fn init<B: Backend>(&self, device: &B::Device) -> CausalConvEncoder<B> {
        CausalConvEncoder::new(self.clone(), device)
    }
}

/// A causal dilated 1-D convolution stack.
///
/// Replaces a recurrent cell with an equivalent-capacity non-recurrent
/// encoder: each layer pads only on the left (`(k-1)·d`) and trims the
/// tail back to the input length, so the hidden state at timestep `t`
/// depends on inputs at `t` and earlier only.
#[derive(Module, Debug)]
pub struct CausalConvEncoder<B: Backend> {
    convs: Vec<Conv1d<B>>,
}

impl<B: Backend> CausalConvEncoder<B> {
    /// Create the stack from its configuration.
    pub fn new(config: CausalConvEncoderConfig, device: &B::Device) -> Self {
        let mut convs = Vec::with_capacity(config.dilations.len());
        for (i, &dilation) in config.dilations.iter().enumerate() {
            let in_channels = if i == 0 {
                config.in_channels
            } else {
                config.out_channels
            };
            let padding = (config.kernel_size - 1) * dilation;
            convs.push(
                Conv1dConfig::new(in_channels, config.out_channels, config.kernel_size)
                    .with_dilation(dilation)
                    .with_padding(PaddingConfig1d::Explicit(padding))
                    .init(device),
            );
        }
        Self { convs }
    }

    /// Encode `[N, L, C]` inputs into `[N, L, out_channels]` hidden
    /// states.
    pub fn forward(&self, x: Tensor<B, 3>) -> Tensor<B, 3> {
        let [_, seq_len, _] = x.dims();
        let mut out = x.swap_dims(1, 2);
        for conv in &self.convs {
            out = conv.forward(out);
            // Symmetric padding would see the future; trim the tail.
            let [n, c, _] = out.dims();
            out = out.slice([0..n, 0..c, 0..seq_len]);
            out = Relu::new().forward(out);
        }
        out.swap_dims(1, 2)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn_ndarray::NdArray;

    type B = NdArray;

    #[test]
    fn test_static_encoder_broadcast() {
        let device = Default::default();
        let encoder = StaticCovariateEncoder::<B>::new(4, 6, 0.0, &device);
        let x = Tensor::ones([3, 4], &device);
        let out = encoder.forward(x, 10);
        assert_eq!(out.dims(), [3, 10, 6]);
        // Every timestep carries the same hidden vector.
        let first: Vec<f32> = out
            .clone()
            .slice([0..1, 0..1, 0..6])
            .into_data()
            .to_vec()
            .unwrap();
        let last: Vec<f32> = out.slice([0..1, 9..10, 0..6]).into_data().to_vec().unwrap();
        assert_eq!(first, last);
    }

    #[test]
    fn test_conv_encoder_shape() {
        let device = Default::default();
        let config = CausalConvEncoderConfig::new(3, 16, 2).with_dilations(vec![1, 2, 4]);
        let encoder = config.init::<B>(&device);
        let x = Tensor::zeros([5, 24, 3], &device);
        assert_eq!(encoder.forward(x).dims(), [5, 24, 16]);
    }

    #[test]
    fn test_conv_encoder_is_causal() {
        let device = Default::default();
        let config = CausalConvEncoderConfig::new(1, 8, 2).with_dilations(vec![1, 2]);
        let encoder = config.init::<B>(&device);

        // Two inputs identical up to timestep 9, diverging afterwards.
        let mut a = vec![0.0f32; 16];
        let mut b = vec![0.0f32; 16];
        for t in 0..16 {
            a[t] = (t as f32).sin();
            b[t] = a[t];
        }
        for t in 10..16 {
            b[t] += 100.0;
        }
        let xa = Tensor::<B, 1>::from_floats(a.as_slice(), &device).reshape([1, 16, 1]);
        let xb = Tensor::<B, 1>::from_floats(b.as_slice(), &device).reshape([1, 16, 1]);
        let ha: Vec<f32> = encoder
            .forward(xa)
            .slice([0..1, 0..10, 0..8])
            .into_data()
            .to_vec()
            .unwrap();
        let hb: Vec<f32> = encoder
            .forward(xb)
            .slice([0..1, 0..10, 0..8])
            .into_data()
            .to_vec()
            .unwrap();
        for (va, vb) in ha.iter().zip(&hb) {
            assert!((va - vb).abs() < 1e-5, "future inputs leaked into the past");
        }
    }

    #[test]
    fn test_receptive_field() {
        let config = CausalConvEncoderConfig::new(1, 8, 2);
        // 1 + (2-1)·(1+2+4+8+16) = 32
        assert_eq!(config.receptive_field(), 32);
    }
}
