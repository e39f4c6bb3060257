//! Window sampling and batched loading.

use burn::prelude::*;
use ndarray::{Array2, Array3, Array4};
use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};
use tracing::debug;

use panelcast_core::{Seed, WindowBatch};

use crate::dataset::WindowedDataset;
use crate::error::{DataError, Result};

/// Parameters for slicing a dataset into fixed-size windows.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WindowLoaderConfig {
    /// History length per window.
    pub input_size: usize,
    /// Forecast horizon per window.
    pub output_size: usize,
    /// Stride between consecutive window starts.
    pub idx_to_sample_freq: usize,
    /// Maximum lookback of a window's first horizon step from the
    /// series end.
    pub window_sampling_limit: usize,
    /// Series grouped together per batch.
    pub n_series_per_batch: usize,
    /// Maximum windows per batch.
    pub batch_size: usize,
    /// Reject windows whose history contains unavailable points.
    pub complete_inputs: bool,
    /// Reject windows whose horizon is not fully available and sampled.
    pub complete_sample: bool,
    /// Shuffle batch order (deterministic given the loader seed).
    pub shuffle: bool,
}

impl Default for WindowLoaderConfig {
    fn default() -> Self {
        Self {
            input_size: 28,
            output_size: 7,
            idx_to_sample_freq: 1,
            window_sampling_limit: 100_000,
            n_series_per_batch: 8,
            batch_size: 32,
            complete_inputs: false,
            complete_sample: false,
            shuffle: false,
        }
    }
}

impl WindowLoaderConfig {
    /// Create a config for the given window geometry.
    #[must_use]
    pub fn new(input_size: usize, output_size: usize) -> Self {
        Self {
            input_size,
            output_size,
            ..Default::default()
        }
    }

    /// Set the sampling stride.
    #[must_use]
    pub fn with_stride(mut self, stride: usize) -> Self {
        self.idx_to_sample_freq = stride;
        self
    }

    /// Set the sampling limit.
    #[must_use]
    pub fn with_sampling_limit(mut self, limit: usize) -> Self {
        self.window_sampling_limit = limit;
        self
    }

    /// Set batch geometry.
    #[must_use]
    pub fn with_batching(mut self, n_series_per_batch: usize, batch_size: usize) -> Self {
        self.n_series_per_batch = n_series_per_batch;
        self.batch_size = batch_size;
        self
    }

    /// Set the completeness rules.
    #[must_use]
    pub fn with_completeness(mut self, complete_inputs: bool, complete_sample: bool) -> Self {
        self.complete_inputs = complete_inputs;
        self.complete_sample = complete_sample;
        self
    }

    /// Enable or disable batch-order shuffling.
    #[must_use]
    pub fn with_shuffle(mut self, shuffle: bool) -> Self {
        self.shuffle = shuffle;
        self
    }
}

/// Slices a [`WindowedDataset`] into `(input_size, output_size)`
/// windows and yields them as batched tensors.
///
/// Window starts are enumerated backwards from each series' end at the
/// configured stride, so the final window always touches the last row;
/// a window survives when its horizon intersects the dataset's sample
/// mask and it passes the completeness rules. Series left with zero
/// windows are dropped from this loader, not treated as fatal.
pub struct WindowLoader {
    dataset: WindowedDataset,
    config: WindowLoaderConfig,
    seed: Option<Seed>,
    /// (series index, window start) in series-major order.
    windows: Vec<(usize, usize)>,
    /// Window counts per surviving series, in series order.
    windows_per_series: Vec<(usize, usize)>,
    /// Batches as index lists into `windows`.
    batches: Vec<Vec<usize>>,
}

impl WindowLoader {
    /// Build a loader over a dataset.
    pub fn new(
        dataset: WindowedDataset,
        config: WindowLoaderConfig,
        seed: Option<Seed>,
    ) -> Result<Self> {
        if config.input_size == 0 || config.output_size == 0 {
            return Err(DataError::InvalidLoader(
                "input_size and output_size must be positive".to_string(),
            ));
        }
        if config.idx_to_sample_freq == 0 {
            return Err(DataError::InvalidLoader(
                "idx_to_sample_freq must be positive".to_string(),
            ));
        }
        if config.batch_size == 0 || config.n_series_per_batch == 0 {
            return Err(DataError::InvalidLoader(
                "batch_size and n_series_per_batch must be positive".to_string(),
            ));
        }

        let (windows, windows_per_series) = Self::enumerate_windows(&dataset, &config);
        if windows.is_empty() {
            return Err(DataError::EmptyDataset(format!(
                "no valid windows in the {} split",
                dataset.split()
            )));
        }
        let batches = Self::build_batches(&windows_per_series, &config);

        Ok(Self {
            dataset,
            config,
            seed,
            windows,
            windows_per_series,
            batches,
        })
    }

    fn enumerate_windows(
        dataset: &WindowedDataset,
        config: &WindowLoaderConfig,
    ) -> (Vec<(usize, usize)>, Vec<(usize, usize)>) {
        let l = config.input_size;
        let h = config.output_size;
        let total = l + h;

        let mut windows = Vec::new();
        let mut per_series = Vec::new();
        for (si, series) in dataset.all_series().iter().enumerate() {
            let t = series.len();
            if t < total {
                debug!(uid = %series.uid, len = t, "series shorter than one window, dropped");
                continue;
            }
            // Anchor strides at the series end so the last window
            // always covers the final rows; stop once the first
            // horizon step falls beyond the sampling limit.
            let min_start = t.saturating_sub(config.window_sampling_limit + l);
            let mut starts = Vec::new();
            let mut start = t - total;
            loop {
                starts.push(start);
                if start < min_start + config.idx_to_sample_freq || start < config.idx_to_sample_freq
                {
                    break;
                }
                start -= config.idx_to_sample_freq;
            }
            starts.reverse();

            let mut kept = 0;
            for &start in &starts {
                let horizon = start + l..start + total;
                let in_split = series.sample[horizon.clone()].iter().any(|&v| v != 0.0);
                if !in_split {
                    continue;
                }
                if config.complete_inputs
                    && series.available[start..start + l].iter().any(|&v| v == 0.0)
                {
                    continue;
                }
                if config.complete_sample {
                    let complete = horizon
                        .clone()
                        .all(|i| series.available[i] * series.sample[i] != 0.0);
                    if !complete {
                        continue;
                    }
                }
                windows.push((si, start));
                kept += 1;
            }
            if kept == 0 {
                debug!(uid = %series.uid, split = %dataset.split(), "series has no valid windows, dropped from split");
            } else {
                per_series.push((si, kept));
            }
        }
        (windows, per_series)
    }

    fn build_batches(
        windows_per_series: &[(usize, usize)],
        config: &WindowLoaderConfig,
    ) -> Vec<Vec<usize>> {
        // `windows` is series-major, so per-series counts give each
        // series' contiguous index range.
        let mut batches = Vec::new();
        let mut offset = 0;
        for group in windows_per_series.chunks(config.n_series_per_batch) {
            let group_total: usize = group.iter().map(|&(_, count)| count).sum();
            let group_indices: Vec<usize> = (offset..offset + group_total).collect();
            for chunk in group_indices.chunks(config.batch_size) {
                batches.push(chunk.to_vec());
            }
            offset += group_total;
        }
        batches
    }

    /// Total number of windows.
    #[must_use]
    pub fn n_windows(&self) -> usize {
        self.windows.len()
    }

    /// Number of batches per pass.
    #[must_use]
    pub fn n_batches(&self) -> usize {
        self.batches.len()
    }

    /// Window counts per surviving series, `(series index, count)`.
    #[must_use]
    pub fn windows_per_series(&self) -> &[(usize, usize)] {
        &self.windows_per_series
    }

    /// History length per window.
    #[must_use]
    pub fn input_size(&self) -> usize {
        self.config.input_size
    }

    /// Forecast horizon per window.
    #[must_use]
    pub fn output_size(&self) -> usize {
        self.config.output_size
    }

    /// The underlying dataset.
    #[must_use]
    pub fn dataset(&self) -> &WindowedDataset {
        &self.dataset
    }

    /// Iterate over batches as tensors on the given device.
    #[must_use]
    pub fn iter<'a, B: Backend>(&'a self, device: &B::Device) -> WindowBatchIter<'a, B> {
        WindowBatchIter::new(self, device.clone())
    }

    fn create_batch<B: Backend>(
        &self,
        indices: &[usize],
        device: &B::Device,
    ) -> Result<WindowBatch<B>> {
        let n = indices.len();
        let l = self.config.input_size;
        let h = self.config.output_size;
        let c = self.dataset.hist_channels();
        let f = self.dataset.futr_channels();
        let s_feat = self.dataset.stat_features();

        let mut insample_y = Array3::<f32>::zeros((n, l, 1));
        let mut insample_mask = Array3::<f32>::zeros((n, l, 1));
        let mut hist = (c > 0).then(|| Array4::<f32>::zeros((n, c, l, 1)));
        let mut futr = (f > 0).then(|| Array4::<f32>::zeros((n, f, l + h, 1)));
        let mut stat = (s_feat > 0).then(|| Array2::<f32>::zeros((n, s_feat)));
        let mut outsample_y = Array3::<f32>::zeros((n, l, h));
        let mut outsample_mask = Array3::<f32>::zeros((n, l, h));

        for (bi, &wi) in indices.iter().enumerate() {
            let (si, start) = self.windows[wi];
            let series = self.dataset.series(si);
            for t in 0..l {
                insample_y[[bi, t, 0]] = series.y[start + t];
                insample_mask[[bi, t, 0]] = series.available[start + t];
            }
            if let (Some(hist), Some(block)) = (hist.as_mut(), series.hist_exog.as_ref()) {
                for ch in 0..c {
                    for t in 0..l {
                        hist[[bi, ch, t, 0]] = block[[ch, start + t]];
                    }
                }
            }
            if let (Some(futr), Some(block)) = (futr.as_mut(), series.futr_exog.as_ref()) {
                for ch in 0..f {
                    for t in 0..l + h {
                        futr[[bi, ch, t, 0]] = block[[ch, start + t]];
                    }
                }
            }
            if let (Some(stat), Some(features)) = (stat.as_mut(), series.stat_exog.as_ref()) {
                for (j, &v) in features.iter().enumerate() {
                    stat[[bi, j]] = v;
                }
            }
            for t in 0..l {
                for tau in 0..h {
                    let idx = start + t + tau + 1;
                    outsample_y[[bi, t, tau]] = series.y[idx];
                    outsample_mask[[bi, t, tau]] = series.available[idx] * series.sample[idx];
                }
            }
        }

        let to_tensor3 = |a: Array3<f32>, dims: [usize; 3]| -> Tensor<B, 3> {
            let flat: Vec<f32> = a.iter().copied().collect();
            Tensor::<B, 1>::from_floats(flat.as_slice(), device).reshape(dims)
        };
        let to_tensor4 = |a: Array4<f32>, dims: [usize; 4]| -> Tensor<B, 4> {
            let flat: Vec<f32> = a.iter().copied().collect();
            Tensor::<B, 1>::from_floats(flat.as_slice(), device).reshape(dims)
        };

        let batch = WindowBatch {
            insample_y: to_tensor3(insample_y, [n, l, 1]),
            insample_mask: to_tensor3(insample_mask, [n, l, 1]),
            hist_exog: hist.map(|a| to_tensor4(a, [n, c, l, 1])),
            futr_exog: futr.map(|a| to_tensor4(a, [n, f, l + h, 1])),
            stat_exog: stat.map(|a| {
                let flat: Vec<f32> = a.iter().copied().collect();
                Tensor::<B, 1>::from_floats(flat.as_slice(), device).reshape([n, s_feat])
            }),
            outsample_y: to_tensor3(outsample_y, [n, l, h]),
            outsample_mask: to_tensor3(outsample_mask, [n, l, h]),
        };
        Ok(batch.validated()?)
    }
}

/// Iterator over a [`WindowLoader`]'s batches.
pub struct WindowBatchIter<'a, B: Backend> {
    loader: &'a WindowLoader,
    device: B::Device,
    order: Vec<usize>,
    pos: usize,
}

impl<'a, B: Backend> WindowBatchIter<'a, B> {
    fn new(loader: &'a WindowLoader, device: B::Device) -> Self {
        let mut order: Vec<usize> = (0..loader.batches.len()).collect();
        if loader.config.shuffle {
            let mut rng = loader.seed.unwrap_or_default().to_rng();
            order.shuffle(&mut rng);
        }
        Self {
            loader,
            device,
            order,
            pos: 0,
        }
    }
}

impl<'a, B: Backend> Iterator for WindowBatchIter<'a, B> {
    type Item = Result<WindowBatch<B>>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.pos >= self.order.len() {
            return None;
        }
        let batch_idx = self.order[self.pos];
        self.pos += 1;
        Some(
            self.loader
                .create_batch(&self.loader.batches[batch_idx], &self.device),
        )
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.order.len() - self.pos;
        (remaining, Some(remaining))
    }
}

impl<'a, B: Backend> ExactSizeIterator for WindowBatchIter<'a, B> {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mask::{fixed_split, MaskFrame};
    use crate::panel::PanelFrame;
    use panelcast_core::Split;

    type B = burn_ndarray::NdArray;

    fn panel(n_series: usize, len: usize) -> PanelFrame {
        let mut uid = Vec::new();
        let mut ds = Vec::new();
        let mut y = Vec::new();
        for s in 0..n_series {
            for t in 0..len {
                uid.push(format!("s{s}"));
                ds.push(t as i64);
                y.push((100 * s + t) as f32);
            }
        }
        PanelFrame::from_columns(uid, ds, y).unwrap()
    }

    fn split_dataset(
        panel: &PanelFrame,
        mask: &MaskFrame,
        split: Split,
    ) -> WindowedDataset {
        WindowedDataset::new(panel, None, None, &[], mask, split).unwrap()
    }

    #[test]
    fn test_test_loader_tiles_the_tail() {
        let panel = panel(3, 100);
        let (_, _, test) = fixed_split(&panel, 20, 10).unwrap();
        let ds = split_dataset(&panel, &test, Split::Test);
        let config = WindowLoaderConfig::new(20, 5).with_stride(5).with_batching(3, 8);
        let loader = WindowLoader::new(ds, config, None).unwrap();
        // Horizons [90, 95) and [95, 100) per series.
        assert_eq!(loader.n_windows(), 6);
        assert_eq!(loader.windows_per_series(), &[(0, 2), (1, 2), (2, 2)]);
    }

    #[test]
    fn test_train_loader_excludes_held_out_horizons() {
        let panel = panel(1, 100);
        let (train, _, _) = fixed_split(&panel, 20, 10).unwrap();
        let ds = split_dataset(&panel, &train, Split::Train);
        let config = WindowLoaderConfig::new(20, 5).with_stride(1);
        let loader = WindowLoader::new(ds, config, None).unwrap();
        // Train rows end at 69; last window with a horizon row in the
        // train region starts at 49 (horizon [69, 74)), the first at 0.
        assert_eq!(loader.n_windows(), 50);
    }

    #[test]
    fn test_complete_sample_rejects_partial_horizons() {
        let panel = panel(1, 100);
        let (train, _, _) = fixed_split(&panel, 20, 10).unwrap();
        let ds = split_dataset(&panel, &train, Split::Train);
        let config = WindowLoaderConfig::new(20, 5)
            .with_stride(1)
            .with_completeness(false, true);
        let loader = WindowLoader::new(ds, config, None).unwrap();
        // Horizon must lie fully inside the train region: starts 0..=45.
        assert_eq!(loader.n_windows(), 46);
    }

    #[test]
    fn test_complete_sample_never_yields_unavailable_horizon() {
        let panel = panel(1, 60);
        let (mut train, _, _) = fixed_split(&panel, 0, 10).unwrap();
        // Poke holes in the availability.
        for row in [20usize, 33, 41] {
            train.available[row] = 0.0;
        }
        let ds = split_dataset(&panel, &train, Split::Train);
        let config = WindowLoaderConfig::new(10, 5)
            .with_stride(1)
            .with_completeness(false, true);
        let loader = WindowLoader::new(ds, config, None).unwrap();
        let device = Default::default();
        for batch in loader.iter::<B>(&device) {
            let batch = batch.unwrap();
            let l = batch.input_size();
            let n = batch.batch_size();
            let h = batch.horizon();
            // The last input step's horizon is the window's horizon.
            let mask: Vec<f32> = batch
                .outsample_mask
                .slice([0..n, l - 1..l, 0..h])
                .into_data()
                .to_vec()
                .unwrap();
            assert!(mask.iter().all(|&v| v == 1.0));
        }
    }

    #[test]
    fn test_series_without_windows_is_dropped() {
        let mut uid: Vec<String> = Vec::new();
        let mut ds = Vec::new();
        let mut y = Vec::new();
        for t in 0..50 {
            uid.push("long".into());
            ds.push(t as i64);
            y.push(t as f32);
        }
        for t in 0..8 {
            uid.push("short".into());
            ds.push(t as i64);
            y.push(t as f32);
        }
        let panel = PanelFrame::from_columns(uid, ds, y).unwrap();
        let mut mask = MaskFrame::empty(panel.n_rows());
        mask.sample.iter_mut().for_each(|v| *v = 1.0);
        let dataset = split_dataset(&panel, &mask, Split::Train);
        let config = WindowLoaderConfig::new(10, 5).with_stride(1);
        let loader = WindowLoader::new(dataset, config, None).unwrap();
        // "short" (8 rows < 15) contributes nothing; the run continues.
        assert_eq!(loader.windows_per_series().len(), 1);
        assert!(loader.n_windows() > 0);
    }

    #[test]
    fn test_batch_tensor_shapes() {
        let panel = panel(2, 40);
        let mut mask = MaskFrame::empty(panel.n_rows());
        mask.sample.iter_mut().for_each(|v| *v = 1.0);
        let dataset = split_dataset(&panel, &mask, Split::Train);
        let config = WindowLoaderConfig::new(12, 3)
            .with_stride(4)
            .with_batching(2, 4);
        let loader = WindowLoader::new(dataset, config, None).unwrap();
        let device = Default::default();
        let mut total = 0;
        for batch in loader.iter::<B>(&device) {
            let batch = batch.unwrap();
            let n = batch.batch_size();
            assert!(n <= 4);
            assert_eq!(batch.insample_y.dims(), [n, 12, 1]);
            assert_eq!(batch.outsample_y.dims(), [n, 12, 3]);
            total += n;
        }
        assert_eq!(total, loader.n_windows());
    }

    #[test]
    fn test_shuffle_is_deterministic() {
        let panel = panel(4, 60);
        let mut mask = MaskFrame::empty(panel.n_rows());
        mask.sample.iter_mut().for_each(|v| *v = 1.0);
        let dataset = split_dataset(&panel, &mask, Split::Train);
        let config = WindowLoaderConfig::new(10, 5)
            .with_stride(2)
            .with_batching(2, 4)
            .with_shuffle(true);
        let loader = WindowLoader::new(dataset, config, Some(Seed::new(9))).unwrap();
        let device = Default::default();
        let sums = |loader: &WindowLoader| -> Vec<f32> {
            loader
                .iter::<B>(&device)
                .map(|b| b.unwrap().insample_y.sum().into_scalar())
                .collect()
        };
        assert_eq!(sums(&loader), sums(&loader));
    }

    #[test]
    fn test_forking_targets_line_up() {
        let panel = panel(1, 30);
        let mut mask = MaskFrame::empty(panel.n_rows());
        mask.sample.iter_mut().for_each(|v| *v = 1.0);
        let dataset = split_dataset(&panel, &mask, Split::Train);
        let config = WindowLoaderConfig::new(5, 2)
            .with_stride(100)
            .with_batching(1, 1);
        let loader = WindowLoader::new(dataset, config, None).unwrap();
        assert_eq!(loader.n_windows(), 1);
        let device = Default::default();
        let batch = loader.iter::<B>(&device).next().unwrap().unwrap();
        // The single window covers rows 23..30 (values 23..=29).
        let insample: Vec<f32> = batch.insample_y.into_data().to_vec().unwrap();
        assert_eq!(insample, vec![23.0, 24.0, 25.0, 26.0, 27.0]);
        let outsample: Vec<f32> = batch.outsample_y.into_data().to_vec().unwrap();
        // Row t of the forking targets holds y[t+1], y[t+2].
        assert_eq!(
            outsample,
            vec![24.0, 25.0, 25.0, 26.0, 26.0, 27.0, 27.0, 28.0, 28.0, 29.0]
        );
    }
}
