//! Train/validation/test split masks over a panel.

use std::collections::BTreeSet;

use rand::seq::SliceRandom;

use panelcast_core::{Frequency, Seed};

use crate::error::{DataError, Result};
use crate::panel::PanelFrame;

/// Per-row availability and sample flags, aligned with a panel.
///
/// `available` marks rows whose target was actually observed; `sample`
/// marks rows eligible for loss computation in this mask's split. The
/// three split masks of a panel partition it: their sample flags are
/// pairwise disjoint and cover every row.
#[derive(Debug, Clone)]
pub struct MaskFrame {
    /// 1.0 where the row's target was observed.
    pub available: Vec<f32>,
    /// 1.0 where the row participates in this split.
    pub sample: Vec<f32>,
}

impl MaskFrame {
    /// A mask with everything available and nothing sampled.
    #[must_use]
    pub fn empty(n_rows: usize) -> Self {
        Self {
            available: vec![1.0; n_rows],
            sample: vec![0.0; n_rows],
        }
    }

    /// Number of rows.
    #[must_use]
    pub fn n_rows(&self) -> usize {
        self.sample.len()
    }

    /// Count of positive sample flags.
    #[must_use]
    pub fn sample_count(&self) -> usize {
        self.sample.iter().filter(|&&v| v != 0.0).count()
    }

    /// Check the mask lines up with a panel.
    pub fn check_aligned(&self, panel: &PanelFrame) -> Result<()> {
        if self.sample.len() != panel.n_rows() || self.available.len() != panel.n_rows() {
            return Err(DataError::MaskMismatch {
                mask_rows: self.sample.len(),
                panel_rows: panel.n_rows(),
            });
        }
        Ok(())
    }
}

/// Partition a panel by cutting a fixed tail off every series.
///
/// Per series: the last `ds_in_test` rows are flagged test, the
/// `ds_in_val` rows before them validation, everything earlier train.
///
/// Fails if any series is shorter than `ds_in_val + ds_in_test`.
pub fn fixed_split(
    panel: &PanelFrame,
    ds_in_val: usize,
    ds_in_test: usize,
) -> Result<(MaskFrame, MaskFrame, MaskFrame)> {
    let n = panel.n_rows();
    let mut train = MaskFrame::empty(n);
    let mut val = MaskFrame::empty(n);
    let mut test = MaskFrame::empty(n);

    let held_out = ds_in_val + ds_in_test;
    for i in 0..panel.n_series() {
        let (start, end) = panel.series_range(i);
        let len = end - start;
        if held_out > len {
            return Err(DataError::SplitTooLarge {
                uid: panel.series_ids()[i].clone(),
                length: len,
                requested: held_out,
            });
        }
        for row in start..end - held_out {
            train.sample[row] = 1.0;
        }
        for row in end - held_out..end - ds_in_test {
            val.sample[row] = 1.0;
        }
        for row in end - ds_in_test..end {
            test.sample[row] = 1.0;
        }
    }
    Ok((train, val, test))
}

/// Partition a panel with a fixed test tail and randomized validation
/// windows.
///
/// The test mask equals [`fixed_split`] with `ds_in_val = 0`. The
/// validation mask is built from a generator seeded with `seed`
/// (independent of any model seed): `n_val_series` series are drawn
/// without replacement, `n_val_windows` start timestamps are drawn from
/// the timestamps outside every series' test tail, and each start is
/// materialized as `window_len` consecutive ticks at `freq`. Rows at
/// the intersection of (drawn series × materialized timestamps) move
/// from train to validation. Overlapping windows stay flagged once;
/// rows falling in a series' test tail are left untouched, so the
/// validation mask never intersects the test mask.
#[allow(clippy::too_many_arguments)]
pub fn random_split(
    panel: &PanelFrame,
    ds_in_test: usize,
    n_val_series: usize,
    n_val_windows: usize,
    window_len: usize,
    freq: Frequency,
    seed: Seed,
) -> Result<(MaskFrame, MaskFrame, MaskFrame)> {
    let (mut train, mut val, test) = fixed_split(panel, 0, ds_in_test)?;
    debug_assert_eq!(val.sample_count(), 0);

    let mut rng = seed.to_rng();

    let n_series = panel.n_series();
    if n_val_series > n_series {
        return Err(DataError::NotEnoughCandidates {
            what: "series".to_string(),
            requested: n_val_series,
            available: n_series,
        });
    }
    let mut series_idx: Vec<usize> = (0..n_series).collect();
    series_idx.shuffle(&mut rng);
    series_idx.truncate(n_val_series);

    // Start candidates: every timestamp seen outside a test tail.
    let mut candidates: BTreeSet<i64> = BTreeSet::new();
    for i in 0..n_series {
        let ds = panel.ds_slice(i);
        let cut = ds.len() - ds_in_test;
        candidates.extend(&ds[..cut]);
    }
    let candidates: Vec<i64> = candidates.into_iter().collect();
    if n_val_windows > candidates.len() {
        return Err(DataError::NotEnoughCandidates {
            what: "window start timestamps".to_string(),
            requested: n_val_windows,
            available: candidates.len(),
        });
    }
    let starts: Vec<i64> = candidates
        .choose_multiple(&mut rng, n_val_windows)
        .copied()
        .collect();

    // Materialize the windows and flip matching rows from train to val.
    let tick = freq.tick_seconds();
    let val_ds: BTreeSet<i64> = starts
        .iter()
        .flat_map(|&s| (0..window_len as i64).map(move |k| s + k * tick))
        .collect();

    for &i in &series_idx {
        let (start, _) = panel.series_range(i);
        let ds = panel.ds_slice(i);
        for (offset, stamp) in ds.iter().enumerate() {
            let row = start + offset;
            if val_ds.contains(stamp) && test.sample[row] == 0.0 {
                train.sample[row] = 0.0;
                val.sample[row] = 1.0;
            }
        }
    }

    Ok((train, val, test))
}
