//! Per-series windowed dataset.

use ndarray::Array2;

use panelcast_core::Split;

use crate::error::{DataError, Result};
use crate::mask::MaskFrame;
use crate::panel::{ExogFrame, PanelFrame, StaticFrame};

/// One series' slice of a windowed dataset.
#[derive(Debug, Clone)]
pub struct SeriesData {
    /// Series identifier.
    pub uid: String,
    /// Scaled target values over the series' own time axis.
    pub y: Vec<f32>,
    /// Availability flags, aligned with `y`.
    pub available: Vec<f32>,
    /// Sample flags for this dataset's split, aligned with `y`.
    pub sample: Vec<f32>,
    /// Historic exogenous channels, `[C, T]`.
    pub hist_exog: Option<Array2<f32>>,
    /// Future-known exogenous channels, `[F, T]`.
    pub futr_exog: Option<Array2<f32>>,
    /// Static features, `[S]`.
    pub stat_exog: Option<Vec<f32>>,
}

impl SeriesData {
    /// Length of the series.
    #[must_use]
    pub fn len(&self) -> usize {
        self.y.len()
    }

    /// Whether the series has no rows.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.y.is_empty()
    }
}

/// A panel regrouped per series, carrying one split's masks.
///
/// Holds ragged per-series sequences of the (already scaled) target,
/// exogenous blocks and static vector, plus the availability and
/// sample flags the loader's completeness rules are checked against.
#[derive(Debug, Clone)]
pub struct WindowedDataset {
    series: Vec<SeriesData>,
    hist_channels: usize,
    futr_channels: usize,
    stat_features: usize,
    split: Split,
}

impl WindowedDataset {
    /// Regroup a panel, its optional feature tables and one split mask.
    ///
    /// `f_cols` names the exogenous columns that are known through the
    /// horizon; remaining exogenous columns are treated as historic.
    pub fn new(
        panel: &PanelFrame,
        exog: Option<&ExogFrame>,
        stat: Option<&StaticFrame>,
        f_cols: &[String],
        mask: &MaskFrame,
        split: Split,
    ) -> Result<Self> {
        mask.check_aligned(panel)?;
        let (hist_cols, futr_cols) = match exog {
            Some(exog) => {
                exog.check_aligned(panel)?;
                let mut hist = Vec::new();
                let mut futr = Vec::new();
                for (j, name) in exog.names().iter().enumerate() {
                    if f_cols.contains(name) {
                        futr.push(j);
                    } else {
                        hist.push(j);
                    }
                }
                (hist, futr)
            }
            None => (Vec::new(), Vec::new()),
        };

        let mut series = Vec::with_capacity(panel.n_series());
        for i in 0..panel.n_series() {
            let uid = panel.series_ids()[i].clone();
            let (start, end) = panel.series_range(i);
            let len = end - start;

            let block = |cols: &[usize]| -> Option<Array2<f32>> {
                let exog = exog?;
                if cols.is_empty() {
                    return None;
                }
                let rows = exog.rows(start, end);
                let mut out = Array2::zeros((cols.len(), len));
                for (c, &j) in cols.iter().enumerate() {
                    for t in 0..len {
                        out[[c, t]] = rows[[t, j]];
                    }
                }
                Some(out)
            };

            let stat_exog = match stat {
                Some(stat) if stat.n_features() > 0 => Some(stat.features_of(&uid)?),
                _ => None,
            };

            series.push(SeriesData {
                uid,
                y: panel.y_slice(i).to_vec(),
                available: mask.available[start..end].to_vec(),
                sample: mask.sample[start..end].to_vec(),
                hist_exog: block(&hist_cols),
                futr_exog: block(&futr_cols),
                stat_exog,
            });
        }

        Ok(Self {
            series,
            hist_channels: hist_cols.len(),
            futr_channels: futr_cols.len(),
            stat_features: stat.map_or(0, StaticFrame::n_features),
            split,
        })
    }

    /// Number of series.
    #[must_use]
    pub fn n_series(&self) -> usize {
        self.series.len()
    }

    /// Access a series by index.
    #[must_use]
    pub fn series(&self, i: usize) -> &SeriesData {
        &self.series[i]
    }

    /// All series.
    #[must_use]
    pub fn all_series(&self) -> &[SeriesData] {
        &self.series
    }

    /// Number of historic exogenous channels.
    #[must_use]
    pub fn hist_channels(&self) -> usize {
        self.hist_channels
    }

    /// Number of future-known exogenous channels.
    #[must_use]
    pub fn futr_channels(&self) -> usize {
        self.futr_channels
    }

    /// Number of static features.
    #[must_use]
    pub fn stat_features(&self) -> usize {
        self.stat_features
    }

    /// The split this dataset's sample mask belongs to.
    #[must_use]
    pub fn split(&self) -> Split {
        self.split
    }

    /// Total positive sample flags across all series.
    #[must_use]
    pub fn sample_count(&self) -> usize {
        self.series
            .iter()
            .map(|s| s.sample.iter().filter(|&&v| v != 0.0).count())
            .sum()
    }
}

impl std::fmt::Display for WindowedDataset {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "WindowedDataset[{}]: {} series, {} sampled rows, exog {}+{}, static {}",
            self.split,
            self.n_series(),
            self.sample_count(),
            self.hist_channels,
            self.futr_channels,
            self.stat_features,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mask::fixed_split;
    use ndarray::Array2;

    fn toy_panel() -> PanelFrame {
        let mut uid = Vec::new();
        let mut ds = Vec::new();
        let mut y = Vec::new();
        for s in 0..2 {
            for t in 0..30 {
                uid.push(format!("s{s}"));
                ds.push(t);
                y.push(t as f32);
            }
        }
        PanelFrame::from_columns(uid, ds, y).unwrap()
    }

    fn toy_exog(panel: &PanelFrame) -> ExogFrame {
        let n = panel.n_rows();
        let values = Array2::from_shape_fn((n, 2), |(i, j)| (i * 2 + j) as f32);
        ExogFrame::from_columns(
            panel.uid().to_vec(),
            panel.ds().to_vec(),
            vec!["price".into(), "holiday".into()],
            values,
        )
        .unwrap()
    }

    #[test]
    fn test_dataset_splits_exog_by_name() {
        let panel = toy_panel();
        let exog = toy_exog(&panel);
        let (train, _, _) = fixed_split(&panel, 5, 5).unwrap();
        let ds = WindowedDataset::new(
            &panel,
            Some(&exog),
            None,
            &["holiday".to_string()],
            &train,
            Split::Train,
        )
        .unwrap();

        assert_eq!(ds.hist_channels(), 1);
        assert_eq!(ds.futr_channels(), 1);
        assert_eq!(ds.stat_features(), 0);
        let s0 = ds.series(0);
        assert_eq!(s0.hist_exog.as_ref().unwrap().shape(), &[1, 30]);
        assert_eq!(s0.futr_exog.as_ref().unwrap().shape(), &[1, 30]);
        // "price" is column 0, "holiday" column 1.
        assert_eq!(s0.hist_exog.as_ref().unwrap()[[0, 0]], 0.0);
        assert_eq!(s0.futr_exog.as_ref().unwrap()[[0, 0]], 1.0);
    }

    #[test]
    fn test_dataset_carries_split_mask() {
        let panel = toy_panel();
        let (_, val, _) = fixed_split(&panel, 5, 5).unwrap();
        let ds = WindowedDataset::new(&panel, None, None, &[], &val, Split::Valid)
            .unwrap();
        assert_eq!(ds.sample_count(), 10);
        let s0 = ds.series(0);
        assert_eq!(s0.sample[19], 0.0);
        assert_eq!(s0.sample[20], 1.0);
        assert_eq!(s0.sample[24], 1.0);
        assert_eq!(s0.sample[25], 0.0);
    }

    #[test]
    fn test_dataset_missing_static_series() {
        let panel = toy_panel();
        let stat = StaticFrame::from_columns(
            vec!["s0".into()],
            vec!["size".into()],
            Array2::zeros((1, 1)),
        )
        .unwrap();
        let (train, _, _) = fixed_split(&panel, 5, 5).unwrap();
        let res = WindowedDataset::new(&panel, None, Some(&stat), &[], &train, Split::Train);
        assert!(matches!(res, Err(DataError::MissingSeries(_, _))));
    }
}
