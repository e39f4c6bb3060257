//! Long-format panel tables.

use ndarray::{Array2, ArrayView1, ArrayViewMut1, Axis};

use crate::error::{DataError, Result};

/// Sort a long table's rows by (uid, ds) and return the permutation.
fn sort_permutation(uid: &[String], ds: &[i64]) -> Vec<usize> {
    let mut order: Vec<usize> = (0..uid.len()).collect();
    order.sort_by(|&a, &b| uid[a].cmp(&uid[b]).then(ds[a].cmp(&ds[b])));
    order
}

/// Compute per-series row ranges over a sorted uid column.
fn group_ranges(uid: &[String]) -> (Vec<String>, Vec<(usize, usize)>) {
    let mut ids = Vec::new();
    let mut ranges = Vec::new();
    let mut start = 0;
    for i in 1..=uid.len() {
        if i == uid.len() || uid[i] != uid[start] {
            ids.push(uid[start].clone());
            ranges.push((start, i));
            start = i;
        }
    }
    (ids, ranges)
}

/// The target table of a panel: one row per (series, timestamp).
///
/// Rows are sorted by (series id, timestamp) at construction and the
/// (uid, ds) key must be unique. Consecutive timestamps of a series are
/// assumed uniformly spaced at the panel's frequency.
#[derive(Debug, Clone)]
pub struct PanelFrame {
    uid: Vec<String>,
    ds: Vec<i64>,
    y: Vec<f32>,
    series_ids: Vec<String>,
    ranges: Vec<(usize, usize)>,
}

impl PanelFrame {
    /// Build a panel from its three columns.
    ///
    /// Rows may arrive in any order; they are sorted by (uid, ds).
    pub fn from_columns(uid: Vec<String>, ds: Vec<i64>, y: Vec<f32>) -> Result<Self> {
        if uid.len() != ds.len() || uid.len() != y.len() {
            return Err(DataError::ColumnMismatch(format!(
                "uid: {}, ds: {}, y: {}",
                uid.len(),
                ds.len(),
                y.len()
            )));
        }
        let order = sort_permutation(&uid, &ds);
        let uid: Vec<String> = order.iter().map(|&i| uid[i].clone()).collect();
        let ds: Vec<i64> = order.iter().map(|&i| ds[i]).collect();
        let y: Vec<f32> = order.iter().map(|&i| y[i]).collect();

        for i in 1..uid.len() {
            if uid[i] == uid[i - 1] && ds[i] == ds[i - 1] {
                return Err(DataError::DuplicateKey {
                    uid: uid[i].clone(),
                    ds: ds[i],
                });
            }
        }

        let (series_ids, ranges) = group_ranges(&uid);
        Ok(Self {
            uid,
            ds,
            y,
            series_ids,
            ranges,
        })
    }

    /// Total number of rows.
    #[must_use]
    pub fn n_rows(&self) -> usize {
        self.uid.len()
    }

    /// Number of distinct series.
    #[must_use]
    pub fn n_series(&self) -> usize {
        self.series_ids.len()
    }

    /// Distinct series ids in row order.
    #[must_use]
    pub fn series_ids(&self) -> &[String] {
        &self.series_ids
    }

    /// Row range `[start, end)` of the `i`-th series.
    #[must_use]
    pub fn series_range(&self, i: usize) -> (usize, usize) {
        self.ranges[i]
    }

    /// Length of the `i`-th series.
    #[must_use]
    pub fn series_len(&self, i: usize) -> usize {
        let (s, e) = self.ranges[i];
        e - s
    }

    /// Timestamps of the `i`-th series.
    #[must_use]
    pub fn ds_slice(&self, i: usize) -> &[i64] {
        let (s, e) = self.ranges[i];
        &self.ds[s..e]
    }

    /// Target values of the `i`-th series.
    #[must_use]
    pub fn y_slice(&self, i: usize) -> &[f32] {
        let (s, e) = self.ranges[i];
        &self.y[s..e]
    }

    /// The full target column in row order.
    #[must_use]
    pub fn y(&self) -> &[f32] {
        &self.y
    }

    /// Mutable access to the target column, for in-place scaling.
    pub fn y_mut(&mut self) -> &mut [f32] {
        &mut self.y
    }

    /// The full timestamp column in row order.
    #[must_use]
    pub fn ds(&self) -> &[i64] {
        &self.ds
    }

    /// The full uid column in row order.
    #[must_use]
    pub fn uid(&self) -> &[String] {
        &self.uid
    }
}

/// Exogenous feature table, aligned row-for-row with a [`PanelFrame`].
///
/// Feature columns are inferred positionally; which of them are
/// future-known is decided by name at dataset-build time.
#[derive(Debug, Clone)]
pub struct ExogFrame {
    uid: Vec<String>,
    ds: Vec<i64>,
    names: Vec<String>,
    /// Row-major `[n_rows, n_features]`.
    values: Array2<f32>,
}

impl ExogFrame {
    /// Build an exogenous table from its columns.
    pub fn from_columns(
        uid: Vec<String>,
        ds: Vec<i64>,
        names: Vec<String>,
        values: Array2<f32>,
    ) -> Result<Self> {
        if uid.len() != ds.len() || uid.len() != values.nrows() {
            return Err(DataError::ColumnMismatch(format!(
                "uid: {}, ds: {}, rows: {}",
                uid.len(),
                ds.len(),
                values.nrows()
            )));
        }
        if names.len() != values.ncols() {
            return Err(DataError::ColumnMismatch(format!(
                "{} names for {} feature columns",
                names.len(),
                values.ncols()
            )));
        }
        let order = sort_permutation(&uid, &ds);
        let uid: Vec<String> = order.iter().map(|&i| uid[i].clone()).collect();
        let ds: Vec<i64> = order.iter().map(|&i| ds[i]).collect();
        let values = values.select(Axis(0), &order);
        Ok(Self {
            uid,
            ds,
            names,
            values,
        })
    }

    /// Check this table lines up row-for-row with a panel.
    pub fn check_aligned(&self, panel: &PanelFrame) -> Result<()> {
        if self.uid.len() != panel.n_rows() {
            return Err(DataError::MaskMismatch {
                mask_rows: self.uid.len(),
                panel_rows: panel.n_rows(),
            });
        }
        let aligned = self
            .uid
            .iter()
            .zip(panel.uid())
            .all(|(a, b)| a == b)
            && self.ds.iter().zip(panel.ds()).all(|(a, b)| a == b);
        if !aligned {
            return Err(DataError::ColumnMismatch(
                "exogenous table keys do not match the panel".to_string(),
            ));
        }
        Ok(())
    }

    /// Feature column names.
    #[must_use]
    pub fn names(&self) -> &[String] {
        &self.names
    }

    /// Number of feature columns.
    #[must_use]
    pub fn n_features(&self) -> usize {
        self.names.len()
    }

    /// A feature column by index.
    #[must_use]
    pub fn column(&self, j: usize) -> ArrayView1<'_, f32> {
        self.values.column(j)
    }

    /// Mutable view of a feature column, for in-place scaling.
    pub fn column_mut(&mut self, j: usize) -> ArrayViewMut1<'_, f32> {
        self.values.column_mut(j)
    }

    /// Feature rows `[start, end)`, shape `[rows, n_features]`.
    #[must_use]
    pub fn rows(&self, start: usize, end: usize) -> ndarray::ArrayView2<'_, f32> {
        self.values.slice(ndarray::s![start..end, ..])
    }
}

/// Static feature table: one row per series.
#[derive(Debug, Clone)]
pub struct StaticFrame {
    uids: Vec<String>,
    names: Vec<String>,
    /// `[n_series, n_features]`.
    values: Array2<f32>,
}

impl StaticFrame {
    /// Build a static table from its columns.
    pub fn from_columns(uids: Vec<String>, names: Vec<String>, values: Array2<f32>) -> Result<Self> {
        if uids.len() != values.nrows() {
            return Err(DataError::ColumnMismatch(format!(
                "{} uids for {} rows",
                uids.len(),
                values.nrows()
            )));
        }
        if names.len() != values.ncols() {
            return Err(DataError::ColumnMismatch(format!(
                "{} names for {} feature columns",
                names.len(),
                values.ncols()
            )));
        }
        Ok(Self {
            uids,
            names,
            values,
        })
    }

    /// Number of static features.
    #[must_use]
    pub fn n_features(&self) -> usize {
        self.names.len()
    }

    /// The static feature vector of a series, by id.
    pub fn features_of(&self, uid: &str) -> Result<Vec<f32>> {
        let i = self
            .uids
            .iter()
            .position(|u| u == uid)
            .ok_or_else(|| DataError::MissingSeries(uid.to_string(), "static table".to_string()))?;
        Ok(self.values.row(i).to_vec())
    }
}
