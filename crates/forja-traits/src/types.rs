//! Common types used throughout the Forja framework.
//!
//! This module defines the panel containers that expressions are evaluated
//! against: a [`Panel`] holds every input column of a mining run on a shared
//! time × asset grid, and a [`Frame`] is a single labelled matrix such as a
//! factor, a return panel or a forward-return label.

use crate::{ForjaError, Result};
use ndarray::Array2;
use std::collections::{BTreeMap, HashMap, HashSet};

/// Row key of every panel matrix.
pub type Timestamp = chrono::NaiveDateTime;

/// An asset identifier.
///
/// Typically a ticker or exchange symbol such as "BTCUSDT" or "AAPL".
pub type AssetId = String;

/// Name of the mandatory price column.
pub const CLOSE_COLUMN: &str = "Close";

/// Name of the mandatory realized-return column.
pub const RETURN_COLUMN: &str = "return";

/// A single time × asset matrix with its axis labels.
///
/// Rows follow `index`, columns follow `assets`. Missing observations are
/// stored as NaN.
#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    index: Vec<Timestamp>,
    assets: Vec<AssetId>,
    values: Array2<f64>,
}

/// Two frames restricted to their common timestamps and assets.
#[derive(Debug, Clone)]
pub struct Aligned {
    /// Common timestamps, in the order of the left frame.
    pub index: Vec<Timestamp>,
    /// Common assets, in the order of the left frame.
    pub assets: Vec<AssetId>,
    /// Left-hand values on the common grid.
    pub left: Array2<f64>,
    /// Right-hand values on the common grid.
    pub right: Array2<f64>,
}

impl Frame {
    /// Creates a frame, checking that `values` matches the axis lengths.
    pub fn new(index: Vec<Timestamp>, assets: Vec<AssetId>, values: Array2<f64>) -> Result<Self> {
        if values.dim() != (index.len(), assets.len()) {
            return Err(ForjaError::ShapeMismatch(format!(
                "frame values have shape {:?}, axes imply ({}, {})",
                values.dim(),
                index.len(),
                assets.len()
            )));
        }
        Ok(Self {
            index,
            assets,
            values,
        })
    }

    /// Returns the row index.
    pub fn index(&self) -> &[Timestamp] {
        &self.index
    }

    /// Returns the asset identifiers.
    pub fn assets(&self) -> &[AssetId] {
        &self.assets
    }

    /// Returns the underlying matrix.
    pub const fn values(&self) -> &Array2<f64> {
        &self.values
    }

    /// Consumes the frame and returns the underlying matrix.
    pub fn into_values(self) -> Array2<f64> {
        self.values
    }

    /// Number of timestamps.
    pub fn n_rows(&self) -> usize {
        self.index.len()
    }

    /// Number of assets.
    pub fn n_assets(&self) -> usize {
        self.assets.len()
    }

    /// Fraction of cells holding a finite value, in `[0, 1]`.
    ///
    /// An empty frame has zero coverage.
    pub fn finite_fraction(&self) -> f64 {
        finite_fraction(&self.values)
    }

    /// Shifts values along the time axis.
    ///
    /// A positive `periods` lags the data (row `t` receives row `t - periods`),
    /// a negative one leads it. Vacated rows are NaN.
    pub fn shift(&self, periods: isize) -> Self {
        let (rows, cols) = self.values.dim();
        let mut out = Array2::from_elem((rows, cols), f64::NAN);
        for t in 0..rows {
            let src = t as isize - periods;
            if src >= 0 && (src as usize) < rows {
                out.row_mut(t).assign(&self.values.row(src as usize));
            }
        }
        Self {
            index: self.index.clone(),
            assets: self.assets.clone(),
            values: out,
        }
    }

    /// Restricts `self` and `other` to their common timestamps and assets.
    ///
    /// The result keeps the ordering of `self`.
    pub fn align(&self, other: &Self) -> Aligned {
        let other_rows: HashMap<&Timestamp, usize> =
            other.index.iter().enumerate().map(|(i, t)| (t, i)).collect();
        let other_cols: HashMap<&str, usize> = other
            .assets
            .iter()
            .enumerate()
            .map(|(j, a)| (a.as_str(), j))
            .collect();

        let rows: Vec<(usize, usize)> = self
            .index
            .iter()
            .enumerate()
            .filter_map(|(i, t)| other_rows.get(t).map(|&k| (i, k)))
            .collect();
        let cols: Vec<(usize, usize)> = self
            .assets
            .iter()
            .enumerate()
            .filter_map(|(j, a)| other_cols.get(a.as_str()).map(|&k| (j, k)))
            .collect();

        let mut left = Array2::from_elem((rows.len(), cols.len()), f64::NAN);
        let mut right = Array2::from_elem((rows.len(), cols.len()), f64::NAN);
        for (r, &(i, k)) in rows.iter().enumerate() {
            for (c, &(j, l)) in cols.iter().enumerate() {
                left[[r, c]] = self.values[[i, j]];
                right[[r, c]] = other.values[[k, l]];
            }
        }

        Aligned {
            index: rows.iter().map(|&(i, _)| self.index[i]).collect(),
            assets: cols.iter().map(|&(j, _)| self.assets[j].clone()).collect(),
            left,
            right,
        }
    }
}

/// Fraction of finite cells in a matrix; zero for an empty matrix.
pub fn finite_fraction(values: &Array2<f64>) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let finite = values.iter().filter(|v| v.is_finite()).count();
    finite as f64 / values.len() as f64
}

/// A factor produced by evaluating an expression.
///
/// `raw_coverage` is measured before any post-processing fills missing cells,
/// so that normalized factors still report how much of the grid the raw
/// expression actually covered.
#[derive(Debug, Clone)]
pub struct FactorPanel {
    frame: Frame,
    raw_coverage: f64,
}

impl FactorPanel {
    /// Wraps a frame with its pre-processing coverage.
    pub const fn new(frame: Frame, raw_coverage: f64) -> Self {
        Self {
            frame,
            raw_coverage,
        }
    }

    /// Wraps a raw frame; coverage is measured from the frame itself.
    pub fn from_raw(frame: Frame) -> Self {
        let raw_coverage = frame.finite_fraction();
        Self {
            frame,
            raw_coverage,
        }
    }

    /// The factor values.
    pub const fn frame(&self) -> &Frame {
        &self.frame
    }

    /// Coverage of the expression output before post-processing.
    pub const fn raw_coverage(&self) -> f64 {
        self.raw_coverage
    }

    /// Consumes the panel and returns the frame.
    pub fn into_frame(self) -> Frame {
        self.frame
    }
}

/// Input data of a mining run.
///
/// All feature columns and label columns share one time index and one asset
/// list. Label columns hold forward-looking data and are kept in a separate
/// map so that they can never be exposed as expression terminals.
#[derive(Debug, Clone)]
pub struct Panel {
    index: Vec<Timestamp>,
    assets: Vec<AssetId>,
    columns: BTreeMap<String, Array2<f64>>,
    labels: BTreeMap<String, Array2<f64>>,
}

impl Panel {
    /// Creates an empty panel over the given axes.
    ///
    /// Timestamps must be strictly increasing and asset identifiers unique.
    pub fn new(index: Vec<Timestamp>, assets: Vec<AssetId>) -> Result<Self> {
        if index.windows(2).any(|w| w[0] >= w[1]) {
            return Err(ForjaError::InvalidData(
                "panel index must be strictly increasing".to_string(),
            ));
        }
        let mut seen = HashSet::with_capacity(assets.len());
        if let Some(dup) = assets.iter().find(|a| !seen.insert(a.as_str())) {
            return Err(ForjaError::InvalidData(format!("duplicate asset: {dup}")));
        }
        Ok(Self {
            index,
            assets,
            columns: BTreeMap::new(),
            labels: BTreeMap::new(),
        })
    }

    /// Adds a feature column, consuming and returning the panel.
    pub fn with_column(mut self, name: impl Into<String>, values: Array2<f64>) -> Result<Self> {
        self.insert_column(name, values)?;
        Ok(self)
    }

    /// Adds a label column, consuming and returning the panel.
    pub fn with_label(mut self, name: impl Into<String>, values: Array2<f64>) -> Result<Self> {
        self.insert_label(name, values)?;
        Ok(self)
    }

    /// Inserts or replaces a feature column.
    pub fn insert_column(&mut self, name: impl Into<String>, values: Array2<f64>) -> Result<()> {
        let name = name.into();
        self.check_shape(&name, &values)?;
        self.columns.insert(name, values);
        Ok(())
    }

    /// Inserts or replaces a label column.
    pub fn insert_label(&mut self, name: impl Into<String>, values: Array2<f64>) -> Result<()> {
        let name = name.into();
        self.check_shape(&name, &values)?;
        self.labels.insert(name, values);
        Ok(())
    }

    fn check_shape(&self, name: &str, values: &Array2<f64>) -> Result<()> {
        let expected = self.shape();
        if values.dim() != expected {
            return Err(ForjaError::ShapeMismatch(format!(
                "column {name} has shape {:?}, panel is {expected:?}",
                values.dim()
            )));
        }
        Ok(())
    }

    /// Returns the shared time index.
    pub fn index(&self) -> &[Timestamp] {
        &self.index
    }

    /// Returns the shared asset list.
    pub fn assets(&self) -> &[AssetId] {
        &self.assets
    }

    /// `(timestamps, assets)`.
    pub fn shape(&self) -> (usize, usize) {
        (self.index.len(), self.assets.len())
    }

    /// Returns whether the panel has no rows.
    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    /// Gets a feature column by name.
    pub fn column(&self, name: &str) -> Option<&Array2<f64>> {
        self.columns.get(name)
    }

    /// Gets a label column by name.
    pub fn label(&self, name: &str) -> Option<&Array2<f64>> {
        self.labels.get(name)
    }

    /// Checks if a feature column exists.
    pub fn has_column(&self, name: &str) -> bool {
        self.columns.contains_key(name)
    }

    /// Feature column names in sorted order.
    pub fn column_names(&self) -> Vec<String> {
        self.columns.keys().cloned().collect()
    }

    /// Label column names in sorted order.
    pub fn label_names(&self) -> Vec<String> {
        self.labels.keys().cloned().collect()
    }

    /// Copies a feature column out as a [`Frame`].
    pub fn column_frame(&self, name: &str) -> Option<Frame> {
        self.columns.get(name).map(|v| self.frame_of(v.clone()))
    }

    /// Copies a label column out as a [`Frame`].
    pub fn label_frame(&self, name: &str) -> Option<Frame> {
        self.labels.get(name).map(|v| self.frame_of(v.clone()))
    }

    /// Wraps a matrix shaped like this panel into a [`Frame`].
    ///
    /// The caller guarantees the shape; evaluation results always have it.
    pub fn frame_of(&self, values: Array2<f64>) -> Frame {
        Frame {
            index: self.index.clone(),
            assets: self.assets.clone(),
            values,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use ndarray::array;

    fn ts(day: u32) -> Timestamp {
        NaiveDate::from_ymd_opt(2024, 1, day)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap()
    }

    #[test]
    fn test_panel_new_rejects_unsorted_index() {
        let result = Panel::new(vec![ts(2), ts(1)], vec!["A".into()]);
        assert!(matches!(result, Err(ForjaError::InvalidData(_))));
    }

    #[test]
    fn test_panel_new_rejects_duplicate_assets() {
        let result = Panel::new(vec![ts(1)], vec!["A".into(), "A".into()]);
        assert!(matches!(result, Err(ForjaError::InvalidData(_))));
    }

    #[test]
    fn test_panel_columns_and_labels() {
        let panel = Panel::new(vec![ts(1), ts(2)], vec!["A".into(), "B".into()])
            .unwrap()
            .with_column("Close", array![[1.0, 2.0], [3.0, 4.0]])
            .unwrap()
            .with_label("label_1", array![[0.1, 0.2], [0.3, 0.4]])
            .unwrap();

        assert!(panel.has_column("Close"));
        assert!(!panel.has_column("label_1"));
        assert_eq!(panel.column_names(), vec!["Close".to_string()]);
        assert_eq!(panel.label_names(), vec!["label_1".to_string()]);
        assert_eq!(panel.shape(), (2, 2));
    }

    #[test]
    fn test_panel_shape_mismatch() {
        let mut panel = Panel::new(vec![ts(1), ts(2)], vec!["A".into()]).unwrap();
        let result = panel.insert_column("Close", array![[1.0, 2.0]]);
        assert!(matches!(result, Err(ForjaError::ShapeMismatch(_))));
    }

    #[test]
    fn test_frame_shift() {
        let frame = Frame::new(
            vec![ts(1), ts(2), ts(3)],
            vec!["A".into()],
            array![[1.0], [2.0], [3.0]],
        )
        .unwrap();

        let lagged = frame.shift(1);
        assert!(lagged.values()[[0, 0]].is_nan());
        assert_eq!(lagged.values()[[1, 0]], 1.0);

        let led = frame.shift(-1);
        assert_eq!(led.values()[[0, 0]], 2.0);
        assert!(led.values()[[2, 0]].is_nan());
    }

    #[test]
    fn test_frame_align_intersects_axes() {
        let a = Frame::new(
            vec![ts(1), ts(2), ts(3)],
            vec!["A".into(), "B".into()],
            array![[1.0, 2.0], [3.0, 4.0], [5.0, 6.0]],
        )
        .unwrap();
        let b = Frame::new(
            vec![ts(2), ts(3), ts(4)],
            vec!["B".into(), "C".into()],
            array![[10.0, 11.0], [12.0, 13.0], [14.0, 15.0]],
        )
        .unwrap();

        let aligned = a.align(&b);
        assert_eq!(aligned.index, vec![ts(2), ts(3)]);
        assert_eq!(aligned.assets, vec!["B".to_string()]);
        assert_eq!(aligned.left, array![[4.0], [6.0]]);
        assert_eq!(aligned.right, array![[10.0], [12.0]]);
    }

    #[test]
    fn test_finite_fraction() {
        let frame = Frame::new(
            vec![ts(1), ts(2)],
            vec!["A".into(), "B".into()],
            array![[1.0, f64::NAN], [f64::INFINITY, 4.0]],
        )
        .unwrap();
        assert_eq!(frame.finite_fraction(), 0.5);
        assert_eq!(finite_fraction(&Array2::zeros((0, 0))), 0.0);
    }
}
