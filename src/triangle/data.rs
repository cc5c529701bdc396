//! Triangle storage: a 4-D loss array with index, origin and development metadata

use chrono::{Datelike, Months, NaiveDate};
use ndarray::{Array1, Array3, Array4, ArrayView3, Axis};
use serde::Serialize;

use super::adjustments::{OnLevelFactor, TrendAdjustment};
use crate::error::{Error, Result};

/// Development age given to the single column of ultimate-level arrays
pub const ULTIMATE_AGE: u32 = 9999;

/// Row labels of a triangle: named index levels with one label per level per row
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IndexFrame {
    names: Vec<String>,
    rows: Vec<Vec<String>>,
}

impl IndexFrame {
    /// Create an index from level names and per-row labels
    pub fn new(names: Vec<String>, rows: Vec<Vec<String>>) -> Result<Self> {
        if let Some((i, row)) = rows.iter().enumerate().find(|(_, r)| r.len() != names.len()) {
            return Err(Error::InvalidTriangle(format!(
                "index row {} has {} labels, expected {}",
                i,
                row.len(),
                names.len()
            )));
        }
        Ok(Self { names, rows })
    }

    /// A single unlabelled row, for portfolio-level triangles
    pub fn single() -> Self {
        Self {
            names: Vec::new(),
            rows: vec![Vec::new()],
        }
    }

    /// One index level with a label per row
    pub fn from_labels(name: &str, labels: &[&str]) -> Self {
        Self {
            names: vec![name.to_string()],
            rows: labels.iter().map(|l| vec![l.to_string()]).collect(),
        }
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn rows(&self) -> &[Vec<String>] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Position of a named level
    pub fn level_position(&self, name: &str) -> Result<usize> {
        self.names
            .iter()
            .position(|n| n == name)
            .ok_or_else(|| Error::UnknownIndexLevel(name.to_string()))
    }
}

/// Loss or exposure triangle
///
/// Values are indexed by (index row, value column, origin period, development
/// period). Missing cells hold `NaN`. Every transformation returns a new
/// triangle; the source values are never written to.
#[derive(Debug, Clone, Serialize)]
pub struct Triangle {
    values: Array4<f64>,
    index: IndexFrame,
    columns: Vec<String>,
    /// Origin period start dates
    origin: Vec<NaiveDate>,
    /// Length of each origin period in months
    origin_grain: u32,
    /// Development ages in months
    development: Vec<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    trend: Option<TrendAdjustment>,
    #[serde(skip_serializing_if = "Option::is_none")]
    olf: Option<OnLevelFactor>,
}

impl Triangle {
    /// Create a triangle, checking that the labels describe the value array
    pub fn new(
        values: Array4<f64>,
        index: IndexFrame,
        columns: Vec<String>,
        origin: Vec<NaiveDate>,
        origin_grain: u32,
        development: Vec<u32>,
    ) -> Result<Self> {
        let labelled = (index.len(), columns.len(), origin.len(), development.len());
        if values.dim() != labelled {
            return Err(Error::ShapeMismatch(format!(
                "values are {:?} but labels describe {:?}",
                values.dim(),
                labelled
            )));
        }
        if values.is_empty() {
            return Err(Error::InvalidTriangle(
                "at least one row, column, origin and development period is required".into(),
            ));
        }
        if origin_grain == 0 {
            return Err(Error::InvalidTriangle("origin grain must be at least one month".into()));
        }
        if origin.windows(2).any(|w| w[0] >= w[1]) {
            return Err(Error::InvalidTriangle("origin periods must be strictly increasing".into()));
        }
        if development.windows(2).any(|w| w[0] >= w[1]) {
            return Err(Error::InvalidTriangle("development ages must be strictly increasing".into()));
        }

        Ok(Self {
            values,
            index,
            columns,
            origin,
            origin_grain,
            development,
            trend: None,
            olf: None,
        })
    }

    pub fn values(&self) -> &Array4<f64> {
        &self.values
    }

    pub fn index(&self) -> &IndexFrame {
        &self.index
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn origin(&self) -> &[NaiveDate] {
        &self.origin
    }

    pub fn origin_grain(&self) -> u32 {
        self.origin_grain
    }

    pub fn development(&self) -> &[u32] {
        &self.development
    }

    /// (rows, columns, origins, development periods)
    pub fn shape(&self) -> (usize, usize, usize, usize) {
        self.values.dim()
    }

    /// Copy of this triangle holding new values of the same shape
    ///
    /// Attached adjustments describe the source values and are not carried over.
    pub fn with_values(&self, values: Array4<f64>) -> Result<Triangle> {
        if values.dim() != self.shape() {
            return Err(Error::ShapeMismatch(format!(
                "replacement values are {:?}, triangle is {:?}",
                values.dim(),
                self.shape()
            )));
        }
        Ok(self.relabelled(values, self.development.clone()))
    }

    /// Per-origin values of this triangle's shape placed in a single ultimate column
    pub fn to_ultimate(&self, values: Array3<f64>) -> Result<Triangle> {
        let (n_idx, n_col, n_orig, _) = self.shape();
        if values.dim() != (n_idx, n_col, n_orig) {
            return Err(Error::ShapeMismatch(format!(
                "ultimate values are {:?}, triangle origins are {:?}",
                values.dim(),
                (n_idx, n_col, n_orig)
            )));
        }
        Ok(self.relabelled(values.insert_axis(Axis(3)), vec![ULTIMATE_AGE]))
    }

    fn relabelled(&self, values: Array4<f64>, development: Vec<u32>) -> Triangle {
        Triangle {
            values,
            index: self.index.clone(),
            columns: self.columns.clone(),
            origin: self.origin.clone(),
            origin_grain: self.origin_grain,
            development,
            trend: None,
            olf: None,
        }
    }

    /// Most mature non-missing value per (row, column, origin)
    pub fn latest_values(&self) -> Array3<f64> {
        let latest = self.latest_development();
        Array3::from_shape_fn(latest.dim(), |(g, c, o)| match latest[[g, c, o]] {
            Some(d) => self.values[[g, c, o, d]],
            None => f64::NAN,
        })
    }

    /// Latest diagonal as a single-column triangle, keeping attached adjustments
    pub fn latest_diagonal(&self) -> Triangle {
        let age = self.development.last().copied().unwrap_or(ULTIMATE_AGE);
        let mut latest = self.relabelled(self.latest_values().insert_axis(Axis(3)), vec![age]);
        latest.trend = self.trend.clone();
        latest.olf = self.olf.clone();
        latest
    }

    /// Index of the most mature observed development period per (row, column, origin)
    ///
    /// `None` for cells without any observation. Rows may differ in maturity.
    pub fn latest_development(&self) -> Array3<Option<usize>> {
        let (n_idx, n_col, n_orig, n_dev) = self.shape();
        Array3::from_shape_fn((n_idx, n_col, n_orig), |(g, c, o)| {
            (0..n_dev).rev().find(|&d| !self.values[[g, c, o, d]].is_nan())
        })
    }

    /// Last day of an origin period
    pub fn origin_end(&self, origin: usize) -> Result<NaiveDate> {
        end_of_span(self.origin[origin], self.origin_grain)
    }

    /// Latest calendar date represented by an observed cell
    pub fn valuation_date(&self) -> Result<NaiveDate> {
        let mut valuation: Option<NaiveDate> = None;
        for ((_, _, o), latest) in self.latest_development().indexed_iter() {
            let Some(d) = *latest else { continue };
            let date = end_of_span(self.origin[o], self.development[d])?;
            valuation = Some(valuation.map_or(date, |v| v.max(date)));
        }
        valuation.ok_or_else(|| Error::InvalidTriangle("triangle holds no observations".into()))
    }

    /// Factor trending each origin period to the valuation date's cost level
    ///
    /// `(1 + rate)^(months / 12)` where `months` runs from the end of the origin
    /// period to the valuation date.
    pub fn trend_factors(&self, rate: f64) -> Result<Array1<f64>> {
        let valuation = self.valuation_date()?;
        (0..self.origin.len())
            .map(|o| {
                let months = months_between(self.origin_end(o)?, valuation).max(0);
                Ok((1.0 + rate).powf(months as f64 / 12.0))
            })
            .collect::<Result<Vec<_>>>()
            .map(Array1::from)
    }

    /// Attach a trend adjustment that overrides any rate-based trend
    pub fn with_trend(mut self, trend: TrendAdjustment) -> Result<Self> {
        trend.factors().expand(self.origin_shape())?;
        self.trend = Some(trend);
        Ok(self)
    }

    /// Attach on-level factors
    pub fn with_olf(mut self, olf: OnLevelFactor) -> Result<Self> {
        olf.factors().expand(self.origin_shape())?;
        self.olf = Some(olf);
        Ok(self)
    }

    pub fn attached_trend(&self) -> Option<&TrendAdjustment> {
        self.trend.as_ref()
    }

    pub fn attached_olf(&self) -> Option<&OnLevelFactor> {
        self.olf.as_ref()
    }

    /// (rows, columns, origins)
    pub fn origin_shape(&self) -> (usize, usize, usize) {
        let (n_idx, n_col, n_orig, _) = self.shape();
        (n_idx, n_col, n_orig)
    }
}

/// Broadcast a per-origin array over rows and columns of length one
pub(crate) fn broadcast_origin(
    source: ArrayView3<'_, f64>,
    shape: (usize, usize, usize),
    what: &str,
) -> Result<Array3<f64>> {
    source
        .broadcast(shape)
        .map(|view| view.to_owned())
        .ok_or_else(|| {
            Error::ShapeMismatch(format!(
                "{} has shape {:?} and cannot broadcast to {:?}",
                what,
                source.dim(),
                shape
            ))
        })
}

/// Last day of the span of `months` starting at `start`
fn end_of_span(start: NaiveDate, months: u32) -> Result<NaiveDate> {
    start
        .checked_add_months(Months::new(months))
        .and_then(|d| d.pred_opt())
        .ok_or(Error::DateOverflow(start))
}

/// Whole calendar months from `from` to `to`
fn months_between(from: NaiveDate, to: NaiveDate) -> i32 {
    (to.year() - from.year()) * 12 + to.month() as i32 - from.month() as i32
}
