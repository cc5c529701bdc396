//! Per-origin multiplicative adjustments attached to triangles
//!
//! - **Trend**: projects each origin's loss cost to a common level
//! - **On-level factors**: restate historical data at current rate/coverage levels
//!
//! Both are stored as factors shaped `[rows|1, columns|1, origins]`; a leading
//! axis of length one applies to every row or column.

use ndarray::Array3;
use serde::Serialize;

use super::data::{broadcast_origin, Triangle};
use crate::error::{Error, Result};

/// Per-origin factors, broadcast over rows and columns of length one
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OriginFactors {
    factors: Array3<f64>,
}

impl OriginFactors {
    pub fn new(factors: Array3<f64>) -> Result<Self> {
        if factors.is_empty() {
            return Err(Error::invalid("factors", "at least one origin factor is required"));
        }
        if let Some(bad) = factors.iter().find(|f| !f.is_finite() || **f <= 0.0) {
            return Err(Error::invalid("factors", format!("factor {} must be finite and positive", bad)));
        }
        Ok(Self { factors })
    }

    /// The same factor sequence for every row and column
    pub fn uniform(per_origin: &[f64]) -> Result<Self> {
        Self::new(Array3::from_shape_fn((1, 1, per_origin.len()), |(_, _, o)| per_origin[o]))
    }

    pub fn values(&self) -> &Array3<f64> {
        &self.factors
    }

    /// True when one factor sequence serves every row
    pub fn is_uniform_across_rows(&self) -> bool {
        self.factors.dim().0 == 1
    }

    /// Broadcast to (rows, columns, origins)
    pub fn expand(&self, shape: (usize, usize, usize)) -> Result<Array3<f64>> {
        broadcast_origin(self.factors.view(), shape, "origin factors")
    }
}

/// Trend attached to a loss triangle; takes precedence over any trend rate
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrendAdjustment {
    factors: OriginFactors,
}

impl TrendAdjustment {
    pub fn new(factors: OriginFactors) -> Self {
        Self { factors }
    }

    /// Trend every origin of `triangle` to its valuation date at `rate` per year
    pub fn from_rate(triangle: &Triangle, rate: f64) -> Result<Self> {
        let factors = triangle.trend_factors(rate)?;
        Ok(Self::new(OriginFactors::uniform(&factors.to_vec())?))
    }

    pub fn factors(&self) -> &OriginFactors {
        &self.factors
    }
}

/// On-level factors attached to a loss or exposure triangle
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OnLevelFactor {
    factors: OriginFactors,
}

impl OnLevelFactor {
    pub fn new(factors: OriginFactors) -> Self {
        Self { factors }
    }

    pub fn factors(&self) -> &OriginFactors {
        &self.factors
    }
}
