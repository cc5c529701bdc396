//! Development patterns
//!
//! A pattern maps each development age to the cumulative development factor
//! (CDF) that takes losses at that age to ultimate. Patterns are supplied by the
//! caller, either as CDFs or as age-to-age factors, and are never estimated here.

use std::path::Path;

use csv::Reader;
use ndarray::Array3;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::triangle::{Triangle, ULTIMATE_AGE};

/// Cumulative development factors by development age
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DevelopmentPattern {
    ages: Vec<u32>,
    cdf: Vec<f64>,
}

impl DevelopmentPattern {
    /// Create from CDFs to ultimate
    pub fn from_cdfs(ages: Vec<u32>, cdf: Vec<f64>) -> Result<Self> {
        if ages.is_empty() || ages.len() != cdf.len() {
            return Err(Error::invalid(
                "pattern",
                format!("{} ages and {} factors", ages.len(), cdf.len()),
            ));
        }
        if ages.windows(2).any(|w| w[0] >= w[1]) {
            return Err(Error::invalid("pattern", "ages must be strictly increasing"));
        }
        if let Some(bad) = cdf.iter().find(|f| !f.is_finite() || **f <= 0.0) {
            return Err(Error::invalid("pattern", format!("factor {} must be finite and positive", bad)));
        }
        Ok(Self { ages, cdf })
    }

    /// Create from age-to-age factors
    ///
    /// The factor at the last age is the tail factor to ultimate; each CDF is
    /// the product of the factors from its age onward.
    pub fn from_ldfs(ages: Vec<u32>, ldf: Vec<f64>) -> Result<Self> {
        let mut cdf = ldf.clone();
        for k in (0..cdf.len().saturating_sub(1)).rev() {
            cdf[k] *= cdf[k + 1];
        }
        Self::from_cdfs(ages, cdf)
    }

    pub fn ages(&self) -> &[u32] {
        &self.ages
    }

    pub fn cdfs(&self) -> &[f64] {
        &self.cdf
    }

    /// CDF at a development age; ultimate-level columns are fully developed
    pub fn cdf_at(&self, age: u32) -> Result<f64> {
        if age == ULTIMATE_AGE {
            return Ok(1.0);
        }
        self.ages
            .binary_search(&age)
            .map(|i| self.cdf[i])
            .map_err(|_| Error::MissingDevelopmentAge { age })
    }

    /// CDF at each (row, column, origin)'s most mature observed age
    ///
    /// Cells without observations receive `NaN`.
    pub fn align(&self, triangle: &Triangle) -> Result<Array3<f64>> {
        let latest = triangle.latest_development();
        let mut cdf = Array3::from_elem(latest.dim(), f64::NAN);
        for (cell, age) in cdf.iter_mut().zip(latest.iter()) {
            if let Some(d) = *age {
                *cell = self.cdf_at(triangle.development()[d])?;
            }
        }
        Ok(cdf)
    }
}

#[derive(Debug, Deserialize)]
struct PatternRow {
    age: u32,
    #[serde(default)]
    cdf: Option<f64>,
    #[serde(default)]
    ldf: Option<f64>,
}

/// Load a pattern from a CSV file with `age` and either `cdf` or `ldf` columns
pub fn load_pattern<P: AsRef<Path>>(path: P) -> Result<DevelopmentPattern> {
    let mut reader = Reader::from_path(path)?;
    let mut rows: Vec<PatternRow> = Vec::new();
    for result in reader.deserialize() {
        rows.push(result?);
    }
    rows.sort_by_key(|r| r.age);

    let ages: Vec<u32> = rows.iter().map(|r| r.age).collect();
    if let Some(cdf) = rows.iter().map(|r| r.cdf).collect::<Option<Vec<_>>>() {
        DevelopmentPattern::from_cdfs(ages, cdf)
    } else if let Some(ldf) = rows.iter().map(|r| r.ldf).collect::<Option<Vec<_>>>() {
        DevelopmentPattern::from_ldfs(ages, ldf)
    } else {
        Err(Error::MissingColumn("cdf or ldf".to_string()))
    }
}
