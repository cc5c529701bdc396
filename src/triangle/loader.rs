//! Load triangles and origin factors from long-format CSV files
//!
//! A triangle file has one record per (index levels…, origin, development)
//! cell with one or more value columns:
//!
//! ```text
//! lob,origin,development,paid
//! auto,2021,12,1500
//! auto,2021,24,2250
//! ```
//!
//! Origins may be written as `YYYY`, `YYYY-MM` or `YYYY-MM-DD`. Duplicate
//! cells are summed and empty values are treated as missing.

use std::collections::{BTreeSet, HashMap};
use std::io::Read;
use std::path::Path;

use chrono::NaiveDate;
use csv::Reader;
use log::{debug, warn};
use ndarray::Array4;
use serde::{Deserialize, Serialize};

use super::adjustments::OriginFactors;
use super::data::{IndexFrame, Triangle};
use crate::error::{Error, Result};

/// Column layout of a long-format triangle file
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TriangleLayout {
    /// Index level columns
    pub index: Vec<String>,
    /// Origin period column
    pub origin: String,
    /// Development age column (months)
    pub development: String,
    /// Value columns
    pub columns: Vec<String>,
    /// Length of each origin period in months
    pub origin_grain: u32,
}

impl Default for TriangleLayout {
    fn default() -> Self {
        Self {
            index: Vec::new(),
            origin: "origin".to_string(),
            development: "development".to_string(),
            columns: vec!["loss".to_string()],
            origin_grain: 12,
        }
    }
}

impl TriangleLayout {
    /// Layout reading the given value columns with default origin/development names
    pub fn with_columns<I, S>(columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            columns: columns.into_iter().map(Into::into).collect(),
            ..Default::default()
        }
    }

    /// Set the index level columns
    pub fn indexed_by<I, S>(mut self, index: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.index = index.into_iter().map(Into::into).collect();
        self
    }

    /// Set the origin grain in months
    pub fn with_grain(mut self, months: u32) -> Self {
        self.origin_grain = months;
        self
    }
}

/// One parsed CSV record
struct Cell {
    key: Vec<String>,
    origin: NaiveDate,
    age: u32,
    values: Vec<f64>,
}

/// Load a triangle from a CSV file
pub fn load_triangle<P: AsRef<Path>>(path: P, layout: &TriangleLayout) -> Result<Triangle> {
    let reader = Reader::from_path(path.as_ref())?;
    let triangle = read_triangle(reader, layout)?;
    debug!("Loaded triangle {:?} from {}", triangle.shape(), path.as_ref().display());
    Ok(triangle)
}

/// Load a triangle from any reader (e.g., string buffer, network stream)
pub fn load_triangle_from_reader<R: Read>(reader: R, layout: &TriangleLayout) -> Result<Triangle> {
    read_triangle(Reader::from_reader(reader), layout)
}

fn read_triangle<R: Read>(mut reader: Reader<R>, layout: &TriangleLayout) -> Result<Triangle> {
    let mut cells = Vec::new();
    for result in reader.deserialize() {
        let record: HashMap<String, String> = result?;
        let key = layout
            .index
            .iter()
            .map(|name| field(&record, name).map(str::to_string))
            .collect::<Result<Vec<_>>>()?;
        let origin = parse_origin(field(&record, &layout.origin)?)?;
        let age_text = field(&record, &layout.development)?;
        let age: u32 = age_text.trim().parse().map_err(|_| Error::Parse {
            field: layout.development.clone(),
            value: age_text.to_string(),
        })?;
        let values = layout
            .columns
            .iter()
            .map(|name| parse_value(name, field(&record, name)?))
            .collect::<Result<Vec<_>>>()?;
        cells.push(Cell { key, origin, age, values });
    }

    if cells.is_empty() {
        return Err(Error::InvalidTriangle("CSV input has no records".into()));
    }

    let keys: Vec<Vec<String>> = cells.iter().map(|c| c.key.clone()).collect::<BTreeSet<_>>().into_iter().collect();
    let origins: Vec<NaiveDate> = cells.iter().map(|c| c.origin).collect::<BTreeSet<_>>().into_iter().collect();
    let ages: Vec<u32> = cells.iter().map(|c| c.age).collect::<BTreeSet<_>>().into_iter().collect();

    let mut values = Array4::from_elem((keys.len(), layout.columns.len(), origins.len(), ages.len()), f64::NAN);
    for cell in &cells {
        // Every lookup is of a value collected from `cells` above
        let (Ok(g), Ok(o), Ok(d)) = (
            keys.binary_search(&cell.key),
            origins.binary_search(&cell.origin),
            ages.binary_search(&cell.age),
        ) else {
            continue;
        };
        for (c, &v) in cell.values.iter().enumerate() {
            if v.is_nan() {
                continue;
            }
            let slot = &mut values[[g, c, o, d]];
            *slot = if slot.is_nan() { v } else { *slot + v };
        }
    }

    Triangle::new(
        values,
        IndexFrame::new(layout.index.clone(), keys)?,
        layout.columns.clone(),
        origins,
        layout.origin_grain,
        ages,
    )
}

#[derive(Debug, Deserialize)]
struct FactorRow {
    origin: String,
    factor: f64,
}

/// Load `origin,factor` records as factors aligned to `triangle`'s origins
///
/// Origins absent from the file receive the neutral factor 1.
pub fn load_origin_factors<P: AsRef<Path>>(path: P, triangle: &Triangle) -> Result<OriginFactors> {
    let mut reader = Reader::from_path(path.as_ref())?;
    let mut by_origin = HashMap::new();
    for result in reader.deserialize() {
        let row: FactorRow = result?;
        by_origin.insert(parse_origin(&row.origin)?, row.factor);
    }

    let factors: Vec<f64> = triangle
        .origin()
        .iter()
        .map(|origin| {
            by_origin.get(origin).copied().unwrap_or_else(|| {
                warn!("No factor for origin {} in {}, using 1.0", origin, path.as_ref().display());
                1.0
            })
        })
        .collect();
    OriginFactors::uniform(&factors)
}

fn field<'r>(record: &'r HashMap<String, String>, name: &str) -> Result<&'r str> {
    record
        .get(name)
        .map(String::as_str)
        .ok_or_else(|| Error::MissingColumn(name.to_string()))
}

fn parse_value(name: &str, text: &str) -> Result<f64> {
    let text = text.trim();
    if text.is_empty() {
        return Ok(f64::NAN);
    }
    text.parse().map_err(|_| Error::Parse {
        field: name.to_string(),
        value: text.to_string(),
    })
}

/// Parse `YYYY`, `YYYY-MM` or `YYYY-MM-DD` as the start of an origin period
pub fn parse_origin(text: &str) -> Result<NaiveDate> {
    let text = text.trim();
    let full = match text.len() {
        4 => format!("{}-01-01", text),
        7 => format!("{}-01", text),
        _ => text.to_string(),
    };
    NaiveDate::parse_from_str(&full, "%Y-%m-%d").map_err(|_| Error::Parse {
        field: "origin".to_string(),
        value: text.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const LOSSES: &str = "\
lob,origin,development,paid,incurred
auto,2021,12,100,150
auto,2021,24,180,
auto,2022,12,120,170
home,2021,12,50,60
home,2021,12,5,5
";

    #[test]
    fn test_load_from_reader() {
        let layout = TriangleLayout::with_columns(["paid", "incurred"]).indexed_by(["lob"]);
        let tri = load_triangle_from_reader(LOSSES.as_bytes(), &layout).unwrap();

        assert_eq!(tri.shape(), (2, 2, 2, 2));
        assert_eq!(tri.index().rows()[1], vec!["home".to_string()]);
        assert_eq!(tri.development(), &[12, 24]);
        assert_eq!(tri.values()[[0, 0, 0, 1]], 180.0);
        assert!(tri.values()[[0, 1, 0, 1]].is_nan());
        // Duplicate home cell summed
        assert_eq!(tri.values()[[1, 0, 0, 0]], 55.0);
        assert!(tri.values()[[1, 0, 1, 0]].is_nan());
    }

    #[test]
    fn test_missing_column() {
        let layout = TriangleLayout::with_columns(["reported"]);
        let result = load_triangle_from_reader(LOSSES.as_bytes(), &layout);
        assert!(matches!(result, Err(Error::MissingColumn(c)) if c == "reported"));
    }

    #[test]
    fn test_parse_origin_formats() {
        let expected = NaiveDate::from_ymd_opt(2021, 4, 1).unwrap();
        assert_eq!(parse_origin("2021-04").unwrap(), expected);
        assert_eq!(parse_origin("2021-04-01").unwrap(), expected);
        assert_eq!(parse_origin("2021").unwrap(), NaiveDate::from_ymd_opt(2021, 1, 1).unwrap());
        assert!(parse_origin("21Q1").is_err());
    }

    #[test]
    fn test_load_sample_files() {
        let layout = TriangleLayout::with_columns(["loss"]).indexed_by(["lob"]);
        let tri = load_triangle("data/sample/losses.csv", &layout).expect("Failed to load losses");
        assert_eq!(tri.shape(), (3, 1, 4, 4));
        assert_eq!(tri.valuation_date().unwrap(), NaiveDate::from_ymd_opt(2023, 12, 31).unwrap());

        let olf = load_origin_factors("data/sample/olf.csv", &tri).unwrap();
        assert_eq!(olf.values().dim(), (1, 1, 4));
        assert!((olf.values()[[0, 0, 0]] - 1.08).abs() < 1e-12);
    }
}
