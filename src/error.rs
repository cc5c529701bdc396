//! Error type shared by the triangle, development and method modules

use chrono::NaiveDate;
use thiserror::Error;

/// Result alias used throughout the crate
pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised while building triangles or running reserving methods
#[derive(Debug, Error)]
pub enum Error {
    /// Exposure-based methods cannot run without an exposure triangle
    #[error("sample_weight is required: the Cape Cod method needs an exposure triangle")]
    MissingExposure,

    /// A configuration value is outside its admissible range
    #[error("invalid parameter `{name}`: {reason}")]
    InvalidParameter { name: &'static str, reason: String },

    /// Two arrays that must line up do not
    #[error("shape mismatch: {0}")]
    ShapeMismatch(String),

    /// Triangle construction failed validation
    #[error("invalid triangle: {0}")]
    InvalidTriangle(String),

    /// A grouping key referenced an index level the triangle does not have
    #[error("unknown index level `{0}`")]
    UnknownIndexLevel(String),

    /// The development pattern has no CDF for a maturity present in the data
    #[error("development pattern has no factor for age {age}")]
    MissingDevelopmentAge { age: u32 },

    /// Month arithmetic left chrono's representable range
    #[error("date arithmetic overflow from {0}")]
    DateOverflow(NaiveDate),

    /// A CSV input lacks a required column
    #[error("CSV input has no `{0}` column")]
    MissingColumn(String),

    /// A CSV field could not be interpreted
    #[error("failed to parse {field} value `{value}`")]
    Parse { field: String, value: String },

    #[error(transparent)]
    Csv(#[from] csv::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

impl Error {
    pub(crate) fn invalid(name: &'static str, reason: impl Into<String>) -> Self {
        Error::InvalidParameter {
            name,
            reason: reason.into(),
        }
    }
}
