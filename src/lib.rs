//! Loss Reserving - Cape Cod reserving over loss and exposure triangles
//!
//! This library provides:
//! - Triangles with on-level and trend adjustments, loaded from long-format CSV
//! - Development patterns supplied as CDFs or age-to-age factors
//! - Decay-weighted Cape Cod aprioris, optionally pooled by index group
//! - Benktander/Bornhuetter-Ferguson ultimates and IBNR

pub mod error;
pub mod triangle;
pub mod development;
pub mod methods;
pub mod inputs;

// Re-export commonly used types
pub use error::{Error, Result};
pub use triangle::{GroupKey, GroupingSpec, Triangle, TriangleLayout};
pub use development::{load_pattern, DevelopmentPattern};
pub use methods::{CapeCod, CapeCodConfig, CapeCodPrediction, FittedCapeCod, ReserveSummary};
