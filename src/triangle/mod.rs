//! Loss and exposure triangles
//!
//! A triangle stores values indexed by (row, value column, origin period,
//! development period). Rows carry index labels (e.g. line of business), origin
//! periods are dated, and development ages are in months.

mod data;
mod adjustments;
mod grouping;
pub mod loader;

pub use data::{IndexFrame, Triangle, ULTIMATE_AGE};
pub(crate) use data::broadcast_origin;
pub use adjustments::{OriginFactors, TrendAdjustment, OnLevelFactor};
pub use grouping::{GroupKey, GroupingSpec, KeyFn, TriangleGroupBy};
pub use loader::{load_triangle, load_triangle_from_reader, load_origin_factors, TriangleLayout};
