//! Reserving methods
//!
//! - **Apriori**: trended, on-levelled, decay-weighted loss ratios
//! - **Grouped**: aprioris pooled over groups of triangle rows
//! - **Benktander**: iterative credibility between expectation and chain ladder
//! - **Cape Cod**: fit/predict over the above

pub mod apriori;
mod benktander;
mod capecod;
mod grouped;
mod summary;

pub use apriori::{capecod_aprioris, decay_matrix, AprioriSettings, Aprioris};
pub use benktander::{Benktander, UltimateEstimate};
pub use capecod::{CapeCod, CapeCodConfig, CapeCodPrediction, FittedCapeCod};
pub use grouped::handle_aprioris;
pub use summary::{OriginRow, ReserveSummary};
