//! Benktander iterative ultimate method
//!
//! Starting from an expected ultimate, each iteration credits the reported
//! losses and the unreported share of the previous estimate:
//!
//! `U_k = latest + (1 - 1/cdf) * U_{k-1}`, with `U_0` the expectation.
//!
//! One iteration is the Bornhuetter-Ferguson method; many iterations converge
//! to the chain ladder.

use log::debug;
use ndarray::Array3;
use serde::{Deserialize, Serialize};

use crate::development::DevelopmentPattern;
use crate::error::{Error, Result};
use crate::triangle::Triangle;

/// Benktander method configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Benktander {
    /// Number of credibility iterations
    pub n_iters: usize,

    /// Standard deviation of apriori sampling
    /// Carried for stochastic resampling; deterministic estimates ignore it
    pub apriori_sigma: f64,

    /// Seed for apriori sampling
    pub random_state: Option<u64>,
}

impl Default for Benktander {
    fn default() -> Self {
        Self {
            n_iters: 1,
            apriori_sigma: 0.0,
            random_state: None,
        }
    }
}

/// Ultimate losses and IBNR per origin, in a single ultimate column
#[derive(Debug, Clone, Serialize)]
pub struct UltimateEstimate {
    pub ultimate: Triangle,
    pub ibnr: Triangle,
}

impl Benktander {
    pub fn new(n_iters: usize) -> Self {
        Self {
            n_iters,
            ..Default::default()
        }
    }

    /// Estimate ultimates of `losses` from an expected ultimate per origin
    pub fn estimate(
        &self,
        losses: &Triangle,
        expectation: &Triangle,
        pattern: &DevelopmentPattern,
    ) -> Result<UltimateEstimate> {
        let latest = losses.latest_values();
        let expected = expectation.latest_values();
        if expected.dim() != latest.dim() {
            return Err(Error::ShapeMismatch(format!(
                "expectation is {:?}, losses are {:?}",
                expected.dim(),
                latest.dim()
            )));
        }
        if self.apriori_sigma > 0.0 {
            debug!("apriori_sigma {} has no effect on a deterministic estimate", self.apriori_sigma);
        }

        let cdf = pattern.align(losses)?;
        let ultimate = Array3::from_shape_fn(latest.dim(), |(g, c, o)| {
            let unreported = 1.0 - 1.0 / cdf[[g, c, o]];
            let reported = latest[[g, c, o]];
            (0..self.n_iters).fold(expected[[g, c, o]], |u, _| reported + unreported * u)
        });
        let ibnr = &ultimate - &latest;

        Ok(UltimateEstimate {
            ultimate: losses.to_ultimate(ultimate)?,
            ibnr: losses.to_ultimate(ibnr)?,
        })
    }
}
