//! Cape Cod reserving method
//!
//! Fitting derives a trend-adjusted, decay-weighted apriori loss ratio per
//! origin, scales the detrended apriori by exposure into an expected ultimate,
//! and credits reported losses against it with the Benktander method.
//!
//! Aprioris are a function of the data rather than fitted parameters, so
//! `predict` derives them afresh from the triangles it is given.

use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use log::info;
use serde::{Deserialize, Serialize};

use super::apriori::{AprioriSettings, Aprioris};
use super::benktander::{Benktander, UltimateEstimate};
use super::grouped::handle_aprioris;
use super::summary::{ReserveSummary, ResultTriangles};
use crate::development::DevelopmentPattern;
use crate::error::{Error, Result};
use crate::triangle::{broadcast_origin, GroupingSpec, Triangle};

/// Cape Cod method configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CapeCodConfig {
    /// Annual loss cost trend; a trend attached to the losses overrides it
    pub trend: f64,

    /// Weight decay per origin period of distance (1 = equal weights)
    pub decay: f64,

    /// Benktander iterations (1 = Bornhuetter-Ferguson)
    pub n_iters: usize,

    /// Apriori standard deviation, forwarded to the base method
    pub apriori_sigma: f64,

    /// Apriori sampling seed, forwarded to the base method
    pub random_state: Option<u64>,

    /// Pool index rows into groups when deriving aprioris
    #[serde(skip)]
    pub groupby: Option<GroupingSpec>,
}

impl Default for CapeCodConfig {
    fn default() -> Self {
        Self {
            trend: 0.0,
            decay: 1.0,
            n_iters: 1,
            apriori_sigma: 0.0,
            random_state: None,
            groupby: None,
        }
    }
}

impl CapeCodConfig {
    /// Load scalar settings from a JSON file; grouping is set separately
    pub fn from_json_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = File::open(path)?;
        Ok(serde_json::from_reader(BufReader::new(file))?)
    }

    pub fn with_trend(mut self, trend: f64) -> Self {
        self.trend = trend;
        self
    }

    pub fn with_decay(mut self, decay: f64) -> Self {
        self.decay = decay;
        self
    }

    pub fn with_n_iters(mut self, n_iters: usize) -> Self {
        self.n_iters = n_iters;
        self
    }

    pub fn with_apriori_sigma(mut self, apriori_sigma: f64) -> Self {
        self.apriori_sigma = apriori_sigma;
        self
    }

    pub fn with_random_state(mut self, seed: u64) -> Self {
        self.random_state = Some(seed);
        self
    }

    pub fn with_groupby(mut self, groupby: GroupingSpec) -> Self {
        self.groupby = Some(groupby);
        self
    }

    /// Pool rows sharing the labels of the named index levels
    pub fn group_by_levels<I, S>(self, levels: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.with_groupby(GroupingSpec::levels(levels))
    }

    pub fn validate(&self) -> Result<()> {
        if !self.decay.is_finite() || self.decay < 0.0 {
            return Err(Error::invalid("decay", format!("{} must be finite and non-negative", self.decay)));
        }
        if !self.trend.is_finite() || self.trend <= -1.0 {
            return Err(Error::invalid("trend", format!("{} must be finite and above -1", self.trend)));
        }
        if !self.apriori_sigma.is_finite() || self.apriori_sigma < 0.0 {
            return Err(Error::invalid(
                "apriori_sigma",
                format!("{} must be finite and non-negative", self.apriori_sigma),
            ));
        }
        Ok(())
    }

    pub fn apriori_settings(&self) -> AprioriSettings {
        AprioriSettings {
            trend: self.trend,
            decay: self.decay,
        }
    }

    pub fn base_method(&self) -> Benktander {
        Benktander {
            n_iters: self.n_iters,
            apriori_sigma: self.apriori_sigma,
            random_state: self.random_state,
        }
    }
}

/// Unfitted Cape Cod estimator
#[derive(Debug, Clone)]
pub struct CapeCod {
    config: CapeCodConfig,
    pattern: DevelopmentPattern,
}

/// Aprioris, expectation and ultimates for one pair of inputs
struct Priced {
    aprioris: Aprioris,
    expectation: Triangle,
    estimate: UltimateEstimate,
}

impl CapeCod {
    pub fn new(config: CapeCodConfig, pattern: DevelopmentPattern) -> Result<Self> {
        config.validate()?;
        Ok(Self { config, pattern })
    }

    pub fn config(&self) -> &CapeCodConfig {
        &self.config
    }

    pub fn pattern(&self) -> &DevelopmentPattern {
        &self.pattern
    }

    /// Fit to `losses` using `sample_weight` as exposure
    pub fn fit(&self, losses: &Triangle, sample_weight: Option<&Triangle>) -> Result<FittedCapeCod> {
        let exposure = sample_weight.ok_or(Error::MissingExposure)?;
        let priced = self.price(losses, exposure)?;
        info!(
            "Fitted Cape Cod to {} rows x {} origins (trend {}, decay {}, {} iterations)",
            losses.index().len(),
            losses.origin().len(),
            self.config.trend,
            self.config.decay,
            self.config.n_iters
        );

        Ok(FittedCapeCod {
            model: self.clone(),
            losses: losses.clone(),
            apriori: priced.aprioris.apriori,
            detrended_apriori: priced.aprioris.detrended,
            expectation: priced.expectation,
            ultimate: priced.estimate.ultimate,
            ibnr: priced.estimate.ibnr,
        })
    }

    fn price(&self, losses: &Triangle, exposure: &Triangle) -> Result<Priced> {
        validate_exposure(losses, exposure)?;
        let aprioris = handle_aprioris(
            &self.config.apriori_settings(),
            self.config.groupby.as_ref(),
            losses,
            exposure,
            &self.pattern,
        )?;
        let expectation = expected_ultimate(&aprioris.detrended, exposure)?;
        let estimate = self.config.base_method().estimate(losses, &expectation, &self.pattern)?;
        Ok(Priced {
            aprioris,
            expectation,
            estimate,
        })
    }
}

/// Cape Cod estimator fitted to a loss triangle
#[derive(Debug, Clone)]
pub struct FittedCapeCod {
    model: CapeCod,
    losses: Triangle,
    /// Trended apriori loss ratios
    pub apriori: Triangle,
    /// Aprioris restated at each origin's own cost level
    pub detrended_apriori: Triangle,
    /// Expected ultimate losses: detrended apriori times exposure
    pub expectation: Triangle,
    pub ultimate: Triangle,
    pub ibnr: Triangle,
}

impl FittedCapeCod {
    pub fn model(&self) -> &CapeCod {
        &self.model
    }

    /// Loss triangle the estimator was fitted to
    pub fn losses(&self) -> &Triangle {
        &self.losses
    }

    /// Apply the fitted method to new losses and exposure
    pub fn predict(&self, losses: &Triangle, sample_weight: Option<&Triangle>) -> Result<CapeCodPrediction> {
        let exposure = sample_weight.ok_or(Error::MissingExposure)?;
        let priced = self.model.price(losses, exposure)?;
        Ok(CapeCodPrediction {
            losses: losses.clone(),
            ultimate: priced.estimate.ultimate,
            ibnr: priced.estimate.ibnr,
            apriori: priced.aprioris.apriori,
            detrended_apriori: priced.aprioris.detrended,
            expectation: priced.expectation,
        })
    }

    pub fn summary(&self) -> ReserveSummary {
        ReserveSummary::build(ResultTriangles {
            losses: &self.losses,
            apriori: &self.apriori,
            detrended_apriori: &self.detrended_apriori,
            expectation: &self.expectation,
            ultimate: &self.ultimate,
            ibnr: &self.ibnr,
        })
    }
}

/// Cape Cod results for a predicted triangle
#[derive(Debug, Clone, Serialize)]
pub struct CapeCodPrediction {
    pub losses: Triangle,
    pub ultimate: Triangle,
    pub ibnr: Triangle,
    pub apriori: Triangle,
    pub detrended_apriori: Triangle,
    pub expectation: Triangle,
}

impl CapeCodPrediction {
    pub fn summary(&self) -> ReserveSummary {
        ReserveSummary::build(ResultTriangles {
            losses: &self.losses,
            apriori: &self.apriori,
            detrended_apriori: &self.detrended_apriori,
            expectation: &self.expectation,
            ultimate: &self.ultimate,
            ibnr: &self.ibnr,
        })
    }
}

/// Exposure must share the loss origins; rows and columns may broadcast
fn validate_exposure(losses: &Triangle, exposure: &Triangle) -> Result<()> {
    if exposure.origin() != losses.origin() {
        return Err(Error::ShapeMismatch(format!(
            "exposure origins {:?} differ from loss origins {:?}",
            exposure.origin(),
            losses.origin()
        )));
    }
    let (n_idx, n_col, _) = losses.origin_shape();
    let (w_idx, w_col, _) = exposure.origin_shape();
    if (w_idx != 1 && w_idx != n_idx) || (w_col != 1 && w_col != n_col) {
        return Err(Error::ShapeMismatch(format!(
            "exposure has {} rows x {} columns, losses have {} x {}",
            w_idx, w_col, n_idx, n_col
        )));
    }
    Ok(())
}

/// Detrended apriori times latest exposure
fn expected_ultimate(detrended: &Triangle, exposure: &Triangle) -> Result<Triangle> {
    let ratios = detrended.latest_values();
    let exposure = broadcast_origin(exposure.latest_values().view(), ratios.dim(), "exposure")?;
    detrended.to_ultimate(&ratios * &exposure)
}
