//! Command line inputs shared by the reserving binaries

use std::path::{Path, PathBuf};

use clap::Args;
use log::info;

use crate::development::{load_pattern, DevelopmentPattern};
use crate::error::Result;
use crate::methods::CapeCodConfig;
use crate::triangle::{load_origin_factors, load_triangle, OnLevelFactor, Triangle, TriangleLayout};

/// Loss, exposure and pattern files
#[derive(Debug, Clone, Args)]
pub struct InputArgs {
    /// Long-format loss triangle CSV
    #[arg(long)]
    pub losses: PathBuf,

    /// Long-format exposure CSV
    #[arg(long)]
    pub exposure: PathBuf,

    /// Development pattern CSV (`age,cdf` or `age,ldf`)
    #[arg(long)]
    pub pattern: PathBuf,

    /// Index level columns, comma separated
    #[arg(long, value_delimiter = ',')]
    pub index: Vec<String>,

    #[arg(long, default_value = "loss")]
    pub loss_column: String,

    #[arg(long, default_value = "premium")]
    pub exposure_column: String,

    /// Origin period length in months
    #[arg(long, default_value_t = 12)]
    pub grain: u32,

    /// On-level factors (`origin,factor`) for losses
    #[arg(long)]
    pub loss_olf: Option<PathBuf>,

    /// On-level factors (`origin,factor`) for exposure
    #[arg(long)]
    pub exposure_olf: Option<PathBuf>,
}

/// Cape Cod settings; flags override the config file
#[derive(Debug, Clone, Args)]
pub struct MethodArgs {
    /// JSON file with `CapeCodConfig` fields
    #[arg(long)]
    pub config: Option<PathBuf>,

    #[arg(long)]
    pub trend: Option<f64>,

    #[arg(long)]
    pub decay: Option<f64>,

    #[arg(long)]
    pub n_iters: Option<usize>,

    /// Pool aprioris over these index levels, comma separated
    #[arg(long, value_delimiter = ',')]
    pub groupby: Vec<String>,
}

/// Triangles and pattern read from [`InputArgs`]
#[derive(Debug, Clone)]
pub struct ReservingInputs {
    pub losses: Triangle,
    pub exposure: Triangle,
    pub pattern: DevelopmentPattern,
}

impl InputArgs {
    pub fn load(&self) -> Result<ReservingInputs> {
        let layout = |column: &str| {
            TriangleLayout::with_columns([column])
                .indexed_by(self.index.iter().cloned())
                .with_grain(self.grain)
        };

        let losses = with_olf(load_triangle(&self.losses, &layout(&self.loss_column))?, self.loss_olf.as_deref())?;
        let exposure = with_olf(
            load_triangle(&self.exposure, &layout(&self.exposure_column))?,
            self.exposure_olf.as_deref(),
        )?;
        let pattern = load_pattern(&self.pattern)?;
        info!(
            "Loaded {} loss rows over {} origins, valued {}",
            losses.index().len(),
            losses.origin().len(),
            losses.valuation_date()?
        );

        Ok(ReservingInputs {
            losses,
            exposure,
            pattern,
        })
    }
}

impl MethodArgs {
    pub fn config(&self) -> Result<CapeCodConfig> {
        let mut config = match &self.config {
            Some(path) => CapeCodConfig::from_json_path(path)?,
            None => CapeCodConfig::default(),
        };
        if let Some(trend) = self.trend {
            config = config.with_trend(trend);
        }
        if let Some(decay) = self.decay {
            config = config.with_decay(decay);
        }
        if let Some(n_iters) = self.n_iters {
            config = config.with_n_iters(n_iters);
        }
        if !self.groupby.is_empty() {
            config = config.group_by_levels(self.groupby.iter().cloned());
        }
        config.validate()?;
        Ok(config)
    }
}

fn with_olf(triangle: Triangle, path: Option<&Path>) -> Result<Triangle> {
    match path {
        Some(path) => {
            let factors = load_origin_factors(path, &triangle)?;
            triangle.with_olf(OnLevelFactor::new(factors))
        }
        None => Ok(triangle),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_args() -> InputArgs {
        InputArgs {
            losses: "data/sample/losses.csv".into(),
            exposure: "data/sample/exposure.csv".into(),
            pattern: "data/sample/pattern.csv".into(),
            index: vec!["lob".to_string()],
            loss_column: "loss".to_string(),
            exposure_column: "premium".to_string(),
            grain: 12,
            loss_olf: None,
            exposure_olf: Some("data/sample/olf.csv".into()),
        }
    }

    #[test]
    fn test_load_sample_inputs() {
        let inputs = sample_args().load().unwrap();
        assert_eq!(inputs.losses.shape(), (3, 1, 4, 4));
        assert_eq!(inputs.exposure.index(), inputs.losses.index());
        assert!(inputs.losses.attached_olf().is_none());

        let olf = inputs.exposure.attached_olf().unwrap();
        assert!((olf.factors().values()[[0, 0, 0]] - 1.08).abs() < 1e-12);
    }

    #[test]
    fn test_flags_override_config_file() {
        let args = MethodArgs {
            config: Some("data/sample/config.json".into()),
            trend: None,
            decay: Some(0.25),
            n_iters: None,
            groupby: vec!["lob".to_string()],
        };
        let file = CapeCodConfig::from_json_path("data/sample/config.json").unwrap();
        let config = args.config().unwrap();
        assert_eq!(config.trend, file.trend);
        assert_eq!(config.decay, 0.25);
        assert!(config.groupby.is_some());
    }

    #[test]
    fn test_invalid_override_rejected() {
        let args = MethodArgs {
            config: None,
            trend: Some(-2.0),
            decay: None,
            n_iters: None,
            groupby: Vec::new(),
        };
        assert!(args.config().is_err());
    }
}
