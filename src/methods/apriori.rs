//! Cape Cod apriori estimation
//!
//! The apriori for origin `i` is a decay-weighted average of every origin's
//! trended, on-levelled loss ratio, weighted by the exposure already "used up"
//! by each origin's reported maturity:
//!
//! ```text
//! reported[j]  = exposure[j] / cdf[j]
//! ratio[j]     = latest[j] * trend[j] * olf_x[j] / (reported[j] * olf_w[j])
//! weight[i,j]  = reported[j] * decay^|i-j|
//! apriori[i]   = Σ_j weight[i,j] * ratio[j] / Σ_j weight[i,j]
//! detrended[i] = apriori[i] / trend[i] / olf_x[i] * olf_w[i]
//! ```
//!
//! Both sums skip missing terms independently. A zero or entirely missing
//! denominator produces `NaN`, which is propagated rather than replaced.

use log::{debug, warn};
use ndarray::{Array2, Array3, Axis, Zip};
use serde::{Deserialize, Serialize};

use crate::development::DevelopmentPattern;
use crate::error::{Error, Result};
use crate::triangle::{broadcast_origin, OriginFactors, Triangle, TrendAdjustment};

/// Trend and decay assumptions used to derive aprioris
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AprioriSettings {
    /// Annual loss cost trend; ignored when the loss triangle carries a trend
    pub trend: f64,
    /// Weight decay per origin period of distance
    pub decay: f64,
}

impl Default for AprioriSettings {
    fn default() -> Self {
        Self { trend: 0.0, decay: 1.0 }
    }
}

/// Trended and detrended apriori loss ratios, one ultimate column per origin
#[derive(Debug, Clone, Serialize)]
pub struct Aprioris {
    pub apriori: Triangle,
    pub detrended: Triangle,
}

/// Square matrix with entry (i, j) = `decay^|i-j|`
pub fn decay_matrix(n_origins: usize, decay: f64) -> Array2<f64> {
    Array2::from_shape_fn((n_origins, n_origins), |(i, j)| decay.powi(i.abs_diff(j) as i32))
}

/// Derive the Cape Cod aprioris of `losses` against `exposure`
pub fn capecod_aprioris(
    settings: &AprioriSettings,
    losses: &Triangle,
    exposure: &Triangle,
    pattern: &DevelopmentPattern,
) -> Result<Aprioris> {
    let shape = losses.origin_shape();
    let n_orig = shape.2;
    if exposure.origin().len() != n_orig {
        return Err(Error::ShapeMismatch(format!(
            "exposure has {} origins, losses have {}",
            exposure.origin().len(),
            n_orig
        )));
    }
    debug!(
        "Cape Cod aprioris over {:?} (trend {}, decay {})",
        shape, settings.trend, settings.decay
    );

    let latest = losses.latest_values();
    let exposure_latest = exposure.latest_diagonal();
    let exposure_values = broadcast_origin(
        exposure_latest.values().index_axis(Axis(3), 0),
        shape,
        "exposure",
    )?;
    let cdf = pattern.align(losses)?;
    let reported = &exposure_values / &cdf;

    let trend = resolve_trend(settings.trend, losses, shape)?;
    let olf_x = neutral_or(losses.attached_olf().map(|o| o.factors()), shape)?;
    let olf_w = neutral_or(exposure_latest.attached_olf().map(|o| o.factors()), shape)?;
    let decay = decay_matrix(n_orig, settings.decay);

    let ratio = Zip::from(&latest)
        .and(&trend)
        .and(&olf_x)
        .and(&reported)
        .and(&olf_w)
        .map_collect(|&l, &t, &ox, &r, &ow| (l * t * ox) / (r * ow));

    let apriori = Array3::from_shape_fn(shape, |(g, c, i)| {
        let (weighted, total) = (0..n_orig).fold((0.0, 0.0), |(weighted, total), j| {
            let weight = reported[[g, c, j]] * decay[[i, j]];
            (nan_add(weighted, weight * ratio[[g, c, j]]), nan_add(total, weight))
        });
        weighted / total
    });

    let detrended = Zip::from(&apriori)
        .and(&trend)
        .and(&olf_x)
        .and(&olf_w)
        .map_collect(|&a, &t, &ox, &ow| a / t / ox * ow);

    Ok(Aprioris {
        apriori: losses.to_ultimate(apriori)?,
        detrended: losses.to_ultimate(detrended)?,
    })
}

/// Trend factors per cell: the attached trend when present, else the rate
fn resolve_trend(rate: f64, losses: &Triangle, shape: (usize, usize, usize)) -> Result<Array3<f64>> {
    match losses.attached_trend() {
        Some(trend) => {
            if rate != 0.0 {
                warn!(
                    "Cape Cod trend assumption {} is ignored because the loss triangle carries a trend adjustment",
                    rate
                );
            }
            trend.factors().expand(shape)
        }
        None if rate == 0.0 => Ok(Array3::ones(shape)),
        None => TrendAdjustment::from_rate(losses, rate)?.factors().expand(shape),
    }
}

fn neutral_or(factors: Option<&OriginFactors>, shape: (usize, usize, usize)) -> Result<Array3<f64>> {
    match factors {
        Some(f) => f.expand(shape),
        None => Ok(Array3::ones(shape)),
    }
}

fn nan_add(acc: f64, v: f64) -> f64 {
    if v.is_nan() {
        acc
    } else {
        acc + v
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::triangle::{fixtures, OnLevelFactor};
    use approx::assert_relative_eq;

    fn settings(trend: f64, decay: f64) -> AprioriSettings {
        AprioriSettings { trend, decay }
    }

    /// Two origins, fully developed, loss ratios 0.6 and 0.2 on exposure 100 and 200
    fn two_origins() -> (Triangle, Triangle, DevelopmentPattern) {
        let nan = f64::NAN;
        let losses = fixtures::annual(&["a"], 2020, &[12, 24], &[vec![vec![50.0, 60.0], vec![40.0, nan]]]);
        let exposure = fixtures::exposure(&["a"], 2020, &[vec![100.0, 200.0]]);
        let pattern = DevelopmentPattern::from_cdfs(vec![12, 24], vec![1.0, 1.0]).unwrap();
        (losses, exposure, pattern)
    }

    fn origin_values(tri: &Triangle) -> Vec<f64> {
        tri.values().iter().copied().collect()
    }

    #[test]
    fn test_decay_matrix_symmetric_unit_diagonal() {
        for decay in [0.1, 0.5, 0.9, 1.0] {
            let m = decay_matrix(5, decay);
            for i in 0..5 {
                assert_eq!(m[[i, i]], 1.0);
                for j in 0..5 {
                    assert_eq!(m[[i, j]], m[[j, i]]);
                }
            }
            assert_relative_eq!(m[[0, 3]], decay.powi(3));
        }
    }

    #[test]
    fn test_single_origin_direct_ratio() {
        let losses = fixtures::annual(&["a"], 2020, &[12], &[vec![vec![100.0]]]);
        let exposure = fixtures::exposure(&["a"], 2020, &[vec![1000.0]]);
        let pattern = DevelopmentPattern::from_cdfs(vec![12], vec![2.0]).unwrap();

        let result = capecod_aprioris(&settings(0.0, 1.0), &losses, &exposure, &pattern).unwrap();
        // 100 / (1000 / 2)
        assert_relative_eq!(result.apriori.values()[[0, 0, 0, 0]], 0.2);
        assert_relative_eq!(result.detrended.values()[[0, 0, 0, 0]], 0.2);
    }

    #[test]
    fn test_full_decay_is_exposure_weighted_average() {
        let (losses, exposure, pattern) = two_origins();
        let result = capecod_aprioris(&settings(0.0, 1.0), &losses, &exposure, &pattern).unwrap();
        for v in origin_values(&result.apriori) {
            assert_relative_eq!(v, 100.0 / 300.0, epsilon = 1e-12);
        }
    }

    #[test]
    fn test_zero_decay_uses_own_ratio() {
        let (losses, exposure, pattern) = two_origins();
        let result = capecod_aprioris(&settings(0.0, 0.0), &losses, &exposure, &pattern).unwrap();
        let values = origin_values(&result.apriori);
        assert_relative_eq!(values[0], 0.6, epsilon = 1e-12);
        assert_relative_eq!(values[1], 0.2, epsilon = 1e-12);

        let nearly = capecod_aprioris(&settings(0.0, 1e-9), &losses, &exposure, &pattern).unwrap();
        let values = origin_values(&nearly.apriori);
        assert_relative_eq!(values[0], 0.6, epsilon = 1e-6);
        assert_relative_eq!(values[1], 0.2, epsilon = 1e-6);
    }

    #[test]
    fn test_partial_decay() {
        let (losses, exposure, pattern) = two_origins();
        let result = capecod_aprioris(&settings(0.0, 0.5), &losses, &exposure, &pattern).unwrap();
        let values = origin_values(&result.apriori);
        // (100 * 0.6 + 0.5 * 200 * 0.2) / (100 + 0.5 * 200)
        assert_relative_eq!(values[0], 0.4, epsilon = 1e-12);
        // (0.5 * 100 * 0.6 + 200 * 0.2) / (0.5 * 100 + 200)
        assert_relative_eq!(values[1], 0.28, epsilon = 1e-12);
    }

    #[test]
    fn test_reported_exposure_uses_cdf() {
        let nan = f64::NAN;
        let losses = fixtures::annual(&["a"], 2020, &[12, 24], &[vec![vec![50.0, 60.0], vec![40.0, nan]]]);
        let exposure = fixtures::exposure(&["a"], 2020, &[vec![100.0, 200.0]]);
        let pattern = DevelopmentPattern::from_cdfs(vec![12, 24], vec![2.0, 1.0]).unwrap();
        let result = capecod_aprioris(&settings(0.0, 1.0), &losses, &exposure, &pattern).unwrap();
        // Reported exposure 100 and 100; losses 60 and 40
        for v in origin_values(&result.apriori) {
            assert_relative_eq!(v, 0.5, epsilon = 1e-12);
        }
    }

    #[test]
    fn test_trend_between_annual_origins() {
        let (losses, exposure, pattern) = two_origins();
        let result = capecod_aprioris(&settings(0.05, 1.0), &losses, &exposure, &pattern).unwrap();
        let apriori = origin_values(&result.apriori);
        let detrended = origin_values(&result.detrended);

        // Older origin trended one year: (60 * 1.05 + 40) / 300
        assert_relative_eq!(apriori[0], 103.0 / 300.0, epsilon = 1e-12);
        assert_relative_eq!(apriori[0] / detrended[0], 1.05, epsilon = 1e-12);
        assert_relative_eq!(apriori[1], detrended[1], epsilon = 1e-12);
    }

    #[test]
    fn test_attached_trend_wins_over_rate() {
        let (losses, exposure, pattern) = two_origins();
        let attached = TrendAdjustment::new(OriginFactors::uniform(&[1.10, 1.0]).unwrap());
        let losses = losses.with_trend(attached).unwrap();
        let result = capecod_aprioris(&settings(0.05, 1.0), &losses, &exposure, &pattern).unwrap();
        let apriori = origin_values(&result.apriori);
        assert_relative_eq!(apriori[0], (66.0 + 40.0) / 300.0, epsilon = 1e-12);
    }

    #[test]
    fn test_olf_round_trip() {
        let (losses, exposure, pattern) = two_origins();
        let losses = losses
            .with_olf(OnLevelFactor::new(OriginFactors::uniform(&[1.1, 1.0]).unwrap()))
            .unwrap();
        let exposure = exposure
            .with_olf(OnLevelFactor::new(OriginFactors::uniform(&[0.9, 1.0]).unwrap()))
            .unwrap();
        let result = capecod_aprioris(&settings(0.05, 0.75), &losses, &exposure, &pattern).unwrap();

        let trend = losses.trend_factors(0.05).unwrap();
        let apriori = origin_values(&result.apriori);
        let detrended = origin_values(&result.detrended);
        let olf_x = [1.1, 1.0];
        let olf_w = [0.9, 1.0];
        for o in 0..2 {
            assert_relative_eq!(
                detrended[o] * trend[o] * olf_x[o] / olf_w[o],
                apriori[o],
                epsilon = 1e-12
            );
        }
    }

    #[test]
    fn test_zero_exposure_is_nan() {
        let (losses, _, pattern) = two_origins();
        let exposure = fixtures::exposure(&["a"], 2020, &[vec![0.0, 0.0]]);
        let result = capecod_aprioris(&settings(0.0, 1.0), &losses, &exposure, &pattern).unwrap();
        assert!(origin_values(&result.apriori).iter().all(|v| v.is_nan()));
        assert!(origin_values(&result.detrended).iter().all(|v| v.is_nan()));
    }

    #[test]
    fn test_missing_exposure_cell_is_skipped() {
        let (losses, _, pattern) = two_origins();
        let exposure = fixtures::exposure(&["a"], 2020, &[vec![f64::NAN, 200.0]]);
        let result = capecod_aprioris(&settings(0.0, 1.0), &losses, &exposure, &pattern).unwrap();
        for v in origin_values(&result.apriori) {
            assert_relative_eq!(v, 0.2, epsilon = 1e-12);
        }
    }

    #[test]
    fn test_exposure_broadcast_over_rows() {
        let losses = fixtures::annual(&["a", "b"], 2020, &[12], &[vec![vec![10.0]], vec![vec![30.0]]]);
        let exposure = fixtures::exposure(&["all"], 2020, &[vec![100.0]]);
        let pattern = DevelopmentPattern::from_cdfs(vec![12], vec![1.0]).unwrap();
        let result = capecod_aprioris(&settings(0.0, 1.0), &losses, &exposure, &pattern).unwrap();
        assert_eq!(result.apriori.shape(), (2, 1, 1, 1));
        assert_relative_eq!(result.apriori.values()[[1, 0, 0, 0]], 0.3);
    }

    #[test]
    fn test_origin_count_mismatch() {
        let (losses, _, pattern) = two_origins();
        let exposure = fixtures::exposure(&["a"], 2020, &[vec![100.0]]);
        let result = capecod_aprioris(&settings(0.0, 1.0), &losses, &exposure, &pattern);
        assert!(matches!(result, Err(Error::ShapeMismatch(_))));
    }

    #[test]
    fn test_reported_exposure_follows_row_maturity() {
        let nan = f64::NAN;
        // Row a is at 24 months, row b only at 12
        let losses = fixtures::annual(&["a", "b"], 2020, &[12, 24], &[vec![vec![40.0, 80.0]], vec![vec![50.0, nan]]]);
        let exposure = fixtures::exposure(&["a", "b"], 2020, &[vec![200.0], vec![200.0]]);
        let pattern = DevelopmentPattern::from_cdfs(vec![12, 24], vec![2.0, 1.0]).unwrap();
        let result = capecod_aprioris(&settings(0.0, 1.0), &losses, &exposure, &pattern).unwrap();
        assert_relative_eq!(result.apriori.values()[[0, 0, 0, 0]], 0.4);
        // 50 / (200 / 2)
        assert_relative_eq!(result.apriori.values()[[1, 0, 0, 0]], 0.5);
    }
}
