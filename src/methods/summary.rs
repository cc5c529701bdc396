//! Tabular view of a Cape Cod result, one row per (index row, column, origin)

use chrono::NaiveDate;
use serde::Serialize;

use crate::triangle::Triangle;

/// Result values for one origin period of one triangle row and column
#[derive(Debug, Clone, Serialize)]
pub struct OriginRow {
    pub index: Vec<String>,
    pub column: String,
    pub origin: NaiveDate,
    pub latest: f64,
    pub apriori: f64,
    pub detrended_apriori: f64,
    pub expectation: f64,
    pub ultimate: f64,
    pub ibnr: f64,
}

/// All origin rows plus totals; missing values are left out of totals
#[derive(Debug, Clone, Serialize)]
pub struct ReserveSummary {
    pub rows: Vec<OriginRow>,
    pub total_latest: f64,
    pub total_expectation: f64,
    pub total_ultimate: f64,
    pub total_ibnr: f64,
}

/// Borrowed result triangles, each with a single ultimate column
pub(crate) struct ResultTriangles<'a> {
    pub losses: &'a Triangle,
    pub apriori: &'a Triangle,
    pub detrended_apriori: &'a Triangle,
    pub expectation: &'a Triangle,
    pub ultimate: &'a Triangle,
    pub ibnr: &'a Triangle,
}

impl ReserveSummary {
    pub(crate) fn build(results: ResultTriangles<'_>) -> Self {
        let latest = results.losses.latest_values();
        let (n_idx, n_col, n_orig) = latest.dim();
        let at = |t: &Triangle, g: usize, c: usize, o: usize| t.values()[[g, c, o, 0]];

        let mut rows = Vec::with_capacity(n_idx * n_col * n_orig);
        for g in 0..n_idx {
            for c in 0..n_col {
                for o in 0..n_orig {
                    rows.push(OriginRow {
                        index: results.losses.index().rows()[g].clone(),
                        column: results.losses.columns()[c].clone(),
                        origin: results.losses.origin()[o],
                        latest: latest[[g, c, o]],
                        apriori: at(results.apriori, g, c, o),
                        detrended_apriori: at(results.detrended_apriori, g, c, o),
                        expectation: at(results.expectation, g, c, o),
                        ultimate: at(results.ultimate, g, c, o),
                        ibnr: at(results.ibnr, g, c, o),
                    });
                }
            }
        }

        let total = |f: fn(&OriginRow) -> f64| -> f64 { rows.iter().map(f).filter(|v| !v.is_nan()).sum() };
        Self {
            total_latest: total(|r| r.latest),
            total_expectation: total(|r| r.expectation),
            total_ultimate: total(|r| r.ultimate),
            total_ibnr: total(|r| r.ibnr),
            rows,
        }
    }
}
