//! Apriori estimation over aggregate groups of triangle rows
//!
//! With a grouping, losses and exposure are summed per group, aprioris are
//! derived once per group and then copied back to every member row. Without a
//! grouping each row receives its own apriori.

use log::debug;
use ndarray::Axis;

use super::apriori::{capecod_aprioris, AprioriSettings, Aprioris};
use crate::development::DevelopmentPattern;
use crate::error::{Error, Result};
use crate::triangle::{GroupingSpec, Triangle};

/// Aprioris for `losses`, pooled by `groupby` when given
pub fn handle_aprioris(
    settings: &AprioriSettings,
    groupby: Option<&GroupingSpec>,
    losses: &Triangle,
    exposure: &Triangle,
    pattern: &DevelopmentPattern,
) -> Result<Aprioris> {
    match groupby {
        None => capecod_aprioris(settings, losses, exposure, pattern),
        Some(grouping) => grouped_aprioris(settings, grouping, losses, exposure, pattern),
    }
}

fn grouped_aprioris(
    settings: &AprioriSettings,
    grouping: &GroupingSpec,
    losses: &Triangle,
    exposure: &Triangle,
    pattern: &DevelopmentPattern,
) -> Result<Aprioris> {
    // Aggregates are mapped back by row position, so rows must line up
    if losses.index() != exposure.index() {
        return Err(Error::ShapeMismatch(format!(
            "grouping needs exposure rows labelled like the loss rows ({} losses, {} exposure)",
            losses.index().len(),
            exposure.index().len()
        )));
    }

    let loss_groups = losses.groupby(&grouping.resolve(losses))?;
    let exposure_groups = exposure.groupby(&grouping.resolve(exposure))?;
    if !loss_groups.indices().keys().eq(exposure_groups.indices().keys()) {
        return Err(Error::ShapeMismatch(
            "losses and exposure group into different labels".to_string(),
        ));
    }
    debug!(
        "Pooling {} rows into {} groups for apriori estimation",
        losses.index().len(),
        loss_groups.len()
    );

    let pooled = capecod_aprioris(settings, &loss_groups.sum()?, &exposure_groups.sum()?, pattern)?;

    // Aggregate position of each original row, in original row order
    let assignment = exposure_groups.row_assignment();
    Ok(Aprioris {
        apriori: broadcast_rows(&pooled.apriori, &assignment, losses)?,
        detrended: broadcast_rows(&pooled.detrended, &assignment, losses)?,
    })
}

/// Copy aggregate rows back onto the rows of `losses`
fn broadcast_rows(pooled: &Triangle, assignment: &[usize], losses: &Triangle) -> Result<Triangle> {
    let rows = pooled.values().select(Axis(0), assignment);
    losses.to_ultimate(rows.index_axis_move(Axis(3), 0))
}
