//! Priority composition of two label volumes.

use std::collections::BTreeSet;

use ndarray::Zip;
use tracing::debug;

use crate::error::{MaskError, Result};
use crate::volume::LabelVolume;

/// Merge two label volumes that already share a grid; `foreground`'s
/// non-zero voxels always win.
///
/// Class IDs present in both inputs keep their foreground meaning: the
/// background's occurrences are shifted by `max(foreground labels) + 1`,
/// which puts every shifted value past the whole foreground label range.
/// The shift is deterministic, so the provenance of any output label can be
/// reconstructed from the inputs.
///
/// Composition is strictly binary and order-sensitive. Callers folding more
/// than two volumes must treat each pair as an isolated step; labels shifted
/// in an earlier fold can collide again in a later one, and nothing here
/// renumbers across folds.
pub fn compose(background: &LabelVolume, foreground: &LabelVolume) -> Result<LabelVolume> {
    if !background.same_grid(foreground) {
        return Err(MaskError::GridMismatch(format!(
            "background {:?} vs foreground {:?}",
            background.dim(),
            foreground.dim()
        )));
    }

    let background_classes = background.distinct_labels();
    let foreground_classes = foreground.distinct_labels();

    // nothing to overlay: pass the background through untouched
    if foreground_classes.is_empty() {
        return Ok(LabelVolume::new(
            background.labels.clone(),
            background.geometry.clone(),
        ));
    }

    let collisions: BTreeSet<u16> = background_classes
        .intersection(&foreground_classes)
        .copied()
        .collect();

    let mut merged = background.labels.clone();
    if !collisions.is_empty() {
        // collisions is a subset of a non-empty foreground set, so the
        // maximum must exist; anything else is a logic error
        let max_foreground = foreground_classes
            .iter()
            .next_back()
            .copied()
            .ok_or(MaskError::EmptyForegroundCollision)?;
        let shift = max_foreground
            .checked_add(1)
            .ok_or(MaskError::LabelRangeExceeded {
                label: max_foreground,
                shift: 1,
            })?;
        debug!(?collisions, shift, "shifting colliding background classes");

        for value in merged.iter_mut() {
            let label = *value;
            if collisions.contains(&label) {
                *value = label
                    .checked_add(shift)
                    .ok_or(MaskError::LabelRangeExceeded { label, shift })?;
            }
        }
    }

    Zip::from(&mut merged)
        .and(&foreground.labels)
        .for_each(|back, &front| {
            if front != 0 {
                *back = front;
            }
        });

    Ok(LabelVolume::new(merged, background.geometry.clone()))
}
