//! Label suppression and compaction.

use std::collections::{BTreeMap, BTreeSet};

use tracing::debug;

use crate::volume::LabelVolume;

/// Suppress the given class IDs, then remap the surviving non-zero labels
/// onto `1..=k` in ascending order.
///
/// Suppression runs before the mapping is built, as one atomic pass: a class
/// slated for suppression never consumes a slot in the final numbering.
/// Background stays `0` throughout, and the relative order of surviving
/// labels is preserved. Geometry is copied unchanged.
pub fn normalize(volume: &LabelVolume, suppress: &BTreeSet<u16>) -> LabelVolume {
    let mut labels = volume.labels.clone();
    if !suppress.is_empty() {
        for value in labels.iter_mut() {
            if suppress.contains(value) {
                *value = 0;
            }
        }
    }

    let survivors: BTreeSet<u16> = labels.iter().copied().filter(|&l| l != 0).collect();
    let mapping: BTreeMap<u16, u16> = survivors
        .iter()
        .enumerate()
        .map(|(i, &old)| (old, (i + 1) as u16))
        .collect();
    debug!(classes = mapping.len(), "compacting label space");

    for value in labels.iter_mut() {
        let old = *value;
        if old != 0 {
            *value = mapping[&old];
        }
    }

    LabelVolume::new(labels, volume.geometry.clone())
}
