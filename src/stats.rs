//! Per-segment statistics of an intensity image under a label mask.

use std::collections::BTreeMap;

use ndarray::Array3;
use serde::Serialize;

use crate::error::{MaskError, Result};
use crate::volume::LabelVolume;

/// Quantitative summary of one segment of a mask.
#[derive(Debug, Clone, PartialEq)]
pub struct SegmentStats {
    pub label: u16,
    pub voxels: usize,
    /// physical volume in mm^3 (voxel count times the spacing product)
    pub volume: f64,
    pub mean: f64,
    pub median: f64,
    pub std_dev: f64,
}

/// Descriptive columns attached to every report row of a batch.
#[derive(Debug, Clone)]
pub struct ReportMeta {
    pub cohort: String,
    pub site: String,
    pub modality: String,
    pub model_name: String,
}

/// One row of the aggregated statistics CSV, one per (subject, segment).
#[derive(Debug, Clone, Serialize)]
pub struct ReportRow {
    pub segment: u16,
    pub segment_feature: String,
    pub cohort: String,
    pub site: String,
    pub modality: String,
    pub model_name: String,
    pub patient_id: String,
    pub series_description: String,
    pub volume: f64,
    pub mean_density: f64,
    pub median_density: f64,
    pub std_dev: f64,
}

impl ReportRow {
    pub fn new(
        stats: &SegmentStats,
        meta: &ReportMeta,
        patient_id: &str,
        series_description: &str,
    ) -> Self {
        Self {
            segment: stats.label,
            segment_feature: "size".to_string(),
            cohort: meta.cohort.clone(),
            site: meta.site.clone(),
            modality: meta.modality.clone(),
            model_name: meta.model_name.clone(),
            patient_id: patient_id.to_string(),
            series_description: series_description.to_string(),
            volume: stats.volume,
            mean_density: stats.mean,
            median_density: stats.median,
            std_dev: stats.std_dev,
        }
    }
}

/// Per-segment intensity statistics of `image` under `mask`.
///
/// Segments are the distinct non-zero labels of the mask, reported in
/// ascending label order. The standard deviation is the population form and
/// the median of an even voxel count is the mean of the two middle values.
pub fn segment_statistics(image: &Array3<f32>, mask: &LabelVolume) -> Result<Vec<SegmentStats>> {
    if image.dim() != mask.dim() {
        return Err(MaskError::ShapeMismatch {
            image: image.shape().to_vec(),
            mask: mask.labels.shape().to_vec(),
        });
    }

    let spacing = mask.geometry.spacing;
    let voxel_volume = spacing[0] * spacing[1] * spacing[2];

    let mut intensities: BTreeMap<u16, Vec<f32>> = BTreeMap::new();
    for (&label, &value) in mask.labels.iter().zip(image.iter()) {
        if label != 0 {
            intensities.entry(label).or_default().push(value);
        }
    }

    let mut stats = Vec::with_capacity(intensities.len());
    for (label, mut values) in intensities {
        let voxels = values.len();
        let mean = values.iter().map(|&v| f64::from(v)).sum::<f64>() / voxels as f64;
        let variance = values
            .iter()
            .map(|&v| {
                let d = f64::from(v) - mean;
                d * d
            })
            .sum::<f64>()
            / voxels as f64;

        values.sort_by(|a, b| a.total_cmp(b));
        let median = if voxels % 2 == 1 {
            f64::from(values[voxels / 2])
        } else {
            (f64::from(values[voxels / 2 - 1]) + f64::from(values[voxels / 2])) / 2.0
        };

        stats.push(SegmentStats {
            label,
            voxels,
            volume: voxels as f64 * voxel_volume,
            mean,
            median,
            std_dev: variance.sqrt(),
        });
    }
    Ok(stats)
}
