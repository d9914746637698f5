//! Batch drivers: subject discovery, file pairing, completion markers, and
//! the per-subject aggregation, filtering and statistics runs.

use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};

use glob::glob;
use rayon::prelude::*;
use tracing::{info, warn};

use crate::compose::compose;
use crate::error::Result;
use crate::io::{read_intensity_volume, read_label_volume, write_label_volume};
use crate::normalize::normalize;
use crate::resample::resample_nearest;
use crate::stats::{segment_statistics, ReportMeta, ReportRow};
use crate::volume::LabelVolume;

/// Outcome of a batch run over one directory of subjects.
#[derive(Debug, Default)]
pub struct BatchReport {
    /// subjects processed and written in this run
    pub processed: usize,
    /// subjects skipped because their completion marker already exists
    pub already_complete: usize,
    /// subjects skipped with the reason, one entry each
    pub skipped: Vec<String>,
}

enum SubjectOutcome {
    Processed,
    AlreadyComplete,
    Skipped(String),
}

/// Collect the mask files (`.nii` / `.nii.gz`) in a directory, sorted by
/// file name.
pub fn list_masks(dir: &Path) -> Result<Vec<PathBuf>> {
    let pattern = format!("{}/*.nii*", dir.display());
    let mut paths: Vec<PathBuf> = glob(&pattern)?
        .filter_map(std::result::Result::ok)
        .filter(|p| {
            p.file_name()
                .and_then(|n| n.to_str())
                .map(|n| n.ends_with(".nii") || n.ends_with(".nii.gz"))
                .unwrap_or(false)
        })
        .collect();
    paths.sort();
    Ok(paths)
}

/// Subject ID of a mask file: the file name up to its first `.`.
pub fn subject_id(path: &Path) -> Option<&str> {
    path.file_name()?.to_str()?.split('.').next()
}

/// Path-addressed completion marker for an output file.
pub fn completion_marker(output: &Path) -> PathBuf {
    let mut name = output
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(".done");
    output.with_file_name(name)
}

/// A subject counts as done only when both the output and its marker exist.
pub fn is_complete(output: &Path) -> bool {
    output.exists() && completion_marker(output).exists()
}

/// Record a finished output. Written after the output itself, so a crash
/// between the two leaves the subject incomplete rather than half-done.
pub fn mark_complete(output: &Path) -> Result<()> {
    fs::write(completion_marker(output), output.display().to_string())?;
    Ok(())
}

/// Merge one subject's masks: brain structures over total-body, then
/// temporalis over the result.
///
/// Each foreground is resampled onto the current background grid before its
/// composition, so the composite always lives on the total-body grid.
pub fn merge_subject(
    total: &LabelVolume,
    brain: &LabelVolume,
    temporalis: &LabelVolume,
) -> Result<LabelVolume> {
    let brain = resample_nearest(brain, total)?;
    let merged = compose(total, &brain)?;
    let temporalis = resample_nearest(temporalis, &merged)?;
    compose(&merged, &temporalis)
}

/// Run the two-pass aggregation over a batch of subjects.
///
/// Subjects are discovered from the total-body directory. The
/// brain-structure mask shares the total-body file name; the temporalis mask
/// is `{subject}.nii.gz`. A subject with a missing or unreadable input is
/// skipped with a warning and the batch continues.
///
/// # Arguments
///
/// * `total_dir` - total-body masks, the composition background.
/// * `brain_dir` - brain-structure masks, first overlay.
/// * `temporalis_dir` - temporalis masks, final overlay.
/// * `output_dir` - where composite masks and completion markers go.
pub fn aggregate_directory(
    total_dir: &Path,
    brain_dir: &Path,
    temporalis_dir: &Path,
    output_dir: &Path,
) -> Result<BatchReport> {
    fs::create_dir_all(output_dir)?;
    let totals = list_masks(total_dir)?;
    info!(subjects = totals.len(), "aggregating masks");

    let outcomes: Vec<SubjectOutcome> = totals
        .par_iter()
        .map(|total_path| aggregate_subject(total_path, brain_dir, temporalis_dir, output_dir))
        .collect();
    Ok(collect_report(outcomes))
}

fn aggregate_subject(
    total_path: &Path,
    brain_dir: &Path,
    temporalis_dir: &Path,
    output_dir: &Path,
) -> SubjectOutcome {
    let Some(file_name) = total_path.file_name().and_then(|n| n.to_str()) else {
        return SubjectOutcome::Skipped(format!("{}: unreadable file name", total_path.display()));
    };
    let subject = file_name.split('.').next().unwrap_or(file_name);

    let output = output_dir.join(file_name);
    if is_complete(&output) {
        info!(subject, "already aggregated, skipping");
        return SubjectOutcome::AlreadyComplete;
    }

    let brain_path = brain_dir.join(file_name);
    let temporalis_path = temporalis_dir.join(format!("{subject}.nii.gz"));
    for (path, kind) in [
        (&brain_path, "brain-structure"),
        (&temporalis_path, "temporalis"),
    ] {
        if !path.exists() {
            warn!(subject, kind, "missing mask, skipping subject");
            return SubjectOutcome::Skipped(format!("{subject}: missing {kind} mask"));
        }
    }

    match aggregate_one(total_path, &brain_path, &temporalis_path, &output) {
        Ok(()) => {
            info!(subject, "aggregated");
            SubjectOutcome::Processed
        }
        Err(e) => {
            warn!(subject, error = %e, "aggregation failed, skipping subject");
            SubjectOutcome::Skipped(format!("{subject}: {e}"))
        }
    }
}

fn aggregate_one(total: &Path, brain: &Path, temporalis: &Path, output: &Path) -> Result<()> {
    let total = read_label_volume(total)?;
    let brain = read_label_volume(brain)?;
    let temporalis = read_label_volume(temporalis)?;
    let merged = merge_subject(&total, &brain, &temporalis)?;
    write_label_volume(output, &merged)?;
    mark_complete(output)
}

/// Normalize every mask in a directory: suppress the configured class IDs,
/// then compact the surviving labels to a contiguous range.
pub fn filter_directory(
    input_dir: &Path,
    output_dir: &Path,
    suppress: &BTreeSet<u16>,
) -> Result<BatchReport> {
    fs::create_dir_all(output_dir)?;
    let masks = list_masks(input_dir)?;
    info!(subjects = masks.len(), ?suppress, "filtering masks");

    let outcomes: Vec<SubjectOutcome> = masks
        .par_iter()
        .map(|mask_path| filter_subject(mask_path, output_dir, suppress))
        .collect();
    Ok(collect_report(outcomes))
}

fn filter_subject(mask_path: &Path, output_dir: &Path, suppress: &BTreeSet<u16>) -> SubjectOutcome {
    let Some(file_name) = mask_path.file_name().and_then(|n| n.to_str()) else {
        return SubjectOutcome::Skipped(format!("{}: unreadable file name", mask_path.display()));
    };
    let subject = file_name.split('.').next().unwrap_or(file_name);

    let output = output_dir.join(file_name);
    if is_complete(&output) {
        info!(subject, "already filtered, skipping");
        return SubjectOutcome::AlreadyComplete;
    }

    let result = read_label_volume(mask_path).and_then(|mask| {
        let normalized = normalize(&mask, suppress);
        write_label_volume(&output, &normalized)?;
        mark_complete(&output)
    });
    match result {
        Ok(()) => {
            info!(subject, "filtered");
            SubjectOutcome::Processed
        }
        Err(e) => {
            warn!(subject, error = %e, "filtering failed, skipping subject");
            SubjectOutcome::Skipped(format!("{subject}: {e}"))
        }
    }
}

/// Compute per-segment statistics for every mask with a matching intensity
/// image (`{subject}_0000.nii.gz` in `image_dir`).
///
/// A subject without an image is recorded and skipped; the batch continues.
/// Rows come back in subject order, segments ascending within a subject.
pub fn stats_directory(
    mask_dir: &Path,
    image_dir: &Path,
    meta: &ReportMeta,
) -> Result<(Vec<ReportRow>, BatchReport)> {
    let masks = list_masks(mask_dir)?;
    info!(subjects = masks.len(), "extracting segment statistics");

    let results: Vec<(Vec<ReportRow>, SubjectOutcome)> = masks
        .par_iter()
        .map(|mask_path| stats_subject(mask_path, image_dir, meta))
        .collect();

    let mut rows = Vec::new();
    let mut outcomes = Vec::new();
    for (subject_rows, outcome) in results {
        rows.extend(subject_rows);
        outcomes.push(outcome);
    }
    Ok((rows, collect_report(outcomes)))
}

fn stats_subject(
    mask_path: &Path,
    image_dir: &Path,
    meta: &ReportMeta,
) -> (Vec<ReportRow>, SubjectOutcome) {
    let Some(file_name) = mask_path.file_name().and_then(|n| n.to_str()) else {
        let reason = format!("{}: unreadable file name", mask_path.display());
        return (Vec::new(), SubjectOutcome::Skipped(reason));
    };
    let subject = file_name.split('.').next().unwrap_or(file_name);

    let image_path = image_dir.join(format!("{subject}_0000.nii.gz"));
    if !image_path.exists() {
        warn!(subject, "image not found, skipping subject");
        let reason = format!("{subject}: image not found");
        return (Vec::new(), SubjectOutcome::Skipped(reason));
    }

    match stats_one(mask_path, &image_path, meta, subject) {
        Ok(rows) => {
            info!(subject, segments = rows.len(), "extracted statistics");
            (rows, SubjectOutcome::Processed)
        }
        Err(e) => {
            warn!(subject, error = %e, "statistics failed, skipping subject");
            (Vec::new(), SubjectOutcome::Skipped(format!("{subject}: {e}")))
        }
    }
}

fn stats_one(
    mask_path: &Path,
    image_path: &Path,
    meta: &ReportMeta,
    subject: &str,
) -> Result<Vec<ReportRow>> {
    let mask = read_label_volume(mask_path)?;
    let (image, _) = read_intensity_volume(image_path)?;
    let stats = segment_statistics(&image, &mask)?;
    Ok(stats
        .iter()
        .map(|s| ReportRow::new(s, meta, subject, subject))
        .collect())
}

fn collect_report(outcomes: Vec<SubjectOutcome>) -> BatchReport {
    let mut report = BatchReport::default();
    for outcome in outcomes {
        match outcome {
            SubjectOutcome::Processed => report.processed += 1,
            SubjectOutcome::AlreadyComplete => report.already_complete += 1,
            SubjectOutcome::Skipped(reason) => report.skipped.push(reason),
        }
    }
    report
}
