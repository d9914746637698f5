//! End-to-end batch tests over temporary directories.
//!
//! These walk the same path as the binaries: write small mask volumes to
//! disk, aggregate, filter, and extract statistics, checking labels and
//! reports at each stage.

use std::collections::BTreeSet;
use std::fs;
use std::path::Path;

use nalgebra::Vector3;
use ndarray::arr3;
use tempfile::TempDir;

use masknii::io::{read_label_volume, write_label_volume};
use masknii::pipeline;
use masknii::stats::ReportMeta;
use masknii::volume::{Geometry, LabelVolume};

fn write_mask(dir: &Path, name: &str, labels: ndarray::Array3<u16>, geometry: Geometry) {
    fs::create_dir_all(dir).unwrap();
    let volume = LabelVolume::new(labels, geometry);
    write_label_volume(&dir.join(name), &volume).unwrap();
}

fn meta() -> ReportMeta {
    ReportMeta {
        cohort: "NSP".to_string(),
        site: "JGH".to_string(),
        modality: "CT".to_string(),
        model_name: "test-model".to_string(),
    }
}

#[test]
fn aggregate_filter_stats_end_to_end() {
    let root = TempDir::new().unwrap();
    let total_dir = root.path().join("total");
    let brain_dir = root.path().join("brain");
    let temporalis_dir = root.path().join("temporalis");
    let aggregates_dir = root.path().join("aggregates");
    let filtered_dir = root.path().join("filtered");
    let image_dir = root.path().join("images");

    // total-body classes {5, 7}; brain classes {1, 5} collide on 5
    write_mask(
        &total_dir,
        "case01.nii.gz",
        arr3(&[[[5]], [[5]], [[7]], [[0]], [[0]]]),
        Geometry::identity(),
    );
    write_mask(
        &brain_dir,
        "case01.nii.gz",
        arr3(&[[[1]], [[0]], [[0]], [[5]], [[0]]]),
        Geometry::identity(),
    );
    // temporalis sits on a grid shifted one voxel along x, so the batch
    // has to resample it before the second composition
    let mut shifted = Geometry::identity();
    shifted.origin = Vector3::new(1.0, 0.0, 0.0);
    write_mask(
        &temporalis_dir,
        "case01.nii.gz",
        arr3(&[[[1]], [[0]], [[0]], [[0]], [[0]]]),
        shifted,
    );

    let report =
        pipeline::aggregate_directory(&total_dir, &brain_dir, &temporalis_dir, &aggregates_dir)
            .unwrap();
    assert_eq!(report.processed, 1);
    assert!(report.skipped.is_empty());

    // pass 1: shift 6 turns background 5 into 11 -> [1, 11, 7, 5, 0]
    // pass 2: resampled temporalis [0, 1, 0, 0, 0] collides on 1, shift 2
    // turns background 1 into 3 -> [3, 1, 7, 5, 0]
    let composite = read_label_volume(&aggregates_dir.join("case01.nii.gz")).unwrap();
    assert_eq!(
        composite.labels,
        arr3(&[[[3]], [[1]], [[7]], [[5]], [[0]]])
    );
    assert!(composite
        .geometry
        .approx_eq(&Geometry::identity(), 1e-3));

    // a second run hits the completion marker and does no work
    let rerun =
        pipeline::aggregate_directory(&total_dir, &brain_dir, &temporalis_dir, &aggregates_dir)
            .unwrap();
    assert_eq!(rerun.processed, 0);
    assert_eq!(rerun.already_complete, 1);

    // suppress 7, then compact: {1, 3, 5} -> {1, 2, 3}
    let suppress: BTreeSet<u16> = [7].into_iter().collect();
    let report = pipeline::filter_directory(&aggregates_dir, &filtered_dir, &suppress).unwrap();
    assert_eq!(report.processed, 1);

    let filtered = read_label_volume(&filtered_dir.join("case01.nii.gz")).unwrap();
    assert_eq!(filtered.labels, arr3(&[[[2]], [[1]], [[0]], [[3]], [[0]]]));

    // intensities 10..50 under segments 1..3
    write_mask(
        &image_dir,
        "case01_0000.nii.gz",
        arr3(&[[[10]], [[20]], [[30]], [[40]], [[50]]]),
        Geometry::identity(),
    );
    let (rows, report) = pipeline::stats_directory(&filtered_dir, &image_dir, &meta()).unwrap();
    assert_eq!(report.processed, 1);
    assert_eq!(rows.len(), 3);
    assert!(rows.iter().all(|r| r.patient_id == "case01"));
    assert_eq!(rows[0].segment, 1);
    assert!((rows[0].mean_density - 20.0).abs() < 1e-9);
    assert_eq!(rows[1].segment, 2);
    assert!((rows[1].mean_density - 10.0).abs() < 1e-9);
    assert_eq!(rows[2].segment, 3);
    assert!((rows[2].mean_density - 40.0).abs() < 1e-9);
    assert!(rows.iter().all(|r| (r.volume - 1.0).abs() < 1e-9));
}

#[test]
fn missing_counterparts_are_soft_skips() {
    let root = TempDir::new().unwrap();
    let total_dir = root.path().join("total");
    let brain_dir = root.path().join("brain");
    let temporalis_dir = root.path().join("temporalis");
    let output_dir = root.path().join("aggregates");

    write_mask(
        &total_dir,
        "case02.nii.gz",
        arr3(&[[[1]]]),
        Geometry::identity(),
    );
    fs::create_dir_all(&brain_dir).unwrap();
    fs::create_dir_all(&temporalis_dir).unwrap();

    let report =
        pipeline::aggregate_directory(&total_dir, &brain_dir, &temporalis_dir, &output_dir)
            .unwrap();
    assert_eq!(report.processed, 0);
    assert_eq!(report.skipped.len(), 1);
    assert!(report.skipped[0].contains("case02"));
    assert!(!output_dir.join("case02.nii.gz").exists());
}

#[test]
fn stats_skips_subjects_without_an_image() {
    let root = TempDir::new().unwrap();
    let mask_dir = root.path().join("masks");
    let image_dir = root.path().join("images");

    write_mask(
        &mask_dir,
        "case03.nii.gz",
        arr3(&[[[1]]]),
        Geometry::identity(),
    );
    write_mask(
        &mask_dir,
        "case04.nii.gz",
        arr3(&[[[2]]]),
        Geometry::identity(),
    );
    // only case04 has an intensity image
    write_mask(
        &image_dir,
        "case04_0000.nii.gz",
        arr3(&[[[17]]]),
        Geometry::identity(),
    );

    let (rows, report) = pipeline::stats_directory(&mask_dir, &image_dir, &meta()).unwrap();
    assert_eq!(report.processed, 1);
    assert_eq!(report.skipped.len(), 1);
    assert!(report.skipped[0].contains("case03"));
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].patient_id, "case04");
    assert!((rows[0].mean_density - 17.0).abs() < 1e-9);
}
