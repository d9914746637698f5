//! Commandline utility to extract per-segment statistics from filtered
//! masks into a single CSV report.
//!
//! Each mask is paired with its intensity image (`{subject}_0000.nii.gz` in
//! the image directory); subjects without an image are reported and skipped.
//! One row is written per (subject, segment) with volume, mean, median and
//! standard deviation of the intensities under that segment.

use std::path::Path;

use anyhow::Context;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use masknii::pipeline;
use masknii::stats::ReportMeta;

// use clap to create commandline interface
#[derive(Parser, Debug)]
#[command(author, about, version, long_about)]
struct Args {
    /// the directory with the filtered masks
    #[arg(short, long)]
    mask_dir: String,

    /// the directory with the corresponding intensity images
    #[arg(short, long)]
    image_dir: String,

    /// the output CSV file
    #[arg(short, long, default_value = "statistics.csv")]
    output: String,

    /// cohort name recorded in every row
    #[arg(long, default_value = "NSP")]
    cohort: String,

    /// site name recorded in every row
    #[arg(long, default_value = "JGH")]
    site: String,

    /// imaging modality recorded in every row
    #[arg(long, default_value = "CT")]
    modality: String,

    /// model name recorded in every row
    #[arg(
        long,
        default_value = "TotalSegmentatorV2[total, brain_structures]_InHouseTemporalis"
    )]
    model_name: String,
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Args::parse();
    let meta = ReportMeta {
        cohort: cli.cohort,
        site: cli.site,
        modality: cli.modality,
        model_name: cli.model_name,
    };
    let (rows, report) =
        pipeline::stats_directory(Path::new(&cli.mask_dir), Path::new(&cli.image_dir), &meta)
            .context("statistics extraction failed")?;

    let mut writer = csv::Writer::from_path(&cli.output)
        .with_context(|| format!("could not create {}", cli.output))?;
    for row in &rows {
        writer.serialize(row)?;
    }
    writer.flush()?;

    println!(
        "Wrote {} rows for {} subjects to {} ({} skipped).",
        rows.len(),
        report.processed,
        cli.output,
        report.skipped.len()
    );
    for reason in &report.skipped {
        println!("Skipped {reason}");
    }
    Ok(())
}
