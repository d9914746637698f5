//! Commandline utility to merge per-model segmentation masks into one
//! composite atlas per subject.
//!
//! Subjects are discovered from the total-body mask directory and paired by
//! file name. Brain-structure masks overlay the total-body mask, then the
//! temporalis mask overlays the result, so the temporalis labels win over
//! everything. Finished subjects leave a `.done` marker next to the output
//! and are skipped on re-runs.

use std::path::Path;

use anyhow::Context;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use masknii::pipeline;

// use clap to create commandline interface
#[derive(Parser, Debug)]
#[command(author, about, version, long_about)]
struct Args {
    /// the directory with the total-body masks (composition background)
    #[arg(short, long)]
    total_dir: String,

    /// the directory with the brain-structure masks (first overlay)
    #[arg(short, long)]
    brain_dir: String,

    /// the directory with the temporalis masks (final overlay)
    #[arg(long)]
    temporalis_dir: String,

    /// the output directory for the composite masks
    #[arg(short, long)]
    output_dir: String,
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Args::parse();
    let report = pipeline::aggregate_directory(
        Path::new(&cli.total_dir),
        Path::new(&cli.brain_dir),
        Path::new(&cli.temporalis_dir),
        Path::new(&cli.output_dir),
    )
    .context("mask aggregation failed")?;

    println!(
        "Aggregated {} subjects ({} already complete, {} skipped).",
        report.processed,
        report.already_complete,
        report.skipped.len()
    );
    for reason in &report.skipped {
        println!("Skipped {reason}");
    }
    Ok(())
}
