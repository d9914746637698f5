//! Commandline utility to normalize the label space of aggregated masks.
//!
//! Suppressed class IDs become background, then the surviving labels are
//! compacted to `1..=k` with their relative order preserved, which is what
//! the downstream statistics stage expects. The suppression set comes from
//! the command line (the reference head pipeline suppresses IDs 22 and 28).

use std::collections::BTreeSet;
use std::path::Path;

use anyhow::Context;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use masknii::pipeline;

// use clap to create commandline interface
#[derive(Parser, Debug)]
#[command(author, about, version, long_about)]
struct Args {
    /// the directory with the aggregated masks
    #[arg(short, long)]
    input_dir: String,

    /// the output directory for the filtered masks
    #[arg(short, long)]
    output_dir: String,

    /// class IDs to suppress before compacting, e.g. -s 22,28
    #[arg(short, long, value_delimiter = ',')]
    suppress: Vec<u16>,
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Args::parse();
    let suppress: BTreeSet<u16> = cli.suppress.iter().copied().collect();
    let report = pipeline::filter_directory(
        Path::new(&cli.input_dir),
        Path::new(&cli.output_dir),
        &suppress,
    )
    .context("mask filtering failed")?;

    println!(
        "Filtered {} subjects ({} already complete, {} skipped).",
        report.processed,
        report.already_complete,
        report.skipped.len()
    );
    for reason in &report.skipped {
        println!("Skipped {reason}");
    }
    Ok(())
}
