//! mpit CLI entry point
//!
//! Matches RFID tags to pose tracks for one recording directory and writes
//! the identified tables.
//!
//! ```bash
//! mpit --input-dir recording/ --output-dir recording/identification_output
//! mpit --input-dir recording/ --output-dir out/ -t 1.0 -m centroid_frameDistDiff
//! ```

use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use tracing::info;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use mpit_rs::integration::{InputDir, csv_io};
use mpit_rs::{FusionPipeline, MethodSelection, PipelineConfig};

/// Multi-animal pose identity tracking with RFID
#[derive(Parser, Debug)]
#[command(name = "mpit")]
#[command(author, version, about = "Assign RFID identities to pose tracks and correct identity swaps")]
struct Cli {
    /// Directory with rfid.csv, poses.csv, readers.toml and recording.toml
    #[arg(short, long)]
    input_dir: PathBuf,

    /// Directory the result tables are written to
    #[arg(short, long)]
    output_dir: PathBuf,

    /// TOML file with pipeline settings; flags below override it
    #[arg(long)]
    config: Option<PathBuf>,

    /// Length of a matching interval in seconds
    #[arg(short = 't', long)]
    length_time_interval: Option<f64>,

    /// bp_perFrame, centroid_perFrame, bp_frameDistDiff, centroid_frameDistDiff or all
    #[arg(short = 'm', long)]
    correction_method: Option<MethodSelection>,

    /// Minimum displacement gain in pixels for the frameDistDiff methods
    #[arg(short = 'd', long)]
    min_dist_diff_threshold: Option<f64>,

    /// Keypoints below this likelihood are ignored
    #[arg(short = 'l', long)]
    likelihood_threshold: Option<f64>,
}

impl Cli {
    fn pipeline_config(&self) -> anyhow::Result<PipelineConfig> {
        let mut config = match &self.config {
            Some(path) => PipelineConfig::load(path)
                .with_context(|| format!("Failed to load config {}", path.display()))?,
            None => PipelineConfig::default(),
        };
        if let Some(length) = self.length_time_interval {
            config.length_time_interval = length;
        }
        if let Some(method) = self.correction_method {
            config.correction_method = method;
        }
        if let Some(threshold) = self.min_dist_diff_threshold {
            config.min_dist_diff_threshold = threshold;
        }
        if let Some(threshold) = self.likelihood_threshold {
            config.likelihood_threshold = threshold;
        }
        Ok(config)
    }
}

fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .init();

    let cli = Cli::parse();
    let pipeline = FusionPipeline::new(cli.pipeline_config()?).context("Invalid configuration")?;

    let mut input = InputDir::open(&cli.input_dir)
        .with_context(|| format!("Failed to open input directory {}", cli.input_dir.display()))?;
    let output = pipeline
        .run_from_sources(
            &input.recording,
            &input.calibration,
            &mut input.rfid,
            &mut input.poses,
        )
        .context("Identity matching failed")?;

    let files = csv_io::render_outputs(&output).context("Failed to render outputs")?;
    csv_io::write_outputs(&cli.output_dir, &files)
        .with_context(|| format!("Failed to write to {}", cli.output_dir.display()))?;

    for correction in &output.corrections {
        info!(method = %correction.method, corrections = correction.count(), "total corrections");
    }
    Ok(())
}
