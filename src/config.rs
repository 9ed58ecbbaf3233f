use anyhow::{bail, Result};
use clap::Parser;
use std::path::PathBuf;

/// Input layouts the scanner understands.
pub const LAYOUT_HELP: &str = "Expected input layouts:
  <data-dir>/YY-MM-DD.csv        (e.g. data/23-11-01.csv)
  <data-dir>/YY-MM/YY-MM-DD.csv  (e.g. data/23-11/23-11-01.csv)";

#[derive(Parser, Debug)]
#[command(
    name = "sunnybeam-aggregator",
    version,
    about = "Aggregates SunnyBeam daily meter CSV files into monthly summaries",
    after_help = LAYOUT_HELP
)]
pub struct Config {
    /// Directory containing the daily CSV files
    #[arg(long, default_value = "./data")]
    pub data_dir: PathBuf,

    /// Directory for dashboard-data.json (defaults to <data-dir>/output)
    #[arg(long)]
    pub output_dir: Option<PathBuf>,

    /// Regenerate every month, ignoring file timestamps
    #[arg(long)]
    pub force: bool,

    /// Enable debug-level log messages
    #[arg(long)]
    pub verbose: bool,
}

impl Config {
    /// Fail unless the data directory exists and is a directory.
    pub fn validate_data_dir(&self) -> Result<()> {
        if !self.data_dir.exists() {
            bail!(
                "Data directory does not exist: {} (create it and add your CSV files)",
                self.data_dir.display()
            );
        }
        if !self.data_dir.is_dir() {
            bail!("Data path is not a directory: {}", self.data_dir.display());
        }
        Ok(())
    }

    pub fn output_dir(&self) -> PathBuf {
        self.output_dir
            .clone()
            .unwrap_or_else(|| self.data_dir.join("output"))
    }
}
