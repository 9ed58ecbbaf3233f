mod aggregator;
mod config;
mod daily_csv;
mod dashboard;
mod export;
mod filename;
mod logging;
mod model;
mod scanner;

use anyhow::Result;
use clap::Parser;
use log::{info, warn};
use std::path::PathBuf;

use crate::aggregator::{MonthlyAggregator, RunOutcome};
use crate::scanner::DataScanner;

fn main() -> Result<()> {
    let config = config::Config::parse();
    logging::init(config.verbose);

    config.validate_data_dir()?;
    info!("Starting sunnybeam-aggregator {}", env!("CARGO_PKG_VERSION"));
    info!("Data directory: {}", config.data_dir.display());
    info!("Force regeneration: {}", config.force);

    let target = run(&config)?;

    info!("Monthly files saved to: {}", config.data_dir.display());
    info!("Dashboard data saved to: {}", target.display());
    Ok(())
}

/// Scan, aggregate every month and replace the dashboard rollup.
/// The rollup is written even when nothing was found, so months whose data
/// disappeared are not carried over from a previous run.
fn run(config: &config::Config) -> Result<PathBuf> {
    let groups = DataScanner::new(&config.data_dir).scan_and_group_by_month()?;

    let outcome = if groups.is_empty() {
        warn!("No CSV files found in {}", config.data_dir.display());
        info!("{}", config::LAYOUT_HELP);
        RunOutcome::default()
    } else {
        info!("Found {} month(s) with data", groups.len());
        let aggregator = MonthlyAggregator::new(&config.data_dir, config.force);
        let outcome = aggregator.aggregate_all(&groups)?;
        info!(
            "Months processed: {}, up-to-date: {}, omitted from dashboard: {}",
            outcome.processed, outcome.skipped, outcome.omitted
        );
        outcome
    };

    dashboard::export(&config.output_dir(), outcome.summaries)
}
