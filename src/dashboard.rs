use anyhow::{Context, Result};
use chrono::Local;
use log::{debug, info};
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use crate::model::{DashboardData, MonthSummary};

pub const DASHBOARD_FILE_NAME: &str = "dashboard-data.json";

/// Assemble the rollup: months sorted by (year, month), stamped with the
/// local generation time.
pub fn build(mut months: Vec<MonthSummary>) -> DashboardData {
    months.sort_by_key(|m| m.year_month());
    DashboardData {
        months,
        generated_at: Local::now().format("%Y-%m-%dT%H:%M:%S%.3f").to_string(),
    }
}

/// Replace `<output_dir>/dashboard-data.json` with the rollup of `months`.
///
/// The document is written next to the target and renamed over it, so
/// readers see either the previous or the new rollup, never a partial one.
pub fn export(output_dir: &Path, months: Vec<MonthSummary>) -> Result<PathBuf> {
    fs::create_dir_all(output_dir)
        .with_context(|| format!("Failed to create {}", output_dir.display()))?;

    let data = build(months);
    let target = output_dir.join(DASHBOARD_FILE_NAME);
    let staging = output_dir.join(format!(".{}.tmp", DASHBOARD_FILE_NAME));

    {
        let file = File::create(&staging)
            .with_context(|| format!("Failed to create {}", staging.display()))?;
        let mut writer = BufWriter::new(file);
        serde_json::to_writer_pretty(&mut writer, &data)
            .context("Failed to serialize dashboard data to JSON")?;
        writer
            .flush()
            .with_context(|| format!("Failed to write {}", staging.display()))?;
    }
    fs::rename(&staging, &target)
        .with_context(|| format!("Failed to replace {}", target.display()))?;

    info!("Dashboard data exported to: {}", target.display());
    debug!(
        "Exported {} month(s) with {} days",
        data.months.len(),
        data.months.iter().map(|m| m.days.len()).sum::<usize>()
    );
    Ok(target)
}
