use anyhow::Result;
use chrono::NaiveDate;
use log::{debug, info, warn};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use crate::daily_csv;
use crate::export;
use crate::filename;
use crate::model::{DayData, MonthSummary, YearMonth};
use crate::scanner::MonthlyGroups;

/// A freshly parsed month: its summary plus the raw days needed for the matrix.
#[derive(Debug)]
pub struct MonthResult {
    pub summary: MonthSummary,
    pub days: BTreeMap<NaiveDate, DayData>,
}

/// What a batch run did.
#[derive(Debug, Default)]
pub struct RunOutcome {
    /// Summaries for the rollup, in ascending month order.
    pub summaries: Vec<MonthSummary>,
    pub processed: usize,
    pub skipped: usize,
    /// Fresh months whose summary file could not be reloaded.
    pub omitted: usize,
}

/// Outputs are stale when any input is strictly newer than the older of the
/// two output files.
pub fn is_stale(
    summary_mtime: SystemTime,
    matrix_mtime: SystemTime,
    inputs: impl IntoIterator<Item = SystemTime>,
) -> bool {
    let baseline = summary_mtime.min(matrix_mtime);
    inputs.into_iter().any(|input| input > baseline)
}

fn modified(path: &Path) -> Option<SystemTime> {
    fs::metadata(path).and_then(|m| m.modified()).ok()
}

pub struct MonthlyAggregator {
    data_dir: PathBuf,
    force: bool,
}

impl MonthlyAggregator {
    pub fn new<P: Into<PathBuf>>(data_dir: P, force: bool) -> Self {
        Self {
            data_dir: data_dir.into(),
            force,
        }
    }

    fn summary_path(&self, ym: YearMonth) -> PathBuf {
        self.data_dir.join(filename::summary_file_name(ym))
    }

    fn matrix_path(&self, ym: YearMonth) -> PathBuf {
        self.data_dir.join(filename::matrix_file_name(ym))
    }

    /// Decide whether the month's outputs need regenerating.
    pub fn should_process_month(&self, ym: YearMonth, daily_files: &[PathBuf]) -> bool {
        let (Some(summary_mtime), Some(matrix_mtime)) =
            (modified(&self.summary_path(ym)), modified(&self.matrix_path(ym)))
        else {
            debug!("Output files for {} missing, processing required", ym);
            return true;
        };

        let mut inputs = Vec::with_capacity(daily_files.len());
        for file in daily_files {
            match modified(file) {
                Some(mtime) => inputs.push(mtime),
                None => {
                    debug!("Cannot read mtime of {}, treating as changed", file.display());
                    return true;
                }
            }
        }

        let stale = is_stale(summary_mtime, matrix_mtime, inputs.iter().copied());
        if stale {
            let baseline = summary_mtime.min(matrix_mtime);
            let newer = inputs.iter().filter(|&&t| t > baseline).count();
            debug!("Found {} daily file(s) newer than output files", newer);
        }
        stale
    }

    /// Parse every daily file of the month. Files without usable data or
    /// that cannot be read are left out of the month.
    pub fn process_month(&self, ym: YearMonth, daily_files: &[PathBuf]) -> MonthResult {
        let mut days = BTreeMap::new();

        for file in daily_files {
            let Some(date) = file
                .file_name()
                .and_then(|n| filename::parse_date(&n.to_string_lossy()))
            else {
                continue;
            };
            match daily_csv::parse_file(file, date) {
                Ok(Some(day)) => {
                    debug!(
                        "Parsed {}: {} measurements",
                        file.display(),
                        day.measurement_count()
                    );
                    if days.insert(date, day).is_some() {
                        warn!(
                            "Duplicate input for {}: {} replaces an earlier file",
                            date,
                            file.display()
                        );
                    }
                }
                Ok(None) => {}
                Err(e) => warn!("Skipping {}: {:#}", file.display(), e),
            }
        }

        let summary = MonthSummary::new(ym, days.values().map(DayData::summary).collect());
        MonthResult { summary, days }
    }

    /// Write the summary and matrix files of a processed month.
    pub fn export_month(&self, result: &MonthResult) -> Result<()> {
        let ym = result.summary.year_month();
        export::write_summary(
            &self.data_dir.join(&result.summary.summary_file),
            &result.summary.days,
        )?;
        export::write_matrix(
            &self.data_dir.join(&result.summary.matrix_file),
            ym,
            &result.days,
        )?;
        Ok(())
    }

    /// Rebuild a fresh month's summary from its exported summary file.
    /// Returns `None` when the file is missing, unreadable or has no valid rows.
    pub fn load_existing_summary(&self, ym: YearMonth) -> Option<MonthSummary> {
        let path = self.summary_path(ym);
        let contents = match fs::read_to_string(&path) {
            Ok(c) => c,
            Err(e) => {
                warn!("Failed to load existing summary {}: {}", path.display(), e);
                return None;
            }
        };

        let (days, bad) = export::parse_summary(&contents);
        for (line_no, reason) in &bad {
            debug!("{}:{}: skipped summary row: {}", path.display(), line_no, reason);
        }
        if days.is_empty() {
            warn!("No usable rows in {}", path.display());
            return None;
        }
        Some(MonthSummary::new(ym, days))
    }

    /// Run every month in ascending order and collect the rollup input.
    pub fn aggregate_all(&self, groups: &MonthlyGroups) -> Result<RunOutcome> {
        let mut outcome = RunOutcome::default();

        for (ym, files) in groups {
            info!("Processing {} ({} daily file(s))...", ym, files.len());

            let dirty = if self.force {
                info!("  Force mode: regenerating all files");
                true
            } else {
                self.should_process_month(*ym, files)
            };

            if dirty {
                let result = self.process_month(*ym, files);
                self.export_month(&result)?;
                info!(
                    "  Month processed: {} day(s), {:.3} kWh",
                    result.summary.days.len(),
                    result.summary.total_month_kwh
                );
                outcome.summaries.push(result.summary);
                outcome.processed += 1;
            } else {
                outcome.skipped += 1;
                match self.load_existing_summary(*ym) {
                    Some(summary) => {
                        outcome.summaries.push(summary);
                        info!("  Skipped (already up-to-date)");
                    }
                    None => {
                        outcome.omitted += 1;
                        warn!(
                            "  Skipped (up-to-date) but summary could not be reloaded; \
                             omitted from dashboard"
                        );
                    }
                }
            }
        }

        Ok(outcome)
    }
}
