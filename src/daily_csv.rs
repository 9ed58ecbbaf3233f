use anyhow::{Context, Result};
use chrono::{NaiveDate, NaiveDateTime};
use log::{debug, warn};
use std::fs;
use std::path::Path;

use crate::model::{DayData, MeasurementRecord};

/// Start of the row that separates the metadata header from the data section
/// (`DD.MM.YYYY HH:mm;kWh`).
pub const DATA_HEADER_PREFIX: &str = "DD.MM.YYYY HH:mm";
pub const DELIMITER: char = ';';
const TIMESTAMP_FORMAT: &str = "%d.%m.%Y %H:%M";

/// Result of looking at a single data line.
#[derive(Debug, Clone, PartialEq)]
pub enum LineOutcome {
    Record(MeasurementRecord),
    /// The line looked like data but could not be parsed.
    Skipped { reason: String },
    /// No date-time field; not data.
    Ignored,
}

/// Records of one file plus the lines that were dropped on the way.
#[derive(Debug, Default)]
pub struct ParsedDay {
    pub records: Vec<MeasurementRecord>,
    /// (1-based line number, reason)
    pub skipped: Vec<(usize, String)>,
}

impl ParsedDay {
    /// `None` when the file produced no records at all.
    pub fn into_day_data(self, date: NaiveDate) -> Option<DayData> {
        if self.records.is_empty() {
            None
        } else {
            Some(DayData {
                date,
                records: self.records,
            })
        }
    }
}

/// The daily exports are ISO-8859-1: every byte is its own code point.
pub fn decode_latin1(bytes: &[u8]) -> String {
    bytes.iter().map(|&b| char::from(b)).collect()
}

/// `12,500` -> `12.5`. Empty means no reading.
fn parse_value(raw: &str) -> Result<Option<f64>, String> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Ok(None);
    }
    let value: f64 = raw
        .replace(',', ".")
        .parse()
        .map_err(|e| format!("invalid value '{}': {}", raw, e))?;
    if !value.is_finite() || value < 0.0 {
        return Err(format!("value out of range '{}'", raw));
    }
    Ok(Some(value))
}

/// Parse one line of the data section.
pub fn parse_line(line: &str) -> LineOutcome {
    let mut fields = line.split(DELIMITER);
    let raw_ts = fields.next().unwrap_or("").trim();
    let raw_value = match fields.next() {
        Some(v) => v,
        None => return LineOutcome::Ignored,
    };
    if raw_ts.is_empty() {
        return LineOutcome::Ignored;
    }

    let timestamp = match NaiveDateTime::parse_from_str(raw_ts, TIMESTAMP_FORMAT) {
        Ok(ts) => ts,
        Err(e) => {
            return LineOutcome::Skipped {
                reason: format!("invalid timestamp '{}': {}", raw_ts, e),
            }
        }
    };

    match parse_value(raw_value) {
        Ok(value) => LineOutcome::Record(MeasurementRecord { timestamp, value }),
        Err(reason) => LineOutcome::Skipped { reason },
    }
}

/// Parse decoded file contents. Lines up to and including the data header are
/// metadata; blank lines are ignored everywhere.
pub fn parse_contents(contents: &str) -> ParsedDay {
    let mut parsed = ParsedDay::default();
    let mut in_data = false;

    for (idx, line) in contents.lines().enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        if !in_data {
            in_data = line.starts_with(DATA_HEADER_PREFIX);
            continue;
        }
        match parse_line(line) {
            LineOutcome::Record(record) => parsed.records.push(record),
            LineOutcome::Skipped { reason } => parsed.skipped.push((idx + 1, reason)),
            LineOutcome::Ignored => {}
        }
    }

    parsed
}

/// Parse a raw daily file. Returns `None` when it holds no usable data.
pub fn parse_bytes(bytes: &[u8], name: &str, date: NaiveDate) -> Option<DayData> {
    let parsed = parse_contents(&decode_latin1(bytes));

    for (line_no, reason) in &parsed.skipped {
        debug!("{}:{}: skipped line: {}", name, line_no, reason);
    }
    let foreign = parsed
        .records
        .iter()
        .filter(|r| r.timestamp.date() != date)
        .count();
    if foreign > 0 {
        debug!("{}: {} record(s) dated outside {}", name, foreign, date);
    }

    let skipped = parsed.skipped.len();
    match parsed.into_day_data(date) {
        Some(day) => {
            debug!(
                "Parsed {} records from {} ({} skipped)",
                day.records.len(),
                name,
                skipped
            );
            Some(day)
        }
        None => {
            warn!("No valid records found in {}", name);
            None
        }
    }
}

/// Read and parse one daily file from disk.
pub fn parse_file(path: &Path, date: NaiveDate) -> Result<Option<DayData>> {
    let bytes = fs::read(path).with_context(|| format!("Failed to read {}", path.display()))?;
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string());
    Ok(parse_bytes(&bytes, &name, date))
}
