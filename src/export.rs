//! Per-month output files: the daily summary (`YY-MM-summary.csv`) and the
//! time-by-day matrix (`YY_MM.csv`).

use anyhow::{Context, Result};
use chrono::{NaiveDate, NaiveTime, Timelike};
use csv::{ReaderBuilder, StringRecord, Trim, WriterBuilder};
use log::debug;
use std::collections::{BTreeMap, HashMap};
use std::fs::File;
use std::io::Write;
use std::path::Path;

use crate::model::{DayData, DaySummary, YearMonth};

pub const SUMMARY_COLUMNS: [&str; 5] = [
    "date",
    "total_kwh",
    "first_reading",
    "last_reading",
    "num_measurements",
];
pub const SUMMARY_DELIMITER: u8 = b';';
pub const MATRIX_TIME_LABEL: &str = "Uhrzeit";
pub const MATRIX_DELIMITER: u8 = b'\t';

pub const SLOT_MINUTES: u32 = 10;
pub const SLOTS_PER_DAY: u32 = 24 * 60 / SLOT_MINUTES;

/// Three decimals with a dot; `None` is an empty field.
pub fn format_decimal(value: Option<f64>) -> String {
    value.map(|v| format!("{:.3}", v)).unwrap_or_default()
}

/// Start time of a 10-minute slot in `0..SLOTS_PER_DAY`.
pub fn slot_time(slot: u32) -> Option<NaiveTime> {
    NaiveTime::from_hms_opt(slot / 6, (slot % 6) * SLOT_MINUTES, 0)
}

/// Slot index when `time` falls exactly on a slot boundary.
fn slot_of(time: NaiveTime) -> Option<u32> {
    let minute_of_day = time.hour() * 60 + time.minute();
    (time.second() == 0 && minute_of_day % SLOT_MINUTES == 0)
        .then_some(minute_of_day / SLOT_MINUTES)
}

/// Write the summary file, one row per day sorted by date.
pub fn write_summary(path: &Path, days: &[DaySummary]) -> Result<()> {
    let file =
        File::create(path).with_context(|| format!("Failed to create {}", path.display()))?;
    write_summary_to(file, days)
        .with_context(|| format!("Failed to write {}", path.display()))?;
    debug!("Exported summary to {}", path.display());
    Ok(())
}

pub fn write_summary_to<W: Write>(writer: W, days: &[DaySummary]) -> Result<()> {
    let mut sorted: Vec<&DaySummary> = days.iter().collect();
    sorted.sort_by_key(|d| d.date);

    let mut wtr = WriterBuilder::new()
        .delimiter(SUMMARY_DELIMITER)
        .from_writer(writer);
    wtr.write_record(SUMMARY_COLUMNS)?;
    for day in sorted {
        wtr.write_record([
            day.date.format("%Y-%m-%d").to_string(),
            format_decimal(Some(day.total_kwh)),
            format_decimal(day.first_reading),
            format_decimal(day.last_reading),
            day.num_measurements.to_string(),
        ])?;
    }
    wtr.flush()?;
    Ok(())
}

/// Parse one data row of a summary file.
pub fn parse_summary_record(record: &StringRecord) -> Result<DaySummary, String> {
    if record.len() < SUMMARY_COLUMNS.len() {
        return Err(format!("expected 5 fields, got {}", record.len()));
    }
    let field = |idx: usize| record.get(idx).unwrap_or("");

    let optional = |raw: &str| -> Result<Option<f64>, String> {
        if raw.is_empty() {
            Ok(None)
        } else {
            raw.parse()
                .map(Some)
                .map_err(|e| format!("invalid reading '{}': {}", raw, e))
        }
    };

    Ok(DaySummary {
        date: NaiveDate::parse_from_str(field(0), "%Y-%m-%d")
            .map_err(|e| format!("invalid date '{}': {}", field(0), e))?,
        total_kwh: field(1)
            .parse()
            .map_err(|e| format!("invalid total '{}': {}", field(1), e))?,
        first_reading: optional(field(2))?,
        last_reading: optional(field(3))?,
        num_measurements: field(4)
            .parse()
            .map_err(|e| format!("invalid count '{}': {}", field(4), e))?,
    })
}

/// Parse a whole summary file: header row, then data rows.
/// Bad rows are collected as (line, reason) instead of failing the file.
pub fn parse_summary(contents: &str) -> (Vec<DaySummary>, Vec<(u64, String)>) {
    let mut rdr = ReaderBuilder::new()
        .delimiter(SUMMARY_DELIMITER)
        .flexible(true)
        .trim(Trim::All)
        .from_reader(contents.as_bytes());

    let mut days = Vec::new();
    let mut bad = Vec::new();
    for result in rdr.records() {
        match result {
            Ok(record) => {
                let line = record.position().map(|p| p.line()).unwrap_or(0);
                match parse_summary_record(&record) {
                    Ok(day) => days.push(day),
                    Err(reason) => bad.push((line, reason)),
                }
            }
            Err(e) => {
                let line = e.position().map(|p| p.line()).unwrap_or(0);
                bad.push((line, e.to_string()));
            }
        }
    }
    (days, bad)
}

/// Write the 144-row matrix with one column per calendar day of `ym`.
pub fn write_matrix(path: &Path, ym: YearMonth, days: &BTreeMap<NaiveDate, DayData>) -> Result<()> {
    let file =
        File::create(path).with_context(|| format!("Failed to create {}", path.display()))?;
    write_matrix_to(file, ym, days)
        .with_context(|| format!("Failed to write {}", path.display()))?;
    debug!("Exported matrix to {}", path.display());
    Ok(())
}

pub fn write_matrix_to<W: Write>(
    writer: W,
    ym: YearMonth,
    days: &BTreeMap<NaiveDate, DayData>,
) -> Result<()> {
    let dates = ym.days();

    // (date, slot) -> value; later records in file order overwrite earlier ones.
    let mut cells: HashMap<(NaiveDate, u32), Option<f64>> = HashMap::new();
    for (date, day) in days {
        for record in &day.records {
            if let Some(slot) = slot_of(record.timestamp.time()) {
                cells.insert((*date, slot), record.value);
            }
        }
    }

    let mut wtr = WriterBuilder::new()
        .delimiter(MATRIX_DELIMITER)
        .from_writer(writer);

    let mut header = vec![MATRIX_TIME_LABEL.to_string()];
    header.extend(dates.iter().map(|d| d.format("%d.%m.%Y").to_string()));
    wtr.write_record(&header)?;

    for slot in 0..SLOTS_PER_DAY {
        let Some(time) = slot_time(slot) else {
            continue;
        };
        let mut row = Vec::with_capacity(dates.len() + 1);
        row.push(time.format("%H:%M").to_string());
        row.extend(
            dates
                .iter()
                .map(|date| format_decimal(cells.get(&(*date, slot)).copied().flatten())),
        );
        wtr.write_record(&row)?;
    }
    wtr.flush()?;
    Ok(())
}
