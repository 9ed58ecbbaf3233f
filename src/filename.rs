//! Mapping between daily file / month directory names and calendar dates.
//!
//! Years are exported by the device as two digits and always mean `20YY`.
//! There is no century window; callers that care about other centuries have
//! to supply that context themselves.

use chrono::NaiveDate;

use crate::model::YearMonth;

const CENTURY: i32 = 2000;

const MONTH_NAMES: [&str; 12] = [
    "Januar",
    "Februar",
    "März",
    "April",
    "Mai",
    "Juni",
    "Juli",
    "August",
    "September",
    "Oktober",
    "November",
    "Dezember",
];

/// Parse `NN` at `pos` as a two-digit number.
fn two_digits(bytes: &[u8], pos: usize) -> Option<u32> {
    let hi = bytes.get(pos).filter(|b| b.is_ascii_digit())?;
    let lo = bytes.get(pos + 1).filter(|b| b.is_ascii_digit())?;
    Some(u32::from(hi - b'0') * 10 + u32::from(lo - b'0'))
}

fn stem(filename: &str) -> &str {
    match filename.rfind('.') {
        Some(idx) => &filename[..idx],
        None => filename,
    }
}

/// Parse a daily file name like `23-11-01.csv`.
///
/// The name without extension must be exactly `YY-MM-DD` and form a valid
/// calendar date; anything else yields `None`.
pub fn parse_date(filename: &str) -> Option<NaiveDate> {
    let bytes = stem(filename).as_bytes();
    if bytes.len() != 8 || bytes[2] != b'-' || bytes[5] != b'-' {
        return None;
    }
    let yy = two_digits(bytes, 0)?;
    let mm = two_digits(bytes, 3)?;
    let dd = two_digits(bytes, 6)?;
    NaiveDate::from_ymd_opt(CENTURY + yy as i32, mm, dd)
}

/// Parse a month directory name like `23-11` or `23_11`.
pub fn parse_year_month(dirname: &str) -> Option<YearMonth> {
    let bytes = dirname.as_bytes();
    if bytes.len() != 5 || !matches!(bytes[2], b'-' | b'_') {
        return None;
    }
    let yy = two_digits(bytes, 0)?;
    let mm = two_digits(bytes, 3)?;
    YearMonth::new(CENTURY + yy as i32, mm)
}

fn two_digit_year(year: i32) -> i32 {
    year.rem_euclid(100)
}

/// Matrix file name, e.g. `23_11.csv`.
pub fn matrix_file_name(ym: YearMonth) -> String {
    format!("{:02}_{:02}.csv", two_digit_year(ym.year), ym.month)
}

/// Summary file name, e.g. `23-11-summary.csv`.
pub fn summary_file_name(ym: YearMonth) -> String {
    format!("{:02}-{:02}-summary.csv", two_digit_year(ym.year), ym.month)
}

/// Display label, e.g. `November 2023`.
pub fn month_label(ym: YearMonth) -> String {
    let name = MONTH_NAMES
        .get(ym.month.saturating_sub(1) as usize)
        .copied()
        .unwrap_or("?");
    format!("{} {}", name, ym.year)
}

/// True for a `.csv` extension in any letter case.
pub fn has_csv_extension(filename: &str) -> bool {
    filename
        .rsplit_once('.')
        .map(|(_, ext)| ext.eq_ignore_ascii_case("csv"))
        .unwrap_or(false)
}
