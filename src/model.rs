use chrono::{Datelike, NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use std::fmt;

/// A calendar month. Orders by year, then month.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct YearMonth {
    pub year: i32,
    pub month: u32,
}

impl YearMonth {
    /// Returns `None` unless `month` is in 1..=12.
    pub fn new(year: i32, month: u32) -> Option<Self> {
        (1..=12).contains(&month).then_some(Self { year, month })
    }

    pub fn of(date: NaiveDate) -> Self {
        Self {
            year: date.year(),
            month: date.month(),
        }
    }

    /// Number of days in the month (28..=31).
    pub fn length(&self) -> u32 {
        let (next_year, next_month) = if self.month == 12 {
            (self.year + 1, 1)
        } else {
            (self.year, self.month + 1)
        };
        NaiveDate::from_ymd_opt(next_year, next_month, 1)
            .and_then(|next| next.pred_opt())
            .map(|last| last.day())
            .unwrap_or(30)
    }

    /// Every date of the month in ascending order.
    pub fn days(&self) -> Vec<NaiveDate> {
        (1..=self.length())
            .filter_map(|day| NaiveDate::from_ymd_opt(self.year, self.month, day))
            .collect()
    }
}

impl fmt::Display for YearMonth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}-{:02}", self.year, self.month)
    }
}

/// One row of a daily file. `value == None` means no reading at that instant.
#[derive(Debug, Clone, PartialEq)]
pub struct MeasurementRecord {
    pub timestamp: NaiveDateTime,
    pub value: Option<f64>,
}

/// All records of one day, in file order.
#[derive(Debug, Clone)]
pub struct DayData {
    pub date: NaiveDate,
    pub records: Vec<MeasurementRecord>,
}

impl DayData {
    /// First non-absent value in file order.
    pub fn first_reading(&self) -> Option<f64> {
        self.records.iter().find_map(|r| r.value)
    }

    /// Last non-absent value in file order.
    pub fn last_reading(&self) -> Option<f64> {
        self.records.iter().rev().find_map(|r| r.value)
    }

    pub fn measurement_count(&self) -> usize {
        self.records.iter().filter(|r| r.value.is_some()).count()
    }

    /// Production of a cumulative counter: last minus first, clamped at zero.
    /// Needs at least two readings.
    pub fn daily_total(&self) -> f64 {
        if self.measurement_count() < 2 {
            return 0.0;
        }
        match (self.first_reading(), self.last_reading()) {
            (Some(first), Some(last)) => (last - first).max(0.0),
            _ => 0.0,
        }
    }

    pub fn summary(&self) -> DaySummary {
        DaySummary {
            date: self.date,
            total_kwh: self.daily_total(),
            first_reading: self.first_reading(),
            last_reading: self.last_reading(),
            num_measurements: self.measurement_count(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DaySummary {
    pub date: NaiveDate,
    pub total_kwh: f64,
    pub first_reading: Option<f64>,
    pub last_reading: Option<f64>,
    pub num_measurements: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MonthSummary {
    pub year: i32,
    pub month: u32,
    pub label: String,
    pub summary_file: String,
    pub matrix_file: String,
    pub days: Vec<DaySummary>,
    pub total_month_kwh: f64,
}

impl MonthSummary {
    /// Build a month summary; days are sorted by date and totals summed.
    pub fn new(year_month: YearMonth, mut days: Vec<DaySummary>) -> Self {
        days.sort_by_key(|d| d.date);
        let total_month_kwh = days.iter().map(|d| d.total_kwh).sum();
        Self {
            year: year_month.year,
            month: year_month.month,
            label: crate::filename::month_label(year_month),
            summary_file: crate::filename::summary_file_name(year_month),
            matrix_file: crate::filename::matrix_file_name(year_month),
            days,
            total_month_kwh,
        }
    }

    pub fn year_month(&self) -> YearMonth {
        YearMonth {
            year: self.year,
            month: self.month,
        }
    }
}

/// The cross-month rollup read by the web dashboard.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardData {
    pub months: Vec<MonthSummary>,
    pub generated_at: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ts(h: u32, m: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2023, 11, 1)
            .unwrap()
            .and_hms_opt(h, m, 0)
            .unwrap()
    }

    fn day(values: &[(u32, u32, Option<f64>)]) -> DayData {
        DayData {
            date: NaiveDate::from_ymd_opt(2023, 11, 1).unwrap(),
            records: values
                .iter()
                .map(|&(h, m, value)| MeasurementRecord {
                    timestamp: ts(h, m),
                    value,
                })
                .collect(),
        }
    }

    #[test]
    fn total_is_last_minus_first() {
        let d = day(&[(0, 0, Some(12.5)), (12, 0, Some(14.0)), (23, 50, Some(15.75))]);
        assert!((d.daily_total() - 3.25).abs() < 0.001);
        assert_eq!(d.first_reading(), Some(12.5));
        assert_eq!(d.last_reading(), Some(15.75));
        assert_eq!(d.measurement_count(), 3);
    }

    #[test]
    fn absent_values_are_not_counted() {
        let d = day(&[
            (0, 0, None),
            (0, 10, Some(1.0)),
            (0, 20, None),
            (0, 30, Some(2.0)),
            (0, 40, None),
        ]);
        assert_eq!(d.measurement_count(), 2);
        assert_eq!(d.first_reading(), Some(1.0));
        assert_eq!(d.last_reading(), Some(2.0));
        assert!((d.daily_total() - 1.0).abs() < 0.001);
    }

    #[test]
    fn fewer_than_two_readings_totals_zero() {
        assert_eq!(day(&[]).daily_total(), 0.0);
        assert_eq!(day(&[(0, 0, None)]).daily_total(), 0.0);
        let single = day(&[(0, 0, None), (10, 0, Some(42.0))]);
        assert_eq!(single.daily_total(), 0.0);
        assert_eq!(single.first_reading(), Some(42.0));
        assert_eq!(single.last_reading(), Some(42.0));
    }

    #[test]
    fn counter_reset_clamps_to_zero() {
        let d = day(&[(0, 0, Some(100.0)), (23, 50, Some(3.0))]);
        assert_eq!(d.daily_total(), 0.0);
    }

    #[test]
    fn first_and_last_follow_file_order_not_time() {
        // Out-of-order rows: the later timestamp comes first in the file.
        let d = day(&[(23, 50, Some(10.0)), (0, 0, Some(15.0))]);
        assert_eq!(d.first_reading(), Some(10.0));
        assert_eq!(d.last_reading(), Some(15.0));
        assert!((d.daily_total() - 5.0).abs() < 0.001);
    }

    #[test]
    fn month_summary_sorts_and_sums() {
        let ym = YearMonth::new(2023, 11).unwrap();
        let mk = |d: u32, total: f64| DaySummary {
            date: NaiveDate::from_ymd_opt(2023, 11, d).unwrap(),
            total_kwh: total,
            first_reading: None,
            last_reading: None,
            num_measurements: 0,
        };
        let summary = MonthSummary::new(ym, vec![mk(3, 1.5), mk(1, 2.0), mk(2, 0.25)]);
        let dates: Vec<u32> = summary.days.iter().map(|d| d.date.day()).collect();
        assert_eq!(dates, vec![1, 2, 3]);
        assert!((summary.total_month_kwh - 3.75).abs() < 0.001);
        assert_eq!(summary.summary_file, "23-11-summary.csv");
        assert_eq!(summary.matrix_file, "23_11.csv");
        assert_eq!(summary.label, "November 2023");
        assert_eq!(summary.year_month(), ym);
    }

    #[test]
    fn month_lengths() {
        let len = |y, m| YearMonth::new(y, m).unwrap().length();
        assert_eq!(len(2023, 1), 31);
        assert_eq!(len(2023, 2), 28);
        assert_eq!(len(2024, 2), 29);
        assert_eq!(len(2023, 4), 30);
        assert_eq!(len(2023, 12), 31);
        assert_eq!(YearMonth::new(2023, 11).unwrap().days().len(), 30);
    }

    #[test]
    fn year_month_ordering_and_validation() {
        let a = YearMonth::new(2023, 12).unwrap();
        let b = YearMonth::new(2024, 1).unwrap();
        assert!(a < b);
        assert!(YearMonth::new(2023, 0).is_none());
        assert!(YearMonth::new(2023, 13).is_none());
        assert_eq!(a.to_string(), "2023-12");
    }

    #[test]
    fn json_field_names_are_camel_case() {
        let summary = DaySummary {
            date: NaiveDate::from_ymd_opt(2023, 11, 1).unwrap(),
            total_kwh: 3.25,
            first_reading: Some(12.5),
            last_reading: None,
            num_measurements: 2,
        };
        let json = serde_json::to_value(&summary).unwrap();
        assert_eq!(json["date"], "2023-11-01");
        assert_eq!(json["totalKwh"], 3.25);
        assert_eq!(json["firstReading"], 12.5);
        assert!(json["lastReading"].is_null());
        assert_eq!(json["numMeasurements"], 2);
    }
}
