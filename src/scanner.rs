use anyhow::{Context, Result};
use log::debug;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use crate::filename;
use crate::model::YearMonth;

/// Daily input files grouped by month, both in ascending order.
pub type MonthlyGroups = BTreeMap<YearMonth, Vec<PathBuf>>;

/// Finds daily files under a data directory.
///
/// Two layouts are read at the same time:
/// - `<root>/YY-MM-DD.csv`
/// - `<root>/YY-MM/YY-MM-DD.csv` (also `YY_MM`); files whose date does not
///   fall in the directory's month are ignored.
pub struct DataScanner {
    root: PathBuf,
}

impl DataScanner {
    pub fn new<P: Into<PathBuf>>(root: P) -> Self {
        Self { root: root.into() }
    }

    pub fn scan_and_group_by_month(&self) -> Result<MonthlyGroups> {
        let mut groups = MonthlyGroups::new();

        for entry in read_dir_sorted(&self.root)? {
            let name = file_name(&entry);
            if entry.is_dir() {
                if let Some(ym) = filename::parse_year_month(&name) {
                    self.scan_month_dir(&entry, ym, &mut groups)?;
                }
            } else if let Some(ym) = daily_file_month(&entry, &name) {
                debug!("Found daily file: {} -> {}", name, ym);
                groups.entry(ym).or_default().push(entry);
            }
        }

        for files in groups.values_mut() {
            files.sort_by_key(|p| p.file_name().map(|n| n.to_os_string()));
        }

        Ok(groups)
    }

    fn scan_month_dir(&self, dir: &Path, ym: YearMonth, groups: &mut MonthlyGroups) -> Result<()> {
        let dir_name = file_name(dir);
        for entry in read_dir_sorted(dir)? {
            let name = file_name(&entry);
            match daily_file_month(&entry, &name) {
                Some(file_ym) if file_ym == ym => {
                    debug!("Found daily file: {}/{} -> {}", dir_name, name, ym);
                    groups.entry(ym).or_default().push(entry);
                }
                Some(file_ym) => {
                    debug!(
                        "Ignoring {}/{}: dated {} but filed under {}",
                        dir_name, name, file_ym, ym
                    );
                }
                None => {}
            }
        }
        Ok(())
    }
}

fn daily_file_month(path: &Path, name: &str) -> Option<YearMonth> {
    if !path.is_file() || !filename::has_csv_extension(name) {
        return None;
    }
    filename::parse_date(name).map(YearMonth::of)
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}

fn read_dir_sorted(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut entries = fs::read_dir(dir)
        .with_context(|| format!("Failed to list {}", dir.display()))?
        .map(|entry| entry.map(|e| e.path()))
        .collect::<std::io::Result<Vec<_>>>()
        .with_context(|| format!("Failed to read entry in {}", dir.display()))?;
    entries.sort();
    Ok(entries)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn touch(path: &Path) {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(path, "DD.MM.YYYY HH:mm;kWh\n").unwrap();
    }

    fn names(files: &[PathBuf]) -> Vec<String> {
        files.iter().map(|p| file_name(p)).collect()
    }

    fn ym(year: i32, month: u32) -> YearMonth {
        YearMonth::new(year, month).unwrap()
    }

    #[test]
    fn flat_layout() {
        let tmp = tempfile::tempdir().unwrap();
        touch(&tmp.path().join("23-11-02.csv"));
        touch(&tmp.path().join("23-11-01.csv"));
        touch(&tmp.path().join("23-12-01.CSV"));

        let groups = DataScanner::new(tmp.path()).scan_and_group_by_month().unwrap();
        assert_eq!(groups.len(), 2);
        assert_eq!(
            names(&groups[&ym(2023, 11)]),
            vec!["23-11-01.csv", "23-11-02.csv"]
        );
        assert_eq!(names(&groups[&ym(2023, 12)]), vec!["23-12-01.CSV"]);
    }

    #[test]
    fn nested_and_flat_layouts_merge() {
        let tmp = tempfile::tempdir().unwrap();
        touch(&tmp.path().join("23-11").join("23-11-03.csv"));
        touch(&tmp.path().join("23_11").join("23-11-02.csv"));
        touch(&tmp.path().join("23-11-01.csv"));
        touch(&tmp.path().join("24-01").join("24-01-15.csv"));

        let groups = DataScanner::new(tmp.path()).scan_and_group_by_month().unwrap();
        let months: Vec<YearMonth> = groups.keys().copied().collect();
        assert_eq!(months, vec![ym(2023, 11), ym(2024, 1)]);
        assert_eq!(
            names(&groups[&ym(2023, 11)]),
            vec!["23-11-01.csv", "23-11-02.csv", "23-11-03.csv"]
        );
    }

    #[test]
    fn mismatched_file_in_month_dir_is_excluded() {
        let tmp = tempfile::tempdir().unwrap();
        touch(&tmp.path().join("23-11").join("23-12-01.csv"));
        touch(&tmp.path().join("23-11").join("23-11-05.csv"));

        let groups = DataScanner::new(tmp.path()).scan_and_group_by_month().unwrap();
        assert_eq!(groups.len(), 1);
        assert_eq!(names(&groups[&ym(2023, 11)]), vec!["23-11-05.csv"]);
    }

    #[test]
    fn empty_month_dir_never_appears() {
        let tmp = tempfile::tempdir().unwrap();
        fs::create_dir_all(tmp.path().join("23-10")).unwrap();
        touch(&tmp.path().join("23-10").join("notes.csv"));
        touch(&tmp.path().join("23-10").join("23-10-01.txt"));

        let groups = DataScanner::new(tmp.path()).scan_and_group_by_month().unwrap();
        assert!(groups.is_empty());
    }

    #[test]
    fn outputs_and_foreign_files_are_ignored() {
        let tmp = tempfile::tempdir().unwrap();
        touch(&tmp.path().join("23-11-summary.csv"));
        touch(&tmp.path().join("23_11.csv"));
        touch(&tmp.path().join("readme.txt"));
        touch(&tmp.path().join("output").join("dashboard-data.json"));
        touch(&tmp.path().join("misc").join("23-11-01.csv"));
        fs::create_dir_all(tmp.path().join("23-11-09.csv")).unwrap();

        let groups = DataScanner::new(tmp.path()).scan_and_group_by_month().unwrap();
        assert!(groups.is_empty());
    }

    #[test]
    fn missing_root_is_an_error() {
        let tmp = tempfile::tempdir().unwrap();
        assert!(DataScanner::new(tmp.path().join("gone"))
            .scan_and_group_by_month()
            .is_err());
    }
}
