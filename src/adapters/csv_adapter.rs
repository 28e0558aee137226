//! CSV file data adapter.
//!
//! One date column plus any number of numeric series columns. Cells that do
//! not parse as numbers (including empty cells) become NaN; missing data is
//! a property of a series, not a load error. Rows are sorted by date and
//! duplicate dates keep the last occurrence.

use chrono::NaiveDate;
use std::collections::BTreeMap;
use std::fs;
use std::path::PathBuf;

use crate::domain::dates::parse_ymd;
use crate::domain::error::HindcastError;
use crate::domain::frame::TimeSeriesFrame;
use crate::domain::recipe::DataSpec;
use crate::ports::data_port::DataPort;

pub struct CsvAdapter {
    base_path: Option<PathBuf>,
}

impl CsvAdapter {
    pub fn new() -> Self {
        Self { base_path: None }
    }

    /// Resolve relative data paths against this directory (usually the
    /// recipe file's parent).
    pub fn with_base_path(base_path: PathBuf) -> Self {
        Self {
            base_path: Some(base_path),
        }
    }

    fn resolve(&self, path: &std::path::Path) -> PathBuf {
        match &self.base_path {
            Some(base) if path.is_relative() => base.join(path),
            _ => path.to_path_buf(),
        }
    }
}

impl Default for CsvAdapter {
    fn default() -> Self {
        Self::new()
    }
}

impl DataPort for CsvAdapter {
    fn load_frame(
        &self,
        spec: &DataSpec,
        as_of: Option<NaiveDate>,
    ) -> Result<TimeSeriesFrame, HindcastError> {
        let path = self.resolve(&spec.path);
        let content = fs::read_to_string(&path).map_err(|e| HindcastError::Data {
            reason: format!("failed to read {}: {}", path.display(), e),
        })?;

        let mut rdr = csv::Reader::from_reader(content.as_bytes());
        let headers = rdr
            .headers()
            .map_err(|e| HindcastError::Data {
                reason: format!("CSV header error in {}: {}", path.display(), e),
            })?
            .clone();

        let date_idx = headers
            .iter()
            .position(|h| h.trim() == spec.date_col)
            .ok_or_else(|| HindcastError::Data {
                reason: format!(
                    "date column {:?} not found in {}",
                    spec.date_col,
                    path.display()
                ),
            })?;
        let value_cols: Vec<(usize, String)> = headers
            .iter()
            .enumerate()
            .filter(|(i, _)| *i != date_idx)
            .map(|(i, h)| (i, h.trim().to_string()))
            .collect();
        if value_cols.is_empty() {
            return Err(HindcastError::Data {
                reason: format!("{} has no series columns", path.display()),
            });
        }

        // date -> row values; BTreeMap sorts and keeps the last duplicate.
        let mut rows: BTreeMap<NaiveDate, Vec<f64>> = BTreeMap::new();
        for result in rdr.records() {
            let record = result.map_err(|e| HindcastError::Data {
                reason: format!("CSV parse error in {}: {}", path.display(), e),
            })?;
            let raw_date = record.get(date_idx).unwrap_or("").trim();
            if raw_date.is_empty() {
                continue;
            }
            let date = parse_ymd(raw_date)?;
            if as_of.is_some_and(|cutoff| date > cutoff) {
                continue;
            }
            let values: Vec<f64> = value_cols
                .iter()
                .map(|(i, _)| {
                    record
                        .get(*i)
                        .and_then(|cell| cell.trim().parse::<f64>().ok())
                        .unwrap_or(f64::NAN)
                })
                .collect();
            rows.insert(date, values);
        }

        if rows.is_empty() {
            return Err(HindcastError::Data {
                reason: format!("{} has no usable rows", path.display()),
            });
        }

        let dates: Vec<NaiveDate> = rows.keys().copied().collect();
        let columns: BTreeMap<String, Vec<f64>> = value_cols
            .iter()
            .enumerate()
            .map(|(pos, (_, name))| {
                let series: Vec<f64> = rows.values().map(|vals| vals[pos]).collect();
                (name.clone(), series)
            })
            .collect();
        TimeSeriesFrame::new(dates, columns)
    }
}
