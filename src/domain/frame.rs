//! Column-oriented, dated numeric table.

use chrono::NaiveDate;
use std::collections::BTreeMap;

use crate::domain::error::HindcastError;

/// An ordered sequence of dates plus equal-length float columns.
///
/// Missing or unparsable cells are NaN. The frame is immutable after
/// construction; [`TimeSeriesFrame::subset`] clones the kept columns so the
/// result shares no mutable state with the original.
#[derive(Debug, Clone)]
pub struct TimeSeriesFrame {
    dates: Vec<NaiveDate>,
    columns: BTreeMap<String, Vec<f64>>,
}

impl TimeSeriesFrame {
    pub fn new(
        dates: Vec<NaiveDate>,
        columns: BTreeMap<String, Vec<f64>>,
    ) -> Result<Self, HindcastError> {
        for (name, vals) in &columns {
            if vals.len() != dates.len() {
                return Err(HindcastError::Data {
                    reason: format!(
                        "column {} has {} values for {} dates",
                        name,
                        vals.len(),
                        dates.len()
                    ),
                });
            }
        }
        if !dates.is_sorted() {
            return Err(HindcastError::Data {
                reason: "dates are not in ascending order".into(),
            });
        }
        Ok(Self { dates, columns })
    }

    pub fn len(&self) -> usize {
        self.dates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.dates.is_empty()
    }

    pub fn dates(&self) -> &[NaiveDate] {
        &self.dates
    }

    pub fn column(&self, name: &str) -> Option<&[f64]> {
        self.columns.get(name).map(Vec::as_slice)
    }

    /// Column names in sorted order.
    pub fn column_names(&self) -> impl Iterator<Item = &str> {
        self.columns.keys().map(String::as_str)
    }

    pub fn column_count(&self) -> usize {
        self.columns.len()
    }

    /// New frame holding only the named columns. Unknown names are skipped.
    pub fn subset(&self, keep: &[String]) -> TimeSeriesFrame {
        let columns = self
            .columns
            .iter()
            .filter(|(name, _)| keep.contains(name))
            .map(|(name, vals)| (name.clone(), vals.clone()))
            .collect();
        TimeSeriesFrame {
            dates: self.dates.clone(),
            columns,
        }
    }
}
