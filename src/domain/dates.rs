//! Date parsing, formatting, and period arithmetic.
//!
//! Observation dates accept ISO `YYYY-MM-DD` and the compact `YYYYMMDD` form.
//! Monthly/quarterly/yearly advances pin the day-of-month to 28 so every step
//! lands on a valid calendar date regardless of month length.

use chrono::{Datelike, Days, NaiveDate};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::domain::error::HindcastError;

/// Sampling frequency of an input series, by single-letter code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum Frequency {
    #[serde(rename = "D")]
    Daily,
    #[serde(rename = "W")]
    Weekly,
    #[serde(rename = "M")]
    #[default]
    Monthly,
    #[serde(rename = "Q")]
    Quarterly,
    #[serde(rename = "Y")]
    Yearly,
}

impl Frequency {
    pub fn code(&self) -> &'static str {
        match self {
            Frequency::Daily => "D",
            Frequency::Weekly => "W",
            Frequency::Monthly => "M",
            Frequency::Quarterly => "Q",
            Frequency::Yearly => "Y",
        }
    }
}

impl fmt::Display for Frequency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

/// Parse `YYYY-MM-DD`, falling back to compact `YYYYMMDD`.
pub fn parse_ymd(s: &str) -> Result<NaiveDate, HindcastError> {
    let s = s.trim();
    let parsed = if s.len() == 8 && s.chars().all(|c| c.is_ascii_digit()) {
        NaiveDate::parse_from_str(s, "%Y%m%d")
    } else {
        NaiveDate::parse_from_str(s, "%Y-%m-%d")
    };
    parsed.map_err(|e| HindcastError::Data {
        reason: format!("invalid date {s:?}: {e}"),
    })
}

pub fn format_ymd(d: NaiveDate) -> String {
    d.format("%Y-%m-%d").to_string()
}

/// Advance a date by `steps` periods at the given frequency.
///
/// Month-based frequencies return day 28 of the resulting month.
pub fn advance(date: NaiveDate, freq: Frequency, steps: u32) -> NaiveDate {
    match freq {
        Frequency::Daily => date + Days::new(u64::from(steps)),
        Frequency::Weekly => date + Days::new(u64::from(steps) * 7),
        Frequency::Monthly => advance_months(date, steps),
        Frequency::Quarterly => advance_months(date, steps * 3),
        Frequency::Yearly => advance_months(date, steps * 12),
    }
}

fn advance_months(date: NaiveDate, months: u32) -> NaiveDate {
    let total = date.year() * 12 + date.month0() as i32 + months as i32;
    let year = total.div_euclid(12);
    let month0 = total.rem_euclid(12) as u32;
    // Day 28 exists in every month.
    NaiveDate::from_ymd_opt(year, month0 + 1, 28).unwrap_or(date)
}

/// Serde adapter for `NaiveDate` fields stored as `YYYY-MM-DD` strings.
pub mod ymd {
    use super::{format_ymd, parse_ymd};
    use chrono::NaiveDate;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(v: &NaiveDate, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&format_ymd(*v))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<NaiveDate, D::Error> {
        let raw = String::deserialize(d)?;
        parse_ymd(&raw).map_err(|e| serde::de::Error::custom(e.to_string()))
    }
}
