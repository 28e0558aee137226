#![allow(dead_code)]

use chrono::NaiveDate;
use std::collections::BTreeMap;

use hindcast::domain::dates::{advance, parse_ymd, Frequency};
use hindcast::domain::error::HindcastError;
use hindcast::domain::frame::TimeSeriesFrame;
use hindcast::domain::model::{FitData, ForecastModel, PredictRow};
use hindcast::domain::recipe::WindowSpec;

pub fn monthly_dates(start: &str, n: usize) -> Vec<NaiveDate> {
    let start = parse_ymd(start).unwrap();
    (0..n)
        .map(|i| advance(start, Frequency::Monthly, i as u32))
        .collect()
}

pub fn monthly_frame(start: &str, columns: &[(&str, Vec<f64>)]) -> TimeSeriesFrame {
    let n = columns.first().map_or(0, |(_, v)| v.len());
    let cols: BTreeMap<String, Vec<f64>> = columns
        .iter()
        .map(|(name, values)| (name.to_string(), values.clone()))
        .collect();
    TimeSeriesFrame::new(monthly_dates(start, n), cols).unwrap()
}

pub fn window(start: Option<&str>, end: Option<&str>) -> WindowSpec {
    WindowSpec {
        start: start.map(|s| parse_ymd(s).unwrap()),
        end: end.map(|s| parse_ymd(s).unwrap()),
    }
}

/// Test model: remembers the largest target it saw during fit and predicts
/// it. On a strictly increasing series the forecast at origin `d` equals the
/// actual exactly when the training set ends at `d`'s own row, which makes
/// training-window leakage directly observable.
#[derive(Debug, Default)]
pub struct MaxSeenModel {
    max_y: f64,
}

impl MaxSeenModel {
    pub fn boxed() -> Box<dyn ForecastModel> {
        Box::new(MaxSeenModel { max_y: f64::NAN })
    }
}

impl ForecastModel for MaxSeenModel {
    fn name(&self) -> &'static str {
        "max_seen"
    }

    fn fit(&mut self, data: &FitData) -> Result<(), HindcastError> {
        self.max_y = data
            .y
            .iter()
            .copied()
            .filter(|v| v.is_finite())
            .fold(f64::NAN, f64::max);
        Ok(())
    }

    fn predict(&self, _row: &PredictRow) -> f64 {
        self.max_y
    }

    fn params(&self) -> serde_json::Value {
        serde_json::json!({ "max_y": self.max_y })
    }

    fn load_params(&mut self, params: &serde_json::Value) -> Result<(), HindcastError> {
        self.max_y = params
            .get("max_y")
            .and_then(serde_json::Value::as_f64)
            .unwrap_or(f64::NAN);
        Ok(())
    }
}
