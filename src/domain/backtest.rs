//! Rolling-origin backtest engine.
//!
//! The supervised set is split by origin date into train and test spans.
//! `frozen` fits once on the train span and scores every test origin with
//! that single fit; `refit` re-fits a fresh model for every test origin on
//! all rows from the train start up to and including that origin, so each
//! forecast uses exactly the history available at its origin.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::domain::dates::{advance, Frequency};
use crate::domain::error::HindcastError;
use crate::domain::features::SupervisedSet;
use crate::domain::metrics::{rmse_mae, Accuracy};
use crate::domain::model::{FitData, ForecastModel, PredictRow};
use crate::domain::recipe::WindowSpec;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Strategy {
    #[default]
    Frozen,
    Refit,
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Strategy::Frozen => f.write_str("frozen"),
            Strategy::Refit => f.write_str("refit"),
        }
    }
}

/// One scored test origin.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BacktestRow {
    #[serde(with = "crate::domain::dates::ymd")]
    pub origin_date: NaiveDate,
    #[serde(with = "crate::domain::dates::ymd")]
    pub target_date: NaiveDate,
    pub horizon: u32,
    #[serde(with = "crate::domain::metrics::nan_as_null")]
    pub y_t: f64,
    #[serde(with = "crate::domain::metrics::nan_as_null")]
    pub forecast: f64,
    #[serde(with = "crate::domain::metrics::nan_as_null")]
    pub actual: f64,
    /// `actual - forecast`; NaN when either side is.
    #[serde(with = "crate::domain::metrics::nan_as_null")]
    pub error: f64,
}

#[derive(Debug)]
pub struct BacktestOutcome {
    pub rows: Vec<BacktestRow>,
    pub accuracy: Accuracy,
    /// Fitted state of the final model (the single frozen fit, or the last
    /// refit). `Null` when nothing was fitted.
    pub fitted_params: serde_json::Value,
}

/// Everything a single backtest produced for one horizon.
#[derive(Debug, Serialize, Deserialize)]
pub struct HorizonResult {
    pub horizon: u32,
    pub accuracy: Accuracy,
    pub model_params: serde_json::Value,
    pub rows: Vec<BacktestRow>,
}

/// Complete result of one model/feature-variant evaluation across all
/// requested horizons. This is the unit of caching and of output writing.
#[derive(Debug, Serialize, Deserialize)]
pub struct RunResult {
    pub model_name: String,
    pub strategy: Strategy,
    pub feature_desc: String,
    pub horizons: Vec<HorizonResult>,
}

type ModelFactory<'a> = &'a dyn Fn() -> Result<Box<dyn ForecastModel>, HindcastError>;

/// Index range of origins inside the inclusive `[start, end]` window. Dates
/// in the set are ascending, so windows are contiguous slices.
fn window_range(
    dates: &[NaiveDate],
    start: Option<NaiveDate>,
    end: Option<NaiveDate>,
) -> (usize, usize) {
    let lo = match start {
        Some(s) => dates.partition_point(|d| *d < s),
        None => 0,
    };
    let hi = match end {
        Some(e) => dates.partition_point(|d| *d <= e),
        None => dates.len(),
    };
    (lo, hi.max(lo))
}

/// Test span. An absent bound is unbounded, so a recipe with no windows
/// scores every origin. The one convenience on top of the plain window: when
/// `test.start` is unset but `train.end` is given, testing begins strictly
/// after the train end.
fn test_range(dates: &[NaiveDate], train: &WindowSpec, test: &WindowSpec) -> (usize, usize) {
    match (test.start, train.end) {
        (None, Some(train_end)) => {
            let lo = dates.partition_point(|d| *d <= train_end);
            let (_, hi) = window_range(dates, None, test.end);
            (lo, hi.max(lo))
        }
        _ => window_range(dates, test.start, test.end),
    }
}

fn fit_slice(
    model: &mut dyn ForecastModel,
    set: &SupervisedSet,
    lo: usize,
    hi: usize,
    horizon: u32,
) -> Result<(), HindcastError> {
    model.fit(&FitData {
        x: &set.x[lo..hi],
        y: &set.y[lo..hi],
        y_t: &set.y_t[lo..hi],
        horizon,
    })
}

fn score_row(
    model: &dyn ForecastModel,
    set: &SupervisedSet,
    i: usize,
    horizon: u32,
    frequency: Frequency,
) -> BacktestRow {
    let forecast = model.predict(&PredictRow {
        x: &set.x[i],
        y_t: set.y_t[i],
    });
    let actual = set.y[i];
    BacktestRow {
        origin_date: set.origin_dates[i],
        target_date: advance(set.origin_dates[i], frequency, horizon),
        horizon,
        y_t: set.y_t[i],
        forecast,
        actual,
        error: actual - forecast,
    }
}

/// Run one backtest over an assembled supervised set. An empty train or
/// test span is not an error; it yields no rows and NaN accuracy.
pub fn run_backtest(
    make_model: ModelFactory,
    set: &SupervisedSet,
    horizon: u32,
    frequency: Frequency,
    strategy: Strategy,
    train: &WindowSpec,
    test: &WindowSpec,
) -> Result<BacktestOutcome, HindcastError> {
    let dates = set.origin_dates.as_slice();
    let (train_lo, train_hi) = window_range(dates, train.start, train.end);
    let (test_lo, test_hi) = test_range(dates, train, test);

    let mut rows = Vec::with_capacity(test_hi - test_lo);
    let mut fitted_params = serde_json::Value::Null;

    match strategy {
        Strategy::Frozen => {
            if train_hi > train_lo {
                let mut model = make_model()?;
                fit_slice(model.as_mut(), set, train_lo, train_hi, horizon)?;
                for i in test_lo..test_hi {
                    rows.push(score_row(model.as_ref(), set, i, horizon, frequency));
                }
                fitted_params = model.params();
            }
        }
        Strategy::Refit => {
            for i in test_lo..test_hi {
                // Causal train set: everything from the train start through
                // this origin itself.
                let hi = i + 1;
                let lo = train_lo.min(hi);
                let mut model = make_model()?;
                fit_slice(model.as_mut(), set, lo, hi, horizon)?;
                rows.push(score_row(model.as_ref(), set, i, horizon, frequency));
                fitted_params = model.params();
            }
        }
    }

    let forecasts: Vec<f64> = rows.iter().map(|r| r.forecast).collect();
    let actuals: Vec<f64> = rows.iter().map(|r| r.actual).collect();
    Ok(BacktestOutcome {
        accuracy: rmse_mae(&forecasts, &actuals),
        rows,
        fitted_params,
    })
}
