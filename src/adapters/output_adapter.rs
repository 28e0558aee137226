//! Run output management.
//!
//! Every evaluation writes into its own timestamped directory under the
//! output base:
//!
//! ```text
//! <base>/naive_20240828_153000/
//!     artifacts/feature_manifest.json
//!     models/model_h<horizon>.json
//!     forecasts/backtest.csv
//!     metrics/metrics.csv
//!     lineage.json
//! ```
//!
//! Run names start with the model label so `predict` can find the newest
//! trained run for a model by prefix.
//!
//! `lineage.json` records how the run was produced: recipe, model, data
//! fingerprint, cache key, and whether the result came from cache.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::domain::backtest::{BacktestRow, RunResult, Strategy};
use crate::domain::dates::{format_ymd, Frequency};
use crate::domain::error::HindcastError;
use crate::domain::features::FeatureManifest;

#[derive(Debug, Serialize, Deserialize)]
pub struct Lineage {
    pub created_at: DateTime<Utc>,
    pub recipe_file: String,
    pub target_id: String,
    pub model_name: String,
    pub model_params: serde_json::Value,
    pub strategy: Strategy,
    pub frequency: Frequency,
    pub horizons: Vec<u32>,
    pub feature_desc: String,
    pub data_fingerprint: String,
    pub cache_key: String,
    pub cache_hit: bool,
}

/// One line of the batch-level `metrics_summary.csv`.
#[derive(Debug)]
pub struct SummaryRow {
    pub model_name: String,
    pub strategy: Strategy,
    pub feature_desc: String,
    pub horizon: u32,
    pub rmse: f64,
    pub mae: f64,
    pub run_dir: String,
    pub cache_hit: bool,
}

pub struct OutputManager {
    run_dir: PathBuf,
}

/// On-disk form of one horizon's fitted model.
#[derive(Debug, Serialize, Deserialize)]
pub struct SavedModel {
    pub plugin: String,
    pub params: serde_json::Value,
}

fn io_err(path: &Path, e: impl std::fmt::Display) -> HindcastError {
    HindcastError::Data {
        reason: format!("output error at {}: {}", path.display(), e),
    }
}

fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<(), HindcastError> {
    let json = serde_json::to_string_pretty(value).map_err(|e| io_err(path, e))?;
    fs::write(path, json).map_err(|e| io_err(path, e))
}

fn fmt_cell(v: f64) -> String {
    if v.is_finite() {
        format!("{v}")
    } else {
        String::new()
    }
}

impl OutputManager {
    /// Create a fresh run directory with the standard subdirectories. A
    /// collision with an existing directory (two runs in the same second)
    /// gets a numeric suffix.
    pub fn create_run(base_dir: &Path, label: &str) -> Result<Self, HindcastError> {
        let stamp = Utc::now().format("%Y%m%d_%H%M%S");
        let mut name = format!("{label}_{stamp}");
        let mut attempt = 1u32;
        while base_dir.join(&name).exists() {
            attempt += 1;
            name = format!("{label}_{stamp}_{attempt}");
        }
        let run_dir = base_dir.join(name);
        for sub in ["artifacts", "models", "forecasts", "metrics"] {
            fs::create_dir_all(run_dir.join(sub)).map_err(|e| io_err(&run_dir, e))?;
        }
        Ok(Self { run_dir })
    }

    /// Reopen an existing run directory (used by `predict`).
    pub fn open(run_dir: PathBuf) -> Self {
        Self { run_dir }
    }

    pub fn run_dir(&self) -> &Path {
        &self.run_dir
    }

    /// One `{plugin, params}` JSON file per horizon under `models/`.
    pub fn save_model_params(
        &self,
        horizon: u32,
        plugin_name: &str,
        params: &serde_json::Value,
    ) -> Result<(), HindcastError> {
        let path = self.run_dir.join("models").join(format!("model_h{horizon}.json"));
        write_json(
            &path,
            &SavedModel {
                plugin: plugin_name.to_string(),
                params: params.clone(),
            },
        )
    }

    pub fn load_model_params(&self, horizon: u32) -> Result<SavedModel, HindcastError> {
        let path = self.run_dir.join("models").join(format!("model_h{horizon}.json"));
        let content = fs::read_to_string(&path).map_err(|e| io_err(&path, e))?;
        serde_json::from_str(&content).map_err(|e| io_err(&path, e))
    }

    /// All backtest rows across horizons, one CSV. NaN cells are empty.
    pub fn save_backtest_csv(&self, result: &RunResult) -> Result<(), HindcastError> {
        let path = self.run_dir.join("forecasts").join("backtest.csv");
        let mut wtr = csv::Writer::from_path(&path).map_err(|e| io_err(&path, e))?;
        wtr.write_record([
            "origin_date",
            "target_date",
            "horizon",
            "y_t",
            "forecast",
            "actual",
            "error",
        ])
        .map_err(|e| io_err(&path, e))?;
        for hr in &result.horizons {
            for row in &hr.rows {
                wtr.write_record([
                    format_ymd(row.origin_date),
                    format_ymd(row.target_date),
                    row.horizon.to_string(),
                    fmt_cell(row.y_t),
                    fmt_cell(row.forecast),
                    fmt_cell(row.actual),
                    fmt_cell(row.error),
                ])
                .map_err(|e| io_err(&path, e))?;
            }
        }
        wtr.flush().map_err(|e| io_err(&path, e))
    }

    /// Per-horizon accuracy, fixed columns `horizon,rmse,mae`.
    pub fn save_metrics_csv(&self, result: &RunResult) -> Result<(), HindcastError> {
        let path = self.run_dir.join("metrics").join("metrics.csv");
        let mut wtr = csv::Writer::from_path(&path).map_err(|e| io_err(&path, e))?;
        wtr.write_record(["horizon", "rmse", "mae"])
            .map_err(|e| io_err(&path, e))?;
        for hr in &result.horizons {
            wtr.write_record([
                hr.horizon.to_string(),
                fmt_cell(hr.accuracy.rmse),
                fmt_cell(hr.accuracy.mae),
            ])
            .map_err(|e| io_err(&path, e))?;
        }
        wtr.flush().map_err(|e| io_err(&path, e))
    }

    pub fn save_feature_manifest(&self, manifest: &FeatureManifest) -> Result<(), HindcastError> {
        let path = self.run_dir.join("artifacts").join("feature_manifest.json");
        write_json(&path, manifest)
    }

    pub fn save_lineage(&self, lineage: &Lineage) -> Result<(), HindcastError> {
        write_json(&self.run_dir.join("lineage.json"), lineage)
    }

    pub fn load_lineage(&self) -> Result<Lineage, HindcastError> {
        let path = self.run_dir.join("lineage.json");
        let content = fs::read_to_string(&path).map_err(|e| io_err(&path, e))?;
        serde_json::from_str(&content).map_err(|e| io_err(&path, e))
    }

    /// Out-of-sample forecasts from `predict`, one row per horizon.
    pub fn save_predictions(&self, rows: &[BacktestRow]) -> Result<(), HindcastError> {
        let path = self.run_dir.join("forecasts").join("predictions.csv");
        let mut wtr = csv::Writer::from_path(&path).map_err(|e| io_err(&path, e))?;
        wtr.write_record(["origin_date", "target_date", "horizon", "y_t", "forecast"])
            .map_err(|e| io_err(&path, e))?;
        for row in rows {
            wtr.write_record([
                format_ymd(row.origin_date),
                format_ymd(row.target_date),
                row.horizon.to_string(),
                fmt_cell(row.y_t),
                fmt_cell(row.forecast),
            ])
            .map_err(|e| io_err(&path, e))?;
        }
        wtr.flush().map_err(|e| io_err(&path, e))
    }
}

/// Most recently modified run directory (by dir mtime) under `base_dir`
/// whose name starts with `prefix` and whose `models/` subdirectory is
/// non-empty. `predict` resumes from this.
pub fn find_latest_with_models(base_dir: &Path, prefix: &str) -> Result<PathBuf, HindcastError> {
    let no_run = || HindcastError::NoTrainedRun {
        base_dir: base_dir.display().to_string(),
        prefix: prefix.to_string(),
    };
    let entries = fs::read_dir(base_dir).map_err(|_| no_run())?;
    let mut best: Option<(std::time::SystemTime, PathBuf)> = None;
    for entry in entries.flatten() {
        let path = entry.path();
        let is_run = path.is_dir()
            && path
                .file_name()
                .and_then(|n| n.to_str())
                .is_some_and(|n| n.starts_with(prefix));
        if !is_run || !has_saved_models(&path) {
            continue;
        }
        let modified = entry
            .metadata()
            .and_then(|m| m.modified())
            .unwrap_or(std::time::SystemTime::UNIX_EPOCH);
        if best.as_ref().is_none_or(|(t, _)| modified > *t) {
            best = Some((modified, path));
        }
    }
    best.map(|(_, path)| path).ok_or_else(no_run)
}

fn has_saved_models(run_dir: &Path) -> bool {
    fs::read_dir(run_dir.join("models"))
        .map(|mut entries| entries.next().is_some())
        .unwrap_or(false)
}

/// Batch-level summary across every model/variant evaluated by one
/// invocation, written next to the run directories.
pub fn write_summary(base_dir: &Path, rows: &[SummaryRow]) -> Result<PathBuf, HindcastError> {
    let path = base_dir.join("metrics_summary.csv");
    let mut wtr = csv::Writer::from_path(&path).map_err(|e| io_err(&path, e))?;
    wtr.write_record([
        "model",
        "strategy",
        "features",
        "horizon",
        "rmse",
        "mae",
        "run_dir",
        "cache_hit",
    ])
    .map_err(|e| io_err(&path, e))?;
    for row in rows {
        wtr.write_record([
            row.model_name.clone(),
            row.strategy.to_string(),
            row.feature_desc.clone(),
            row.horizon.to_string(),
            fmt_cell(row.rmse),
            fmt_cell(row.mae),
            row.run_dir.clone(),
            row.cache_hit.to_string(),
        ])
        .map_err(|e| io_err(&path, e))?;
    }
    wtr.flush().map_err(|e| io_err(&path, e))?;
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::backtest::HorizonResult;
    use crate::domain::metrics::Accuracy;
    use chrono::NaiveDate;

    fn sample_result() -> RunResult {
        let origin = NaiveDate::from_ymd_opt(2024, 1, 28).unwrap();
        let target = NaiveDate::from_ymd_opt(2024, 2, 28).unwrap();
        RunResult {
            model_name: "naive".into(),
            strategy: Strategy::Frozen,
            feature_desc: "lags-only".into(),
            horizons: vec![HorizonResult {
                horizon: 1,
                accuracy: Accuracy { rmse: 1.0, mae: 1.0 },
                model_params: serde_json::json!({"fitted": true}),
                rows: vec![BacktestRow {
                    origin_date: origin,
                    target_date: target,
                    horizon: 1,
                    y_t: 5.0,
                    forecast: 5.0,
                    actual: f64::NAN,
                    error: f64::NAN,
                }],
            }],
        }
    }

    #[test]
    fn create_run_builds_standard_layout() {
        let base = tempfile::tempdir().unwrap();
        let out = OutputManager::create_run(base.path(), "naive").unwrap();
        for sub in ["artifacts", "models", "forecasts", "metrics"] {
            assert!(out.run_dir().join(sub).is_dir());
        }
        let name = out.run_dir().file_name().unwrap().to_str().unwrap();
        assert!(name.starts_with("naive_"));
    }

    #[test]
    fn colliding_run_names_get_a_suffix() {
        let base = tempfile::tempdir().unwrap();
        let a = OutputManager::create_run(base.path(), "naive").unwrap();
        let b = OutputManager::create_run(base.path(), "naive").unwrap();
        assert_ne!(a.run_dir(), b.run_dir());
    }

    #[test]
    fn model_params_round_trip() {
        let base = tempfile::tempdir().unwrap();
        let out = OutputManager::create_run(base.path(), "linear").unwrap();
        let params = serde_json::json!({"intercept": 1.5, "coef": [0.2]});
        out.save_model_params(3, "linear", &params).unwrap();
        let saved = out.load_model_params(3).unwrap();
        assert_eq!(saved.plugin, "linear");
        assert_eq!(saved.params, params);
    }

    #[test]
    fn backtest_csv_has_empty_cells_for_nan() {
        let base = tempfile::tempdir().unwrap();
        let out = OutputManager::create_run(base.path(), "naive").unwrap();
        out.save_backtest_csv(&sample_result()).unwrap();
        let content =
            fs::read_to_string(out.run_dir().join("forecasts").join("backtest.csv")).unwrap();
        let mut lines = content.lines();
        assert_eq!(
            lines.next().unwrap(),
            "origin_date,target_date,horizon,y_t,forecast,actual,error"
        );
        assert_eq!(lines.next().unwrap(), "2024-01-28,2024-02-28,1,5,5,,");
    }

    #[test]
    fn metrics_csv_lists_each_horizon() {
        let base = tempfile::tempdir().unwrap();
        let out = OutputManager::create_run(base.path(), "naive").unwrap();
        out.save_metrics_csv(&sample_result()).unwrap();
        let content =
            fs::read_to_string(out.run_dir().join("metrics").join("metrics.csv")).unwrap();
        let mut lines = content.lines();
        assert_eq!(lines.next().unwrap(), "horizon,rmse,mae");
        assert_eq!(lines.next().unwrap(), "1,1,1");
    }

    #[test]
    fn lineage_round_trips() {
        let base = tempfile::tempdir().unwrap();
        let out = OutputManager::create_run(base.path(), "naive").unwrap();
        let lineage = Lineage {
            created_at: Utc::now(),
            recipe_file: "recipe.json".into(),
            target_id: "y".into(),
            model_name: "naive".into(),
            model_params: serde_json::Value::Null,
            strategy: Strategy::Refit,
            frequency: Frequency::Monthly,
            horizons: vec![1, 3],
            feature_desc: "lags-only".into(),
            data_fingerprint: "abc123".into(),
            cache_key: "deadbeef".into(),
            cache_hit: false,
        };
        out.save_lineage(&lineage).unwrap();
        let back = out.load_lineage().unwrap();
        assert_eq!(back.model_name, "naive");
        assert_eq!(back.strategy, Strategy::Refit);
        assert_eq!(back.cache_key, "deadbeef");
    }

    #[test]
    fn find_latest_matches_run_name_prefix_and_nonempty_models() {
        let base = tempfile::tempdir().unwrap();
        let other = OutputManager::create_run(base.path(), "drift").unwrap();
        other
            .save_model_params(1, "drift", &serde_json::json!({}))
            .unwrap();
        // A naive run without saved models must not be picked.
        OutputManager::create_run(base.path(), "naive").unwrap();
        let trained = OutputManager::create_run(base.path(), "naive").unwrap();
        trained
            .save_model_params(1, "naive", &serde_json::json!({}))
            .unwrap();

        let found = find_latest_with_models(base.path(), "naive").unwrap();
        assert_eq!(found, trained.run_dir());
    }

    #[test]
    fn find_latest_without_any_run_is_an_error() {
        let base = tempfile::tempdir().unwrap();
        let err = find_latest_with_models(base.path(), "naive").unwrap_err();
        assert!(matches!(err, HindcastError::NoTrainedRun { .. }));
    }

    #[test]
    fn summary_csv_written_at_base_level() {
        let base = tempfile::tempdir().unwrap();
        let rows = vec![SummaryRow {
            model_name: "mean".into(),
            strategy: Strategy::Frozen,
            feature_desc: "lags-only".into(),
            horizon: 1,
            rmse: 2.5,
            mae: 2.0,
            run_dir: "run_x".into(),
            cache_hit: true,
        }];
        let path = write_summary(base.path(), &rows).unwrap();
        let content = fs::read_to_string(path).unwrap();
        assert!(content.contains("mean,frozen,lags-only,1,2.5,2,run_x,true"));
    }
}
