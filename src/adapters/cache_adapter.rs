//! Content-addressed result cache.
//!
//! A cache key is the SHA-256 (truncated to 16 hex chars) of a canonical
//! JSON document describing everything that determines a backtest's output:
//! model, params, target, normalized feature config, horizons, date windows,
//! strategy, frequency, and a fingerprint of the loaded data itself.
//! serde_json keeps object keys sorted, so the document is canonical by
//! construction.
//!
//! On-disk layout under the library root:
//!
//! ```text
//! model_library/
//!     index.json
//!     models/<key>/model_h<H>.json     {plugin, params} per horizon
//!     results/<key>/results.json       rows + metrics per horizon
//!     results/<key>/metadata.json
//! ```
//!
//! `index.json` is the single source of truth for bookkeeping. It is read at
//! each operation and rewritten whole on every store or clear, which assumes
//! one writer per cache directory at a time.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::fs;
use std::path::PathBuf;

use crate::domain::backtest::{RunResult, Strategy};
use crate::domain::dates::{format_ymd, Frequency};
use crate::domain::error::HindcastError;
use crate::domain::frame::TimeSeriesFrame;
use crate::domain::recipe::{FeatureConfig, WindowSpec};
use crate::ports::cache_port::{CachePort, CacheStats};

const KEY_LEN: usize = 16;

/// The slice of a [`FeatureConfig`] that affects assembled output identity.
/// `derived` follows from `pack` and the explicit list, and `sweep` is
/// expanded before any key is computed, so neither is hashed.
#[derive(Serialize)]
struct KeyFeatures<'a> {
    target_lags: Vec<u32>,
    exog: BTreeMap<&'a str, Vec<u32>>,
    pack: Option<String>,
    normalize: Option<&'a crate::domain::recipe::NormalizeSpec>,
    max_features: Option<usize>,
}

fn canonical_lags(lags: &[u32]) -> Vec<u32> {
    let mut out = lags.to_vec();
    out.sort_unstable();
    out.dedup();
    out
}

impl<'a> KeyFeatures<'a> {
    fn from_config(cfg: &'a FeatureConfig) -> Self {
        KeyFeatures {
            target_lags: canonical_lags(&cfg.target_lags),
            exog: cfg
                .exog
                .iter()
                .map(|(name, spec)| (name.as_str(), canonical_lags(&spec.lags)))
                .collect(),
            pack: cfg.pack.map(|p| p.to_string()),
            normalize: cfg.normalize.as_ref(),
            max_features: cfg.max_features,
        }
    }
}

#[derive(Serialize)]
struct KeyWindow {
    start: Option<String>,
    end: Option<String>,
}

impl KeyWindow {
    fn from_spec(spec: &WindowSpec) -> Self {
        KeyWindow {
            start: spec.start.map(format_ymd),
            end: spec.end.map(format_ymd),
        }
    }
}

/// Everything that determines one evaluation's output.
pub struct KeyMaterial<'a> {
    pub model_name: &'a str,
    pub model_params: &'a serde_json::Value,
    pub target_id: &'a str,
    pub features: &'a FeatureConfig,
    pub horizons: &'a [u32],
    pub train: &'a WindowSpec,
    pub test: &'a WindowSpec,
    pub data_fingerprint: &'a str,
    pub frequency: Frequency,
    pub strategy: Strategy,
}

#[derive(Serialize)]
struct KeyDocument<'a> {
    model_name: &'a str,
    model_params: &'a serde_json::Value,
    target_id: &'a str,
    features: KeyFeatures<'a>,
    horizons: Vec<u32>,
    train: KeyWindow,
    test: KeyWindow,
    data_fingerprint: &'a str,
    frequency: &'static str,
    strategy: String,
}

/// Derive the cache key for one evaluation.
pub fn generate_key(material: &KeyMaterial) -> String {
    let mut horizons = material.horizons.to_vec();
    horizons.sort_unstable();
    horizons.dedup();
    let doc = KeyDocument {
        model_name: material.model_name,
        model_params: material.model_params,
        target_id: material.target_id,
        features: KeyFeatures::from_config(material.features),
        horizons,
        train: KeyWindow::from_spec(material.train),
        test: KeyWindow::from_spec(material.test),
        data_fingerprint: material.data_fingerprint,
        frequency: material.frequency.code(),
        strategy: material.strategy.to_string(),
    };
    // to_value sorts object keys; to_string emits no whitespace.
    let canonical = serde_json::to_value(&doc)
        .and_then(|v| serde_json::to_string(&v))
        .unwrap_or_default();
    let digest = Sha256::digest(canonical.as_bytes());
    hex::encode(digest)[..KEY_LEN].to_string()
}

/// Cheap fingerprint of a loaded frame: shape, column names, date span, and
/// a checksum over the first and last five rows. Catches both schema changes
/// and revisions to recent observations without hashing the whole file.
pub fn data_fingerprint(frame: &TimeSeriesFrame) -> String {
    let mut hasher = Sha256::new();
    hasher.update(frame.len().to_le_bytes());
    for name in frame.column_names() {
        hasher.update(name.as_bytes());
        hasher.update([0u8]);
    }
    if let (Some(first), Some(last)) = (frame.dates().first(), frame.dates().last()) {
        hasher.update(format_ymd(*first).as_bytes());
        hasher.update(format_ymd(*last).as_bytes());
    }
    let n = frame.len();
    let head_tail: Vec<usize> = (0..n.min(5)).chain(n.saturating_sub(5)..n).collect();
    for name in frame.column_names().collect::<Vec<_>>() {
        let col = frame.column(name).unwrap_or(&[]);
        for &i in &head_tail {
            hasher.update(col[i].to_bits().to_le_bytes());
        }
    }
    hex::encode(hasher.finalize())[..KEY_LEN].to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct IndexEntry {
    created_at: DateTime<Utc>,
    bytes: u64,
    models: usize,
}

/// Provenance written next to each cached result.
#[derive(Debug, Serialize)]
struct CacheMetadata<'a> {
    created_at: DateTime<Utc>,
    model_name: &'a str,
    strategy: Strategy,
    feature_desc: &'a str,
    horizons: Vec<u32>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct CacheIndex {
    entries: BTreeMap<String, IndexEntry>,
}

/// Filesystem-backed cache rooted at one `model_library` directory.
pub struct FsCacheAdapter {
    root: PathBuf,
}

fn cache_err(context: &str, e: impl std::fmt::Display) -> HindcastError {
    HindcastError::Cache {
        reason: format!("{context}: {e}"),
    }
}

impl FsCacheAdapter {
    pub fn new(root: PathBuf) -> Self {
        Self { root }
    }

    fn index_path(&self) -> PathBuf {
        self.root.join("index.json")
    }

    fn models_dir(&self, key: &str) -> PathBuf {
        self.root.join("models").join(key)
    }

    fn results_dir(&self, key: &str) -> PathBuf {
        self.root.join("results").join(key)
    }

    fn results_path(&self, key: &str) -> PathBuf {
        self.results_dir(key).join("results.json")
    }

    fn load_index(&self) -> CacheIndex {
        // A missing or corrupt index means an empty cache, never an error.
        fs::read_to_string(self.index_path())
            .ok()
            .and_then(|s| serde_json::from_str(&s).ok())
            .unwrap_or_default()
    }

    fn save_index(&self, index: &CacheIndex) -> Result<(), HindcastError> {
        let json = serde_json::to_string_pretty(index)
            .map_err(|e| cache_err("failed to encode cache index", e))?;
        fs::write(self.index_path(), json)
            .map_err(|e| cache_err("failed to write cache index", e))?;
        Ok(())
    }
}

impl CachePort for FsCacheAdapter {
    fn contains(&self, key: &str) -> bool {
        self.load_index().entries.contains_key(key) && self.results_path(key).exists()
    }

    fn load(&self, key: &str) -> Result<Option<RunResult>, HindcastError> {
        if !self.load_index().entries.contains_key(key) {
            return Ok(None);
        }
        // A corrupt or missing payload is a miss; the caller recomputes.
        let result = fs::read_to_string(self.results_path(key))
            .ok()
            .and_then(|s| serde_json::from_str(&s).ok());
        Ok(result)
    }

    fn store(&self, key: &str, result: &RunResult) -> Result<(), HindcastError> {
        let results_dir = self.results_dir(key);
        let models_dir = self.models_dir(key);
        for dir in [&results_dir, &models_dir] {
            fs::create_dir_all(dir)
                .map_err(|e| cache_err(&format!("failed to create {}", dir.display()), e))?;
        }

        let mut bytes = 0u64;
        let mut models = 0usize;
        for hr in &result.horizons {
            if hr.model_params.is_null() {
                continue;
            }
            let doc = serde_json::json!({
                "plugin": result.model_name,
                "params": hr.model_params,
            });
            let path = models_dir.join(format!("model_h{}.json", hr.horizon));
            let json = serde_json::to_string_pretty(&doc)
                .map_err(|e| cache_err("failed to encode cached model", e))?;
            fs::write(&path, &json)
                .map_err(|e| cache_err(&format!("failed to write {}", path.display()), e))?;
            bytes += json.len() as u64;
            models += 1;
        }

        let created_at = Utc::now();
        let metadata = CacheMetadata {
            created_at,
            model_name: &result.model_name,
            strategy: result.strategy,
            feature_desc: &result.feature_desc,
            horizons: result.horizons.iter().map(|hr| hr.horizon).collect(),
        };
        for (name, json) in [
            (
                "results.json",
                serde_json::to_string_pretty(result)
                    .map_err(|e| cache_err("failed to encode cached result", e))?,
            ),
            (
                "metadata.json",
                serde_json::to_string_pretty(&metadata)
                    .map_err(|e| cache_err("failed to encode cache metadata", e))?,
            ),
        ] {
            let path = results_dir.join(name);
            fs::write(&path, &json)
                .map_err(|e| cache_err(&format!("failed to write {}", path.display()), e))?;
            bytes += json.len() as u64;
        }

        let mut index = self.load_index();
        index.entries.insert(
            key.to_string(),
            IndexEntry {
                created_at,
                bytes,
                models,
            },
        );
        self.save_index(&index)
    }

    fn stats(&self) -> Result<CacheStats, HindcastError> {
        let index = self.load_index();
        Ok(CacheStats {
            entries: index.entries.len(),
            models: index.entries.values().map(|e| e.models).sum(),
            total_bytes: index.entries.values().map(|e| e.bytes).sum(),
        })
    }

    fn clear(&self, older_than_days: Option<u64>) -> Result<usize, HindcastError> {
        let mut index = self.load_index();
        let cutoff = older_than_days.map(|days| Utc::now() - Duration::days(days as i64));
        let doomed: Vec<String> = index
            .entries
            .iter()
            .filter(|(_, entry)| cutoff.is_none_or(|c| entry.created_at < c))
            .map(|(key, _)| key.clone())
            .collect();
        for key in &doomed {
            index.entries.remove(key);
            for dir in [self.results_dir(key), self.models_dir(key)] {
                if dir.exists() {
                    fs::remove_dir_all(&dir).map_err(|e| {
                        cache_err(&format!("failed to remove {}", dir.display()), e)
                    })?;
                }
            }
        }
        if self.root.exists() {
            self.save_index(&index)?;
        }
        Ok(doomed.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::backtest::{HorizonResult, Strategy};
    use crate::domain::metrics::Accuracy;
    use crate::domain::recipe::{ExogSpec, NormalizeMethod, NormalizeSpec, Pack, TransformSpec};
    use chrono::NaiveDate;
    use proptest::prelude::*;

    fn frame(values: &[f64]) -> TimeSeriesFrame {
        let start = NaiveDate::from_ymd_opt(2020, 1, 28).unwrap();
        let dates: Vec<NaiveDate> = (0..values.len())
            .map(|i| crate::domain::dates::advance(start, Frequency::Monthly, i as u32))
            .collect();
        let mut cols = BTreeMap::new();
        cols.insert("y".to_string(), values.to_vec());
        TimeSeriesFrame::new(dates, cols).unwrap()
    }

    fn material<'a>(
        params: &'a serde_json::Value,
        features: &'a FeatureConfig,
        fingerprint: &'a str,
        windows: &'a (WindowSpec, WindowSpec),
    ) -> KeyMaterial<'a> {
        KeyMaterial {
            model_name: "linear",
            model_params: params,
            target_id: "y",
            features,
            horizons: &[1, 3],
            train: &windows.0,
            test: &windows.1,
            data_fingerprint: fingerprint,
            frequency: Frequency::Monthly,
            strategy: Strategy::Frozen,
        }
    }

    #[test]
    fn key_is_16_hex_chars_and_deterministic() {
        let params = serde_json::json!({"ridge_lambda": 0.1});
        let features = FeatureConfig::default();
        let windows = (WindowSpec::default(), WindowSpec::default());
        let a = generate_key(&material(&params, &features, "abc", &windows));
        let b = generate_key(&material(&params, &features, "abc", &windows));
        assert_eq!(a, b);
        assert_eq!(a.len(), 16);
        assert!(a.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn key_ignores_param_insertion_order() {
        let a: serde_json::Value =
            serde_json::from_str(r#"{"ridge_lambda": 0.1, "other": 2}"#).unwrap();
        let b: serde_json::Value =
            serde_json::from_str(r#"{"other": 2, "ridge_lambda": 0.1}"#).unwrap();
        let features = FeatureConfig::default();
        let windows = (WindowSpec::default(), WindowSpec::default());
        assert_eq!(
            generate_key(&material(&a, &features, "abc", &windows)),
            generate_key(&material(&b, &features, "abc", &windows)),
        );
    }

    #[test]
    fn key_ignores_lag_list_order() {
        let params = serde_json::Value::Null;
        let windows = (WindowSpec::default(), WindowSpec::default());
        let mut a = FeatureConfig {
            target_lags: vec![12, 1, 3],
            ..FeatureConfig::default()
        };
        a.exog.insert("x1".into(), ExogSpec { lags: vec![6, 0] });
        let mut b = FeatureConfig {
            target_lags: vec![1, 3, 12],
            ..FeatureConfig::default()
        };
        b.exog.insert("x1".into(), ExogSpec { lags: vec![0, 6] });
        assert_eq!(
            generate_key(&material(&params, &a, "abc", &windows)),
            generate_key(&material(&params, &b, "abc", &windows)),
        );
    }

    proptest! {
        #[test]
        fn key_is_invariant_under_lag_permutation(lags in prop::collection::vec(0u32..48, 1..8)) {
            let params = serde_json::Value::Null;
            let windows = (WindowSpec::default(), WindowSpec::default());
            let forward = FeatureConfig {
                target_lags: lags.clone(),
                ..FeatureConfig::default()
            };
            let reversed = FeatureConfig {
                target_lags: lags.iter().rev().copied().collect(),
                ..FeatureConfig::default()
            };
            prop_assert_eq!(
                generate_key(&material(&params, &forward, "abc", &windows)),
                generate_key(&material(&params, &reversed, "abc", &windows))
            );
        }
    }

    #[test]
    fn key_ignores_derived_and_sweep() {
        let params = serde_json::Value::Null;
        let windows = (WindowSpec::default(), WindowSpec::default());
        let mut base = FeatureConfig {
            target_lags: vec![1, 12],
            pack: Some(Pack::TaBasic),
            ..FeatureConfig::default()
        };
        let plain = generate_key(&material(&params, &base, "abc", &windows));
        base.derived = vec![TransformSpec::Diff { on: "y".into(), k: 1 }];
        base.sweep = Some(crate::domain::recipe::SweepSpec::default());
        let with_extras = generate_key(&material(&params, &base, "abc", &windows));
        assert_eq!(plain, with_extras);
    }

    #[test]
    fn key_changes_with_features_and_data() {
        let params = serde_json::Value::Null;
        let windows = (WindowSpec::default(), WindowSpec::default());
        let base = FeatureConfig {
            target_lags: vec![1],
            ..FeatureConfig::default()
        };
        let key = generate_key(&material(&params, &base, "abc", &windows));

        let mut lagged = base.clone();
        lagged.target_lags = vec![1, 12];
        assert_ne!(key, generate_key(&material(&params, &lagged, "abc", &windows)));

        let mut exog = base.clone();
        exog.exog.insert("x1".into(), ExogSpec { lags: vec![0] });
        assert_ne!(key, generate_key(&material(&params, &exog, "abc", &windows)));

        let mut normed = base.clone();
        normed.normalize = Some(NormalizeSpec {
            method: NormalizeMethod::Zscore,
            window: 12,
        });
        assert_ne!(key, generate_key(&material(&params, &normed, "abc", &windows)));

        assert_ne!(key, generate_key(&material(&params, &base, "other", &windows)));
    }

    #[test]
    fn fingerprint_tracks_shape_and_recent_values() {
        let a: Vec<f64> = (0..30).map(|i| i as f64).collect();
        let fp_a = data_fingerprint(&frame(&a));
        assert_eq!(fp_a, data_fingerprint(&frame(&a)));

        let mut revised = a.clone();
        revised[29] += 0.001;
        assert_ne!(fp_a, data_fingerprint(&frame(&revised)));

        let shorter = &a[..29];
        assert_ne!(fp_a, data_fingerprint(&frame(shorter)));
    }

    fn run_result() -> RunResult {
        RunResult {
            model_name: "naive".into(),
            strategy: Strategy::Frozen,
            feature_desc: "lags-only".into(),
            horizons: vec![HorizonResult {
                horizon: 1,
                accuracy: Accuracy { rmse: 1.0, mae: 1.0 },
                model_params: serde_json::json!({"fitted": true}),
                rows: Vec::new(),
            }],
        }
    }

    #[test]
    fn store_then_load_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let cache = FsCacheAdapter::new(dir.path().join("model_library"));
        assert!(!cache.contains("deadbeefdeadbeef"));

        cache.store("deadbeefdeadbeef", &run_result()).unwrap();
        assert!(cache.contains("deadbeefdeadbeef"));
        let loaded = cache.load("deadbeefdeadbeef").unwrap().unwrap();
        assert_eq!(loaded.model_name, "naive");
        assert_eq!(loaded.horizons.len(), 1);
        assert_eq!(loaded.horizons[0].accuracy.rmse, 1.0);
    }

    #[test]
    fn store_writes_split_library_layout() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("model_library");
        let cache = FsCacheAdapter::new(root.clone());
        cache.store("cafe", &run_result()).unwrap();

        assert!(root.join("index.json").exists());
        assert!(root.join("results").join("cafe").join("results.json").exists());
        assert!(root.join("results").join("cafe").join("metadata.json").exists());
        let model = fs::read_to_string(
            root.join("models").join("cafe").join("model_h1.json"),
        )
        .unwrap();
        let doc: serde_json::Value = serde_json::from_str(&model).unwrap();
        assert_eq!(doc["plugin"], "naive");
        assert_eq!(doc["params"]["fitted"], true);
    }

    #[test]
    fn corrupt_payload_is_a_miss() {
        let dir = tempfile::tempdir().unwrap();
        let cache = FsCacheAdapter::new(dir.path().to_path_buf());
        cache.store("aaaa", &run_result()).unwrap();
        fs::write(
            dir.path().join("results").join("aaaa").join("results.json"),
            "{not json",
        )
        .unwrap();
        assert!(cache.load("aaaa").unwrap().is_none());
    }

    #[test]
    fn stats_count_entries_models_and_bytes() {
        let dir = tempfile::tempdir().unwrap();
        let cache = FsCacheAdapter::new(dir.path().to_path_buf());
        assert_eq!(cache.stats().unwrap().entries, 0);
        cache.store("k1", &run_result()).unwrap();
        cache.store("k2", &run_result()).unwrap();
        let stats = cache.stats().unwrap();
        assert_eq!(stats.entries, 2);
        assert_eq!(stats.models, 2);
        assert!(stats.total_bytes > 0);
    }

    #[test]
    fn clear_removes_everything_without_age_filter() {
        let dir = tempfile::tempdir().unwrap();
        let cache = FsCacheAdapter::new(dir.path().to_path_buf());
        cache.store("k1", &run_result()).unwrap();
        cache.store("k2", &run_result()).unwrap();
        assert_eq!(cache.clear(None).unwrap(), 2);
        assert_eq!(cache.stats().unwrap().entries, 0);
        assert!(!dir.path().join("results").join("k1").exists());
        assert!(!dir.path().join("models").join("k1").exists());
    }

    #[test]
    fn clear_with_age_keeps_fresh_entries() {
        let dir = tempfile::tempdir().unwrap();
        let cache = FsCacheAdapter::new(dir.path().to_path_buf());
        cache.store("fresh", &run_result()).unwrap();
        assert_eq!(cache.clear(Some(7)).unwrap(), 0);
        assert!(cache.contains("fresh"));
    }
}
