//! Recipe (run configuration) and the feature-assembly DSL.
//!
//! Recipes are JSON documents parsed into typed structs so invalid
//! configurations fail before any data is loaded. In particular the derived
//! transform `op` is a tagged sum type: an unknown op is a parse error rather
//! than a silently skipped entry.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};

use crate::domain::backtest::Strategy;
use crate::domain::dates::Frequency;
use crate::domain::error::HindcastError;

/// Exogenous wildcard key: expands to every frame column except the target.
pub const EXOG_ALL: &str = "__all__";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Recipe {
    pub target_id: String,
    #[serde(default)]
    pub frequency: Frequency,
    #[serde(default = "default_horizons")]
    pub horizons: Vec<u32>,
    #[serde(default)]
    pub strategy: Strategy,
    pub data: DataSpec,
    #[serde(default, with = "ymd_opt")]
    pub as_of_date: Option<chrono::NaiveDate>,
    #[serde(default)]
    pub train: WindowSpec,
    #[serde(default)]
    pub test: WindowSpec,
    #[serde(default)]
    pub model: Option<ModelChoice>,
    #[serde(default)]
    pub models_filter: Vec<String>,
    #[serde(default)]
    pub features: FeatureConfig,
    #[serde(default)]
    pub output: OutputSpec,
}

fn default_horizons() -> Vec<u32> {
    vec![1]
}

impl Recipe {
    pub fn from_file(path: &Path) -> Result<Recipe, HindcastError> {
        let content = std::fs::read_to_string(path).map_err(|e| HindcastError::RecipeParse {
            file: path.display().to_string(),
            reason: e.to_string(),
        })?;
        let recipe: Recipe =
            serde_json::from_str(&content).map_err(|e| HindcastError::RecipeParse {
                file: path.display().to_string(),
                reason: e.to_string(),
            })?;
        recipe.validate()?;
        Ok(recipe)
    }

    fn validate(&self) -> Result<(), HindcastError> {
        if self.horizons.is_empty() {
            return Err(HindcastError::RecipeInvalid {
                field: "horizons".into(),
                reason: "at least one horizon is required".into(),
            });
        }
        if self.horizons.contains(&0) {
            return Err(HindcastError::RecipeInvalid {
                field: "horizons".into(),
                reason: "horizons must be >= 1".into(),
            });
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DataSpec {
    pub path: PathBuf,
    #[serde(default = "default_date_col")]
    pub date_col: String,
}

fn default_date_col() -> String {
    "date".to_string()
}

/// Inclusive date window; `None` means unbounded on that side.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WindowSpec {
    #[serde(default, with = "ymd_opt")]
    pub start: Option<chrono::NaiveDate>,
    #[serde(default, with = "ymd_opt")]
    pub end: Option<chrono::NaiveDate>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelChoice {
    pub name: String,
    #[serde(default)]
    pub params: serde_json::Value,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OutputSpec {
    #[serde(default)]
    pub dir: Option<PathBuf>,
}

/// Declarative feature configuration for one supervised dataset.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FeatureConfig {
    #[serde(default)]
    pub target_lags: Vec<u32>,
    /// Per-exogenous-column lag sets. The key [`EXOG_ALL`] is a template
    /// applied to every non-target column; explicit names override it.
    #[serde(default)]
    pub exog: BTreeMap<String, ExogSpec>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pack: Option<Pack>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub derived: Vec<TransformSpec>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub normalize: Option<NormalizeSpec>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_features: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sweep: Option<SweepSpec>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExogSpec {
    #[serde(default)]
    pub lags: Vec<u32>,
}

/// Named bundle of derived-transform specs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Pack {
    TaBasic,
}

impl fmt::Display for Pack {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Pack::TaBasic => f.write_str("ta_basic"),
        }
    }
}

/// Rolling normalization applied to every assembled feature column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NormalizeSpec {
    pub method: NormalizeMethod,
    #[serde(default = "default_norm_window")]
    pub window: usize,
}

fn default_norm_window() -> usize {
    12
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NormalizeMethod {
    Zscore,
    None,
}

/// One derived column, deterministic given the source column, op, and
/// parameter. The generated column name doubles as its identity in the
/// feature manifest and in column ordering.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum TransformSpec {
    Diff {
        on: String,
        #[serde(default = "default_k")]
        k: u32,
    },
    PctChange {
        on: String,
        #[serde(default = "default_k")]
        k: u32,
    },
    RollingMean {
        on: String,
        #[serde(default = "default_window")]
        window: usize,
    },
    RollingStd {
        on: String,
        #[serde(default = "default_window")]
        window: usize,
    },
    Ema {
        on: String,
        #[serde(default = "default_span")]
        span: usize,
    },
    Zscore {
        on: String,
        #[serde(default = "default_norm_window")]
        window: usize,
    },
}

fn default_k() -> u32 {
    1
}

fn default_window() -> usize {
    3
}

fn default_span() -> usize {
    6
}

impl TransformSpec {
    /// Source column the transform reads from.
    pub fn on(&self) -> &str {
        match self {
            TransformSpec::Diff { on, .. }
            | TransformSpec::PctChange { on, .. }
            | TransformSpec::RollingMean { on, .. }
            | TransformSpec::RollingStd { on, .. }
            | TransformSpec::Ema { on, .. }
            | TransformSpec::Zscore { on, .. } => on,
        }
    }

    /// Derived column name, e.g. `y__diff1` or `x2__ma3`.
    pub fn column_name(&self) -> String {
        match self {
            TransformSpec::Diff { on, k } => format!("{on}__diff{k}"),
            TransformSpec::PctChange { on, k } => format!("{on}__pctchg{k}"),
            TransformSpec::RollingMean { on, window } => format!("{on}__ma{window}"),
            TransformSpec::RollingStd { on, window } => format!("{on}__std{window}"),
            TransformSpec::Ema { on, span } => format!("{on}__ema{span}"),
            TransformSpec::Zscore { on, window } => format!("{on}__z{window}"),
        }
    }
}

/// Feature-variant sweep for batch mode.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SweepSpec {
    #[serde(default)]
    pub packs: Vec<Option<Pack>>,
    #[serde(default)]
    pub normalize: Vec<Option<NormalizeSpec>>,
    #[serde(default)]
    pub max_features: Vec<usize>,
    /// Expand every choose-k subset of candidate exogenous columns.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exog_combo_k: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exog_combo_limit: Option<usize>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub exog_combo_names: Vec<String>,
}

/// Serde helper for optional `YYYY-MM-DD` / `YYYYMMDD` date fields.
mod ymd_opt {
    use crate::domain::dates::{format_ymd, parse_ymd};
    use chrono::NaiveDate;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(v: &Option<NaiveDate>, s: S) -> Result<S::Ok, S::Error> {
        match v {
            Some(d) => s.serialize_some(&format_ymd(*d)),
            None => s.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Option<NaiveDate>, D::Error> {
        let raw: Option<String> = Option::deserialize(d)?;
        match raw {
            Some(s) if !s.trim().is_empty() => parse_ymd(&s)
                .map(Some)
                .map_err(|e| serde::de::Error::custom(e.to_string())),
            _ => Ok(None),
        }
    }
}
