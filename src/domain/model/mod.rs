//! Forecast model trait and the compile-time plugin registry.
//!
//! Every model implements [`ForecastModel`] over the same supervised-set
//! shape, so the backtest engine and the CLI never name a concrete model
//! type. Registration is a match in [`discover`]; adding a model means
//! adding a module and one registry entry.

pub mod drift;
pub mod linear;
pub mod mean;
pub mod naive;

use std::collections::BTreeMap;

use crate::domain::error::HindcastError;

/// Training view handed to [`ForecastModel::fit`]. `x`, `y`, and `y_t` are
/// row-aligned; `horizon` is the number of steps between origin and target.
pub struct FitData<'a> {
    pub x: &'a [Vec<f64>],
    pub y: &'a [f64],
    pub y_t: &'a [f64],
    pub horizon: u32,
}

/// Single prediction point: the assembled feature row plus the target's
/// own value at the origin.
pub struct PredictRow<'a> {
    pub x: &'a [f64],
    pub y_t: f64,
}

pub trait ForecastModel: Send {
    fn name(&self) -> &'static str;

    fn fit(&mut self, data: &FitData) -> Result<(), HindcastError>;

    /// Point forecast for one origin. Returns NaN when the model cannot
    /// produce a value (e.g. not fitted).
    fn predict(&self, row: &PredictRow) -> f64;

    /// Fitted state as JSON, suitable for persistence and reload.
    fn params(&self) -> serde_json::Value;

    fn load_params(&mut self, params: &serde_json::Value) -> Result<(), HindcastError>;
}

type BuildFn = fn(&serde_json::Value) -> Result<Box<dyn ForecastModel>, HindcastError>;

/// Capability declaration a plugin ships alongside its factory: what a
/// recipe gets when it names the model without feature details.
#[derive(Debug, Clone, Copy)]
pub struct PluginSpec {
    /// Target lags a recipe can fall back to.
    pub default_target_lags: &'static [u32],
    /// Whether the model keeps usable state across a frozen fit. All of the
    /// bundled models do; a purely online model would not.
    pub supports_frozen: bool,
}

/// Registry entry for one model implementation.
pub struct Plugin {
    pub name: &'static str,
    pub description: &'static str,
    pub spec: PluginSpec,
    build: BuildFn,
}

impl Plugin {
    pub fn build(&self, config: &serde_json::Value) -> Result<Box<dyn ForecastModel>, HindcastError> {
        (self.build)(config)
    }
}

/// Enumerate every registered model. Returns a fresh map each call; callers
/// own their view of the registry.
pub fn discover() -> BTreeMap<&'static str, Plugin> {
    const LAG_1: &[u32] = &[1];
    const LAGS_SHORT: &[u32] = &[1, 3, 6, 12];
    let entries = [
        Plugin {
            name: "naive",
            description: "repeat the last observed target value",
            spec: PluginSpec {
                default_target_lags: LAG_1,
                supports_frozen: true,
            },
            build: naive::build,
        },
        Plugin {
            name: "drift",
            description: "last value plus the average historical step",
            spec: PluginSpec {
                default_target_lags: LAG_1,
                supports_frozen: true,
            },
            build: drift::build,
        },
        Plugin {
            name: "mean",
            description: "mean of the training targets",
            spec: PluginSpec {
                default_target_lags: LAG_1,
                supports_frozen: true,
            },
            build: mean::build,
        },
        Plugin {
            name: "linear",
            description: "ordinary least squares on the feature row",
            spec: PluginSpec {
                default_target_lags: LAGS_SHORT,
                supports_frozen: true,
            },
            build: linear::build,
        },
    ];
    entries.into_iter().map(|p| (p.name, p)).collect()
}

/// Build a model by name, or fail listing what is registered.
pub fn create(
    name: &str,
    config: &serde_json::Value,
) -> Result<Box<dyn ForecastModel>, HindcastError> {
    let registry = discover();
    match registry.get(name) {
        Some(plugin) => plugin.build(config),
        None => Err(HindcastError::UnknownModel {
            name: name.to_string(),
            available: registry.keys().copied().collect::<Vec<_>>().join(", "),
        }),
    }
}
