//! CLI definition and dispatch.

use clap::{Parser, Subcommand, ValueEnum};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use crate::adapters::cache_adapter::{data_fingerprint, generate_key, FsCacheAdapter, KeyMaterial};
use crate::adapters::csv_adapter::CsvAdapter;
use crate::adapters::output_adapter::{
    find_latest_with_models, write_summary, Lineage, OutputManager, SummaryRow,
};
use crate::domain::backtest::{run_backtest, BacktestRow, HorizonResult, RunResult};
use crate::domain::dates::{advance, format_ymd};
use crate::domain::error::HindcastError;
use crate::domain::features;
use crate::domain::frame::TimeSeriesFrame;
use crate::domain::model;
use crate::domain::recipe::{FeatureConfig, Recipe};
use crate::ports::cache_port::CachePort;
use crate::ports::data_port::DataPort;

#[derive(Parser, Debug)]
#[command(name = "hindcast", about = "Rolling-origin forecast evaluation harness")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run a backtest from a recipe
    Run {
        #[arg(short, long)]
        recipe: PathBuf,
        /// Evaluate every registered model and every sweep variant
        #[arg(long)]
        all: bool,
        #[arg(long, value_enum, default_value_t = CacheMode::Use)]
        cache: CacheMode,
        /// Override the recipe's output directory
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Forecast future periods from the latest trained run
    Predict {
        #[arg(short, long)]
        recipe: PathBuf,
        /// Use this run directory instead of the most recent one
        #[arg(long)]
        run_dir: Option<PathBuf>,
    },
    /// Check a recipe against its data without running anything
    Validate {
        #[arg(short, long)]
        recipe: PathBuf,
    },
    /// Result cache maintenance
    Cache {
        #[command(subcommand)]
        action: CacheAction,
    },
}

#[derive(Subcommand, Debug)]
pub enum CacheAction {
    /// Show entry count and total size
    Stats {
        /// Output directory the cache lives under
        #[arg(long, default_value = "outputs")]
        dir: PathBuf,
    },
    /// Remove cached results
    Clear {
        #[arg(long, default_value = "outputs")]
        dir: PathBuf,
        /// Only remove entries older than this many days
        #[arg(long)]
        older_than_days: Option<u64>,
    },
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum CacheMode {
    /// Read hits and store fresh results
    Use,
    /// Compute fresh, neither reading nor writing the cache
    Ignore,
    /// Compute fresh and overwrite the stored entry
    Rebuild,
}

pub fn run(cli: Cli) -> ExitCode {
    match cli.command {
        Command::Run {
            recipe,
            all,
            cache,
            output,
        } => run_recipe(&recipe, all, cache, output.as_deref()),
        Command::Predict { recipe, run_dir } => run_predict(&recipe, run_dir),
        Command::Validate { recipe } => run_validate(&recipe),
        Command::Cache { action } => match action {
            CacheAction::Stats { dir } => run_cache_stats(&dir),
            CacheAction::Clear {
                dir,
                older_than_days,
            } => run_cache_clear(&dir, older_than_days),
        },
    }
}

fn fail(err: &HindcastError) -> ExitCode {
    eprintln!("error: {err}");
    ExitCode::from(err)
}

struct LoadedRecipe {
    recipe: Recipe,
    recipe_file: String,
    frame: TimeSeriesFrame,
    fingerprint: String,
    output_base: PathBuf,
}

fn load_recipe_and_data(
    recipe_path: &Path,
    output_override: Option<&Path>,
) -> Result<LoadedRecipe, HindcastError> {
    let recipe = Recipe::from_file(recipe_path)?;
    eprintln!("Loading data from {}", recipe.data.path.display());

    let base = recipe_path.parent().unwrap_or(Path::new(".")).to_path_buf();
    let adapter = CsvAdapter::with_base_path(base);
    let frame = adapter.load_frame(&recipe.data, recipe.as_of_date)?;

    if frame.column(&recipe.target_id).is_none() {
        let available: Vec<&str> = frame.column_names().collect();
        return Err(HindcastError::Data {
            reason: format!(
                "target {:?} not found in data (columns: {})",
                recipe.target_id,
                available.join(", ")
            ),
        });
    }
    eprintln!(
        "  {} rows, {} columns, {} .. {}",
        frame.len(),
        frame.column_count(),
        format_ymd(frame.dates()[0]),
        format_ymd(*frame.dates().last().unwrap()),
    );

    let fingerprint = data_fingerprint(&frame);
    let output_base = output_override
        .map(Path::to_path_buf)
        .or_else(|| recipe.output.dir.clone())
        .unwrap_or_else(|| PathBuf::from("outputs"));
    std::fs::create_dir_all(&output_base)?;

    Ok(LoadedRecipe {
        recipe,
        recipe_file: recipe_path.display().to_string(),
        frame,
        fingerprint,
        output_base,
    })
}

/// Models to evaluate: the recipe's single model, or (with `--all`) every
/// registered model, optionally narrowed by `models_filter`.
fn resolve_models(recipe: &Recipe, all: bool) -> Result<Vec<(String, serde_json::Value)>, HindcastError> {
    if !all {
        let choice = recipe.model.as_ref().ok_or_else(|| HindcastError::RecipeInvalid {
            field: "model".into(),
            reason: "a model is required unless --all is given".into(),
        })?;
        // Fail fast on unknown names.
        model::create(&choice.name, &choice.params)?;
        return Ok(vec![(choice.name.clone(), choice.params.clone())]);
    }

    let registry = model::discover();
    if let Some(unknown) = recipe
        .models_filter
        .iter()
        .find(|name| !registry.contains_key(name.as_str()))
    {
        return Err(HindcastError::UnknownModel {
            name: unknown.clone(),
            available: registry.keys().copied().collect::<Vec<_>>().join(", "),
        });
    }
    let configured = recipe.model.as_ref();
    Ok(registry
        .keys()
        .filter(|name| {
            recipe.models_filter.is_empty() || recipe.models_filter.iter().any(|f| f == *name)
        })
        .map(|name| {
            let params = match configured {
                Some(choice) if choice.name == *name => choice.params.clone(),
                _ => serde_json::Value::Null,
            };
            (name.to_string(), params)
        })
        .collect())
}

/// Evaluate one model against one feature variant, going through the cache.
fn evaluate_one(
    loaded: &LoadedRecipe,
    cache: &FsCacheAdapter,
    mode: CacheMode,
    model_name: &str,
    params: &serde_json::Value,
    variant: &FeatureConfig,
) -> Result<(RunResult, String, bool), HindcastError> {
    let recipe = &loaded.recipe;
    let key = generate_key(&KeyMaterial {
        model_name,
        model_params: params,
        target_id: &recipe.target_id,
        features: variant,
        horizons: &recipe.horizons,
        train: &recipe.train,
        test: &recipe.test,
        data_fingerprint: &loaded.fingerprint,
        frequency: recipe.frequency,
        strategy: recipe.strategy,
    });

    if mode == CacheMode::Use {
        if let Some(result) = cache.load(&key)? {
            eprintln!("  {model_name}: cache hit ({key})");
            return Ok((result, key, true));
        }
    }

    let mut horizons = Vec::with_capacity(recipe.horizons.len());
    for &h in &recipe.horizons {
        let set = features::assemble(&loaded.frame, &recipe.target_id, variant, h);
        let outcome = run_backtest(
            &|| model::create(model_name, params),
            &set,
            h,
            recipe.frequency,
            recipe.strategy,
            &recipe.train,
            &recipe.test,
        )?;
        if outcome.rows.is_empty() {
            eprintln!("warning: {model_name} h{h}: empty test span, metrics are NaN");
        }
        horizons.push(HorizonResult {
            horizon: h,
            accuracy: outcome.accuracy,
            model_params: outcome.fitted_params,
            rows: outcome.rows,
        });
    }
    let result = RunResult {
        model_name: model_name.to_string(),
        strategy: recipe.strategy,
        feature_desc: features::describe(variant),
        horizons,
    };
    if mode != CacheMode::Ignore {
        cache.store(&key, &result)?;
    }
    Ok((result, key, false))
}

/// Write one evaluation's run directory and return its name.
fn persist_run(
    loaded: &LoadedRecipe,
    variant: &FeatureConfig,
    result: &RunResult,
    params: &serde_json::Value,
    key: &str,
    cache_hit: bool,
) -> Result<String, HindcastError> {
    let recipe = &loaded.recipe;
    let out = OutputManager::create_run(&loaded.output_base, &result.model_name)?;
    for hr in &result.horizons {
        if !hr.model_params.is_null() {
            out.save_model_params(hr.horizon, &result.model_name, &hr.model_params)?;
        }
    }
    out.save_backtest_csv(result)?;
    out.save_metrics_csv(result)?;
    out.save_feature_manifest(&features::build_manifest(
        &loaded.frame,
        &recipe.target_id,
        variant,
    ))?;
    out.save_lineage(&Lineage {
        created_at: chrono::Utc::now(),
        recipe_file: loaded.recipe_file.clone(),
        target_id: recipe.target_id.clone(),
        model_name: result.model_name.clone(),
        model_params: params.clone(),
        strategy: recipe.strategy,
        frequency: recipe.frequency,
        horizons: recipe.horizons.clone(),
        feature_desc: result.feature_desc.clone(),
        data_fingerprint: loaded.fingerprint.clone(),
        cache_key: key.to_string(),
        cache_hit,
    })?;
    Ok(out
        .run_dir()
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or_default()
        .to_string())
}

fn run_recipe(
    recipe_path: &Path,
    all: bool,
    mode: CacheMode,
    output_override: Option<&Path>,
) -> ExitCode {
    let loaded = match load_recipe_and_data(recipe_path, output_override) {
        Ok(l) => l,
        Err(e) => return fail(&e),
    };
    let recipe = &loaded.recipe;

    let models = match resolve_models(recipe, all) {
        Ok(m) => m,
        Err(e) => return fail(&e),
    };
    let variants = if all {
        features::feature_variants(&recipe.features, &loaded.frame, &recipe.target_id)
    } else {
        let mut single = recipe.features.clone();
        single.sweep = None;
        vec![single]
    };
    eprintln!(
        "Evaluating {} model(s) x {} feature variant(s), strategy {}",
        models.len(),
        variants.len(),
        recipe.strategy,
    );

    let cache = FsCacheAdapter::new(loaded.output_base.join("model_library"));
    let mut summary: Vec<SummaryRow> = Vec::new();

    for (model_name, params) in &models {
        for variant in &variants {
            // In batch mode a failed unit becomes NaN summary rows so the
            // summary keeps a stable shape; a single-model run is fatal.
            let unit = evaluate_one(&loaded, &cache, mode, model_name, params, variant)
                .and_then(|(result, key, cache_hit)| {
                    let run_dir =
                        persist_run(&loaded, variant, &result, params, &key, cache_hit)?;
                    Ok((result, run_dir, cache_hit))
                });
            let (result, run_dir, cache_hit) = match unit {
                Ok(r) => r,
                Err(e) if all => {
                    eprintln!("error: {model_name}: {e}");
                    for &h in &recipe.horizons {
                        summary.push(SummaryRow {
                            model_name: model_name.clone(),
                            strategy: recipe.strategy,
                            feature_desc: features::describe(variant),
                            horizon: h,
                            rmse: f64::NAN,
                            mae: f64::NAN,
                            run_dir: String::new(),
                            cache_hit: false,
                        });
                    }
                    continue;
                }
                Err(e) => return fail(&e),
            };
            for hr in &result.horizons {
                eprintln!(
                    "  {} [{}] h{}: rmse={:.4} mae={:.4} ({} rows)",
                    model_name, result.feature_desc, hr.horizon, hr.accuracy.rmse, hr.accuracy.mae,
                    hr.rows.len(),
                );
                summary.push(SummaryRow {
                    model_name: model_name.clone(),
                    strategy: recipe.strategy,
                    feature_desc: result.feature_desc.clone(),
                    horizon: hr.horizon,
                    rmse: hr.accuracy.rmse,
                    mae: hr.accuracy.mae,
                    run_dir: run_dir.clone(),
                    cache_hit,
                });
            }
        }
    }

    if all {
        match write_summary(&loaded.output_base, &summary) {
            Ok(path) => eprintln!("Summary written to {}", path.display()),
            Err(e) => return fail(&e),
        }
    }
    ExitCode::SUCCESS
}

fn run_predict(recipe_path: &Path, run_dir: Option<PathBuf>) -> ExitCode {
    let loaded = match load_recipe_and_data(recipe_path, None) {
        Ok(l) => l,
        Err(e) => return fail(&e),
    };
    let recipe = &loaded.recipe;
    let choice = match recipe.model.as_ref() {
        Some(c) => c,
        None => {
            return fail(&HindcastError::RecipeInvalid {
                field: "model".into(),
                reason: "predict requires a model in the recipe".into(),
            })
        }
    };

    let run_dir = match run_dir {
        Some(dir) => dir,
        None => match find_latest_with_models(&loaded.output_base, &choice.name) {
            Ok(dir) => dir,
            Err(e) => return fail(&e),
        },
    };
    eprintln!("Using trained run {}", run_dir.display());
    let out = OutputManager::open(run_dir);

    let mut cfg = recipe.features.clone();
    cfg.sweep = None;
    let latest = match features::latest_row(&loaded.frame, &recipe.target_id, &cfg) {
        Some(row) => row,
        None => {
            return fail(&HindcastError::Data {
                reason: "no origin with complete features to predict from".into(),
            })
        }
    };

    let mut rows: Vec<BacktestRow> = Vec::with_capacity(recipe.horizons.len());
    for &h in &recipe.horizons {
        let saved = match out.load_model_params(h) {
            Ok(p) => p,
            Err(e) => return fail(&e),
        };
        if saved.plugin != choice.name {
            return fail(&HindcastError::Data {
                reason: format!(
                    "run holds a {:?} model at h{}, recipe wants {:?}",
                    saved.plugin, h, choice.name
                ),
            });
        }
        let mut fitted = match model::create(&choice.name, &choice.params) {
            Ok(m) => m,
            Err(e) => return fail(&e),
        };
        if let Err(e) = fitted.load_params(&saved.params) {
            return fail(&e);
        }
        let forecast = fitted.predict(&crate::domain::model::PredictRow {
            x: &latest.x,
            y_t: latest.y_t,
        });
        let target_date = advance(latest.origin_date, recipe.frequency, h);
        eprintln!(
            "  {} h{}: {} -> {} forecast {:.4}",
            choice.name,
            h,
            format_ymd(latest.origin_date),
            format_ymd(target_date),
            forecast,
        );
        rows.push(BacktestRow {
            origin_date: latest.origin_date,
            target_date,
            horizon: h,
            y_t: latest.y_t,
            forecast,
            actual: f64::NAN,
            error: f64::NAN,
        });
    }
    if let Err(e) = out.save_predictions(&rows) {
        return fail(&e);
    }
    ExitCode::SUCCESS
}

fn run_validate(recipe_path: &Path) -> ExitCode {
    let loaded = match load_recipe_and_data(recipe_path, None) {
        Ok(l) => l,
        Err(e) => return fail(&e),
    };
    let recipe = &loaded.recipe;

    let models = match resolve_models(recipe, recipe.model.is_none()) {
        Ok(m) => m,
        Err(e) => return fail(&e),
    };
    let registry = model::discover();
    for (name, _) in &models {
        if let Some(plugin) = registry.get(name.as_str()) {
            eprintln!(
                "  model {}: {} (default lags {:?})",
                plugin.name, plugin.description, plugin.spec.default_target_lags,
            );
        }
    }
    let manifest = features::build_manifest(&loaded.frame, &recipe.target_id, &recipe.features);
    let variants =
        features::feature_variants(&recipe.features, &loaded.frame, &recipe.target_id);
    eprintln!(
        "OK: target {:?}, {} feature column(s), {} sweep variant(s), horizons {:?}",
        recipe.target_id, manifest.columns_count, variants.len(), recipe.horizons,
    );
    for &h in &recipe.horizons {
        let set = features::assemble(&loaded.frame, &recipe.target_id, &recipe.features, h);
        eprintln!("  h{}: {} usable supervised rows", h, set.len());
    }
    ExitCode::SUCCESS
}

fn run_cache_stats(dir: &Path) -> ExitCode {
    let cache = FsCacheAdapter::new(dir.join("model_library"));
    match cache.stats() {
        Ok(stats) => {
            eprintln!(
                "{} cached result(s), {} saved model(s), {} bytes, under {}",
                stats.entries,
                stats.models,
                stats.total_bytes,
                dir.join("model_library").display(),
            );
            ExitCode::SUCCESS
        }
        Err(e) => fail(&e),
    }
}

fn run_cache_clear(dir: &Path, older_than_days: Option<u64>) -> ExitCode {
    let cache = FsCacheAdapter::new(dir.join("model_library"));
    match cache.clear(older_than_days) {
        Ok(removed) => {
            eprintln!("Removed {removed} cached result(s)");
            ExitCode::SUCCESS
        }
        Err(e) => fail(&e),
    }
}
