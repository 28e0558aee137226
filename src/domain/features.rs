//! Feature assembly: declarative config to aligned supervised datasets.
//!
//! Column layout is deterministic: target lags ascending, then exogenous
//! columns grouped by name (alphabetical) with ascending lags, then derived
//! columns (alphabetical). Rows with any non-finite feature or target are
//! dropped whole, never imputed.

use chrono::NaiveDate;
use serde::Serialize;
use std::collections::BTreeMap;

use crate::domain::frame::TimeSeriesFrame;
use crate::domain::recipe::{
    ExogSpec, FeatureConfig, NormalizeMethod, NormalizeSpec, Pack, SweepSpec, TransformSpec,
    EXOG_ALL,
};
use crate::domain::transform;

/// Aligned supervised dataset for one horizon.
#[derive(Debug, Clone)]
pub struct SupervisedSet {
    pub origin_dates: Vec<NaiveDate>,
    pub x: Vec<Vec<f64>>,
    pub y: Vec<f64>,
    /// Target value at the origin itself.
    pub y_t: Vec<f64>,
}

impl SupervisedSet {
    pub fn len(&self) -> usize {
        self.origin_dates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.origin_dates.is_empty()
    }
}

/// Horizon-independent description of the final feature-column layout.
#[derive(Debug, Clone, Serialize)]
pub struct FeatureManifest {
    pub pack: Option<Pack>,
    pub normalize: Option<NormalizeSpec>,
    pub target_lags: Vec<u32>,
    pub exog_lags: BTreeMap<String, Vec<u32>>,
    pub derived_count: usize,
    pub columns_count: usize,
    pub columns: Vec<String>,
}

/// Expand the `__all__` exogenous wildcard to every non-target column,
/// honoring per-name overrides.
pub fn expand_exog(
    frame: &TimeSeriesFrame,
    target_id: &str,
    cfg: &FeatureConfig,
) -> BTreeMap<String, ExogSpec> {
    let Some(template) = cfg.exog.get(EXOG_ALL) else {
        return cfg.exog.clone();
    };
    let mut expanded: BTreeMap<String, ExogSpec> = frame
        .column_names()
        .filter(|name| *name != target_id)
        .map(|name| (name.to_string(), template.clone()))
        .collect();
    for (name, spec) in &cfg.exog {
        if name != EXOG_ALL {
            expanded.insert(name.clone(), spec.clone());
        }
    }
    expanded
}

fn sorted_unique(lags: &[u32]) -> Vec<u32> {
    let mut out = lags.to_vec();
    out.sort_unstable();
    out.dedup();
    out
}

/// Transform bundle for a named pack.
fn pack_transforms(
    pack: Pack,
    target_id: &str,
    exog: &BTreeMap<String, ExogSpec>,
) -> Vec<TransformSpec> {
    match pack {
        Pack::TaBasic => {
            let t = target_id.to_string();
            let mut specs = vec![
                TransformSpec::Diff { on: t.clone(), k: 1 },
                TransformSpec::Diff { on: t.clone(), k: 12 },
                TransformSpec::PctChange { on: t.clone(), k: 1 },
                TransformSpec::PctChange { on: t.clone(), k: 12 },
                TransformSpec::RollingMean { on: t.clone(), window: 6 },
                TransformSpec::RollingStd { on: t.clone(), window: 6 },
                TransformSpec::Ema { on: t, span: 6 },
            ];
            for name in exog.keys() {
                specs.push(TransformSpec::RollingMean {
                    on: name.clone(),
                    window: 3,
                });
                specs.push(TransformSpec::Ema {
                    on: name.clone(),
                    span: 5,
                });
            }
            specs
        }
    }
}

/// Pack plus explicit derived specs, restricted to columns the frame has.
fn derived_specs(
    frame: &TimeSeriesFrame,
    target_id: &str,
    cfg: &FeatureConfig,
    exog: &BTreeMap<String, ExogSpec>,
) -> Vec<TransformSpec> {
    let mut specs = Vec::new();
    if let Some(pack) = cfg.pack {
        specs.extend(pack_transforms(pack, target_id, exog));
    }
    specs.extend(cfg.derived.iter().cloned());
    specs.retain(|s| frame.column(s.on()).is_some());
    specs
}

fn lag_column_name(col: &str, lag: u32) -> String {
    format!("{col}__lag{lag}")
}

/// Final column order with the `max_features` cap applied. Lag columns are
/// kept preferentially over derived columns when truncating.
fn column_order(
    target_id: &str,
    target_lags: &[u32],
    exog: &BTreeMap<String, ExogSpec>,
    derived_names: &[String],
    max_features: Option<usize>,
) -> Vec<String> {
    let mut lag_cols: Vec<String> = sorted_unique(target_lags)
        .iter()
        .map(|k| lag_column_name(target_id, *k))
        .collect();
    for (name, spec) in exog {
        for k in sorted_unique(&spec.lags) {
            lag_cols.push(lag_column_name(name, k));
        }
    }
    let mut derived: Vec<String> = derived_names.to_vec();
    derived.sort_unstable();

    let mut cols = lag_cols;
    cols.extend(derived);
    if let Some(cap) = max_features {
        if cap > 0 {
            cols.truncate(cap);
        }
    }
    cols
}

struct AssembledColumns {
    order: Vec<String>,
    columns: BTreeMap<String, Vec<f64>>,
    max_lag: usize,
}

/// Materialize every feature column (lags, derived, normalization) in final
/// order. Row filtering happens in the callers.
fn build_columns(frame: &TimeSeriesFrame, target_id: &str, cfg: &FeatureConfig) -> AssembledColumns {
    let n = frame.len();
    let exog = expand_exog(frame, target_id, cfg);

    // Raw lag columns for the target and every exogenous name.
    let mut columns: BTreeMap<String, Vec<f64>> = BTreeMap::new();
    let mut lag_spec: Vec<(&str, &[u32])> = vec![(target_id, cfg.target_lags.as_slice())];
    for (name, spec) in &exog {
        if !spec.lags.is_empty() {
            lag_spec.push((name.as_str(), spec.lags.as_slice()));
        }
    }
    for (col, lags) in lag_spec {
        let Some(base) = frame.column(col) else {
            continue;
        };
        for k in sorted_unique(lags) {
            let vals: Vec<f64> = (0..n)
                .map(|i| {
                    if i >= k as usize {
                        base[i - k as usize]
                    } else {
                        f64::NAN
                    }
                })
                .collect();
            columns.insert(lag_column_name(col, k), vals);
        }
    }

    // Derived transforms.
    let specs = derived_specs(frame, target_id, cfg, &exog);
    let mut derived_names = Vec::with_capacity(specs.len());
    for spec in &specs {
        let base = frame.column(spec.on()).unwrap_or(&[]);
        let name = spec.column_name();
        derived_names.push(name.clone());
        columns.insert(name, transform::apply(spec, base));
    }

    // Rolling normalization over every feature column; the window is causal,
    // so train and test positions see identical statistics.
    if let Some(norm) = &cfg.normalize {
        if norm.method == NormalizeMethod::Zscore {
            for vals in columns.values_mut() {
                *vals = transform::zscore(vals, norm.window);
            }
        }
    }

    let order = column_order(
        target_id,
        &cfg.target_lags,
        &exog,
        &derived_names,
        cfg.max_features,
    );

    let max_lag = cfg
        .target_lags
        .iter()
        .chain(exog.values().flat_map(|s| s.lags.iter()))
        .copied()
        .max()
        .unwrap_or(0) as usize;

    AssembledColumns {
        order,
        columns,
        max_lag,
    }
}

/// Assemble `(origin_dates, X, y, y_t)` for one horizon.
pub fn assemble(
    frame: &TimeSeriesFrame,
    target_id: &str,
    cfg: &FeatureConfig,
    horizon: u32,
) -> SupervisedSet {
    let n = frame.len();
    let AssembledColumns {
        order,
        columns,
        max_lag,
    } = build_columns(frame, target_id, cfg);

    let target = frame.column(target_id).unwrap_or(&[]);
    let mut set = SupervisedSet {
        origin_dates: Vec::new(),
        x: Vec::new(),
        y: Vec::new(),
        y_t: Vec::new(),
    };
    if target.is_empty() {
        return set;
    }

    'rows: for i in 0..n {
        let j = i + horizon as usize;
        if i < max_lag || j >= n || !target[j].is_finite() {
            continue;
        }
        let mut row = Vec::with_capacity(order.len());
        for name in &order {
            let v = columns.get(name).map_or(f64::NAN, |vals| vals[i]);
            if !v.is_finite() {
                continue 'rows;
            }
            row.push(v);
        }
        set.origin_dates.push(frame.dates()[i]);
        set.x.push(row);
        set.y.push(target[j]);
        set.y_t.push(target[i]);
    }
    set
}

/// Feature row at the newest usable origin, for out-of-sample prediction.
#[derive(Debug, Clone)]
pub struct LatestRow {
    pub origin_date: NaiveDate,
    pub x: Vec<f64>,
    pub y_t: f64,
}

/// The most recent origin whose features and target value are all finite.
/// Returns `None` when no origin qualifies.
pub fn latest_row(frame: &TimeSeriesFrame, target_id: &str, cfg: &FeatureConfig) -> Option<LatestRow> {
    let AssembledColumns {
        order,
        columns,
        max_lag,
    } = build_columns(frame, target_id, cfg);
    let target = frame.column(target_id)?;

    'origins: for i in (max_lag..frame.len()).rev() {
        if !target[i].is_finite() {
            continue;
        }
        let mut x = Vec::with_capacity(order.len());
        for name in &order {
            let v = columns.get(name).map_or(f64::NAN, |vals| vals[i]);
            if !v.is_finite() {
                continue 'origins;
            }
            x.push(v);
        }
        return Some(LatestRow {
            origin_date: frame.dates()[i],
            x,
            y_t: target[i],
        });
    }
    None
}

/// Compute the feature manifest without assembling any rows.
pub fn build_manifest(
    frame: &TimeSeriesFrame,
    target_id: &str,
    cfg: &FeatureConfig,
) -> FeatureManifest {
    let exog = expand_exog(frame, target_id, cfg);
    let specs = derived_specs(frame, target_id, cfg, &exog);
    let derived_names: Vec<String> = specs.iter().map(TransformSpec::column_name).collect();

    let columns = column_order(
        target_id,
        &cfg.target_lags,
        &exog,
        &derived_names,
        cfg.max_features,
    );
    FeatureManifest {
        pack: cfg.pack,
        normalize: cfg.normalize.clone(),
        target_lags: cfg.target_lags.clone(),
        exog_lags: exog
            .iter()
            .map(|(name, spec)| (name.clone(), spec.lags.clone()))
            .collect(),
        derived_count: derived_names.len(),
        columns_count: columns.len(),
        columns,
    }
}

/// All choose-k subsets of `items`, in lexicographic order.
pub fn combinations(items: &[String], k: usize) -> Vec<Vec<String>> {
    if k == 0 || k > items.len() {
        return Vec::new();
    }
    let mut out = Vec::new();
    let mut idx: Vec<usize> = (0..k).collect();
    loop {
        out.push(idx.iter().map(|&i| items[i].clone()).collect());
        // Advance the rightmost index that can still move.
        let mut pos = k;
        while pos > 0 {
            pos -= 1;
            if idx[pos] != pos + items.len() - k {
                idx[pos] += 1;
                for p in pos + 1..k {
                    idx[p] = idx[p - 1] + 1;
                }
                break;
            }
            if pos == 0 {
                return out;
            }
        }
    }
}

/// Expand the sweep block into concrete feature-config variants.
///
/// The cartesian base is packs x normalize x max_features (each axis
/// defaulting to the recipe's own setting), then optionally multiplied by
/// every choose-k subset of candidate exogenous columns.
pub fn feature_variants(
    cfg: &FeatureConfig,
    frame: &TimeSeriesFrame,
    target_id: &str,
) -> Vec<FeatureConfig> {
    let sweep = cfg.sweep.clone().unwrap_or_default();

    let packs: Vec<Option<Pack>> = if sweep.packs.is_empty() {
        vec![cfg.pack]
    } else {
        sweep.packs.clone()
    };
    let norms: Vec<Option<NormalizeSpec>> = if sweep.normalize.is_empty() {
        vec![cfg.normalize.clone()]
    } else {
        sweep.normalize.clone()
    };
    let max_feats: Vec<Option<usize>> = if sweep.max_features.is_empty() {
        vec![cfg.max_features]
    } else {
        sweep.max_features.iter().map(|m| Some(*m)).collect()
    };

    let mut variants = Vec::new();
    for pack in &packs {
        for norm in &norms {
            for max in &max_feats {
                let normalize = norm
                    .clone()
                    .filter(|n| n.method != NormalizeMethod::None);
                variants.push(FeatureConfig {
                    target_lags: cfg.target_lags.clone(),
                    exog: cfg.exog.clone(),
                    pack: *pack,
                    derived: Vec::new(),
                    normalize,
                    max_features: *max,
                    sweep: None,
                });
            }
        }
    }

    if let Some(k) = sweep.exog_combo_k.filter(|k| *k > 0) {
        variants = expand_exog_combos(&variants, &sweep, frame, target_id, k);
    }
    variants
}

fn expand_exog_combos(
    variants: &[FeatureConfig],
    sweep: &SweepSpec,
    frame: &TimeSeriesFrame,
    target_id: &str,
    k: usize,
) -> Vec<FeatureConfig> {
    let mut candidates: Vec<String> = frame
        .column_names()
        .filter(|name| *name != target_id)
        .filter(|name| {
            sweep.exog_combo_names.is_empty()
                || sweep.exog_combo_names.iter().any(|n| n == name)
        })
        .map(str::to_string)
        .collect();
    candidates.sort_unstable();

    let mut combos = combinations(&candidates, k);
    if let Some(limit) = sweep.exog_combo_limit.filter(|l| *l > 0) {
        combos.truncate(limit);
    }

    let mut expanded = Vec::with_capacity(variants.len() * combos.len());
    for base in variants {
        let template_lags = base.exog.get(EXOG_ALL).map(|s| s.lags.clone());
        for combo in &combos {
            let mut variant = base.clone();
            variant.exog = combo
                .iter()
                .map(|name| {
                    let lags = base
                        .exog
                        .get(name)
                        .map(|s| s.lags.clone())
                        .or_else(|| template_lags.clone())
                        .unwrap_or_else(|| vec![0]);
                    (name.clone(), ExogSpec { lags })
                })
                .collect();
            expanded.push(variant);
        }
    }
    expanded
}

/// One-line human description of a variant, for batch summaries.
pub fn describe(cfg: &FeatureConfig) -> String {
    let mut parts = Vec::new();
    if let Some(pack) = cfg.pack {
        parts.push(format!("pack={pack}"));
    }
    if let Some(norm) = &cfg.normalize {
        if norm.method == NormalizeMethod::Zscore {
            parts.push(format!("norm=z({})", norm.window));
        }
    }
    if !cfg.target_lags.is_empty() {
        parts.push(format!("t_lags={:?}", cfg.target_lags));
    }
    let exog: Vec<String> = cfg
        .exog
        .iter()
        .filter(|(_, spec)| !spec.lags.is_empty())
        .map(|(name, spec)| format!("{name}{:?}", spec.lags))
        .collect();
    if !exog.is_empty() {
        parts.push(format!("exog={}", exog.join(",")));
    }
    if let Some(max) = cfg.max_features {
        parts.push(format!("maxF={max}"));
    }
    if parts.is_empty() {
        "lags-only".to_string()
    } else {
        parts.join("; ")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn d(y: i32, m: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, 28).unwrap()
    }

    /// Frame with `n` monthly rows: y = 0,1,2,... and x1 = 10,11,12,...
    fn ramp_frame(n: usize) -> TimeSeriesFrame {
        let dates: Vec<NaiveDate> = (0..n)
            .map(|i| crate::domain::dates::advance(d(2010, 1), crate::domain::dates::Frequency::Monthly, i as u32))
            .collect();
        let mut cols = BTreeMap::new();
        cols.insert("y".to_string(), (0..n).map(|i| i as f64).collect());
        cols.insert("x1".to_string(), (0..n).map(|i| 10.0 + i as f64).collect());
        TimeSeriesFrame::new(dates, cols).unwrap()
    }

    fn lags_cfg(target_lags: &[u32]) -> FeatureConfig {
        FeatureConfig {
            target_lags: target_lags.to_vec(),
            ..FeatureConfig::default()
        }
    }

    #[test]
    fn assemble_aligns_lags_and_targets() {
        let frame = ramp_frame(10);
        let set = assemble(&frame, "y", &lags_cfg(&[1, 2]), 1);
        // Valid origins: i in [2, 8].
        assert_eq!(set.len(), 7);
        assert_eq!(set.origin_dates[0], frame.dates()[2]);
        // First row: lag1 = y[1] = 1, lag2 = y[0] = 0; y = y[3] = 3; y_t = 2.
        assert_eq!(set.x[0], vec![1.0, 0.0]);
        assert_relative_eq!(set.y[0], 3.0);
        assert_relative_eq!(set.y_t[0], 2.0);
        assert_eq!(set.x.len(), set.y.len());
        assert_eq!(set.y.len(), set.y_t.len());
        assert_eq!(set.origin_dates.len(), set.x.len());
    }

    #[test]
    fn assemble_drops_origin_with_nan_at_lag_source() {
        let mut cols = BTreeMap::new();
        let mut y: Vec<f64> = (0..30).map(|i| i as f64).collect();
        y[5] = f64::NAN; // feeds lag 12 at origin 17
        y[25] = f64::NAN; // is the h=1 target of origin 24
        cols.insert("y".to_string(), y);
        let dates: Vec<NaiveDate> = (0..30)
            .map(|i| crate::domain::dates::advance(d(2010, 1), crate::domain::dates::Frequency::Monthly, i))
            .collect();
        let frame = TimeSeriesFrame::new(dates.clone(), cols).unwrap();

        let set = assemble(&frame, "y", &lags_cfg(&[12]), 1);
        assert!(!set.origin_dates.contains(&dates[17]));
        // Neighbors survive.
        assert!(set.origin_dates.contains(&dates[16]));
        assert!(set.origin_dates.contains(&dates[18]));
        assert!(
            !set.origin_dates.contains(&dates[24]),
            "origin whose target is NaN is dropped"
        );
        assert!(set.x.iter().flatten().all(|v| v.is_finite()));
        assert!(set.y.iter().all(|v| v.is_finite()));
    }

    #[test]
    fn wildcard_expands_with_override() {
        let frame = ramp_frame(10);
        let mut cfg = lags_cfg(&[1]);
        cfg.exog.insert(
            EXOG_ALL.to_string(),
            ExogSpec { lags: vec![0, 1] },
        );
        let expanded = expand_exog(&frame, "y", &cfg);
        assert_eq!(expanded.len(), 1);
        assert_eq!(expanded["x1"].lags, vec![0, 1]);

        cfg.exog.insert("x1".to_string(), ExogSpec { lags: vec![3] });
        let expanded = expand_exog(&frame, "y", &cfg);
        assert_eq!(expanded["x1"].lags, vec![3], "explicit entry overrides template");
    }

    #[test]
    fn column_order_is_lags_then_exog_then_derived() {
        let frame = ramp_frame(20);
        let mut cfg = lags_cfg(&[2, 1]);
        cfg.exog.insert("x1".to_string(), ExogSpec { lags: vec![1, 0] });
        cfg.derived = vec![TransformSpec::Diff { on: "y".into(), k: 1 }];
        let manifest = build_manifest(&frame, "y", &cfg);
        assert_eq!(
            manifest.columns,
            vec!["y__lag1", "y__lag2", "x1__lag0", "x1__lag1", "y__diff1"]
        );
        assert_eq!(manifest.derived_count, 1);
    }

    #[test]
    fn max_features_prefers_lag_columns() {
        let frame = ramp_frame(20);
        let mut cfg = lags_cfg(&[1, 2]);
        cfg.derived = vec![
            TransformSpec::Diff { on: "y".into(), k: 1 },
            TransformSpec::Ema { on: "y".into(), span: 6 },
        ];
        cfg.max_features = Some(3);
        let manifest = build_manifest(&frame, "y", &cfg);
        assert_eq!(manifest.columns, vec!["y__lag1", "y__lag2", "y__diff1"]);

        cfg.max_features = Some(1);
        let manifest = build_manifest(&frame, "y", &cfg);
        assert_eq!(manifest.columns, vec!["y__lag1"]);
    }

    #[test]
    fn manifest_matches_assembled_width() {
        let frame = ramp_frame(40);
        let mut cfg = lags_cfg(&[1, 3]);
        cfg.exog.insert("x1".to_string(), ExogSpec { lags: vec![0] });
        cfg.pack = Some(Pack::TaBasic);
        let manifest = build_manifest(&frame, "y", &cfg);
        let set = assemble(&frame, "y", &cfg, 1);
        assert!(!set.is_empty());
        assert_eq!(set.x[0].len(), manifest.columns_count);
    }

    #[test]
    fn pack_ta_basic_column_names() {
        let frame = ramp_frame(40);
        let mut cfg = lags_cfg(&[1]);
        cfg.exog.insert("x1".to_string(), ExogSpec { lags: vec![1] });
        cfg.pack = Some(Pack::TaBasic);
        let manifest = build_manifest(&frame, "y", &cfg);
        for name in [
            "y__diff1", "y__diff12", "y__pctchg1", "y__pctchg12", "y__ma6", "y__std6",
            "y__ema6", "x1__ma3", "x1__ema5",
        ] {
            assert!(manifest.columns.contains(&name.to_string()), "missing {name}");
        }
    }

    #[test]
    fn normalization_applies_to_every_feature_column() {
        let frame = ramp_frame(40);
        let mut cfg = lags_cfg(&[1]);
        cfg.normalize = Some(NormalizeSpec {
            method: NormalizeMethod::Zscore,
            window: 6,
        });
        let set = assemble(&frame, "y", &cfg, 1);
        // A linear ramp has constant z-score within any full window.
        assert!(!set.is_empty());
        for row in &set.x {
            assert_relative_eq!(row[0], set.x[0][0], epsilon = 1e-9);
        }
    }

    #[test]
    fn combinations_choose_2_of_4() {
        let names: Vec<String> = ["a", "b", "c", "d"].iter().map(|s| s.to_string()).collect();
        let combos = combinations(&names, 2);
        assert_eq!(combos.len(), 6);
        assert_eq!(combos[0], vec!["a", "b"]);
        assert_eq!(combos[5], vec!["c", "d"]);
    }

    #[test]
    fn combinations_degenerate() {
        let names: Vec<String> = vec!["a".into()];
        assert!(combinations(&names, 0).is_empty());
        assert!(combinations(&names, 2).is_empty());
        assert_eq!(combinations(&names, 1).len(), 1);
    }

    #[test]
    fn exog_combo_sweep_produces_choose_k_variants() {
        let dates: Vec<NaiveDate> = (0..10)
            .map(|i| crate::domain::dates::advance(d(2020, 1), crate::domain::dates::Frequency::Monthly, i))
            .collect();
        let mut cols = BTreeMap::new();
        for name in ["y", "a", "b", "c", "e"] {
            cols.insert(name.to_string(), vec![1.0; 10]);
        }
        let frame = TimeSeriesFrame::new(dates, cols).unwrap();

        let mut cfg = lags_cfg(&[1]);
        cfg.exog.insert(EXOG_ALL.to_string(), ExogSpec { lags: vec![0, 1] });
        cfg.sweep = Some(SweepSpec {
            exog_combo_k: Some(2),
            ..SweepSpec::default()
        });
        let variants = feature_variants(&cfg, &frame, "y");
        assert_eq!(variants.len(), 6, "C(4,2) = 6");
        for v in &variants {
            assert_eq!(v.exog.len(), 2);
            assert!(v.exog.values().all(|s| s.lags == vec![0, 1]), "template lags applied");
            assert!(v.sweep.is_none());
        }
    }

    #[test]
    fn sweep_cartesian_axes_multiply() {
        let frame = ramp_frame(10);
        let mut cfg = lags_cfg(&[1]);
        cfg.sweep = Some(SweepSpec {
            packs: vec![None, Some(Pack::TaBasic)],
            max_features: vec![5, 10, 20],
            ..SweepSpec::default()
        });
        let variants = feature_variants(&cfg, &frame, "y");
        assert_eq!(variants.len(), 6);
    }

    #[test]
    fn no_sweep_yields_single_variant() {
        let frame = ramp_frame(10);
        let cfg = lags_cfg(&[1, 2]);
        let variants = feature_variants(&cfg, &frame, "y");
        assert_eq!(variants.len(), 1);
        assert_eq!(variants[0].target_lags, vec![1, 2]);
    }

    #[test]
    fn latest_row_uses_the_final_origin() {
        let frame = ramp_frame(10);
        let row = latest_row(&frame, "y", &lags_cfg(&[1, 2])).unwrap();
        assert_eq!(row.origin_date, frame.dates()[9]);
        assert_eq!(row.x, vec![8.0, 7.0]);
        assert_relative_eq!(row.y_t, 9.0);
    }

    #[test]
    fn latest_row_steps_back_over_trailing_nan() {
        let dates: Vec<NaiveDate> = (0..10)
            .map(|i| crate::domain::dates::advance(d(2010, 1), crate::domain::dates::Frequency::Monthly, i))
            .collect();
        let mut y: Vec<f64> = (0..10).map(|i| i as f64).collect();
        y[9] = f64::NAN;
        let mut cols = BTreeMap::new();
        cols.insert("y".to_string(), y);
        let frame = TimeSeriesFrame::new(dates.clone(), cols).unwrap();
        let row = latest_row(&frame, "y", &lags_cfg(&[1])).unwrap();
        assert_eq!(row.origin_date, dates[8]);
    }

    #[test]
    fn latest_row_none_when_nothing_qualifies() {
        let frame = ramp_frame(3);
        assert!(latest_row(&frame, "y", &lags_cfg(&[5])).is_none());
    }

    #[test]
    fn describe_variants() {
        let mut cfg = lags_cfg(&[1, 12]);
        assert_eq!(describe(&lags_cfg(&[])), "lags-only");
        cfg.pack = Some(Pack::TaBasic);
        cfg.max_features = Some(8);
        let desc = describe(&cfg);
        assert!(desc.contains("pack=ta_basic"));
        assert!(desc.contains("t_lags=[1, 12]"));
        assert!(desc.contains("maxF=8"));
    }
}
