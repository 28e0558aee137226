//! Derived-column transforms over NaN-sparse series.
//!
//! All functions take a slice where NaN marks a missing observation and
//! return a same-length vector, NaN where the output is undefined. Every
//! window is trailing (causal): position `i` only reads positions `<= i`.

use crate::domain::recipe::TransformSpec;

/// Guard against division by values indistinguishable from zero.
const PCT_EPS: f64 = 1e-12;

/// `vals[i] - vals[i-k]`.
pub fn diff(vals: &[f64], k: u32) -> Vec<f64> {
    let k = k as usize;
    (0..vals.len())
        .map(|i| {
            if i >= k && vals[i].is_finite() && vals[i - k].is_finite() {
                vals[i] - vals[i - k]
            } else {
                f64::NAN
            }
        })
        .collect()
}

/// Percent change over `k` periods, in percent units.
pub fn pct_change(vals: &[f64], k: u32) -> Vec<f64> {
    let k = k as usize;
    (0..vals.len())
        .map(|i| {
            if i >= k
                && vals[i].is_finite()
                && vals[i - k].is_finite()
                && vals[i - k].abs() > PCT_EPS
            {
                (vals[i] - vals[i - k]) / vals[i - k].abs() * 100.0
            } else {
                f64::NAN
            }
        })
        .collect()
}

/// Trailing-window mean with an incremental sum (O(1) amortized per step).
///
/// The window tolerates missing observations: once the window is full-width,
/// the mean is taken over however many finite values it holds.
pub fn rolling_mean(vals: &[f64], window: usize) -> Vec<f64> {
    if window <= 1 {
        return vals.to_vec();
    }
    let mut out = vec![f64::NAN; vals.len()];
    let mut sum = 0.0;
    let mut count = 0usize;
    for i in 0..vals.len() {
        if vals[i].is_finite() {
            sum += vals[i];
            count += 1;
        }
        if i >= window {
            let old = vals[i - window];
            if old.is_finite() {
                sum -= old;
                count -= 1;
            }
        }
        if i >= window - 1 && count > 0 {
            out[i] = sum / count as f64;
        }
    }
    out
}

/// Trailing-window population standard deviation.
///
/// Unlike [`rolling_mean`], a missing value anywhere in the window makes the
/// output undefined at that position.
pub fn rolling_std(vals: &[f64], window: usize) -> Vec<f64> {
    let mut out = vec![f64::NAN; vals.len()];
    if window <= 1 {
        for (i, v) in vals.iter().enumerate() {
            if v.is_finite() {
                out[i] = 0.0;
            }
        }
        return out;
    }
    for i in 0..vals.len() {
        let Some(j0) = (i + 1).checked_sub(window) else {
            continue;
        };
        let seg = &vals[j0..=i];
        if seg.iter().any(|v| !v.is_finite()) {
            continue;
        }
        let mean = seg.iter().sum::<f64>() / seg.len() as f64;
        let var = seg.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / seg.len() as f64;
        out[i] = var.sqrt();
    }
    out
}

/// Exponential moving average with smoothing factor `2 / (span + 1)`.
///
/// Missing observations carry the previous EMA value forward.
pub fn ema(vals: &[f64], span: usize) -> Vec<f64> {
    let alpha = if span > 0 { 2.0 / (span as f64 + 1.0) } else { 1.0 };
    let mut out = vec![f64::NAN; vals.len()];
    let mut state = f64::NAN;
    for (i, &v) in vals.iter().enumerate() {
        if v.is_finite() {
            state = if state.is_finite() {
                alpha * v + (1.0 - alpha) * state
            } else {
                v
            };
        }
        out[i] = state;
    }
    out
}

/// Rolling z-score: `(v - mean) / std` over the same trailing window.
///
/// Undefined where the mean or std is undefined, or where the std is zero.
pub fn zscore(vals: &[f64], window: usize) -> Vec<f64> {
    let mu = rolling_mean(vals, window);
    let sd = rolling_std(vals, window);
    (0..vals.len())
        .map(|i| {
            if vals[i].is_finite() && mu[i].is_finite() && sd[i].is_finite() && sd[i] != 0.0 {
                (vals[i] - mu[i]) / sd[i]
            } else {
                f64::NAN
            }
        })
        .collect()
}

/// Apply one transform spec to its source values.
pub fn apply(spec: &TransformSpec, vals: &[f64]) -> Vec<f64> {
    match spec {
        TransformSpec::Diff { k, .. } => diff(vals, *k),
        TransformSpec::PctChange { k, .. } => pct_change(vals, *k),
        TransformSpec::RollingMean { window, .. } => rolling_mean(vals, *window),
        TransformSpec::RollingStd { window, .. } => rolling_std(vals, *window),
        TransformSpec::Ema { span, .. } => ema(vals, *span),
        TransformSpec::Zscore { window, .. } => zscore(vals, *window),
    }
}
