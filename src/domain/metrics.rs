//! Forecast accuracy metrics.

use serde::{Deserialize, Serialize};

/// RMSE/MAE pair for one horizon. Both are NaN when no valid pairs exist.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Accuracy {
    #[serde(with = "nan_as_null")]
    pub rmse: f64,
    #[serde(with = "nan_as_null")]
    pub mae: f64,
}

impl Accuracy {
    pub fn nan() -> Self {
        Accuracy {
            rmse: f64::NAN,
            mae: f64::NAN,
        }
    }
}

/// Compute RMSE and MAE over finite actual/forecast pairs only.
pub fn rmse_mae(actual: &[f64], forecast: &[f64]) -> Accuracy {
    let mut n = 0usize;
    let mut se = 0.0;
    let mut ae = 0.0;
    for (a, f) in actual.iter().zip(forecast) {
        if !a.is_finite() || !f.is_finite() {
            continue;
        }
        let e = a - f;
        se += e * e;
        ae += e.abs();
        n += 1;
    }
    if n == 0 {
        return Accuracy::nan();
    }
    Accuracy {
        rmse: (se / n as f64).sqrt(),
        mae: ae / n as f64,
    }
}

/// Serde adapter for metric fields: NaN is written as JSON `null` and read
/// back as NaN, so cached results survive a round trip.
pub mod nan_as_null {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(v: &f64, s: S) -> Result<S::Ok, S::Error> {
        if v.is_finite() {
            s.serialize_some(v)
        } else {
            s.serialize_none()
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<f64, D::Error> {
        let opt: Option<f64> = Option::deserialize(d)?;
        Ok(opt.unwrap_or(f64::NAN))
    }
}
