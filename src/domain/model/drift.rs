//! Drift baseline: last value plus the average per-step change seen in
//! training, scaled by the horizon.

use crate::domain::error::HindcastError;
use crate::domain::model::{FitData, ForecastModel, PredictRow};

#[derive(Debug, Default)]
pub struct DriftModel {
    slope: f64,
    horizon: u32,
}

pub fn build(_config: &serde_json::Value) -> Result<Box<dyn ForecastModel>, HindcastError> {
    Ok(Box::new(DriftModel::default()))
}

impl ForecastModel for DriftModel {
    fn name(&self) -> &'static str {
        "drift"
    }

    fn fit(&mut self, data: &FitData) -> Result<(), HindcastError> {
        self.horizon = data.horizon;
        let h = data.horizon.max(1) as f64;
        let mut sum = 0.0;
        let mut count = 0usize;
        for (y, y_t) in data.y.iter().zip(data.y_t) {
            if y.is_finite() && y_t.is_finite() {
                sum += (y - y_t) / h;
                count += 1;
            }
        }
        self.slope = if count > 0 { sum / count as f64 } else { 0.0 };
        Ok(())
    }

    fn predict(&self, row: &PredictRow) -> f64 {
        row.y_t + self.slope * self.horizon.max(1) as f64
    }

    fn params(&self) -> serde_json::Value {
        serde_json::json!({ "slope": self.slope, "horizon": self.horizon })
    }

    fn load_params(&mut self, params: &serde_json::Value) -> Result<(), HindcastError> {
        self.slope = params
            .get("slope")
            .and_then(serde_json::Value::as_f64)
            .ok_or_else(|| HindcastError::Data {
                reason: "drift params missing numeric `slope`".into(),
            })?;
        self.horizon = params
            .get("horizon")
            .and_then(serde_json::Value::as_u64)
            .unwrap_or(1) as u32;
        Ok(())
    }
}
