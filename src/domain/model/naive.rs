//! Naive baseline: the forecast at any horizon is the last observed value.

use crate::domain::error::HindcastError;
use crate::domain::model::{FitData, ForecastModel, PredictRow};

#[derive(Debug, Default)]
pub struct NaiveModel {
    fitted: bool,
}

pub fn build(_config: &serde_json::Value) -> Result<Box<dyn ForecastModel>, HindcastError> {
    Ok(Box::new(NaiveModel::default()))
}

impl ForecastModel for NaiveModel {
    fn name(&self) -> &'static str {
        "naive"
    }

    fn fit(&mut self, _data: &FitData) -> Result<(), HindcastError> {
        self.fitted = true;
        Ok(())
    }

    fn predict(&self, row: &PredictRow) -> f64 {
        row.y_t
    }

    fn params(&self) -> serde_json::Value {
        serde_json::json!({ "fitted": self.fitted })
    }

    fn load_params(&mut self, params: &serde_json::Value) -> Result<(), HindcastError> {
        self.fitted = params
            .get("fitted")
            .and_then(serde_json::Value::as_bool)
            .unwrap_or(true);
        Ok(())
    }
}
