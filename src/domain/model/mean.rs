//! Mean baseline: the forecast is the mean of the training targets.

use crate::domain::error::HindcastError;
use crate::domain::model::{FitData, ForecastModel, PredictRow};

#[derive(Debug)]
pub struct MeanModel {
    mean: f64,
}

impl Default for MeanModel {
    fn default() -> Self {
        MeanModel { mean: f64::NAN }
    }
}

pub fn build(_config: &serde_json::Value) -> Result<Box<dyn ForecastModel>, HindcastError> {
    Ok(Box::new(MeanModel::default()))
}

impl ForecastModel for MeanModel {
    fn name(&self) -> &'static str {
        "mean"
    }

    fn fit(&mut self, data: &FitData) -> Result<(), HindcastError> {
        let finite: Vec<f64> = data.y.iter().copied().filter(|v| v.is_finite()).collect();
        self.mean = if finite.is_empty() {
            f64::NAN
        } else {
            finite.iter().sum::<f64>() / finite.len() as f64
        };
        Ok(())
    }

    fn predict(&self, _row: &PredictRow) -> f64 {
        self.mean
    }

    fn params(&self) -> serde_json::Value {
        serde_json::json!({ "mean": self.mean })
    }

    fn load_params(&mut self, params: &serde_json::Value) -> Result<(), HindcastError> {
        self.mean = params
            .get("mean")
            .and_then(serde_json::Value::as_f64)
            .ok_or_else(|| HindcastError::Data {
                reason: "mean params missing numeric `mean`".into(),
            })?;
        Ok(())
    }
}
