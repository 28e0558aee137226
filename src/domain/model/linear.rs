//! Linear regression via the normal equations, with optional ridge
//! regularization on the non-intercept coefficients.
//!
//! The system is solved by Gaussian elimination with partial pivoting. A
//! singular system is not an error: the model falls back to an
//! intercept-only fit at the training mean, which keeps degenerate feature
//! sets (constant columns, more features than rows) usable as baselines.

use crate::domain::error::HindcastError;
use crate::domain::model::{FitData, ForecastModel, PredictRow};

#[derive(Debug, Default)]
pub struct LinearModel {
    ridge_lambda: f64,
    intercept: f64,
    coef: Vec<f64>,
}

pub fn build(config: &serde_json::Value) -> Result<Box<dyn ForecastModel>, HindcastError> {
    let ridge_lambda = config
        .get("ridge_lambda")
        .and_then(serde_json::Value::as_f64)
        .unwrap_or(0.0);
    if ridge_lambda < 0.0 {
        return Err(HindcastError::RecipeInvalid {
            field: "model.params.ridge_lambda".into(),
            reason: "must be >= 0".into(),
        });
    }
    Ok(Box::new(LinearModel {
        ridge_lambda,
        ..LinearModel::default()
    }))
}

enum SolveResult {
    Solved(Vec<f64>),
    Singular,
}

/// Solve `a * x = b` in place. `a` is row-major n x n.
fn solve(mut a: Vec<Vec<f64>>, mut b: Vec<f64>) -> SolveResult {
    let n = b.len();
    for col in 0..n {
        // Partial pivot.
        let pivot = (col..n)
            .max_by(|&i, &j| a[i][col].abs().total_cmp(&a[j][col].abs()))
            .unwrap_or(col);
        if a[pivot][col].abs() < 1e-12 {
            return SolveResult::Singular;
        }
        a.swap(col, pivot);
        b.swap(col, pivot);

        for row in col + 1..n {
            let factor = a[row][col] / a[col][col];
            if factor == 0.0 {
                continue;
            }
            for k in col..n {
                a[row][k] -= factor * a[col][k];
            }
            b[row] -= factor * b[col];
        }
    }
    // Back substitution.
    let mut x = vec![0.0; n];
    for row in (0..n).rev() {
        let mut acc = b[row];
        for k in row + 1..n {
            acc -= a[row][k] * x[k];
        }
        x[row] = acc / a[row][row];
    }
    if x.iter().all(|v| v.is_finite()) {
        SolveResult::Solved(x)
    } else {
        SolveResult::Singular
    }
}

impl ForecastModel for LinearModel {
    fn name(&self) -> &'static str {
        "linear"
    }

    fn fit(&mut self, data: &FitData) -> Result<(), HindcastError> {
        let rows = data.x.len();
        let width = data.x.first().map_or(0, Vec::len);
        let mean_y = if data.y.is_empty() {
            0.0
        } else {
            data.y.iter().sum::<f64>() / data.y.len() as f64
        };

        // Augmented design: column 0 is the intercept.
        let dim = width + 1;
        let mut xtx = vec![vec![0.0; dim]; dim];
        let mut xty = vec![0.0; dim];
        for (row, &y) in data.x.iter().zip(data.y) {
            let mut aug = Vec::with_capacity(dim);
            aug.push(1.0);
            aug.extend_from_slice(row);
            for i in 0..dim {
                for j in 0..dim {
                    xtx[i][j] += aug[i] * aug[j];
                }
                xty[i] += aug[i] * y;
            }
        }
        // Ridge penalty on everything but the intercept.
        for i in 1..dim {
            xtx[i][i] += self.ridge_lambda;
        }

        match solve(xtx, xty) {
            SolveResult::Solved(beta) if rows > 0 => {
                self.intercept = beta[0];
                self.coef = beta[1..].to_vec();
            }
            _ => {
                self.intercept = mean_y;
                self.coef = vec![0.0; width];
            }
        }
        Ok(())
    }

    fn predict(&self, row: &PredictRow) -> f64 {
        if row.x.len() != self.coef.len() {
            return f64::NAN;
        }
        self.intercept
            + self
                .coef
                .iter()
                .zip(row.x)
                .map(|(c, v)| c * v)
                .sum::<f64>()
    }

    fn params(&self) -> serde_json::Value {
        serde_json::json!({
            "ridge_lambda": self.ridge_lambda,
            "intercept": self.intercept,
            "coef": self.coef,
        })
    }

    fn load_params(&mut self, params: &serde_json::Value) -> Result<(), HindcastError> {
        let missing = |field: &str| HindcastError::Data {
            reason: format!("linear params missing `{field}`"),
        };
        self.intercept = params
            .get("intercept")
            .and_then(serde_json::Value::as_f64)
            .ok_or_else(|| missing("intercept"))?;
        self.coef = params
            .get("coef")
            .and_then(serde_json::Value::as_array)
            .ok_or_else(|| missing("coef"))?
            .iter()
            .map(|v| v.as_f64().unwrap_or(f64::NAN))
            .collect();
        self.ridge_lambda = params
            .get("ridge_lambda")
            .and_then(serde_json::Value::as_f64)
            .unwrap_or(0.0);
        Ok(())
    }
}
