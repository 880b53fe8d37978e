//! Held-out evaluation metrics

use crate::error::{Result, VinoError};
use ndarray::Array1;
use serde::{Deserialize, Serialize};

use super::scoring::check_pair;

/// Test-set metrics, persisted verbatim as `metrics.json`
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RegressionMetrics {
    /// Root mean squared error
    pub rmse: f64,
    /// Mean absolute error
    pub mae: f64,
    /// Coefficient of determination
    pub r2: f64,
}

impl RegressionMetrics {
    /// Compute RMSE, MAE and R².
    ///
    /// A constant target makes R² undefined unless the predictions are exact,
    /// in which case it is reported as 1.0.
    pub fn compute(y_true: &Array1<f64>, y_pred: &Array1<f64>) -> Result<Self> {
        check_pair(y_true, y_pred)?;

        let n = y_true.len() as f64;
        let mean = y_true.sum() / n;

        let mut ss_res = 0.0;
        let mut ss_tot = 0.0;
        let mut abs_sum = 0.0;
        for (&t, &p) in y_true.iter().zip(y_pred.iter()) {
            let err = t - p;
            ss_res += err * err;
            abs_sum += err.abs();
            ss_tot += (t - mean).powi(2);
        }

        let r2 = if ss_tot > 0.0 {
            1.0 - ss_res / ss_tot
        } else if ss_res == 0.0 {
            1.0
        } else {
            return Err(VinoError::UndefinedR2);
        };

        Ok(Self {
            rmse: (ss_res / n).sqrt(),
            mae: abs_sum / n,
            r2,
        })
    }
}
