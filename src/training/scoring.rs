//! Model selection scoring
//!
//! The selection criterion is a weighted mean absolute error that doubles the
//! penalty on high-quality wines, where a wrong call is most costly.

use crate::error::{Result, VinoError};
use ndarray::Array1;

/// True quality at or above which a sample is up-weighted
pub const HIGH_QUALITY_THRESHOLD: f64 = 7.0;

/// Weight applied to high-quality samples
pub const HIGH_QUALITY_WEIGHT: f64 = 2.0;

/// A loss used to rank candidate configurations. Lower is better.
pub trait Scorer: Send + Sync {
    fn name(&self) -> &str;

    fn score(&self, y_true: &Array1<f64>, y_pred: &Array1<f64>) -> Result<f64>;
}

/// Weighted MAE: `sum(w * |y - y_hat|) / sum(w)` with `w = 2` for `y >= 7`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WeightedMae {
    pub threshold: f64,
    pub weight: f64,
}

impl Default for WeightedMae {
    fn default() -> Self {
        Self {
            threshold: HIGH_QUALITY_THRESHOLD,
            weight: HIGH_QUALITY_WEIGHT,
        }
    }
}

impl Scorer for WeightedMae {
    fn name(&self) -> &str {
        "weighted_mae"
    }

    fn score(&self, y_true: &Array1<f64>, y_pred: &Array1<f64>) -> Result<f64> {
        check_pair(y_true, y_pred)?;

        let (num, den) = y_true
            .iter()
            .zip(y_pred.iter())
            .fold((0.0, 0.0), |(num, den), (&t, &p)| {
                let w = if t >= self.threshold { self.weight } else { 1.0 };
                (num + w * (t - p).abs(), den + w)
            });
        Ok(num / den)
    }
}

/// Weighted MAE with the default threshold and weight.
pub fn weighted_mae(y_true: &Array1<f64>, y_pred: &Array1<f64>) -> Result<f64> {
    WeightedMae::default().score(y_true, y_pred)
}

pub(crate) fn check_pair(y_true: &Array1<f64>, y_pred: &Array1<f64>) -> Result<()> {
    if y_true.len() != y_pred.len() {
        return Err(VinoError::ShapeError {
            expected: format!("{} predictions", y_true.len()),
            actual: format!("{} predictions", y_pred.len()),
        });
    }
    if y_true.is_empty() {
        return Err(VinoError::InvalidInput("Cannot score an empty prediction set".to_string()));
    }
    Ok(())
}
