//! Robust feature scaling on ndarray matrices

use crate::error::{Result, VinoError};
use ndarray::{Array1, Array2, Axis};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

/// Per-column centering and scale
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct ScalerParams {
    center: f64, // median
    scale: f64,  // IQR, or 1.0 when the IQR is zero
}

/// Centers each column on its median and divides by its interquartile range
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RobustScaler {
    params: Vec<ScalerParams>,
    is_fitted: bool,
}

impl RobustScaler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_fitted(&self) -> bool {
        self.is_fitted
    }

    pub fn fit(&mut self, x: &Array2<f64>) -> Result<&mut Self> {
        if x.nrows() == 0 {
            return Err(VinoError::InvalidInput("Cannot fit a scaler on zero rows".to_string()));
        }
        self.params = x
            .axis_iter(Axis(1))
            .map(|col| {
                let mut sorted = col.to_vec();
                sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(Ordering::Equal));
                let iqr = quantile(&sorted, 0.75) - quantile(&sorted, 0.25);
                ScalerParams {
                    center: quantile(&sorted, 0.5),
                    scale: if iqr == 0.0 { 1.0 } else { iqr },
                }
            })
            .collect();
        self.is_fitted = true;
        Ok(self)
    }

    pub fn transform(&self, x: &Array2<f64>) -> Result<Array2<f64>> {
        if !self.is_fitted {
            return Err(VinoError::ModelNotFitted);
        }
        if x.ncols() != self.params.len() {
            return Err(VinoError::ShapeError {
                expected: format!("{} columns", self.params.len()),
                actual: format!("{} columns", x.ncols()),
            });
        }
        let center = Array1::from_iter(self.params.iter().map(|p| p.center));
        let scale = Array1::from_iter(self.params.iter().map(|p| p.scale));
        Ok((x - &center) / &scale)
    }

    pub fn fit_transform(&mut self, x: &Array2<f64>) -> Result<Array2<f64>> {
        self.fit(x)?;
        self.transform(x)
    }
}

/// Linear-interpolated quantile of an ascending slice
fn quantile(sorted: &[f64], q: f64) -> f64 {
    let pos = q * (sorted.len() - 1) as f64;
    let lo = pos.floor() as usize;
    let hi = pos.ceil() as usize;
    sorted[lo] + (sorted[hi] - sorted[lo]) * (pos - lo as f64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use ndarray::array;

    #[test]
    fn test_robust_scaler() {
        let x = array![[1.0, 5.0], [2.0, 5.0], [3.0, 5.0], [4.0, 5.0], [100.0, 5.0]];
        let mut scaler = RobustScaler::new();
        let scaled = scaler.fit_transform(&x).unwrap();

        // column 0: median 3, q1 2, q3 4
        assert_relative_eq!(scaled[[2, 0]], 0.0);
        assert_relative_eq!(scaled[[0, 0]], -1.0);
        assert_relative_eq!(scaled[[4, 0]], 48.5);
        // constant column keeps unit scale
        assert!(scaled.column(1).iter().all(|&v| v == 0.0));
    }

    #[test]
    fn test_transform_errors() {
        let scaler = RobustScaler::new();
        assert!(matches!(scaler.transform(&array![[1.0]]), Err(VinoError::ModelNotFitted)));

        let mut scaler = RobustScaler::new();
        scaler.fit(&array![[1.0, 2.0], [3.0, 4.0]]).unwrap();
        assert!(matches!(scaler.transform(&array![[1.0]]), Err(VinoError::ShapeError { .. })));
    }
}
