//! Classic gradient boosting
//!
//! Level-wise regression trees fitted on squared-error residuals, with
//! per-round row subsampling and validation-based early stopping.

use ndarray::{Array1, Array2};
use rand::prelude::*;
use rand_xoshiro::Xoshiro256PlusPlus;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::early_stopping::{holdout_split, mse_on, EarlyStopping};
use super::tree::{RegressionTree, TreeNode};
use crate::error::{Result, VinoError};

/// Gradient Boosting configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GradientBoostingConfig {
    /// Maximum number of boosting rounds
    pub n_estimators: usize,
    /// Learning rate (shrinkage)
    pub learning_rate: f64,
    /// Maximum tree depth
    pub max_depth: usize,
    /// Minimum samples required to split a node
    pub min_samples_split: usize,
    /// Minimum samples per leaf
    pub min_samples_leaf: usize,
    /// Row fraction drawn (without replacement) for each tree
    pub subsample: f64,
    /// Rounds without validation improvement before stopping; `None` disables
    pub n_iter_no_change: Option<usize>,
    /// Fraction of training rows held out for early stopping
    pub validation_fraction: f64,
    /// Minimum validation-loss improvement
    pub tol: f64,
    /// Random seed
    pub random_state: Option<u64>,
}

impl Default for GradientBoostingConfig {
    fn default() -> Self {
        Self {
            n_estimators: 100,
            learning_rate: 0.1,
            max_depth: 3,
            min_samples_split: 2,
            min_samples_leaf: 1,
            subsample: 1.0,
            n_iter_no_change: Some(10),
            validation_fraction: 0.1,
            tol: 1e-4,
            random_state: Some(42),
        }
    }
}

impl GradientBoostingConfig {
    pub fn validate(&self) -> Result<()> {
        if self.n_estimators == 0 {
            return Err(VinoError::invalid_parameter("n_estimators", self.n_estimators, "must be >= 1"));
        }
        if !(self.learning_rate > 0.0) {
            return Err(VinoError::invalid_parameter("learning_rate", self.learning_rate, "must be > 0"));
        }
        if !(self.subsample > 0.0 && self.subsample <= 1.0) {
            return Err(VinoError::invalid_parameter("subsample", self.subsample, "must be in (0, 1]"));
        }
        if !(self.validation_fraction > 0.0 && self.validation_fraction < 1.0) {
            return Err(VinoError::invalid_parameter(
                "validation_fraction",
                self.validation_fraction,
                "must be in (0, 1)",
            ));
        }
        Ok(())
    }
}

/// Gradient Boosting Regressor
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GradientBoostingRegressor {
    pub config: GradientBoostingConfig,
    trees: Vec<TreeNode>,
    initial_prediction: f64,
    fitted: bool,
}

impl GradientBoostingRegressor {
    pub fn new(config: GradientBoostingConfig) -> Self {
        Self {
            config,
            trees: Vec::new(),
            initial_prediction: 0.0,
            fitted: false,
        }
    }

    /// Number of boosting rounds actually kept
    pub fn n_estimators_fitted(&self) -> usize {
        self.trees.len()
    }

    pub fn is_fitted(&self) -> bool {
        self.fitted
    }

    pub fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
        self.config.validate()?;
        let n_samples = x.nrows();
        if n_samples != y.len() {
            return Err(VinoError::ShapeError {
                expected: format!("y length = {}", n_samples),
                actual: format!("y length = {}", y.len()),
            });
        }
        if n_samples < 2 {
            return Err(VinoError::TrainingError(format!("Need at least 2 samples, got {}", n_samples)));
        }

        let mut rng = match self.config.random_state {
            Some(seed) => Xoshiro256PlusPlus::seed_from_u64(seed),
            None => Xoshiro256PlusPlus::from_entropy(),
        };

        let (fit_rows, val_rows) = match self.config.n_iter_no_change {
            Some(_) => holdout_split(n_samples, self.config.validation_fraction, &mut rng),
            None => ((0..n_samples).collect(), Vec::new()),
        };
        let mut stopper = self
            .config
            .n_iter_no_change
            .map(|patience| EarlyStopping::new(patience, self.config.tol));

        self.initial_prediction = fit_rows.iter().map(|&i| y[i]).sum::<f64>() / fit_rows.len() as f64;
        self.trees.clear();
        let mut predictions = Array1::from_elem(n_samples, self.initial_prediction);

        for round in 0..self.config.n_estimators {
            let residuals: Array1<f64> = y
                .iter()
                .zip(predictions.iter())
                .map(|(yi, pi)| yi - pi)
                .collect();

            let sample_rows = self.subsample_rows(&fit_rows, &mut rng);

            let mut tree = RegressionTree::new()
                .with_max_depth(self.config.max_depth)
                .with_min_samples_split(self.config.min_samples_split)
                .with_min_samples_leaf(self.config.min_samples_leaf);
            tree.fit_rows(x, &residuals, &sample_rows)?;
            let mut root = tree.into_root().ok_or(VinoError::ModelNotFitted)?;
            root.scale_leaves(self.config.learning_rate);

            // every row moves, including the ones left out of this round's sample
            for (i, row) in x.outer_iter().enumerate() {
                predictions[i] += root.predict_row(row);
            }
            self.trees.push(root);

            if let Some(stopper) = stopper.as_mut().filter(|_| !val_rows.is_empty()) {
                let val_loss = mse_on(y, &predictions, &val_rows);
                if stopper.update(val_loss) {
                    debug!(round, val_loss, "Early stopping");
                    break;
                }
            }
        }

        self.fitted = true;
        Ok(())
    }

    pub fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        if !self.fitted {
            return Err(VinoError::ModelNotFitted);
        }
        Ok(x
            .outer_iter()
            .map(|row| self.initial_prediction + self.trees.iter().map(|t| t.predict_row(row)).sum::<f64>())
            .collect())
    }

    fn subsample_rows(&self, rows: &[usize], rng: &mut Xoshiro256PlusPlus) -> Vec<usize> {
        if self.config.subsample >= 1.0 {
            return rows.to_vec();
        }
        let sample_size = ((rows.len() as f64 * self.config.subsample).ceil() as usize).clamp(1, rows.len());
        let mut sampled = rows.to_vec();
        sampled.shuffle(rng);
        sampled.truncate(sample_size);
        sampled.sort_unstable();
        sampled
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array2;

    fn linear_data(n: usize) -> (Array2<f64>, Array1<f64>) {
        let x = Array2::from_shape_fn((n, 2), |(i, j)| (i * (j + 1)) as f64 / n as f64);
        let y = Array1::from_iter(
            x.column(0)
                .iter()
                .enumerate()
                .map(|(i, v)| 3.0 + 4.0 * v + ((i * 37) % 11) as f64 * 0.02),
        );
        (x, y)
    }

    #[test]
    fn test_fit_reduces_error() {
        let (x, y) = linear_data(120);
        let mut model = GradientBoostingRegressor::new(GradientBoostingConfig {
            n_estimators: 50,
            n_iter_no_change: None,
            ..Default::default()
        });
        model.fit(&x, &y).unwrap();
        let preds = model.predict(&x).unwrap();

        let mean = y.mean().unwrap();
        let baseline: f64 = y.iter().map(|v| (v - mean).abs()).sum();
        let fitted: f64 = y.iter().zip(preds.iter()).map(|(a, b)| (a - b).abs()).sum();
        assert!(fitted < baseline * 0.2);
        assert_eq!(model.n_estimators_fitted(), 50);
    }

    #[test]
    fn test_early_stopping_truncates() {
        let (x, y) = linear_data(200);
        let mut model = GradientBoostingRegressor::new(GradientBoostingConfig {
            n_estimators: 2000,
            learning_rate: 0.3,
            subsample: 0.8,
            ..Default::default()
        });
        model.fit(&x, &y).unwrap();
        assert!(model.n_estimators_fitted() < 2000);
    }

    #[test]
    fn test_seeded_fit_is_deterministic() {
        let (x, y) = linear_data(80);
        let config = GradientBoostingConfig {
            n_estimators: 20,
            subsample: 0.7,
            ..Default::default()
        };
        let mut a = GradientBoostingRegressor::new(config.clone());
        let mut b = GradientBoostingRegressor::new(config);
        a.fit(&x, &y).unwrap();
        b.fit(&x, &y).unwrap();
        assert_eq!(a.predict(&x).unwrap(), b.predict(&x).unwrap());
    }

    #[test]
    fn test_invalid_config() {
        let (x, y) = linear_data(10);
        let mut model = GradientBoostingRegressor::new(GradientBoostingConfig {
            subsample: 1.5,
            ..Default::default()
        });
        assert!(matches!(model.fit(&x, &y), Err(VinoError::InvalidParameter { .. })));
        assert!(matches!(model.predict(&x), Err(VinoError::ModelNotFitted)));
    }
}
