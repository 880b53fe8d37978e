//! Dataset loading and stratified splitting
//!
//! - [`loader`] fetches the UCI wine-quality tables (or a local CSV) and
//!   normalizes them into a [`Dataset`] with the canonical feature order
//! - [`split`] derives quality bins and performs the stratified train/test split

pub mod loader;
pub mod split;

pub use loader::{DatasetLoader, DatasetSource, FEATURE_NAMES, TARGET_COLUMN};
pub use split::{quality_bin, quality_bins, stratified_split, TrainTestSplit, N_QUALITY_BINS};

use crate::error::{Result, VinoError};
use ndarray::{Array1, Array2, Axis};

/// Feature matrix, target vector and the ordered feature names that describe
/// the matrix columns.
#[derive(Debug, Clone)]
pub struct Dataset {
    pub features: Array2<f64>,
    pub targets: Array1<f64>,
    pub feature_names: Vec<String>,
}

impl Dataset {
    /// Build a dataset, checking that rows, targets and names line up.
    pub fn new(features: Array2<f64>, targets: Array1<f64>, feature_names: Vec<String>) -> Result<Self> {
        if features.nrows() != targets.len() {
            return Err(VinoError::ShapeError {
                expected: format!("{} targets", features.nrows()),
                actual: format!("{} targets", targets.len()),
            });
        }
        if features.ncols() != feature_names.len() {
            return Err(VinoError::ShapeError {
                expected: format!("{} feature names", features.ncols()),
                actual: format!("{} feature names", feature_names.len()),
            });
        }
        Ok(Self {
            features,
            targets,
            feature_names,
        })
    }

    pub fn n_samples(&self) -> usize {
        self.features.nrows()
    }

    pub fn n_features(&self) -> usize {
        self.features.ncols()
    }

    pub fn is_empty(&self) -> bool {
        self.n_samples() == 0
    }

    /// Copy out the given rows, preserving the feature names.
    pub fn select(&self, indices: &[usize]) -> Dataset {
        Dataset {
            features: self.features.select(Axis(0), indices),
            targets: self.targets.select(Axis(0), indices),
            feature_names: self.feature_names.clone(),
        }
    }

    /// Stratified train/test split on quality bins.
    pub fn train_test_split(&self, test_size: f64, seed: u64) -> Result<(Dataset, Dataset)> {
        let split = stratified_split(&self.targets, test_size, seed)?;
        Ok((self.select(&split.train_indices), self.select(&split.test_indices)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_dataset_shape_checks() {
        let x = array![[1.0, 2.0], [3.0, 4.0]];
        let names = vec!["a".to_string(), "b".to_string()];

        assert!(Dataset::new(x.clone(), array![5.0, 6.0], names.clone()).is_ok());
        assert!(matches!(
            Dataset::new(x.clone(), array![5.0], names.clone()),
            Err(VinoError::ShapeError { .. })
        ));
        assert!(matches!(
            Dataset::new(x, array![5.0, 6.0], vec!["a".to_string()]),
            Err(VinoError::ShapeError { .. })
        ));
    }

    #[test]
    fn test_select_rows() {
        let x = array![[1.0], [2.0], [3.0]];
        let ds = Dataset::new(x, array![5.0, 6.0, 7.0], vec!["a".to_string()]).unwrap();
        let sub = ds.select(&[2, 0]);
        assert_eq!(sub.targets, array![7.0, 5.0]);
        assert_eq!(sub.features[[0, 0]], 3.0);
        assert_eq!(sub.feature_names, vec!["a".to_string()]);
    }
}
