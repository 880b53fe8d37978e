//! Stratified k-fold cross-validation on quality bins

use crate::data::split::{indices_by_bin, quality_bins};
use crate::error::{Result, VinoError};
use ndarray::Array1;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};

/// A single train/test split
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CVSplit {
    pub train_indices: Vec<usize>,
    pub test_indices: Vec<usize>,
    pub fold_idx: usize,
}

/// K folds that keep each quality bin's proportion, deterministic from the seed
#[derive(Debug, Clone)]
pub struct StratifiedKFold {
    n_splits: usize,
    random_state: u64,
}

impl StratifiedKFold {
    pub fn new(n_splits: usize) -> Self {
        Self {
            n_splits,
            random_state: 42,
        }
    }

    pub fn with_random_state(mut self, seed: u64) -> Self {
        self.random_state = seed;
        self
    }

    pub fn n_splits(&self) -> usize {
        self.n_splits
    }

    /// Shuffle each bin, then deal its rows to folds round-robin. The dealing
    /// position carries over between bins so fold sizes differ by at most one.
    pub fn split(&self, y: &Array1<f64>) -> Result<Vec<CVSplit>> {
        let n_samples = y.len();
        if self.n_splits < 2 {
            return Err(VinoError::invalid_parameter("n_splits", self.n_splits, "must be at least 2"));
        }
        if n_samples < self.n_splits {
            return Err(VinoError::invalid_parameter(
                "n_splits",
                self.n_splits,
                format!("cannot exceed the number of samples ({})", n_samples),
            ));
        }

        let mut rng = ChaCha8Rng::seed_from_u64(self.random_state);
        let mut fold_of = vec![0usize; n_samples];
        let mut position = 0usize;
        for mut members in indices_by_bin(&quality_bins(y)) {
            members.shuffle(&mut rng);
            for row in members {
                fold_of[row] = position % self.n_splits;
                position += 1;
            }
        }

        Ok((0..self.n_splits)
            .map(|fold_idx| {
                let (test_indices, train_indices): (Vec<usize>, Vec<usize>) =
                    (0..n_samples).partition(|&row| fold_of[row] == fold_idx);
                CVSplit {
                    train_indices,
                    test_indices,
                    fold_idx,
                }
            })
            .collect())
    }
}

/// Aggregate of per-fold scores
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CVResults {
    pub scores: Vec<f64>,
    pub mean: f64,
    /// Population standard deviation
    pub std: f64,
}

impl CVResults {
    pub fn from_scores(scores: Vec<f64>) -> Self {
        let n = scores.len().max(1) as f64;
        let mean = scores.iter().sum::<f64>() / n;
        let variance = scores.iter().map(|s| (s - mean).powi(2)).sum::<f64>() / n;
        Self {
            scores,
            mean,
            std: variance.sqrt(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::quality_bin;

    fn targets() -> Array1<f64> {
        Array1::from_iter((0..103).map(|i| [5.0, 5.0, 6.0, 6.0, 6.0, 7.0, 8.0][i % 7]))
    }

    #[test]
    fn test_folds_partition_rows() {
        let y = targets();
        let splits = StratifiedKFold::new(4).split(&y).unwrap();
        assert_eq!(splits.len(), 4);

        let mut seen: Vec<usize> = splits.iter().flat_map(|s| s.test_indices.clone()).collect();
        seen.sort_unstable();
        assert_eq!(seen, (0..103).collect::<Vec<_>>());

        for s in &splits {
            assert_eq!(s.train_indices.len() + s.test_indices.len(), 103);
            assert!(s.test_indices.len() == 25 || s.test_indices.len() == 26);
        }
    }

    #[test]
    fn test_folds_are_stratified() {
        let y = targets();
        for split in StratifiedKFold::new(4).split(&y).unwrap() {
            let high = split.test_indices.iter().filter(|&&i| quality_bin(y[i]) == 2).count();
            // 28 high-quality rows over 4 folds
            assert_eq!(high, 7);
        }
    }

    #[test]
    fn test_seed_controls_assignment() {
        let y = targets();
        let a = StratifiedKFold::new(3).with_random_state(1).split(&y).unwrap();
        let b = StratifiedKFold::new(3).with_random_state(1).split(&y).unwrap();
        let c = StratifiedKFold::new(3).with_random_state(2).split(&y).unwrap();
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn test_invalid_fold_counts() {
        let y = Array1::from_vec(vec![5.0, 6.0, 7.0]);
        assert!(StratifiedKFold::new(1).split(&y).is_err());
        assert!(StratifiedKFold::new(4).split(&y).is_err());
    }

    #[test]
    fn test_cv_results() {
        let r = CVResults::from_scores(vec![1.0, 3.0]);
        assert_eq!(r.mean, 2.0);
        assert_eq!(r.std, 1.0);
    }
}
