//! Quality binning and stratified train/test splitting

use crate::error::{Result, VinoError};
use ndarray::Array1;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

/// Bin edges on the quality score: `y < 6`, `6 <= y < 7`, `y >= 7`
pub const QUALITY_BIN_THRESHOLDS: [f64; 2] = [6.0, 7.0];

/// Number of stratification bins
pub const N_QUALITY_BINS: usize = QUALITY_BIN_THRESHOLDS.len() + 1;

/// Stratification bin of a quality score (right-open intervals).
pub fn quality_bin(score: f64) -> usize {
    QUALITY_BIN_THRESHOLDS.iter().filter(|&&t| score >= t).count()
}

pub fn quality_bins(targets: &Array1<f64>) -> Vec<usize> {
    targets.iter().map(|&y| quality_bin(y)).collect()
}

/// Row indices grouped by bin, in ascending row order. Empty bins are kept.
pub(crate) fn indices_by_bin(bins: &[usize]) -> Vec<Vec<usize>> {
    let mut groups = vec![Vec::new(); N_QUALITY_BINS];
    for (row, &bin) in bins.iter().enumerate() {
        groups[bin].push(row);
    }
    groups
}

/// Row indices of a train/test partition
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrainTestSplit {
    pub train_indices: Vec<usize>,
    pub test_indices: Vec<usize>,
}

/// Split rows so each quality bin keeps its proportion in both halves.
///
/// Each bin is shuffled with a seeded RNG and `round(test_size * len)` of its
/// rows (clamped to `[1, len - 1]`) go to the test set. Indices are returned
/// sorted.
pub fn stratified_split(targets: &Array1<f64>, test_size: f64, seed: u64) -> Result<TrainTestSplit> {
    if !(test_size > 0.0 && test_size < 1.0) {
        return Err(VinoError::invalid_parameter(
            "test_size",
            test_size,
            "must be strictly between 0 and 1",
        ));
    }
    if targets.is_empty() {
        return Err(VinoError::InvalidInput("Cannot split an empty dataset".to_string()));
    }

    let groups = indices_by_bin(&quality_bins(targets));
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let mut train_indices = Vec::with_capacity(targets.len());
    let mut test_indices = Vec::new();

    for (bin, mut members) in groups.into_iter().enumerate() {
        if members.is_empty() {
            continue;
        }
        if members.len() < 2 {
            return Err(VinoError::InsufficientStratumSize {
                bin,
                count: members.len(),
            });
        }
        members.shuffle(&mut rng);
        let n_test = ((test_size * members.len() as f64).round() as usize).clamp(1, members.len() - 1);
        test_indices.extend_from_slice(&members[..n_test]);
        train_indices.extend_from_slice(&members[n_test..]);
    }

    train_indices.sort_unstable();
    test_indices.sort_unstable();

    Ok(TrainTestSplit {
        train_indices,
        test_indices,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_quality_bin_edges() {
        assert_eq!(quality_bin(3.0), 0);
        assert_eq!(quality_bin(5.99), 0);
        assert_eq!(quality_bin(6.0), 1);
        assert_eq!(quality_bin(6.5), 1);
        assert_eq!(quality_bin(7.0), 2);
        assert_eq!(quality_bin(9.0), 2);
    }

    #[test]
    fn test_split_preserves_bins() {
        let y = Array1::from_iter((0..100).map(|i| match i % 4 {
            0 | 1 => 5.0,
            2 => 6.0,
            _ => 8.0,
        }));
        let split = stratified_split(&y, 0.2, 42).unwrap();

        assert_eq!(split.train_indices.len() + split.test_indices.len(), 100);
        assert_eq!(split.test_indices.len(), 20);

        let test_bins = quality_bins(&y.select(ndarray::Axis(0), &split.test_indices));
        assert_eq!(test_bins.iter().filter(|&&b| b == 0).count(), 10);
        assert_eq!(test_bins.iter().filter(|&&b| b == 1).count(), 5);
        assert_eq!(test_bins.iter().filter(|&&b| b == 2).count(), 5);
    }

    #[test]
    fn test_split_is_deterministic() {
        let y = Array1::from_iter((0..60).map(|i| 3.0 + (i % 7) as f64));
        let a = stratified_split(&y, 0.25, 7).unwrap();
        let b = stratified_split(&y, 0.25, 7).unwrap();
        let c = stratified_split(&y, 0.25, 8).unwrap();
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn test_small_bin_kept_in_both_halves() {
        // Bin 2 has two members: round(0.2 * 2) = 0, clamped up to 1
        let y = array![5.0, 5.0, 5.0, 5.0, 5.0, 6.0, 6.0, 6.0, 7.0, 8.0];
        let split = stratified_split(&y, 0.2, 1).unwrap();
        let in_test = split.test_indices.iter().filter(|&&i| y[i] >= 7.0).count();
        let in_train = split.train_indices.iter().filter(|&&i| y[i] >= 7.0).count();
        assert_eq!((in_test, in_train), (1, 1));
    }

    #[test]
    fn test_singleton_bin_fails() {
        let y = array![5.0, 5.0, 5.0, 6.0, 6.0, 8.0];
        let err = stratified_split(&y, 0.2, 42).unwrap_err();
        assert!(matches!(err, VinoError::InsufficientStratumSize { bin: 2, count: 1 }));
    }

    #[test]
    fn test_invalid_test_size() {
        let y = array![5.0, 5.0, 6.0, 6.0];
        for bad in [0.0, 1.0, -0.5, 1.5, f64::NAN] {
            assert!(matches!(
                stratified_split(&y, bad, 42),
                Err(VinoError::InvalidParameter { .. })
            ));
        }
    }
}
