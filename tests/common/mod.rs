//! Shared synthetic data for integration tests

use ndarray::{Array1, Array2};
use vinoveritas::data::{Dataset, FEATURE_NAMES};

/// `n` × 11 features in [0, 1) with integer targets spread over [3, 9]
pub fn synthetic_wine(n: usize) -> Dataset {
    let x = Array2::from_shape_fn((n, 11), |(i, j)| ((i * (j + 3) + 7 * j) % 31) as f64 / 31.0);
    let y = Array1::from_iter(x.outer_iter().enumerate().map(|(i, r)| {
        let noise = ((i * 13) % 5) as f64 * 0.2 - 0.4;
        (3.0 + 4.0 * r[10] + 2.0 * r[1] + noise).round().clamp(3.0, 9.0)
    }));
    let names = FEATURE_NAMES.iter().map(|s| s.to_string()).collect();
    Dataset::new(x, y, names).expect("synthetic dataset")
}
