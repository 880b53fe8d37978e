//! Validation holdout and patience tracking shared by both boosting estimators

use rand::seq::SliceRandom;
use rand::Rng;

/// Shuffle row ids and hold out `round(fraction * n)` of them (at least one).
/// Returns `(fit_rows, validation_rows)`, each sorted. Validation is empty when
/// fewer than two fit rows would remain.
pub(crate) fn holdout_split<R: Rng>(n: usize, fraction: f64, rng: &mut R) -> (Vec<usize>, Vec<usize>) {
    let n_val = ((fraction * n as f64).round() as usize).max(1);
    if n < n_val + 2 {
        return ((0..n).collect(), Vec::new());
    }
    let mut rows: Vec<usize> = (0..n).collect();
    rows.shuffle(rng);
    let mut val = rows[..n_val].to_vec();
    let mut fit = rows[n_val..].to_vec();
    val.sort_unstable();
    fit.sort_unstable();
    (fit, val)
}

/// Stops once `patience` consecutive rounds fail to beat the best loss by `tol`.
#[derive(Debug, Clone)]
pub(crate) struct EarlyStopping {
    patience: usize,
    tol: f64,
    best: f64,
    stale_rounds: usize,
}

impl EarlyStopping {
    pub(crate) fn new(patience: usize, tol: f64) -> Self {
        Self {
            patience: patience.max(1),
            tol,
            best: f64::INFINITY,
            stale_rounds: 0,
        }
    }

    /// Record a validation loss; returns `true` when training should stop.
    pub(crate) fn update(&mut self, loss: f64) -> bool {
        if loss + self.tol < self.best {
            self.best = loss;
            self.stale_rounds = 0;
        } else {
            self.stale_rounds += 1;
        }
        self.stale_rounds >= self.patience
    }
}

/// Mean squared error restricted to `rows`
pub(crate) fn mse_on(y: &ndarray::Array1<f64>, pred: &ndarray::Array1<f64>, rows: &[usize]) -> f64 {
    rows.iter().map(|&i| (y[i] - pred[i]).powi(2)).sum::<f64>() / rows.len().max(1) as f64
}
