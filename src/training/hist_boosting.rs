//! Histogram gradient boosting with leaf-wise tree growth
//!
//! Features are bucketed into at most 255 quantile bins once per fit. Each
//! round builds per-node gradient histograms, grows the tree best-first until
//! `max_leaf_nodes` is reached, and sets L2-regularized leaf values.

use ndarray::{Array1, Array2};
use rand::SeedableRng;
use rand_xoshiro::Xoshiro256PlusPlus;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::BinaryHeap;
use tracing::debug;

use super::early_stopping::{holdout_split, mse_on, EarlyStopping};
use super::tree::TreeNode;
use crate::error::{Result, VinoError};

/// Upper bound on bins per feature (bin ids fit in a `u8`)
pub const MAX_BINS: usize = 255;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistGradientBoostingConfig {
    /// Maximum number of boosting rounds
    pub max_iter: usize,
    pub learning_rate: f64,
    /// Leaves per tree
    pub max_leaf_nodes: usize,
    /// Depth limit; `None` means unbounded
    pub max_depth: Option<usize>,
    pub min_samples_leaf: usize,
    /// L2 penalty on leaf values
    pub l2_regularization: f64,
    pub max_bins: usize,
    pub early_stopping: bool,
    pub validation_fraction: f64,
    pub n_iter_no_change: usize,
    pub tol: f64,
    pub random_state: Option<u64>,
}

impl Default for HistGradientBoostingConfig {
    fn default() -> Self {
        Self {
            max_iter: 100,
            learning_rate: 0.1,
            max_leaf_nodes: 31,
            max_depth: None,
            min_samples_leaf: 20,
            l2_regularization: 0.0,
            max_bins: MAX_BINS,
            early_stopping: true,
            validation_fraction: 0.1,
            n_iter_no_change: 10,
            tol: 1e-7,
            random_state: Some(42),
        }
    }
}

impl HistGradientBoostingConfig {
    pub fn validate(&self) -> Result<()> {
        if self.max_iter == 0 {
            return Err(VinoError::invalid_parameter("max_iter", self.max_iter, "must be >= 1"));
        }
        if !(self.learning_rate > 0.0) {
            return Err(VinoError::invalid_parameter("learning_rate", self.learning_rate, "must be > 0"));
        }
        if self.max_leaf_nodes < 2 {
            return Err(VinoError::invalid_parameter("max_leaf_nodes", self.max_leaf_nodes, "must be >= 2"));
        }
        if !(self.l2_regularization >= 0.0) {
            return Err(VinoError::invalid_parameter(
                "l2_regularization",
                self.l2_regularization,
                "must be >= 0",
            ));
        }
        if !(2..=MAX_BINS).contains(&self.max_bins) {
            return Err(VinoError::invalid_parameter("max_bins", self.max_bins, "must be in [2, 255]"));
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

/// Per-feature bin edges. Bin `b` holds values in `(edges[b-1], edges[b]]`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeatureBinner {
    edges: Vec<Vec<f64>>,
}

impl FeatureBinner {
    /// Midpoints between distinct values when they fit in `max_bins`,
    /// interpolated quantiles otherwise.
    pub fn fit(x: &Array2<f64>, max_bins: usize) -> Self {
        let edges = x
            .columns()
            .into_iter()
            .map(|col| {
                let mut sorted: Vec<f64> = col.to_vec();
                sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(Ordering::Equal));
                let mut distinct = sorted.clone();
                distinct.dedup();

                if distinct.len() <= max_bins {
                    return distinct.windows(2).map(|w| (w[0] + w[1]) / 2.0).collect();
                }

                let last = (sorted.len() - 1) as f64;
                let mut edges: Vec<f64> = (1..max_bins)
                    .map(|k| {
                        let pos = last * k as f64 / max_bins as f64;
                        let lo = pos.floor() as usize;
                        let hi = pos.ceil() as usize;
                        sorted[lo] + (sorted[hi] - sorted[lo]) * (pos - lo as f64)
                    })
                    .collect();
                edges.dedup();
                edges
            })
            .collect();
        Self { edges }
    }

    pub fn n_bins(&self, feature: usize) -> usize {
        self.edges[feature].len() + 1
    }

    pub fn edge(&self, feature: usize, bin: usize) -> f64 {
        self.edges[feature][bin]
    }

    pub fn bin_value(&self, feature: usize, value: f64) -> u8 {
        self.edges[feature].partition_point(|&e| e < value) as u8
    }

    pub fn transform(&self, x: &Array2<f64>) -> Array2<u8> {
        Array2::from_shape_fn(x.dim(), |(i, j)| self.bin_value(j, x[[i, j]]))
    }
}

/// Queued split for one leaf, ordered by gain then by lower node id
#[derive(Debug, Clone, Copy)]
struct PendingSplit {
    gain: f64,
    node_id: usize,
    feature: usize,
    bin: usize,
}

impl PartialEq for PendingSplit {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}
impl Eq for PendingSplit {}
impl PartialOrd for PendingSplit {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}
impl Ord for PendingSplit {
    fn cmp(&self, other: &Self) -> Ordering {
        self.gain
            .total_cmp(&other.gain)
            .then_with(|| other.node_id.cmp(&self.node_id))
    }
}

enum NodeSlot {
    Leaf { rows: Vec<usize>, depth: usize },
    Split {
        feature: usize,
        threshold: f64,
        left: usize,
        right: usize,
        n_samples: usize,
        gain: f64,
    },
}

/// Borrowed state for growing one tree
struct TreeGrower<'a> {
    binned: &'a Array2<u8>,
    binner: &'a FeatureBinner,
    gradients: &'a [f64],
    config: &'a HistGradientBoostingConfig,
}

impl<'a> TreeGrower<'a> {
    fn leaf_value(&self, rows: &[usize]) -> f64 {
        let g: f64 = rows.iter().map(|&i| self.gradients[i]).sum();
        -self.config.learning_rate * g / (rows.len() as f64 + self.config.l2_regularization)
    }

    fn score(&self, g: f64, h: f64) -> f64 {
        g * g / (h + self.config.l2_regularization)
    }

    /// Best histogram split of `rows`, scanning features in parallel
    fn best_split(&self, node_id: usize, rows: &[usize]) -> Option<PendingSplit> {
        let min_leaf = self.config.min_samples_leaf.max(1);
        if rows.len() < 2 * min_leaf {
            return None;
        }
        let total_g: f64 = rows.iter().map(|&i| self.gradients[i]).sum();
        let total_h = rows.len() as f64;
        let parent = self.score(total_g, total_h);

        let candidates: Vec<Option<PendingSplit>> = (0..self.binned.ncols())
            .into_par_iter()
            .map(|feature| {
                let n_bins = self.binner.n_bins(feature);
                let mut hist_g = vec![0.0; n_bins];
                let mut hist_c = vec![0usize; n_bins];
                for &i in rows {
                    let b = self.binned[[i, feature]] as usize;
                    hist_g[b] += self.gradients[i];
                    hist_c[b] += 1;
                }

                let mut best: Option<PendingSplit> = None;
                let (mut left_g, mut left_c) = (0.0, 0usize);
                for bin in 0..n_bins - 1 {
                    left_g += hist_g[bin];
                    left_c += hist_c[bin];
                    let right_c = rows.len() - left_c;
                    if hist_c[bin] == 0 || left_c < min_leaf || right_c < min_leaf {
                        continue;
                    }
                    let gain = self.score(left_g, left_c as f64) + self.score(total_g - left_g, right_c as f64) - parent;
                    if gain > 1e-12 && best.map_or(true, |b| gain > b.gain) {
                        best = Some(PendingSplit {
                            gain,
                            node_id,
                            feature,
                            bin,
                        });
                    }
                }
                best
            })
            .collect();

        candidates.into_iter().flatten().fold(None, |best: Option<PendingSplit>, c| match best {
            Some(b) if b.gain >= c.gain => Some(b),
            _ => Some(c),
        })
    }

    fn grow(&self, rows: Vec<usize>) -> TreeNode {
        let max_depth = self.config.max_depth.unwrap_or(usize::MAX);
        let mut heap = BinaryHeap::new();
        if max_depth > 0 {
            heap.extend(self.best_split(0, &rows));
        }
        let mut slots = vec![NodeSlot::Leaf { rows, depth: 0 }];
        let mut n_leaves = 1;

        while n_leaves < self.config.max_leaf_nodes {
            let Some(split) = heap.pop() else { break };
            let (rows, depth) = match &mut slots[split.node_id] {
                NodeSlot::Leaf { rows, depth } => (std::mem::take(rows), *depth),
                NodeSlot::Split { .. } => continue,
            };
            let n_samples = rows.len();
            let (left_rows, right_rows): (Vec<usize>, Vec<usize>) = rows
                .into_iter()
                .partition(|&i| self.binned[[i, split.feature]] as usize <= split.bin);

            let left_id = slots.len();
            let right_id = left_id + 1;
            if depth + 1 < max_depth {
                heap.extend(self.best_split(left_id, &left_rows));
                heap.extend(self.best_split(right_id, &right_rows));
            }
            slots.push(NodeSlot::Leaf {
                rows: left_rows,
                depth: depth + 1,
            });
            slots.push(NodeSlot::Leaf {
                rows: right_rows,
                depth: depth + 1,
            });
            slots[split.node_id] = NodeSlot::Split {
                feature: split.feature,
                threshold: self.binner.edge(split.feature, split.bin),
                left: left_id,
                right: right_id,
                n_samples,
                gain: split.gain,
            };
            n_leaves += 1;
        }

        self.to_node(&slots, 0)
    }

    fn to_node(&self, slots: &[NodeSlot], id: usize) -> TreeNode {
        match &slots[id] {
            NodeSlot::Leaf { rows, .. } => TreeNode::Leaf {
                value: self.leaf_value(rows),
                n_samples: rows.len(),
            },
            NodeSlot::Split {
                feature,
                threshold,
                left,
                right,
                n_samples,
                gain,
            } => TreeNode::Split {
                feature_idx: *feature,
                threshold: *threshold,
                left: Box::new(self.to_node(slots, *left)),
                right: Box::new(self.to_node(slots, *right)),
                n_samples: *n_samples,
                gain: *gain,
            },
        }
    }
}

/// Histogram-based gradient boosting regressor (squared error)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistGradientBoostingRegressor {
    pub config: HistGradientBoostingConfig,
    trees: Vec<TreeNode>,
    baseline: f64,
    fitted: bool,
}

impl HistGradientBoostingRegressor {
    pub fn new(config: HistGradientBoostingConfig) -> Self {
        Self {
            config,
            trees: Vec::new(),
            baseline: 0.0,
            fitted: false,
        }
    }

    /// Boosting rounds kept after early stopping
    pub fn n_iter(&self) -> usize {
        self.trees.len()
    }

    pub fn is_fitted(&self) -> bool {
        self.fitted
    }

    pub fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
        self.config.validate()?;
        let n = x.nrows();
        if n != y.len() {
            return Err(VinoError::ShapeError {
                expected: format!("y length = {}", n),
                actual: format!("y length = {}", y.len()),
            });
        }
        if n < 2 {
            return Err(VinoError::TrainingError(format!("Need at least 2 samples, got {}", n)));
        }

        let mut rng = match self.config.random_state {
            Some(seed) => Xoshiro256PlusPlus::seed_from_u64(seed),
            None => Xoshiro256PlusPlus::from_entropy(),
        };
        let (fit_rows, val_rows) = if self.config.early_stopping {
            holdout_split(n, self.config.validation_fraction, &mut rng)
        } else {
            ((0..n).collect(), Vec::new())
        };

        let binner = FeatureBinner::fit(&x.select(ndarray::Axis(0), &fit_rows), self.config.max_bins);
        let binned = binner.transform(x);

        self.baseline = fit_rows.iter().map(|&i| y[i]).sum::<f64>() / fit_rows.len() as f64;
        self.trees.clear();
        let mut predictions = Array1::from_elem(n, self.baseline);
        let mut stopper = EarlyStopping::new(self.config.n_iter_no_change, self.config.tol);

        for round in 0..self.config.max_iter {
            let gradients: Vec<f64> = predictions.iter().zip(y.iter()).map(|(&p, &t)| p - t).collect();
            let grower = TreeGrower {
                binned: &binned,
                binner: &binner,
                gradients: &gradients,
                config: &self.config,
            };
            let tree = grower.grow(fit_rows.clone());

            for (i, row) in x.outer_iter().enumerate() {
                predictions[i] += tree.predict_row(row);
            }
            self.trees.push(tree);

            if !val_rows.is_empty() {
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
            .map(|row| self.baseline + self.trees.iter().map(|t| t.predict_row(row)).sum::<f64>())
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    fn wavy_data(n: usize) -> (Array2<f64>, Array1<f64>) {
        let x = Array2::from_shape_fn((n, 3), |(i, j)| ((i * 7 + j * 13) % n) as f64 / n as f64);
        let y: Array1<f64> = x
            .outer_iter()
            .enumerate()
            .map(|(i, r)| {
                let noise = ((i * 37) % 11) as f64 * 0.05;
                let step = if r[2] > 0.5 { 1.0 } else { 0.0 };
                5.0 + 2.0 * r[0] - r[1] + step + noise
            })
            .collect();
        (x, y)
    }

    #[test]
    fn test_binner_few_distinct_values() {
        let x = array![[1.0], [2.0], [2.0], [4.0]];
        let binner = FeatureBinner::fit(&x, 255);
        assert_eq!(binner.n_bins(0), 3);
        assert_eq!(binner.bin_value(0, 1.0), 0);
        assert_eq!(binner.bin_value(0, 1.5), 0);
        assert_eq!(binner.bin_value(0, 2.0), 1);
        assert_eq!(binner.bin_value(0, 100.0), 2);
    }

    #[test]
    fn test_binner_caps_bins() {
        let x = Array2::from_shape_fn((1000, 1), |(i, _)| i as f64);
        let binner = FeatureBinner::fit(&x, 16);
        assert!(binner.n_bins(0) <= 16);
        let binned = binner.transform(&x);
        assert!(binned.iter().all(|&b| (b as usize) < binner.n_bins(0)));
    }

    #[test]
    fn test_fit_beats_baseline() {
        let (x, y) = wavy_data(300);
        let mut model = HistGradientBoostingRegressor::new(HistGradientBoostingConfig {
            max_iter: 100,
            min_samples_leaf: 5,
            early_stopping: false,
            ..Default::default()
        });
        model.fit(&x, &y).unwrap();
        let preds = model.predict(&x).unwrap();

        let mean = y.mean().unwrap();
        let baseline: f64 = y.iter().map(|v| (v - mean).powi(2)).sum();
        let fitted: f64 = y.iter().zip(preds.iter()).map(|(a, b)| (a - b).powi(2)).sum();
        assert!(fitted < baseline * 0.1);
        assert_eq!(model.n_iter(), 100);
    }

    #[test]
    fn test_leaf_budget_respected() {
        let (x, y) = wavy_data(200);
        let mut model = HistGradientBoostingRegressor::new(HistGradientBoostingConfig {
            max_iter: 5,
            max_leaf_nodes: 4,
            max_depth: Some(3),
            min_samples_leaf: 1,
            early_stopping: false,
            ..Default::default()
        });
        model.fit(&x, &y).unwrap();
        for tree in &model.trees {
            assert!(tree.n_leaves() <= 4);
            assert!(tree.depth() <= 3);
        }
    }

    #[test]
    fn test_early_stopping_and_determinism() {
        let (x, y) = wavy_data(250);
        let config = HistGradientBoostingConfig {
            max_iter: 1000,
            learning_rate: 0.2,
            min_samples_leaf: 3,
            ..Default::default()
        };
        let mut a = HistGradientBoostingRegressor::new(config.clone());
        let mut b = HistGradientBoostingRegressor::new(config);
        a.fit(&x, &y).unwrap();
        b.fit(&x, &y).unwrap();
        assert!(a.n_iter() < 1000);
        assert_eq!(a.predict(&x).unwrap(), b.predict(&x).unwrap());
    }
}
