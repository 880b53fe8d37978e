//! Regression tree used as the weak learner in classic gradient boosting

use crate::error::{Result, VinoError};
use ndarray::{Array1, Array2, ArrayView1};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

/// Tree node shared by both boosting estimators
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum TreeNode {
    /// Leaf node with prediction value
    Leaf { value: f64, n_samples: usize },
    /// Internal node; rows with `x[feature_idx] <= threshold` go left
    Split {
        feature_idx: usize,
        threshold: f64,
        left: Box<TreeNode>,
        right: Box<TreeNode>,
        n_samples: usize,
        gain: f64,
    },
}

impl TreeNode {
    pub fn predict_row(&self, row: ArrayView1<f64>) -> f64 {
        match self {
            TreeNode::Leaf { value, .. } => *value,
            TreeNode::Split {
                feature_idx,
                threshold,
                left,
                right,
                ..
            } => {
                if row[*feature_idx] <= *threshold {
                    left.predict_row(row)
                } else {
                    right.predict_row(row)
                }
            }
        }
    }

    pub fn n_leaves(&self) -> usize {
        match self {
            TreeNode::Leaf { .. } => 1,
            TreeNode::Split { left, right, .. } => left.n_leaves() + right.n_leaves(),
        }
    }

    pub fn depth(&self) -> usize {
        match self {
            TreeNode::Leaf { .. } => 0,
            TreeNode::Split { left, right, .. } => 1 + left.depth().max(right.depth()),
        }
    }

    /// Multiply every leaf value by `factor`
    pub(crate) fn scale_leaves(&mut self, factor: f64) {
        match self {
            TreeNode::Leaf { value, .. } => *value *= factor,
            TreeNode::Split { left, right, .. } => {
                left.scale_leaves(factor);
                right.scale_leaves(factor);
            }
        }
    }
}

/// Best split candidate for one node
#[derive(Debug, Clone, Copy)]
struct SplitCandidate {
    feature_idx: usize,
    threshold: f64,
    gain: f64,
}

/// Keep the first candidate on ties so feature order decides.
fn better(best: Option<SplitCandidate>, cand: Option<SplitCandidate>) -> Option<SplitCandidate> {
    match (best, cand) {
        (Some(b), Some(c)) if c.gain.partial_cmp(&b.gain) == Some(Ordering::Greater) => Some(c),
        (None, c) => c,
        (b, _) => b,
    }
}

/// Squared-error regression tree grown depth-first
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegressionTree {
    root: Option<TreeNode>,
    pub max_depth: Option<usize>,
    pub min_samples_split: usize,
    pub min_samples_leaf: usize,
}

impl Default for RegressionTree {
    fn default() -> Self {
        Self::new()
    }
}

impl RegressionTree {
    pub fn new() -> Self {
        Self {
            root: None,
            max_depth: None,
            min_samples_split: 2,
            min_samples_leaf: 1,
        }
    }

    pub fn with_max_depth(mut self, depth: usize) -> Self {
        self.max_depth = Some(depth);
        self
    }

    pub fn with_min_samples_split(mut self, min_samples: usize) -> Self {
        self.min_samples_split = min_samples.max(2);
        self
    }

    pub fn with_min_samples_leaf(mut self, min_samples: usize) -> Self {
        self.min_samples_leaf = min_samples.max(1);
        self
    }

    pub fn root(&self) -> Option<&TreeNode> {
        self.root.as_ref()
    }

    pub(crate) fn into_root(self) -> Option<TreeNode> {
        self.root
    }

    /// Fit on the given rows of `x` / `y`
    pub fn fit_rows(&mut self, x: &Array2<f64>, y: &Array1<f64>, rows: &[usize]) -> Result<()> {
        if x.nrows() != y.len() {
            return Err(VinoError::ShapeError {
                expected: format!("y length = {}", x.nrows()),
                actual: format!("y length = {}", y.len()),
            });
        }
        if rows.is_empty() {
            return Err(VinoError::TrainingError("Cannot fit a tree on zero rows".to_string()));
        }
        self.root = Some(self.build(x, y, rows, 0));
        Ok(())
    }

    pub fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
        let rows: Vec<usize> = (0..x.nrows()).collect();
        self.fit_rows(x, y, &rows)
    }

    pub fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        let root = self.root.as_ref().ok_or(VinoError::ModelNotFitted)?;
        Ok(x.outer_iter().map(|row| root.predict_row(row)).collect())
    }

    fn build(&self, x: &Array2<f64>, y: &Array1<f64>, rows: &[usize], depth: usize) -> TreeNode {
        let n_samples = rows.len();
        let value = rows.iter().map(|&i| y[i]).sum::<f64>() / n_samples as f64;

        let should_stop = n_samples < self.min_samples_split
            || n_samples < 2 * self.min_samples_leaf
            || self.max_depth.map_or(false, |d| depth >= d);
        if should_stop {
            return TreeNode::Leaf { value, n_samples };
        }

        match self.find_best_split(x, y, rows) {
            Some(split) => {
                let (left_rows, right_rows): (Vec<usize>, Vec<usize>) = rows
                    .iter()
                    .partition(|&&i| x[[i, split.feature_idx]] <= split.threshold);

                TreeNode::Split {
                    feature_idx: split.feature_idx,
                    threshold: split.threshold,
                    left: Box::new(self.build(x, y, &left_rows, depth + 1)),
                    right: Box::new(self.build(x, y, &right_rows, depth + 1)),
                    n_samples,
                    gain: split.gain,
                }
            }
            None => TreeNode::Leaf { value, n_samples },
        }
    }

    /// Scan every feature in parallel with a sorted sweep over running sums.
    /// Gain is the reduction in total squared error.
    fn find_best_split(&self, x: &Array2<f64>, y: &Array1<f64>, rows: &[usize]) -> Option<SplitCandidate> {
        let n = rows.len();
        let total_sum: f64 = rows.iter().map(|&i| y[i]).sum();
        let parent_score = total_sum * total_sum / n as f64;
        let min_leaf = self.min_samples_leaf;

        let per_feature: Vec<Option<SplitCandidate>> = (0..x.ncols())
            .into_par_iter()
            .map(|feature_idx| {
                let mut sorted: Vec<(f64, f64)> = rows.iter().map(|&i| (x[[i, feature_idx]], y[i])).collect();
                sorted.sort_by(|a, b| a.0.partial_cmp(&b.0).unwrap_or(Ordering::Equal));

                let mut best: Option<SplitCandidate> = None;
                let mut left_sum = 0.0;
                for pos in 0..n - 1 {
                    left_sum += sorted[pos].1;
                    let n_left = pos + 1;
                    let n_right = n - n_left;
                    if n_left < min_leaf || n_right < min_leaf || sorted[pos].0 == sorted[pos + 1].0 {
                        continue;
                    }
                    let right_sum = total_sum - left_sum;
                    let gain = left_sum * left_sum / n_left as f64 + right_sum * right_sum / n_right as f64
                        - parent_score;
                    if gain > 1e-12 && best.map_or(true, |b| gain > b.gain) {
                        best = Some(SplitCandidate {
                            feature_idx,
                            threshold: (sorted[pos].0 + sorted[pos + 1].0) / 2.0,
                            gain,
                        });
                    }
                }
                best
            })
            .collect();

        per_feature.into_iter().fold(None, better)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_step_function() {
        let x = array![[1.0], [2.0], [3.0], [10.0], [11.0], [12.0]];
        let y = array![1.0, 1.0, 1.0, 5.0, 5.0, 5.0];

        let mut tree = RegressionTree::new().with_max_depth(3);
        tree.fit(&x, &y).unwrap();

        let preds = tree.predict(&array![[0.0], [6.0], [7.0], [20.0]]).unwrap();
        assert_eq!(preds.to_vec(), vec![1.0, 1.0, 5.0, 5.0]);
        assert_eq!(tree.root().unwrap().n_leaves(), 2);
    }

    #[test]
    fn test_max_depth_zero_is_mean() {
        let x = array![[1.0], [2.0], [3.0], [4.0]];
        let y = array![1.0, 2.0, 3.0, 6.0];
        let mut tree = RegressionTree::new().with_max_depth(0);
        tree.fit(&x, &y).unwrap();
        assert_eq!(tree.predict(&x).unwrap().to_vec(), vec![3.0; 4]);
    }

    #[test]
    fn test_min_samples_leaf_respected() {
        let x = array![[1.0], [2.0], [3.0], [4.0], [5.0], [6.0]];
        let y = array![0.0, 10.0, 10.0, 10.0, 10.0, 10.0];
        let mut tree = RegressionTree::new().with_min_samples_leaf(3);
        tree.fit(&x, &y).unwrap();

        fn min_leaf(node: &TreeNode) -> usize {
            match node {
                TreeNode::Leaf { n_samples, .. } => *n_samples,
                TreeNode::Split { left, right, .. } => min_leaf(left).min(min_leaf(right)),
            }
        }
        assert!(min_leaf(tree.root().unwrap()) >= 3);
    }

    #[test]
    fn test_predict_unfitted() {
        let tree = RegressionTree::new();
        assert!(matches!(tree.predict(&array![[1.0]]), Err(VinoError::ModelNotFitted)));
    }
}
