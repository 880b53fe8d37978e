//! Model training
//!
//! Provides the pieces the training run is assembled from:
//! - Regression trees and the two boosting estimators (classic, histogram)
//! - Model pipelines of named steps
//! - Stratified k-fold cross-validation
//! - Weighted-MAE scoring and held-out regression metrics
//! - [`TrainEngine`], which runs split → search → evaluate → persist

mod early_stopping;
mod engine;
pub mod cross_validation;
pub mod gradient_boosting;
pub mod hist_boosting;
pub mod metrics;
pub mod pipeline;
pub mod scoring;
pub mod tree;

pub use cross_validation::{CVResults, CVSplit, StratifiedKFold};
pub use engine::{TrainEngine, TrainingReport};
pub use gradient_boosting::{GradientBoostingConfig, GradientBoostingRegressor};
pub use hist_boosting::{FeatureBinner, HistGradientBoostingConfig, HistGradientBoostingRegressor};
pub use metrics::RegressionMetrics;
pub use pipeline::{Estimator, ModelPipeline, Regressor, Step, Transformer};
pub use scoring::{weighted_mae, Scorer, WeightedMae, HIGH_QUALITY_THRESHOLD, HIGH_QUALITY_WEIGHT};
pub use tree::{RegressionTree, TreeNode};
