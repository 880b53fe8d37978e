//! VinoVeritas - wine quality estimation
//!
//! Tunes a gradient-boosting regressor on the UCI wine-quality tables with a
//! seeded randomized search, evaluates it on a stratified hold-out and
//! persists the model, its feature order and its metrics for a small HTTP
//! serving layer.
//!
//! # Modules
//!
//! ## Pipeline
//! - [`data`] - Dataset loading and stratified splitting
//! - [`preprocessing`] - Robust scaling
//! - [`training`] - Boosted trees, scoring, metrics and the training engine
//! - [`optimizer`] - Search spaces and randomized search
//! - [`artifacts`] - Atomic artifact persistence
//!
//! ## Consumers
//! - [`inference`] - Artifact cache, canonicalization and verdicts
//! - [`eda`] - Chart data for the dashboard
//! - [`server`] - HTTP server
//! - [`cli`] - Command-line interface

pub mod error;
pub mod config;

pub mod data;
pub mod preprocessing;
pub mod training;
pub mod optimizer;
pub mod artifacts;

pub mod inference;
pub mod eda;
pub mod server;
pub mod cli;

pub use error::{Result, VinoError};

/// Prelude for common imports
pub mod prelude {
    pub use crate::artifacts::{ArtifactPaths, ArtifactWriter};
    pub use crate::config::{EstimatorKind, TrainingConfig};
    pub use crate::data::{Dataset, DatasetLoader, DatasetSource};
    pub use crate::error::{Result, VinoError};
    pub use crate::inference::{ArtifactCache, Prediction, Predictor, Verdict};
    pub use crate::optimizer::{RandomizedSearch, SearchOutcome, SearchSpace};
    pub use crate::training::{
        Estimator, ModelPipeline, RegressionMetrics, Scorer, TrainEngine, TrainingReport, WeightedMae,
    };
}
