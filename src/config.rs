//! Training configuration

use crate::data::DatasetSource;
use crate::error::{Result, VinoError};
use crate::optimizer::SearchSpace;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Which boosting estimator the search tunes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EstimatorKind {
    /// Histogram gradient boosting, no scaler
    #[default]
    Hist,
    /// Classic gradient boosting behind a robust scaler
    Classic,
}

impl std::fmt::Display for EstimatorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EstimatorKind::Hist => write!(f, "hist"),
            EstimatorKind::Classic => write!(f, "classic"),
        }
    }
}

impl std::str::FromStr for EstimatorKind {
    type Err = VinoError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "hist" => Ok(EstimatorKind::Hist),
            "classic" => Ok(EstimatorKind::Classic),
            other => Err(VinoError::invalid_parameter("estimator", other, "expected `hist` or `classic`")),
        }
    }
}

/// Configuration for a training run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainingConfig {
    /// Where the dataset comes from
    pub source: DatasetSource,

    /// Held-out test fraction, strictly between 0 and 1
    pub test_size: f64,

    /// Seed for the split, fold assignment, sampling and model randomness
    pub seed: u64,

    /// Number of sampled configurations
    pub n_iter: usize,

    /// Cross-validation folds
    pub cv_folds: usize,

    /// Worker threads for the search (None = all cores)
    pub n_jobs: Option<usize>,

    pub estimator: EstimatorKind,

    /// Directory receiving the artifacts
    pub artifact_dir: PathBuf,

    /// Replaces the estimator's default distributions
    pub search_space: Option<SearchSpace>,
}

impl Default for TrainingConfig {
    fn default() -> Self {
        Self {
            source: DatasetSource::default(),
            test_size: 0.2,
            seed: 42,
            n_iter: 30,
            cv_folds: 4,
            n_jobs: None,
            estimator: EstimatorKind::Hist,
            artifact_dir: PathBuf::from("."),
            search_space: None,
        }
    }
}

impl TrainingConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load from a JSON file; absent keys keep their defaults
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .map_err(|e| VinoError::ConfigError(format!("Cannot read {}: {}", path.display(), e)))?;
        serde_json::from_str(&text)
            .map_err(|e| VinoError::ConfigError(format!("Invalid config {}: {}", path.display(), e)))
    }

    pub fn with_source(mut self, source: DatasetSource) -> Self {
        self.source = source;
        self
    }

    pub fn with_test_size(mut self, test_size: f64) -> Self {
        self.test_size = test_size;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    pub fn with_n_iter(mut self, n_iter: usize) -> Self {
        self.n_iter = n_iter;
        self
    }

    pub fn with_cv_folds(mut self, folds: usize) -> Self {
        self.cv_folds = folds;
        self
    }

    pub fn with_n_jobs(mut self, n_jobs: Option<usize>) -> Self {
        self.n_jobs = n_jobs;
        self
    }

    pub fn with_estimator(mut self, estimator: EstimatorKind) -> Self {
        self.estimator = estimator;
        self
    }

    pub fn with_artifact_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.artifact_dir = dir.into();
        self
    }

    pub fn with_search_space(mut self, space: SearchSpace) -> Self {
        self.search_space = Some(space);
        self
    }

    /// The configured distributions, or the estimator's defaults
    pub fn effective_search_space(&self) -> SearchSpace {
        self.search_space
            .clone()
            .unwrap_or_else(|| SearchSpace::default_for(self.estimator))
    }

    pub fn validate(&self) -> Result<()> {
        if !(self.test_size > 0.0 && self.test_size < 1.0) {
            return Err(VinoError::invalid_parameter("test_size", self.test_size, "must be in (0, 1)"));
        }
        if self.n_iter == 0 {
            return Err(VinoError::SearchSpaceEmpty("trial budget is zero".to_string()));
        }
        if self.cv_folds < 2 {
            return Err(VinoError::invalid_parameter("cv_folds", self.cv_folds, "must be >= 2"));
        }
        if self.n_jobs == Some(0) {
            return Err(VinoError::invalid_parameter("n_jobs", 0, "must be >= 1"));
        }
        self.effective_search_space().validate()
    }
}
