//! Inference over persisted artifacts
//!
//! Consumers never retrain: they load the model and feature list through
//! [`ArtifactCache`], canonicalize inputs with [`FeatureRow`] and band the
//! rounded score into a [`Verdict`].

mod cache;
mod features;
mod verdict;

pub use cache::ArtifactCache;
pub use features::{Canonicalized, FeatureRow};
pub use verdict::{round_score, Prediction, Verdict, EXCEPTIONAL_THRESHOLD, FINE_THRESHOLD};

use crate::error::{Result, VinoError};
use crate::training::{Estimator, ModelPipeline};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::warn;

/// A loaded model paired with the column order it was trained on
#[derive(Debug, Clone)]
pub struct Predictor {
    model: Arc<ModelPipeline>,
    feature_names: Arc<Vec<String>>,
}

/// A prediction and the input keys that were not used
#[derive(Debug, Clone, PartialEq)]
pub struct PredictionResult {
    pub prediction: Prediction,
    pub raw_score: f64,
    pub missing: Vec<String>,
    pub unknown: Vec<String>,
}

impl Predictor {
    pub fn new(model: Arc<ModelPipeline>, feature_names: Arc<Vec<String>>) -> Result<Self> {
        if let Some(n) = model.n_features_in() {
            if n != feature_names.len() {
                return Err(VinoError::ShapeError {
                    expected: format!("{} feature names", n),
                    actual: format!("{} feature names", feature_names.len()),
                });
            }
        }
        Ok(Self { model, feature_names })
    }

    /// Build from whatever the cache holds; `None` if either artifact is absent
    pub async fn from_cache(cache: &ArtifactCache) -> Result<Option<Self>> {
        let (Some(model), Some(names)) = (cache.model().await?, cache.feature_names().await?) else {
            return Ok(None);
        };
        Self::new(model, names).map(Some)
    }

    pub fn feature_names(&self) -> &[String] {
        &self.feature_names
    }

    pub fn predict(&self, input: &HashMap<String, f64>) -> Result<PredictionResult> {
        let canonical = FeatureRow::canonicalize(&self.feature_names, input);
        if !canonical.unknown.is_empty() {
            warn!(keys = ?canonical.unknown, "Ignoring unknown feature keys");
        }
        let raw = self.model.predict(&canonical.row.to_matrix())?;
        let raw_score = raw
            .first()
            .copied()
            .ok_or_else(|| VinoError::TrainingError("Model returned no prediction".to_string()))?;
        Ok(PredictionResult {
            prediction: Prediction::from_raw(raw_score),
            raw_score,
            missing: canonical.missing,
            unknown: canonical.unknown,
        })
    }
}
