//! Training artifacts
//!
//! A run leaves three files that every consumer reads instead of retraining:
//! the model envelope, the ordered feature-name list and the test metrics.
//! Each is written to a temp file in the destination directory and renamed
//! over the target, so readers never observe a partial file.

mod envelope;

pub use envelope::{ModelMetadata, SerializedModel};

use crate::error::{Result, VinoError};
use crate::optimizer::{SearchOutcome, TrialParams, TrialRecord};
use crate::training::{ModelPipeline, RegressionMetrics};
use serde::Serialize;
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use tracing::info;

pub const MODEL_FILE: &str = "best_model_wine_quality.bin";
pub const FEATURES_FILE: &str = "feature_names.json";
pub const METRICS_FILE: &str = "metrics.json";
pub const SEARCH_SUMMARY_FILE: &str = "search_summary.json";
pub const REPORT_FILE: &str = "Wine_Quality_Report.md";

/// Trials kept in the search summary
pub const SUMMARY_TOP_N: usize = 5;

/// Artifact locations under one directory
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactPaths {
    dir: PathBuf,
}

impl ArtifactPaths {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn model(&self) -> PathBuf {
        self.dir.join(MODEL_FILE)
    }

    pub fn features(&self) -> PathBuf {
        self.dir.join(FEATURES_FILE)
    }

    pub fn metrics(&self) -> PathBuf {
        self.dir.join(METRICS_FILE)
    }

    pub fn search_summary(&self) -> PathBuf {
        self.dir.join(SEARCH_SUMMARY_FILE)
    }

    pub fn report(&self) -> PathBuf {
        self.dir.join(REPORT_FILE)
    }

    pub fn join(&self, file: &str) -> PathBuf {
        self.dir.join(file)
    }
}

/// Informational record of the search; not read back by any consumer
#[derive(Debug, Clone, Serialize)]
pub struct SearchSummary {
    pub estimator: String,
    pub scorer: String,
    pub n_trials: usize,
    pub best_trial: usize,
    pub best_params: TrialParams,
    pub best_cv_score: f64,
    pub top_trials: Vec<TrialRecord>,
    pub total_duration_secs: f64,
}

impl SearchSummary {
    pub fn from_outcome(outcome: &SearchOutcome, scorer: &str) -> Self {
        Self {
            estimator: outcome.best_model.kind().map(|k| k.to_string()).unwrap_or_default(),
            scorer: scorer.to_string(),
            n_trials: outcome.trials.len(),
            best_trial: outcome.best_trial,
            best_params: outcome.best_params.clone(),
            best_cv_score: outcome.best_score,
            top_trials: outcome.top(SUMMARY_TOP_N).into_iter().cloned().collect(),
            total_duration_secs: outcome.total_duration_secs,
        }
    }
}

/// Writes artifacts atomically into one directory
#[derive(Debug, Clone)]
pub struct ArtifactWriter {
    paths: ArtifactPaths,
}

impl ArtifactWriter {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            paths: ArtifactPaths::new(dir),
        }
    }

    pub fn paths(&self) -> &ArtifactPaths {
        &self.paths
    }

    /// Write model, feature names and metrics, in that order. A failure stops
    /// the sequence; files already written stay in place.
    pub fn write_all(
        &self,
        model: &ModelPipeline,
        feature_names: &[String],
        metrics: &RegressionMetrics,
    ) -> Result<()> {
        self.write_model(model)?;
        self.write_feature_names(feature_names)?;
        self.write_metrics(metrics)?;
        info!(dir = %self.paths.dir().display(), "Artifacts written");
        Ok(())
    }

    pub fn write_model(&self, model: &ModelPipeline) -> Result<()> {
        let bytes = SerializedModel::wrap(model)
            .and_then(|env| env.to_bytes())
            .map_err(|e| write_failure("model", e))?;
        self.write_atomic("model", &self.paths.model(), &bytes)
    }

    pub fn write_feature_names(&self, names: &[String]) -> Result<()> {
        let json = serde_json::to_vec_pretty(names).map_err(|e| write_failure("feature names", e))?;
        self.write_atomic("feature names", &self.paths.features(), &json)
    }

    pub fn write_metrics(&self, metrics: &RegressionMetrics) -> Result<()> {
        let json = serde_json::to_vec_pretty(metrics).map_err(|e| write_failure("metrics", e))?;
        self.write_atomic("metrics", &self.paths.metrics(), &json)
    }

    pub fn write_search_summary(&self, summary: &SearchSummary) -> Result<()> {
        let json = serde_json::to_vec_pretty(summary).map_err(|e| write_failure("search summary", e))?;
        self.write_atomic("search summary", &self.paths.search_summary(), &json)
    }

    /// Write any JSON document next to the artifacts
    pub fn write_json<T: Serialize>(&self, artifact: &str, file: &str, value: &T) -> Result<()> {
        let json = serde_json::to_vec_pretty(value).map_err(|e| write_failure(artifact, e))?;
        self.write_atomic(artifact, &self.paths.join(file), &json)
    }

    fn write_atomic(&self, artifact: &str, target: &Path, bytes: &[u8]) -> Result<()> {
        let dir = self.paths.dir();
        std::fs::create_dir_all(dir).map_err(|e| write_failure(artifact, e))?;

        let mut tmp = NamedTempFile::new_in(dir).map_err(|e| write_failure(artifact, e))?;
        tmp.write_all(bytes).map_err(|e| write_failure(artifact, e))?;
        tmp.as_file().sync_all().map_err(|e| write_failure(artifact, e))?;
        tmp.persist(target).map_err(|e| write_failure(artifact, e.error))?;
        Ok(())
    }
}

fn write_failure(artifact: &str, err: impl std::fmt::Display) -> VinoError {
    VinoError::WriteFailure {
        artifact: artifact.to_string(),
        reason: err.to_string(),
    }
}

fn read_existing(path: &Path) -> Result<Vec<u8>> {
    std::fs::read(path).map_err(|e| match e.kind() {
        std::io::ErrorKind::NotFound => VinoError::ArtifactMissing(path.display().to_string()),
        _ => VinoError::IoError(e),
    })
}

pub fn read_model(paths: &ArtifactPaths) -> Result<ModelPipeline> {
    SerializedModel::from_bytes(&read_existing(&paths.model())?)?.unwrap_model()
}

pub fn read_feature_names(paths: &ArtifactPaths) -> Result<Vec<String>> {
    Ok(serde_json::from_slice(&read_existing(&paths.features())?)?)
}

pub fn read_metrics(paths: &ArtifactPaths) -> Result<RegressionMetrics> {
    Ok(serde_json::from_slice(&read_existing(&paths.metrics())?)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_feature_names_and_metrics_roundtrip() {
        let dir = tempdir().unwrap();
        let writer = ArtifactWriter::new(dir.path());
        let names: Vec<String> = crate::data::FEATURE_NAMES.iter().map(|s| s.to_string()).collect();
        let metrics = RegressionMetrics { rmse: 0.61, mae: 0.44, r2: 0.52 };

        writer.write_feature_names(&names).unwrap();
        writer.write_metrics(&metrics).unwrap();

        assert_eq!(read_feature_names(writer.paths()).unwrap(), names);
        assert_eq!(read_metrics(writer.paths()).unwrap(), metrics);
    }

    #[test]
    fn test_overwrite_replaces_content() {
        let dir = tempdir().unwrap();
        let writer = ArtifactWriter::new(dir.path());
        writer.write_feature_names(&["a".to_string()]).unwrap();
        writer.write_feature_names(&["b".to_string(), "c".to_string()]).unwrap();
        assert_eq!(read_feature_names(writer.paths()).unwrap(), vec!["b", "c"]);

        // no temp files left behind
        let entries = std::fs::read_dir(dir.path()).unwrap().count();
        assert_eq!(entries, 1);
    }

    #[test]
    fn test_missing_artifacts() {
        let dir = tempdir().unwrap();
        let paths = ArtifactPaths::new(dir.path());
        assert!(matches!(read_metrics(&paths), Err(VinoError::ArtifactMissing(_))));
        assert!(matches!(read_model(&paths), Err(VinoError::ArtifactMissing(_))));
    }

    #[test]
    fn test_write_failure_names_artifact() {
        let dir = tempdir().unwrap();
        let blocker = dir.path().join("not_a_dir");
        std::fs::write(&blocker, b"x").unwrap();

        let writer = ArtifactWriter::new(&blocker);
        let err = writer
            .write_metrics(&RegressionMetrics { rmse: 1.0, mae: 1.0, r2: 0.0 })
            .unwrap_err();
        assert!(matches!(err, VinoError::WriteFailure { ref artifact, .. } if artifact == "metrics"));
    }
}
