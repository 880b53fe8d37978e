//! Training run orchestration: split → search → evaluate → persist

use crate::artifacts::{ArtifactPaths, ArtifactWriter, SearchSummary};
use crate::config::TrainingConfig;
use crate::data::{Dataset, DatasetLoader};
use crate::error::{Result, VinoError};
use crate::optimizer::{RandomizedSearch, SearchOutcome};
use std::time::Instant;
use tracing::info;

use super::metrics::RegressionMetrics;
use super::pipeline::{Estimator, ModelPipeline};
use super::scoring::{Scorer, WeightedMae};

/// Everything a finished run produced
#[derive(Debug, Clone)]
pub struct TrainingReport {
    pub outcome: SearchOutcome,
    /// Held-out test metrics of the refitted best model
    pub metrics: RegressionMetrics,
    pub feature_names: Vec<String>,
    pub n_train: usize,
    pub n_test: usize,
    pub elapsed_secs: f64,
}

/// Main training engine
#[derive(Debug, Clone)]
pub struct TrainEngine {
    config: TrainingConfig,
}

impl TrainEngine {
    pub fn new(config: TrainingConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &TrainingConfig {
        &self.config
    }

    /// Split, search and evaluate. Performs no I/O.
    pub fn fit(&self, dataset: &Dataset) -> Result<TrainingReport> {
        self.config.validate()?;
        let start = Instant::now();

        let (train, test) = dataset.train_test_split(self.config.test_size, self.config.seed)?;
        info!(
            n_train = train.n_samples(),
            n_test = test.n_samples(),
            seed = self.config.seed,
            "Stratified split"
        );

        let template = ModelPipeline::for_estimator(self.config.estimator, self.config.seed);
        let scorer = WeightedMae::default();
        let scorer_name = scorer.name().to_string();
        let outcome = RandomizedSearch::new(template, self.config.effective_search_space())
            .with_scorer(scorer)
            .with_n_iter(self.config.n_iter)
            .with_cv(self.config.cv_folds)
            .with_seed(self.config.seed)
            .with_n_jobs(self.config.n_jobs)
            .fit(&train.features, &train.targets)?;

        let y_pred = outcome.best_model.predict(&test.features)?;
        let metrics = RegressionMetrics::compute(&test.targets, &y_pred)?;
        info!(
            scorer = %scorer_name,
            cv_score = outcome.best_score,
            rmse = metrics.rmse,
            mae = metrics.mae,
            r2 = metrics.r2,
            "Held-out evaluation"
        );

        Ok(TrainingReport {
            outcome,
            metrics,
            feature_names: dataset.feature_names.clone(),
            n_train: train.n_samples(),
            n_test: test.n_samples(),
            elapsed_secs: start.elapsed().as_secs_f64(),
        })
    }

    /// Write the three artifacts plus the search summary
    pub fn persist(&self, report: &TrainingReport) -> Result<ArtifactPaths> {
        let writer = ArtifactWriter::new(&self.config.artifact_dir);
        writer.write_all(&report.outcome.best_model, &report.feature_names, &report.metrics)?;
        writer.write_search_summary(&SearchSummary::from_outcome(&report.outcome, WeightedMae::default().name()))?;
        Ok(writer.paths().clone())
    }

    /// Fetch the dataset, train on a blocking thread and persist the artifacts
    pub async fn run(&self) -> Result<TrainingReport> {
        let dataset = DatasetLoader::new(self.config.source.clone()).fetch().await?;
        let engine = self.clone();
        tokio::task::spawn_blocking(move || -> Result<TrainingReport> {
            let report = engine.fit(&dataset)?;
            engine.persist(&report)?;
            Ok(report)
        })
        .await
        .map_err(|e| VinoError::TrainingError(format!("Training task failed: {}", e)))?
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::artifacts::{read_feature_names, read_metrics, read_model};
    use crate::config::EstimatorKind;
    use crate::data::FEATURE_NAMES;
    use crate::optimizer::SearchSpace;
    use ndarray::{Array1, Array2};

    fn dataset(n: usize) -> Dataset {
        let x = Array2::from_shape_fn((n, 11), |(i, j)| ((i * (j + 2) + 3 * j) % 29) as f64 / 29.0);
        let y = Array1::from_iter(
            x.outer_iter()
                .map(|r| (3.0 + 3.0 * r[10] + 2.0 * r[1] + r[5]).round().clamp(3.0, 9.0)),
        );
        Dataset::new(x, y, FEATURE_NAMES.iter().map(|s| s.to_string()).collect()).unwrap()
    }

    #[test]
    fn test_fit_and_persist_classic() {
        let dir = tempfile::tempdir().unwrap();
        let config = TrainingConfig::new()
            .with_estimator(EstimatorKind::Classic)
            .with_search_space(
                SearchSpace::new()
                    .randint("n_estimators", 10, 30)
                    .uniform("learning_rate", 0.05, 0.2)
                    .randint("max_depth", 2, 4),
            )
            .with_n_iter(3)
            .with_cv_folds(2)
            .with_artifact_dir(dir.path());
        let engine = TrainEngine::new(config);

        let report = engine.fit(&dataset(150)).unwrap();
        assert_eq!(report.n_train + report.n_test, 150);
        assert!(report.metrics.rmse >= 0.0);
        assert!(report.metrics.r2 <= 1.0);

        let paths = engine.persist(&report).unwrap();
        assert_eq!(read_feature_names(&paths).unwrap().len(), 11);
        assert_eq!(read_metrics(&paths).unwrap(), report.metrics);
        assert!(read_model(&paths).unwrap().is_fitted());
        assert!(paths.search_summary().exists());
    }

    #[test]
    fn test_invalid_config_rejected() {
        let engine = TrainEngine::new(TrainingConfig::new().with_cv_folds(1));
        assert!(matches!(engine.fit(&dataset(50)), Err(VinoError::InvalidParameter { .. })));
    }
}
