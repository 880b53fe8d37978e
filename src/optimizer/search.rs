//! Randomized hyperparameter search with stratified cross-validation

use crate::error::{Result, VinoError};
use crate::training::{CVResults, Estimator, ModelPipeline, Scorer, StratifiedKFold, WeightedMae};
use ndarray::{Array1, Array2, Axis};
use rand::SeedableRng;
use rand_xoshiro::Xoshiro256PlusPlus;
use rayon::prelude::*;
use serde::Serialize;
use std::time::Instant;
use tracing::{debug, info};

use super::search_space::{SearchSpace, TrialParams};

/// Result of a single trial
#[derive(Debug, Clone, Serialize)]
pub struct TrialRecord {
    /// Trial number, in sampling order
    pub trial_id: usize,
    pub params: TrialParams,
    /// Held-out score per fold
    pub fold_scores: Vec<f64>,
    pub mean_score: f64,
    pub std_score: f64,
    /// 1 is best; tied scores share a rank
    pub rank: usize,
    /// Summed fit + score time over folds
    pub duration_secs: f64,
}

/// Outcome of a completed search
#[derive(Debug, Clone)]
pub struct SearchOutcome {
    /// Best configuration refitted on the full training set
    pub best_model: ModelPipeline,
    pub best_params: TrialParams,
    /// Mean CV score of the best configuration
    pub best_score: f64,
    pub best_trial: usize,
    pub trials: Vec<TrialRecord>,
    pub total_duration_secs: f64,
}

impl SearchOutcome {
    /// Trials ordered by rank, at most `n`
    pub fn top(&self, n: usize) -> Vec<&TrialRecord> {
        let mut ranked: Vec<&TrialRecord> = self.trials.iter().collect();
        ranked.sort_by_key(|t| (t.rank, t.trial_id));
        ranked.truncate(n);
        ranked
    }
}

/// Evaluation of one (trial, fold) unit
struct FoldScore {
    score: f64,
    secs: f64,
}

/// Randomized search over a [`SearchSpace`]
pub struct RandomizedSearch<S: Scorer = WeightedMae> {
    template: ModelPipeline,
    space: SearchSpace,
    scorer: S,
    n_iter: usize,
    cv: usize,
    seed: u64,
    n_jobs: Option<usize>,
}

impl RandomizedSearch<WeightedMae> {
    pub fn new(template: ModelPipeline, space: SearchSpace) -> Self {
        Self {
            template,
            space,
            scorer: WeightedMae::default(),
            n_iter: 30,
            cv: 4,
            seed: 42,
            n_jobs: None,
        }
    }
}

impl<S: Scorer> RandomizedSearch<S> {
    pub fn with_scorer<T: Scorer>(self, scorer: T) -> RandomizedSearch<T> {
        RandomizedSearch {
            template: self.template,
            space: self.space,
            scorer,
            n_iter: self.n_iter,
            cv: self.cv,
            seed: self.seed,
            n_jobs: self.n_jobs,
        }
    }

    pub fn with_n_iter(mut self, n_iter: usize) -> Self {
        self.n_iter = n_iter;
        self
    }

    pub fn with_cv(mut self, folds: usize) -> Self {
        self.cv = folds;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Worker threads; `None` uses every core
    pub fn with_n_jobs(mut self, n_jobs: Option<usize>) -> Self {
        self.n_jobs = n_jobs;
        self
    }

    /// Sample `n_iter` configurations, score each with stratified k-fold CV,
    /// and refit the lowest-scoring one on all of `x` / `y`.
    pub fn fit(&self, x: &Array2<f64>, y: &Array1<f64>) -> Result<SearchOutcome> {
        if self.n_iter == 0 {
            return Err(VinoError::SearchSpaceEmpty("trial budget is zero".to_string()));
        }
        self.space.validate()?;
        if x.nrows() != y.len() {
            return Err(VinoError::ShapeError {
                expected: format!("{} targets", x.nrows()),
                actual: format!("{} targets", y.len()),
            });
        }

        let start = Instant::now();
        let mut rng = Xoshiro256PlusPlus::seed_from_u64(self.seed);
        let sampled: Vec<TrialParams> = (0..self.n_iter).map(|_| self.space.sample(&mut rng)).collect();
        let candidates: Vec<ModelPipeline> = sampled
            .iter()
            .map(|params| self.template.with_params(params))
            .collect::<Result<_>>()?;

        let folds = StratifiedKFold::new(self.cv).with_random_state(self.seed).split(y)?;
        let fold_data: Vec<_> = folds
            .iter()
            .map(|f| {
                (
                    x.select(Axis(0), &f.train_indices),
                    y.select(Axis(0), &f.train_indices),
                    x.select(Axis(0), &f.test_indices),
                    y.select(Axis(0), &f.test_indices),
                )
            })
            .collect();

        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(self.n_jobs.unwrap_or(0))
            .build()
            .map_err(|e| VinoError::TrainingError(format!("Failed to build worker pool: {}", e)))?;

        info!(
            trials = self.n_iter,
            folds = self.cv,
            workers = pool.current_num_threads(),
            scorer = self.scorer.name(),
            "Starting randomized search"
        );

        let units: Vec<(usize, usize)> = (0..self.n_iter)
            .flat_map(|t| (0..folds.len()).map(move |f| (t, f)))
            .collect();

        let results: Vec<Result<FoldScore>> = pool.install(|| {
            units
                .par_iter()
                .map(|&(trial, fold)| {
                    let unit_start = Instant::now();
                    let (x_train, y_train, x_test, y_test) = &fold_data[fold];
                    let mut model = candidates[trial].clone();
                    model.fit(x_train, y_train)?;
                    let score = self.scorer.score(y_test, &model.predict(x_test)?)?;
                    debug!(trial, fold, score, "Fold scored");
                    Ok(FoldScore {
                        score,
                        secs: unit_start.elapsed().as_secs_f64(),
                    })
                })
                .collect()
        });

        // Reduce in trial order so the result does not depend on scheduling
        let mut trials = Vec::with_capacity(self.n_iter);
        let mut results = results.into_iter();
        for (trial_id, params) in sampled.into_iter().enumerate() {
            let mut fold_scores = Vec::with_capacity(folds.len());
            let mut duration_secs = 0.0;
            for _ in 0..folds.len() {
                let unit = results
                    .next()
                    .ok_or_else(|| VinoError::TrainingError("Missing fold result".to_string()))??;
                fold_scores.push(unit.score);
                duration_secs += unit.secs;
            }
            let cv = CVResults::from_scores(fold_scores);
            info!(trial = trial_id, mean_score = cv.mean, std_score = cv.std, "Trial finished");
            trials.push(TrialRecord {
                trial_id,
                params,
                fold_scores: cv.scores,
                mean_score: cv.mean,
                std_score: cv.std,
                rank: 0,
                duration_secs,
            });
        }

        assign_ranks(&mut trials);

        let best_trial = trials
            .iter()
            .fold(None::<&TrialRecord>, |best, t| match best {
                Some(b) if b.mean_score <= t.mean_score => Some(b),
                _ if t.mean_score.is_nan() => best,
                _ => Some(t),
            })
            .map(|t| t.trial_id)
            .ok_or_else(|| VinoError::TrainingError("Every trial produced a NaN score".to_string()))?;

        let mut best_model = candidates[best_trial].clone();
        pool.install(|| best_model.fit(x, y))?;

        let outcome = SearchOutcome {
            best_model,
            best_params: trials[best_trial].params.clone(),
            best_score: trials[best_trial].mean_score,
            best_trial,
            trials,
            total_duration_secs: start.elapsed().as_secs_f64(),
        };
        info!(
            best_trial,
            best_score = outcome.best_score,
            elapsed_secs = outcome.total_duration_secs,
            "Randomized search finished"
        );
        Ok(outcome)
    }
}

/// Rank by mean score, ascending; equal scores share the lower rank
fn assign_ranks(trials: &mut [TrialRecord]) {
    let means: Vec<f64> = trials.iter().map(|t| t.mean_score).collect();
    for trial in trials.iter_mut() {
        trial.rank = 1 + means.iter().filter(|&&m| m < trial.mean_score).count();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EstimatorKind;

    fn synthetic(n: usize) -> (Array2<f64>, Array1<f64>) {
        let x = Array2::from_shape_fn((n, 4), |(i, j)| ((i * (j + 3) + j) % 23) as f64 / 23.0);
        let y = Array1::from_iter(x.outer_iter().map(|r| (3.0 + 4.0 * r[0] + 2.0 * r[1]).round().min(9.0)));
        (x, y)
    }

    fn small_space() -> SearchSpace {
        SearchSpace::new()
            .randint("max_iter", 10, 40)
            .uniform("learning_rate", 0.05, 0.2)
            .randint("min_samples_leaf", 2, 10)
    }

    #[test]
    fn test_search_records_every_trial() {
        let (x, y) = synthetic(120);
        let template = ModelPipeline::for_estimator(EstimatorKind::Hist, 42);
        let outcome = RandomizedSearch::new(template, small_space())
            .with_n_iter(4)
            .with_cv(3)
            .fit(&x, &y)
            .unwrap();

        assert_eq!(outcome.trials.len(), 4);
        assert!(outcome.trials.iter().all(|t| t.fold_scores.len() == 3));
        let best = &outcome.trials[outcome.best_trial];
        assert_eq!(best.rank, 1);
        assert_eq!(outcome.best_score, best.mean_score);
        assert!(outcome.trials.iter().all(|t| t.mean_score >= outcome.best_score));
        assert!(outcome.best_model.is_fitted());
        assert_eq!(outcome.top(2).len(), 2);
    }

    #[test]
    fn test_search_independent_of_worker_count() {
        let (x, y) = synthetic(100);
        let run = |jobs| {
            RandomizedSearch::new(ModelPipeline::for_estimator(EstimatorKind::Hist, 42), small_space())
                .with_n_iter(3)
                .with_cv(2)
                .with_n_jobs(Some(jobs))
                .fit(&x, &y)
                .unwrap()
        };
        let serial = run(1);
        let parallel = run(4);
        assert_eq!(serial.best_params, parallel.best_params);
        for (a, b) in serial.trials.iter().zip(parallel.trials.iter()) {
            assert_eq!(a.fold_scores, b.fold_scores);
        }
    }

    #[test]
    fn test_empty_budget_or_space() {
        let (x, y) = synthetic(40);
        let template = ModelPipeline::for_estimator(EstimatorKind::Hist, 42);
        assert!(matches!(
            RandomizedSearch::new(template.clone(), small_space()).with_n_iter(0).fit(&x, &y),
            Err(VinoError::SearchSpaceEmpty(_))
        ));
        assert!(matches!(
            RandomizedSearch::new(template, SearchSpace::new()).fit(&x, &y),
            Err(VinoError::SearchSpaceEmpty(_))
        ));
    }

    #[test]
    fn test_ranks_share_ties() {
        let record = |id, mean| TrialRecord {
            trial_id: id,
            params: TrialParams::new(),
            fold_scores: vec![mean],
            mean_score: mean,
            std_score: 0.0,
            rank: 0,
            duration_secs: 0.0,
        };
        let mut trials = vec![record(0, 0.5), record(1, 0.3), record(2, 0.5), record(3, 0.7)];
        assign_ranks(&mut trials);
        let ranks: Vec<usize> = trials.iter().map(|t| t.rank).collect();
        assert_eq!(ranks, vec![2, 1, 2, 4]);
    }
}
