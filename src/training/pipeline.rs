//! Model pipelines: ordered named steps ending in a regressor

use crate::config::EstimatorKind;
use crate::error::{Result, VinoError};
use crate::optimizer::{ParameterValue, TrialParams};
use crate::preprocessing::RobustScaler;
use ndarray::{Array1, Array2};
use serde::{Deserialize, Serialize};

use super::gradient_boosting::{GradientBoostingConfig, GradientBoostingRegressor};
use super::hist_boosting::{HistGradientBoostingConfig, HistGradientBoostingRegressor};

/// A fitted-or-not model that predicts a continuous score
pub trait Estimator: Send + Sync {
    fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()>;

    fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>>;
}

/// A feature transformation learned from training rows
pub trait Transformer: Send + Sync {
    fn fit(&mut self, x: &Array2<f64>) -> Result<()>;

    fn transform(&self, x: &Array2<f64>) -> Result<Array2<f64>>;
}

impl Transformer for RobustScaler {
    fn fit(&mut self, x: &Array2<f64>) -> Result<()> {
        RobustScaler::fit(self, x).map(|_| ())
    }

    fn transform(&self, x: &Array2<f64>) -> Result<Array2<f64>> {
        RobustScaler::transform(self, x)
    }
}

/// The boosting estimators a pipeline can end in
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Regressor {
    Hist(HistGradientBoostingRegressor),
    Classic(GradientBoostingRegressor),
}

impl Regressor {
    pub fn kind(&self) -> EstimatorKind {
        match self {
            Regressor::Hist(_) => EstimatorKind::Hist,
            Regressor::Classic(_) => EstimatorKind::Classic,
        }
    }

    /// Apply sampled hyperparameters. Unknown names are rejected.
    pub fn set_params(&mut self, params: &TrialParams) -> Result<()> {
        for (name, value) in params.iter() {
            match self {
                Regressor::Hist(model) => {
                    let c = &mut model.config;
                    match name {
                        "max_iter" => c.max_iter = positive(name, value)?,
                        "learning_rate" => c.learning_rate = value.as_float(),
                        "max_leaf_nodes" => c.max_leaf_nodes = positive(name, value)?,
                        "min_samples_leaf" => c.min_samples_leaf = positive(name, value)?,
                        "max_depth" => c.max_depth = Some(positive(name, value)?),
                        "l2_regularization" => c.l2_regularization = value.as_float(),
                        "max_bins" => c.max_bins = positive(name, value)?,
                        _ => return Err(unknown(name, value, EstimatorKind::Hist)),
                    }
                }
                Regressor::Classic(model) => {
                    let c = &mut model.config;
                    match name {
                        "n_estimators" => c.n_estimators = positive(name, value)?,
                        "learning_rate" => c.learning_rate = value.as_float(),
                        "max_depth" => c.max_depth = positive(name, value)?,
                        "subsample" => c.subsample = value.as_float(),
                        "min_samples_split" => c.min_samples_split = positive(name, value)?,
                        "min_samples_leaf" => c.min_samples_leaf = positive(name, value)?,
                        _ => return Err(unknown(name, value, EstimatorKind::Classic)),
                    }
                }
            }
        }
        Ok(())
    }
}

fn positive(name: &str, value: ParameterValue) -> Result<usize> {
    value
        .as_int()
        .and_then(|v| usize::try_from(v).ok())
        .filter(|&v| v > 0)
        .ok_or_else(|| VinoError::invalid_parameter(name, value, "expected a positive integer"))
}

fn unknown(name: &str, value: ParameterValue, kind: EstimatorKind) -> VinoError {
    VinoError::invalid_parameter(name, value, format!("not a parameter of the {} estimator", kind))
}

impl Estimator for Regressor {
    fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
        match self {
            Regressor::Hist(m) => m.fit(x, y),
            Regressor::Classic(m) => m.fit(x, y),
        }
    }

    fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        match self {
            Regressor::Hist(m) => m.predict(x),
            Regressor::Classic(m) => m.predict(x),
        }
    }
}

/// One pipeline stage
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Step {
    Scaler(RobustScaler),
    Model(Regressor),
}

/// Ordered named steps; every step but the last transforms, the last predicts
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelPipeline {
    steps: Vec<(String, Step)>,
    n_features_in: Option<usize>,
}

impl ModelPipeline {
    pub fn new(steps: Vec<(String, Step)>) -> Result<Self> {
        let model_positions: Vec<usize> = steps
            .iter()
            .enumerate()
            .filter(|(_, (_, s))| matches!(s, Step::Model(_)))
            .map(|(i, _)| i)
            .collect();
        if model_positions != [steps.len().saturating_sub(1)] || steps.is_empty() {
            return Err(VinoError::InvalidInput(
                "A pipeline needs exactly one model step, placed last".to_string(),
            ));
        }
        Ok(Self {
            steps,
            n_features_in: None,
        })
    }

    /// Unfitted template for an estimator kind with default hyperparameters
    pub fn for_estimator(kind: EstimatorKind, seed: u64) -> Self {
        let steps = match kind {
            EstimatorKind::Hist => vec![(
                "model".to_string(),
                Step::Model(Regressor::Hist(HistGradientBoostingRegressor::new(
                    HistGradientBoostingConfig {
                        early_stopping: true,
                        random_state: Some(seed),
                        ..Default::default()
                    },
                ))),
            )],
            EstimatorKind::Classic => vec![
                ("scaler".to_string(), Step::Scaler(RobustScaler::new())),
                (
                    "model".to_string(),
                    Step::Model(Regressor::Classic(GradientBoostingRegressor::new(
                        GradientBoostingConfig {
                            n_iter_no_change: Some(10),
                            validation_fraction: 0.1,
                            tol: 1e-4,
                            random_state: Some(seed),
                            ..Default::default()
                        },
                    ))),
                ),
            ],
        };
        Self {
            steps,
            n_features_in: None,
        }
    }

    pub fn step_names(&self) -> Vec<&str> {
        self.steps.iter().map(|(name, _)| name.as_str()).collect()
    }

    pub fn regressor(&self) -> Option<&Regressor> {
        self.steps.iter().find_map(|(_, s)| match s {
            Step::Model(r) => Some(r),
            Step::Scaler(_) => None,
        })
    }

    pub fn kind(&self) -> Option<EstimatorKind> {
        self.regressor().map(Regressor::kind)
    }

    pub fn is_fitted(&self) -> bool {
        self.n_features_in.is_some()
    }

    pub fn n_features_in(&self) -> Option<usize> {
        self.n_features_in
    }

    /// Unfitted copy with `params` applied to the model step
    pub fn with_params(&self, params: &TrialParams) -> Result<Self> {
        let mut candidate = self.clone();
        candidate.n_features_in = None;
        for (_, step) in candidate.steps.iter_mut() {
            if let Step::Model(regressor) = step {
                regressor.set_params(params)?;
            }
        }
        Ok(candidate)
    }
}

impl Estimator for ModelPipeline {
    fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
        let mut current = x.clone();
        for (_, step) in self.steps.iter_mut() {
            match step {
                Step::Scaler(scaler) => {
                    Transformer::fit(scaler, &current)?;
                    current = Transformer::transform(scaler, &current)?;
                }
                Step::Model(model) => model.fit(&current, y)?,
            }
        }
        self.n_features_in = Some(x.ncols());
        Ok(())
    }

    fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        let expected = self.n_features_in.ok_or(VinoError::ModelNotFitted)?;
        if x.ncols() != expected {
            return Err(VinoError::ShapeError {
                expected: format!("{} features", expected),
                actual: format!("{} features", x.ncols()),
            });
        }
        let mut current = x.clone();
        for (_, step) in &self.steps {
            match step {
                Step::Scaler(scaler) => current = Transformer::transform(scaler, &current)?,
                Step::Model(model) => return model.predict(&current),
            }
        }
        Err(VinoError::InvalidInput("Pipeline has no model step".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn data() -> (Array2<f64>, Array1<f64>) {
        let x = Array2::from_shape_fn((60, 3), |(i, j)| ((i * 3 + j * 5) % 17) as f64);
        let y = x.column(0).mapv(|v| 4.0 + v / 8.0);
        (x, y)
    }

    #[test]
    fn test_templates() {
        let hist = ModelPipeline::for_estimator(EstimatorKind::Hist, 42);
        assert_eq!(hist.step_names(), vec!["model"]);
        let classic = ModelPipeline::for_estimator(EstimatorKind::Classic, 42);
        assert_eq!(classic.step_names(), vec!["scaler", "model"]);
        assert_eq!(classic.kind(), Some(EstimatorKind::Classic));
    }

    #[test]
    fn test_set_params() {
        let template = ModelPipeline::for_estimator(EstimatorKind::Hist, 42);
        let params = TrialParams::new()
            .with("max_iter", ParameterValue::Int(250))
            .with("learning_rate", ParameterValue::Float(0.05))
            .with("max_depth", ParameterValue::Int(4));
        let candidate = template.with_params(&params).unwrap();
        match candidate.regressor() {
            Some(Regressor::Hist(m)) => {
                assert_eq!(m.config.max_iter, 250);
                assert_eq!(m.config.learning_rate, 0.05);
                assert_eq!(m.config.max_depth, Some(4));
            }
            other => panic!("unexpected regressor {:?}", other),
        }
    }

    #[test]
    fn test_unknown_param_rejected() {
        let template = ModelPipeline::for_estimator(EstimatorKind::Classic, 42);
        let params = TrialParams::new().with("max_leaf_nodes", ParameterValue::Int(31));
        assert!(matches!(
            template.with_params(&params),
            Err(VinoError::InvalidParameter { .. })
        ));
        let params = TrialParams::new().with("max_depth", ParameterValue::Int(-1));
        assert!(matches!(
            template.with_params(&params),
            Err(VinoError::InvalidParameter { .. })
        ));
    }

    #[test]
    fn test_fit_predict_both_kinds() {
        let (x, y) = data();
        for kind in [EstimatorKind::Hist, EstimatorKind::Classic] {
            let mut pipeline = ModelPipeline::for_estimator(kind, 42);
            assert!(matches!(pipeline.predict(&x), Err(VinoError::ModelNotFitted)));
            pipeline.fit(&x, &y).unwrap();
            let preds = pipeline.predict(&x).unwrap();
            assert_eq!(preds.len(), 60);
            assert!(preds.iter().all(|p| p.is_finite()));
            assert!(matches!(
                pipeline.predict(&Array2::zeros((1, 2))),
                Err(VinoError::ShapeError { .. })
            ));
        }
    }

    #[test]
    fn test_new_requires_trailing_model() {
        assert!(ModelPipeline::new(vec![]).is_err());
        assert!(ModelPipeline::new(vec![("scaler".to_string(), Step::Scaler(RobustScaler::new()))]).is_err());
    }
}
