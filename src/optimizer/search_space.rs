//! Hyperparameter distributions and sampled configurations

use crate::config::EstimatorKind;
use crate::error::{Result, VinoError};
use rand::Rng;
use serde::ser::SerializeMap;
use serde::{Deserialize, Serialize, Serializer};
use std::fmt;

/// Sampling distribution for one hyperparameter
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Distribution {
    /// Integers in `[low, high)`
    Randint { low: i64, high: i64 },
    /// Floats in `[loc, loc + scale]`
    Uniform { loc: f64, scale: f64 },
}

impl Distribution {
    pub fn validate(&self, name: &str) -> Result<()> {
        match *self {
            Distribution::Randint { low, high } if low >= high => Err(VinoError::invalid_parameter(
                name,
                format!("randint({}, {})", low, high),
                "low must be below high",
            )),
            Distribution::Uniform { loc, scale } if !(scale >= 0.0 && loc.is_finite() && scale.is_finite()) => {
                Err(VinoError::invalid_parameter(
                    name,
                    format!("uniform({}, {})", loc, scale),
                    "scale must be finite and non-negative",
                ))
            }
            _ => Ok(()),
        }
    }

    pub fn sample(&self, rng: &mut impl Rng) -> ParameterValue {
        match *self {
            Distribution::Randint { low, high } => ParameterValue::Int(rng.gen_range(low..high)),
            Distribution::Uniform { loc, scale } => ParameterValue::Float(rng.gen_range(loc..=loc + scale)),
        }
    }
}

impl fmt::Display for Distribution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Distribution::Randint { low, high } => write!(f, "randint({}, {})", low, high),
            Distribution::Uniform { loc, scale } => write!(f, "uniform({}, {})", loc, scale),
        }
    }
}

/// Sampled parameter value
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParameterValue {
    Int(i64),
    Float(f64),
}

impl ParameterValue {
    pub fn as_float(&self) -> f64 {
        match *self {
            ParameterValue::Int(v) => v as f64,
            ParameterValue::Float(v) => v,
        }
    }

    /// Integer view; floats are accepted only when integral
    pub fn as_int(&self) -> Option<i64> {
        match *self {
            ParameterValue::Int(v) => Some(v),
            ParameterValue::Float(v) if v.fract() == 0.0 && v.is_finite() => Some(v as i64),
            ParameterValue::Float(_) => None,
        }
    }
}

impl fmt::Display for ParameterValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParameterValue::Int(v) => write!(f, "{}", v),
            ParameterValue::Float(v) => write!(f, "{:.4}", v),
        }
    }
}

/// A named hyperparameter
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Parameter {
    pub name: String,
    pub distribution: Distribution,
}

/// Ordered set of hyperparameter distributions
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SearchSpace {
    parameters: Vec<Parameter>,
}

impl SearchSpace {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(mut self, name: impl Into<String>, distribution: Distribution) -> Self {
        self.parameters.push(Parameter {
            name: name.into(),
            distribution,
        });
        self
    }

    /// Add an integer parameter drawn from `[low, high)`
    pub fn randint(self, name: impl Into<String>, low: i64, high: i64) -> Self {
        self.add(name, Distribution::Randint { low, high })
    }

    /// Add a float parameter drawn from `[loc, loc + scale]`
    pub fn uniform(self, name: impl Into<String>, loc: f64, scale: f64) -> Self {
        self.add(name, Distribution::Uniform { loc, scale })
    }

    /// Distributions explored for each estimator
    pub fn default_for(kind: EstimatorKind) -> Self {
        match kind {
            EstimatorKind::Hist => Self::new()
                .randint("max_iter", 200, 1200)
                .uniform("learning_rate", 0.01, 0.2)
                .randint("max_leaf_nodes", 16, 128)
                .randint("min_samples_leaf", 1, 50)
                .randint("max_depth", 3, 12)
                .uniform("l2_regularization", 0.0, 1.0),
            EstimatorKind::Classic => Self::new()
                .randint("n_estimators", 100, 800)
                .uniform("learning_rate", 0.01, 0.29)
                .randint("max_depth", 2, 9)
                .uniform("subsample", 0.6, 0.4)
                .randint("min_samples_split", 2, 11),
        }
    }

    pub fn len(&self) -> usize {
        self.parameters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.parameters.is_empty()
    }

    pub fn parameters(&self) -> &[Parameter] {
        &self.parameters
    }

    pub fn validate(&self) -> Result<()> {
        if self.is_empty() {
            return Err(VinoError::SearchSpaceEmpty("no distributions declared".to_string()));
        }
        for p in &self.parameters {
            p.distribution.validate(&p.name)?;
        }
        Ok(())
    }

    /// Draw one configuration, sampling parameters in declaration order
    pub fn sample(&self, rng: &mut impl Rng) -> TrialParams {
        TrialParams {
            values: self
                .parameters
                .iter()
                .map(|p| (p.name.clone(), p.distribution.sample(rng)))
                .collect(),
        }
    }
}

/// One sampled configuration, in declaration order. Serializes as a JSON object.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TrialParams {
    values: Vec<(String, ParameterValue)>,
}

impl TrialParams {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, name: impl Into<String>, value: ParameterValue) -> Self {
        self.values.push((name.into(), value));
        self
    }

    pub fn get(&self, name: &str) -> Option<ParameterValue> {
        self.values.iter().find(|(n, _)| n == name).map(|(_, v)| *v)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, ParameterValue)> {
        self.values.iter().map(|(n, v)| (n.as_str(), *v))
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl fmt::Display for TrialParams {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self.values.iter().map(|(n, v)| format!("{}={}", n, v)).collect();
        write!(f, "{}", parts.join(", "))
    }
}

impl Serialize for TrialParams {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.values.len()))?;
        for (name, value) in &self.values {
            map.serialize_entry(name, value)?;
        }
        map.end()
    }
}
