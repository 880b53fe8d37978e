//! Hyperparameter search
//!
//! - [`search_space`]: scipy-style `randint` / `uniform` distributions and the
//!   per-estimator default spaces
//! - [`search`]: randomized search scored by stratified k-fold CV, evaluated on
//!   a bounded rayon pool

pub mod search;
pub mod search_space;

pub use search::{RandomizedSearch, SearchOutcome, TrialRecord};
pub use search_space::{Distribution, Parameter, ParameterValue, SearchSpace, TrialParams};
