//! Hyperparameter tuning over experiment configurations.
//!
//! A [`SearchSpace`] declares named sampling distributions; a
//! [`Tuner`] draws one configuration per trial, evaluates a
//! caller-supplied objective (normally a closure around
//! [`evaluate_model`](crate::experiment::evaluate_model)) and tracks
//! the lowest-loss trial. The proposal algorithm is an external
//! collaborator behind the sampling interface; trials are fully
//! independent, with fresh datasets, model and weights every time and
//! only the trial history shared.
//!
//! # Example
//!
//! ```rust,ignore
//! use panelcast_train::{SearchSpace, Tuner};
//!
//! let mut space = SearchSpace::new();
//! space
//!     .add_float_range("learning_rate", 1e-4, 1e-2, true)
//!     .add_int("batch_size", &[16, 32, 64])
//!     .add_int("n_iterations", &[100, 300]);
//!
//! let result = Tuner::new(space, 20).run(|params| {
//!     let mut config = base_config.clone();
//!     config.learning_rate = params.get_float("learning_rate")?;
//!     // ... evaluate_model(&config, ...) ...
//!     Ok(loss as f64)
//! })?;
//! ```

use std::collections::HashMap;

use rand::prelude::*;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use tracing::warn;

use panelcast_core::{ComputeSettings, Seed};

use crate::experiment::TrialStatus;

/// A sampled hyperparameter value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ParamValue {
    /// Floating point value (learning rates, decay factors).
    Float(f64),
    /// Integer value (sizes, counts, budgets).
    Int(i64),
    /// Boolean flag.
    Bool(bool),
    /// Categorical choice (model names, normalizer kinds).
    Categorical(String),
}

impl ParamValue {
    fn as_float(&self) -> Option<f64> {
        match self {
            ParamValue::Float(v) => Some(*v),
            _ => None,
        }
    }

    fn as_int(&self) -> Option<i64> {
        match self {
            ParamValue::Int(v) => Some(*v),
            _ => None,
        }
    }

    fn as_bool(&self) -> Option<bool> {
        match self {
            ParamValue::Bool(v) => Some(*v),
            _ => None,
        }
    }

    fn as_categorical(&self) -> Option<&str> {
        match self {
            ParamValue::Categorical(v) => Some(v),
            _ => None,
        }
    }
}

/// One trial's sampled hyperparameters.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ParamSet {
    params: HashMap<String, ParamValue>,
}

impl ParamSet {
    /// Create an empty set.
    #[must_use]
    pub fn new() -> Self {
        Self {
            params: HashMap::new(),
        }
    }

    /// Insert a value.
    pub fn insert(&mut self, name: impl Into<String>, value: ParamValue) {
        self.params.insert(name.into(), value);
    }

    /// Get a raw value.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&ParamValue> {
        self.params.get(name)
    }

    /// Get a float, erroring on absence or type mismatch.
    pub fn get_float(&self, name: &str) -> Result<f64, TunerError> {
        self.get(name)
            .ok_or_else(|| TunerError::ParamNotFound(name.to_string()))?
            .as_float()
            .ok_or_else(|| TunerError::TypeMismatch {
                name: name.to_string(),
                expected: "float".to_string(),
            })
    }

    /// Get an integer, erroring on absence or type mismatch.
    pub fn get_int(&self, name: &str) -> Result<i64, TunerError> {
        self.get(name)
            .ok_or_else(|| TunerError::ParamNotFound(name.to_string()))?
            .as_int()
            .ok_or_else(|| TunerError::TypeMismatch {
                name: name.to_string(),
                expected: "int".to_string(),
            })
    }

    /// Get a boolean, erroring on absence or type mismatch.
    pub fn get_bool(&self, name: &str) -> Result<bool, TunerError> {
        self.get(name)
            .ok_or_else(|| TunerError::ParamNotFound(name.to_string()))?
            .as_bool()
            .ok_or_else(|| TunerError::TypeMismatch {
                name: name.to_string(),
                expected: "bool".to_string(),
            })
    }

    /// Get a categorical, erroring on absence or type mismatch.
    pub fn get_categorical(&self, name: &str) -> Result<String, TunerError> {
        self.get(name)
            .ok_or_else(|| TunerError::ParamNotFound(name.to_string()))?
            .as_categorical()
            .map(String::from)
            .ok_or_else(|| TunerError::TypeMismatch {
                name: name.to_string(),
                expected: "categorical".to_string(),
            })
    }
}

/// A single hyperparameter's sampling distribution.
#[derive(Debug, Clone)]
enum ParamDef {
    Float(Vec<f64>),
    FloatRange { min: f64, max: f64, log_scale: bool },
    Int(Vec<i64>),
    IntRange { min: i64, max: i64 },
    Bool,
    Categorical(Vec<String>),
}

impl ParamDef {
    fn sample(&self, rng: &mut ChaCha8Rng) -> ParamValue {
        match self {
            ParamDef::Float(vals) => ParamValue::Float(vals[rng.gen_range(0..vals.len())]),
            ParamDef::FloatRange {
                min,
                max,
                log_scale,
            } => {
                let val = if *log_scale {
                    let (lo, hi) = (min.ln(), max.ln());
                    (lo + rng.gen::<f64>() * (hi - lo)).exp()
                } else {
                    min + rng.gen::<f64>() * (max - min)
                };
                ParamValue::Float(val)
            }
            ParamDef::Int(vals) => ParamValue::Int(vals[rng.gen_range(0..vals.len())]),
            ParamDef::IntRange { min, max } => ParamValue::Int(rng.gen_range(*min..=*max)),
            ParamDef::Bool => ParamValue::Bool(rng.gen()),
            ParamDef::Categorical(opts) => {
                ParamValue::Categorical(opts[rng.gen_range(0..opts.len())].clone())
            }
        }
    }
}

/// The declared search space: hyperparameter name → sampling
/// distribution.
#[derive(Debug, Clone, Default)]
pub struct SearchSpace {
    params: HashMap<String, ParamDef>,
    order: Vec<String>,
}

impl SearchSpace {
    /// Create an empty space.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn add(&mut self, name: &str, def: ParamDef) -> &mut Self {
        if !self.params.contains_key(name) {
            self.order.push(name.to_string());
        }
        self.params.insert(name.to_string(), def);
        self
    }

    /// Add a float drawn from discrete values.
    pub fn add_float(&mut self, name: &str, values: &[f64]) -> &mut Self {
        self.add(name, ParamDef::Float(values.to_vec()))
    }

    /// Add a float drawn from a range, optionally log-uniform.
    pub fn add_float_range(
        &mut self,
        name: &str,
        min: f64,
        max: f64,
        log_scale: bool,
    ) -> &mut Self {
        self.add(
            name,
            ParamDef::FloatRange {
                min,
                max,
                log_scale,
            },
        )
    }

    /// Add an integer drawn from discrete values.
    pub fn add_int(&mut self, name: &str, values: &[i64]) -> &mut Self {
        self.add(name, ParamDef::Int(values.to_vec()))
    }

    /// Add an integer drawn uniformly from `min..=max`.
    pub fn add_int_range(&mut self, name: &str, min: i64, max: i64) -> &mut Self {
        self.add(name, ParamDef::IntRange { min, max })
    }

    /// Add a boolean flag.
    pub fn add_bool(&mut self, name: &str) -> &mut Self {
        self.add(name, ParamDef::Bool)
    }

    /// Add a categorical choice.
    pub fn add_categorical(&mut self, name: &str, options: &[&str]) -> &mut Self {
        self.add(
            name,
            ParamDef::Categorical(options.iter().map(|s| s.to_string()).collect()),
        )
    }

    /// Number of declared hyperparameters.
    #[must_use]
    pub fn len(&self) -> usize {
        self.params.len()
    }

    /// Whether the space is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.params.is_empty()
    }

    fn sample(&self, rng: &mut ChaCha8Rng) -> ParamSet {
        let mut set = ParamSet::new();
        for name in &self.order {
            if let Some(def) = self.params.get(name) {
                set.insert(name.clone(), def.sample(rng));
            }
        }
        set
    }
}

/// Error type for tuning operations.
#[derive(Debug, Clone, thiserror::Error)]
pub enum TunerError {
    /// Parameter missing from the sampled set.
    #[error("Parameter not found: {0}")]
    ParamNotFound(String),

    /// Parameter present with the wrong type.
    #[error("Type mismatch for parameter '{name}': expected {expected}")]
    TypeMismatch {
        /// Parameter name.
        name: String,
        /// Expected type.
        expected: String,
    },

    /// The search space has no parameters.
    #[error("Search space is empty")]
    EmptySpace,

    /// No trial produced a score.
    #[error("All {0} trials failed")]
    AllTrialsFailed(usize),
}

/// One trial's record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrialRecord {
    /// Trial number, 0-based.
    pub trial: usize,
    /// The sampled hyperparameters.
    pub params: ParamSet,
    /// The loss (infinite for failed trials).
    pub loss: f64,
    /// Outcome marker.
    pub status: TrialStatus,
}

/// The outcome of a search.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TuneResult {
    /// Hyperparameters of the best trial.
    pub best_params: ParamSet,
    /// Lowest loss seen.
    pub best_loss: f64,
    /// All trial records, in execution order.
    pub trials: Vec<TrialRecord>,
}

impl TuneResult {
    /// The `n` lowest-loss trials.
    #[must_use]
    pub fn top_n(&self, n: usize) -> Vec<&TrialRecord> {
        let mut sorted: Vec<_> = self
            .trials
            .iter()
            .filter(|t| t.status == TrialStatus::Ok)
            .collect();
        sorted.sort_by(|a, b| a.loss.total_cmp(&b.loss));
        sorted.into_iter().take(n).collect()
    }
}

/// Sequential hyperparameter search with a fixed evaluation budget.
///
/// Runs trials one at a time, minimizing the objective. A failing
/// trial is recorded and skipped rather than terminating the search;
/// only a search where every trial failed returns an error, so a
/// configuration problem reproduced on each trial still surfaces.
#[derive(Debug, Clone)]
pub struct Tuner {
    space: SearchSpace,
    n_trials: usize,
    seed: Seed,
    compute: ComputeSettings,
    verbose: bool,
}

impl Tuner {
    /// Create a tuner over a space with an evaluation budget.
    #[must_use]
    pub fn new(space: SearchSpace, n_trials: usize) -> Self {
        Self {
            space,
            n_trials,
            seed: Seed::new(42),
            compute: ComputeSettings::unbounded(),
            verbose: true,
        }
    }

    /// Set the sampling seed.
    #[must_use]
    pub fn seed(mut self, seed: Seed) -> Self {
        self.seed = seed;
        self
    }

    /// Record the compute limits this search runs under.
    #[must_use]
    pub fn compute(mut self, compute: ComputeSettings) -> Self {
        self.compute = compute;
        self
    }

    /// Enable or disable progress lines.
    #[must_use]
    pub fn verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    /// Run the search, minimizing the objective.
    ///
    /// The objective receives each trial's sampled [`ParamSet`] and
    /// returns its loss; an `Err` marks the trial failed without
    /// stopping the search.
    pub fn run<F, E>(&self, mut objective: F) -> Result<TuneResult, TunerError>
    where
        F: FnMut(&ParamSet) -> Result<f64, E>,
        E: std::fmt::Display,
    {
        if self.space.is_empty() {
            return Err(TunerError::EmptySpace);
        }

        let mut rng = self.seed.to_rng();
        if self.verbose {
            eprintln!(
                "Starting search: {} trials, {} hyperparameters, max_threads={:?}",
                self.n_trials,
                self.space.len(),
                self.compute.max_threads,
            );
        }

        let mut best_loss = f64::INFINITY;
        let mut best_params = ParamSet::new();
        let mut trials = Vec::with_capacity(self.n_trials);
        let mut failures = 0usize;

        for trial in 0..self.n_trials {
            let params = self.space.sample(&mut rng);
            match objective(&params) {
                Ok(loss) => {
                    let improved = loss < best_loss;
                    if improved {
                        best_loss = loss;
                        best_params = params.clone();
                    }
                    if self.verbose {
                        let marker = if improved { " *" } else { "" };
                        eprintln!(
                            "Trial {}/{}: loss = {:.6}{}",
                            trial + 1,
                            self.n_trials,
                            loss,
                            marker
                        );
                    }
                    trials.push(TrialRecord {
                        trial,
                        params,
                        loss,
                        status: TrialStatus::Ok,
                    });
                }
                Err(err) => {
                    warn!(trial, %err, "trial failed, continuing search");
                    failures += 1;
                    trials.push(TrialRecord {
                        trial,
                        params,
                        loss: f64::INFINITY,
                        status: TrialStatus::Failed,
                    });
                }
            }
        }

        if failures == self.n_trials {
            return Err(TunerError::AllTrialsFailed(self.n_trials));
        }

        Ok(TuneResult {
            best_params,
            best_loss,
            trials,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn space_xy() -> SearchSpace {
        let mut space = SearchSpace::new();
        space
            .add_float("x", &[1.0, 2.0, 3.0])
            .add_float_range("y", 0.0, 1.0, false);
        space
    }

    #[test]
    fn test_param_set_typed_access() {
        let mut params = ParamSet::new();
        params.insert("lr", ParamValue::Float(0.001));
        params.insert("batch", ParamValue::Int(32));
        params.insert("shuffle", ParamValue::Bool(true));
        params.insert("model", ParamValue::Categorical("deepar".into()));

        assert_eq!(params.get_float("lr").unwrap(), 0.001);
        assert_eq!(params.get_int("batch").unwrap(), 32);
        assert!(params.get_bool("shuffle").unwrap());
        assert_eq!(params.get_categorical("model").unwrap(), "deepar");
        assert!(matches!(
            params.get_float("batch"),
            Err(TunerError::TypeMismatch { .. })
        ));
        assert!(matches!(
            params.get_float("missing"),
            Err(TunerError::ParamNotFound(_))
        ));
    }

    #[test]
    fn test_tuner_minimizes() {
        let tuner = Tuner::new(space_xy(), 30).seed(Seed::new(7)).verbose(false);
        let result = tuner
            .run(|params| -> Result<f64, TunerError> {
                let x = params.get_float("x")?;
                let y = params.get_float("y")?;
                Ok(x + y)
            })
            .unwrap();
        // x = 1.0 is drawn eventually; y is in [0, 1).
        assert!(result.best_loss < 2.0);
        assert_eq!(result.trials.len(), 30);
    }

    #[test]
    fn test_tuner_deterministic() {
        let run = |seed: u64| {
            Tuner::new(space_xy(), 10)
                .seed(Seed::new(seed))
                .verbose(false)
                .run(|p| -> Result<f64, TunerError> {
                    Ok(p.get_float("x")? + p.get_float("y")?)
                })
                .unwrap()
                .best_loss
        };
        assert_eq!(run(5), run(5));
    }

    #[test]
    fn test_failed_trials_do_not_stop_search() {
        let tuner = Tuner::new(space_xy(), 10).seed(Seed::new(1)).verbose(false);
        let mut count = 0;
        let result = tuner
            .run(|params| -> Result<f64, TunerError> {
                count += 1;
                if count % 2 == 0 {
                    Err(TunerError::EmptySpace)
                } else {
                    params.get_float("x")
                }
            })
            .unwrap();
        assert_eq!(result.trials.len(), 10);
        let failed = result
            .trials
            .iter()
            .filter(|t| t.status == TrialStatus::Failed)
            .count();
        assert_eq!(failed, 5);
        assert!(result.best_loss.is_finite());
    }

    #[test]
    fn test_all_trials_failed_is_an_error() {
        let tuner = Tuner::new(space_xy(), 4).verbose(false);
        let res = tuner.run(|_| -> Result<f64, TunerError> { Err(TunerError::EmptySpace) });
        assert!(matches!(res, Err(TunerError::AllTrialsFailed(4))));
    }

    #[test]
    fn test_empty_space_is_an_error() {
        let tuner = Tuner::new(SearchSpace::new(), 4).verbose(false);
        let res = tuner.run(|_| -> Result<f64, TunerError> { Ok(0.0) });
        assert!(matches!(res, Err(TunerError::EmptySpace)));
    }

    #[test]
    fn test_log_scale_range_stays_in_bounds() {
        let mut space = SearchSpace::new();
        space.add_float_range("lr", 1e-5, 1e-1, true);
        let tuner = Tuner::new(space, 20).verbose(false);
        tuner
            .run(|p| -> Result<f64, TunerError> {
                let lr = p.get_float("lr")?;
                assert!((1e-5..=1e-1).contains(&lr));
                Ok(lr)
            })
            .unwrap();
    }

    #[test]
    fn test_top_n_sorted() {
        let mut space = SearchSpace::new();
        space.add_int_range("x", 0, 100);
        let tuner = Tuner::new(space, 15).seed(Seed::new(2)).verbose(false);
        let result = tuner
            .run(|p| -> Result<f64, TunerError> { Ok(p.get_int("x")? as f64) })
            .unwrap();
        let top = result.top_n(3);
        assert_eq!(top.len(), 3);
        assert!(top[0].loss <= top[1].loss);
        assert!(top[1].loss <= top[2].loss);
    }
}
