//! Built-in component catalog.
//!
//! A small set of example components covering every value category the
//! converter handles: plain transforms, models, composite pipelines, an
//! ensemble wrapping a base estimator, a parameter-search wrapper, a
//! cross-validator, frozen distributions, and metric functions.

use std::sync::Arc;

use indexmap::IndexMap;

use fl_types::{
    CrossValidatorLike, Estimator, FlResult, FlowError, FrozenDistribution, FunctionRef, HpValue,
    Version,
};

use crate::registry::ComponentRegistry;

/// The toolkit package all built-in components belong to.
pub const TOOLKIT_PACKAGE: &str = "mlcraft";

pub const STANDARDIZE: &str = "mlcraft.preprocess.Standardize";
pub const LOGISTIC_REGRESSION: &str = "mlcraft.linear.LogisticRegression";
pub const PIPELINE: &str = "mlcraft.compose.Pipeline";
pub const BOOSTING: &str = "mlcraft.ensemble.Boosting";
pub const RANDOMIZED_SEARCH: &str = "mlcraft.search.RandomizedSearch";
pub const K_FOLD: &str = "mlcraft.select.KFold";
pub const UNIFORM: &str = "mlcraft.random.Uniform";
pub const LOG_UNIFORM: &str = "mlcraft.random.LogUniform";
pub const RAND_INT: &str = "mlcraft.random.RandInt";
pub const ACCURACY: &str = "mlcraft.metrics.accuracy";
pub const MEAN_SQUARED_ERROR: &str = "mlcraft.metrics.mean_squared_error";

/// Register the full built-in catalog.
pub fn register_builtins(registry: &mut ComponentRegistry) {
    registry.register_package(TOOLKIT_PACKAGE, Version::from_segments(&[1, 2, 0]));
    registry.register_package("ndarray", Version::from_segments(&[0, 15, 6]));
    registry.register_package("rand", Version::from_segments(&[0, 8, 5]));

    registry.register_estimator(STANDARDIZE, standardize_ctor);
    registry.register_estimator(LOGISTIC_REGRESSION, logistic_regression_ctor);
    registry.register_estimator(PIPELINE, pipeline_ctor);
    registry.register_estimator(BOOSTING, boosting_ctor);
    registry.register_estimator(RANDOMIZED_SEARCH, randomized_search_ctor);

    registry.register_cross_validator(K_FOLD, k_fold_ctor);

    registry.register_distribution(UNIFORM);
    registry.register_distribution(LOG_UNIFORM);
    registry.register_distribution(RAND_INT);

    registry.register_function(ACCURACY, accuracy);
    registry.register_function(MEAN_SQUARED_ERROR, mean_squared_error);
}

// ---------------------------------------------------------------------------
// Transforms and models
// ---------------------------------------------------------------------------

/// Feature standardization (zero mean, unit variance).
#[derive(Debug, Clone)]
pub struct Standardize {
    pub with_mean: bool,
    pub with_std: bool,
}

impl Default for Standardize {
    fn default() -> Self {
        Self {
            with_mean: true,
            with_std: true,
        }
    }
}

impl Estimator for Standardize {
    fn identity(&self) -> &str {
        STANDARDIZE
    }

    fn params(&self) -> IndexMap<String, HpValue> {
        IndexMap::from([
            ("with_mean".to_string(), HpValue::Bool(self.with_mean)),
            ("with_std".to_string(), HpValue::Bool(self.with_std)),
        ])
    }
}

fn standardize_ctor(mut params: IndexMap<String, HpValue>) -> FlResult<Box<dyn Estimator>> {
    let model = Standardize {
        with_mean: take_bool(&mut params, "with_mean", true)?,
        with_std: take_bool(&mut params, "with_std", true)?,
    };
    ensure_consumed(params, STANDARDIZE)?;
    Ok(Box::new(model))
}

/// Regularized logistic regression classifier.
#[derive(Debug, Clone)]
pub struct LogisticRegression {
    pub penalty: Option<String>,
    pub c: f64,
    pub tol: f64,
    pub max_iter: i64,
    pub seed: Option<i64>,
}

impl Default for LogisticRegression {
    fn default() -> Self {
        Self {
            penalty: Some("l2".to_string()),
            c: 1.0,
            tol: 1e-4,
            max_iter: 100,
            seed: None,
        }
    }
}

impl Estimator for LogisticRegression {
    fn identity(&self) -> &str {
        LOGISTIC_REGRESSION
    }

    fn params(&self) -> IndexMap<String, HpValue> {
        IndexMap::from([
            ("penalty".to_string(), opt_str(&self.penalty)),
            ("c".to_string(), HpValue::Float(self.c)),
            ("tol".to_string(), HpValue::Float(self.tol)),
            ("max_iter".to_string(), HpValue::Int(self.max_iter)),
            ("seed".to_string(), opt_int(self.seed)),
        ])
    }
}

fn logistic_regression_ctor(
    mut params: IndexMap<String, HpValue>,
) -> FlResult<Box<dyn Estimator>> {
    let defaults = LogisticRegression::default();
    let model = LogisticRegression {
        penalty: take_opt_string(&mut params, "penalty")?,
        c: take_f64(&mut params, "c", defaults.c)?,
        tol: take_f64(&mut params, "tol", defaults.tol)?,
        max_iter: take_i64(&mut params, "max_iter", defaults.max_iter)?,
        seed: take_opt_i64(&mut params, "seed")?,
    };
    ensure_consumed(params, LOGISTIC_REGRESSION)?;
    Ok(Box::new(model))
}

/// A linear sequence of named steps; a `None` step is a legal skip marker.
#[derive(Debug, Clone, Default)]
pub struct Pipeline {
    pub steps: Vec<(String, Option<Arc<dyn Estimator>>)>,
}

impl Pipeline {
    pub fn new(steps: Vec<(String, Option<Arc<dyn Estimator>>)>) -> Self {
        Self { steps }
    }
}

impl Estimator for Pipeline {
    fn identity(&self) -> &str {
        PIPELINE
    }

    fn params(&self) -> IndexMap<String, HpValue> {
        let steps = self
            .steps
            .iter()
            .map(|(name, step)| {
                let step_value = match step {
                    Some(est) => HpValue::Estimator(est.clone()),
                    None => HpValue::Null,
                };
                HpValue::Tuple(vec![HpValue::str(name.clone()), step_value])
            })
            .collect();
        IndexMap::from([("steps".to_string(), HpValue::List(steps))])
    }
}

fn pipeline_ctor(mut params: IndexMap<String, HpValue>) -> FlResult<Box<dyn Estimator>> {
    let steps = take_steps(&mut params, "steps")?;
    ensure_consumed(params, PIPELINE)?;
    Ok(Box::new(Pipeline { steps }))
}

/// Boosting ensemble over a base estimator.
#[derive(Debug, Clone)]
pub struct Boosting {
    pub base_estimator: Option<Arc<dyn Estimator>>,
    pub n_rounds: i64,
    pub learning_rate: f64,
    pub seed: Option<i64>,
}

impl Default for Boosting {
    fn default() -> Self {
        Self {
            base_estimator: None,
            n_rounds: 50,
            learning_rate: 1.0,
            seed: None,
        }
    }
}

impl Estimator for Boosting {
    fn identity(&self) -> &str {
        BOOSTING
    }

    fn params(&self) -> IndexMap<String, HpValue> {
        IndexMap::from([
            ("base_estimator".to_string(), opt_estimator(&self.base_estimator)),
            ("n_rounds".to_string(), HpValue::Int(self.n_rounds)),
            ("learning_rate".to_string(), HpValue::Float(self.learning_rate)),
            ("seed".to_string(), opt_int(self.seed)),
        ])
    }
}

fn boosting_ctor(mut params: IndexMap<String, HpValue>) -> FlResult<Box<dyn Estimator>> {
    let defaults = Boosting::default();
    let model = Boosting {
        base_estimator: take_opt_estimator(&mut params, "base_estimator")?,
        n_rounds: take_i64(&mut params, "n_rounds", defaults.n_rounds)?,
        learning_rate: take_f64(&mut params, "learning_rate", defaults.learning_rate)?,
        seed: take_opt_i64(&mut params, "seed")?,
    };
    ensure_consumed(params, BOOSTING)?;
    Ok(Box::new(model))
}

/// Randomized hyperparameter search over a wrapped estimator.
#[derive(Debug, Clone)]
pub struct RandomizedSearch {
    pub estimator: Option<Arc<dyn Estimator>>,
    pub param_distributions: IndexMap<String, HpValue>,
    pub n_iter: i64,
    pub scoring: Option<FunctionRef>,
    pub cv: Option<Arc<dyn CrossValidatorLike>>,
    pub n_workers: i64,
    pub seed: Option<i64>,
}

impl Default for RandomizedSearch {
    fn default() -> Self {
        Self {
            estimator: None,
            param_distributions: IndexMap::new(),
            n_iter: 10,
            scoring: None,
            cv: None,
            n_workers: 1,
            seed: None,
        }
    }
}

impl Estimator for RandomizedSearch {
    fn identity(&self) -> &str {
        RANDOMIZED_SEARCH
    }

    fn params(&self) -> IndexMap<String, HpValue> {
        let scoring = match &self.scoring {
            Some(function) => HpValue::Function(function.clone()),
            None => HpValue::Null,
        };
        let cv = match &self.cv {
            Some(cv) => HpValue::CrossValidator(cv.clone()),
            None => HpValue::Null,
        };
        IndexMap::from([
            ("estimator".to_string(), opt_estimator(&self.estimator)),
            (
                "param_distributions".to_string(),
                HpValue::Map(self.param_distributions.clone()),
            ),
            ("n_iter".to_string(), HpValue::Int(self.n_iter)),
            ("scoring".to_string(), scoring),
            ("cv".to_string(), cv),
            ("n_workers".to_string(), HpValue::Int(self.n_workers)),
            ("seed".to_string(), opt_int(self.seed)),
        ])
    }
}

fn randomized_search_ctor(
    mut params: IndexMap<String, HpValue>,
) -> FlResult<Box<dyn Estimator>> {
    let defaults = RandomizedSearch::default();
    let model = RandomizedSearch {
        estimator: take_opt_estimator(&mut params, "estimator")?,
        param_distributions: take_map(&mut params, "param_distributions")?,
        n_iter: take_i64(&mut params, "n_iter", defaults.n_iter)?,
        scoring: take_opt_function(&mut params, "scoring")?,
        cv: take_opt_cross_validator(&mut params, "cv")?,
        n_workers: take_i64(&mut params, "n_workers", defaults.n_workers)?,
        seed: take_opt_i64(&mut params, "seed")?,
    };
    ensure_consumed(params, RANDOMIZED_SEARCH)?;
    Ok(Box::new(model))
}

// ---------------------------------------------------------------------------
// Cross-validators
// ---------------------------------------------------------------------------

/// K-fold splitter. `folds` is a deprecated alias of `n_splits` and is
/// excluded from serialization.
#[derive(Debug, Clone)]
pub struct KFold {
    pub n_splits: i64,
    pub shuffle: bool,
    pub seed: Option<i64>,
}

impl Default for KFold {
    fn default() -> Self {
        Self {
            n_splits: 5,
            shuffle: false,
            seed: None,
        }
    }
}

impl CrossValidatorLike for KFold {
    fn identity(&self) -> &str {
        K_FOLD
    }

    fn param_names(&self) -> Vec<String> {
        vec![
            "folds".to_string(),
            "n_splits".to_string(),
            "seed".to_string(),
            "shuffle".to_string(),
        ]
    }

    fn attribute(&self, name: &str) -> Option<HpValue> {
        match name {
            "n_splits" | "folds" => Some(HpValue::Int(self.n_splits)),
            "shuffle" => Some(HpValue::Bool(self.shuffle)),
            "seed" => Some(opt_int(self.seed)),
            _ => None,
        }
    }

    fn deprecated_params(&self) -> &'static [&'static str] {
        &["folds"]
    }
}

fn k_fold_ctor(mut params: IndexMap<String, HpValue>) -> FlResult<Box<dyn CrossValidatorLike>> {
    let defaults = KFold::default();
    let cv = KFold {
        n_splits: take_i64(&mut params, "n_splits", defaults.n_splits)?,
        shuffle: take_bool(&mut params, "shuffle", defaults.shuffle)?,
        seed: take_opt_i64(&mut params, "seed")?,
    };
    ensure_consumed(params, K_FOLD)?;
    Ok(Box::new(cv))
}

// ---------------------------------------------------------------------------
// Distributions and metrics
// ---------------------------------------------------------------------------

/// Continuous uniform distribution over `[low, high]`.
pub fn uniform(low: f64, high: f64) -> FrozenDistribution {
    FrozenDistribution {
        identity: UNIFORM.to_string(),
        lower: low,
        upper: high,
        args: vec![low, high],
        kwargs: IndexMap::new(),
    }
}

/// Log-uniform distribution over `[low, high]`, `low > 0`.
pub fn log_uniform(low: f64, high: f64) -> FrozenDistribution {
    FrozenDistribution {
        identity: LOG_UNIFORM.to_string(),
        lower: low,
        upper: high,
        args: vec![low, high],
        kwargs: IndexMap::new(),
    }
}

/// Integer uniform distribution over `[low, high)`.
pub fn rand_int(low: i64, high: i64) -> FrozenDistribution {
    FrozenDistribution {
        identity: RAND_INT.to_string(),
        lower: low as f64,
        upper: high as f64,
        args: vec![low as f64, high as f64],
        kwargs: IndexMap::new(),
    }
}

/// Fraction of exactly matching predictions.
pub fn accuracy(truth: &[f64], predicted: &[f64]) -> f64 {
    if truth.is_empty() || truth.len() != predicted.len() {
        return 0.0;
    }
    let hits = truth
        .iter()
        .zip(predicted)
        .filter(|(a, b)| a == b)
        .count();
    hits as f64 / truth.len() as f64
}

/// Mean squared prediction error.
pub fn mean_squared_error(truth: &[f64], predicted: &[f64]) -> f64 {
    if truth.is_empty() || truth.len() != predicted.len() {
        return f64::INFINITY;
    }
    let sum: f64 = truth
        .iter()
        .zip(predicted)
        .map(|(a, b)| (a - b) * (a - b))
        .sum();
    sum / truth.len() as f64
}

// ---------------------------------------------------------------------------
// Constructor parameter extraction
// ---------------------------------------------------------------------------

fn opt_str(value: &Option<String>) -> HpValue {
    match value {
        Some(s) => HpValue::str(s.clone()),
        None => HpValue::Null,
    }
}

fn opt_int(value: Option<i64>) -> HpValue {
    match value {
        Some(v) => HpValue::Int(v),
        None => HpValue::Null,
    }
}

fn opt_estimator(value: &Option<Arc<dyn Estimator>>) -> HpValue {
    match value {
        Some(est) => HpValue::Estimator(est.clone()),
        None => HpValue::Null,
    }
}

fn unexpected(key: &str, value: &HpValue) -> FlowError {
    FlowError::Unsupported {
        value: format!("{key}={value:?}"),
        kind: value.kind(),
    }
}

fn ensure_consumed(params: IndexMap<String, HpValue>, identity: &str) -> FlResult<()> {
    if let Some(key) = params.keys().next() {
        return Err(FlowError::Unsupported {
            value: format!("{identity} has no parameter {key}"),
            kind: "parameter",
        }
        .into());
    }
    Ok(())
}

fn take_bool(params: &mut IndexMap<String, HpValue>, key: &str, default: bool) -> FlResult<bool> {
    match params.swap_remove(key) {
        None | Some(HpValue::Null) => Ok(default),
        Some(HpValue::Bool(b)) => Ok(b),
        Some(other) => Err(unexpected(key, &other).into()),
    }
}

fn take_i64(params: &mut IndexMap<String, HpValue>, key: &str, default: i64) -> FlResult<i64> {
    match params.swap_remove(key) {
        None | Some(HpValue::Null) => Ok(default),
        Some(HpValue::Int(v)) => Ok(v),
        Some(other) => Err(unexpected(key, &other).into()),
    }
}

fn take_opt_i64(params: &mut IndexMap<String, HpValue>, key: &str) -> FlResult<Option<i64>> {
    match params.swap_remove(key) {
        None | Some(HpValue::Null) => Ok(None),
        Some(HpValue::Int(v)) => Ok(Some(v)),
        Some(other) => Err(unexpected(key, &other).into()),
    }
}

fn take_f64(params: &mut IndexMap<String, HpValue>, key: &str, default: f64) -> FlResult<f64> {
    match params.swap_remove(key) {
        None | Some(HpValue::Null) => Ok(default),
        Some(HpValue::Float(v)) => Ok(v),
        Some(HpValue::Int(v)) => Ok(v as f64),
        Some(other) => Err(unexpected(key, &other).into()),
    }
}

fn take_opt_string(
    params: &mut IndexMap<String, HpValue>,
    key: &str,
) -> FlResult<Option<String>> {
    match params.swap_remove(key) {
        None | Some(HpValue::Null) => Ok(None),
        Some(HpValue::Str(s)) => Ok(Some(s)),
        Some(other) => Err(unexpected(key, &other).into()),
    }
}

fn take_opt_estimator(
    params: &mut IndexMap<String, HpValue>,
    key: &str,
) -> FlResult<Option<Arc<dyn Estimator>>> {
    match params.swap_remove(key) {
        None | Some(HpValue::Null) => Ok(None),
        Some(HpValue::Estimator(est)) => Ok(Some(est)),
        Some(other) => Err(unexpected(key, &other).into()),
    }
}

fn take_opt_cross_validator(
    params: &mut IndexMap<String, HpValue>,
    key: &str,
) -> FlResult<Option<Arc<dyn CrossValidatorLike>>> {
    match params.swap_remove(key) {
        None | Some(HpValue::Null) => Ok(None),
        Some(HpValue::CrossValidator(cv)) => Ok(Some(cv)),
        Some(other) => Err(unexpected(key, &other).into()),
    }
}

fn take_opt_function(
    params: &mut IndexMap<String, HpValue>,
    key: &str,
) -> FlResult<Option<FunctionRef>> {
    match params.swap_remove(key) {
        None | Some(HpValue::Null) => Ok(None),
        Some(HpValue::Function(f)) => Ok(Some(f)),
        Some(other) => Err(unexpected(key, &other).into()),
    }
}

fn take_map(
    params: &mut IndexMap<String, HpValue>,
    key: &str,
) -> FlResult<IndexMap<String, HpValue>> {
    match params.swap_remove(key) {
        None | Some(HpValue::Null) => Ok(IndexMap::new()),
        Some(HpValue::Map(map)) => Ok(map),
        Some(other) => Err(unexpected(key, &other).into()),
    }
}

fn take_steps(
    params: &mut IndexMap<String, HpValue>,
    key: &str,
) -> FlResult<Vec<(String, Option<Arc<dyn Estimator>>)>> {
    let raw = match params.swap_remove(key) {
        None | Some(HpValue::Null) => return Ok(Vec::new()),
        Some(HpValue::List(items)) | Some(HpValue::Tuple(items)) => items,
        Some(other) => return Err(unexpected(key, &other).into()),
    };
    let mut steps = Vec::with_capacity(raw.len());
    for entry in raw {
        let pair = match entry {
            HpValue::List(pair) | HpValue::Tuple(pair) if pair.len() == 2 => pair,
            other => return Err(unexpected(key, &other).into()),
        };
        let mut pair = pair.into_iter();
        let name = match pair.next() {
            Some(HpValue::Str(name)) => name,
            other => {
                return Err(unexpected(key, &other.unwrap_or(HpValue::Null)).into());
            }
        };
        let step = match pair.next() {
            Some(HpValue::Estimator(est)) => Some(est),
            Some(HpValue::Null) => None,
            other => {
                return Err(unexpected(key, &other.unwrap_or(HpValue::Null)).into());
            }
        };
        steps.push((name, step));
    }
    Ok(steps)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ctor_round_trips_shallow_params() {
        let model = LogisticRegression {
            penalty: None,
            c: 0.5,
            tol: 1e-3,
            max_iter: 250,
            seed: Some(7),
        };
        let rebuilt = logistic_regression_ctor(model.params()).unwrap();

        assert_eq!(rebuilt.identity(), LOGISTIC_REGRESSION);
        assert_eq!(rebuilt.params(), model.params());
    }

    #[test]
    fn ctor_rejects_unknown_parameter() {
        let mut params = IndexMap::new();
        params.insert("with_variance".to_string(), HpValue::Bool(true));

        assert!(standardize_ctor(params).is_err());
    }

    #[test]
    fn ctor_rejects_mistyped_parameter() {
        let mut params = IndexMap::new();
        params.insert("with_mean".to_string(), HpValue::Int(1));

        assert!(standardize_ctor(params).is_err());
    }

    #[test]
    fn pipeline_params_expose_steps_as_pairs() {
        let pipeline = Pipeline::new(vec![
            ("scale".to_string(), Some(Arc::new(Standardize::default()) as _)),
            ("skip".to_string(), None),
        ]);

        let params = pipeline.params();
        let steps = match params.get("steps") {
            Some(HpValue::List(steps)) => steps,
            other => panic!("expected steps list, got {other:?}"),
        };
        assert_eq!(steps.len(), 2);
        match &steps[1] {
            HpValue::Tuple(pair) => {
                assert_eq!(pair[0], HpValue::str("skip"));
                assert_eq!(pair[1], HpValue::Null);
            }
            other => panic!("expected pair, got {other:?}"),
        }
    }

    #[test]
    fn k_fold_hides_deprecated_alias() {
        let cv = KFold::default();
        assert!(cv.param_names().contains(&"folds".to_string()));
        assert!(cv.deprecated_params().contains(&"folds"));
        assert_eq!(cv.attribute("folds"), Some(HpValue::Int(5)));
    }

    #[test]
    fn metric_functions() {
        assert_eq!(accuracy(&[1.0, 0.0, 1.0], &[1.0, 1.0, 1.0]), 2.0 / 3.0);
        assert_eq!(mean_squared_error(&[1.0, 2.0], &[1.0, 4.0]), 2.0);
        assert_eq!(accuracy(&[], &[]), 0.0);
    }
}
