//! # fl-model
//!
//! The seam between FlowLog and the estimator toolkit: the component
//! registry resolving fully-qualified identities to constructors, a built-in
//! catalog of example components, deep parameter inspection, and sampling of
//! frozen distributions.

pub mod catalog;
pub mod inspect;
pub mod registry;
pub mod sampling;

pub use catalog::{
    accuracy, log_uniform, mean_squared_error, rand_int, uniform, Boosting, KFold,
    LogisticRegression, Pipeline, RandomizedSearch, Standardize,
};
pub use inspect::{flatten_params, uses_single_worker};
pub use registry::{
    default_registry, ComponentRegistry, CrossValidatorCtor, EstimatorCtor, MetricFn,
    BASELINE_DEPENDENCIES,
};
pub use sampling::SampleDistribution;
