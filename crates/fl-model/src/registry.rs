//! Component registry: identity strings to constructors, plus the package
//! catalog used for provenance and dependency checking.

use std::collections::{HashMap, HashSet};

use indexmap::IndexMap;
use once_cell::sync::Lazy;

use fl_types::{
    format_external_version, CrossValidatorLike, Estimator, FlResult, HpValue, Version,
};

use crate::catalog;

/// Constructor for a registered estimator type.
pub type EstimatorCtor = fn(IndexMap<String, HpValue>) -> FlResult<Box<dyn Estimator>>;

/// Constructor for a registered cross-validator type.
pub type CrossValidatorCtor = fn(IndexMap<String, HpValue>) -> FlResult<Box<dyn CrossValidatorLike>>;

/// Signature shared by registered metric functions.
pub type MetricFn = fn(&[f64], &[f64]) -> f64;

/// Baseline constraints attached to every serialized flow, in addition to
/// the toolkit's own pinned version.
pub const BASELINE_DEPENDENCIES: [&str; 2] = ["ndarray>=0.15", "rand>=0.8"];

/// Maps fully-qualified identities to constructors and packages to installed
/// versions. Populated at startup; read-only afterwards.
#[derive(Default)]
pub struct ComponentRegistry {
    toolkit: String,
    estimators: HashMap<String, EstimatorCtor>,
    cross_validators: HashMap<String, CrossValidatorCtor>,
    distributions: HashSet<String>,
    functions: HashMap<String, MetricFn>,
    packages: HashMap<String, Version>,
}

impl ComponentRegistry {
    /// An empty registry for the given toolkit package.
    pub fn new(toolkit: impl Into<String>) -> Self {
        Self {
            toolkit: toolkit.into(),
            ..Self::default()
        }
    }

    /// A registry seeded with the built-in component catalog.
    pub fn with_builtins() -> Self {
        let mut registry = Self::new(catalog::TOOLKIT_PACKAGE);
        catalog::register_builtins(&mut registry);
        registry
    }

    pub fn register_estimator(&mut self, identity: impl Into<String>, ctor: EstimatorCtor) {
        self.estimators.insert(identity.into(), ctor);
    }

    pub fn register_cross_validator(
        &mut self,
        identity: impl Into<String>,
        ctor: CrossValidatorCtor,
    ) {
        self.cross_validators.insert(identity.into(), ctor);
    }

    pub fn register_distribution(&mut self, identity: impl Into<String>) {
        self.distributions.insert(identity.into());
    }

    pub fn register_function(&mut self, identity: impl Into<String>, function: MetricFn) {
        self.functions.insert(identity.into(), function);
    }

    pub fn register_package(&mut self, package: impl Into<String>, version: Version) {
        self.packages.insert(package.into(), version);
    }

    pub fn estimator_ctor(&self, identity: &str) -> Option<EstimatorCtor> {
        self.estimators.get(identity).copied()
    }

    pub fn cross_validator_ctor(&self, identity: &str) -> Option<CrossValidatorCtor> {
        self.cross_validators.get(identity).copied()
    }

    pub fn has_distribution(&self, identity: &str) -> bool {
        self.distributions.contains(identity)
    }

    pub fn function(&self, identity: &str) -> Option<MetricFn> {
        self.functions.get(identity).copied()
    }

    pub fn package_version(&self, package: &str) -> Option<&Version> {
        self.packages.get(package)
    }

    /// The toolkit package that defines the registered components.
    pub fn toolkit(&self) -> &str {
        &self.toolkit
    }

    /// Newline-joined dependency lines recorded on every serialized flow:
    /// the toolkit pinned to its installed version, then the baselines.
    pub fn baseline_dependencies(&self) -> String {
        let mut lines = Vec::with_capacity(1 + BASELINE_DEPENDENCIES.len());
        if let Some(version) = self.packages.get(&self.toolkit) {
            lines.push(format_external_version(&self.toolkit, version));
        }
        lines.extend(BASELINE_DEPENDENCIES.iter().map(|line| line.to_string()));
        lines.join("\n")
    }
}

/// The process-wide registry backing the free-function entry points.
pub fn default_registry() -> &'static ComponentRegistry {
    static DEFAULT: Lazy<ComponentRegistry> = Lazy::new(ComponentRegistry::with_builtins);
    &DEFAULT
}
