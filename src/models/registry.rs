//! Named model set.
//!
//! Which algorithms run, and with which hyperparameters, is configuration.
//! Callers can also register their own [`Regressor`] constructors. The
//! registry only turns entries into fresh, independently stateful handles;
//! every call to [`ModelRegistry::build`] returns new instances.

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use super::{
    BoostingConfig, DecisionTree, ForestConfig, GradientBoosting, LinearConfig, LinearRegression,
    ModelHandle, RandomForest, Regressor, TreeConfig,
};
use crate::error::{ForecastError, ForecastResult};

/// Algorithm and hyperparameters for one model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ModelSpec {
    LinearRegression(LinearConfig),
    DecisionTree(TreeConfig),
    RandomForest(ForestConfig),
    GradientBoosting(BoostingConfig),
}

impl ModelSpec {
    /// Create an unfitted regressor for this spec.
    pub fn instantiate(&self) -> Box<dyn Regressor> {
        match self {
            ModelSpec::LinearRegression(c) => Box::new(LinearRegression::new(c.clone())),
            ModelSpec::DecisionTree(c) => Box::new(DecisionTree::new(c.clone())),
            ModelSpec::RandomForest(c) => Box::new(RandomForest::new(c.clone())),
            ModelSpec::GradientBoosting(c) => Box::new(GradientBoosting::new(c.clone())),
        }
    }
}

/// A model spec with its display name.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NamedModelSpec {
    pub name: String,
    #[serde(flatten)]
    pub spec: ModelSpec,
}

impl NamedModelSpec {
    pub fn new(name: impl Into<String>, spec: ModelSpec) -> Self {
        Self {
            name: name.into(),
            spec,
        }
    }
}

/// Creates a fresh, unfitted regressor.
pub type ModelFactory = Arc<dyn Fn() -> Box<dyn Regressor> + Send + Sync>;

/// Where a registered model comes from.
#[derive(Clone)]
pub enum ModelSource {
    /// Built-in algorithm described by configuration
    Spec(ModelSpec),
    /// Caller-supplied constructor
    Factory(ModelFactory),
}

impl fmt::Debug for ModelSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ModelSource::Spec(spec) => f.debug_tuple("Spec").field(spec).finish(),
            ModelSource::Factory(_) => f.write_str("Factory(..)"),
        }
    }
}

impl ModelSource {
    fn instantiate(&self) -> Box<dyn Regressor> {
        match self {
            ModelSource::Spec(spec) => spec.instantiate(),
            ModelSource::Factory(factory) => factory(),
        }
    }
}

/// One named model in the registry.
#[derive(Debug, Clone)]
pub struct RegisteredModel {
    pub name: String,
    pub source: ModelSource,
}

impl RegisteredModel {
    /// Configured settings, or `None` for a caller-supplied factory.
    pub fn spec(&self) -> Option<&ModelSpec> {
        match &self.source {
            ModelSource::Spec(spec) => Some(spec),
            ModelSource::Factory(_) => None,
        }
    }
}

/// Ordered collection of named models.
///
/// Models come either from configuration ([`ModelSpec`]) or from any
/// caller-supplied [`Regressor`] constructor via [`ModelRegistry::with_factory`].
#[derive(Debug, Clone)]
pub struct ModelRegistry {
    models: Vec<RegisteredModel>,
}

impl Default for ModelRegistry {
    fn default() -> Self {
        Self {
            models: default_model_specs()
                .into_iter()
                .map(RegisteredModel::from)
                .collect(),
        }
    }
}

impl From<NamedModelSpec> for RegisteredModel {
    fn from(named: NamedModelSpec) -> Self {
        Self {
            name: named.name,
            source: ModelSource::Spec(named.spec),
        }
    }
}

/// Default four-model ensemble.
pub fn default_model_specs() -> Vec<NamedModelSpec> {
    vec![
        NamedModelSpec::new(
            "Linear Regression",
            ModelSpec::LinearRegression(LinearConfig::default()),
        ),
        NamedModelSpec::new(
            "Random Forest",
            ModelSpec::RandomForest(ForestConfig::default()),
        ),
        NamedModelSpec::new(
            "Decision Tree",
            ModelSpec::DecisionTree(TreeConfig::default()),
        ),
        NamedModelSpec::new(
            "Gradient Boosting",
            ModelSpec::GradientBoosting(BoostingConfig::default()),
        ),
    ]
}

impl ModelRegistry {
    /// Create a registry from configured specs; names must be unique and
    /// the set non-empty.
    pub fn new(specs: Vec<NamedModelSpec>) -> ForecastResult<Self> {
        if specs.is_empty() {
            return Err(ForecastError::InvalidParameter(
                "model registry is empty".to_string(),
            ));
        }
        let mut registry = Self { models: Vec::new() };
        for spec in specs {
            registry.push(spec.into())?;
        }
        Ok(registry)
    }

    /// Registry holding a single caller-supplied model.
    pub fn from_factory<F>(name: impl Into<String>, factory: F) -> Self
    where
        F: Fn() -> Box<dyn Regressor> + Send + Sync + 'static,
    {
        Self {
            models: vec![RegisteredModel {
                name: name.into(),
                source: ModelSource::Factory(Arc::new(factory)),
            }],
        }
    }

    /// Add a caller-supplied model. `factory` is called once per training
    /// context and must return an unfitted regressor each time.
    pub fn with_factory<F>(mut self, name: impl Into<String>, factory: F) -> ForecastResult<Self>
    where
        F: Fn() -> Box<dyn Regressor> + Send + Sync + 'static,
    {
        self.push(RegisteredModel {
            name: name.into(),
            source: ModelSource::Factory(Arc::new(factory)),
        })?;
        Ok(self)
    }

    fn push(&mut self, model: RegisteredModel) -> ForecastResult<()> {
        if self.models.iter().any(|m| m.name == model.name) {
            return Err(ForecastError::InvalidParameter(format!(
                "duplicate model name: {}",
                model.name
            )));
        }
        self.models.push(model);
        Ok(())
    }

    pub fn models(&self) -> &[RegisteredModel] {
        &self.models
    }

    pub fn len(&self) -> usize {
        self.models.len()
    }

    pub fn is_empty(&self) -> bool {
        self.models.is_empty()
    }

    pub fn names(&self) -> Vec<&str> {
        self.models.iter().map(|m| m.name.as_str()).collect()
    }

    /// Fresh, unfitted handles in registration order.
    pub fn build(&self) -> Vec<ModelHandle> {
        self.models
            .iter()
            .map(|m| ModelHandle::new(m.name.clone(), m.source.instantiate()))
            .collect()
    }
}
