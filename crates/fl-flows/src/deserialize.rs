//! Inverse conversion: portable flows back to live hyperparameter values.
//!
//! Identity resolution is tolerant: an unknown estimator, cross-validator,
//! distribution, or function identity logs a warning and substitutes a null
//! leaf, so metadata-only consumers still get a usable tree. Dependency
//! mismatches, unknown envelope kinds, and unresolvable component references
//! are hard failures.

use std::sync::Arc;

use indexmap::IndexMap;
use serde_json::Value;
use tracing::warn;

use fl_types::{
    ComponentTable, DependencyConstraint, FlResult, Flow, FlowError, FrozenDistribution,
    FunctionRef, HpValue, Portable, ScalarType,
};

use crate::envelope::{
    DISC_COMPONENT_REFERENCE, DISC_CV_OBJECT, DISC_FUNCTION, DISC_RV_FROZEN, DISC_TYPE,
    SERIALIZED_OBJECT_KEY, VALUE_KEY,
};
use crate::serialize::FlowConverter;

impl FlowConverter<'_> {
    /// Reconstruct a hyperparameter value from its portable form.
    ///
    /// `components` is the side-table consumed by component references; each
    /// resolved entry is removed, so a table must not be shared between two
    /// reconstruction passes.
    pub fn flow_to_model(
        &self,
        value: &Portable,
        mut components: Option<&mut ComponentTable>,
    ) -> FlResult<HpValue> {
        self.reconstruct(value, components.as_deref_mut())
    }

    fn reconstruct(
        &self,
        value: &Portable,
        mut table: Option<&mut ComponentTable>,
    ) -> FlResult<HpValue> {
        match value {
            Portable::Json(json) => self.reconstruct_json(json, table),
            Portable::List(items) => Ok(HpValue::List(
                items
                    .iter()
                    .map(|item| self.reconstruct(item, table.as_deref_mut()))
                    .collect::<FlResult<_>>()?,
            )),
            Portable::Tuple(items) => Ok(HpValue::Tuple(
                items
                    .iter()
                    .map(|item| self.reconstruct(item, table.as_deref_mut()))
                    .collect::<FlResult<_>>()?,
            )),
            Portable::Map(map) => {
                let mut keys: Vec<&String> = map.keys().collect();
                keys.sort();
                let mut out = IndexMap::with_capacity(map.len());
                for key in keys {
                    out.insert(key.clone(), self.reconstruct(&map[key], table.as_deref_mut())?);
                }
                Ok(HpValue::Map(out))
            }
            Portable::Flow(flow) => self.reconstruct_model(flow),
        }
    }

    fn reconstruct_json(
        &self,
        json: &Value,
        mut table: Option<&mut ComponentTable>,
    ) -> FlResult<HpValue> {
        match json {
            // Parameter values travel as JSON-encoded strings; a string that
            // does not parse is taken verbatim.
            Value::String(encoded) => match serde_json::from_str::<Value>(encoded) {
                Ok(Value::String(inner)) => Ok(HpValue::Str(inner)),
                Ok(parsed) => self.reconstruct_json(&parsed, table),
                Err(_) => Ok(HpValue::Str(encoded.clone())),
            },
            Value::Null => Ok(HpValue::Null),
            Value::Bool(b) => Ok(HpValue::Bool(*b)),
            Value::Number(n) => match n.as_i64() {
                Some(i) => Ok(HpValue::Int(i)),
                None => Ok(HpValue::Float(n.as_f64().unwrap_or(f64::NAN))),
            },
            Value::Array(items) => Ok(HpValue::List(
                items
                    .iter()
                    .map(|item| self.reconstruct_json(item, table.as_deref_mut()))
                    .collect::<FlResult<_>>()?,
            )),
            Value::Object(object) => {
                if object.contains_key(SERIALIZED_OBJECT_KEY) {
                    return self.reconstruct_envelope(object, table);
                }
                // plain mapping, re-sorted by key for determinism
                let mut keys: Vec<&String> = object.keys().collect();
                keys.sort();
                let mut out = IndexMap::with_capacity(object.len());
                for key in keys {
                    out.insert(
                        key.clone(),
                        self.reconstruct_json(&object[key], table.as_deref_mut())?,
                    );
                }
                Ok(HpValue::Map(out))
            }
        }
    }

    fn reconstruct_envelope(
        &self,
        object: &serde_json::Map<String, Value>,
        table: Option<&mut ComponentTable>,
    ) -> FlResult<HpValue> {
        let kind = object
            .get(SERIALIZED_OBJECT_KEY)
            .and_then(Value::as_str)
            .ok_or_else(|| {
                FlowError::MalformedEnvelope("discriminator must be a string".to_string())
            })?;
        let value = object.get(VALUE_KEY).ok_or_else(|| {
            FlowError::MalformedEnvelope(format!("missing payload for {kind}"))
        })?;

        match kind {
            DISC_TYPE => self.reconstruct_type(value),
            DISC_RV_FROZEN => self.reconstruct_distribution(value),
            DISC_FUNCTION => self.reconstruct_function(value),
            DISC_CV_OBJECT => self.reconstruct_cross_validator(value),
            DISC_COMPONENT_REFERENCE => self.reconstruct_component_reference(value, table),
            other => Err(FlowError::UnknownDiscriminator(other.to_string()).into()),
        }
    }

    fn reconstruct_type(&self, value: &Value) -> FlResult<HpValue> {
        let symbol = value.as_str().ok_or_else(|| {
            FlowError::MalformedEnvelope("type payload must be a string".to_string())
        })?;
        match ScalarType::from_symbol(symbol) {
            Some(ty) => Ok(HpValue::Type(ty)),
            None => {
                warn!("Cannot resolve type symbol {} for flow.", symbol);
                Ok(HpValue::Null)
            }
        }
    }

    fn reconstruct_distribution(&self, value: &Value) -> FlResult<HpValue> {
        let dist: FrozenDistribution = serde_json::from_value(value.clone()).map_err(|e| {
            FlowError::MalformedEnvelope(format!("invalid frozen distribution: {e}"))
        })?;
        if self.registry().has_distribution(&dist.identity) {
            Ok(HpValue::Distribution(dist))
        } else {
            warn!("Cannot resolve distribution {} for flow.", dist.identity);
            Ok(HpValue::Null)
        }
    }

    fn reconstruct_function(&self, value: &Value) -> FlResult<HpValue> {
        let identity = value.as_str().ok_or_else(|| {
            FlowError::MalformedEnvelope("function payload must be a string".to_string())
        })?;
        if self.registry().function(identity).is_some() {
            Ok(HpValue::Function(FunctionRef::new(identity)))
        } else {
            warn!("Cannot resolve function {} for flow.", identity);
            Ok(HpValue::Null)
        }
    }

    fn reconstruct_cross_validator(&self, value: &Value) -> FlResult<HpValue> {
        let object = value.as_object().ok_or_else(|| {
            FlowError::MalformedEnvelope("cross-validator payload must be an object".to_string())
        })?;
        let identity = object.get("name").and_then(Value::as_str).ok_or_else(|| {
            FlowError::MalformedEnvelope("cross-validator payload misses name".to_string())
        })?;
        let raw_params = object
            .get("parameters")
            .and_then(Value::as_object)
            .ok_or_else(|| {
                FlowError::MalformedEnvelope(
                    "cross-validator payload misses parameters".to_string(),
                )
            })?;

        let ctor = match self.registry().cross_validator_ctor(identity) {
            Some(ctor) => ctor,
            None => {
                warn!("Cannot create cross-validator {} for flow.", identity);
                return Ok(HpValue::Null);
            }
        };

        let mut params = IndexMap::with_capacity(raw_params.len());
        for (name, raw) in raw_params {
            params.insert(name.clone(), self.reconstruct_json(raw, None)?);
        }
        let cv = ctor(params)?;
        Ok(HpValue::CrossValidator(Arc::from(cv)))
    }

    fn reconstruct_component_reference(
        &self,
        value: &Value,
        table: Option<&mut ComponentTable>,
    ) -> FlResult<HpValue> {
        let object = value.as_object().ok_or_else(|| {
            FlowError::MalformedEnvelope("component reference must be an object".to_string())
        })?;
        let key = object.get("key").and_then(Value::as_str).ok_or_else(|| {
            FlowError::MalformedEnvelope("component reference misses key".to_string())
        })?;
        let step_name = match object.get("step_name") {
            None | Some(Value::Null) => None,
            Some(Value::String(step_name)) => Some(step_name.clone()),
            Some(_) => {
                return Err(FlowError::MalformedEnvelope(
                    "step_name must be a string or null".to_string(),
                )
                .into())
            }
        };

        let table = table.ok_or_else(|| FlowError::MissingComponentTable {
            key: key.to_string(),
        })?;
        // each named component is consumable exactly once per pass
        let flow = table
            .shift_remove(key)
            .ok_or_else(|| FlowError::MissingComponent {
                key: key.to_string(),
            })?;
        let component = self.reconstruct(&Portable::Flow(Box::new(flow)), None)?;

        Ok(match step_name {
            None => component,
            Some(step_name) => HpValue::Tuple(vec![HpValue::Str(step_name), component]),
        })
    }

    fn reconstruct_model(&self, flow: &Flow) -> FlResult<HpValue> {
        self.check_dependencies(&flow.dependencies)?;

        // Work on a consumable copy so the flow itself stays untouched.
        let mut remaining: ComponentTable = flow.components.clone();
        let mut parameter_dict: IndexMap<String, HpValue> = IndexMap::new();

        for (name, value) in &flow.parameters {
            let rval = match value {
                None => HpValue::Null,
                Some(encoded) => self.reconstruct_json(
                    &Value::String(encoded.clone()),
                    Some(&mut remaining),
                )?,
            };
            parameter_dict.insert(name.clone(), rval);
        }

        // Components referenced only implicitly (not consumed through a
        // parameter) are reconstructed under their own key.
        for (name, component) in &flow.components {
            if parameter_dict.contains_key(name) {
                continue;
            }
            if !remaining.contains_key(name) {
                continue;
            }
            let rval = self.reconstruct(&Portable::Flow(Box::new(component.clone())), None)?;
            parameter_dict.insert(name.clone(), rval);
        }

        let ctor = match self.registry().estimator_ctor(&flow.class_identity) {
            Some(ctor) => ctor,
            None => {
                warn!("Cannot create model {} for flow.", flow.class_identity);
                return Ok(HpValue::Null);
            }
        };
        let model = ctor(parameter_dict)?;
        Ok(HpValue::Estimator(Arc::from(model)))
    }

    /// Verify every declared dependency constraint against the resolvable
    /// package versions; any unmet constraint blocks reconstruction.
    fn check_dependencies(&self, dependencies: &str) -> FlResult<()> {
        for line in dependencies.lines().map(str::trim).filter(|l| !l.is_empty()) {
            let constraint: DependencyConstraint = line.parse()?;
            let installed = self
                .registry()
                .package_version(&constraint.package)
                .ok_or_else(|| FlowError::UnknownDependency {
                    package: constraint.package.clone(),
                })?;
            if !constraint.is_satisfied_by(installed) {
                return Err(FlowError::DependencyMismatch {
                    constraint: line.to_string(),
                    installed: installed.to_string(),
                }
                .into());
            }
        }
        Ok(())
    }
}
