//! Forward conversion: live hyperparameter values to portable flows.

use std::collections::{BTreeSet, HashSet};

use indexmap::IndexMap;
use serde_json::{json, Number, Value};

use fl_model::ComponentRegistry;
use fl_types::{
    format_external_version, top_level_package, CrossValidatorLike, Estimator, FlResult, Flow,
    FlowError, HpValue, ParameterMetaInfo, Portable, DEFAULT_FLOW_DESCRIPTION,
    DEFAULT_FLOW_LANGUAGE,
};

use crate::envelope::{
    component_reference, make_envelope, DISC_CV_OBJECT, DISC_FUNCTION, DISC_RV_FROZEN, DISC_TYPE,
};

/// Bidirectional converter between hyperparameter values and flows,
/// resolving identities through a component registry.
pub struct FlowConverter<'r> {
    registry: &'r ComponentRegistry,
}

impl<'r> FlowConverter<'r> {
    pub fn new(registry: &'r ComponentRegistry) -> Self {
        Self { registry }
    }

    pub(crate) fn registry(&self) -> &ComponentRegistry {
        self.registry
    }

    /// Convert a hyperparameter value into its portable form. Estimators
    /// become flows; everything else becomes JSON-representable data.
    pub fn model_to_flow(&self, value: &HpValue) -> FlResult<Portable> {
        match value {
            HpValue::Null => Ok(Portable::Json(Value::Null)),
            HpValue::Bool(b) => Ok(Portable::Json(Value::Bool(*b))),
            HpValue::Int(i) => Ok(Portable::Json(Value::from(*i))),
            HpValue::Float(f) => Ok(Portable::Json(Value::Number(json_number(*f)?))),
            HpValue::Str(s) => Ok(Portable::Json(Value::String(s.clone()))),
            HpValue::Estimator(model) => {
                Ok(Portable::Flow(Box::new(self.serialize_model(&**model)?)))
            }
            HpValue::List(items) => Ok(Portable::List(self.convert_all(items)?)),
            HpValue::Tuple(items) => Ok(Portable::Tuple(self.convert_all(items)?)),
            HpValue::Map(map) => self.serialize_map(map),
            HpValue::Type(ty) => Ok(Portable::Json(make_envelope(
                DISC_TYPE,
                Value::String(ty.symbol().to_string()),
            ))),
            HpValue::Distribution(dist) => Ok(Portable::Json(make_envelope(
                DISC_RV_FROZEN,
                serde_json::to_value(dist).map_err(FlowError::Encoding)?,
            ))),
            HpValue::Function(function) => Ok(Portable::Json(make_envelope(
                DISC_FUNCTION,
                Value::String(function.identity.clone()),
            ))),
            HpValue::CrossValidator(cv) => self.serialize_cross_validator(&**cv),
        }
    }

    /// Re-converting an already portable tree is the identity.
    pub fn convert_portable(&self, value: &Portable) -> FlResult<Portable> {
        match value {
            Portable::Json(_) | Portable::Flow(_) => Ok(value.clone()),
            Portable::List(items) => Ok(Portable::List(
                items
                    .iter()
                    .map(|item| self.convert_portable(item))
                    .collect::<FlResult<_>>()?,
            )),
            Portable::Tuple(items) => Ok(Portable::Tuple(
                items
                    .iter()
                    .map(|item| self.convert_portable(item))
                    .collect::<FlResult<_>>()?,
            )),
            Portable::Map(map) => Ok(Portable::Map(
                map.iter()
                    .map(|(key, item)| Ok((key.clone(), self.convert_portable(item)?)))
                    .collect::<FlResult<_>>()?,
            )),
        }
    }

    fn convert_all(&self, items: &[HpValue]) -> FlResult<Vec<Portable>> {
        items.iter().map(|item| self.model_to_flow(item)).collect()
    }

    /// Maps are normalized to sorted key order for determinism.
    fn serialize_map(&self, map: &IndexMap<String, HpValue>) -> FlResult<Portable> {
        let mut keys: Vec<&String> = map.keys().collect();
        keys.sort();
        let mut out = IndexMap::with_capacity(map.len());
        for key in keys {
            out.insert(key.clone(), self.model_to_flow(&map[key])?);
        }
        Ok(Portable::Map(out))
    }

    fn serialize_model(&self, model: &dyn Estimator) -> FlResult<Flow> {
        let (parameters, parameters_meta_info, components, explicit) =
            self.extract_information(model)?;

        // A component graph reused verbatim in two places is unsupported.
        check_duplicate_components(model.identity(), &components)?;

        let class_identity = model.identity().to_string();
        let name = derive_name(&class_identity, &components, &explicit);
        let external_version = self.external_version_string(model, &components)?;
        let dependencies = self.registry.baseline_dependencies();

        Ok(Flow {
            name,
            class_identity,
            description: DEFAULT_FLOW_DESCRIPTION.to_string(),
            parameters,
            parameters_meta_info,
            components,
            external_version,
            tags: Vec::new(),
            language: DEFAULT_FLOW_LANGUAGE.to_string(),
            dependencies,
        })
    }

    #[allow(clippy::type_complexity)]
    fn extract_information(
        &self,
        model: &dyn Estimator,
    ) -> FlResult<(
        IndexMap<String, Option<String>>,
        IndexMap<String, ParameterMetaInfo>,
        IndexMap<String, Flow>,
        HashSet<String>,
    )> {
        let mut components: IndexMap<String, Flow> = IndexMap::new();
        let mut explicit: HashSet<String> = HashSet::new();
        let mut parameters: IndexMap<String, Option<String>> = IndexMap::new();
        let mut meta: IndexMap<String, ParameterMetaInfo> = IndexMap::new();

        let shallow = model.params();
        let reserved: HashSet<String> = shallow.keys().cloned().collect();
        let mut items: Vec<(String, HpValue)> = shallow.into_iter().collect();
        items.sort_by(|a, b| a.0.cmp(&b.0));

        for (key, value) in items {
            let rval = self.model_to_flow(&value)?;

            if let Some(steps) = steps_view(&rval) {
                // Named steps of a pipeline or ensemble: register each
                // sub-flow as a component and leave a reference in place.
                let mut rebuilt = Vec::with_capacity(steps.len());
                for step in steps {
                    if reserved.contains(step.identifier) {
                        return Err(FlowError::ShadowedStep {
                            identifier: step.identifier.to_string(),
                            model: model.identity().to_string(),
                        }
                        .into());
                    }
                    match step.flow {
                        // A null step is a legal skip marker.
                        None => rebuilt.push(json!([step.identifier, null])),
                        Some(flow) => {
                            components.insert(step.identifier.to_string(), flow.clone());
                            explicit.insert(step.identifier.to_string());
                            rebuilt.push(component_reference(
                                step.identifier,
                                Some(step.identifier),
                            ));
                        }
                    }
                }
                let encoded = serde_json::to_string(&Value::Array(rebuilt))
                    .map_err(FlowError::Encoding)?;
                parameters.insert(key.clone(), Some(encoded));
            } else if let Portable::Flow(flow) = rval {
                // A direct sub-estimator parameter.
                components.insert(key.clone(), *flow);
                explicit.insert(key.clone());
                let reference = component_reference(&key, None);
                let encoded =
                    serde_json::to_string(&reference).map_err(FlowError::Encoding)?;
                parameters.insert(key.clone(), Some(encoded));
            } else if rval.is_empty_sized() {
                // Empty sized values are stored as an absent marker.
                parameters.insert(key.clone(), None);
            } else {
                let encoded = serde_json::to_string(&portable_to_json(&rval)?)
                    .map_err(FlowError::Encoding)?;
                parameters.insert(key.clone(), Some(encoded));
            }

            meta.insert(key, ParameterMetaInfo::default());
        }

        Ok((parameters, meta, components, explicit))
    }

    /// Sorted union of `package==version` strings over the model's package
    /// and all nested components (which are already transitive).
    fn external_version_string(
        &self,
        model: &dyn Estimator,
        components: &IndexMap<String, Flow>,
    ) -> FlResult<String> {
        let package = top_level_package(model.identity());
        let version = self.registry.package_version(package).ok_or_else(|| {
            FlowError::UnknownDependency {
                package: package.to_string(),
            }
        })?;

        let mut versions = BTreeSet::new();
        versions.insert(format_external_version(package, version));
        for component in components.values() {
            for entry in component.external_version.split(',') {
                if !entry.is_empty() {
                    versions.insert(entry.to_string());
                }
            }
        }
        Ok(versions.into_iter().collect::<Vec<_>>().join(","))
    }

    fn serialize_cross_validator(&self, cv: &dyn CrossValidatorLike) -> FlResult<Portable> {
        let mut names = cv.param_names();
        names.sort();

        let mut parameters = serde_json::Map::new();
        for name in names {
            if cv.deprecated_params().contains(&name.as_str()) {
                continue;
            }
            let value = cv.attribute(&name).unwrap_or(HpValue::Null);
            if value.is_empty_sized() {
                parameters.insert(name, Value::Null);
            } else {
                let json = portable_to_json(&self.model_to_flow(&value)?)?;
                let encoded = serde_json::to_string(&json).map_err(FlowError::Encoding)?;
                parameters.insert(name, Value::String(encoded));
            }
        }

        let payload = json!({
            "name": cv.identity(),
            "parameters": Value::Object(parameters),
        });
        Ok(Portable::Json(make_envelope(DISC_CV_OBJECT, payload)))
    }
}

fn json_number(value: f64) -> FlResult<Number> {
    Number::from_f64(value).ok_or_else(|| {
        FlowError::Unsupported {
            value: value.to_string(),
            kind: "non-finite float",
        }
        .into()
    })
}

/// Collapse a portable tree into plain JSON. A flow nested inside a plain
/// collection has no JSON rendering and fails the conversion.
fn portable_to_json(value: &Portable) -> FlResult<Value> {
    match value {
        Portable::Json(json) => Ok(json.clone()),
        Portable::List(items) | Portable::Tuple(items) => Ok(Value::Array(
            items.iter().map(portable_to_json).collect::<FlResult<_>>()?,
        )),
        Portable::Map(map) => {
            let mut out = serde_json::Map::new();
            for (key, item) in map {
                out.insert(key.clone(), portable_to_json(item)?);
            }
            Ok(Value::Object(out))
        }
        Portable::Flow(flow) => Err(FlowError::Unsupported {
            value: flow.name.clone(),
            kind: "flow",
        }
        .into()),
    }
}

struct StepView<'a> {
    identifier: &'a str,
    flow: Option<&'a Flow>,
}

/// A homogeneous non-empty list of `(identifier, sub-flow-or-null)` pairs is
/// the step list of a pipeline or ensemble.
fn steps_view(value: &Portable) -> Option<Vec<StepView<'_>>> {
    let items = match value {
        Portable::List(items) | Portable::Tuple(items) if !items.is_empty() => items,
        _ => return None,
    };
    let mut steps = Vec::with_capacity(items.len());
    for item in items {
        let pair = match item {
            Portable::List(pair) | Portable::Tuple(pair) if pair.len() == 2 => pair,
            _ => return None,
        };
        let identifier = match &pair[0] {
            Portable::Json(Value::String(identifier)) => identifier.as_str(),
            _ => return None,
        };
        let flow = match &pair[1] {
            Portable::Flow(flow) => Some(&**flow),
            Portable::Json(Value::Null) => None,
            _ => return None,
        };
        steps.push(StepView { identifier, flow });
    }
    Some(steps)
}

fn derive_name(
    class_identity: &str,
    components: &IndexMap<String, Flow>,
    explicit: &HashSet<String>,
) -> String {
    if components.is_empty() {
        return class_identity.to_string();
    }
    let parts: Vec<String> = components
        .iter()
        .map(|(key, sub)| {
            if explicit.contains(key) {
                format!("{key}={}", sub.name)
            } else {
                sub.name.clone()
            }
        })
        .collect();
    format!("{}({})", class_identity, parts.join(","))
}

/// Depth-first walk over the component tree; two distinct components with
/// the same derived name fail the conversion.
fn check_duplicate_components(
    model_identity: &str,
    components: &IndexMap<String, Flow>,
) -> FlResult<()> {
    let mut stack: Vec<&Flow> = components.values().collect();
    let mut known: HashSet<&str> = HashSet::new();
    while let Some(flow) = stack.pop() {
        if !known.insert(&flow.name) {
            return Err(FlowError::DuplicateComponent {
                name: flow.name.clone(),
                flow: model_identity.to_string(),
            }
            .into());
        }
        stack.extend(flow.components.values());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use fl_model::catalog::{
        uniform, KFold, LogisticRegression, Pipeline, RandomizedSearch, Standardize, BOOSTING,
        LOGISTIC_REGRESSION, PIPELINE, STANDARDIZE,
    };
    use fl_model::{default_registry, Boosting};
    use fl_types::FlError;
    use std::sync::Arc;

    fn converter() -> FlowConverter<'static> {
        FlowConverter::new(default_registry())
    }

    fn expect_flow(portable: Portable) -> Flow {
        match portable {
            Portable::Flow(flow) => *flow,
            other => panic!("expected a flow, got {other:?}"),
        }
    }

    #[test]
    fn primitives_convert_to_plain_json() {
        let c = converter();
        assert_eq!(
            c.model_to_flow(&HpValue::Int(3)).unwrap(),
            Portable::Json(json!(3))
        );
        assert_eq!(
            c.model_to_flow(&HpValue::Null).unwrap(),
            Portable::Json(Value::Null)
        );
        assert_eq!(
            c.model_to_flow(&HpValue::str("l2")).unwrap(),
            Portable::Json(json!("l2"))
        );
    }

    #[test]
    fn non_finite_floats_are_rejected() {
        let result = converter().model_to_flow(&HpValue::Float(f64::NAN));
        assert!(matches!(
            result,
            Err(FlError::Flow(FlowError::Unsupported { .. }))
        ));
    }

    #[test]
    fn plain_model_serialization() {
        let flow = expect_flow(
            converter()
                .model_to_flow(&HpValue::estimator(LogisticRegression::default()))
                .unwrap(),
        );

        assert_eq!(flow.name, LOGISTIC_REGRESSION);
        assert_eq!(flow.class_identity, LOGISTIC_REGRESSION);
        assert!(flow.components.is_empty());
        // parameters are sorted and JSON-encoded
        assert_eq!(
            flow.parameters.keys().collect::<Vec<_>>(),
            vec!["c", "max_iter", "penalty", "seed", "tol"]
        );
        assert_eq!(flow.parameters["c"], Some("1.0".to_string()));
        assert_eq!(flow.parameters["penalty"], Some("\"l2\"".to_string()));
        assert_eq!(flow.parameters["seed"], Some("null".to_string()));
        assert_eq!(flow.external_version, "mlcraft==1.2.0");
        assert!(flow.dependencies.lines().any(|l| l == "mlcraft==1.2.0"));
        assert_eq!(flow.parameters_meta_info.len(), flow.parameters.len());
    }

    #[test]
    fn pipeline_steps_become_components() {
        let pipeline = Pipeline::new(vec![
            (
                "scale".to_string(),
                Some(Arc::new(Standardize::default()) as Arc<dyn Estimator>),
            ),
            ("skip".to_string(), None),
            (
                "clf".to_string(),
                Some(Arc::new(LogisticRegression::default()) as Arc<dyn Estimator>),
            ),
        ]);

        let flow = expect_flow(
            converter()
                .model_to_flow(&HpValue::estimator(pipeline))
                .unwrap(),
        );

        assert_eq!(
            flow.components.keys().collect::<Vec<_>>(),
            vec!["scale", "clf"]
        );
        assert_eq!(
            flow.name,
            format!("{PIPELINE}(scale={STANDARDIZE},clf={LOGISTIC_REGRESSION})")
        );

        let steps: Value =
            serde_json::from_str(flow.parameters["steps"].as_ref().unwrap()).unwrap();
        let steps = steps.as_array().unwrap();
        assert_eq!(steps.len(), 3);
        // a null step is preserved literally
        assert_eq!(steps[1], json!(["skip", null]));
        // present steps are replaced by component references
        assert_eq!(
            steps[0][crate::envelope::SERIALIZED_OBJECT_KEY],
            crate::envelope::DISC_COMPONENT_REFERENCE
        );
        assert_eq!(steps[0]["value"]["key"], "scale");
        assert_eq!(steps[0]["value"]["step_name"], "scale");
    }

    #[test]
    fn direct_sub_estimator_becomes_component() {
        let boosting = Boosting {
            base_estimator: Some(Arc::new(Standardize::default())),
            ..Boosting::default()
        };

        let flow = expect_flow(
            converter()
                .model_to_flow(&HpValue::estimator(boosting))
                .unwrap(),
        );

        assert_eq!(flow.name, format!("{BOOSTING}(base_estimator={STANDARDIZE})"));
        let reference: Value =
            serde_json::from_str(flow.parameters["base_estimator"].as_ref().unwrap()).unwrap();
        assert_eq!(reference["value"]["key"], "base_estimator");
        assert_eq!(reference["value"]["step_name"], Value::Null);
    }

    #[test]
    fn empty_collections_are_stored_as_absent() {
        let search = RandomizedSearch::default();
        let flow = expect_flow(
            converter()
                .model_to_flow(&HpValue::estimator(search))
                .unwrap(),
        );

        assert_eq!(flow.parameters["param_distributions"], None);
    }

    #[test]
    fn step_shadowing_a_parameter_fails() {
        let pipeline = Pipeline::new(vec![(
            "steps".to_string(),
            Some(Arc::new(Standardize::default()) as Arc<dyn Estimator>),
        )]);

        let result = converter().model_to_flow(&HpValue::estimator(pipeline));
        match result {
            Err(FlError::Flow(FlowError::ShadowedStep { identifier, model })) => {
                assert_eq!(identifier, "steps");
                assert_eq!(model, PIPELINE);
            }
            other => panic!("expected shadowing failure, got {other:?}"),
        }
    }

    #[test]
    fn duplicate_components_fail() {
        let pipeline = Pipeline::new(vec![
            (
                "first".to_string(),
                Some(Arc::new(LogisticRegression::default()) as Arc<dyn Estimator>),
            ),
            (
                "second".to_string(),
                Some(Arc::new(LogisticRegression::default()) as Arc<dyn Estimator>),
            ),
        ]);

        let result = converter().model_to_flow(&HpValue::estimator(pipeline));
        match result {
            Err(FlError::Flow(FlowError::DuplicateComponent { name, .. })) => {
                assert_eq!(name, LOGISTIC_REGRESSION);
            }
            other => panic!("expected duplicate-component failure, got {other:?}"),
        }
    }

    #[test]
    fn search_wrapper_serializes_every_special_kind() {
        let mut grid = IndexMap::new();
        grid.insert(
            "clf__c".to_string(),
            HpValue::Distribution(uniform(0.1, 1.0)),
        );
        let search = RandomizedSearch {
            estimator: Some(Arc::new(LogisticRegression::default())),
            param_distributions: grid,
            scoring: Some(fl_types::FunctionRef::new(fl_model::catalog::ACCURACY)),
            cv: Some(Arc::new(KFold::default())),
            ..RandomizedSearch::default()
        };

        let flow = expect_flow(
            converter()
                .model_to_flow(&HpValue::estimator(search))
                .unwrap(),
        );

        let grid: Value =
            serde_json::from_str(flow.parameters["param_distributions"].as_ref().unwrap())
                .unwrap();
        assert_eq!(
            grid["clf__c"][crate::envelope::SERIALIZED_OBJECT_KEY],
            crate::envelope::DISC_RV_FROZEN
        );

        let scoring: Value =
            serde_json::from_str(flow.parameters["scoring"].as_ref().unwrap()).unwrap();
        assert_eq!(scoring["value"], fl_model::catalog::ACCURACY);

        let cv: Value = serde_json::from_str(flow.parameters["cv"].as_ref().unwrap()).unwrap();
        assert_eq!(
            cv[crate::envelope::SERIALIZED_OBJECT_KEY],
            crate::envelope::DISC_CV_OBJECT
        );
        assert_eq!(cv["value"]["name"], fl_model::catalog::K_FOLD);
        let cv_params = cv["value"]["parameters"].as_object().unwrap();
        // the deprecated alias is excluded from serialization
        assert!(!cv_params.contains_key("folds"));
        assert_eq!(cv_params["n_splits"], "5");
        assert_eq!(cv_params["shuffle"], "false");
    }

    #[test]
    fn type_parameters_use_the_whitelist() {
        let portable = converter()
            .model_to_flow(&HpValue::Type(fl_types::ScalarType::F64))
            .unwrap();
        match portable {
            Portable::Json(value) => {
                assert_eq!(value[crate::envelope::SERIALIZED_OBJECT_KEY], DISC_TYPE);
                assert_eq!(value["value"], "f64");
            }
            other => panic!("expected envelope, got {other:?}"),
        }
    }

    #[test]
    fn flows_nested_in_plain_collections_are_rejected() {
        // a bare list of estimators is not a step list and cannot be encoded
        let value = HpValue::Map(IndexMap::from([(
            "models".to_string(),
            HpValue::List(vec![HpValue::estimator(Standardize::default())]),
        )]));

        // as a parameter value of an estimator this would fail; the map
        // itself converts (flows are legal inside portable maps)
        let portable = converter().model_to_flow(&value).unwrap();
        assert!(matches!(portable, Portable::Map(_)));
        assert!(matches!(
            portable_to_json(&portable),
            Err(FlError::Flow(FlowError::Unsupported { .. }))
        ));
    }

    #[test]
    fn external_version_unions_component_packages() {
        #[derive(Debug, Clone)]
        struct Widget;

        impl Estimator for Widget {
            fn identity(&self) -> &str {
                "auxpack.ext.Widget"
            }

            fn params(&self) -> IndexMap<String, HpValue> {
                IndexMap::new()
            }
        }

        let mut registry = fl_model::ComponentRegistry::with_builtins();
        registry.register_package("auxpack", fl_types::Version::from_segments(&[2, 0]));

        let boosting = Boosting {
            base_estimator: Some(Arc::new(Widget)),
            ..Boosting::default()
        };
        let flow = expect_flow(
            FlowConverter::new(&registry)
                .model_to_flow(&HpValue::estimator(boosting))
                .unwrap(),
        );

        // sorted, de-duplicated union over the flow and its components
        assert_eq!(flow.external_version, "auxpack==2.0,mlcraft==1.2.0");
        assert_eq!(
            flow.components["base_estimator"].external_version,
            "auxpack==2.0"
        );
    }

    #[test]
    fn converting_twice_is_identity() {
        let c = converter();
        let once = c
            .model_to_flow(&HpValue::estimator(LogisticRegression::default()))
            .unwrap();
        let twice = c.convert_portable(&once).unwrap();
        assert_eq!(once, twice);
    }
}
