//! `ResourceController`: validate / refresh / plan / apply / import for one
//! resource kind (spec section 4.3), plus the free functions that drive the
//! plan/apply orchestration across a controller and its stateful parameters.

use std::collections::HashMap;

use async_trait::async_trait;
use codify_schemas::ResourceConfigWire;

use crate::change_set::{ChangeSet, ParameterOperation, ResourceOperation};
use crate::error::{ControllerError, ValidationResult};
use crate::parameter::ParameterSettingsMap;
use crate::plan::Plan;
use crate::value::Value;

/// Parsed once at plugin initialization; immutable afterwards (spec
/// section 3, `ResourceControllerSettings`).
#[derive(Debug, Clone, Default)]
pub struct ResourceControllerSettings {
    pub type_id: String,
    pub allow_multiple: bool,
    pub remove_stateful_parameters_before_destroy: bool,
    pub dependencies: Vec<String>,
    pub import_required_parameters: Vec<String>,
    /// The resource's published JSON Schema, if it declares one. Consulted
    /// by the default `validate()` and surfaced verbatim through
    /// `getResourceInfo` (spec sections 3 and 4.6).
    pub schema: Option<serde_json::Value>,
}

#[async_trait]
pub trait ResourceController: Send + Sync {
    fn settings(&self) -> &ResourceControllerSettings;
    fn parameter_settings(&self) -> &ParameterSettingsMap;

    /// JSON-schema validation only; no I/O (spec section 4.3). Default
    /// validates `desired` against `settings().schema` when declared, via
    /// `codify_schemas::Validator`; accepts everything when no schema is
    /// declared. Override for validation that needs more than the schema.
    async fn validate(
        &self,
        core_parameters: &ResourceConfigWire,
        desired: &HashMap<String, Value>,
    ) -> ValidationResult {
        let _ = core_parameters;
        let Some(schema) = &self.settings().schema else {
            return ValidationResult::ok();
        };

        let instance = serde_json::Value::Object(
            desired.iter().map(|(k, v)| (k.clone(), v.to_json())).collect(),
        );
        match codify_schemas::Validator::compile(schema) {
            Ok(validator) => match validator.validate(&instance) {
                Ok(()) => ValidationResult::ok(),
                Err(e) => ValidationResult::failed(vec![e.to_string()]),
            },
            Err(e) => ValidationResult::failed(vec![e.to_string()]),
        }
    }

    /// Observe the named keys on the live resource. `None` means the
    /// resource itself is absent.
    async fn refresh(
        &self,
        core_parameters: &ResourceConfigWire,
        keys: &[String],
    ) -> Result<Option<HashMap<String, Value>>, ControllerError>;

    async fn create(&self, plan: &Plan) -> Result<(), ControllerError>;
    async fn destroy(&self, plan: &Plan) -> Result<(), ControllerError>;
    async fn modify(
        &self,
        name: &str,
        new_value: &Value,
        previous_value: &Value,
        plan: &Plan,
    ) -> Result<(), ControllerError>;

    async fn import(
        &self,
        core_parameters: &ResourceConfigWire,
        parameters: &HashMap<String, Value>,
    ) -> Result<Vec<HashMap<String, Value>>, ControllerError> {
        let _ = (core_parameters, parameters);
        Ok(Vec::new())
    }
}

fn apply_input_transformations(
    desired: HashMap<String, Value>,
    settings: &ParameterSettingsMap,
) -> HashMap<String, Value> {
    desired
        .into_iter()
        .map(|(name, value)| {
            let transformed = settings
                .get(&name)
                .and_then(|s| s.input_transformation.as_ref())
                .map(|f| f(&value))
                .unwrap_or(value);
            (name, transformed)
        })
        .collect()
}

fn fill_defaults(desired: &HashMap<String, Value>, settings: &ParameterSettingsMap) -> HashMap<String, Value> {
    let mut filled = desired.clone();
    for (name, default) in settings.default_values() {
        filled.entry(name).or_insert(default);
    }
    filled
}

/// Drives a controller through validate-free `plan()` (spec section 4.3,
/// steps 1-6).
pub async fn plan(
    controller: &dyn ResourceController,
    core_parameters: ResourceConfigWire,
    desired: Option<HashMap<String, Value>>,
    state: Option<HashMap<String, Value>>,
    stateful_mode: bool,
) -> Result<Plan, ControllerError> {
    let settings = controller.parameter_settings();

    let desired = desired
        .map(|d| apply_input_transformations(d, settings))
        .map(|d| fill_defaults(&d, settings));

    let mut keys: Vec<String> = Vec::new();
    if let Some(d) = &desired {
        keys.extend(d.keys().cloned());
    }
    if let Some(s) = &state {
        keys.extend(s.keys().cloned());
    }
    keys.sort();
    keys.dedup();

    let refreshed = controller.refresh(&core_parameters, &keys).await?;

    // Augmented with each stateful parameter's own `refresh()` below when
    // the resource exists; this, not the controller's raw `refreshed`, is
    // what `Plan.current_config()` carries forward to `apply()` — stateful
    // removes on DESTROY/RECREATE read it back via `current_config()`.
    let mut current_map = refreshed.clone().unwrap_or_default();

    let change_set = match &refreshed {
        None if stateful_mode && state.is_some() => {
            ChangeSet::create(state.as_ref().unwrap())
        }
        None if desired.is_none() => ChangeSet::empty(),
        None => ChangeSet::create(desired.as_ref().unwrap()),
        Some(current) => {
            let mut current = current.clone();
            for (name, param, _order) in settings.stateful_in_order() {
                let desired_value = desired.as_ref().and_then(|d| d.get(name));
                if let Some(v) = param.refresh(desired_value).await? {
                    current.insert(name.clone(), v);
                }
            }
            let change_set = ChangeSet::calculate(desired.as_ref(), &current, settings, stateful_mode)?;
            current_map = current;
            change_set
        }
    };

    let desired_map = desired.unwrap_or_default();

    Ok(Plan::from_parts(
        core_parameters,
        change_set,
        desired_map,
        current_map,
        stateful_mode,
    ))
}

/// Drives a controller through `apply()` dispatch by operation (spec
/// section 4.3's table).
pub async fn apply(controller: &dyn ResourceController, plan: &Plan) -> Result<(), ControllerError> {
    let settings = controller.parameter_settings();
    let cfg = controller.settings();

    match plan.change_set.operation {
        ResourceOperation::Noop => Ok(()),

        ResourceOperation::Create => {
            controller.create(plan).await?;
            apply_stateful_adds(plan, settings).await
        }

        ResourceOperation::Destroy => {
            if cfg.remove_stateful_parameters_before_destroy {
                apply_stateful_removes_reverse(plan, settings).await?;
            }
            controller.destroy(plan).await
        }

        ResourceOperation::Recreate => {
            if cfg.remove_stateful_parameters_before_destroy {
                apply_stateful_removes_reverse(plan, settings).await?;
            }
            controller.destroy(plan).await?;
            controller.create(plan).await?;
            apply_stateful_adds(plan, settings).await
        }

        ResourceOperation::Modify => apply_modify(controller, plan, settings).await,
    }
}

async fn apply_stateful_adds(plan: &Plan, settings: &ParameterSettingsMap) -> Result<(), ControllerError> {
    for (name, param, _order) in settings.stateful_in_order() {
        if let Some(value) = plan.desired_config().get(name) {
            if !value.is_null() {
                param.apply_add(value).await?;
            }
        }
    }
    Ok(())
}

async fn apply_stateful_removes_reverse(
    plan: &Plan,
    settings: &ParameterSettingsMap,
) -> Result<(), ControllerError> {
    let mut ordered = settings.stateful_in_order();
    ordered.reverse();
    for (name, param, _order) in ordered {
        if let Some(value) = plan.current_config().get(name) {
            param.apply_remove(value).await?;
        }
    }
    Ok(())
}

/// Non-stateful rows apply first, then stateful rows in ascending `order`
/// (spec section 4.3, the MODIFY row).
async fn apply_modify(
    controller: &dyn ResourceController,
    plan: &Plan,
    settings: &ParameterSettingsMap,
) -> Result<(), ControllerError> {
    let changed: Vec<_> = plan
        .change_set
        .parameter_changes
        .iter()
        .filter(|c| c.operation != ParameterOperation::Noop)
        .collect();

    let (stateful, plain): (Vec<_>, Vec<_>) = changed
        .into_iter()
        .partition(|c| settings.get(&c.name).map(|s| s.is_stateful()).unwrap_or(false));

    for change in plain {
        let new_value = change.new_value.as_ref().unwrap_or(&crate::value::NULL);
        let previous_value = change.previous_value.as_ref().unwrap_or(&crate::value::NULL);
        controller
            .modify(&change.name, new_value, previous_value, plan)
            .await?;
    }

    let mut ordered = stateful;
    ordered.sort_by_key(|c| {
        settings
            .get(&c.name)
            .and_then(|s| s.stateful())
            .map(|(_, order)| order)
            .unwrap_or(0)
    });

    for change in ordered {
        let Some((param, _order)) = settings.get(&change.name).and_then(|s| s.stateful()) else {
            continue;
        };
        match change.operation {
            ParameterOperation::Add => {
                param
                    .apply_add(change.new_value.as_ref().unwrap_or(&crate::value::NULL))
                    .await?;
            }
            ParameterOperation::Remove => {
                param
                    .apply_remove(change.previous_value.as_ref().unwrap_or(&crate::value::NULL))
                    .await?;
            }
            ParameterOperation::Modify => {
                param
                    .apply_modify(
                        change.new_value.as_ref().unwrap_or(&crate::value::NULL),
                        change.previous_value.as_ref().unwrap_or(&crate::value::NULL),
                        plan.stateful_mode,
                    )
                    .await?;
            }
            ParameterOperation::Noop => {}
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parameter::{ParameterSetting, ParameterType};
    use crate::stateful_parameter::StatefulParameter;
    use async_trait::async_trait;
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingController {
        calls: Mutex<Vec<String>>,
        settings: ResourceControllerSettings,
        parameter_settings: ParameterSettingsMap,
    }

    #[async_trait]
    impl ResourceController for RecordingController {
        fn settings(&self) -> &ResourceControllerSettings {
            &self.settings
        }

        fn parameter_settings(&self) -> &ParameterSettingsMap {
            &self.parameter_settings
        }

        async fn refresh(
            &self,
            _core_parameters: &ResourceConfigWire,
            _keys: &[String],
        ) -> Result<Option<HashMap<String, Value>>, ControllerError> {
            Ok(Some(HashMap::new()))
        }

        async fn create(&self, _plan: &Plan) -> Result<(), ControllerError> {
            self.calls.lock().unwrap().push("create".to_string());
            Ok(())
        }

        async fn destroy(&self, _plan: &Plan) -> Result<(), ControllerError> {
            self.calls.lock().unwrap().push("destroy".to_string());
            Ok(())
        }

        async fn modify(
            &self,
            name: &str,
            _new_value: &Value,
            _previous_value: &Value,
            _plan: &Plan,
        ) -> Result<(), ControllerError> {
            self.calls.lock().unwrap().push(format!("modify:{name}"));
            Ok(())
        }
    }

    fn core() -> ResourceConfigWire {
        ResourceConfigWire {
            type_id: "mock".to_string(),
            name: Some("a".to_string()),
        }
    }

    #[tokio::test]
    async fn scenario_4_recreate_calls_destroy_then_create_once_each() {
        let controller = RecordingController::default();
        let plan = Plan::from_parts(
            core(),
            ChangeSet {
                operation: ResourceOperation::Recreate,
                parameter_changes: Vec::new(),
            },
            HashMap::new(),
            HashMap::new(),
            true,
        );

        apply(&controller, &plan).await.unwrap();
        let calls = controller.calls.lock().unwrap().clone();
        assert_eq!(calls, vec!["destroy".to_string(), "create".to_string()]);
    }

    #[tokio::test]
    async fn modify_dispatches_plain_rows_to_controller() {
        let mut settings = ParameterSettingsMap::new();
        settings.insert("propA", ParameterSetting::new(ParameterType::String));
        let controller = RecordingController {
            parameter_settings: settings,
            ..Default::default()
        };

        let change_set = ChangeSet {
            operation: ResourceOperation::Modify,
            parameter_changes: vec![crate::change_set::ParameterChange {
                name: "propA".to_string(),
                operation: ParameterOperation::Modify,
                previous_value: Some(Value::String("y".to_string())),
                new_value: Some(Value::String("x".to_string())),
            }],
        };
        let plan = Plan::from_parts(core(), change_set, HashMap::new(), HashMap::new(), false);

        apply(&controller, &plan).await.unwrap();
        assert_eq!(*controller.calls.lock().unwrap(), vec!["modify:propA".to_string()]);
    }

    struct CountingParameter {
        added: Mutex<Vec<Value>>,
        removed: Mutex<Vec<Value>>,
    }

    impl Default for CountingParameter {
        fn default() -> Self {
            Self {
                added: Mutex::new(Vec::new()),
                removed: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl StatefulParameter for CountingParameter {
        async fn refresh(&self, _desired: Option<&Value>) -> Result<Option<Value>, ControllerError> {
            Ok(None)
        }
        async fn apply_add(&self, value: &Value) -> Result<(), ControllerError> {
            self.added.lock().unwrap().push(value.clone());
            Ok(())
        }
        async fn apply_remove(&self, value: &Value) -> Result<(), ControllerError> {
            self.removed.lock().unwrap().push(value.clone());
            Ok(())
        }
    }

    #[tokio::test]
    async fn create_applies_stateful_adds_in_order() {
        use std::sync::Arc;

        let param_a = Arc::new(CountingParameter::default());
        let param_b = Arc::new(CountingParameter::default());

        let mut settings = ParameterSettingsMap::new();
        settings.insert(
            "b",
            ParameterSetting::new(ParameterType::Stateful {
                parameter: param_b.clone(),
                order: 2,
            }),
        );
        settings.insert(
            "a",
            ParameterSetting::new(ParameterType::Stateful {
                parameter: param_a.clone(),
                order: 1,
            }),
        );

        let controller = RecordingController {
            parameter_settings: settings,
            ..Default::default()
        };

        let mut desired = HashMap::new();
        desired.insert("a".to_string(), Value::String("va".to_string()));
        desired.insert("b".to_string(), Value::String("vb".to_string()));

        let plan = Plan::from_parts(
            core(),
            ChangeSet {
                operation: ResourceOperation::Create,
                parameter_changes: Vec::new(),
            },
            desired,
            HashMap::new(),
            true,
        );

        apply(&controller, &plan).await.unwrap();
        assert_eq!(*param_a.added.lock().unwrap(), vec![Value::String("va".to_string())]);
        assert_eq!(*param_b.added.lock().unwrap(), vec![Value::String("vb".to_string())]);
    }

    /// `refresh()` only returns the controller's own keys; a stateful
    /// parameter's value comes from its own `refresh()` and must still end
    /// up in `plan.current_config()` so a later whole-resource DESTROY can
    /// hand it back to `apply_remove`.
    #[tokio::test]
    async fn plan_then_destroy_applies_stateful_remove_even_when_controller_refresh_omits_it() {
        use std::sync::Arc;

        struct TaggedController {
            settings: ResourceControllerSettings,
            parameter_settings: ParameterSettingsMap,
        }

        #[async_trait]
        impl ResourceController for TaggedController {
            fn settings(&self) -> &ResourceControllerSettings {
                &self.settings
            }
            fn parameter_settings(&self) -> &ParameterSettingsMap {
                &self.parameter_settings
            }
            async fn refresh(
                &self,
                _core_parameters: &ResourceConfigWire,
                _keys: &[String],
            ) -> Result<Option<HashMap<String, Value>>, ControllerError> {
                Ok(Some(HashMap::new()))
            }
            async fn create(&self, _plan: &Plan) -> Result<(), ControllerError> {
                Ok(())
            }
            async fn destroy(&self, _plan: &Plan) -> Result<(), ControllerError> {
                Ok(())
            }
            async fn modify(
                &self,
                _name: &str,
                _new_value: &Value,
                _previous_value: &Value,
                _plan: &Plan,
            ) -> Result<(), ControllerError> {
                Ok(())
            }
        }

        struct SeededTagParameter {
            value: Value,
            removed: Mutex<Vec<Value>>,
        }

        #[async_trait]
        impl StatefulParameter for SeededTagParameter {
            async fn refresh(&self, _desired: Option<&Value>) -> Result<Option<Value>, ControllerError> {
                Ok(Some(self.value.clone()))
            }
            async fn apply_add(&self, _value: &Value) -> Result<(), ControllerError> {
                Ok(())
            }
            async fn apply_remove(&self, value: &Value) -> Result<(), ControllerError> {
                self.removed.lock().unwrap().push(value.clone());
                Ok(())
            }
        }

        let tags = Arc::new(SeededTagParameter {
            value: Value::Array(vec![Value::String("keep-me".to_string())]),
            removed: Mutex::new(Vec::new()),
        });

        let mut settings = ParameterSettingsMap::new();
        settings.insert(
            "tags",
            ParameterSetting::new(ParameterType::Stateful { parameter: tags.clone(), order: 1 }),
        );

        let controller = TaggedController {
            settings: ResourceControllerSettings {
                type_id: "tagged".to_string(),
                remove_stateful_parameters_before_destroy: true,
                ..Default::default()
            },
            parameter_settings: settings,
        };

        let destroy_plan = plan(&controller, core(), None, None, true).await.unwrap();
        assert_eq!(destroy_plan.change_set.operation, ResourceOperation::Destroy);

        apply(&controller, &destroy_plan).await.unwrap();
        assert_eq!(
            *tags.removed.lock().unwrap(),
            vec![Value::Array(vec![Value::String("keep-me".to_string())])]
        );
    }

    #[tokio::test]
    async fn default_validate_accepts_everything_when_no_schema_is_declared() {
        let controller = RecordingController::default();
        let result = controller.validate(&core(), &HashMap::new()).await;
        assert!(result.is_valid);
    }

    #[tokio::test]
    async fn default_validate_rejects_a_payload_the_declared_schema_rejects() {
        let controller = RecordingController {
            settings: ResourceControllerSettings {
                schema: Some(serde_json::json!({
                    "type": "object",
                    "properties": { "name": { "type": "string" } },
                    "required": ["name"],
                })),
                ..Default::default()
            },
            ..Default::default()
        };

        let result = controller.validate(&core(), &HashMap::new()).await;
        assert!(!result.is_valid);
        assert!(!result.errors.is_empty());

        let mut desired = HashMap::new();
        desired.insert("name".to_string(), Value::String("web".to_string()));
        let result = controller.validate(&core(), &desired).await;
        assert!(result.is_valid);
    }
}
