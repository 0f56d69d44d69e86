//! Reference `ResourceController` backed by an in-memory store instead of a
//! real API or shell command — demonstrates the full resource-implementation
//! contract (validate/refresh/create/destroy/modify, plus a `StatefulParameter`)
//! without needing an execution channel.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use codify_core::{
    ControllerError, ParameterSetting, ParameterSettingsMap, ParameterType, Plan,
    ResourceConfigWire, ResourceController, ResourceControllerSettings, StatefulParameter,
    ValidationResult, Value,
};

#[derive(Debug, Clone, Default)]
struct Record {
    value: String,
    tags: Vec<String>,
}

/// Tracks `tags` additions/removals against the same record the controller
/// owns. Order 1 so tags land after `value` on CREATE and are torn down
/// before it on DESTROY (not that it matters here — the store is a single
/// `HashMap` entry either way).
struct TagsParameter {
    store: std::sync::Arc<Mutex<Option<Record>>>,
}

#[async_trait]
impl StatefulParameter for TagsParameter {
    async fn refresh(&self, _desired: Option<&Value>) -> Result<Option<Value>, ControllerError> {
        let store = self.store.lock().unwrap();
        Ok(store.as_ref().map(|r| {
            Value::Array(r.tags.iter().cloned().map(Value::String).collect())
        }))
    }

    async fn apply_add(&self, value: &Value) -> Result<(), ControllerError> {
        let mut store = self.store.lock().unwrap();
        let Some(record) = store.as_mut() else {
            return Err(ControllerError::Other("memory_kv: apply_add with no record".to_string()));
        };
        record.tags.push(value.coerce_string());
        Ok(())
    }

    /// Called per-element during an incremental MODIFY diff, but with the
    /// whole tracked array during a DESTROY's stateful teardown — handle
    /// both (spec section 4.3's DESTROY row hands the whole current value
    /// to `apply_remove`, not one element at a time).
    async fn apply_remove(&self, value: &Value) -> Result<(), ControllerError> {
        let mut store = self.store.lock().unwrap();
        let Some(record) = store.as_mut() else {
            return Ok(());
        };
        match value {
            Value::Array(items) => {
                let targets: Vec<String> = items.iter().map(Value::coerce_string).collect();
                record.tags.retain(|t| !targets.contains(t));
            }
            other => {
                let target = other.coerce_string();
                record.tags.retain(|t| t != &target);
            }
        }
        Ok(())
    }
}

/// A singleton key-value resource (`allow_multiple: false`): one `value`
/// string and a stateful `tags` array, held in a process-local `HashMap`
/// rather than anything external.
pub struct MemoryKvController {
    store: std::sync::Arc<Mutex<Option<Record>>>,
    settings: ResourceControllerSettings,
    parameter_settings: ParameterSettingsMap,
}

impl Default for MemoryKvController {
    fn default() -> Self {
        let store = std::sync::Arc::new(Mutex::new(None));

        let mut parameter_settings = ParameterSettingsMap::new();
        parameter_settings.insert("value", ParameterSetting::new(ParameterType::String));
        parameter_settings.insert(
            "tags",
            ParameterSetting::new(ParameterType::Stateful {
                parameter: std::sync::Arc::new(TagsParameter { store: store.clone() }),
                order: 1,
            }),
        );

        Self {
            store,
            settings: ResourceControllerSettings {
                type_id: "memory_kv".to_string(),
                allow_multiple: false,
                remove_stateful_parameters_before_destroy: true,
                dependencies: Vec::new(),
                import_required_parameters: Vec::new(),
                schema: None,
            },
            parameter_settings,
        }
    }
}

#[async_trait]
impl ResourceController for MemoryKvController {
    fn settings(&self) -> &ResourceControllerSettings {
        &self.settings
    }

    fn parameter_settings(&self) -> &ParameterSettingsMap {
        &self.parameter_settings
    }

    async fn validate(
        &self,
        _core_parameters: &ResourceConfigWire,
        desired: &HashMap<String, Value>,
    ) -> ValidationResult {
        match desired.get("value") {
            Some(Value::String(_)) | None => ValidationResult::ok(),
            Some(_) => ValidationResult::failed(vec!["`value` must be a string".to_string()]),
        }
    }

    async fn refresh(
        &self,
        _core_parameters: &ResourceConfigWire,
        _keys: &[String],
    ) -> Result<Option<HashMap<String, Value>>, ControllerError> {
        let store = self.store.lock().unwrap();
        Ok(store.as_ref().map(|r| {
            let mut current = HashMap::new();
            current.insert("value".to_string(), Value::String(r.value.clone()));
            current
        }))
    }

    async fn create(&self, plan: &Plan) -> Result<(), ControllerError> {
        let value = plan
            .desired_config()
            .get("value")
            .map(Value::coerce_string)
            .unwrap_or_default();
        *self.store.lock().unwrap() = Some(Record { value, tags: Vec::new() });
        Ok(())
    }

    async fn destroy(&self, _plan: &Plan) -> Result<(), ControllerError> {
        *self.store.lock().unwrap() = None;
        Ok(())
    }

    async fn modify(
        &self,
        name: &str,
        new_value: &Value,
        _previous_value: &Value,
        _plan: &Plan,
    ) -> Result<(), ControllerError> {
        if name != "value" {
            return Ok(());
        }
        let mut store = self.store.lock().unwrap();
        let Some(record) = store.as_mut() else {
            return Err(ControllerError::Other("memory_kv: modify with no record".to_string()));
        };
        record.value = new_value.coerce_string();
        Ok(())
    }

    async fn import(
        &self,
        _core_parameters: &ResourceConfigWire,
        _parameters: &HashMap<String, Value>,
    ) -> Result<Vec<HashMap<String, Value>>, ControllerError> {
        let store = self.store.lock().unwrap();
        Ok(store
            .as_ref()
            .map(|r| {
                let mut cfg = HashMap::new();
                cfg.insert("value".to_string(), Value::String(r.value.clone()));
                vec![cfg]
            })
            .unwrap_or_default())
    }
}
