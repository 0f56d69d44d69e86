//! Reference `ResourceController` that drives the execution channel (spec
//! section 4.5) instead of holding its own in-memory state: every
//! refresh/create/destroy/modify runs a plain shell command against
//! whatever channel `codify_exec::current_channel()` resolves to for the
//! plan currently in scope.
//!
//! The resource identity is the file path itself, carried as
//! `coreParameters.name` — there is exactly one tracked parameter,
//! `content`, so there is nothing left to disambiguate by.

use std::collections::HashMap;

use async_trait::async_trait;
use codify_core::{
    ControllerError, ParameterSetting, ParameterSettingsMap, ParameterType, Plan,
    ResourceConfigWire, ResourceController, ResourceControllerSettings, ValidationResult, Value,
};

fn shell_quote(s: &str) -> String {
    format!("'{}'", s.replace('\'', "'\\''"))
}

fn path_of(plan: &Plan) -> Result<String, ControllerError> {
    plan.core_parameters
        .name
        .clone()
        .ok_or_else(|| ControllerError::Other("shell_file: coreParameters.name is required".to_string()))
}

/// A file on disk, managed entirely through shell commands issued on the
/// plan's execution channel.
#[derive(Default)]
pub struct ShellFileController {
    settings: ResourceControllerSettings,
    parameter_settings: ParameterSettingsMap,
}

impl ShellFileController {
    pub fn new() -> Self {
        let mut parameter_settings = ParameterSettingsMap::new();
        parameter_settings.insert("content", ParameterSetting::new(ParameterType::String));
        Self {
            settings: ResourceControllerSettings {
                type_id: "shell_file".to_string(),
                allow_multiple: true,
                remove_stateful_parameters_before_destroy: false,
                dependencies: Vec::new(),
                import_required_parameters: Vec::new(),
                schema: None,
            },
            parameter_settings,
        }
    }
}

#[async_trait]
impl ResourceController for ShellFileController {
    fn settings(&self) -> &ResourceControllerSettings {
        &self.settings
    }

    fn parameter_settings(&self) -> &ParameterSettingsMap {
        &self.parameter_settings
    }

    async fn validate(
        &self,
        core_parameters: &ResourceConfigWire,
        _desired: &HashMap<String, Value>,
    ) -> ValidationResult {
        match &core_parameters.name {
            Some(_) => ValidationResult::ok(),
            None => ValidationResult::failed(vec!["shell_file requires a `name` (the file path)".to_string()]),
        }
    }

    async fn refresh(
        &self,
        core_parameters: &ResourceConfigWire,
        _keys: &[String],
    ) -> Result<Option<HashMap<String, Value>>, ControllerError> {
        let Some(path) = &core_parameters.name else {
            return Ok(None);
        };
        let channel = codify_exec::current_channel();

        // A missing file is the ordinary "doesn't exist yet" outcome, not a
        // failure, so probe with `spawn_safe` rather than `spawn`.
        let probe = channel.spawn_safe(&format!("test -f {}", shell_quote(path))).await;
        if !probe.status {
            return Ok(None);
        }

        let read = channel.spawn(&format!("cat {}", shell_quote(path))).await?;
        let mut current = HashMap::new();
        current.insert("content".to_string(), Value::String(read.data));
        Ok(Some(current))
    }

    async fn create(&self, plan: &Plan) -> Result<(), ControllerError> {
        let path = path_of(plan)?;
        let content = plan
            .desired_config()
            .get("content")
            .map(Value::coerce_string)
            .unwrap_or_default();
        let channel = codify_exec::current_channel();
        channel
            .spawn(&format!("printf '%s' {} > {}", shell_quote(&content), shell_quote(&path)))
            .await?;
        Ok(())
    }

    async fn destroy(&self, plan: &Plan) -> Result<(), ControllerError> {
        let path = path_of(plan)?;
        let channel = codify_exec::current_channel();
        channel.spawn(&format!("rm -f {}", shell_quote(&path))).await?;
        Ok(())
    }

    async fn modify(
        &self,
        name: &str,
        new_value: &Value,
        _previous_value: &Value,
        plan: &Plan,
    ) -> Result<(), ControllerError> {
        if name != "content" {
            return Ok(());
        }
        let path = path_of(plan)?;
        let channel = codify_exec::current_channel();
        channel
            .spawn(&format!(
                "printf '%s' {} > {}",
                shell_quote(&new_value.coerce_string()),
                shell_quote(&path)
            ))
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use codify_exec::ExecutionChannel;
    use std::sync::Arc;

    fn core(path: &std::path::Path) -> ResourceConfigWire {
        ResourceConfigWire {
            type_id: "shell_file".to_string(),
            name: Some(path.to_string_lossy().into_owned()),
        }
    }

    async fn with_fresh_channel<F, Fut, T>(f: F) -> T
    where
        F: FnOnce() -> Fut,
        Fut: std::future::Future<Output = T>,
    {
        let channel = Arc::new(ExecutionChannel::spawn_shell().unwrap());
        codify_exec::with_channel(channel, f()).await
    }

    #[tokio::test]
    async fn plan_against_a_missing_file_proposes_create() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("greeting.txt");
        let controller = ShellFileController::new();

        let plan = with_fresh_channel(|| async {
            let mut desired = HashMap::new();
            desired.insert("content".to_string(), Value::String("hello".to_string()));
            codify_core::run_plan(&controller, core(&path), Some(desired), None, true)
                .await
                .unwrap()
        })
        .await;

        assert_eq!(plan.change_set.operation, codify_core::ResourceOperation::Create);
    }

    #[tokio::test]
    async fn create_then_apply_writes_the_file_and_replan_is_noop() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("greeting.txt");
        let controller = ShellFileController::new();

        with_fresh_channel(|| async {
            let mut desired = HashMap::new();
            desired.insert("content".to_string(), Value::String("hello".to_string()));
            let plan = codify_core::run_plan(&controller, core(&path), Some(desired.clone()), None, true)
                .await
                .unwrap();
            codify_core::run_apply(&controller, &plan).await.unwrap();

            let replanned = codify_core::run_plan(&controller, core(&path), Some(desired), None, true)
                .await
                .unwrap();
            assert!(!replanned.requires_changes());
        })
        .await;

        assert_eq!(std::fs::read_to_string(&path).unwrap(), "hello");
    }

    #[tokio::test]
    async fn modifying_content_rewrites_the_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("greeting.txt");
        let controller = ShellFileController::new();

        with_fresh_channel(|| async {
            let mut desired = HashMap::new();
            desired.insert("content".to_string(), Value::String("v1".to_string()));
            let plan = codify_core::run_plan(&controller, core(&path), Some(desired), None, true)
                .await
                .unwrap();
            codify_core::run_apply(&controller, &plan).await.unwrap();

            let mut desired2 = HashMap::new();
            desired2.insert("content".to_string(), Value::String("v2".to_string()));
            let plan2 = codify_core::run_plan(&controller, core(&path), Some(desired2), None, true)
                .await
                .unwrap();
            assert_eq!(plan2.change_set.operation, codify_core::ResourceOperation::Modify);
            codify_core::run_apply(&controller, &plan2).await.unwrap();
        })
        .await;

        assert_eq!(std::fs::read_to_string(&path).unwrap(), "v2");
    }

    #[tokio::test]
    async fn destroy_removes_the_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("greeting.txt");
        let controller = ShellFileController::new();

        with_fresh_channel(|| async {
            let mut desired = HashMap::new();
            desired.insert("content".to_string(), Value::String("hello".to_string()));
            let plan = codify_core::run_plan(&controller, core(&path), Some(desired), None, true)
                .await
                .unwrap();
            codify_core::run_apply(&controller, &plan).await.unwrap();

            let destroy_plan = codify_core::run_plan(&controller, core(&path), None, None, true)
                .await
                .unwrap();
            assert_eq!(destroy_plan.change_set.operation, codify_core::ResourceOperation::Destroy);
            codify_core::run_apply(&controller, &destroy_plan).await.unwrap();
        })
        .await;

        assert!(!path.exists());
    }
}
