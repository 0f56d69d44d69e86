//! Registry of resource controllers, plan storage and the post-apply
//! re-verification loop (spec section 4.6).

use std::collections::HashMap;
use std::sync::Arc;

use codify_core::{
    ControllerError, Plan, ResourceController, UnknownResourceTypeError, ValidationResult, Value,
};
use codify_exec::ExecutionChannel;
use codify_schemas::{GetResourceInfoResponse, ImportResponse, PlanResponse, ResourceConfigWire, ResourceInfo};
use tokio::sync::Mutex;
use uuid::Uuid;

struct StoredPlan {
    resource_type: String,
    plan: Plan,
    channel: Arc<ExecutionChannel>,
}

/// Owns every registered controller and the by-id plan-storage map.
/// Plans are written once (at `plan()` time) and read once (at `apply()`
/// time) — create-once, read-many, exactly as spec section 3 describes.
pub struct Plugin {
    controllers: HashMap<String, Arc<dyn ResourceController>>,
    plans: Mutex<HashMap<Uuid, StoredPlan>>,
}

impl Plugin {
    pub fn new(controllers: Vec<Arc<dyn ResourceController>>) -> Self {
        let controllers = controllers
            .into_iter()
            .map(|c| (c.settings().type_id.clone(), c))
            .collect();
        Self {
            controllers,
            plans: Mutex::new(HashMap::new()),
        }
    }

    /// Parsed controller settings, returned for the `initialize` response.
    pub fn initialize(&self) -> Vec<ResourceInfo> {
        let mut resources: Vec<ResourceInfo> = self
            .controllers
            .values()
            .map(|c| ResourceInfo {
                type_id: c.settings().type_id.clone(),
                dependencies: c.settings().dependencies.clone(),
            })
            .collect();
        resources.sort_by(|a, b| a.type_id.cmp(&b.type_id));
        resources
    }

    fn controller(&self, type_id: &str) -> Result<&Arc<dyn ResourceController>, UnknownResourceTypeError> {
        self.controllers
            .get(type_id)
            .ok_or_else(|| UnknownResourceTypeError(type_id.to_string()))
    }

    pub fn get_resource_info(&self, type_id: &str) -> Result<GetResourceInfoResponse, ControllerError> {
        let controller = self.controller(type_id)?;
        let settings = controller.settings();
        Ok(GetResourceInfoResponse {
            type_id: settings.type_id.clone(),
            schema: settings.schema.clone(),
            dependencies: settings.dependencies.clone(),
            allow_multiple: settings.allow_multiple,
            import_required_parameters: settings.import_required_parameters.clone(),
        })
    }

    pub async fn validate(
        &self,
        core_parameters: &ResourceConfigWire,
        desired: &HashMap<String, Value>,
    ) -> Result<ValidationResult, ControllerError> {
        let controller = self.controller(&core_parameters.type_id)?;
        Ok(controller.validate(core_parameters, desired).await)
    }

    pub async fn plan(
        &self,
        core_parameters: ResourceConfigWire,
        desired: Option<HashMap<String, Value>>,
        state: Option<HashMap<String, Value>>,
        stateful_mode: bool,
    ) -> Result<Plan, ControllerError> {
        let controller = self.controller(&core_parameters.type_id)?.clone();
        let channel = Arc::new(
            ExecutionChannel::spawn_shell()
                .map_err(|e| ControllerError::Other(format!("failed to spawn execution channel: {e}")))?,
        );

        let type_id = core_parameters.type_id.clone();
        let plan = codify_exec::with_channel(
            channel.clone(),
            codify_core::run_plan(
                controller.as_ref(),
                core_parameters,
                desired,
                state,
                stateful_mode,
            ),
        )
        .await?;

        self.plans.lock().await.insert(
            plan.id,
            StoredPlan {
                resource_type: type_id,
                plan: plan.clone(),
                channel,
            },
        );

        Ok(plan)
    }

    /// Apply a plan previously stored by `plan()`, keyed by its id.
    pub async fn apply_by_id(&self, plan_id: Uuid) -> Result<(), ControllerError> {
        let (resource_type, plan, channel) = {
            let plans = self.plans.lock().await;
            let stored = plans
                .get(&plan_id)
                .ok_or_else(|| ControllerError::Other(format!("unknown plan id: {plan_id}")))?;
            (
                stored.resource_type.clone(),
                stored.plan.clone(),
                stored.channel.clone(),
            )
        };
        self.apply_stored(resource_type, plan, channel).await
    }

    /// Apply a plan reconstructed from its inline wire form (the
    /// orchestrator never called `plan()` against this plugin instance, or
    /// the stored plan already expired) — spawns a fresh channel since none
    /// was bound to it.
    pub async fn apply_wire(&self, wire: &PlanResponse, stateful_mode: bool) -> Result<(), ControllerError> {
        let controller = self.controller(&wire.resource_type)?.clone();
        let core_parameters = ResourceConfigWire {
            type_id: wire.resource_type.clone(),
            name: None,
        };
        let plan = Plan::from_wire(core_parameters, stateful_mode, wire, controller.parameter_settings())
            .map_err(ControllerError::Internal)?;
        let channel = Arc::new(
            ExecutionChannel::spawn_shell()
                .map_err(|e| ControllerError::Other(format!("failed to spawn execution channel: {e}")))?,
        );
        self.apply_stored(wire.resource_type.clone(), plan, channel).await
    }

    async fn apply_stored(
        &self,
        resource_type: String,
        plan: Plan,
        channel: Arc<ExecutionChannel>,
    ) -> Result<(), ControllerError> {
        let controller = self.controller(&resource_type)?.clone();

        codify_exec::with_channel(channel.clone(), codify_core::run_apply(controller.as_ref(), &plan))
            .await?;

        self.verify(&controller, &plan).await
    }

    /// Re-plan the same inputs in a fresh channel; apply is rejected unless
    /// the residual operation is NOOP (spec section 4.6 / P3).
    async fn verify(&self, controller: &Arc<dyn ResourceController>, plan: &Plan) -> Result<(), ControllerError> {
        let verification_channel = Arc::new(
            ExecutionChannel::spawn_shell()
                .map_err(|e| ControllerError::Other(format!("failed to spawn verification channel: {e}")))?,
        );

        let residual = codify_exec::with_channel(
            verification_channel.clone(),
            codify_core::run_plan(
                controller.as_ref(),
                plan.core_parameters.clone(),
                Some(plan.desired_config().clone()),
                None,
                plan.stateful_mode,
            ),
        )
        .await?;

        verification_channel.kill().await;

        if residual.requires_changes() {
            return Err(ControllerError::ApplyValidation(
                codify_core::ApplyValidationError::from_residual_plan(&residual),
            ));
        }

        Ok(())
    }

    pub async fn import(
        &self,
        core_parameters: &ResourceConfigWire,
        parameters: &HashMap<String, Value>,
    ) -> Result<ImportResponse, ControllerError> {
        let controller = self.controller(&core_parameters.type_id)?;
        let configs = controller.import(core_parameters, parameters).await?;
        Ok(ImportResponse {
            configs: configs
                .into_iter()
                .map(|cfg| cfg.into_iter().map(|(k, v)| (k, v.to_json())).collect())
                .collect(),
        })
    }

    /// Whole-graph checks after per-resource validation. No-op by default
    /// (spec section 4.6); left as a hook for future cross-resource rules.
    pub fn cross_validate_resources(&self, _configs: &[ResourceConfigWire]) -> ValidationResult {
        ValidationResult::ok()
    }

    pub async fn kill(&self) {
        let plans = self.plans.lock().await;
        for stored in plans.values() {
            stored.channel.kill().await;
        }
    }
}
