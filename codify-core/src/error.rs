//! Error taxonomy shared by the controller state machine and its callers.

use thiserror::Error;

use crate::change_set::InternalInvariantError;
use codify_schemas::SchemaValidationError;

/// Returned (never thrown past a function boundary) by `validate()`;
/// an invalid config is an expected outcome, not an error path.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ValidationResult {
    pub is_valid: bool,
    pub errors: Vec<String>,
}

impl ValidationResult {
    pub fn ok() -> Self {
        Self {
            is_valid: true,
            errors: Vec::new(),
        }
    }

    pub fn failed(errors: Vec<String>) -> Self {
        Self {
            is_valid: false,
            errors,
        }
    }
}

#[derive(Debug, Error)]
#[error("unknown resource type: {0}")]
pub struct UnknownResourceTypeError(pub String);

/// A spawned command exited non-zero or otherwise failed. `data` carries
/// whatever stdout/stderr the plugin author chose to attach.
#[derive(Debug, Error)]
#[error("command `{cmd}` failed with exit code {exit_code:?}")]
pub struct SpawnError {
    pub cmd: String,
    pub exit_code: Option<i32>,
    pub data: String,
}

/// Re-verification after `apply()` found the resource was not left in the
/// state the plan promised. Carries the residual plan (what is still
/// different) so the caller can decide whether to retry or surface it.
#[derive(Debug, Error)]
pub struct ApplyValidationError {
    pub resource_type: String,
    pub residual: String,
}

impl std::fmt::Display for ApplyValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "apply() for `{}` did not converge; residual changes:\n{}",
            self.resource_type, self.residual
        )
    }
}

impl ApplyValidationError {
    /// Pretty-print a residual plan as `{operation, parameters:[{name,
    /// operation, currentValue, desiredValue}]}`, per spec section 7.
    pub fn from_residual_plan(plan: &crate::plan::Plan) -> Self {
        use serde_json::json;

        let rows: Vec<_> = plan
            .change_set
            .parameter_changes
            .iter()
            .map(|c| {
                json!({
                    "name": c.name,
                    "operation": format!("{:?}", c.operation).to_lowercase(),
                    "currentValue": c.previous_value.as_ref().map(crate::value::Value::to_json),
                    "desiredValue": c.new_value.as_ref().map(crate::value::Value::to_json),
                })
            })
            .collect();

        let residual = json!({
            "operation": format!("{:?}", plan.change_set.operation).to_lowercase(),
            "parameters": rows,
        });

        Self {
            resource_type: plan.get_resource_type().to_string(),
            residual: serde_json::to_string_pretty(&residual).unwrap_or_default(),
        }
    }
}

/// Errors a `ResourceController` or `StatefulParameter` implementation can
/// surface from `refresh`/`plan`/`apply`/`import`.
#[derive(Debug, Error)]
pub enum ControllerError {
    #[error(transparent)]
    Internal(#[from] InternalInvariantError),

    #[error(transparent)]
    Spawn(#[from] SpawnError),

    #[error(transparent)]
    Schema(#[from] SchemaValidationError),

    #[error(transparent)]
    ApplyValidation(#[from] ApplyValidationError),

    #[error("unknown resource type: {0}")]
    UnknownResourceType(String),

    #[error("{0}")]
    Other(String),
}

impl From<UnknownResourceTypeError> for ControllerError {
    fn from(e: UnknownResourceTypeError) -> Self {
        ControllerError::UnknownResourceType(e.0)
    }
}
