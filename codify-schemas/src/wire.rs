//! Wire shapes for the request/response protocol described in spec section 6.
//!
//! These are intentionally flat, serde-derived structs: they are the
//! boundary format, not the in-process model (`codify_core` has its own
//! richer types and converts to/from these).

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::Value as Json;

/// Envelope wrapping every request read from the orchestrator, carrying a
/// correlation id the response must echo back.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "command", content = "payload", rename_all = "camelCase")]
pub enum RequestEnvelope {
    Initialize,
    GetResourceInfo(GetResourceInfoRequest),
    Validate(ValidateRequest),
    Plan(PlanRequest),
    Apply(ApplyRequest),
    Import(ImportRequest),
}

/// Envelope wrapping every response written back to the orchestrator.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResponseEnvelope {
    pub request_id: String,
    #[serde(flatten)]
    pub body: ResponseBody,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "camelCase")]
pub enum ResponseBody {
    Ok { result: Json },
    Error { message: String },
}

/// Core parameters identifying a resource instance (spec section 3).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "camelCase")]
pub struct ResourceConfigWire {
    #[serde(rename = "type")]
    pub type_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GetResourceInfoRequest {
    #[serde(rename = "type")]
    pub type_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GetResourceInfoResponse {
    #[serde(rename = "type")]
    pub type_id: String,
    pub schema: Option<Json>,
    pub dependencies: Vec<String>,
    pub allow_multiple: bool,
    pub import_required_parameters: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InitializeResponse {
    pub resources: Vec<ResourceInfo>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceInfo {
    #[serde(rename = "type")]
    pub type_id: String,
    pub dependencies: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidateRequest {
    pub core_parameters: ResourceConfigWire,
    pub parameters: HashMap<String, Json>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidateResponse {
    pub is_valid: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub errors: Option<Vec<String>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlanRequest {
    pub core_parameters: ResourceConfigWire,
    /// `None` represents the desired config being entirely absent
    /// (stateful mode "delete everything" case from spec section 8 scenario 1).
    pub desired: Option<HashMap<String, Json>>,
    pub state: Option<HashMap<String, Json>>,
    pub stateful_mode: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum OperationWire {
    Noop,
    Modify,
    Recreate,
    Create,
    Destroy,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum ParameterOperationWire {
    Noop,
    Add,
    Modify,
    Remove,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ParameterChangeWire {
    pub name: String,
    pub operation: ParameterOperationWire,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub previous_value: Option<Json>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub new_value: Option<Json>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PlanResponse {
    pub plan_id: String,
    pub resource_type: String,
    pub operation: OperationWire,
    pub parameters: Vec<ParameterChangeWire>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApplyRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub plan_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub plan: Option<PlanResponse>,
    /// Only consulted when `plan` is supplied inline (no `planId`): the
    /// `statefulMode` a stored plan already carries from its `plan()` call.
    #[serde(default)]
    pub stateful_mode: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApplyResponse {
    pub applied: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportRequest {
    pub core_parameters: ResourceConfigWire,
    pub parameters: HashMap<String, Json>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportResponse {
    pub configs: Vec<HashMap<String, Json>>,
}
