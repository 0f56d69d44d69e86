//! Wire protocol types exchanged with the orchestrator, and JSON Schema
//! validation of request/response payloads.
//!
//! This crate is the "published schemas" dependency referenced by the
//! plugin core: it owns the shapes that cross the process boundary, never
//! the diff/plan/apply logic itself.

mod validate;
mod wire;

pub use validate::{SchemaValidationError, Validator};
pub use wire::{
    ApplyRequest, ApplyResponse, GetResourceInfoRequest, GetResourceInfoResponse,
    ImportRequest, ImportResponse, InitializeResponse, OperationWire, ParameterChangeWire,
    ParameterOperationWire, PlanRequest, PlanResponse, RequestEnvelope, ResourceConfigWire,
    ResourceInfo, ResponseBody, ResponseEnvelope, ValidateRequest, ValidateResponse,
};
