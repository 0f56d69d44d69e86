//! ChangeSet diff, Plan lifecycle and ResourceController state machine.
//!
//! This crate is the planning/apply engine described by the workspace's
//! resource-plugin framework: it has no knowledge of how requests arrive
//! (see `codify-plugin-host`) or how shell commands are actually executed
//! (see `codify-exec`).

mod change_set;
mod controller;
mod error;
mod parameter;
mod plan;
mod stateful_parameter;
mod value;

pub use change_set::{ChangeSet, InternalInvariantError, ParameterChange, ParameterOperation, ResourceOperation};
pub use controller::{plan as run_plan, apply as run_apply, ResourceController, ResourceControllerSettings};
pub use error::{ApplyValidationError, ControllerError, SpawnError, UnknownResourceTypeError, ValidationResult};
pub use parameter::{is_same, EqualFn, ParameterSetting, ParameterSettingsMap, ParameterType, TransformFn};
pub use plan::Plan;
pub use stateful_parameter::StatefulParameter;
pub use value::{normalize_directory, Value};

// Re-exported so downstream `ResourceController` implementations only need
// to depend on this crate, not on `codify-schemas` directly, for the one
// wire type their trait methods are written in terms of.
pub use codify_schemas::ResourceConfigWire;
