//! ChangeSet - pure diff between desired and current parameter maps.
//!
//! Compares the desired configuration against the observed current
//! configuration under stateful or stateless semantics (spec section 4.1)
//! and reduces the per-parameter changes to a single `ResourceOperation`.
//!
//! No I/O; deterministic; the only failure mode is an internal invariant
//! violation, which is returned as an error rather than panicking.

use std::collections::HashMap;

use thiserror::Error;

use crate::parameter::{is_same, ParameterSettingsMap};
use crate::value::Value;

#[derive(Debug, Error)]
#[error("Diff algorithm error: {0}")]
pub struct InternalInvariantError(pub String);

/// Coarse-grained verb for the whole resource. Strict total order:
/// `Noop < Modify < Recreate < Create < Destroy`; declaration order below
/// is load-bearing for the derived `Ord`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ResourceOperation {
    Noop,
    Modify,
    Recreate,
    Create,
    Destroy,
}

impl ResourceOperation {
    /// Reduction combinator: commutative, associative, equals `max` under
    /// the declared ordering (spec section 8, property P5).
    pub fn combine(self, other: ResourceOperation) -> ResourceOperation {
        self.max(other)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParameterOperation {
    Noop,
    Add,
    Modify,
    Remove,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ParameterChange {
    pub name: String,
    pub operation: ParameterOperation,
    pub previous_value: Option<Value>,
    pub new_value: Option<Value>,
}

impl ParameterChange {
    fn noop(name: impl Into<String>, value: Value) -> Self {
        Self {
            name: name.into(),
            operation: ParameterOperation::Noop,
            previous_value: Some(value.clone()),
            new_value: Some(value),
        }
    }

    fn add(name: impl Into<String>, new_value: Value) -> Self {
        Self {
            name: name.into(),
            operation: ParameterOperation::Add,
            previous_value: None,
            new_value: Some(new_value),
        }
    }

    fn remove(name: impl Into<String>, previous_value: Value) -> Self {
        Self {
            name: name.into(),
            operation: ParameterOperation::Remove,
            previous_value: Some(previous_value),
            new_value: None,
        }
    }

    fn modify(name: impl Into<String>, previous_value: Value, new_value: Value) -> Self {
        Self {
            name: name.into(),
            operation: ParameterOperation::Modify,
            previous_value: Some(previous_value),
            new_value: Some(new_value),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ChangeSet {
    pub operation: ResourceOperation,
    pub parameter_changes: Vec<ParameterChange>,
}

impl ChangeSet {
    /// All NOOP — used when neither side requires work (e.g. resource
    /// absent in both desired and observed state).
    pub fn empty() -> Self {
        Self {
            operation: ResourceOperation::Noop,
            parameter_changes: Vec::new(),
        }
    }

    /// All ADD, resource operation forced to CREATE.
    pub fn create(desired: &HashMap<String, Value>) -> Self {
        let parameter_changes = desired
            .iter()
            .filter(|(_, v)| !v.is_null())
            .map(|(k, v)| ParameterChange::add(k.clone(), v.clone()))
            .collect();
        Self {
            operation: ResourceOperation::Create,
            parameter_changes,
        }
    }

    /// All REMOVE, resource operation forced to DESTROY.
    pub fn destroy(current: &HashMap<String, Value>) -> Self {
        let parameter_changes = current
            .iter()
            .map(|(k, v)| ParameterChange::remove(k.clone(), v.clone()))
            .collect();
        Self {
            operation: ResourceOperation::Destroy,
            parameter_changes,
        }
    }

    pub fn requires_changes(&self) -> bool {
        self.operation != ResourceOperation::Noop
    }

    /// Invariant check used by property tests (spec section 8, P4): the
    /// resource operation is NOOP iff every row is NOOP.
    pub fn is_noop_consistent(&self) -> bool {
        let all_noop = self
            .parameter_changes
            .iter()
            .all(|c| c.operation == ParameterOperation::Noop);
        (self.operation == ResourceOperation::Noop) == all_noop
    }

    /// The full stateful/stateless diff described in spec section 4.1.
    ///
    /// `desired: None` is distinct from `Some(&HashMap::new())`: it means
    /// the orchestrator sent no desired configuration at all for a resource
    /// that currently exists, i.e. "this resource should no longer exist".
    /// In stateful mode that forces a whole-resource DESTROY (scenario 1)
    /// rather than per-key removals reduced through `reduce()`.
    pub fn calculate(
        desired: Option<&HashMap<String, Value>>,
        current: &HashMap<String, Value>,
        settings: &ParameterSettingsMap,
        stateful_mode: bool,
    ) -> Result<ChangeSet, InternalInvariantError> {
        if stateful_mode {
            match desired {
                None => Ok(Self::destroy(current)),
                Some(desired) => Self::calculate_stateful(desired, current, settings),
            }
        } else {
            let empty = HashMap::new();
            Ok(Self::calculate_stateless(desired.unwrap_or(&empty), current, settings))
        }
    }

    fn calculate_stateful(
        desired: &HashMap<String, Value>,
        current: &HashMap<String, Value>,
        settings: &ParameterSettingsMap,
    ) -> Result<ChangeSet, InternalInvariantError> {
        let mut remaining_current: HashMap<String, Value> = current.clone();
        let mut remaining_desired: HashMap<String, Value> = desired.clone();
        let mut changes = Vec::new();
        let mut operation = ResourceOperation::Noop;

        for key in current.keys() {
            let current_value = remaining_current.remove(key).expect("key from current");
            // Spec open question: missing and null desired[k] are
            // treated identically in stateful mode.
            let desired_value = remaining_desired
                .remove(key)
                .filter(|v| !v.is_null());

            match desired_value {
                None => {
                    changes.push(ParameterChange::remove(key.clone(), current_value));
                    operation = operation.combine(reduce(key, settings));
                }
                Some(desired_value) => {
                    let setting = settings.get(key);
                    if is_same(&desired_value, &current_value, setting) {
                        changes.push(ParameterChange::noop(key.clone(), current_value));
                    } else {
                        changes.push(ParameterChange::modify(
                            key.clone(),
                            current_value,
                            desired_value,
                        ));
                        operation = operation.combine(reduce(key, settings));
                    }
                }
            }
        }

        if !remaining_current.is_empty() {
            return Err(InternalInvariantError(format!(
                "current map not fully consumed: {:?}",
                remaining_current.keys().collect::<Vec<_>>()
            )));
        }

        // Remaining desired keys (not present in current) — plus any
        // desired keys whose value was literally null were already
        // filtered above and fall through to here since they were never
        // removed from `remaining_desired` if their key wasn't in
        // `current`; normalize that corner case by filtering nulls too.
        for (key, value) in remaining_desired.into_iter() {
            if value.is_null() {
                continue;
            }
            changes.push(ParameterChange::add(key.clone(), value));
            operation = operation.combine(ResourceOperation::Modify.max(reduce(&key, settings)));
        }

        Ok(ChangeSet {
            operation,
            parameter_changes: changes,
        })
    }

    fn calculate_stateless(
        desired: &HashMap<String, Value>,
        current: &HashMap<String, Value>,
        settings: &ParameterSettingsMap,
    ) -> ChangeSet {
        let mut changes = Vec::new();
        let mut operation = ResourceOperation::Noop;

        for (key, desired_value) in desired {
            match current.get(key) {
                None => {
                    changes.push(ParameterChange::add(key.clone(), desired_value.clone()));
                    operation = operation.combine(reduce(key, settings));
                }
                Some(current_value) => {
                    let setting = settings.get(key);
                    if is_same(desired_value, current_value, setting) {
                        changes.push(ParameterChange::noop(key.clone(), current_value.clone()));
                    } else {
                        changes.push(ParameterChange::modify(
                            key.clone(),
                            current_value.clone(),
                            desired_value.clone(),
                        ));
                        operation = operation.combine(reduce(key, settings));
                    }
                }
            }
        }

        ChangeSet {
            operation,
            parameter_changes: changes,
        }
    }
}

/// Resource-operation candidate for a single changed parameter: stateful
/// parameters and modifiable parameters only ever force MODIFY; anything
/// else forces RECREATE.
fn reduce(name: &str, settings: &ParameterSettingsMap) -> ResourceOperation {
    match settings.get(name) {
        Some(setting) if setting.is_stateful() => ResourceOperation::Modify,
        Some(setting) if setting.can_modify => ResourceOperation::Modify,
        Some(_) => ResourceOperation::Recreate,
        // No declared setting: default to modifiable, matching
        // `ParameterSetting::default().can_modify == true`.
        None => ResourceOperation::Modify,
    }
}
