//! `Plan`: the immutable record of what `diff()` decided, carried between
//! `plan()` and `apply()` and round-tripped across the wire (spec section 4.2).

use std::collections::HashMap;

use codify_schemas::{
    OperationWire, ParameterChangeWire, ParameterOperationWire, PlanResponse, ResourceConfigWire,
};
use uuid::Uuid;

use crate::change_set::{
    ChangeSet, InternalInvariantError, ParameterChange, ParameterOperation, ResourceOperation,
};
use crate::parameter::ParameterSettingsMap;
use crate::value::Value;

#[derive(Debug, Clone, PartialEq)]
pub struct Plan {
    pub id: Uuid,
    pub core_parameters: ResourceConfigWire,
    pub change_set: ChangeSet,
    pub stateful_mode: bool,
    desired: HashMap<String, Value>,
    current: HashMap<String, Value>,
}

impl Plan {
    /// Run the diff algorithm and wrap the result with a fresh plan id.
    pub fn create(
        core_parameters: ResourceConfigWire,
        desired: HashMap<String, Value>,
        current: HashMap<String, Value>,
        settings: &ParameterSettingsMap,
        stateful_mode: bool,
    ) -> Result<Self, InternalInvariantError> {
        let change_set = ChangeSet::calculate(Some(&desired), &current, settings, stateful_mode)?;
        Ok(Self {
            id: Uuid::new_v4(),
            core_parameters,
            change_set,
            stateful_mode,
            desired,
            current,
        })
    }

    /// Wrap an already-computed `ChangeSet` (the `refresh() == None` branches
    /// of `plan()`, spec section 4.3 step 3, bypass `ChangeSet::calculate`).
    pub fn from_parts(
        core_parameters: ResourceConfigWire,
        change_set: ChangeSet,
        desired: HashMap<String, Value>,
        current: HashMap<String, Value>,
        stateful_mode: bool,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            core_parameters,
            change_set,
            stateful_mode,
            desired,
            current,
        }
    }

    pub fn requires_changes(&self) -> bool {
        self.change_set.requires_changes()
    }

    pub fn desired_config(&self) -> &HashMap<String, Value> {
        &self.desired
    }

    pub fn current_config(&self) -> &HashMap<String, Value> {
        &self.current
    }

    pub fn get_resource_type(&self) -> &str {
        &self.core_parameters.type_id
    }

    pub fn to_wire(&self) -> PlanResponse {
        PlanResponse {
            plan_id: self.id.to_string(),
            resource_type: self.core_parameters.type_id.clone(),
            operation: operation_to_wire(self.change_set.operation),
            parameters: self
                .change_set
                .parameter_changes
                .iter()
                .map(change_to_wire)
                .collect(),
        }
    }

    /// Reconstruct a `Plan` from a `PlanResponse` the orchestrator sent back
    /// in through `apply { plan: ... }` (spec section 6, the inline-plan
    /// apply path, as opposed to apply-by-`planId`). `settings` fills in any
    /// ADD row whose `newValue` the orchestrator omitted from its declared
    /// default, the way `plan()` itself does for a freshly-computed plan.
    pub fn from_wire(
        core_parameters: ResourceConfigWire,
        stateful_mode: bool,
        wire: &PlanResponse,
        settings: &ParameterSettingsMap,
    ) -> Result<Self, InternalInvariantError> {
        let id = Uuid::parse_str(&wire.plan_id)
            .map_err(|e| InternalInvariantError(format!("invalid plan id: {e}")))?;

        let defaults = settings.default_values();
        let mut desired = HashMap::new();
        let mut current = HashMap::new();
        let mut parameter_changes = Vec::with_capacity(wire.parameters.len());

        for row in &wire.parameters {
            let previous = row.previous_value.as_ref().map(Value::from_json);
            let operation = operation_from_wire(&row.operation);
            let new = row
                .new_value
                .as_ref()
                .map(Value::from_json)
                .or_else(|| (operation == ParameterOperation::Add).then(|| defaults.get(&row.name).cloned()).flatten());
            if let Some(v) = &previous {
                current.insert(row.name.clone(), v.clone());
            }
            if let Some(v) = &new {
                desired.insert(row.name.clone(), v.clone());
            }
            parameter_changes.push(ParameterChange {
                name: row.name.clone(),
                operation,
                previous_value: previous,
                new_value: new,
            });
        }

        let change_set = ChangeSet {
            operation: resource_operation_from_wire(&wire.operation),
            parameter_changes,
        };

        Ok(Self {
            id,
            core_parameters,
            change_set,
            stateful_mode,
            desired,
            current,
        })
    }
}

fn operation_to_wire(op: ResourceOperation) -> OperationWire {
    match op {
        ResourceOperation::Noop => OperationWire::Noop,
        ResourceOperation::Modify => OperationWire::Modify,
        ResourceOperation::Recreate => OperationWire::Recreate,
        ResourceOperation::Create => OperationWire::Create,
        ResourceOperation::Destroy => OperationWire::Destroy,
    }
}

fn resource_operation_from_wire(op: &OperationWire) -> ResourceOperation {
    match op {
        OperationWire::Noop => ResourceOperation::Noop,
        OperationWire::Modify => ResourceOperation::Modify,
        OperationWire::Recreate => ResourceOperation::Recreate,
        OperationWire::Create => ResourceOperation::Create,
        OperationWire::Destroy => ResourceOperation::Destroy,
    }
}

fn change_to_wire(change: &ParameterChange) -> ParameterChangeWire {
    ParameterChangeWire {
        name: change.name.clone(),
        operation: match change.operation {
            ParameterOperation::Noop => ParameterOperationWire::Noop,
            ParameterOperation::Add => ParameterOperationWire::Add,
            ParameterOperation::Modify => ParameterOperationWire::Modify,
            ParameterOperation::Remove => ParameterOperationWire::Remove,
        },
        previous_value: change.previous_value.as_ref().map(Value::to_json),
        new_value: change.new_value.as_ref().map(Value::to_json),
    }
}

fn operation_from_wire(op: &ParameterOperationWire) -> ParameterOperation {
    match op {
        ParameterOperationWire::Noop => ParameterOperation::Noop,
        ParameterOperationWire::Add => ParameterOperation::Add,
        ParameterOperationWire::Modify => ParameterOperation::Modify,
        ParameterOperationWire::Remove => ParameterOperation::Remove,
    }
}
