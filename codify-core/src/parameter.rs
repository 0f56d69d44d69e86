//! Per-parameter contract (`ParameterSetting`) and the `is_same` equality
//! decision tree the differ consults for every key.

use std::collections::HashMap;
use std::sync::Arc;

use indexmap::IndexMap;

use crate::stateful_parameter::StatefulParameter;
use crate::value::{self, Value};

pub type EqualFn = Arc<dyn Fn(&Value, &Value) -> bool + Send + Sync>;
pub type TransformFn = Arc<dyn Fn(&Value) -> Value + Send + Sync>;

/// The parameter type, carrying the bound `StatefulParameter` and its apply
/// order when `Stateful`.
#[derive(Clone)]
pub enum ParameterType {
    Any,
    String,
    Number,
    Boolean,
    Array,
    Directory,
    Version,
    Stateful {
        parameter: Arc<dyn StatefulParameter>,
        order: i32,
    },
}

impl std::fmt::Debug for ParameterType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ParameterType::Any => write!(f, "Any"),
            ParameterType::String => write!(f, "String"),
            ParameterType::Number => write!(f, "Number"),
            ParameterType::Boolean => write!(f, "Boolean"),
            ParameterType::Array => write!(f, "Array"),
            ParameterType::Directory => write!(f, "Directory"),
            ParameterType::Version => write!(f, "Version"),
            ParameterType::Stateful { order, .. } => {
                write!(f, "Stateful {{ order: {order} }}")
            }
        }
    }
}

/// Per-parameter contract: type, default, equality overrides, modifiability.
#[derive(Clone)]
pub struct ParameterSetting {
    pub param_type: ParameterType,
    pub default: Option<Value>,
    pub is_equal: Option<EqualFn>,
    pub is_element_equal: Option<EqualFn>,
    /// `false` forces RECREATE on any change to this parameter.
    pub can_modify: bool,
    pub input_transformation: Option<TransformFn>,
}

impl Default for ParameterSetting {
    fn default() -> Self {
        Self {
            param_type: ParameterType::Any,
            default: None,
            is_equal: None,
            is_element_equal: None,
            can_modify: true,
            input_transformation: None,
        }
    }
}

impl ParameterSetting {
    pub fn new(param_type: ParameterType) -> Self {
        Self {
            param_type,
            ..Default::default()
        }
    }

    pub fn with_default(mut self, value: Value) -> Self {
        self.default = Some(value);
        self
    }

    pub fn with_is_equal(mut self, f: EqualFn) -> Self {
        self.is_equal = Some(f);
        self
    }

    pub fn with_is_element_equal(mut self, f: EqualFn) -> Self {
        self.is_element_equal = Some(f);
        self
    }

    pub fn not_modifiable(mut self) -> Self {
        self.can_modify = false;
        self
    }

    pub fn with_input_transformation(mut self, f: TransformFn) -> Self {
        self.input_transformation = Some(f);
        self
    }

    pub fn is_stateful(&self) -> bool {
        matches!(self.param_type, ParameterType::Stateful { .. })
    }

    pub fn stateful(&self) -> Option<(&Arc<dyn StatefulParameter>, i32)> {
        match &self.param_type {
            ParameterType::Stateful { parameter, order } => Some((parameter, *order)),
            _ => None,
        }
    }
}

/// The parsed, immutable set of per-parameter contracts for one resource
/// type. Parsed once at plugin initialization (spec section 4.6).
///
/// Backed by an `IndexMap` rather than a `HashMap` so `stateful_in_order()`
/// has a stable, declaration-order tie-break for parameters sharing the
/// same `order` — a plain `HashMap`'s iteration order bears no relation to
/// insertion order.
#[derive(Clone, Default)]
pub struct ParameterSettingsMap {
    settings: IndexMap<String, ParameterSetting>,
}

impl ParameterSettingsMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: impl Into<String>, setting: ParameterSetting) -> &mut Self {
        self.settings.insert(name.into(), setting);
        self
    }

    pub fn get(&self, name: &str) -> Option<&ParameterSetting> {
        self.settings.get(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &ParameterSetting)> {
        self.settings.iter()
    }

    /// Pre-computed default values for every parameter carrying a `default`,
    /// used by `Plan::from_wire` to fill in ADD rows missing a `new_value`.
    pub fn default_values(&self) -> HashMap<String, Value> {
        self.settings
            .iter()
            .filter_map(|(name, setting)| {
                setting.default.as_ref().map(|d| (name.clone(), d.clone()))
            })
            .collect()
    }

    /// Stateful parameters in ascending `order`, stable with respect to
    /// insertion order for ties.
    pub fn stateful_in_order(&self) -> Vec<(&String, &Arc<dyn StatefulParameter>, i32)> {
        let mut out: Vec<_> = self
            .settings
            .iter()
            .filter_map(|(name, setting)| {
                setting
                    .stateful()
                    .map(|(param, order)| (name, param, order))
            })
            .collect();
        out.sort_by_key(|(_, _, order)| *order);
        out
    }
}

/// The `isSame` decision tree from spec section 4.1, in order: custom
/// `isEqual` override, then array multiset comparison, then per-type
/// default coercion, then strict structural equality.
pub fn is_same(desired: &Value, current: &Value, setting: Option<&ParameterSetting>) -> bool {
    if let Some(setting) = setting
        && let Some(custom) = &setting.is_equal
    {
        return custom(desired, current);
    }

    if let (Value::Array(desired_items), Value::Array(current_items)) = (desired, current) {
        let element_eq: Option<&EqualFn> = setting.and_then(|s| s.is_element_equal.as_ref());
        return arrays_equal(desired_items, current_items, element_eq);
    }

    match setting.map(|s| &s.param_type) {
        Some(ParameterType::Boolean) => match (desired.coerce_bool(), current.coerce_bool()) {
            (Some(a), Some(b)) => a == b,
            _ => desired == current,
        },
        Some(ParameterType::Number) => match (desired.coerce_number(), current.coerce_number()) {
            (Some(a), Some(b)) => a == b,
            _ => desired == current,
        },
        Some(ParameterType::String) => desired.coerce_string() == current.coerce_string(),
        Some(ParameterType::Directory) => {
            value::normalize_directory(&desired.coerce_string())
                == value::normalize_directory(&current.coerce_string())
        }
        Some(ParameterType::Version) => {
            let desired_str = desired.coerce_string();
            let current_str = current.coerce_string();
            // Asymmetric by design: current tolerates extra suffix detail
            // (e.g. "1.2.3-rc1" satisfies a desired "1.2.3").
            current_str.contains(&desired_str)
        }
        Some(ParameterType::Array) => arrays_equal(
            desired.as_array().unwrap_or(&[]),
            current.as_array().unwrap_or(&[]),
            setting.and_then(|s| s.is_element_equal.as_ref()),
        ),
        // `Any` and stateful-typed parameters: strict equality, falling
        // back to structural recursion (which `PartialEq` on `Value`
        // already performs for nested arrays/objects).
        _ => desired == current,
    }
}

fn arrays_equal(desired: &[Value], current: &[Value], element_eq: Option<&EqualFn>) -> bool {
    if desired.len() != current.len() {
        return false;
    }
    let mut desired_sorted: Vec<&Value> = desired.iter().collect();
    let mut current_sorted: Vec<&Value> = current.iter().collect();
    desired_sorted.sort_by_key(|v| v.canonical_key());
    current_sorted.sort_by_key(|v| v.canonical_key());

    desired_sorted
        .into_iter()
        .zip(current_sorted)
        .all(|(d, c)| match element_eq {
            Some(f) => f(d, c),
            None => d == c,
        })
}
