//! Parameter values and the equality rules used by the diff algorithm.

use std::path::Path;

use indexmap::IndexMap;
use serde_json::Value as Json;

/// A parameter value, shaped like JSON but with an in-process
/// representation so equality coercions (`number`, `boolean`, `string`)
/// have somewhere to live without round-tripping through `serde_json`.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Bool(bool),
    Number(f64),
    String(String),
    Array(Vec<Value>),
    Object(IndexMap<String, Value>),
}

/// Shared `'static` null, so call sites needing `&Value::Null` as a
/// fallback (e.g. `Option::unwrap_or`) don't borrow a temporary.
pub const NULL: Value = Value::Null;

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn as_array(&self) -> Option<&[Value]> {
        match self {
            Value::Array(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    /// Coerce to a display string for `string`-typed equality and for the
    /// `version`/`directory` comparisons, which are always string-shaped.
    pub fn coerce_string(&self) -> String {
        match self {
            Value::Null => String::new(),
            Value::Bool(b) => b.to_string(),
            Value::Number(n) => format_number(*n),
            Value::String(s) => s.clone(),
            Value::Array(_) | Value::Object(_) => self.to_json().to_string(),
        }
    }

    /// Coerce to a number for `number`-typed equality. Strings that parse
    /// cleanly count; everything else is `None`.
    pub fn coerce_number(&self) -> Option<f64> {
        match self {
            Value::Number(n) => Some(*n),
            Value::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
            Value::String(s) => s.trim().parse::<f64>().ok(),
            _ => None,
        }
    }

    /// Coerce to a boolean for `boolean`-typed equality: `true`/`false`,
    /// `"true"`/`"false"` (case-insensitive), and `0`/`1` all coerce.
    pub fn coerce_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            Value::Number(n) if *n == 0.0 => Some(false),
            Value::Number(n) if *n == 1.0 => Some(true),
            Value::String(s) => match s.to_ascii_lowercase().as_str() {
                "true" => Some(true),
                "false" => Some(false),
                _ => None,
            },
            _ => None,
        }
    }

    pub fn to_json(&self) -> Json {
        match self {
            Value::Null => Json::Null,
            Value::Bool(b) => Json::Bool(*b),
            Value::Number(n) => serde_json::Number::from_f64(*n)
                .map(Json::Number)
                .unwrap_or(Json::Null),
            Value::String(s) => Json::String(s.clone()),
            Value::Array(items) => Json::Array(items.iter().map(Value::to_json).collect()),
            Value::Object(map) => {
                let mut obj = serde_json::Map::with_capacity(map.len());
                for (k, v) in map {
                    obj.insert(k.clone(), v.to_json());
                }
                Json::Object(obj)
            }
        }
    }

    pub fn from_json(json: &Json) -> Value {
        match json {
            Json::Null => Value::Null,
            Json::Bool(b) => Value::Bool(*b),
            Json::Number(n) => Value::Number(n.as_f64().unwrap_or_default()),
            Json::String(s) => Value::String(s.clone()),
            Json::Array(items) => Value::Array(items.iter().map(Value::from_json).collect()),
            Json::Object(obj) => {
                let mut map = IndexMap::with_capacity(obj.len());
                for (k, v) in obj {
                    map.insert(k.clone(), Value::from_json(v));
                }
                Value::Object(map)
            }
        }
    }

    /// A stable canonical string for an element, used to sort arrays before
    /// multiset comparison. Documented per the Design Notes: correct for
    /// JSON-scalar arrays, ambiguous (but deterministic) for heterogeneous
    /// or object arrays since object key order is normalized by `to_json`
    /// serialization.
    pub fn canonical_key(&self) -> String {
        self.to_json().to_string()
    }
}

fn format_number(n: f64) -> String {
    if n.fract() == 0.0 && n.abs() < 1e15 {
        format!("{}", n as i64)
    } else {
        n.to_string()
    }
}

/// Resolve `~` to the home directory and normalize path separators, so that
/// `~/x` and `<HOME>/x` (or a `\`-separated equivalent) compare equal.
pub fn normalize_directory(raw: &str) -> String {
    let expanded = if let Some(rest) = raw.strip_prefix("~/") {
        match std::env::var("HOME") {
            Ok(home) => format!("{home}/{rest}"),
            Err(_) => raw.to_string(),
        }
    } else if raw == "~" {
        std::env::var("HOME").unwrap_or_else(|_| raw.to_string())
    } else {
        raw.to_string()
    };

    let path = Path::new(&expanded);
    let mut normalized: Vec<&std::ffi::OsStr> = Vec::new();
    for component in path.components() {
        normalized.push(component.as_os_str());
    }
    normalized
        .iter()
        .map(|s| s.to_string_lossy().to_string())
        .collect::<Vec<_>>()
        .join("/")
}
