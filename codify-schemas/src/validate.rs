//! JSON Schema validation of request/response payloads.
//!
//! The core does not implement JSON Schema itself (spec section 1 lists it
//! as an external collaborator); this module is a thin wrapper around the
//! `jsonschema` crate that the rest of the workspace calls through.

use serde_json::Value as Json;
use thiserror::Error;

/// Request payload rejected by the published wire schema.
#[derive(Debug, Error)]
pub enum SchemaValidationError {

    #[error("schema is not valid JSON Schema: {0}")]
    InvalidSchema(String),

    #[error("payload rejected by schema: {}", .0.join("; "))]
    Rejected(Vec<String>),
}

/// Compiles a JSON Schema once and validates instances against it.
///
/// Resource controllers typically build one `Validator` per registered
/// resource type at `initialize()` time and reuse it for every `validate`
/// call, rather than recompiling the schema per request.
pub struct Validator {
    compiled: jsonschema::Validator,
}

impl Validator {
    pub fn compile(schema: &Json) -> Result<Self, SchemaValidationError> {
        let compiled = jsonschema::validator_for(schema)
            .map_err(|e| SchemaValidationError::InvalidSchema(e.to_string()))?;
        Ok(Self { compiled })
    }

    pub fn is_valid(&self, instance: &Json) -> bool {
        self.compiled.is_valid(instance)
    }

    /// Validate `instance`, returning every violation message rather than
    /// stopping at the first one — orchestrators display the full list.
    pub fn validate(&self, instance: &Json) -> Result<(), SchemaValidationError> {
        let errors: Vec<String> = self
            .compiled
            .iter_errors(instance)
            .map(|e| e.to_string())
            .collect();
        if errors.is_empty() {
            Ok(())
        } else {
            Err(SchemaValidationError::Rejected(errors))
        }
    }
}
