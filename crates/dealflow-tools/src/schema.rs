//! Schema - structural validation of tool input
//!
//! A closed validator over a declared field set: typed fields, a required
//! subset, and unknown-field rejection. Violations are reported per field so
//! the model can correct its own call instead of aborting the run.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

/// Field the runtime reserves; tool schemas may never declare it
pub const RESERVED_TENANT_FIELD: &str = "tenant_id";

/// Accepted JSON value type for a field
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldType {
    /// JSON string
    String,
    /// JSON integer
    Integer,
    /// JSON number (integer or float)
    Number,
    /// JSON boolean
    Boolean,
    /// JSON array
    Array,
    /// JSON object
    Object,
}

impl FieldType {
    /// JSON Schema type name
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::String => "string",
            Self::Integer => "integer",
            Self::Number => "number",
            Self::Boolean => "boolean",
            Self::Array => "array",
            Self::Object => "object",
        }
    }

    fn matches(&self, value: &Value) -> bool {
        match self {
            Self::String => value.is_string(),
            Self::Integer => value.is_i64() || value.is_u64(),
            Self::Number => value.is_number(),
            Self::Boolean => value.is_boolean(),
            Self::Array => value.is_array(),
            Self::Object => value.is_object(),
        }
    }
}

#[derive(Debug, Clone)]
struct FieldSpec {
    field_type: FieldType,
    description: String,
    required: bool,
}

/// A single field-level validation failure
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Violation {
    /// Field name (or "$" for the input as a whole)
    pub field: String,
    /// What went wrong
    pub problem: String,
}

impl Violation {
    fn new(field: impl Into<String>, problem: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            problem: problem.into(),
        }
    }
}

/// Structural input schema for one tool
///
/// Fields are kept in a sorted map so the rendered JSON Schema is
/// deterministic.
#[derive(Debug, Clone, Default)]
pub struct InputSchema {
    fields: BTreeMap<String, FieldSpec>,
}

impl InputSchema {
    /// Create an empty schema (accepts only `{}`)
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare an optional field
    #[must_use]
    pub fn field(
        mut self,
        name: impl Into<String>,
        field_type: FieldType,
        description: impl Into<String>,
    ) -> Self {
        self.fields.insert(
            name.into(),
            FieldSpec {
                field_type,
                description: description.into(),
                required: false,
            },
        );
        self
    }

    /// Declare a required field
    #[must_use]
    pub fn required(
        mut self,
        name: impl Into<String>,
        field_type: FieldType,
        description: impl Into<String>,
    ) -> Self {
        self.fields.insert(
            name.into(),
            FieldSpec {
                field_type,
                description: description.into(),
                required: true,
            },
        );
        self
    }

    /// Whether the schema declares a field with this name
    #[must_use]
    pub fn declares(&self, name: &str) -> bool {
        self.fields.contains_key(name)
    }

    /// Validate an input value; an empty list means the input is accepted
    #[must_use]
    pub fn validate(&self, input: &Value) -> Vec<Violation> {
        let Some(object) = input.as_object() else {
            return vec![Violation::new("$", "input must be a JSON object")];
        };

        let mut violations = Vec::new();

        for (name, spec) in &self.fields {
            match object.get(name) {
                Some(Value::Null) | None if spec.required => {
                    violations.push(Violation::new(name, "required field is missing"));
                }
                Some(value) if !value.is_null() && !spec.field_type.matches(value) => {
                    violations.push(Violation::new(
                        name,
                        format!("expected {}", spec.field_type.as_str()),
                    ));
                }
                _ => {}
            }
        }

        for name in object.keys() {
            if !self.fields.contains_key(name) {
                violations.push(Violation::new(name, "unknown field"));
            }
        }

        violations
    }

    /// Render the schema in JSON Schema form for the provider tool list
    #[must_use]
    pub fn to_json_schema(&self) -> Value {
        let properties: serde_json::Map<String, Value> = self
            .fields
            .iter()
            .map(|(name, spec)| {
                (
                    name.clone(),
                    json!({
                        "type": spec.field_type.as_str(),
                        "description": spec.description,
                    }),
                )
            })
            .collect();

        let required: Vec<&str> = self
            .fields
            .iter()
            .filter(|(_, spec)| spec.required)
            .map(|(name, _)| name.as_str())
            .collect();

        json!({
            "type": "object",
            "properties": properties,
            "required": required,
            "additionalProperties": false,
        })
    }
}
