//! # Constraint Validation
//!
//! Literal property values are checked against the constraint keywords of
//! their schema node (Draft 2020-12) with the `jsonschema` crate.
//!
//! Only value-level keywords are compiled. Structure (`properties`,
//! `items`, `oneOf`, `$ref`, ...) is handled by the object model itself,
//! so an array property compiles its own `minItems`/`uniqueItems` while
//! each element is checked by its item type.
//!
//! The object model's extra literal types are mapped onto JSON types
//! before compilation:
//!
//! | Declared | Compiled as |
//! |----------|-------------|
//! | `date`, `datetime`, `date-time`, `path` | `string` |
//! | `any` | no type constraint |

use std::fmt;

use jsonschema::{Retrieve, Uri, Validator};
use serde_json::{Map, Value};
use skema_core::{SchemaBuildError, ValidationError, Violation, Violations};

/// Keywords compiled into a constraint validator.
const CONSTRAINT_KEYWORDS: &[&str] = &[
    "type",
    "enum",
    "const",
    "minimum",
    "maximum",
    "exclusiveMinimum",
    "exclusiveMaximum",
    "multipleOf",
    "minLength",
    "maxLength",
    "pattern",
    "format",
    "minItems",
    "maxItems",
    "uniqueItems",
    "minProperties",
    "maxProperties",
    "not",
];

/// Never reaches the network: any reference left in a constraint schema
/// resolves to the permissive schema.
struct OfflineRetriever;

impl Retrieve for OfflineRetriever {
    fn retrieve(
        &self,
        _uri: &Uri<&str>,
    ) -> Result<Value, Box<dyn std::error::Error + Send + Sync>> {
        Ok(Value::Object(Map::new()))
    }
}

/// Compiled constraint check for one property.
pub struct ConstraintValidator {
    schema: Value,
    validator: Validator,
}

impl ConstraintValidator {
    /// Compile the constraint keywords of `schema`.
    ///
    /// # Errors
    ///
    /// Returns `SchemaBuildError::InvalidSchema` when the retained keywords
    /// do not form a valid schema (for example a malformed `pattern`).
    pub fn new(schema_id: &str, schema: &Value) -> Result<Self, SchemaBuildError> {
        let schema = constraint_schema(schema);
        let mut opts = jsonschema::options();
        opts.with_draft(jsonschema::Draft::Draft202012);
        opts.with_retriever(OfflineRetriever);
        let validator = opts
            .build(&schema)
            .map_err(|e| SchemaBuildError::InvalidSchema {
                schema: schema_id.to_string(),
                reason: e.to_string(),
            })?;
        Ok(Self { schema, validator })
    }

    /// The compiled constraint schema.
    pub fn schema(&self) -> &Value {
        &self.schema
    }

    /// Whether the validator constrains anything at all.
    pub fn is_trivial(&self) -> bool {
        self.schema.as_object().is_some_and(Map::is_empty)
    }

    /// Quick boolean check.
    pub fn is_valid(&self, value: &Value) -> bool {
        self.validator.is_valid(value)
    }

    /// Check `value`, collecting every violation.
    pub fn check(&self, property: &str, value: &Value) -> Result<(), ValidationError> {
        let violations: Vec<Violation> = self
            .validator
            .iter_errors(value)
            .map(|e| Violation {
                instance_path: e.instance_path.to_string(),
                schema_path: e.schema_path.to_string(),
                message: e.to_string(),
            })
            .collect();
        if violations.is_empty() {
            Ok(())
        } else {
            Err(ValidationError::Constraint {
                property: property.to_string(),
                violations: Violations::new(violations),
            })
        }
    }
}

impl fmt::Debug for ConstraintValidator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConstraintValidator")
            .field("schema", &self.schema)
            .finish()
    }
}

/// Keep the constraint keywords of a schema node, mapping custom types.
pub fn constraint_schema(schema: &Value) -> Value {
    let Some(obj) = schema.as_object() else {
        return Value::Object(Map::new());
    };
    let mut out = Map::new();
    for (k, v) in obj {
        if !CONSTRAINT_KEYWORDS.contains(&k.as_str()) {
            continue;
        }
        if k == "type" {
            if let Some(t) = map_type(v) {
                out.insert(k.clone(), t);
            }
        } else {
            out.insert(k.clone(), v.clone());
        }
    }
    Value::Object(out)
}

fn map_type(declared: &Value) -> Option<Value> {
    fn one(name: &str) -> Option<&str> {
        match name {
            "any" => None,
            "date" | "datetime" | "date-time" | "path" => Some("string"),
            other => Some(other),
        }
    }
    match declared {
        Value::String(s) => one(s).map(|t| Value::String(t.to_string())),
        Value::Array(names) => {
            let mut mapped: Vec<Value> = Vec::new();
            for n in names.iter().filter_map(Value::as_str) {
                let Some(t) = one(n) else {
                    // `any` in a union accepts everything.
                    return None;
                };
                let t = Value::String(t.to_string());
                if !mapped.contains(&t) {
                    mapped.push(t);
                }
            }
            Some(Value::Array(mapped))
        }
        _ => None,
    }
}
