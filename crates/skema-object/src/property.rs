//! # Property Types
//!
//! A [`PropertyType`] is what the class builder derives from a property's
//! schema node:
//!
//! | Kind | Stored raw | Validated [`Node`] |
//! |------|------------|--------------------|
//! | literal | JSON scalar or `{{ template }}` | `Node::Literal` |
//! | object | mapping, or a string loaded by reference | `Node::Object` (child instance) |
//! | array | sequence | `Node::Array` |
//! | one-of | anything | the first candidate that accepts it |
//! | foreign key | key value or canonical-name string | `Node::Literal` (the key) |
//!
//! Object kinds refer to their type by [`SchemaId`] and are looked up in the
//! builder registry when instantiated, so a property may point at a type
//! that is still under construction.

use std::fmt;
use std::sync::Arc;

use serde_json::{json, Value};
use skema_core::{temporal, template, InstanceId, SchemaId, ValidationError};
use skema_schema::ConstraintValidator;

// ─── Validated values ────────────────────────────────────────────────

/// A validated property value.
#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    /// Literal or foreign-key value.
    Literal(Value),
    /// Child instance owned by the holder of the property.
    Object(InstanceId),
    /// Sequence of validated items.
    Array(Vec<Node>),
}

impl Node {
    /// The literal value, if this is a literal.
    pub fn as_literal(&self) -> Option<&Value> {
        match self {
            Self::Literal(v) => Some(v),
            _ => None,
        }
    }

    /// The instance id, if this is an object.
    pub fn as_instance(&self) -> Option<InstanceId> {
        match self {
            Self::Object(id) => Some(*id),
            _ => None,
        }
    }

    /// The items, if this is an array.
    pub fn as_array(&self) -> Option<&[Node]> {
        match self {
            Self::Array(items) => Some(items),
            _ => None,
        }
    }

    /// Whether this is a `null` literal.
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Literal(Value::Null))
    }

    /// Instances directly reachable from this node, in order.
    pub fn instances(&self) -> Vec<InstanceId> {
        let mut out = Vec::new();
        self.collect_instances(&mut out);
        out
    }

    fn collect_instances(&self, out: &mut Vec<InstanceId>) {
        match self {
            Self::Literal(_) => {}
            Self::Object(id) => out.push(*id),
            Self::Array(items) => items.iter().for_each(|i| i.collect_instances(out)),
        }
    }
}

/// Arithmetic negation used by negated aliases.
pub fn negate(property: &str, value: &Value) -> Result<Value, ValidationError> {
    let negated = match value {
        Value::Null => Some(Value::Null),
        Value::Number(n) => {
            let int = n.as_i64().map(i128::from).or_else(|| n.as_u64().map(i128::from));
            if let Some(i) = int {
                // Integers stay integers; no float fallback.
                let neg = -i;
                i64::try_from(neg)
                    .map(Value::from)
                    .or_else(|_| u64::try_from(neg).map(Value::from))
                    .ok()
            } else if let Some(f) = n.as_f64() {
                serde_json::Number::from_f64(-f).map(Value::Number)
            } else {
                None
            }
        }
        _ => None,
    };
    negated.ok_or_else(|| ValidationError::Conversion {
        property: property.to_string(),
        expected: "a number".to_string(),
        found: value.to_string(),
    })
}

// ─── Literal types ───────────────────────────────────────────────────

/// Primitive kinds, including the explicit string conversions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LiteralKind {
    /// Any JSON string.
    String,
    /// Integral number.
    Integer,
    /// Any number.
    Number,
    /// `true`/`false`.
    Boolean,
    /// Only `null`.
    Null,
    /// String normalized to `YYYY-MM-DD`.
    Date,
    /// String normalized to RFC 3339 UTC.
    DateTime,
    /// Filesystem path string.
    Path,
    /// No shape constraint beyond the schema keywords.
    Any,
}

impl LiteralKind {
    /// Kind from a declared `type` (and `format`) name.
    pub fn from_type_name(name: &str, format: Option<&str>) -> Self {
        match (name, format) {
            ("string", Some("date")) | ("date", _) => Self::Date,
            ("string", Some("date-time")) | ("datetime" | "date-time", _) => Self::DateTime,
            ("string", Some("path")) | ("path", _) => Self::Path,
            ("string", _) => Self::String,
            ("integer", _) => Self::Integer,
            ("number", _) => Self::Number,
            ("boolean", _) => Self::Boolean,
            ("null", _) => Self::Null,
            _ => Self::Any,
        }
    }

    /// Kind name, as declared in schemas.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::String => "string",
            Self::Integer => "integer",
            Self::Number => "number",
            Self::Boolean => "boolean",
            Self::Null => "null",
            Self::Date => "date",
            Self::DateTime => "date-time",
            Self::Path => "path",
            Self::Any => "any",
        }
    }

    /// Whether rendered templates stay strings for this kind.
    fn is_textual(&self) -> bool {
        matches!(self, Self::String | Self::Date | Self::DateTime | Self::Path)
    }
}

impl fmt::Display for LiteralKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A primitive property type with its compiled constraints.
#[derive(Debug, Clone)]
pub struct LiteralType {
    /// Primitive kind.
    pub kind: LiteralKind,
    /// Whether `null` is accepted.
    pub nullable: bool,
    validator: Arc<ConstraintValidator>,
}

impl LiteralType {
    /// Literal type with compiled constraints.
    pub fn new(kind: LiteralKind, nullable: bool, validator: ConstraintValidator) -> Self {
        Self {
            kind,
            nullable,
            validator: Arc::new(validator),
        }
    }

    /// Constraint schema in effect.
    pub fn constraints(&self) -> &Value {
        self.validator.schema()
    }

    /// Convert then validate a raw value.
    ///
    /// Only the declared conversions apply: strings to dates, datetimes and
    /// paths, and integral floats to integers. Anything else of the wrong
    /// shape is a `Conversion` error.
    pub fn convert(&self, property: &str, raw: &Value) -> Result<Value, ValidationError> {
        let mismatch = || ValidationError::Conversion {
            property: property.to_string(),
            expected: self.kind.to_string(),
            found: raw.to_string(),
        };
        let value = match (self.kind, raw) {
            (_, Value::Null) if self.nullable || matches!(self.kind, LiteralKind::Null | LiteralKind::Any) => {
                Value::Null
            }
            (_, Value::Null) => return Err(mismatch()),
            (LiteralKind::Any, v) => v.clone(),
            (LiteralKind::String | LiteralKind::Path, Value::String(_)) => raw.clone(),
            (LiteralKind::Boolean, Value::Bool(_)) => raw.clone(),
            (LiteralKind::Number, Value::Number(_)) => raw.clone(),
            (LiteralKind::Integer, Value::Number(n)) => {
                if n.is_i64() || n.is_u64() {
                    raw.clone()
                } else {
                    match n.as_f64() {
                        Some(f) if f.fract() == 0.0 && f.abs() < 9.0e15 => Value::from(f as i64),
                        _ => return Err(mismatch()),
                    }
                }
            }
            (LiteralKind::Date, Value::String(s)) => {
                Value::String(temporal::coerce_date(s).map_err(|_| mismatch())?)
            }
            (LiteralKind::DateTime, Value::String(s)) => {
                Value::String(temporal::coerce_datetime(s).map_err(|_| mismatch())?)
            }
            _ => return Err(mismatch()),
        };
        self.validator.check(property, &value)?;
        Ok(value)
    }

    /// Turn a rendered template into a raw value of this kind.
    ///
    /// Textual kinds keep the string; other kinds parse it as JSON and fall
    /// back to the string when it does not parse.
    pub fn from_rendered(&self, rendered: String) -> Value {
        if self.kind.is_textual() {
            return Value::String(rendered);
        }
        serde_json::from_str(&rendered).unwrap_or(Value::String(rendered))
    }
}

// ─── Foreign keys ────────────────────────────────────────────────────

/// Reference into the key space of a target type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ForeignKeyType {
    /// Target type.
    pub target: SchemaId,
    /// Declared key properties. Empty means the target's primary keys.
    pub keys: Vec<String>,
    /// Whether a `null` key is accepted.
    pub nullable: bool,
}

impl ForeignKeyType {
    /// Check the shape of a key value.
    pub fn convert(&self, property: &str, raw: &Value) -> Result<Value, ValidationError> {
        match raw {
            Value::Null | Value::String(_) | Value::Number(_) | Value::Bool(_) => Ok(raw.clone()),
            Value::Array(items) if items.iter().all(|i| !i.is_object() && !i.is_array()) => {
                Ok(raw.clone())
            }
            _ => Err(ValidationError::Conversion {
                property: property.to_string(),
                expected: format!("a key of {}", self.target),
                found: raw.to_string(),
            }),
        }
    }
}

// ─── Property types ──────────────────────────────────────────────────

/// Shape of a property.
#[derive(Debug, Clone)]
pub enum TypeKind {
    /// Primitive.
    Literal(LiteralType),
    /// Nested instance of the referenced type.
    Object(SchemaId),
    /// Sequence of items with array-level constraints.
    Array {
        /// Item type.
        items: Box<PropertyType>,
        /// `minItems`, `uniqueItems`, ...
        constraints: Arc<ConstraintValidator>,
    },
    /// First accepting candidate wins.
    OneOf(Vec<PropertyType>),
    /// Key into another type's instances.
    ForeignKey(ForeignKeyType),
}

/// A property's type with its declared metadata.
#[derive(Debug, Clone)]
pub struct PropertyType {
    /// Shape.
    pub kind: TypeKind,
    /// Default raw value.
    pub default: Option<Value>,
    /// Whether `null` is accepted.
    pub nullable: bool,
    /// `description` of the property schema.
    pub description: Option<String>,
}

impl PropertyType {
    /// Wrap a kind without metadata.
    pub fn new(kind: TypeKind) -> Self {
        Self {
            kind,
            default: None,
            nullable: false,
            description: None,
        }
    }

    /// Set the default value.
    pub fn with_default(mut self, default: Option<Value>) -> Self {
        self.default = default;
        self
    }

    /// Whether values serialize as scalars (literals and keys).
    pub fn is_primitive(&self) -> bool {
        matches!(self.kind, TypeKind::Literal(_) | TypeKind::ForeignKey(_))
    }

    /// Whether this is an object kind.
    pub fn is_object(&self) -> bool {
        matches!(self.kind, TypeKind::Object(_))
    }

    /// Whether this is an array kind.
    pub fn is_array(&self) -> bool {
        matches!(self.kind, TypeKind::Array { .. })
    }

    /// The literal type, if any.
    pub fn literal(&self) -> Option<&LiteralType> {
        match &self.kind {
            TypeKind::Literal(l) => Some(l),
            _ => None,
        }
    }

    /// The foreign-key type, if any.
    pub fn foreign_key(&self) -> Option<&ForeignKeyType> {
        match &self.kind {
            TypeKind::ForeignKey(fk) => Some(fk),
            _ => None,
        }
    }

    /// Variables a raw value of this type depends on.
    pub fn inputs(&self, raw: &Value) -> std::collections::BTreeSet<String> {
        match (&self.kind, raw) {
            (TypeKind::Literal(_), Value::String(s)) => template::variables(s),
            _ => Default::default(),
        }
    }

    /// Whether a raw value is a template this type renders.
    pub fn is_template(&self, raw: &Value) -> bool {
        matches!(self.kind, TypeKind::Literal(_)) && template::is_template_value(raw)
    }

    /// Check a value without an instance context: literals are converted,
    /// objects must be mappings, arrays are checked item by item.
    pub fn check(&self, property: &str, raw: &Value) -> Result<(), ValidationError> {
        if raw.is_null() && self.nullable {
            return Ok(());
        }
        match (&self.kind, raw) {
            (TypeKind::Literal(_), _) if self.is_template(raw) => Ok(()),
            (TypeKind::Literal(l), _) => l.convert(property, raw).map(|_| ()),
            (TypeKind::ForeignKey(fk), _) => fk.convert(property, raw).map(|_| ()),
            (TypeKind::Object(_), Value::Object(_) | Value::String(_)) => Ok(()),
            (TypeKind::Array { items, constraints }, Value::Array(values)) => {
                constraints.check(property, raw)?;
                values.iter().try_for_each(|v| items.check(property, v))
            }
            (TypeKind::OneOf(candidates), _) => {
                let mut errors = Vec::new();
                for c in candidates {
                    match c.check(property, raw) {
                        Ok(()) => return Ok(()),
                        Err(e) => errors.push(e.to_string()),
                    }
                }
                Err(ValidationError::NoMatchingType {
                    property: property.to_string(),
                    errors,
                })
            }
            (kind, _) => Err(ValidationError::Conversion {
                property: property.to_string(),
                expected: kind_label(kind).to_string(),
                found: raw.to_string(),
            }),
        }
    }

    /// Comparable description of the type.
    pub fn signature(&self) -> Value {
        let mut sig = match &self.kind {
            TypeKind::Literal(l) => json!({
                "kind": "literal",
                "type": l.kind.as_str(),
                "constraints": l.constraints(),
            }),
            TypeKind::Object(id) => json!({"kind": "object", "$ref": id.as_str()}),
            TypeKind::Array { items, constraints } => json!({
                "kind": "array",
                "items": items.signature(),
                "constraints": constraints.schema(),
            }),
            TypeKind::OneOf(c) => json!({
                "kind": "oneOf",
                "candidates": c.iter().map(PropertyType::signature).collect::<Vec<_>>(),
            }),
            TypeKind::ForeignKey(fk) => json!({
                "kind": "foreignKey",
                "$schema": fk.target.as_str(),
                "key": fk.keys,
            }),
        };
        if let Some(obj) = sig.as_object_mut() {
            if let Some(d) = &self.default {
                obj.insert("default".into(), d.clone());
            }
            if self.nullable {
                obj.insert("nullable".into(), Value::Bool(true));
            }
        }
        sig
    }
}

/// Short label of a kind, used in messages.
pub fn kind_label(kind: &TypeKind) -> &'static str {
    match kind {
        TypeKind::Literal(_) => "a literal",
        TypeKind::Object(_) => "a mapping",
        TypeKind::Array { .. } => "a sequence",
        TypeKind::OneOf(_) => "one of the candidates",
        TypeKind::ForeignKey(_) => "a key",
    }
}
