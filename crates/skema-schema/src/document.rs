//! # Schema Documents
//!
//! Typed view over a schema node. Besides standard JSON-Schema keywords,
//! a schema may carry the object-model vocabulary understood by the class
//! builder:
//!
//! | Keyword | Meaning |
//! |---------|---------|
//! | `extends` | schema ids whose properties and flags are inherited |
//! | `readOnly`, `notSerialized`, `notValidated` | property name sets |
//! | `aliases`, `negatedAliases` | alternate names (`-value` for negated) |
//! | `dependencies` | `{ name: [names it depends on] }` |
//! | `primaryKeys` | keys used by foreign keys targeting the type |
//! | `lazyLoading` | defer evaluation until first read |
//! | `foreignKey` | `{ $schema, key }` on a literal property |
//!
//! Properties keep their declaration order.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};
use skema_core::{SchemaBuildError, SkemaError};

/// A list of names, or a single flag on property-level schemas
/// (`readOnly: true` marks the property itself).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum NamesOrFlag {
    /// Property-level flag.
    Flag(bool),
    /// Object-level list of property names.
    Names(Vec<String>),
}

impl Default for NamesOrFlag {
    fn default() -> Self {
        Self::Names(Vec::new())
    }
}

impl NamesOrFlag {
    /// The listed names (empty for a flag).
    pub fn names(&self) -> &[String] {
        match self {
            Self::Flag(_) => &[],
            Self::Names(n) => n,
        }
    }

    /// The flag value (false for a list).
    pub fn flag(&self) -> bool {
        matches!(self, Self::Flag(true))
    }
}

/// Target of a foreign key property.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForeignKeySpec {
    /// Id of the target schema, relative to the declaring schema.
    #[serde(rename = "$schema")]
    pub schema: String,
    /// Key property (or properties) of the target. Defaults to the
    /// target's primary keys.
    #[serde(default, deserialize_with = "one_or_many", skip_serializing_if = "Vec::is_empty")]
    pub key: Vec<String>,
}

impl ForeignKeySpec {
    /// Key name used when the target is addressed by canonical name.
    pub const CANONICAL_NAME_KEY: &'static str = "canonicalName";

    /// Whether keys are explicitly canonical names.
    pub fn by_canonical_name(&self) -> bool {
        self.key.len() == 1 && self.key[0] == Self::CANONICAL_NAME_KEY
    }
}

/// Typed view over a schema node.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Schema {
    /// `$id` (or legacy `id`).
    #[serde(rename = "$id", alias = "id", default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    /// `$schema`: metaschema reference on schemas, subtype tag on instances.
    #[serde(rename = "$schema", default, skip_serializing_if = "Option::is_none")]
    pub meta: Option<String>,
    /// `$ref`.
    #[serde(rename = "$ref", default, skip_serializing_if = "Option::is_none")]
    pub reference: Option<String>,
    /// `type`: a single name or a list of names.
    #[serde(rename = "type", default, deserialize_with = "one_or_many")]
    pub types: Vec<String>,
    /// Declared properties in declaration order.
    #[serde(default)]
    pub properties: Map<String, Value>,
    /// Required property names.
    #[serde(default, deserialize_with = "names_only")]
    pub required: Vec<String>,
    /// Read-only names (object level) or flag (property level).
    #[serde(default)]
    pub read_only: NamesOrFlag,
    /// Properties excluded from serialization.
    #[serde(default, deserialize_with = "one_or_many")]
    pub not_serialized: Vec<String>,
    /// Properties whose values skip constraint validation.
    #[serde(default, deserialize_with = "one_or_many")]
    pub not_validated: Vec<String>,
    /// Base schemas.
    #[serde(default, deserialize_with = "one_or_many")]
    pub extends: Vec<String>,
    /// `alias → property`.
    #[serde(default)]
    pub aliases: BTreeMap<String, String>,
    /// `alias → property`, exposing the negated value.
    #[serde(default)]
    pub negated_aliases: BTreeMap<String, String>,
    /// `property → properties it depends on`.
    #[serde(default, deserialize_with = "dependency_map")]
    pub dependencies: BTreeMap<String, BTreeSet<String>>,
    /// Primary keys used by foreign keys targeting this type.
    #[serde(default, deserialize_with = "one_or_many")]
    pub primary_keys: Vec<String>,
    /// `additionalProperties`: `true`, `false` or a schema.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub additional_properties: Option<Value>,
    /// `patternProperties`: regex → schema.
    #[serde(default)]
    pub pattern_properties: Map<String, Value>,
    /// `$defs` (or legacy `definitions`).
    #[serde(rename = "$defs", alias = "definitions", default)]
    pub defs: Map<String, Value>,
    /// `default`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<Value>,
    /// `description`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// `lazyLoading`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lazy_loading: Option<bool>,
    /// `foreignKey`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub foreign_key: Option<ForeignKeySpec>,
    /// `oneOf` candidates.
    #[serde(default)]
    pub one_of: Vec<Value>,
    /// `anyOf` candidates, treated like `oneOf` (first match wins).
    #[serde(default)]
    pub any_of: Vec<Value>,
    /// `items` of an array schema.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub items: Option<Value>,
    /// `enum`.
    #[serde(rename = "enum", default, skip_serializing_if = "Option::is_none")]
    pub enumeration: Option<Vec<Value>>,
    /// `format`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub format: Option<String>,
}

impl Schema {
    /// Parse a schema node. `true` is the permissive empty schema.
    ///
    /// # Errors
    ///
    /// Returns `SchemaBuildError::InvalidSchema` when the node is neither a
    /// mapping nor `true`, or when a recognized keyword has the wrong shape.
    pub fn from_value(id: &str, value: &Value) -> Result<Self, SkemaError> {
        match value {
            Value::Bool(true) => Ok(Self::default()),
            Value::Object(_) => serde_json::from_value(value.clone()).map_err(|e| {
                SchemaBuildError::InvalidSchema {
                    schema: id.to_string(),
                    reason: e.to_string(),
                }
                .into()
            }),
            other => Err(SchemaBuildError::InvalidSchema {
                schema: id.to_string(),
                reason: format!("schema must be a mapping, found {other}"),
            }
            .into()),
        }
    }

    /// Whether `type` lists `name`.
    pub fn has_type(&self, name: &str) -> bool {
        self.types.iter().any(|t| t == name)
    }

    /// Whether the node describes an object (by type or by structure).
    pub fn is_object(&self) -> bool {
        self.has_type("object")
            || (self.types.is_empty()
                && self.foreign_key.is_none()
                && (!self.properties.is_empty()
                    || !self.extends.is_empty()
                    || !self.pattern_properties.is_empty()))
    }

    /// Whether the node describes an array.
    pub fn is_array(&self) -> bool {
        self.has_type("array") || (self.types.is_empty() && self.items.is_some())
    }

    /// Whether `null` is an accepted value.
    pub fn is_nullable(&self) -> bool {
        self.has_type("null")
    }

    /// `oneOf` and `anyOf` candidates, in that order.
    pub fn candidates(&self) -> impl Iterator<Item = &Value> {
        self.one_of.iter().chain(self.any_of.iter())
    }

    /// Whether undeclared properties are accepted (anything but `false`).
    pub fn allows_additional(&self) -> bool {
        !matches!(self.additional_properties, Some(Value::Bool(false)))
    }
}

fn one_or_many<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum OneOrMany {
        One(String),
        Many(Vec<String>),
    }
    Ok(match Option::<OneOrMany>::deserialize(deserializer)? {
        None => Vec::new(),
        Some(OneOrMany::One(s)) => vec![s],
        Some(OneOrMany::Many(v)) => v,
    })
}

/// `required: true` (draft-3 style) carries no names at object level.
fn names_only<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match NamesOrFlag::deserialize(deserializer)? {
        NamesOrFlag::Flag(_) => Vec::new(),
        NamesOrFlag::Names(n) => n,
    })
}

/// Accepts names or name lists; schema-valued (JSON-Schema draft-4) entries
/// are not object-model dependencies and are skipped.
fn dependency_map<'de, D>(deserializer: D) -> Result<BTreeMap<String, BTreeSet<String>>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Map::<String, Value>::deserialize(deserializer)?;
    let mut out = BTreeMap::new();
    for (k, v) in raw {
        let names: BTreeSet<String> = match v {
            Value::String(s) => std::iter::once(s).collect(),
            Value::Array(items) => items
                .into_iter()
                .filter_map(|i| i.as_str().map(str::to_string))
                .collect(),
            _ => continue,
        };
        out.insert(k, names);
    }
    Ok(out)
}
