//! # Serialization
//!
//! Schema-aware conversion of an instance tree back to an ordered mapping.
//!
//! - Properties are emitted in flattened table order, then undeclared keys
//!   in insertion order, then alias keys (negated aliases negated).
//! - `notSerialized` and excluded keys are skipped.
//! - A value equal to its declared default is omitted unless defaults are
//!   requested. Template values are emitted as their pattern.
//! - Primitive keys get the configured attribute prefix.
//! - When an instance's runtime type differs from the type declared by the
//!   slot holding it, `$schema` is emitted first.
//!
//! Serializing, deserializing and serializing again gives the same output.

use std::collections::BTreeSet;

use serde_json::{Map, Value};
use skema_core::{InstanceId, SkemaError};

use crate::property::{negate, Node};
use crate::store::ObjectStore;

/// Key carrying the runtime type of an instance.
pub const SCHEMA_KEY: &str = "$schema";

/// Serialization switches.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SerializeOptions {
    /// Emit values equal to their defaults.
    pub with_defaults: bool,
    /// Keys left out, by declared name.
    pub excludes: BTreeSet<String>,
    /// Prefix of primitive keys. Falls back to the configured prefix.
    pub attribute_prefix: Option<String>,
    /// Emit `$schema` on the top-level instance even when not a subtype.
    pub with_schema: bool,
}

impl SerializeOptions {
    /// Include default values.
    pub fn with_defaults() -> Self {
        Self {
            with_defaults: true,
            ..Self::default()
        }
    }

    /// Leave out a key.
    pub fn exclude(mut self, key: impl Into<String>) -> Self {
        self.excludes.insert(key.into());
        self
    }
}

impl ObjectStore {
    /// Serialize an instance tree.
    ///
    /// Outdated properties are evaluated first.
    pub fn serialize(
        &mut self,
        id: InstanceId,
        options: &SerializeOptions,
    ) -> Result<Value, SkemaError> {
        let prefix = options
            .attribute_prefix
            .clone()
            .or_else(|| self.builder.config().attribute_prefix.clone())
            .unwrap_or_default();
        self.serialize_instance(id, options, &prefix, options.with_schema)
            .map(Value::Object)
    }

    /// Full value of an instance with defaults, without type tag.
    pub fn to_value(&mut self, id: InstanceId) -> Result<Value, SkemaError> {
        let options = SerializeOptions::with_defaults();
        self.serialize_instance(id, &options, "", false)
            .map(Value::Object)
    }

    /// Mapping equality: same keys and values, defaults included.
    pub fn equals(&mut self, a: InstanceId, b: InstanceId) -> Result<bool, SkemaError> {
        Ok(self.to_value(a)? == self.to_value(b)?)
    }

    fn serialize_instance(
        &mut self,
        id: InstanceId,
        options: &SerializeOptions,
        prefix: &str,
        force_schema: bool,
    ) -> Result<Map<String, Value>, SkemaError> {
        let inst = self.instance(id)?;
        let ty = std::sync::Arc::clone(&inst.ty);
        let tagged = force_schema || ty.id() != &inst.declared;
        let keys = inst.slot_keys();

        let mut out = Map::new();
        if tagged {
            out.insert(SCHEMA_KEY.to_string(), Value::String(ty.id().to_string()));
        }
        // Unprefixed view of what was emitted, for aliases.
        let mut emitted: Vec<(String, Value, bool)> = Vec::new();

        for name in keys {
            if options.excludes.contains(&name) || ty.is_not_serialized(&name) {
                continue;
            }
            let t = ty.type_of(&name).cloned();
            let raw = match self.instance(id)?.slots.get(&name) {
                Some(slot) => slot.raw.clone(),
                None => continue,
            };
            let value = match &t {
                Some(t) if t.is_template(&raw) => raw.clone(),
                _ => {
                    let node = self.read(id, &name)?;
                    self.serialize_node(&node, options, prefix)?
                }
            };
            if !options.with_defaults {
                if let Some(default) = t.as_ref().and_then(|t| t.default.as_ref()) {
                    if *default == raw || *default == value {
                        continue;
                    }
                }
            }
            let primitive = t.as_ref().map_or(true, |t| t.is_primitive());
            emitted.push((name, value, primitive));
        }

        let key = |name: &str, primitive: bool| {
            if primitive {
                format!("{prefix}{name}")
            } else {
                name.to_string()
            }
        };
        for (name, value, primitive) in &emitted {
            out.insert(key(name, *primitive), value.clone());
        }
        for (alias, target) in ty.aliases() {
            if options.excludes.contains(alias) {
                continue;
            }
            if let Some((_, value, primitive)) = emitted.iter().find(|(n, _, _)| n == target) {
                out.insert(key(alias, *primitive), value.clone());
            }
        }
        for (alias, target) in ty.negated_aliases() {
            if options.excludes.contains(alias) {
                continue;
            }
            if let Some((_, value, primitive)) = emitted.iter().find(|(n, _, _)| n == target) {
                out.insert(key(alias, *primitive), negate(alias, value)?);
            }
        }
        Ok(out)
    }

    fn serialize_node(
        &mut self,
        node: &Node,
        options: &SerializeOptions,
        prefix: &str,
    ) -> Result<Value, SkemaError> {
        match node {
            Node::Literal(v) => Ok(v.clone()),
            Node::Object(child) => {
                let child_options = SerializeOptions {
                    excludes: BTreeSet::new(),
                    with_schema: false,
                    ..options.clone()
                };
                self.serialize_instance(*child, &child_options, prefix, false)
                    .map(Value::Object)
            }
            Node::Array(items) => items
                .iter()
                .map(|n| self.serialize_node(n, options, prefix))
                .collect::<Result<Vec<_>, _>>()
                .map(Value::Array),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use serde_json::json;
    use skema_core::SchemaId;
    use skema_schema::SchemaStore;

    use super::*;
    use crate::builder::TypeBuilder;
    use crate::config::{ObjectOptions, SkemaConfig};

    fn store(config: SkemaConfig) -> ObjectStore {
        let mut schemas = SchemaStore::new();
        schemas
            .register(json!({"$id": "shape", "type": "object", "properties": {
                "name": {"type": "string"},
                "color": {"type": "string", "default": "black"},
                "cache": {"type": "string"},
                "tags": {"type": "array", "items": {"type": "string"}}
            }, "notSerialized": ["cache"], "aliases": {"colour": "color"}}))
            .unwrap();
        schemas
            .register(json!({"$id": "circle", "extends": "shape", "properties": {
                "radius": {"type": "number", "default": 1}
            }}))
            .unwrap();
        schemas
            .register(json!({"$id": "drawing", "type": "object", "properties": {
                "shapes": {"type": "array", "items": {"$ref": "shape"}}
            }}))
            .unwrap();
        ObjectStore::new(Arc::new(TypeBuilder::with_config(Arc::new(schemas), config)))
    }

    #[test]
    fn test_defaults_and_not_serialized_omitted() {
        let mut s = store(SkemaConfig::default());
        let id = s
            .create(
                &SchemaId::new("shape"),
                json!({"name": "a", "cache": "x"}),
                ObjectOptions::default(),
            )
            .unwrap();
        assert_eq!(s.serialize(id, &SerializeOptions::default()).unwrap(), json!({"name": "a"}));
        let full = s.serialize(id, &SerializeOptions::with_defaults()).unwrap();
        assert_eq!(full["color"], json!("black"));
        assert_eq!(full["colour"], json!("black"));
        assert_eq!(full["tags"], json!([]));
        assert!(full.get("cache").is_none());
    }

    #[test]
    fn test_subtype_items_are_tagged_first() {
        let mut s = store(SkemaConfig::default());
        let id = s
            .create(
                &SchemaId::new("drawing"),
                json!({"shapes": [{"name": "s"}, {"$schema": "circle", "name": "c", "radius": 2}]}),
                ObjectOptions::default(),
            )
            .unwrap();
        let out = s.serialize(id, &SerializeOptions::default()).unwrap();
        assert_eq!(out["shapes"][0], json!({"name": "s"}));
        let circle = out["shapes"][1].as_object().unwrap();
        assert_eq!(circle.keys().next().map(String::as_str), Some("$schema"));
        assert_eq!(circle["$schema"], json!("circle"));

        let again = s
            .create(&SchemaId::new("drawing"), out.clone(), ObjectOptions::default())
            .unwrap();
        assert_eq!(s.serialize(again, &SerializeOptions::default()).unwrap(), out);
    }

    #[test]
    fn test_prefix_applies_to_primitives() {
        let config = SkemaConfig {
            attribute_prefix: Some("@".into()),
            ..SkemaConfig::default()
        };
        let mut s = store(config);
        let id = s
            .create(
                &SchemaId::new("drawing"),
                json!({"shapes": [{"@name": "s", "tags": ["t"]}]}),
                ObjectOptions::default(),
            )
            .unwrap();
        let out = s.serialize(id, &SerializeOptions::default()).unwrap();
        assert_eq!(out, json!({"shapes": [{"@name": "s", "tags": ["t"]}]}));
    }

    #[test]
    fn test_equals_ignores_default_spelling() {
        let mut s = store(SkemaConfig::default());
        let ty = SchemaId::new("shape");
        let a = s.create(&ty, json!({"name": "a"}), ObjectOptions::default()).unwrap();
        let b = s
            .create(&ty, json!({"name": "a", "colour": "black"}), ObjectOptions::default())
            .unwrap();
        let c = s.create(&ty, json!({"name": "c"}), ObjectOptions::default()).unwrap();
        assert!(s.equals(a, b).unwrap());
        assert!(!s.equals(a, c).unwrap());
    }
}
