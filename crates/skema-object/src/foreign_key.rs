//! # Foreign Keys
//!
//! A foreign-key property stores a key into the instances of a target type
//! and is resolved on demand by [`ObjectStore::follow`].
//!
//! The key properties are the ones declared on the foreign key, else the
//! target's primary keys. A composite key is given as an array of values in
//! key order. Without key properties, or with the `canonicalName` key, the
//! stored value is a canonical name: it is resolved relative to the holder
//! first, then matched against the canonical names of target instances.

use serde_json::Value;
use skema_core::{InstanceId, ReferenceError, SkemaError};
use skema_schema::ForeignKeySpec;

use crate::property::Node;
use crate::store::ObjectStore;
use crate::types::ResolvedKey;

impl ObjectStore {
    /// Resolve a foreign-key property to the instance it designates.
    ///
    /// Returns `None` only for a `null` key on a nullable property.
    ///
    /// # Errors
    ///
    /// - `ReferenceError::NotAForeignKey` when the property is not a foreign key.
    /// - `ReferenceError::NullKey` for a `null` key on a non-nullable property.
    /// - `ReferenceError::UnresolvedTarget` when the target type is not built.
    /// - `ReferenceError::NotFound` when no target instance carries the key.
    pub fn follow(&mut self, id: InstanceId, key: &str) -> Result<Option<InstanceId>, SkemaError> {
        let ty = self.type_of(id)?;
        let not_fk = || ReferenceError::NotAForeignKey {
            property: key.to_string(),
        };
        let name = match ty.resolve_property(key)? {
            ResolvedKey::Property { name, .. } => name,
            _ => return Err(not_fk().into()),
        };
        let fk = ty
            .property(&name)
            .and_then(|t| t.foreign_key())
            .cloned()
            .ok_or_else(not_fk)?;

        let value = self.get(id, &name)?;
        if value.is_null() {
            return if fk.nullable {
                Ok(None)
            } else {
                Err(ReferenceError::NullKey { property: name }.into())
            };
        }

        let target = self
            .builder
            .get(&fk.target)
            .ok_or_else(|| ReferenceError::UnresolvedTarget {
                target: fk.target.to_string(),
            })?;
        let keys = if fk.keys.is_empty() {
            target.primary_keys()
        } else {
            fk.keys.clone()
        };
        let not_found = || ReferenceError::NotFound {
            target: fk.target.to_string(),
            key: value.to_string(),
        };

        let by_cname = keys.is_empty() || keys == [ForeignKeySpec::CANONICAL_NAME_KEY];
        let found = if by_cname {
            let cname = value.as_str().ok_or_else(not_found)?;
            self.find_by_cname(id, &fk.target, cname)?
        } else {
            self.find_by_keys(&fk.target, &keys, &value)?
        };
        tracing::debug!(instance = %id, property = %name, found = ?found, "foreign key followed");
        found.map(Some).ok_or_else(|| not_found().into())
    }

    fn find_by_cname(
        &mut self,
        id: InstanceId,
        target: &skema_core::SchemaId,
        cname: &str,
    ) -> Result<Option<InstanceId>, SkemaError> {
        if let Ok(Node::Object(found)) = self.resolve_cname(id, cname) {
            if self.type_of(found)?.is_subtype_of(target) {
                return Ok(Some(found));
            }
        }
        let absolute = if cname.starts_with('.') {
            cname.to_string()
        } else {
            format!(".{cname}")
        };
        for candidate in self.instances_of(target) {
            if self.canonical_name(candidate)?.to_string() == absolute
                || self.path_of(candidate)?.to_string() == absolute
            {
                return Ok(Some(candidate));
            }
        }
        Ok(None)
    }

    fn find_by_keys(
        &mut self,
        target: &skema_core::SchemaId,
        keys: &[String],
        value: &Value,
    ) -> Result<Option<InstanceId>, SkemaError> {
        'candidates: for candidate in self.instances_of(target) {
            let mut values = Vec::with_capacity(keys.len());
            for k in keys {
                match self.get(candidate, k) {
                    Ok(v) => values.push(v),
                    Err(SkemaError::Key(_)) => continue 'candidates,
                    Err(e) => return Err(e),
                }
            }
            let candidate_key = match values.as_slice() {
                [single] => single.clone(),
                _ => Value::Array(values),
            };
            if &candidate_key == value {
                return Ok(Some(candidate));
            }
        }
        Ok(None)
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
    use crate::config::ObjectOptions;

    fn store() -> ObjectStore {
        let mut schemas = SchemaStore::new();
        schemas
            .register(json!({"$id": "country", "type": "object", "properties": {
                "name": {"type": "string"},
                "code": {"type": "string"}
            }, "primaryKeys": ["code"]}))
            .unwrap();
        schemas
            .register(json!({"$id": "city", "type": "object", "properties": {
                "name": {"type": "string"},
                "country": {"type": ["string", "null"], "foreignKey": {"$schema": "country"}},
                "twin": {"type": "string", "foreignKey": {"$schema": "city", "key": "canonicalName"}}
            }}))
            .unwrap();
        ObjectStore::new(Arc::new(TypeBuilder::new(Arc::new(schemas))))
    }

    #[test]
    fn test_follow_primary_key() {
        let mut s = store();
        let fr = s
            .create(&SchemaId::new("country"), json!({"name": "France", "code": "FR"}), ObjectOptions::default())
            .unwrap();
        let lyon = s
            .create(&SchemaId::new("city"), json!({"name": "Lyon", "country": "FR"}), ObjectOptions::default())
            .unwrap();
        assert_eq!(s.follow(lyon, "country").unwrap(), Some(fr));
    }

    #[test]
    fn test_null_and_missing_keys() {
        let mut s = store();
        let nowhere = s
            .create(&SchemaId::new("city"), json!({"name": "X", "country": null}), ObjectOptions::default())
            .unwrap();
        assert_eq!(s.follow(nowhere, "country").unwrap(), None);

        let lost = s
            .create(&SchemaId::new("city"), json!({"name": "Y", "country": "ZZ"}), ObjectOptions::default())
            .unwrap();
        let err = s.follow(lost, "country").unwrap_err();
        assert!(matches!(err, SkemaError::Reference(ReferenceError::NotFound { .. })));
        assert!(matches!(
            s.follow(lost, "name").unwrap_err(),
            SkemaError::Reference(ReferenceError::NotAForeignKey { .. })
        ));
    }

    #[test]
    fn test_follow_canonical_name() {
        let mut schemas = SchemaStore::new();
        schemas
            .register(json!({"$id": "city", "type": "object", "properties": {
                "name": {"type": "string"},
                "twin": {"type": "string", "foreignKey": {"$schema": "city", "key": "canonicalName"}}
            }}))
            .unwrap();
        schemas
            .register(json!({"$id": "network", "type": "object", "properties": {
                "cities": {"type": "array", "items": {"$ref": "city"}}
            }}))
            .unwrap();
        let mut s = ObjectStore::new(Arc::new(TypeBuilder::new(Arc::new(schemas))));
        let net = s
            .create(
                &SchemaId::new("network"),
                json!({"cities": [
                    {"name": "Lyon", "twin": ".Birmingham"},
                    {"name": "Birmingham", "twin": "..Lyon"},
                    {"name": "Nowhere", "twin": ".Atlantis"}
                ]}),
                ObjectOptions::default(),
            )
            .unwrap();
        let cities = s.children(net).unwrap();
        assert_eq!(s.follow(cities[0], "twin").unwrap(), Some(cities[1]));
        assert_eq!(s.follow(cities[1], "twin").unwrap(), Some(cities[0]));
        assert!(matches!(
            s.follow(cities[2], "twin").unwrap_err(),
            SkemaError::Reference(ReferenceError::NotFound { .. })
        ));
    }
}
