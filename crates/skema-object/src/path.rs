//! # Canonical Names
//!
//! Addressing nodes of an instance tree by name.
//!
//! [`ObjectStore::canonical_name`] builds a root-anchored name from the
//! chain of parents. A child whose name field (see
//! [`SkemaConfig::name_field`](crate::SkemaConfig)) holds a plain identifier
//! is named by it, as long as the name is unambiguous from its parent;
//! otherwise it is named by its key and array indices.
//! [`ObjectStore::path_of`] always uses keys.
//!
//! [`ObjectStore::resolve_cname`] walks a name from its anchor. At each
//! step a segment is tried as a key of the current instance first, then as
//! the name of a descendant instance (breadth first, in creation order).
//! Indices are applied to the node found.

use std::collections::VecDeque;

use skema_core::{Anchor, CanonicalName, InstanceId, KeyError, Segment, SkemaError};

use crate::property::Node;
use crate::store::ObjectStore;
use crate::types::ResolvedKey;

impl ObjectStore {
    /// Declared name of an instance, from its name field.
    pub fn name_of(&self, id: InstanceId) -> Option<String> {
        let inst = self.instances.get(&id)?;
        let slot = inst.slots.get(inst.ty.name_field())?;
        match slot.validated.as_ref() {
            Some(Node::Literal(v)) => v.as_str().map(str::to_string),
            Some(_) => None,
            None => slot.raw.as_str().map(str::to_string),
        }
    }

    /// Root-anchored canonical name of an instance.
    pub fn canonical_name(&self, id: InstanceId) -> Result<CanonicalName, SkemaError> {
        self.build_name(id, true)
    }

    /// Root-anchored path of keys and indices to an instance.
    pub fn path_of(&self, id: InstanceId) -> Result<CanonicalName, SkemaError> {
        self.build_name(id, false)
    }

    fn build_name(&self, id: InstanceId, by_name: bool) -> Result<CanonicalName, SkemaError> {
        let mut segments = Vec::new();
        let mut cur = id;
        loop {
            let inst = self.instance(cur)?;
            let Some(parent) = inst.parent else { break };
            let named = if by_name { self.unique_name(parent, cur) } else { None };
            let segment = match named {
                Some(name) => Segment::named(name),
                None => {
                    let (key, indices) = inst.key.clone().unwrap_or_default();
                    Segment::indexed(key, indices)
                }
            };
            segments.push(segment);
            cur = parent;
        }
        segments.reverse();
        Ok(CanonicalName::new(Anchor::Root, segments))
    }

    /// Name of `child` when resolving it from `parent` by name would find it.
    fn unique_name(&self, parent: InstanceId, child: InstanceId) -> Option<String> {
        let name = self.name_of(child)?;
        if name.is_empty() || name.contains(['.', '[', ']']) {
            return None;
        }
        let parent_ty = &self.instances.get(&parent)?.ty;
        if matches!(parent_ty.resolve(&name), Ok(ResolvedKey::Property { .. } | ResolvedKey::Method(_)))
            || self.can_read(parent, &name)
        {
            return None;
        }
        (self.search_named(parent, &name) == Some(child)).then_some(name)
    }

    /// Breadth-first search of materialized descendants by name.
    fn search_named(&self, from: InstanceId, name: &str) -> Option<InstanceId> {
        let mut queue: VecDeque<InstanceId> = VecDeque::from([from]);
        while let Some(cur) = queue.pop_front() {
            let inst = self.instances.get(&cur)?;
            for &c in &inst.children {
                if self.name_of(c).as_deref() == Some(name) {
                    return Some(c);
                }
                queue.push_back(c);
            }
        }
        None
    }

    /// Like the named search, evaluating lazy object and array properties
    /// on the way.
    pub(crate) fn find_named(
        &mut self,
        from: InstanceId,
        name: &str,
    ) -> Result<Option<InstanceId>, SkemaError> {
        let mut queue: VecDeque<InstanceId> = VecDeque::from([from]);
        while let Some(cur) = queue.pop_front() {
            self.materialize_children(cur)?;
            for c in self.children(cur)? {
                if self.name_of(c).as_deref() == Some(name) {
                    return Ok(Some(c));
                }
                queue.push_back(c);
            }
        }
        Ok(None)
    }

    fn materialize_children(&mut self, id: InstanceId) -> Result<(), SkemaError> {
        let inst = self.instance(id)?;
        let keys: Vec<String> = inst
            .slot_keys()
            .into_iter()
            .filter(|k| inst.ty.type_of(k).is_some_and(|t| !t.is_primitive()))
            .collect();
        for k in keys {
            self.read(id, &k)?;
        }
        Ok(())
    }

    /// Node addressed by a canonical name, relative to `id`.
    ///
    /// # Errors
    ///
    /// `KeyError::MalformedCanonicalName` when the name does not parse,
    /// `KeyError::UnresolvableCanonicalName` when no node matches.
    pub fn resolve_cname(&mut self, id: InstanceId, cname: &str) -> Result<Node, SkemaError> {
        let parsed = CanonicalName::parse(cname)?;
        let origin = self.canonical_name(id)?.to_string();
        let unresolvable = || -> SkemaError {
            KeyError::UnresolvableCanonicalName {
                cname: cname.to_string(),
                origin: origin.clone(),
            }
            .into()
        };

        let start = match parsed.anchor() {
            Anchor::Current => id,
            Anchor::Root => self.root_of(id)?,
            Anchor::Ancestor(n) => {
                let mut cur = id;
                for _ in 0..n {
                    cur = self.parent(cur)?.ok_or_else(unresolvable)?;
                }
                cur
            }
        };

        let mut node = Node::Object(start);
        for (i, segment) in parsed.segments().iter().enumerate() {
            let Some(oid) = node.as_instance() else {
                return Err(unresolvable());
            };
            let root_named = i == 0
                && parsed.anchor() == Anchor::Root
                && segment.indices.is_empty()
                && !self.can_read(oid, &segment.name)
                && self.name_of(oid).as_deref() == Some(segment.name.as_str());
            if root_named {
                continue;
            }
            let found = match self.key_node(oid, &segment.name)? {
                Some(n) => n,
                None => match self.find_named(oid, &segment.name)? {
                    Some(child) => Node::Object(child),
                    None => return Err(unresolvable()),
                },
            };
            node = index_into(found, &segment.indices).ok_or_else(unresolvable)?;
        }
        Ok(node)
    }

    /// Value of `key` on `id` when the key names a readable property.
    fn key_node(&mut self, id: InstanceId, key: &str) -> Result<Option<Node>, SkemaError> {
        let name = match self.resolve(id, key) {
            Ok(ResolvedKey::Property { name, .. } | ResolvedKey::Additional(name)) => name,
            Ok(ResolvedKey::Method(_)) => return self.get_node(id, key).map(Some),
            Err(_) => return Ok(None),
        };
        if !self.can_read(id, &name) {
            return Ok(None);
        }
        self.get_node(id, key).map(Some)
    }
}

fn index_into(node: Node, indices: &[usize]) -> Option<Node> {
    let mut cur = node;
    for &i in indices {
        cur = match cur {
            Node::Array(mut items) if i < items.len() => items.swap_remove(i),
            _ => return None,
        };
    }
    Some(cur)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use serde_json::{json, Value};
    use skema_core::SchemaId;
    use skema_schema::SchemaStore;

    use super::*;
    use crate::builder::TypeBuilder;
    use crate::config::ObjectOptions;

    fn zoo() -> (ObjectStore, InstanceId) {
        let mut schemas = SchemaStore::new();
        schemas
            .register(json!({"$id": "animal", "type": "object", "properties": {
                "name": {"type": "string"},
                "legs": {"type": "integer", "default": 4}
            }}))
            .unwrap();
        schemas
            .register(json!({"$id": "zoo", "type": "object", "properties": {
                "name": {"type": "string"},
                "pens": {"type": "array", "items": {"type": "array", "items": {"$ref": "animal"}}},
                "keeper": {"$ref": "animal"}
            }}))
            .unwrap();
        let mut store = ObjectStore::new(Arc::new(TypeBuilder::new(Arc::new(schemas))));
        let id = store
            .create(
                &SchemaId::new("zoo"),
                json!({
                    "name": "z",
                    "pens": [[{"name": "rex"}, {"name": "tom"}], [{"name": "kiwi", "legs": 2}]],
                    "keeper": {"name": "ann", "legs": 2}
                }),
                ObjectOptions::default(),
            )
            .unwrap();
        (store, id)
    }

    fn leaf(store: &mut ObjectStore, id: InstanceId, cname: &str) -> Value {
        let node = store.resolve_cname(id, cname).unwrap();
        store.materialize(&node).unwrap()
    }

    #[test]
    fn test_key_and_index_paths() {
        let (mut s, z) = zoo();
        assert_eq!(leaf(&mut s, z, "pens[1][0].legs"), json!(2));
        assert_eq!(leaf(&mut s, z, "keeper.name"), json!("ann"));
        assert_eq!(leaf(&mut s, z, ".z.keeper.legs"), json!(2));
    }

    #[test]
    fn test_named_children() {
        let (mut s, z) = zoo();
        assert_eq!(leaf(&mut s, z, "tom.legs"), json!(4));
        let kiwi = s.resolve_cname(z, "kiwi").unwrap().as_instance().unwrap();
        assert_eq!(s.canonical_name(kiwi).unwrap().to_string(), ".kiwi");
        assert_eq!(s.path_of(kiwi).unwrap().to_string(), ".pens[1][0]");
    }

    #[test]
    fn test_ascending() {
        let (mut s, z) = zoo();
        let rex = s.resolve_cname(z, "rex").unwrap().as_instance().unwrap();
        assert_eq!(s.resolve_cname(rex, "..").unwrap(), Node::Object(z));
        assert_eq!(leaf(&mut s, rex, "..keeper.name"), json!("ann"));
        assert_eq!(leaf(&mut s, rex, ".name"), json!("z"));
    }

    #[test]
    fn test_unresolvable() {
        let (mut s, z) = zoo();
        for bad in ["nobody", "pens[5]", "keeper.name.first", "..up"] {
            let err = s.resolve_cname(z, bad).unwrap_err();
            assert!(
                matches!(err, SkemaError::Key(KeyError::UnresolvableCanonicalName { .. })),
                "{bad}: {err}"
            );
        }
        assert!(matches!(
            s.resolve_cname(z, "a[x]").unwrap_err(),
            SkemaError::Key(KeyError::MalformedCanonicalName { .. })
        ));
    }

    #[test]
    fn test_object_property_named_by_name_field() {
        let (s, z) = zoo();
        let keeper = s.children(z).unwrap().into_iter().last().unwrap();
        assert_eq!(s.canonical_name(keeper).unwrap().to_string(), ".ann");
        assert_eq!(s.path_of(keeper).unwrap().to_string(), ".keeper");
    }
}
