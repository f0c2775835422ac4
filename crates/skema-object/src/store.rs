//! # Instance Arena
//!
//! [`ObjectStore`] owns every instance. Instances are addressed by
//! [`InstanceId`], allocated monotonically and never reused.
//!
//! ## Ownership
//!
//! A parent strictly owns the children created for its object and array
//! properties. Each child keeps a non-owning parent index and the key (plus
//! array indices) under which it is held; these are used for canonical
//! names only. [`ObjectStore::free`] releases a whole subtree.
//!
//! ## Per-property state
//!
//! Every set property has a [`Slot`] holding the raw input, the validated
//! [`Node`], and the revisions of its dependencies observed at the last
//! evaluation. See the `protocol` module for the evaluation rules.
//!
//! ## Registry
//!
//! Instances are registered under their type and every ancestor type, so
//! [`ObjectStore::instances_of`] includes subtype instances. The registry
//! never keeps an instance alive: it is updated by `free`.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::Arc;

use serde_json::{Map, Value};
use skema_core::{
    AccessError, InstanceId, KeyError, ReferenceError, SchemaId, SkemaError, ValidationError,
};

use crate::builder::TypeBuilder;
use crate::config::ObjectOptions;
use crate::dependency::evaluation_order;
use crate::loader::DocumentLoader;
use crate::property::{negate, Node, TypeKind};
use crate::types::{ResolvedKey, TypeDescriptor};

/// State of one property of one instance.
#[derive(Debug, Clone)]
pub(crate) struct Slot {
    /// Raw input as written.
    pub(crate) raw: Value,
    /// Result of the last evaluation.
    pub(crate) validated: Option<Node>,
    /// Bumped on raw writes and when evaluation changes the validated value.
    pub(crate) revision: u64,
    /// Dependency revisions seen by the last evaluation. `None` until the
    /// first evaluation and after every raw write.
    pub(crate) inputs: Option<BTreeMap<String, Option<u64>>>,
    /// Template variables of the raw value.
    pub(crate) dynamic_deps: BTreeSet<String>,
}

impl Slot {
    pub(crate) fn new(raw: Value, revision: u64, dynamic_deps: BTreeSet<String>) -> Self {
        Self {
            raw,
            validated: None,
            revision,
            inputs: None,
            dynamic_deps,
        }
    }

    /// Validated node, else the raw value as a literal.
    pub(crate) fn current(&self) -> Node {
        self.validated
            .clone()
            .unwrap_or_else(|| Node::Literal(self.raw.clone()))
    }
}

/// Where a child instance sits in its parent.
#[derive(Debug, Clone)]
pub(crate) struct Placement {
    pub(crate) parent: InstanceId,
    pub(crate) key: String,
    pub(crate) indices: Vec<usize>,
}

/// One instance.
pub(crate) struct Instance {
    pub(crate) ty: Arc<TypeDescriptor>,
    /// Type of the slot or constructor that created the instance.
    pub(crate) declared: SchemaId,
    pub(crate) parent: Option<InstanceId>,
    pub(crate) key: Option<(String, Vec<usize>)>,
    pub(crate) children: Vec<InstanceId>,
    pub(crate) slots: HashMap<String, Slot>,
    /// Undeclared keys in insertion order.
    pub(crate) extra_keys: Vec<String>,
    /// Options given explicitly (or propagated from the parent).
    pub(crate) explicit: ObjectOptions,
    /// Effective options.
    pub(crate) options: ObjectOptions,
    last_revision: u64,
}

impl Instance {
    pub(crate) fn bump(&mut self) -> u64 {
        self.last_revision += 1;
        self.last_revision
    }

    pub(crate) fn revision(&self, name: &str) -> Option<u64> {
        self.slots.get(name).map(|s| s.revision)
    }

    /// Set keys: declared properties in table order, then undeclared keys.
    pub(crate) fn slot_keys(&self) -> Vec<String> {
        self.ty
            .properties()
            .map(|(k, _)| k)
            .filter(|k| self.slots.contains_key(*k))
            .map(str::to_string)
            .chain(self.extra_keys.iter().cloned())
            .collect()
    }
}

/// Arena of instances built from the types of a [`TypeBuilder`].
pub struct ObjectStore {
    pub(crate) builder: Arc<TypeBuilder>,
    pub(crate) instances: HashMap<InstanceId, Instance>,
    next_id: u64,
    registry: HashMap<SchemaId, BTreeSet<InstanceId>>,
    loader: Option<Arc<dyn DocumentLoader>>,
    /// Properties being evaluated, innermost last.
    pub(crate) in_flight: Vec<(InstanceId, String)>,
    /// Required object properties being filled with `{}`, innermost last.
    fallbacks: Vec<(SchemaId, String)>,
}

impl ObjectStore {
    /// Empty store over the types of `builder`.
    pub fn new(builder: Arc<TypeBuilder>) -> Self {
        Self {
            builder,
            instances: HashMap::new(),
            next_id: 1,
            registry: HashMap::new(),
            loader: None,
            in_flight: Vec::new(),
            fallbacks: Vec::new(),
        }
    }

    /// Install the loader used by construction by reference.
    pub fn with_loader(mut self, loader: Arc<dyn DocumentLoader>) -> Self {
        self.loader = Some(loader);
        self
    }

    /// The type builder.
    pub fn builder(&self) -> &Arc<TypeBuilder> {
        &self.builder
    }

    /// Number of live instances.
    pub fn len(&self) -> usize {
        self.instances.len()
    }

    /// Whether no instance is live.
    pub fn is_empty(&self) -> bool {
        self.instances.is_empty()
    }

    /// Whether `id` is live.
    pub fn contains(&self, id: InstanceId) -> bool {
        self.instances.contains_key(&id)
    }

    pub(crate) fn instance(&self, id: InstanceId) -> Result<&Instance, SkemaError> {
        self.instances
            .get(&id)
            .ok_or_else(|| KeyError::UnknownInstance(id).into())
    }

    pub(crate) fn instance_mut(&mut self, id: InstanceId) -> Result<&mut Instance, SkemaError> {
        self.instances
            .get_mut(&id)
            .ok_or_else(|| KeyError::UnknownInstance(id).into())
    }

    /// Runtime type of an instance.
    pub fn type_of(&self, id: InstanceId) -> Result<Arc<TypeDescriptor>, SkemaError> {
        Ok(Arc::clone(&self.instance(id)?.ty))
    }

    /// Type declared by the slot or constructor that created the instance.
    pub fn declared_type(&self, id: InstanceId) -> Result<SchemaId, SkemaError> {
        Ok(self.instance(id)?.declared.clone())
    }

    /// Effective options of an instance.
    pub fn options(&self, id: InstanceId) -> Result<ObjectOptions, SkemaError> {
        Ok(self.instance(id)?.options)
    }

    /// Owning parent, if any.
    pub fn parent(&self, id: InstanceId) -> Result<Option<InstanceId>, SkemaError> {
        Ok(self.instance(id)?.parent)
    }

    /// Root of the tree holding `id`.
    pub fn root_of(&self, id: InstanceId) -> Result<InstanceId, SkemaError> {
        let mut cur = id;
        while let Some(p) = self.instance(cur)?.parent {
            cur = p;
        }
        Ok(cur)
    }

    /// Materialized children, in creation order. Lazy properties that were
    /// never read have no children yet.
    pub fn children(&self, id: InstanceId) -> Result<Vec<InstanceId>, SkemaError> {
        Ok(self.instance(id)?.children.clone())
    }

    /// Set keys of an instance, in property table order then insertion
    /// order for undeclared keys.
    pub fn keys(&self, id: InstanceId) -> Result<Vec<String>, SkemaError> {
        Ok(self.instance(id)?.slot_keys())
    }

    /// Raw value of a set property, without evaluation.
    pub fn raw(&self, id: InstanceId, key: &str) -> Result<Option<Value>, SkemaError> {
        let inst = self.instance(id)?;
        let name = match inst.ty.resolve_property(key)? {
            ResolvedKey::Property { name, .. } | ResolvedKey::Additional(name) => name,
            ResolvedKey::Method(name) => name,
        };
        Ok(inst.slots.get(&name).map(|s| s.raw.clone()))
    }

    // ── Construction ────────────────────────────────────────────────

    /// Build (if needed) the type `type_id` and instantiate it from `raw`.
    ///
    /// `raw` is a mapping of property values, or a string loaded by
    /// reference through the installed [`DocumentLoader`]. A `$schema` key
    /// naming another type re-dispatches construction to that type.
    ///
    /// # Errors
    ///
    /// Build errors of the type, `KeyError::UnknownProperty` for keys the
    /// type does not accept, `AccessError::Required` for missing required
    /// properties, and any validation error of an eagerly evaluated
    /// property. Nothing stays allocated on failure.
    pub fn create(
        &mut self,
        type_id: &SchemaId,
        raw: Value,
        options: ObjectOptions,
    ) -> Result<InstanceId, SkemaError> {
        let ty = self.builder.load(type_id)?;
        self.instantiate(ty, type_id.clone(), raw, options, None)
    }

    /// Instantiate `type_id` from the document addressed by `reference`.
    pub fn create_by_reference(
        &mut self,
        type_id: &SchemaId,
        reference: &str,
        options: ObjectOptions,
    ) -> Result<InstanceId, SkemaError> {
        let raw = self.load_reference(reference)?;
        self.create(type_id, raw, options)
    }

    fn load_reference(&self, reference: &str) -> Result<Value, SkemaError> {
        let loader = self.loader.as_ref().ok_or_else(|| ReferenceError::NoLoader {
            reference: reference.to_string(),
        })?;
        loader.load(reference)
    }

    /// Create the child held by `parent.key[indices]`.
    pub(crate) fn create_child(
        &mut self,
        parent: InstanceId,
        key: &str,
        indices: &[usize],
        type_id: &SchemaId,
        raw: Value,
    ) -> Result<InstanceId, SkemaError> {
        let ty = self.builder.load(type_id)?;
        let parent_inst = self.instance(parent)?;
        let explicit = if parent_inst.options.propagates() {
            parent_inst.explicit
        } else {
            ObjectOptions::default()
        };
        let placement = Placement {
            parent,
            key: key.to_string(),
            indices: indices.to_vec(),
        };
        self.instantiate(ty, type_id.clone(), raw, explicit, Some(placement))
    }

    pub(crate) fn instantiate(
        &mut self,
        ty: Arc<TypeDescriptor>,
        declared: SchemaId,
        raw: Value,
        explicit: ObjectOptions,
        placement: Option<Placement>,
    ) -> Result<InstanceId, SkemaError> {
        let mut map = match raw {
            Value::Object(map) => map,
            Value::String(reference) => match self.load_reference(&reference)? {
                Value::Object(map) => map,
                other => return Err(not_a_mapping(&ty, &other)),
            },
            other => return Err(not_a_mapping(&ty, &other)),
        };

        let mut ty = ty;
        if let Some(Value::String(tag)) = map.remove("$schema") {
            let target = ty.id().join(&tag);
            if &target != ty.id() {
                tracing::debug!(declared = %ty.id(), actual = %target, "re-dispatching to tagged type");
                ty = self.builder.load(&target)?;
            }
        }

        let map = self.strip_prefix(map);
        let (declared_values, extras) = normalize(&ty, map)?;
        let (slots, fallbacks) = initial_slots(&ty, declared_values, extras)?;
        // An empty fallback that needs itself again would never bottom out.
        if let Some(name) = fallbacks
            .iter()
            .find(|n| self.fallbacks.iter().any(|(t, k)| t == ty.id() && k == *n))
        {
            return Err(required(&ty, name));
        }

        let schema_options = ObjectOptions {
            lazy_loading: ty.lazy_loading(),
            ..ObjectOptions::default()
        };
        let options = explicit
            .or(schema_options)
            .or(self.builder.config().options);

        let id = InstanceId::from_raw(self.next_id);
        self.next_id += 1;
        let mut instance = Instance {
            ty: Arc::clone(&ty),
            declared,
            parent: placement.as_ref().map(|p| p.parent),
            key: placement.as_ref().map(|p| (p.key.clone(), p.indices.clone())),
            children: Vec::new(),
            slots: HashMap::new(),
            extra_keys: Vec::new(),
            explicit,
            options,
            last_revision: 0,
        };
        for (name, raw, declared) in slots {
            let rev = instance.bump();
            let deps = dynamic_deps(&ty, &name, &raw);
            if !declared {
                instance.extra_keys.push(name.clone());
            }
            instance.slots.insert(name, Slot::new(raw, rev, deps));
        }
        self.instances.insert(id, instance);
        if let Some(p) = &placement {
            if let Some(parent) = self.instances.get_mut(&p.parent) {
                parent.children.push(id);
            }
        }
        self.register(id, &ty);
        tracing::debug!(instance = %id, type_name = ty.name(), "instance created");

        let depth = self.fallbacks.len();
        self.fallbacks
            .extend(fallbacks.into_iter().map(|n| (ty.id().clone(), n)));
        let initialized = self.initialize(id);
        self.fallbacks.truncate(depth);
        if let Err(e) = initialized {
            self.release(id);
            return Err(e);
        }
        Ok(id)
    }

    fn strip_prefix(&self, map: Map<String, Value>) -> Map<String, Value> {
        let Some(prefix) = self.builder.config().attribute_prefix.as_deref() else {
            return map;
        };
        map.into_iter()
            .map(|(k, v)| match k.strip_prefix(prefix) {
                Some(stripped) => (stripped.to_string(), v),
                None => (k, v),
            })
            .collect()
    }

    /// Evaluate in dependency order, or only check literals when lazy.
    fn initialize(&mut self, id: InstanceId) -> Result<(), SkemaError> {
        let inst = self.instance(id)?;
        let ty = Arc::clone(&inst.ty);
        let options = inst.options;
        let keys = inst.slot_keys();

        if options.is_lazy() {
            if options.validates_lazy() {
                for k in &keys {
                    let Some(t) = ty.type_of(k) else { continue };
                    let raw = &inst.slots[k].raw;
                    if t.is_primitive() && !t.is_template(raw) && !ty.is_not_validated(k) {
                        t.check(k, raw)?;
                    }
                }
            }
            return Ok(());
        }

        let order = match evaluation_order(&keys, |k| self.dependencies_of(id, k)) {
            Ok(order) => order,
            Err(cycle) => {
                tracing::warn!(
                    type_name = ty.name(),
                    members = ?cycle.members,
                    "dependency cycle, evaluating in declaration order"
                );
                keys
            }
        };
        for k in order {
            self.read(id, &k)?;
        }
        Ok(())
    }

    // ── Registry ────────────────────────────────────────────────────

    fn register(&mut self, id: InstanceId, ty: &TypeDescriptor) {
        self.registry.entry(ty.id().clone()).or_default().insert(id);
        for a in ty.ancestors() {
            self.registry.entry(a.clone()).or_default().insert(id);
        }
    }

    fn unregister(&mut self, id: InstanceId, ty: &TypeDescriptor) {
        for t in std::iter::once(ty.id()).chain(ty.ancestors()) {
            if let Some(set) = self.registry.get_mut(t) {
                set.remove(&id);
                if set.is_empty() {
                    self.registry.remove(t);
                }
            }
        }
    }

    /// Live instances of a type or of any of its subtypes, in id order.
    pub fn instances_of(&self, type_id: &SchemaId) -> Vec<InstanceId> {
        self.registry
            .get(type_id)
            .map(|s| s.iter().copied().collect())
            .unwrap_or_default()
    }

    /// Instances of a type whose properties equal every filter value.
    ///
    /// Keys a candidate does not have make it a non-match.
    pub fn query(
        &mut self,
        type_id: &SchemaId,
        filters: &Map<String, Value>,
    ) -> Result<Vec<InstanceId>, SkemaError> {
        let mut out = Vec::new();
        'candidates: for id in self.instances_of(type_id) {
            for (k, expected) in filters {
                match self.get(id, k) {
                    Ok(v) if &v == expected => {}
                    Ok(_) | Err(SkemaError::Key(_)) => continue 'candidates,
                    Err(e) => return Err(e),
                }
            }
            out.push(id);
        }
        Ok(out)
    }

    /// First match of [`query`](Self::query).
    pub fn pick_first(
        &mut self,
        type_id: &SchemaId,
        filters: &Map<String, Value>,
    ) -> Result<Option<InstanceId>, SkemaError> {
        Ok(self.query(type_id, filters)?.into_iter().next())
    }

    // ── Destruction ─────────────────────────────────────────────────

    /// Release an instance and everything it owns.
    ///
    /// A freed array element is removed from the parent's array, raw value
    /// included, and its siblings keep their instances. A freed object
    /// property is rebuilt from the raw value on next read.
    pub fn free(&mut self, id: InstanceId) -> Result<(), SkemaError> {
        let inst = self.instance(id)?;
        let placement = inst.parent.zip(inst.key.clone());
        self.release(id);
        if let Some((parent, (key, indices))) = placement {
            self.detach(parent, &key, &indices);
        }
        Ok(())
    }

    fn detach(&mut self, parent: InstanceId, key: &str, indices: &[usize]) {
        let Some(inst) = self.instances.get_mut(&parent) else {
            return;
        };
        let Some((last, outer)) = indices.split_last() else {
            if let Some(slot) = inst.slots.get_mut(key) {
                slot.validated = None;
                slot.inputs = None;
            }
            return;
        };
        let rev = inst.bump();
        let Some(slot) = inst.slots.get_mut(key) else {
            return;
        };
        splice_value(&mut slot.raw, outer, *last);
        if let Some(node) = slot.validated.as_mut() {
            splice_node(node, outer, *last);
        }
        slot.revision = rev;
        if let Some(node) = slot.validated.clone() {
            self.renumber(key, &node, &mut Vec::new());
        }
    }

    /// Re-record the positions of the instances held by a slot.
    fn renumber(&mut self, key: &str, node: &Node, at: &mut Vec<usize>) {
        match node {
            Node::Literal(_) => {}
            Node::Object(child) => {
                if let Some(c) = self.instances.get_mut(child) {
                    c.key = Some((key.to_string(), at.clone()));
                }
            }
            Node::Array(items) => {
                for (i, n) in items.iter().enumerate() {
                    at.push(i);
                    self.renumber(key, n, at);
                    at.pop();
                }
            }
        }
    }

    /// Drop a subtree without touching the parent's slots.
    pub(crate) fn release(&mut self, id: InstanceId) {
        let Some(inst) = self.instances.remove(&id) else {
            return;
        };
        if let Some(parent) = inst.parent.and_then(|p| self.instances.get_mut(&p)) {
            parent.children.retain(|c| *c != id);
        }
        self.unregister(id, &inst.ty);
        for child in inst.children {
            self.release(child);
        }
        tracing::debug!(instance = %id, "instance released");
    }

    /// Release the children of `old` that `new` no longer holds.
    pub(crate) fn release_replaced(&mut self, old: Option<&Node>, new: Option<&Node>) {
        let Some(old) = old else { return };
        let kept = new.map(Node::instances).unwrap_or_default();
        for child in old.instances() {
            if !kept.contains(&child) {
                self.release(child);
            }
        }
    }
}

impl std::fmt::Debug for ObjectStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ObjectStore")
            .field("instances", &self.instances.len())
            .field("loader", &self.loader.is_some())
            .finish_non_exhaustive()
    }
}

// ─── Splicing ────────────────────────────────────────────────────────

fn splice_value(value: &mut Value, outer: &[usize], index: usize) {
    let mut at = value;
    for i in outer {
        at = match at {
            Value::Array(items) => match items.get_mut(*i) {
                Some(next) => next,
                None => return,
            },
            _ => return,
        };
    }
    if let Value::Array(items) = at {
        if index < items.len() {
            items.remove(index);
        }
    }
}

fn splice_node(node: &mut Node, outer: &[usize], index: usize) {
    let mut at = node;
    for i in outer {
        at = match at {
            Node::Array(items) => match items.get_mut(*i) {
                Some(next) => next,
                None => return,
            },
            _ => return,
        };
    }
    if let Node::Array(items) = at {
        if index < items.len() {
            items.remove(index);
        }
    }
}

// ─── Construction helpers ────────────────────────────────────────────

fn not_a_mapping(ty: &TypeDescriptor, found: &Value) -> SkemaError {
    ValidationError::Conversion {
        property: ty.name().to_string(),
        expected: "a mapping".to_string(),
        found: found.to_string(),
    }
    .into()
}

fn upsert(values: &mut Vec<(String, Value)>, name: String, value: Value) {
    match values.iter_mut().find(|(k, _)| *k == name) {
        Some(slot) => slot.1 = value,
        None => values.push((name, value)),
    }
}

type Normalized = (Vec<(String, Value)>, Vec<(String, Value)>);

/// Map input keys to declared names; split off undeclared keys.
fn normalize(ty: &TypeDescriptor, map: Map<String, Value>) -> Result<Normalized, SkemaError> {
    let mut declared = Vec::new();
    let mut extras = Vec::new();
    for (k, v) in map {
        match ty.resolve_property(&k)? {
            ResolvedKey::Property { name, negated } => {
                if ty.is_read_only(&name) {
                    tracing::warn!(
                        type_name = ty.name(),
                        property = %name,
                        "discarding initial value of read-only property"
                    );
                    continue;
                }
                let v = if negated { negate(&name, &v)? } else { v };
                upsert(&mut declared, name, v);
            }
            ResolvedKey::Additional(name) => upsert(&mut extras, name, v),
            ResolvedKey::Method(name) => {
                return Err(KeyError::UnknownProperty {
                    type_name: ty.name().to_string(),
                    key: name,
                }
                .into())
            }
        }
    }
    Ok((declared, extras))
}

type InitialSlots = (Vec<(String, Value, bool)>, Vec<String>);

/// Slots of a new instance: given values, then defaults, then fallbacks
/// for required properties. Also returns the object properties filled
/// with an empty mapping.
fn initial_slots(
    ty: &TypeDescriptor,
    mut given: Vec<(String, Value)>,
    extras: Vec<(String, Value)>,
) -> Result<InitialSlots, SkemaError> {
    let mut out = Vec::new();
    let mut fallbacks = Vec::new();
    for (name, t) in ty.properties() {
        let value = match given.iter().position(|(k, _)| k == name) {
            Some(i) => Some(given.swap_remove(i).1),
            None => t.default.clone(),
        };
        let value = match value {
            Some(v) => v,
            None if ty.is_required(name) => match &t.kind {
                TypeKind::Object(_) if t.nullable => Value::Null,
                TypeKind::Object(_) => {
                    fallbacks.push(name.to_string());
                    Value::Object(Map::new())
                }
                TypeKind::Literal(l) => match l.constraints().get("enum").and_then(|e| e.get(0)) {
                    Some(first) => first.clone(),
                    None => return Err(required(ty, name)),
                },
                _ => return Err(required(ty, name)),
            },
            None => continue,
        };
        out.push((name.to_string(), value, true));
    }
    out.extend(extras.into_iter().map(|(k, v)| (k, v, false)));
    Ok((out, fallbacks))
}

fn required(ty: &TypeDescriptor, property: &str) -> SkemaError {
    AccessError::Required {
        type_name: ty.name().to_string(),
        property: property.to_string(),
    }
    .into()
}

/// Template variables of a raw value that name properties of the type.
pub(crate) fn dynamic_deps(ty: &TypeDescriptor, name: &str, raw: &Value) -> BTreeSet<String> {
    let Some(t) = ty.type_of(name) else {
        return BTreeSet::new();
    };
    t.inputs(raw)
        .into_iter()
        .filter(|v| v != name && ty.has_property(v))
        .collect()
}
