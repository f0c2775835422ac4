//! # Object Protocol
//!
//! Mapping semantics over the instances of an [`ObjectStore`]: key
//! resolution, property get / set / delete, evaluation and outdated
//! tracking.
//!
//! ## Evaluation
//!
//! A property is *outdated* when it was never evaluated since its last raw
//! write, when a dependency's revision differs from the one recorded at its
//! last evaluation, or when a dependency is itself outdated. A property with
//! a custom getter is always re-evaluated on read.
//!
//! Reading a property first reads its dependencies, so it always observes
//! their evaluated values. Evaluation then:
//!
//! 1. runs the getter, if any, to produce a new raw value,
//! 2. renders a template raw value against the instance,
//! 3. converts and validates (literals flagged `notValidated` are stored as
//!    given), creating child instances for object items,
//! 4. records the dependency revisions, releases replaced children,
//! 5. runs the setter, if any, with the validated value.
//!
//! Errors are logged and returned unchanged.
//!
//! ## Writes
//!
//! A write stores the raw value. Unless the instance is lazy, the property
//! is evaluated at once and the previous state is restored on failure.
//! Dependents are not evaluated by the write; they become outdated and are
//! evaluated on their next read.

use std::collections::BTreeSet;
use std::sync::Arc;

use serde_json::Value;
use skema_core::{template, AccessError, InstanceId, KeyError, SkemaError, ValidationError};

use crate::property::{kind_label, negate, Node, PropertyType, TypeKind};
use crate::store::{dynamic_deps, ObjectStore, Slot};
use crate::types::{ResolvedKey, TypeDescriptor};

impl ObjectStore {
    // ── Resolution ──────────────────────────────────────────────────

    /// Resolve a key of an instance to a property, an undeclared key or a
    /// method.
    pub fn resolve(&self, id: InstanceId, key: &str) -> Result<ResolvedKey, SkemaError> {
        Ok(self.instance(id)?.ty.resolve(key)?)
    }

    /// Whether `key` currently has a value (set, defaulted or computed).
    pub fn has(&self, id: InstanceId, key: &str) -> bool {
        match self.resolve(id, key) {
            Ok(ResolvedKey::Property { name, .. } | ResolvedKey::Additional(name)) => {
                self.can_read(id, &name)
            }
            Ok(ResolvedKey::Method(_)) => true,
            Err(_) => false,
        }
    }

    pub(crate) fn can_read(&self, id: InstanceId, name: &str) -> bool {
        let Some(inst) = self.instances.get(&id) else {
            return false;
        };
        inst.slots.contains_key(name)
            || inst.ty.default_of(name).is_some()
            || inst
                .ty
                .descriptor(name)
                .is_some_and(|d| d.getter.is_some())
    }

    /// Direct and template dependencies of a property.
    pub(crate) fn dependencies_of(&self, id: InstanceId, name: &str) -> BTreeSet<String> {
        let Some(inst) = self.instances.get(&id) else {
            return BTreeSet::new();
        };
        let mut deps = inst
            .ty
            .dependencies()
            .inputs(name)
            .cloned()
            .unwrap_or_default();
        if let Some(slot) = inst.slots.get(name) {
            deps.extend(slot.dynamic_deps.iter().cloned());
        }
        deps.remove(name);
        deps
    }

    // ── Outdated tracking ───────────────────────────────────────────

    /// Whether reading `key` would re-evaluate it.
    pub fn is_outdated(&self, id: InstanceId, key: &str) -> Result<bool, SkemaError> {
        let name = match self.resolve(id, key)? {
            ResolvedKey::Property { name, .. } | ResolvedKey::Additional(name) => name,
            ResolvedKey::Method(_) => return Ok(false),
        };
        Ok(self.needs_evaluation(id, &name))
    }

    fn needs_evaluation(&self, id: InstanceId, name: &str) -> bool {
        let has_getter = self
            .instances
            .get(&id)
            .and_then(|i| i.ty.descriptor(name))
            .is_some_and(|d| d.getter.is_some());
        has_getter || self.is_stale(id, name, &mut BTreeSet::new())
    }

    fn is_stale(&self, id: InstanceId, name: &str, seen: &mut BTreeSet<String>) -> bool {
        if !seen.insert(name.to_string()) {
            return false;
        }
        let Some(inst) = self.instances.get(&id) else {
            return false;
        };
        let Some(slot) = inst.slots.get(name) else {
            return false;
        };
        let Some(inputs) = &slot.inputs else {
            return true;
        };
        self.dependencies_of(id, name).iter().any(|d| {
            inputs.get(d).copied().flatten() != inst.revision(d) || self.is_stale(id, d, seen)
        })
    }

    // ── Get ─────────────────────────────────────────────────────────

    /// Value of a key, with child instances materialized as mappings.
    ///
    /// Keys containing `.` or `[` are canonical names. A method name calls
    /// the method without arguments. A negated alias reads the negated
    /// value.
    ///
    /// # Errors
    ///
    /// `KeyError::UnknownProperty` and `KeyError::Unset` for missing keys,
    /// and whatever the evaluation of the property (or of its
    /// dependencies) raised.
    pub fn get(&mut self, id: InstanceId, key: &str) -> Result<Value, SkemaError> {
        let node = self.get_node(id, key)?;
        self.materialize(&node)
    }

    /// Like [`get`](Self::get), keeping child instances as ids.
    pub fn get_node(&mut self, id: InstanceId, key: &str) -> Result<Node, SkemaError> {
        tracing::debug!(instance = %id, key, "GET");
        if key.contains(['.', '[']) {
            return self.resolve_cname(id, key);
        }
        let ty = self.type_of(id)?;
        let resolved = match ty.resolve(key) {
            Ok(r) => r,
            Err(e) => return self.by_name(id, key, e.into()),
        };
        match resolved {
            ResolvedKey::Method(name) => Ok(Node::Literal(self.call(id, &name, &[])?)),
            ResolvedKey::Property { name, negated } => {
                let node = self.read(id, &name)?;
                if !negated {
                    return Ok(node);
                }
                match node {
                    Node::Literal(v) => Ok(Node::Literal(negate(&name, &v)?)),
                    other => Err(ValidationError::Conversion {
                        property: name,
                        expected: "a number".to_string(),
                        found: format!("{other:?}"),
                    }
                    .into()),
                }
            }
            ResolvedKey::Additional(name) => {
                if self.can_read(id, &name) {
                    self.read(id, &name)
                } else {
                    let unset = KeyError::Unset {
                        type_name: ty.name().to_string(),
                        key: key.to_string(),
                    };
                    self.by_name(id, key, unset.into())
                }
            }
        }
    }

    /// With `attributeByName`, look a missing key up as a child name.
    fn by_name(&mut self, id: InstanceId, key: &str, err: SkemaError) -> Result<Node, SkemaError> {
        if !self.instance(id)?.options.by_name() {
            return Err(err);
        }
        match self.find_named(id, key)? {
            Some(child) => Ok(Node::Object(child)),
            None => Err(err),
        }
    }

    /// Current node of a property, evaluating it and its dependencies
    /// first when needed.
    pub(crate) fn read(&mut self, id: InstanceId, name: &str) -> Result<Node, SkemaError> {
        if self.in_flight.iter().any(|(i, n)| *i == id && n == name) {
            return self.current(id, name);
        }
        self.ensure_slot(id, name)?;
        self.in_flight.push((id, name.to_string()));
        let result = self.refresh(id, name);
        self.in_flight.pop();
        result?;
        self.current(id, name)
    }

    fn current(&self, id: InstanceId, name: &str) -> Result<Node, SkemaError> {
        let inst = self.instance(id)?;
        inst.slots
            .get(name)
            .map(Slot::current)
            .ok_or_else(|| unset(&inst.ty, name))
    }

    fn refresh(&mut self, id: InstanceId, name: &str) -> Result<(), SkemaError> {
        for dep in self.dependencies_of(id, name) {
            if self.can_read(id, &dep) {
                self.read(id, &dep)?;
            }
        }
        if self.needs_evaluation(id, name) {
            self.evaluate(id, name)?;
        }
        Ok(())
    }

    /// Re-create a missing slot from the default, or empty for a getter.
    fn ensure_slot(&mut self, id: InstanceId, name: &str) -> Result<(), SkemaError> {
        let inst = self.instance_mut(id)?;
        if inst.slots.contains_key(name) {
            return Ok(());
        }
        let ty = Arc::clone(&inst.ty);
        let raw = match ty.default_of(name) {
            Some(d) => d.clone(),
            None if ty.descriptor(name).is_some_and(|d| d.getter.is_some()) => Value::Null,
            None => return Err(unset(&ty, name)),
        };
        let rev = inst.bump();
        if !ty.has_property(name) {
            inst.extra_keys.push(name.to_string());
        }
        let deps = dynamic_deps(&ty, name, &raw);
        inst.slots.insert(name.to_string(), Slot::new(raw, rev, deps));
        Ok(())
    }

    fn evaluate(&mut self, id: InstanceId, name: &str) -> Result<(), SkemaError> {
        let result = self.evaluate_inner(id, name);
        if let Err(e) = &result {
            tracing::error!(instance = %id, property = name, error = %e, "property evaluation failed");
        }
        result
    }

    fn evaluate_inner(&mut self, id: InstanceId, name: &str) -> Result<(), SkemaError> {
        let ty = self.type_of(id)?;
        let descriptor = ty.descriptor(name).cloned();

        if let Some(getter) = descriptor.as_ref().and_then(|d| d.getter.clone()) {
            let raw = getter(self, id)?;
            let inst = self.instance_mut(id)?;
            let changed = inst.slots.get(name).is_some_and(|s| s.raw != raw);
            if changed {
                let rev = inst.bump();
                if let Some(slot) = inst.slots.get_mut(name) {
                    slot.raw = raw;
                    slot.revision = rev;
                }
            }
        }

        let raw = match self.instance(id)?.slots.get(name) {
            Some(slot) => slot.raw.clone(),
            None => return Err(unset(&ty, name)),
        };
        let node = self.validate(id, &ty, name, &raw)?;

        let deps = self.dependencies_of(id, name);
        let inst = self.instance_mut(id)?;
        let inputs = deps.iter().map(|d| (d.clone(), inst.revision(d))).collect();
        let old = match inst.slots.get_mut(name) {
            Some(slot) => {
                slot.inputs = Some(inputs);
                slot.validated.replace(node.clone())
            }
            None => None,
        };
        if old.as_ref() != Some(&node) {
            let rev = inst.bump();
            if let Some(slot) = inst.slots.get_mut(name) {
                slot.revision = rev;
            }
        }
        self.release_replaced(old.as_ref(), Some(&node));

        if let Some(setter) = descriptor.and_then(|d| d.setter) {
            let value = self.materialize(&node)?;
            setter(self, id, &value)?;
        }
        Ok(())
    }

    /// Convert and validate the raw value of a property.
    fn validate(
        &mut self,
        id: InstanceId,
        ty: &TypeDescriptor,
        name: &str,
        raw: &Value,
    ) -> Result<Node, SkemaError> {
        let Some(t) = ty.type_of(name).cloned() else {
            return Ok(Node::Literal(raw.clone()));
        };
        if ty.is_not_validated(name) && t.literal().is_some() {
            return Ok(Node::Literal(raw.clone()));
        }
        self.convert(id, name, &t, raw, &[])
    }

    fn convert(
        &mut self,
        id: InstanceId,
        name: &str,
        t: &PropertyType,
        raw: &Value,
        indices: &[usize],
    ) -> Result<Node, SkemaError> {
        if raw.is_null() && t.nullable && !matches!(t.kind, TypeKind::Literal(_)) {
            return Ok(Node::Literal(Value::Null));
        }
        match &t.kind {
            TypeKind::Literal(l) => {
                let value = match raw {
                    Value::String(s) if template::is_template(s) => {
                        let rendered = self.render(id, s)?;
                        l.from_rendered(rendered)
                    }
                    _ => raw.clone(),
                };
                Ok(Node::Literal(l.convert(name, &value)?))
            }
            TypeKind::ForeignKey(fk) => Ok(Node::Literal(fk.convert(name, raw)?)),
            TypeKind::Object(schema) => {
                let child = self.create_child(id, name, indices, schema, raw.clone())?;
                Ok(Node::Object(child))
            }
            TypeKind::Array { items, constraints } => {
                let Value::Array(values) = raw else {
                    return Err(ValidationError::Conversion {
                        property: name.to_string(),
                        expected: kind_label(&t.kind).to_string(),
                        found: raw.to_string(),
                    }
                    .into());
                };
                constraints.check(name, raw)?;
                let mut nodes = Vec::with_capacity(values.len());
                for (i, v) in values.iter().enumerate() {
                    let mut at = indices.to_vec();
                    at.push(i);
                    match self.convert(id, name, items, v, &at) {
                        Ok(n) => nodes.push(n),
                        Err(e) => {
                            self.release_replaced(Some(&Node::Array(nodes)), None);
                            return Err(e);
                        }
                    }
                }
                Ok(Node::Array(nodes))
            }
            TypeKind::OneOf(candidates) => {
                let mut errors = Vec::new();
                for c in candidates {
                    match self.convert(id, name, c, raw, indices) {
                        Ok(n) => return Ok(n),
                        Err(e) => errors.push(e.to_string()),
                    }
                }
                Err(ValidationError::NoMatchingType {
                    property: name.to_string(),
                    errors,
                }
                .into())
            }
        }
    }

    /// Render a template against the instance. Unset variables render
    /// empty.
    fn render(&mut self, id: InstanceId, pattern: &str) -> Result<String, SkemaError> {
        template::render(pattern, |path| {
            let root = template::root_variable(path);
            match self.get(id, root) {
                Ok(v) => Ok(template::value_at(&v, path).cloned()),
                Err(SkemaError::Key(KeyError::Unset { .. })) => Ok(None),
                Err(e) => Err(e),
            }
        })
    }

    /// JSON value of a node, child instances serialized with defaults.
    pub fn materialize(&mut self, node: &Node) -> Result<Value, SkemaError> {
        match node {
            Node::Literal(v) => Ok(v.clone()),
            Node::Object(child) => self.to_value(*child),
            Node::Array(items) => items
                .iter()
                .map(|n| self.materialize(n))
                .collect::<Result<Vec<_>, _>>()
                .map(Value::Array),
        }
    }

    // ── Set ─────────────────────────────────────────────────────────

    /// Write a raw value.
    ///
    /// # Errors
    ///
    /// `AccessError::ReadOnly` for read-only properties (the stored value is
    /// untouched), key errors, and validation errors of the eager
    /// evaluation, after which the previous value is restored.
    pub fn set(&mut self, id: InstanceId, key: &str, value: Value) -> Result<(), SkemaError> {
        tracing::debug!(instance = %id, key, "SET");
        let ty = self.type_of(id)?;
        let (name, negated, declared) = match ty.resolve_property(key)? {
            ResolvedKey::Property { name, negated } => (name, negated, true),
            ResolvedKey::Additional(name) => (name, false, false),
            ResolvedKey::Method(name) => {
                return Err(KeyError::UnknownProperty {
                    type_name: ty.name().to_string(),
                    key: name,
                }
                .into())
            }
        };
        if ty.is_read_only(&name) {
            return Err(AccessError::ReadOnly {
                type_name: ty.name().to_string(),
                property: name,
            }
            .into());
        }
        let value = if negated { negate(&name, &value)? } else { value };
        let deps = dynamic_deps(&ty, &name, &value);

        let inst = self.instance_mut(id)?;
        let rev = inst.bump();
        let previous = inst
            .slots
            .insert(name.clone(), Slot::new(value, rev, deps));
        let new_key = !declared && previous.is_none();
        if new_key {
            inst.extra_keys.push(name.clone());
        }
        let lazy = inst.options.is_lazy();

        if !lazy {
            if let Err(e) = self.read(id, &name) {
                let inst = self.instance_mut(id)?;
                let failed = match previous {
                    Some(prev) => inst.slots.insert(name.clone(), prev),
                    None => inst.slots.remove(&name),
                };
                if new_key {
                    inst.extra_keys.retain(|k| *k != name);
                }
                self.release_replaced(failed.and_then(|s| s.validated).as_ref(), None);
                return Err(e);
            }
        }
        let current = self.instance(id)?.slots.get(&name).and_then(|s| s.validated.clone());
        self.release_replaced(previous.and_then(|s| s.validated).as_ref(), current.as_ref());
        Ok(())
    }

    // ── Delete ──────────────────────────────────────────────────────

    /// Remove a property value.
    ///
    /// # Errors
    ///
    /// `AccessError::Required` for required properties, `KeyError::Unset`
    /// when nothing is set, and errors of a custom deleter.
    pub fn delete(&mut self, id: InstanceId, key: &str) -> Result<(), SkemaError> {
        tracing::debug!(instance = %id, key, "DEL");
        let ty = self.type_of(id)?;
        let name = match ty.resolve_property(key)? {
            ResolvedKey::Property { name, .. } | ResolvedKey::Additional(name) => name,
            ResolvedKey::Method(name) => name,
        };
        if ty.is_required(&name) {
            return Err(AccessError::Required {
                type_name: ty.name().to_string(),
                property: name,
            }
            .into());
        }
        if !self.instance(id)?.slots.contains_key(&name) {
            return Err(unset(&ty, &name));
        }
        if let Some(deleter) = ty.descriptor(&name).and_then(|d| d.deleter.clone()) {
            deleter(self, id)?;
        }
        let inst = self.instance_mut(id)?;
        let removed = inst.slots.remove(&name);
        inst.extra_keys.retain(|k| *k != name);
        self.release_replaced(removed.and_then(|s| s.validated).as_ref(), None);
        Ok(())
    }

    // ── Methods ─────────────────────────────────────────────────────

    /// Call a user method.
    pub fn call(&mut self, id: InstanceId, method: &str, args: &[Value]) -> Result<Value, SkemaError> {
        let ty = self.type_of(id)?;
        let m = ty
            .method(method)
            .cloned()
            .ok_or_else(|| KeyError::UnknownMethod {
                type_name: ty.name().to_string(),
                name: method.to_string(),
            })?;
        tracing::debug!(instance = %id, method, "CALL");
        m(self, id, args)
    }
}

fn unset(ty: &TypeDescriptor, name: &str) -> SkemaError {
    KeyError::Unset {
        type_name: ty.name().to_string(),
        key: name.to_string(),
    }
    .into()
}
