//! # Class Builder
//!
//! Turns schemas into [`TypeDescriptor`]s and keeps the process-wide type
//! registry.
//!
//! ## Algorithm
//!
//! 1. `extends` (and a type-level `$ref`) are resolved to base types.
//!    Bases implied by a more derived base are dropped.
//! 2. Flag sets (`required`, `readOnly`, `notSerialized`, `notValidated`)
//!    are the union over the whole chain.
//! 3. The flattened table lists inherited properties first, then new own
//!    properties. An own property with an inherited name replaces the
//!    inherited type in place.
//! 4. Overrides registered for the type (and configured `typeDefaults`)
//!    are applied. Every default is type-checked.
//! 5. The dependency graph is the union of the bases' graphs, explicit
//!    `dependencies`, `depends_on` overrides and template variables found
//!    in defaults.
//!
//! ## Circular references
//!
//! Types reached while another type is under construction are built
//! recursively. A reference back to a type under construction through a
//! property stays a reference by id and is looked up when instantiated.
//! A base under construction reached through such a property chain is
//! merged from its schema, configured defaults and registered overrides;
//! a chain made only of `extends` edges is an
//! [`ExtendsCycle`](SchemaBuildError::ExtendsCycle).
//!
//! ## Concurrency
//!
//! The registry sits behind a `parking_lot::Mutex`. A whole top-level build
//! runs under one acquisition and publishes its types only when it
//! succeeds, so no partially built type is ever visible.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::Arc;

use parking_lot::Mutex;
use regex::Regex;
use serde_json::Value;
use skema_core::{clean_identifier, SchemaBuildError, SchemaId, SkemaError};
use skema_schema::{ConstraintValidator, Schema, SchemaResolver};

use crate::config::SkemaConfig;
use crate::dependency::DependencyGraph;
use crate::descriptor::{Method, PropertyDescriptor, TypeOverrides};
use crate::property::{ForeignKeyType, LiteralKind, LiteralType, PropertyType, TypeKind};
use crate::types::{Additional, TypeDescriptor};

/// How a type under construction was reached.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Edge {
    Root,
    Extends,
    Property,
}

#[derive(Default)]
struct Registry {
    types: HashMap<SchemaId, Arc<TypeDescriptor>>,
    /// Documents given to [`TypeBuilder::build`], by document id.
    documents: HashMap<String, Value>,
    /// Overrides by schema id or type name.
    overrides: HashMap<String, TypeOverrides>,
}

/// State of one top-level build.
#[derive(Default)]
struct BuildContext {
    built: HashMap<SchemaId, Arc<TypeDescriptor>>,
    stack: Vec<(SchemaId, Edge)>,
    documents: HashMap<String, Value>,
    /// Document being rebuilt explicitly: its registered types are stale.
    fresh_document: Option<String>,
}

/// Where inherited definitions come from.
enum Source {
    Built(Arc<TypeDescriptor>),
    Pending { id: SchemaId, schema: Schema },
}

/// Builds types from schemas and keeps the type registry.
pub struct TypeBuilder {
    resolver: Arc<dyn SchemaResolver>,
    config: Arc<SkemaConfig>,
    registry: Mutex<Registry>,
}

impl TypeBuilder {
    /// Builder with the default configuration.
    pub fn new(resolver: Arc<dyn SchemaResolver>) -> Self {
        Self::with_config(resolver, SkemaConfig::default())
    }

    /// Builder with an explicit configuration.
    pub fn with_config(resolver: Arc<dyn SchemaResolver>, config: SkemaConfig) -> Self {
        Self {
            resolver,
            config: Arc::new(config),
            registry: Mutex::new(Registry::default()),
        }
    }

    /// Configuration in effect.
    pub fn config(&self) -> &SkemaConfig {
        &self.config
    }

    /// Attach business logic to a type, by schema id or type name. Must be
    /// called before the type is built.
    pub fn register_overrides(&self, id_or_name: impl Into<String>, overrides: TypeOverrides) {
        let key = id_or_name.into();
        let mut reg = self.registry.lock();
        if reg.types.keys().any(|id| id.as_str() == key || id.type_name() == key) {
            tracing::warn!(type_id = %key, "overrides registered after the type was built");
        }
        reg.overrides.insert(key, overrides);
    }

    /// The built type, if any.
    pub fn get(&self, id: &SchemaId) -> Option<Arc<TypeDescriptor>> {
        self.registry.lock().types.get(id).cloned()
    }

    /// Whether the type is built.
    pub fn contains(&self, id: &SchemaId) -> bool {
        self.registry.lock().types.contains_key(id)
    }

    /// Ids of all built types, sorted.
    pub fn built_ids(&self) -> Vec<SchemaId> {
        let mut ids: Vec<SchemaId> = self.registry.lock().types.keys().cloned().collect();
        ids.sort();
        ids
    }

    /// The built type, building it from the resolver first if needed.
    ///
    /// # Errors
    ///
    /// Any [`SchemaBuildError`]; nothing is registered on failure.
    pub fn load(&self, id: &SchemaId) -> Result<Arc<TypeDescriptor>, SkemaError> {
        let mut reg = self.registry.lock();
        if let Some(t) = reg.types.get(id) {
            return Ok(Arc::clone(t));
        }
        let mut ctx = BuildContext::default();
        let node = self
            .node(&reg, &ctx, id)
            .ok_or_else(|| SchemaBuildError::UnresolvedReference {
                schema: id.to_string(),
                reference: id.to_string(),
            })?;
        let t = self.build_type(&reg, &mut ctx, id, &node, Edge::Root)?;
        commit(&mut reg, ctx);
        Ok(t)
    }

    /// Build (or rebuild) a type from an explicit schema document.
    ///
    /// The document is kept so that later `$ref`s into it resolve. Types
    /// previously built from the same document are rebuilt.
    ///
    /// # Errors
    ///
    /// Any [`SchemaBuildError`]; the registry is unchanged on failure.
    pub fn build(&self, id: &SchemaId, schema: Value) -> Result<Arc<TypeDescriptor>, SkemaError> {
        let mut reg = self.registry.lock();
        let mut ctx = BuildContext {
            fresh_document: Some(id.document().to_string()),
            ..BuildContext::default()
        };
        if id.fragment().is_none() {
            ctx.documents.insert(id.document().to_string(), schema.clone());
        }
        let t = self.build_type(&reg, &mut ctx, id, &schema, Edge::Root)?;
        commit(&mut reg, ctx);
        Ok(t)
    }

    // ── Lookup ──────────────────────────────────────────────────────

    fn lookup(&self, reg: &Registry, ctx: &BuildContext, id: &SchemaId) -> Option<Arc<TypeDescriptor>> {
        if let Some(t) = ctx.built.get(id) {
            return Some(Arc::clone(t));
        }
        if ctx.fresh_document.as_deref() == Some(id.document()) {
            return None;
        }
        reg.types.get(id).cloned()
    }

    fn node(&self, reg: &Registry, ctx: &BuildContext, id: &SchemaId) -> Option<Value> {
        let doc = ctx
            .documents
            .get(id.document())
            .or_else(|| reg.documents.get(id.document()));
        match doc {
            Some(doc) => match id.fragment() {
                None | Some("") => Some(doc.clone()),
                Some(frag) if frag.starts_with('/') => doc.pointer(frag).cloned(),
                Some(name) => ["$defs", "definitions"]
                    .iter()
                    .find_map(|k| doc.get(*k).and_then(|d| d.get(name)))
                    .cloned(),
            },
            None => self.resolver.resolve(id),
        }
    }

    /// Built type for `id`, or `None` when it is under construction.
    fn ensure(
        &self,
        reg: &Registry,
        ctx: &mut BuildContext,
        from: &SchemaId,
        id: &SchemaId,
        node: Option<&Value>,
        edge: Edge,
    ) -> Result<Option<Arc<TypeDescriptor>>, SkemaError> {
        if let Some(t) = self.lookup(reg, ctx, id) {
            return Ok(Some(t));
        }
        if ctx.stack.iter().any(|(s, _)| s == id) {
            return Ok(None);
        }
        let owned;
        let node = match node {
            Some(n) => n,
            None => {
                owned = self
                    .node(reg, ctx, id)
                    .ok_or_else(|| SchemaBuildError::UnresolvedReference {
                        schema: from.to_string(),
                        reference: id.to_string(),
                    })?;
                &owned
            }
        };
        self.build_type(reg, ctx, id, node, edge).map(Some)
    }

    fn build_type(
        &self,
        reg: &Registry,
        ctx: &mut BuildContext,
        id: &SchemaId,
        node: &Value,
        edge: Edge,
    ) -> Result<Arc<TypeDescriptor>, SkemaError> {
        tracing::debug!(type_id = %id, "building type");
        ctx.stack.push((id.clone(), edge));
        let result = self.assemble(reg, ctx, id, node);
        ctx.stack.pop();
        let t = Arc::new(result?);
        tracing::info!(type_id = %id, properties = t.properties.len(), "type created");
        ctx.built.insert(id.clone(), Arc::clone(&t));
        Ok(t)
    }

    // ── Inheritance ─────────────────────────────────────────────────

    /// Resolve a base. A base on the construction stack is an error when
    /// only `extends` edges lead back to it, and pending otherwise.
    fn base(
        &self,
        reg: &Registry,
        ctx: &mut BuildContext,
        id: &SchemaId,
        base: &SchemaId,
    ) -> Result<Option<Source>, SkemaError> {
        if base == id {
            return Err(SchemaBuildError::ExtendsCycle {
                chain: vec![id.to_string(), base.to_string()],
            }
            .into());
        }
        if let Some(pos) = ctx.stack.iter().position(|(s, _)| s == base) {
            let only_extends = ctx.stack[pos + 1..].iter().all(|(_, e)| *e == Edge::Extends);
            if only_extends {
                let mut chain: Vec<String> =
                    ctx.stack[pos..].iter().map(|(s, _)| s.to_string()).collect();
                chain.push(base.to_string());
                return Err(SchemaBuildError::ExtendsCycle { chain }.into());
            }
            let node = self
                .node(reg, ctx, base)
                .ok_or_else(|| SchemaBuildError::UnresolvedReference {
                    schema: id.to_string(),
                    reference: base.to_string(),
                })?;
            tracing::debug!(type_id = %id, base = %base, "base under construction, merging its schema");
            let schema = Schema::from_value(base.as_str(), &node)?;
            return Ok(Some(Source::Pending {
                id: base.clone(),
                schema,
            }));
        }
        Ok(self
            .ensure(reg, ctx, id, base, None, Edge::Extends)?
            .map(Source::Built))
    }

    fn sources(
        &self,
        reg: &Registry,
        ctx: &mut BuildContext,
        id: &SchemaId,
        schema: &Schema,
    ) -> Result<Vec<Source>, SkemaError> {
        let mut refs: Vec<SchemaId> = schema.extends.iter().map(|e| id.join(e)).collect();
        if let Some(r) = &schema.reference {
            refs.push(id.join(r));
        }
        let mut sources = Vec::new();
        let mut seen = BTreeSet::new();
        let mut queue: Vec<(SchemaId, SchemaId)> =
            refs.into_iter().rev().map(|b| (id.clone(), b)).collect();
        while let Some((from, base)) = queue.pop() {
            if !seen.insert(base.clone()) {
                continue;
            }
            match self.base(reg, ctx, &from, &base)? {
                Some(Source::Pending { id: pid, schema: ps }) => {
                    // A pending base contributes its own bases as well.
                    for e in ps.extends.iter().rev() {
                        queue.push((pid.clone(), pid.join(e)));
                    }
                    sources.push(Source::Pending { id: pid, schema: ps });
                }
                Some(built) => sources.push(built),
                None => {}
            }
        }
        // Drop bases implied by a more derived built base.
        let implied: BTreeSet<SchemaId> = sources
            .iter()
            .filter_map(|s| match s {
                Source::Built(t) => Some(t.ancestors.iter().cloned()),
                Source::Pending { .. } => None,
            })
            .flatten()
            .collect();
        sources.retain(|s| match s {
            Source::Built(t) => !implied.contains(&t.id),
            Source::Pending { id, .. } => !implied.contains(id),
        });
        Ok(sources)
    }

    // ── Assembly ────────────────────────────────────────────────────

    fn assemble(
        &self,
        reg: &Registry,
        ctx: &mut BuildContext,
        id: &SchemaId,
        node: &Value,
    ) -> Result<TypeDescriptor, SkemaError> {
        let schema = Schema::from_value(id.as_str(), node)?;
        let name = id.type_name();
        let sources = self.sources(reg, ctx, id, &schema)?;

        let mut extends = Vec::new();
        let mut ancestors = BTreeSet::new();
        let mut properties: Vec<(String, PropertyType)> = Vec::new();
        let mut required = BTreeSet::new();
        let mut read_only = BTreeSet::new();
        let mut not_serialized = BTreeSet::new();
        let mut not_validated = BTreeSet::new();
        let mut primary_keys: Vec<String> = schema.primary_keys.clone();
        let mut aliases = schema.aliases.clone();
        let mut negated_aliases = schema.negated_aliases.clone();
        let mut dependencies = DependencyGraph::new();
        let mut descriptors: BTreeMap<String, PropertyDescriptor> = BTreeMap::new();
        let mut methods: BTreeMap<String, Method> = BTreeMap::new();
        let mut patterns = Vec::new();
        let mut lazy_loading = schema.lazy_loading;

        for source in &sources {
            match source {
                Source::Built(base) => {
                    extends.push(base.id.clone());
                    ancestors.insert(base.id.clone());
                    ancestors.extend(base.ancestors.iter().cloned());
                    for (k, t) in &base.properties {
                        inherit_property(&mut properties, k, t);
                    }
                    required.extend(base.required.iter().cloned());
                    read_only.extend(base.read_only.iter().cloned());
                    not_serialized.extend(base.not_serialized.iter().cloned());
                    not_validated.extend(base.not_validated.iter().cloned());
                    if primary_keys.is_empty() {
                        primary_keys = base.primary_keys.clone();
                    }
                    for (a, p) in &base.aliases {
                        aliases.entry(a.clone()).or_insert_with(|| p.clone());
                    }
                    for (a, p) in &base.negated_aliases {
                        negated_aliases.entry(a.clone()).or_insert_with(|| p.clone());
                    }
                    dependencies.merge(&base.dependencies);
                    for (k, d) in &base.descriptors {
                        descriptors.entry(k.clone()).or_insert_with(|| d.clone());
                    }
                    for (k, m) in &base.methods {
                        methods.entry(k.clone()).or_insert_with(|| Arc::clone(m));
                    }
                    patterns.extend(base.patterns.iter().cloned());
                    lazy_loading = lazy_loading.or(base.lazy_loading);
                }
                Source::Pending { id: pid, schema: ps } => {
                    if !extends.contains(pid) && schema.extends.iter().any(|e| id.join(e) == *pid) {
                        extends.push(pid.clone());
                    }
                    ancestors.insert(pid.clone());
                    for (k, v) in &ps.properties {
                        let t = self.property_type(reg, ctx, pid, &pid.child("properties", k), v)?;
                        inherit_property(&mut properties, k, &t);
                    }
                    required.extend(ps.required.iter().cloned());
                    read_only.extend(ps.read_only.names().iter().cloned());
                    not_serialized.extend(ps.not_serialized.iter().cloned());
                    not_validated.extend(ps.not_validated.iter().cloned());
                    if primary_keys.is_empty() {
                        primary_keys = ps.primary_keys.clone();
                    }
                    for (a, p) in &ps.aliases {
                        aliases.entry(a.clone()).or_insert_with(|| p.clone());
                    }
                    for (a, p) in &ps.negated_aliases {
                        negated_aliases.entry(a.clone()).or_insert_with(|| p.clone());
                    }
                    for (k, v) in &ps.dependencies {
                        dependencies.add(k, v.iter().cloned());
                    }
                    lazy_loading = lazy_loading.or(ps.lazy_loading);

                    // The pending base's business logic is not built yet either.
                    let pname = pid.type_name();
                    if let Some(defaults) = self.config.defaults_for(pid.as_str(), &pname) {
                        for (k, v) in defaults {
                            set_default(pid, &mut properties, k, v)?;
                        }
                    }
                    let pending = reg
                        .overrides
                        .get(pid.as_str())
                        .or_else(|| reg.overrides.get(&pname));
                    if let Some(po) = pending {
                        for (k, v) in &po.defaults {
                            set_default(pid, &mut properties, k, v)?;
                            read_only.insert(k.clone());
                        }
                        for (k, d) in &po.accessors {
                            descriptors.entry(k.clone()).or_insert_with(|| d.clone());
                        }
                        for (k, deps) in &po.depends_on {
                            dependencies.add(k, deps.iter().cloned());
                        }
                        for (k, m) in &po.methods {
                            methods.entry(k.clone()).or_insert_with(|| Arc::clone(m));
                        }
                    }
                }
            }
        }

        // Own properties shadow inherited ones in place.
        for (k, v) in &schema.properties {
            let pid = id.child("properties", k);
            let t = self.property_type(reg, ctx, id, &pid, v)?;
            if let Some(default) = v.get("default") {
                check_default(id, k, &t, default)?;
            }
            if v.get("readOnly").and_then(Value::as_bool) == Some(true) {
                read_only.insert(k.clone());
            }
            match properties.iter_mut().find(|(n, _)| n == k) {
                Some(slot) => slot.1 = t,
                None => properties.push((k.clone(), t)),
            }
        }

        required.extend(schema.required.iter().cloned());
        read_only.extend(schema.read_only.names().iter().cloned());
        not_serialized.extend(schema.not_serialized.iter().cloned());
        not_validated.extend(schema.not_validated.iter().cloned());
        for (k, v) in &schema.dependencies {
            dependencies.add(k, v.iter().cloned());
        }

        // Configured defaults, then hard-set class defaults.
        if let Some(defaults) = self.config.defaults_for(id.as_str(), &name) {
            for (k, v) in defaults {
                set_default(id, &mut properties, k, v)?;
            }
        }
        let overrides = reg
            .overrides
            .get(id.as_str())
            .or_else(|| reg.overrides.get(&name))
            .cloned()
            .unwrap_or_default();
        for (k, v) in &overrides.defaults {
            set_default(id, &mut properties, k, v)?;
            read_only.insert(k.clone());
        }
        for (k, d) in &overrides.accessors {
            if !properties.iter().any(|(n, _)| n == k) {
                return Err(SchemaBuildError::InvalidSchema {
                    schema: id.to_string(),
                    reason: format!("accessor registered for undeclared property '{k}'"),
                }
                .into());
            }
            let merged = match descriptors.get(k) {
                Some(inherited) => d.clone().inherit(inherited),
                None => d.clone(),
            };
            descriptors.insert(k.clone(), merged);
        }
        for (k, deps) in &overrides.depends_on {
            dependencies.add(k, deps.iter().cloned());
        }
        for (k, m) in &overrides.methods {
            methods.insert(k.clone(), Arc::clone(m));
        }

        // Template defaults depend on the properties they mention.
        let names: BTreeSet<String> = properties.iter().map(|(k, _)| k.clone()).collect();
        for (k, t) in &properties {
            if let Some(default) = &t.default {
                let inputs: Vec<String> = t
                    .inputs(default)
                    .into_iter()
                    .filter(|v| names.contains(v))
                    .collect();
                dependencies.add(k, inputs);
            }
        }

        if let Some(missing) = required.iter().find(|r| !names.contains(*r)) {
            return Err(SchemaBuildError::InvalidSchema {
                schema: id.to_string(),
                reason: format!("required property '{missing}' is not declared"),
            }
            .into());
        }

        let mut translations = BTreeMap::new();
        for (k, _) in &properties {
            let clean = clean_identifier(k);
            if clean != *k && !names.contains(&clean) {
                translations.entry(clean).or_insert_with(|| k.clone());
            }
        }

        let mut own_patterns = Vec::new();
        for (pattern, v) in &schema.pattern_properties {
            let re = Regex::new(pattern).map_err(|e| SchemaBuildError::InvalidSchema {
                schema: id.to_string(),
                reason: format!("invalid pattern property '{pattern}': {e}"),
            })?;
            let pid = id.child("patternProperties", pattern);
            own_patterns.push((re, self.property_type(reg, ctx, id, &pid, v)?));
        }
        own_patterns.extend(patterns);

        let additional = match &schema.additional_properties {
            None | Some(Value::Bool(true)) => Additional::Any,
            Some(Value::Bool(false)) => Additional::Forbidden,
            Some(v) => {
                let pid = SchemaId::new(format!("{}/additionalProperties", fragment_base(id)));
                Additional::Typed(Box::new(self.property_type(reg, ctx, id, &pid, v)?))
            }
        };

        let index = properties
            .iter()
            .enumerate()
            .map(|(i, (k, _))| (k.clone(), i))
            .collect();

        tracing::debug!(
            type_id = %id,
            bases = extends.len(),
            dependencies = dependencies.as_map().len(),
            "type assembled"
        );

        Ok(TypeDescriptor {
            id: id.clone(),
            name,
            description: schema.description.clone(),
            extends,
            ancestors,
            properties,
            index,
            required,
            read_only,
            not_serialized,
            not_validated,
            primary_keys,
            aliases,
            negated_aliases,
            translations,
            dependencies,
            descriptors,
            methods,
            additional,
            patterns: own_patterns,
            lazy_loading,
            name_field: self.config.name_field.clone(),
        })
    }

    // ── Property types ──────────────────────────────────────────────

    fn property_type(
        &self,
        reg: &Registry,
        ctx: &mut BuildContext,
        owner: &SchemaId,
        pid: &SchemaId,
        node: &Value,
    ) -> Result<PropertyType, SkemaError> {
        let schema = Schema::from_value(pid.as_str(), node)?;

        if let Some(reference) = &schema.reference {
            let rid = pid.join(reference);
            let rnode = self
                .node(reg, ctx, &rid)
                .ok_or_else(|| SchemaBuildError::UnresolvedReference {
                    schema: owner.to_string(),
                    reference: rid.to_string(),
                })?;
            let rschema = Schema::from_value(rid.as_str(), &rnode)?;
            let mut t = if rschema.is_object() {
                self.ensure(reg, ctx, owner, &rid, Some(&rnode), Edge::Property)?;
                let mut t = PropertyType::new(TypeKind::Object(rid.clone()));
                t.nullable = rschema.is_nullable();
                t.default = rschema.default.clone();
                t
            } else {
                self.property_type(reg, ctx, owner, &rid, &rnode)?
            };
            if schema.default.is_some() {
                t.default = schema.default.clone();
            }
            if schema.description.is_some() {
                t.description = schema.description.clone();
            }
            t.nullable |= schema.is_nullable();
            return Ok(t);
        }

        let compile = |id: &SchemaId| {
            ConstraintValidator::new(id.as_str(), node).map_err(SkemaError::from)
        };

        let kind = if let Some(fk) = &schema.foreign_key {
            let target = pid.join(&fk.schema);
            if self.lookup(reg, ctx, &target).is_none() && self.node(reg, ctx, &target).is_none() {
                return Err(SchemaBuildError::UnresolvedReference {
                    schema: owner.to_string(),
                    reference: target.to_string(),
                }
                .into());
            }
            self.ensure(reg, ctx, owner, &target, None, Edge::Property)?;
            TypeKind::ForeignKey(ForeignKeyType {
                target,
                keys: fk.key.clone(),
                nullable: schema.is_nullable(),
            })
        } else if schema.candidates().next().is_some() {
            let mut candidates = Vec::new();
            for (i, c) in schema.candidates().enumerate() {
                let cid = SchemaId::new(format!("{}/oneOf/{i}", fragment_base(pid)));
                candidates.push(self.property_type(reg, ctx, owner, &cid, c)?);
            }
            TypeKind::OneOf(candidates)
        } else if schema.is_array() {
            let items = match &schema.items {
                Some(items @ (Value::Object(_) | Value::Bool(true))) => {
                    let iid = SchemaId::new(format!("{}/items", fragment_base(pid)));
                    self.property_type(reg, ctx, owner, &iid, items)?
                }
                _ => any_type(pid)?,
            };
            TypeKind::Array {
                items: Box::new(items),
                constraints: Arc::new(compile(pid)?),
            }
        } else if schema.is_object() {
            self.ensure(reg, ctx, owner, pid, Some(node), Edge::Property)?;
            TypeKind::Object(pid.clone())
        } else {
            let named: Vec<&str> = schema
                .types
                .iter()
                .map(String::as_str)
                .filter(|t| *t != "null")
                .collect();
            let kind = match named.as_slice() {
                [] if schema.is_nullable() => LiteralKind::Null,
                [one] => LiteralKind::from_type_name(one, schema.format.as_deref()),
                [] => LiteralKind::from_type_name("any", schema.format.as_deref()),
                _ => LiteralKind::Any,
            };
            TypeKind::Literal(LiteralType::new(kind, schema.is_nullable(), compile(pid)?))
        };

        let default = match (&kind, &schema.default) {
            (_, Some(d)) => Some(d.clone()),
            (TypeKind::Array { .. }, None) => Some(Value::Array(Vec::new())),
            _ => None,
        };
        Ok(PropertyType {
            kind,
            default,
            nullable: schema.is_nullable(),
            description: schema.description.clone(),
        })
    }
}

impl std::fmt::Debug for TypeBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TypeBuilder")
            .field("types", &self.built_ids())
            .finish_non_exhaustive()
    }
}

fn commit(reg: &mut Registry, ctx: BuildContext) {
    reg.documents.extend(ctx.documents);
    reg.types.extend(ctx.built);
}

/// `doc#/a/b` stays, `doc` becomes `doc#`, for appending pointer segments.
fn fragment_base(id: &SchemaId) -> String {
    match id.fragment() {
        Some(_) => id.to_string(),
        None => format!("{}#", id.document()),
    }
}

fn any_type(pid: &SchemaId) -> Result<PropertyType, SkemaError> {
    let validator = ConstraintValidator::new(pid.as_str(), &Value::Object(Default::default()))?;
    Ok(PropertyType::new(TypeKind::Literal(LiteralType::new(
        LiteralKind::Any,
        true,
        validator,
    ))))
}

fn check_default(
    id: &SchemaId,
    property: &str,
    t: &PropertyType,
    value: &Value,
) -> Result<(), SchemaBuildError> {
    if t.is_template(value) {
        return Ok(());
    }
    t.check(property, value)
        .map_err(|e| SchemaBuildError::InvalidValue {
            schema: id.to_string(),
            property: property.to_string(),
            reason: e.to_string(),
        })
}

fn set_default(
    id: &SchemaId,
    properties: &mut [(String, PropertyType)],
    property: &str,
    value: &Value,
) -> Result<(), SchemaBuildError> {
    let Some((_, t)) = properties.iter_mut().find(|(n, _)| n == property) else {
        return Err(SchemaBuildError::InvalidValue {
            schema: id.to_string(),
            property: property.to_string(),
            reason: "not a declared property".to_string(),
        });
    };
    check_default(id, property, t, value)?;
    t.default = Some(value.clone());
    Ok(())
}

/// First declaration wins for inherited properties.
fn inherit_property(properties: &mut Vec<(String, PropertyType)>, name: &str, t: &PropertyType) {
    if !properties.iter().any(|(n, _)| n == name) {
        properties.push((name.to_string(), t.clone()));
    }
}
