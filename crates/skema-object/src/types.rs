//! # Type Descriptors
//!
//! The class builder's output. A [`TypeDescriptor`] is plain data that the
//! generic instance runtime interprets: the flattened property table,
//! the unioned flag sets, alias and translation tables, the dependency
//! graph, accessors and methods.
//!
//! Descriptors are immutable once published and shared as
//! `Arc<TypeDescriptor>`.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use regex::Regex;
use serde::Serialize;
use serde_json::{Map, Value};
use skema_core::{KeyError, SchemaId};

use crate::dependency::DependencyGraph;
use crate::descriptor::{Method, PropertyDescriptor};
use crate::property::PropertyType;

/// Policy for undeclared keys.
#[derive(Debug, Clone)]
pub enum Additional {
    /// `additionalProperties: false`.
    Forbidden,
    /// Accepted and stored as given.
    Any,
    /// Accepted and validated against a type.
    Typed(Box<PropertyType>),
}

/// A key as resolved by [`TypeDescriptor::resolve`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResolvedKey {
    /// A declared property, reached through a negated alias when `negated`.
    Property {
        /// Raw declared name.
        name: String,
        /// Whether values are negated through this key.
        negated: bool,
    },
    /// An undeclared key accepted by `additionalProperties` or a pattern.
    Additional(String),
    /// A user method shadowing any property of the same name.
    Method(String),
}

/// Comparable snapshot of a type's structure.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TypeShape {
    /// Schema id.
    pub id: String,
    /// Direct bases.
    pub extends: Vec<String>,
    /// Flattened property table, in order, as type signatures.
    pub properties: Map<String, Value>,
    /// Required properties.
    pub required: BTreeSet<String>,
    /// Read-only properties.
    pub read_only: BTreeSet<String>,
    /// Properties left out of serialization.
    pub not_serialized: BTreeSet<String>,
    /// Properties stored without validation.
    pub not_validated: BTreeSet<String>,
    /// Primary keys.
    pub primary_keys: Vec<String>,
    /// Aliases.
    pub aliases: BTreeMap<String, String>,
    /// Negated aliases.
    pub negated_aliases: BTreeMap<String, String>,
    /// Cleaned identifier → raw property name.
    pub translations: BTreeMap<String, String>,
    /// Dependency map.
    pub dependencies: BTreeMap<String, BTreeSet<String>>,
}

/// A built type.
pub struct TypeDescriptor {
    pub(crate) id: SchemaId,
    pub(crate) name: String,
    pub(crate) description: Option<String>,
    pub(crate) extends: Vec<SchemaId>,
    pub(crate) ancestors: BTreeSet<SchemaId>,
    pub(crate) properties: Vec<(String, PropertyType)>,
    pub(crate) index: BTreeMap<String, usize>,
    pub(crate) required: BTreeSet<String>,
    pub(crate) read_only: BTreeSet<String>,
    pub(crate) not_serialized: BTreeSet<String>,
    pub(crate) not_validated: BTreeSet<String>,
    pub(crate) primary_keys: Vec<String>,
    pub(crate) aliases: BTreeMap<String, String>,
    pub(crate) negated_aliases: BTreeMap<String, String>,
    pub(crate) translations: BTreeMap<String, String>,
    pub(crate) dependencies: DependencyGraph,
    pub(crate) descriptors: BTreeMap<String, PropertyDescriptor>,
    pub(crate) methods: BTreeMap<String, Method>,
    pub(crate) additional: Additional,
    pub(crate) patterns: Vec<(Regex, PropertyType)>,
    pub(crate) lazy_loading: Option<bool>,
    pub(crate) name_field: String,
}

impl TypeDescriptor {
    /// Schema id.
    pub fn id(&self) -> &SchemaId {
        &self.id
    }

    /// Type name derived from the id.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Schema description.
    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    /// Direct bases, after dropping bases implied by others.
    pub fn extends(&self) -> &[SchemaId] {
        &self.extends
    }

    /// Whether this type is `other` or derives from it.
    pub fn is_subtype_of(&self, other: &SchemaId) -> bool {
        &self.id == other || self.ancestors.contains(other)
    }

    /// All transitive bases.
    pub fn ancestors(&self) -> &BTreeSet<SchemaId> {
        &self.ancestors
    }

    /// Flattened property table in order.
    pub fn properties(&self) -> impl Iterator<Item = (&str, &PropertyType)> {
        self.properties.iter().map(|(k, t)| (k.as_str(), t))
    }

    /// Property names in order.
    pub fn property_names(&self) -> Vec<String> {
        self.properties.iter().map(|(k, _)| k.clone()).collect()
    }

    /// Declared property type.
    pub fn property(&self, name: &str) -> Option<&PropertyType> {
        self.index.get(name).map(|&i| &self.properties[i].1)
    }

    /// Declaration position of a property.
    pub fn position(&self, name: &str) -> Option<usize> {
        self.index.get(name).copied()
    }

    /// Whether `name` is a declared property.
    pub fn has_property(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    /// Required set.
    pub fn required(&self) -> &BTreeSet<String> {
        &self.required
    }

    /// Whether a property is required.
    pub fn is_required(&self, name: &str) -> bool {
        self.required.contains(name)
    }

    /// Whether a property is read-only.
    pub fn is_read_only(&self, name: &str) -> bool {
        self.read_only.contains(name)
    }

    /// Whether a property is left out of serialization.
    pub fn is_not_serialized(&self, name: &str) -> bool {
        self.not_serialized.contains(name)
    }

    /// Whether a property skips validation.
    pub fn is_not_validated(&self, name: &str) -> bool {
        self.not_validated.contains(name)
    }

    /// Aliases (`alias → property`).
    pub fn aliases(&self) -> &BTreeMap<String, String> {
        &self.aliases
    }

    /// Negated aliases (`alias → property`).
    pub fn negated_aliases(&self) -> &BTreeMap<String, String> {
        &self.negated_aliases
    }

    /// Cleaned identifier → raw name.
    pub fn translations(&self) -> &BTreeMap<String, String> {
        &self.translations
    }

    /// Dependency graph.
    pub fn dependencies(&self) -> &DependencyGraph {
        &self.dependencies
    }

    /// Accessors of a property, if any were registered.
    pub fn descriptor(&self, name: &str) -> Option<&PropertyDescriptor> {
        self.descriptors.get(name)
    }

    /// A user method.
    pub fn method(&self, name: &str) -> Option<&Method> {
        self.methods.get(name)
    }

    /// Names of user methods.
    pub fn method_names(&self) -> impl Iterator<Item = &str> {
        self.methods.keys().map(String::as_str)
    }

    /// Schema-level `lazyLoading`.
    pub fn lazy_loading(&self) -> Option<bool> {
        self.lazy_loading
    }

    /// Declared external name field.
    pub fn name_field(&self) -> &str {
        &self.name_field
    }

    /// Declared primary keys, else inherited ones, else the name field when
    /// it is a property.
    pub fn primary_keys(&self) -> Vec<String> {
        if !self.primary_keys.is_empty() {
            self.primary_keys.clone()
        } else if self.has_property(&self.name_field) {
            vec![self.name_field.clone()]
        } else {
            Vec::new()
        }
    }

    /// Default raw value of a property.
    pub fn default_of(&self, name: &str) -> Option<&Value> {
        self.property(name).and_then(|t| t.default.as_ref())
    }

    /// Type of a declared or accepted undeclared key.
    pub fn type_of(&self, name: &str) -> Option<&PropertyType> {
        if let Some(t) = self.property(name) {
            return Some(t);
        }
        if let Some((_, t)) = self.patterns.iter().find(|(re, _)| re.is_match(name)) {
            return Some(t);
        }
        match &self.additional {
            Additional::Typed(t) => Some(t),
            _ => None,
        }
    }

    /// Whether an undeclared key is accepted.
    pub fn accepts_additional(&self, name: &str) -> bool {
        !matches!(self.additional, Additional::Forbidden)
            || self.patterns.iter().any(|(re, _)| re.is_match(name))
    }

    /// Resolve a key to a property, an additional key or a method.
    ///
    /// Methods shadow everything. Then a negated alias, an alias and a
    /// cleaned-name translation are applied in turn before the flattened
    /// table is consulted.
    pub fn resolve(&self, key: &str) -> Result<ResolvedKey, KeyError> {
        if self.methods.contains_key(key) {
            return Ok(ResolvedKey::Method(key.to_string()));
        }
        self.resolve_property(key)
    }

    /// Like [`resolve`](Self::resolve), ignoring methods.
    pub fn resolve_property(&self, key: &str) -> Result<ResolvedKey, KeyError> {
        let (name, negated) = match self.negated_aliases.get(key) {
            Some(target) => (target.as_str(), true),
            None => (key, false),
        };
        let name = self.aliases.get(name).map_or(name, String::as_str);
        if self.has_property(name) {
            return Ok(ResolvedKey::Property {
                name: name.to_string(),
                negated,
            });
        }
        if let Some(raw) = self.translations.get(name) {
            return Ok(ResolvedKey::Property {
                name: raw.clone(),
                negated,
            });
        }
        if self.accepts_additional(name) {
            return Ok(ResolvedKey::Additional(name.to_string()));
        }
        Err(KeyError::UnknownProperty {
            type_name: self.name.clone(),
            key: key.to_string(),
        })
    }

    /// Structural snapshot.
    pub fn shape(&self) -> TypeShape {
        TypeShape {
            id: self.id.to_string(),
            extends: self.extends.iter().map(ToString::to_string).collect(),
            properties: self
                .properties
                .iter()
                .map(|(k, t)| (k.clone(), t.signature()))
                .collect(),
            required: self.required.clone(),
            read_only: self.read_only.clone(),
            not_serialized: self.not_serialized.clone(),
            not_validated: self.not_validated.clone(),
            primary_keys: self.primary_keys(),
            aliases: self.aliases.clone(),
            negated_aliases: self.negated_aliases.clone(),
            translations: self.translations.clone(),
            dependencies: self.dependencies.as_map().clone(),
        }
    }
}

impl fmt::Debug for TypeDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TypeDescriptor")
            .field("id", &self.id)
            .field("properties", &self.property_names())
            .field("extends", &self.extends)
            .finish_non_exhaustive()
    }
}
