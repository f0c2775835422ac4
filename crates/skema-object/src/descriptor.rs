//! # Property Descriptors and Business Logic
//!
//! A type built from a schema can carry user code, registered on the
//! builder before the type is built:
//!
//! - **defaults**: hard-set values. They become the property default and
//!   make the property read-only.
//! - **getters**: compute the raw value on every read.
//! - **setters**: run with the freshly validated value after an evaluation
//!   triggered by a write, or by a read of an outdated property.
//! - **deleters**: run before a property is removed.
//! - **depends_on**: extra dependencies of a property.
//! - **methods**: named operations on an instance. A method with the name
//!   of a property shadows that property for name resolution.
//!
//! Accessors are inherited: a subtype without its own getter for a property
//! uses its base's.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::sync::Arc;

use serde_json::Value;
use skema_core::{InstanceId, SkemaError};

use crate::store::ObjectStore;

/// Computes the raw value of a property.
pub type Getter = Arc<dyn Fn(&mut ObjectStore, InstanceId) -> Result<Value, SkemaError> + Send + Sync>;

/// Receives the validated value of a property.
pub type Setter =
    Arc<dyn Fn(&mut ObjectStore, InstanceId, &Value) -> Result<(), SkemaError> + Send + Sync>;

/// Runs before a property is deleted.
pub type Deleter = Arc<dyn Fn(&mut ObjectStore, InstanceId) -> Result<(), SkemaError> + Send + Sync>;

/// A named operation on an instance.
pub type Method =
    Arc<dyn Fn(&mut ObjectStore, InstanceId, &[Value]) -> Result<Value, SkemaError> + Send + Sync>;

/// Per-property accessor set.
#[derive(Clone, Default)]
pub struct PropertyDescriptor {
    /// Custom getter.
    pub getter: Option<Getter>,
    /// Custom setter.
    pub setter: Option<Setter>,
    /// Custom deleter.
    pub deleter: Option<Deleter>,
}

impl PropertyDescriptor {
    /// Whether no accessor is set.
    pub fn is_plain(&self) -> bool {
        self.getter.is_none() && self.setter.is_none() && self.deleter.is_none()
    }

    /// Fill missing accessors from an inherited descriptor.
    pub fn inherit(mut self, base: &PropertyDescriptor) -> Self {
        if self.getter.is_none() {
            self.getter = base.getter.clone();
        }
        if self.setter.is_none() {
            self.setter = base.setter.clone();
        }
        if self.deleter.is_none() {
            self.deleter = base.deleter.clone();
        }
        self
    }
}

impl fmt::Debug for PropertyDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PropertyDescriptor")
            .field("getter", &self.getter.is_some())
            .field("setter", &self.setter.is_some())
            .field("deleter", &self.deleter.is_some())
            .finish()
    }
}

/// Business logic attached to a type before it is built.
#[derive(Clone, Default)]
pub struct TypeOverrides {
    pub(crate) defaults: BTreeMap<String, Value>,
    pub(crate) accessors: BTreeMap<String, PropertyDescriptor>,
    pub(crate) depends_on: BTreeMap<String, BTreeSet<String>>,
    pub(crate) methods: BTreeMap<String, Method>,
}

impl TypeOverrides {
    /// No overrides.
    pub fn new() -> Self {
        Self::default()
    }

    /// Hard-set a property value (default + read-only).
    pub fn default_value(mut self, property: impl Into<String>, value: Value) -> Self {
        self.defaults.insert(property.into(), value);
        self
    }

    /// Register a getter.
    pub fn getter<F>(mut self, property: impl Into<String>, f: F) -> Self
    where
        F: Fn(&mut ObjectStore, InstanceId) -> Result<Value, SkemaError> + Send + Sync + 'static,
    {
        self.accessors.entry(property.into()).or_default().getter = Some(Arc::new(f));
        self
    }

    /// Register a setter.
    pub fn setter<F>(mut self, property: impl Into<String>, f: F) -> Self
    where
        F: Fn(&mut ObjectStore, InstanceId, &Value) -> Result<(), SkemaError>
            + Send
            + Sync
            + 'static,
    {
        self.accessors.entry(property.into()).or_default().setter = Some(Arc::new(f));
        self
    }

    /// Register a deleter.
    pub fn deleter<F>(mut self, property: impl Into<String>, f: F) -> Self
    where
        F: Fn(&mut ObjectStore, InstanceId) -> Result<(), SkemaError> + Send + Sync + 'static,
    {
        self.accessors.entry(property.into()).or_default().deleter = Some(Arc::new(f));
        self
    }

    /// Declare extra dependencies of a property.
    pub fn depends_on<I, S>(mut self, property: impl Into<String>, inputs: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.depends_on
            .entry(property.into())
            .or_default()
            .extend(inputs.into_iter().map(Into::into));
        self
    }

    /// Register a method.
    pub fn method<F>(mut self, name: impl Into<String>, f: F) -> Self
    where
        F: Fn(&mut ObjectStore, InstanceId, &[Value]) -> Result<Value, SkemaError>
            + Send
            + Sync
            + 'static,
    {
        self.methods.insert(name.into(), Arc::new(f));
        self
    }
}

impl fmt::Debug for TypeOverrides {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TypeOverrides")
            .field("defaults", &self.defaults)
            .field("accessors", &self.accessors)
            .field("depends_on", &self.depends_on)
            .field("methods", &self.methods.keys().collect::<Vec<_>>())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_inherit_fills_missing_accessors() {
        let base = TypeOverrides::new()
            .getter("a", |_, _| Ok(json!(1)))
            .setter("a", |_, _, _| Ok(()));
        let own = TypeOverrides::new().getter("a", |_, _| Ok(json!(2)));
        let merged = own.accessors["a"].clone().inherit(&base.accessors["a"]);
        assert!(merged.getter.is_some());
        assert!(merged.setter.is_some());
        assert!(merged.deleter.is_none());
        assert!(!merged.is_plain());
    }

    #[test]
    fn test_depends_on_accumulates() {
        let o = TypeOverrides::new().depends_on("c", ["a"]).depends_on("c", ["b"]);
        assert_eq!(o.depends_on["c"].len(), 2);
    }
}
