//! # Error Types — Structured Error Hierarchy
//!
//! Defines the error types used throughout skema. All errors use
//! `thiserror` for derive-based `Display` and `Error` implementations.
//!
//! ## Design
//!
//! - Build errors are fatal for the type being built: no partially built
//!   type is ever published to the registry.
//! - Validation errors carry the property name and, when produced by the
//!   constraint validator, the full list of structured violations.
//! - Instance-level errors are local to the operation that raised them.
//!   They cross lazy-evaluation and dependency boundaries unchanged, so the
//!   caller always sees the variant produced at the source.

use std::fmt;

use thiserror::Error;

use crate::identity::InstanceId;

/// Top-level error type for skema.
#[derive(Error, Debug)]
pub enum SkemaError {
    /// A type could not be built from its schema.
    #[error("schema build error: {0}")]
    Build(#[from] SchemaBuildError),

    /// A value failed its declared type or constraints.
    #[error("validation error: {0}")]
    Validation(#[from] ValidationError),

    /// A read-only property was written or a required one removed.
    #[error("access error: {0}")]
    Access(#[from] AccessError),

    /// Unknown property name or unresolvable canonical name.
    #[error("key error: {0}")]
    Key(#[from] KeyError),

    /// A foreign key or reference could not be resolved.
    #[error("reference error: {0}")]
    Reference(#[from] ReferenceError),

    /// A user-supplied getter, setter, deleter or method failed.
    #[error("behavior '{name}' failed: {reason}")]
    Behavior {
        /// Name of the failing accessor or method.
        name: String,
        /// Reason reported by the user code.
        reason: String,
    },

    /// IO error reading schemas or documents.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization/deserialization error of a document format.
    #[error("serialization error: {0}")]
    Serialization(String),
}

impl SkemaError {
    /// Convenience constructor for errors raised by user business logic.
    pub fn behavior(name: impl Into<String>, reason: impl fmt::Display) -> Self {
        Self::Behavior {
            name: name.into(),
            reason: reason.to_string(),
        }
    }

    /// Whether this error is a read-only or required-property violation.
    pub fn is_access(&self) -> bool {
        matches!(self, Self::Access(_))
    }

    /// Whether this error is a validation failure.
    pub fn is_validation(&self) -> bool {
        matches!(self, Self::Validation(_))
    }

    /// Whether this error is a key (unknown name) error.
    pub fn is_key(&self) -> bool {
        matches!(self, Self::Key(_))
    }

    /// Whether this error is a reference resolution failure.
    pub fn is_reference(&self) -> bool {
        matches!(self, Self::Reference(_))
    }
}

impl From<serde_json::Error> for SkemaError {
    fn from(e: serde_json::Error) -> Self {
        Self::Serialization(e.to_string())
    }
}

/// Error raised while building a type from a schema.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SchemaBuildError {
    /// The schema is malformed or self-contradictory.
    #[error("invalid schema '{schema}': {reason}")]
    InvalidSchema {
        /// Schema identifier.
        schema: String,
        /// What is wrong with it.
        reason: String,
    },

    /// A class-supplied default does not satisfy the property type.
    #[error("invalid default for '{schema}.{property}': {reason}")]
    InvalidValue {
        /// Schema identifier.
        schema: String,
        /// Property carrying the default.
        property: String,
        /// Why the default was rejected.
        reason: String,
    },

    /// An `extends`, `$ref` or foreign-key target could not be resolved.
    #[error("unresolved reference '{reference}' in '{schema}'")]
    UnresolvedReference {
        /// Schema holding the reference.
        schema: String,
        /// The reference that failed.
        reference: String,
    },

    /// The `extends` graph loops back on a schema being built.
    #[error("extends cycle: {}", chain.join(" -> "))]
    ExtendsCycle {
        /// Schemas forming the cycle, in traversal order.
        chain: Vec<String>,
    },
}

/// A single constraint violation with structured context.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Violation {
    /// JSON Pointer path to the violating field in the value.
    pub instance_path: String,
    /// JSON Pointer path within the schema that triggered the error.
    pub schema_path: String,
    /// Human-readable description of the violation.
    pub message: String,
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.instance_path.is_empty() {
            write!(f, "  (root): {}", self.message)
        } else {
            write!(f, "  {}: {}", self.instance_path, self.message)
        }
    }
}

/// Collection of constraint violations.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Violations {
    violations: Vec<Violation>,
}

impl Violations {
    /// Wrap a list of violations.
    pub fn new(violations: Vec<Violation>) -> Self {
        Self { violations }
    }

    /// Returns the number of violations.
    pub fn len(&self) -> usize {
        self.violations.len()
    }

    /// Returns true if there are no violations.
    pub fn is_empty(&self) -> bool {
        self.violations.is_empty()
    }

    /// Returns a slice of all violations.
    pub fn violations(&self) -> &[Violation] {
        &self.violations
    }

    /// Consumes self and returns the inner Vec.
    pub fn into_inner(self) -> Vec<Violation> {
        self.violations
    }
}

impl fmt::Display for Violations {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, v) in self.violations.iter().enumerate() {
            if i > 0 {
                writeln!(f)?;
            }
            write!(f, "{v}")?;
        }
        Ok(())
    }
}

/// A value failed its declared type or constraints.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// The value violates one or more schema constraints.
    #[error("'{property}' violates its constraints:\n{violations}")]
    Constraint {
        /// Property being validated.
        property: String,
        /// Structured list of individual violations.
        violations: Violations,
    },

    /// The value has the wrong shape and no declared conversion applies.
    #[error("'{property}' expects {expected}, found {found}")]
    Conversion {
        /// Property being validated.
        property: String,
        /// Expected kind of value.
        expected: String,
        /// Rendering of the offending value.
        found: String,
    },

    /// None of the `oneOf` candidates accepted the value.
    #[error("'{property}' matches none of its candidate types: {}", errors.join("; "))]
    NoMatchingType {
        /// Property being validated.
        property: String,
        /// One message per rejected candidate.
        errors: Vec<String>,
    },
}

/// Access-control violation on a property.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AccessError {
    /// The property is read-only.
    #[error("'{type_name}.{property}' is read only")]
    ReadOnly {
        /// Type owning the property.
        type_name: String,
        /// The property.
        property: String,
    },

    /// The property is required and cannot be removed or omitted.
    #[error("'{type_name}.{property}' is required")]
    Required {
        /// Type owning the property.
        type_name: String,
        /// The property.
        property: String,
    },
}

/// Unknown property or path.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum KeyError {
    /// The key is not a declared property and additional properties are
    /// not permitted.
    #[error("'{key}' is not a valid property of {type_name}")]
    UnknownProperty {
        /// Type that was queried.
        type_name: String,
        /// The offending key.
        key: String,
    },

    /// The key is declared but currently holds no value.
    #[error("'{key}' has not been set on {type_name}")]
    Unset {
        /// Type that was queried.
        type_name: String,
        /// The unset key.
        key: String,
    },

    /// No node matches the canonical name.
    #[error("unresolvable canonical name '{cname}' in {origin}")]
    UnresolvableCanonicalName {
        /// The canonical name searched.
        cname: String,
        /// Node where the search started.
        origin: String,
    },

    /// The canonical name string is syntactically invalid.
    #[error("malformed canonical name '{cname}': {reason}")]
    MalformedCanonicalName {
        /// The input string.
        cname: String,
        /// Parse failure.
        reason: String,
    },

    /// The instance id is not (or no longer) allocated in the store.
    #[error("unknown instance {0}")]
    UnknownInstance(InstanceId),

    /// No user method of that name is registered on the type.
    #[error("'{name}' is not a method of {type_name}")]
    UnknownMethod {
        /// Type that was queried.
        type_name: String,
        /// Method name.
        name: String,
    },
}

/// Foreign key or document reference failure.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ReferenceError {
    /// No instance of the target type carries the key.
    #[error("no instance of '{target}' with key {key}")]
    NotFound {
        /// Target schema id.
        target: String,
        /// Rendering of the key that was looked up.
        key: String,
    },

    /// The foreign key is null and the property does not allow null.
    #[error("foreign key '{property}' is null")]
    NullKey {
        /// The foreign-key property.
        property: String,
    },

    /// The foreign key target type is not built.
    #[error("foreign key target '{target}' is not resolved")]
    UnresolvedTarget {
        /// Target schema id.
        target: String,
    },

    /// The property is not a foreign key.
    #[error("'{property}' is not a foreign key")]
    NotAForeignKey {
        /// The property.
        property: String,
    },

    /// A load-by-reference was requested but no loader is installed.
    #[error("no document loader available for reference '{reference}'")]
    NoLoader {
        /// The reference string.
        reference: String,
    },
}
