//! # skema-object — Schema-Driven Object Model
//!
//! Turns schema documents into runtime types and manages the instance trees
//! built from them.
//!
//! ## Layers
//!
//! - **Class builder** (`builder.rs`): resolves a schema id to a
//!   [`TypeDescriptor`], merging `extends` bases in order, building nested
//!   object types on demand and folding in registered [`TypeOverrides`] and
//!   configured defaults. Built types are cached for the process lifetime.
//!
//! - **Property model** (`property.rs`, `descriptor.rs`, `dependency.rs`):
//!   each property has a [`PropertyType`] that converts and validates raw
//!   values, an optional [`PropertyDescriptor`] with getter, setter and
//!   deleter, and a place in the type's [`DependencyGraph`], which records
//!   template inputs and declared dependencies.
//!
//! - **Object store** (`store.rs`, `protocol.rs`): an arena of instances
//!   addressed by [`InstanceId`](skema_core::InstanceId). Reads go through
//!   the mapping protocol ([`ObjectStore::get`], [`ObjectStore::set`],
//!   [`ObjectStore::delete`]); an outdated property is re-evaluated after
//!   its inputs, so a read always reflects the latest writes.
//!
//! - **Addressing** (`path.rs`, `foreign_key.rs`): canonical names relative
//!   to any instance, and foreign keys resolved by key values or by name.
//!
//! - **Output** (`serialize.rs`, `display.rs`): schema-aware serialization
//!   that omits defaults and tags subtypes with `$schema`, and short
//!   printable forms.
//!
//! ## Crate Policy
//!
//! - Types are immutable once built and shared behind `Arc`.
//! - Instances are owned by one [`ObjectStore`]; parents hold child ids,
//!   never references.
//! - No `.unwrap()` outside tests.

pub mod builder;
pub mod config;
pub mod dependency;
pub mod descriptor;
pub mod display;
pub mod foreign_key;
pub mod loader;
pub mod path;
pub mod property;
pub mod protocol;
pub mod serialize;
pub mod store;
pub mod types;

// ─── Building ───────────────────────────────────────────────────────

pub use builder::TypeBuilder;
pub use config::{ObjectOptions, SkemaConfig, DEFAULT_NAME_FIELD, DEFAULT_PRINT_MAX_ELEMENTS};
pub use loader::{DocumentLoader, FileLoader};

// ─── Types and properties ───────────────────────────────────────────

pub use dependency::{evaluation_order, CycleError, DependencyGraph};
pub use descriptor::{Deleter, Getter, Method, PropertyDescriptor, Setter, TypeOverrides};
pub use property::{
    negate, ForeignKeyType, LiteralKind, LiteralType, Node, PropertyType, TypeKind,
};
pub use types::{Additional, ResolvedKey, TypeDescriptor, TypeShape};

// ─── Instances ──────────────────────────────────────────────────────

pub use serialize::{SerializeOptions, SCHEMA_KEY};
pub use store::ObjectStore;
