//! # skema-core — Foundational Types for skema
//!
//! This crate is the leaf of the skema crate graph. It defines the shared
//! vocabulary every other crate speaks: the error hierarchy, identifiers
//! for schemas and instances, canonical-name syntax, template patterns,
//! property-name cleaning and date/time literal coercion.
//!
//! ## Key Design Principles
//!
//! 1. **Newtype identifiers.** `SchemaId` and `InstanceId` are distinct
//!    types; an arena index can never stand in for a type identity.
//!
//! 2. **One error enum per concern.** Build, validation, access, key and
//!    reference failures are separate enums, unified by `SkemaError`.
//!
//! 3. **Templates are data.** A `{{ var }}` string is recognized and its
//!    variables extracted here; rendering against an instance happens in
//!    `skema-object`.
//!
//! ## Crate Policy
//!
//! - No dependencies on other `skema-*` crates.
//! - No `unsafe` code.
//! - No `.unwrap()` outside tests.

pub mod cname;
pub mod error;
pub mod identity;
pub mod naming;
pub mod temporal;
pub mod template;

// Re-export primary types for ergonomic imports.
pub use cname::{Anchor, CanonicalName, Segment};
pub use error::{
    AccessError, KeyError, ReferenceError, SchemaBuildError, SkemaError, ValidationError,
    Violation, Violations,
};
pub use identity::{InstanceId, SchemaId};
pub use naming::{camelize, clean_identifier};
