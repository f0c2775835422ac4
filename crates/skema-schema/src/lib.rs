//! # skema-schema — Schema Documents & Constraint Validation
//!
//! Everything the class builder needs to know about schemas before it
//! turns them into types:
//!
//! - [`document`]: the typed [`Schema`] view, covering the JSON-Schema
//!   keywords the object model interprets and its own vocabulary
//!   (`extends`, `readOnly`, `aliases`, `foreignKey`, ...).
//! - [`store`]: the [`SchemaResolver`] contract and the in-memory
//!   [`SchemaStore`], which loads JSON and YAML documents and resolves
//!   ids with JSON-pointer fragments.
//! - [`validate`]: [`ConstraintValidator`], a compiled Draft 2020-12
//!   check of a literal value against its constraint keywords.
//!
//! ## Crate Policy
//!
//! - Depends only on `skema-core` internally.
//! - Never fetches schemas over the network.

pub mod document;
pub mod store;
pub mod validate;

pub use document::{ForeignKeySpec, NamesOrFlag, Schema};
pub use store::{parse_document, read_document, yaml_to_json_value, SchemaResolver, SchemaStore};
pub use validate::{constraint_schema, ConstraintValidator};
