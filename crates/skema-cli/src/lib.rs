//! # skema-cli — Command-Line Front End
//!
//! Thin wrappers over `skema-object` for looking at schemas and documents
//! from a shell.
//!
//! ## Subcommands
//!
//! - `inspect`: flattened property table, flags, aliases and dependencies
//!   of a built type
//! - `load`: deserialize a document against a type and print its
//!   serialized form
//! - `resolve`: print the node a canonical name reaches in a document
//!
//! ## Crate Policy
//!
//! - Argument parsing lives next to each handler; `main.rs` only
//!   dispatches and prints.
//! - Handlers return values, never print, so they can be tested.

pub mod context;
pub mod inspect;
pub mod load;
pub mod resolve;

pub use context::{render, OutputFormat, SchemaArgs};
