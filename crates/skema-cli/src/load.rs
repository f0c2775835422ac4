//! # Load Subcommand
//!
//! Deserializes a document against a type and prints it back in its
//! serialized form, which shows defaults filled in, aliases normalized and
//! subtypes tagged.

use std::path::PathBuf;

use clap::Args;
use serde_json::Value;
use skema_object::SerializeOptions;

use crate::context::{OutputFormat, SchemaArgs};

/// Arguments for the load subcommand.
#[derive(Args, Debug)]
pub struct LoadArgs {
    #[command(flatten)]
    pub schema: SchemaArgs,

    /// JSON or YAML document to load.
    #[arg(long)]
    pub document: PathBuf,

    /// Keep values equal to their defaults.
    #[arg(long)]
    pub with_defaults: bool,

    /// Leave a property out (repeatable).
    #[arg(long = "exclude")]
    pub excludes: Vec<String>,

    /// Output encoding.
    #[arg(long, value_enum, default_value_t)]
    pub format: OutputFormat,
}

/// Load the document and serialize it.
pub fn run(args: &LoadArgs) -> anyhow::Result<Value> {
    let (mut store, id) = args.schema.open(&args.document)?;
    let mut options = if args.with_defaults {
        SerializeOptions::with_defaults()
    } else {
        SerializeOptions::default()
    };
    for key in &args.excludes {
        options = options.exclude(key.clone());
    }
    let value = store.serialize(id, &options)?;
    tracing::info!(instances = store.len(), "document loaded");
    Ok(value)
}
