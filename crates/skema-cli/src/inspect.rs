//! # Inspect Subcommand
//!
//! Builds a type and prints what the builder made of it.

use clap::Args;
use serde::Serialize;
use serde_json::Value;
use skema_object::TypeShape;

use crate::context::{OutputFormat, SchemaArgs};

/// Arguments for the inspect subcommand.
#[derive(Args, Debug)]
pub struct InspectArgs {
    #[command(flatten)]
    pub schema: SchemaArgs,

    /// Output encoding.
    #[arg(long, value_enum, default_value_t)]
    pub format: OutputFormat,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct TypeReport {
    name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    description: Option<String>,
    primary_keys: Vec<String>,
    methods: Vec<String>,
    #[serde(flatten)]
    shape: TypeShape,
}

/// Describe the selected type.
pub fn run(args: &InspectArgs) -> anyhow::Result<Value> {
    let builder = args.schema.builder()?;
    let ty = builder.load(&args.schema.schema_id())?;
    tracing::info!(type_name = ty.name(), "type inspected");
    let report = TypeReport {
        name: ty.name().to_string(),
        description: ty.description().map(str::to_string),
        primary_keys: ty.primary_keys(),
        methods: ty.method_names().map(str::to_string).collect(),
        shape: ty.shape(),
    };
    Ok(serde_json::to_value(report)?)
}
