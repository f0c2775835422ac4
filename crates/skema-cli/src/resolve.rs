//! # Resolve Subcommand
//!
//! Follows a canonical name from the root of a loaded document.

use std::path::PathBuf;

use clap::Args;
use serde_json::{json, Value};

use crate::context::{OutputFormat, SchemaArgs};

/// Arguments for the resolve subcommand.
#[derive(Args, Debug)]
pub struct ResolveArgs {
    #[command(flatten)]
    pub schema: SchemaArgs,

    /// JSON or YAML document to load.
    #[arg(long)]
    pub document: PathBuf,

    /// Canonical name, e.g. `.pens[0][1]` or `kiwi.legs`.
    #[arg(long)]
    pub cname: String,

    /// Output encoding.
    #[arg(long, value_enum, default_value_t)]
    pub format: OutputFormat,
}

/// Resolve the name and return the node's value. Instances also report
/// their canonical name and key path.
pub fn run(args: &ResolveArgs) -> anyhow::Result<Value> {
    let (mut store, root) = args.schema.open(&args.document)?;
    let node = store.resolve_cname(root, &args.cname)?;
    let value = store.materialize(&node)?;
    let Some(id) = node.as_instance() else {
        return Ok(value);
    };
    Ok(json!({
        "type": store.type_of(id)?.id().to_string(),
        "canonicalName": store.canonical_name(id)?.to_string(),
        "path": store.path_of(id)?.to_string(),
        "value": value,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(dir: &std::path::Path, cname: &str) -> ResolveArgs {
        ResolveArgs {
            schema: SchemaArgs {
                schemas: dir.join("schemas"),
                type_id: "zoo".into(),
                config: None,
            },
            document: dir.join("zoo.json"),
            cname: cname.into(),
            format: OutputFormat::Json,
        }
    }

    fn fixture() -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join("schemas")).unwrap();
        std::fs::write(
            dir.path().join("schemas").join("zoo.yaml"),
            "$id: zoo\ntype: object\nproperties:\n  pens:\n    type: array\n    items:\n      $ref: '#/$defs/animal'\n$defs:\n  animal:\n    type: object\n    properties:\n      name:\n        type: string\n      legs:\n        type: integer\n        default: 4\n",
        )
        .unwrap();
        std::fs::write(
            dir.path().join("zoo.json"),
            r#"{"pens": [{"name": "rex"}, {"name": "kiwi", "legs": 2}]}"#,
        )
        .unwrap();
        dir
    }

    #[test]
    fn test_resolve_literal_and_instance() {
        let dir = fixture();
        assert_eq!(run(&args(dir.path(), "kiwi.legs")).unwrap(), json!(2));

        let rex = run(&args(dir.path(), "pens[0]")).unwrap();
        assert_eq!(rex["canonicalName"], json!(".rex"));
        assert_eq!(rex["path"], json!(".pens[0]"));
        assert_eq!(rex["value"], json!({"name": "rex", "legs": 4}));
        assert_eq!(rex["type"], json!("zoo#/$defs/animal"));
    }

    #[test]
    fn test_unresolvable_name() {
        let dir = fixture();
        assert!(run(&args(dir.path(), "nobody.legs")).is_err());
    }
}
