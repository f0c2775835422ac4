//! Arguments and setup shared by every subcommand.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use clap::{Args, ValueEnum};
use serde_json::Value;
use skema_core::{InstanceId, SchemaId};
use skema_object::{FileLoader, ObjectOptions, ObjectStore, SkemaConfig, TypeBuilder};
use skema_schema::SchemaStore;

/// Where the schemas come from and which type to use.
#[derive(Args, Debug, Clone)]
pub struct SchemaArgs {
    /// Directory of `*.json` / `*.yaml` schema documents.
    #[arg(long)]
    pub schemas: PathBuf,

    /// Schema id of the type (a `$id`, or a file name for documents
    /// without one).
    #[arg(long = "type")]
    pub type_id: String,

    /// YAML configuration file.
    #[arg(long)]
    pub config: Option<PathBuf>,
}

impl SchemaArgs {
    /// Schema id of the selected type.
    pub fn schema_id(&self) -> SchemaId {
        SchemaId::new(&self.type_id)
    }

    /// Load the schema directory and the configuration into a builder.
    pub fn builder(&self) -> anyhow::Result<TypeBuilder> {
        let config = match &self.config {
            Some(path) => SkemaConfig::from_path(path)
                .with_context(|| format!("reading configuration {}", path.display()))?,
            None => SkemaConfig::default(),
        };
        let store = SchemaStore::from_dir(&self.schemas)
            .with_context(|| format!("loading schemas from {}", self.schemas.display()))?;
        Ok(TypeBuilder::with_config(Arc::new(store), config))
    }

    /// Instantiate the selected type from a document file. References in
    /// the document are resolved relative to its directory.
    pub fn open(&self, document: &Path) -> anyhow::Result<(ObjectStore, InstanceId)> {
        let builder = self.builder()?;
        let dir = document.parent().unwrap_or_else(|| Path::new(""));
        let name = document
            .file_name()
            .and_then(|n| n.to_str())
            .with_context(|| format!("not a document path: {}", document.display()))?;
        let mut store =
            ObjectStore::new(Arc::new(builder)).with_loader(Arc::new(FileLoader::new(dir)));
        let id = store
            .create_by_reference(&self.schema_id(), name, ObjectOptions::default())
            .with_context(|| {
                format!("loading {} as {}", document.display(), self.type_id)
            })?;
        Ok((store, id))
    }
}

/// Output encodings.
#[derive(ValueEnum, Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum OutputFormat {
    /// Pretty-printed JSON.
    #[default]
    Json,
    /// YAML.
    Yaml,
}

/// Encode a result for printing.
pub fn render(value: &Value, format: OutputFormat) -> anyhow::Result<String> {
    Ok(match format {
        OutputFormat::Json => serde_json::to_string_pretty(value)?,
        OutputFormat::Yaml => serde_yaml::to_string(value)?,
    })
}
