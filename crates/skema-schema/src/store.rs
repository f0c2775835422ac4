//! # Schema Store
//!
//! The class builder asks a [`SchemaResolver`] for schema nodes by id. The
//! provided implementation, [`SchemaStore`], keeps parsed documents in
//! memory and resolves ids the way `$ref` URIs resolve:
//!
//! 1. the document part is looked up directly, then by file name (so
//!    `https://x.org/schemas/point.json` finds a document registered as
//!    `point.json`), then by file name without extension;
//! 2. the fragment is applied as a JSON pointer (`#/$defs/Point`), or as a
//!    plain definition name (`#Point`).
//!
//! Documents are JSON or YAML; YAML is converted to the JSON value model.

use std::collections::{BTreeSet, HashMap};
use std::path::Path;

use serde_json::Value;
use skema_core::{SchemaBuildError, SchemaId, SkemaError};

/// Source of schema nodes for the class builder.
pub trait SchemaResolver: Send + Sync {
    /// The schema node designated by `id`, if known.
    fn resolve(&self, id: &SchemaId) -> Option<Value>;

    /// Whether `id` resolves.
    fn contains(&self, id: &SchemaId) -> bool {
        self.resolve(id).is_some()
    }
}

/// In-memory schema documents.
#[derive(Debug, Default, Clone)]
pub struct SchemaStore {
    /// Lookup key (id, file name, stem) → document.
    documents: HashMap<String, Value>,
    /// Primary document ids.
    ids: BTreeSet<String>,
}

impl SchemaStore {
    /// Empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Load every `*.json`, `*.yaml` and `*.yml` file of a directory.
    ///
    /// # Errors
    ///
    /// Fails on the first unreadable or unparsable file.
    pub fn from_dir(dir: impl AsRef<Path>) -> Result<Self, SkemaError> {
        let mut store = Self::new();
        store.load_dir(dir)?;
        Ok(store)
    }

    /// Register a document under its own `$id` (or legacy `id`).
    ///
    /// # Errors
    ///
    /// Returns `SchemaBuildError::InvalidSchema` when the document has no id.
    pub fn register(&mut self, document: Value) -> Result<SchemaId, SkemaError> {
        let id = document
            .get("$id")
            .or_else(|| document.get("id"))
            .and_then(Value::as_str)
            .map(SchemaId::new)
            .ok_or_else(|| SchemaBuildError::InvalidSchema {
                schema: "<anonymous>".to_string(),
                reason: "document has no $id".to_string(),
            })?;
        self.register_as(id.clone(), document);
        Ok(id)
    }

    /// Register a document under an explicit id. Its own `$id`, when
    /// present and different, is registered as well.
    pub fn register_as(&mut self, id: SchemaId, document: Value) {
        let own = document
            .get("$id")
            .or_else(|| document.get("id"))
            .and_then(Value::as_str)
            .map(SchemaId::new)
            .filter(|own| *own != id);
        if let Some(own) = own {
            tracing::debug!(id = %id, own = %own, "schema registered under two ids");
            self.documents.insert(own.document().to_string(), document.clone());
        }
        let doc = id.document().to_string();
        if let Some(name) = file_name(&doc) {
            for alias in [name, strip_extension(name)] {
                if alias != doc {
                    self.documents
                        .entry(alias.to_string())
                        .or_insert_with(|| document.clone());
                }
            }
        }
        self.documents.insert(doc.clone(), document);
        self.ids.insert(doc);
    }

    /// Load a single file. The id is the document's `$id`, or its file name.
    ///
    /// # Errors
    ///
    /// Fails when the file cannot be read or parsed.
    pub fn load_file(&mut self, path: impl AsRef<Path>) -> Result<SchemaId, SkemaError> {
        let path = path.as_ref();
        let document = read_document(path)?;
        let fallback = path
            .file_name()
            .and_then(|n| n.to_str())
            .map(SchemaId::new)
            .ok_or_else(|| SkemaError::Serialization(format!("bad file name: {}", path.display())))?;
        let id = document
            .get("$id")
            .or_else(|| document.get("id"))
            .and_then(Value::as_str)
            .map(SchemaId::new)
            .unwrap_or_else(|| fallback.clone());
        if id != fallback {
            // Also reachable by file name for relative references.
            self.documents.insert(fallback.to_string(), document.clone());
        }
        self.register_as(id.clone(), document);
        tracing::debug!(path = %path.display(), id = %id, "schema loaded");
        Ok(id)
    }

    /// Load every schema file of a directory (not recursive).
    ///
    /// # Errors
    ///
    /// Fails on the first unreadable or unparsable file.
    pub fn load_dir(&mut self, dir: impl AsRef<Path>) -> Result<Vec<SchemaId>, SkemaError> {
        let dir = dir.as_ref();
        let mut paths = Vec::new();
        for entry in std::fs::read_dir(dir)? {
            let path = entry?.path();
            let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("");
            if matches!(ext, "json" | "yaml" | "yml") {
                paths.push(path);
            }
        }
        paths.sort();
        let mut loaded = Vec::with_capacity(paths.len());
        for path in paths {
            loaded.push(self.load_file(&path)?);
        }
        tracing::info!(dir = %dir.display(), count = loaded.len(), "schemas loaded");
        Ok(loaded)
    }

    /// Primary document ids, sorted.
    pub fn ids(&self) -> Vec<SchemaId> {
        self.ids.iter().map(SchemaId::new).collect()
    }

    /// Number of registered documents.
    pub fn len(&self) -> usize {
        self.ids.len()
    }

    /// Whether no document is registered.
    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    fn document(&self, doc: &str) -> Option<&Value> {
        if let Some(d) = self.documents.get(doc) {
            return Some(d);
        }
        let name = file_name(doc)?;
        self.documents
            .get(name)
            .or_else(|| self.documents.get(strip_extension(name)))
    }
}

impl SchemaResolver for SchemaStore {
    fn resolve(&self, id: &SchemaId) -> Option<Value> {
        let doc = self.document(id.document())?;
        match id.fragment() {
            None | Some("") => Some(doc.clone()),
            Some(frag) if frag.starts_with('/') => doc.pointer(frag).cloned(),
            Some(name) => ["$defs", "definitions"]
                .iter()
                .find_map(|k| doc.get(*k).and_then(|defs| defs.get(name)))
                .cloned(),
        }
    }
}

fn file_name(doc: &str) -> Option<&str> {
    doc.rsplit('/').next().filter(|s| !s.is_empty())
}

fn strip_extension(name: &str) -> &str {
    [".schema.json", ".json", ".yaml", ".yml"]
        .iter()
        .find_map(|ext| name.strip_suffix(ext))
        .unwrap_or(name)
}

/// Read a JSON or YAML document, choosing the format by extension.
///
/// # Errors
///
/// `SkemaError::Io` when the file cannot be read, `Serialization` when it
/// does not parse.
pub fn read_document(path: &Path) -> Result<Value, SkemaError> {
    let content = std::fs::read_to_string(path)?;
    let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("");
    parse_document(&content, matches!(ext, "yaml" | "yml")).map_err(|reason| {
        SkemaError::Serialization(format!("{}: {reason}", path.display()))
    })
}

/// Parse document text as YAML (`yaml == true`) or JSON.
pub fn parse_document(content: &str, yaml: bool) -> Result<Value, String> {
    if yaml {
        let value: serde_yaml::Value =
            serde_yaml::from_str(content).map_err(|e| format!("invalid YAML: {e}"))?;
        yaml_to_json_value(&value)
    } else {
        serde_json::from_str(content).map_err(|e| format!("invalid JSON: {e}"))
    }
}

/// Convert a `serde_yaml::Value` to a `serde_json::Value`.
///
/// Tags are ignored; non-string mapping keys are stringified when scalar.
pub fn yaml_to_json_value(yaml: &serde_yaml::Value) -> Result<Value, String> {
    match yaml {
        serde_yaml::Value::Null => Ok(Value::Null),
        serde_yaml::Value::Bool(b) => Ok(Value::Bool(*b)),
        serde_yaml::Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                Ok(Value::from(i))
            } else if let Some(u) = n.as_u64() {
                Ok(Value::from(u))
            } else if let Some(f) = n.as_f64() {
                serde_json::Number::from_f64(f)
                    .map(Value::Number)
                    .ok_or_else(|| format!("cannot represent float {f} in JSON"))
            } else {
                Err(format!("unsupported YAML number: {n:?}"))
            }
        }
        serde_yaml::Value::String(s) => Ok(Value::String(s.clone())),
        serde_yaml::Value::Sequence(seq) => seq
            .iter()
            .map(yaml_to_json_value)
            .collect::<Result<Vec<_>, _>>()
            .map(Value::Array),
        serde_yaml::Value::Mapping(map) => {
            let mut out = serde_json::Map::new();
            for (k, v) in map {
                let key = match k {
                    serde_yaml::Value::String(s) => s.clone(),
                    serde_yaml::Value::Number(n) => n.to_string(),
                    serde_yaml::Value::Bool(b) => b.to_string(),
                    other => return Err(format!("unsupported YAML map key: {other:?}")),
                };
                out.insert(key, yaml_to_json_value(v)?);
            }
            Ok(Value::Object(out))
        }
        serde_yaml::Value::Tagged(tagged) => yaml_to_json_value(&tagged.value),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn geo() -> Value {
        json!({
            "$id": "https://x.org/schemas/geo.json",
            "$defs": {
                "Point": {"type": "object", "properties": {"x": {"type": "integer"}}}
            }
        })
    }

    #[test]
    fn test_resolves_pointer_fragment() {
        let mut store = SchemaStore::new();
        let id = store.register(geo()).unwrap();
        let p = store.resolve(&id.join("#/$defs/Point")).unwrap();
        assert_eq!(p["properties"]["x"]["type"], "integer");
    }

    #[test]
    fn test_resolves_plain_name_fragment() {
        let mut store = SchemaStore::new();
        store.register(geo()).unwrap();
        assert!(store.contains(&SchemaId::new("https://x.org/schemas/geo.json#Point")));
    }

    #[test]
    fn test_falls_back_to_file_name() {
        let mut store = SchemaStore::new();
        store.register(geo()).unwrap();
        assert!(store.contains(&SchemaId::new("https://other.org/geo.json")));
        assert!(store.contains(&SchemaId::new("geo")));
    }

    #[test]
    fn test_register_requires_id() {
        let mut store = SchemaStore::new();
        assert!(store.register(json!({"type": "object"})).is_err());
        store.register_as(SchemaId::new("anon"), json!({"type": "object"}));
        assert_eq!(store.ids(), vec![SchemaId::new("anon")]);
    }

    #[test]
    fn test_unknown_pointer_is_none() {
        let mut store = SchemaStore::new();
        let id = store.register(geo()).unwrap();
        assert!(store.resolve(&id.join("#/$defs/Line")).is_none());
    }

    #[test]
    fn test_yaml_conversion() {
        let v = parse_document("a: 1\nb: [x, true]\n2: null\n", true).unwrap();
        assert_eq!(v, json!({"a": 1, "b": ["x", true], "2": null}));
    }
}
