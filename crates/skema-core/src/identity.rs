//! # Identifier Newtypes
//!
//! `SchemaId` names a schema (and therefore a built type); `InstanceId`
//! names an instance slot in the object arena. Keeping them distinct
//! prevents passing an instance index where a type identity is expected.
//!
//! ## Schema id syntax
//!
//! A schema id is a URI, optionally followed by a JSON-pointer fragment:
//! `https://example.org/geometry.json#/$defs/Point`. References found in
//! `$ref`, `extends` and `foreignKey.$schema` are resolved against the id
//! of the schema holding them with [`SchemaId::join`].

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::naming::camelize;

/// Identifier of a schema document or of a node inside one.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SchemaId(String);

impl SchemaId {
    /// Create an id, dropping an empty trailing fragment (`doc#` == `doc`).
    pub fn new(id: impl Into<String>) -> Self {
        let mut id = id.into();
        while id.ends_with('#') {
            id.pop();
        }
        Self(id)
    }

    /// The id as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The document part, without fragment.
    pub fn document(&self) -> &str {
        self.0.split_once('#').map_or(self.0.as_str(), |(doc, _)| doc)
    }

    /// The JSON-pointer fragment, without the leading `#`.
    pub fn fragment(&self) -> Option<&str> {
        self.0.split_once('#').map(|(_, frag)| frag)
    }

    /// Resolve `reference` relative to this id.
    ///
    /// - absolute URIs (`scheme:...`) are returned as-is,
    /// - `#...` fragments are appended to this document,
    /// - anything else replaces the last path segment of this document.
    pub fn join(&self, reference: &str) -> SchemaId {
        if reference.is_empty() {
            return self.clone();
        }
        if reference.starts_with('#') {
            return SchemaId::new(format!("{}{}", self.document(), reference));
        }
        if is_absolute(reference) {
            return SchemaId::new(reference);
        }
        let doc = self.document();
        let base = doc.rfind('/').map_or("", |i| &doc[..=i]);
        SchemaId::new(format!("{base}{reference}"))
    }

    /// Id of a nested node such as `properties/x` or `$defs/Point`.
    pub fn child(&self, kind: &str, name: &str) -> SchemaId {
        match self.fragment() {
            Some(frag) if !frag.is_empty() => SchemaId::new(format!("{}/{kind}/{name}", self.0)),
            _ => SchemaId::new(format!("{}#/{kind}/{name}", self.document())),
        }
    }

    /// Camel-cased last segment, used as the type name.
    ///
    /// `https://x.org/point-2d.json` gives `Point2d`,
    /// `doc#/$defs/line_segment` gives `LineSegment`.
    pub fn type_name(&self) -> String {
        let last = self
            .0
            .rsplit(['/', '#'])
            .find(|s| !s.is_empty())
            .unwrap_or(self.0.as_str());
        let stem = [".schema.json", ".json", ".yaml", ".yml"]
            .iter()
            .find_map(|ext| last.strip_suffix(ext))
            .unwrap_or(last);
        camelize(stem)
    }
}

fn is_absolute(reference: &str) -> bool {
    match reference.split_once(':') {
        Some((scheme, _)) => {
            !scheme.is_empty()
                && scheme
                    .chars()
                    .all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'))
        }
        None => false,
    }
}

impl fmt::Display for SchemaId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for SchemaId {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for SchemaId {
    fn from(s: String) -> Self {
        Self::new(s)
    }
}

impl AsRef<str> for SchemaId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Arena index of an instance. Allocated monotonically, never reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct InstanceId(u64);

impl InstanceId {
    /// Wrap a raw index.
    pub fn from_raw(raw: u64) -> Self {
        Self(raw)
    }

    /// The raw index.
    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for InstanceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}
