//! # Configuration
//!
//! Two layers:
//!
//! - [`ObjectOptions`]: per-instance behavior (`lazyLoading`, `validateLazy`,
//!   `attributeByName`, `propagate`). Each field is optional; the effective
//!   value is taken from the explicit options, then the schema's
//!   `lazyLoading`, then the configured defaults.
//! - [`SkemaConfig`]: process-level settings shared by the builder and the
//!   object store, loaded from YAML or built in code.
//!
//! ```yaml
//! options:
//!   lazyLoading: false
//! printMaxElements: 12
//! attributePrefix: "@"
//! nameField: name
//! typeDefaults:
//!   point.json:
//!     x: 0
//! ```

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use skema_core::SkemaError;

/// Default maximum number of elements shown by short representations.
pub const DEFAULT_PRINT_MAX_ELEMENTS: usize = 12;

/// Default declared name field.
pub const DEFAULT_NAME_FIELD: &str = "name";

/// Per-instance behavior flags.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ObjectOptions {
    /// Defer conversion and validation until first read.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lazy_loading: Option<bool>,
    /// With lazy loading, still check literal values at construction.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub validate_lazy: Option<bool>,
    /// Fall back to a search by declared name when a key is unknown.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attribute_by_name: Option<bool>,
    /// Hand these options down to child instances.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub propagate: Option<bool>,
}

impl ObjectOptions {
    /// Lazy loading enabled.
    pub fn lazy() -> Self {
        Self {
            lazy_loading: Some(true),
            ..Self::default()
        }
    }

    /// Set `propagate`.
    pub fn propagating(mut self) -> Self {
        self.propagate = Some(true);
        self
    }

    /// Fill unset fields from `fallback`.
    pub fn or(self, fallback: ObjectOptions) -> Self {
        Self {
            lazy_loading: self.lazy_loading.or(fallback.lazy_loading),
            validate_lazy: self.validate_lazy.or(fallback.validate_lazy),
            attribute_by_name: self.attribute_by_name.or(fallback.attribute_by_name),
            propagate: self.propagate.or(fallback.propagate),
        }
    }

    /// Effective `lazyLoading`.
    pub fn is_lazy(&self) -> bool {
        self.lazy_loading.unwrap_or(false)
    }

    /// Effective `validateLazy`.
    pub fn validates_lazy(&self) -> bool {
        self.validate_lazy.unwrap_or(false)
    }

    /// Effective `attributeByName`.
    pub fn by_name(&self) -> bool {
        self.attribute_by_name.unwrap_or(false)
    }

    /// Effective `propagate`.
    pub fn propagates(&self) -> bool {
        self.propagate.unwrap_or(false)
    }
}

/// Process-level settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SkemaConfig {
    /// Default instance options.
    #[serde(default)]
    pub options: ObjectOptions,
    /// Elements shown by `repr`/`display` before `+N...`.
    #[serde(default = "default_print_max")]
    pub print_max_elements: usize,
    /// Prefix applied to primitive keys on serialization.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attribute_prefix: Option<String>,
    /// Declared external name field of instances.
    #[serde(default = "default_name_field")]
    pub name_field: String,
    /// `schema id or type name → { property → default }`, applied at build.
    #[serde(default)]
    pub type_defaults: BTreeMap<String, BTreeMap<String, Value>>,
}

fn default_print_max() -> usize {
    DEFAULT_PRINT_MAX_ELEMENTS
}

fn default_name_field() -> String {
    DEFAULT_NAME_FIELD.to_string()
}

impl Default for SkemaConfig {
    fn default() -> Self {
        Self {
            options: ObjectOptions::default(),
            print_max_elements: DEFAULT_PRINT_MAX_ELEMENTS,
            attribute_prefix: None,
            name_field: DEFAULT_NAME_FIELD.to_string(),
            type_defaults: BTreeMap::new(),
        }
    }
}

impl SkemaConfig {
    /// Parse a configuration from a YAML string.
    ///
    /// # Errors
    ///
    /// Returns `SkemaError::Serialization` on malformed YAML or unexpected
    /// field types.
    pub fn from_yaml_str(yaml: &str) -> Result<Self, SkemaError> {
        serde_yaml::from_str(yaml)
            .map_err(|e| SkemaError::Serialization(format!("invalid configuration: {e}")))
    }

    /// Read a configuration file.
    ///
    /// # Errors
    ///
    /// IO and parse failures.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, SkemaError> {
        let content = std::fs::read_to_string(path.as_ref())?;
        Self::from_yaml_str(&content)
    }

    /// Configured defaults for a type, by schema id first, then type name.
    pub fn defaults_for(&self, id: &str, type_name: &str) -> Option<&BTreeMap<String, Value>> {
        self.type_defaults
            .get(id)
            .or_else(|| self.type_defaults.get(type_name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_defaults() {
        let c = SkemaConfig::default();
        assert_eq!(c.print_max_elements, 12);
        assert_eq!(c.name_field, "name");
        assert!(!c.options.is_lazy());
    }

    #[test]
    fn test_from_yaml() {
        let c = SkemaConfig::from_yaml_str(
            "options:\n  lazyLoading: true\nattributePrefix: '@'\ntypeDefaults:\n  Point:\n    x: 1\n",
        )
        .unwrap();
        assert!(c.options.is_lazy());
        assert_eq!(c.attribute_prefix.as_deref(), Some("@"));
        assert_eq!(c.print_max_elements, 12);
        assert_eq!(c.defaults_for("point.json", "Point").unwrap()["x"], json!(1));
    }

    #[test]
    fn test_options_fallback_chain() {
        let explicit = ObjectOptions {
            validate_lazy: Some(true),
            ..ObjectOptions::default()
        };
        let schema = ObjectOptions::lazy();
        let config = ObjectOptions {
            lazy_loading: Some(false),
            attribute_by_name: Some(true),
            ..ObjectOptions::default()
        };
        let effective = explicit.or(schema).or(config);
        assert!(effective.is_lazy());
        assert!(effective.validates_lazy());
        assert!(effective.by_name());
        assert!(!effective.propagates());
    }

    #[test]
    fn test_rejects_bad_types() {
        assert!(SkemaConfig::from_yaml_str("printMaxElements: many").is_err());
    }
}
