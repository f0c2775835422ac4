//! Document loading for construction by reference.
//!
//! An object property (or a top-level construction) given a string instead
//! of a mapping loads the referenced document through the store's
//! [`DocumentLoader`].

use std::path::{Path, PathBuf};

use serde_json::Value;
use skema_core::SkemaError;
use skema_schema::read_document;

/// Resolves a reference string to a raw document.
pub trait DocumentLoader: Send + Sync {
    /// Load the document addressed by `reference`.
    fn load(&self, reference: &str) -> Result<Value, SkemaError>;
}

impl<F> DocumentLoader for F
where
    F: Fn(&str) -> Result<Value, SkemaError> + Send + Sync,
{
    fn load(&self, reference: &str) -> Result<Value, SkemaError> {
        self(reference)
    }
}

/// Loads JSON or YAML files relative to a root directory.
#[derive(Debug, Clone)]
pub struct FileLoader {
    root: PathBuf,
}

impl FileLoader {
    /// Loader rooted at `root`.
    pub fn new(root: impl AsRef<Path>) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }

    /// Root directory.
    pub fn root(&self) -> &Path {
        &self.root
    }
}

impl DocumentLoader for FileLoader {
    fn load(&self, reference: &str) -> Result<Value, SkemaError> {
        let path = self.root.join(reference);
        tracing::debug!(path = %path.display(), "loading document by reference");
        read_document(&path)
    }
}
