//! Open documents
//!
//! The registry owns every open document, keyed by a unique identifier, and
//! tracks which one is active. Hosts that share it across threads use
//! [`SharedRegistry`].

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::Mutex;

use crate::config::Settings;
use crate::document::{Document, PersistenceError, unique_name};

/// Registry errors
#[derive(Debug, Clone, thiserror::Error)]
pub enum RegistryError {
    #[error("Document not found: {0}")]
    NotFound(String),
    #[error(transparent)]
    Persistence(#[from] PersistenceError),
}

/// Set of open documents
#[derive(Debug, Default)]
pub struct Registry {
    documents: BTreeMap<String, Document>,
    active: Option<String>,
    /// Settings applied to saves and interchange
    pub settings: Settings,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a registry with the given settings
    pub fn with_settings(settings: Settings) -> Self {
        Self {
            settings,
            ..Self::default()
        }
    }

    fn unique(&self, base: &str) -> String {
        unique_name(base, |candidate| self.documents.contains_key(candidate))
    }

    fn insert(&mut self, mut document: Document) -> String {
        let name = self.unique(&document.name);
        document.name = name.clone();
        self.documents.insert(name.clone(), document);
        self.active = Some(name.clone());
        name
    }

    /// Create an empty document and make it active
    pub fn new_document(&mut self, name: &str) -> String {
        let name = self.insert(Document::new(name));
        tracing::debug!("Created document {}", name);
        name
    }

    /// Open a document file and make it active
    ///
    /// A file that is already open is not loaded twice; its existing
    /// identifier is returned instead.
    pub fn open_document(&mut self, path: impl AsRef<Path>) -> Result<String, RegistryError> {
        let path = path.as_ref();
        let key = canonical(path);
        if let Some((name, _)) = self
            .documents
            .iter()
            .find(|(_, d)| d.file_path.as_deref().map(canonical).as_ref() == Some(&key))
        {
            let name = name.clone();
            self.active = Some(name.clone());
            return Ok(name);
        }

        let document = Document::load(path)?;
        let name = self.insert(document);
        tracing::debug!("Opened document {} from {}", name, path.display());
        Ok(name)
    }

    /// Close a document and hand it back
    pub fn close_document(&mut self, name: &str) -> Result<Document, RegistryError> {
        let document = self
            .documents
            .remove(name)
            .ok_or_else(|| RegistryError::NotFound(name.to_string()))?;
        if self.active.as_deref() == Some(name) {
            self.active = self.documents.keys().next_back().cloned();
        }
        tracing::debug!("Closed document {}", name);
        Ok(document)
    }

    /// Save a document with the registry's persistence settings
    pub fn save_document(
        &mut self,
        name: &str,
        path: Option<&Path>,
    ) -> Result<(), RegistryError> {
        let document = self
            .documents
            .get_mut(name)
            .ok_or_else(|| RegistryError::NotFound(name.to_string()))?;
        let path = match path {
            Some(path) => path.to_path_buf(),
            None => document
                .file_path
                .clone()
                .ok_or_else(|| PersistenceError::Io(format!("{name} has no file path")))?,
        };
        document.save_with(path, &self.settings.persistence)?;
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&Document> {
        self.documents.get(name)
    }

    pub fn get_mut(&mut self, name: &str) -> Option<&mut Document> {
        self.documents.get_mut(name)
    }

    /// Identifiers of all open documents
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.documents.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.documents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }

    /// The active document
    pub fn active_document(&self) -> Option<&Document> {
        self.documents.get(self.active.as_deref()?)
    }

    /// The active document, mutably
    pub fn active_document_mut(&mut self) -> Option<&mut Document> {
        self.documents.get_mut(self.active.as_deref()?)
    }

    /// Make a document active
    pub fn set_active(&mut self, name: &str) -> Result<(), RegistryError> {
        if !self.documents.contains_key(name) {
            return Err(RegistryError::NotFound(name.to_string()));
        }
        self.active = Some(name.to_string());
        Ok(())
    }
}

fn canonical(path: &Path) -> PathBuf {
    path.canonicalize().unwrap_or_else(|_| path.to_path_buf())
}

pub type SharedRegistry = Arc<Mutex<Registry>>;

/// Create a new shared registry
pub fn create_shared_registry(settings: Settings) -> SharedRegistry {
    Arc::new(Mutex::new(Registry::with_settings(settings)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::primitive::Primitive;

    #[test]
    fn test_new_documents_are_uniquified() {
        let mut registry = Registry::new();
        assert_eq!(registry.new_document("Unnamed"), "Unnamed");
        assert_eq!(registry.new_document("Unnamed"), "Unnamed001");
        assert_eq!(registry.active_document().unwrap().name, "Unnamed001");
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn test_switch_active_document() {
        let mut registry = Registry::new();
        let a = registry.new_document("A");
        registry.new_document("B");
        assert_eq!(registry.active_document().unwrap().name, "B");

        registry.set_active(&a).unwrap();
        registry
            .active_document_mut()
            .unwrap()
            .add_part("Assembly");
        assert!(registry.get(&a).unwrap().contains("Assembly"));
        assert!(matches!(
            registry.set_active("Missing"),
            Err(RegistryError::NotFound(_))
        ));
        assert_eq!(registry.names().collect::<Vec<_>>(), ["A", "B"]);
    }

    #[test]
    fn test_documents_are_independent() {
        let mut registry = Registry::new();
        let a = registry.new_document("A");
        let b = registry.new_document("B");
        registry
            .get_mut(&a)
            .unwrap()
            .add_primitive("Cube", Primitive::cuboid(1.0, 1.0, 1.0));

        assert!(registry.get(&a).unwrap().get("Cube").is_some());
        assert!(registry.get(&b).unwrap().get("Cube").is_none());
    }

    #[test]
    fn test_close_and_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("doc.pdoc");

        let mut registry = Registry::new();
        let name = registry.new_document("Doc");
        registry
            .get_mut(&name)
            .unwrap()
            .add_primitive("Cube", Primitive::cuboid(2.0, 2.0, 2.0));
        registry.save_document(&name, Some(&path)).unwrap();

        let closed = registry.close_document(&name).unwrap();
        assert_eq!(closed.file_path.as_deref(), Some(path.as_path()));
        assert!(registry.is_empty());
        assert!(registry.active_document().is_none());
        assert!(matches!(
            registry.close_document(&name),
            Err(RegistryError::NotFound(_))
        ));

        let reopened = registry.open_document(&path).unwrap();
        assert_eq!(reopened, "Doc");
        assert_eq!(registry.open_document(&path).unwrap(), reopened);
        assert_eq!(registry.len(), 1);

        let doc = registry.active_document().unwrap();
        assert!(doc.get("Cube").unwrap().shape().is_some());
    }

    #[test]
    fn test_open_missing_file() {
        let mut registry = Registry::new();
        assert!(matches!(
            registry.open_document("/nonexistent/doc.pdoc"),
            Err(RegistryError::Persistence(PersistenceError::Io(_)))
        ));
    }

    #[test]
    fn test_shared_registry() {
        let shared = create_shared_registry(Settings::default());
        let name = shared.lock().new_document("Shared");
        let handle = {
            let shared = Arc::clone(&shared);
            std::thread::spawn(move || shared.lock().get(&name).is_some())
        };
        assert!(handle.join().unwrap());
    }
}
