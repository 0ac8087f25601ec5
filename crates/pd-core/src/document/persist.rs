//! Document file serialization

use std::collections::HashSet;
use std::io::Write;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{Document, DocumentObject, ObjectData};
use crate::config::PersistenceConfig;
use crate::constants::{BACKUP_EXTENSION, FILE_FORMAT_VERSION};

/// On-disk form of a document
#[derive(Debug, Clone, Serialize, Deserialize)]
struct DocumentData {
    version: u32,
    name: String,
    label: String,
    uid: Uuid,
    objects: Vec<DocumentObject>,
}

impl From<Document> for DocumentData {
    fn from(document: Document) -> Self {
        Self {
            version: FILE_FORMAT_VERSION,
            name: document.name,
            label: document.label,
            uid: document.uid,
            objects: document.objects,
        }
    }
}

impl From<DocumentData> for Document {
    fn from(data: DocumentData) -> Self {
        Document::from_parts(data.name, data.label, data.uid, data.objects)
    }
}

impl Serialize for Document {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        let data = DocumentData {
            version: FILE_FORMAT_VERSION,
            name: self.name.clone(),
            label: self.label.clone(),
            uid: self.uid,
            objects: self.objects.clone(),
        };
        data.serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Document {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let data = DocumentData::deserialize(deserializer)?;
        validate_graph(&data.objects).map_err(serde::de::Error::custom)?;
        Ok(Document::from(data))
    }
}

impl Document {
    /// Save to the file the document came from
    pub fn save(&mut self) -> Result<(), PersistenceError> {
        let path = self
            .file_path
            .clone()
            .ok_or_else(|| PersistenceError::Io(format!("{} has no file path", self.name)))?;
        self.save_with(path, &PersistenceConfig::default())
    }

    /// Save to a new file and remember it
    pub fn save_as(&mut self, path: impl AsRef<Path>) -> Result<(), PersistenceError> {
        self.save_with(path, &PersistenceConfig::default())
    }

    /// Save to a file
    ///
    /// The content is written to a temporary file next to the target and
    /// moved into place, so an interrupted save never leaves a partial file.
    pub fn save_with(
        &mut self,
        path: impl AsRef<Path>,
        config: &PersistenceConfig,
    ) -> Result<(), PersistenceError> {
        let path = path.as_ref();
        let content = self.to_ron(config.pretty)?;

        if config.create_backup && path.exists() {
            std::fs::copy(path, backup_path(path))
                .map_err(|e| PersistenceError::Io(e.to_string()))?;
        }

        let dir = match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        let mut file =
            tempfile::NamedTempFile::new_in(dir).map_err(|e| PersistenceError::Io(e.to_string()))?;
        file.write_all(content.as_bytes())
            .map_err(|e| PersistenceError::Io(e.to_string()))?;
        file.persist(path)
            .map_err(|e| PersistenceError::Io(e.error.to_string()))?;

        tracing::debug!("Saved document {} to {}", self.name, path.display());
        self.file_path = Some(path.to_path_buf());
        Ok(())
    }

    /// Serialize to RON text
    pub fn to_ron(&self, pretty: bool) -> Result<String, PersistenceError> {
        let result = if pretty {
            ron::ser::to_string_pretty(self, ron::ser::PrettyConfig::default())
        } else {
            ron::to_string(self)
        };
        result.map_err(|e| PersistenceError::Serialize(e.to_string()))
    }

    /// Parse RON text and validate the object graph
    ///
    /// Shapes are not computed; call [`Document::recompute`] afterwards.
    pub fn from_ron(content: &str) -> Result<Self, PersistenceError> {
        let data: DocumentData =
            ron::from_str(content).map_err(|e| PersistenceError::Deserialize(e.to_string()))?;
        if data.version > FILE_FORMAT_VERSION {
            return Err(PersistenceError::UnsupportedVersion(data.version));
        }
        validate_graph(&data.objects)?;
        Ok(Document::from(data))
    }

    /// Load a document and recompute its shapes
    ///
    /// Recompute failures are recorded on the failing objects and do not
    /// fail the load.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, PersistenceError> {
        let path = path.as_ref();
        let content =
            std::fs::read_to_string(path).map_err(|e| PersistenceError::Io(e.to_string()))?;
        let mut document = Self::from_ron(&content)?;
        document.file_path = Some(path.to_path_buf());

        if let Err(e) = document.recompute() {
            tracing::warn!("Document {} loaded with errors: {}", document.name, e);
        }
        tracing::debug!("Loaded document {} from {}", document.name, path.display());
        Ok(document)
    }
}

fn backup_path(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_owned();
    name.push(".");
    name.push(BACKUP_EXTENSION);
    PathBuf::from(name)
}

/// Check names, containment and body histories of loaded objects
fn validate_graph(objects: &[DocumentObject]) -> Result<(), PersistenceError> {
    let mut names = HashSet::new();
    for object in objects {
        let internal = object.history().into_iter().flat_map(|history| {
            history
                .features()
                .map(|f| f.name.as_str())
                .chain(history.sketches().iter().map(|s| s.name.as_str()))
        });
        for name in std::iter::once(object.name.as_str()).chain(internal) {
            if !names.insert(name) {
                return Err(PersistenceError::Corrupt(format!("duplicate name {name}")));
            }
        }
        if let Some(history) = object.history() {
            history
                .validate()
                .map_err(|e| PersistenceError::Corrupt(format!("{}: {e}", object.name)))?;
        }
    }

    let top_level: HashSet<&str> = objects.iter().map(|o| o.name.as_str()).collect();
    let mut held = HashSet::new();
    for object in objects {
        for child in object.children() {
            if !top_level.contains(child.as_str()) {
                return Err(PersistenceError::Corrupt(format!(
                    "{} holds unknown object {child}",
                    object.name
                )));
            }
            if !held.insert(child.as_str()) {
                return Err(PersistenceError::Corrupt(format!(
                    "{child} is held by more than one container"
                )));
            }
        }
    }

    // Each object has at most one parent, so walking up from any object
    // either ends at a root or revisits an object on a cycle.
    let parent_of = |name: &str| {
        objects
            .iter()
            .find(|o| {
                matches!(o.data, ObjectData::Part { .. })
                    && o.children().iter().any(|c| c == name)
            })
            .map(|o| o.name.as_str())
    };
    for object in objects {
        let mut seen = HashSet::new();
        let mut current = Some(object.name.as_str());
        while let Some(name) = current {
            if !seen.insert(name) {
                return Err(PersistenceError::Corrupt(format!(
                    "containment cycle through {name}"
                )));
            }
            current = parent_of(name);
        }
    }
    Ok(())
}

/// Persistence errors
#[derive(Debug, Clone, thiserror::Error)]
pub enum PersistenceError {
    #[error("IO error: {0}")]
    Io(String),
    #[error("Serialization error: {0}")]
    Serialize(String),
    #[error("Deserialization error: {0}")]
    Deserialize(String),
    #[error("Unsupported file format version {0}")]
    UnsupportedVersion(u32),
    #[error("Corrupt document: {0}")]
    Corrupt(String),
}

#[cfg(test)]
mod tests {
    use super::super::tests::dressed_body;
    use super::*;
    use crate::primitive::Primitive;
    use approx::assert_relative_eq;
    use pd_cad::SUPPRESSIBLE_EXTENSION;

    fn flags(doc: &Document) -> Vec<(String, bool, bool)> {
        doc.iter()
            .filter(|o| o.owner().is_some())
            .map(|o| {
                (
                    o.name().to_string(),
                    o.is_suppressed(),
                    o.has_extension(SUPPRESSIBLE_EXTENSION),
                )
            })
            .collect()
    }

    #[test]
    fn test_suppressed_flag_survives_reload() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("flags.pdoc");

        let mut doc = Document::new("Flags");
        let body = dressed_body(&mut doc, "Body");
        doc.set_suppressed("Chamfer", true).unwrap();
        doc.recompute().unwrap();
        let volume = doc.object(&body).unwrap().shape().unwrap().volume;
        let before = flags(&doc);
        doc.save_as(&path).unwrap();
        drop(doc);

        let doc = Document::load(&path).unwrap();
        let after = flags(&doc);
        assert_eq!(after, before, "flags before {before:?}, after {after:?}");
        assert!(doc.get("Chamfer").unwrap().is_suppressed());
        assert!(doc.get("Chamfer").unwrap().has_extension(SUPPRESSIBLE_EXTENSION));
        assert!(!doc.get("Sketch").unwrap().has_extension(SUPPRESSIBLE_EXTENSION));
        assert_relative_eq!(
            doc.object(&body).unwrap().shape().unwrap().volume,
            volume,
            epsilon = 1e-9
        );
        assert_eq!(doc.file_path.as_deref(), Some(path.as_path()));
    }

    #[test]
    fn test_several_flags_survive_reload() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("several.pdoc");

        let mut doc = Document::new("Several");
        dressed_body(&mut doc, "Body");
        dressed_body(&mut doc, "Body");
        doc.set_suppressed("Fillet", true).unwrap();
        doc.set_suppressed("Chamfer001", true).unwrap();
        doc.set_suppressed("Fillet001", true).unwrap();
        let before = flags(&doc);
        doc.save_as(&path).unwrap();

        let mut doc = Document::load(&path).unwrap();
        assert_eq!(flags(&doc), before);

        doc.set_suppressed("Fillet001", false).unwrap();
        doc.save().unwrap();
        let doc = Document::load(&path).unwrap();
        assert!(!doc.get("Fillet001").unwrap().is_suppressed());
        assert!(doc.get("Chamfer001").unwrap().is_suppressed());
        assert!(doc.get("Fillet").unwrap().is_suppressed());
        assert!(!doc.get("Pad").unwrap().is_suppressed());
    }

    #[test]
    fn test_structure_round_trip() {
        let mut doc = Document::new("Structure");
        let part = doc.add_part("Assembly");
        let body = dressed_body(&mut doc, "My Body");
        let cube = doc.add_primitive("Cube", Primitive::cuboid(1.0, 2.0, 3.0));
        doc.add_to_part(&part, &body).unwrap();
        doc.add_to_part(&part, &cube).unwrap();
        doc.set_tip(&body, "Fillet").unwrap();

        let text = doc.to_ron(false).unwrap();
        let mut loaded = Document::from_ron(&text).unwrap();
        loaded.recompute().unwrap();

        assert_eq!(loaded.uid, doc.uid);
        assert_eq!(loaded.object(&body).unwrap().label, "My Body");
        assert_eq!(loaded.object(&part).unwrap().children(), [body.as_str(), cube.as_str()]);
        assert_eq!(loaded.body(&body).unwrap().tip(), Some("Fillet"));
        assert!(loaded.get(&part).unwrap().shape().is_some());
    }

    #[test]
    fn test_unsupported_version() {
        let doc = Document::new("Future");
        let text = doc.to_ron(true).unwrap().replace("version: 1,", "version: 99,");
        assert!(matches!(
            Document::from_ron(&text),
            Err(PersistenceError::UnsupportedVersion(99))
        ));
    }

    #[test]
    fn test_corrupt_graph_rejected() {
        let ghost = Document::from_parts(
            "Ghost".into(),
            "Ghost".into(),
            Uuid::new_v4(),
            vec![DocumentObject::new("Part", "Part", ObjectData::Part {
                children: vec!["Missing".into()],
            })],
        );
        let text = ghost.to_ron(true).unwrap();
        assert!(matches!(
            Document::from_ron(&text),
            Err(PersistenceError::Corrupt(_))
        ));

        let cycle = Document::from_parts(
            "Cycle".into(),
            "Cycle".into(),
            Uuid::new_v4(),
            vec![
                DocumentObject::new("A", "A", ObjectData::Part {
                    children: vec!["B".into()],
                }),
                DocumentObject::new("B", "B", ObjectData::Part {
                    children: vec!["A".into()],
                }),
            ],
        );
        let text = cycle.to_ron(true).unwrap();
        assert!(matches!(
            Document::from_ron(&text),
            Err(PersistenceError::Corrupt(_))
        ));
        assert!(ron::from_str::<Document>(&text).is_err());
    }

    #[test]
    fn test_backup_and_missing_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("backup.pdoc");

        let mut doc = Document::new("Backup");
        assert!(matches!(doc.save(), Err(PersistenceError::Io(_))));

        let config = PersistenceConfig {
            pretty: false,
            create_backup: true,
        };
        doc.save_with(&path, &config).unwrap();
        assert!(!backup_path(&path).exists());

        doc.add_body("Body");
        doc.save_with(&path, &config).unwrap();
        let backup = Document::from_ron(&std::fs::read_to_string(backup_path(&path)).unwrap())
            .unwrap();
        assert!(backup.objects().is_empty());
        assert_eq!(Document::load(&path).unwrap().objects().len(), 1);
    }

    #[test]
    fn test_load_missing_file() {
        assert!(matches!(
            Document::load("/nonexistent/doc.pdoc"),
            Err(PersistenceError::Io(_))
        ));
    }
}
