//! STEP interchange
//!
//! Export writes selected objects as named shape records; insert reads
//! records back as imported shapes, optionally regrouped into containers.

mod naming;
mod reader;
mod writer;

use std::path::Path;

pub use naming::{ShapeNode, plan};
pub use reader::read_step;
pub use writer::{step_string, write_step};

use crate::config::InterchangeConfig;
use crate::document::{Document, DocumentError};

/// Interchange errors
#[derive(Debug, Clone, thiserror::Error)]
pub enum InterchangeError {
    #[error("IO error: {0}")]
    Io(String),
    #[error("Parse error: {0}")]
    Parse(String),
    #[error("{0} has no shape to export")]
    NoShape(String),
    #[error("Naming error: {0}")]
    Naming(String),
    #[error("Nothing to export")]
    EmptyExport,
    #[error("Document error: {0}")]
    Document(#[from] DocumentError),
}

pub type InterchangeResult<T> = Result<T, InterchangeError>;

/// Export options
#[derive(Debug, Clone)]
pub struct ExportOptions {
    /// Author recorded in the file header
    pub author: String,
    /// Organization recorded in the file header
    pub organization: String,
    /// File description
    pub description: String,
    /// Time stamp recorded in the file header (free-form, may be empty)
    pub timestamp: String,
    /// Emit a grouping record per container instead of flattening it
    pub keep_assembly_structure: bool,
}

impl Default for ExportOptions {
    fn default() -> Self {
        Self::from(&InterchangeConfig::default())
    }
}

impl From<&InterchangeConfig> for ExportOptions {
    fn from(config: &InterchangeConfig) -> Self {
        Self {
            author: config.author.clone(),
            organization: config.organization.clone(),
            description: "pd-core model".to_string(),
            timestamp: String::new(),
            keep_assembly_structure: config.keep_assembly_structure,
        }
    }
}

/// Import options
#[derive(Debug, Clone)]
pub struct ImportOptions {
    /// Turn grouping records into containers
    pub create_containers: bool,
}

impl Default for ImportOptions {
    fn default() -> Self {
        Self::from(&InterchangeConfig::default())
    }
}

impl From<&InterchangeConfig> for ImportOptions {
    fn from(config: &InterchangeConfig) -> Self {
        Self {
            create_containers: config.create_containers,
        }
    }
}

/// Export objects to STEP text
pub fn export_to_string(
    document: &Document,
    names: &[&str],
    file_name: &str,
    options: &ExportOptions,
) -> InterchangeResult<String> {
    let nodes = plan(document, names, options.keep_assembly_structure)?;
    Ok(write_step(&nodes, file_name, options))
}

/// Export objects to a STEP file, returning the number of top-level records
pub fn export(
    document: &Document,
    names: &[&str],
    path: impl AsRef<Path>,
    options: &ExportOptions,
) -> InterchangeResult<usize> {
    let path = path.as_ref();
    let nodes = plan(document, names, options.keep_assembly_structure)?;
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let content = write_step(&nodes, &file_name, options);
    std::fs::write(path, content).map_err(|e| InterchangeError::Io(e.to_string()))?;

    tracing::debug!(
        "Exported {} record(s) from {} to {}",
        nodes.len(),
        document.name,
        path.display()
    );
    Ok(nodes.len())
}

/// Insert the records of a STEP file into a document
///
/// Returns the names of the created top-level objects. Nothing is added
/// when the file cannot be read.
pub fn insert(
    path: impl AsRef<Path>,
    document: &mut Document,
    options: &ImportOptions,
) -> InterchangeResult<Vec<String>> {
    let path = path.as_ref();
    let content =
        std::fs::read_to_string(path).map_err(|e| InterchangeError::Io(e.to_string()))?;
    let created = insert_str(&content, document, options)?;
    tracing::debug!(
        "Inserted {} object(s) from {} into {}",
        created.len(),
        path.display(),
        document.name
    );
    Ok(created)
}

/// Insert the records of STEP text into a document
pub fn insert_str(
    content: &str,
    document: &mut Document,
    options: &ImportOptions,
) -> InterchangeResult<Vec<String>> {
    let nodes = read_step(content)?;
    let mut created = Vec::new();
    for node in &nodes {
        created.extend(insert_node(document, node, options)?);
    }
    Ok(created)
}

fn insert_node(
    document: &mut Document,
    node: &ShapeNode,
    options: &ImportOptions,
) -> InterchangeResult<Vec<String>> {
    match node {
        ShapeNode::Shape { label, solid } => {
            Ok(vec![document.add_imported(label, solid.clone())])
        }
        ShapeNode::Group { label, children } if options.create_containers => {
            let part = document.add_part(label);
            for child in children {
                for name in insert_node(document, child, options)? {
                    document.add_to_part(&part, &name)?;
                }
            }
            Ok(vec![part])
        }
        ShapeNode::Group { children, .. } => {
            let mut created = Vec::new();
            for child in children {
                created.extend(insert_node(document, child, options)?);
            }
            Ok(created)
        }
    }
}
