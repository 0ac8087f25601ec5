//! PartDoc Document Model
//!
//! This crate provides:
//! - Documents holding containers, bodies, primitives and imported shapes
//! - Object naming, containment and recompute
//! - RON persistence with atomic saves
//! - STEP interchange with label-preserving record names
//! - A registry of open documents
//! - The object tree presentation model

pub mod config;
pub mod constants;
pub mod document;
pub mod interchange;
pub mod primitive;
pub mod registry;
pub mod tree;

// Re-exports for convenience
pub use config::{ConfigError, InterchangeConfig, PersistenceConfig, Settings};
pub use document::{
    Document, DocumentError, DocumentObject, DocumentResult, ObjectData, ObjectRef,
    PersistenceError,
};
pub use interchange::{ExportOptions, ImportOptions, InterchangeError, ShapeNode};
pub use primitive::Primitive;
pub use registry::{Registry, RegistryError, SharedRegistry, create_shared_registry};
pub use tree::{TreeItem, TreeModel, TreeStyle};
