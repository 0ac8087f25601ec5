//! Documents
//!
//! A document owns top-level objects (containers, bodies, primitives and
//! imported shapes). Bodies own their features and sketches. Every object,
//! body-internal ones included, has a name unique within the document.

mod names;
mod object;
mod persist;
mod types;

use std::collections::HashMap;
use std::path::PathBuf;

use uuid::Uuid;

use pd_cad::{
    CadError, CadKernel, Feature, FeatureError, FeatureHistory, Sketch, SketchError, Solid,
    default_kernel,
};

pub use names::{sanitize_name, unique_name};
pub use object::{DocumentObject, ObjectData, ObjectRef};
pub use persist::PersistenceError;
pub use types::is_derived_from;

use crate::primitive::Primitive;

/// Document-related errors
#[derive(Debug, Clone, thiserror::Error)]
pub enum DocumentError {
    #[error("Object not found: {0}")]
    NotFound(String),

    #[error("Invalid operation: {0}")]
    InvalidOperation(String),

    #[error("{object} depends on {dependency}")]
    Dependency { object: String, dependency: String },

    #[error("Recompute of {object} failed: {message}")]
    Recompute { object: String, message: String },

    #[error("Feature error: {0}")]
    Feature(#[from] FeatureError),

    #[error("Sketch error: {0}")]
    Sketch(#[from] SketchError),

    #[error("CAD kernel error: {0}")]
    Cad(#[from] CadError),
}

impl DocumentError {
    fn from_feature(error: FeatureError) -> Self {
        match error {
            FeatureError::Dependency {
                feature,
                dependency,
            } => DocumentError::Dependency {
                object: feature,
                dependency,
            },
            FeatureError::FeatureNotFound(name) | FeatureError::SketchNotFound(name) => {
                DocumentError::NotFound(name)
            }
            other => DocumentError::Feature(other),
        }
    }
}

/// Result type for document operations
pub type DocumentResult<T> = Result<T, DocumentError>;

/// A parametric document
#[derive(Debug, Clone)]
pub struct Document {
    /// Identifier, unique within a registry
    pub name: String,
    /// User-visible label
    pub label: String,
    /// Persistent unique ID
    pub uid: Uuid,
    /// File the document was loaded from or last saved to
    pub file_path: Option<PathBuf>,
    /// Top-level objects in creation order
    objects: Vec<DocumentObject>,
    /// Top-level object name -> position in `objects`
    name_index: HashMap<String, usize>,
    /// Body-internal object name -> owning body
    owner_index: HashMap<String, String>,
    /// Set by any mutation, cleared by recompute
    touched: bool,
}

impl Default for Document {
    fn default() -> Self {
        Self::new("Unnamed")
    }
}

impl Document {
    /// Create a new empty document
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            label: name.clone(),
            name,
            uid: Uuid::new_v4(),
            file_path: None,
            objects: Vec::new(),
            name_index: HashMap::new(),
            owner_index: HashMap::new(),
            touched: false,
        }
    }

    pub(crate) fn from_parts(
        name: String,
        label: String,
        uid: Uuid,
        objects: Vec<DocumentObject>,
    ) -> Self {
        let mut document = Self {
            name,
            label,
            uid,
            file_path: None,
            objects,
            name_index: HashMap::new(),
            owner_index: HashMap::new(),
            touched: true,
        };
        document.rebuild_indices();
        document
    }

    /// Rebuild name indices (call after structural changes and deserialization)
    pub fn rebuild_indices(&mut self) {
        self.name_index.clear();
        self.owner_index.clear();
        for (index, object) in self.objects.iter().enumerate() {
            self.name_index.insert(object.name.clone(), index);
            if let Some(history) = object.history() {
                let internal = history
                    .features()
                    .map(|f| &f.name)
                    .chain(history.sketches().iter().map(|s| &s.name));
                for name in internal {
                    self.owner_index.insert(name.clone(), object.name.clone());
                }
            }
        }
    }

    /// Whether the document changed since the last recompute
    pub fn is_touched(&self) -> bool {
        self.touched
    }

    /// Flag the document as needing a recompute
    pub fn touch(&mut self) {
        self.touched = true;
    }

    // ============== Lookup ==============

    /// All top-level objects in creation order
    pub fn objects(&self) -> &[DocumentObject] {
        &self.objects
    }

    /// Get a top-level object by name
    pub fn object(&self, name: &str) -> Option<&DocumentObject> {
        self.name_index.get(name).map(|i| &self.objects[*i])
    }

    fn object_mut(&mut self, name: &str) -> Option<&mut DocumentObject> {
        let index = *self.name_index.get(name)?;
        self.objects.get_mut(index)
    }

    /// Get any object by name, including body features and sketches
    pub fn get(&self, name: &str) -> Option<ObjectRef<'_>> {
        if let Some(object) = self.object(name) {
            return Some(ObjectRef::Object(object));
        }
        let body = self.object(self.owner_index.get(name)?)?;
        let history = body.history()?;
        if let Some(entry) = history.entry(name) {
            return Some(ObjectRef::Feature { body, entry });
        }
        history
            .get_sketch(name)
            .map(|sketch| ObjectRef::Sketch { body, sketch })
    }

    /// Find every object with the given label
    pub fn find_by_label(&self, label: &str) -> Vec<ObjectRef<'_>> {
        self.iter().filter(|o| o.label() == label).collect()
    }

    /// Iterate over every object: top-level objects, each followed by its
    /// body-internal features and sketches
    pub fn iter(&self) -> impl Iterator<Item = ObjectRef<'_>> {
        self.objects.iter().flat_map(|object| {
            let mut items = vec![ObjectRef::Object(object)];
            if let Some(history) = object.history() {
                items.extend(history.entries().iter().map(|entry| ObjectRef::Feature {
                    body: object,
                    entry,
                }));
                items.extend(history.sketches().iter().map(|sketch| ObjectRef::Sketch {
                    body: object,
                    sketch,
                }));
            }
            items
        })
    }

    /// Whether a name is used by any object
    pub fn contains(&self, name: &str) -> bool {
        self.name_index.contains_key(name) || self.owner_index.contains_key(name)
    }

    /// Container directly holding an object
    pub fn parent_of(&self, name: &str) -> Option<&str> {
        self.objects
            .iter()
            .find(|o| o.children().iter().any(|c| c == name))
            .map(|o| o.name.as_str())
    }

    /// Top-level objects not held by any container
    pub fn roots(&self) -> impl Iterator<Item = &DocumentObject> {
        self.objects
            .iter()
            .filter(|o| self.parent_of(&o.name).is_none())
    }

    /// Feature history of a body
    pub fn body(&self, name: &str) -> Option<&FeatureHistory> {
        self.object(name)?.history()
    }

    fn body_mut(&mut self, name: &str) -> DocumentResult<&mut FeatureHistory> {
        self.object_mut(name)
            .ok_or_else(|| DocumentError::NotFound(name.to_string()))?
            .history_mut()
            .ok_or_else(|| DocumentError::InvalidOperation(format!("{name} is not a body")))
    }

    fn owning_body(&self, name: &str) -> DocumentResult<String> {
        self.owner_index
            .get(name)
            .cloned()
            .ok_or_else(|| DocumentError::NotFound(name.to_string()))
    }

    /// Mutable access to a sketch; marks the document touched
    pub fn sketch_mut(&mut self, name: &str) -> Option<&mut Sketch> {
        let body = self.owner_index.get(name)?.clone();
        self.touched = true;
        self.object_mut(&body)?.history_mut()?.get_sketch_mut(name)
    }

    /// Mutable access to a feature; marks the document touched
    pub fn feature_mut(&mut self, name: &str) -> Option<&mut Feature> {
        let body = self.owner_index.get(name)?.clone();
        self.touched = true;
        self.object_mut(&body)?.history_mut()?.get_by_name_mut(name)
    }

    /// Mutable access to a primitive's parameters; marks the document touched
    pub fn primitive_mut(&mut self, name: &str) -> Option<&mut Primitive> {
        self.touched = true;
        match &mut self.object_mut(name)?.data {
            ObjectData::Primitive(primitive) => Some(primitive),
            _ => None,
        }
    }

    // ============== Construction ==============

    fn unique(&self, base: &str) -> String {
        unique_name(base, |candidate| self.contains(candidate))
    }

    /// Add a top-level object; the name is derived from the label
    pub fn add_object(&mut self, label: &str, data: ObjectData) -> String {
        let name = self.unique(label);
        let object = DocumentObject::new(name.clone(), label, data);
        tracing::debug!("Adding {} {} ({})", object.type_id(), name, label);
        self.objects.push(object);
        self.rebuild_indices();
        self.touched = true;
        name
    }

    /// Add an empty container
    pub fn add_part(&mut self, label: &str) -> String {
        self.add_object(label, ObjectData::Part {
            children: Vec::new(),
        })
    }

    /// Add an empty body
    pub fn add_body(&mut self, label: &str) -> String {
        self.add_object(label, ObjectData::Body(FeatureHistory::new()))
    }

    /// Add a standalone primitive
    pub fn add_primitive(&mut self, label: &str, primitive: Primitive) -> String {
        self.add_object(label, ObjectData::Primitive(primitive))
    }

    /// Add a stored shape
    pub fn add_imported(&mut self, label: &str, solid: Solid) -> String {
        self.add_object(label, ObjectData::Imported(solid))
    }

    /// Add a sketch to a body; returns the sketch's (possibly renamed) name
    pub fn add_sketch(&mut self, body: &str, mut sketch: Sketch) -> DocumentResult<String> {
        let name = self.unique(&sketch.name);
        if sketch.label == sketch.name {
            sketch.label = name.clone();
        }
        sketch.name = name.clone();

        self.body_mut(body)?.add_sketch(sketch);
        self.rebuild_indices();
        self.touched = true;
        Ok(name)
    }

    /// Add a feature after the body's tip; returns its (possibly renamed) name
    pub fn add_feature(&mut self, body: &str, mut feature: Feature) -> DocumentResult<String> {
        let history = self
            .body(body)
            .ok_or_else(|| DocumentError::NotFound(body.to_string()))?;
        if let Some(sketch) = feature.profile_sketch()
            && history.get_sketch(sketch).is_none()
        {
            return Err(DocumentError::NotFound(format!("{sketch} in {body}")));
        }
        if let Some(base) = feature.base_feature()
            && history.get_by_name(base).is_none()
        {
            return Err(DocumentError::NotFound(format!("{base} in {body}")));
        }

        let name = self.unique(&feature.name);
        if feature.label == feature.name {
            feature.label = name.clone();
        }
        feature.name = name.clone();

        tracing::debug!("Adding {} {} to {}", feature.type_name(), name, body);
        self.body_mut(body)?.add_feature(feature);
        self.rebuild_indices();
        self.touched = true;
        Ok(name)
    }

    /// Move a top-level object into a container
    ///
    /// The object leaves any container it was in before.
    pub fn add_to_part(&mut self, part: &str, object: &str) -> DocumentResult<()> {
        let container = self
            .object(part)
            .ok_or_else(|| DocumentError::NotFound(part.to_string()))?;
        if !matches!(container.data, ObjectData::Part { .. }) {
            return Err(DocumentError::InvalidOperation(format!(
                "{part} is not a container"
            )));
        }
        if self.object(object).is_none() {
            return Err(if self.contains(object) {
                DocumentError::InvalidOperation(format!(
                    "{object} belongs to a body and cannot be moved"
                ))
            } else {
                DocumentError::NotFound(object.to_string())
            });
        }
        if part == object || self.descendants(object).iter().any(|d| d == part) {
            return Err(DocumentError::InvalidOperation(format!(
                "adding {object} to {part} would create a cycle"
            )));
        }

        for candidate in &mut self.objects {
            if let ObjectData::Part { children } = &mut candidate.data {
                children.retain(|c| c != object);
            }
        }
        if let Some(ObjectData::Part { children }) = self.object_mut(part).map(|o| &mut o.data) {
            children.push(object.to_string());
        }
        self.touched = true;
        Ok(())
    }

    /// All objects transitively held by a container
    pub fn descendants(&self, name: &str) -> Vec<String> {
        let mut result = Vec::new();
        let mut stack: Vec<&str> = vec![name];
        while let Some(current) = stack.pop() {
            if let Some(object) = self.object(current) {
                for child in object.children() {
                    if !result.contains(child) {
                        result.push(child.clone());
                        stack.push(child);
                    }
                }
            }
        }
        result
    }

    // ============== Mutation ==============

    /// Change the label of any object
    pub fn set_label(&mut self, name: &str, label: impl Into<String>) -> DocumentResult<()> {
        let label = label.into();
        if let Some(object) = self.object_mut(name) {
            object.label = label;
            self.touched = true;
            return Ok(());
        }
        let body = self.owning_body(name)?;
        let history = self.body_mut(&body)?;
        if let Some(feature) = history.get_by_name_mut(name) {
            feature.label = label;
        } else if let Some(sketch) = history.get_sketch_mut(name) {
            sketch.label = label;
        }
        self.touched = true;
        Ok(())
    }

    /// Make a feature the tip of its body
    pub fn set_tip(&mut self, body: &str, feature: &str) -> DocumentResult<()> {
        self.body_mut(body)?
            .set_tip(feature)
            .map_err(DocumentError::from_feature)?;
        self.touched = true;
        Ok(())
    }

    /// Suppress or unsuppress an object through its suppression capability
    pub fn set_suppressed(&mut self, name: &str, value: bool) -> DocumentResult<()> {
        let Some(object) = self.get(name) else {
            return Err(DocumentError::NotFound(name.to_string()));
        };
        if object.as_suppressible().is_none() {
            return Err(DocumentError::InvalidOperation(format!(
                "{name} cannot be suppressed"
            )));
        }
        let body = self.owning_body(name)?;
        self.body_mut(&body)?
            .set_suppressed(name, value)
            .map_err(DocumentError::from_feature)?;
        self.touched = true;
        Ok(())
    }

    /// Remove an object
    ///
    /// Containers take their children with them, bodies their features and
    /// sketches. Features and sketches still used by other features cannot
    /// be removed.
    pub fn remove_object(&mut self, name: &str) -> DocumentResult<()> {
        if self.object(name).is_some() {
            let mut doomed = self.descendants(name);
            doomed.push(name.to_string());
            self.objects.retain(|o| !doomed.contains(&o.name));
            for object in &mut self.objects {
                if let ObjectData::Part { children } = &mut object.data {
                    children.retain(|c| !doomed.contains(c));
                }
            }
            tracing::debug!("Removed {}", doomed.join(", "));
        } else {
            let body = self.owning_body(name)?;
            let history = self.body_mut(&body)?;
            let users = if history.get_by_name(name).is_some() {
                history.dependents_of(name)
            } else {
                history.consumers_of_sketch(name)
            };
            if let Some(user) = users.first() {
                return Err(DocumentError::Dependency {
                    object: user.to_string(),
                    dependency: name.to_string(),
                });
            }
            if history.remove_feature(name).is_none() {
                history.remove_sketch(name);
            }
            tracing::debug!("Removed {} from {}", name, body);
        }

        self.rebuild_indices();
        self.touched = true;
        Ok(())
    }

    // ============== Recompute ==============

    /// Recompute every object with the default kernel
    pub fn recompute(&mut self) -> DocumentResult<usize> {
        let kernel = default_kernel();
        self.recompute_with(kernel.as_ref())
    }

    /// Recompute every object
    ///
    /// Bodies and primitives are computed first, then containers innermost
    /// first. Failures are recorded on the failing object; the first one is
    /// returned after all objects have been processed.
    pub fn recompute_with(&mut self, kernel: &dyn CadKernel) -> DocumentResult<usize> {
        let mut first_error: Option<DocumentError> = None;
        let mut count = 0;

        for object in &mut self.objects {
            object.error = None;
            let result = match &mut object.data {
                ObjectData::Body(history) => history.rebuild(kernel).map_err(|e| e.to_string()),
                ObjectData::Primitive(primitive) => match primitive.make_shape(kernel) {
                    Ok(solid) => {
                        object.shape = Some(solid);
                        Ok(())
                    }
                    Err(e) => {
                        object.shape = None;
                        Err(e.to_string())
                    }
                },
                ObjectData::Imported(_) | ObjectData::Part { .. } => continue,
            };
            count += 1;

            if let Err(message) = result {
                tracing::warn!("Recompute of {} failed: {}", object.name, message);
                object.error = Some(message.clone());
                first_error.get_or_insert(DocumentError::Recompute {
                    object: object.name.clone(),
                    message,
                });
            }
        }

        for container in self.containers_innermost_first() {
            let children = self
                .object(&container)
                .map(|o| o.children().to_vec())
                .unwrap_or_default();
            let shapes: Vec<Solid> = children
                .iter()
                .filter_map(|c| self.object(c)?.shape().cloned())
                .collect();
            let compound = Solid::compound(&shapes.iter().collect::<Vec<_>>());
            if let Some(object) = self.object_mut(&container) {
                object.shape = compound;
            }
            count += 1;
        }

        self.touched = false;
        match first_error {
            Some(e) => Err(e),
            None => Ok(count),
        }
    }

    fn containers_innermost_first(&self) -> Vec<String> {
        fn visit(doc: &Document, name: &str, order: &mut Vec<String>) {
            if order.iter().any(|n| n == name) {
                return;
            }
            if let Some(object) = doc.object(name) {
                for child in object.children() {
                    visit(doc, child, order);
                }
                if matches!(object.data, ObjectData::Part { .. }) {
                    order.push(name.to_string());
                }
            }
        }

        let mut order = Vec::new();
        for object in &self.objects {
            visit(self, &object.name, &mut order);
        }
        order
    }
}
