//! Document objects and uniform references to them

use serde::{Deserialize, Serialize};

use pd_cad::{FeatureHistory, HistoryEntry, Sketch, Solid, Suppressible};

use super::types::is_derived_from;
use crate::constants::{TYPE_BODY, TYPE_CONTAINER, TYPE_PART_FEATURE, TYPE_SKETCH};
use crate::primitive::Primitive;

/// Kind-specific data of a top-level object
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum ObjectData {
    /// Container owning other top-level objects by name
    Part { children: Vec<String> },
    /// Body with its feature history
    Body(FeatureHistory),
    /// Standalone primitive
    Primitive(Primitive),
    /// Shape stored verbatim (interchange import)
    Imported(Solid),
}

/// A top-level object in a document
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentObject {
    /// Internal name, unique within the document
    pub name: String,
    /// User-visible label
    pub label: String,
    pub data: ObjectData,
    /// Shape from the last recompute (containers and primitives)
    #[serde(skip)]
    pub(crate) shape: Option<Solid>,
    /// Error from the last recompute
    #[serde(skip)]
    pub(crate) error: Option<String>,
}

impl DocumentObject {
    pub fn new(name: impl Into<String>, label: impl Into<String>, data: ObjectData) -> Self {
        Self {
            name: name.into(),
            label: label.into(),
            data,
            shape: None,
            error: None,
        }
    }

    /// Type identifier of this object
    pub fn type_id(&self) -> &'static str {
        match &self.data {
            ObjectData::Part { .. } => TYPE_CONTAINER,
            ObjectData::Body(_) => TYPE_BODY,
            ObjectData::Primitive(primitive) => primitive.type_name(),
            ObjectData::Imported(_) => TYPE_PART_FEATURE,
        }
    }

    /// Computed shape, if any
    pub fn shape(&self) -> Option<&Solid> {
        match &self.data {
            ObjectData::Body(history) => history.shape(),
            ObjectData::Imported(solid) => Some(solid),
            ObjectData::Part { .. } | ObjectData::Primitive(_) => self.shape.as_ref(),
        }
    }

    /// Error from the last recompute
    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    /// Children of a container
    pub fn children(&self) -> &[String] {
        match &self.data {
            ObjectData::Part { children } => children,
            _ => &[],
        }
    }

    /// Feature history of a body
    pub fn history(&self) -> Option<&FeatureHistory> {
        match &self.data {
            ObjectData::Body(history) => Some(history),
            _ => None,
        }
    }

    /// Mutable feature history of a body
    pub fn history_mut(&mut self) -> Option<&mut FeatureHistory> {
        match &mut self.data {
            ObjectData::Body(history) => Some(history),
            _ => None,
        }
    }
}

/// Uniform view of any object in a document, top-level or body-internal
#[derive(Debug, Clone, Copy)]
pub enum ObjectRef<'a> {
    Object(&'a DocumentObject),
    Feature {
        body: &'a DocumentObject,
        entry: &'a HistoryEntry,
    },
    Sketch {
        body: &'a DocumentObject,
        sketch: &'a Sketch,
    },
}

impl<'a> ObjectRef<'a> {
    /// Internal name
    pub fn name(&self) -> &'a str {
        match *self {
            ObjectRef::Object(object) => &object.name,
            ObjectRef::Feature { entry, .. } => &entry.feature.name,
            ObjectRef::Sketch { sketch, .. } => &sketch.name,
        }
    }

    /// User-visible label
    pub fn label(&self) -> &'a str {
        match *self {
            ObjectRef::Object(object) => &object.label,
            ObjectRef::Feature { entry, .. } => &entry.feature.label,
            ObjectRef::Sketch { sketch, .. } => &sketch.label,
        }
    }

    /// Label, or the internal name when the label is empty
    pub fn display_label(&self) -> &'a str {
        let label = self.label();
        if label.trim().is_empty() {
            self.name()
        } else {
            label
        }
    }

    /// Type identifier
    pub fn type_id(&self) -> &'static str {
        match *self {
            ObjectRef::Object(object) => object.type_id(),
            ObjectRef::Feature { entry, .. } => entry.feature.type_name(),
            ObjectRef::Sketch { .. } => TYPE_SKETCH,
        }
    }

    /// Check whether this object's type is `base` or inherits from it
    pub fn is_derived_from(&self, base: &str) -> bool {
        is_derived_from(self.type_id(), base)
    }

    /// Body owning a feature or sketch
    pub fn owner(&self) -> Option<&'a DocumentObject> {
        match *self {
            ObjectRef::Object(_) => None,
            ObjectRef::Feature { body, .. } | ObjectRef::Sketch { body, .. } => Some(body),
        }
    }

    /// Computed shape, if any (sketches never carry one)
    pub fn shape(&self) -> Option<&'a Solid> {
        match *self {
            ObjectRef::Object(object) => object.shape(),
            ObjectRef::Feature { entry, .. } => entry.shape.as_ref(),
            ObjectRef::Sketch { .. } => None,
        }
    }

    /// Error from the last recompute
    pub fn error(&self) -> Option<&'a str> {
        match *self {
            ObjectRef::Object(object) => object.error(),
            ObjectRef::Feature { entry, .. } => entry.error.as_deref(),
            ObjectRef::Sketch { .. } => None,
        }
    }

    /// Suppression capability, looked up without inspecting the concrete type
    pub fn as_suppressible(&self) -> Option<&'a dyn Suppressible> {
        match *self {
            ObjectRef::Feature { entry, .. } => {
                let feature: &'a dyn Suppressible = &entry.feature;
                feature.suppressible().map(|_| feature)
            }
            _ => None,
        }
    }

    /// Extension type names attached to this object
    pub fn extensions(&self) -> Vec<&'static str> {
        match *self {
            ObjectRef::Feature { entry, .. } => entry.feature.extensions(),
            _ => Vec::new(),
        }
    }

    /// Check whether the object carries an extension
    pub fn has_extension(&self, extension: &str) -> bool {
        self.extensions().contains(&extension)
    }

    /// Whether the object is suppressed
    pub fn is_suppressed(&self) -> bool {
        self.as_suppressible().is_some_and(|s| s.is_suppressed())
    }

    /// Whether this is the tip of its body
    pub fn is_tip(&self) -> bool {
        match *self {
            ObjectRef::Feature { body, entry } => body
                .history()
                .and_then(|h| h.tip())
                .is_some_and(|tip| tip == entry.feature.name),
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pd_cad::{Feature, Plane, SUPPRESSIBLE_EXTENSION};

    #[test]
    fn test_capability_lookup() {
        let mut history = FeatureHistory::new();
        history.add_sketch(Sketch::new("Sketch", Plane::xy()));
        history.add_feature(Feature::pad("Pad", "Sketch", 5.0));
        let body = DocumentObject::new("Body", "Body", ObjectData::Body(history));
        let history = body.history().unwrap();

        let pad = ObjectRef::Feature {
            body: &body,
            entry: &history.entries()[0],
        };
        assert!(pad.has_extension(SUPPRESSIBLE_EXTENSION));
        assert!(pad.as_suppressible().is_some());
        assert!(pad.is_tip());
        assert_eq!(pad.owner().map(|b| b.name.as_str()), Some("Body"));
        assert!(pad.is_derived_from("PartDesign::Feature"));

        let sketch = ObjectRef::Sketch {
            body: &body,
            sketch: &history.sketches()[0],
        };
        assert!(sketch.as_suppressible().is_none());
        assert!(!sketch.has_extension(SUPPRESSIBLE_EXTENSION));
        assert_eq!(sketch.type_id(), "Sketcher::SketchObject");

        let body_ref = ObjectRef::Object(&body);
        assert!(body_ref.as_suppressible().is_none());
        assert!(body_ref.is_derived_from("Part::Feature"));
    }

    #[test]
    fn test_display_label_fallback() {
        let object = DocumentObject::new("Part", "", ObjectData::Part { children: vec![] });
        assert_eq!(ObjectRef::Object(&object).display_label(), "Part");
    }
}
