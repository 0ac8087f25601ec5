//! Object tree presentation
//!
//! Builds the model a tree view displays: top-level objects not held by a
//! container form the roots, containers list their children, and bodies list
//! their features in history order with each consumed sketch nested under
//! the feature that uses it.

use std::collections::HashSet;
use std::fmt::Write;

use serde::Serialize;

use crate::document::{Document, ObjectRef};

/// Display style of a tree item
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct TreeStyle {
    /// Item is shown struck out (suppressed)
    pub strike_out: bool,
    /// Last recompute of the item failed
    pub error: bool,
    /// Item is the tip of its body
    pub tip: bool,
}

/// One row of the tree
#[derive(Debug, Clone, Serialize)]
pub struct TreeItem {
    pub name: String,
    pub label: String,
    pub type_id: String,
    pub style: TreeStyle,
    pub children: Vec<TreeItem>,
}

impl TreeItem {
    fn leaf(object: ObjectRef<'_>) -> Self {
        // Strike-out follows the suppression capability, whatever the type.
        let strike_out = object
            .as_suppressible()
            .is_some_and(|capability| capability.is_suppressed());
        Self {
            name: object.name().to_string(),
            label: object.display_label().to_string(),
            type_id: object.type_id().to_string(),
            style: TreeStyle {
                strike_out,
                error: object.error().is_some(),
                tip: object.is_tip(),
            },
            children: Vec::new(),
        }
    }

    fn find(&self, label: &str) -> Option<&TreeItem> {
        if self.label == label {
            return Some(self);
        }
        self.children.iter().find_map(|c| c.find(label))
    }

    fn render_into(&self, depth: usize, out: &mut String) {
        let mut marks = String::new();
        if self.style.strike_out {
            marks.push_str(" [suppressed]");
        }
        if self.style.tip {
            marks.push_str(" [tip]");
        }
        if self.style.error {
            marks.push_str(" [error]");
        }
        let _ = writeln!(
            out,
            "{:indent$}{} ({}){}",
            "",
            self.label,
            self.type_id,
            marks,
            indent = depth * 2
        );
        for child in &self.children {
            child.render_into(depth + 1, out);
        }
    }
}

/// Tree of a whole document
#[derive(Debug, Clone, Default, Serialize)]
pub struct TreeModel {
    pub roots: Vec<TreeItem>,
}

impl TreeModel {
    /// Build the tree from the current document state
    pub fn build(document: &Document) -> Self {
        let roots = document
            .roots()
            .filter_map(|object| build_object(document, &object.name))
            .collect();
        Self { roots }
    }

    /// First item with the given label, depth first
    pub fn find(&self, label: &str) -> Option<&TreeItem> {
        self.roots.iter().find_map(|r| r.find(label))
    }

    /// Strike-out state of the item with the given label
    pub fn strike_out(&self, label: &str) -> Option<bool> {
        self.find(label).map(|item| item.style.strike_out)
    }

    /// Indented text form, two spaces per level
    pub fn render(&self) -> String {
        let mut out = String::new();
        for root in &self.roots {
            root.render_into(0, &mut out);
        }
        out
    }

    /// Visit every item with its depth
    pub fn walk(&self, mut visit: impl FnMut(&TreeItem, usize)) {
        fn walk_item(item: &TreeItem, depth: usize, visit: &mut dyn FnMut(&TreeItem, usize)) {
            visit(item, depth);
            for child in &item.children {
                walk_item(child, depth + 1, visit);
            }
        }
        for root in &self.roots {
            walk_item(root, 0, &mut visit);
        }
    }
}

fn build_object(document: &Document, name: &str) -> Option<TreeItem> {
    let object = document.object(name)?;
    let mut item = TreeItem::leaf(ObjectRef::Object(object));

    for child in object.children() {
        item.children.extend(build_object(document, child));
    }

    if let Some(history) = object.history() {
        let mut placed = HashSet::new();
        for entry in history.entries() {
            let mut feature = TreeItem::leaf(ObjectRef::Feature {
                body: object,
                entry,
            });
            if let Some(sketch_name) = entry.feature.profile_sketch()
                && placed.insert(sketch_name)
                && let Some(sketch) = history.get_sketch(sketch_name)
            {
                feature
                    .children
                    .push(TreeItem::leaf(ObjectRef::Sketch { body: object, sketch }));
            }
            item.children.push(feature);
        }
        for sketch in history.sketches() {
            if !placed.contains(sketch.name.as_str()) {
                item.children
                    .push(TreeItem::leaf(ObjectRef::Sketch { body: object, sketch }));
            }
        }
    }
    Some(item)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::primitive::Primitive;
    use glam::DVec2;
    use pd_cad::{Feature, Plane, ShapeRef, Sketch};

    fn padded_document() -> Document {
        let mut doc = Document::new("Tree");
        let part = doc.add_part("Assembly");
        let body = doc.add_body("Body");
        doc.add_to_part(&part, &body).unwrap();

        let mut sketch = Sketch::new("Sketch", Plane::xy());
        sketch
            .add_rectangle(DVec2::ZERO, DVec2::new(10.0, 10.0))
            .unwrap();
        let sketch = doc.add_sketch(&body, sketch).unwrap();
        doc.add_sketch(&body, Sketch::new("Spare", Plane::xz())).unwrap();
        let pad = doc
            .add_feature(&body, Feature::pad("Pad", &sketch, 10.0))
            .unwrap();
        doc.add_feature(
            &body,
            Feature::fillet("Fillet", ShapeRef::new(&pad, &["Edge1"]), 1.0),
        )
        .unwrap();
        doc.add_primitive("Cube", Primitive::cuboid(1.0, 1.0, 1.0));
        doc.recompute().unwrap();
        doc
    }

    #[test]
    fn test_structure() {
        let doc = padded_document();
        let tree = TreeModel::build(&doc);

        let roots: Vec<_> = tree.roots.iter().map(|r| r.label.as_str()).collect();
        assert_eq!(roots, ["Assembly", "Cube"]);

        let body = &tree.roots[0].children[0];
        let children: Vec<_> = body.children.iter().map(|c| c.label.as_str()).collect();
        assert_eq!(children, ["Pad", "Fillet", "Spare"]);
        assert_eq!(body.children[0].children[0].label, "Sketch");
        assert!(tree.find("Fillet").unwrap().style.tip);
        assert!(!tree.find("Pad").unwrap().style.tip);
    }

    #[test]
    fn test_strike_out_follows_flag() {
        let mut doc = padded_document();
        assert_eq!(TreeModel::build(&doc).strike_out("Fillet"), Some(false));

        doc.set_suppressed("Fillet", true).unwrap();
        let tree = TreeModel::build(&doc);
        assert_eq!(tree.strike_out("Fillet"), Some(true));
        assert_eq!(tree.strike_out("Pad"), Some(false));
        assert_eq!(tree.strike_out("Sketch"), Some(false));
        assert_eq!(tree.strike_out("Missing"), None);
        assert!(tree.render().contains("Fillet (PartDesign::Fillet) [suppressed] [tip]"));
    }

    #[test]
    fn test_strike_out_survives_reload() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tree.pdoc");

        let mut doc = padded_document();
        doc.set_suppressed("Fillet", true).unwrap();
        doc.save_as(&path).unwrap();
        drop(doc);

        let doc = Document::load(&path).unwrap();
        let tree = TreeModel::build(&doc);
        assert_eq!(tree.strike_out("Fillet"), Some(true));
        assert_eq!(tree.strike_out("Pad"), Some(false));
    }

    #[test]
    fn test_render_and_walk() {
        let doc = padded_document();
        let tree = TreeModel::build(&doc);
        let text = tree.render();
        assert!(text.starts_with("Assembly (App::Part)\n  Body (PartDesign::Body)\n"));
        assert!(text.contains("      Sketch (Sketcher::SketchObject)\n"));

        let mut count = 0;
        let mut deepest = 0;
        tree.walk(|_, depth| {
            count += 1;
            deepest = deepest.max(depth);
        });
        assert_eq!(count, 7);
        assert_eq!(deepest, 3);
    }
}
