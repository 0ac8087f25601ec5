//! Record naming for export
//!
//! Decides which shape records an export produces and what each one is
//! called. Every record carries the label of the object it was made from:
//! a body exports under its own label (never the tip's), a container becomes
//! a grouping record with one record per child.
//!
//! Child records always keep their labels. The grouping record takes the
//! container's label unless a record below it already carries that label;
//! then it takes the container's internal name, and when that is taken too
//! the container is written flat.

use pd_cad::Solid;

use super::{InterchangeError, InterchangeResult};
use crate::document::{Document, ObjectData, ObjectRef};

/// One record of an interchange file
#[derive(Debug, Clone, PartialEq)]
pub enum ShapeNode {
    /// Assembly grouping with no geometry of its own
    Group {
        label: String,
        children: Vec<ShapeNode>,
    },
    /// Leaf record carrying a solid
    Shape { label: String, solid: Solid },
}

impl ShapeNode {
    pub fn label(&self) -> &str {
        match self {
            ShapeNode::Group { label, .. } | ShapeNode::Shape { label, .. } => label,
        }
    }

    /// Labels of all leaf records below (or at) this node
    pub fn shape_labels(&self) -> Vec<&str> {
        match self {
            ShapeNode::Shape { label, .. } => vec![label],
            ShapeNode::Group { children, .. } => {
                children.iter().flat_map(ShapeNode::shape_labels).collect()
            }
        }
    }

    /// Labels of every record, grouping records included, in file order
    pub fn labels(&self) -> Vec<&str> {
        let mut labels = vec![self.label()];
        if let ShapeNode::Group { children, .. } = self {
            labels.extend(children.iter().flat_map(ShapeNode::labels));
        }
        labels
    }
}

/// Name for the grouping record of a container, if it can have one
fn group_label<'a>(candidates: [&'a str; 2], children: &[ShapeNode]) -> Option<&'a str> {
    let taken: Vec<&str> = children.iter().flat_map(ShapeNode::labels).collect();
    candidates.into_iter().find(|c| !taken.contains(c))
}

/// Plan the records for exporting the named objects
pub fn plan(
    document: &Document,
    names: &[&str],
    keep_assembly_structure: bool,
) -> InterchangeResult<Vec<ShapeNode>> {
    if names.is_empty() {
        return Err(InterchangeError::EmptyExport);
    }

    let mut nodes = Vec::new();
    for name in names {
        let object = document
            .get(name)
            .ok_or_else(|| InterchangeError::Naming(format!("no object named {name}")))?;
        nodes.extend(plan_object(document, object, keep_assembly_structure)?);
    }
    Ok(nodes)
}

fn plan_object(
    document: &Document,
    object: ObjectRef<'_>,
    keep_assembly_structure: bool,
) -> InterchangeResult<Vec<ShapeNode>> {
    if let ObjectRef::Object(inner) = object
        && let ObjectData::Part { children } = &inner.data
    {
        if children.is_empty() {
            return Err(InterchangeError::NoShape(object.name().to_string()));
        }

        let mut nodes = Vec::new();
        for child in children {
            let child = document
                .get(child)
                .ok_or_else(|| InterchangeError::Naming(format!("no object named {child}")))?;
            nodes.extend(plan_object(document, child, keep_assembly_structure)?);
        }
        if !keep_assembly_structure {
            return Ok(nodes);
        }

        return match group_label([object.display_label(), object.name()], &nodes) {
            Some(label) => Ok(vec![ShapeNode::Group {
                label: label.to_string(),
                children: nodes,
            }]),
            None => {
                tracing::debug!(
                    "Writing {} flat, its name and label are used by its parts",
                    object.name()
                );
                Ok(nodes)
            }
        };
    }

    // Bodies report their own shape (the tip's result) under their own
    // label; sketches have no shape and fail here.
    let solid = object
        .shape()
        .ok_or_else(|| InterchangeError::NoShape(object.name().to_string()))?;
    Ok(vec![ShapeNode::Shape {
        label: object.display_label().to_string(),
        solid: solid.clone(),
    }])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::primitive::Primitive;
    use glam::{DVec2, DVec3};
    use pd_cad::{Feature, Plane, Sketch};

    fn body_with_pad(doc: &mut Document, label: &str) -> String {
        let body = doc.add_body(label);
        let mut sketch = Sketch::new("Sketch", Plane::xy());
        sketch
            .add_rectangle(DVec2::ZERO, DVec2::new(4.0, 2.0))
            .unwrap();
        let sketch = doc.add_sketch(&body, sketch).unwrap();
        doc.add_feature(&body, Feature::pad("Pad", &sketch, 3.0))
            .unwrap();
        body
    }

    #[test]
    fn test_body_uses_own_label() {
        let mut doc = Document::new("Naming");
        let body = body_with_pad(&mut doc, "MyTestBody");
        doc.recompute().unwrap();

        let nodes = plan(&doc, &[body.as_str()], true).unwrap();
        assert_eq!(nodes.len(), 1);
        assert_eq!(nodes[0].label(), "MyTestBody");
        assert_ne!(nodes[0].label(), doc.get("Pad").unwrap().label());
    }

    #[test]
    fn test_container_children_keep_labels() {
        let mut doc = Document::new("Naming");
        let part = doc.add_part("Assembly");
        let left = doc.add_primitive("LeftBracket", Primitive::cuboid(1.0, 1.0, 1.0));
        let right = doc.add_primitive(
            "RightBracket",
            Primitive::cuboid(1.0, 1.0, 1.0).at(DVec3::new(3.0, 0.0, 0.0)),
        );
        doc.add_to_part(&part, &left).unwrap();
        doc.add_to_part(&part, &right).unwrap();
        doc.recompute().unwrap();

        let nodes = plan(&doc, &[part.as_str()], true).unwrap();
        assert_eq!(nodes.len(), 1);
        assert_eq!(nodes[0].label(), "Assembly");
        assert_eq!(nodes[0].shape_labels(), ["LeftBracket", "RightBracket"]);

        let flat = plan(&doc, &[part.as_str()], false).unwrap();
        let labels: Vec<_> = flat.iter().map(ShapeNode::label).collect();
        assert_eq!(labels, ["LeftBracket", "RightBracket"]);
    }

    #[test]
    fn test_group_gives_way_to_child_label() {
        let mut doc = Document::new("Naming");
        let cube = doc.add_primitive("Bracket", Primitive::cuboid(1.0, 1.0, 1.0));
        let other = doc.add_primitive(
            "Other",
            Primitive::cuboid(1.0, 1.0, 1.0).at(DVec3::new(3.0, 0.0, 0.0)),
        );
        let part = doc.add_part("Bracket");
        doc.add_to_part(&part, &cube).unwrap();
        doc.add_to_part(&part, &other).unwrap();
        doc.recompute().unwrap();
        assert_eq!(part, "Bracket001");

        let nodes = plan(&doc, &[part.as_str()], true).unwrap();
        let labels: Vec<_> = nodes.iter().flat_map(ShapeNode::labels).collect();
        assert_eq!(labels, ["Bracket001", "Bracket", "Other"], "labels: {labels:?}");
        assert_eq!(labels.iter().filter(|l| **l == "Bracket").count(), 1);
    }

    #[test]
    fn test_group_written_flat_when_name_and_label_are_taken() {
        let mut doc = Document::new("Naming");
        let part = doc.add_part("Bracket");
        let cube = doc.add_primitive("Bracket", Primitive::cuboid(1.0, 1.0, 1.0));
        let other = doc.add_primitive(
            "Other",
            Primitive::cuboid(1.0, 1.0, 1.0).at(DVec3::new(3.0, 0.0, 0.0)),
        );
        doc.add_to_part(&part, &cube).unwrap();
        doc.add_to_part(&part, &other).unwrap();
        doc.recompute().unwrap();
        assert_eq!(part, "Bracket");

        let nodes = plan(&doc, &[part.as_str()], true).unwrap();
        let labels: Vec<_> = nodes.iter().flat_map(ShapeNode::labels).collect();
        assert_eq!(labels, ["Bracket", "Other"], "labels: {labels:?}");
    }

    #[test]
    fn test_nested_containers_sharing_a_label() {
        let mut doc = Document::new("Naming");
        let outer = doc.add_part("Assembly");
        let inner = doc.add_part("Assembly");
        let left = doc.add_primitive("Left", Primitive::cuboid(1.0, 1.0, 1.0));
        let right = doc.add_primitive(
            "Right",
            Primitive::cuboid(1.0, 1.0, 1.0).at(DVec3::new(3.0, 0.0, 0.0)),
        );
        doc.add_to_part(&inner, &left).unwrap();
        doc.add_to_part(&inner, &right).unwrap();
        doc.add_to_part(&outer, &inner).unwrap();
        doc.recompute().unwrap();

        let nodes = plan(&doc, &[outer.as_str()], true).unwrap();
        let labels: Vec<_> = nodes.iter().flat_map(ShapeNode::labels).collect();
        assert_eq!(
            labels.iter().filter(|l| **l == "Assembly").count(),
            1,
            "labels: {labels:?}"
        );
        assert_eq!(nodes.iter().flat_map(ShapeNode::shape_labels).collect::<Vec<_>>(), [
            "Left", "Right"
        ]);
    }

    #[test]
    fn test_shapeless_objects_fail() {
        let mut doc = Document::new("Naming");
        let empty_body = doc.add_body("Empty");
        let body = body_with_pad(&mut doc, "Body");
        let empty_part = doc.add_part("Nothing");
        doc.recompute().unwrap();

        assert!(matches!(plan(&doc, &[], true), Err(InterchangeError::EmptyExport)));
        assert!(matches!(
            plan(&doc, &[empty_body.as_str()], true),
            Err(InterchangeError::NoShape(_))
        ));
        assert!(matches!(
            plan(&doc, &[empty_part.as_str()], true),
            Err(InterchangeError::NoShape(_))
        ));
        assert!(matches!(
            plan(&doc, &["Sketch"], true),
            Err(InterchangeError::NoShape(_))
        ));
        assert!(matches!(
            plan(&doc, &["Missing"], true),
            Err(InterchangeError::Naming(_))
        ));
        assert_eq!(plan(&doc, &[body.as_str(), "Pad"], true).unwrap().len(), 2);
    }

    #[test]
    fn test_empty_label_falls_back_to_name() {
        let mut doc = Document::new("Naming");
        let cube = doc.add_primitive("Cube", Primitive::cuboid(1.0, 1.0, 1.0));
        doc.set_label(&cube, "").unwrap();
        doc.recompute().unwrap();

        let nodes = plan(&doc, &[cube.as_str()], true).unwrap();
        assert_eq!(nodes[0].label(), "Cube");
    }
}
