//! Object type hierarchy
//!
//! Type identifiers form a single-inheritance tree rooted at
//! `App::DocumentObject`, used for `is_derived_from` queries.

use crate::constants::*;

/// Direct parent of a type in the hierarchy
fn parent_type(type_id: &str) -> Option<&'static str> {
    match type_id {
        TYPE_DOCUMENT_OBJECT => None,
        TYPE_GEO_FEATURE => Some(TYPE_DOCUMENT_OBJECT),
        TYPE_CONTAINER | TYPE_PART_FEATURE => Some(TYPE_GEO_FEATURE),
        TYPE_PRIMITIVE | TYPE_BODY_BASE | "PartDesign::Feature" | "Part::Part2DObject" => {
            Some(TYPE_PART_FEATURE)
        }
        TYPE_BOX | TYPE_SPHERE | TYPE_CYLINDER => Some(TYPE_PRIMITIVE),
        TYPE_BODY => Some(TYPE_BODY_BASE),
        TYPE_SKETCH => Some("Part::Part2DObject"),
        "PartDesign::FeatureAddSub" | "PartDesign::DressUp" => Some("PartDesign::Feature"),
        "PartDesign::FeatureAdditive" | "PartDesign::FeatureSubtractive" => {
            Some("PartDesign::FeatureAddSub")
        }
        "PartDesign::AdditiveBox" | "PartDesign::Pad" => Some("PartDesign::FeatureAdditive"),
        "PartDesign::Hole" => Some("PartDesign::FeatureSubtractive"),
        "PartDesign::Fillet" | "PartDesign::Chamfer" => Some("PartDesign::DressUp"),
        _ => Some(TYPE_DOCUMENT_OBJECT),
    }
}

/// Check whether `type_id` is `base` or inherits from it
pub fn is_derived_from(type_id: &str, base: &str) -> bool {
    let mut current = Some(type_id);
    while let Some(t) = current {
        if t == base {
            return true;
        }
        current = parent_type(t);
    }
    false
}
