//! Sketch Constraints
//!
//! Geometric and dimensional constraints that can be applied to sketch
//! entities. Constraints are stored and verified; they are not solved.

use serde::{Deserialize, Serialize};

use super::{PointPos, SketchEntity};

/// Tolerance used when checking whether a constraint is satisfied
pub const CONSTRAINT_TOLERANCE: f64 = 1e-6;

/// A point on a sketch entity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct VertexRef {
    /// Index of the entity in the sketch
    pub entity: usize,
    /// Which point of the entity
    pub pos: PointPos,
}

impl VertexRef {
    pub fn new(entity: usize, pos: PointPos) -> Self {
        Self { entity, pos }
    }
}

/// A constraint between sketch entities
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum SketchConstraint {
    // ============== Geometric Constraints ==============
    /// Two points are at the same location
    Coincident { first: VertexRef, second: VertexRef },

    /// A line is horizontal (parallel to the sketch X axis)
    Horizontal { line: usize },

    /// A line is vertical (parallel to the sketch Y axis)
    Vertical { line: usize },

    /// A point is at a fixed position
    Fixed { point: VertexRef, x: f64, y: f64 },

    // ============== Dimensional Constraints ==============
    /// Radius of a circle
    Radius { circle: usize, value: f64 },
}

impl SketchConstraint {
    /// Create a coincident constraint
    pub fn coincident(first: VertexRef, second: VertexRef) -> Self {
        SketchConstraint::Coincident { first, second }
    }

    /// Create a horizontal constraint
    pub fn horizontal(line: usize) -> Self {
        SketchConstraint::Horizontal { line }
    }

    /// Create a vertical constraint
    pub fn vertical(line: usize) -> Self {
        SketchConstraint::Vertical { line }
    }

    /// Create a fixed-point constraint
    pub fn fixed(point: VertexRef, x: f64, y: f64) -> Self {
        SketchConstraint::Fixed { point, x, y }
    }

    /// Create a radius constraint
    pub fn radius(circle: usize, value: f64) -> Self {
        SketchConstraint::Radius { circle, value }
    }

    /// Get the type name of this constraint
    pub fn type_name(&self) -> &'static str {
        match self {
            SketchConstraint::Coincident { .. } => "Coincident",
            SketchConstraint::Horizontal { .. } => "Horizontal",
            SketchConstraint::Vertical { .. } => "Vertical",
            SketchConstraint::Fixed { .. } => "Fixed",
            SketchConstraint::Radius { .. } => "Radius",
        }
    }

    /// Indices of all entities this constraint references
    pub fn entities(&self) -> Vec<usize> {
        match self {
            SketchConstraint::Coincident { first, second } => vec![first.entity, second.entity],
            SketchConstraint::Horizontal { line } | SketchConstraint::Vertical { line } => {
                vec![*line]
            }
            SketchConstraint::Fixed { point, .. } => vec![point.entity],
            SketchConstraint::Radius { circle, .. } => vec![*circle],
        }
    }

    /// Check if this constraint references an entity
    pub fn references_entity(&self, entity: usize) -> bool {
        self.entities().contains(&entity)
    }

    /// Check if this is a dimensional constraint
    pub fn is_dimensional(&self) -> bool {
        matches!(self, SketchConstraint::Radius { .. })
    }

    /// Get the value of a dimensional constraint
    pub fn value(&self) -> Option<f64> {
        match self {
            SketchConstraint::Radius { value, .. } => Some(*value),
            _ => None,
        }
    }

    /// Error of this constraint against the current geometry
    ///
    /// Returns `None` when a referenced entity or point does not exist or has
    /// the wrong kind.
    pub fn residual(&self, entities: &[SketchEntity]) -> Option<f64> {
        let point = |v: &VertexRef| entities.get(v.entity)?.point(v.pos);
        let line = |index: usize| match entities.get(index)? {
            SketchEntity::Line { start, end, .. } => Some(*end - *start),
            _ => None,
        };

        match self {
            SketchConstraint::Coincident { first, second } => {
                Some(point(first)?.distance(point(second)?))
            }
            SketchConstraint::Horizontal { line: index } => Some(line(*index)?.y.abs()),
            SketchConstraint::Vertical { line: index } => Some(line(*index)?.x.abs()),
            SketchConstraint::Fixed { point: v, x, y } => {
                let p = point(v)?;
                Some((p.x - x).hypot(p.y - y))
            }
            SketchConstraint::Radius { circle, value } => match entities.get(*circle)? {
                SketchEntity::Circle { radius, .. } => Some((radius - value).abs()),
                _ => None,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::DVec2;

    fn entities() -> Vec<SketchEntity> {
        vec![
            SketchEntity::line(DVec2::new(0.0, 0.0), DVec2::new(4.0, 0.0)),
            SketchEntity::line(DVec2::new(4.0, 0.0), DVec2::new(4.0, 3.0)),
            SketchEntity::circle(DVec2::new(1.0, 1.0), 0.5),
        ]
    }

    #[test]
    fn test_references() {
        let c = SketchConstraint::coincident(
            VertexRef::new(0, PointPos::End),
            VertexRef::new(1, PointPos::Start),
        );

        assert!(c.references_entity(0));
        assert!(c.references_entity(1));
        assert!(!c.references_entity(2));
        assert_eq!(c.type_name(), "Coincident");
    }

    #[test]
    fn test_dimensional() {
        let c = SketchConstraint::radius(2, 0.5);
        assert!(c.is_dimensional());
        assert_eq!(c.value(), Some(0.5));

        let c2 = SketchConstraint::horizontal(0);
        assert!(!c2.is_dimensional());
        assert_eq!(c2.value(), None);
    }

    #[test]
    fn test_residuals() {
        let entities = entities();
        assert_eq!(SketchConstraint::horizontal(0).residual(&entities), Some(0.0));
        assert_eq!(SketchConstraint::vertical(1).residual(&entities), Some(0.0));
        assert_eq!(SketchConstraint::horizontal(1).residual(&entities), Some(3.0));
        assert_eq!(SketchConstraint::radius(2, 1.0).residual(&entities), Some(0.5));
        assert_eq!(
            SketchConstraint::fixed(VertexRef::new(2, PointPos::Center), 1.0, 1.0)
                .residual(&entities),
            Some(0.0)
        );
    }

    #[test]
    fn test_residual_invalid_reference() {
        let entities = entities();
        assert_eq!(SketchConstraint::horizontal(2).residual(&entities), None);
        assert_eq!(SketchConstraint::radius(7, 1.0).residual(&entities), None);
        assert_eq!(
            SketchConstraint::coincident(
                VertexRef::new(0, PointPos::Center),
                VertexRef::new(1, PointPos::Start)
            )
            .residual(&entities),
            None
        );
    }
}
