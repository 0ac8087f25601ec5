//! 2D Sketch System
//!
//! Sketches hold lines and circles on a [`Plane`], together with the
//! constraints between them. Closed loops of lines and full circles become
//! the profiles consumed by pads and holes.

mod constraint;

pub use constraint::{CONSTRAINT_TOLERANCE, SketchConstraint, VertexRef};

use glam::DVec2;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::kernel::{Plane, Profile};

/// Sketch-related errors
#[derive(Debug, Clone, Error)]
pub enum SketchError {
    #[error("Invalid entity reference: {0}")]
    InvalidReference(String),

    #[error("Open profile: {0}")]
    OpenProfile(String),

    #[error("Constraint {index} ({kind}) is not satisfied (error {residual:.3e})")]
    Unsatisfied {
        index: usize,
        kind: &'static str,
        residual: f64,
    },

    #[error("Invalid geometry: {0}")]
    InvalidGeometry(String),
}

/// Result type for sketch operations
pub type SketchResult<T> = Result<T, SketchError>;

/// Which point of an entity a constraint refers to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PointPos {
    Start,
    End,
    Center,
}

/// Geometry stored in a sketch
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum SketchEntity {
    /// Line segment
    Line {
        start: DVec2,
        end: DVec2,
        #[serde(default)]
        construction: bool,
    },
    /// Full circle
    Circle {
        center: DVec2,
        radius: f64,
        #[serde(default)]
        construction: bool,
    },
}

impl SketchEntity {
    /// Create a line segment
    pub fn line(start: DVec2, end: DVec2) -> Self {
        SketchEntity::Line {
            start,
            end,
            construction: false,
        }
    }

    /// Create a circle
    pub fn circle(center: DVec2, radius: f64) -> Self {
        SketchEntity::Circle {
            center,
            radius,
            construction: false,
        }
    }

    /// Construction geometry never contributes to profiles
    pub fn is_construction(&self) -> bool {
        match self {
            SketchEntity::Line { construction, .. } | SketchEntity::Circle { construction, .. } => {
                *construction
            }
        }
    }

    /// Get a point of this entity
    pub fn point(&self, pos: PointPos) -> Option<DVec2> {
        match (self, pos) {
            (SketchEntity::Line { start, .. }, PointPos::Start) => Some(*start),
            (SketchEntity::Line { end, .. }, PointPos::End) => Some(*end),
            (SketchEntity::Line { start, end, .. }, PointPos::Center) => {
                Some((*start + *end) * 0.5)
            }
            (SketchEntity::Circle { center, .. }, PointPos::Center) => Some(*center),
            (SketchEntity::Circle { .. }, _) => None,
        }
    }
}

/// A 2D sketch attached to a plane
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Sketch {
    /// Internal name, unique within the document
    pub name: String,
    /// User-visible label
    pub label: String,
    /// Placement of the sketch
    pub plane: Plane,
    entities: Vec<SketchEntity>,
    constraints: Vec<SketchConstraint>,
}

impl Sketch {
    /// Create a new empty sketch
    pub fn new(name: impl Into<String>, plane: Plane) -> Self {
        let name = name.into();
        Self {
            label: name.clone(),
            name,
            plane,
            entities: Vec::new(),
            constraints: Vec::new(),
        }
    }

    /// All entities in creation order
    pub fn entities(&self) -> &[SketchEntity] {
        &self.entities
    }

    /// All constraints in creation order
    pub fn constraints(&self) -> &[SketchConstraint] {
        &self.constraints
    }

    // ============== Geometry ==============

    /// Add an entity and return its index
    pub fn add_entity(&mut self, entity: SketchEntity) -> usize {
        self.entities.push(entity);
        self.entities.len() - 1
    }

    /// Add a line segment
    pub fn add_line(&mut self, start: DVec2, end: DVec2) -> usize {
        self.add_entity(SketchEntity::line(start, end))
    }

    /// Add a circle
    pub fn add_circle(&mut self, center: DVec2, radius: f64) -> SketchResult<usize> {
        if !(radius > 0.0) {
            return Err(SketchError::InvalidGeometry(format!(
                "circle radius must be positive, got {radius}"
            )));
        }
        Ok(self.add_entity(SketchEntity::circle(center, radius)))
    }

    /// Add an axis-aligned rectangle as four constrained lines
    pub fn add_rectangle(&mut self, a: DVec2, b: DVec2) -> SketchResult<[usize; 4]> {
        let (min, max) = (a.min(b), a.max(b));
        if (max - min).min_element() <= 0.0 {
            return Err(SketchError::InvalidGeometry(
                "rectangle has zero area".into(),
            ));
        }
        let points = [
            min,
            DVec2::new(max.x, min.y),
            max,
            DVec2::new(min.x, max.y),
        ];

        let lines: [usize; 4] =
            std::array::from_fn(|i| self.add_line(points[i], points[(i + 1) % 4]));
        for i in 0..4 {
            self.constraints.push(SketchConstraint::coincident(
                VertexRef::new(lines[i], PointPos::End),
                VertexRef::new(lines[(i + 1) % 4], PointPos::Start),
            ));
        }
        self.constraints.push(SketchConstraint::horizontal(lines[0]));
        self.constraints.push(SketchConstraint::horizontal(lines[2]));
        self.constraints.push(SketchConstraint::vertical(lines[1]));
        self.constraints.push(SketchConstraint::vertical(lines[3]));
        Ok(lines)
    }

    /// Mark an entity as construction geometry
    pub fn set_construction(&mut self, index: usize, value: bool) -> SketchResult<()> {
        match self.entities.get_mut(index) {
            Some(
                SketchEntity::Line { construction, .. }
                | SketchEntity::Circle { construction, .. },
            ) => {
                *construction = value;
                Ok(())
            }
            None => Err(SketchError::InvalidReference(format!("entity {index}"))),
        }
    }

    // ============== Constraints ==============

    /// Add a constraint after validating its references
    pub fn add_constraint(&mut self, constraint: SketchConstraint) -> SketchResult<usize> {
        if constraint.residual(&self.entities).is_none() {
            return Err(SketchError::InvalidReference(format!(
                "{} constraint references {:?}",
                constraint.type_name(),
                constraint.entities()
            )));
        }
        self.constraints.push(constraint);
        Ok(self.constraints.len() - 1)
    }

    /// Verify that every constraint holds for the current geometry
    pub fn check_constraints(&self) -> SketchResult<()> {
        for (index, constraint) in self.constraints.iter().enumerate() {
            let residual = constraint.residual(&self.entities).ok_or_else(|| {
                SketchError::InvalidReference(format!(
                    "constraint {index} ({})",
                    constraint.type_name()
                ))
            })?;
            if residual > CONSTRAINT_TOLERANCE {
                return Err(SketchError::Unsatisfied {
                    index,
                    kind: constraint.type_name(),
                    residual,
                });
            }
        }
        Ok(())
    }

    // ============== Profiles ==============

    /// Non-construction circles as (center, radius)
    pub fn circles(&self) -> Vec<(DVec2, f64)> {
        self.entities
            .iter()
            .filter(|e| !e.is_construction())
            .filter_map(|e| match e {
                SketchEntity::Circle { center, radius, .. } => Some((*center, *radius)),
                _ => None,
            })
            .collect()
    }

    /// Extract closed profiles: every circle, then every closed chain of lines
    pub fn extract_profiles(&self) -> SketchResult<Vec<Profile>> {
        let mut profiles: Vec<Profile> = self
            .circles()
            .into_iter()
            .map(|(center, radius)| Profile::circle(center, radius))
            .collect();

        let mut segments: Vec<(DVec2, DVec2)> = self
            .entities
            .iter()
            .filter(|e| !e.is_construction())
            .filter_map(|e| match e {
                SketchEntity::Line { start, end, .. } => Some((*start, *end)),
                _ => None,
            })
            .collect();

        let close = |a: DVec2, b: DVec2| a.distance(b) <= CONSTRAINT_TOLERANCE;

        while let Some((first, mut cursor)) = segments.pop() {
            let mut points = vec![first];
            while !close(cursor, first) {
                let next = segments
                    .iter()
                    .position(|(s, e)| close(*s, cursor) || close(*e, cursor))
                    .ok_or_else(|| {
                        SketchError::OpenProfile(format!(
                            "{}: chain ends at ({}, {})",
                            self.name, cursor.x, cursor.y
                        ))
                    })?;
                let (s, e) = segments.swap_remove(next);
                points.push(cursor);
                cursor = if close(s, cursor) { e } else { s };
            }
            if points.len() < 3 {
                return Err(SketchError::OpenProfile(format!(
                    "{}: loop with {} segments",
                    self.name,
                    points.len()
                )));
            }
            profiles.push(Profile::Polygon { points });
        }

        Ok(profiles)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_rectangle_profile() {
        let mut sketch = Sketch::new("Sketch", Plane::xy());
        sketch
            .add_rectangle(DVec2::new(0.0, 0.0), DVec2::new(10.0, 10.0))
            .unwrap();

        assert_eq!(sketch.entities().len(), 4);
        assert_eq!(sketch.constraints().len(), 8);
        sketch.check_constraints().unwrap();

        let profiles = sketch.extract_profiles().unwrap();
        assert_eq!(profiles.len(), 1);
        assert!(profiles[0].is_axis_rectangle());
        assert_relative_eq!(profiles[0].area(), 100.0);
    }

    #[test]
    fn test_reversed_segments_still_close() {
        let mut sketch = Sketch::new("Sketch", Plane::xy());
        sketch.add_line(DVec2::new(0.0, 0.0), DVec2::new(4.0, 0.0));
        sketch.add_line(DVec2::new(0.0, 3.0), DVec2::new(4.0, 0.0));
        sketch.add_line(DVec2::new(0.0, 3.0), DVec2::new(0.0, 0.0));

        let profiles = sketch.extract_profiles().unwrap();
        assert_eq!(profiles.len(), 1);
        assert_relative_eq!(profiles[0].area(), 6.0);
    }

    #[test]
    fn test_open_profile() {
        let mut sketch = Sketch::new("Sketch", Plane::xy());
        sketch.add_line(DVec2::new(0.0, 0.0), DVec2::new(4.0, 0.0));
        sketch.add_line(DVec2::new(4.0, 0.0), DVec2::new(4.0, 3.0));

        assert!(matches!(
            sketch.extract_profiles(),
            Err(SketchError::OpenProfile(_))
        ));
    }

    #[test]
    fn test_construction_geometry_ignored() {
        let mut sketch = Sketch::new("Sketch", Plane::xy());
        let axis = sketch.add_line(DVec2::new(-5.0, 0.0), DVec2::new(5.0, 0.0));
        sketch.set_construction(axis, true).unwrap();
        sketch.add_circle(DVec2::new(5.0, 5.0), 3.0).unwrap();

        let profiles = sketch.extract_profiles().unwrap();
        assert_eq!(profiles.len(), 1);
        assert_eq!(sketch.circles(), vec![(DVec2::new(5.0, 5.0), 3.0)]);
        assert!(sketch.set_construction(9, true).is_err());
    }

    #[test]
    fn test_constraint_checks() {
        let mut sketch = Sketch::new("Sketch", Plane::xy());
        let line = sketch.add_line(DVec2::new(0.0, 0.0), DVec2::new(4.0, 1.0));
        let circle = sketch.add_circle(DVec2::ZERO, 2.0).unwrap();

        assert!(sketch.add_constraint(SketchConstraint::horizontal(circle)).is_err());
        sketch
            .add_constraint(SketchConstraint::radius(circle, 2.0))
            .unwrap();
        sketch.check_constraints().unwrap();

        sketch
            .add_constraint(SketchConstraint::horizontal(line))
            .unwrap();
        assert!(matches!(
            sketch.check_constraints(),
            Err(SketchError::Unsatisfied { index: 1, .. })
        ));
    }

    #[test]
    fn test_invalid_circle() {
        let mut sketch = Sketch::new("Sketch", Plane::xy());
        assert!(sketch.add_circle(DVec2::ZERO, 0.0).is_err());
    }
}
