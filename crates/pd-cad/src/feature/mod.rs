//! Feature Operations
//!
//! Parametric features that turn sketches and earlier shapes into solids:
//! additive primitives, pads, edge blends and holes.

mod suppress;

pub use suppress::{SUPPRESSIBLE_EXTENSION, Suppressible, SuppressibleExtension};

use glam::{DVec2, DVec3};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::kernel::{
    BooleanType, CadKernel, DrillPoint, EdgeId, HoleCut, HoleDepth, HoleGeometry, Solid,
};
use crate::sketch::Sketch;

/// Feature-related errors
#[derive(Debug, Clone, Error)]
pub enum FeatureError {
    #[error("Sketch error: {0}")]
    SketchError(#[from] crate::sketch::SketchError),

    #[error("CAD kernel error: {0}")]
    CadError(#[from] crate::kernel::CadError),

    #[error("Invalid feature: {0}")]
    InvalidFeature(String),

    #[error("Feature not found: {0}")]
    FeatureNotFound(String),

    #[error("Sketch not found: {0}")]
    SketchNotFound(String),

    #[error("{0} has no input shape")]
    MissingInput(String),

    #[error("{feature} depends on {dependency}")]
    Dependency { feature: String, dependency: String },

    #[error("Rebuild failed: {0}")]
    RebuildFailed(String),
}

/// Result type for feature operations
pub type FeatureResult<T> = Result<T, FeatureError>;

/// Reference to sub-elements of another feature's shape
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShapeRef {
    /// Name of the feature whose shape is referenced
    pub feature: String,
    /// Sub-element names such as `Edge1`
    pub sub: Vec<String>,
}

impl ShapeRef {
    pub fn new(feature: impl Into<String>, sub: &[&str]) -> Self {
        Self {
            feature: feature.into(),
            sub: sub.iter().map(|s| s.to_string()).collect(),
        }
    }

    /// Parse the referenced sub-elements as edges
    pub fn edges(&self) -> FeatureResult<Vec<EdgeId>> {
        self.sub
            .iter()
            .map(|name| EdgeId::from_name(name).map_err(FeatureError::from))
            .collect()
    }
}

/// Hole parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HoleParams {
    /// Sketch whose circles mark the hole positions
    pub profile: String,
    pub diameter: f64,
    pub depth: HoleDepth,
    pub drill_point: DrillPoint,
    /// Wall angle in degrees, 90 is straight
    #[serde(default)]
    pub taper_angle: Option<f64>,
    pub cut: HoleCut,
}

impl HoleParams {
    /// A straight, flat-bottomed hole of the given diameter and depth
    pub fn new(profile: impl Into<String>, diameter: f64, depth: f64) -> Self {
        Self {
            profile: profile.into(),
            diameter,
            depth: HoleDepth::Dimension(depth),
            drill_point: DrillPoint::Flat,
            taper_angle: None,
            cut: HoleCut::None,
        }
    }
}

/// The geometry-producing part of a feature
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum FeatureKind {
    /// Box added to the body
    AdditiveBox {
        length: f64,
        width: f64,
        height: f64,
        /// Corner of the box
        placement: DVec3,
    },

    /// Extrude a sketch profile
    Pad {
        /// Reference to the sketch
        profile: String,
        /// Extrusion distance
        length: f64,
        /// Extrude against the sketch normal
        reversed: bool,
    },

    /// Fillet edges of a base feature
    Fillet { base: ShapeRef, radius: f64 },

    /// Chamfer edges of a base feature
    Chamfer { base: ShapeRef, size: f64 },

    /// Drill holes at the circles of a sketch
    Hole(HoleParams),
}

impl FeatureKind {
    /// Get the type name of this feature
    pub fn type_name(&self) -> &'static str {
        match self {
            FeatureKind::AdditiveBox { .. } => "PartDesign::AdditiveBox",
            FeatureKind::Pad { .. } => "PartDesign::Pad",
            FeatureKind::Fillet { .. } => "PartDesign::Fillet",
            FeatureKind::Chamfer { .. } => "PartDesign::Chamfer",
            FeatureKind::Hole(_) => "PartDesign::Hole",
        }
    }
}

/// A parametric feature inside a body
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Feature {
    /// Internal name, unique within the document
    pub name: String,
    /// User-visible label
    pub label: String,
    /// Suppression capability
    #[serde(default)]
    pub(crate) suppressible: Option<SuppressibleExtension>,
    pub kind: FeatureKind,
}

impl Suppressible for Feature {
    fn suppressible(&self) -> Option<&SuppressibleExtension> {
        self.suppressible.as_ref()
    }
}

impl Feature {
    /// Create a feature; the label starts out equal to the name
    pub fn new(name: impl Into<String>, kind: FeatureKind) -> Self {
        let name = name.into();
        Self {
            label: name.clone(),
            name,
            suppressible: Some(SuppressibleExtension::default()),
            kind,
        }
    }

    /// Create an additive box feature
    pub fn additive_box(name: impl Into<String>, length: f64, width: f64, height: f64) -> Self {
        Self::new(
            name,
            FeatureKind::AdditiveBox {
                length,
                width,
                height,
                placement: DVec3::ZERO,
            },
        )
    }

    /// Create a pad feature
    pub fn pad(name: impl Into<String>, profile: impl Into<String>, length: f64) -> Self {
        Self::new(
            name,
            FeatureKind::Pad {
                profile: profile.into(),
                length,
                reversed: false,
            },
        )
    }

    /// Create a fillet feature
    pub fn fillet(name: impl Into<String>, base: ShapeRef, radius: f64) -> Self {
        Self::new(name, FeatureKind::Fillet { base, radius })
    }

    /// Create a chamfer feature
    pub fn chamfer(name: impl Into<String>, base: ShapeRef, size: f64) -> Self {
        Self::new(name, FeatureKind::Chamfer { base, size })
    }

    /// Create a hole feature
    pub fn hole(name: impl Into<String>, params: HoleParams) -> Self {
        Self::new(name, FeatureKind::Hole(params))
    }

    /// Set the suppression flag without any dependency check
    ///
    /// Returns false when the feature lacks the capability.
    pub(crate) fn set_suppressed_flag(&mut self, value: bool) -> bool {
        match self.suppressible.as_mut() {
            Some(ext) => {
                ext.suppressed = value;
                true
            }
            None => false,
        }
    }

    /// Get the type name of this feature
    pub fn type_name(&self) -> &'static str {
        self.kind.type_name()
    }

    /// Extension type names attached to this feature
    pub fn extensions(&self) -> Vec<&'static str> {
        self.suppressible
            .map(|_| SUPPRESSIBLE_EXTENSION)
            .into_iter()
            .collect()
    }

    /// Sketch consumed by this feature, if any
    pub fn profile_sketch(&self) -> Option<&str> {
        match &self.kind {
            FeatureKind::Pad { profile, .. } => Some(profile),
            FeatureKind::Hole(params) => Some(&params.profile),
            _ => None,
        }
    }

    /// Feature whose shape this one modifies, when it is not the previous one
    pub fn base_feature(&self) -> Option<&str> {
        match &self.kind {
            FeatureKind::Fillet { base, .. } | FeatureKind::Chamfer { base, .. } => {
                Some(&base.feature)
            }
            _ => None,
        }
    }

    /// Whether the feature cannot produce a shape without an input shape
    pub fn requires_input(&self) -> bool {
        matches!(
            self.kind,
            FeatureKind::Fillet { .. } | FeatureKind::Chamfer { .. } | FeatureKind::Hole(_)
        )
    }

    fn find_sketch<'a>(sketches: &'a [Sketch], name: &str) -> FeatureResult<&'a Sketch> {
        sketches
            .iter()
            .find(|s| s.name == name)
            .ok_or_else(|| FeatureError::SketchNotFound(name.to_string()))
    }

    /// Execute this feature to produce a solid
    ///
    /// `input` is the shape this feature builds on: the base feature's shape
    /// for dress-ups, the previous feature's shape otherwise. A suppressed
    /// feature returns its input unchanged.
    pub fn execute(
        &self,
        kernel: &dyn CadKernel,
        sketches: &[Sketch],
        input: Option<&Solid>,
    ) -> FeatureResult<Option<Solid>> {
        if self.is_suppressed() {
            return Ok(input.cloned());
        }

        let solid = match &self.kind {
            FeatureKind::AdditiveBox {
                length,
                width,
                height,
                placement,
            } => {
                let tool = kernel.create_box(*placement, DVec3::new(*length, *width, *height))?;
                Self::fuse(kernel, input, tool)?
            }

            FeatureKind::Pad {
                profile,
                length,
                reversed,
            } => {
                let sketch = Self::find_sketch(sketches, profile)?;
                let profiles = sketch.extract_profiles()?;
                if profiles.is_empty() {
                    return Err(FeatureError::InvalidFeature(format!(
                        "{}: sketch {} has no closed profiles",
                        self.name, profile
                    )));
                }

                let distance = if *reversed { -*length } else { *length };
                let mut result = input.cloned();
                for profile in &profiles {
                    let tool = kernel.extrude(profile, &sketch.plane, distance)?;
                    result = Some(Self::fuse(kernel, result.as_ref(), tool)?);
                }
                result.ok_or_else(|| {
                    FeatureError::InvalidFeature(format!("{} produced no shape", self.name))
                })?
            }

            FeatureKind::Fillet { base, radius } => {
                let input = input.ok_or_else(|| FeatureError::MissingInput(self.name.clone()))?;
                kernel.fillet(input, &base.edges()?, *radius)?
            }

            FeatureKind::Chamfer { base, size } => {
                let input = input.ok_or_else(|| FeatureError::MissingInput(self.name.clone()))?;
                kernel.chamfer(input, &base.edges()?, *size)?
            }

            FeatureKind::Hole(params) => {
                let input = input.ok_or_else(|| FeatureError::MissingInput(self.name.clone()))?;
                let sketch = Self::find_sketch(sketches, &params.profile)?;
                let centers: Vec<DVec2> = sketch.circles().into_iter().map(|(c, _)| c).collect();
                let geometry = HoleGeometry {
                    plane: sketch.plane,
                    centers,
                    diameter: params.diameter,
                    depth: params.depth,
                    drill_point: params.drill_point,
                    taper_angle: params.taper_angle,
                    cut: params.cut,
                };
                kernel.drill(input, &geometry)?
            }
        };

        Ok(Some(solid))
    }

    fn fuse(kernel: &dyn CadKernel, input: Option<&Solid>, tool: Solid) -> FeatureResult<Solid> {
        match input {
            Some(base) => Ok(kernel.boolean(base, &tool, BooleanType::Union)?),
            None => Ok(tool),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kernel::{AnalyticKernel, Plane};
    use approx::assert_relative_eq;

    fn square_sketch() -> Sketch {
        let mut sketch = Sketch::new("Sketch", Plane::xy());
        sketch
            .add_rectangle(DVec2::ZERO, DVec2::new(10.0, 10.0))
            .unwrap();
        sketch
    }

    #[test]
    fn test_type_names() {
        let pad = Feature::pad("Pad", "Sketch", 10.0);
        assert_eq!(pad.type_name(), "PartDesign::Pad");
        assert_eq!(pad.profile_sketch(), Some("Sketch"));
        assert_eq!(pad.extensions(), vec![SUPPRESSIBLE_EXTENSION]);

        let fillet = Feature::fillet("Fillet", ShapeRef::new("Pad", &["Edge1"]), 1.0);
        assert_eq!(fillet.type_name(), "PartDesign::Fillet");
        assert_eq!(fillet.base_feature(), Some("Pad"));
        assert!(fillet.requires_input());
        assert!(!pad.requires_input());
    }

    #[test]
    fn test_pad_execute() {
        let kernel = AnalyticKernel::new();
        let pad = Feature::pad("Pad", "Sketch", 10.0);
        let solid = pad
            .execute(&kernel, &[square_sketch()], None)
            .unwrap()
            .unwrap();
        assert_relative_eq!(solid.volume, 1000.0);
        assert_eq!(solid.face_count(), 6);
    }

    #[test]
    fn test_pad_missing_sketch() {
        let kernel = AnalyticKernel::new();
        let pad = Feature::pad("Pad", "Nowhere", 10.0);
        assert!(matches!(
            pad.execute(&kernel, &[], None),
            Err(FeatureError::SketchNotFound(_))
        ));
    }

    #[test]
    fn test_suppressed_passes_input_through() {
        let kernel = AnalyticKernel::new();
        let base = kernel
            .create_box(DVec3::ZERO, DVec3::splat(10.0))
            .unwrap();
        let mut fillet = Feature::fillet("Fillet", ShapeRef::new("Pad", &["Edge1"]), 1.0);

        let active = fillet.execute(&kernel, &[], Some(&base)).unwrap().unwrap();
        assert!(active.volume < base.volume);

        assert!(fillet.set_suppressed_flag(true));
        let passed = fillet.execute(&kernel, &[], Some(&base)).unwrap().unwrap();
        assert_eq!(passed, base);

        assert_eq!(fillet.execute(&kernel, &[], None).unwrap(), None);
    }

    #[test]
    fn test_dressup_requires_input() {
        let kernel = AnalyticKernel::new();
        let chamfer = Feature::chamfer("Chamfer", ShapeRef::new("Pad", &["Edge2"]), 0.5);
        assert!(matches!(
            chamfer.execute(&kernel, &[], None),
            Err(FeatureError::MissingInput(_))
        ));
    }

    #[test]
    fn test_bad_sub_element() {
        let kernel = AnalyticKernel::new();
        let base = kernel
            .create_box(DVec3::ZERO, DVec3::splat(10.0))
            .unwrap();
        let fillet = Feature::fillet("Fillet", ShapeRef::new("Pad", &["Face1"]), 1.0);
        assert!(matches!(
            fillet.execute(&kernel, &[], Some(&base)),
            Err(FeatureError::CadError(_))
        ));
    }

    #[test]
    fn test_hole_from_sketch_circles() {
        let kernel = AnalyticKernel::new();
        let base = kernel
            .create_box(DVec3::ZERO, DVec3::splat(10.0))
            .unwrap();
        let mut sketch = Sketch::new("HoleSketch", Plane::xy().offset(10.0));
        sketch.add_circle(DVec2::new(5.0, 5.0), 1.0).unwrap();

        let hole = Feature::hole("Hole", HoleParams::new("HoleSketch", 6.0, 10.0));
        let drilled = hole
            .execute(&kernel, &[sketch], Some(&base))
            .unwrap()
            .unwrap();
        assert_relative_eq!(drilled.volume, 1000.0 - 90.0 * std::f64::consts::PI, epsilon = 1e-9);
    }
}
