//! CAD Kernel trait definitions
//!
//! These traits define the interface that all CAD kernels must implement,
//! together with the value types that cross the kernel boundary.

use std::f64::consts::PI;

use glam::{DVec2, DVec3};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

/// Linear tolerance used for geometric comparisons
pub const LINEAR_TOLERANCE: f64 = 1e-7;

/// Angular tolerance (radians) used to decide whether an edge is smooth
pub const ANGULAR_TOLERANCE: f64 = 1e-9;

fn parse_sub_element(name: &str, prefix: &str) -> CadResult<u32> {
    name.strip_prefix(prefix)
        .and_then(|n| n.parse::<u32>().ok())
        .filter(|n| *n > 0)
        .map(|n| n - 1)
        .ok_or_else(|| CadError::InvalidSubElement(name.to_string()))
}

/// Index of an edge within a solid
///
/// Edges are addressed by name as `Edge1`, `Edge2`, ... (1-based).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct EdgeId(pub u32);

impl EdgeId {
    /// Parse an `EdgeN` sub-element name
    pub fn from_name(name: &str) -> CadResult<Self> {
        parse_sub_element(name, "Edge").map(Self)
    }

    /// The `EdgeN` sub-element name of this edge
    pub fn name(&self) -> String {
        format!("Edge{}", self.0 + 1)
    }
}

/// Index of a face within a solid, addressed as `FaceN`
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct FaceId(pub u32);

impl FaceId {
    /// Parse a `FaceN` sub-element name
    pub fn from_name(name: &str) -> CadResult<Self> {
        parse_sub_element(name, "Face").map(Self)
    }

    /// The `FaceN` sub-element name of this face
    pub fn name(&self) -> String {
        format!("Face{}", self.0 + 1)
    }
}

/// Geometry of an edge
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum EdgeCurve {
    /// Straight segment
    Line { length: f64 },
    /// Full circle
    Circle { radius: f64 },
}

impl EdgeCurve {
    /// Length of the curve
    pub fn length(&self) -> f64 {
        match self {
            EdgeCurve::Line { length } => *length,
            EdgeCurve::Circle { radius } => 2.0 * PI * radius,
        }
    }
}

/// Information about an edge
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EdgeInfo {
    /// Position of this edge in the solid's edge list
    pub id: EdgeId,
    /// Underlying curve
    pub curve: EdgeCurve,
    /// Interior angle of the material between the two adjacent faces (radians)
    pub dihedral: f64,
    /// Whether the edge has been consumed by a fillet or chamfer
    pub blended: bool,
}

impl EdgeInfo {
    /// Create a new edge info
    pub fn new(id: EdgeId, curve: EdgeCurve, dihedral: f64) -> Self {
        Self {
            id,
            curve,
            dihedral,
            blended: false,
        }
    }

    /// Whether the adjacent faces meet at a real corner
    pub fn is_sharp(&self) -> bool {
        (PI - self.dihedral).abs() > ANGULAR_TOLERANCE
    }
}

/// Surface type of a face
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SurfaceKind {
    Plane,
    Cylinder,
    Cone,
    Sphere,
    Torus,
}

impl SurfaceKind {
    /// Upper-case keyword used by the interchange format
    pub fn keyword(&self) -> &'static str {
        match self {
            SurfaceKind::Plane => "PLANE",
            SurfaceKind::Cylinder => "CYLINDER",
            SurfaceKind::Cone => "CONE",
            SurfaceKind::Sphere => "SPHERE",
            SurfaceKind::Torus => "TORUS",
        }
    }

    /// Parse an interchange keyword
    pub fn from_keyword(keyword: &str) -> Option<Self> {
        match keyword {
            "PLANE" => Some(SurfaceKind::Plane),
            "CYLINDER" => Some(SurfaceKind::Cylinder),
            "CONE" => Some(SurfaceKind::Cone),
            "SPHERE" => Some(SurfaceKind::Sphere),
            "TORUS" => Some(SurfaceKind::Torus),
            _ => None,
        }
    }
}

/// Information about a face
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FaceInfo {
    /// Position of this face in the solid's face list
    pub id: FaceId,
    /// Surface type
    pub kind: SurfaceKind,
}

/// Error type for CAD kernel operations
#[derive(Debug, Clone, Error)]
pub enum CadError {
    #[error("Invalid profile: {0}")]
    InvalidProfile(String),

    #[error("Boolean operation failed: {0}")]
    BooleanFailed(String),

    #[error("Kernel not available: {0}")]
    KernelNotAvailable(String),

    #[error("Operation failed: {0}")]
    OperationFailed(String),

    #[error("Invalid sub-element name: {0}")]
    InvalidSubElement(String),

    #[error("Sub-element not found: {0}")]
    SubElementNotFound(String),

    #[error("Degenerate shape: {0}")]
    DegenerateShape(String),
}

/// Result type for CAD operations
pub type CadResult<T> = Result<T, CadError>;

/// Axis-aligned bounding box
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Aabb {
    pub min: DVec3,
    pub max: DVec3,
}

impl Aabb {
    /// Create a box from two corners (in any order)
    pub fn new(a: DVec3, b: DVec3) -> Self {
        Self {
            min: a.min(b),
            max: a.max(b),
        }
    }

    /// Smallest box containing all points
    pub fn from_points(points: impl IntoIterator<Item = DVec3>) -> Option<Self> {
        let mut iter = points.into_iter();
        let first = iter.next()?;
        Some(iter.fold(Self::new(first, first), |acc, p| Self {
            min: acc.min.min(p),
            max: acc.max.max(p),
        }))
    }

    /// Edge lengths along X, Y and Z
    pub fn size(&self) -> DVec3 {
        self.max - self.min
    }

    /// Enclosed volume
    pub fn volume(&self) -> f64 {
        let s = self.size();
        s.x * s.y * s.z
    }

    /// Overlapping region, if the boxes overlap with non-zero volume
    pub fn intersection(&self, other: &Aabb) -> Option<Aabb> {
        let min = self.min.max(other.min);
        let max = self.max.min(other.max);
        let size = max - min;
        if size.min_element() <= LINEAR_TOLERANCE {
            return None;
        }
        Some(Aabb { min, max })
    }

    /// Smallest box containing both boxes
    pub fn union(&self, other: &Aabb) -> Aabb {
        Aabb {
            min: self.min.min(other.min),
            max: self.max.max(other.max),
        }
    }

    /// Whether `other` lies entirely inside this box
    pub fn contains(&self, other: &Aabb) -> bool {
        (other.min - self.min).min_element() >= -LINEAR_TOLERANCE
            && (self.max - other.max).min_element() >= -LINEAR_TOLERANCE
    }
}

/// Identify the coordinate axis a direction points along
///
/// Returns the axis index (0 = X, 1 = Y, 2 = Z) and the sign.
pub fn principal_axis(dir: DVec3) -> Option<(usize, f64)> {
    let dir = dir.normalize_or_zero();
    (0..3).find_map(|axis| {
        let component = dir[axis];
        ((component.abs() - 1.0).abs() < 1e-9).then(|| (axis, component.signum()))
    })
}

/// A plane with an orthonormal frame, used for sketches and extrusions
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Plane {
    pub origin: DVec3,
    pub x_axis: DVec3,
    pub y_axis: DVec3,
    pub normal: DVec3,
}

impl Plane {
    /// The XY plane through the origin
    pub fn xy() -> Self {
        Self {
            origin: DVec3::ZERO,
            x_axis: DVec3::X,
            y_axis: DVec3::Y,
            normal: DVec3::Z,
        }
    }

    /// The XZ plane through the origin
    pub fn xz() -> Self {
        Self {
            origin: DVec3::ZERO,
            x_axis: DVec3::X,
            y_axis: DVec3::Z,
            normal: DVec3::NEG_Y,
        }
    }

    /// The YZ plane through the origin
    pub fn yz() -> Self {
        Self {
            origin: DVec3::ZERO,
            x_axis: DVec3::Y,
            y_axis: DVec3::Z,
            normal: DVec3::X,
        }
    }

    /// Flip the plane normal, keeping the frame right-handed
    pub fn reversed(self) -> Self {
        Self {
            y_axis: -self.y_axis,
            normal: -self.normal,
            ..self
        }
    }

    /// Shift the plane along its normal
    pub fn offset(self, distance: f64) -> Self {
        Self {
            origin: self.origin + self.normal * distance,
            ..self
        }
    }

    /// Map a point in plane coordinates to world space
    pub fn to_world(&self, p: DVec2) -> DVec3 {
        self.origin + self.x_axis * p.x + self.y_axis * p.y
    }

    /// Whether the normal is parallel to a coordinate axis
    pub fn is_axis_aligned(&self) -> bool {
        principal_axis(self.normal).is_some()
    }
}

impl Default for Plane {
    fn default() -> Self {
        Self::xy()
    }
}

/// A closed 2D profile used for extrusions and holes
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Profile {
    /// Closed polygon (vertices in order, last connects to first)
    Polygon { points: Vec<DVec2> },
    /// Full circle
    Circle { center: DVec2, radius: f64 },
}

impl Profile {
    /// Axis-aligned rectangle spanning two corners
    pub fn rectangle(a: DVec2, b: DVec2) -> Self {
        let min = a.min(b);
        let max = a.max(b);
        Profile::Polygon {
            points: vec![
                min,
                DVec2::new(max.x, min.y),
                max,
                DVec2::new(min.x, max.y),
            ],
        }
    }

    /// Circle profile
    pub fn circle(center: DVec2, radius: f64) -> Self {
        Profile::Circle { center, radius }
    }

    fn signed_area(points: &[DVec2]) -> f64 {
        let n = points.len();
        (0..n)
            .map(|i| points[i].perp_dot(points[(i + 1) % n]))
            .sum::<f64>()
            * 0.5
    }

    /// Enclosed area
    pub fn area(&self) -> f64 {
        match self {
            Profile::Polygon { points } => Self::signed_area(points).abs(),
            Profile::Circle { radius, .. } => PI * radius * radius,
        }
    }

    /// Number of boundary edges (1 for a circle)
    pub fn edge_count(&self) -> usize {
        match self {
            Profile::Polygon { points } => points.len(),
            Profile::Circle { .. } => 1,
        }
    }

    /// Interior angle at every polygon vertex (empty for circles)
    pub fn interior_angles(&self) -> Vec<f64> {
        let Profile::Polygon { points } = self else {
            return Vec::new();
        };
        let n = points.len();
        let orientation = Self::signed_area(points).signum();
        (0..n)
            .map(|i| {
                let prev = points[(i + n - 1) % n];
                let cur = points[i];
                let next = points[(i + 1) % n];
                let d1 = cur - prev;
                let d2 = next - cur;
                let turn = d1.perp_dot(d2).atan2(d1.dot(d2)) * orientation;
                PI - turn
            })
            .collect()
    }

    /// Length of every polygon side (circumference for a circle)
    pub fn edge_lengths(&self) -> Vec<f64> {
        match self {
            Profile::Polygon { points } => {
                let n = points.len();
                (0..n)
                    .map(|i| points[i].distance(points[(i + 1) % n]))
                    .collect()
            }
            Profile::Circle { radius, .. } => vec![2.0 * PI * radius],
        }
    }

    /// Whether this is a rectangle with sides parallel to the plane axes
    pub fn is_axis_rectangle(&self) -> bool {
        let Profile::Polygon { points } = self else {
            return false;
        };
        points.len() == 4
            && (0..4).all(|i| {
                let d = points[(i + 1) % 4] - points[i];
                d.x.abs() < LINEAR_TOLERANCE || d.y.abs() < LINEAR_TOLERANCE
            })
    }

    /// World-space bounds of the profile placed on a plane
    pub fn world_bounds(&self, plane: &Plane) -> Option<Aabb> {
        match self {
            Profile::Polygon { points } => {
                Aabb::from_points(points.iter().map(|p| plane.to_world(*p)))
            }
            Profile::Circle { center, radius } => {
                let c = plane.to_world(*center);
                let extent = DVec3::new(
                    plane.x_axis.x.hypot(plane.y_axis.x),
                    plane.x_axis.y.hypot(plane.y_axis.y),
                    plane.x_axis.z.hypot(plane.y_axis.z),
                ) * *radius;
                Some(Aabb::new(c - extent, c + extent))
            }
        }
    }
}

/// A 3D solid with analytic mass properties and topology summary
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Solid {
    /// Unique identifier
    pub id: Uuid,
    /// Enclosed volume
    pub volume: f64,
    /// Faces in sub-element order
    pub faces: Vec<FaceInfo>,
    /// Edges in sub-element order
    pub edges: Vec<EdgeInfo>,
    /// Bounding box
    pub bounds: Aabb,
    /// Whether the solid is exactly its bounding box
    pub prismatic: bool,
}

impl Solid {
    /// Create a solid with no faces or edges yet
    pub fn new(volume: f64, bounds: Aabb) -> Self {
        Self {
            id: Uuid::new_v4(),
            volume,
            faces: Vec::new(),
            edges: Vec::new(),
            bounds,
            prismatic: false,
        }
    }

    /// Append a face of the given kind
    pub fn push_face(&mut self, kind: SurfaceKind) {
        let id = FaceId(self.faces.len() as u32);
        self.faces.push(FaceInfo { id, kind });
    }

    /// Append an edge
    pub fn push_edge(&mut self, curve: EdgeCurve, dihedral: f64) {
        let id = EdgeId(self.edges.len() as u32);
        self.edges.push(EdgeInfo::new(id, curve, dihedral));
    }

    /// Number of faces
    pub fn face_count(&self) -> usize {
        self.faces.len()
    }

    /// Number of edges
    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    /// Look up an edge by ID
    pub fn edge(&self, id: EdgeId) -> Option<&EdgeInfo> {
        self.edges.get(id.0 as usize)
    }

    /// Combine disjoint solids into one compound shape
    pub fn compound(solids: &[&Solid]) -> Option<Solid> {
        let bounds = solids
            .iter()
            .map(|s| s.bounds)
            .reduce(|a, b| a.union(&b))?;
        let mut compound = Solid::new(solids.iter().map(|s| s.volume).sum(), bounds);
        for solid in solids {
            for face in &solid.faces {
                compound.push_face(face.kind);
            }
            for edge in &solid.edges {
                compound.push_edge(edge.curve, edge.dihedral);
                if let Some(last) = compound.edges.last_mut() {
                    last.blended = edge.blended;
                }
            }
        }
        Some(compound)
    }

    /// A copy of this solid under a fresh ID
    pub fn duplicate(&self) -> Solid {
        Solid {
            id: Uuid::new_v4(),
            ..self.clone()
        }
    }
}

/// Boolean operation type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BooleanType {
    /// Union (add)
    Union,
    /// Subtraction (cut)
    Subtract,
    /// Intersection (common)
    Intersect,
}

/// How deep a hole goes
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum HoleDepth {
    /// Fixed depth measured from the sketch plane
    Dimension(f64),
    /// Through the whole solid
    ThroughAll,
}

/// Shape of the bottom of a blind hole
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum DrillPoint {
    Flat,
    /// Conical point; `angle` is the included angle in degrees.
    /// With `for_depth` the point is included in the hole depth.
    Angled { angle: f64, for_depth: bool },
}

/// Cut at the entry of a hole
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum HoleCut {
    None,
    Counterbore { diameter: f64, depth: f64 },
    /// `angle` is the included angle in degrees
    Countersink { diameter: f64, angle: f64 },
}

/// Everything the kernel needs to drill one or more holes
#[derive(Debug, Clone, PartialEq)]
pub struct HoleGeometry {
    /// Sketch plane; holes are drilled against its normal
    pub plane: Plane,
    /// Hole centres in plane coordinates
    pub centers: Vec<DVec2>,
    pub diameter: f64,
    pub depth: HoleDepth,
    pub drill_point: DrillPoint,
    /// Wall angle in degrees (90 = straight), if tapered
    pub taper_angle: Option<f64>,
    pub cut: HoleCut,
}

/// The main CAD kernel trait
///
/// Implementations of this trait provide the actual geometry operations.
pub trait CadKernel: Send + Sync {
    /// Get the name of this kernel
    fn name(&self) -> &str;

    /// Check if the kernel is available
    fn is_available(&self) -> bool;

    /// Create a box primitive spanning `origin..origin + size`
    fn create_box(&self, origin: DVec3, size: DVec3) -> CadResult<Solid>;

    /// Create a cylinder primitive standing on `base` along +Z
    fn create_cylinder(&self, base: DVec3, radius: f64, height: f64) -> CadResult<Solid>;

    /// Create a sphere primitive
    fn create_sphere(&self, center: DVec3, radius: f64) -> CadResult<Solid>;

    /// Extrude a profile along the plane normal
    ///
    /// # Arguments
    /// * `profile` - The closed profile in plane coordinates
    /// * `plane` - The sketch plane
    /// * `distance` - Extrusion distance (negative extrudes against the normal)
    fn extrude(&self, profile: &Profile, plane: &Plane, distance: f64) -> CadResult<Solid>;

    /// Perform a boolean operation on two solids
    fn boolean(&self, a: &Solid, b: &Solid, op: BooleanType) -> CadResult<Solid>;

    /// Apply fillet (rounded edge) to selected edges
    fn fillet(&self, solid: &Solid, edges: &[EdgeId], radius: f64) -> CadResult<Solid>;

    /// Apply chamfer (beveled edge) to selected edges
    fn chamfer(&self, solid: &Solid, edges: &[EdgeId], size: f64) -> CadResult<Solid>;

    /// Drill holes described by `hole` into a solid
    fn drill(&self, solid: &Solid, hole: &HoleGeometry) -> CadResult<Solid>;
}

/// A null kernel that always returns errors (used when no kernel is available)
#[derive(Debug, Default)]
pub struct NullKernel;

impl NullKernel {
    fn unavailable<T>() -> CadResult<T> {
        Err(CadError::KernelNotAvailable(
            "No CAD kernel available".into(),
        ))
    }
}

impl CadKernel for NullKernel {
    fn name(&self) -> &str {
        "null"
    }

    fn is_available(&self) -> bool {
        false
    }

    fn create_box(&self, _origin: DVec3, _size: DVec3) -> CadResult<Solid> {
        Self::unavailable()
    }

    fn create_cylinder(&self, _base: DVec3, _radius: f64, _height: f64) -> CadResult<Solid> {
        Self::unavailable()
    }

    fn create_sphere(&self, _center: DVec3, _radius: f64) -> CadResult<Solid> {
        Self::unavailable()
    }

    fn extrude(&self, _profile: &Profile, _plane: &Plane, _distance: f64) -> CadResult<Solid> {
        Self::unavailable()
    }

    fn boolean(&self, _a: &Solid, _b: &Solid, _op: BooleanType) -> CadResult<Solid> {
        Self::unavailable()
    }

    fn fillet(&self, _solid: &Solid, _edges: &[EdgeId], _radius: f64) -> CadResult<Solid> {
        Self::unavailable()
    }

    fn chamfer(&self, _solid: &Solid, _edges: &[EdgeId], _size: f64) -> CadResult<Solid> {
        Self::unavailable()
    }

    fn drill(&self, _solid: &Solid, _hole: &HoleGeometry) -> CadResult<Solid> {
        Self::unavailable()
    }
}

/// Get the default CAD kernel
pub fn default_kernel() -> Box<dyn CadKernel> {
    Box::new(super::AnalyticKernel::new())
}
