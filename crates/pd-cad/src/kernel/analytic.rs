//! Analytic CAD Kernel Backend
//!
//! Computes exact volumes, bounds and face/edge summaries for prisms,
//! primitives, edge blends and drilled holes. No boundary representation is
//! kept; every operation derives its result from the mass properties and
//! topology summary of its inputs.

use std::collections::BTreeSet;
use std::f64::consts::{FRAC_PI_2, PI};

use glam::{DVec2, DVec3};

use super::{
    Aabb, BooleanType, CadError, CadKernel, CadResult, DrillPoint, EdgeCurve, EdgeId, HoleCut,
    HoleDepth, HoleGeometry, LINEAR_TOLERANCE, Plane, Profile, Solid, SurfaceKind,
    principal_axis,
};

/// Analytic kernel
#[derive(Debug, Default)]
pub struct AnalyticKernel;

impl AnalyticKernel {
    /// Create a new analytic kernel
    pub fn new() -> Self {
        Self
    }
}

fn ensure_positive(value: f64, what: &str) -> CadResult<()> {
    if value.is_finite() && value > LINEAR_TOLERANCE {
        Ok(())
    } else {
        Err(CadError::DegenerateShape(format!(
            "{what} must be positive, got {value}"
        )))
    }
}

fn ensure_angle(degrees: f64, what: &str) -> CadResult<()> {
    if degrees > 0.0 && degrees < 180.0 {
        Ok(())
    } else {
        Err(CadError::OperationFailed(format!(
            "{what} must be between 0 and 180 degrees, got {degrees}"
        )))
    }
}

fn frustum_volume(r1: f64, r2: f64, height: f64) -> f64 {
    PI * height / 3.0 * (r1 * r1 + r1 * r2 + r2 * r2)
}

fn is_right_angle(theta: f64) -> bool {
    (theta - FRAC_PI_2).abs() < 1e-9
}

/// Edge blend applied by fillet and chamfer
#[derive(Debug, Clone, Copy)]
enum Blend {
    Fillet(f64),
    Chamfer(f64),
}

impl Blend {
    fn name(&self) -> &'static str {
        match self {
            Blend::Fillet(_) => "Fillet",
            Blend::Chamfer(_) => "Chamfer",
        }
    }

    fn size(&self) -> f64 {
        match self {
            Blend::Fillet(r) | Blend::Chamfer(r) => *r,
        }
    }

    /// Distance from the edge to where the blend meets each adjacent face
    fn setback(&self, theta: f64) -> f64 {
        match self {
            Blend::Fillet(r) => r / (theta / 2.0).tan(),
            Blend::Chamfer(d) => *d,
        }
    }

    /// Cross-section area removed per unit edge length
    fn section(&self, theta: f64) -> f64 {
        match self {
            Blend::Fillet(r) => r * r * (1.0 / (theta / 2.0).tan() - (PI - theta) / 2.0),
            Blend::Chamfer(d) => 0.5 * d * d * theta.sin(),
        }
    }

    /// Distance of the removed section's centroid from the edge, right angles only
    fn centroid_offset(&self) -> f64 {
        match self {
            Blend::Fillet(r) => r * (10.0 - 3.0 * PI) / (3.0 * (4.0 - PI)),
            Blend::Chamfer(d) => d / 3.0,
        }
    }

    fn face_kind(&self, curve: &EdgeCurve) -> SurfaceKind {
        match (self, curve) {
            (Blend::Fillet(_), EdgeCurve::Line { .. }) => SurfaceKind::Cylinder,
            (Blend::Fillet(_), EdgeCurve::Circle { .. }) => SurfaceKind::Torus,
            (Blend::Chamfer(_), EdgeCurve::Line { .. }) => SurfaceKind::Plane,
            (Blend::Chamfer(_), EdgeCurve::Circle { .. }) => SurfaceKind::Cone,
        }
    }

    /// Dihedral angle of the two boundary edges the blend creates
    fn boundary_dihedral(&self, theta: f64) -> f64 {
        match self {
            Blend::Fillet(_) => PI,
            Blend::Chamfer(_) => (PI + theta) / 2.0,
        }
    }
}

impl AnalyticKernel {
    fn blend(&self, solid: &Solid, edges: &[EdgeId], blend: Blend) -> CadResult<Solid> {
        ensure_positive(blend.size(), blend.name())?;
        if edges.is_empty() {
            return Err(CadError::OperationFailed(format!(
                "{} needs at least one edge",
                blend.name()
            )));
        }

        let min_extent = solid.bounds.size().min_element();
        let mut result = solid.duplicate();
        result.prismatic = false;

        for id in edges.iter().collect::<BTreeSet<_>>() {
            let edge = solid
                .edge(*id)
                .ok_or_else(|| CadError::SubElementNotFound(id.name()))?;
            if edge.blended {
                return Err(CadError::OperationFailed(format!(
                    "{} is already blended",
                    id.name()
                )));
            }
            if !edge.is_sharp() {
                return Err(CadError::OperationFailed(format!(
                    "{} joins tangent faces",
                    id.name()
                )));
            }

            let theta = edge.dihedral;
            let setback = blend.setback(theta).abs();
            if !setback.is_finite() || 2.0 * setback >= min_extent {
                return Err(CadError::OperationFailed(format!(
                    "{} of {} is too large for {}",
                    blend.name(),
                    blend.size(),
                    id.name()
                )));
            }

            let removed = match edge.curve {
                EdgeCurve::Line { length } => blend.section(theta) * length,
                EdgeCurve::Circle { radius } => {
                    if !is_right_angle(theta) {
                        return Err(CadError::OperationFailed(format!(
                            "{} on circular {} requires perpendicular faces",
                            blend.name(),
                            id.name()
                        )));
                    }
                    if setback >= radius {
                        return Err(CadError::OperationFailed(format!(
                            "{} of {} exceeds the radius of {}",
                            blend.name(),
                            blend.size(),
                            id.name()
                        )));
                    }
                    // Pappus: section swept around the circle at its centroid
                    blend.section(theta) * 2.0 * PI * (radius - blend.centroid_offset())
                }
            };

            result.volume -= removed;
            result.push_face(blend.face_kind(&edge.curve));
            let boundary = blend.boundary_dihedral(theta);
            result.push_edge(edge.curve, boundary);
            result.push_edge(edge.curve, boundary);
            result.edges[id.0 as usize].blended = true;
        }

        if result.volume <= LINEAR_TOLERANCE {
            return Err(CadError::DegenerateShape(format!(
                "{} consumed the whole solid",
                blend.name()
            )));
        }
        Ok(result)
    }
}

/// Volume and topology removed by a single drilled hole
#[derive(Debug, Default)]
struct Bore {
    removed: f64,
    faces: Vec<SurfaceKind>,
    edges: Vec<(EdgeCurve, f64)>,
}

impl Bore {
    /// Lay out one hole that has `available` material below its entry point
    fn plan(hole: &HoleGeometry, available: f64) -> CadResult<Self> {
        let r = hole.diameter / 2.0;
        let mut bore = Bore::default();

        let length = match hole.depth {
            HoleDepth::ThroughAll => available,
            HoleDepth::Dimension(depth) => {
                ensure_positive(depth, "Hole depth")?;
                depth.min(available)
            }
        };

        let cut_depth = match hole.cut {
            HoleCut::None => {
                bore.edges.push((EdgeCurve::Circle { radius: r }, FRAC_PI_2));
                0.0
            }
            HoleCut::Counterbore { diameter, depth } => {
                let rc = diameter / 2.0;
                if rc <= r + LINEAR_TOLERANCE {
                    return Err(CadError::OperationFailed(
                        "Counterbore diameter must exceed the hole diameter".into(),
                    ));
                }
                ensure_positive(depth, "Counterbore depth")?;
                bore.removed += PI * rc * rc * depth;
                bore.faces.extend([SurfaceKind::Cylinder, SurfaceKind::Plane]);
                bore.edges.extend([
                    (EdgeCurve::Circle { radius: rc }, FRAC_PI_2),
                    (EdgeCurve::Circle { radius: rc }, 1.5 * PI),
                    (EdgeCurve::Circle { radius: r }, FRAC_PI_2),
                ]);
                depth
            }
            HoleCut::Countersink { diameter, angle } => {
                let rc = diameter / 2.0;
                if rc <= r + LINEAR_TOLERANCE {
                    return Err(CadError::OperationFailed(
                        "Countersink diameter must exceed the hole diameter".into(),
                    ));
                }
                ensure_angle(angle, "Countersink angle")?;
                let half = (angle / 2.0).to_radians();
                let height = (rc - r) / half.tan();
                bore.removed += frustum_volume(rc, r, height);
                bore.faces.push(SurfaceKind::Cone);
                bore.edges.extend([
                    (EdgeCurve::Circle { radius: rc }, FRAC_PI_2 + half),
                    (EdgeCurve::Circle { radius: r }, 1.5 * PI - half),
                ]);
                height
            }
        };

        if cut_depth >= length - LINEAR_TOLERANCE {
            return Err(CadError::OperationFailed(
                "Hole cut is deeper than the hole".into(),
            ));
        }
        let wall_available = length - cut_depth;

        // Radius shrinks by cot(angle) per unit depth; 90 degrees is straight
        let inv_taper = match hole.taper_angle {
            Some(angle) if (angle - 90.0).abs() > 1e-9 => {
                ensure_angle(angle, "Taper angle")?;
                1.0 / angle.to_radians().tan()
            }
            _ => 0.0,
        };

        let through_all = matches!(hole.depth, HoleDepth::ThroughAll);
        let (wall, tip_slope) = match hole.drill_point {
            _ if through_all => (wall_available, None),
            DrillPoint::Flat => (wall_available, None),
            DrillPoint::Angled { angle, for_depth } => {
                ensure_angle(angle, "Drill point angle")?;
                let k = (angle / 2.0).to_radians().tan();
                if for_depth {
                    // wall + tip height = available depth, tip height = bottom radius / k
                    let denom = 1.0 - inv_taper / k;
                    let wall = (wall_available - r / k) / denom;
                    if denom.abs() <= LINEAR_TOLERANCE || wall <= LINEAR_TOLERANCE {
                        return Err(CadError::OperationFailed(
                            "Drill point does not fit in the hole depth".into(),
                        ));
                    }
                    (wall, Some(k))
                } else {
                    (wall_available, Some(k))
                }
            }
        };

        let bottom = r - wall * inv_taper;
        if bottom <= LINEAR_TOLERANCE {
            return Err(CadError::OperationFailed(
                "Taper closes the hole before its bottom".into(),
            ));
        }

        if inv_taper == 0.0 {
            bore.removed += PI * r * r * wall;
            bore.faces.push(SurfaceKind::Cylinder);
        } else {
            bore.removed += frustum_volume(r, bottom, wall);
            bore.faces.push(SurfaceKind::Cone);
        }
        bore.edges.push((EdgeCurve::Line { length: wall }, PI));

        let wall_end = cut_depth + wall;
        if wall_end >= available - LINEAR_TOLERANCE {
            bore.edges
                .push((EdgeCurve::Circle { radius: bottom }, FRAC_PI_2));
        } else if let Some(k) = tip_slope {
            let tip = bottom / k;
            if wall_end + tip > available + LINEAR_TOLERANCE {
                return Err(CadError::OperationFailed(
                    "Drill point breaks through the solid".into(),
                ));
            }
            bore.removed += PI * bottom * bottom * tip / 3.0;
            bore.faces.push(SurfaceKind::Cone);
            bore.edges
                .push((EdgeCurve::Circle { radius: bottom }, 1.5 * PI - k.atan()));
        } else {
            bore.faces.push(SurfaceKind::Plane);
            bore.edges
                .push((EdgeCurve::Circle { radius: bottom }, 1.5 * PI));
        }

        Ok(bore)
    }
}

impl CadKernel for AnalyticKernel {
    fn name(&self) -> &str {
        "analytic"
    }

    fn is_available(&self) -> bool {
        true
    }

    fn create_box(&self, origin: DVec3, size: DVec3) -> CadResult<Solid> {
        ensure_positive(size.x, "Box length")?;
        ensure_positive(size.y, "Box width")?;
        ensure_positive(size.z, "Box height")?;

        let plane = Plane {
            origin,
            ..Plane::xy()
        };
        let profile = Profile::rectangle(DVec2::ZERO, DVec2::new(size.x, size.y));
        self.extrude(&profile, &plane, size.z)
    }

    fn create_cylinder(&self, base: DVec3, radius: f64, height: f64) -> CadResult<Solid> {
        ensure_positive(radius, "Cylinder radius")?;
        ensure_positive(height, "Cylinder height")?;

        let plane = Plane {
            origin: base,
            ..Plane::xy()
        };
        self.extrude(&Profile::circle(DVec2::ZERO, radius), &plane, height)
    }

    fn create_sphere(&self, center: DVec3, radius: f64) -> CadResult<Solid> {
        ensure_positive(radius, "Sphere radius")?;

        let bounds = Aabb::new(center - DVec3::splat(radius), center + DVec3::splat(radius));
        let mut solid = Solid::new(4.0 / 3.0 * PI * radius.powi(3), bounds);
        solid.push_face(SurfaceKind::Sphere);
        solid.push_edge(EdgeCurve::Circle { radius }, PI);
        Ok(solid)
    }

    fn extrude(&self, profile: &Profile, plane: &Plane, distance: f64) -> CadResult<Solid> {
        let height = distance.abs();
        ensure_positive(height, "Extrusion distance")?;

        if let Profile::Polygon { points } = profile
            && points.len() < 3
        {
            return Err(CadError::InvalidProfile(format!(
                "polygon needs at least 3 points, got {}",
                points.len()
            )));
        }
        let area = profile.area();
        if !(area > LINEAR_TOLERANCE) {
            return Err(CadError::InvalidProfile("profile encloses no area".into()));
        }

        let offset = plane.normal * distance;
        let base = profile
            .world_bounds(plane)
            .ok_or_else(|| CadError::InvalidProfile("empty profile".into()))?;
        let bounds = base.union(&Aabb::new(base.min + offset, base.max + offset));

        let mut solid = Solid::new(area * height, bounds);
        match profile {
            Profile::Polygon { .. } => {
                let lengths = profile.edge_lengths();
                for _ in 0..lengths.len() + 2 {
                    solid.push_face(SurfaceKind::Plane);
                }
                // bottom loop, top loop, then the lateral edges
                for _ in 0..2 {
                    for length in &lengths {
                        solid.push_edge(EdgeCurve::Line { length: *length }, FRAC_PI_2);
                    }
                }
                for angle in profile.interior_angles() {
                    solid.push_edge(EdgeCurve::Line { length: height }, angle);
                }
            }
            Profile::Circle { radius, .. } => {
                solid.push_face(SurfaceKind::Cylinder);
                solid.push_face(SurfaceKind::Plane);
                solid.push_face(SurfaceKind::Plane);
                solid.push_edge(EdgeCurve::Circle { radius: *radius }, FRAC_PI_2);
                solid.push_edge(EdgeCurve::Line { length: height }, PI);
                solid.push_edge(EdgeCurve::Circle { radius: *radius }, FRAC_PI_2);
            }
        }

        solid.prismatic = profile.is_axis_rectangle()
            && plane.is_axis_aligned()
            && principal_axis(plane.x_axis).is_some();
        Ok(solid)
    }

    fn boolean(&self, a: &Solid, b: &Solid, op: BooleanType) -> CadResult<Solid> {
        let Some(common) = a.bounds.intersection(&b.bounds) else {
            return match op {
                BooleanType::Union => Solid::compound(&[a, b])
                    .ok_or_else(|| CadError::BooleanFailed("no operands".into())),
                BooleanType::Subtract => Ok(a.duplicate()),
                BooleanType::Intersect => Err(CadError::DegenerateShape(
                    "intersection of disjoint solids is empty".into(),
                )),
            };
        };

        if !(a.prismatic && b.prismatic) {
            return Err(CadError::BooleanFailed(format!(
                "{op:?} of overlapping curved solids is not supported"
            )));
        }

        match op {
            BooleanType::Union => {
                if a.bounds.contains(&b.bounds) {
                    Ok(a.duplicate())
                } else if b.bounds.contains(&a.bounds) {
                    Ok(b.duplicate())
                } else {
                    let mut solid = Solid::compound(&[a, b])
                        .ok_or_else(|| CadError::BooleanFailed("no operands".into()))?;
                    solid.volume = a.volume + b.volume - common.volume();
                    Ok(solid)
                }
            }
            BooleanType::Subtract => {
                if b.bounds.contains(&a.bounds) {
                    return Err(CadError::DegenerateShape(
                        "subtraction removes the whole solid".into(),
                    ));
                }
                let mut solid = a.duplicate();
                solid.volume -= common.volume();
                solid.prismatic = false;
                // every tool face lying strictly inside the target becomes a new face
                for axis in 0..3 {
                    for coord in [b.bounds.min[axis], b.bounds.max[axis]] {
                        if coord > a.bounds.min[axis] + LINEAR_TOLERANCE
                            && coord < a.bounds.max[axis] - LINEAR_TOLERANCE
                        {
                            solid.push_face(SurfaceKind::Plane);
                        }
                    }
                }
                Ok(solid)
            }
            BooleanType::Intersect => self.create_box(common.min, common.size()),
        }
    }

    fn fillet(&self, solid: &Solid, edges: &[EdgeId], radius: f64) -> CadResult<Solid> {
        self.blend(solid, edges, Blend::Fillet(radius))
    }

    fn chamfer(&self, solid: &Solid, edges: &[EdgeId], size: f64) -> CadResult<Solid> {
        self.blend(solid, edges, Blend::Chamfer(size))
    }

    fn drill(&self, solid: &Solid, hole: &HoleGeometry) -> CadResult<Solid> {
        ensure_positive(hole.diameter, "Hole diameter")?;
        if hole.centers.is_empty() {
            return Err(CadError::OperationFailed(
                "Hole profile contains no circles".into(),
            ));
        }

        let direction = -hole.plane.normal;
        let (axis, sign) = principal_axis(direction).ok_or_else(|| {
            CadError::OperationFailed("Holes must be drilled along a coordinate axis".into())
        })?;

        let outer_radius = match hole.cut {
            HoleCut::None => hole.diameter,
            HoleCut::Counterbore { diameter, .. } | HoleCut::Countersink { diameter, .. } => {
                diameter.max(hole.diameter)
            }
        } / 2.0;

        for (i, a) in hole.centers.iter().enumerate() {
            for b in &hole.centers[i + 1..] {
                if a.distance(*b) < 2.0 * outer_radius {
                    return Err(CadError::OperationFailed(format!(
                        "Holes at {a} and {b} overlap"
                    )));
                }
            }
        }

        let bounds = solid.bounds;
        let mut result = solid.duplicate();
        result.prismatic = false;

        for center in &hole.centers {
            let start = hole.plane.to_world(*center);

            for side in (0..3).filter(|j| *j != axis) {
                if start[side] - outer_radius < bounds.min[side] - LINEAR_TOLERANCE
                    || start[side] + outer_radius > bounds.max[side] + LINEAR_TOLERANCE
                {
                    return Err(CadError::OperationFailed(format!(
                        "Hole at {center} leaves the solid footprint"
                    )));
                }
            }

            let (entered, available) = if sign > 0.0 {
                (
                    start[axis] >= bounds.min[axis] - LINEAR_TOLERANCE,
                    bounds.max[axis] - start[axis],
                )
            } else {
                (
                    start[axis] <= bounds.max[axis] + LINEAR_TOLERANCE,
                    start[axis] - bounds.min[axis],
                )
            };
            if !entered || available <= LINEAR_TOLERANCE {
                return Err(CadError::OperationFailed(format!(
                    "Hole at {center} does not start on the solid"
                )));
            }

            let bore = Bore::plan(hole, available)?;
            result.volume -= bore.removed;
            for kind in bore.faces {
                result.push_face(kind);
            }
            for (curve, dihedral) in bore.edges {
                result.push_edge(curve, dihedral);
            }
        }

        if result.volume <= LINEAR_TOLERANCE {
            return Err(CadError::DegenerateShape(
                "Holes consumed the whole solid".into(),
            ));
        }
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn cube() -> Solid {
        AnalyticKernel::new()
            .create_box(DVec3::ZERO, DVec3::splat(10.0))
            .unwrap()
    }

    fn hole(diameter: f64, depth: HoleDepth) -> HoleGeometry {
        HoleGeometry {
            plane: Plane::xy().offset(10.0),
            centers: vec![DVec2::new(5.0, 5.0)],
            diameter,
            depth,
            drill_point: DrillPoint::Flat,
            taper_angle: None,
            cut: HoleCut::None,
        }
    }

    #[test]
    fn test_box_topology() {
        let solid = cube();
        assert_relative_eq!(solid.volume, 1000.0);
        assert_eq!(solid.face_count(), 6);
        assert_eq!(solid.edge_count(), 12);
        assert!(solid.prismatic);
        assert!(solid.edges.iter().all(|e| is_right_angle(e.dihedral)));
    }

    #[test]
    fn test_extrude_reversed() {
        let kernel = AnalyticKernel::new();
        let profile = Profile::Polygon {
            points: vec![
                DVec2::new(0.0, 0.0),
                DVec2::new(4.0, 0.0),
                DVec2::new(0.0, 3.0),
            ],
        };
        let solid = kernel.extrude(&profile, &Plane::xy(), -2.0).unwrap();
        assert_relative_eq!(solid.volume, 12.0);
        assert_eq!(solid.face_count(), 5);
        assert_eq!(solid.edge_count(), 9);
        assert_relative_eq!(solid.bounds.min.z, -2.0);
        assert_relative_eq!(solid.bounds.max.z, 0.0);
        assert!(!solid.prismatic);
    }

    #[test]
    fn test_extrude_rejects_degenerate_profile() {
        let kernel = AnalyticKernel::new();
        let line = Profile::Polygon {
            points: vec![DVec2::ZERO, DVec2::X, DVec2::new(2.0, 0.0)],
        };
        assert!(matches!(
            kernel.extrude(&line, &Plane::xy(), 1.0),
            Err(CadError::InvalidProfile(_))
        ));
    }

    #[test]
    fn test_cylinder_and_sphere() {
        let kernel = AnalyticKernel::new();
        let cylinder = kernel.create_cylinder(DVec3::ZERO, 2.0, 5.0).unwrap();
        assert_relative_eq!(cylinder.volume, 20.0 * PI);
        assert_eq!(cylinder.face_count(), 3);

        let sphere = kernel.create_sphere(DVec3::ZERO, 3.0).unwrap();
        assert_relative_eq!(sphere.volume, 36.0 * PI);
        assert_eq!(sphere.face_count(), 1);
    }

    #[test]
    fn test_fillet_box_edge() {
        let kernel = AnalyticKernel::new();
        let filleted = kernel.fillet(&cube(), &[EdgeId(0)], 1.0).unwrap();
        assert_relative_eq!(filleted.volume, 1000.0 - (1.0 - PI / 4.0) * 10.0, epsilon = 1e-9);
        assert_eq!(filleted.face_count(), 7);
        assert!(filleted.edges[0].blended);

        let again = kernel.fillet(&filleted, &[EdgeId(0)], 0.5);
        assert!(matches!(again, Err(CadError::OperationFailed(_))));
    }

    #[test]
    fn test_chamfer_box_edge() {
        let kernel = AnalyticKernel::new();
        let chamfered = kernel.chamfer(&cube(), &[EdgeId(1), EdgeId(1)], 0.5).unwrap();
        assert_relative_eq!(chamfered.volume, 1000.0 - 0.125 * 10.0, epsilon = 1e-9);
        assert_eq!(chamfered.face_count(), 7);
    }

    #[test]
    fn test_blend_errors() {
        let kernel = AnalyticKernel::new();
        assert!(matches!(
            kernel.fillet(&cube(), &[EdgeId(40)], 1.0),
            Err(CadError::SubElementNotFound(_))
        ));
        assert!(kernel.fillet(&cube(), &[EdgeId(0)], 6.0).is_err());
        assert!(kernel.chamfer(&cube(), &[], 1.0).is_err());

        let cylinder = kernel.create_cylinder(DVec3::ZERO, 2.0, 5.0).unwrap();
        assert!(kernel.fillet(&cylinder, &[EdgeId(1)], 0.5).is_err());
    }

    #[test]
    fn test_fillet_cylinder_rim() {
        let kernel = AnalyticKernel::new();
        let cylinder = kernel.create_cylinder(DVec3::ZERO, 4.0, 6.0).unwrap();
        let filleted = kernel.fillet(&cylinder, &[EdgeId(0)], 1.0).unwrap();
        let c = (10.0 - 3.0 * PI) / (3.0 * (4.0 - PI));
        let expected = cylinder.volume - (1.0 - PI / 4.0) * 2.0 * PI * (4.0 - c);
        assert_relative_eq!(filleted.volume, expected, epsilon = 1e-9);
        assert_eq!(filleted.faces.last().unwrap().kind, SurfaceKind::Torus);
    }

    #[test]
    fn test_plain_through_hole() {
        let kernel = AnalyticKernel::new();
        let drilled = kernel
            .drill(&cube(), &hole(6.0, HoleDepth::Dimension(10.0)))
            .unwrap();
        assert_relative_eq!(drilled.volume, 1000.0 - 90.0 * PI, epsilon = 1e-9);
        assert_eq!(drilled.face_count(), 7);
    }

    #[test]
    fn test_counterbore_hole() {
        let kernel = AnalyticKernel::new();
        let geometry = HoleGeometry {
            cut: HoleCut::Counterbore {
                diameter: 8.0,
                depth: 5.0,
            },
            ..hole(6.0, HoleDepth::Dimension(10.0))
        };
        let drilled = kernel.drill(&cube(), &geometry).unwrap();
        assert_relative_eq!(
            drilled.volume,
            1000.0 - 45.0 * PI - 80.0 * PI,
            epsilon = 1e-9
        );
    }

    #[test]
    fn test_countersink_hole() {
        let kernel = AnalyticKernel::new();
        let geometry = HoleGeometry {
            cut: HoleCut::Countersink {
                diameter: 9.0,
                angle: 90.0,
            },
            ..hole(6.0, HoleDepth::ThroughAll)
        };
        let drilled = kernel.drill(&cube(), &geometry).unwrap();
        assert_relative_eq!(
            drilled.volume,
            1000.0 - 90.0 * PI - 24.7400421,
            epsilon = 1e-6
        );
        assert_eq!(drilled.face_count(), 8);
    }

    #[test]
    fn test_tapered_blind_hole() {
        let kernel = AnalyticKernel::new();
        let geometry = HoleGeometry {
            taper_angle: Some(60.0),
            ..hole(6.0, HoleDepth::Dimension(5.0))
        };
        let drilled = kernel.drill(&cube(), &geometry).unwrap();
        assert_eq!(drilled.face_count(), 8);
        let bottom = 3.0 - 5.0 / 60f64.to_radians().tan();
        assert_relative_eq!(
            drilled.volume,
            1000.0 - frustum_volume(3.0, bottom, 5.0),
            epsilon = 1e-9
        );
    }

    #[test]
    fn test_angled_drill_point_for_depth() {
        let kernel = AnalyticKernel::new();
        let geometry = HoleGeometry {
            drill_point: DrillPoint::Angled {
                angle: 118.0,
                for_depth: true,
            },
            ..hole(6.0, HoleDepth::Dimension(10.0))
        };
        let drilled = kernel.drill(&cube(), &geometry).unwrap();
        assert_eq!(drilled.face_count(), 8);

        let tip = 3.0 / 59f64.to_radians().tan();
        let expected = 1000.0 - 9.0 * PI * (10.0 - tip) - 3.0 * PI * tip;
        assert_relative_eq!(drilled.volume, expected, epsilon = 1e-9);
    }

    #[test]
    fn test_angled_drill_point_breaks_through() {
        let kernel = AnalyticKernel::new();
        let geometry = HoleGeometry {
            drill_point: DrillPoint::Angled {
                angle: 118.0,
                for_depth: false,
            },
            ..hole(6.0, HoleDepth::Dimension(9.5))
        };
        assert!(kernel.drill(&cube(), &geometry).is_err());
    }

    #[test]
    fn test_hole_outside_footprint() {
        let kernel = AnalyticKernel::new();
        let geometry = HoleGeometry {
            centers: vec![DVec2::new(1.0, 5.0)],
            ..hole(6.0, HoleDepth::ThroughAll)
        };
        assert!(matches!(
            kernel.drill(&cube(), &geometry),
            Err(CadError::OperationFailed(_))
        ));
    }

    #[test]
    fn test_boolean_prismatic() {
        let kernel = AnalyticKernel::new();
        let a = cube();
        let b = kernel
            .create_box(DVec3::new(5.0, 0.0, 0.0), DVec3::splat(10.0))
            .unwrap();

        let union = kernel.boolean(&a, &b, BooleanType::Union).unwrap();
        assert_relative_eq!(union.volume, 1500.0);

        let cut = kernel.boolean(&a, &b, BooleanType::Subtract).unwrap();
        assert_relative_eq!(cut.volume, 500.0);
        assert_eq!(cut.face_count(), 7);

        let common = kernel.boolean(&a, &b, BooleanType::Intersect).unwrap();
        assert_relative_eq!(common.volume, 500.0);
        assert!(common.prismatic);
    }

    #[test]
    fn test_boolean_curved_overlap_fails() {
        let kernel = AnalyticKernel::new();
        let sphere = kernel.create_sphere(DVec3::splat(5.0), 2.0).unwrap();
        assert!(matches!(
            kernel.boolean(&cube(), &sphere, BooleanType::Union),
            Err(CadError::BooleanFailed(_))
        ));

        let far = kernel.create_sphere(DVec3::splat(50.0), 2.0).unwrap();
        let union = kernel.boolean(&cube(), &far, BooleanType::Union).unwrap();
        assert_relative_eq!(union.volume, 1000.0 + far.volume);
    }
}
