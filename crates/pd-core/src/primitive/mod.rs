//! Primitive shape producers
//!
//! Standalone parametric solids that live directly in a document:
//! - Box (rectangular prism)
//! - Cylinder (standing on its base along +Z)
//! - Sphere

use glam::DVec3;
use serde::{Deserialize, Serialize};

use pd_cad::{CadKernel, CadResult, Solid};

use crate::constants::{TYPE_BOX, TYPE_CYLINDER, TYPE_SPHERE};

/// Primitive parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Primitive {
    Box {
        length: f64,
        width: f64,
        height: f64,
        /// Corner of the box
        placement: DVec3,
    },
    Cylinder {
        radius: f64,
        height: f64,
        /// Center of the base circle
        placement: DVec3,
    },
    Sphere {
        radius: f64,
        /// Center of the sphere
        placement: DVec3,
    },
}

impl Primitive {
    /// Box at the origin
    pub fn cuboid(length: f64, width: f64, height: f64) -> Self {
        Primitive::Box {
            length,
            width,
            height,
            placement: DVec3::ZERO,
        }
    }

    /// Cylinder at the origin
    pub fn cylinder(radius: f64, height: f64) -> Self {
        Primitive::Cylinder {
            radius,
            height,
            placement: DVec3::ZERO,
        }
    }

    /// Sphere at the origin
    pub fn sphere(radius: f64) -> Self {
        Primitive::Sphere {
            radius,
            placement: DVec3::ZERO,
        }
    }

    /// Move the primitive
    pub fn at(mut self, position: DVec3) -> Self {
        match &mut self {
            Primitive::Box { placement, .. }
            | Primitive::Cylinder { placement, .. }
            | Primitive::Sphere { placement, .. } => *placement = position,
        }
        self
    }

    /// Get the type name of this primitive
    pub fn type_name(&self) -> &'static str {
        match self {
            Primitive::Box { .. } => TYPE_BOX,
            Primitive::Cylinder { .. } => TYPE_CYLINDER,
            Primitive::Sphere { .. } => TYPE_SPHERE,
        }
    }

    /// Build the solid for this primitive
    pub fn make_shape(&self, kernel: &dyn CadKernel) -> CadResult<Solid> {
        match self {
            Primitive::Box {
                length,
                width,
                height,
                placement,
            } => kernel.create_box(*placement, DVec3::new(*length, *width, *height)),
            Primitive::Cylinder {
                radius,
                height,
                placement,
            } => kernel.create_cylinder(*placement, *radius, *height),
            Primitive::Sphere { radius, placement } => kernel.create_sphere(*placement, *radius),
        }
    }
}
