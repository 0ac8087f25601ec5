//! CAD Kernel Abstraction, Sketches and Feature History
//!
//! This crate provides:
//! - The CAD kernel trait and an analytic backend for mass properties
//! - 2D sketches with line/circle entities and constraints
//! - Parametric features (additive box, pad, fillet, chamfer, hole)
//! - The suppression capability shared by every feature
//! - Per-body feature history with a tip pointer and rebuild

pub mod feature;
pub mod history;
pub mod kernel;
pub mod sketch;

// Re-exports for convenience
pub use feature::{
    Feature, FeatureError, FeatureKind, FeatureResult, HoleParams, SUPPRESSIBLE_EXTENSION,
    ShapeRef, Suppressible, SuppressibleExtension,
};
pub use history::{FeatureHistory, HistoryEntry};
pub use kernel::{
    Aabb, AnalyticKernel, BooleanType, CadError, CadKernel, CadResult, DrillPoint, EdgeCurve,
    EdgeId, EdgeInfo, FaceId, FaceInfo, HoleCut, HoleDepth, HoleGeometry, NullKernel, Plane,
    Profile, Solid, SurfaceKind, default_kernel,
};
pub use sketch::{
    PointPos, Sketch, SketchConstraint, SketchEntity, SketchError, SketchResult, VertexRef,
};
