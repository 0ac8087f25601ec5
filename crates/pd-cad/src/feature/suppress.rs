//! Suppression capability
//!
//! Suppression is an extension attached to an object rather than a property
//! of any particular feature type. Consumers ask for the capability through
//! [`Suppressible::suppressible`] and never inspect the concrete type.
//!
//! The capability is read-only; the flag is changed through
//! [`FeatureHistory::set_suppressed`](crate::history::FeatureHistory::set_suppressed),
//! which refuses changes that would break a later feature.

use serde::{Deserialize, Serialize};

/// Type name of the suppression extension, persisted with every object that carries it
pub const SUPPRESSIBLE_EXTENSION: &str = "App::SuppressibleExtension";

/// Extension data for objects that can be suppressed
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SuppressibleExtension {
    /// When true the object passes its input through unchanged on recompute
    pub suppressed: bool,
}

/// Capability lookup for suppression
pub trait Suppressible {
    /// The suppression extension, if this object carries one
    fn suppressible(&self) -> Option<&SuppressibleExtension>;

    /// Check if the object is suppressed
    fn is_suppressed(&self) -> bool {
        self.suppressible().is_some_and(|ext| ext.suppressed)
    }
}
