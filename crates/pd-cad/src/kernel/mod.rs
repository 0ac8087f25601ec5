//! CAD kernel abstraction
//!
//! The [`CadKernel`] trait is the single seam between features and geometry.
//! [`AnalyticKernel`] is the default backend.

mod analytic;
mod traits;

pub use analytic::AnalyticKernel;
pub use traits::*;
