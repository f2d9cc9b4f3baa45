//! # ts-inference
//!
//! Fitting layer for TorusSpec.
//!
//! - [`optimizer`]: box-constrained L-BFGS on top of `argmin`
//! - [`covariance`]: inversion of Fisher information matrices
//! - [`edge`]: the photoelectric absorption-edge model and its fitter

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod covariance;
pub mod edge;
pub mod optimizer;

pub use edge::{AbsorptionEdgeFitter, EdgeFit, EdgeRegions};
pub use optimizer::{BoundedLbfgs, LbfgsSettings, Minimum, Objective};
