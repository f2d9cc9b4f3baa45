//! Column-density grid and torus geometry.

use std::fmt;

use serde::{Deserialize, Serialize};
use ts_core::{AxisConfig, Error, Result};

use crate::axis::{LogAxis, Located};

/// Logarithmic grid over the line-of-sight column density (cm⁻²).
#[derive(Debug, Clone, PartialEq)]
pub struct ColumnDensityGrid {
    axis: LogAxis,
    midpoints: Vec<f64>,
}

impl ColumnDensityGrid {
    /// Build a grid of `n` intervals over `[left, right]`.
    pub fn build(left: f64, right: f64, n: usize) -> Result<Self> {
        let axis = LogAxis::new(left, right, n)?;
        Ok(Self { midpoints: axis.midpoints(), axis })
    }

    /// Grid from its configuration block.
    pub fn from_config(cfg: &AxisConfig) -> Result<Self> {
        Self::build(cfg.left, cfg.right, cfg.intervals)
    }

    /// Underlying axis.
    pub fn axis(&self) -> &LogAxis {
        &self.axis
    }

    /// Number of bins.
    pub fn len(&self) -> usize {
        self.axis.len()
    }

    /// Always false; a grid has at least one bin.
    pub fn is_empty(&self) -> bool {
        false
    }

    /// Arithmetic bin midpoints.
    pub fn midpoints(&self) -> &[f64] {
        &self.midpoints
    }

    /// Midpoint of bin `i`.
    pub fn midpoint(&self, i: usize) -> Option<f64> {
        self.midpoints.get(i).copied()
    }

    /// Bounds of bin `i`.
    pub fn bounds(&self, i: usize) -> Option<(f64, f64)> {
        (i < self.len()).then(|| self.axis.bounds(i))
    }

    /// Bin of column density `nh`, clamped into the grid.
    pub fn index(&self, nh: f64) -> usize {
        let Located { index, clamped } = self.axis.locate(nh);
        if let Some(side) = clamped
            && nh > 0.0
        {
            log::debug!("column density {nh:e} clamped ({side:?}) to bin {index} of {self}");
        }
        index
    }

    /// Bin of `nh`, failing outside the grid.
    pub fn try_index(&self, nh: f64) -> Result<usize> {
        self.axis.try_index(nh, "column density")
    }
}

impl fmt::Display for ColumnDensityGrid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.axis, f)
    }
}

/// Hydrogen number density inside clouds:
/// `nh_aver / (filling_factor · (r_outer − r_inner))`.
pub fn hydrogen_concentration(nh_aver: f64, filling_factor: f64, r_inner: f64, r_outer: f64) -> Result<f64> {
    if !(nh_aver > 0.0 && filling_factor > 0.0) {
        return Err(Error::Validation(format!(
            "average column density and filling factor must be positive, got {nh_aver}, {filling_factor}"
        )));
    }
    if !(r_inner >= 0.0 && r_outer > r_inner) {
        return Err(Error::Validation(format!(
            "torus radii must satisfy 0 <= r_inner < r_outer, got {r_inner}, {r_outer}"
        )));
    }
    Ok(nh_aver / (filling_factor * (r_outer - r_inner)))
}

/// Torus model parameters needed to convert path lengths into column densities.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TorusGeometry {
    /// Inner radius (cm).
    pub r_inner: f64,
    /// Outer radius (cm).
    pub r_outer: f64,
    /// Cloud volume filling factor.
    pub filling_factor: f64,
    /// Average equatorial column density (cm⁻²).
    pub nh_aver: f64,
}

impl TorusGeometry {
    /// Create and validate a geometry.
    pub fn new(r_inner: f64, r_outer: f64, filling_factor: f64, nh_aver: f64) -> Result<Self> {
        let geometry = Self { r_inner, r_outer, filling_factor, nh_aver };
        geometry.hydrogen_concentration()?;
        Ok(geometry)
    }

    /// See [`hydrogen_concentration`].
    pub fn hydrogen_concentration(&self) -> Result<f64> {
        hydrogen_concentration(self.nh_aver, self.filling_factor, self.r_inner, self.r_outer)
    }
}
