//! Processing configuration.
//!
//! A single [`ProcessingConfig`] carries every axis, window and normalisation constant of
//! the reduction. It is read from YAML (default) or JSON (`.json` extension); any field
//! left out takes the domain default.

use std::f64::consts::PI;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::interval::EnergyInterval;
use crate::physics::{FE_K_EDGE_EV, compton_backscatter};
use crate::{Error, Result};

/// Logarithmic axis definition.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AxisConfig {
    /// Left-most bound (> 0).
    pub left: f64,
    /// Right-most bound (> left).
    pub right: f64,
    /// Number of intervals (≥ 1).
    pub intervals: usize,
}

impl AxisConfig {
    fn validate(&self, name: &str) -> Result<()> {
        if !(self.left.is_finite() && self.right.is_finite()) || self.left <= 0.0 || self.right <= self.left {
            return Err(Error::Validation(format!(
                "{name} axis needs 0 < left < right, got [{}, {}]",
                self.left, self.right
            )));
        }
        if self.intervals == 0 {
            return Err(Error::Validation(format!("{name} axis needs at least one interval")));
        }
        Ok(())
    }
}

/// Normalisation of flux densities against the reference (source) spectrum.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct NormalizationConfig {
    /// Energy at which the reference spectrum is evaluated (eV).
    #[serde(default = "default_norm_energy")]
    pub energy: f64,
    /// Solid angle the reference spectrum was collected over (sr).
    #[serde(default = "default_norm_solid_angle")]
    pub solid_angle: f64,
}

impl Default for NormalizationConfig {
    fn default() -> Self {
        Self { energy: default_norm_energy(), solid_angle: default_norm_solid_angle() }
    }
}

/// Energy windows used by the observables.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MeasurementWindows {
    /// Continuum window averaged under the Fe Kα line.
    #[serde(default = "default_continuum_at_line")]
    pub continuum_at_line: EnergyInterval,
    /// Soft band of the hardness ratio.
    #[serde(default = "default_hardness_low")]
    pub hardness_low: EnergyInterval,
    /// Hard band of the hardness ratio.
    #[serde(default = "default_hardness_high")]
    pub hardness_high: EnergyInterval,
    /// Upper energy of the Compton shoulder (just below the line centroid).
    #[serde(default = "default_shoulder_right")]
    pub shoulder_right: f64,
}

impl Default for MeasurementWindows {
    fn default() -> Self {
        Self {
            continuum_at_line: default_continuum_at_line(),
            hardness_low: default_hardness_low(),
            hardness_high: default_hardness_high(),
            shoulder_right: default_shoulder_right(),
        }
    }
}

/// Regions of the absorption-edge fit.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EdgeConfig {
    /// Edge energy (eV).
    #[serde(default = "default_edge_energy")]
    pub edge_energy: f64,
    /// Left bound of the left (reference) region.
    #[serde(default = "default_edge_left_left")]
    pub left_left: f64,
    /// Right bound of the left region. `None` uses the Compton backscatter energy of the
    /// edge.
    #[serde(default)]
    pub left_right: Option<f64>,
    /// Left bound of the right (absorbed) region.
    #[serde(default = "default_edge_right_left")]
    pub right_left: f64,
    /// Right bound of the right region.
    #[serde(default = "default_edge_right_right")]
    pub right_right: f64,
    /// Optimizer iteration cap.
    #[serde(default = "default_edge_max_iter")]
    pub max_iter: u64,
}

impl EdgeConfig {
    /// Effective right bound of the left region.
    pub fn left_right(&self) -> f64 {
        self.left_right.unwrap_or_else(|| compton_backscatter(self.edge_energy))
    }

    /// Region bounds `(left_left, left_right, right_left, right_right)`.
    pub fn bounds(&self) -> (f64, f64, f64, f64) {
        (self.left_left, self.left_right(), self.right_left, self.right_right)
    }
}

impl Default for EdgeConfig {
    fn default() -> Self {
        Self {
            edge_energy: default_edge_energy(),
            left_left: default_edge_left_left(),
            left_right: None,
            right_left: default_edge_right_left(),
            right_right: default_edge_right_right(),
            max_iter: default_edge_max_iter(),
        }
    }
}

/// What the photon reader does with a malformed line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MalformedLinePolicy {
    /// Stop reading the file and return the error.
    Abort,
    /// Count the line, log it and continue.
    #[default]
    Skip,
}

/// Full processing configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessingConfig {
    /// Photon energy axis (eV).
    #[serde(default = "default_energy_axis")]
    pub energy: AxisConfig,
    /// Column-density grid (cm⁻²).
    #[serde(default = "default_column_density_axis")]
    pub column_density: AxisConfig,
    /// Flux-density normalisation.
    #[serde(default)]
    pub normalization: NormalizationConfig,
    /// Observable windows.
    #[serde(default)]
    pub windows: MeasurementWindows,
    /// Absorption-edge fit regions.
    #[serde(default)]
    pub edge: EdgeConfig,
    /// Factor converting simulation lengths to centimetres.
    #[serde(default = "default_length_to_cm")]
    pub length_to_cm: f64,
    /// Malformed photon line handling.
    #[serde(default)]
    pub malformed_lines: MalformedLinePolicy,
}

impl Default for ProcessingConfig {
    fn default() -> Self {
        Self {
            energy: default_energy_axis(),
            column_density: default_column_density_axis(),
            normalization: NormalizationConfig::default(),
            windows: MeasurementWindows::default(),
            edge: EdgeConfig::default(),
            length_to_cm: default_length_to_cm(),
            malformed_lines: MalformedLinePolicy::default(),
        }
    }
}

impl ProcessingConfig {
    /// Check axes, windows and edge regions for consistency.
    pub fn validate(&self) -> Result<()> {
        self.energy.validate("energy")?;
        self.column_density.validate("column density")?;
        let n = &self.normalization;
        if !(n.energy > 0.0 && n.energy >= self.energy.left && n.energy <= self.energy.right) {
            return Err(Error::Validation(format!(
                "normalization energy {} must lie on the energy axis [{}, {}]",
                n.energy, self.energy.left, self.energy.right
            )));
        }
        if !(n.solid_angle > 0.0 && n.solid_angle <= 4.0 * PI + 1e-12) {
            return Err(Error::Validation(format!(
                "normalization solid angle must be in (0, 4π], got {}",
                n.solid_angle
            )));
        }
        let (ll, lr, rl, rr) = self.edge.bounds();
        if !(ll < lr && lr <= rl && rl < rr) {
            return Err(Error::Validation(format!(
                "edge regions must be increasing, got {ll} < {lr} <= {rl} < {rr}"
            )));
        }
        if !(self.length_to_cm.is_finite() && self.length_to_cm > 0.0) {
            return Err(Error::Validation(format!(
                "length_to_cm must be positive, got {}",
                self.length_to_cm
            )));
        }
        Ok(())
    }
}

/// Read a [`ProcessingConfig`] from YAML, or JSON when the extension is `.json`.
pub fn read_config(path: &Path) -> Result<ProcessingConfig> {
    let bytes = std::fs::read(path)?;
    let ext = path.extension().and_then(|s| s.to_str()).unwrap_or("").to_ascii_lowercase();
    let cfg: ProcessingConfig = if ext == "json" {
        serde_json::from_slice(&bytes)?
    } else {
        serde_yaml_ng::from_slice(&bytes)?
    };
    cfg.validate()?;
    Ok(cfg)
}

fn default_energy_axis() -> AxisConfig {
    AxisConfig { left: 100.0, right: 300_000.0, intervals: 2000 }
}

fn default_column_density_axis() -> AxisConfig {
    AxisConfig { left: 1e22, right: 2e24, intervals: 30 }
}

fn default_norm_energy() -> f64 {
    1000.0
}

fn default_norm_solid_angle() -> f64 {
    4.0 * PI
}

fn default_continuum_at_line() -> EnergyInterval {
    EnergyInterval::new(6100.0, 6700.0)
}

fn default_hardness_low() -> EnergyInterval {
    EnergyInterval::new(2000.0, 5000.0)
}

fn default_hardness_high() -> EnergyInterval {
    EnergyInterval::new(10_000.0, 50_000.0)
}

fn default_shoulder_right() -> f64 {
    6395.0
}

fn default_edge_energy() -> f64 {
    FE_K_EDGE_EV
}

fn default_edge_left_left() -> f64 {
    6000.0
}

fn default_edge_right_left() -> f64 {
    7150.0
}

fn default_edge_right_right() -> f64 {
    8500.0
}

fn default_edge_max_iter() -> u64 {
    1000
}

fn default_length_to_cm() -> f64 {
    100.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults_are_valid() {
        let cfg = ProcessingConfig::default();
        cfg.validate().unwrap();
        assert_eq!(cfg.energy.intervals, 2000);
        assert!((cfg.edge.left_right() - 6919.4).abs() < 0.5);
    }

    #[test]
    fn test_partial_yaml_uses_defaults() {
        let yaml = "column_density:\n  left: 1.0e21\n  right: 1.0e25\n  intervals: 40\nmalformed_lines: abort\n";
        let cfg: ProcessingConfig = serde_yaml_ng::from_str(yaml).unwrap();
        assert_eq!(cfg.column_density.intervals, 40);
        assert_eq!(cfg.energy, default_energy_axis());
        assert_eq!(cfg.malformed_lines, MalformedLinePolicy::Abort);
        cfg.validate().unwrap();
    }

    #[test]
    fn test_read_config_json() {
        let mut f = tempfile::Builder::new().suffix(".json").tempfile().unwrap();
        write!(f, r#"{{"edge": {{"left_right": 6900.0}}, "length_to_cm": 1.0}}"#).unwrap();
        let cfg = read_config(f.path()).unwrap();
        assert_eq!(cfg.edge.left_right(), 6900.0);
        assert_eq!(cfg.length_to_cm, 1.0);
    }

    #[test]
    fn test_invalid_axis_rejected() {
        let mut cfg = ProcessingConfig::default();
        cfg.energy.right = 50.0;
        assert!(cfg.validate().is_err());

        let mut cfg = ProcessingConfig::default();
        cfg.edge.right_left = 6500.0;
        assert!(cfg.validate().is_err());
    }
}
