//! Physical constants and kinematics used by the reduction.

/// Electron rest energy `m_e c²` in eV.
pub const ELECTRON_REST_ENERGY_EV: f64 = 510_998.95;

/// Fe Kα line centroid (eV).
pub const FE_KALPHA_EV: f64 = 6_404.0;

/// Fe K photoelectric absorption edge (eV).
pub const FE_K_EDGE_EV: f64 = 7_112.0;

/// Energy of a photon of energy `energy` (eV) after a single 180° Compton scattering.
pub fn compton_backscatter(energy: f64) -> f64 {
    energy / (1.0 + 2.0 * energy / ELECTRON_REST_ENERGY_EV)
}
