//! Energy and viewing-angle intervals.

use std::f64::consts::{FRAC_PI_2, PI};
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// Closed energy interval `[left, right]` in eV.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EnergyInterval {
    /// Lower bound.
    pub left: f64,
    /// Upper bound.
    pub right: f64,
}

impl EnergyInterval {
    /// Create an interval; the bounds are not reordered.
    pub const fn new(left: f64, right: f64) -> Self {
        Self { left, right }
    }

    /// Inclusive membership test. A reversed interval (`left > right`) is treated as
    /// `[right, left]`.
    pub fn contains(&self, value: f64) -> bool {
        let (lo, hi) = if self.left <= self.right { (self.left, self.right) } else { (self.right, self.left) };
        lo <= value && value <= hi
    }

    /// Interval width.
    pub fn width(&self) -> f64 {
        (self.right - self.left).abs()
    }
}

/// Solid angle of a cone with the given half-opening angle (radians):
/// `Ω(x) = 2π(1 − cos x)`.
pub fn cone_solid_angle(half_opening: f64) -> f64 {
    2.0 * PI * (1.0 - half_opening.cos())
}

/// Interval of viewing inclinations measured from the torus axis, in degrees.
///
/// The interval is mirrored on both hemispheres: its solid angle counts the two belts
/// `2·(Ω(end) − Ω(begin))`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ViewingInterval {
    /// Start inclination (deg).
    pub begin_deg: f64,
    /// Interval length (deg).
    pub length_deg: f64,
}

impl ViewingInterval {
    /// Create an interval `[begin, begin + length]` in degrees.
    pub fn new(begin_deg: f64, length_deg: f64) -> Result<Self> {
        if !(begin_deg.is_finite() && length_deg.is_finite()) || length_deg <= 0.0 {
            return Err(Error::Validation(format!(
                "viewing interval must have finite bounds and positive length, got ({begin_deg}, {length_deg})"
            )));
        }
        if begin_deg < 0.0 || begin_deg + length_deg > 90.0 {
            return Err(Error::Validation(format!(
                "viewing interval [{begin_deg}, {}] must lie within [0, 90] degrees",
                begin_deg + length_deg
            )));
        }
        Ok(Self { begin_deg, length_deg })
    }

    /// End inclination (deg).
    pub fn end_deg(&self) -> f64 {
        self.begin_deg + self.length_deg
    }

    /// Bounds in radians `(α, β)`.
    pub fn radians(&self) -> (f64, f64) {
        (self.begin_deg.to_radians(), self.end_deg().to_radians())
    }

    /// Solid angle of both belts, `2·(Ω(β) − Ω(α))`.
    pub fn solid_angle(&self) -> f64 {
        let (alpha, beta) = self.radians();
        2.0 * (cone_solid_angle(beta) - cone_solid_angle(alpha))
    }

    /// Whether a photon escaping with elevation `phi` (radians above the equatorial
    /// plane) is seen from this interval: `π/2 − β ≤ φ ≤ π/2 − α`.
    pub fn accepts_elevation(&self, phi: f64) -> bool {
        let (alpha, beta) = self.radians();
        FRAC_PI_2 - beta <= phi && phi <= FRAC_PI_2 - alpha
    }

    /// Short label, e.g. `6075` for `[60°, 75°]`.
    pub fn code(&self) -> String {
        format!("{}{}", self.begin_deg.round() as i64, self.end_deg().round() as i64)
    }
}

impl fmt::Display for ViewingInterval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.code())
    }
}

impl FromStr for ViewingInterval {
    type Err = Error;

    fn from_str(code: &str) -> Result<Self> {
        let invalid = || Error::InvalidEnumValue { kind: "viewing interval", value: code.to_string() };
        if code.is_empty() || code.len() % 2 != 0 || !code.bytes().all(|b| b.is_ascii_digit()) {
            return Err(invalid());
        }
        let (begin, end) = code.split_at(code.len() / 2);
        let begin: f64 = begin.parse().map_err(|_| invalid())?;
        let end: f64 = end.parse().map_err(|_| invalid())?;
        ViewingInterval::new(begin, end - begin).map_err(|_| invalid())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_energy_interval_inclusive() {
        let i = EnergyInterval::new(6000.0, 7000.0);
        assert!(i.contains(6000.0));
        assert!(i.contains(7000.0));
        assert!(!i.contains(7000.1));
        assert!(EnergyInterval::new(7000.0, 6000.0).contains(6500.0));
    }

    #[test]
    fn test_cone_solid_angle() {
        assert_relative_eq!(cone_solid_angle(FRAC_PI_2), 2.0 * PI, epsilon = 1e-12);
        assert_relative_eq!(cone_solid_angle(0.0), 0.0);
    }

    #[test]
    fn test_viewing_solid_angle_full_sphere() {
        let v = ViewingInterval::new(0.0, 90.0).unwrap();
        assert_relative_eq!(v.solid_angle(), 4.0 * PI, epsilon = 1e-12);
    }

    #[test]
    fn test_viewing_solid_angle_belt() {
        let v = ViewingInterval::new(60.0, 15.0).unwrap();
        let expected = 2.0 * 2.0 * PI * (60f64.to_radians().cos() - 75f64.to_radians().cos());
        assert_relative_eq!(v.solid_angle(), expected, epsilon = 1e-12);
    }

    #[test]
    fn test_accepts_elevation() {
        let v = ViewingInterval::new(60.0, 15.0).unwrap();
        assert!(v.accepts_elevation(20f64.to_radians()));
        assert!(v.accepts_elevation(15.001f64.to_radians()));
        assert!(v.accepts_elevation(29.999f64.to_radians()));
        assert!(!v.accepts_elevation(31f64.to_radians()));
        assert!(!v.accepts_elevation(10f64.to_radians()));
    }

    #[test]
    fn test_code_round_trip() {
        let v: ViewingInterval = "7590".parse().unwrap();
        assert_eq!(v.begin_deg, 75.0);
        assert_eq!(v.length_deg, 15.0);
        assert_eq!(v.code(), "7590");
        assert!("759".parse::<ViewingInterval>().is_err());
        assert!("9060".parse::<ViewingInterval>().is_err());
    }
}
