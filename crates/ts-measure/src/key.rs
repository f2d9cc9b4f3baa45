//! Measurement keys.
//!
//! A key names one simulation and one column-density bin, e.g. `523_5_1xfe_7590_27`:
//! average column density `5e23`, five clouds per sight line, solar iron abundance,
//! viewing angles 75°–90°, column-density bin 27.

use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use ts_core::{Error, Result, ViewingInterval};

/// Average column density of a simulation, `mantissa · 10^exponent` cm⁻².
///
/// Coded as the exponent alone for a unit mantissa (`1e23 → "23"`) and as the mantissa
/// digit followed by the exponent otherwise (`2e23 → "223"`, `5e23 → "523"`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct AverageColumnDensity {
    mantissa: u8,
    exponent: u8,
}

impl AverageColumnDensity {
    /// `1e23` cm⁻².
    pub const E23: Self = Self { mantissa: 1, exponent: 23 };
    /// `2e23` cm⁻².
    pub const E223: Self = Self { mantissa: 2, exponent: 23 };
    /// `5e23` cm⁻².
    pub const E523: Self = Self { mantissa: 5, exponent: 23 };

    /// From a single-digit mantissa and a two-digit exponent.
    pub fn new(mantissa: u8, exponent: u8) -> Result<Self> {
        if !(1..=9).contains(&mantissa) || !(10..=99).contains(&exponent) {
            return Err(Error::Validation(format!(
                "average column density {mantissa}e{exponent} has no code"
            )));
        }
        Ok(Self { mantissa, exponent })
    }

    /// Recover the code of a value such as `2e23`.
    pub fn from_value(value: f64) -> Result<Self> {
        if !(value.is_finite() && value > 0.0) {
            return Err(Error::Validation(format!("average column density must be positive, got {value}")));
        }
        let exponent = value.log10().floor();
        let mantissa = value / 10f64.powf(exponent);
        let rounded = mantissa.round();
        if (mantissa - rounded).abs() > 1e-9 * mantissa {
            return Err(Error::Validation(format!(
                "average column density {value:e} is not an integer multiple of a power of ten"
            )));
        }
        // 9.9999..e22 rounds to mantissa 10
        let (mantissa, exponent) = if rounded >= 10.0 { (1.0, exponent + 1.0) } else { (rounded, exponent) };
        if !(0.0..=255.0).contains(&exponent) {
            return Err(Error::Validation(format!("average column density {value:e} has no code")));
        }
        Self::new(mantissa as u8, exponent as u8)
    }

    /// Value in cm⁻².
    pub fn value(&self) -> f64 {
        f64::from(self.mantissa) * 10f64.powi(i32::from(self.exponent))
    }

    /// File code, e.g. `"223"`.
    pub fn code(&self) -> String {
        if self.mantissa == 1 { self.exponent.to_string() } else { format!("{}{}", self.mantissa, self.exponent) }
    }
}

impl Ord for AverageColumnDensity {
    fn cmp(&self, other: &Self) -> Ordering {
        (self.exponent, self.mantissa).cmp(&(other.exponent, other.mantissa))
    }
}

impl PartialOrd for AverageColumnDensity {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for AverageColumnDensity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.code())
    }
}

impl FromStr for AverageColumnDensity {
    type Err = Error;

    fn from_str(code: &str) -> Result<Self> {
        let invalid = || Error::InvalidEnumValue { kind: "average column density", value: code.to_string() };
        if !code.bytes().all(|b| b.is_ascii_digit()) {
            return Err(invalid());
        }
        let (mantissa, exponent) = match code.len() {
            2 => (1, code.parse::<u8>().map_err(|_| invalid())?),
            3 => {
                let (m, e) = code.split_at(1);
                (m.parse::<u8>().map_err(|_| invalid())?, e.parse::<u8>().map_err(|_| invalid())?)
            }
            _ => return Err(invalid()),
        };
        // "123" would duplicate "23"
        if code.len() == 3 && mantissa == 1 {
            return Err(invalid());
        }
        Self::new(mantissa, exponent).map_err(|_| invalid())
    }
}

impl Serialize for AverageColumnDensity {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.code())
    }
}

impl<'de> Deserialize<'de> for AverageColumnDensity {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let code = String::deserialize(deserializer)?;
        code.parse().map_err(serde::de::Error::custom)
    }
}

/// Iron abundance relative to solar.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum IronAbundance {
    /// 0.5 solar.
    #[serde(rename = "05xfe")]
    Half,
    /// 0.7 solar.
    #[serde(rename = "07xfe")]
    SevenTenths,
    /// Solar.
    #[serde(rename = "1xfe")]
    Solar,
    /// 1.5 solar.
    #[serde(rename = "15xfe")]
    OneAndHalf,
    /// Twice solar.
    #[serde(rename = "2xfe")]
    Double,
}

impl IronAbundance {
    /// All abundances, increasing.
    pub const ALL: [IronAbundance; 5] = [
        IronAbundance::Half,
        IronAbundance::SevenTenths,
        IronAbundance::Solar,
        IronAbundance::OneAndHalf,
        IronAbundance::Double,
    ];

    /// File code, e.g. `"1xfe"`.
    pub fn code(self) -> &'static str {
        match self {
            IronAbundance::Half => "05xfe",
            IronAbundance::SevenTenths => "07xfe",
            IronAbundance::Solar => "1xfe",
            IronAbundance::OneAndHalf => "15xfe",
            IronAbundance::Double => "2xfe",
        }
    }

    /// Abundance relative to solar.
    pub fn value(self) -> f64 {
        match self {
            IronAbundance::Half => 0.5,
            IronAbundance::SevenTenths => 0.7,
            IronAbundance::Solar => 1.0,
            IronAbundance::OneAndHalf => 1.5,
            IronAbundance::Double => 2.0,
        }
    }
}

impl fmt::Display for IronAbundance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

impl FromStr for IronAbundance {
    type Err = Error;

    fn from_str(code: &str) -> Result<Self> {
        IronAbundance::ALL
            .into_iter()
            .find(|a| a.code() == code)
            .ok_or_else(|| Error::InvalidEnumValue { kind: "iron abundance", value: code.to_string() })
    }
}

/// Identity of one measurement: simulation parameters plus column-density bin.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct MeasurementKey {
    /// Average column density of the simulation.
    pub nh_aver: AverageColumnDensity,
    /// Average number of clouds per sight line.
    pub n_aver: u32,
    /// Iron abundance.
    pub abundance: IronAbundance,
    /// Viewing interval.
    pub viewing: ViewingInterval,
    /// Column-density grid bin.
    pub nh_index: usize,
}

impl MeasurementKey {
    fn viewing_bits(&self) -> (u64, u64) {
        (self.viewing.begin_deg.to_bits(), self.viewing.length_deg.to_bits())
    }
}

impl PartialEq for MeasurementKey {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for MeasurementKey {}

impl Ord for MeasurementKey {
    fn cmp(&self, other: &Self) -> Ordering {
        self.nh_aver
            .cmp(&other.nh_aver)
            .then(self.n_aver.cmp(&other.n_aver))
            .then(self.abundance.cmp(&other.abundance))
            .then(self.viewing.begin_deg.total_cmp(&other.viewing.begin_deg))
            .then(self.viewing.length_deg.total_cmp(&other.viewing.length_deg))
            .then(self.nh_index.cmp(&other.nh_index))
    }
}

impl PartialOrd for MeasurementKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Hash for MeasurementKey {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.nh_aver.hash(state);
        self.n_aver.hash(state);
        self.abundance.hash(state);
        self.viewing_bits().hash(state);
        self.nh_index.hash(state);
    }
}

impl fmt::Display for MeasurementKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}_{}_{}_{}_{}", self.nh_aver, self.n_aver, self.abundance, self.viewing, self.nh_index)
    }
}

impl FromStr for MeasurementKey {
    type Err = Error;

    fn from_str(label: &str) -> Result<Self> {
        let parts: Vec<&str> = label.split('_').collect();
        let &[nh_aver, n_aver, abundance, viewing, nh_index] = parts.as_slice() else {
            return Err(Error::format(label, format!("expected 5 '_'-separated fields, got {}", parts.len())));
        };
        Ok(MeasurementKey {
            nh_aver: nh_aver.parse()?,
            n_aver: n_aver
                .parse()
                .map_err(|_| Error::format(label, format!("cloud count {n_aver:?} is not an integer")))?,
            abundance: abundance.parse()?,
            viewing: viewing.parse()?,
            nh_index: nh_index
                .parse()
                .map_err(|_| Error::format(label, format!("bin index {nh_index:?} is not an integer")))?,
        })
    }
}

impl TryFrom<String> for MeasurementKey {
    type Error = Error;

    fn try_from(label: String) -> Result<Self> {
        label.parse()
    }
}

impl From<MeasurementKey> for String {
    fn from(key: MeasurementKey) -> String {
        key.to_string()
    }
}
