//! Photon records emitted by the transport simulation.
//!
//! Two whitespace-separated layouts are accepted:
//!
//! ```text
//! hv θ φ type line n_clouds eff_len                                  (7 fields)
//! hv θ φ type line n_scat total_path n_clouds x y z eff_len          (12 fields)
//! ```
//!
//! A scattering count or total path of `-1` means "unknown".

use std::fmt;
use std::str::FromStr;

use ts_core::{Error, Result};

/// How the photon left the torus.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum PhotonType {
    /// Emitted by the central source (reference spectrum).
    Source,
    /// Escaped without interacting.
    NoInteraction,
    /// Escaped after at least one Compton scattering.
    Scattering,
    /// Re-emitted as a fluorescent line photon.
    Fluorescent,
}

impl PhotonType {
    /// All variants in code order.
    pub const ALL: [PhotonType; 4] =
        [PhotonType::Source, PhotonType::NoInteraction, PhotonType::Scattering, PhotonType::Fluorescent];

    /// Decode a numeric type code (0–3).
    pub fn from_code(code: i64) -> Result<Self> {
        match code {
            0 => Ok(PhotonType::Source),
            1 => Ok(PhotonType::NoInteraction),
            2 => Ok(PhotonType::Scattering),
            3 => Ok(PhotonType::Fluorescent),
            _ => Err(Error::InvalidEnumValue { kind: "photon type", value: code.to_string() }),
        }
    }

    /// Numeric code.
    pub fn code(self) -> i64 {
        match self {
            PhotonType::Source => 0,
            PhotonType::NoInteraction => 1,
            PhotonType::Scattering => 2,
            PhotonType::Fluorescent => 3,
        }
    }

    /// Upper-case label used in file names.
    pub fn label(self) -> &'static str {
        match self {
            PhotonType::Source => "SOURCE",
            PhotonType::NoInteraction => "NOINTERACTION",
            PhotonType::Scattering => "SCATTERING",
            PhotonType::Fluorescent => "FLUORESCENT",
        }
    }
}

impl fmt::Display for PhotonType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for PhotonType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        if let Ok(code) = s.parse::<i64>() {
            return PhotonType::from_code(code);
        }
        PhotonType::ALL
            .into_iter()
            .find(|t| t.label().eq_ignore_ascii_case(s))
            .ok_or_else(|| Error::InvalidEnumValue { kind: "photon type", value: s.to_string() })
    }
}

/// Fluorescent line a photon belongs to (`None` for continuum photons).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[allow(missing_docs)]
pub enum FluorescentLine {
    None,
    CKalpha,
    NKalpha,
    OKalpha,
    NeKalpha,
    NaKalpha,
    MgKalpha,
    AlKalpha,
    SiKalpha,
    SKalpha,
    ArKalpha,
    CaKalpha,
    CrKalpha,
    FeKalpha,
    NiKalpha,
    Unknown,
}

impl FluorescentLine {
    /// All variants in code order.
    pub const ALL: [FluorescentLine; 16] = [
        FluorescentLine::None,
        FluorescentLine::CKalpha,
        FluorescentLine::NKalpha,
        FluorescentLine::OKalpha,
        FluorescentLine::NeKalpha,
        FluorescentLine::NaKalpha,
        FluorescentLine::MgKalpha,
        FluorescentLine::AlKalpha,
        FluorescentLine::SiKalpha,
        FluorescentLine::SKalpha,
        FluorescentLine::ArKalpha,
        FluorescentLine::CaKalpha,
        FluorescentLine::CrKalpha,
        FluorescentLine::FeKalpha,
        FluorescentLine::NiKalpha,
        FluorescentLine::Unknown,
    ];

    /// Decode a numeric line code (0–15).
    pub fn from_code(code: i64) -> Result<Self> {
        usize::try_from(code)
            .ok()
            .and_then(|i| Self::ALL.get(i).copied())
            .ok_or_else(|| Error::InvalidEnumValue { kind: "fluorescent line", value: code.to_string() })
    }

    /// Numeric code.
    pub fn code(self) -> i64 {
        self as i64
    }

    /// Label used in file names.
    pub fn label(self) -> &'static str {
        match self {
            FluorescentLine::None => "NONE",
            FluorescentLine::CKalpha => "CKalpha",
            FluorescentLine::NKalpha => "NKalpha",
            FluorescentLine::OKalpha => "OKalpha",
            FluorescentLine::NeKalpha => "NeKalpha",
            FluorescentLine::NaKalpha => "NaKalpha",
            FluorescentLine::MgKalpha => "MgKalpha",
            FluorescentLine::AlKalpha => "AlKalpha",
            FluorescentLine::SiKalpha => "SiKalpha",
            FluorescentLine::SKalpha => "SKalpha",
            FluorescentLine::ArKalpha => "ArKalpha",
            FluorescentLine::CaKalpha => "CaKalpha",
            FluorescentLine::CrKalpha => "CrKalpha",
            FluorescentLine::FeKalpha => "FeKalpha",
            FluorescentLine::NiKalpha => "NiKalpha",
            FluorescentLine::Unknown => "UNKNOWN",
        }
    }
}

impl fmt::Display for FluorescentLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for FluorescentLine {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        if let Ok(code) = s.parse::<i64>() {
            return FluorescentLine::from_code(code);
        }
        FluorescentLine::ALL
            .into_iter()
            .find(|l| l.label().eq_ignore_ascii_case(s))
            .ok_or_else(|| Error::InvalidEnumValue { kind: "fluorescent line", value: s.to_string() })
    }
}

/// One escaped photon.
#[derive(Debug, Clone, PartialEq)]
pub struct PhotonObservation {
    energy: f64,
    theta: f64,
    phi: f64,
    photon_type: PhotonType,
    line: FluorescentLine,
    n_scatterings: Option<u32>,
    total_path: Option<f64>,
    n_clouds: u32,
    escape_position: Option<[f64; 3]>,
    effective_length: f64,
}

impl PhotonObservation {
    /// Create a photon without transport details (the 7-field layout).
    pub fn new(
        energy: f64,
        theta: f64,
        phi: f64,
        photon_type: PhotonType,
        line: FluorescentLine,
        n_clouds: u32,
        effective_length: f64,
    ) -> Result<Self> {
        if !(energy.is_finite() && energy > 0.0) {
            return Err(Error::Validation(format!("photon energy must be positive, got {energy}")));
        }
        if !(effective_length.is_finite() && effective_length >= 0.0) {
            return Err(Error::Validation(format!(
                "effective length must be non-negative, got {effective_length}"
            )));
        }
        Ok(Self {
            energy,
            theta,
            phi,
            photon_type,
            line,
            n_scatterings: None,
            total_path: None,
            n_clouds,
            escape_position: None,
            effective_length,
        })
    }

    /// Attach the transport details carried by the 12-field layout.
    pub fn with_transport(
        mut self,
        n_scatterings: Option<u32>,
        total_path: Option<f64>,
        escape_position: Option<[f64; 3]>,
    ) -> Self {
        self.n_scatterings = n_scatterings;
        self.total_path = total_path;
        self.escape_position = escape_position;
        self
    }

    /// Parse one record line.
    pub fn parse(line: &str) -> Result<Self> {
        let tokens: Vec<&str> = line.split_whitespace().collect();
        let fields = Fields { line, tokens: &tokens };
        match tokens.len() {
            7 => {
                let photon = PhotonObservation::new(
                    fields.float(0, "energy")?,
                    fields.float(1, "theta")?,
                    fields.float(2, "phi")?,
                    PhotonType::from_code(fields.int(3, "type")?)?,
                    FluorescentLine::from_code(fields.int(4, "line")?)?,
                    fields.count(5, "n_clouds")?,
                    fields.float(6, "effective_length")?,
                );
                photon.map_err(|e| Error::format(line, e.to_string()))
            }
            12 => {
                let n_scatterings = match fields.int(5, "n_scatterings")? {
                    -1 => None,
                    n => Some(u32::try_from(n).map_err(|_| fields.bad(5, "n_scatterings"))?),
                };
                let total_path = match fields.float(6, "total_path")? {
                    p if p == -1.0 => None,
                    p => Some(p),
                };
                let position = [fields.float(8, "x")?, fields.float(9, "y")?, fields.float(10, "z")?];
                let photon = PhotonObservation::new(
                    fields.float(0, "energy")?,
                    fields.float(1, "theta")?,
                    fields.float(2, "phi")?,
                    PhotonType::from_code(fields.int(3, "type")?)?,
                    FluorescentLine::from_code(fields.int(4, "line")?)?,
                    fields.count(7, "n_clouds")?,
                    fields.float(11, "effective_length")?,
                )
                .map_err(|e| Error::format(line, e.to_string()))?;
                Ok(photon.with_transport(n_scatterings, total_path, Some(position)))
            }
            n => Err(Error::format(line, format!("expected 7 or 12 fields, got {n}"))),
        }
    }

    /// Copy with every length multiplied by `length_scale`; energy and angles unchanged.
    pub fn in_units(&self, length_scale: f64) -> Self {
        Self {
            total_path: self.total_path.map(|p| p * length_scale),
            escape_position: self.escape_position.map(|p| p.map(|c| c * length_scale)),
            effective_length: self.effective_length * length_scale,
            ..self.clone()
        }
    }

    /// Column density crossed along the escape path, `n_h · effective_length`.
    pub fn effective_column_density(&self, hydrogen_concentration: f64) -> f64 {
        hydrogen_concentration * self.effective_length
    }

    /// Energy (eV).
    pub fn energy(&self) -> f64 {
        self.energy
    }

    /// Polar escape angle (rad).
    pub fn theta(&self) -> f64 {
        self.theta
    }

    /// Elevation of the escape direction above the equatorial plane (rad).
    pub fn phi(&self) -> f64 {
        self.phi
    }

    /// Photon classification.
    pub fn photon_type(&self) -> PhotonType {
        self.photon_type
    }

    /// Fluorescent line.
    pub fn line(&self) -> FluorescentLine {
        self.line
    }

    /// Number of scatterings, when known.
    pub fn n_scatterings(&self) -> Option<u32> {
        self.n_scatterings
    }

    /// Total travelled path, when known.
    pub fn total_path(&self) -> Option<f64> {
        self.total_path
    }

    /// Number of clouds crossed.
    pub fn n_clouds(&self) -> u32 {
        self.n_clouds
    }

    /// Escape position, when known.
    pub fn escape_position(&self) -> Option<[f64; 3]> {
        self.escape_position
    }

    /// Path length inside absorbing clouds.
    pub fn effective_length(&self) -> f64 {
        self.effective_length
    }
}

impl fmt::Display for PhotonObservation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "energy:           {} eV", self.energy)?;
        writeln!(f, "theta, phi:       {}, {}", self.theta, self.phi)?;
        writeln!(f, "type:             {}", self.photon_type)?;
        writeln!(f, "line:             {}", self.line)?;
        match self.n_scatterings {
            Some(n) => writeln!(f, "scatterings:      {n}")?,
            None => writeln!(f, "scatterings:      unknown")?,
        }
        match self.total_path {
            Some(p) => writeln!(f, "total path:       {p}")?,
            None => writeln!(f, "total path:       unknown")?,
        }
        writeln!(f, "clouds:           {}", self.n_clouds)?;
        if let Some([x, y, z]) = self.escape_position {
            writeln!(f, "escape position:  ({x}, {y}, {z})")?;
        }
        write!(f, "effective length: {}", self.effective_length)
    }
}

struct Fields<'a> {
    line: &'a str,
    tokens: &'a [&'a str],
}

impl Fields<'_> {
    fn bad(&self, i: usize, field: &str) -> Error {
        Error::format(self.line, format!("invalid {field} field {:?}", self.tokens[i]))
    }

    fn float(&self, i: usize, field: &str) -> Result<f64> {
        self.tokens[i].parse::<f64>().map_err(|_| self.bad(i, field))
    }

    /// Integer field; integral floats such as `3.0` are accepted.
    fn int(&self, i: usize, field: &str) -> Result<i64> {
        let token = self.tokens[i];
        if let Ok(v) = token.parse::<i64>() {
            return Ok(v);
        }
        match token.parse::<f64>() {
            Ok(v) if v.fract() == 0.0 && v.abs() < i64::MAX as f64 => Ok(v as i64),
            _ => Err(self.bad(i, field)),
        }
    }

    fn count(&self, i: usize, field: &str) -> Result<u32> {
        u32::try_from(self.int(i, field)?).map_err(|_| self.bad(i, field))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_parse_short_record() {
        let p = PhotonObservation::parse("6404.0 0.3 0.4 3 13 2 1.5").unwrap();
        assert_eq!(p.energy(), 6404.0);
        assert_eq!(p.photon_type(), PhotonType::Fluorescent);
        assert_eq!(p.line(), FluorescentLine::FeKalpha);
        assert_eq!(p.n_clouds(), 2);
        assert_eq!(p.n_scatterings(), None);
        assert_eq!(p.escape_position(), None);
        assert_eq!(p.effective_length(), 1.5);
    }

    #[test]
    fn test_parse_long_record() {
        let p = PhotonObservation::parse("8000 0.1 0.2 2 0 4 12.5 3 1.0 -2.0 0.5 0.75").unwrap();
        assert_eq!(p.photon_type(), PhotonType::Scattering);
        assert_eq!(p.n_scatterings(), Some(4));
        assert_eq!(p.total_path(), Some(12.5));
        assert_eq!(p.escape_position(), Some([1.0, -2.0, 0.5]));
        assert_eq!(p.effective_length(), 0.75);

        let unknown = PhotonObservation::parse("8000 0.1 0.2 1 0 -1 -1 0 0 0 0 0").unwrap();
        assert_eq!(unknown.n_scatterings(), None);
        assert_eq!(unknown.total_path(), None);
    }

    #[test]
    fn test_parse_errors() {
        let err = PhotonObservation::parse("1 2 3").unwrap_err();
        assert!(matches!(err, Error::Format { .. }));
        assert!(err.to_string().contains("1 2 3"));

        let err = PhotonObservation::parse("abc 0.3 0.4 3 13 2 1.5").unwrap_err();
        assert!(err.to_string().contains("energy"));

        let err = PhotonObservation::parse("6404 0.3 0.4 7 13 2 1.5").unwrap_err();
        assert!(matches!(err, Error::InvalidEnumValue { kind: "photon type", .. }));

        let err = PhotonObservation::parse("6404 0.3 0.4 3 16 2 1.5").unwrap_err();
        assert!(matches!(err, Error::InvalidEnumValue { kind: "fluorescent line", .. }));

        assert!(PhotonObservation::parse("-5 0.3 0.4 3 13 2 1.5").is_err());
    }

    #[test]
    fn test_enum_labels() {
        assert_eq!("NOINTERACTION".parse::<PhotonType>().unwrap(), PhotonType::NoInteraction);
        assert_eq!("2".parse::<PhotonType>().unwrap(), PhotonType::Scattering);
        assert_eq!("FeKalpha".parse::<FluorescentLine>().unwrap(), FluorescentLine::FeKalpha);
        assert_eq!(FluorescentLine::from_code(15).unwrap(), FluorescentLine::Unknown);
        for line in FluorescentLine::ALL {
            assert_eq!(FluorescentLine::from_code(line.code()).unwrap(), line);
        }
    }

    #[test]
    fn test_in_units_scales_lengths_only() {
        let p = PhotonObservation::parse("8000 0.1 0.2 2 0 4 12.5 3 1.0 -2.0 0.5 0.75").unwrap();
        let cm = p.in_units(100.0);
        assert_eq!(cm.energy(), 8000.0);
        assert_eq!(cm.phi(), 0.2);
        assert_relative_eq!(cm.effective_length(), 75.0);
        assert_relative_eq!(cm.total_path().unwrap(), 1250.0);
        assert_eq!(cm.escape_position(), Some([100.0, -200.0, 50.0]));
        assert_relative_eq!(cm.effective_column_density(1e20), 7.5e21);
    }

    #[test]
    fn test_display_dump() {
        let p = PhotonObservation::parse("6404.0 0.3 0.4 3 13 2 1.5").unwrap();
        let dump = p.to_string();
        assert!(dump.contains("FLUORESCENT"));
        assert!(dump.contains("FeKalpha"));
        assert!(dump.contains("scatterings:      unknown"));
    }
}
