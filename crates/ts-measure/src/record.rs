//! Measurements text format.
//!
//! One record per line:
//!
//! ```text
//! 523_5_1xfe_7590_27#148.4:9.5   10.81:0.13    0.284:0.035    0.707:0.288:13.43:20
//! ```
//!
//! i.e. `key#ew:err   hardness:err    shoulder:err    edge:err:chi2:dof`.

use std::collections::BTreeMap;
use std::fmt;
use std::io::{BufRead, Write};

use serde::{Deserialize, Serialize};
use ts_core::{Error, Result, ValueAndError};

use crate::aggregate::MeasurementReport;
use crate::key::MeasurementKey;

/// The four observables of one key.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MeasurementValue {
    /// Fe Kα equivalent width (eV).
    pub ew: ValueAndError,
    /// Hardness ratio.
    pub hardness: ValueAndError,
    /// Compton shoulder fraction.
    pub shoulder: ValueAndError,
    /// Edge depth `1 − N`.
    pub edge: ValueAndError,
    /// Pearson χ² of the edge fit.
    pub edge_chi2: f64,
    /// Degrees of freedom of the edge fit.
    pub edge_dof: usize,
}

impl fmt::Display for MeasurementValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:{}   {}:{}    {}:{}    {}:{}:{}:{}",
            self.ew.value,
            self.ew.err,
            self.hardness.value,
            self.hardness.err,
            self.shoulder.value,
            self.shoulder.err,
            self.edge.value,
            self.edge.err,
            self.edge_chi2,
            self.edge_dof
        )
    }
}

fn number(line: &str, field: &str, text: &str) -> Result<f64> {
    text.parse().map_err(|_| Error::format(line, format!("{field} {text:?} is not a number")))
}

fn pair(line: &str, field: &str, text: &str) -> Result<ValueAndError> {
    let Some((value, err)) = text.split_once(':') else {
        return Err(Error::format(line, format!("{field} must be value:err, got {text:?}")));
    };
    Ok(ValueAndError::new(number(line, field, value)?, number(line, field, err)?))
}

/// Parse one measurements line.
pub fn parse_measurement(line: &str) -> Result<(MeasurementKey, MeasurementValue)> {
    let line = line.trim();
    let Some((key, rest)) = line.split_once('#') else {
        return Err(Error::format(line, "missing '#' between key and values"));
    };
    let key: MeasurementKey = key.parse()?;
    let fields: Vec<&str> = rest.split_whitespace().collect();
    let &[ew, hardness, shoulder, edge] = fields.as_slice() else {
        return Err(Error::format(line, format!("expected 4 value groups, got {}", fields.len())));
    };
    let edge_parts: Vec<&str> = edge.split(':').collect();
    let &[edge_value, edge_err, chi2, dof] = edge_parts.as_slice() else {
        return Err(Error::format(line, format!("edge must be value:err:chi2:dof, got {edge:?}")));
    };
    let value = MeasurementValue {
        ew: pair(line, "ew", ew)?,
        hardness: pair(line, "hardness", hardness)?,
        shoulder: pair(line, "shoulder", shoulder)?,
        edge: ValueAndError::new(number(line, "edge", edge_value)?, number(line, "edge error", edge_err)?),
        edge_chi2: number(line, "chi2", chi2)?,
        edge_dof: dof.parse().map_err(|_| Error::format(line, format!("dof {dof:?} is not an integer")))?,
    };
    Ok((key, value))
}

/// Write the records of `report` in key order.
pub fn write_measurements<W: Write>(mut writer: W, report: &MeasurementReport) -> Result<()> {
    for (key, value) in &report.records {
        writeln!(writer, "{key}#{value}")?;
    }
    writer.flush()?;
    Ok(())
}

/// Read a measurements file. Blank lines are ignored; a repeated key is a
/// [`Error::Format`] at the second occurrence.
pub fn read_measurements<R: BufRead>(reader: R) -> Result<BTreeMap<MeasurementKey, MeasurementValue>> {
    let mut records = BTreeMap::new();
    for (i, line) in reader.lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let (key, value) = parse_measurement(&line).map_err(|e| e.at_line(i + 1))?;
        if records.contains_key(&key) {
            return Err(Error::format(line.as_str(), format!("duplicate measurement key {key}")).at_line(i + 1));
        }
        records.insert(key, value);
    }
    Ok(records)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    const LINE: &str = "523_5_1xfe_7590_27#148.40451467268772:9.5012966217946   \
                        10.81218885277748:0.12967704020506401    \
                        0.28384380437824447:0.03464267951399144    \
                        0.7066970916271619:0.2879696561324931:13.431194255571947:20";

    #[test]
    fn test_parse_measurement() {
        let (key, value) = parse_measurement(LINE).unwrap();
        assert_eq!(key.to_string(), "523_5_1xfe_7590_27");
        assert_relative_eq!(value.ew.value, 148.40451467268772);
        assert_relative_eq!(value.hardness.err, 0.12967704020506401);
        assert_relative_eq!(value.shoulder.value, 0.28384380437824447);
        assert_relative_eq!(value.edge.err, 0.2879696561324931);
        assert_relative_eq!(value.edge_chi2, 13.431194255571947);
        assert_eq!(value.edge_dof, 20);
    }

    #[test]
    fn test_display_reproduces_line() {
        let (key, value) = parse_measurement(LINE).unwrap();
        let written = format!("{key}#{value}");
        let expected: Vec<&str> = LINE.split_whitespace().collect();
        assert_eq!(written.split_whitespace().collect::<Vec<_>>(), expected);
    }

    #[test]
    fn test_parse_rejects_malformed() {
        assert!(matches!(parse_measurement("523_5_1xfe_7590_27 1:2"), Err(Error::Format { .. })));
        assert!(matches!(parse_measurement("523_5_1xfe_7590_27#1:2 3:4 5:6"), Err(Error::Format { .. })));
        assert!(matches!(parse_measurement("523_5_1xfe_7590_27#1:2 3:4 5:6 7:8:9"), Err(Error::Format { .. })));
        assert!(matches!(parse_measurement("523_5_1xfe_7590_27#1:x 3:4 5:6 7:8:9:1"), Err(Error::Format { .. })));
        assert!(matches!(parse_measurement("523_5_1xfe_7590_27#1:2 3:4 5:6 7:8:9:1.5"), Err(Error::Format { .. })));
        assert!(matches!(parse_measurement("523_5_3xfe_7590_27#1:2 3:4 5:6 7:8:9:1"), Err(Error::InvalidEnumValue { .. })));
    }

    #[test]
    fn test_read_measurements_reports_line_number() {
        let text = format!("{LINE}\n\n523_5_1xfe_7590_28#bad\n");
        let err = read_measurements(text.as_bytes()).unwrap_err();
        assert!(matches!(err, Error::Format { line_no: Some(3), .. }), "{err}");
    }

    #[test]
    fn test_read_measurements_rejects_duplicate_key() {
        let first = "523_5_1xfe_7590_27#1:1 1:1 1:1 1:1:1:1";
        let second = "523_5_1xfe_7590_27#2:1 1:1 1:1 1:1:1:1";
        let text = format!("{first}\n\n{second}\n");
        let err = read_measurements(text.as_bytes()).unwrap_err();
        match err {
            Error::Format { line_no, reason, .. } => {
                assert_eq!(line_no, Some(3));
                assert!(reason.contains("523_5_1xfe_7590_27"), "{reason}");
            }
            other => panic!("expected a format error, got {other}"),
        }
    }

    #[test]
    fn test_write_then_read() {
        let (key, value) = parse_measurement(LINE).unwrap();
        let mut report = MeasurementReport::default();
        report.records.insert(key, value);
        let mut buf = Vec::new();
        write_measurements(&mut buf, &report).unwrap();
        let back = read_measurements(buf.as_slice()).unwrap();
        assert_eq!(back.get(&key), Some(&value));
    }
}
