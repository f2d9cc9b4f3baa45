//! Plain-text readers and writers.
//!
//! * photon record files, streamed line by line through [`PhotonReader`];
//! * spectrum files, one `x y y_err` row per bin;
//! * effective-length files, one value per line.

use std::io::{BufRead, Lines, Write};

use ts_core::{Error, MalformedLinePolicy, Result};

use crate::flux::FluxDensity;
use crate::photon::PhotonObservation;
use crate::spectrum::{Spectrum, SpectrumCount};

/// Streaming iterator over the photon records of a reader.
///
/// Blank lines are ignored. Malformed lines are handled by the [`MalformedLinePolicy`]:
/// `Abort` yields the error and stops, `Skip` logs and counts the line. I/O errors always
/// stop the iteration.
pub struct PhotonReader<R> {
    lines: Lines<R>,
    policy: MalformedLinePolicy,
    lines_read: usize,
    records_skipped: usize,
    done: bool,
}

impl<R: BufRead> PhotonReader<R> {
    /// Wrap `reader`.
    pub fn new(reader: R, policy: MalformedLinePolicy) -> Self {
        Self { lines: reader.lines(), policy, lines_read: 0, records_skipped: 0, done: false }
    }

    /// Lines consumed so far, blank ones included.
    pub fn lines_read(&self) -> usize {
        self.lines_read
    }

    /// Malformed lines skipped so far.
    pub fn records_skipped(&self) -> usize {
        self.records_skipped
    }
}

impl<R: BufRead> Iterator for PhotonReader<R> {
    type Item = Result<PhotonObservation>;

    fn next(&mut self) -> Option<Self::Item> {
        while !self.done {
            let line = match self.lines.next()? {
                Ok(line) => line,
                Err(e) => {
                    self.done = true;
                    return Some(Err(e.into()));
                }
            };
            self.lines_read += 1;
            if line.trim().is_empty() {
                continue;
            }
            match PhotonObservation::parse(&line) {
                Ok(photon) => return Some(Ok(photon)),
                Err(e) => {
                    let e = e.at_line(self.lines_read);
                    match self.policy {
                        MalformedLinePolicy::Abort => {
                            self.done = true;
                            return Some(Err(e));
                        }
                        MalformedLinePolicy::Skip => {
                            log::warn!("skipping photon record: {e}");
                            self.records_skipped += 1;
                        }
                    }
                }
            }
        }
        None
    }
}

/// Write one `"{x:.1} {y:.1} {y_err}"` row per bin.
pub fn write_spectrum<W: Write>(mut writer: W, spectrum: &SpectrumCount) -> Result<()> {
    for (x, y, e) in spectrum.iter() {
        writeln!(writer, "{x:.1} {y:.1} {e}")?;
    }
    writer.flush()?;
    Ok(())
}

/// Write a flux density in the spectrum layout, with `y` and `y_err` in full precision.
pub fn write_flux_density<W: Write>(mut writer: W, flux: &FluxDensity) -> Result<()> {
    for (x, y, e) in flux.iter() {
        writeln!(writer, "{x:.1} {y:e} {e:e}")?;
    }
    writer.flush()?;
    Ok(())
}

fn read_columns<R: BufRead>(reader: R) -> Result<(Vec<f64>, Vec<f64>, Vec<f64>)> {
    let (mut x, mut y, mut y_err) = (Vec::new(), Vec::new(), Vec::new());
    for (i, line) in reader.lines().enumerate() {
        let line = line?;
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }
        let values: Vec<f64> = trimmed
            .split_whitespace()
            .take(3)
            .map(str::parse)
            .collect::<std::result::Result<_, _>>()
            .map_err(|_| Error::format(line.as_str(), "non-numeric spectrum column").at_line(i + 1))?;
        let &[xi, yi, ei] = values.as_slice() else {
            return Err(Error::format(line.as_str(), "expected at least 3 columns").at_line(i + 1));
        };
        x.push(xi);
        y.push(yi);
        y_err.push(ei);
    }
    Ok((x, y, y_err))
}

/// Read a count spectrum written by [`write_spectrum`].
pub fn read_spectrum<R: BufRead>(reader: R) -> Result<SpectrumCount> {
    let (x, y, y_err) = read_columns(reader)?;
    SpectrumCount::new(x, y, y_err)
}

/// Read a flux density written by [`write_flux_density`] (or any 3-column spectrum).
pub fn read_flux_density<R: BufRead>(reader: R) -> Result<FluxDensity> {
    let (x, y, y_err) = read_columns(reader)?;
    FluxDensity::new(x, y, y_err)
}

/// Read one effective length per line; blank lines are skipped.
pub fn read_effective_lengths<R: BufRead>(reader: R) -> Result<Vec<f64>> {
    let mut out = Vec::new();
    for (i, line) in reader.lines().enumerate() {
        let line = line?;
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        let v: f64 = trimmed
            .parse()
            .map_err(|_| Error::format(line.as_str(), "effective length is not a number").at_line(i + 1))?;
        out.push(v);
    }
    Ok(out)
}

/// Write one effective length per line.
pub fn write_effective_lengths<W: Write>(mut writer: W, lengths: &[f64]) -> Result<()> {
    for v in lengths {
        writeln!(writer, "{v}")?;
    }
    writer.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use std::io::Cursor;

    const RECORDS: &str = "6404 0.3 0.4 3 13 2 1.5\n\nnot a photon\n7000 0.3 0.4 1 0 0 0.0\n";

    #[test]
    fn test_reader_skips_malformed() {
        let mut reader = PhotonReader::new(Cursor::new(RECORDS), MalformedLinePolicy::Skip);
        let photons: Vec<_> = reader.by_ref().collect::<Result<_>>().unwrap();
        assert_eq!(photons.len(), 2);
        assert_eq!(reader.records_skipped(), 1);
        assert_eq!(reader.lines_read(), 4);
    }

    #[test]
    fn test_reader_aborts_on_malformed() {
        let reader = PhotonReader::new(Cursor::new(RECORDS), MalformedLinePolicy::Abort);
        let results: Vec<_> = reader.collect();
        assert_eq!(results.len(), 2);
        let err = results[1].as_ref().unwrap_err();
        assert!(err.to_string().contains("line 3"));
    }

    #[test]
    fn test_spectrum_file_layout() {
        let s = SpectrumCount::new(vec![100.5, 200.0], vec![4.0, 0.0], vec![2.0, 0.0]).unwrap();
        let mut buf = Vec::new();
        write_spectrum(&mut buf, &s).unwrap();
        let text = String::from_utf8(buf).unwrap();
        assert_eq!(text, "100.5 4.0 2\n200.0 0.0 0\n");

        let back = read_spectrum(Cursor::new(text)).unwrap();
        assert_eq!(back.y(), &[4.0, 0.0]);
    }

    #[test]
    fn test_flux_density_keeps_precision() {
        let f = FluxDensity::new(vec![6400.0], vec![1.25e-7], vec![3.0e-9]).unwrap();
        let mut buf = Vec::new();
        write_flux_density(&mut buf, &f).unwrap();
        let back = read_flux_density(Cursor::new(buf)).unwrap();
        assert_relative_eq!(back.y()[0], 1.25e-7);
        assert_relative_eq!(back.y_err()[0], 3.0e-9);
    }

    #[test]
    fn test_read_spectrum_rejects_short_rows() {
        let err = read_spectrum(Cursor::new("1.0 2.0\n")).unwrap_err();
        assert!(matches!(err, Error::Format { line_no: Some(1), .. }));
    }

    #[test]
    fn test_effective_lengths_file() {
        let mut buf = Vec::new();
        write_effective_lengths(&mut buf, &[0.5, 1.25]).unwrap();
        let back = read_effective_lengths(Cursor::new(buf)).unwrap();
        assert_eq!(back, vec![0.5, 1.25]);
        assert!(read_effective_lengths(Cursor::new("1.0\nabc\n")).is_err());
    }
}
