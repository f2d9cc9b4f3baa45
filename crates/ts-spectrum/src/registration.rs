//! Registration of photons into per-(column density, type, line) spectra.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::fs::File;
use std::io::BufReader;
use std::path::PathBuf;
use std::str::FromStr;

use rayon::prelude::*;
use serde::Serialize;
use ts_core::{Error, ProcessingConfig, Result, ViewingInterval};

use crate::anomaly::AnomalyLog;
use crate::axis::LogAxis;
use crate::grid::{ColumnDensityGrid, TorusGeometry};
use crate::io::PhotonReader;
use crate::photon::{FluorescentLine, PhotonObservation, PhotonType};
use crate::spectrum::SpectrumCount;

/// Identity of one accumulated spectrum.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RegistrationKey {
    /// Column-density bin.
    pub nh_index: usize,
    /// Photon classification.
    pub photon_type: PhotonType,
    /// Fluorescent line.
    pub line: FluorescentLine,
}

impl fmt::Display for RegistrationKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}_{}_{}", self.nh_index, self.photon_type.label(), self.line.label())
    }
}

impl FromStr for RegistrationKey {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let mut parts = s.splitn(3, '_');
        let (Some(nh), Some(ty), Some(line)) = (parts.next(), parts.next(), parts.next()) else {
            return Err(Error::InvalidEnumValue { kind: "registration key", value: s.to_string() });
        };
        let nh_index = nh
            .parse()
            .map_err(|_| Error::InvalidEnumValue { kind: "registration key", value: s.to_string() })?;
        Ok(Self { nh_index, photon_type: ty.parse()?, line: line.parse()? })
    }
}

/// Photon counters of one run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RunStats {
    /// Photon records read.
    pub photons_seen: usize,
    /// Photons inside the viewing interval.
    pub accepted: usize,
    /// Photons outside the viewing interval.
    pub outside_viewing: usize,
    /// Malformed lines skipped by the reader.
    pub malformed_skipped: usize,
}

impl RunStats {
    fn add(&mut self, other: &RunStats) {
        self.photons_seen += other.photons_seen;
        self.accepted += other.accepted;
        self.outside_viewing += other.outside_viewing;
        self.malformed_skipped += other.malformed_skipped;
    }
}

/// Accumulates photons of one simulation into spectra.
#[derive(Debug, Clone)]
pub struct SpectraBuilder {
    energy_axis: LogAxis,
    grid: ColumnDensityGrid,
    viewing: ViewingInterval,
    n_h: f64,
    set: SpectrumSet,
}

impl SpectraBuilder {
    /// Builder binning energies on `energy_axis` and column densities on `grid`.
    pub fn new(
        energy_axis: LogAxis,
        grid: ColumnDensityGrid,
        geometry: &TorusGeometry,
        viewing: ViewingInterval,
    ) -> Result<Self> {
        let n_h = geometry.hydrogen_concentration()?;
        Ok(Self { set: SpectrumSet::empty(&energy_axis), energy_axis, grid, viewing, n_h })
    }

    /// Register one photon (lengths already in processing units).
    pub fn register(&mut self, photon: &PhotonObservation) -> Result<()> {
        let set = &mut self.set;
        set.stats.photons_seen += 1;
        let energy = photon.energy();

        if photon.photon_type() == PhotonType::Source {
            set.reference.count_photon(energy, &mut set.anomalies, Some("reference"))?;
        }
        if !self.viewing.accepts_elevation(photon.phi()) {
            set.stats.outside_viewing += 1;
            return Ok(());
        }

        let nh = photon.effective_column_density(self.n_h);
        let located = self.grid.axis().locate(nh);
        if let Some(side) = located.clamped
            && nh > 0.0
        {
            set.anomalies.record("column density", nh, side, None);
        }
        let key = RegistrationKey { nh_index: located.index, photon_type: photon.photon_type(), line: photon.line() };
        let context = self.energy_axis.locate(energy).clamped.map(|_| key.to_string());
        set.spectra
            .entry(key)
            .or_insert_with(|| SpectrumCount::build_log_empty(&self.energy_axis))
            .count_photon(energy, &mut set.anomalies, context.as_deref())?;

        set.effective_lengths.push(photon.effective_length());
        set.stats.accepted += 1;
        Ok(())
    }

    /// Record malformed lines skipped upstream.
    pub fn note_skipped(&mut self, n: usize) {
        self.set.stats.malformed_skipped += n;
    }

    /// The accumulated spectra.
    pub fn finish(self) -> SpectrumSet {
        self.set
    }
}

/// All spectra of one simulation (or of several merged ones).
#[derive(Debug, Clone)]
pub struct SpectrumSet {
    spectra: BTreeMap<RegistrationKey, SpectrumCount>,
    reference: SpectrumCount,
    effective_lengths: Vec<f64>,
    anomalies: AnomalyLog,
    stats: RunStats,
}

impl SpectrumSet {
    /// Set without any photon.
    pub fn empty(energy_axis: &LogAxis) -> Self {
        Self {
            spectra: BTreeMap::new(),
            reference: SpectrumCount::build_log_empty(energy_axis),
            effective_lengths: Vec::new(),
            anomalies: AnomalyLog::new(),
            stats: RunStats::default(),
        }
    }

    /// Spectra by key, in key order.
    pub fn spectra(&self) -> &BTreeMap<RegistrationKey, SpectrumCount> {
        &self.spectra
    }

    /// Spectrum of `key`.
    pub fn get(&self, key: &RegistrationKey) -> Option<&SpectrumCount> {
        self.spectra.get(key)
    }

    /// All-sky SOURCE spectrum used for normalisation.
    pub fn reference(&self) -> &SpectrumCount {
        &self.reference
    }

    /// Effective lengths of the accepted photons.
    pub fn effective_lengths(&self) -> &[f64] {
        &self.effective_lengths
    }

    /// Clamped values.
    pub fn anomalies(&self) -> &AnomalyLog {
        &self.anomalies
    }

    /// Photon counters.
    pub fn stats(&self) -> &RunStats {
        &self.stats
    }

    /// Fold `other` into `self`. Spectra are added bin by bin, so the result does not
    /// depend on the merge order.
    pub fn merge(&mut self, other: SpectrumSet) -> Result<()> {
        for (key, spectrum) in other.spectra {
            match self.spectra.get_mut(&key) {
                Some(existing) => existing.merge(&spectrum)?,
                None => {
                    self.spectra.insert(key, spectrum);
                }
            }
        }
        self.reference.merge(&other.reference)?;
        self.effective_lengths.extend(other.effective_lengths);
        self.anomalies.merge(&other.anomalies);
        self.stats.add(&other.stats);
        Ok(())
    }

    /// Column-density bins with at least one spectrum.
    pub fn nh_indices(&self) -> BTreeSet<usize> {
        self.spectra.keys().map(|k| k.nh_index).collect()
    }

    fn collect(&self, what: &str, mut keep: impl FnMut(&RegistrationKey) -> bool) -> Result<SpectrumCount> {
        let selected: Vec<&SpectrumCount> =
            self.spectra.iter().filter(|(k, _)| keep(k)).map(|(_, s)| s).collect();
        if selected.is_empty() {
            return Err(Error::MissingInput(format!("no {what} photons")));
        }
        SpectrumCount::merged(selected)
    }

    /// NOINTERACTION + SCATTERING photons of bin `nh`.
    pub fn continuum(&self, nh: usize) -> Result<SpectrumCount> {
        self.collect(&format!("continuum (nh bin {nh})"), |k| {
            k.nh_index == nh && matches!(k.photon_type, PhotonType::NoInteraction | PhotonType::Scattering)
        })
    }

    /// SOURCE + NOINTERACTION photons of bin `nh`.
    pub fn transmitted(&self, nh: usize) -> Result<SpectrumCount> {
        self.collect(&format!("transmitted (nh bin {nh})"), |k| {
            k.nh_index == nh && matches!(k.photon_type, PhotonType::Source | PhotonType::NoInteraction)
        })
    }

    /// SCATTERING photons of bin `nh`.
    pub fn compton(&self, nh: usize) -> Result<SpectrumCount> {
        self.collect(&format!("scattered (nh bin {nh})"), |k| {
            k.nh_index == nh && k.photon_type == PhotonType::Scattering
        })
    }

    /// FLUORESCENT photons of `line` in bin `nh`.
    pub fn line(&self, nh: usize, line: FluorescentLine) -> Result<SpectrumCount> {
        self.collect(&format!("{line} (nh bin {nh})"), |k| {
            k.nh_index == nh && k.photon_type == PhotonType::Fluorescent && k.line == line
        })
    }

    /// SOURCE photons inside the viewing interval, all bins together.
    pub fn source(&self) -> Result<SpectrumCount> {
        self.collect("source", |k| k.photon_type == PhotonType::Source)
    }
}

/// Bin the photon files of one simulation, one rayon task per file.
pub fn build_from_files(
    paths: &[PathBuf],
    config: &ProcessingConfig,
    geometry: &TorusGeometry,
    viewing: ViewingInterval,
) -> Result<SpectrumSet> {
    let energy_axis = LogAxis::from_config(&config.energy)?;
    let grid = ColumnDensityGrid::from_config(&config.column_density)?;
    let template = SpectraBuilder::new(energy_axis, grid, geometry, viewing)?;

    let partial: Vec<Result<SpectrumSet>> = paths
        .par_iter()
        .map(|path| {
            let mut builder = template.clone();
            let file = File::open(path).inspect_err(|e| log::warn!("{}: {e}", path.display()))?;
            let mut reader = PhotonReader::new(BufReader::new(file), config.malformed_lines);
            for photon in reader.by_ref() {
                let photon = photon.inspect_err(|e| log::warn!("{}: {e}", path.display()))?;
                builder.register(&photon.in_units(config.length_to_cm))?;
            }
            builder.note_skipped(reader.records_skipped());
            log::info!("{}: {} lines, {} skipped", path.display(), reader.lines_read(), reader.records_skipped());
            Ok(builder.finish())
        })
        .collect();

    let mut set = template.finish();
    for part in partial {
        set.merge(part?)?;
    }
    if !set.anomalies.is_empty() {
        set.anomalies.log_summary();
    }
    Ok(set)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn builder() -> SpectraBuilder {
        let axis = LogAxis::new(100.0, 300_000.0, 2000).unwrap();
        let grid = ColumnDensityGrid::build(1e22, 2e24, 30).unwrap();
        let geometry = TorusGeometry::new(0.0, 1.0, 1.0, 1e23).unwrap();
        SpectraBuilder::new(axis, grid, &geometry, ViewingInterval::new(0.0, 90.0).unwrap()).unwrap()
    }

    fn photon(energy: f64, phi: f64, ty: PhotonType, line: FluorescentLine, eff_len: f64) -> PhotonObservation {
        PhotonObservation::new(energy, 0.0, phi, ty, line, 1, eff_len).unwrap()
    }

    #[test]
    fn test_key_display_round_trip() {
        let key = RegistrationKey { nh_index: 13, photon_type: PhotonType::Fluorescent, line: FluorescentLine::FeKalpha };
        assert_eq!(key.to_string(), "13_FLUORESCENT_FeKalpha");
        assert_eq!(key.to_string().parse::<RegistrationKey>().unwrap(), key);
        assert!("x_SOURCE_NONE".parse::<RegistrationKey>().is_err());
    }

    #[test]
    fn test_register_routes_by_key() {
        let mut b = builder();
        // n_H = 1e23 cm^-3, so an effective length of 1 lands in the 1e23 bin (13).
        b.register(&photon(6404.0, 0.5, PhotonType::Fluorescent, FluorescentLine::FeKalpha, 1.0)).unwrap();
        b.register(&photon(8000.0, 0.5, PhotonType::Scattering, FluorescentLine::None, 1.0)).unwrap();
        b.register(&photon(9000.0, 0.5, PhotonType::NoInteraction, FluorescentLine::None, 1.0)).unwrap();
        b.register(&photon(1000.0, 0.5, PhotonType::Source, FluorescentLine::None, 0.0)).unwrap();
        let set = b.finish();

        assert_eq!(set.spectra().len(), 4);
        assert_eq!(set.nh_indices(), BTreeSet::from([0, 13]));
        assert_eq!(set.continuum(13).unwrap().total(), 2.0);
        assert_eq!(set.compton(13).unwrap().total(), 1.0);
        assert_eq!(set.line(13, FluorescentLine::FeKalpha).unwrap().total(), 1.0);
        assert_eq!(set.transmitted(13).unwrap().total(), 1.0);
        assert_eq!(set.source().unwrap().total(), 1.0);
        assert_eq!(set.reference().total(), 1.0);
        assert!(matches!(set.line(0, FluorescentLine::FeKalpha), Err(Error::MissingInput(_))));
        assert_eq!(set.stats().accepted, 4);
        assert_eq!(set.effective_lengths().len(), 4);
    }

    #[test]
    fn test_viewing_filter_keeps_reference() {
        let axis = LogAxis::new(100.0, 300_000.0, 2000).unwrap();
        let grid = ColumnDensityGrid::build(1e22, 2e24, 30).unwrap();
        let geometry = TorusGeometry::new(0.0, 1.0, 1.0, 1e23).unwrap();
        let viewing = ViewingInterval::new(60.0, 15.0).unwrap();
        let mut b = SpectraBuilder::new(axis, grid, &geometry, viewing).unwrap();

        b.register(&photon(1000.0, 1.2, PhotonType::Source, FluorescentLine::None, 0.0)).unwrap();
        b.register(&photon(1000.0, 0.35, PhotonType::Source, FluorescentLine::None, 0.0)).unwrap();
        let set = b.finish();
        assert_eq!(set.reference().total(), 2.0);
        assert_eq!(set.source().unwrap().total(), 1.0);
        assert_eq!(set.stats().outside_viewing, 1);
    }
}
