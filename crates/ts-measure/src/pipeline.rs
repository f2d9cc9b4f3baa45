//! Reduction of one simulation: binned spectra in, measurements out.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use ts_core::{Error, ProcessingConfig, Result, ViewingInterval};
use ts_spectrum::{
    ColumnDensityDistribution, FluorescentLine, FluxDensity, FluxDensityBuilder, NormalizationParameters,
    SpectrumCount, SpectrumSet,
};

use crate::aggregate::{MeasurementAggregator, MeasurementReport, SpectralData};
use crate::key::{AverageColumnDensity, IronAbundance, MeasurementKey};

/// Parameters that identify a simulation run.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RunIdentity {
    /// Average column density.
    pub nh_aver: AverageColumnDensity,
    /// Average number of clouds per sight line.
    pub n_aver: u32,
    /// Iron abundance.
    pub abundance: IronAbundance,
    /// Viewing interval the spectra were collected from.
    pub viewing: ViewingInterval,
}

impl RunIdentity {
    /// Key of column-density bin `nh_index`.
    pub fn key(&self, nh_index: usize) -> MeasurementKey {
        MeasurementKey {
            nh_aver: self.nh_aver,
            n_aver: self.n_aver,
            abundance: self.abundance,
            viewing: self.viewing,
            nh_index,
        }
    }
}

fn optional<T>(component: Result<T>) -> Result<Option<T>> {
    match component {
        Ok(v) => Ok(Some(v)),
        Err(Error::MissingInput(reason)) => {
            log::debug!("{reason}");
            Ok(None)
        }
        Err(e) => Err(e),
    }
}

/// Turns a [`SpectrumSet`] into per-bin [`SpectralData`] and measures it.
#[derive(Debug)]
pub struct ReductionPipeline<'a> {
    set: &'a SpectrumSet,
    distribution: &'a ColumnDensityDistribution,
    identity: RunIdentity,
    flux: FluxDensityBuilder,
}

impl<'a> ReductionPipeline<'a> {
    /// Pipeline over `set`, whose photons are distributed over column density as in
    /// `distribution`.
    pub fn new(
        config: &ProcessingConfig,
        set: &'a SpectrumSet,
        distribution: &'a ColumnDensityDistribution,
        identity: RunIdentity,
    ) -> Result<Self> {
        let flux = FluxDensityBuilder::new(NormalizationParameters::from_config(config)?);
        Ok(Self { set, distribution, identity, flux })
    }

    /// Run identity.
    pub fn identity(&self) -> &RunIdentity {
        &self.identity
    }

    /// Flux densities and counts of bin `nh_index`; absent components stay `None`.
    pub fn spectral_data(&self, nh_index: usize) -> Result<SpectralData> {
        let grid = self.distribution.grid();
        let nh = grid.midpoint(nh_index).ok_or_else(|| {
            Error::Validation(format!("column-density bin {nh_index} is outside a grid of {} bins", grid.len()))
        })?;
        let reference = self.set.reference();
        let viewing = &self.identity.viewing;
        let to_flux = |counts: &SpectrumCount| {
            self.flux.flux_density_for_nh(counts, reference, viewing, nh, self.distribution)
        };

        let continuum = optional(self.set.continuum(nh_index))?;
        let line = optional(self.set.line(nh_index, FluorescentLine::FeKalpha))?;
        Ok(SpectralData {
            line_flux_density: line.as_ref().map(to_flux).transpose()?,
            continuum_flux_density: continuum.as_ref().map(to_flux).transpose()?,
            continuum_spectrum: continuum,
        })
    }

    /// Spectral data of `nh_indices` (every bin with photons when `None`). Bins whose
    /// data cannot be prepared are returned as skipped.
    pub fn inputs(
        &self,
        nh_indices: Option<&[usize]>,
    ) -> Result<(BTreeMap<MeasurementKey, SpectralData>, Vec<(MeasurementKey, String)>)> {
        let indices: Vec<usize> = match nh_indices {
            Some(indices) => indices.to_vec(),
            None => self.set.nh_indices().into_iter().collect(),
        };
        let mut inputs = BTreeMap::new();
        let mut skipped = Vec::new();
        for i in indices {
            let key = self.identity.key(i);
            match self.spectral_data(i) {
                Ok(data) => {
                    inputs.insert(key, data);
                }
                Err(e) if e.is_recoverable() => {
                    log::warn!("skipping {key}: {e}");
                    skipped.push((key, e.to_string()));
                }
                Err(e) => return Err(e),
            }
        }
        Ok((inputs, skipped))
    }

    /// Measure the requested bins.
    pub fn reduce(&self, aggregator: &MeasurementAggregator, nh_indices: Option<&[usize]>) -> Result<MeasurementReport> {
        let (inputs, skipped) = self.inputs(nh_indices)?;
        let mut report = aggregator.run(&inputs)?;
        report.skipped.extend(skipped);
        report.skipped.sort_by(|a, b| a.0.cmp(&b.0));
        Ok(report)
    }

    /// Flux density of the SOURCE photons seen from the viewing interval, without
    /// column-density weighting.
    pub fn source_flux_density(&self) -> Result<FluxDensity> {
        let source = self.set.source()?;
        self.flux.normalization_flux_density(&source, self.set.reference(), &self.identity.viewing)
    }
}
