//! Per-key measurement with skip-on-failure.

use std::collections::BTreeMap;

use rayon::prelude::*;
use serde::Serialize;
use ts_core::{EnergyInterval, Error, ProcessingConfig, Result};
use ts_inference::AbsorptionEdgeFitter;
use ts_spectrum::{FluxDensity, SpectrumCount};

use crate::key::MeasurementKey;
use crate::observables::{compton_shoulder, edge_depth, equivalent_width, hardness_ratio};
use crate::record::MeasurementValue;

/// Spectral inputs of one key. Every component is required by [`MeasurementAggregator::measure`].
#[derive(Debug, Clone, Default)]
pub struct SpectralData {
    /// Fe Kα line flux density.
    pub line_flux_density: Option<FluxDensity>,
    /// Continuum flux density.
    pub continuum_flux_density: Option<FluxDensity>,
    /// Continuum counts, for the edge fit.
    pub continuum_spectrum: Option<SpectrumCount>,
}

fn required<'a, T>(component: &'a Option<T>, name: &str, key: &MeasurementKey) -> Result<&'a T> {
    component.as_ref().ok_or_else(|| Error::MissingInput(format!("{key}: no {name}")))
}

/// Records in key order and the keys that were skipped with their reason.
#[derive(Debug, Clone, Default, Serialize)]
pub struct MeasurementReport {
    /// Successful measurements.
    pub records: BTreeMap<MeasurementKey, MeasurementValue>,
    /// Keys whose measurement failed recoverably.
    pub skipped: Vec<(MeasurementKey, String)>,
}

/// Evaluates the four observables for many keys.
#[derive(Debug, Clone)]
pub struct MeasurementAggregator {
    continuum_at_line: EnergyInterval,
    hardness_low: EnergyInterval,
    hardness_high: EnergyInterval,
    shoulder_right: f64,
    fitter: AbsorptionEdgeFitter,
}

impl MeasurementAggregator {
    /// Aggregator with the windows and edge regions of `config`.
    pub fn new(config: &ProcessingConfig) -> Result<Self> {
        let w = &config.windows;
        Ok(Self {
            continuum_at_line: w.continuum_at_line,
            hardness_low: w.hardness_low,
            hardness_high: w.hardness_high,
            shoulder_right: w.shoulder_right,
            fitter: AbsorptionEdgeFitter::from_config(&config.edge)?,
        })
    }

    /// Edge fitter in use.
    pub fn fitter(&self) -> &AbsorptionEdgeFitter {
        &self.fitter
    }

    /// Measure one key.
    pub fn measure(&self, key: &MeasurementKey, data: &SpectralData) -> Result<MeasurementValue> {
        let line = required(&data.line_flux_density, "line flux density", key)?;
        let continuum = required(&data.continuum_flux_density, "continuum flux density", key)?;
        let counts = required(&data.continuum_spectrum, "continuum spectrum", key)?;

        let ew = equivalent_width(line, continuum, &self.continuum_at_line)?;
        let hardness = hardness_ratio(continuum, &self.hardness_low, &self.hardness_high)?;
        let shoulder = compton_shoulder(line, self.shoulder_right)?;
        let edge = edge_depth(counts, &self.fitter)?;
        Ok(MeasurementValue {
            ew,
            hardness,
            shoulder,
            edge: edge.depth,
            edge_chi2: edge.chi2,
            edge_dof: edge.dof,
        })
    }

    /// Measure every key in parallel. Recoverable failures skip the key; any other error
    /// aborts the run.
    pub fn run(&self, inputs: &BTreeMap<MeasurementKey, SpectralData>) -> Result<MeasurementReport> {
        let outcomes: Vec<(MeasurementKey, Result<MeasurementValue>)> =
            inputs.par_iter().map(|(key, data)| (*key, self.measure(key, data))).collect();

        let mut report = MeasurementReport::default();
        for (key, outcome) in outcomes {
            match outcome {
                Ok(value) => {
                    report.records.insert(key, value);
                }
                Err(e) if e.is_recoverable() => {
                    log::warn!("skipping {key}: {e}");
                    report.skipped.push((key, e.to_string()));
                }
                Err(e) => return Err(e),
            }
        }
        log::info!("measured {} keys, skipped {}", report.records.len(), report.skipped.len());
        Ok(report)
    }
}
