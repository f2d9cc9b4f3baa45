//! Conversion of photon counts into normalised flux densities.
//!
//! Counts are scaled against the all-sky reference (source) spectrum at a fixed
//! normalisation energy, then divided by the observing solid angle and the bin width:
//!
//! ```text
//! norm = Ω_ref · width[k] / reference[k]
//! F_i  = x_i · y_i · norm / (Ω · width_i)
//! ```
//!
//! For a single column-density bin the solid angle is weighted by the probability of that
//! bin, `p(nh) · Ω`.

use ts_core::{Error, ProcessingConfig, Result, ViewingInterval};

use crate::axis::LogAxis;
use crate::distribution::ColumnDensityDistribution;
use crate::spectrum::{Spectrum, SpectrumCount, check_columns};

/// Widths `b_{i+1} − b_i` of the energy bins.
pub fn log_energy_widths(axis: &LogAxis) -> Vec<f64> {
    axis.widths()
}

/// Where and over which solid angle the reference spectrum is evaluated.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NormalizationParameters {
    /// Normalisation energy (eV).
    pub energy: f64,
    /// Solid angle of the reference spectrum (sr).
    pub solid_angle: f64,
    /// Energy axis shared by all spectra.
    pub axis: LogAxis,
}

impl NormalizationParameters {
    /// Parameters from the processing configuration.
    pub fn from_config(cfg: &ProcessingConfig) -> Result<Self> {
        Ok(Self {
            energy: cfg.normalization.energy,
            solid_angle: cfg.normalization.solid_angle,
            axis: LogAxis::from_config(&cfg.energy)?,
        })
    }
}

/// `Ω_ref · width[k] / reference.y[k]` with `k` the bin of the normalisation energy.
pub fn normalization_factor(
    params: &NormalizationParameters,
    reference: &SpectrumCount,
    widths: &[f64],
) -> Result<f64> {
    let k = params.axis.locate(params.energy).index;
    let (Some(&count), Some(&width)) = (reference.y().get(k), widths.get(k)) else {
        return Err(Error::Validation(format!(
            "reference spectrum ({} bins) does not cover normalisation bin {k}",
            reference.len()
        )));
    };
    if count <= 0.0 {
        return Err(Error::Computation(format!(
            "reference spectrum is empty at the normalisation energy {} eV",
            params.energy
        )));
    }
    Ok(params.solid_angle * width / count)
}

/// Flux density spectrum.
#[derive(Debug, Clone, PartialEq)]
pub struct FluxDensity {
    x: Vec<f64>,
    y: Vec<f64>,
    y_err: Vec<f64>,
}

impl FluxDensity {
    /// Flux density from explicit columns.
    pub fn new(x: Vec<f64>, y: Vec<f64>, y_err: Vec<f64>) -> Result<Self> {
        check_columns(&x, &y, &y_err)?;
        Ok(Self { x, y, y_err })
    }
}

impl Spectrum for FluxDensity {
    fn from_samples(x: Vec<f64>, y: Vec<f64>, y_err: Vec<f64>) -> Self {
        Self { x, y, y_err }
    }

    fn x(&self) -> &[f64] {
        &self.x
    }

    fn y(&self) -> &[f64] {
        &self.y
    }

    fn y_err(&self) -> &[f64] {
        &self.y_err
    }
}

/// Normalises count spectra binned on one energy axis.
#[derive(Debug, Clone)]
pub struct FluxDensityBuilder {
    params: NormalizationParameters,
    widths: Vec<f64>,
}

impl FluxDensityBuilder {
    /// Builder for `params`.
    pub fn new(params: NormalizationParameters) -> Self {
        Self { widths: log_energy_widths(&params.axis), params }
    }

    /// Energy bin widths.
    pub fn widths(&self) -> &[f64] {
        &self.widths
    }

    /// Flux density of a spectrum seen from `viewing` (no column-density weighting).
    pub fn normalization_flux_density(
        &self,
        spectrum: &SpectrumCount,
        reference: &SpectrumCount,
        viewing: &ViewingInterval,
    ) -> Result<FluxDensity> {
        self.convert(spectrum, reference, viewing.solid_angle())
    }

    /// Flux density of the spectrum of one column-density bin; the solid angle is
    /// weighted by `distribution.value_for(nh)`.
    pub fn flux_density_for_nh(
        &self,
        spectrum: &SpectrumCount,
        reference: &SpectrumCount,
        viewing: &ViewingInterval,
        nh: f64,
        distribution: &ColumnDensityDistribution,
    ) -> Result<FluxDensity> {
        let p = distribution.value_for(nh);
        if p <= 0.0 {
            return Err(Error::Computation(format!(
                "column density {nh:e} has zero probability in the distribution"
            )));
        }
        self.convert(spectrum, reference, p * viewing.solid_angle())
    }

    fn convert(&self, spectrum: &SpectrumCount, reference: &SpectrumCount, omega: f64) -> Result<FluxDensity> {
        if spectrum.len() != self.widths.len() {
            return Err(Error::Validation(format!(
                "spectrum has {} bins, energy axis has {}",
                spectrum.len(),
                self.widths.len()
            )));
        }
        let norm = normalization_factor(&self.params, reference, &self.widths)?;
        let (mut y, mut y_err) = (Vec::with_capacity(spectrum.len()), Vec::with_capacity(spectrum.len()));
        for ((x, count, err), width) in spectrum.iter().zip(&self.widths) {
            let k = x * norm / (omega * width);
            y.push(count * k);
            y_err.push(err * k);
        }
        Ok(FluxDensity { x: spectrum.x().to_vec(), y, y_err })
    }
}
