//! Binned spectra.
//!
//! [`SpectrumCount`] holds raw photon counts on an energy axis; [`crate::flux::FluxDensity`]
//! holds normalised flux densities. Both share the [`Spectrum`] helpers.

use ts_core::{EnergyInterval, Error, Result, ValueAndError};

use crate::anomaly::AnomalyLog;
use crate::axis::{LogAxis, Located};

/// Parallel `x`, `y`, `y_err` columns with increasing `x`.
pub trait Spectrum: Sized {
    /// Rebuild from columns of equal length.
    fn from_samples(x: Vec<f64>, y: Vec<f64>, y_err: Vec<f64>) -> Self;

    /// Bin energies (eV).
    fn x(&self) -> &[f64];

    /// Bin values.
    fn y(&self) -> &[f64];

    /// Bin uncertainties.
    fn y_err(&self) -> &[f64];

    /// Number of bins.
    fn len(&self) -> usize {
        self.x().len()
    }

    /// True without bins.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// `(x, y, y_err)` triples.
    fn iter(&self) -> impl Iterator<Item = (f64, f64, f64)> + '_ {
        self.x().iter().zip(self.y()).zip(self.y_err()).map(|((&x, &y), &e)| (x, y, e))
    }

    /// Bins whose energy lies in `interval` (both ends inclusive).
    fn window(&self, interval: &EnergyInterval) -> Self {
        let (mut x, mut y, mut y_err) = (Vec::new(), Vec::new(), Vec::new());
        for (xi, yi, ei) in self.iter().filter(|(xi, _, _)| interval.contains(*xi)) {
            x.push(xi);
            y.push(yi);
            y_err.push(ei);
        }
        Self::from_samples(x, y, y_err)
    }

    /// Trapezoid integral over `x`, with error `sqrt(Σ wᵢ² σᵢ²)`.
    fn integrate(&self) -> ValueAndError {
        let x = self.x();
        let n = x.len();
        if n < 2 {
            return ValueAndError::new(0.0, 0.0);
        }
        let mut value = 0.0;
        let mut var = 0.0;
        for (i, (&y, &e)) in self.y().iter().zip(self.y_err()).enumerate() {
            let lo = x[i.saturating_sub(1)];
            let hi = x[(i + 1).min(n - 1)];
            let w = 0.5 * (hi - lo);
            value += w * y;
            var += (w * e).powi(2);
        }
        ValueAndError::new(value, var.sqrt())
    }

    /// Mean of `y` on `interval`; error `sqrt(Σσ²)/n`.
    fn average(&self, interval: &EnergyInterval) -> Result<ValueAndError> {
        let w = self.window(interval);
        if w.is_empty() {
            return Err(Error::Computation(format!(
                "no bins in [{}, {}] to average",
                interval.left, interval.right
            )));
        }
        let n = w.len() as f64;
        let mean = w.y().iter().sum::<f64>() / n;
        let err = w.y_err().iter().map(|e| e * e).sum::<f64>().sqrt() / n;
        Ok(ValueAndError::new(mean, err))
    }

    /// Copy with `y` and `y_err` multiplied by `k`.
    fn scaled(&self, k: f64) -> Self {
        Self::from_samples(
            self.x().to_vec(),
            self.y().iter().map(|y| y * k).collect(),
            self.y_err().iter().map(|e| e * k.abs()).collect(),
        )
    }
}

/// Photon counts on an energy axis; `y_err = sqrt(y)`.
#[derive(Debug, Clone, PartialEq)]
pub struct SpectrumCount {
    axis: Option<LogAxis>,
    x: Vec<f64>,
    y: Vec<f64>,
    y_err: Vec<f64>,
}

impl SpectrumCount {
    /// Zero counts at the midpoints of `axis`.
    pub fn build_log_empty(axis: &LogAxis) -> Self {
        let n = axis.len();
        Self { axis: Some(*axis), x: axis.midpoints(), y: vec![0.0; n], y_err: vec![0.0; n] }
    }

    /// Spectrum from explicit columns (e.g. read from a file).
    pub fn new(x: Vec<f64>, y: Vec<f64>, y_err: Vec<f64>) -> Result<Self> {
        check_columns(&x, &y, &y_err)?;
        Ok(Self { axis: None, x, y, y_err })
    }

    /// The axis the counts were binned on, if known.
    pub fn axis(&self) -> Option<&LogAxis> {
        self.axis.as_ref()
    }

    /// Count one photon of `energy`. Out-of-axis energies are clamped into the edge bin
    /// and recorded in `anomalies`. Returns the bin index.
    pub fn count_photon(&mut self, energy: f64, anomalies: &mut AnomalyLog, context: Option<&str>) -> Result<usize> {
        let axis = self
            .axis
            .ok_or_else(|| Error::Validation("cannot count photons into a spectrum without an energy axis".into()))?;
        let Located { index, clamped } = axis.locate(energy);
        if let Some(side) = clamped {
            anomalies.record("energy", energy, side, context);
        }
        self.y[index] += 1.0;
        self.y_err[index] = self.y[index].sqrt();
        Ok(index)
    }

    /// Add `other` bin by bin; both must share the same `x`.
    pub fn merge(&mut self, other: &SpectrumCount) -> Result<()> {
        if self.x != other.x {
            return Err(Error::Validation(format!(
                "cannot merge spectra with different energy axes ({} vs {} bins)",
                self.x.len(),
                other.x.len()
            )));
        }
        for (i, y) in other.y.iter().enumerate() {
            self.y[i] += y;
            self.y_err[i] = self.y[i].sqrt();
        }
        if self.axis.is_none() {
            self.axis = other.axis;
        }
        Ok(())
    }

    /// Sum of several spectra.
    pub fn merged<'a>(spectra: impl IntoIterator<Item = &'a SpectrumCount>) -> Result<SpectrumCount> {
        let mut iter = spectra.into_iter();
        let mut acc = iter
            .next()
            .cloned()
            .ok_or_else(|| Error::MissingInput("no spectra to merge".into()))?;
        for s in iter {
            acc.merge(s)?;
        }
        Ok(acc)
    }

    /// Total number of counts.
    pub fn total(&self) -> f64 {
        self.y.iter().sum()
    }
}

impl Spectrum for SpectrumCount {
    fn from_samples(x: Vec<f64>, y: Vec<f64>, y_err: Vec<f64>) -> Self {
        Self { axis: None, x, y, y_err }
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

pub(crate) fn check_columns(x: &[f64], y: &[f64], y_err: &[f64]) -> Result<()> {
    if x.len() != y.len() || x.len() != y_err.len() {
        return Err(Error::Validation(format!(
            "spectrum columns differ in length: x={}, y={}, y_err={}",
            x.len(),
            y.len(),
            y_err.len()
        )));
    }
    if x.windows(2).any(|w| w[1] <= w[0]) {
        return Err(Error::Validation("spectrum energies must be strictly increasing".into()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn energy_axis() -> LogAxis {
        LogAxis::new(100.0, 300_000.0, 2000).unwrap()
    }

    #[test]
    fn test_k_counts_at_one_energy() {
        let mut s = SpectrumCount::build_log_empty(&energy_axis());
        let mut log = AnomalyLog::new();
        for _ in 0..25 {
            s.count_photon(6404.0, &mut log, None).unwrap();
        }
        assert_eq!(s.y()[1039], 25.0);
        assert_eq!(s.y_err()[1039], 5.0);
        assert_eq!(s.total(), 25.0);
        assert!(log.is_empty());
    }

    #[test]
    fn test_clamp_is_recorded() {
        let mut s = SpectrumCount::build_log_empty(&energy_axis());
        let mut log = AnomalyLog::new();
        assert_eq!(s.count_photon(300_000.0, &mut log, Some("k")).unwrap(), 1999);
        assert_eq!(log.len(), 1);
    }

    #[test]
    fn test_merge_is_order_independent() {
        let axis = LogAxis::new(1.0, 100.0, 4).unwrap();
        let mut log = AnomalyLog::new();
        let mut a = SpectrumCount::build_log_empty(&axis);
        let mut b = SpectrumCount::build_log_empty(&axis);
        let mut c = SpectrumCount::build_log_empty(&axis);
        for e in [1.5, 2.0, 50.0] {
            a.count_photon(e, &mut log, None).unwrap();
        }
        b.count_photon(20.0, &mut log, None).unwrap();
        c.count_photon(2.0, &mut log, None).unwrap();

        let abc = SpectrumCount::merged([&a, &b, &c]).unwrap();
        let cba = SpectrumCount::merged([&c, &b, &a]).unwrap();
        assert_eq!(abc.y(), cba.y());
        assert_eq!(abc.y()[0], 3.0);
        assert_relative_eq!(abc.y_err()[0], 3f64.sqrt());

        let other = SpectrumCount::build_log_empty(&LogAxis::new(1.0, 100.0, 5).unwrap());
        assert!(a.merge(&other).is_err());
        assert!(SpectrumCount::merged(std::iter::empty()).is_err());
    }

    #[test]
    fn test_window_integrate_average() {
        let s = SpectrumCount::new(
            vec![1.0, 2.0, 3.0, 4.0],
            vec![2.0, 2.0, 2.0, 2.0],
            vec![1.0, 1.0, 1.0, 1.0],
        )
        .unwrap();
        let w = s.window(&EnergyInterval::new(2.0, 4.0));
        assert_eq!(w.x(), &[2.0, 3.0, 4.0]);

        let flux = s.integrate();
        assert_relative_eq!(flux.value, 6.0);
        // weights 0.5, 1, 1, 0.5
        assert_relative_eq!(flux.err, 2.5f64.sqrt());

        let avg = s.average(&EnergyInterval::new(1.0, 2.0)).unwrap();
        assert_relative_eq!(avg.value, 2.0);
        assert_relative_eq!(avg.err, 2f64.sqrt() / 2.0);
        assert!(s.average(&EnergyInterval::new(10.0, 20.0)).is_err());

        let k = s.scaled(3.0);
        assert_relative_eq!(k.integrate().value, 18.0);
    }

    #[test]
    fn test_new_validates_columns() {
        assert!(SpectrumCount::new(vec![1.0, 2.0], vec![1.0], vec![1.0]).is_err());
        assert!(SpectrumCount::new(vec![2.0, 1.0], vec![1.0, 1.0], vec![1.0, 1.0]).is_err());
    }
}
