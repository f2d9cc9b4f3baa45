//! Probability distribution of photons over the column-density grid.

use ts_core::{Error, Result};

use crate::grid::{ColumnDensityGrid, TorusGeometry};

/// Normalised histogram of column-density samples.
#[derive(Debug, Clone)]
pub struct ColumnDensityDistribution {
    grid: ColumnDensityGrid,
    probabilities: Vec<f64>,
    sample_len: usize,
    mean: f64,
    relative_std: f64,
}

impl ColumnDensityDistribution {
    /// Histogram `samples` on `grid` and normalise by the sample count.
    pub fn build(grid: ColumnDensityGrid, samples: &[f64]) -> Result<Self> {
        if samples.is_empty() {
            return Err(Error::Validation("column-density distribution needs at least one sample".into()));
        }
        let mut counts = vec![0usize; grid.len()];
        for &nh in samples {
            counts[grid.index(nh)] += 1;
        }
        let total = samples.len() as f64;
        let probabilities = counts.into_iter().map(|c| c as f64 / total).collect();

        let mean = samples.iter().sum::<f64>() / total;
        let var = samples.iter().map(|&s| (s - mean).powi(2)).sum::<f64>() / total;
        let relative_std = if mean != 0.0 { var.sqrt() / mean } else { 0.0 };

        Ok(Self { grid, probabilities, sample_len: samples.len(), mean, relative_std })
    }

    /// Convert effective lengths to column densities with the geometry's hydrogen
    /// concentration, then [`build`](Self::build).
    pub fn from_effective_lengths(
        grid: ColumnDensityGrid,
        lengths: &[f64],
        geometry: &TorusGeometry,
    ) -> Result<Self> {
        let n_h = geometry.hydrogen_concentration()?;
        let samples: Vec<f64> = lengths.iter().map(|&l| l * n_h).collect();
        Self::build(grid, &samples)
    }

    /// Probability of the bin containing `nh` (clamped into the grid).
    pub fn value_for(&self, nh: f64) -> f64 {
        self.probabilities[self.grid.index(nh)]
    }

    /// Probability of bin `i`.
    pub fn value_at(&self, i: usize) -> Option<f64> {
        self.probabilities.get(i).copied()
    }

    /// Per-bin probabilities; they sum to 1.
    pub fn probabilities(&self) -> &[f64] {
        &self.probabilities
    }

    /// The grid the distribution is defined on.
    pub fn grid(&self) -> &ColumnDensityGrid {
        &self.grid
    }

    /// Number of samples.
    pub fn sample_len(&self) -> usize {
        self.sample_len
    }

    /// Sample mean column density.
    pub fn mean(&self) -> f64 {
        self.mean
    }

    /// Sample standard deviation over the mean.
    pub fn relative_std(&self) -> f64 {
        self.relative_std
    }
}
