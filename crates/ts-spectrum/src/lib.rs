//! # ts-spectrum
//!
//! From photon records to normalised spectra.
//!
//! - [`photon`]: record parser and photon classification
//! - [`axis`], [`grid`], [`distribution`]: logarithmic axes, the column-density grid and
//!   the distribution of photons over it
//! - [`spectrum`], [`registration`]: energy binning per (column density, type, line)
//! - [`flux`]: normalisation of counts into flux densities
//! - [`io`]: streaming readers and text writers
//!
//! Nothing here keeps global state; axes and grids are built from a
//! [`ts_core::ProcessingConfig`] and borrowed by the builders.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod anomaly;
pub mod axis;
pub mod distribution;
pub mod flux;
pub mod grid;
pub mod io;
pub mod photon;
pub mod registration;
pub mod spectrum;

pub use anomaly::AnomalyLog;
pub use axis::{ClampSide, Located, LogAxis};
pub use distribution::ColumnDensityDistribution;
pub use flux::{FluxDensity, FluxDensityBuilder, NormalizationParameters};
pub use grid::{ColumnDensityGrid, TorusGeometry, hydrogen_concentration};
pub use io::PhotonReader;
pub use photon::{FluorescentLine, PhotonObservation, PhotonType};
pub use registration::{RegistrationKey, RunStats, SpectraBuilder, SpectrumSet, build_from_files};
pub use spectrum::{Spectrum, SpectrumCount};
