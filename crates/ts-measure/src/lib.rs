//! # ts-measure
//!
//! Scalar measurements on reduced spectra.
//!
//! - [`key`]: measurement keys (`523_5_1xfe_7590_27`) and their code tables
//! - [`observables`]: equivalent width, hardness ratio, Compton shoulder, edge depth
//! - [`record`]: the measurements text format
//! - [`aggregate`]: per-key evaluation in parallel with skip-on-failure
//! - [`pipeline`]: from a [`ts_spectrum::SpectrumSet`] to measurements

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod aggregate;
pub mod key;
pub mod observables;
pub mod pipeline;
pub mod record;

pub use aggregate::{MeasurementAggregator, MeasurementReport, SpectralData};
pub use key::{AverageColumnDensity, IronAbundance, MeasurementKey};
pub use observables::{EdgeMeasurement, compton_shoulder, edge_depth, equivalent_width, hardness_ratio};
pub use pipeline::{ReductionPipeline, RunIdentity};
pub use record::{MeasurementValue, parse_measurement, read_measurements, write_measurements};
