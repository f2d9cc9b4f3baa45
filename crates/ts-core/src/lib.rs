//! # ts-core
//!
//! Core types for TorusSpec.
//!
//! This crate provides:
//! - the shared error taxonomy ([`Error`], [`Result`])
//! - value types shared by the reduction stages ([`ValueAndError`], [`FitResult`])
//! - the processing configuration ([`ProcessingConfig`])
//! - energy / viewing-angle intervals and small physics helpers
//!
//! ## Architecture
//!
//! Every other crate depends on this one and on nothing above it. Binning, fitting and
//! measurement crates receive a [`ProcessingConfig`] explicitly instead of reading
//! global constants.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod config;
pub mod error;
pub mod interval;
pub mod physics;
pub mod traits;
pub mod types;

pub use config::{
    AxisConfig, EdgeConfig, MalformedLinePolicy, MeasurementWindows, NormalizationConfig,
    ProcessingConfig, read_config,
};
pub use error::{Error, Result};
pub use interval::{EnergyInterval, ViewingInterval};
pub use types::{FitResult, ValueAndError};

/// Crate version, shared by the CLI `version` command.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
