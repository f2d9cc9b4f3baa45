//! Error types for TorusSpec

use thiserror::Error;

/// TorusSpec error type
#[derive(Error, Debug)]
pub enum Error {
    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON parsing error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// YAML parsing error
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml_ng::Error),

    /// Malformed record or line.
    #[error("{}", format_message(.line_no, .line, .reason))]
    Format {
        /// 1-based line number, when the caller knows it.
        line_no: Option<usize>,
        /// The offending line, verbatim.
        line: String,
        /// What is wrong with it.
        reason: String,
    },

    /// A code that is not a member of a closed enumeration.
    #[error("invalid {kind} code: {value:?}")]
    InvalidEnumValue {
        /// Enumeration name (e.g. "photon type").
        kind: &'static str,
        /// The rejected code.
        value: String,
    },

    /// A value outside a configured axis, reported by strict lookups.
    #[error("value {value:e} lies outside the {axis} axis [{left:e}, {right:e}]")]
    BoundaryAnomaly {
        /// Axis name.
        axis: String,
        /// Offending value.
        value: f64,
        /// Axis lower bound.
        left: f64,
        /// Axis upper bound.
        right: f64,
    },

    /// Non-linear fit failed (non-convergence, singular covariance, degenerate data).
    #[error("fit failure: {0}")]
    FitFailure(String),

    /// Expected spectral data is absent.
    #[error("missing input: {0}")]
    MissingInput(String),

    /// Validation error
    #[error("Validation error: {0}")]
    Validation(String),

    /// Computation error
    #[error("Computation error: {0}")]
    Computation(String),
}

impl Error {
    /// Build a [`Error::Format`] for a line without a known position.
    pub fn format(line: impl Into<String>, reason: impl Into<String>) -> Self {
        Error::Format { line_no: None, line: line.into(), reason: reason.into() }
    }

    /// Attach a 1-based line number to a [`Error::Format`]; other variants pass through.
    pub fn at_line(self, n: usize) -> Self {
        match self {
            Error::Format { line, reason, .. } => Error::Format { line_no: Some(n), line, reason },
            other => other,
        }
    }

    /// Whether the error only invalidates the current measurement key.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Error::FitFailure(_)
                | Error::MissingInput(_)
                | Error::Computation(_)
                | Error::BoundaryAnomaly { .. }
        )
    }
}

fn format_message(line_no: &Option<usize>, line: &str, reason: &str) -> String {
    match line_no {
        Some(n) => format!("malformed line {n} ({reason}): {line:?}"),
        None => format!("malformed line ({reason}): {line:?}"),
    }
}

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;
