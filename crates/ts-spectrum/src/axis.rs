//! Logarithmic binning axis shared by the energy axis and the column-density grid.

use std::fmt;

use serde::{Deserialize, Serialize};
use ts_core::{AxisConfig, Error, Result};

/// Side on which a lookup was clamped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClampSide {
    /// Value below the left bound (or non-positive).
    Below,
    /// Value at or above the right bound.
    Above,
}

/// Result of [`LogAxis::locate`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Located {
    /// Bin index in `[0, n−1]`.
    pub index: usize,
    /// Set when the raw index fell outside the axis.
    pub clamped: Option<ClampSide>,
}

/// `n` logarithmically spaced intervals between `left` and `right`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LogAxis {
    left: f64,
    right: f64,
    n: usize,
    log_span: f64,
}

impl LogAxis {
    /// Create an axis; requires finite `0 < left < right` and `n ≥ 1`.
    pub fn new(left: f64, right: f64, n: usize) -> Result<Self> {
        if !(left.is_finite() && right.is_finite()) || left <= 0.0 || right <= left {
            return Err(Error::Validation(format!(
                "log axis needs finite 0 < left < right, got [{left}, {right}]"
            )));
        }
        if n == 0 {
            return Err(Error::Validation("log axis needs at least one interval".into()));
        }
        Ok(Self { left, right, n, log_span: (right / left).ln() })
    }

    /// Axis from its configuration block.
    pub fn from_config(cfg: &AxisConfig) -> Result<Self> {
        Self::new(cfg.left, cfg.right, cfg.intervals)
    }

    /// Left bound.
    pub fn left(&self) -> f64 {
        self.left
    }

    /// Right bound.
    pub fn right(&self) -> f64 {
        self.right
    }

    /// Number of intervals.
    pub fn len(&self) -> usize {
        self.n
    }

    /// Always false; an axis has at least one interval.
    pub fn is_empty(&self) -> bool {
        false
    }

    /// Boundary `b_i = left·(right/left)^(i/n)`, `i ∈ [0, n]`.
    pub fn boundary(&self, i: usize) -> f64 {
        if i == self.n {
            return self.right;
        }
        self.left * (self.log_span * i as f64 / self.n as f64).exp()
    }

    /// All `n + 1` boundaries.
    pub fn boundaries(&self) -> Vec<f64> {
        (0..=self.n).map(|i| self.boundary(i)).collect()
    }

    /// Bounds of interval `i`.
    pub fn bounds(&self, i: usize) -> (f64, f64) {
        (self.boundary(i), self.boundary(i + 1))
    }

    /// Arithmetic midpoints of all intervals.
    pub fn midpoints(&self) -> Vec<f64> {
        let b = self.boundaries();
        b.windows(2).map(|w| 0.5 * (w[0] + w[1])).collect()
    }

    /// Interval widths `b_{i+1} − b_i`.
    pub fn widths(&self) -> Vec<f64> {
        let b = self.boundaries();
        b.windows(2).map(|w| w[1] - w[0]).collect()
    }

    /// Unclamped index `floor(n·ln(v/left)/ln(right/left))`; non-positive values map to 0.
    pub fn raw_index(&self, value: f64) -> i64 {
        if !(value > 0.0) {
            return 0;
        }
        (self.n as f64 * (value / self.left).ln() / self.log_span).floor() as i64
    }

    /// Index clamped into `[0, n−1]`, reporting the clamp side.
    pub fn locate(&self, value: f64) -> Located {
        let raw = self.raw_index(value);
        let last = self.n as i64 - 1;
        if !(value > 0.0) || raw < 0 {
            Located { index: 0, clamped: Some(ClampSide::Below) }
        } else if raw > last {
            Located { index: self.n - 1, clamped: Some(ClampSide::Above) }
        } else {
            Located { index: raw as usize, clamped: None }
        }
    }

    /// Strict lookup: values outside `[left, right]` are a [`Error::BoundaryAnomaly`].
    ///
    /// `v ≤ 0` maps to bin 0 and `v == right` to bin `n−1`.
    pub fn try_index(&self, value: f64, axis_name: &str) -> Result<usize> {
        if value <= 0.0 {
            return Ok(0);
        }
        if value == self.right {
            return Ok(self.n - 1);
        }
        match self.locate(value) {
            Located { index, clamped: None } => Ok(index),
            Located { clamped: Some(_), .. } => Err(Error::BoundaryAnomaly {
                axis: axis_name.to_string(),
                value,
                left: self.left,
                right: self.right,
            }),
        }
    }
}

impl fmt::Display for LogAxis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.2e}:{:.2e}:{}", self.left, self.right, self.n)
    }
}
