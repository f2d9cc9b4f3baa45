//! Record of values clamped onto an axis during binning.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::axis::ClampSide;

const MAX_RECORDED_EVENTS: usize = 64;

/// One clamped value.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BoundaryEvent {
    /// Axis name ("energy", "column density").
    pub axis: String,
    /// Offending value.
    pub value: f64,
    /// Side it was clamped to.
    pub side: ClampSide,
    /// Caller-supplied label (e.g. the registration key).
    pub context: Option<String>,
}

/// Counts of clamp events per axis and side, plus the first few events verbatim.
#[derive(Debug, Clone, Default, Serialize)]
pub struct AnomalyLog {
    counts: BTreeMap<String, [usize; 2]>,
    events: Vec<BoundaryEvent>,
}

impl AnomalyLog {
    /// Empty log.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a clamp; logged at `debug`.
    pub fn record(&mut self, axis: &str, value: f64, side: ClampSide, context: Option<&str>) {
        log::debug!(
            "{axis} value {value:e} clamped {side:?}{}",
            context.map(|c| format!(" ({c})")).unwrap_or_default()
        );
        let slot = match side {
            ClampSide::Below => 0,
            ClampSide::Above => 1,
        };
        self.counts.entry(axis.to_string()).or_default()[slot] += 1;
        if self.events.len() < MAX_RECORDED_EVENTS {
            self.events.push(BoundaryEvent {
                axis: axis.to_string(),
                value,
                side,
                context: context.map(str::to_string),
            });
        }
    }

    /// Total number of clamps.
    pub fn len(&self) -> usize {
        self.counts.values().map(|c| c[0] + c[1]).sum()
    }

    /// True when nothing was clamped.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Clamps on `axis` to `side`.
    pub fn count(&self, axis: &str, side: ClampSide) -> usize {
        self.counts.get(axis).map_or(0, |c| match side {
            ClampSide::Below => c[0],
            ClampSide::Above => c[1],
        })
    }

    /// The first recorded events.
    pub fn events(&self) -> &[BoundaryEvent] {
        &self.events
    }

    /// Fold another log into this one.
    pub fn merge(&mut self, other: &AnomalyLog) {
        for (axis, c) in &other.counts {
            let slot = self.counts.entry(axis.clone()).or_default();
            slot[0] += c[0];
            slot[1] += c[1];
        }
        let room = MAX_RECORDED_EVENTS.saturating_sub(self.events.len());
        self.events.extend(other.events.iter().take(room).cloned());
    }

    /// One `warn` line per axis with clamps.
    pub fn log_summary(&self) {
        for (axis, [below, above]) in &self.counts {
            log::warn!("{axis} axis: {below} value(s) clamped below, {above} clamped above");
        }
    }
}
