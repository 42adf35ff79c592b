use std::fmt;

use serde::Serialize;
use tracing::{debug, warn};

/// A single piece of positive evidence produced by a probe.
pub trait Signal: fmt::Display {
    /// Stable snake_case identifier, suitable for alert payloads.
    fn code(&self) -> &'static str;
}

/// A probe that ran but could not produce evidence either way.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProbeFailure {
    pub probe: &'static str,
    pub detail: String,
}

impl fmt::Display for ProbeFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "probe '{}' failed: {}", self.probe, self.detail)
    }
}

/// Outcome of one probe family. Failures never count as a detection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Observation<S> {
    pub signals: Vec<S>,
    pub failures: Vec<ProbeFailure>,
}

impl<S> Default for Observation<S> {
    fn default() -> Self {
        Self {
            signals: Vec::new(),
            failures: Vec::new(),
        }
    }
}

impl<S> Observation<S> {
    pub fn detected(&self) -> bool {
        !self.signals.is_empty()
    }

    pub fn push(&mut self, signal: S) {
        self.signals.push(signal);
    }

    pub fn record_failure(&mut self, probe: &'static str, detail: impl fmt::Display) {
        self.failures.push(ProbeFailure {
            probe,
            detail: detail.to_string(),
        });
    }
}

impl<S: Signal> Observation<S> {
    pub fn signal_codes(&self) -> Vec<&'static str> {
        self.signals.iter().map(Signal::code).collect()
    }

    pub fn summary(&self) -> String {
        if self.signals.is_empty() {
            return "ok".to_string();
        }
        self.signals
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join("; ")
    }

    pub(crate) fn trace(&self, family: &'static str) {
        for failure in &self.failures {
            debug!(
                family,
                probe = failure.probe,
                detail = %failure.detail,
                "integrity probe could not run"
            );
        }
        if self.detected() {
            warn!(
                family,
                signals = ?self.signal_codes(),
                summary = %self.summary(),
                "integrity probe detected tampering signals"
            );
        }
    }
}
