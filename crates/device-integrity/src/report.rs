use serde::Serialize;

use crate::debuggable::DebuggableObservation;
use crate::debugger::DebuggerObservation;
use crate::developer::DeveloperObservation;
use crate::instrumentation::InstrumentationObservation;
use crate::jailbreak::JailbreakObservation;
use crate::observation::{Observation, ProbeFailure, Signal};

/// Every probe family's observation from one evaluation.
#[derive(Debug, Clone, Default, Serialize)]
pub struct IntegrityReport {
    pub jailbreak: JailbreakObservation,
    pub debugger: DebuggerObservation,
    pub instrumentation: InstrumentationObservation,
    pub debuggable: DebuggableObservation,
    pub developer: DeveloperObservation,
}

/// Flat verdict in the shape host bridges consume.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IntegrityVerdict {
    pub rooted: bool,
    pub debugger: bool,
    pub usb_debug: bool,
    pub developer_options: bool,
    pub frida: bool,
    pub app_debuggable: bool,
    pub is_secure: bool,
}

impl IntegrityReport {
    pub fn verdict(&self) -> IntegrityVerdict {
        let rooted = self.jailbreak.detected();
        let debugger = self.debugger.detected();
        let usb_debug = self.developer.usb_debugging();
        let developer_options = self.developer.developer_options();
        let frida = self.instrumentation.detected();
        let app_debuggable = self.debuggable.detected();
        IntegrityVerdict {
            rooted,
            debugger,
            usb_debug,
            developer_options,
            frida,
            app_debuggable,
            is_secure: !(rooted
                || debugger
                || usb_debug
                || developer_options
                || frida
                || app_debuggable),
        }
    }

    pub fn is_secure(&self) -> bool {
        self.verdict().is_secure
    }

    /// `family:signal` codes for every positive signal, in probe order.
    pub fn violation_codes(&self) -> Vec<String> {
        let mut out = Vec::new();
        prefixed_codes("jailbreak", &self.jailbreak, &mut out);
        prefixed_codes("debugger", &self.debugger, &mut out);
        prefixed_codes("instrumentation", &self.instrumentation, &mut out);
        prefixed_codes("debuggable", &self.debuggable, &mut out);
        prefixed_codes("developer", &self.developer, &mut out);
        out
    }

    pub fn failures(&self) -> Vec<&ProbeFailure> {
        self.jailbreak
            .failures
            .iter()
            .chain(&self.debugger.failures)
            .chain(&self.instrumentation.failures)
            .chain(&self.debuggable.failures)
            .chain(&self.developer.failures)
            .collect()
    }

    pub fn summary(&self) -> String {
        let parts: Vec<String> = [
            detail_if_detected(&self.jailbreak),
            detail_if_detected(&self.debugger),
            detail_if_detected(&self.instrumentation),
            detail_if_detected(&self.debuggable),
            detail_if_detected(&self.developer),
        ]
        .into_iter()
        .flatten()
        .collect();
        if parts.is_empty() {
            "ok".to_string()
        } else {
            parts.join("; ")
        }
    }

    /// Verdict as JSON, e.g. `{"rooted":false,...,"isSecure":true}`.
    pub fn to_json(&self) -> String {
        serde_json::to_string(&self.verdict()).unwrap_or_else(|_| "{}".to_string())
    }

    /// Full report including every signal and probe failure.
    pub fn to_detailed_json(&self) -> serde_json::Value {
        serde_json::json!({
            "verdict": self.verdict(),
            "violations": self.violation_codes(),
            "detail": self.summary(),
            "observations": self,
        })
    }
}

fn prefixed_codes<S: Signal>(family: &str, observation: &Observation<S>, out: &mut Vec<String>) {
    out.extend(
        observation
            .signal_codes()
            .into_iter()
            .map(|code| format!("{}:{}", family, code)),
    );
}

fn detail_if_detected<S: Signal>(observation: &Observation<S>) -> Option<String> {
    observation.detected().then(|| observation.summary())
}
