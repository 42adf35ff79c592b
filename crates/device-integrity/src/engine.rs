use tracing::{debug, warn};

use crate::anti_debug::{deny_debugger, DenyDebuggerConfig, DenyDebuggerReport};
use crate::debuggable::{detect_debuggable, DebuggableCheckConfig};
use crate::debugger::{detect_debugger, DebuggerCheckConfig};
use crate::developer::{detect_developer_posture, DeveloperCheckConfig};
use crate::instrumentation::{detect_instrumentation, InstrumentationCheckConfig};
use crate::jailbreak::{detect_jailbreak, JailbreakCheckConfig};
use crate::report::IntegrityReport;

#[derive(Debug, Clone, Default)]
pub struct IntegrityConfig {
    pub jailbreak: JailbreakCheckConfig,
    pub debugger: DebuggerCheckConfig,
    pub instrumentation: InstrumentationCheckConfig,
    pub debuggable: DebuggableCheckConfig,
    pub developer: DeveloperCheckConfig,
    pub enforcement: DenyDebuggerConfig,
}

/// Runs every probe family against one configuration. Holds no state
/// between evaluations.
#[derive(Debug, Clone)]
pub struct IntegrityEngine {
    config: IntegrityConfig,
}

impl IntegrityEngine {
    pub fn from_env() -> Self {
        Self::new(IntegrityConfig::default())
    }

    pub fn new(config: IntegrityConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &IntegrityConfig {
        &self.config
    }

    pub fn evaluate(&self) -> IntegrityReport {
        let report = IntegrityReport {
            jailbreak: detect_jailbreak(&self.config.jailbreak),
            debugger: detect_debugger(&self.config.debugger),
            instrumentation: detect_instrumentation(&self.config.instrumentation),
            debuggable: detect_debuggable(&self.config.debuggable),
            developer: detect_developer_posture(&self.config.developer),
        };

        let verdict = report.verdict();
        if verdict.is_secure {
            debug!(
                probe_failures = report.failures().len(),
                "device integrity evaluation clean"
            );
        } else {
            warn!(
                rooted = verdict.rooted,
                debugger = verdict.debugger,
                frida = verdict.frida,
                app_debuggable = verdict.app_debuggable,
                usb_debug = verdict.usb_debug,
                developer_options = verdict.developer_options,
                violations = ?report.violation_codes(),
                "device integrity evaluation found violations"
            );
        }
        report
    }

    pub fn enforce(&self) -> DenyDebuggerReport {
        deny_debugger(&self.config.enforcement)
    }
}
