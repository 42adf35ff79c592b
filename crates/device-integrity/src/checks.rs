//! One-call integrity queries.
//!
//! Each function builds its probe configuration from the environment, runs
//! the probe and returns the verdict. Nothing is cached, so a call reflects
//! the host at the time of the call. A probe that cannot run answers `false`.

use crate::anti_debug::{deny_debugger, DenyDebuggerConfig};
use crate::debuggable::{detect_debuggable, DebuggableCheckConfig};
use crate::debugger::{detect_debugger, DebuggerCheckConfig};
use crate::instrumentation::{detect_instrumentation, InstrumentationCheckConfig};
use crate::jailbreak::{detect_jailbreak, JailbreakCheckConfig};

/// Whether the device shows signs of a jailbreak or root.
pub fn is_device_jailbroken() -> bool {
    detect_jailbreak(&JailbreakCheckConfig::default()).detected()
}

/// Whether a debugger or tracer is attached to this process.
pub fn is_debugger_attached() -> bool {
    detect_debugger(&DebuggerCheckConfig::default()).detected()
}

/// Whether Frida or another hooking framework is active.
pub fn is_frida_detected() -> bool {
    detect_instrumentation(&InstrumentationCheckConfig::default()).detected()
}

/// Whether this build is flagged as debuggable.
pub fn is_app_debuggable() -> bool {
    detect_debuggable(&DebuggableCheckConfig::default()).detected()
}

/// Makes the process refuse debugger attachment where the platform allows it.
///
/// Failures are logged, never raised.
pub fn deny_debugger_if_possible() {
    let _ = deny_debugger(&DenyDebuggerConfig::default());
}
