//! Debugger denial.
//!
//! Apple targets get `ptrace(PT_DENY_ATTACH)`; Linux and Android mark the
//! process non-dumpable and clear the Yama ptracer exception. Every step is
//! reported, including the ones the platform cannot perform.

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::debugger::{detect_debugger, DebuggerCheckConfig};
use crate::env::{env_bool, env_i32};

#[derive(Debug, Clone)]
pub struct DenyDebuggerConfig {
    pub deny_attach: bool,
    pub set_dumpable_zero: bool,
    pub restrict_ptracer: bool,
    pub terminate_if_attached: bool,
    pub terminate_exit_code: i32,
    pub debugger: DebuggerCheckConfig,
}

impl Default for DenyDebuggerConfig {
    fn default() -> Self {
        Self {
            deny_attach: env_bool("DENY_ATTACH", true),
            set_dumpable_zero: env_bool("SET_DUMPABLE", true),
            restrict_ptracer: env_bool("RESTRICT_PTRACE", true),
            terminate_if_attached: env_bool("TERMINATE_ON_DEBUGGER", false),
            terminate_exit_code: env_i32("TERMINATE_EXIT_CODE", 1),
            debugger: DebuggerCheckConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EnforcementStepStatus {
    Applied,
    Skipped,
    Failed,
}

#[derive(Debug, Clone, Serialize)]
pub struct EnforcementStep {
    pub name: &'static str,
    pub status: EnforcementStepStatus,
    pub detail: String,
}

impl EnforcementStep {
    fn applied(name: &'static str, detail: impl Into<String>) -> Self {
        Self {
            name,
            status: EnforcementStepStatus::Applied,
            detail: detail.into(),
        }
    }

    fn skipped(name: &'static str, detail: impl Into<String>) -> Self {
        Self {
            name,
            status: EnforcementStepStatus::Skipped,
            detail: detail.into(),
        }
    }

    #[cfg(any(target_os = "linux", target_os = "android", target_os = "macos", target_os = "ios"))]
    fn failed(name: &'static str, detail: impl Into<String>) -> Self {
        Self {
            name,
            status: EnforcementStepStatus::Failed,
            detail: detail.into(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct DenyDebuggerReport {
    pub steps: Vec<EnforcementStep>,
    pub debugger_attached_after: bool,
}

impl DenyDebuggerReport {
    pub fn has_failures(&self) -> bool {
        self.steps
            .iter()
            .any(|step| step.status == EnforcementStepStatus::Failed)
    }

    pub fn applied_step_names(&self) -> Vec<&'static str> {
        self.names_with(EnforcementStepStatus::Applied)
    }

    pub fn failed_step_names(&self) -> Vec<&'static str> {
        self.names_with(EnforcementStepStatus::Failed)
    }

    pub fn step(&self, name: &str) -> Option<&EnforcementStep> {
        self.steps.iter().find(|step| step.name == name)
    }

    fn names_with(&self, status: EnforcementStepStatus) -> Vec<&'static str> {
        self.steps
            .iter()
            .filter(|step| step.status == status)
            .map(|step| step.name)
            .collect()
    }
}

pub fn deny_debugger(config: &DenyDebuggerConfig) -> DenyDebuggerReport {
    let mut report = DenyDebuggerReport::default();

    report.steps.push(deny_attach_step(config.deny_attach));
    report.steps.push(dumpable_step(config.set_dumpable_zero));
    report.steps.push(ptracer_step(config.restrict_ptracer));

    let observation = detect_debugger(&config.debugger);
    report.debugger_attached_after = observation.detected();

    let terminating = config.terminate_if_attached && report.debugger_attached_after;
    report.steps.push(terminate_step(config, report.debugger_attached_after));

    for step in &report.steps {
        log_step(step);
    }

    if terminating {
        warn!(
            signals = ?observation.signal_codes(),
            exit_code = config.terminate_exit_code,
            "debugger still attached after denial; terminating"
        );
        std::process::exit(config.terminate_exit_code);
    }
    report
}

fn terminate_step(config: &DenyDebuggerConfig, debugger_attached: bool) -> EnforcementStep {
    if !config.terminate_if_attached {
        EnforcementStep::skipped(STEP_TERMINATE, "disabled by configuration")
    } else if debugger_attached {
        EnforcementStep::applied(
            STEP_TERMINATE,
            format!("exiting with code {}", config.terminate_exit_code),
        )
    } else {
        EnforcementStep::skipped(STEP_TERMINATE, "no debugger attached")
    }
}

fn log_step(step: &EnforcementStep) {
    match step.status {
        EnforcementStepStatus::Applied => {
            info!(step = step.name, detail = %step.detail, "debugger denial applied")
        }
        EnforcementStepStatus::Skipped => {
            debug!(step = step.name, detail = %step.detail, "debugger denial skipped")
        }
        EnforcementStepStatus::Failed => {
            warn!(step = step.name, detail = %step.detail, "debugger denial failed")
        }
    }
}

const STEP_DENY_ATTACH: &str = "ptrace_deny_attach";
const STEP_DUMPABLE: &str = "prctl_dumpable";
const STEP_PTRACER: &str = "prctl_ptracer";
const STEP_TERMINATE: &str = "terminate";

fn deny_attach_step(enabled: bool) -> EnforcementStep {
    if !enabled {
        return EnforcementStep::skipped(STEP_DENY_ATTACH, "disabled by configuration");
    }

    #[cfg(any(target_os = "macos", target_os = "ios"))]
    {
        match ptrace_deny_attach() {
            Ok(()) => EnforcementStep::applied(STEP_DENY_ATTACH, "PT_DENY_ATTACH set"),
            Err(err) => EnforcementStep::failed(STEP_DENY_ATTACH, err.to_string()),
        }
    }

    #[cfg(not(any(target_os = "macos", target_os = "ios")))]
    {
        EnforcementStep::skipped(STEP_DENY_ATTACH, "PT_DENY_ATTACH is only available on Apple targets")
    }
}

fn dumpable_step(enabled: bool) -> EnforcementStep {
    if !enabled {
        return EnforcementStep::skipped(STEP_DUMPABLE, "disabled by configuration");
    }

    #[cfg(any(target_os = "linux", target_os = "android"))]
    {
        match run_prctl("PR_SET_DUMPABLE", libc::PR_SET_DUMPABLE, 0) {
            Ok(()) => EnforcementStep::applied(STEP_DUMPABLE, "set to 0"),
            Err(err) => EnforcementStep::failed(STEP_DUMPABLE, err.to_string()),
        }
    }

    #[cfg(not(any(target_os = "linux", target_os = "android")))]
    {
        EnforcementStep::skipped(STEP_DUMPABLE, "prctl is only available on linux")
    }
}

fn ptracer_step(enabled: bool) -> EnforcementStep {
    if !enabled {
        return EnforcementStep::skipped(STEP_PTRACER, "disabled by configuration");
    }

    #[cfg(any(target_os = "linux", target_os = "android"))]
    {
        match run_prctl("PR_SET_PTRACER", PR_SET_PTRACER, 0) {
            Ok(()) => EnforcementStep::applied(STEP_PTRACER, "Yama ptracer exception cleared"),
            Err(err) => EnforcementStep::failed(STEP_PTRACER, err.to_string()),
        }
    }

    #[cfg(not(any(target_os = "linux", target_os = "android")))]
    {
        EnforcementStep::skipped(STEP_PTRACER, "prctl is only available on linux")
    }
}

#[cfg(any(target_os = "macos", target_os = "ios"))]
const PT_DENY_ATTACH: libc::c_int = 31;

#[cfg(any(target_os = "macos", target_os = "ios"))]
fn ptrace_deny_attach() -> crate::error::Result<()> {
    // SAFETY: PT_DENY_ATTACH takes no address or data arguments.
    let ret = unsafe { libc::ptrace(PT_DENY_ATTACH, 0, std::ptr::null_mut::<libc::c_char>(), 0) };
    if ret == 0 {
        return Ok(());
    }
    let err = crate::error::IntegrityError::last_os_error("ptrace(PT_DENY_ATTACH)");
    // ENOTSUP means the flag is already set on this process.
    if let crate::error::IntegrityError::Syscall { source, .. } = &err {
        if source.raw_os_error() == Some(libc::ENOTSUP) {
            return Ok(());
        }
    }
    Err(err)
}

// Yama's option number; not exported by libc for every Android target.
#[cfg(any(target_os = "linux", target_os = "android"))]
const PR_SET_PTRACER: libc::c_int = 0x5961_6d61;

#[cfg(any(target_os = "linux", target_os = "android"))]
fn run_prctl(
    name: &'static str,
    option: libc::c_int,
    arg2: libc::c_ulong,
) -> crate::error::Result<()> {
    // SAFETY: the options used here take a single integer argument.
    let rc = unsafe { libc::prctl(option, arg2, 0, 0, 0) };
    if rc == 0 {
        return Ok(());
    }
    Err(crate::error::IntegrityError::last_os_error(name))
}
