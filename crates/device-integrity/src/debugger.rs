use std::fmt;
use std::path::PathBuf;

use serde::Serialize;

use crate::env::{env_bool, env_path, env_u32, env_u64};
use crate::observation::{Observation, Signal};
use crate::procfs::{parse_tracer_pid, read_required};

#[derive(Debug, Clone)]
pub struct DebuggerCheckConfig {
    pub proc_root: PathBuf,
    pub timing_threshold_cycles: u64,
    pub timing_probe_iterations: u32,
    pub enable_tracer_pid_probe: bool,
    pub enable_traced_flag_probe: bool,
    pub enable_timing_probe: bool,
}

impl Default for DebuggerCheckConfig {
    fn default() -> Self {
        Self {
            proc_root: env_path("PROC_ROOT", "/proc"),
            timing_threshold_cycles: env_u64("TIMING_THRESHOLD_CYCLES", 50_000_000),
            timing_probe_iterations: env_u32("TIMING_ITERATIONS", 200_000),
            enable_tracer_pid_probe: env_bool(
                "ENABLE_TRACER_PID",
                cfg!(any(target_os = "linux", target_os = "android")),
            ),
            enable_traced_flag_probe: env_bool(
                "ENABLE_TRACED_FLAG",
                cfg!(any(target_os = "macos", target_os = "ios")),
            ),
            enable_timing_probe: env_bool("ENABLE_TIMING", false),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "code", rename_all = "snake_case")]
pub enum DebuggerSignal {
    TracerPidDetected {
        tracer_pid: u32,
    },
    TracedFlag,
    TimingAnomaly {
        observed_cycles: u64,
        threshold_cycles: u64,
    },
}

impl Signal for DebuggerSignal {
    fn code(&self) -> &'static str {
        match self {
            Self::TracerPidDetected { .. } => "tracer_pid_detected",
            Self::TracedFlag => "traced_flag",
            Self::TimingAnomaly { .. } => "timing_anomaly",
        }
    }
}

impl fmt::Display for DebuggerSignal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::TracerPidDetected { tracer_pid } => {
                write!(f, "TracerPid indicates debugger attached ({})", tracer_pid)
            }
            Self::TracedFlag => write!(f, "kernel reports P_TRACED for this process"),
            Self::TimingAnomaly {
                observed_cycles,
                threshold_cycles,
            } => write!(
                f,
                "timing probe exceeded threshold (observed={} threshold={})",
                observed_cycles, threshold_cycles
            ),
        }
    }
}

pub type DebuggerObservation = Observation<DebuggerSignal>;

pub fn detect_debugger(config: &DebuggerCheckConfig) -> DebuggerObservation {
    let mut observation = DebuggerObservation::default();

    if config.enable_tracer_pid_probe {
        let status_path = config.proc_root.join("self").join("status");
        match read_required(&status_path) {
            Ok(status) => match parse_tracer_pid(&status) {
                Some(tracer_pid) if tracer_pid > 0 => {
                    observation.push(DebuggerSignal::TracerPidDetected { tracer_pid });
                }
                Some(_) => {}
                None => observation.record_failure(
                    "tracer_pid",
                    format!("no parsable TracerPid in {}", status_path.display()),
                ),
            },
            Err(err) => observation.record_failure("tracer_pid", err),
        }
    }

    if config.enable_traced_flag_probe {
        match traced_flag_set() {
            Ok(true) => observation.push(DebuggerSignal::TracedFlag),
            Ok(false) => {}
            Err(err) => observation.record_failure("traced_flag", err),
        }
    }

    if config.enable_timing_probe {
        if let Some(observed_cycles) = sample_timing_cycles(config.timing_probe_iterations) {
            if observed_cycles > config.timing_threshold_cycles {
                observation.push(DebuggerSignal::TimingAnomaly {
                    observed_cycles,
                    threshold_cycles: config.timing_threshold_cycles,
                });
            }
        }
    }

    observation.trace("debugger");
    observation
}

#[cfg(any(target_os = "macos", target_os = "ios"))]
fn traced_flag_set() -> crate::error::Result<bool> {
    // Raw kinfo_proc bytes: libc no longer exposes the struct on every
    // Apple target, and p_flag sits at a fixed offset on arm64 and x86_64.
    const KINFO_PROC_SIZE: usize = 648;
    const P_FLAG_OFFSET: usize = 32;
    const P_TRACED: i32 = 0x0000_0800;

    let mut mib: [libc::c_int; 4] = [
        libc::CTL_KERN,
        libc::KERN_PROC,
        libc::KERN_PROC_PID,
        // SAFETY: getpid has no preconditions.
        unsafe { libc::getpid() },
    ];
    let mut buf = [0u8; KINFO_PROC_SIZE];
    let mut size = KINFO_PROC_SIZE;

    // SAFETY: mib and buf are valid for the lengths passed; size is updated in place.
    let ret = unsafe {
        libc::sysctl(
            mib.as_mut_ptr(),
            4,
            buf.as_mut_ptr() as *mut libc::c_void,
            &mut size,
            std::ptr::null_mut(),
            0,
        )
    };
    if ret != 0 {
        return Err(crate::error::IntegrityError::last_os_error("sysctl(KERN_PROC_PID)"));
    }
    if size < P_FLAG_OFFSET + 4 {
        return Err(crate::error::IntegrityError::Unsupported("short kinfo_proc"));
    }

    let p_flag = i32::from_ne_bytes([
        buf[P_FLAG_OFFSET],
        buf[P_FLAG_OFFSET + 1],
        buf[P_FLAG_OFFSET + 2],
        buf[P_FLAG_OFFSET + 3],
    ]);
    Ok((p_flag & P_TRACED) != 0)
}

#[cfg(not(any(target_os = "macos", target_os = "ios")))]
fn traced_flag_set() -> crate::error::Result<bool> {
    Err(crate::error::IntegrityError::Unsupported("P_TRACED probe"))
}

#[cfg(any(target_arch = "x86_64", target_arch = "x86"))]
pub fn sample_timing_cycles(iterations: u32) -> Option<u64> {
    if iterations == 0 {
        return Some(0);
    }

    let start = read_tsc();
    let mut state = 0u64;
    for i in 0..iterations {
        state = state
            .wrapping_mul(6364136223846793005)
            .wrapping_add(i as u64);
        std::hint::black_box(state);
    }
    let end = read_tsc();
    Some(end.saturating_sub(start))
}

#[cfg(not(any(target_arch = "x86_64", target_arch = "x86")))]
pub fn sample_timing_cycles(_iterations: u32) -> Option<u64> {
    None
}

#[cfg(target_arch = "x86_64")]
fn read_tsc() -> u64 {
    // SAFETY: reading the processor cycle counter has no memory safety implications.
    unsafe { core::arch::x86_64::_rdtsc() }
}

#[cfg(target_arch = "x86")]
fn read_tsc() -> u64 {
    // SAFETY: reading the processor cycle counter has no memory safety implications.
    unsafe { core::arch::x86::_rdtsc() }
}
