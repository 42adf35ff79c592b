mod anti_debug;
mod checks;
mod command;
mod debuggable;
mod debugger;
mod developer;
mod engine;
mod env;
mod error;
mod instrumentation;
mod jailbreak;
mod observation;
mod platform;
mod procfs;
mod properties;
mod report;

pub use anti_debug::{
    deny_debugger, DenyDebuggerConfig, DenyDebuggerReport, EnforcementStep, EnforcementStepStatus,
};
pub use checks::{
    deny_debugger_if_possible, is_app_debuggable, is_debugger_attached, is_device_jailbroken,
    is_frida_detected,
};
pub use command::{first_line, produces_output, program_path, run_bounded, CommandOutput};
pub use debuggable::{
    detect_debuggable, is_jdwp_thread, parse_get_task_allow, DebuggableCheckConfig,
    DebuggableObservation, DebuggableSignal,
};
pub use debugger::{
    detect_debugger, sample_timing_cycles, DebuggerCheckConfig, DebuggerObservation,
    DebuggerSignal,
};
pub use developer::{
    detect_developer_posture, usb_functions_include_adb, DeveloperCheckConfig,
    DeveloperObservation, DeveloperSignal,
};
pub use engine::{IntegrityConfig, IntegrityEngine};
pub use error::{IntegrityError, Result};
pub use instrumentation::{
    detect_instrumentation, image_is_suspicious, loaded_image_names, InstrumentationCheckConfig,
    InstrumentationObservation, InstrumentationSignal, ANDROID_AGENT_THREAD_NAMES,
    DEFAULT_FRIDA_PORTS, INSTRUMENTATION_ARTIFACT_PATHS, INSTRUMENTATION_THREAD_NAMES,
    MAPS_KEYWORDS,
};
pub use jailbreak::{
    detect_jailbreak, parse_packages_list, JailbreakCheckConfig, JailbreakObservation,
    JailbreakSignal, ANDROID_MAGISK_PATHS, ANDROID_SU_PATHS, IOS_JAILBREAK_PATHS, ROOT_PACKAGES,
    SANDBOX_PROBE_FILE,
};
pub use observation::{Observation, ProbeFailure, Signal};
pub use platform::TargetProfile;
pub use procfs::{
    maps_pathname, parse_mounts, parse_tracer_pid, read_thread_names, scan_maps_for_keywords,
    MountEntry,
};
pub use properties::{parse_build_prop, PropertySource, PROPERTY_FILES};
pub use report::{IntegrityReport, IntegrityVerdict};
