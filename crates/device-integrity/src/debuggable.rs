use std::fmt;
use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::env::{env_bool, env_optional_path, env_path};
use crate::observation::{Observation, Signal};
use crate::platform::TargetProfile;
use crate::procfs::{read_optional, read_thread_names};

const PROVISIONING_PROFILE_NAME: &str = "embedded.mobileprovision";
const GET_TASK_ALLOW_KEY: &str = "<key>get-task-allow</key>";

#[derive(Debug, Clone)]
pub struct DebuggableCheckConfig {
    pub proc_root: PathBuf,
    /// `embedded.mobileprovision` of the running bundle, when known.
    pub provisioning_profile: Option<PathBuf>,
    pub enable_build_profile_probe: bool,
    pub enable_jdwp_probe: bool,
    pub enable_provisioning_probe: bool,
}

impl Default for DebuggableCheckConfig {
    fn default() -> Self {
        let profile = TargetProfile::from_env();
        Self {
            proc_root: env_path("PROC_ROOT", "/proc"),
            provisioning_profile: env_optional_path("PROVISIONING_PROFILE")
                .or_else(bundled_provisioning_profile),
            enable_build_profile_probe: env_bool("ENABLE_BUILD_PROFILE_PROBE", true),
            enable_jdwp_probe: env_bool("ENABLE_JDWP_PROBE", profile.is_android()),
            enable_provisioning_probe: env_bool("ENABLE_PROVISIONING_PROBE", profile.is_ios()),
        }
    }
}

fn bundled_provisioning_profile() -> Option<PathBuf> {
    let exe = std::env::current_exe().ok()?;
    Some(exe.parent()?.join(PROVISIONING_PROFILE_NAME))
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "code", rename_all = "snake_case")]
pub enum DebuggableSignal {
    DebugBuild,
    JdwpThread { tid: u32, name: String },
    GetTaskAllow { path: String },
}

impl Signal for DebuggableSignal {
    fn code(&self) -> &'static str {
        match self {
            Self::DebugBuild => "debug_build",
            Self::JdwpThread { .. } => "jdwp_thread",
            Self::GetTaskAllow { .. } => "get_task_allow",
        }
    }
}

impl fmt::Display for DebuggableSignal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::DebugBuild => write!(f, "compiled with debug assertions"),
            Self::JdwpThread { tid, name } => {
                write!(f, "JDWP agent thread '{}' running (tid={})", name, tid)
            }
            Self::GetTaskAllow { path } => {
                write!(f, "provisioning profile grants get-task-allow ({})", path)
            }
        }
    }
}

pub type DebuggableObservation = Observation<DebuggableSignal>;

pub fn detect_debuggable(config: &DebuggableCheckConfig) -> DebuggableObservation {
    let mut observation = DebuggableObservation::default();

    if config.enable_build_profile_probe && cfg!(debug_assertions) {
        observation.push(DebuggableSignal::DebugBuild);
    }

    if config.enable_jdwp_probe {
        match read_thread_names(&config.proc_root) {
            Ok(threads) => {
                for (tid, name) in threads {
                    if is_jdwp_thread(&name) {
                        observation.push(DebuggableSignal::JdwpThread { tid, name });
                    }
                }
            }
            Err(err) => observation.record_failure("jdwp", err),
        }
    }

    if config.enable_provisioning_probe {
        if let Some(path) = config.provisioning_profile.as_deref() {
            probe_provisioning_profile(path, &mut observation);
        }
    }

    observation.trace("debuggable");
    observation
}

/// ART names its debugger agent threads `JDWP` and `ADB-JDWP Connection
/// Control Thread`; comm truncates the latter to 15 bytes.
pub fn is_jdwp_thread(name: &str) -> bool {
    name.starts_with("JDWP") || name.starts_with("ADB-JDWP")
}

fn probe_provisioning_profile(path: &Path, observation: &mut DebuggableObservation) {
    match read_optional(path) {
        Ok(Some(content)) => {
            if parse_get_task_allow(&content) == Some(true) {
                observation.push(DebuggableSignal::GetTaskAllow {
                    path: path.display().to_string(),
                });
            }
        }
        // App Store builds carry no embedded profile.
        Ok(None) => {}
        Err(err) => observation.record_failure("provisioning_profile", err),
    }
}

/// Value of `get-task-allow` in the plist embedded in a provisioning profile.
///
/// The profile is a CMS envelope around a plaintext XML plist, so the key can
/// be found without decoding the signature.
pub fn parse_get_task_allow(profile: &str) -> Option<bool> {
    let start = profile.find(GET_TASK_ALLOW_KEY)? + GET_TASK_ALLOW_KEY.len();
    let rest = profile[start..].trim_start();
    if rest.starts_with("<true/>") {
        Some(true)
    } else if rest.starts_with("<false/>") {
        Some(false)
    } else {
        None
    }
}
