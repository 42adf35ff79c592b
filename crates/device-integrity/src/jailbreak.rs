use std::collections::BTreeSet;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Serialize;

use crate::command;
use crate::env::{env_bool, env_list, env_millis, env_optional_path, env_path};
use crate::error::IntegrityError;
use crate::observation::{Observation, Signal};
use crate::platform::{rooted, TargetProfile};
use crate::procfs::{parse_mounts, read_optional};
use crate::properties::PropertySource;

pub const ANDROID_SU_PATHS: [&str; 9] = [
    "/system/app/Superuser.apk",
    "/sbin/su",
    "/system/bin/su",
    "/system/xbin/su",
    "/data/local/xbin/su",
    "/data/local/bin/su",
    "/system/sd/xbin/su",
    "/system/bin/failsafe/su",
    "/data/local/su",
];

pub const ANDROID_MAGISK_PATHS: [&str; 4] = [
    "/sbin/.magisk",
    "/sbin/magisk",
    "/data/adb/magisk",
    "/cache/magisk.log",
];

pub const ROOT_PACKAGES: [&str; 5] = [
    "eu.chainfire.supersu",
    "com.noshufou.android.su",
    "com.koushikdutta.superuser",
    "com.thirdparty.superuser",
    "com.topjohnwu.magisk",
];

pub const IOS_JAILBREAK_PATHS: [&str; 18] = [
    "/Applications/Cydia.app",
    "/Applications/Sileo.app",
    "/Applications/Zebra.app",
    "/Library/MobileSubstrate/MobileSubstrate.dylib",
    "/Library/MobileSubstrate/DynamicLibraries",
    "/bin/bash",
    "/usr/sbin/sshd",
    "/usr/bin/ssh",
    "/usr/libexec/sftp-server",
    "/etc/apt",
    "/private/var/lib/apt/",
    "/private/var/lib/cydia",
    "/private/var/stash",
    "/var/jb",
    "/usr/lib/libhooker.dylib",
    "/usr/lib/TweakInject",
    "/.installed_unc0ver",
    "/.bootstrapped_electra",
];

pub const SANDBOX_PROBE_FILE: &str = "/private/.device-integrity-sandbox-probe";

const SYSTEM_MOUNT_POINT: &str = "/system";
const SELINUX_ENFORCE_PATH: &str = "/sys/fs/selinux/enforce";
const PACKAGES_LIST_PATH: &str = "/data/system/packages.list";
const PACKAGE_DATA_DIR: &str = "/data/data";

#[derive(Debug, Clone)]
pub struct JailbreakCheckConfig {
    pub root: PathBuf,
    pub proc_root: PathBuf,
    pub enable_su_path_probe: bool,
    pub enable_package_probe: bool,
    pub enable_su_exec_probe: bool,
    pub enable_property_probe: bool,
    pub enable_getprop: bool,
    pub enable_mount_probe: bool,
    pub enable_selinux_probe: bool,
    pub enable_artifact_probe: bool,
    pub enable_sandbox_probe: bool,
    /// Package names reported by the host application layer.
    pub installed_packages: Vec<String>,
    /// Directory holding `su`, `which` and `getprop`; `PATH` lookup when unset.
    pub command_dir: Option<PathBuf>,
    pub command_timeout: Duration,
}

impl JailbreakCheckConfig {
    /// Probe set for `profile` with no environment overrides applied.
    pub fn for_profile(profile: TargetProfile) -> Self {
        let android = profile.is_android();
        let ios = profile.is_ios();
        Self {
            root: PathBuf::from("/"),
            proc_root: PathBuf::from("/proc"),
            enable_su_path_probe: android,
            enable_package_probe: android,
            enable_su_exec_probe: android,
            enable_property_probe: android,
            enable_getprop: android,
            enable_mount_probe: android,
            enable_selinux_probe: android,
            enable_artifact_probe: ios,
            enable_sandbox_probe: ios,
            installed_packages: Vec::new(),
            command_dir: None,
            command_timeout: Duration::from_millis(1_500),
        }
    }
}

impl Default for JailbreakCheckConfig {
    fn default() -> Self {
        let base = Self::for_profile(TargetProfile::from_env());
        Self {
            root: env_path("ROOT", "/"),
            proc_root: env_path("PROC_ROOT", "/proc"),
            enable_su_path_probe: env_bool("ENABLE_SU_PATHS", base.enable_su_path_probe),
            enable_package_probe: env_bool("ENABLE_PACKAGE_PROBE", base.enable_package_probe),
            enable_su_exec_probe: env_bool("ENABLE_SU_EXEC", base.enable_su_exec_probe),
            enable_property_probe: env_bool("ENABLE_PROPERTY_PROBE", base.enable_property_probe),
            enable_getprop: env_bool("ENABLE_GETPROP", base.enable_getprop),
            enable_mount_probe: env_bool("ENABLE_MOUNT_PROBE", base.enable_mount_probe),
            enable_selinux_probe: env_bool("ENABLE_SELINUX_PROBE", base.enable_selinux_probe),
            enable_artifact_probe: env_bool("ENABLE_ARTIFACT_PROBE", base.enable_artifact_probe),
            enable_sandbox_probe: env_bool("ENABLE_SANDBOX_PROBE", base.enable_sandbox_probe),
            installed_packages: env_list("INSTALLED_PACKAGES"),
            command_dir: env_optional_path("COMMAND_DIR"),
            command_timeout: env_millis("COMMAND_TIMEOUT_MS", 1_500),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "code", rename_all = "snake_case")]
pub enum JailbreakSignal {
    TestKeys { tags: String },
    SuBinary { path: String },
    RootPackage { package: String },
    SuExecutable { command: String },
    DangerousProperty { key: String, value: String },
    SystemPartitionWritable { mount_point: String },
    SelinuxPermissive,
    JailbreakArtifact { path: String },
    SandboxEscape { path: String },
}

impl Signal for JailbreakSignal {
    fn code(&self) -> &'static str {
        match self {
            Self::TestKeys { .. } => "test_keys",
            Self::SuBinary { .. } => "su_binary",
            Self::RootPackage { .. } => "root_package",
            Self::SuExecutable { .. } => "su_executable",
            Self::DangerousProperty { .. } => "dangerous_property",
            Self::SystemPartitionWritable { .. } => "system_partition_writable",
            Self::SelinuxPermissive => "selinux_permissive",
            Self::JailbreakArtifact { .. } => "jailbreak_artifact",
            Self::SandboxEscape { .. } => "sandbox_escape",
        }
    }
}

impl fmt::Display for JailbreakSignal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::TestKeys { tags } => write!(f, "build signed with test keys (tags={})", tags),
            Self::SuBinary { path } => write!(f, "su binary present at {}", path),
            Self::RootPackage { package } => write!(f, "root manager package installed: {}", package),
            Self::SuExecutable { command } => write!(f, "su is executable ({})", command),
            Self::DangerousProperty { key, value } => {
                write!(f, "dangerous system property {}={}", key, value)
            }
            Self::SystemPartitionWritable { mount_point } => {
                write!(f, "{} is mounted read-write", mount_point)
            }
            Self::SelinuxPermissive => write!(f, "SELinux is not enforcing"),
            Self::JailbreakArtifact { path } => write!(f, "jailbreak artifact present at {}", path),
            Self::SandboxEscape { path } => {
                write!(f, "write outside the sandbox succeeded ({})", path)
            }
        }
    }
}

pub type JailbreakObservation = Observation<JailbreakSignal>;

pub fn detect_jailbreak(config: &JailbreakCheckConfig) -> JailbreakObservation {
    let mut observation = JailbreakObservation::default();

    if config.enable_su_path_probe {
        probe_paths(
            &config.root,
            ANDROID_SU_PATHS.iter().chain(ANDROID_MAGISK_PATHS.iter()),
            &mut observation,
            |path| JailbreakSignal::SuBinary { path },
        );
    }

    if config.enable_artifact_probe {
        probe_paths(
            &config.root,
            IOS_JAILBREAK_PATHS.iter(),
            &mut observation,
            |path| JailbreakSignal::JailbreakArtifact { path },
        );
    }

    if config.enable_package_probe {
        probe_root_packages(config, &mut observation);
    }

    if config.enable_su_exec_probe {
        probe_su_exec(config, &mut observation);
    }

    if config.enable_property_probe {
        probe_properties(config, &mut observation);
    }

    if config.enable_mount_probe {
        probe_system_mount(&config.proc_root, &mut observation);
    }

    if config.enable_selinux_probe {
        probe_selinux(&config.root, &mut observation);
    }

    if config.enable_sandbox_probe {
        probe_sandbox_escape(&config.root, &mut observation);
    }

    observation.trace("jailbreak");
    observation
}

fn probe_paths<'a>(
    root: &Path,
    paths: impl Iterator<Item = &'a &'static str>,
    observation: &mut JailbreakObservation,
    signal: impl Fn(String) -> JailbreakSignal,
) {
    for path in paths {
        // symlink_metadata so a dangling link planted by a jailbreak still counts.
        if fs::symlink_metadata(rooted(root, path)).is_ok() {
            observation.push(signal((*path).to_string()));
        }
    }
}

fn probe_root_packages(config: &JailbreakCheckConfig, observation: &mut JailbreakObservation) {
    let mut installed: BTreeSet<String> = config
        .installed_packages
        .iter()
        .map(|package| package.trim().to_string())
        .collect();

    match read_optional(&rooted(&config.root, PACKAGES_LIST_PATH)) {
        Ok(Some(content)) => installed.extend(parse_packages_list(&content)),
        Ok(None) => {}
        Err(err) => observation.record_failure("packages_list", err),
    }

    for package in ROOT_PACKAGES {
        let data_dir = rooted(&config.root, PACKAGE_DATA_DIR).join(package);
        if installed.contains(package) || data_dir.exists() {
            observation.push(JailbreakSignal::RootPackage {
                package: package.to_string(),
            });
        }
    }
}

/// Package names from `/data/system/packages.list` (first column).
pub fn parse_packages_list(content: &str) -> Vec<String> {
    content
        .lines()
        .filter_map(|line| line.split_whitespace().next())
        .map(str::to_string)
        .collect()
}

fn probe_su_exec(config: &JailbreakCheckConfig, observation: &mut JailbreakObservation) {
    let candidates: [(&str, &[&str]); 2] = [("which", &["su"]), ("su", &["-c", "id"])];
    for (program, args) in candidates {
        let path = command::program_path(config.command_dir.as_deref(), program);
        match command::produces_output(&path, args, config.command_timeout) {
            Ok(true) => {
                observation.push(JailbreakSignal::SuExecutable {
                    command: format!("{} {}", program, args.join(" ")),
                });
                return;
            }
            Ok(false) => {}
            Err(err) => observation.record_failure("su_exec", err),
        }
    }
}

fn probe_properties(config: &JailbreakCheckConfig, observation: &mut JailbreakObservation) {
    let getprop = config
        .enable_getprop
        .then(|| command::program_path(config.command_dir.as_deref(), "getprop"));
    let mut props = PropertySource::load(&config.root, getprop, config.command_timeout);

    if let Some(tags) = props.get("ro.build.tags") {
        if tags.contains("test-keys") {
            observation.push(JailbreakSignal::TestKeys { tags });
        }
    }

    for (key, dangerous) in [("ro.secure", "0"), ("ro.debuggable", "1")] {
        if let Some(value) = props.get(key) {
            if value == dangerous {
                observation.push(JailbreakSignal::DangerousProperty {
                    key: key.to_string(),
                    value,
                });
            }
        }
    }

    for err in props.take_errors() {
        observation.record_failure("properties", err);
    }
}

fn probe_system_mount(proc_root: &Path, observation: &mut JailbreakObservation) {
    let path = proc_root.join("mounts");
    let content = match read_optional(&path) {
        Ok(Some(content)) => content,
        Ok(None) => return,
        Err(err) => {
            observation.record_failure("mounts", err);
            return;
        }
    };

    let writable = parse_mounts(&content)
        .into_iter()
        .any(|entry| entry.mount_point == SYSTEM_MOUNT_POINT && entry.has_option("rw"));
    if writable {
        observation.push(JailbreakSignal::SystemPartitionWritable {
            mount_point: SYSTEM_MOUNT_POINT.to_string(),
        });
    }
}

fn probe_selinux(root: &Path, observation: &mut JailbreakObservation) {
    match read_optional(&rooted(root, SELINUX_ENFORCE_PATH)) {
        Ok(Some(content)) if content.trim() == "0" => {
            observation.push(JailbreakSignal::SelinuxPermissive);
        }
        Ok(_) => {}
        Err(err) => observation.record_failure("selinux", err),
    }
}

fn probe_sandbox_escape(root: &Path, observation: &mut JailbreakObservation) {
    let target = rooted(root, SANDBOX_PROBE_FILE);
    // Denial is the expected outcome inside an intact sandbox.
    if fs::write(&target, b"device-integrity").is_err() {
        return;
    }
    if let Err(err) = fs::remove_file(&target) {
        observation.record_failure("sandbox_cleanup", IntegrityError::io(&target, err));
    }
    observation.push(JailbreakSignal::SandboxEscape {
        path: SANDBOX_PROBE_FILE.to_string(),
    });
}
