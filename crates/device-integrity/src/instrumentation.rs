//! Dynamic instrumentation (Frida, Xposed, Substrate) detection.

use std::fmt;
use std::fs;
use std::net::{IpAddr, Ipv4Addr, SocketAddr, TcpStream};
use std::path::PathBuf;
use std::time::Duration;

use serde::Serialize;

use crate::env::{env_bool, env_list, env_millis, env_path, env_ports};
use crate::observation::{Observation, Signal};
use crate::platform::{rooted, TargetProfile};
use crate::procfs::{read_required, read_thread_names, scan_maps_for_keywords};

pub const DEFAULT_FRIDA_PORTS: [u16; 2] = [27042, 27043];

pub const MAPS_KEYWORDS: [&str; 10] = [
    "frida",
    "gum-js-loop",
    "libfrida",
    "frida-gadget",
    "re.frida.server",
    "frida-agent",
    "substrate",
    "xposed",
    "edxp",
    "lsposed",
];

pub const INSTRUMENTATION_THREAD_NAMES: [&str; 2] = ["gum-js-loop", "pool-frida"];

/// GLib worker threads the Frida agent brings into an app process. Desktop
/// GLib programs run the same threads, so these only count on Android.
pub const ANDROID_AGENT_THREAD_NAMES: [&str; 2] = ["gmain", "gdbus"];

pub const INSTRUMENTATION_ARTIFACT_PATHS: [&str; 11] = [
    "/data/local/tmp/frida-server",
    "/data/local/tmp/re.frida.server",
    "/system/bin/frida-server",
    "/system/xbin/frida-server",
    "/system/framework/XposedBridge.jar",
    "/system/lib/libsubstrate.so",
    "/system/lib64/libsubstrate.so",
    "/data/adb/modules/lsposed",
    "/data/adb/modules/riru_edxposed",
    "/usr/sbin/frida-server",
    "/usr/lib/frida/frida-agent.dylib",
];

pub const SUSPICIOUS_IMAGE_KEYWORDS: [&str; 7] = [
    "fridagadget",
    "frida",
    "cynject",
    "libcycript",
    "mobilesubstrate",
    "substrateloader",
    "tweakinject",
];

#[derive(Debug, Clone)]
pub struct InstrumentationCheckConfig {
    pub root: PathBuf,
    pub proc_root: PathBuf,
    pub maps_keywords: Vec<String>,
    pub thread_names: Vec<String>,
    pub ports: Vec<u16>,
    pub connect_host: IpAddr,
    pub connect_timeout: Duration,
    pub enable_maps_probe: bool,
    pub enable_thread_probe: bool,
    pub enable_port_probe: bool,
    pub enable_artifact_probe: bool,
    pub enable_image_probe: bool,
}

impl InstrumentationCheckConfig {
    /// Probe set for `profile` with no environment overrides applied.
    pub fn for_profile(profile: TargetProfile) -> Self {
        let procfs_host = cfg!(any(target_os = "linux", target_os = "android"));
        let mut thread_names: Vec<String> = INSTRUMENTATION_THREAD_NAMES
            .iter()
            .map(|name| name.to_string())
            .collect();
        if profile.is_android() {
            thread_names.extend(
                ANDROID_AGENT_THREAD_NAMES
                    .iter()
                    .map(|name| name.to_string()),
            );
        }
        Self {
            root: PathBuf::from("/"),
            proc_root: PathBuf::from("/proc"),
            maps_keywords: MAPS_KEYWORDS.iter().map(|k| k.to_string()).collect(),
            thread_names,
            ports: DEFAULT_FRIDA_PORTS.to_vec(),
            connect_host: IpAddr::V4(Ipv4Addr::LOCALHOST),
            connect_timeout: Duration::from_millis(100),
            enable_maps_probe: procfs_host,
            enable_thread_probe: procfs_host,
            enable_port_probe: true,
            enable_artifact_probe: true,
            enable_image_probe: cfg!(any(target_os = "macos", target_os = "ios")),
        }
    }
}

impl Default for InstrumentationCheckConfig {
    fn default() -> Self {
        let base = Self::for_profile(TargetProfile::from_env());
        let mut maps_keywords = base.maps_keywords;
        maps_keywords.extend(env_list("EXTRA_MAPS_KEYWORDS"));
        Self {
            root: env_path("ROOT", "/"),
            proc_root: env_path("PROC_ROOT", "/proc"),
            maps_keywords,
            thread_names: base.thread_names,
            ports: env_ports("FRIDA_PORTS", &DEFAULT_FRIDA_PORTS),
            connect_host: base.connect_host,
            connect_timeout: env_millis("CONNECT_TIMEOUT_MS", 100),
            enable_maps_probe: env_bool("ENABLE_MAPS_PROBE", base.enable_maps_probe),
            enable_thread_probe: env_bool("ENABLE_THREAD_PROBE", base.enable_thread_probe),
            enable_port_probe: env_bool("ENABLE_PORT_PROBE", base.enable_port_probe),
            enable_artifact_probe: env_bool(
                "ENABLE_INSTRUMENTATION_ARTIFACTS",
                base.enable_artifact_probe,
            ),
            enable_image_probe: env_bool("ENABLE_IMAGE_PROBE", base.enable_image_probe),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "code", rename_all = "snake_case")]
pub enum InstrumentationSignal {
    MappedLibrary { keyword: String, path: String },
    InstrumentationThread { tid: u32, name: String },
    ListeningPort { port: u16 },
    ArtifactPath { path: String },
    LoadedImage { name: String },
}

impl Signal for InstrumentationSignal {
    fn code(&self) -> &'static str {
        match self {
            Self::MappedLibrary { .. } => "mapped_library",
            Self::InstrumentationThread { .. } => "instrumentation_thread",
            Self::ListeningPort { .. } => "listening_port",
            Self::ArtifactPath { .. } => "artifact_path",
            Self::LoadedImage { .. } => "loaded_image",
        }
    }
}

impl fmt::Display for InstrumentationSignal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MappedLibrary { keyword, path } => {
                write!(f, "mapping matches '{}': {}", keyword, path)
            }
            Self::InstrumentationThread { tid, name } => {
                write!(f, "instrumentation thread '{}' (tid={})", name, tid)
            }
            Self::ListeningPort { port } => {
                write!(f, "instrumentation server port {} accepts connections", port)
            }
            Self::ArtifactPath { path } => write!(f, "instrumentation artifact at {}", path),
            Self::LoadedImage { name } => write!(f, "suspicious image loaded: {}", name),
        }
    }
}

pub type InstrumentationObservation = Observation<InstrumentationSignal>;

pub fn detect_instrumentation(config: &InstrumentationCheckConfig) -> InstrumentationObservation {
    let mut observation = InstrumentationObservation::default();

    if config.enable_maps_probe {
        let maps_path = config.proc_root.join("self").join("maps");
        match read_required(&maps_path) {
            Ok(maps) => {
                for (keyword, path) in scan_maps_for_keywords(&maps, &config.maps_keywords) {
                    observation.push(InstrumentationSignal::MappedLibrary { keyword, path });
                }
            }
            Err(err) => observation.record_failure("maps", err),
        }
    }

    if config.enable_thread_probe {
        match read_thread_names(&config.proc_root) {
            Ok(threads) => {
                for (tid, name) in threads {
                    if config.thread_names.iter().any(|needle| name == *needle) {
                        observation.push(InstrumentationSignal::InstrumentationThread { tid, name });
                    }
                }
            }
            Err(err) => observation.record_failure("threads", err),
        }
    }

    if config.enable_port_probe {
        for port in &config.ports {
            if port_accepts(config.connect_host, *port, config.connect_timeout) {
                observation.push(InstrumentationSignal::ListeningPort { port: *port });
            }
        }
    }

    if config.enable_artifact_probe {
        for path in INSTRUMENTATION_ARTIFACT_PATHS {
            if fs::symlink_metadata(rooted(&config.root, path)).is_ok() {
                observation.push(InstrumentationSignal::ArtifactPath {
                    path: path.to_string(),
                });
            }
        }
    }

    if config.enable_image_probe {
        for name in loaded_image_names() {
            if image_is_suspicious(&name) {
                observation.push(InstrumentationSignal::LoadedImage { name });
            }
        }
    }

    observation.trace("instrumentation");
    observation
}

fn port_accepts(host: IpAddr, port: u16, timeout: Duration) -> bool {
    TcpStream::connect_timeout(&SocketAddr::new(host, port), timeout).is_ok()
}

pub fn image_is_suspicious(name: &str) -> bool {
    let lowered = name.to_ascii_lowercase();
    SUSPICIOUS_IMAGE_KEYWORDS
        .iter()
        .any(|keyword| lowered.contains(keyword))
}

/// Paths of every image dyld has loaded into this process.
#[cfg(any(target_os = "macos", target_os = "ios"))]
pub fn loaded_image_names() -> Vec<String> {
    // SAFETY: dyld's image table is append-only; indexes below the count
    // return valid C strings or null.
    let count = unsafe { libc::_dyld_image_count() };
    let mut out = Vec::with_capacity(count as usize);
    for index in 0..count {
        // SAFETY: index is below the count returned above.
        let raw = unsafe { libc::_dyld_get_image_name(index) };
        if raw.is_null() {
            continue;
        }
        // SAFETY: non-null pointers from dyld are NUL-terminated.
        let name = unsafe { std::ffi::CStr::from_ptr(raw) };
        out.push(name.to_string_lossy().into_owned());
    }
    out
}

#[cfg(not(any(target_os = "macos", target_os = "ios")))]
pub fn loaded_image_names() -> Vec<String> {
    Vec::new()
}
