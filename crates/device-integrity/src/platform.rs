use std::fmt;

use serde::Serialize;

use crate::env::env_string;

/// Which family of host heuristics applies.
///
/// Android and iOS artifacts overlap with ordinary desktop files (`/bin/bash`,
/// `/usr/sbin/sshd`), so the profile decides which probes are enabled by
/// default. `Generic` keeps only the probes that cannot misfire on a desktop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TargetProfile {
    Android,
    Ios,
    Generic,
}

impl TargetProfile {
    pub fn current() -> Self {
        if cfg!(target_os = "android") {
            Self::Android
        } else if cfg!(target_os = "ios") {
            Self::Ios
        } else {
            Self::Generic
        }
    }

    /// `DEVICE_INTEGRITY_PROFILE`, falling back to the compile target.
    pub fn from_env() -> Self {
        env_string("PROFILE")
            .and_then(|raw| Self::parse(&raw))
            .unwrap_or_else(Self::current)
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "android" => Some(Self::Android),
            "ios" => Some(Self::Ios),
            "generic" | "linux" | "macos" | "desktop" => Some(Self::Generic),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Android => "android",
            Self::Ios => "ios",
            Self::Generic => "generic",
        }
    }

    pub fn is_android(self) -> bool {
        matches!(self, Self::Android)
    }

    pub fn is_ios(self) -> bool {
        matches!(self, Self::Ios)
    }
}

impl fmt::Display for TargetProfile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Joins an absolute host path onto a probe root, so `/system/bin/su` under a
/// root of `/tmp/fixture` becomes `/tmp/fixture/system/bin/su`.
pub(crate) fn rooted(root: &std::path::Path, host_path: &str) -> std::path::PathBuf {
    root.join(host_path.trim_start_matches('/'))
}
