//! Android developer posture: USB debugging and developer options.

use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use serde::Serialize;

use crate::command;
use crate::env::{env_bool, env_millis, env_optional_path, env_path};
use crate::observation::{Observation, Signal};
use crate::platform::TargetProfile;
use crate::properties::PropertySource;

const USB_CONFIG_PROPERTIES: [&str; 3] = ["persist.sys.usb.config", "sys.usb.config", "sys.usb.state"];
const ADBD_SERVICE_PROPERTY: &str = "init.svc.adbd";

#[derive(Debug, Clone)]
pub struct DeveloperCheckConfig {
    pub root: PathBuf,
    pub enable_property_probe: bool,
    pub enable_getprop: bool,
    pub enable_settings_probe: bool,
    /// Directory holding `settings` and `getprop`; `PATH` lookup when unset.
    pub command_dir: Option<PathBuf>,
    pub command_timeout: Duration,
}

impl DeveloperCheckConfig {
    pub fn for_profile(profile: TargetProfile) -> Self {
        let android = profile.is_android();
        Self {
            root: PathBuf::from("/"),
            enable_property_probe: android,
            enable_getprop: android,
            enable_settings_probe: android,
            command_dir: None,
            command_timeout: Duration::from_millis(1_500),
        }
    }
}

impl Default for DeveloperCheckConfig {
    fn default() -> Self {
        let base = Self::for_profile(TargetProfile::from_env());
        Self {
            root: env_path("ROOT", "/"),
            enable_property_probe: env_bool("ENABLE_PROPERTY_PROBE", base.enable_property_probe),
            enable_getprop: env_bool("ENABLE_GETPROP", base.enable_getprop),
            enable_settings_probe: env_bool("ENABLE_SETTINGS_PROBE", base.enable_settings_probe),
            command_dir: env_optional_path("COMMAND_DIR"),
            command_timeout: env_millis("COMMAND_TIMEOUT_MS", 1_500),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "code", rename_all = "snake_case")]
pub enum DeveloperSignal {
    UsbDebugging { source: String },
    DeveloperOptions { source: String },
}

impl DeveloperSignal {
    pub fn is_usb_debugging(&self) -> bool {
        matches!(self, Self::UsbDebugging { .. })
    }

    pub fn is_developer_options(&self) -> bool {
        matches!(self, Self::DeveloperOptions { .. })
    }
}

impl Signal for DeveloperSignal {
    fn code(&self) -> &'static str {
        match self {
            Self::UsbDebugging { .. } => "usb_debugging",
            Self::DeveloperOptions { .. } => "developer_options",
        }
    }
}

impl fmt::Display for DeveloperSignal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UsbDebugging { source } => write!(f, "USB debugging enabled ({})", source),
            Self::DeveloperOptions { source } => {
                write!(f, "developer options enabled ({})", source)
            }
        }
    }
}

pub type DeveloperObservation = Observation<DeveloperSignal>;

impl DeveloperObservation {
    pub fn usb_debugging(&self) -> bool {
        self.signals.iter().any(DeveloperSignal::is_usb_debugging)
    }

    pub fn developer_options(&self) -> bool {
        self.signals.iter().any(DeveloperSignal::is_developer_options)
    }
}

pub fn detect_developer_posture(config: &DeveloperCheckConfig) -> DeveloperObservation {
    let mut observation = DeveloperObservation::default();

    if config.enable_property_probe {
        let getprop = config
            .enable_getprop
            .then(|| command::program_path(config.command_dir.as_deref(), "getprop"));
        let mut props = PropertySource::load(&config.root, getprop, config.command_timeout);
        if let Some(source) = usb_debugging_property(&mut props) {
            observation.push(DeveloperSignal::UsbDebugging { source });
        }
        for err in props.take_errors() {
            observation.record_failure("properties", err);
        }
    }

    if config.enable_settings_probe {
        if !observation.usb_debugging() {
            match global_setting_enabled(config, "adb_enabled") {
                Ok(true) => observation.push(DeveloperSignal::UsbDebugging {
                    source: "settings:adb_enabled".to_string(),
                }),
                Ok(false) => {}
                Err(err) => observation.record_failure("settings_adb_enabled", err),
            }
        }
        match global_setting_enabled(config, "development_settings_enabled") {
            Ok(true) => observation.push(DeveloperSignal::DeveloperOptions {
                source: "settings:development_settings_enabled".to_string(),
            }),
            Ok(false) => {}
            Err(err) => observation.record_failure("settings_development", err),
        }
    }

    observation.trace("developer");
    observation
}

fn usb_debugging_property(props: &mut PropertySource) -> Option<String> {
    for key in USB_CONFIG_PROPERTIES {
        if let Some(value) = props.get(key) {
            if usb_functions_include_adb(&value) {
                return Some(format!("{}={}", key, value));
            }
        }
    }
    match props.get(ADBD_SERVICE_PROPERTY) {
        Some(state) if state == "running" => Some(format!("{}={}", ADBD_SERVICE_PROPERTY, state)),
        _ => None,
    }
}

/// `persist.sys.usb.config` style values are comma-separated gadget functions.
pub fn usb_functions_include_adb(value: &str) -> bool {
    value.split(',').any(|function| function.trim() == "adb")
}

fn global_setting_enabled(
    config: &DeveloperCheckConfig,
    key: &str,
) -> crate::error::Result<bool> {
    let settings = command::program_path(config.command_dir.as_deref(), "settings");
    let value = command::first_line(&settings, &["get", "global", key], config.command_timeout)?;
    Ok(value.as_deref() == Some("1"))
}
