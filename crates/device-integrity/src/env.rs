use std::path::PathBuf;
use std::time::Duration;

pub(crate) const ENV_PREFIX: &str = "DEVICE_INTEGRITY_";

fn var(name: &str) -> Option<String> {
    std::env::var(format!("{ENV_PREFIX}{name}"))
        .ok()
        .filter(|raw| !raw.trim().is_empty())
}

pub(crate) fn env_bool(name: &str, default: bool) -> bool {
    match var(name) {
        Some(raw) => matches!(
            raw.trim().to_ascii_lowercase().as_str(),
            "1" | "true" | "yes" | "enabled" | "on"
        ),
        None => default,
    }
}

pub(crate) fn env_u64(name: &str, default: u64) -> u64 {
    var(name)
        .and_then(|raw| raw.trim().parse::<u64>().ok())
        .unwrap_or(default)
}

pub(crate) fn env_u32(name: &str, default: u32) -> u32 {
    var(name)
        .and_then(|raw| raw.trim().parse::<u32>().ok())
        .unwrap_or(default)
}

pub(crate) fn env_i32(name: &str, default: i32) -> i32 {
    var(name)
        .and_then(|raw| raw.trim().parse::<i32>().ok())
        .unwrap_or(default)
}

pub(crate) fn env_millis(name: &str, default_ms: u64) -> Duration {
    Duration::from_millis(env_u64(name, default_ms))
}

pub(crate) fn env_path(name: &str, default: &str) -> PathBuf {
    var(name)
        .map(|raw| PathBuf::from(raw.trim()))
        .unwrap_or_else(|| PathBuf::from(default))
}

pub(crate) fn env_optional_path(name: &str) -> Option<PathBuf> {
    var(name).map(|raw| PathBuf::from(raw.trim()))
}

pub(crate) fn env_string(name: &str) -> Option<String> {
    var(name).map(|raw| raw.trim().to_string())
}

pub(crate) fn env_list(name: &str) -> Vec<String> {
    let Some(raw) = var(name) else {
        return Vec::new();
    };
    raw.split(',')
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .map(str::to_string)
        .collect()
}

pub(crate) fn env_ports(name: &str, fallback: &[u16]) -> Vec<u16> {
    let parsed: Vec<u16> = env_list(name)
        .iter()
        .filter_map(|raw| raw.parse::<u16>().ok())
        .filter(|port| *port != 0)
        .collect();
    if parsed.is_empty() {
        fallback.to_vec()
    } else {
        parsed
    }
}
