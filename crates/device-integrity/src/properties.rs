//! Android system properties.
//!
//! `getprop` is authoritative when available; the on-disk property files are
//! the fallback for hosts where spawning is blocked or for fixture roots.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::command;
use crate::error::IntegrityError;
use crate::platform::rooted;
use crate::procfs::read_optional;

pub const PROPERTY_FILES: [&str; 5] = [
    "/default.prop",
    "/system/build.prop",
    "/system/etc/prop.default",
    "/vendor/build.prop",
    "/product/build.prop",
];

pub fn parse_build_prop(content: &str) -> BTreeMap<String, String> {
    let mut out = BTreeMap::new();
    for line in content.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let Some((key, value)) = line.split_once('=') else {
            continue;
        };
        let key = key.trim();
        if key.is_empty() {
            continue;
        }
        // ro.* properties are write-once, so the first definition wins.
        out.entry(key.to_string())
            .or_insert_with(|| value.trim().to_string());
    }
    out
}

#[derive(Debug)]
pub struct PropertySource {
    values: BTreeMap<String, String>,
    getprop: Option<PathBuf>,
    timeout: Duration,
    errors: Vec<IntegrityError>,
}

impl PropertySource {
    /// Property files under `root`, plus `getprop` lookups when a program is given.
    pub fn load(root: &Path, getprop: Option<PathBuf>, timeout: Duration) -> Self {
        let mut values = BTreeMap::new();
        let mut errors = Vec::new();
        for file in PROPERTY_FILES {
            match read_optional(&rooted(root, file)) {
                Ok(Some(content)) => {
                    for (key, value) in parse_build_prop(&content) {
                        values.entry(key).or_insert(value);
                    }
                }
                Ok(None) => {}
                Err(err) => errors.push(err),
            }
        }
        Self {
            values,
            getprop,
            timeout,
            errors,
        }
    }

    pub fn get(&mut self, key: &str) -> Option<String> {
        if let Some(getprop) = &self.getprop {
            match command::first_line(getprop, &[key], self.timeout) {
                Ok(Some(value)) => return Some(value),
                Ok(None) => {}
                Err(err) => self.errors.push(err),
            }
        }
        self.values.get(key).cloned()
    }

    /// Read failures accumulated so far; draining them leaves the cache intact.
    pub fn take_errors(&mut self) -> Vec<IntegrityError> {
        std::mem::take(&mut self.errors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_build_prop_ignores_comments_and_keeps_first_definition() {
        let content = "\
# begin build properties
ro.build.tags=release-keys
ro.secure = 1
=orphan
not a property
ro.build.tags=test-keys
ro.build.fingerprint=google/x/y:14/AP1A/123:user/release-keys
";
        let props = parse_build_prop(content);
        assert_eq!(props.get("ro.build.tags").map(String::as_str), Some("release-keys"));
        assert_eq!(props.get("ro.secure").map(String::as_str), Some("1"));
        assert_eq!(
            props.get("ro.build.fingerprint").map(String::as_str),
            Some("google/x/y:14/AP1A/123:user/release-keys")
        );
        assert_eq!(props.len(), 3);
    }

    #[test]
    fn empty_root_yields_no_properties() {
        let root = std::env::temp_dir().join("device-integrity-empty-prop-root");
        let mut source = PropertySource::load(&root, None, Duration::from_millis(100));
        assert_eq!(source.get("ro.secure"), None);
        assert!(source.take_errors().is_empty());
    }
}
