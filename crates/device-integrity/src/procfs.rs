//! Readers and parsers for the `/proc` files the probes consume.
//!
//! Parsers take text so they can be exercised without a live procfs; the
//! readers resolve everything relative to a caller-supplied proc root.

use std::fs;
use std::io;
use std::path::Path;

use crate::error::{IntegrityError, Result};

pub fn parse_tracer_pid(status: &str) -> Option<u32> {
    for line in status.lines() {
        let Some(raw) = line.strip_prefix("TracerPid:") else {
            continue;
        };
        let value = raw.trim();
        if value.is_empty() {
            return None;
        }
        return value.parse::<u32>().ok();
    }
    None
}

/// Pathname column of a `/proc/<pid>/maps` line, if the mapping has one.
pub fn maps_pathname(line: &str) -> Option<&str> {
    let mut rest = line;
    // address, perms, offset, dev, inode
    for _ in 0..5 {
        rest = rest.trim_start();
        let end = rest.find(char::is_whitespace)?;
        rest = &rest[end..];
    }
    let path = rest.trim();
    if path.is_empty() {
        None
    } else {
        Some(path)
    }
}

/// Mappings whose line mentions any keyword, as `(keyword, pathname)` pairs.
///
/// Each distinct pathname is reported once, against the first keyword that
/// matched it. Matching is case-insensitive on the whole line.
pub fn scan_maps_for_keywords(maps: &str, keywords: &[String]) -> Vec<(String, String)> {
    let lowered_keywords: Vec<String> = keywords
        .iter()
        .map(|keyword| keyword.trim().to_ascii_lowercase())
        .filter(|keyword| !keyword.is_empty())
        .collect();

    let mut hits: Vec<(String, String)> = Vec::new();
    for line in maps.lines() {
        let lowered = line.to_ascii_lowercase();
        let Some(keyword) = lowered_keywords
            .iter()
            .find(|keyword| lowered.contains(keyword.as_str()))
        else {
            continue;
        };
        let path = maps_pathname(line).unwrap_or(line.trim()).to_string();
        if hits.iter().any(|(_, seen)| *seen == path) {
            continue;
        }
        hits.push((keyword.clone(), path));
    }
    hits
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MountEntry {
    pub device: String,
    pub mount_point: String,
    pub fs_type: String,
    pub options: Vec<String>,
}

impl MountEntry {
    pub fn has_option(&self, option: &str) -> bool {
        self.options.iter().any(|candidate| candidate == option)
    }
}

pub fn parse_mounts(content: &str) -> Vec<MountEntry> {
    let mut out = Vec::new();
    for line in content.lines() {
        let mut fields = line.split_whitespace();
        let (Some(device), Some(mount_point), Some(fs_type), Some(options)) =
            (fields.next(), fields.next(), fields.next(), fields.next())
        else {
            continue;
        };
        out.push(MountEntry {
            device: device.to_string(),
            mount_point: unescape_mount_field(mount_point),
            fs_type: fs_type.to_string(),
            options: options.split(',').map(str::to_string).collect(),
        });
    }
    out
}

// The kernel octal-escapes space, tab, newline and backslash in mount fields.
fn unescape_mount_field(raw: &str) -> String {
    if !raw.contains('\\') {
        return raw.to_string();
    }
    let bytes = raw.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut idx = 0;
    while idx < bytes.len() {
        if bytes[idx] == b'\\' && idx + 4 <= bytes.len() {
            let decoded = std::str::from_utf8(&bytes[idx + 1..idx + 4])
                .ok()
                .and_then(|digits| u8::from_str_radix(digits, 8).ok());
            if let Some(value) = decoded {
                out.push(value);
                idx += 4;
                continue;
            }
        }
        out.push(bytes[idx]);
        idx += 1;
    }
    String::from_utf8_lossy(&out).into_owned()
}

/// Reads a file, treating absence as `None` rather than an error.
pub(crate) fn read_optional(path: &Path) -> Result<Option<String>> {
    match fs::read(path) {
        Ok(bytes) => Ok(Some(String::from_utf8_lossy(&bytes).into_owned())),
        Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(None),
        Err(err) => Err(IntegrityError::io(path, err)),
    }
}

pub(crate) fn read_required(path: &Path) -> Result<String> {
    fs::read(path)
        .map(|bytes| String::from_utf8_lossy(&bytes).into_owned())
        .map_err(|err| IntegrityError::io(path, err))
}

/// Names of the current process' threads, from `<proc_root>/self/task/*/comm`.
pub fn read_thread_names(proc_root: &Path) -> Result<Vec<(u32, String)>> {
    let task_dir = proc_root.join("self").join("task");
    let entries = fs::read_dir(&task_dir).map_err(|err| IntegrityError::io(&task_dir, err))?;

    let mut out = Vec::new();
    for entry in entries.flatten() {
        let Some(tid) = entry
            .file_name()
            .to_str()
            .and_then(|name| name.parse::<u32>().ok())
        else {
            continue;
        };
        // Threads can exit between listing and reading.
        let Ok(comm) = fs::read_to_string(entry.path().join("comm")) else {
            continue;
        };
        out.push((tid, comm.trim_end_matches('\n').to_string()));
    }
    out.sort_by_key(|(tid, _)| *tid);
    Ok(out)
}
