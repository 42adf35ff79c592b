#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

/// Throwaway directory standing in for a device filesystem root.
pub struct FixtureRoot {
    path: PathBuf,
}

impl FixtureRoot {
    pub fn new(label: &str) -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(0);
        let path = std::env::temp_dir().join(format!(
            "device-integrity-{}-{}-{}-{}",
            label,
            std::process::id(),
            COUNTER.fetch_add(1, Ordering::Relaxed),
            std::time::SystemTime::now()
                .duration_since(std::time::UNIX_EPOCH)
                .map(|d| d.as_nanos())
                .unwrap_or_default()
        ));
        fs::create_dir_all(&path).expect("create fixture root");
        Self { path }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn join(&self, host_path: &str) -> PathBuf {
        self.path.join(host_path.trim_start_matches('/'))
    }

    pub fn write(&self, host_path: &str, content: &str) -> PathBuf {
        let target = self.join(host_path);
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent).expect("create fixture parent");
        }
        fs::write(&target, content).expect("write fixture file");
        target
    }

    pub fn mkdir(&self, host_path: &str) -> PathBuf {
        let target = self.join(host_path);
        fs::create_dir_all(&target).expect("create fixture dir");
        target
    }

    /// An executable `#!/bin/sh` script at `host_path`, standing in for a
    /// device tool such as `su` or `settings`.
    #[cfg(unix)]
    pub fn write_script(&self, host_path: &str, body: &str) -> PathBuf {
        use std::os::unix::fs::PermissionsExt;

        let target = self.write(host_path, &format!("#!/bin/sh\n{}\n", body));
        fs::set_permissions(&target, fs::Permissions::from_mode(0o755))
            .expect("mark fixture script executable");
        target
    }

    /// A fake `/proc/self` with the given status, maps and thread names.
    pub fn write_proc_self(&self, status: &str, maps: &str, threads: &[(u32, &str)]) {
        self.write("/proc/self/status", status);
        self.write("/proc/self/maps", maps);
        for (tid, name) in threads {
            self.write(&format!("/proc/self/task/{}/comm", tid), &format!("{}\n", name));
        }
    }
}

impl Drop for FixtureRoot {
    fn drop(&mut self) {
        let _ = fs::remove_dir_all(&self.path);
    }
}

pub const CLEAN_STATUS: &str = "Name:\tapp\nState:\tS (sleeping)\nTracerPid:\t0\nUid:\t10123\n";
pub const TRACED_STATUS: &str = "Name:\tapp\nState:\tt (tracing stop)\nTracerPid:\t4242\n";
pub const CLEAN_MAPS: &str = "\
5f00-5f01 r-xp 00000000 fd:01 10 /system/bin/app_process64
7f00-7f01 r-xp 00000000 fd:01 11 /system/lib64/libc.so
7f01-7f02 rw-p 00000000 00:00 0
";
