mod common;

use common::{FixtureRoot, CLEAN_MAPS, CLEAN_STATUS};
use device_integrity::{detect_debuggable, DebuggableCheckConfig, DebuggableSignal};

const DEVELOPMENT_PROFILE: &str = "0\u{82}\u{1}binary-preamble<?xml version=\"1.0\" encoding=\"UTF-8\"?>
<plist version=\"1.0\"><dict>
\t<key>Entitlements</key>
\t<dict>
\t\t<key>application-identifier</key><string>ABCDE12345.com.example.app</string>
\t\t<key>get-task-allow</key>
\t\t<true/>
\t</dict>
</dict></plist>trailing-signature";

const DISTRIBUTION_PROFILE: &str = "<plist><dict><key>get-task-allow</key><false/></dict></plist>";

fn runtime_only(root: &FixtureRoot) -> DebuggableCheckConfig {
    DebuggableCheckConfig {
        proc_root: root.join("/proc"),
        provisioning_profile: None,
        enable_build_profile_probe: false,
        enable_jdwp_probe: true,
        enable_provisioning_probe: true,
    }
}

#[test]
fn jdwp_thread_marks_app_debuggable() {
    let root = FixtureRoot::new("dbgable-jdwp");
    root.write_proc_self(
        CLEAN_STATUS,
        CLEAN_MAPS,
        &[(200, "main"), (205, "Jit thread pool"), (207, "ADB-JDWP Connec")],
    );

    let observation = detect_debuggable(&runtime_only(&root));
    assert_eq!(
        observation.signals,
        vec![DebuggableSignal::JdwpThread {
            tid: 207,
            name: "ADB-JDWP Connec".to_string()
        }]
    );
}

#[test]
fn release_process_without_profile_is_clean() {
    let root = FixtureRoot::new("dbgable-clean");
    root.write_proc_self(CLEAN_STATUS, CLEAN_MAPS, &[(200, "main")]);

    let mut config = runtime_only(&root);
    config.provisioning_profile = Some(root.join("/App.app/embedded.mobileprovision"));
    let observation = detect_debuggable(&config);
    assert!(!observation.detected());
    assert!(observation.failures.is_empty());
}

#[test]
fn development_provisioning_profile_is_detected() {
    let root = FixtureRoot::new("dbgable-profile");
    root.write_proc_self(CLEAN_STATUS, CLEAN_MAPS, &[]);
    let profile = root.write("/App.app/embedded.mobileprovision", DEVELOPMENT_PROFILE);

    let mut config = runtime_only(&root);
    config.provisioning_profile = Some(profile.clone());
    let observation = detect_debuggable(&config);
    assert_eq!(
        observation.signals,
        vec![DebuggableSignal::GetTaskAllow {
            path: profile.display().to_string()
        }]
    );
}

#[test]
fn distribution_provisioning_profile_is_clean() {
    let root = FixtureRoot::new("dbgable-dist");
    root.write_proc_self(CLEAN_STATUS, CLEAN_MAPS, &[]);
    let profile = root.write("/App.app/embedded.mobileprovision", DISTRIBUTION_PROFILE);

    let mut config = runtime_only(&root);
    config.provisioning_profile = Some(profile);
    assert!(!detect_debuggable(&config).detected());
}

#[test]
fn build_profile_probe_follows_debug_assertions() {
    let config = DebuggableCheckConfig {
        proc_root: "/proc".into(),
        provisioning_profile: None,
        enable_build_profile_probe: true,
        enable_jdwp_probe: false,
        enable_provisioning_probe: false,
    };
    let observation = detect_debuggable(&config);
    assert_eq!(observation.detected(), cfg!(debug_assertions));
}
