mod common;

use std::time::Duration;

use common::{FixtureRoot, CLEAN_MAPS, CLEAN_STATUS, TRACED_STATUS};
use device_integrity::{
    DebuggableCheckConfig, DebuggerCheckConfig, DenyDebuggerConfig, DeveloperCheckConfig,
    IntegrityConfig, IntegrityEngine, IntegrityReport, InstrumentationCheckConfig,
    JailbreakCheckConfig, JailbreakSignal, TargetProfile,
};

fn fixture_engine(root: &FixtureRoot) -> IntegrityEngine {
    let proc_root = root.join("/proc");
    IntegrityEngine::new(IntegrityConfig {
        jailbreak: JailbreakCheckConfig {
            root: root.path().to_path_buf(),
            proc_root: proc_root.clone(),
            enable_su_exec_probe: false,
            enable_getprop: false,
            ..JailbreakCheckConfig::for_profile(TargetProfile::Android)
        },
        debugger: DebuggerCheckConfig {
            proc_root: proc_root.clone(),
            enable_tracer_pid_probe: true,
            enable_traced_flag_probe: false,
            enable_timing_probe: false,
            ..DebuggerCheckConfig::default()
        },
        instrumentation: InstrumentationCheckConfig {
            root: root.path().to_path_buf(),
            proc_root: proc_root.clone(),
            enable_maps_probe: true,
            enable_thread_probe: true,
            enable_port_probe: false,
            enable_artifact_probe: true,
            enable_image_probe: false,
            ..InstrumentationCheckConfig::default()
        },
        debuggable: DebuggableCheckConfig {
            proc_root,
            provisioning_profile: None,
            enable_build_profile_probe: false,
            enable_jdwp_probe: true,
            enable_provisioning_probe: false,
        },
        developer: DeveloperCheckConfig {
            root: root.path().to_path_buf(),
            enable_property_probe: true,
            enable_getprop: false,
            enable_settings_probe: false,
            command_dir: None,
            command_timeout: Duration::from_millis(200),
        },
        enforcement: DenyDebuggerConfig {
            deny_attach: false,
            set_dumpable_zero: false,
            restrict_ptracer: false,
            terminate_if_attached: false,
            terminate_exit_code: 1,
            debugger: DebuggerCheckConfig {
                enable_tracer_pid_probe: false,
                enable_traced_flag_probe: false,
                enable_timing_probe: false,
                ..DebuggerCheckConfig::default()
            },
        },
    })
}

fn clean_device(label: &str) -> FixtureRoot {
    let root = FixtureRoot::new(label);
    root.write_proc_self(CLEAN_STATUS, CLEAN_MAPS, &[(300, "main")]);
    root.write(
        "/system/build.prop",
        "ro.build.tags=release-keys\nro.secure=1\nro.debuggable=0\npersist.sys.usb.config=mtp\n",
    );
    root.write("/proc/mounts", "/dev/block/dm-0 /system ext4 ro,relatime 0 0\n");
    root.write("/sys/fs/selinux/enforce", "1\n");
    root
}

#[test]
fn clean_device_is_secure() {
    let root = clean_device("engine-clean");
    let report = fixture_engine(&root).evaluate();

    assert!(report.is_secure(), "unexpected: {}", report.summary());
    assert!(report.violation_codes().is_empty());
    assert!(report.failures().is_empty());
    assert_eq!(report.summary(), "ok");
}

#[test]
fn compromised_device_sets_every_matching_flag() {
    let root = clean_device("engine-compromised");
    root.write_proc_self(
        TRACED_STATUS,
        &format!("{}7f30-7f40 r-xp 00000000 fd:01 7 /data/local/tmp/frida-agent-64.so\n", CLEAN_MAPS),
        &[(300, "main"), (301, "JDWP")],
    );
    root.write("/sbin/su", "");
    root.write("/default.prop", "persist.sys.usb.config=adb\n");

    let report = fixture_engine(&root).evaluate();
    let verdict = report.verdict();
    assert!(verdict.rooted);
    assert!(verdict.debugger);
    assert!(verdict.frida);
    assert!(verdict.app_debuggable);
    assert!(verdict.usb_debug);
    assert!(!verdict.developer_options);
    assert!(!verdict.is_secure);

    let codes = report.violation_codes();
    assert!(codes.contains(&"jailbreak:su_binary".to_string()));
    assert!(codes.contains(&"debugger:tracer_pid_detected".to_string()));
    assert!(codes.contains(&"instrumentation:mapped_library".to_string()));
    assert!(codes.contains(&"debuggable:jdwp_thread".to_string()));
    assert!(codes.contains(&"developer:usb_debugging".to_string()));
}

#[cfg(unix)]
#[test]
fn developer_options_alone_make_device_insecure() {
    let root = clean_device("engine-dev-options");
    root.write_script(
        "/bin/settings",
        r#"if [ "$3" = "development_settings_enabled" ]; then echo 1; else echo 0; fi"#,
    );

    let mut config = fixture_engine(&root).config().clone();
    config.developer.enable_settings_probe = true;
    config.developer.command_dir = Some(root.join("/bin"));
    config.developer.command_timeout = Duration::from_secs(5);
    let report = IntegrityEngine::new(config).evaluate();

    let verdict = report.verdict();
    assert!(verdict.developer_options);
    assert!(!verdict.usb_debug);
    assert!(!verdict.rooted);
    assert!(!verdict.is_secure);
    assert_eq!(report.violation_codes(), vec!["developer:developer_options"]);

    let json: serde_json::Value =
        serde_json::from_str(&report.to_json()).expect("verdict json parses");
    assert_eq!(json["developerOptions"], serde_json::Value::Bool(true));
    assert_eq!(json["isSecure"], serde_json::Value::Bool(false));
}

#[test]
fn verdict_json_uses_bridge_field_names() {
    let report = IntegrityReport::default();
    let value: serde_json::Value =
        serde_json::from_str(&report.to_json()).expect("verdict json parses");

    for key in [
        "rooted",
        "debugger",
        "usbDebug",
        "developerOptions",
        "frida",
        "appDebuggable",
        "isSecure",
    ] {
        assert!(value.get(key).is_some(), "missing key {}", key);
    }
    assert_eq!(value["isSecure"], serde_json::Value::Bool(true));
}

#[test]
fn detailed_json_carries_signals_and_failures() {
    let mut report = IntegrityReport::default();
    report.jailbreak.push(JailbreakSignal::SelinuxPermissive);
    report.debugger.record_failure("tracer_pid", "permission denied");

    let value = report.to_detailed_json();
    assert_eq!(value["verdict"]["rooted"], serde_json::Value::Bool(true));
    assert_eq!(value["verdict"]["isSecure"], serde_json::Value::Bool(false));
    assert_eq!(value["violations"][0], "jailbreak:selinux_permissive");
    assert_eq!(
        value["observations"]["jailbreak"]["signals"][0]["code"],
        "selinux_permissive"
    );
    assert_eq!(
        value["observations"]["debugger"]["failures"][0]["probe"],
        "tracer_pid"
    );
}

#[test]
fn probe_failures_do_not_make_device_insecure() {
    // Empty root: procfs and property files are all missing.
    let root = FixtureRoot::new("engine-empty");
    let report = fixture_engine(&root).evaluate();

    assert!(report.is_secure());
    assert!(!report.failures().is_empty());
}

#[test]
fn evaluation_is_repeatable() {
    let root = clean_device("engine-repeat");
    root.write("/system/xbin/su", "");
    let engine = fixture_engine(&root);

    let first = engine.evaluate();
    let second = engine.evaluate();
    assert_eq!(first.verdict(), second.verdict());
    assert_eq!(first.violation_codes(), second.violation_codes());
}

#[test]
fn enforcement_with_every_step_disabled_is_all_skipped() {
    let root = FixtureRoot::new("engine-enforce");
    let report = fixture_engine(&root).enforce();

    assert!(!report.has_failures());
    assert!(report.applied_step_names().is_empty());
    assert!(!report.debugger_attached_after);
}
