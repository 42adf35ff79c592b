mod common;

use std::net::TcpListener;
use std::time::Duration;

use common::{FixtureRoot, CLEAN_MAPS, CLEAN_STATUS};
use device_integrity::{
    detect_instrumentation, InstrumentationCheckConfig, InstrumentationSignal, TargetProfile,
};

fn fixture_config(root: &FixtureRoot) -> InstrumentationCheckConfig {
    fixture_config_for(root, TargetProfile::Android)
}

fn fixture_config_for(root: &FixtureRoot, profile: TargetProfile) -> InstrumentationCheckConfig {
    InstrumentationCheckConfig {
        root: root.path().to_path_buf(),
        proc_root: root.join("/proc"),
        enable_maps_probe: true,
        enable_thread_probe: true,
        enable_port_probe: false,
        enable_artifact_probe: true,
        enable_image_probe: false,
        ..InstrumentationCheckConfig::for_profile(profile)
    }
}

#[test]
fn clean_process_reports_nothing() {
    let root = FixtureRoot::new("instr-clean");
    root.write_proc_self(CLEAN_STATUS, CLEAN_MAPS, &[(100, "main"), (101, "RenderThread")]);

    let observation = detect_instrumentation(&fixture_config(&root));
    assert!(!observation.detected(), "unexpected: {}", observation.summary());
    assert!(observation.failures.is_empty());
}

#[test]
fn frida_agent_mapping_is_detected() {
    let root = FixtureRoot::new("instr-maps");
    let maps = format!(
        "{}7f10-7f20 r-xp 00000000 fd:01 99 /data/local/tmp/re.frida.server/frida-agent-64.so\n",
        CLEAN_MAPS
    );
    root.write_proc_self(CLEAN_STATUS, &maps, &[(100, "main")]);

    let observation = detect_instrumentation(&fixture_config(&root));
    assert_eq!(
        observation.signals,
        vec![InstrumentationSignal::MappedLibrary {
            keyword: "frida".to_string(),
            path: "/data/local/tmp/re.frida.server/frida-agent-64.so".to_string(),
        }]
    );
}

#[test]
fn gum_js_loop_thread_is_detected() {
    let root = FixtureRoot::new("instr-threads");
    root.write_proc_self(
        CLEAN_STATUS,
        CLEAN_MAPS,
        &[(100, "main"), (117, "gum-js-loop"), (118, "gmain")],
    );

    let observation = detect_instrumentation(&fixture_config(&root));
    assert_eq!(
        observation.signals,
        vec![
            InstrumentationSignal::InstrumentationThread {
                tid: 117,
                name: "gum-js-loop".to_string()
            },
            InstrumentationSignal::InstrumentationThread {
                tid: 118,
                name: "gmain".to_string()
            },
        ]
    );
}

#[test]
fn glib_desktop_threads_are_clean_on_generic_hosts() {
    let root = FixtureRoot::new("instr-glib");
    root.write_proc_self(
        CLEAN_STATUS,
        CLEAN_MAPS,
        &[(400, "my-gtk-app"), (401, "gmain"), (402, "gdbus")],
    );

    let observation = detect_instrumentation(&fixture_config_for(&root, TargetProfile::Generic));
    assert!(!observation.detected(), "unexpected: {}", observation.summary());
}

#[test]
fn gum_js_loop_is_detected_on_generic_hosts() {
    let root = FixtureRoot::new("instr-generic-gum");
    root.write_proc_self(
        CLEAN_STATUS,
        CLEAN_MAPS,
        &[(400, "my-gtk-app"), (401, "gmain"), (402, "gum-js-loop")],
    );

    let observation = detect_instrumentation(&fixture_config_for(&root, TargetProfile::Generic));
    assert_eq!(
        observation.signals,
        vec![InstrumentationSignal::InstrumentationThread {
            tid: 402,
            name: "gum-js-loop".to_string()
        }]
    );
}

#[test]
fn frida_server_and_xposed_artifacts_are_detected() {
    let root = FixtureRoot::new("instr-artifacts");
    root.write_proc_self(CLEAN_STATUS, CLEAN_MAPS, &[]);
    root.write("/data/local/tmp/frida-server", "");
    root.write("/system/framework/XposedBridge.jar", "");

    let observation = detect_instrumentation(&fixture_config(&root));
    assert_eq!(observation.signal_codes(), vec!["artifact_path", "artifact_path"]);
}

#[test]
fn listening_server_port_is_detected() {
    let listener = TcpListener::bind("127.0.0.1:0").expect("bind loopback listener");
    let port = listener.local_addr().expect("listener addr").port();

    let config = InstrumentationCheckConfig {
        ports: vec![port],
        connect_timeout: Duration::from_millis(500),
        enable_maps_probe: false,
        enable_thread_probe: false,
        enable_port_probe: true,
        enable_artifact_probe: false,
        enable_image_probe: false,
        ..InstrumentationCheckConfig::default()
    };
    let observation = detect_instrumentation(&config);
    assert_eq!(
        observation.signals,
        vec![InstrumentationSignal::ListeningPort { port }]
    );
}

#[test]
fn closed_port_is_clean() {
    // Bind then drop so the port is known to be free.
    let port = {
        let listener = TcpListener::bind("127.0.0.1:0").expect("bind loopback listener");
        listener.local_addr().expect("listener addr").port()
    };

    let config = InstrumentationCheckConfig {
        ports: vec![port],
        enable_maps_probe: false,
        enable_thread_probe: false,
        enable_port_probe: true,
        enable_artifact_probe: false,
        enable_image_probe: false,
        ..InstrumentationCheckConfig::default()
    };
    assert!(!detect_instrumentation(&config).detected());
}

#[test]
fn missing_procfs_is_reported_as_failures() {
    let root = FixtureRoot::new("instr-no-proc");
    let observation = detect_instrumentation(&fixture_config(&root));
    assert!(!observation.detected());
    let probes: Vec<_> = observation.failures.iter().map(|f| f.probe).collect();
    assert_eq!(probes, vec!["maps", "threads"]);
}
