use device_integrity::{
    deny_debugger_if_possible, is_app_debuggable, is_debugger_attached, is_device_jailbroken,
    is_frida_detected,
};

#[test]
fn queries_answer_consistently_across_calls() {
    assert_eq!(is_device_jailbroken(), is_device_jailbroken());
    assert_eq!(is_frida_detected(), is_frida_detected());
    assert_eq!(is_app_debuggable(), is_app_debuggable());
}

#[test]
fn test_process_is_not_being_debugged() {
    assert!(!is_debugger_attached());
}

#[test]
fn deny_debugger_is_safe_to_call_repeatedly() {
    deny_debugger_if_possible();
    deny_debugger_if_possible();
    assert!(!is_debugger_attached());
}
