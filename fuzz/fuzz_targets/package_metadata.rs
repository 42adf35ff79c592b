#![no_main]

use device_integrity::{
    parse_build_prop, parse_get_task_allow, parse_packages_list, usb_functions_include_adb,
};
use libfuzzer_sys::fuzz_target;

fn bounded_text(data: &[u8], offset: usize, len: usize) -> String {
    let start = offset.min(data.len());
    let end = (start + len).min(data.len());
    String::from_utf8_lossy(&data[start..end]).to_string()
}

fuzz_target!(|data: &[u8]| {
    let split = data.first().copied().unwrap_or_default() as usize;
    let head = bounded_text(data, 1, split);
    let tail = bounded_text(data, 1 + split, data.len());

    for (key, value) in parse_build_prop(&head) {
        assert!(!key.is_empty());
        let _ = usb_functions_include_adb(&value);
    }
    let _ = parse_packages_list(&tail);
    let _ = parse_get_task_allow(&tail);
});
