#![no_main]

use device_integrity::{
    maps_pathname, parse_mounts, parse_tracer_pid, scan_maps_for_keywords, MAPS_KEYWORDS,
};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let text = String::from_utf8_lossy(data);
    let keywords: Vec<String> = MAPS_KEYWORDS.iter().map(|k| k.to_string()).collect();

    let _ = parse_tracer_pid(&text);
    for line in text.lines() {
        let _ = maps_pathname(line);
    }
    let hits = scan_maps_for_keywords(&text, &keywords);
    for (index, (_, path)) in hits.iter().enumerate() {
        assert!(hits[..index].iter().all(|(_, seen)| seen != path));
    }
    for entry in parse_mounts(&text) {
        let _ = entry.has_option("rw");
    }
});
