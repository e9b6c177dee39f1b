//! Fuzz target: configuration document merge
//!
//! Splits the input in two, parses each half as JSON, and merges the
//! second over the first:
//! - No panics under arbitrary inputs
//! - Every key of an object fragment is present in the merged object
//! - The typed device-config view never panics on the merged document
//!
//! cargo fuzz run fuzz_config_merge

#![no_main]

use libfuzzer_sys::fuzz_target;
use lightbridge::config::{merge_document, DeviceConfig};
use serde_json::Value;

fuzz_target!(|data: &[u8]| {
    if data.is_empty() {
        return;
    }

    let split = data[0] as usize % data.len();
    let (left, right) = data.split_at(split);

    let Ok(mut base) = serde_json::from_slice::<Value>(left) else {
        return;
    };
    let Ok(fragment) = serde_json::from_slice::<Value>(right) else {
        return;
    };

    let fragment_keys: Vec<String> = match (&base, &fragment) {
        (Value::Object(_), Value::Object(map)) => map.keys().cloned().collect(),
        _ => Vec::new(),
    };

    merge_document(&mut base, fragment);

    if let Value::Object(merged) = &base {
        for key in &fragment_keys {
            assert!(merged.contains_key(key), "merge dropped key {key:?}");
        }
    }

    // Accept or reject, never panic.
    let _ = DeviceConfig::from_document(&base);
});
