#![no_main]

//! Feeds untrusted JSON through every catalog schema and through
//! descriptor parsing. Validation must never panic.

use kruize_e2e_core::schema::{catalog, error_message, Schema};
use libfuzzer_sys::fuzz_target;
use serde_json::Value;

fuzz_target!(|data: &[u8]| {
    let Ok(value) = serde_json::from_slice::<Value>(data) else {
        return;
    };

    for name in catalog::NAMES {
        if let Ok(schema) = catalog::by_name(name) {
            let _ = error_message(&schema.validate(&value));
        }
    }

    // The same document read as a schema descriptor, then applied to itself.
    if let Ok(schema) = Schema::from_json(&value) {
        let _ = schema.validate(&value);
    }
});
