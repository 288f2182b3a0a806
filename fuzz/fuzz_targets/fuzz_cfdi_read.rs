#![no_main]

use cfdi_portal::cfdi::{CfdiReader, EventReader, PatternReader};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    if let Ok(s) = std::str::from_utf8(data) {
        // Unreadable input yields None; a panic is a bug.
        let _ = PatternReader.read(s);
        let _ = EventReader.read(s);
    }
});
