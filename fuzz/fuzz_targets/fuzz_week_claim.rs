#![no_main]

use cfdi_portal::cfdi::parse_week_claim;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    if let Ok(s) = std::str::from_utf8(data) {
        if let Some(week) = parse_week_claim(s) {
            assert!((1..=53).contains(&week));
        }
    }
});
