#![no_main]

use cfdi_portal::cfdi::{CreditNoteMatcher, DEFAULT_TOLERANCE, InvoiceFacts, ProntoPagoTerms};
use libfuzzer_sys::fuzz_target;
use rust_decimal::Decimal;

fuzz_target!(|data: &[u8]| {
    if let Ok(s) = std::str::from_utf8(data) {
        let matcher = CreditNoteMatcher::new(ProntoPagoTerms::new(Decimal::new(2, 2)), DEFAULT_TOLERANCE);
        let facts = InvoiceFacts {
            uuid: "6F9A2C1E-1B2D-4E3F-8A9B-0C1D2E3F4A5B",
            issuer_rfc: "FLO010101AB1",
            total: Decimal::new(1_160_000, 2),
        };
        let v = matcher.check(s, &facts);
        assert_eq!(v.is_valid(), v.errors.is_empty());
    }
});
