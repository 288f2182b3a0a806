//! # cfdi-portal
//!
//! Core of a supplier portal that accepts Mexican CFDI invoices: the
//! payment-week calendar, late-invoice classification, pronto-pago
//! credit-note matching and the checks that gate a submission.
//!
//! All monetary values use [`rust_decimal::Decimal`], never floating point.
//! Every date rule runs in Mexico City civil time (UTC-6) unless configured
//! otherwise.
//!
//! ## Quick Start
//!
//! ```rust
//! use chrono::{NaiveDate, TimeZone};
//! use cfdi_portal::core::*;
//!
//! let classifier = LatenessClassifier::default();
//! let clock = classifier.deadlines().clock();
//! let invoice_date = NaiveDate::from_ymd_opt(2024, 7, 24).unwrap(); // Wednesday, W30
//! let now = clock.offset().with_ymd_and_hms(2024, 7, 31, 9, 0, 0).unwrap();
//!
//! let verdict = classifier.classify(invoice_date, Some(30), now);
//! assert!(!verdict.is_late());
//! assert_eq!(verdict.week.to_string(), "2024-W30");
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Description |
//! |---------|-------------|
//! | `core` (default) | Payment weeks, deadlines, lateness, config, errors |
//! | `cfdi` (default) | CFDI field reading, week claims, credit-note matching |
//! | `gate` (default) | Submission session, guards, collaborator traits |
//! | `xml` | `quick-xml` based CFDI reader |
//! | `remote` | HTTP backend for the collaborator traits |
//! | `all` | Everything |

#[cfg(feature = "core")]
pub mod core;

#[cfg(feature = "cfdi")]
pub mod cfdi;

#[cfg(feature = "gate")]
pub mod gate;

#[cfg(feature = "remote")]
pub mod remote;

// Re-export core types at crate root for convenience
#[cfg(feature = "core")]
pub use crate::core::*;
