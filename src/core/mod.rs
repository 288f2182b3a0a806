//! Payment-cycle calendar, late-invoice classification, configuration and errors.
//!
//! All date logic runs in one fixed civil timezone ([`WeekClock`]); the
//! current time is always passed in, never read inside a validator.

mod config;
mod deadline;
mod error;
mod lateness;
mod week;

pub use config::*;
pub use deadline::*;
pub use error::*;
pub use lateness::*;
pub use week::{MEXICO_CITY_OFFSET_MINUTES, PaymentWeek, WeekClock, monday_of, week_of};
