use chrono::{DateTime, FixedOffset, NaiveDate, NaiveTime, TimeDelta};
use serde::{Deserialize, Serialize};

use super::error::PortalError;
use super::week::{PaymentWeek, WeekClock, monday_of, shift};

/// Temporal rules of the invoicing cycle.
///
/// Defaults: uploads close Thursday 10:00 of the week after the payment
/// week (Monday + 10 days), and invoices must be dated Tuesday through
/// Thursday of the payment week (Monday + 1 to Monday + 3).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CyclePolicy {
    /// Days after the payment week's Monday on which uploads close.
    pub deadline_offset_days: u32,
    /// Local hour (0..=23) at which uploads close.
    pub deadline_hour: u32,
    /// First valid invoice day, as days after Monday.
    pub window_start_offset: u32,
    /// Last valid invoice day (inclusive), as days after Monday.
    pub window_end_offset: u32,
}

impl Default for CyclePolicy {
    fn default() -> Self {
        Self {
            deadline_offset_days: 10,
            deadline_hour: 10,
            window_start_offset: 1,
            window_end_offset: 3,
        }
    }
}

impl CyclePolicy {
    /// Check internal consistency (used when loading configuration).
    pub fn validate(&self) -> Result<(), PortalError> {
        if self.deadline_hour > 23 {
            return Err(PortalError::Config(format!(
                "deadline_hour {} must be between 0 and 23",
                self.deadline_hour
            )));
        }
        if self.window_start_offset > self.window_end_offset {
            return Err(PortalError::Config(format!(
                "window_start_offset {} is after window_end_offset {}",
                self.window_start_offset, self.window_end_offset
            )));
        }
        if self.window_end_offset > 6 {
            return Err(PortalError::Config(format!(
                "window_end_offset {} falls outside the payment week",
                self.window_end_offset
            )));
        }
        Ok(())
    }

    fn deadline_time(&self) -> NaiveTime {
        NaiveTime::from_hms_opt(self.deadline_hour.min(23), 0, 0).unwrap_or_default()
    }
}

/// Inclusive range of local timestamps in which an invoice date is accepted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateWindow {
    /// Start of the first valid day (00:00:00.000 local).
    pub start: DateTime<FixedOffset>,
    /// End of the last valid day (23:59:59.999 local).
    pub end: DateTime<FixedOffset>,
}

impl DateWindow {
    /// Whether a civil date lies inside the window.
    pub fn contains_date(&self, date: NaiveDate) -> bool {
        self.start.date_naive() <= date && date <= self.end.date_naive()
    }

    /// Whether an instant lies inside the window (bounds inclusive).
    pub fn contains(&self, instant: DateTime<FixedOffset>) -> bool {
        self.start <= instant && instant <= self.end
    }
}

/// Computes upload deadlines and valid invoice-date windows for payment weeks.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DeadlineCalculator {
    clock: WeekClock,
    policy: CyclePolicy,
}

impl DeadlineCalculator {
    pub fn new(clock: WeekClock, policy: CyclePolicy) -> Self {
        Self { clock, policy }
    }

    pub fn clock(&self) -> &WeekClock {
        &self.clock
    }

    pub fn policy(&self) -> &CyclePolicy {
        &self.policy
    }

    /// Last instant at which invoices for `week` may be uploaded.
    pub fn upload_deadline(&self, week: PaymentWeek) -> DateTime<FixedOffset> {
        let day = shift(monday_of(week), i64::from(self.policy.deadline_offset_days));
        self.clock.localize(day.and_time(self.policy.deadline_time()))
    }

    /// Tuesday 00:00 through Thursday end-of-day of `week` (with default policy).
    pub fn valid_invoice_date_window(&self, week: PaymentWeek) -> DateWindow {
        let monday = monday_of(week);
        let first = shift(monday, i64::from(self.policy.window_start_offset));
        let after_last = shift(monday, i64::from(self.policy.window_end_offset) + 1);
        DateWindow {
            start: self.clock.localize(first.and_time(NaiveTime::default())),
            end: self.clock.localize(after_last.and_time(NaiveTime::default()))
                - TimeDelta::milliseconds(1),
        }
    }
}
