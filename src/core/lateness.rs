use chrono::{DateTime, FixedOffset, NaiveDate};
use serde::{Deserialize, Serialize};

use super::deadline::{DateWindow, DeadlineCalculator};
use super::error::ValidationError;
use super::week::{PaymentWeek, week_of};

/// Why an invoice cannot be processed in the current payment cycle.
///
/// Variant order is severity order: callers that show a single explanation
/// show the first reason of a verdict.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LateReason {
    /// The upload deadline for the invoice's week has passed.
    AfterDeadline,
    /// The invoice is not dated Tuesday through Thursday.
    WrongInvoiceDate,
    /// The week written in the invoice description differs from the date's week.
    WrongWeekInDescription,
}

impl LateReason {
    /// Stable tag used in payloads and logs.
    pub fn code(&self) -> &'static str {
        match self {
            Self::AfterDeadline => "after_deadline",
            Self::WrongInvoiceDate => "wrong_invoice_date",
            Self::WrongWeekInDescription => "wrong_week_in_description",
        }
    }

    /// Parse from the stable tag.
    pub fn from_code(code: &str) -> Option<Self> {
        match code {
            "after_deadline" => Some(Self::AfterDeadline),
            "wrong_invoice_date" => Some(Self::WrongInvoiceDate),
            "wrong_week_in_description" => Some(Self::WrongWeekInDescription),
            _ => None,
        }
    }
}

impl std::fmt::Display for LateReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.code())
    }
}

/// Outcome of [`LatenessClassifier::classify`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LatenessVerdict {
    /// Week derived from the invoice date.
    pub week: PaymentWeek,
    /// Week claimed in the invoice description, if any.
    pub week_claim: Option<u32>,
    /// Reasons in detection order (most severe first).
    pub reasons: Vec<LateReason>,
    /// Upload deadline for `week`.
    pub deadline: DateTime<FixedOffset>,
    /// Valid invoice-date window for `week`.
    pub valid_window: DateWindow,
}

impl LatenessVerdict {
    pub fn is_late(&self) -> bool {
        !self.reasons.is_empty()
    }

    /// The reason that drives the acknowledgment prompt.
    pub fn primary_reason(&self) -> Option<LateReason> {
        self.reasons.first().copied()
    }

    pub fn has(&self, reason: LateReason) -> bool {
        self.reasons.contains(&reason)
    }

    /// One explanation per reason, in the verdict's order.
    pub fn explain(&self) -> Vec<ValidationError> {
        self.reasons
            .iter()
            .map(|reason| {
                let message = match reason {
                    LateReason::AfterDeadline => format!(
                        "the upload deadline for week {} was {}; the invoice will be paid in the next cycle",
                        self.week,
                        self.deadline.format("%Y-%m-%d %H:%M")
                    ),
                    LateReason::WrongInvoiceDate => format!(
                        "invoices for week {} must be dated between {} and {}",
                        self.week,
                        self.valid_window.start.format("%Y-%m-%d"),
                        self.valid_window.end.format("%Y-%m-%d")
                    ),
                    LateReason::WrongWeekInDescription => format!(
                        "the description claims week {} but the invoice date falls in week {}",
                        self.week_claim.unwrap_or_default(),
                        self.week.week()
                    ),
                };
                let field = match reason {
                    LateReason::WrongWeekInDescription => "week_claim",
                    _ => "invoice_date",
                };
                ValidationError::with_rule(field, message, reason.code())
            })
            .collect()
    }
}

/// Decides whether an invoice still belongs to the current payment cycle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LatenessClassifier {
    deadlines: DeadlineCalculator,
}

impl LatenessClassifier {
    pub fn new(deadlines: DeadlineCalculator) -> Self {
        Self { deadlines }
    }

    pub fn deadlines(&self) -> &DeadlineCalculator {
        &self.deadlines
    }

    /// Classify an invoice against `now`.
    ///
    /// Every check runs; reasons are reported in the fixed order
    /// `after_deadline`, `wrong_invoice_date`, `wrong_week_in_description`.
    pub fn classify(
        &self,
        invoice_date: NaiveDate,
        week_claim: Option<u32>,
        now: DateTime<FixedOffset>,
    ) -> LatenessVerdict {
        let week = week_of(invoice_date);
        let deadline = self.deadlines.upload_deadline(week);
        let valid_window = self.deadlines.valid_invoice_date_window(week);

        let mut reasons = Vec::new();
        if now > deadline {
            reasons.push(LateReason::AfterDeadline);
        }
        if !valid_window.contains_date(invoice_date) {
            reasons.push(LateReason::WrongInvoiceDate);
        }
        if week_claim.is_some_and(|claim| claim != week.week()) {
            reasons.push(LateReason::WrongWeekInDescription);
        }

        LatenessVerdict {
            week,
            week_claim,
            reasons,
            deadline,
            valid_window,
        }
    }
}
