use thiserror::Error;

/// Errors raised by collaborators or by callers breaking an input contract.
///
/// Expected bad input (late invoices, mismatched credit notes, unreadable
/// XML fields) is never reported through this type; it surfaces as a list of
/// [`ValidationError`]s instead.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum PortalError {
    /// Configuration file missing, unreadable or malformed.
    #[error("configuration error: {0}")]
    Config(String),

    /// A `(week, year)` pair outside the supported range.
    #[error("invalid payment week {week}/{year}: {reason}")]
    InvalidWeek {
        week: u32,
        year: i32,
        reason: String,
    },

    /// The field extraction service failed.
    #[error("extraction error: {0}")]
    Extraction(String),

    /// Duplicate-UUID or project lookup failed.
    #[error("lookup error: {0}")]
    Lookup(String),

    /// The backend rejected or failed to persist a submission.
    #[error("submission error: {0}")]
    Submission(String),

    /// Transport-level failure talking to the backend.
    #[error("network error: {0}")]
    Network(String),

    /// An uploaded file could not be decoded to text.
    #[error("could not process file: {0}")]
    Decode(String),
}

/// Something the issuer has to fix (or acknowledge) before a submission
/// goes through.
///
/// Lateness reasons, credit-note mismatches and blocked submit attempts are
/// all reported this way, so a form can show them next to the field they
/// refer to. `rule` is the stable code the backend and the UI key on:
/// `after_deadline`, `CN-02`, `duplicate_uuid`, `unconfirmed` and so on.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct ValidationError {
    /// Form field the failure points at, e.g. `invoice_date` or
    /// `credit_note.related_uuid`.
    pub field: String,
    /// Message shown to the issuer.
    pub message: String,
    pub rule: Option<String>,
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.rule {
            Some(rule) => write!(f, "[{rule}] {}: {}", self.field, self.message),
            None => write!(f, "{}: {}", self.field, self.message),
        }
    }
}

impl ValidationError {
    pub fn with_rule(
        field: impl Into<String>,
        message: impl Into<String>,
        rule: impl Into<String>,
    ) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
            rule: Some(rule.into()),
        }
    }

    /// Whether this failure was raised by `rule`.
    pub fn is(&self, rule: &str) -> bool {
        self.rule.as_deref() == Some(rule)
    }
}
