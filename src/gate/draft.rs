use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::cfdi::{CfdiDocument, week_claim_from};
use crate::core::{LateReason, PaymentWeek, PortalError, week_of};

/// Payment program selected by the issuer.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentProgram {
    /// Regular payment in the invoice's cycle.
    #[default]
    Standard,
    /// Early payment in exchange for a fee documented by a credit note.
    ProntoPago,
}

/// Active project a submission can be filed under.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Project {
    pub code: String,
    pub name: String,
}

impl Project {
    pub fn new(code: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            name: name.into(),
        }
    }

    /// Whether a free-text label designates this project (code or name,
    /// trimmed, ignoring case).
    pub fn matches(&self, label: &str) -> bool {
        let label = label.trim();
        !label.is_empty()
            && (label.eq_ignore_ascii_case(self.code.trim())
                || label.to_lowercase() == self.name.trim().to_lowercase())
    }
}

/// A file chosen by the user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadedFile {
    pub name: String,
    pub bytes: Vec<u8>,
}

impl UploadedFile {
    pub fn new(name: impl Into<String>, bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            name: name.into(),
            bytes: bytes.into(),
        }
    }

    /// Contents as UTF-8 text (a BOM is skipped).
    pub fn text(&self) -> Result<&str, PortalError> {
        let bytes = self.bytes.strip_prefix(b"\xEF\xBB\xBF").unwrap_or(&self.bytes);
        std::str::from_utf8(bytes).map_err(|e| PortalError::Decode(format!("{}: {e}", self.name)))
    }
}

/// Invoice fields, either extracted or typed by the user. Every field is
/// optional: absence means "not known yet".
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractedFields {
    pub uuid: Option<String>,
    pub serie: Option<String>,
    pub folio: Option<String>,
    pub issuer_rfc: Option<String>,
    pub issuer_name: Option<String>,
    pub receiver_rfc: Option<String>,
    pub receiver_name: Option<String>,
    pub invoice_date: Option<NaiveDate>,
    pub subtotal: Option<Decimal>,
    pub total: Option<Decimal>,
    pub currency: Option<String>,
    /// Project label as written on the invoice.
    pub project: Option<String>,
    /// Week number written in the description.
    pub week_claim: Option<u32>,
    pub descriptions: Vec<String>,
}

impl From<CfdiDocument> for ExtractedFields {
    fn from(doc: CfdiDocument) -> Self {
        let week_claim = week_claim_from(&doc.concepts);
        let (receiver_rfc, receiver_name) = doc
            .receiver
            .map(|r| (Some(r.rfc), r.name))
            .unwrap_or_default();
        Self {
            uuid: Some(doc.uuid),
            serie: doc.serie,
            folio: doc.folio,
            issuer_rfc: Some(doc.issuer.rfc),
            issuer_name: doc.issuer.name,
            receiver_rfc,
            receiver_name,
            invoice_date: doc.issue_date.map(|d| d.date()),
            subtotal: doc.subtotal,
            total: doc.total,
            currency: doc.currency,
            project: None,
            week_claim,
            descriptions: doc.concepts,
        }
    }
}

impl ExtractedFields {
    /// Fill fields that are still unknown from another source.
    pub fn merge_missing(&mut self, other: ExtractedFields) {
        fn fill<T>(slot: &mut Option<T>, value: Option<T>) {
            if slot.is_none() {
                *slot = value;
            }
        }
        fill(&mut self.uuid, other.uuid);
        fill(&mut self.serie, other.serie);
        fill(&mut self.folio, other.folio);
        fill(&mut self.issuer_rfc, other.issuer_rfc);
        fill(&mut self.issuer_name, other.issuer_name);
        fill(&mut self.receiver_rfc, other.receiver_rfc);
        fill(&mut self.receiver_name, other.receiver_name);
        fill(&mut self.invoice_date, other.invoice_date);
        fill(&mut self.subtotal, other.subtotal);
        fill(&mut self.total, other.total);
        fill(&mut self.currency, other.currency);
        fill(&mut self.project, other.project);
        fill(&mut self.week_claim, other.week_claim);
        if self.descriptions.is_empty() {
            self.descriptions = other.descriptions;
        }
    }

    /// Payment week: the description's claim when it is a valid week of
    /// the date's ISO year, otherwise the date's own week.
    pub fn payment_week(&self) -> Option<PaymentWeek> {
        let derived = week_of(self.invoice_date?);
        Some(
            self.week_claim
                .and_then(|claim| PaymentWeek::new(claim, derived.year()).ok())
                .unwrap_or(derived),
        )
    }
}

/// A single user edit of the draft.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldEdit {
    Uuid(Option<String>),
    IssuerRfc(Option<String>),
    ReceiverRfc(Option<String>),
    InvoiceDate(Option<NaiveDate>),
    Total(Option<Decimal>),
    Project(Option<String>),
    WeekClaim(Option<u32>),
}

impl FieldEdit {
    pub(crate) fn apply(self, fields: &mut ExtractedFields) {
        match self {
            Self::Uuid(v) => fields.uuid = v,
            Self::IssuerRfc(v) => fields.issuer_rfc = v,
            Self::ReceiverRfc(v) => fields.receiver_rfc = v,
            Self::InvoiceDate(v) => fields.invoice_date = v,
            Self::Total(v) => fields.total = v,
            Self::Project(v) => fields.project = v,
            Self::WeekClaim(v) => fields.week_claim = v,
        }
    }

    /// Edits that change the lateness classification.
    pub(crate) fn affects_lateness(&self) -> bool {
        matches!(self, Self::InvoiceDate(_) | Self::WeekClaim(_))
    }

    /// Edits that change what a credit note must match.
    pub(crate) fn affects_credit_note(&self) -> bool {
        matches!(self, Self::Uuid(_) | Self::IssuerRfc(_) | Self::Total(_))
    }
}

/// User-editable aggregate of one submission.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InvoiceDraft {
    pub invoice_xml: Option<UploadedFile>,
    pub invoice_pdf: Option<UploadedFile>,
    pub credit_note_xml: Option<UploadedFile>,
    pub credit_note_pdf: Option<UploadedFile>,
    pub fields: ExtractedFields,
    pub program: PaymentProgram,
    /// "I reviewed this invoice" checkbox.
    pub confirmed: bool,
}

impl InvoiceDraft {
    pub fn has_invoice_files(&self) -> bool {
        self.invoice_xml.is_some() && self.invoice_pdf.is_some()
    }

    pub fn has_credit_note_files(&self) -> bool {
        self.credit_note_xml.is_some() && self.credit_note_pdf.is_some()
    }
}

/// What the persistence backend receives.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmissionPayload {
    pub uuid: String,
    pub serie: Option<String>,
    pub folio: Option<String>,
    pub issuer_rfc: String,
    pub issuer_name: Option<String>,
    pub receiver_rfc: Option<String>,
    pub invoice_date: NaiveDate,
    pub subtotal: Option<Decimal>,
    pub total: Decimal,
    pub currency: Option<String>,
    pub project: Option<String>,
    pub payment_week: PaymentWeek,
    pub week_claim: Option<u32>,
    pub program: PaymentProgram,
    /// Reasons the issuer acknowledged.
    pub late_reasons: Vec<LateReason>,
    /// Late invoices are processed in the following payment cycle.
    pub next_cycle: bool,
    pub credit_note_uuid: Option<String>,
    pub expected_fee: Option<Decimal>,
    pub invoice_xml_name: Option<String>,
    pub invoice_pdf_name: Option<String>,
}

/// Backend answer to a submission.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmissionReceipt {
    pub success: bool,
    pub message: String,
}
