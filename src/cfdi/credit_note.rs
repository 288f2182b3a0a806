use chrono::NaiveDateTime;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

use crate::core::{PortalConfig, ValidationError};

use super::document::CfdiDocument;
use super::patterns;
use super::reader::{CfdiReader, PatternReader};

/// Default relative band around the expected fee (±5%).
pub const DEFAULT_TOLERANCE: Decimal = dec!(0.05);

/// SAT relationship code for "nota de crédito de los documentos relacionados".
pub const TIPO_RELACION_CREDIT_NOTE: &str = "01";

/// Fields of an egress CFDI uploaded as proof of the pronto-pago discount.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreditNoteRecord {
    pub tipo_comprobante: Option<String>,
    pub uuid: String,
    pub serie: Option<String>,
    pub folio: Option<String>,
    pub issuer_rfc: String,
    pub issuer_name: Option<String>,
    pub tipo_relacion: Option<String>,
    pub related_uuid: Option<String>,
    pub subtotal: Option<Decimal>,
    pub transferred_taxes: Option<Decimal>,
    pub total: Option<Decimal>,
    pub currency: Option<String>,
    pub issue_date: Option<NaiveDateTime>,
}

impl From<CfdiDocument> for CreditNoteRecord {
    fn from(doc: CfdiDocument) -> Self {
        let related_uuid = doc.related_uuid().map(str::to_string);
        let tipo_relacion = doc.relation.and_then(|r| r.tipo_relacion);
        Self {
            tipo_comprobante: doc.tipo_comprobante,
            uuid: doc.uuid,
            serie: doc.serie,
            folio: doc.folio,
            issuer_rfc: doc.issuer.rfc,
            issuer_name: doc.issuer.name,
            tipo_relacion,
            related_uuid,
            subtotal: doc.subtotal,
            transferred_taxes: doc.transferred_taxes,
            total: doc.total,
            currency: doc.currency,
            issue_date: doc.issue_date,
        }
    }
}

/// Outcome of credit-note validation. Valid exactly when `errors` is empty.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreditNoteValidation {
    /// Failures in check order.
    pub errors: Vec<ValidationError>,
}

impl CreditNoteValidation {
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    /// Human-readable messages, in check order.
    pub fn messages(&self) -> Vec<String> {
        self.errors.iter().map(|e| e.message.clone()).collect()
    }

    fn single(error: ValidationError) -> Self {
        Self {
            errors: vec![error],
        }
    }
}

/// Parse a credit note. `None` when the fiscal UUID or issuer RFC is missing.
pub fn parse_credit_note(xml: &str) -> Option<CreditNoteRecord> {
    PatternReader.read(xml).map(CreditNoteRecord::from)
}

/// Cheap pre-check of the document type attribute only.
pub fn looks_like_credit_note(xml: &str) -> bool {
    patterns::is_egress_type(xml)
}

/// Validate a credit note against the primary invoice.
///
/// All five checks run; every failure is reported, in this order:
/// document type `E`, related UUID, issuer RFC, amount within
/// `expected_fee * (1 ± tolerance)` (bounds inclusive), relationship `01`.
/// UUID and RFC comparisons ignore case.
pub fn validate_credit_note(
    note: &CreditNoteRecord,
    invoice_uuid: &str,
    invoice_issuer_rfc: &str,
    expected_fee: Decimal,
    tolerance: Option<Decimal>,
) -> CreditNoteValidation {
    let tolerance = tolerance.unwrap_or(DEFAULT_TOLERANCE);
    let mut errors = Vec::new();

    // CN-01: egress document
    let tipo = note.tipo_comprobante.as_deref().map(str::trim);
    if !tipo.is_some_and(|t| t.eq_ignore_ascii_case("E")) {
        errors.push(ValidationError::with_rule(
            "credit_note.tipo_comprobante",
            format!(
                "the credit note must be an egress CFDI (TipoDeComprobante \"E\"), found \"{}\"",
                tipo.unwrap_or_default()
            ),
            "CN-01",
        ));
    }

    // CN-02: linked to this invoice
    match note.related_uuid.as_deref().map(str::trim) {
        None => errors.push(ValidationError::with_rule(
            "credit_note.related_uuid",
            format!(
                "the credit note does not reference any related CFDI; it must reference invoice {}",
                invoice_uuid.trim()
            ),
            "CN-02",
        )),
        Some(related) if !related.eq_ignore_ascii_case(invoice_uuid.trim()) => {
            errors.push(ValidationError::with_rule(
                "credit_note.related_uuid",
                format!(
                    "the credit note references UUID {related} but the invoice UUID is {}",
                    invoice_uuid.trim()
                ),
                "CN-02",
            ))
        }
        Some(_) => {}
    }

    // CN-03: same biller
    if !note
        .issuer_rfc
        .trim()
        .eq_ignore_ascii_case(invoice_issuer_rfc.trim())
    {
        errors.push(ValidationError::with_rule(
            "credit_note.issuer_rfc",
            format!(
                "the credit note issuer RFC {} does not match the invoice issuer RFC {}",
                note.issuer_rfc.trim(),
                invoice_issuer_rfc.trim()
            ),
            "CN-03",
        ));
    }

    // CN-04: amount within the tolerance band
    let lower = expected_fee * (Decimal::ONE - tolerance);
    let upper = expected_fee * (Decimal::ONE + tolerance);
    match note.total {
        None => errors.push(ValidationError::with_rule(
            "credit_note.total",
            "the credit note total could not be read",
            "CN-04",
        )),
        Some(total) if total < lower || total > upper => {
            errors.push(ValidationError::with_rule(
                "credit_note.total",
                format!(
                    "the credit note total {total} is outside the expected fee {expected_fee} ±{}% ({} to {})",
                    (tolerance * dec!(100)).normalize(),
                    lower.round_dp(2),
                    upper.round_dp(2)
                ),
                "CN-04",
            ))
        }
        Some(_) => {}
    }

    // CN-05: relationship "01"
    let relacion = note.tipo_relacion.as_deref().map(str::trim);
    if relacion != Some(TIPO_RELACION_CREDIT_NOTE) {
        errors.push(ValidationError::with_rule(
            "credit_note.tipo_relacion",
            format!(
                "the relationship type must be \"{TIPO_RELACION_CREDIT_NOTE}\" (credit note for related documents), found \"{}\"",
                relacion.unwrap_or_default()
            ),
            "CN-05",
        ));
    }

    CreditNoteValidation { errors }
}

/// Early-payment program terms.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProntoPagoTerms {
    /// Fraction of the invoice total charged for early payment.
    pub fee_rate: Decimal,
}

impl ProntoPagoTerms {
    pub fn new(fee_rate: Decimal) -> Self {
        Self { fee_rate }
    }

    /// Fee the credit note must document, rounded to cents.
    pub fn expected_fee(&self, invoice_total: Decimal) -> Decimal {
        (invoice_total * self.fee_rate).round_dp(2)
    }
}

/// Facts about the primary invoice that a credit note must match.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvoiceFacts<'a> {
    pub uuid: &'a str,
    pub issuer_rfc: &'a str,
    pub total: Decimal,
}

/// Full credit-note check: type pre-check, parse, then validation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CreditNoteMatcher {
    pub terms: ProntoPagoTerms,
    pub tolerance: Decimal,
}

impl CreditNoteMatcher {
    pub fn new(terms: ProntoPagoTerms, tolerance: Decimal) -> Self {
        Self { terms, tolerance }
    }

    pub fn from_config(config: &PortalConfig) -> Self {
        Self::new(
            ProntoPagoTerms::new(config.pronto_pago.fee_rate),
            config.credit_note.tolerance,
        )
    }

    /// Check raw credit-note XML against the invoice.
    ///
    /// Documents that are not egress CFDIs, or that lack a UUID or issuer
    /// RFC, fail with a single explanatory error.
    pub fn check(&self, xml: &str, invoice: &InvoiceFacts<'_>) -> CreditNoteValidation {
        if !looks_like_credit_note(xml) {
            return CreditNoteValidation::single(ValidationError::with_rule(
                "credit_note.tipo_comprobante",
                "the uploaded file is not a credit note (TipoDeComprobante \"E\")",
                "CN-01",
            ));
        }
        let Some(note) = parse_credit_note(xml) else {
            return CreditNoteValidation::single(ValidationError::with_rule(
                "credit_note",
                "the credit note has no fiscal UUID or issuer RFC",
                "CN-00",
            ));
        };
        let fee = self.terms.expected_fee(invoice.total);
        let validation = validate_credit_note(
            &note,
            invoice.uuid,
            invoice.issuer_rfc,
            fee,
            Some(self.tolerance),
        );
        tracing::debug!(
            credit_note = %note.uuid,
            invoice = %invoice.uuid,
            expected_fee = %fee,
            errors = validation.errors.len(),
            "credit note checked"
        );
        validation
    }
}
