use chrono::{DateTime, FixedOffset};

use crate::cfdi::{CreditNoteMatcher, CreditNoteValidation, InvoiceFacts};
use crate::core::{
    LateReason, LatenessClassifier, LatenessVerdict, PortalConfig, PortalError, ValidationError,
};

use super::draft::{ExtractedFields, InvoiceDraft, PaymentProgram, Project};

/// Result of the guards run once extraction has produced fields.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExtractionDecision {
    /// Duplicate or project check failed; editing stays blocked.
    Rejected(ValidationError),
    /// The invoice is late; the issuer must acknowledge or cancel.
    Late(LatenessVerdict),
    /// Editing may start. The verdict is absent when the date is not known yet.
    Proceed(Option<LatenessVerdict>),
}

/// Result of the guards run on a submit attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmitDecision {
    /// The current verdict carries a reason the issuer has not acknowledged;
    /// re-open the prompt.
    NeedsAcknowledgment(LatenessVerdict),
    /// One or more guards failed; nothing is sent.
    Blocked(Vec<ValidationError>),
    /// Every guard passed.
    Allowed(LatenessVerdict),
}

/// Validation policy applied to a session: lateness classification plus
/// pronto-pago credit-note matching.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SubmissionGate {
    classifier: LatenessClassifier,
    matcher: CreditNoteMatcher,
}

impl Default for SubmissionGate {
    fn default() -> Self {
        Self::new(
            LatenessClassifier::default(),
            CreditNoteMatcher::from_config(&PortalConfig::default()),
        )
    }
}

impl SubmissionGate {
    pub fn new(classifier: LatenessClassifier, matcher: CreditNoteMatcher) -> Self {
        Self {
            classifier,
            matcher,
        }
    }

    pub fn from_config(config: &PortalConfig) -> Result<Self, PortalError> {
        Ok(Self::new(
            config.lateness_classifier()?,
            CreditNoteMatcher::from_config(config),
        ))
    }

    pub fn classifier(&self) -> &LatenessClassifier {
        &self.classifier
    }

    pub fn matcher(&self) -> &CreditNoteMatcher {
        &self.matcher
    }

    /// Duplicate check, project check, then lateness, in that order.
    /// The first rejection stops the sequence.
    pub fn on_extraction(
        &self,
        fields: &ExtractedFields,
        duplicate: bool,
        projects: &[Project],
        now: DateTime<FixedOffset>,
    ) -> ExtractionDecision {
        if let Err(e) = duplicate_guard(fields.uuid.as_deref(), duplicate) {
            return ExtractionDecision::Rejected(e);
        }
        if let Err(e) = project_guard(fields.project.as_deref(), projects) {
            return ExtractionDecision::Rejected(e);
        }
        match self.classify(fields, now) {
            Some(verdict) if verdict.is_late() => ExtractionDecision::Late(verdict),
            verdict => ExtractionDecision::Proceed(verdict),
        }
    }

    /// Lateness acknowledgment, required fields, review confirmation and
    /// pronto-pago checks, evaluated against the current draft rather than
    /// extraction-time state.
    ///
    /// `acknowledged` holds the reasons the issuer accepted at the last
    /// prompt. Any reason of the current verdict outside that set re-opens it.
    pub fn on_submit(
        &self,
        draft: &InvoiceDraft,
        acknowledged: &[LateReason],
        credit_note: Option<&CreditNoteValidation>,
        now: DateTime<FixedOffset>,
    ) -> SubmitDecision {
        let verdict = self.classify(&draft.fields, now);
        if let Some(v) = verdict.as_ref().filter(|v| !covers(acknowledged, v)) {
            return SubmitDecision::NeedsAcknowledgment(v.clone());
        }
        let mut errors = completeness_guard(&draft.fields);
        if let Err(e) = confirmation_guard(draft.confirmed) {
            errors.push(e);
        }
        errors.extend(pronto_pago_guard(draft, credit_note));
        match verdict {
            Some(verdict) if errors.is_empty() => SubmitDecision::Allowed(verdict),
            _ => SubmitDecision::Blocked(errors),
        }
    }

    /// Lateness of the draft as it stands; `None` while the date is unknown.
    pub fn classify(
        &self,
        fields: &ExtractedFields,
        now: DateTime<FixedOffset>,
    ) -> Option<LatenessVerdict> {
        let date = fields.invoice_date?;
        Some(self.classifier.classify(date, fields.week_claim, now))
    }

    /// Validate credit-note XML against the draft's invoice facts.
    pub fn check_credit_note(&self, xml: &str, fields: &ExtractedFields) -> CreditNoteValidation {
        let (Some(uuid), Some(issuer_rfc), Some(total)) =
            (fields.uuid.as_deref(), fields.issuer_rfc.as_deref(), fields.total)
        else {
            return CreditNoteValidation {
                errors: vec![ValidationError::with_rule(
                    "invoice",
                    "the invoice UUID, issuer RFC and total must be known before the credit note can be checked",
                    "CN-00",
                )],
            };
        };
        self.matcher.check(
            xml,
            &InvoiceFacts {
                uuid,
                issuer_rfc,
                total,
            },
        )
    }
}

fn covers(acknowledged: &[LateReason], verdict: &LatenessVerdict) -> bool {
    verdict.reasons.iter().all(|r| acknowledged.contains(r))
}

/// The fiscal UUID must not be registered already.
pub fn duplicate_guard(uuid: Option<&str>, exists: bool) -> Result<(), ValidationError> {
    match uuid {
        Some(uuid) if exists => Err(ValidationError::with_rule(
            "uuid",
            format!("an invoice with UUID {uuid} has already been submitted"),
            "duplicate_uuid",
        )),
        _ => Ok(()),
    }
}

/// A project label, when present, must name an active project.
pub fn project_guard(label: Option<&str>, projects: &[Project]) -> Result<(), ValidationError> {
    match label {
        Some(label) if !projects.iter().any(|p| p.matches(label)) => {
            Err(ValidationError::with_rule(
                "project",
                format!("project \"{}\" is not an active project", label.trim()),
                "unknown_project",
            ))
        }
        _ => Ok(()),
    }
}

/// Fields without which nothing can be submitted.
pub fn completeness_guard(fields: &ExtractedFields) -> Vec<ValidationError> {
    let mut errors = Vec::new();
    let blank = |v: &Option<String>| v.as_deref().is_none_or(|s| s.trim().is_empty());
    if blank(&fields.uuid) {
        errors.push(ValidationError::with_rule("uuid", "the invoice UUID is required", "required"));
    }
    if blank(&fields.issuer_rfc) {
        errors.push(ValidationError::with_rule(
            "issuer_rfc",
            "the issuer RFC is required",
            "required",
        ));
    }
    if fields.invoice_date.is_none() {
        errors.push(ValidationError::with_rule(
            "invoice_date",
            "the invoice date is required",
            "required",
        ));
    }
    if fields.total.is_none() {
        errors.push(ValidationError::with_rule("total", "the invoice total is required", "required"));
    }
    errors
}

/// The issuer ticked "I reviewed this invoice".
pub fn confirmation_guard(confirmed: bool) -> Result<(), ValidationError> {
    if confirmed {
        Ok(())
    } else {
        Err(ValidationError::with_rule(
            "confirmed",
            "confirm that you reviewed the invoice data before submitting",
            "unconfirmed",
        ))
    }
}

/// Pronto pago needs both credit-note files and a valid match.
pub fn pronto_pago_guard(
    draft: &InvoiceDraft,
    credit_note: Option<&CreditNoteValidation>,
) -> Vec<ValidationError> {
    if draft.program != PaymentProgram::ProntoPago {
        return Vec::new();
    }
    let mut errors = Vec::new();
    if draft.credit_note_xml.is_none() {
        errors.push(ValidationError::with_rule(
            "credit_note_xml",
            "pronto pago requires the credit note XML",
            "pronto_pago",
        ));
    }
    if draft.credit_note_pdf.is_none() {
        errors.push(ValidationError::with_rule(
            "credit_note_pdf",
            "pronto pago requires the credit note PDF",
            "pronto_pago",
        ));
    }
    match credit_note {
        Some(validation) => errors.extend(validation.errors.iter().cloned()),
        None if draft.credit_note_xml.is_some() => errors.push(ValidationError::with_rule(
            "credit_note",
            "the credit note has not been validated yet",
            "pronto_pago",
        )),
        None => {}
    }
    errors
}
