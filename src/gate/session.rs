use chrono::{DateTime, FixedOffset};

use crate::cfdi::{CreditNoteValidation, parse_credit_note};
use crate::core::{LateReason, LatenessVerdict, ValidationError};

use super::draft::{
    ExtractedFields, FieldEdit, InvoiceDraft, PaymentProgram, Project, SubmissionPayload,
    SubmissionReceipt, UploadedFile,
};
use super::guards::{ExtractionDecision, SubmissionGate, SubmitDecision};

/// Where a submission session stands.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Stage {
    /// Waiting for the invoice XML and PDF.
    AwaitingFiles,
    /// Both files present; extraction in flight.
    Extracting,
    /// Extraction failed or a duplicate/project check rejected the invoice.
    Rejected(Vec<ValidationError>),
    /// Late and not yet acknowledged; the prompt is open.
    LatePending(LatenessVerdict),
    /// Fields may be edited and submitted.
    Editable,
    /// All checks passed; the payload is with the backend.
    Submitting,
    /// The backend accepted the invoice.
    Submitted(SubmissionReceipt),
}

/// Input to [`Session::apply`].
#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    /// The invoice file slots changed. Starts a new extraction generation.
    InvoiceFilesSelected {
        xml: Option<UploadedFile>,
        pdf: Option<UploadedFile>,
    },
    /// Extraction and collaborator lookups finished for `generation`.
    ExtractionCompleted {
        generation: u64,
        fields: ExtractedFields,
        duplicate: bool,
        projects: Vec<Project>,
        now: DateTime<FixedOffset>,
    },
    /// Extraction or a lookup failed for `generation`.
    ExtractionFailed { generation: u64, message: String },
    /// The issuer accepted processing in the next cycle.
    LateAcknowledged,
    /// The issuer backed out of a late upload.
    LateCancelled,
    FieldEdited(FieldEdit),
    ProgramSelected(PaymentProgram),
    ConfirmationToggled(bool),
    /// The credit-note file slots changed. Starts a new credit-note generation.
    CreditNoteFilesSelected {
        xml: Option<UploadedFile>,
        pdf: Option<UploadedFile>,
    },
    /// Credit-note validation finished for `generation`.
    CreditNoteChecked {
        generation: u64,
        validation: CreditNoteValidation,
    },
    SubmitRequested { now: DateTime<FixedOffset> },
    /// Backend answer; `Err` carries a user-facing message.
    SubmissionCompleted(Result<SubmissionReceipt, String>),
}

/// One issuer's upload form, driven by [`Event`]s.
///
/// Asynchronous results are tagged with the generation that was current
/// when they started; results for a superseded generation are dropped.
#[derive(Debug, Clone)]
pub struct Session {
    gate: SubmissionGate,
    draft: InvoiceDraft,
    stage: Stage,
    generation: u64,
    credit_generation: u64,
    verdict: Option<LatenessVerdict>,
    acknowledged: Vec<LateReason>,
    credit_note: Option<CreditNoteValidation>,
    blocked: Vec<ValidationError>,
}

impl Session {
    pub fn new(gate: SubmissionGate) -> Self {
        Self {
            gate,
            draft: InvoiceDraft::default(),
            stage: Stage::AwaitingFiles,
            generation: 0,
            credit_generation: 0,
            verdict: None,
            acknowledged: Vec::new(),
            credit_note: None,
            blocked: Vec::new(),
        }
    }

    pub fn gate(&self) -> &SubmissionGate {
        &self.gate
    }

    pub fn draft(&self) -> &InvoiceDraft {
        &self.draft
    }

    pub fn stage(&self) -> &Stage {
        &self.stage
    }

    /// Generation of the current invoice files.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Generation of the current credit-note files.
    pub fn credit_generation(&self) -> u64 {
        self.credit_generation
    }

    /// Last lateness verdict computed for the draft.
    pub fn verdict(&self) -> Option<&LatenessVerdict> {
        self.verdict.as_ref()
    }

    pub fn late_acknowledged(&self) -> bool {
        !self.acknowledged.is_empty()
    }

    /// Reasons the issuer accepted at the last lateness prompt.
    pub fn acknowledged_reasons(&self) -> &[LateReason] {
        &self.acknowledged
    }

    pub fn credit_note(&self) -> Option<&CreditNoteValidation> {
        self.credit_note.as_ref()
    }

    /// Errors from the last blocked submit attempt.
    pub fn blocked(&self) -> &[ValidationError] {
        &self.blocked
    }

    pub fn is_editable(&self) -> bool {
        self.stage == Stage::Editable
    }

    /// Apply one event and return the next state.
    pub fn apply(mut self, event: Event) -> Self {
        match event {
            Event::InvoiceFilesSelected { xml, pdf } => {
                self.draft.invoice_xml = xml;
                self.draft.invoice_pdf = pdf;
                self.reset_invoice_state();
                self.stage = if self.draft.has_invoice_files() {
                    Stage::Extracting
                } else {
                    Stage::AwaitingFiles
                };
            }
            Event::ExtractionCompleted {
                generation,
                fields,
                duplicate,
                projects,
                now,
            } => {
                if !self.is_current(generation, "extraction") || self.stage != Stage::Extracting {
                    return self;
                }
                let decision = self.gate.on_extraction(&fields, duplicate, &projects, now);
                self.draft.fields = fields;
                match decision {
                    ExtractionDecision::Rejected(error) => {
                        self.stage = Stage::Rejected(vec![error]);
                    }
                    ExtractionDecision::Late(verdict) => {
                        self.verdict = Some(verdict.clone());
                        self.stage = Stage::LatePending(verdict);
                    }
                    ExtractionDecision::Proceed(verdict) => {
                        self.verdict = verdict;
                        self.stage = Stage::Editable;
                    }
                }
            }
            Event::ExtractionFailed {
                generation,
                message,
            } => {
                if !self.is_current(generation, "extraction failure")
                    || self.stage != Stage::Extracting
                {
                    return self;
                }
                tracing::warn!(generation, "extraction failed: {message}");
                self.stage = Stage::Rejected(vec![ValidationError::with_rule(
                    "invoice_xml",
                    message,
                    "extraction",
                )]);
            }
            Event::LateAcknowledged => {
                if let Stage::LatePending(verdict) = &self.stage {
                    self.acknowledged = verdict.reasons.clone();
                    self.stage = Stage::Editable;
                }
            }
            Event::LateCancelled => {
                if let Stage::LatePending(_) = self.stage {
                    self.draft.invoice_xml = None;
                    self.draft.invoice_pdf = None;
                    self.reset_invoice_state();
                    self.stage = Stage::AwaitingFiles;
                }
            }
            Event::FieldEdited(edit) => {
                if self.stage != Stage::Editable {
                    tracing::debug!(stage = ?self.stage, "edit ignored outside editable stage");
                    return self;
                }
                if edit.affects_lateness() {
                    self.acknowledged.clear();
                    self.verdict = None;
                }
                if edit.affects_credit_note() {
                    self.credit_generation += 1;
                    self.credit_note = None;
                }
                edit.apply(&mut self.draft.fields);
            }
            Event::ProgramSelected(program) => {
                self.draft.program = program;
            }
            Event::ConfirmationToggled(confirmed) => {
                self.draft.confirmed = confirmed;
            }
            Event::CreditNoteFilesSelected { xml, pdf } => {
                self.draft.credit_note_xml = xml;
                self.draft.credit_note_pdf = pdf;
                self.credit_generation += 1;
                self.credit_note = None;
            }
            Event::CreditNoteChecked {
                generation,
                validation,
            } => {
                if generation != self.credit_generation {
                    tracing::warn!(
                        generation,
                        current = self.credit_generation,
                        "discarding stale credit note result"
                    );
                    return self;
                }
                self.credit_note = Some(validation);
            }
            Event::SubmitRequested { now } => {
                if self.stage != Stage::Editable {
                    tracing::debug!(stage = ?self.stage, "submit ignored outside editable stage");
                    return self;
                }
                self.blocked.clear();
                match self.gate.on_submit(
                    &self.draft,
                    &self.acknowledged,
                    self.credit_note.as_ref(),
                    now,
                ) {
                    SubmitDecision::NeedsAcknowledgment(verdict) => {
                        self.verdict = Some(verdict.clone());
                        self.stage = Stage::LatePending(verdict);
                    }
                    SubmitDecision::Blocked(errors) => {
                        self.blocked = errors;
                    }
                    SubmitDecision::Allowed(verdict) => {
                        self.verdict = Some(verdict);
                        self.stage = Stage::Submitting;
                    }
                }
            }
            Event::SubmissionCompleted(result) => {
                if self.stage != Stage::Submitting {
                    match &result {
                        Ok(receipt) if receipt.success => tracing::warn!(
                            stage = ?self.stage,
                            message = %receipt.message,
                            "invoice accepted after the session moved on"
                        ),
                        _ => tracing::warn!(stage = ?self.stage, "discarding stale submission result"),
                    }
                    return self;
                }
                match result {
                    Ok(receipt) if receipt.success => {
                        tracing::info!(message = %receipt.message, "invoice submitted");
                        let program = self.draft.program;
                        self.draft = InvoiceDraft {
                            program,
                            ..InvoiceDraft::default()
                        };
                        self.reset_invoice_state();
                        self.stage = Stage::Submitted(receipt);
                    }
                    Ok(receipt) => {
                        tracing::info!(message = %receipt.message, "submission refused");
                        self.fail_submission(receipt.message);
                    }
                    Err(message) => {
                        tracing::info!("submission failed: {message}");
                        self.fail_submission(message);
                    }
                }
            }
        }
        tracing::debug!(stage = ?self.stage, generation = self.generation, "session updated");
        self
    }

    /// Payload for the backend; only available while submitting.
    pub fn payload(&self) -> Option<SubmissionPayload> {
        if self.stage != Stage::Submitting {
            return None;
        }
        let fields = &self.draft.fields;
        let verdict = self.verdict.as_ref()?;
        let credit_note = match self.draft.program {
            PaymentProgram::ProntoPago => self
                .draft
                .credit_note_xml
                .as_ref()
                .and_then(|f| f.text().ok())
                .and_then(parse_credit_note),
            PaymentProgram::Standard => None,
        };
        let expected_fee = match self.draft.program {
            PaymentProgram::ProntoPago => fields
                .total
                .map(|t| self.gate.matcher().terms.expected_fee(t)),
            PaymentProgram::Standard => None,
        };
        Some(SubmissionPayload {
            uuid: fields.uuid.clone()?,
            serie: fields.serie.clone(),
            folio: fields.folio.clone(),
            issuer_rfc: fields.issuer_rfc.clone()?,
            issuer_name: fields.issuer_name.clone(),
            receiver_rfc: fields.receiver_rfc.clone(),
            invoice_date: fields.invoice_date?,
            subtotal: fields.subtotal,
            total: fields.total?,
            currency: fields.currency.clone(),
            project: fields.project.clone(),
            payment_week: fields.payment_week()?,
            week_claim: fields.week_claim,
            program: self.draft.program,
            late_reasons: verdict.reasons.clone(),
            next_cycle: verdict.is_late(),
            credit_note_uuid: credit_note.map(|n| n.uuid),
            expected_fee,
            invoice_xml_name: self.draft.invoice_xml.as_ref().map(|f| f.name.clone()),
            invoice_pdf_name: self.draft.invoice_pdf.as_ref().map(|f| f.name.clone()),
        })
    }

    fn is_current(&self, generation: u64, what: &str) -> bool {
        if generation == self.generation {
            return true;
        }
        tracing::warn!(
            generation,
            current = self.generation,
            "discarding stale {what} result"
        );
        false
    }

    fn reset_invoice_state(&mut self) {
        self.generation += 1;
        self.credit_generation += 1;
        self.draft.fields = ExtractedFields::default();
        self.draft.confirmed = false;
        self.verdict = None;
        self.acknowledged.clear();
        self.credit_note = None;
        self.blocked.clear();
    }

    fn fail_submission(&mut self, message: String) {
        self.blocked = vec![ValidationError::with_rule("submission", message, "submission")];
        self.stage = Stage::Editable;
    }
}

impl Default for Session {
    fn default() -> Self {
        Self::new(SubmissionGate::default())
    }
}
