//! Contracts of the services a session depends on, and the effect runners
//! that turn their answers into [`Event`]s.
//!
//! Runners take a snapshot of what they need from the session and return an
//! event; the caller applies it with [`Session::apply`], which drops results
//! whose generation has been superseded in the meantime.

#![allow(async_fn_in_trait)]

use chrono::{DateTime, FixedOffset};

use crate::cfdi::{CreditNoteValidation, read_cfdi};
use crate::core::{PortalError, ValidationError};

use super::draft::{ExtractedFields, Project, SubmissionPayload, SubmissionReceipt, UploadedFile};
use super::session::{Event, Session};

/// Lookup of already-submitted fiscal UUIDs.
pub trait InvoiceRegistry {
    async fn exists(&self, uuid: &str) -> Result<bool, PortalError>;
}

/// Active projects.
pub trait ProjectCatalog {
    async fn list(&self) -> Result<Vec<Project>, PortalError>;
}

/// Best-effort field extraction from the uploaded documents.
pub trait FieldExtractor {
    async fn extract(
        &self,
        xml: Option<&str>,
        pdf: Option<&[u8]>,
    ) -> Result<ExtractedFields, PortalError>;
}

/// Persistence of accepted submissions.
pub trait SubmissionSink {
    async fn submit(&self, payload: &SubmissionPayload) -> Result<SubmissionReceipt, PortalError>;
}

/// Extraction from the CFDI XML alone, without any external service.
#[derive(Debug, Clone, Copy, Default)]
pub struct CfdiFieldExtractor;

impl FieldExtractor for CfdiFieldExtractor {
    async fn extract(
        &self,
        xml: Option<&str>,
        _pdf: Option<&[u8]>,
    ) -> Result<ExtractedFields, PortalError> {
        Ok(xml
            .and_then(read_cfdi)
            .map(ExtractedFields::from)
            .unwrap_or_default())
    }
}

/// What an extraction run needs from the session.
#[derive(Debug, Clone)]
pub struct ExtractionRequest {
    pub generation: u64,
    pub xml: UploadedFile,
    pub pdf: UploadedFile,
}

impl ExtractionRequest {
    /// Snapshot of the current invoice files, if both are present.
    pub fn from_session(session: &Session) -> Option<Self> {
        let draft = session.draft();
        Some(Self {
            generation: session.generation(),
            xml: draft.invoice_xml.clone()?,
            pdf: draft.invoice_pdf.clone()?,
        })
    }
}

/// Extract fields, then look up duplicates and active projects.
///
/// Fields the extractor leaves empty are filled from the XML itself, so a
/// partial answer from an external service never loses what the CFDI
/// already states.
pub async fn run_extraction<X, R, C>(
    request: ExtractionRequest,
    extractor: &X,
    registry: &R,
    catalog: &C,
    now: DateTime<FixedOffset>,
) -> Event
where
    X: FieldExtractor,
    R: InvoiceRegistry,
    C: ProjectCatalog,
{
    let generation = request.generation;
    match extract_and_lookup(&request, extractor, registry, catalog).await {
        Ok((fields, duplicate, projects)) => Event::ExtractionCompleted {
            generation,
            fields,
            duplicate,
            projects,
            now,
        },
        Err(e) => Event::ExtractionFailed {
            generation,
            message: e.to_string(),
        },
    }
}

async fn extract_and_lookup<X, R, C>(
    request: &ExtractionRequest,
    extractor: &X,
    registry: &R,
    catalog: &C,
) -> Result<(ExtractedFields, bool, Vec<Project>), PortalError>
where
    X: FieldExtractor,
    R: InvoiceRegistry,
    C: ProjectCatalog,
{
    let xml = request.xml.text()?;
    let mut fields = extractor.extract(Some(xml), Some(&request.pdf.bytes)).await?;
    if let Some(doc) = read_cfdi(xml) {
        fields.merge_missing(ExtractedFields::from(doc));
    }
    let duplicate = match fields.uuid.as_deref() {
        Some(uuid) => registry.exists(uuid).await?,
        None => false,
    };
    let projects = catalog.list().await?;
    tracing::debug!(
        generation = request.generation,
        uuid = ?fields.uuid,
        duplicate,
        projects = projects.len(),
        "extraction finished"
    );
    Ok((fields, duplicate, projects))
}

/// Validate the session's current credit-note XML against its invoice
/// fields. `None` when no credit-note XML is selected.
pub fn run_credit_note_check(session: &Session) -> Option<Event> {
    let file = session.draft().credit_note_xml.as_ref()?;
    let generation = session.credit_generation();
    let validation = match file.text() {
        Ok(xml) => session
            .gate()
            .check_credit_note(xml, &session.draft().fields),
        Err(e) => CreditNoteValidation {
            errors: vec![ValidationError::with_rule(
                "credit_note_xml",
                e.to_string(),
                "CN-00",
            )],
        },
    };
    Some(Event::CreditNoteChecked {
        generation,
        validation,
    })
}

/// Send the session's payload. `None` unless the session is submitting.
pub async fn run_submission<S: SubmissionSink>(session: &Session, sink: &S) -> Option<Event> {
    let payload = session.payload()?;
    let result = sink
        .submit(&payload)
        .await
        .map_err(|e| e.to_string())
        .and_then(|receipt| {
            if receipt.success {
                Ok(receipt)
            } else {
                Err(receipt.message)
            }
        });
    Some(Event::SubmissionCompleted(result))
}
