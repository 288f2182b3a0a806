//! Submission session driven end to end with in-memory collaborators.

use std::sync::Mutex;

use chrono::{DateTime, FixedOffset, NaiveDate};
use cfdi_portal::core::*;
use cfdi_portal::gate::*;
use rust_decimal_macros::dec;

const INVOICE_UUID: &str = "6F9A2C1E-1B2D-4E3F-8A9B-0C1D2E3F4A5B";

fn invoice_xml(fecha: &str) -> String {
    format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<cfdi:Comprobante xmlns:cfdi="http://www.sat.gob.mx/cfd/4" Version="4.0" Serie="A" Folio="1024"
    Fecha="{fecha}" SubTotal="10000.00" Moneda="MXN" Total="11600.00" TipoDeComprobante="I">
  <cfdi:Emisor Rfc="FLO010101AB1" Nombre="FLOTILLA DEL NORTE" RegimenFiscal="601"/>
  <cfdi:Receptor Rfc="REC020202CD2" Nombre="LOGISTICA CENTRAL" UsoCFDI="G03"/>
  <cfdi:Conceptos>
    <cfdi:Concepto ClaveProdServ="78101800" Cantidad="1" Descripcion="Servicio de transporte semana 30" Importe="10000.00"/>
  </cfdi:Conceptos>
  <cfdi:Impuestos TotalImpuestosTrasladados="1600.00"/>
  <cfdi:Complemento>
    <tfd:TimbreFiscalDigital xmlns:tfd="http://www.sat.gob.mx/TimbreFiscalDigital" Version="1.1"
        UUID="{INVOICE_UUID}" FechaTimbrado="{fecha}"/>
  </cfdi:Complemento>
</cfdi:Comprobante>"#
    )
}

fn credit_note_xml(total: &str) -> String {
    format!(
        r#"<cfdi:Comprobante Version="4.0" Total="{total}" Moneda="MXN" TipoDeComprobante="E">
  <cfdi:CfdiRelacionados TipoRelacion="01">
    <cfdi:CfdiRelacionado UUID="{INVOICE_UUID}"/>
  </cfdi:CfdiRelacionados>
  <cfdi:Emisor Rfc="FLO010101AB1"/>
  <cfdi:Complemento>
    <tfd:TimbreFiscalDigital UUID="11111111-2222-3333-4444-555555555555"/>
  </cfdi:Complemento>
</cfdi:Comprobante>"#
    )
}

fn xml_file(fecha: &str) -> UploadedFile {
    UploadedFile::new("factura.xml", invoice_xml(fecha).into_bytes())
}

fn pdf_file() -> UploadedFile {
    UploadedFile::new("factura.pdf", b"%PDF-1.7".to_vec())
}

fn local(y: i32, m: u32, d: u32, h: u32, min: u32) -> DateTime<FixedOffset> {
    WeekClock::mexico_city().localize(
        NaiveDate::from_ymd_opt(y, m, d)
            .unwrap()
            .and_hms_opt(h, min, 0)
            .unwrap(),
    )
}

// --- In-memory collaborators ---

struct Registry(Vec<&'static str>);

impl InvoiceRegistry for Registry {
    async fn exists(&self, uuid: &str) -> Result<bool, PortalError> {
        Ok(self.0.iter().any(|u| u.eq_ignore_ascii_case(uuid)))
    }
}

struct Catalog(Vec<Project>);

impl ProjectCatalog for Catalog {
    async fn list(&self) -> Result<Vec<Project>, PortalError> {
        Ok(self.0.clone())
    }
}

struct Unreachable;

impl ProjectCatalog for Unreachable {
    async fn list(&self) -> Result<Vec<Project>, PortalError> {
        Err(PortalError::Network("connection refused".into()))
    }
}

/// Extractor that only knows the project label, like an OCR pass over the PDF.
struct ProjectExtractor(&'static str);

impl FieldExtractor for ProjectExtractor {
    async fn extract(
        &self,
        _xml: Option<&str>,
        _pdf: Option<&[u8]>,
    ) -> Result<ExtractedFields, PortalError> {
        Ok(ExtractedFields {
            project: Some(self.0.into()),
            ..ExtractedFields::default()
        })
    }
}

#[derive(Default)]
struct Sink {
    received: Mutex<Vec<SubmissionPayload>>,
    refuse: Option<&'static str>,
}

impl SubmissionSink for Sink {
    async fn submit(&self, payload: &SubmissionPayload) -> Result<SubmissionReceipt, PortalError> {
        self.received.lock().unwrap().push(payload.clone());
        Ok(match self.refuse {
            Some(message) => SubmissionReceipt {
                success: false,
                message: message.into(),
            },
            None => SubmissionReceipt {
                success: true,
                message: "Factura registrada".into(),
            },
        })
    }
}

fn catalog() -> Catalog {
    Catalog(vec![Project::new("PRJ-01", "Ruta Monterrey")])
}

async fn extracted(fecha: &str, now: DateTime<FixedOffset>) -> Session {
    let session = Session::default().apply(Event::InvoiceFilesSelected {
        xml: Some(xml_file(fecha)),
        pdf: Some(pdf_file()),
    });
    let request = ExtractionRequest::from_session(&session).unwrap();
    let event = run_extraction(request, &CfdiFieldExtractor, &Registry(vec![]), &catalog(), now).await;
    session.apply(event)
}

// --- Happy path ---

#[tokio::test]
async fn on_time_invoice_is_submitted() {
    let now = local(2024, 7, 24, 12, 0);
    let session = extracted("2024-07-24T11:30:00", now).await;
    assert_eq!(session.stage(), &Stage::Editable);
    assert_eq!(session.draft().fields.uuid.as_deref(), Some(INVOICE_UUID));
    assert_eq!(session.draft().fields.week_claim, Some(30));
    assert!(!session.verdict().unwrap().is_late());

    let session = session
        .apply(Event::ConfirmationToggled(true))
        .apply(Event::SubmitRequested { now });
    assert_eq!(session.stage(), &Stage::Submitting);

    let sink = Sink::default();
    let event = run_submission(&session, &sink).await.unwrap();
    let session = session.apply(event);
    assert!(matches!(session.stage(), Stage::Submitted(r) if r.success));
    assert!(session.draft().invoice_xml.is_none());

    let received = sink.received.lock().unwrap();
    assert_eq!(received.len(), 1);
    assert_eq!(received[0].payment_week, PaymentWeek::new(30, 2024).unwrap());
    assert!(!received[0].next_cycle);
}

#[tokio::test]
async fn submit_requires_confirmation() {
    let now = local(2024, 7, 24, 12, 0);
    let session = extracted("2024-07-24T11:30:00", now).await;
    let session = session.apply(Event::SubmitRequested { now });
    assert_eq!(session.stage(), &Stage::Editable);
    assert_eq!(session.blocked().len(), 1);
    assert!(session.blocked()[0].is("unconfirmed"));
    assert!(run_submission(&session, &Sink::default()).await.is_none());
}

// --- Extraction guards ---

#[tokio::test]
async fn duplicate_uuid_is_rejected() {
    let session = Session::default().apply(Event::InvoiceFilesSelected {
        xml: Some(xml_file("2024-07-24T11:30:00")),
        pdf: Some(pdf_file()),
    });
    let request = ExtractionRequest::from_session(&session).unwrap();
    let registry = Registry(vec!["6f9a2c1e-1b2d-4e3f-8a9b-0c1d2e3f4a5b"]);
    let event = run_extraction(
        request,
        &CfdiFieldExtractor,
        &registry,
        &catalog(),
        local(2024, 7, 24, 12, 0),
    )
    .await;
    let session = session.apply(event);
    match session.stage() {
        Stage::Rejected(errors) => assert_eq!(errors[0].rule.as_deref(), Some("duplicate_uuid")),
        other => panic!("expected rejection, got {other:?}"),
    }
    let session = session.apply(Event::FieldEdited(FieldEdit::Uuid(Some("OTHER".into()))));
    assert_eq!(session.draft().fields.uuid.as_deref(), Some(INVOICE_UUID));
}

#[tokio::test]
async fn unknown_project_is_rejected() {
    let now = local(2024, 7, 24, 12, 0);
    for (label, accepted) in [("ruta monterrey", true), ("PRJ-99", false)] {
        let session = Session::default().apply(Event::InvoiceFilesSelected {
            xml: Some(xml_file("2024-07-24T11:30:00")),
            pdf: Some(pdf_file()),
        });
        let request = ExtractionRequest::from_session(&session).unwrap();
        let event = run_extraction(request, &ProjectExtractor(label), &Registry(vec![]), &catalog(), now).await;
        let session = session.apply(event);
        assert_eq!(session.is_editable(), accepted, "{label}");
        // XML fields fill what the extractor left empty
        assert_eq!(session.draft().fields.issuer_rfc.as_deref(), Some("FLO010101AB1"));
    }
}

#[tokio::test]
async fn lookup_failure_rejects_with_message() {
    let session = Session::default().apply(Event::InvoiceFilesSelected {
        xml: Some(xml_file("2024-07-24T11:30:00")),
        pdf: Some(pdf_file()),
    });
    let request = ExtractionRequest::from_session(&session).unwrap();
    let event = run_extraction(
        request,
        &CfdiFieldExtractor,
        &Registry(vec![]),
        &Unreachable,
        local(2024, 7, 24, 12, 0),
    )
    .await;
    let session = session.apply(event);
    match session.stage() {
        Stage::Rejected(errors) => assert!(errors[0].message.contains("connection refused")),
        other => panic!("expected rejection, got {other:?}"),
    }
}

#[tokio::test]
async fn undecodable_xml_is_rejected() {
    let session = Session::default().apply(Event::InvoiceFilesSelected {
        xml: Some(UploadedFile::new("factura.xml", vec![0xff, 0xfe, 0xfd])),
        pdf: Some(pdf_file()),
    });
    let request = ExtractionRequest::from_session(&session).unwrap();
    let event = run_extraction(
        request,
        &CfdiFieldExtractor,
        &Registry(vec![]),
        &catalog(),
        local(2024, 7, 24, 12, 0),
    )
    .await;
    let session = session.apply(event);
    match session.stage() {
        Stage::Rejected(errors) => assert!(errors[0].message.starts_with("could not process file")),
        other => panic!("expected rejection, got {other:?}"),
    }
}

// --- Stale results ---

#[tokio::test]
async fn stale_extraction_is_discarded() {
    let now = local(2024, 7, 24, 12, 0);
    let first = Session::default().apply(Event::InvoiceFilesSelected {
        xml: Some(xml_file("2024-07-22T08:00:00")),
        pdf: Some(pdf_file()),
    });
    let stale = ExtractionRequest::from_session(&first).unwrap();

    let session = first.apply(Event::InvoiceFilesSelected {
        xml: Some(xml_file("2024-07-24T11:30:00")),
        pdf: Some(pdf_file()),
    });
    let current = ExtractionRequest::from_session(&session).unwrap();
    assert!(current.generation > stale.generation);

    let stale_event = run_extraction(stale, &CfdiFieldExtractor, &Registry(vec![]), &catalog(), now).await;
    let session = session.apply(stale_event);
    assert_eq!(session.stage(), &Stage::Extracting);
    assert!(session.draft().fields.uuid.is_none());

    let event = run_extraction(current, &CfdiFieldExtractor, &Registry(vec![]), &catalog(), now).await;
    let session = session.apply(event);
    assert_eq!(session.stage(), &Stage::Editable);
    assert_eq!(
        session.draft().fields.invoice_date,
        NaiveDate::from_ymd_opt(2024, 7, 24)
    );
}

#[test]
fn removing_a_file_returns_to_awaiting() {
    let session = Session::default()
        .apply(Event::InvoiceFilesSelected {
            xml: Some(xml_file("2024-07-24T11:30:00")),
            pdf: Some(pdf_file()),
        })
        .apply(Event::InvoiceFilesSelected {
            xml: Some(xml_file("2024-07-24T11:30:00")),
            pdf: None,
        });
    assert_eq!(session.stage(), &Stage::AwaitingFiles);
    assert!(ExtractionRequest::from_session(&session).is_none());
}

// --- Late invoices ---

#[tokio::test]
async fn late_invoice_cancelled() {
    let session = extracted("2024-07-22T08:00:00", local(2024, 7, 24, 12, 0)).await;
    match session.stage() {
        Stage::LatePending(verdict) => {
            assert_eq!(verdict.primary_reason(), Some(LateReason::WrongInvoiceDate))
        }
        other => panic!("expected late prompt, got {other:?}"),
    }
    let session = session.apply(Event::LateCancelled);
    assert_eq!(session.stage(), &Stage::AwaitingFiles);
    assert!(!session.draft().has_invoice_files());
    assert!(session.draft().fields.uuid.is_none());
}

#[tokio::test]
async fn late_invoice_acknowledged_goes_to_next_cycle() {
    let now = local(2024, 7, 24, 12, 0);
    let session = extracted("2024-07-22T08:00:00", now).await;
    let session = session
        .apply(Event::LateAcknowledged)
        .apply(Event::ConfirmationToggled(true))
        .apply(Event::SubmitRequested { now });
    assert!(session.late_acknowledged());
    assert_eq!(session.stage(), &Stage::Submitting);

    let payload = session.payload().unwrap();
    assert!(payload.next_cycle);
    assert_eq!(payload.late_reasons, vec![LateReason::WrongInvoiceDate]);

    let json = serde_json::to_string_pretty(&payload).unwrap();
    insta::assert_snapshot!("late_payload", json);
}

#[tokio::test]
async fn date_edit_is_rechecked_on_submit() {
    let now = local(2024, 7, 24, 12, 0);
    let session = extracted("2024-07-24T11:30:00", now).await;
    assert_eq!(session.stage(), &Stage::Editable);

    let session = session
        .apply(Event::FieldEdited(FieldEdit::InvoiceDate(NaiveDate::from_ymd_opt(2024, 7, 26))))
        .apply(Event::ConfirmationToggled(true))
        .apply(Event::SubmitRequested { now });
    match session.stage() {
        Stage::LatePending(verdict) => assert!(verdict.has(LateReason::WrongInvoiceDate)),
        other => panic!("expected late prompt, got {other:?}"),
    }

    let session = session
        .apply(Event::LateAcknowledged)
        .apply(Event::SubmitRequested { now });
    assert_eq!(session.stage(), &Stage::Submitting);
}

#[tokio::test]
async fn acknowledgment_does_not_cover_new_reasons() {
    let session = extracted("2024-07-22T08:00:00", local(2024, 7, 24, 12, 0))
        .await
        .apply(Event::LateAcknowledged)
        .apply(Event::ConfirmationToggled(true));
    assert_eq!(session.acknowledged_reasons(), &[LateReason::WrongInvoiceDate]);

    let later = local(2024, 8, 5, 9, 0);
    let session = session.apply(Event::SubmitRequested { now: later });
    match session.stage() {
        Stage::LatePending(verdict) => assert_eq!(
            verdict.reasons,
            vec![LateReason::AfterDeadline, LateReason::WrongInvoiceDate]
        ),
        other => panic!("expected late prompt, got {other:?}"),
    }
    assert!(session.payload().is_none());

    let session = session
        .apply(Event::LateAcknowledged)
        .apply(Event::SubmitRequested { now: later });
    assert_eq!(session.stage(), &Stage::Submitting);
    assert_eq!(
        session.payload().unwrap().late_reasons,
        vec![LateReason::AfterDeadline, LateReason::WrongInvoiceDate]
    );
}

#[tokio::test]
async fn acknowledgment_is_reset_by_date_edits() {
    let now = local(2024, 7, 24, 12, 0);
    let session = extracted("2024-07-22T08:00:00", now)
        .await
        .apply(Event::LateAcknowledged);
    assert!(session.late_acknowledged());
    let session = session.apply(Event::FieldEdited(FieldEdit::InvoiceDate(
        NaiveDate::from_ymd_opt(2024, 7, 26),
    )));
    assert!(!session.late_acknowledged());
}

#[tokio::test]
async fn missing_date_blocks_submit() {
    let now = local(2024, 7, 24, 12, 0);
    let session = extracted("2024-07-24T11:30:00", now)
        .await
        .apply(Event::FieldEdited(FieldEdit::InvoiceDate(None)))
        .apply(Event::SubmitRequested { now });
    assert_eq!(session.stage(), &Stage::Editable);
    let rules: Vec<_> = session.blocked().iter().filter_map(|e| e.rule.as_deref()).collect();
    assert_eq!(rules, vec!["required", "unconfirmed"]);
}

// --- Pronto pago ---

async fn pronto_pago_session(credit_total: &str) -> Session {
    let now = local(2024, 7, 24, 12, 0);
    let session = extracted("2024-07-24T11:30:00", now)
        .await
        .apply(Event::ProgramSelected(PaymentProgram::ProntoPago))
        .apply(Event::ConfirmationToggled(true))
        .apply(Event::CreditNoteFilesSelected {
            xml: Some(UploadedFile::new("nc.xml", credit_note_xml(credit_total).into_bytes())),
            pdf: Some(UploadedFile::new("nc.pdf", b"%PDF-1.7".to_vec())),
        });
    let checked = run_credit_note_check(&session).unwrap();
    session.apply(checked).apply(Event::SubmitRequested { now })
}

#[tokio::test]
async fn pronto_pago_with_matching_credit_note() {
    let session = pronto_pago_session("232.00").await;
    assert_eq!(session.stage(), &Stage::Submitting);
    let payload = session.payload().unwrap();
    assert_eq!(payload.program, PaymentProgram::ProntoPago);
    assert_eq!(payload.expected_fee, Some(dec!(232.00)));
    assert_eq!(
        payload.credit_note_uuid.as_deref(),
        Some("11111111-2222-3333-4444-555555555555")
    );
}

#[tokio::test]
async fn pronto_pago_with_wrong_amount_is_blocked() {
    let session = pronto_pago_session("300.00").await;
    assert_eq!(session.stage(), &Stage::Editable);
    let rules: Vec<_> = session.blocked().iter().filter_map(|e| e.rule.as_deref()).collect();
    assert_eq!(rules, vec!["CN-04"]);
}

#[tokio::test]
async fn pronto_pago_without_credit_note_is_blocked() {
    let now = local(2024, 7, 24, 12, 0);
    let session = extracted("2024-07-24T11:30:00", now)
        .await
        .apply(Event::ProgramSelected(PaymentProgram::ProntoPago))
        .apply(Event::ConfirmationToggled(true))
        .apply(Event::SubmitRequested { now });
    let fields: Vec<_> = session.blocked().iter().map(|e| e.field.as_str()).collect();
    assert_eq!(fields, vec!["credit_note_xml", "credit_note_pdf"]);
}

#[tokio::test]
async fn stale_credit_note_check_is_discarded() {
    let now = local(2024, 7, 24, 12, 0);
    let session = extracted("2024-07-24T11:30:00", now)
        .await
        .apply(Event::ProgramSelected(PaymentProgram::ProntoPago))
        .apply(Event::CreditNoteFilesSelected {
            xml: Some(UploadedFile::new("nc.xml", credit_note_xml("300.00").into_bytes())),
            pdf: Some(UploadedFile::new("nc.pdf", b"%PDF-1.7".to_vec())),
        });
    let stale = run_credit_note_check(&session).unwrap();
    let session = session.apply(Event::CreditNoteFilesSelected {
        xml: Some(UploadedFile::new("nc.xml", credit_note_xml("232.00").into_bytes())),
        pdf: Some(UploadedFile::new("nc.pdf", b"%PDF-1.7".to_vec())),
    });
    let session = session.apply(stale);
    assert!(session.credit_note().is_none());

    let fresh = run_credit_note_check(&session).unwrap();
    let session = session.apply(fresh);
    assert!(session.credit_note().unwrap().is_valid());
}

#[tokio::test]
async fn total_edit_discards_in_flight_credit_note_check() {
    let now = local(2024, 7, 24, 12, 0);
    let session = extracted("2024-07-24T11:30:00", now)
        .await
        .apply(Event::ProgramSelected(PaymentProgram::ProntoPago))
        .apply(Event::ConfirmationToggled(true))
        .apply(Event::CreditNoteFilesSelected {
            xml: Some(UploadedFile::new("nc.xml", credit_note_xml("232.00").into_bytes())),
            pdf: Some(UploadedFile::new("nc.pdf", b"%PDF-1.7".to_vec())),
        });
    let in_flight = run_credit_note_check(&session).unwrap();
    let session = session
        .apply(Event::FieldEdited(FieldEdit::Total(Some(dec!(50000.00)))))
        .apply(in_flight);
    assert!(session.credit_note().is_none());

    let session = session.apply(Event::SubmitRequested { now });
    assert_eq!(session.stage(), &Stage::Editable);
    let rules: Vec<_> = session.blocked().iter().filter_map(|e| e.rule.as_deref()).collect();
    assert_eq!(rules, vec!["pronto_pago"]);

    let fresh = run_credit_note_check(&session).unwrap();
    let session = session.apply(fresh).apply(Event::SubmitRequested { now });
    assert_eq!(session.stage(), &Stage::Editable);
    let rules: Vec<_> = session.blocked().iter().filter_map(|e| e.rule.as_deref()).collect();
    assert_eq!(rules, vec!["CN-04"]);
}

#[tokio::test]
async fn receipt_after_new_files_leaves_session_alone() {
    let now = local(2024, 7, 24, 12, 0);
    let session = extracted("2024-07-24T11:30:00", now)
        .await
        .apply(Event::ConfirmationToggled(true))
        .apply(Event::SubmitRequested { now });
    let event = run_submission(&session, &Sink::default()).await.unwrap();

    let session = session.apply(Event::InvoiceFilesSelected {
        xml: Some(xml_file("2024-07-31T09:00:00")),
        pdf: Some(pdf_file()),
    });
    let generation = session.generation();
    let session = session.apply(event);
    assert_eq!(session.stage(), &Stage::Extracting);
    assert_eq!(session.generation(), generation);
    assert!(session.draft().has_invoice_files());
}

#[tokio::test]
async fn refused_submission_returns_to_editing() {
    let now = local(2024, 7, 24, 12, 0);
    let session = extracted("2024-07-24T11:30:00", now)
        .await
        .apply(Event::ConfirmationToggled(true))
        .apply(Event::SubmitRequested { now });
    let sink = Sink {
        refuse: Some("UUID ya registrado"),
        ..Sink::default()
    };
    let event = run_submission(&session, &sink).await.unwrap();
    let session = session.apply(event);
    assert_eq!(session.stage(), &Stage::Editable);
    assert_eq!(session.blocked()[0].message, "UUID ya registrado");
    assert_eq!(session.draft().fields.uuid.as_deref(), Some(INVOICE_UUID));
}
