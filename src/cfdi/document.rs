use chrono::NaiveDateTime;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::patterns::{parse_amount, parse_fecha};

/// Issuer or receiver of a CFDI.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CfdiParty {
    /// RFC (Registro Federal de Contribuyentes).
    pub rfc: String,
    /// Registered name (`Nombre`).
    pub name: Option<String>,
}

/// `CfdiRelacionados` block.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CfdiRelation {
    /// SAT relationship code (`TipoRelacion`, e.g. "01").
    pub tipo_relacion: Option<String>,
    /// UUIDs of the related documents, in document order.
    pub uuids: Vec<String>,
}

/// The subset of a stamped CFDI that the portal reads.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CfdiDocument {
    /// `TipoDeComprobante` ("I" income, "E" egress, "P" payment...).
    pub tipo_comprobante: Option<String>,
    /// Fiscal UUID from the `TimbreFiscalDigital` complement.
    pub uuid: String,
    pub serie: Option<String>,
    pub folio: Option<String>,
    pub issuer: CfdiParty,
    pub receiver: Option<CfdiParty>,
    pub relation: Option<CfdiRelation>,
    pub subtotal: Option<Decimal>,
    /// `TotalImpuestosTrasladados` of the document-level `Impuestos` node.
    pub transferred_taxes: Option<Decimal>,
    pub total: Option<Decimal>,
    /// `Moneda` (e.g. "MXN").
    pub currency: Option<String>,
    /// `Fecha`, local civil time of issue.
    pub issue_date: Option<NaiveDateTime>,
    /// `Descripcion` of every `Concepto`.
    pub concepts: Vec<String>,
}

impl CfdiDocument {
    /// First related UUID, if the document references any.
    pub fn related_uuid(&self) -> Option<&str> {
        self.relation
            .as_ref()
            .and_then(|r| r.uuids.first())
            .map(String::as_str)
    }

    pub fn is_egress(&self) -> bool {
        self.tipo_comprobante
            .as_deref()
            .is_some_and(|t| t.eq_ignore_ascii_case("E"))
    }
}

/// Accumulates element attributes in document order into a [`CfdiDocument`].
///
/// Shared by every reader so that all of them extract the same fields the
/// same way.
#[derive(Debug, Default)]
pub(crate) struct DocumentBuilder {
    seen_comprobante: bool,
    tipo_comprobante: Option<String>,
    uuid: Option<String>,
    serie: Option<String>,
    folio: Option<String>,
    issuer: Option<CfdiParty>,
    receiver: Option<CfdiParty>,
    relation: Option<CfdiRelation>,
    subtotal: Option<Decimal>,
    transferred_taxes: Option<Decimal>,
    total: Option<Decimal>,
    currency: Option<String>,
    issue_date: Option<NaiveDateTime>,
    concepts: Vec<String>,
}

impl DocumentBuilder {
    /// Feed one start tag. `attr` looks up an attribute by local name,
    /// ignoring case.
    pub(crate) fn element(&mut self, local_name: &str, attr: &dyn Fn(&str) -> Option<String>) {
        match local_name.to_ascii_lowercase().as_str() {
            "comprobante" if !self.seen_comprobante => {
                self.seen_comprobante = true;
                self.tipo_comprobante = attr("TipoDeComprobante");
                self.serie = attr("Serie");
                self.folio = attr("Folio");
                self.subtotal = attr("SubTotal").as_deref().and_then(parse_amount);
                self.total = attr("Total").as_deref().and_then(parse_amount);
                self.currency = attr("Moneda");
                self.issue_date = attr("Fecha").as_deref().and_then(parse_fecha);
            }
            "emisor" if self.issuer.is_none() => {
                self.issuer = party(attr);
            }
            "receptor" if self.receiver.is_none() => {
                self.receiver = party(attr);
            }
            "timbrefiscaldigital" if self.uuid.is_none() => {
                self.uuid = attr("UUID");
            }
            "cfdirelacionados" => {
                let relation = self.relation.get_or_insert_with(CfdiRelation::default);
                if relation.tipo_relacion.is_none() {
                    relation.tipo_relacion = attr("TipoRelacion");
                }
            }
            "cfdirelacionado" => {
                if let Some(uuid) = attr("UUID") {
                    self.relation
                        .get_or_insert_with(CfdiRelation::default)
                        .uuids
                        .push(uuid);
                }
            }
            "impuestos" if self.transferred_taxes.is_none() => {
                self.transferred_taxes = attr("TotalImpuestosTrasladados")
                    .as_deref()
                    .and_then(parse_amount);
            }
            "concepto" => {
                if let Some(description) = attr("Descripcion") {
                    self.concepts.push(description);
                }
            }
            _ => {}
        }
    }

    /// `None` when the fiscal UUID or the issuer RFC is missing.
    pub(crate) fn finish(self) -> Option<CfdiDocument> {
        Some(CfdiDocument {
            tipo_comprobante: self.tipo_comprobante,
            uuid: self.uuid?,
            serie: self.serie,
            folio: self.folio,
            issuer: self.issuer?,
            receiver: self.receiver,
            relation: self.relation,
            subtotal: self.subtotal,
            transferred_taxes: self.transferred_taxes,
            total: self.total,
            currency: self.currency,
            issue_date: self.issue_date,
            concepts: self.concepts,
        })
    }
}

fn party(attr: &dyn Fn(&str) -> Option<String>) -> Option<CfdiParty> {
    Some(CfdiParty {
        rfc: attr("Rfc")?,
        name: attr("Nombre"),
    })
}
