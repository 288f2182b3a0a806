use quick_xml::Reader;
use quick_xml::events::{BytesStart, Event};

use super::document::{CfdiDocument, DocumentBuilder};
use super::reader::CfdiReader;

/// Streaming XML reader backed by `quick-xml`.
///
/// Produces the same [`CfdiDocument`] as [`super::PatternReader`] for
/// well-formed input, and `None` for anything the parser rejects.
#[derive(Debug, Clone, Copy, Default)]
pub struct EventReader;

impl CfdiReader for EventReader {
    fn read(&self, xml: &str) -> Option<CfdiDocument> {
        let mut reader = Reader::from_str(xml);
        reader.config_mut().trim_text(true);

        let mut builder = DocumentBuilder::default();
        loop {
            match reader.read_event() {
                Ok(Event::Start(ref e)) | Ok(Event::Empty(ref e)) => {
                    let name = String::from_utf8_lossy(e.local_name().as_ref()).into_owned();
                    let attrs = attributes(e)?;
                    builder.element(&name, &|key| {
                        attrs
                            .iter()
                            .find(|(k, _)| k.eq_ignore_ascii_case(key))
                            .map(|(_, v)| v.trim().to_string())
                            .filter(|v| !v.is_empty())
                    });
                }
                Ok(Event::Eof) => break,
                Ok(_) => {}
                Err(e) => {
                    tracing::debug!("CFDI XML rejected at byte {}: {e}", reader.buffer_position());
                    return None;
                }
            }
        }
        builder.finish()
    }
}

fn attributes(e: &BytesStart<'_>) -> Option<Vec<(String, String)>> {
    e.attributes()
        .map(|attr| {
            let attr = attr.ok()?;
            let key = String::from_utf8_lossy(attr.key.local_name().as_ref()).into_owned();
            let value = attr.unescape_value().ok()?.into_owned();
            Some((key, value))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cfdi::PatternReader;

    const CREDIT_NOTE: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<cfdi:Comprobante xmlns:cfdi="http://www.sat.gob.mx/cfd/4" Version="4.0" Folio="NC-7"
    Fecha="2024-07-25T09:00:00" SubTotal="200.00" Moneda="MXN" Total="232.00" TipoDeComprobante="E">
  <cfdi:CfdiRelacionados TipoRelacion="01">
    <cfdi:CfdiRelacionado UUID="6F9A2C1E-1B2D-4E3F-8A9B-0C1D2E3F4A5B"/>
  </cfdi:CfdiRelacionados>
  <cfdi:Emisor Rfc="FLO010101AB1" Nombre="FLOTILLA &amp; ASOCIADOS"/>
  <cfdi:Receptor Rfc="REC020202CD2"/>
  <cfdi:Impuestos TotalImpuestosTrasladados="32.00"/>
  <cfdi:Complemento>
    <tfd:TimbreFiscalDigital xmlns:tfd="http://www.sat.gob.mx/TimbreFiscalDigital" UUID="11111111-2222-3333-4444-555555555555"/>
  </cfdi:Complemento>
</cfdi:Comprobante>"#;

    #[test]
    fn matches_pattern_reader_on_well_formed_input() {
        let events = EventReader.read(CREDIT_NOTE).unwrap();
        let patterns = PatternReader.read(CREDIT_NOTE).unwrap();
        assert_eq!(events, patterns);
        assert_eq!(events.issuer.name.as_deref(), Some("FLOTILLA & ASOCIADOS"));
        assert_eq!(
            events.related_uuid(),
            Some("6F9A2C1E-1B2D-4E3F-8A9B-0C1D2E3F4A5B")
        );
    }

    #[test]
    fn rejects_malformed_xml() {
        let broken = CREDIT_NOTE.replace("</cfdi:Complemento>", "</cfdi:Other>");
        assert!(EventReader.read(&broken).is_none());
    }
}
