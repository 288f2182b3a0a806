use cfdi_portal::cfdi::*;
use rust_decimal_macros::dec;

const CREDIT_NOTE: &str = r#"<cfdi:Comprobante Version="4.0" Total="240.00" Moneda="MXN" TipoDeComprobante="E">
  <cfdi:CfdiRelacionados TipoRelacion="01">
    <cfdi:CfdiRelacionado UUID="6F9A2C1E-1B2D-4E3F-8A9B-0C1D2E3F4A5B"/>
  </cfdi:CfdiRelacionados>
  <cfdi:Emisor Rfc="FLO010101AB1" Nombre="FLOTILLA DEL NORTE"/>
  <cfdi:Complemento>
    <tfd:TimbreFiscalDigital UUID="11111111-2222-3333-4444-555555555555"/>
  </cfdi:Complemento>
</cfdi:Comprobante>"#;

fn main() {
    let matcher = CreditNoteMatcher::new(ProntoPagoTerms::new(dec!(0.02)), DEFAULT_TOLERANCE);
    let invoice = InvoiceFacts {
        uuid: "6F9A2C1E-1B2D-4E3F-8A9B-0C1D2E3F4A5B",
        issuer_rfc: "FLO010101AB1",
        total: dec!(11600.00),
    };

    println!("=== Pronto Pago Credit Note ===\n");
    println!("  expected fee: {}", matcher.terms.expected_fee(invoice.total));

    for (label, total) in [("within band", "240.00"), ("too high", "260.00")] {
        let xml = CREDIT_NOTE.replace("Total=\"240.00\"", &format!("Total=\"{total}\""));
        let result = matcher.check(&xml, &invoice);
        if result.is_valid() {
            println!("  {label} ({total}): accepted");
        } else {
            println!("  {label} ({total}): REJECTED");
            for e in &result.errors {
                println!("    {e}");
            }
        }
    }
}
