//! CFDI XML reading and pronto-pago credit-note matching.
//!
//! Fields are pulled from start-tag attributes by pattern matching
//! ([`PatternReader`]), which tolerates truncated uploads and needs no XML
//! parser. With the `xml` feature, [`EventReader`] reads the same fields
//! through `quick-xml`. Both sit behind [`CfdiReader`].
//!
//! # Example
//!
//! ```
//! use cfdi_portal::cfdi::*;
//! use rust_decimal_macros::dec;
//!
//! let xml = r#"<cfdi:Comprobante TipoDeComprobante="E" Total="232.00">
//!   <cfdi:CfdiRelacionados TipoRelacion="01">
//!     <cfdi:CfdiRelacionado UUID="6f9a2c1e-1b2d-4e3f-8a9b-0c1d2e3f4a5b"/>
//!   </cfdi:CfdiRelacionados>
//!   <cfdi:Emisor Rfc="FLO010101AB1"/>
//!   <tfd:TimbreFiscalDigital UUID="11111111-2222-3333-4444-555555555555"/>
//! </cfdi:Comprobante>"#;
//!
//! assert!(looks_like_credit_note(xml));
//! let note = parse_credit_note(xml).unwrap();
//! let result = validate_credit_note(
//!     &note,
//!     "6F9A2C1E-1B2D-4E3F-8A9B-0C1D2E3F4A5B",
//!     "flo010101ab1",
//!     dec!(232),
//!     None,
//! );
//! assert!(result.is_valid());
//! ```

mod credit_note;
mod description;
mod document;
pub mod patterns;
mod reader;
#[cfg(feature = "xml")]
mod xml;

pub use credit_note::*;
pub use description::{parse_week_claim, week_claim_from};
pub use document::{CfdiDocument, CfdiParty, CfdiRelation};
pub use reader::{CfdiReader, PatternReader, read_cfdi};
#[cfg(feature = "xml")]
pub use xml::EventReader;
