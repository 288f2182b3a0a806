//! Submission gate: the checks that decide what an issuer may do next.
//!
//! A [`Session`] holds one upload form. It changes only through
//! [`Session::apply`]; every check is a pure function of the draft and an
//! injected `now` ([`SubmissionGate`]). Work that talks to other services
//! (field extraction, duplicate lookup, project list, persistence) goes
//! through the traits in this module and comes back as an [`Event`].
//!
//! # Example
//!
//! ```
//! use cfdi_portal::gate::*;
//!
//! let session = Session::default().apply(Event::InvoiceFilesSelected {
//!     xml: Some(UploadedFile::new("factura.xml", b"<cfdi:Comprobante/>".to_vec())),
//!     pdf: Some(UploadedFile::new("factura.pdf", b"%PDF-1.7".to_vec())),
//! });
//! assert_eq!(session.stage(), &Stage::Extracting);
//! ```

mod collaborators;
mod draft;
mod guards;
mod session;

pub use collaborators::*;
pub use draft::*;
pub use guards::*;
pub use session::*;
