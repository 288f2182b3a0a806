use super::document::{CfdiDocument, DocumentBuilder};
use super::patterns;

/// Extracts a [`CfdiDocument`] from raw XML text.
///
/// Returns `None` when the text does not carry both a fiscal UUID and an
/// issuer RFC. Implementations must never panic on arbitrary input.
pub trait CfdiReader {
    fn read(&self, xml: &str) -> Option<CfdiDocument>;
}

/// Regex-based reader over start tags. Tolerates truncated or
/// non-well-formed documents.
#[derive(Debug, Clone, Copy, Default)]
pub struct PatternReader;

impl CfdiReader for PatternReader {
    fn read(&self, xml: &str) -> Option<CfdiDocument> {
        let mut builder = DocumentBuilder::default();
        for tag in patterns::tags(xml) {
            builder.element(tag.name, &|name| tag.attr(name));
        }
        builder.finish()
    }
}

/// Read a CFDI with the default [`PatternReader`].
pub fn read_cfdi(xml: &str) -> Option<CfdiDocument> {
    PatternReader.read(xml)
}
