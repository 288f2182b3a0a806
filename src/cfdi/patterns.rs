//! Pattern-based scanning of CFDI XML text.
//!
//! Only start tags and their attributes are read. Element and attribute
//! names are matched case-insensitively and without namespace prefix, so
//! `<cfdi:Comprobante Total="1">` and `<Comprobante total="1">` are equal.

use std::str::FromStr;
use std::sync::LazyLock;

use chrono::{NaiveDate, NaiveDateTime};
use regex::Regex;
use rust_decimal::Decimal;

static START_TAG: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"<(?:[A-Za-z_][\w.-]*:)?([A-Za-z_][\w.-]*)((?:\s[^<>]*)?)/?>")
        .expect("start tag pattern is valid")
});

static ATTRIBUTE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?:[A-Za-z_][\w.-]*:)?([A-Za-z_][\w.-]*)\s*=\s*(?:"([^"]*)"|'([^']*)')"#)
        .expect("attribute pattern is valid")
});

static CREDIT_NOTE_TYPE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)TipoDeComprobante\s*=\s*["']\s*E\s*["']"#)
        .expect("document type pattern is valid")
});

/// A start (or empty-element) tag found in the text.
#[derive(Debug, Clone, Copy)]
pub struct Tag<'a> {
    /// Local element name, without namespace prefix.
    pub name: &'a str,
    attrs: &'a str,
}

impl<'a> Tag<'a> {
    /// Whether the local name matches, ignoring ASCII case.
    pub fn is(&self, local_name: &str) -> bool {
        self.name.eq_ignore_ascii_case(local_name)
    }

    /// Unescaped, trimmed value of an attribute; empty values count as absent.
    pub fn attr(&self, name: &str) -> Option<String> {
        ATTRIBUTE
            .captures_iter(self.attrs)
            .find(|c| c[1].eq_ignore_ascii_case(name))
            .and_then(|c| c.get(2).or_else(|| c.get(3)))
            .map(|m| unescape(m.as_str().trim()))
            .filter(|v| !v.is_empty())
    }
}

/// All start tags in document order.
pub fn tags(xml: &str) -> impl Iterator<Item = Tag<'_>> {
    START_TAG.captures_iter(xml).filter_map(|c| {
        Some(Tag {
            name: c.get(1)?.as_str(),
            attrs: c.get(2).map_or("", |m| m.as_str()),
        })
    })
}

/// First start tag with the given local name.
pub fn first_tag<'a>(xml: &'a str, local_name: &str) -> Option<Tag<'a>> {
    tags(xml).find(|t| t.is(local_name))
}

/// Fast check of the document-type attribute only.
pub fn is_egress_type(xml: &str) -> bool {
    CREDIT_NOTE_TYPE.is_match(xml)
}

/// Parse a CFDI amount attribute ("1234.56").
pub fn parse_amount(value: &str) -> Option<Decimal> {
    Decimal::from_str(value.trim()).ok()
}

/// Parse a CFDI `Fecha` (local time without offset); date-only values map to midnight.
pub fn parse_fecha(value: &str) -> Option<NaiveDateTime> {
    let value = value.trim();
    NaiveDateTime::parse_from_str(value, "%Y-%m-%dT%H:%M:%S")
        .or_else(|_| NaiveDateTime::parse_from_str(value, "%Y-%m-%dT%H:%M:%S%.f"))
        .ok()
        .or_else(|| {
            NaiveDate::parse_from_str(value.get(..10)?, "%Y-%m-%d")
                .ok()?
                .and_hms_opt(0, 0, 0)
        })
}

pub(crate) fn unescape(value: &str) -> String {
    if !value.contains('&') {
        return value.to_string();
    }
    value
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&apos;", "'")
        .replace("&amp;", "&")
}
