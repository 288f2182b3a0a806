//! Payment-week claims written into invoice concept descriptions.

use std::sync::LazyLock;

use regex::Regex;

static WEEK_CLAIM: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(?:semana|sem\.?|week|wk)\s*(?:no\.?|n[uú]m(?:ero)?\.?|#)?\s*(\d{1,2})\b")
        .expect("week claim pattern is valid")
});

/// First week number (1..=53) mentioned in free text, e.g. "Semana 30",
/// "SEM. 7", "semana #12". Out-of-range numbers are skipped.
pub fn parse_week_claim(text: &str) -> Option<u32> {
    WEEK_CLAIM
        .captures_iter(text)
        .filter_map(|c| c[1].parse::<u32>().ok())
        .find(|w| (1..=53).contains(w))
}

/// First week claim found across several descriptions.
pub fn week_claim_from<S: AsRef<str>>(descriptions: &[S]) -> Option<u32> {
    descriptions
        .iter()
        .find_map(|d| parse_week_claim(d.as_ref()))
}
