//! Identifier extraction from raw mirror search pages.
//!
//! Mirror markup is neither valid nor stable across mirror software
//! versions, so extraction is pattern-based over text rather than a
//! structural parse. The pattern sits behind [`IdentifierExtractor`] so it
//! can be swapped per mirror family without touching the search walk.

use std::sync::LazyLock;

use regex::Regex;

/// Length of a content identifier in hex characters.
pub const IDENTIFIER_LEN: usize = 32;

static HEX_TOKEN_RE: LazyLock<Regex> =
    LazyLock::new(|| compile_static_regex(r"\b[0-9a-fA-F]{32}\b"));

/// Compiles a pattern known valid at build time.
#[allow(clippy::expect_used)]
pub(crate) fn compile_static_regex(pattern: &str) -> Regex {
    Regex::new(pattern).expect("static regex must compile")
}

/// An opaque fixed-length hexadecimal token naming one artifact instance
/// on a mirror family.
///
/// Usable both for bulk metadata lookup and for constructing a
/// download-gateway URL. Stored lowercased so the same artifact linked in
/// mixed case deduplicates to one identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ContentIdentifier(String);

impl ContentIdentifier {
    /// Parses a candidate token, normalizing to lowercase.
    ///
    /// Returns `None` unless the input is exactly [`IDENTIFIER_LEN`] hex
    /// characters.
    #[must_use]
    pub fn parse(token: &str) -> Option<Self> {
        if token.len() == IDENTIFIER_LEN && token.chars().all(|c| c.is_ascii_hexdigit()) {
            Some(Self(token.to_ascii_lowercase()))
        } else {
            None
        }
    }

    /// Returns the identifier as a lowercase hex string.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ContentIdentifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Extraction seam between mirror markup and the search walk.
///
/// Implementations must be pure (no I/O), tolerate malformed markup, and
/// return an empty list when nothing matches; an empty list is a valid
/// "no hits" outcome, never an error.
pub trait IdentifierExtractor: Send + Sync {
    /// Extracts unique identifiers from raw page content, preserving
    /// first-occurrence order.
    fn extract(&self, raw_text: &str) -> Vec<ContentIdentifier>;
}

/// Default extractor: scans for bare 32-hex tokens anywhere in the text.
#[derive(Debug, Default)]
pub struct HexTokenExtractor;

impl HexTokenExtractor {
    /// Creates the default extractor.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl IdentifierExtractor for HexTokenExtractor {
    fn extract(&self, raw_text: &str) -> Vec<ContentIdentifier> {
        let mut seen = std::collections::HashSet::new();
        let mut out = Vec::new();
        for m in HEX_TOKEN_RE.find_iter(raw_text) {
            if let Some(id) = ContentIdentifier::parse(m.as_str())
                && seen.insert(id.clone())
            {
                out.push(id);
            }
        }
        out
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    const ID_A: &str = "a1b2c3d4e5f6a7b8c9d0a1b2c3d4e5f6";
    const ID_B: &str = "00000000000000000000000000000abc";

    #[test]
    fn test_extract_dedupes_repeated_identifier() {
        let html = format!(
            "<a href='/file.php?md5={ID_A}'>x</a> <a href='/ads.php?md5={ID_A}'>y</a> {ID_A}"
        );
        let ids = HexTokenExtractor::new().extract(&html);
        assert_eq!(ids.len(), 1);
        assert_eq!(ids[0].as_str(), ID_A);
    }

    #[test]
    fn test_extract_preserves_first_occurrence_order() {
        let html = format!("{ID_B} then {ID_A} then {ID_B} again");
        let ids = HexTokenExtractor::new().extract(&html);
        assert_eq!(ids.len(), 2);
        assert_eq!(ids[0].as_str(), ID_B);
        assert_eq!(ids[1].as_str(), ID_A);
    }

    #[test]
    fn test_extract_no_match_returns_empty() {
        let ids = HexTokenExtractor::new().extract("<html><body>nothing here</body></html>");
        assert!(ids.is_empty());
    }

    #[test]
    fn test_extract_tolerates_malformed_markup() {
        let html = format!("<a href={ID_A} <<<<broken & unclosed");
        let ids = HexTokenExtractor::new().extract(&html);
        assert_eq!(ids.len(), 1);
    }

    #[test]
    fn test_extract_ignores_wrong_length_tokens() {
        // 31 and 40 hex chars must not match the fixed-length token shape.
        let html = "a1b2c3d4e5f6a7b8c9d0a1b2c3d4e5f 0123456789abcdef0123456789abcdef01234567";
        let ids = HexTokenExtractor::new().extract(html);
        assert!(ids.is_empty());
    }

    #[test]
    fn test_extract_normalizes_case() {
        let upper = ID_A.to_ascii_uppercase();
        let html = format!("{upper} and {ID_A}");
        let ids = HexTokenExtractor::new().extract(&html);
        assert_eq!(ids.len(), 1);
        assert_eq!(ids[0].as_str(), ID_A);
    }

    #[test]
    fn test_identifier_parse_rejects_non_hex() {
        assert!(ContentIdentifier::parse("zzzzzzzzzzzzzzzzzzzzzzzzzzzzzzzz").is_none());
        assert!(ContentIdentifier::parse(ID_A).is_some());
    }
}
