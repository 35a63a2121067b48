//! Gateway landing-page resolution.
//!
//! A gateway page is not the file; it contains a link to the actual file.
//! In the overwhelming common case the genuine download anchor is the first
//! absolute link in document order, so that is what wins here. The result
//! is a heuristic, not a guarantee; the transfer step validates it by
//! checking the response status before any bytes are persisted.

use std::sync::LazyLock;

use regex::Regex;
use reqwest::Client;
use tracing::{debug, instrument, warn};
use url::Url;

use crate::extract::compile_static_regex;

static ABSOLUTE_HREF_RE: LazyLock<Regex> =
    LazyLock::new(|| compile_static_regex(r#"(?is)href\s*=\s*["'](https?://[^"']+)["']"#));

/// Scans landing-page markup for the first scheme-qualified anchor target.
///
/// Relative links are skipped, as are href values that do not parse as a
/// URL. Returns `None` when no absolute link exists.
#[must_use]
pub fn first_absolute_link(html: &str) -> Option<String> {
    ABSOLUTE_HREF_RE
        .captures_iter(html)
        .filter_map(|caps| caps.get(1).map(|m| m.as_str()))
        .find(|candidate| Url::parse(candidate).is_ok())
        .map(ToString::to_string)
}

/// Resolves an indirect landing-page URL into a direct file URL.
///
/// Fetches the page with the short discovery timeout and returns the first
/// absolute link. When the page is unreachable, answers badly, or contains
/// no absolute link, the original URL is returned unchanged; genuine
/// failure is deferred to the transfer step rather than failing early.
#[instrument(skip(client))]
pub async fn resolve_gateway(client: &Client, landing_page_url: &str) -> String {
    let response = match client.get(landing_page_url).send().await {
        Ok(response) => response,
        Err(error) => {
            warn!(error = %error, "gateway page unreachable; deferring to transfer");
            return landing_page_url.to_string();
        }
    };

    if !response.status().is_success() {
        warn!(
            status = response.status().as_u16(),
            "gateway page returned non-success; deferring to transfer"
        );
        return landing_page_url.to_string();
    }

    let Ok(html) = response.text().await else {
        return landing_page_url.to_string();
    };

    match first_absolute_link(&html) {
        Some(direct) => {
            debug!(direct = %direct, "gateway resolved");
            direct
        }
        None => {
            debug!("no absolute link on gateway page; using landing URL");
            landing_page_url.to_string()
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_first_absolute_link_skips_relative_anchors() {
        let html = r#"<a href="/relative">x</a><a href="http://files.example/book.pdf">y</a>"#;
        assert_eq!(
            first_absolute_link(html).unwrap(),
            "http://files.example/book.pdf"
        );
    }

    #[test]
    fn test_first_absolute_link_takes_document_order() {
        let html = concat!(
            r#"<a href="https://first.example/a.epub">a</a>"#,
            r#"<a href="https://second.example/b.epub">b</a>"#,
        );
        assert_eq!(
            first_absolute_link(html).unwrap(),
            "https://first.example/a.epub"
        );
    }

    #[test]
    fn test_first_absolute_link_none_without_absolute_anchor() {
        assert!(first_absolute_link(r#"<a href="/only/relative">x</a>"#).is_none());
        assert!(first_absolute_link("no anchors at all").is_none());
    }

    #[test]
    fn test_first_absolute_link_tolerates_single_quotes_and_case() {
        let html = "<A HREF='HTTPS://Files.Example/Book.PDF'>y</A>";
        assert_eq!(
            first_absolute_link(html).unwrap(),
            "HTTPS://Files.Example/Book.PDF"
        );
    }
}
