//! Bulk metadata resolution for extracted identifiers.
//!
//! One request against a mirror's bulk-lookup endpoint turns a batch of
//! identifiers into normalized [`ArtifactRecord`]s. The resolver never
//! retries internally; retry and fallback are the search orchestrator's
//! responsibility.

use reqwest::Client;
use serde::Deserialize;
use serde::Serialize;
use tracing::{debug, instrument};

use crate::extract::ContentIdentifier;
use crate::library::clean_text;

/// Extensions a record must carry to be returned at all.
pub const EXTENSION_ALLOW_LIST: [&str; 2] = ["pdf", "epub"];

/// Gateway landing-page template; `{id}` is replaced with the identifier.
pub const DEFAULT_GATEWAY_TEMPLATE: &str = "http://library.lol/main/{id}";

/// Field set requested from the bulk-lookup endpoint.
const METADATA_FIELDS: &str = "Title,Author,Year,Extension,Filesize,MD5";

/// A normalized search result, constructed per search call and returned to
/// the caller; never persisted by the core.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ArtifactRecord {
    /// Normalized title.
    pub title: String,
    /// Normalized author.
    pub author: String,
    /// Publication year as reported by the mirror (may be empty).
    pub year: String,
    /// Lowercased extension; always one of [`EXTENSION_ALLOW_LIST`].
    pub extension: String,
    /// Human-readable size as reported by the mirror.
    pub size: String,
    /// Gateway landing-page URL derived from the identifier.
    pub download_url: String,
}

/// Ways a single bulk-lookup request can fail. Each is handled differently
/// by the caller.
#[derive(Debug, thiserror::Error)]
pub enum ResolutionFailure {
    /// Transport or timeout failure before any response arrived.
    #[error("metadata endpoint unreachable: {endpoint}: {source}")]
    Unreachable {
        /// The endpoint that could not be reached.
        endpoint: String,
        /// The underlying transport error.
        #[source]
        source: reqwest::Error,
    },

    /// The endpoint answered with a non-success status.
    #[error("metadata endpoint {endpoint} returned HTTP {status}")]
    BadStatus {
        /// The endpoint that answered.
        endpoint: String,
        /// The HTTP status code.
        status: u16,
    },

    /// The endpoint answered 2xx but the body was not the expected
    /// structured format.
    #[error("metadata response from {endpoint} was not parseable")]
    MalformedResponse {
        /// The endpoint that answered.
        endpoint: String,
    },
}

/// Raw record shape as served by the bulk-lookup endpoint. Field casing
/// varies across mirror software versions, hence the aliases.
#[derive(Debug, Deserialize)]
struct RawRecord {
    #[serde(default, alias = "Title")]
    title: String,
    #[serde(default, alias = "Author")]
    author: String,
    #[serde(default, alias = "Year")]
    year: String,
    #[serde(default, alias = "Extension")]
    extension: String,
    #[serde(default, alias = "Filesize")]
    filesize: String,
    #[serde(default, alias = "MD5", alias = "Md5")]
    md5: String,
}

/// Builds a gateway landing-page URL for an identifier.
#[must_use]
pub fn gateway_url(template: &str, id: &ContentIdentifier) -> String {
    template.replace("{id}", id.as_str())
}

/// Resolves identifier batches against mirror bulk-lookup endpoints.
#[derive(Debug, Clone)]
pub struct MetadataResolver {
    client: Client,
    gateway_template: String,
}

impl MetadataResolver {
    /// Creates a resolver using the default gateway template.
    #[must_use]
    pub fn new(client: Client) -> Self {
        Self::with_gateway_template(client, DEFAULT_GATEWAY_TEMPLATE)
    }

    /// Creates a resolver with a custom gateway template (for tests).
    #[must_use]
    pub fn with_gateway_template(client: Client, gateway_template: impl Into<String>) -> Self {
        Self {
            client,
            gateway_template: gateway_template.into(),
        }
    }

    /// Returns the configured gateway template.
    #[must_use]
    pub fn gateway_template(&self) -> &str {
        &self.gateway_template
    }

    /// Performs one bulk-lookup request and returns normalized records.
    ///
    /// Records whose extension is outside the allow-list, or whose
    /// identifier field does not parse, are dropped rather than failing the
    /// batch; the returned list is always a subset of the requested batch.
    ///
    /// # Errors
    ///
    /// Returns [`ResolutionFailure::Unreachable`] on transport/timeout
    /// failure (including a timeout while reading the body),
    /// [`ResolutionFailure::BadStatus`] on a non-success status, and
    /// [`ResolutionFailure::MalformedResponse`] when the body is not the
    /// expected JSON array.
    #[instrument(skip(self, identifiers), fields(endpoint = %endpoint, batch = identifiers.len()))]
    pub async fn resolve(
        &self,
        endpoint: &str,
        identifiers: &[ContentIdentifier],
    ) -> Result<Vec<ArtifactRecord>, ResolutionFailure> {
        let ids = identifiers
            .iter()
            .map(ContentIdentifier::as_str)
            .collect::<Vec<_>>()
            .join(",");
        let url = format!("{}/json.php", endpoint.trim_end_matches('/'));

        let response = self
            .client
            .get(&url)
            .query(&[("ids", ids.as_str()), ("fields", METADATA_FIELDS)])
            .send()
            .await
            .map_err(|source| ResolutionFailure::Unreachable {
                endpoint: endpoint.to_string(),
                source,
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(ResolutionFailure::BadStatus {
                endpoint: endpoint.to_string(),
                status: status.as_u16(),
            });
        }

        let body = response.text().await.map_err(|source| {
            if source.is_timeout() {
                ResolutionFailure::Unreachable {
                    endpoint: endpoint.to_string(),
                    source,
                }
            } else {
                ResolutionFailure::MalformedResponse {
                    endpoint: endpoint.to_string(),
                }
            }
        })?;

        let raw: Vec<RawRecord> =
            serde_json::from_str(&body).map_err(|_| ResolutionFailure::MalformedResponse {
                endpoint: endpoint.to_string(),
            })?;

        let records = normalize_records(raw, &self.gateway_template);
        debug!(records = records.len(), "metadata batch resolved");
        Ok(records)
    }
}

/// Normalizes raw endpoint records: allow-list filter, text cleanup, and
/// gateway URL synthesis from the identifier.
fn normalize_records(raw: Vec<RawRecord>, gateway_template: &str) -> Vec<ArtifactRecord> {
    raw.into_iter()
        .filter_map(|record| {
            let extension = record.extension.to_lowercase();
            if !EXTENSION_ALLOW_LIST.contains(&extension.as_str()) {
                return None;
            }
            let id = ContentIdentifier::parse(&record.md5)?;
            Some(ArtifactRecord {
                title: clean_text(&record.title),
                author: clean_text(&record.author),
                year: record.year,
                extension,
                size: record.filesize,
                download_url: gateway_url(gateway_template, &id),
            })
        })
        .collect()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    const ID: &str = "a1b2c3d4e5f6a7b8c9d0a1b2c3d4e5f6";

    fn raw(extension: &str) -> RawRecord {
        RawRecord {
            title: "dune   messiah".to_string(),
            author: "frank herbert".to_string(),
            year: "1969".to_string(),
            extension: extension.to_string(),
            filesize: "1 MB".to_string(),
            md5: ID.to_string(),
        }
    }

    #[test]
    fn test_normalize_filters_disallowed_extensions() {
        let records = normalize_records(
            vec![raw("EPUB"), raw("mobi"), raw("pdf"), raw("djvu")],
            DEFAULT_GATEWAY_TEMPLATE,
        );
        assert_eq!(records.len(), 2);
        assert!(records.iter().all(|r| r.extension == "epub" || r.extension == "pdf"));
        assert!(records.iter().all(|r| r.extension != "mobi"));
    }

    #[test]
    fn test_normalize_cleans_title_and_author() {
        let records = normalize_records(vec![raw("epub")], DEFAULT_GATEWAY_TEMPLATE);
        assert_eq!(records[0].title, "Dune Messiah");
        assert_eq!(records[0].author, "Frank Herbert");
        assert_eq!(records[0].year, "1969");
    }

    #[test]
    fn test_normalize_synthesizes_gateway_url() {
        let records = normalize_records(vec![raw("pdf")], "http://gw.example/main/{id}");
        assert_eq!(records[0].download_url, format!("http://gw.example/main/{ID}"));
    }

    #[test]
    fn test_normalize_drops_records_with_bad_identifier() {
        let mut record = raw("pdf");
        record.md5 = "not-an-identifier".to_string();
        let records = normalize_records(vec![record], DEFAULT_GATEWAY_TEMPLATE);
        assert!(records.is_empty());
    }

    #[test]
    fn test_raw_record_accepts_capitalized_keys() {
        let body = format!(
            r#"[{{"Title":"t","Author":"a","Year":"2001","Extension":"pdf","Filesize":"2 MB","MD5":"{ID}"}}]"#
        );
        let raw: Vec<RawRecord> = serde_json::from_str(&body).unwrap();
        assert_eq!(raw[0].year, "2001");
        assert_eq!(raw[0].md5, ID);
    }

    // Serves headers plus one body byte, then stalls so the body read
    // times out after the response itself arrived intact.
    #[test]
    fn test_resolve_maps_body_read_timeout_to_unreachable() {
        tokio_test::block_on(async {
            use tokio::io::AsyncWriteExt;

            let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
            let addr = listener.local_addr().unwrap();
            tokio::spawn(async move {
                let (mut socket, _) = listener.accept().await.unwrap();
                socket
                    .write_all(b"HTTP/1.1 200 OK\r\ncontent-length: 4096\r\n\r\n[")
                    .await
                    .unwrap();
                tokio::time::sleep(std::time::Duration::from_secs(5)).await;
            });

            let client = Client::builder()
                .timeout(std::time::Duration::from_millis(300))
                .build()
                .unwrap();
            let resolver = MetadataResolver::new(client);
            let id = ContentIdentifier::parse(ID).unwrap();

            let failure = resolver
                .resolve(&format!("http://{addr}"), std::slice::from_ref(&id))
                .await
                .unwrap_err();
            assert!(matches!(failure, ResolutionFailure::Unreachable { .. }));
        });
    }

    #[test]
    fn test_gateway_url_substitutes_identifier() {
        let id = ContentIdentifier::parse(ID).unwrap();
        assert_eq!(
            gateway_url(DEFAULT_GATEWAY_TEMPLATE, &id),
            format!("http://library.lol/main/{ID}")
        );
    }
}
