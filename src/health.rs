//! Health/diagnostic surface: independent reachability probes.
//!
//! Purely observational; results have no effect on search or acquisition
//! behavior.

use reqwest::Client;
use serde::Serialize;
use tracing::{debug, instrument};

use crate::mirror::MirrorRegistry;

/// Endpoint probed to distinguish "mirrors are down" from "we are offline".
pub const DEFAULT_INTERNET_PROBE_URL: &str = "https://www.google.com";

/// Classification of a single probe.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProbeStatus {
    /// The endpoint answered 2xx.
    Ok,
    /// The endpoint answered with a non-success status.
    BadStatus(u16),
    /// Transport or timeout failure; nothing answered.
    Unreachable,
}

impl std::fmt::Display for ProbeStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Ok => f.write_str("ok"),
            Self::BadStatus(code) => write!(f, "HTTP {code}"),
            Self::Unreachable => f.write_str("unreachable"),
        }
    }
}

// Serializes as the display string, so JSON reports read the same as logs.
impl Serialize for ProbeStatus {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// One probed endpoint and its classification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProbeResult {
    /// The probed URL.
    pub url: String,
    /// The classification.
    pub status: ProbeStatus,
}

/// Reachability report for the general internet and every configured mirror.
#[derive(Debug, Clone, Serialize)]
pub struct HealthReport {
    /// General-internet probe.
    pub internet: ProbeResult,
    /// Per-mirror probes, in registry order.
    pub mirrors: Vec<ProbeResult>,
}

/// Probes the general-internet endpoint and each mirror independently.
///
/// Every probe uses the short discovery timeout; a slow endpoint classifies
/// as unreachable rather than holding up the report.
#[instrument(skip(client, registry), fields(mirrors = registry.len()))]
pub async fn health_report(
    client: &Client,
    registry: &MirrorRegistry,
    internet_probe_url: &str,
) -> HealthReport {
    let internet = probe(client, internet_probe_url).await;

    let mut mirrors = Vec::with_capacity(registry.len());
    for mirror in registry.mirrors() {
        mirrors.push(probe(client, &mirror.base_url).await);
    }

    HealthReport { internet, mirrors }
}

async fn probe(client: &Client, url: &str) -> ProbeResult {
    let status = match client.get(url).send().await {
        Ok(response) if response.status().is_success() => ProbeStatus::Ok,
        Ok(response) => ProbeStatus::BadStatus(response.status().as_u16()),
        Err(_) => ProbeStatus::Unreachable,
    };
    debug!(url = %url, status = %status, "probe complete");
    ProbeResult {
        url: url.to_string(),
        status,
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::http::build_discovery_client;
    use crate::mirror::MirrorEndpoint;
    use wiremock::matchers::method;
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[test]
    fn test_probe_status_display() {
        assert_eq!(ProbeStatus::Ok.to_string(), "ok");
        assert_eq!(ProbeStatus::BadStatus(503).to_string(), "HTTP 503");
        assert_eq!(ProbeStatus::Unreachable.to_string(), "unreachable");
    }

    #[test]
    fn test_probe_classifies_success_as_ok() {
        tokio_test::block_on(async {
            let server = MockServer::start().await;
            Mock::given(method("GET"))
                .respond_with(ResponseTemplate::new(200))
                .mount(&server)
                .await;

            let client = build_discovery_client().unwrap();
            let result = probe(&client, &server.uri()).await;
            assert_eq!(result.status, ProbeStatus::Ok);
            assert_eq!(result.url, server.uri());
        });
    }

    #[test]
    fn test_probe_classifies_non_success_status() {
        tokio_test::block_on(async {
            let server = MockServer::start().await;
            Mock::given(method("GET"))
                .respond_with(ResponseTemplate::new(503))
                .mount(&server)
                .await;

            let client = build_discovery_client().unwrap();
            let result = probe(&client, &server.uri()).await;
            assert_eq!(result.status, ProbeStatus::BadStatus(503));
        });
    }

    #[test]
    fn test_probe_classifies_closed_port_as_unreachable() {
        tokio_test::block_on(async {
            let client = build_discovery_client().unwrap();
            let result = probe(&client, "http://127.0.0.1:1").await;
            assert_eq!(result.status, ProbeStatus::Unreachable);
        });
    }

    #[test]
    fn test_health_report_probes_each_mirror_independently() {
        tokio_test::block_on(async {
            let up = MockServer::start().await;
            Mock::given(method("GET"))
                .respond_with(ResponseTemplate::new(200))
                .mount(&up)
                .await;

            let mut registry = MirrorRegistry::new();
            registry.register(MirrorEndpoint::new(up.uri()));
            registry.register(MirrorEndpoint::new("http://127.0.0.1:1"));

            let client = build_discovery_client().unwrap();
            let report = health_report(&client, &registry, &up.uri()).await;

            assert_eq!(report.internet.status, ProbeStatus::Ok);
            assert_eq!(report.mirrors.len(), 2);
            assert_eq!(report.mirrors[0].status, ProbeStatus::Ok);
            assert_eq!(report.mirrors[1].status, ProbeStatus::Unreachable);
        });
    }

    #[test]
    fn test_report_serializes_statuses_as_display_strings() {
        let report = HealthReport {
            internet: ProbeResult {
                url: "https://probe.example".to_string(),
                status: ProbeStatus::Ok,
            },
            mirrors: vec![ProbeResult {
                url: "https://mirror.example".to_string(),
                status: ProbeStatus::BadStatus(503),
            }],
        };
        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["internet"]["status"], "ok");
        assert_eq!(json["mirrors"][0]["status"], "HTTP 503");
    }
}
