//! Search orchestration: the ordered, fault-tolerant walk over the mirror
//! registry.
//!
//! The walk is strictly sequential and first-success-wins: once a mirror
//! yields any usable output, later (possibly better) mirrors are never
//! consulted. Transport failures, bad statuses, and empty pages all fall
//! through to the next mirror; a mirror with identifiers but a failing
//! metadata API degrades into placeholder records instead of abandoning
//! the identifiers, because the gateway URL needs only the identifier.

use reqwest::Client;
use tracing::{debug, info, instrument, warn};

use crate::extract::{ContentIdentifier, HexTokenExtractor, IdentifierExtractor};
use crate::metadata::{
    ArtifactRecord, DEFAULT_GATEWAY_TEMPLATE, MetadataResolver, gateway_url,
};
use crate::mirror::{MirrorEndpoint, MirrorRegistry};

/// Default cap on identifiers forwarded to one metadata batch.
pub const DEFAULT_MAX_IDENTIFIERS: usize = 15;

/// Tunables for one orchestrator instance.
#[derive(Debug, Clone)]
pub struct SearchConfig {
    /// At most this many identifiers, in extraction order, go to metadata
    /// lookup per mirror.
    pub max_identifiers: usize,
    /// Sentinel title used for degraded-mode placeholder records.
    pub placeholder_title: String,
    /// Sentinel author used for degraded-mode placeholder records.
    pub placeholder_author: String,
    /// Gateway landing-page template (`{id}` placeholder).
    pub gateway_template: String,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            max_identifiers: DEFAULT_MAX_IDENTIFIERS,
            placeholder_title: "Unknown Title".to_string(),
            placeholder_author: "Unknown Author".to_string(),
            gateway_template: DEFAULT_GATEWAY_TEMPLATE.to_string(),
        }
    }
}

/// State transitions of the mirror walk, reported to the observer hook.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SearchEvent {
    /// A mirror is about to be tried.
    MirrorAttempted {
        /// The mirror's base URL.
        base_url: String,
    },
    /// The mirror was unusable (transport failure or non-success status).
    MirrorFailed {
        /// The mirror's base URL.
        base_url: String,
        /// Short human-readable reason.
        reason: String,
    },
    /// The mirror answered but produced no usable identifiers or records.
    MirrorEmpty {
        /// The mirror's base URL.
        base_url: String,
    },
    /// Metadata lookup failed; placeholder records were constructed from
    /// the raw identifiers instead.
    DegradedMode {
        /// The mirror's base URL.
        base_url: String,
        /// Number of placeholder records constructed.
        records: usize,
    },
    /// The walk stopped at this mirror with usable output.
    MirrorSucceeded {
        /// The mirror's base URL.
        base_url: String,
        /// Number of records returned.
        records: usize,
    },
    /// Every mirror was exhausted with zero usable output.
    Exhausted {
        /// Number of mirrors tried.
        mirrors_tried: usize,
    },
}

/// Observability seam invoked at each state transition of the walk.
///
/// Decoupled from console output; the default implementation forwards to
/// `tracing`.
pub trait SearchObserver: Send + Sync {
    /// Called once per state transition.
    fn on_event(&self, event: &SearchEvent);
}

/// Default observer: structured log records via `tracing`.
#[derive(Debug, Default)]
pub struct TracingObserver;

impl SearchObserver for TracingObserver {
    fn on_event(&self, event: &SearchEvent) {
        match event {
            SearchEvent::MirrorAttempted { base_url } => {
                debug!(mirror = %base_url, "trying mirror");
            }
            SearchEvent::MirrorFailed { base_url, reason } => {
                warn!(mirror = %base_url, reason = %reason, "mirror failed, trying next");
            }
            SearchEvent::MirrorEmpty { base_url } => {
                debug!(mirror = %base_url, "mirror yielded nothing, trying next");
            }
            SearchEvent::DegradedMode { base_url, records } => {
                warn!(
                    mirror = %base_url,
                    records,
                    "metadata lookup failed; returning placeholder records"
                );
            }
            SearchEvent::MirrorSucceeded { base_url, records } => {
                info!(mirror = %base_url, records, "mirror search succeeded");
            }
            SearchEvent::Exhausted { mirrors_tried } => {
                info!(mirrors_tried, "all mirrors exhausted with no results");
            }
        }
    }
}

/// Errors surfaced by a search call.
///
/// An exhausted walk with zero results is *not* an error; it returns an
/// empty, successfully-formed result list. Only invalid input and total
/// transport failure surface here.
#[derive(Debug, thiserror::Error)]
pub enum SearchError {
    /// The query was empty after trimming.
    #[error("empty search query")]
    EmptyQuery,

    /// Every registered mirror failed at the transport level; nothing ever
    /// answered, which callers may want to surface differently from "no
    /// results".
    #[error("all {mirrors} mirror(s) unreachable")]
    AllMirrorsUnreachable {
        /// Number of mirrors that were tried.
        mirrors: usize,
    },
}

/// Drives the ordered mirror walk, composing identifier extraction and
/// metadata resolution per mirror.
pub struct SearchOrchestrator {
    client: Client,
    registry: MirrorRegistry,
    extractor: Box<dyn IdentifierExtractor>,
    metadata: MetadataResolver,
    config: SearchConfig,
    observer: Box<dyn SearchObserver>,
}

impl SearchOrchestrator {
    /// Creates an orchestrator over `registry` with default extractor,
    /// observer, and configuration.
    ///
    /// `client` must be a short-timeout discovery client; see
    /// [`crate::http::build_discovery_client`].
    #[must_use]
    pub fn new(client: Client, registry: MirrorRegistry) -> Self {
        let config = SearchConfig::default();
        let metadata =
            MetadataResolver::with_gateway_template(client.clone(), config.gateway_template.clone());
        Self {
            client,
            registry,
            extractor: Box::new(HexTokenExtractor::new()),
            metadata,
            config,
            observer: Box::new(TracingObserver),
        }
    }

    /// Replaces the configuration (also re-binds the gateway template used
    /// for metadata and degraded-mode URLs).
    #[must_use]
    pub fn with_config(mut self, config: SearchConfig) -> Self {
        self.metadata = MetadataResolver::with_gateway_template(
            self.client.clone(),
            config.gateway_template.clone(),
        );
        self.config = config;
        self
    }

    /// Replaces the identifier extractor (per mirror-family pattern swap).
    #[must_use]
    pub fn with_extractor(mut self, extractor: Box<dyn IdentifierExtractor>) -> Self {
        self.extractor = extractor;
        self
    }

    /// Replaces the observer hook.
    #[must_use]
    pub fn with_observer(mut self, observer: Box<dyn SearchObserver>) -> Self {
        self.observer = observer;
        self
    }

    /// Walks the registry in priority order and returns the first mirror's
    /// usable output.
    ///
    /// Returns `Ok` with an empty list when every mirror was exhausted
    /// without usable output but at least one answered ("nothing found" is
    /// a normal outcome).
    ///
    /// # Errors
    ///
    /// Returns [`SearchError::EmptyQuery`] for an empty query and
    /// [`SearchError::AllMirrorsUnreachable`] when no mirror answered at
    /// the transport level.
    #[instrument(skip(self), fields(mirrors = self.registry.len()))]
    pub async fn search(&self, query: &str) -> Result<Vec<ArtifactRecord>, SearchError> {
        let query = query.trim();
        if query.is_empty() {
            return Err(SearchError::EmptyQuery);
        }

        let mut reachable = 0_usize;

        for mirror in self.registry.mirrors() {
            self.observer.on_event(&SearchEvent::MirrorAttempted {
                base_url: mirror.base_url.clone(),
            });

            let Some(body) = self.fetch_search_page(mirror, query, &mut reachable).await
            else {
                continue;
            };

            let mut identifiers = self.extractor.extract(&body);
            if identifiers.is_empty() {
                // A silently-broken mirror and a genuine "no hits" page are
                // indistinguishable here; both fall through identically.
                self.observer.on_event(&SearchEvent::MirrorEmpty {
                    base_url: mirror.base_url.clone(),
                });
                continue;
            }
            identifiers.truncate(self.config.max_identifiers);

            match self
                .metadata
                .resolve(mirror.metadata_endpoint(), &identifiers)
                .await
            {
                Ok(records) if !records.is_empty() => {
                    self.observer.on_event(&SearchEvent::MirrorSucceeded {
                        base_url: mirror.base_url.clone(),
                        records: records.len(),
                    });
                    return Ok(records);
                }
                Ok(_) => {
                    self.observer.on_event(&SearchEvent::MirrorEmpty {
                        base_url: mirror.base_url.clone(),
                    });
                }
                Err(failure) => {
                    debug!(error = %failure, "metadata lookup failed; engaging degraded mode");
                    let records = self.placeholder_records(&identifiers);
                    self.observer.on_event(&SearchEvent::DegradedMode {
                        base_url: mirror.base_url.clone(),
                        records: records.len(),
                    });
                    return Ok(records);
                }
            }
        }

        self.observer.on_event(&SearchEvent::Exhausted {
            mirrors_tried: self.registry.len(),
        });

        if reachable == 0 && !self.registry.is_empty() {
            return Err(SearchError::AllMirrorsUnreachable {
                mirrors: self.registry.len(),
            });
        }
        Ok(Vec::new())
    }

    /// Fetches one mirror's search page. Returns `None` (and emits the
    /// matching event) on transport failure or non-success status;
    /// increments `reachable` whenever the mirror answered at all.
    async fn fetch_search_page(
        &self,
        mirror: &MirrorEndpoint,
        query: &str,
        reachable: &mut usize,
    ) -> Option<String> {
        let url = format!("{}/search.php", mirror.base_url);
        let response = match self
            .client
            .get(&url)
            .query(&[("req", query), ("res", "25"), ("column", "def")])
            .send()
            .await
        {
            Ok(response) => response,
            Err(error) => {
                self.observer.on_event(&SearchEvent::MirrorFailed {
                    base_url: mirror.base_url.clone(),
                    reason: format!("transport error: {error}"),
                });
                return None;
            }
        };

        *reachable += 1;

        let status = response.status();
        if !status.is_success() {
            self.observer.on_event(&SearchEvent::MirrorFailed {
                base_url: mirror.base_url.clone(),
                reason: format!("HTTP {}", status.as_u16()),
            });
            return None;
        }

        match response.text().await {
            Ok(body) => Some(body),
            Err(error) => {
                self.observer.on_event(&SearchEvent::MirrorFailed {
                    base_url: mirror.base_url.clone(),
                    reason: format!("body read failed: {error}"),
                });
                None
            }
        }
    }

    /// Builds minimal placeholder records from raw identifiers. The gateway
    /// URL requires only the identifier, so these stay acquisition-capable.
    fn placeholder_records(&self, identifiers: &[ContentIdentifier]) -> Vec<ArtifactRecord> {
        identifiers
            .iter()
            .map(|id| ArtifactRecord {
                title: self.config.placeholder_title.clone(),
                author: self.config.placeholder_author.clone(),
                year: String::new(),
                extension: "pdf".to_string(),
                size: String::new(),
                download_url: gateway_url(&self.config.gateway_template, id),
            })
            .collect()
    }
}

impl std::fmt::Debug for SearchOrchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SearchOrchestrator")
            .field("mirrors", &self.registry.len())
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}
