//! Mirror registry: the ordered list of candidate catalog endpoints.
//!
//! Registry order is the sole priority signal. There is no scoring,
//! relevance ranking, or merging of partial results across mirrors; the
//! search walk stops at the first mirror that yields any usable output.

/// One candidate catalog endpoint with its capability flags.
///
/// Immutable once constructed; configured at process start.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MirrorEndpoint {
    /// Base URL of the mirror, without a trailing slash.
    pub base_url: String,
    /// Whether this mirror's bulk metadata API is usable. Some mirrors serve
    /// good search pages but a broken or incompatible metadata API.
    pub supports_bulk_metadata: bool,
    /// Known-good endpoint to route metadata lookups to when
    /// `supports_bulk_metadata` is false.
    pub metadata_override_endpoint: Option<String>,
}

impl MirrorEndpoint {
    /// Creates a mirror whose own bulk metadata API is usable.
    #[must_use]
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: trim_trailing_slash(base_url.into()),
            supports_bulk_metadata: true,
            metadata_override_endpoint: None,
        }
    }

    /// Creates a mirror whose metadata lookups are routed to `override_endpoint`.
    #[must_use]
    pub fn with_metadata_override(
        base_url: impl Into<String>,
        override_endpoint: impl Into<String>,
    ) -> Self {
        Self {
            base_url: trim_trailing_slash(base_url.into()),
            supports_bulk_metadata: false,
            metadata_override_endpoint: Some(trim_trailing_slash(override_endpoint.into())),
        }
    }

    /// Returns the endpoint metadata lookups for this mirror should target.
    #[must_use]
    pub fn metadata_endpoint(&self) -> &str {
        if self.supports_bulk_metadata {
            &self.base_url
        } else {
            self.metadata_override_endpoint
                .as_deref()
                .unwrap_or(&self.base_url)
        }
    }
}

fn trim_trailing_slash(url: String) -> String {
    url.trim_end_matches('/').to_string()
}

/// A priority-ordered, immutable list of mirrors.
///
/// Lower index means tried first. Built explicitly and passed to the search
/// orchestrator, which enables deterministic testing with synthetic mirror
/// sets.
#[derive(Debug, Clone, Default)]
pub struct MirrorRegistry {
    mirrors: Vec<MirrorEndpoint>,
}

impl MirrorRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self {
            mirrors: Vec::new(),
        }
    }

    /// Creates a registry from an explicit priority-ordered list.
    #[must_use]
    pub fn from_endpoints(mirrors: Vec<MirrorEndpoint>) -> Self {
        Self { mirrors }
    }

    /// Appends a mirror at the lowest remaining priority.
    pub fn register(&mut self, mirror: MirrorEndpoint) {
        tracing::debug!(
            base_url = %mirror.base_url,
            supports_bulk_metadata = mirror.supports_bulk_metadata,
            "registering mirror"
        );
        self.mirrors.push(mirror);
    }

    /// Returns the mirrors in priority order.
    #[must_use]
    pub fn mirrors(&self) -> &[MirrorEndpoint] {
        &self.mirrors
    }

    /// Returns the number of registered mirrors.
    #[must_use]
    pub fn len(&self) -> usize {
        self.mirrors.len()
    }

    /// Returns true if no mirrors are registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.mirrors.is_empty()
    }
}

/// Builds the default mirror registry used by CLI execution flows.
///
/// Order is deterministic: the `.is` mirror first, then `.rs`, then `.st`.
/// The `.st` mirror serves usable search pages but its bulk metadata API is
/// incompatible, so its lookups route to the `.is` endpoint.
#[must_use]
pub fn build_default_mirror_registry() -> MirrorRegistry {
    let mut registry = MirrorRegistry::new();
    registry.register(MirrorEndpoint::new("https://libgen.is"));
    registry.register(MirrorEndpoint::new("https://libgen.rs"));
    registry.register(MirrorEndpoint::with_metadata_override(
        "https://libgen.st",
        "https://libgen.is",
    ));
    registry
}
