//! Bookfetch Core Library
//!
//! This library locates books across a set of unreliable, frequently-blocked
//! mirror sites and streams them into a locally organized library.
//!
//! # Architecture
//!
//! The library is organized into the following modules:
//! - [`mirror`] - Ordered registry of candidate catalog endpoints
//! - [`extract`] - Pattern-based identifier extraction from mirror pages
//! - [`metadata`] - Bulk metadata resolution and normalization
//! - [`search`] - Mirror-failover search orchestration
//! - [`gateway`] - Landing-page to direct-URL resolution
//! - [`acquire`] - Idempotent streaming acquisition into the library
//! - [`library`] - Text normalization and the on-disk library namespace
//! - [`health`] - Reachability diagnostics
//! - [`http`] - Shared HTTP client construction (discovery vs transfer)

// Clippy lints - strict for library code
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod acquire;
pub mod extract;
pub mod gateway;
pub mod health;
pub mod http;
pub mod library;
pub mod metadata;
pub mod mirror;
pub mod search;

// Re-export commonly used types
pub use acquire::{AcquireError, AcquireOutcome, AcquisitionEngine, AcquisitionRequest};
pub use extract::{ContentIdentifier, HexTokenExtractor, IdentifierExtractor};
pub use health::{HealthReport, ProbeStatus, health_report};
pub use http::{build_discovery_client, build_transfer_client};
pub use library::{
    LibraryEntry, LibraryError, clean_text, list_entries, rename_entry, resolve_relative,
};
pub use metadata::{ArtifactRecord, MetadataResolver, ResolutionFailure};
pub use mirror::{MirrorEndpoint, MirrorRegistry, build_default_mirror_registry};
pub use search::{
    SearchConfig, SearchError, SearchEvent, SearchObserver, SearchOrchestrator, TracingObserver,
};
