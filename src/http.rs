//! Shared HTTP client construction policy.
//!
//! Two client profiles exist by design: a short *discovery* profile for
//! search pages, metadata lookups, gateway pages, and health probes (mirrors
//! are unreliable; failing fast beats hanging), and a long *transfer*
//! profile for streaming full files. A timed-out discovery request is
//! treated the same as a failed one and is never retried with a longer
//! timeout.

use std::time::Duration;

use reqwest::Client;

/// Connect timeout shared by both profiles.
pub const CONNECT_TIMEOUT_SECS: u64 = 5;

/// Total request timeout for discovery requests (search, metadata, gateway,
/// health).
pub const DISCOVERY_TIMEOUT_SECS: u64 = 8;

/// Total request timeout for file transfers (5 minutes; large files
/// legitimately take longer than metadata lookups).
pub const TRANSFER_TIMEOUT_SECS: u64 = 300;

const USER_AGENT: &str = concat!("bookfetch/", env!("CARGO_PKG_VERSION"));

/// Builds the short-timeout client used for all discovery traffic.
///
/// # Errors
///
/// Returns [`reqwest::Error`] when client construction fails.
pub fn build_discovery_client() -> Result<Client, reqwest::Error> {
    build_client(DISCOVERY_TIMEOUT_SECS)
}

/// Builds the long-timeout client used for streaming file transfers.
///
/// # Errors
///
/// Returns [`reqwest::Error`] when client construction fails.
pub fn build_transfer_client() -> Result<Client, reqwest::Error> {
    build_client(TRANSFER_TIMEOUT_SECS)
}

fn build_client(timeout_secs: u64) -> Result<Client, reqwest::Error> {
    Client::builder()
        .user_agent(USER_AGENT)
        .connect_timeout(Duration::from_secs(CONNECT_TIMEOUT_SECS))
        .timeout(Duration::from_secs(timeout_secs))
        .gzip(true)
        .build()
}
