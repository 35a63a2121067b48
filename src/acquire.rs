//! Acquisition engine: streams a resolved file URL into the library
//! namespace, idempotently.
//!
//! The target path is computed deterministically from (author, title, year,
//! extension) before any network call. An existing file at that path short
//! circuits the whole operation with zero network requests; that check is
//! the system's only duplicate-prevention mechanism (no content hashing).
//! The body streams into a `.part` sibling and is renamed into place only
//! after a successful flush, so a truncated artifact is never visible at
//! the final path.

use std::path::{Path, PathBuf};

use dashmap::DashSet;
use futures_util::StreamExt;
use reqwest::Client;
use tokio::io::{AsyncWriteExt, BufWriter};
use tracing::{debug, info, instrument, warn};

use crate::gateway::resolve_gateway;
use crate::library::clean_text;

/// One acquisition attempt. Consumed once; its lifecycle ends when the
/// local file exists or the attempt fails.
#[derive(Debug, Clone)]
pub struct AcquisitionRequest {
    /// Landing-page or direct file URL.
    pub source_url: String,
    /// Raw author text; normalized before path construction.
    pub author: String,
    /// Raw title text; normalized before path construction.
    pub title: String,
    /// Publication year as text (may be empty).
    pub year: String,
    /// File extension; lowercased, defaults to `pdf` when empty.
    pub extension: String,
}

/// Successful acquisition outcomes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AcquireOutcome {
    /// The file was transferred and now exists at the given relative path.
    Acquired {
        /// Path relative to the library root.
        relative_path: String,
    },
    /// A file already existed at the computed path; no network request was
    /// made.
    AlreadyExists {
        /// Path relative to the library root.
        relative_path: String,
    },
}

impl AcquireOutcome {
    /// Returns the relative library path of either outcome.
    #[must_use]
    pub fn relative_path(&self) -> &str {
        match self {
            Self::Acquired { relative_path } | Self::AlreadyExists { relative_path } => {
                relative_path
            }
        }
    }
}

/// Errors from an acquisition attempt. No automatic retry is performed.
#[derive(Debug, thiserror::Error)]
pub enum AcquireError {
    /// The request carried no source URL.
    #[error("no source URL provided")]
    MissingUrl,

    /// Transport-level transfer failure (connection reset, timeout, TLS).
    #[error("transfer failed for {url}: {source}")]
    Transfer {
        /// The URL being transferred.
        url: String,
        /// The underlying transport error.
        #[source]
        source: reqwest::Error,
    },

    /// The file server answered with a non-success status; nothing was
    /// written.
    #[error("HTTP {status} transferring {url}")]
    TransferStatus {
        /// The URL being transferred.
        url: String,
        /// The HTTP status code.
        status: u16,
    },

    /// Filesystem error while creating directories or writing the file.
    #[error("IO error writing {path}: {source}")]
    Io {
        /// The path where the error occurred.
        path: PathBuf,
        /// The underlying IO error.
        #[source]
        source: std::io::Error,
    },

    /// Another in-flight acquisition already owns the computed target path.
    #[error("another acquisition is already writing {path}")]
    DestinationBusy {
        /// The contested relative path.
        path: String,
    },
}

/// Streams resolved file URLs into the library namespace.
///
/// The engine is the sole writer to the library namespace. Concurrent
/// acquisitions targeting distinct paths proceed independently; two callers
/// racing on the same computed path are serialized by an in-flight set, the
/// loser failing fast with [`AcquireError::DestinationBusy`].
pub struct AcquisitionEngine {
    discovery_client: Client,
    transfer_client: Client,
    library_root: PathBuf,
    in_flight: DashSet<PathBuf>,
}

impl AcquisitionEngine {
    /// Creates an engine writing under `library_root`.
    ///
    /// `discovery_client` (short timeout) is used for gateway-page
    /// resolution; `transfer_client` (long timeout) for the file transfer
    /// itself.
    #[must_use]
    pub fn new(discovery_client: Client, transfer_client: Client, library_root: PathBuf) -> Self {
        Self {
            discovery_client,
            transfer_client,
            library_root,
            in_flight: DashSet::new(),
        }
    }

    /// Returns the configured library root.
    #[must_use]
    pub fn library_root(&self) -> &Path {
        &self.library_root
    }

    /// Computes the deterministic relative path for a request:
    /// `{Author}/{Title} ({Year}).{ext}`.
    #[must_use]
    pub fn relative_path_for(request: &AcquisitionRequest) -> String {
        let author = clean_text(&request.author);
        let title = clean_text(&request.title);
        let extension = normalize_extension(&request.extension);
        format!("{author}/{title} ({}).{extension}", request.year.trim())
    }

    /// Acquires one file.
    ///
    /// Resolves the gateway landing page, then streams the direct URL to
    /// the computed library path. Idempotent: an existing target reports
    /// [`AcquireOutcome::AlreadyExists`] without any network traffic.
    ///
    /// # Errors
    ///
    /// Returns [`AcquireError::MissingUrl`] for an empty source URL,
    /// [`AcquireError::DestinationBusy`] when another call is writing the
    /// same path, and transfer/IO variants for failed transfers. A failed
    /// transfer never leaves a file (partial or otherwise) at the final
    /// path.
    #[instrument(skip(self, request), fields(url = %request.source_url))]
    pub async fn acquire(
        &self,
        request: &AcquisitionRequest,
    ) -> Result<AcquireOutcome, AcquireError> {
        if request.source_url.trim().is_empty() {
            return Err(AcquireError::MissingUrl);
        }

        let relative_path = Self::relative_path_for(request);
        let target = self.library_root.join(&relative_path);

        if target.is_file() {
            debug!(path = %relative_path, "target already exists; skipping transfer");
            return Ok(AcquireOutcome::AlreadyExists { relative_path });
        }

        if !self.in_flight.insert(target.clone()) {
            return Err(AcquireError::DestinationBusy {
                path: relative_path,
            });
        }
        let _in_flight = InFlightGuard {
            set: &self.in_flight,
            path: target.clone(),
        };

        if let Some(dir) = target.parent() {
            tokio::fs::create_dir_all(dir)
                .await
                .map_err(|source| AcquireError::Io {
                    path: dir.to_path_buf(),
                    source,
                })?;
        }

        let direct_url = resolve_gateway(&self.discovery_client, request.source_url.trim()).await;

        info!(direct_url = %direct_url, path = %relative_path, "starting transfer");
        self.transfer(&direct_url, &target).await?;

        info!(path = %relative_path, "acquisition complete");
        Ok(AcquireOutcome::Acquired { relative_path })
    }

    /// Streams `url` to `target` via a `.part` sibling.
    async fn transfer(&self, url: &str, target: &Path) -> Result<(), AcquireError> {
        let response = self
            .transfer_client
            .get(url)
            .send()
            .await
            .map_err(|source| AcquireError::Transfer {
                url: url.to_string(),
                source,
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(AcquireError::TransferStatus {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        let part_path = part_path_for(target);
        let file = tokio::fs::File::create(&part_path)
            .await
            .map_err(|source| AcquireError::Io {
                path: part_path.clone(),
                source,
            })?;
        // Removes the .part file on every exit path except a completed
        // rename, including cancellation by drop.
        let mut part_guard = PartFileGuard {
            path: part_path.clone(),
            armed: true,
        };

        let mut writer = BufWriter::new(file);
        let mut stream = response.bytes_stream();
        let mut bytes_written: u64 = 0;

        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(|source| AcquireError::Transfer {
                url: url.to_string(),
                source,
            })?;
            writer
                .write_all(&chunk)
                .await
                .map_err(|source| AcquireError::Io {
                    path: part_path.clone(),
                    source,
                })?;
            bytes_written += chunk.len() as u64;
        }

        writer.flush().await.map_err(|source| AcquireError::Io {
            path: part_path.clone(),
            source,
        })?;

        tokio::fs::rename(&part_path, target)
            .await
            .map_err(|source| AcquireError::Io {
                path: target.to_path_buf(),
                source,
            })?;
        part_guard.armed = false;

        debug!(bytes = bytes_written, "transfer flushed and renamed");
        Ok(())
    }
}

impl std::fmt::Debug for AcquisitionEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AcquisitionEngine")
            .field("library_root", &self.library_root)
            .field("in_flight", &self.in_flight.len())
            .finish_non_exhaustive()
    }
}

fn normalize_extension(extension: &str) -> String {
    let ext = extension.trim().trim_start_matches('.').to_lowercase();
    if ext.is_empty() { "pdf".to_string() } else { ext }
}

fn part_path_for(target: &Path) -> PathBuf {
    let mut name = target.as_os_str().to_os_string();
    name.push(".part");
    PathBuf::from(name)
}

/// Releases the in-flight slot for a target path on drop.
struct InFlightGuard<'a> {
    set: &'a DashSet<PathBuf>,
    path: PathBuf,
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.set.remove(&self.path);
    }
}

/// Best-effort removal of an abandoned `.part` file.
struct PartFileGuard {
    path: PathBuf,
    armed: bool,
}

impl Drop for PartFileGuard {
    fn drop(&mut self) {
        if self.armed && let Err(error) = std::fs::remove_file(&self.path) {
            if error.kind() != std::io::ErrorKind::NotFound {
                warn!(path = %self.path.display(), error = %error, "failed to remove part file");
            }
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::http::{build_discovery_client, build_transfer_client};
    use tempfile::TempDir;

    fn request() -> AcquisitionRequest {
        AcquisitionRequest {
            source_url: "http://gw.example/main/abc".to_string(),
            author: "frank herbert".to_string(),
            title: "dune messiah".to_string(),
            year: "1969".to_string(),
            extension: "EPUB".to_string(),
        }
    }

    fn engine(root: &Path) -> AcquisitionEngine {
        AcquisitionEngine::new(
            build_discovery_client().unwrap(),
            build_transfer_client().unwrap(),
            root.to_path_buf(),
        )
    }

    #[test]
    fn test_relative_path_is_deterministic_and_normalized() {
        let rel = AcquisitionEngine::relative_path_for(&request());
        assert_eq!(rel, "Frank Herbert/Dune Messiah (1969).epub");
    }

    #[test]
    fn test_relative_path_defaults_extension_to_pdf() {
        let mut req = request();
        req.extension = String::new();
        assert!(AcquisitionEngine::relative_path_for(&req).ends_with(".pdf"));
    }

    #[tokio::test]
    async fn test_acquire_rejects_missing_url() {
        let root = TempDir::new().unwrap();
        let mut req = request();
        req.source_url = "  ".to_string();
        assert!(matches!(
            engine(root.path()).acquire(&req).await,
            Err(AcquireError::MissingUrl)
        ));
    }

    #[tokio::test]
    async fn test_acquire_existing_file_short_circuits() {
        let root = TempDir::new().unwrap();
        let req = request();
        let rel = AcquisitionEngine::relative_path_for(&req);
        let full = root.path().join(&rel);
        std::fs::create_dir_all(full.parent().unwrap()).unwrap();
        std::fs::write(&full, b"existing").unwrap();

        // source_url points nowhere routable; success proves no network call.
        let outcome = engine(root.path()).acquire(&req).await.unwrap();
        assert_eq!(outcome, AcquireOutcome::AlreadyExists { relative_path: rel });
    }

    #[tokio::test]
    async fn test_acquire_busy_destination_fails_fast() {
        let root = TempDir::new().unwrap();
        let engine = engine(root.path());
        let req = request();
        let target = root
            .path()
            .join(AcquisitionEngine::relative_path_for(&req));
        engine.in_flight.insert(target);

        assert!(matches!(
            engine.acquire(&req).await,
            Err(AcquireError::DestinationBusy { .. })
        ));
    }

    #[test]
    fn test_part_path_sits_beside_target() {
        let part = part_path_for(Path::new("/lib/A/B (1).pdf"));
        assert_eq!(part, PathBuf::from("/lib/A/B (1).pdf.part"));
    }
}
