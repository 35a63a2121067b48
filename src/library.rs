//! Text normalization and the on-disk library namespace.
//!
//! The library is a directory tree rooted at a configured path: one
//! subdirectory per normalized author name, files named
//! `"{Title} ({Year}).{ext}"`. Files placed directly at the root are listed
//! under the reserved author name `"Unsorted"`.

use std::path::{Component, Path, PathBuf};

use serde::Serialize;
use thiserror::Error;

/// Author name used for files stored directly at the library root.
pub const UNSORTED_AUTHOR: &str = "Unsorted";

/// Errors from library namespace operations.
#[derive(Debug, Error)]
pub enum LibraryError {
    /// The relative path escapes the library root or contains unsafe components.
    #[error("path traversal rejected: {path}")]
    Traversal {
        /// The offending relative path.
        path: String,
    },

    /// The referenced entry does not exist.
    #[error("library entry not found: {path}")]
    NotFound {
        /// The relative path that was requested.
        path: String,
    },

    /// Filesystem error while walking or mutating the library.
    #[error("IO error at {path}: {source}")]
    Io {
        /// The path where the error occurred.
        path: PathBuf,
        /// The underlying IO error.
        #[source]
        source: std::io::Error,
    },
}

/// Normalizes free text for display and for filesystem use.
///
/// Collapses runs of whitespace, title-cases each word, and strips
/// filesystem-unsafe characters (`\ / * ? : " < > |`). Empty or
/// all-whitespace input normalizes to `"Unknown"`.
#[must_use]
pub fn clean_text(text: &str) -> String {
    let collapsed = text.split_whitespace().collect::<Vec<_>>().join(" ");
    if collapsed.is_empty() {
        return "Unknown".to_string();
    }

    let cased = collapsed
        .split(' ')
        .map(capitalize_word)
        .collect::<Vec<_>>()
        .join(" ");

    let safe: String = cased
        .chars()
        .filter(|c| !matches!(c, '\\' | '/' | '*' | '?' | ':' | '"' | '<' | '>' | '|'))
        .collect();

    if safe.trim().is_empty() {
        "Unknown".to_string()
    } else {
        safe.trim().to_string()
    }
}

fn capitalize_word(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => {
            first.to_uppercase().collect::<String>() + &chars.as_str().to_lowercase()
        }
        None => String::new(),
    }
}

/// One file in the library namespace.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LibraryEntry {
    /// Path relative to the library root, with forward slashes.
    pub filename: String,
    /// File stem, shown as the title.
    pub title: String,
    /// Containing directory name, or [`UNSORTED_AUTHOR`] at the root.
    pub author: String,
    /// File extension without the leading dot.
    pub extension: String,
}

/// Walks the library tree and returns all entries sorted by (author, title).
///
/// Dotfiles are skipped. A missing root yields an empty list rather than an
/// error, matching "empty library" semantics.
///
/// # Errors
///
/// Returns [`LibraryError::Io`] if a directory under the root cannot be read.
pub fn list_entries(root: &Path) -> Result<Vec<LibraryEntry>, LibraryError> {
    let mut entries = Vec::new();
    if root.is_dir() {
        collect_entries(root, root, &mut entries)?;
    }
    entries.sort_by(|a, b| {
        (a.author.as_str(), a.title.as_str()).cmp(&(b.author.as_str(), b.title.as_str()))
    });
    Ok(entries)
}

fn collect_entries(
    root: &Path,
    dir: &Path,
    out: &mut Vec<LibraryEntry>,
) -> Result<(), LibraryError> {
    let read_dir = std::fs::read_dir(dir).map_err(|source| LibraryError::Io {
        path: dir.to_path_buf(),
        source,
    })?;

    for entry in read_dir {
        let entry = entry.map_err(|source| LibraryError::Io {
            path: dir.to_path_buf(),
            source,
        })?;
        let path = entry.path();
        let name = entry.file_name().to_string_lossy().to_string();

        if name.starts_with('.') {
            continue;
        }

        if path.is_dir() {
            collect_entries(root, &path, out)?;
            continue;
        }

        let author = if dir == root {
            UNSORTED_AUTHOR.to_string()
        } else {
            dir.file_name()
                .map_or_else(|| UNSORTED_AUTHOR.to_string(), |n| n.to_string_lossy().to_string())
        };

        let title = path
            .file_stem()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_else(|| name.clone());
        let extension = path
            .extension()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_default();

        out.push(LibraryEntry {
            filename: relative_slash_path(root, &path),
            title,
            author,
            extension,
        });
    }

    Ok(())
}

fn relative_slash_path(root: &Path, path: &Path) -> String {
    let rel = path.strip_prefix(root).unwrap_or(path);
    rel.components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}

/// Resolves a relative path inside the library root for read-only retrieval.
///
/// Only plain path components are accepted: absolute paths, `..`, `.`, and
/// drive/root prefixes are all rejected so a caller-supplied path can never
/// escape the library namespace.
///
/// # Errors
///
/// Returns [`LibraryError::Traversal`] for unsafe paths and
/// [`LibraryError::NotFound`] when the entry does not exist.
pub fn resolve_relative(root: &Path, rel_path: &str) -> Result<PathBuf, LibraryError> {
    let candidate = Path::new(rel_path);
    let safe = candidate
        .components()
        .all(|c| matches!(c, Component::Normal(_)));
    if rel_path.is_empty() || !safe {
        return Err(LibraryError::Traversal {
            path: rel_path.to_string(),
        });
    }

    let full = root.join(candidate);
    if !full.is_file() {
        return Err(LibraryError::NotFound {
            path: rel_path.to_string(),
        });
    }
    Ok(full)
}

/// Renames a stored file to a new normalized title, keeping its extension
/// and directory. Returns the new relative path.
///
/// # Errors
///
/// Returns [`LibraryError::Traversal`] for unsafe paths,
/// [`LibraryError::NotFound`] when the entry does not exist, and
/// [`LibraryError::Io`] when the rename itself fails.
pub fn rename_entry(
    root: &Path,
    rel_path: &str,
    new_title: &str,
) -> Result<String, LibraryError> {
    let old_full = resolve_relative(root, rel_path)?;

    let extension = old_full
        .extension()
        .map(|e| format!(".{}", e.to_string_lossy()))
        .unwrap_or_default();
    let new_name = format!("{}{extension}", clean_text(new_title));

    let new_full = old_full
        .parent()
        .map_or_else(|| PathBuf::from(&new_name), |dir| dir.join(&new_name));

    std::fs::rename(&old_full, &new_full).map_err(|source| LibraryError::Io {
        path: new_full.clone(),
        source,
    })?;

    Ok(relative_slash_path(root, &new_full))
}
