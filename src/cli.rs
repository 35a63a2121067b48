//! CLI argument definitions using clap derive macros.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// Locate books across unreliable mirrors and stream them into an organized
/// library.
#[derive(Parser, Debug)]
#[command(name = "bookfetch")]
#[command(author, version, about)]
pub struct Args {
    /// Increase output verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Library root directory
    #[arg(long, default_value = "./library", global = true)]
    pub library_root: PathBuf,

    /// Mirror base URL, repeatable; overrides the default registry.
    /// Priority follows argument order.
    #[arg(long = "mirror", global = true)]
    pub mirrors: Vec<String>,

    #[command(subcommand)]
    pub command: Command,
}

/// Available operations.
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Search the mirrors for a free-text query
    Search {
        /// Free-text query
        query: String,
    },
    /// Acquire a file into the library
    Get {
        /// Landing-page or direct file URL (a search result's download_url)
        url: String,

        /// Author name for the library path
        #[arg(long, default_value = "Unknown Author")]
        author: String,

        /// Title for the library filename
        #[arg(long, default_value = "Unknown Title")]
        title: String,

        /// Publication year for the library filename
        #[arg(long, default_value = "")]
        year: String,

        /// File extension
        #[arg(long, default_value = "pdf")]
        extension: String,
    },
    /// List everything in the library, grouped by author
    List,
    /// Print the absolute path of a stored file, given its library-relative path
    Path {
        /// Path relative to the library root, e.g. "Author/Title (Year).epub"
        path: String,
    },
    /// Rename a stored file to a new title, keeping author and extension
    Rename {
        /// Path relative to the library root
        path: String,
        /// New title (normalized before use)
        new_title: String,
    },
    /// Probe the internet and each mirror for reachability
    Health,
}
