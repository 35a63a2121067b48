//! CLI entry point for the bookfetch tool.

use anyhow::Result;
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use std::time::Duration;
use tracing::{debug, info};

use bookfetch_core::{
    AcquisitionEngine, AcquisitionRequest, MirrorEndpoint, MirrorRegistry, SearchOrchestrator,
    build_default_mirror_registry, build_discovery_client, build_transfer_client, health_report,
    list_entries, rename_entry, resolve_relative,
};

mod cli;

use cli::{Args, Command};

#[tokio::main]
async fn main() -> Result<()> {
    // Parse CLI arguments first (before tracing, so --help works without logs)
    let args = Args::parse();

    // Determine log level based on verbose/quiet flags
    // Priority: RUST_LOG env var > quiet flag > verbose flag > default (warn)
    let default_level = if args.quiet {
        "error"
    } else {
        match args.verbose {
            0 => "warn",
            1 => "debug",
            _ => "trace",
        }
    };

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level));

    tracing_subscriber::fmt().with_env_filter(filter).init();

    debug!(?args, "CLI arguments parsed");

    let registry = if args.mirrors.is_empty() {
        build_default_mirror_registry()
    } else {
        MirrorRegistry::from_endpoints(
            args.mirrors.iter().map(MirrorEndpoint::new).collect(),
        )
    };

    match args.command {
        Command::Search { query } => {
            let client = build_discovery_client()?;
            let orchestrator = SearchOrchestrator::new(client, registry);
            let records = orchestrator.search(&query).await?;
            if records.is_empty() {
                info!("no results");
            }
            println!("{}", serde_json::to_string_pretty(&records)?);
        }
        Command::Get {
            url,
            author,
            title,
            year,
            extension,
        } => {
            let engine = AcquisitionEngine::new(
                build_discovery_client()?,
                build_transfer_client()?,
                args.library_root,
            );
            let request = AcquisitionRequest {
                source_url: url,
                author,
                title,
                year,
                extension,
            };

            let spinner = ProgressBar::new_spinner();
            spinner.set_style(ProgressStyle::with_template("{spinner} {msg}")?);
            spinner.set_message(format!(
                "acquiring {}",
                AcquisitionEngine::relative_path_for(&request)
            ));
            spinner.enable_steady_tick(Duration::from_millis(120));

            let outcome = engine.acquire(&request).await;
            spinner.finish_and_clear();

            match outcome? {
                bookfetch_core::AcquireOutcome::Acquired { relative_path } => {
                    println!("acquired: {relative_path}");
                }
                bookfetch_core::AcquireOutcome::AlreadyExists { relative_path } => {
                    println!("already exists: {relative_path}");
                }
            }
        }
        Command::List => {
            let entries = list_entries(&args.library_root)?;
            println!("{}", serde_json::to_string_pretty(&entries)?);
        }
        Command::Path { path } => {
            let full = resolve_relative(&args.library_root, &path)?;
            println!("{}", full.display());
        }
        Command::Rename { path, new_title } => {
            let new_rel = rename_entry(&args.library_root, &path, &new_title)?;
            println!("renamed: {new_rel}");
        }
        Command::Health => {
            let client = build_discovery_client()?;
            let report = health_report(
                &client,
                &registry,
                bookfetch_core::health::DEFAULT_INTERNET_PROBE_URL,
            )
            .await;
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
    }

    Ok(())
}
