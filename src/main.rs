//! keep-sweep - Consistent Enumeration of Arvados Collections
//!
//! Entry point for the CLI application.

use anyhow::{Context, Result};
use clap::Parser;
use keep_sweep::api::ArvadosClient;
use keep_sweep::config::{CliArgs, SweepConfig};
use keep_sweep::inventory::{sweep_to_inventory, InventoryOptions};
use keep_sweep::progress::{print_header, print_summary, ProgressReporter, SweepSummary};
use keep_sweep::sweep::CollectionWalker;
use std::process::ExitCode;
use std::sync::atomic::Ordering;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

fn main() -> ExitCode {
    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{:#}", e);
            eprintln!("Error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

fn run() -> Result<()> {
    let args = CliArgs::parse();

    setup_logging(args.verbose)?;

    let config = SweepConfig::from_args(args).context("Invalid configuration")?;
    let base_url = config.api_host.base_url();
    let output = config.output_path.display().to_string();

    if config.show_progress {
        print_header(&base_url, config.page_size, &output);
    }

    let client = ArvadosClient::builder(base_url.as_str(), config.api_token.as_str())
        .timeout(config.timeout)
        .insecure(config.insecure)
        .build()
        .context("Failed to create API client")?;

    if config.insecure {
        warn!("TLS certificate verification disabled");
    }

    let walker = CollectionWalker::new(client).with_page_size(config.page_size);

    // Setup signal handler for graceful shutdown
    let shutdown_flag = walker.shutdown_flag();
    ctrlc::set_handler(move || {
        eprintln!("\nInterrupt received, stopping after the current page...");
        shutdown_flag.store(true, Ordering::SeqCst);
    })
    .context("Failed to set signal handler")?;

    let progress = if config.show_progress {
        Some(ProgressReporter::new())
    } else {
        None
    };

    if let Some(ref p) = progress {
        p.set_status("Counting collections...");
    }

    let options = InventoryOptions {
        batch_size: config.batch_size,
        source_url: &base_url,
        page_size: config.page_size,
    };

    let result = sweep_to_inventory(&walker, &config.output_path, &options, |visited, expected| {
        if let Some(ref p) = progress {
            p.update(visited, expected);
            p.set_status("");
        }
    });

    let report = match result {
        Ok(report) => report,
        Err(e) => {
            if let Some(ref p) = progress {
                if e.is_cancelled() {
                    p.finish("Sweep interrupted");
                } else {
                    p.finish("Sweep failed");
                }
            }
            if e.is_data_integrity_failure() {
                error!("Inventory at {} is NOT complete and must not be acted on", output);
            }
            return Err(e).context("Sweep failed");
        }
    };

    if let Some(ref p) = progress {
        p.finish("Sweep verified");
    }

    info!(
        visited = report.stats.visited,
        verified = report.stats.verified,
        "Sweep completed"
    );

    if config.show_progress {
        let db_size = std::fs::metadata(&config.output_path).ok().map(|m| m.len());
        print_summary(
            &SweepSummary {
                visited: report.stats.visited,
                expected: report.stats.expected,
                verified: report.stats.verified,
                pages: report.stats.pages,
                blocks: report.totals.blocks,
                referenced_bytes: report.totals.referenced_bytes,
                duration: report.stats.duration,
            },
            &output,
            db_size,
        );
    }

    Ok(())
}

fn setup_logging(verbose: bool) -> Result<()> {
    let filter = if verbose {
        EnvFilter::new("keep_sweep=debug,warn")
    } else {
        EnvFilter::new("keep_sweep=info,warn")
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .init();

    Ok(())
}
