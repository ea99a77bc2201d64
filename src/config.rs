//! Configuration types for keep-sweep
//!
//! This module defines:
//! - CLI argument parsing using clap derive macros
//! - Runtime configuration with validation
//! - API host parsing

use crate::error::ConfigError;
use clap::Parser;
use regex::Regex;
use std::path::PathBuf;
use std::sync::LazyLock;
use std::time::Duration;

/// Largest explicit page size accepted
pub const MAX_PAGE_SIZE: u64 = 1_000_000;

/// Inventory commit size limits
const MIN_BATCH_SIZE: usize = 1;
const MAX_BATCH_SIZE: usize = 100_000;

/// Regex for parsing API hosts
static API_HOST_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    // Matches: host, host:port, https://host[:port], http://host[:port], optional trailing slash
    Regex::new(r"^(?:(https?)://)?([A-Za-z0-9.\-]+|\[[0-9A-Fa-f:]+\])(?::(\d+))?/?$")
        .expect("Invalid API host regex")
});

/// Enumerate every collection on an Arvados cluster into a SQLite inventory
#[derive(Parser, Debug, Clone)]
#[command(
    name = "keep-sweep",
    version,
    about = "Consistent full enumeration of Arvados collections",
    long_about = "Pages through every collection (including trashed collections and past \
                  versions) in modified_at order while other clients keep writing, records \
                  each collection and its block locators in a SQLite inventory, and verifies \
                  afterwards that nothing was missed.\n\n\
                  A sweep that fails verification is marked 'failed' in the inventory and \
                  must not be used to decide which blocks are garbage.",
    after_help = "EXAMPLES:\n    \
        keep-sweep --api-host zzzzz.arvadosapi.com -o sweep.db\n    \
        ARVADOS_API_HOST=zzzzz.arvadosapi.com ARVADOS_API_TOKEN=... keep-sweep -v\n    \
        keep-sweep --api-host localhost:8000 --insecure --page-size 500"
)]
pub struct CliArgs {
    /// API server (host, host:port, or https://host[:port])
    #[arg(long, env = "ARVADOS_API_HOST", value_name = "HOST")]
    pub api_host: Option<String>,

    /// API token
    #[arg(long, env = "ARVADOS_API_TOKEN", hide_env_values = true, value_name = "TOKEN")]
    pub api_token: Option<String>,

    /// Accept invalid TLS certificates
    #[arg(
        long,
        env = "ARVADOS_API_HOST_INSECURE",
        value_parser = clap::builder::FalseyValueParser::new()
    )]
    pub insecure: bool,

    /// Output inventory database
    #[arg(short, long, default_value = "sweep.db", value_name = "FILE")]
    pub output: PathBuf,

    /// Collections per page (0 = server maximum)
    #[arg(long, default_value = "0", value_name = "NUM")]
    pub page_size: u64,

    /// HTTP request timeout in seconds
    #[arg(long, default_value = "300", value_name = "SECS")]
    pub timeout: u64,

    /// Inventory rows per transaction
    #[arg(short = 'b', long, default_value = "1000", value_name = "NUM")]
    pub batch_size: usize,

    /// Quiet mode - suppress progress output
    #[arg(short = 'q', long)]
    pub quiet: bool,

    /// Verbose output (per-page debug logging)
    #[arg(short = 'v', long)]
    pub verbose: bool,
}

/// Parsed API host
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiHost {
    /// `https` unless given explicitly
    pub scheme: String,

    /// Hostname or IP
    pub host: String,

    /// Optional port
    pub port: Option<u16>,
}

impl ApiHost {
    /// Parse an API host string
    ///
    /// Accepts formats:
    /// - zzzzz.arvadosapi.com
    /// - localhost:8000
    /// - https://zzzzz.arvadosapi.com
    /// - http://127.0.0.1:8000/
    pub fn parse(input: &str) -> Result<Self, ConfigError> {
        let input = input.trim();
        let invalid = |reason: &str| ConfigError::InvalidApiHost {
            host: input.to_string(),
            reason: reason.to_string(),
        };

        if input.is_empty() {
            return Err(invalid("Empty host"));
        }

        let caps = API_HOST_REGEX
            .captures(input)
            .ok_or_else(|| invalid("Expected format: host[:port] or https://host[:port]"))?;

        let scheme = caps
            .get(1)
            .map_or("https", |m| m.as_str())
            .to_string();

        let host = caps
            .get(2)
            .ok_or_else(|| invalid("Missing host"))?
            .as_str()
            .to_string();

        let port = match caps.get(3) {
            Some(m) => Some(
                m.as_str()
                    .parse::<u16>()
                    .map_err(|_| invalid("Port out of range"))?,
            ),
            None => None,
        };

        Ok(Self { scheme, host, port })
    }

    /// Base URL for API requests, with trailing slash
    pub fn base_url(&self) -> String {
        match self.port {
            Some(p) => format!("{}://{}:{}/", self.scheme, self.host, p),
            None => format!("{}://{}/", self.scheme, self.host),
        }
    }
}

/// Validated runtime configuration
#[derive(Debug, Clone)]
pub struct SweepConfig {
    /// API server
    pub api_host: ApiHost,

    /// API token
    pub api_token: String,

    /// Accept invalid certificates
    pub insecure: bool,

    /// Inventory database path
    pub output_path: PathBuf,

    /// Page size (0 = server maximum)
    pub page_size: u64,

    /// HTTP request timeout
    pub timeout: Duration,

    /// Inventory rows per transaction
    pub batch_size: usize,

    /// Show progress indicator
    pub show_progress: bool,

    /// Verbose logging
    pub verbose: bool,
}

impl SweepConfig {
    /// Create and validate configuration from CLI arguments
    pub fn from_args(args: CliArgs) -> Result<Self, ConfigError> {
        let host = args
            .api_host
            .as_deref()
            .filter(|h| !h.trim().is_empty())
            .ok_or(ConfigError::MissingApiHost)?;
        let api_host = ApiHost::parse(host)?;

        let api_token = args
            .api_token
            .filter(|t| !t.trim().is_empty())
            .ok_or(ConfigError::MissingToken)?;

        if args.page_size > MAX_PAGE_SIZE {
            return Err(ConfigError::InvalidPageSize {
                size: args.page_size,
                max: MAX_PAGE_SIZE,
            });
        }

        if args.timeout == 0 {
            return Err(ConfigError::InvalidTimeout);
        }

        if args.batch_size < MIN_BATCH_SIZE || args.batch_size > MAX_BATCH_SIZE {
            return Err(ConfigError::InvalidBatchSize {
                size: args.batch_size,
                min: MIN_BATCH_SIZE,
                max: MAX_BATCH_SIZE,
            });
        }

        // Validate output path
        if let Some(parent) = args.output.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                return Err(ConfigError::InvalidOutputPath {
                    path: args.output.clone(),
                    reason: format!("Parent directory '{}' does not exist", parent.display()),
                });
            }
        }
        if args.output.is_dir() {
            return Err(ConfigError::InvalidOutputPath {
                path: args.output.clone(),
                reason: "Path is a directory".to_string(),
            });
        }

        Ok(Self {
            api_host,
            api_token: api_token.trim().to_string(),
            insecure: args.insecure,
            output_path: args.output,
            page_size: args.page_size,
            timeout: Duration::from_secs(args.timeout),
            batch_size: args.batch_size,
            show_progress: !args.quiet,
            verbose: args.verbose,
        })
    }
}
