//! Gerrit MCP Server
//!
//! # Usage
//!
//! ```bash
//! gerrit-mcp [--config <path>] [--log-file <path>] [--request-timeout <secs>]
//! ```
//!
//! # Environment Variables
//!
//! - `GERRIT_CONFIG_PATH`: host registry location when `--config` is absent
//! - `GERRIT_BASE_URL`: server to use when a call names none
//! - `RUST_LOG`: Control log verbosity (default: `gerrit_mcp=info`)
//!
//! # Protocol
//!
//! The server communicates via JSON-RPC 2.0 over stdio:
//! - Requests/responses go through stdout
//! - Logs go to stderr (to avoid interfering with the protocol)
//! - Raw request/response traces go to the diagnostic log file

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use gerrit_core::log::DEFAULT_LOG_FILE;
use gerrit_core::{CommandExecutor, ConfigLocation, CurlAuthProvider, DiagnosticLog};
use gerrit_mcp::{Context, GerritMcpServer};

/// MCP server for Gerrit code review
#[derive(Parser)]
#[command(name = "gerrit-mcp")]
#[command(about = "MCP server for Gerrit code review")]
#[command(version)]
struct Args {
    /// Path to gerrit_config.json (overrides GERRIT_CONFIG_PATH)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Append-only diagnostic log of every request
    #[arg(long, default_value = DEFAULT_LOG_FILE)]
    log_file: PathBuf,

    /// Kill requests that take longer than this many seconds
    #[arg(long, value_name = "SECS", value_parser = clap::value_parser!(u64).range(1..))]
    request_timeout: Option<u64>,

    /// Program used to reach Gerrit
    #[arg(long, default_value = "curl", hide = true)]
    curl: String,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging to stderr (stdout is reserved for MCP protocol)
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("gerrit_mcp=info".parse()?)
                .add_directive("gerrit_core=warn".parse()?),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    let location = ConfigLocation::new(args.config);
    let log = Arc::new(DiagnosticLog::new(args.log_file));
    let executor = CommandExecutor::new(
        location.clone(),
        Arc::new(CurlAuthProvider::with_program(args.curl)),
        Arc::clone(&log),
    )
    .with_timeout(args.request_timeout.map(Duration::from_secs));

    tracing::info!(
        config = ?location.resolve(),
        log_file = ?log.path(),
        timeout = ?args.request_timeout,
        "Starting gerrit-mcp server"
    );

    let context = Context::new(location, Arc::new(executor), log);
    GerritMcpServer::new(context).run().await?;

    Ok(())
}
