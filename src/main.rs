//! vibes-search MCP Server & CLI (Rust)
//!
//! Dual-mode application:
//! - MCP Server Mode (default): Model Context Protocol server using stdio
//! - CLI Mode: Command-line utility for direct tool execution
//!
//! Tools:
//! - `search(query, ...)` - Ranked, typo-tolerant search over vibes, users, tags and reviews
//! - `suggest(query)` - Per-kind suggestions, or recent and trending searches
//! - `trending(limit)` - Most frequent searches
//! - `track_search`, `track_click`, `track_error` - Search analytics

mod analytics;
mod cli;
mod config;
mod error;
mod mcp;
mod search;
mod store;
mod tools;

#[cfg(test)]
mod test_support;

use anyhow::Result;
use clap::Parser;
use cli::{Cli, Commands};
use config::AppConfig;
use error::AppError;
use mcp::ToolResult;
use std::future::Future;
use std::path::Path;
use std::sync::Arc;
use tokio::time::{timeout, Duration};
use tools::{ToolContext, TOOL_TIMEOUT_SECS};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    // Detect mode: CLI if args present, MCP server otherwise
    let args: Vec<String> = std::env::args().collect();

    if args.len() > 1 {
        // CLI mode - parse arguments and execute
        run_cli_mode().await
    } else {
        // MCP server mode - default behavior
        run_mcp_mode().await
    }
}

/// Run in CLI mode
async fn run_cli_mode() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging based on verbosity flags
    let log_level = if cli.quiet {
        "error"
    } else if cli.verbose {
        "debug"
    } else {
        "info"
    };

    tracing_subscriber::fmt()
        .with_env_filter(log_level)
        .with_writer(std::io::stderr) // Log to stderr to keep stdout clean
        .init();

    let Cli {
        command,
        config: config_path,
        store,
        user,
        ..
    } = cli;
    let Some(command) = command else {
        eprintln!("Error: No command specified. Use --help for usage information.");
        std::process::exit(1);
    };

    let result = async move {
        let config = load_app_config(config_path.as_deref())?;
        let ctx = ToolContext::open(&config, store, user)?;
        run_command(command, &ctx).await
    }
    .await;

    // Handle result and exit with appropriate code
    match result {
        Ok(output) => {
            println!("{}", output);
            Ok(())
        }
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(get_exit_code(&e));
        }
    }
}

/// Load the configuration file, reporting failures as configuration errors
fn load_app_config(path: Option<&Path>) -> Result<AppConfig, AppError> {
    config::load_config(path).map_err(|e| AppError::ConfigError(format!("{:#}", e)))
}

/// Execute one command, then persist its analytics whether or not it
/// succeeded
async fn run_command(command: Commands, ctx: &ToolContext) -> Result<String> {
    let result = execute_command(command, ctx).await;
    ctx.flush().await?;
    result
}

async fn execute_command(command: Commands, ctx: &ToolContext) -> Result<String> {
    match command {
        Commands::Search(args) => with_timeout(tools::search::execute_search(args, ctx)).await,
        Commands::Suggest(args) => with_timeout(tools::search::execute_suggest(args, ctx)).await,
        Commands::Trending(args) => {
            with_timeout(tools::analytics::execute_trending(args, ctx)).await
        }
        Commands::TrackSearch(args) => {
            with_timeout(tools::analytics::execute_track_search(args, ctx)).await
        }
        Commands::TrackClick(args) => {
            with_timeout(tools::analytics::execute_track_click(args, ctx)).await
        }
        Commands::TrackError(args) => {
            with_timeout(tools::analytics::execute_track_error(args, ctx)).await
        }
    }
}

/// Run a tool under the tool timeout and extract its text
async fn with_timeout<F>(tool: F) -> Result<String>
where
    F: Future<Output = Result<ToolResult, AppError>>,
{
    match timeout(Duration::from_secs(TOOL_TIMEOUT_SECS), tool).await {
        Ok(Ok(tool_result)) => Ok(tool_result.first_text()),
        Ok(Err(e)) => Err(e.into()),
        Err(_) => Err(anyhow::anyhow!("Request exceeded 120 second timeout")),
    }
}

/// Map an error to the process exit code
fn get_exit_code(err: &anyhow::Error) -> i32 {
    if let Some(app_err) = err.downcast_ref::<AppError>() {
        return match app_err {
            AppError::InvalidInput(_) => 1,
            AppError::CandidateFetchFailed { .. } | AppError::StoreError(_) => 2,
            AppError::NotFound(_) => 3,
            AppError::Unauthenticated(_) => 6,
            AppError::ConfigError(_) | AppError::Internal(_) => 5,
        };
    }

    let err_str = err.to_string().to_lowercase();
    if err_str.contains("timeout") {
        4
    } else if err_str.contains("config") {
        5
    } else {
        2
    }
}

/// Run in MCP server mode
async fn run_mcp_mode() -> Result<()> {
    // Log to stderr; stdout carries the protocol
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    info!("Starting vibes-search MCP Server");

    let config = load_app_config(None)?;
    let user = std::env::var("VIBES_USER").ok();
    let ctx = Arc::new(ToolContext::open(&config, None, user)?);

    // Handle stdio MCP communication
    mcp::handle_stdio(ctx).await?;

    Ok(())
}
