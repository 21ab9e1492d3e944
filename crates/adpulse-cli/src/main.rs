//! AdPulse CLI - Ad performance diagnostics
//!
//! Usage:
//!   adpulse                                  Run with the default query
//!   adpulse "Why did ROAS fall last week?"   Run with a custom query
//!   adpulse --config other.yaml -v           Alternate config, debug logging

mod cli;
mod commands;


use anyhow::Result;
use clap::Parser;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use cli::*;

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Priority: RUST_LOG env var > --verbose flag > default (info)
    let filter = if std::env::var("RUST_LOG").is_ok() {
        EnvFilter::from_default_env()
    } else if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(false).compact())
        .init();

    let query = cli.query.as_deref().unwrap_or(DEFAULT_QUERY);
    commands::cmd_run(&cli.config, query).map(|_| ())
}
