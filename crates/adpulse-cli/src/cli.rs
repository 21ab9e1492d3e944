//! CLI argument definitions using clap

use std::path::PathBuf;

use adpulse_core::DEFAULT_CONFIG_PATH;
use clap::Parser;

/// Query used when none is given on the command line
pub const DEFAULT_QUERY: &str = "Analyze ROAS drop in last 7 days";

/// AdPulse - Diagnose ad performance drops
#[derive(Parser)]
#[command(name = "adpulse")]
#[command(about = "Explain ROAS/CTR drops and suggest new creatives", long_about = None)]
#[command(version)]
pub struct Cli {
    /// Free-text analysis question, echoed into the report
    pub query: Option<String>,

    /// Pipeline configuration file (YAML)
    #[arg(short, long, default_value = DEFAULT_CONFIG_PATH)]
    pub config: PathBuf,

    /// Enable verbose logging
    #[arg(short, long)]
    pub verbose: bool,
}
