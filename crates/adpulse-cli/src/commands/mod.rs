//! CLI command implementations
//!
//! - `run` - Load config and execute the analysis pipeline

pub mod run;

// Re-export command functions for main.rs
pub use run::*;
