//! The analysis run command

use std::path::Path;

use adpulse_core::{run_pipeline, PipelineConfig, PipelineOutput};
use anyhow::{Context, Result};

pub fn cmd_run(config_path: &Path, query: &str) -> Result<PipelineOutput> {
    println!("📊 Running analysis: {}", query);

    let config = PipelineConfig::load(config_path)
        .with_context(|| format!("Failed to load config from {}", config_path.display()))?;

    let output = run_pipeline(query, &config).context("Pipeline failed")?;

    println!(
        "   {} hypotheses, {} creative recommendations",
        output.hypotheses.len(),
        output.recommendations.len()
    );
    println!("✅ Pipeline completed.");
    println!("Report: {}", output.paths.report.display());
    println!("Insights JSON: {}", output.paths.insights.display());
    println!("Creatives JSON: {}", output.paths.creatives.display());
    if let Some(metrics) = &output.paths.metrics {
        println!("Metrics JSON: {}", metrics.display());
    }

    Ok(output)
}
