//! Report artifacts: JSON documents and the Markdown summary

use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::Path;

use serde::Serialize;
use serde_json::Value;

use crate::error::Result;
use crate::models::{CreativeRecommendation, Hypothesis};

/// Recommendations shown in the Markdown report
pub const REPORT_SAMPLE_SIZE: usize = 5;

/// Pretty-print `value` to `path`, replacing any existing file
pub fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let json = serde_json::to_string_pretty(value)?;
    fs::write(path, json)?;
    Ok(())
}

/// Render the human-readable analysis report into `writer`
pub fn render_markdown<W: Write>(
    writer: &mut W,
    query: &str,
    hypotheses: &[Hypothesis],
    recommendations: &[CreativeRecommendation],
) -> Result<()> {
    writeln!(writer, "# Facebook ROAS Analysis\n")?;
    writeln!(writer, "## Query\n\n`{}`\n", query)?;

    writeln!(writer, "## Key Hypotheses\n")?;
    for h in hypotheses {
        let evidence = Value::Object(h.evidence.clone());
        writeln!(writer, "### {}", h.title)?;
        writeln!(writer, "- Confidence: {:.2}", h.confidence)?;
        writeln!(writer, "- Hypothesis: {}", h.hypothesis)?;
        writeln!(writer, "- Evidence: {}\n", evidence)?;
    }

    writeln!(writer, "## Creative Recommendations (sample)\n")?;
    for rec in recommendations.iter().take(REPORT_SAMPLE_SIZE) {
        writeln!(
            writer,
            "- **Campaign**: {} | Audience: {}",
            rec.campaign_name, rec.audience_type
        )?;
        writeln!(writer, "  - Original: {}", rec.original_message)?;
        writeln!(writer, "  - Headlines: {}", json_list(&rec.suggested_headlines))?;
        writeln!(writer, "  - CTAs: {}\n", json_list(&rec.suggested_ctas))?;
    }

    Ok(())
}

fn json_list(items: &[String]) -> Value {
    Value::from(items.to_vec())
}

/// Render the report to `path`, replacing any existing file
pub fn write_markdown(
    path: &Path,
    query: &str,
    hypotheses: &[Hypothesis],
    recommendations: &[CreativeRecommendation],
) -> Result<()> {
    let mut writer = BufWriter::new(File::create(path)?);
    render_markdown(&mut writer, query, hypotheses, recommendations)?;
    writer.flush()?;
    Ok(())
}
