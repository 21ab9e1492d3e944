//! Advisory input schema validation
//!
//! The schema descriptor is a JSON document listing the columns the input
//! export is expected to carry:
//!
//! ```json
//! { "required_columns": ["date", "campaign_name", "spend", "roas"] }
//! ```
//!
//! Drift is reported as warning events and never stops the pipeline.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::error::Result;
use crate::events::{EventLevel, EventSink};

/// Parsed schema descriptor
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SchemaDescriptor {
    #[serde(default)]
    pub required_columns: Vec<String>,
}

impl SchemaDescriptor {
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&content)?)
    }

    /// Compare against the actual header
    pub fn check(&self, actual: &[String]) -> SchemaCheck {
        let missing = self
            .required_columns
            .iter()
            .filter(|c| !actual.contains(c))
            .cloned()
            .collect();
        let extra = actual
            .iter()
            .filter(|c| !self.required_columns.contains(c))
            .cloned()
            .collect();
        SchemaCheck { missing, extra }
    }
}

/// Outcome of comparing a header with the descriptor
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SchemaCheck {
    /// Required but absent, descriptor order
    pub missing: Vec<String>,
    /// Present but not required, header order
    pub extra: Vec<String>,
}

impl SchemaCheck {
    /// True when every required column is present (extras are allowed)
    pub fn is_valid(&self) -> bool {
        self.missing.is_empty()
    }
}

/// Validate `columns` against the descriptor at `schema_path`
///
/// Returns None when the descriptor could not be read; that condition is
/// reported as a `schema_file_missing` error event.
pub fn validate_columns(
    columns: &[String],
    schema_path: &Path,
    sink: &dyn EventSink,
    stage: &str,
) -> Option<SchemaCheck> {
    let schema = match SchemaDescriptor::load(schema_path) {
        Ok(schema) => schema,
        Err(e) => {
            sink.emit(
                stage,
                "schema_file_missing",
                EventLevel::Error,
                json!({ "path": schema_path.display().to_string(), "error": e.to_string() }),
            );
            return None;
        }
    };

    let check = schema.check(columns);

    if !check.missing.is_empty() {
        sink.emit(
            stage,
            "schema_missing_columns",
            EventLevel::Warning,
            json!({ "missing": check.missing }),
        );
    }

    if !check.extra.is_empty() {
        sink.emit(
            stage,
            "schema_extra_columns",
            EventLevel::Warning,
            json!({ "extra": check.extra }),
        );
    }

    Some(check)
}
