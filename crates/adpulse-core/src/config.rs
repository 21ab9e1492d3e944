//! Pipeline configuration
//!
//! Config is read from a YAML document (by default `config/config.yaml`).
//! Parsing is two-layer: the document is deserialized into an all-optional
//! raw structure, and every value present is applied over
//! [`PipelineConfig::default()`]. Unknown keys are ignored.
//!
//! ```yaml
//! paths:
//!   sample_csv: data/sample_fb_ads.csv
//!   data_csv_env: DATA_CSV
//!   reports_dir: reports
//! use_sample_data: true
//! metrics:
//!   low_ctr_threshold: 0.01
//!   low_roas_threshold: 1.2
//!   window_days: 7
//! ```

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use crate::error::{Error, Result};
use crate::retry::RetryPolicy;

/// Default location of the config document, relative to the working directory
pub const DEFAULT_CONFIG_PATH: &str = "config/config.yaml";

/// File system locations used by the pipeline
#[derive(Debug, Clone, PartialEq)]
pub struct PathsConfig {
    /// Bundled sample dataset, used when `use_sample_data` is set
    pub sample_csv: PathBuf,
    /// Name of the environment variable holding the real dataset path
    pub data_csv_env: String,
    /// Directory that receives insights.json, creatives.json, report.md
    pub reports_dir: PathBuf,
    /// Schema descriptor listing `required_columns`
    pub schema_json: PathBuf,
    /// Append-only JSON-lines event log
    pub trace_log: PathBuf,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            sample_csv: PathBuf::from("data/sample_fb_ads.csv"),
            data_csv_env: "DATA_CSV".to_string(),
            reports_dir: PathBuf::from("reports"),
            schema_json: PathBuf::from("schema/input_schema.json"),
            trace_log: PathBuf::from("logs/traces.jsonl"),
        }
    }
}

/// Thresholds and window sizes for the analysis stages
#[derive(Debug, Clone, PartialEq)]
pub struct MetricsConfig {
    /// Rows with ctr strictly below this are creative candidates
    pub low_ctr_threshold: f64,
    /// Campaigns with roas strictly below this count as low-ROAS spend
    pub low_roas_threshold: f64,
    /// Length of the recent and previous comparison windows
    pub window_days: usize,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            low_ctr_threshold: 0.01,
            low_roas_threshold: 1.2,
            window_days: 7,
        }
    }
}

/// Full pipeline configuration
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineConfig {
    pub paths: PathsConfig,
    /// Read `paths.sample_csv` instead of the env-var-named dataset
    pub use_sample_data: bool,
    pub metrics: MetricsConfig,
    /// Retry policy for loading the input file
    pub retry: RetryPolicy,
    /// Whether to persist metrics.json next to the other artifacts
    pub write_metrics: bool,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            paths: PathsConfig::default(),
            use_sample_data: true,
            metrics: MetricsConfig::default(),
            retry: RetryPolicy::default(),
            write_metrics: true,
        }
    }
}

impl PipelineConfig {
    /// Load configuration from a YAML file
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|e| {
            Error::Config(format!("Failed to read config {}: {}", path.display(), e))
        })?;
        Self::from_yaml(&content)
    }

    /// Parse configuration from YAML content
    pub fn from_yaml(content: &str) -> Result<Self> {
        let mut config = Self::default();
        if content.trim().is_empty() {
            return Ok(config);
        }

        let raw: Option<RawConfig> = serde_yaml::from_str(content)
            .map_err(|e| Error::Config(format!("Invalid config YAML: {}", e)))?;

        // A document holding only `~` deserializes to None
        if let Some(raw) = raw {
            raw.apply(&mut config);
        }

        Ok(config)
    }
}

/// Raw config structure for YAML parsing
#[derive(Debug, Deserialize)]
struct RawConfig {
    paths: Option<RawPaths>,
    use_sample_data: Option<bool>,
    metrics: Option<RawMetrics>,
    retry: Option<RawRetry>,
    write_metrics: Option<bool>,
}

#[derive(Debug, Deserialize)]
struct RawPaths {
    sample_csv: Option<PathBuf>,
    data_csv_env: Option<String>,
    reports_dir: Option<PathBuf>,
    schema_json: Option<PathBuf>,
    trace_log: Option<PathBuf>,
}

#[derive(Debug, Deserialize)]
struct RawMetrics {
    low_ctr_threshold: Option<f64>,
    low_roas_threshold: Option<f64>,
    window_days: Option<usize>,
}

#[derive(Debug, Deserialize)]
struct RawRetry {
    max_attempts: Option<u32>,
    delay_secs: Option<f64>,
}

impl RawConfig {
    fn apply(self, config: &mut PipelineConfig) {
        if let Some(paths) = self.paths {
            if let Some(sample_csv) = paths.sample_csv {
                config.paths.sample_csv = sample_csv;
            }
            if let Some(env) = paths.data_csv_env {
                config.paths.data_csv_env = env;
            }
            if let Some(reports_dir) = paths.reports_dir {
                config.paths.reports_dir = reports_dir;
            }
            if let Some(schema_json) = paths.schema_json {
                config.paths.schema_json = schema_json;
            }
            if let Some(trace_log) = paths.trace_log {
                config.paths.trace_log = trace_log;
            }
        }

        if let Some(use_sample) = self.use_sample_data {
            config.use_sample_data = use_sample;
        }

        if let Some(metrics) = self.metrics {
            if let Some(threshold) = metrics.low_ctr_threshold {
                config.metrics.low_ctr_threshold = threshold;
            }
            if let Some(threshold) = metrics.low_roas_threshold {
                config.metrics.low_roas_threshold = threshold;
            }
            if let Some(window) = metrics.window_days {
                config.metrics.window_days = window;
            }
        }

        if let Some(retry) = self.retry {
            if let Some(attempts) = retry.max_attempts {
                config.retry.max_attempts = attempts;
            }
            // Negative, NaN or out-of-range delays keep the default
            if let Some(delay) = retry
                .delay_secs
                .and_then(|d| Duration::try_from_secs_f64(d).ok())
            {
                config.retry.delay = delay;
            }
        }

        if let Some(write_metrics) = self.write_metrics {
            config.write_metrics = write_metrics;
        }
    }
}
