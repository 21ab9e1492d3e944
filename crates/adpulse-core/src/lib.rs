//! AdPulse Core Library
//!
//! Diagnostic pipeline for advertising performance exports:
//! - CSV loading with schema drift checks and retry
//! - Daily and per-campaign aggregation
//! - Trend hypotheses (ROAS and CTR drops) with evidence-based confidence
//! - Templated creative recommendations for low-CTR ads
//! - JSON and Markdown report artifacts
//! - Append-only JSONL event log

pub mod agents;
pub mod config;
pub mod error;
pub mod events;
pub mod models;
pub mod pipeline;
pub mod report;
pub mod retry;
pub mod schema;

pub use agents::{
    CreativeAgent, CreativeTemplate, DataAgent, DefaultTemplate, EvaluatorAgent, InsightAgent,
    PlannerAgent,
};
pub use config::{MetricsConfig, PathsConfig, PipelineConfig, DEFAULT_CONFIG_PATH};
pub use error::{Error, Result};
pub use events::{Event, EventLevel, EventSink, JsonlEventLog, MemoryEventLog, StageTimer};
pub use models::{
    AdRecord, AdTable, Aggregate, CampaignRollup, CampaignSummary, CreativeRecommendation,
    DailyPoint, DataSummary, Hypothesis, HypothesisType, Plan, PlanStep, RunMetrics, StageKind,
};
pub use pipeline::{run_pipeline, ArtifactPaths, Pipeline, PipelineOutput};
pub use retry::{with_retry, RetryPolicy};
pub use schema::{SchemaCheck, SchemaDescriptor};
