//! Domain models for AdPulse

use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Column names of the advertising export
pub mod columns {
    pub const DATE: &str = "date";
    pub const CAMPAIGN_NAME: &str = "campaign_name";
    pub const AUDIENCE_TYPE: &str = "audience_type";
    pub const CREATIVE_MESSAGE: &str = "creative_message";
    pub const SPEND: &str = "spend";
    pub const IMPRESSIONS: &str = "impressions";
    pub const CLICKS: &str = "clicks";
    pub const PURCHASES: &str = "purchases";
    pub const REVENUE: &str = "revenue";
    pub const CTR: &str = "ctr";
    pub const ROAS: &str = "roas";

    /// Every column the loader maps onto [`AdRecord`](super::AdRecord)
    pub const ALL: [&str; 11] = [
        DATE,
        CAMPAIGN_NAME,
        AUDIENCE_TYPE,
        CREATIVE_MESSAGE,
        SPEND,
        IMPRESSIONS,
        CLICKS,
        PURCHASES,
        REVENUE,
        CTR,
        ROAS,
    ];
}

/// Pipeline stages, in execution order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StageKind {
    /// Builds the step list
    Planner,
    /// Loads and aggregates the dataset
    Data,
    /// Generates trend hypotheses
    Insight,
    /// Attaches evidence and adjusts confidence
    Evaluator,
    /// Suggests replacement copy for low-CTR ads
    Creative,
}

impl StageKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            StageKind::Planner => "planner",
            StageKind::Data => "data",
            StageKind::Insight => "insight",
            StageKind::Evaluator => "evaluator",
            StageKind::Creative => "creative",
        }
    }

    /// Action name used in plan steps and start/end events
    pub fn action(&self) -> &'static str {
        match self {
            StageKind::Planner => "plan",
            StageKind::Data => "load_and_summarize",
            StageKind::Insight => "generate_hypotheses",
            StageKind::Evaluator => "validate_hypotheses",
            StageKind::Creative => "improve_low_ctr_creatives",
        }
    }

    /// All stages in execution order
    pub fn all() -> &'static [StageKind] {
        &[
            StageKind::Planner,
            StageKind::Data,
            StageKind::Insight,
            StageKind::Evaluator,
            StageKind::Creative,
        ]
    }
}

impl fmt::Display for StageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for StageKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "planner" => Ok(StageKind::Planner),
            "data" => Ok(StageKind::Data),
            "insight" => Ok(StageKind::Insight),
            "evaluator" => Ok(StageKind::Evaluator),
            "creative" => Ok(StageKind::Creative),
            _ => Err(format!("Unknown stage: {}", s)),
        }
    }
}

/// One row of the advertising export
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AdRecord {
    /// None when the cell was empty or unparsable
    pub date: Option<NaiveDate>,
    pub campaign_name: Option<String>,
    pub audience_type: Option<String>,
    pub creative_message: Option<String>,
    pub spend: Option<f64>,
    pub impressions: Option<f64>,
    pub clicks: Option<f64>,
    pub purchases: Option<f64>,
    pub revenue: Option<f64>,
    pub ctr: Option<f64>,
    pub roas: Option<f64>,
}

/// The loaded dataset: header columns in file order plus rows in file order
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AdTable {
    pub columns: Vec<String>,
    pub rows: Vec<AdRecord>,
}

impl AdTable {
    pub fn has_column(&self, name: &str) -> bool {
        self.columns.iter().any(|c| c == name)
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// Grouped metrics: sums for volume columns, means for rate columns
///
/// Nulls are skipped. A sum over only nulls is 0.0; a mean over only nulls
/// is None.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Aggregate {
    pub spend: f64,
    pub impressions: f64,
    pub clicks: f64,
    pub ctr: Option<f64>,
    pub purchases: f64,
    pub revenue: f64,
    pub roas: Option<f64>,
}

/// One day of the daily series
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailyPoint {
    pub date: Option<NaiveDate>,
    #[serde(flatten)]
    pub metrics: Aggregate,
}

/// One campaign of the campaign rollup
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CampaignSummary {
    pub campaign_name: Option<String>,
    #[serde(flatten)]
    pub metrics: Aggregate,
}

/// Per-campaign totals
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CampaignRollup {
    /// One entry per distinct campaign, first-appearance order
    pub campaigns: Vec<CampaignSummary>,
    /// Whether the source table had a spend column at all
    pub has_spend: bool,
}

impl CampaignRollup {
    pub fn len(&self) -> usize {
        self.campaigns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.campaigns.is_empty()
    }

    /// Sum of spend across all campaigns
    pub fn total_spend(&self) -> f64 {
        self.campaigns.iter().map(|c| c.metrics.spend).sum()
    }
}

/// Everything the data stage produces
#[derive(Debug, Clone, Default)]
pub struct DataSummary {
    pub raw: AdTable,
    /// Ascending by date, one point per distinct date
    pub by_date: Vec<DailyPoint>,
    pub by_campaign: CampaignRollup,
    /// Rows with ctr below the configured threshold, source order
    pub low_ctr_ads: Vec<AdRecord>,
    /// Resolved input path
    pub source: PathBuf,
    /// SHA-256 of the input bytes, hex encoded
    pub input_sha256: String,
}

/// Category of a hypothesis
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HypothesisType {
    /// Efficiency moved between windows
    PerformanceTrend,
    /// Audience or creative wear-out
    CreativeAudience,
}

impl HypothesisType {
    pub fn as_str(&self) -> &'static str {
        match self {
            HypothesisType::PerformanceTrend => "performance_trend",
            HypothesisType::CreativeAudience => "creative_audience",
        }
    }
}

impl fmt::Display for HypothesisType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for HypothesisType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "performance_trend" => Ok(HypothesisType::PerformanceTrend),
            "creative_audience" => Ok(HypothesisType::CreativeAudience),
            _ => Err(format!("Unknown hypothesis type: {}", s)),
        }
    }
}

/// Confidence assumed for a hypothesis document that carries none
pub const DEFAULT_CONFIDENCE: f64 = 0.6;

fn default_confidence() -> f64 {
    DEFAULT_CONFIDENCE
}

/// A structured claim about a metric trend
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Hypothesis {
    /// Stable key, e.g. "roas_drop_recent_vs_prev"
    pub id: String,
    pub title: String,
    #[serde(rename = "type")]
    pub hypothesis_type: HypothesisType,
    pub hypothesis: String,
    #[serde(default)]
    pub evidence: Map<String, Value>,
    /// In [0, 1]
    #[serde(default = "default_confidence")]
    pub confidence: f64,
}

impl Hypothesis {
    pub fn new(
        id: impl Into<String>,
        hypothesis_type: HypothesisType,
        title: impl Into<String>,
        hypothesis: impl Into<String>,
        confidence: f64,
    ) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            hypothesis_type,
            hypothesis: hypothesis.into(),
            evidence: Map::new(),
            confidence,
        }
    }

    /// Add one evidence entry
    pub fn with_evidence(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.evidence.insert(key.into(), value.into());
        self
    }
}

/// Suggested replacement copy for one under-performing ad
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreativeRecommendation {
    pub campaign_name: String,
    pub audience_type: String,
    pub original_message: String,
    pub suggested_headlines: Vec<String>,
    pub suggested_body: Vec<String>,
    pub suggested_ctas: Vec<String>,
}

/// One entry of the execution plan
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlanStep {
    pub step: u32,
    pub agent: StageKind,
    pub action: String,
}

/// Descriptive plan for a query
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Plan {
    pub query: String,
    pub plan: Vec<PlanStep>,
}

/// insights.json
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InsightsDocument {
    pub evaluated_hypotheses: Vec<Hypothesis>,
}

/// creatives.json
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreativesDocument {
    pub creative_recommendations: Vec<CreativeRecommendation>,
}

/// Run statistics captured once the pipeline finishes (metrics.json)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunMetrics {
    pub query: String,
    /// RFC 3339 timestamp of completion
    pub generated_at: String,
    pub run_duration_sec: f64,
    /// Process high-water mark in KiB, None where the platform doesn't report it
    pub peak_memory_kb: Option<u64>,
    pub input_path: String,
    pub input_sha256: String,
    pub rows: usize,
    pub daily_points: usize,
    pub campaigns: usize,
    pub low_ctr_rows: usize,
    pub hypotheses: usize,
    pub recommendations: usize,
    /// Seconds spent per stage, keyed by stage name
    pub stage_durations_sec: BTreeMap<String, f64>,
}
