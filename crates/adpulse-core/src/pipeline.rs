//! End-to-end analysis run
//!
//! Sequences the stages, times each one, and writes the artifacts:
//!
//! 1. Ensure the reports directory exists
//! 2. Planner → data → insight → evaluator → creative
//! 3. Write `insights.json`, `creatives.json`, `report.md` and
//!    (optionally) `metrics.json`
//!
//! Every stage is bracketed by `start_<action>` / `end_<action>` events; a
//! stage error emits `<action>_failed` before it propagates. Artifacts are
//! overwritten on every run and nothing is kept between runs.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use chrono::Utc;
use serde_json::{json, Value};
use tracing::{debug, info};

use crate::agents::{CreativeAgent, DataAgent, EvaluatorAgent, InsightAgent, PlannerAgent};
use crate::config::PipelineConfig;
use crate::error::Result;
use crate::events::{EventSink, JsonlEventLog, StageTimer};
use crate::models::{
    CreativeRecommendation, CreativesDocument, DataSummary, Hypothesis, InsightsDocument, Plan,
    RunMetrics, StageKind,
};
use crate::report::{write_json, write_markdown};

pub const INSIGHTS_FILE: &str = "insights.json";
pub const CREATIVES_FILE: &str = "creatives.json";
pub const REPORT_FILE: &str = "report.md";
pub const METRICS_FILE: &str = "metrics.json";

/// Where a run wrote its artifacts
#[derive(Debug, Clone, PartialEq)]
pub struct ArtifactPaths {
    pub report: PathBuf,
    pub insights: PathBuf,
    pub creatives: PathBuf,
    /// None when metrics output is disabled
    pub metrics: Option<PathBuf>,
}

impl ArtifactPaths {
    fn in_dir(dir: &Path, write_metrics: bool) -> Self {
        Self {
            report: dir.join(REPORT_FILE),
            insights: dir.join(INSIGHTS_FILE),
            creatives: dir.join(CREATIVES_FILE),
            metrics: write_metrics.then(|| dir.join(METRICS_FILE)),
        }
    }
}

/// Result of a completed run
#[derive(Debug, Clone)]
pub struct PipelineOutput {
    pub plan: Plan,
    pub hypotheses: Vec<Hypothesis>,
    pub recommendations: Vec<CreativeRecommendation>,
    pub metrics: RunMetrics,
    pub paths: ArtifactPaths,
}

/// Orchestrates one analysis run
pub struct Pipeline<'a> {
    config: &'a PipelineConfig,
    sink: &'a dyn EventSink,
}

impl<'a> Pipeline<'a> {
    pub fn new(config: &'a PipelineConfig, sink: &'a dyn EventSink) -> Self {
        Self { config, sink }
    }

    /// Run every stage for `query` and write the artifacts
    pub fn run(&self, query: &str) -> Result<PipelineOutput> {
        let started = Instant::now();
        let mut durations = BTreeMap::new();

        let reports_dir = &self.config.paths.reports_dir;
        if !reports_dir.exists() {
            fs::create_dir_all(reports_dir)?;
            debug!("Created reports directory: {}", reports_dir.display());
        }

        let plan = self.stage(
            StageKind::Planner,
            &mut durations,
            || Ok(PlannerAgent::new().run(query)),
            |plan: &Plan| json!({ "steps": plan.plan.len() }),
        )?;

        let data = self.stage(
            StageKind::Data,
            &mut durations,
            || DataAgent::new(self.config, self.sink).run(),
            |d: &DataSummary| {
                json!({
                    "rows": d.raw.len(),
                    "daily_points": d.by_date.len(),
                    "campaigns": d.by_campaign.len(),
                    "low_ctr_rows": d.low_ctr_ads.len(),
                })
            },
        )?;

        let hypotheses = self.stage(
            StageKind::Insight,
            &mut durations,
            || Ok(InsightAgent::new(&self.config.metrics).run(&data.by_date, query)),
            count_summary,
        )?;

        let hypotheses = self.stage(
            StageKind::Evaluator,
            &mut durations,
            || Ok(EvaluatorAgent::new(&self.config.metrics).run(&data.by_campaign, hypotheses)),
            count_summary,
        )?;

        let recommendations = self.stage(
            StageKind::Creative,
            &mut durations,
            || Ok(CreativeAgent::new().run(&data.low_ctr_ads)),
            count_summary,
        )?;

        let paths = ArtifactPaths::in_dir(reports_dir, self.config.write_metrics);

        write_json(
            &paths.insights,
            &InsightsDocument {
                evaluated_hypotheses: hypotheses.clone(),
            },
        )?;
        write_json(
            &paths.creatives,
            &CreativesDocument {
                creative_recommendations: recommendations.clone(),
            },
        )?;
        write_markdown(&paths.report, query, &hypotheses, &recommendations)?;

        let metrics = RunMetrics {
            query: query.to_string(),
            generated_at: Utc::now().to_rfc3339(),
            run_duration_sec: started.elapsed().as_secs_f64(),
            peak_memory_kb: peak_memory_kb(),
            input_path: data.source.display().to_string(),
            input_sha256: data.input_sha256.clone(),
            rows: data.raw.len(),
            daily_points: data.by_date.len(),
            campaigns: data.by_campaign.len(),
            low_ctr_rows: data.low_ctr_ads.len(),
            hypotheses: hypotheses.len(),
            recommendations: recommendations.len(),
            stage_durations_sec: durations,
        };

        if let Some(path) = &paths.metrics {
            write_json(path, &metrics)?;
        }

        info!(
            hypotheses = hypotheses.len(),
            recommendations = recommendations.len(),
            duration_sec = metrics.run_duration_sec,
            "Pipeline completed"
        );

        Ok(PipelineOutput {
            plan,
            hypotheses,
            recommendations,
            metrics,
            paths,
        })
    }

    /// Run one stage between start/end events, recording its duration
    fn stage<T, S, F>(
        &self,
        kind: StageKind,
        durations: &mut BTreeMap<String, f64>,
        run: F,
        summarize: S,
    ) -> Result<T>
    where
        F: FnOnce() -> Result<T>,
        S: FnOnce(&T) -> Value,
    {
        let timer = StageTimer::start(self.sink, kind.as_str(), kind.action());
        let (result, elapsed): (Result<T>, Duration) = match run() {
            Ok(value) => {
                let elapsed = timer.finish(summarize(&value));
                (Ok(value), elapsed)
            }
            Err(e) => {
                let elapsed = timer.fail(&e);
                (Err(e), elapsed)
            }
        };
        durations.insert(kind.as_str().to_string(), elapsed.as_secs_f64());
        result
    }
}

#[allow(clippy::ptr_arg)]
fn count_summary<T>(items: &Vec<T>) -> Value {
    json!({ "count": items.len() })
}

/// Run the pipeline with events appended to the configured trace log
pub fn run_pipeline(query: &str, config: &PipelineConfig) -> Result<PipelineOutput> {
    let log = JsonlEventLog::new(&config.paths.trace_log)?;
    Pipeline::new(config, &log).run(query)
}

/// Process high-water mark in KiB (Linux `VmHWM`), None elsewhere
pub fn peak_memory_kb() -> Option<u64> {
    let status = fs::read_to_string("/proc/self/status").ok()?;
    parse_vm_hwm(&status)
}

fn parse_vm_hwm(status: &str) -> Option<u64> {
    status
        .lines()
        .find_map(|line| line.strip_prefix("VmHWM:"))
        .and_then(|rest| rest.split_whitespace().next())
        .and_then(|kb| kb.parse().ok())
}
