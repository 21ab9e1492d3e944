//! Pipeline stages
//!
//! Each stage is a struct with a typed `run` method; the orchestrator feeds
//! one stage's output into the next:
//!
//! - **Planner** - describes the steps for a query
//! - **Data** - loads the CSV and builds the aggregate views
//! - **Insight** - compares recent vs previous windows of the daily series
//! - **Evaluator** - attaches campaign evidence and adjusts confidence
//! - **Creative** - templated copy suggestions for low-CTR ads

pub mod creative;
pub mod data;
pub mod evaluator;
pub mod insight;
pub mod planner;

pub use creative::{
    CreativeAgent, CreativeCopy, CreativeTemplate, DefaultTemplate, MAX_RECOMMENDATIONS,
};
pub use data::{parse_date, parse_metric, resolve_data_path, DataAgent};
pub use evaluator::{EvaluatorAgent, LOW_ROAS_SPEND_SHARE};
pub use insight::{
    select_windows, InsightAgent, CTR_DROP_POSSIBLE_FATIGUE, ROAS_DROP_RECENT_VS_PREV,
};
pub use planner::PlannerAgent;
