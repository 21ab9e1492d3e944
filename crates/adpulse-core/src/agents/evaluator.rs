//! Evaluator stage - campaign evidence for trend hypotheses
//!
//! Only the ROAS-drop hypothesis is enriched: the share of total spend going
//! to low-ROAS campaigns is attached as evidence, and confidence moves up or
//! down by 0.1 depending on whether that share exceeds 40%.
//!
//! The adjustment is relative to the hypothesis's current confidence, so
//! evaluating the same list twice compounds. The result is clamped to
//! [0.4, 1.0].

use tracing::debug;

use crate::config::MetricsConfig;
use crate::models::{CampaignRollup, Hypothesis};

use super::insight::ROAS_DROP_RECENT_VS_PREV;

/// Evidence key for the low-ROAS spend share
pub const LOW_ROAS_SPEND_SHARE: &str = "low_roas_spend_share";

/// Share above which the ROAS-drop hypothesis gains confidence
const SHARE_THRESHOLD: f64 = 0.4;
const CONFIDENCE_STEP: f64 = 0.1;
const CONFIDENCE_CEILING: f64 = 1.0;
const CONFIDENCE_FLOOR: f64 = 0.4;

/// Attaches campaign evidence and adjusts confidence
#[derive(Debug, Clone)]
pub struct EvaluatorAgent {
    low_roas_threshold: f64,
}

impl EvaluatorAgent {
    pub fn new(metrics: &MetricsConfig) -> Self {
        Self::with_threshold(metrics.low_roas_threshold)
    }

    pub fn with_threshold(low_roas_threshold: f64) -> Self {
        Self { low_roas_threshold }
    }

    /// Fraction of total spend on campaigns with roas below the threshold
    ///
    /// 0.0 when total spend is zero. Campaigns without a roas never count.
    pub fn low_roas_spend_share(&self, by_campaign: &CampaignRollup) -> f64 {
        let total_spend = by_campaign.total_spend();
        if total_spend == 0.0 {
            return 0.0;
        }

        let low_spend: f64 = by_campaign
            .campaigns
            .iter()
            .filter(|c| {
                c.metrics
                    .roas
                    .is_some_and(|roas| roas < self.low_roas_threshold)
            })
            .map(|c| c.metrics.spend)
            .sum();

        low_spend / total_spend
    }

    /// Enrich `hypotheses` in place and hand them back
    pub fn run(
        &self,
        by_campaign: &CampaignRollup,
        mut hypotheses: Vec<Hypothesis>,
    ) -> Vec<Hypothesis> {
        if !by_campaign.has_spend || by_campaign.is_empty() {
            debug!("No campaign spend to evaluate against");
            return hypotheses;
        }

        for h in hypotheses
            .iter_mut()
            .filter(|h| h.id == ROAS_DROP_RECENT_VS_PREV)
        {
            let share = self.low_roas_spend_share(by_campaign);
            h.evidence.insert(LOW_ROAS_SPEND_SHARE.to_string(), share.into());

            let before = h.confidence;
            let adjusted = if share > SHARE_THRESHOLD {
                before + CONFIDENCE_STEP
            } else {
                before - CONFIDENCE_STEP
            };
            // Inputs may start outside [0.4, 1.0]
            h.confidence = adjusted.clamp(CONFIDENCE_FLOOR, CONFIDENCE_CEILING);

            debug!(
                id = %h.id,
                share,
                before,
                after = h.confidence,
                "Adjusted confidence"
            );
        }

        hypotheses
    }
}
