//! Creative stage - replacement copy for low-CTR ads
//!
//! Deterministic templating, not generation: every recommendation carries
//! the same two headlines, two body variants and two CTAs, with the
//! audience interpolated into the first headline. The copy comes from a
//! [`CreativeTemplate`], so a different house style can be swapped in
//! without changing the recommendation shape.

use tracing::debug;

use crate::models::{AdRecord, CreativeRecommendation};

/// At most this many low-CTR rows get recommendations
pub const MAX_RECOMMENDATIONS: usize = 20;

/// Audience used when a row has none
const DEFAULT_AUDIENCE: &str = "broad";

/// Suggested copy for one ad
#[derive(Debug, Clone, PartialEq)]
pub struct CreativeCopy {
    pub headlines: Vec<String>,
    pub body: Vec<String>,
    pub ctas: Vec<String>,
}

/// Source of suggested copy
pub trait CreativeTemplate: Send + Sync {
    /// Human-readable name for logs
    fn name(&self) -> &str;

    /// Copy for an ad aimed at `audience`
    fn suggest(&self, audience: &str) -> CreativeCopy;
}

/// Built-in apparel copy
#[derive(Debug, Default, Clone, Copy)]
pub struct DefaultTemplate;

impl CreativeTemplate for DefaultTemplate {
    fn name(&self) -> &str {
        "default"
    }

    fn suggest(&self, audience: &str) -> CreativeCopy {
        CreativeCopy {
            headlines: vec![
                format!("Limited-time offer for {} shoppers", audience),
                "Comfort + style you can wear all day".to_string(),
            ],
            body: vec![
                "Upgrade your everyday essentials with breathable, all-day comfort.".to_string(),
                "Bundle & save on our most-loved styles before they sell out.".to_string(),
            ],
            ctas: vec![
                "Shop the Collection".to_string(),
                "Claim Your Offer".to_string(),
            ],
        }
    }
}

/// Turns low-CTR rows into creative recommendations
pub struct CreativeAgent {
    template: Box<dyn CreativeTemplate>,
}

impl Default for CreativeAgent {
    fn default() -> Self {
        Self::new()
    }
}

impl CreativeAgent {
    /// Agent using [`DefaultTemplate`]
    pub fn new() -> Self {
        Self::with_template(Box::new(DefaultTemplate))
    }

    pub fn with_template(template: Box<dyn CreativeTemplate>) -> Self {
        Self { template }
    }

    /// One recommendation per row, first [`MAX_RECOMMENDATIONS`] rows only
    pub fn run(&self, low_ctr_ads: &[AdRecord]) -> Vec<CreativeRecommendation> {
        let recommendations: Vec<_> = low_ctr_ads
            .iter()
            .take(MAX_RECOMMENDATIONS)
            .map(|row| self.recommend(row))
            .collect();

        debug!(
            template = self.template.name(),
            candidates = low_ctr_ads.len(),
            recommendations = recommendations.len(),
            "Generated creative recommendations"
        );

        recommendations
    }

    fn recommend(&self, row: &AdRecord) -> CreativeRecommendation {
        let audience = row
            .audience_type
            .as_deref()
            .filter(|s| !s.is_empty())
            .unwrap_or(DEFAULT_AUDIENCE);

        let copy = self.template.suggest(audience);

        CreativeRecommendation {
            campaign_name: row.campaign_name.clone().unwrap_or_default(),
            audience_type: audience.to_string(),
            original_message: row.creative_message.clone().unwrap_or_default(),
            suggested_headlines: copy.headlines,
            suggested_body: copy.body,
            suggested_ctas: copy.ctas,
        }
    }
}
