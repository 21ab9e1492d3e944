//! Insight stage - trend hypotheses from the daily series
//!
//! Splits the daily series into a "previous" and a "recent" window and
//! compares mean ROAS and mean CTR between them. A drop in either (strictly
//! lower recent mean) produces a hypothesis.

use tracing::debug;

use crate::config::MetricsConfig;
use crate::models::{DailyPoint, Hypothesis, HypothesisType};

/// Recent-window ROAS below the previous window
pub const ROAS_DROP_RECENT_VS_PREV: &str = "roas_drop_recent_vs_prev";
/// Recent-window CTR below the previous window
pub const CTR_DROP_POSSIBLE_FATIGUE: &str = "ctr_drop_possible_fatigue";

/// Pick the (previous, recent) windows from a chronological series
///
/// With at least `2 × window_days` points the windows are the two adjacent
/// slices ending at the last point. With fewer, previous is the head and
/// recent is the tail, each up to `window_days` long; they may overlap.
pub fn select_windows(series: &[DailyPoint], window_days: usize) -> (&[DailyPoint], &[DailyPoint]) {
    let n = series.len();
    let w = window_days.max(1);

    if n >= w.saturating_mul(2) {
        (&series[n - 2 * w..n - w], &series[n - w..])
    } else {
        let w = w.min(n);
        (&series[..w], &series[n - w..])
    }
}

fn mean<I: Iterator<Item = Option<f64>>>(values: I) -> Option<f64> {
    let (sum, count) = values
        .flatten()
        .fold((0.0, 0usize), |(sum, count), v| (sum + v, count + 1));
    (count > 0).then(|| sum / count as f64)
}

fn mean_roas(window: &[DailyPoint]) -> Option<f64> {
    mean(window.iter().map(|p| p.metrics.roas))
}

fn mean_ctr(window: &[DailyPoint]) -> Option<f64> {
    mean(window.iter().map(|p| p.metrics.ctr))
}

/// Strictly lower; a missing mean on either side never counts as a drop
fn dropped(recent: Option<f64>, previous: Option<f64>) -> Option<(f64, f64)> {
    match (recent, previous) {
        (Some(r), Some(p)) if r < p => Some((r, p)),
        _ => None,
    }
}

/// Generates trend hypotheses from the daily series
#[derive(Debug, Clone)]
pub struct InsightAgent {
    window_days: usize,
}

impl InsightAgent {
    pub fn new(metrics: &MetricsConfig) -> Self {
        Self::with_window(metrics.window_days)
    }

    pub fn with_window(window_days: usize) -> Self {
        Self { window_days }
    }

    /// Compare windows of `by_date` and return any hypotheses that fire
    ///
    /// `query` is carried for context only.
    pub fn run(&self, by_date: &[DailyPoint], query: &str) -> Vec<Hypothesis> {
        if by_date.is_empty() {
            debug!(query, "Empty daily series, no hypotheses");
            return Vec::new();
        }

        let (previous, recent) = select_windows(by_date, self.window_days);

        let recent_roas = mean_roas(recent);
        let previous_roas = mean_roas(previous);
        let recent_ctr = mean_ctr(recent);
        let previous_ctr = mean_ctr(previous);

        debug!(
            query,
            points = by_date.len(),
            window_days = self.window_days,
            ?recent_roas,
            ?previous_roas,
            ?recent_ctr,
            ?previous_ctr,
            "Compared windows"
        );

        let mut hypotheses = Vec::new();

        if let Some((recent, previous)) = dropped(recent_roas, previous_roas) {
            hypotheses.push(
                Hypothesis::new(
                    ROAS_DROP_RECENT_VS_PREV,
                    HypothesisType::PerformanceTrend,
                    "ROAS dropped in the most recent window vs prior window",
                    "Recent campaigns are less efficient. Possible causes: audience fatigue, \
                     higher spend on low-ROAS campaigns, or weaker creatives.",
                    0.7,
                )
                .with_evidence("recent_roas", recent)
                .with_evidence("previous_roas", previous),
            );
        }

        if let Some((recent, previous)) = dropped(recent_ctr, previous_ctr) {
            hypotheses.push(
                Hypothesis::new(
                    CTR_DROP_POSSIBLE_FATIGUE,
                    HypothesisType::CreativeAudience,
                    "CTR drop indicates potential audience fatigue or creative exhaustion",
                    "Users are clicking less on the same audiences/creatives, suggesting \
                     fatigue or misalignment of messaging.",
                    0.65,
                )
                .with_evidence("recent_ctr", recent)
                .with_evidence("previous_ctr", previous),
            );
        }

        hypotheses
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Aggregate;
    use chrono::{Duration, NaiveDate};

    /// Build a daily series from (roas, ctr) pairs starting 2024-03-01
    fn series(values: &[(f64, f64)]) -> Vec<DailyPoint> {
        let start = NaiveDate::from_ymd_opt(2024, 3, 1).unwrap();
        values
            .iter()
            .enumerate()
            .map(|(i, &(roas, ctr))| DailyPoint {
                date: Some(start + Duration::days(i as i64)),
                metrics: Aggregate {
                    roas: Some(roas),
                    ctr: Some(ctr),
                    ..Default::default()
                },
            })
            .collect()
    }

    fn ids(hypotheses: &[Hypothesis]) -> Vec<&str> {
        hypotheses.iter().map(|h| h.id.as_str()).collect()
    }

    #[test]
    fn test_empty_series() {
        let agent = InsightAgent::with_window(7);
        assert!(agent.run(&[], "q").is_empty());
    }

    #[test]
    fn test_disjoint_windows() {
        let data = series(&[(1.0, 0.01); 20]);
        let (previous, recent) = select_windows(&data, 7);
        assert_eq!(previous.len(), 7);
        assert_eq!(recent.len(), 7);
        // previous ends exactly where recent begins
        assert_eq!(previous[0].date, data[6].date);
        assert_eq!(previous[6].date, data[12].date);
        assert_eq!(recent[0].date, data[13].date);
    }

    #[test]
    fn test_fallback_windows_overlap() {
        let data = series(&[(1.0, 0.01); 10]);
        let (previous, recent) = select_windows(&data, 7);
        assert_eq!(previous.len(), 7);
        assert_eq!(recent.len(), 7);
        assert_eq!(previous[0].date, data[0].date);
        assert_eq!(recent[0].date, data[3].date);
    }

    #[test]
    fn test_fallback_shorter_than_window() {
        let data = series(&[(1.0, 0.01); 3]);
        let (previous, recent) = select_windows(&data, 7);
        assert_eq!(previous.len(), 3);
        assert_eq!(recent.len(), 3);
    }

    #[test]
    fn test_equal_means_produce_nothing() {
        let data = series(&[(2.0, 0.02); 14]);
        let agent = InsightAgent::with_window(7);
        assert!(agent.run(&data, "q").is_empty());
    }

    #[test]
    fn test_roas_and_ctr_drop() {
        let mut values = vec![(3.0, 0.03); 7];
        values.extend(vec![(1.0, 0.01); 7]);
        let data = series(&values);

        let hypotheses = InsightAgent::with_window(7).run(&data, "q");
        assert_eq!(
            ids(&hypotheses),
            vec![ROAS_DROP_RECENT_VS_PREV, CTR_DROP_POSSIBLE_FATIGUE]
        );

        let roas = &hypotheses[0];
        assert_eq!(roas.confidence, 0.7);
        assert_eq!(roas.hypothesis_type, HypothesisType::PerformanceTrend);
        assert_eq!(roas.evidence["recent_roas"], 1.0);
        assert_eq!(roas.evidence["previous_roas"], 3.0);

        let ctr = &hypotheses[1];
        assert_eq!(ctr.confidence, 0.65);
        assert_eq!(ctr.hypothesis_type, HypothesisType::CreativeAudience);
        let recent_ctr = ctr.evidence["recent_ctr"].as_f64().unwrap();
        assert!((recent_ctr - 0.01).abs() < 1e-12);
    }

    #[test]
    fn test_only_ctr_drop() {
        let mut values = vec![(1.0, 0.03); 7];
        values.extend(vec![(2.0, 0.01); 7]);
        let hypotheses = InsightAgent::with_window(7).run(&series(&values), "q");
        assert_eq!(ids(&hypotheses), vec![CTR_DROP_POSSIBLE_FATIGUE]);
    }

    #[test]
    fn test_only_trailing_windows_compared() {
        // An early dip outside the last 2 × window points is ignored
        let mut values = vec![(0.1, 0.001); 5];
        values.extend(vec![(2.0, 0.02); 6]);
        let hypotheses = InsightAgent::with_window(3).run(&series(&values), "q");
        assert!(hypotheses.is_empty());
    }

    #[test]
    fn test_null_means_never_fire() {
        let mut data = series(&[(1.0, 0.01); 4]);
        for point in &mut data[2..] {
            point.metrics.roas = None;
        }
        let hypotheses = InsightAgent::with_window(2).run(&data, "q");
        assert!(hypotheses.iter().all(|h| h.id != ROAS_DROP_RECENT_VS_PREV));
    }

    #[test]
    fn test_huge_window_falls_back() {
        let data = series(&[(2.0, 0.02), (1.0, 0.02)]);
        let (previous, recent) = select_windows(&data, usize::MAX);
        assert_eq!(previous.len(), 2);
        assert_eq!(recent.len(), 2);

        let config = crate::config::PipelineConfig::from_yaml(
            "metrics:\n  window_days: 18446744073709551615\n",
        )
        .unwrap();
        let hypotheses = InsightAgent::new(&config.metrics).run(&data, "q");
        assert!(hypotheses.is_empty());
    }

    #[test]
    fn test_zero_window_treated_as_one() {
        let data = series(&[(2.0, 0.02), (1.0, 0.02)]);
        let hypotheses = InsightAgent::with_window(0).run(&data, "q");
        assert_eq!(ids(&hypotheses), vec![ROAS_DROP_RECENT_VS_PREV]);
    }
}
