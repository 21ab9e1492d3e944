//! Planner stage - a static description of the pipeline steps

use crate::models::{Plan, PlanStep, StageKind};

/// Builds the ordered step list for a query
///
/// The plan is descriptive only; the orchestrator runs the same stages for
/// every query.
#[derive(Debug, Default, Clone, Copy)]
pub struct PlannerAgent;

impl PlannerAgent {
    pub fn new() -> Self {
        Self
    }

    pub fn run(&self, query: &str) -> Plan {
        let plan = StageKind::all()
            .iter()
            .filter(|stage| **stage != StageKind::Planner)
            .enumerate()
            .map(|(i, stage)| PlanStep {
                step: i as u32 + 1,
                agent: *stage,
                action: stage.action().to_string(),
            })
            .collect();

        Plan {
            query: query.to_string(),
            plan,
        }
    }
}
