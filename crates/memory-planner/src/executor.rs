//! Staged plan execution over in-memory documents.

use serde_json::Value;
use tracing::debug;

use memory_filter::evaluate;

use crate::plan::ExecutionPlan;

/// Survivor count below which further stages stop paying for themselves.
const TERMINATION_FLOOR: usize = 10;
/// Input size above which the floor check applies at all.
const LARGE_SET: usize = 100;

/// Runs an [`ExecutionPlan`] against a candidate document set.
///
/// Stages apply in plan order, each narrowing the survivor set. When the
/// survivors of a marked stage fall below a small floor while the original
/// set was large, remaining stages are skipped and the current survivors are
/// returned as-is. Callers that need exact semantics must re-check the full
/// filter on whatever they consume; early termination trades a few false
/// positives for not scanning the tail stages.
#[derive(Debug, Default, Clone, Copy)]
pub struct PlanExecutor;

impl PlanExecutor {
    pub fn new() -> Self {
        Self
    }

    /// Apply `plan` to `documents`, returning indices of survivors in their
    /// original order.
    pub fn execute(&self, plan: &ExecutionPlan, documents: &[Value]) -> Vec<usize> {
        let mut survivors: Vec<usize> = (0..documents.len()).collect();
        let initial = survivors.len();

        for (stage_index, stage) in plan.execution_order.iter().enumerate() {
            survivors.retain(|&index| evaluate(stage, &documents[index]));
            debug!(
                stage = stage_index,
                survivors = survivors.len(),
                "filter stage applied"
            );

            if survivors.is_empty() {
                break;
            }
            if self.should_terminate(plan, stage_index, initial, survivors.len()) {
                debug!(
                    stage = stage_index,
                    survivors = survivors.len(),
                    skipped = plan.execution_order.len() - stage_index - 1,
                    "terminating plan early"
                );
                break;
            }
        }

        survivors
    }

    /// Convenience wrapper returning the surviving documents themselves.
    pub fn execute_owned(&self, plan: &ExecutionPlan, documents: &[Value]) -> Vec<Value> {
        self.execute(plan, documents)
            .into_iter()
            .map(|index| documents[index].clone())
            .collect()
    }

    fn should_terminate(
        &self,
        plan: &ExecutionPlan,
        stage_index: usize,
        initial: usize,
        remaining: usize,
    ) -> bool {
        initial > LARGE_SET
            && remaining < TERMINATION_FLOOR
            && plan.early_termination_points.contains(&stage_index)
    }
}
