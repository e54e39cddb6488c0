//! Workflow patterns: the fixed orchestration skeletons that drive the
//! invocation layer and hand their combined output to a result envelope.
//!
//! Only the fan-out executor introduces concurrency; every iterative pattern
//! here is sequential within one run, and a run owns its state exclusively.

pub mod chain;
pub mod evaluate_optimize;
pub mod map_reduce;
pub mod orchestrator;
pub mod parallel;
pub mod prompts;
pub mod react;
pub mod route;
pub mod self_consistency;
pub mod tree;

#[cfg(test)]
pub(crate) mod testutil;

pub use chain::ChainWorkflow;
pub use evaluate_optimize::EvaluateOptimizeWorkflow;
pub use map_reduce::MapReduceWorkflow;
pub use orchestrator::OrchestratorWorkflow;
pub use parallel::ParallelWorkflow;
pub use react::ReactWorkflow;
pub use route::{RouteHandler, RouterWorkflow};
pub use self_consistency::SelfConsistencyWorkflow;
pub use tree::TreeOfThoughtsWorkflow;

/// Which phase an iterative workflow is in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Generating,
    Planning,
    Executing,
    Evaluating,
    Optimizing,
    Acting,
    Done,
}

/// Loop state owned by one running workflow invocation. Never shared across
/// concurrent instances; dropped when the run returns its envelope.
#[derive(Debug, Clone)]
pub struct WorkflowState {
    pub phase: Phase,
    pub iteration: usize,
    pub output: String,
    pub history: Vec<String>,
}

impl WorkflowState {
    pub fn new(phase: Phase) -> Self {
        Self { phase, iteration: 0, output: String::new(), history: Vec::new() }
    }

    pub fn record(&mut self, entry: impl Into<String>) {
        self.history.push(entry.into());
    }

    pub fn history_text(&self) -> String {
        self.history.join("\n")
    }
}
