//! Tree-of-thoughts search: bounded-depth, bounded-branching exploration with
//! generate/evaluate/select at each node. Once a branch is selected its
//! siblings are discarded; there is no backtracking and no memoization.

use async_recursion::async_recursion;
use tracing::info;
use weave_core::{template, InvocationRequest, ResultEnvelope, WeaveError};
use weave_llm::Invoker;

use crate::parallel::label_results;
use crate::prompts::{TREE_EVALUATE_PROMPT, TREE_GENERATE_PROMPT, TREE_SELECT_PROMPT};

pub const DEFAULT_MAX_DEPTH: usize = 3;
pub const DEFAULT_BRANCH_COUNT: usize = 3;

pub struct TreeOfThoughtsWorkflow {
    invoker: Invoker,
    max_depth: usize,
    branch_count: usize,
}

impl TreeOfThoughtsWorkflow {
    pub fn new(invoker: Invoker) -> Self {
        Self {
            invoker,
            max_depth: DEFAULT_MAX_DEPTH,
            branch_count: DEFAULT_BRANCH_COUNT,
        }
    }

    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    pub fn with_branch_count(mut self, branch_count: usize) -> Self {
        self.branch_count = branch_count;
        self
    }

    pub async fn run(&self, seed_thought: &str) -> Result<ResultEnvelope, WeaveError> {
        let final_thought = self.explore(seed_thought.to_string(), 0).await?;

        Ok(ResultEnvelope::new("Tree of Thoughts", final_thought)
            .meta("max_depth", self.max_depth.to_string())
            .meta("branch_count", self.branch_count.to_string()))
    }

    /// At `max_depth` the current thought is returned unchanged with no
    /// further calls.
    #[async_recursion]
    async fn explore(&self, thought: String, depth: usize) -> Result<String, WeaveError> {
        if depth >= self.max_depth {
            return Ok(thought);
        }

        info!("TREE: depth {depth}, expanding {} branches", self.branch_count);

        let model = self.invoker.config().model.clone();
        let generate_prompt =
            template::fill(TREE_GENERATE_PROMPT, &[("thought", thought.as_str())]);
        let requests: Vec<InvocationRequest> = (0..self.branch_count)
            .map(|_| InvocationRequest::text(generate_prompt.clone(), &model))
            .collect();
        let results = self.invoker.run_parallel(&requests).await;
        let candidates = label_results(&results, "Candidate");

        let evaluations = self
            .invoker
            .invoke(&InvocationRequest::text(
                template::fill(TREE_EVALUATE_PROMPT, &[("candidates", candidates.as_str())]),
                &model,
            ))
            .await
            .into_result()?;

        let selection = self
            .invoker
            .invoke(&InvocationRequest::text(
                template::fill(TREE_SELECT_PROMPT, &[("evaluations", evaluations.as_str())]),
                &model,
            ))
            .await
            .into_result()?;

        self.explore(selection, depth + 1).await
    }
}
