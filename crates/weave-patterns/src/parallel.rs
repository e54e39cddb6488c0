//! Plain fan-out: run every prompt concurrently and concatenate labeled
//! outputs. A failed branch shows up as bracketed error text in its slot;
//! siblings are never cancelled.

use tracing::info;
use weave_core::{
    template, ErrorKind, InvocationRequest, InvocationResult, ResultEnvelope, WeaveError,
};
use weave_llm::Invoker;

pub struct ParallelWorkflow {
    invoker: Invoker,
}

impl ParallelWorkflow {
    pub fn new(invoker: Invoker) -> Self {
        Self { invoker }
    }

    pub async fn run(&self, prompts: &[String], input: &str) -> Result<ResultEnvelope, WeaveError> {
        let model = self.invoker.config().model.clone();
        let requests: Vec<InvocationRequest> = prompts
            .iter()
            .map(|p| InvocationRequest::text(template::fill(p, &[("input", input)]), &model))
            .collect();

        let results = self.invoker.run_parallel(&requests).await;
        let failures = results.iter().filter(|r| !r.ok).count();

        let combined = label_results(&results, "Candidate");
        info!("PARALLEL: {} branches, {failures} failed", results.len());

        Ok(ResultEnvelope::new("Parallel Execution", combined)
            .meta("branch_count", results.len().to_string())
            .meta("failed_branches", failures.to_string()))
    }
}

/// Reclassifies failed branches: within an orchestration, a branch that
/// exhausted its retries is a failed subtask, not an invocation-layer
/// failure. Siblings keep their results either way.
pub(crate) fn mark_worker_failures(results: Vec<InvocationResult>) -> Vec<InvocationResult> {
    results
        .into_iter()
        .map(|r| {
            if r.ok {
                r
            } else {
                InvocationResult::err(ErrorKind::WorkerFailure, r.raw_text)
            }
        })
        .collect()
}

/// Concatenates branch outputs under deterministic submission-order labels.
pub(crate) fn label_results(results: &[InvocationResult], label: &str) -> String {
    results
        .iter()
        .enumerate()
        .map(|(i, r)| {
            if r.ok {
                format!("{label} {}:\n{}", i + 1, r.raw_text)
            } else {
                format!("{label} {}:\n[branch failed: {}]", i + 1, r.raw_text)
            }
        })
        .collect::<Vec<_>>()
        .join("\n\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::{test_invoker, ScriptedClient};

    #[tokio::test]
    async fn labels_follow_submission_order() {
        let client = ScriptedClient::new(vec![Ok("alpha".into()), Ok("beta".into())]);
        let parallel = ParallelWorkflow::new(test_invoker(client));

        let prompts = vec!["p1 {{input}}".to_string(), "p2 {{input}}".to_string()];
        let envelope = parallel.run(&prompts, "in").await.unwrap();

        let alpha = envelope.primary_output.find("Candidate 1:\nalpha").unwrap();
        let beta = envelope.primary_output.find("Candidate 2:\nbeta").unwrap();
        assert!(alpha < beta);
        assert_eq!(envelope.metadata[0], ("branch_count".into(), "2".into()));
    }

    #[test]
    fn failed_subtask_branches_reclassify_as_worker_failures() {
        let results = vec![
            InvocationResult::ok("fine".into()),
            InvocationResult::err(ErrorKind::InvocationExhausted, "worker down".into()),
        ];

        let marked = mark_worker_failures(results);

        assert!(marked[0].ok);
        assert_eq!(marked[0].error_kind, None);
        assert_eq!(marked[1].error_kind, Some(ErrorKind::WorkerFailure));
        assert_eq!(marked[1].raw_text, "worker down");
    }

    #[tokio::test]
    async fn failed_branch_is_recorded_not_propagated() {
        let client = ScriptedClient::new(vec![
            Ok("fine".into()),
            Err(WeaveError::Model("branch down".into())),
        ]);
        let parallel = ParallelWorkflow::new(test_invoker(client));

        let prompts = vec!["a".to_string(), "b".to_string()];
        let envelope = parallel.run(&prompts, "in").await.unwrap();

        assert!(envelope.primary_output.contains("[branch failed: branch down]"));
        assert_eq!(envelope.metadata[1], ("failed_branches".into(), "1".into()));
    }
}
