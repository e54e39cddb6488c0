//! Dynamic orchestrator: bounded planning → executing → evaluating cycles
//! with the evaluation text fed back as the next cycle's task.

use tracing::{info, warn};
use weave_core::{
    template, ExitReason, FieldSpec, InvocationRequest, ResultEnvelope, SchemaSpec, WeaveError,
};
use weave_llm::{extract, Invoker};

use crate::parallel::{label_results, mark_worker_failures};
use crate::prompts::{ORCHESTRATOR_EVAL_PROMPT, PLAN_SUBTASKS_PROMPT, WORKER_PROMPT};
use crate::{Phase, WorkflowState};

pub const DEFAULT_MAX_ITERATIONS: usize = 5;

pub struct OrchestratorWorkflow {
    invoker: Invoker,
    max_iterations: usize,
}

impl OrchestratorWorkflow {
    pub fn new(invoker: Invoker) -> Self {
        Self { invoker, max_iterations: DEFAULT_MAX_ITERATIONS }
    }

    pub fn with_max_iterations(mut self, max_iterations: usize) -> Self {
        self.max_iterations = max_iterations;
        self
    }

    pub async fn run(&self, task: &str) -> Result<ResultEnvelope, WeaveError> {
        let model = self.invoker.config().model.clone();
        let mut state = WorkflowState::new(Phase::Planning);

        // After the first cycle the evaluation text replaces the task
        // entirely; the original wording is not carried forward.
        let mut current_task = task.to_string();
        let mut exit_reason = ExitReason::MaxIterationsReached;
        let mut worker_failures = 0usize;

        for cycle in 1..=self.max_iterations {
            state.iteration = cycle;
            state.phase = Phase::Planning;
            info!("ORCHESTRATOR: cycle {cycle}/{}", self.max_iterations);

            let schema = SchemaSpec::array("items", vec![FieldSpec::new("subtask", "string")]);
            let plan_prompt = template::fill(PLAN_SUBTASKS_PROMPT, &[("task", &current_task)]);
            let raw = self
                .invoker
                .invoke_schema(&InvocationRequest::schema(plan_prompt, &model, schema))
                .await
                .into_result()?;
            let items = extract::extract_items(&extract::parse_json(&raw)?, "items")?;
            let subtasks: Vec<String> = items
                .iter()
                .filter_map(|item| item.get("subtask").or_else(|| item.get("value")))
                .map(str::to_string)
                .collect();

            state.phase = Phase::Executing;
            let requests: Vec<InvocationRequest> = subtasks
                .iter()
                .map(|subtask| {
                    let prompt = template::fill(
                        WORKER_PROMPT,
                        &[("task", current_task.as_str()), ("subtask", subtask.as_str())],
                    );
                    InvocationRequest::text(prompt, &model)
                })
                .collect();
            let results = mark_worker_failures(self.invoker.run_parallel(&requests).await);
            let failed = results.iter().filter(|r| !r.ok).count();
            if failed > 0 {
                warn!("ORCHESTRATOR: {failed} subtasks failed; siblings kept");
            }
            worker_failures += failed;
            state.output = label_results(&results, "Subtask");

            state.phase = Phase::Evaluating;
            let eval_prompt = template::fill(
                ORCHESTRATOR_EVAL_PROMPT,
                &[("task", current_task.as_str()), ("results", state.output.as_str())],
            );
            let evaluation = self
                .invoker
                .invoke(&InvocationRequest::text(eval_prompt, &model))
                .await
                .into_result()?;

            state.record(format!(
                "Cycle {cycle}: {} subtasks, evaluation: {evaluation}",
                subtasks.len()
            ));

            if evaluation.contains("complete") || evaluation.contains("done") {
                info!("ORCHESTRATOR: task completed on cycle {cycle}");
                exit_reason = ExitReason::TaskCompleted;
                state.phase = Phase::Done;
                break;
            }

            current_task = format!("Refine based on: {evaluation}");
        }

        Ok(ResultEnvelope::new("Dynamic Orchestrator", state.output.clone())
            .meta("cycles", state.iteration.to_string())
            .meta("worker_failures", worker_failures.to_string())
            .meta("exit_reason", exit_reason.as_str().to_string())
            .with_verbose_details(state.history_text()))
    }
}
