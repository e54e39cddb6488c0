//! ReAct step loop: each step is one schema call producing a thought and an
//! action, with the full textual history embedded in the prompt. A literal
//! "finish" action ends the loop.

use tracing::{info, warn};
use weave_core::{
    template, ExitReason, FieldSpec, InvocationRequest, ResultEnvelope, SchemaSpec, WeaveError,
};
use weave_llm::{extract, Invoker};

use crate::prompts::REACT_STEP_PROMPT;
use crate::{Phase, WorkflowState};

pub const DEFAULT_MAX_STEPS: usize = 10;

const REQUIRED_STEP_FIELDS: [&str; 3] = ["thought", "action", "confidence"];

pub struct ReactWorkflow {
    invoker: Invoker,
    max_steps: usize,
}

impl ReactWorkflow {
    pub fn new(invoker: Invoker) -> Self {
        Self { invoker, max_steps: DEFAULT_MAX_STEPS }
    }

    pub fn with_max_steps(mut self, max_steps: usize) -> Self {
        self.max_steps = max_steps;
        self
    }

    /// A failed invocation or a step missing required fields terminates the
    /// loop early; whatever history accumulated stays in the envelope's
    /// metadata so the caller can see how far the agent got.
    pub async fn run(&self, task: &str) -> Result<ResultEnvelope, WeaveError> {
        let model = self.invoker.config().model.clone();
        let mut state = WorkflowState::new(Phase::Acting);
        let mut exit_reason = ExitReason::MaxStepsReached;

        let schema = SchemaSpec::object(vec![
            FieldSpec::new("thought", "string"),
            FieldSpec::with_hint("action", "string", "use \"finish\" when the task is done"),
            FieldSpec::new("action_params", "string"),
            FieldSpec::with_hint("confidence", "number", "0.0 to 1.0"),
        ]);

        for step in 1..=self.max_steps {
            state.iteration = step;
            let history_text = if state.history.is_empty() {
                "(no steps yet)".to_string()
            } else {
                state.history_text()
            };
            let prompt = template::fill(
                REACT_STEP_PROMPT,
                &[("task", task), ("history", history_text.as_str())],
            );

            let result = self
                .invoker
                .invoke_schema(&InvocationRequest::schema(prompt, &model, schema.clone()))
                .await;
            let step_value = match result.into_result().and_then(|raw| {
                let value = extract::parse_json(&raw)?;
                extract::validate_required_fields(&value, &REQUIRED_STEP_FIELDS)?;
                Ok(value)
            }) {
                Ok(value) => value,
                Err(e) => {
                    warn!("REACT: step {step} aborted: {e}");
                    return Ok(self.failure_envelope(state, step, &e));
                }
            };

            let thought = extract::extract_field(&step_value, "thought")?;
            let action = extract::extract_field(&step_value, "action")?;
            let confidence = extract::extract_field(&step_value, "confidence")?;
            let action_params =
                extract::extract_field(&step_value, "action_params").unwrap_or_default();

            info!("REACT: step {step}: action {action} (confidence {confidence})");
            state.record(format!(
                "Step {step}: thought: {thought} | action: {action}({action_params}) | confidence: {confidence}"
            ));
            state.output = thought;

            if action.contains("finish") {
                exit_reason = ExitReason::TaskCompleted;
                state.phase = Phase::Done;
                break;
            }

            // Real tool dispatch belongs to the caller; the loop only records
            // that the action was requested.
            state.record(format!(
                "Observation: action '{action}' delegated to external tooling; no result available"
            ));
        }

        Ok(ResultEnvelope::new("ReAct Agent", state.output.clone())
            .meta("steps_completed", state.iteration.to_string())
            .meta("exit_reason", exit_reason.as_str().to_string())
            .with_verbose_details(state.history_text()))
    }

    fn failure_envelope(&self, state: WorkflowState, step: usize, error: &WeaveError) -> ResultEnvelope {
        ResultEnvelope::new("ReAct Agent", state.output.clone())
            .meta("steps_completed", (step - 1).to_string())
            .meta("error", error.to_string())
            .meta("history", state.history_text())
    }
}
