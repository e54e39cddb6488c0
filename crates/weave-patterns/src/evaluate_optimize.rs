//! Evaluate-optimize loop: generate once, then alternate schema-constrained
//! evaluation and optimization until the output passes or the iteration
//! budget runs out.

use tracing::info;
use weave_core::{
    template, ExitReason, FieldSpec, InvocationRequest, ResultEnvelope, SchemaSpec, WeaveError,
};
use weave_llm::{extract, Invoker};

use crate::prompts::{EVALUATE_OUTPUT_PROMPT, GENERATE_PROMPT, OPTIMIZE_OUTPUT_PROMPT};
use crate::{Phase, WorkflowState};

pub const DEFAULT_MAX_ITERATIONS: usize = 3;
pub const DEFAULT_QUALITY_THRESHOLD: f64 = 8.0;

pub struct EvaluateOptimizeWorkflow {
    invoker: Invoker,
    max_iterations: usize,
    threshold: f64,
}

impl EvaluateOptimizeWorkflow {
    pub fn new(invoker: Invoker) -> Self {
        Self {
            invoker,
            max_iterations: DEFAULT_MAX_ITERATIONS,
            threshold: DEFAULT_QUALITY_THRESHOLD,
        }
    }

    pub fn with_max_iterations(mut self, max_iterations: usize) -> Self {
        self.max_iterations = max_iterations;
        self
    }

    pub fn with_threshold(mut self, threshold: f64) -> Self {
        self.threshold = threshold;
        self
    }

    /// Any evaluation or optimization failure propagates immediately; the
    /// invocation layer has already spent its retries.
    pub async fn run(&self, task: &str) -> Result<ResultEnvelope, WeaveError> {
        let model = self.invoker.config().model.clone();
        let mut state = WorkflowState::new(Phase::Generating);

        let generate_prompt = template::fill(GENERATE_PROMPT, &[("task", task)]);
        state.output = self
            .invoker
            .invoke(&InvocationRequest::text(generate_prompt, &model))
            .await
            .into_result()?;

        let mut exit_reason = ExitReason::MaxIterationsReached;
        let mut last_score = String::from("unscored");

        for iteration in 1..=self.max_iterations {
            state.iteration = iteration;
            state.phase = Phase::Evaluating;

            let eval_schema = SchemaSpec::object(vec![
                FieldSpec::with_hint("quality_score", "number", "0 to 10"),
                FieldSpec::new("meets_criteria", "boolean"),
                FieldSpec::new("issues", "string"),
                FieldSpec::new("suggestions", "string"),
            ]);
            let eval_prompt = template::fill(
                EVALUATE_OUTPUT_PROMPT,
                &[("task", task), ("output", state.output.as_str())],
            );
            let raw = self
                .invoker
                .invoke_schema(&InvocationRequest::schema(eval_prompt, &model, eval_schema))
                .await
                .into_result()?;
            let evaluation = extract::parse_json(&raw)?;

            let score = extract::extract_field(&evaluation, "quality_score")
                .ok()
                .and_then(|s| s.parse::<f64>().ok())
                .unwrap_or(0.0);
            let meets_criteria = extract::extract_field(&evaluation, "meets_criteria")
                .map(|v| v == "true")
                .unwrap_or(false);
            last_score = format!("{score}");
            state.record(format!(
                "Iteration {iteration}: score {score}, meets_criteria {meets_criteria}"
            ));
            info!("EVALUATE: iteration {iteration}, score {score}/{}", self.threshold);

            // Either condition alone ends the loop.
            if score >= self.threshold || meets_criteria {
                exit_reason = ExitReason::TaskCompleted;
                state.phase = Phase::Done;
                break;
            }

            state.phase = Phase::Optimizing;
            let issues = extract::extract_field(&evaluation, "issues").unwrap_or_default();
            let suggestions =
                extract::extract_field(&evaluation, "suggestions").unwrap_or_default();

            let optimize_schema = SchemaSpec::object(vec![
                FieldSpec::new("improved_output", "string"),
                FieldSpec::new("changes_made", "string"),
                FieldSpec::with_hint("improvement_score", "number", "0 to 10"),
            ]);
            let optimize_prompt = template::fill(
                OPTIMIZE_OUTPUT_PROMPT,
                &[
                    ("task", task),
                    ("output", state.output.as_str()),
                    ("issues", issues.as_str()),
                    ("suggestions", suggestions.as_str()),
                ],
            );
            let raw = self
                .invoker
                .invoke_schema(&InvocationRequest::schema(optimize_prompt, &model, optimize_schema))
                .await
                .into_result()?;
            let optimization = extract::parse_json(&raw)?;

            state.output = extract::extract_field(&optimization, "improved_output")?;
            let changes = extract::extract_field(&optimization, "changes_made").unwrap_or_default();
            state.record(format!("Iteration {iteration}: optimized ({changes})"));
            info!("OPTIMIZE: iteration {iteration} applied");
        }

        Ok(ResultEnvelope::new("Evaluate-Optimize", state.output.clone())
            .meta("iterations", state.iteration.to_string())
            .meta("final_score", last_score)
            .meta("exit_reason", exit_reason.as_str().to_string())
            .with_verbose_details(state.history_text()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::{test_invoker, ScriptedClient};

    #[tokio::test]
    async fn high_score_ends_the_loop_without_optimizing() {
        let client = ScriptedClient::new(vec![
            Ok("first draft".into()),
            Ok(r#"{"quality_score": 9.1, "meets_criteria": false, "issues": "", "suggestions": ""}"#.into()),
        ]);
        let workflow = EvaluateOptimizeWorkflow::new(test_invoker(client.clone()));

        let envelope = workflow.run("write a haiku").await.unwrap();

        assert_eq!(envelope.primary_output, "first draft");
        assert_eq!(envelope.metadata[2], ("exit_reason".into(), "task_completed".into()));
        // generate + one evaluation, nothing else
        assert_eq!(client.call_count(), 2);
    }

    #[tokio::test]
    async fn meets_criteria_alone_is_sufficient() {
        let client = ScriptedClient::new(vec![
            Ok("draft".into()),
            Ok(r#"{"quality_score": 2.0, "meets_criteria": true, "issues": "", "suggestions": ""}"#.into()),
        ]);
        let workflow = EvaluateOptimizeWorkflow::new(test_invoker(client));

        let envelope = workflow.run("task").await.unwrap();
        assert_eq!(envelope.metadata[2], ("exit_reason".into(), "task_completed".into()));
    }

    #[tokio::test]
    async fn optimized_output_replaces_the_current_output() {
        let client = ScriptedClient::new(vec![
            Ok("weak draft".into()),
            Ok(r#"{"quality_score": 4, "meets_criteria": false, "issues": "too vague", "suggestions": "be specific"}"#.into()),
            Ok(r#"{"improved_output": "strong draft", "changes_made": "added detail", "improvement_score": 7}"#.into()),
            Ok(r#"{"quality_score": 8.5, "meets_criteria": true, "issues": "", "suggestions": ""}"#.into()),
        ]);
        let workflow = EvaluateOptimizeWorkflow::new(test_invoker(client.clone()));

        let envelope = workflow.run("task").await.unwrap();

        assert_eq!(envelope.primary_output, "strong draft");
        assert_eq!(envelope.metadata[0], ("iterations".into(), "2".into()));
        let prompts = client.prompts.lock().unwrap();
        assert!(prompts[2].contains("too vague"));
        assert!(prompts[2].contains("be specific"));
    }

    #[tokio::test]
    async fn exhausting_the_budget_reports_max_iterations() {
        let low_eval = r#"{"quality_score": 3, "meets_criteria": false, "issues": "x", "suggestions": "y"}"#;
        let optimize = r#"{"improved_output": "try again", "changes_made": "tweak", "improvement_score": 4}"#;
        let client = ScriptedClient::new(vec![
            Ok("draft".into()),
            Ok(low_eval.into()),
            Ok(optimize.into()),
            Ok(low_eval.into()),
            Ok(optimize.into()),
            Ok(low_eval.into()),
            Ok(optimize.into()),
        ]);
        let workflow = EvaluateOptimizeWorkflow::new(test_invoker(client));

        let envelope = workflow.run("task").await.unwrap();
        assert_eq!(
            envelope.metadata[2],
            ("exit_reason".into(), "max_iterations_reached".into())
        );
        assert_eq!(envelope.metadata[0], ("iterations".into(), "3".into()));
    }

    #[tokio::test]
    async fn evaluation_failure_is_workflow_fatal() {
        let client = ScriptedClient::new(vec![
            Ok("draft".into()),
            Err(WeaveError::Model("evaluator down".into())),
        ]);
        let workflow = EvaluateOptimizeWorkflow::new(test_invoker(client));

        assert!(workflow.run("task").await.is_err());
    }
}
