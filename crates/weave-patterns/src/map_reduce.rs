//! Map-reduce: plan subtasks with a schema-array call, map them as a
//! fan-out, then one reduce invocation over the collected outputs.

use tracing::{info, warn};
use weave_core::{template, FieldSpec, InvocationRequest, ResultEnvelope, SchemaSpec, WeaveError};
use weave_llm::{extract, Invoker};

use crate::parallel::{label_results, mark_worker_failures};
use crate::prompts::{PLAN_SUBTASKS_PROMPT, REDUCE_PROMPT, WORKER_PROMPT};

pub struct MapReduceWorkflow {
    invoker: Invoker,
}

impl MapReduceWorkflow {
    pub fn new(invoker: Invoker) -> Self {
        Self { invoker }
    }

    pub async fn run(&self, task: &str) -> Result<ResultEnvelope, WeaveError> {
        let model = self.invoker.config().model.clone();

        // Plan phase: split the task into subtask items.
        let schema = SchemaSpec::array(
            "items",
            vec![FieldSpec::new("subtask", "string")],
        );
        let plan_prompt = template::fill(PLAN_SUBTASKS_PROMPT, &[("task", task)]);
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
        info!("MAP-REDUCE: planned {} subtasks", subtasks.len());

        // Map phase: one branch per subtask, no cross-branch cancellation.
        let requests: Vec<InvocationRequest> = subtasks
            .iter()
            .map(|subtask| {
                let prompt =
                    template::fill(WORKER_PROMPT, &[("task", task), ("subtask", subtask.as_str())]);
                InvocationRequest::text(prompt, &model)
            })
            .collect();
        let results = mark_worker_failures(self.invoker.run_parallel(&requests).await);
        let failures = results.iter().filter(|r| !r.ok).count();
        if failures > 0 {
            warn!("MAP-REDUCE: {failures} subtasks failed; reducing the rest");
        }

        // Reduce phase: one final invocation over everything collected.
        let mapped = label_results(&results, "Subtask");
        let reduce_prompt =
            template::fill(REDUCE_PROMPT, &[("task", task), ("results", mapped.as_str())]);
        let reduced = self
            .invoker
            .invoke(&InvocationRequest::text(reduce_prompt, &model))
            .await
            .into_result()?;

        Ok(ResultEnvelope::new("Map-Reduce", reduced)
            .meta("subtask_count", subtasks.len().to_string())
            .meta("worker_failures", failures.to_string())
            .with_verbose_details(mapped))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::{test_invoker, ScriptedClient};

    #[tokio::test]
    async fn plans_maps_and_reduces() {
        let client = ScriptedClient::new(vec![
            Ok(r#"{"items": [{"subtask": "research"}, {"subtask": "draft"}]}"#.into()),
            Ok("research notes".into()),
            Ok("draft text".into()),
            Ok("final report".into()),
        ]);
        let workflow = MapReduceWorkflow::new(test_invoker(client.clone()));

        let envelope = workflow.run("write a report").await.unwrap();

        assert_eq!(envelope.primary_output, "final report");
        assert_eq!(envelope.metadata[0], ("subtask_count".into(), "2".into()));
        assert_eq!(envelope.metadata[1], ("worker_failures".into(), "0".into()));

        let prompts = client.prompts.lock().unwrap();
        assert!(prompts[1].contains("Your subtask: research"));
        assert!(prompts[2].contains("Your subtask: draft"));
        assert!(prompts[3].contains("research notes"));
        assert!(prompts[3].contains("draft text"));
    }

    #[tokio::test]
    async fn double_nested_plan_shape_is_accepted() {
        let client = ScriptedClient::new(vec![
            Ok(r#"{"type": "object", "properties": {"items": {"items": [{"subtask": "only"}]}}}"#
                .into()),
            Ok("done".into()),
            Ok("combined".into()),
        ]);
        let workflow = MapReduceWorkflow::new(test_invoker(client));

        let envelope = workflow.run("small task").await.unwrap();
        assert_eq!(envelope.metadata[0], ("subtask_count".into(), "1".into()));
    }

    #[tokio::test]
    async fn subtask_failure_still_reduces_siblings() {
        let client = ScriptedClient::new(vec![
            Ok(r#"{"items": [{"subtask": "a"}, {"subtask": "b"}]}"#.into()),
            Ok("a done".into()),
            Err(WeaveError::Model("worker down".into())),
            Ok("combined anyway".into()),
        ]);
        let workflow = MapReduceWorkflow::new(test_invoker(client));

        let envelope = workflow.run("task").await.unwrap();
        assert_eq!(envelope.primary_output, "combined anyway");
        assert_eq!(envelope.metadata[1], ("worker_failures".into(), "1".into()));
    }

    #[tokio::test]
    async fn planless_response_fails_with_no_array() {
        let client = ScriptedClient::new(vec![Ok(r#"{"items": "not a list"}"#.into())]);
        let workflow = MapReduceWorkflow::new(test_invoker(client));

        assert!(matches!(
            workflow.run("task").await,
            Err(WeaveError::NoArrayFound(_))
        ));
    }
}
