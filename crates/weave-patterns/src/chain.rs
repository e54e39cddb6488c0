//! Sequential chain: each step's prompt may reference the external input and
//! the previous step's output.

use tracing::info;
use weave_core::{template, InvocationRequest, ResultEnvelope, WeaveError};
use weave_llm::Invoker;

pub struct ChainWorkflow {
    invoker: Invoker,
}

impl ChainWorkflow {
    pub fn new(invoker: Invoker) -> Self {
        Self { invoker }
    }

    /// Runs the step templates in order. A step failure is fatal; there is
    /// nothing meaningful to chain after a hole.
    pub async fn run(&self, steps: &[String], input: &str) -> Result<ResultEnvelope, WeaveError> {
        let model = self.invoker.config().model.clone();
        let mut previous = input.to_string();
        let mut trace: Vec<String> = Vec::new();

        for (i, step) in steps.iter().enumerate() {
            info!("CHAIN: step {}/{}", i + 1, steps.len());
            let prompt = template::fill(step, &[("input", input), ("previous", previous.as_str())]);
            let result = self
                .invoker
                .invoke(&InvocationRequest::text(prompt, &model))
                .await;
            previous = result.into_result()?;
            trace.push(format!("Step {}:\n{}", i + 1, previous));
        }

        Ok(ResultEnvelope::new("Sequential Chain", previous)
            .meta("steps_completed", steps.len().to_string())
            .meta("model", model)
            .with_verbose_details(trace.join("\n\n")))
    }
}
