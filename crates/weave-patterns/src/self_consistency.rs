//! Self-consistency: fan out N independent samples of the same prompt, then
//! extract the consensus answer with one schema call.

use tracing::info;
use weave_core::{template, FieldSpec, InvocationRequest, ResultEnvelope, SchemaSpec, WeaveError};
use weave_llm::{extract, Invoker};

use crate::parallel::label_results;
use crate::prompts::CONSENSUS_PROMPT;

pub const DEFAULT_SAMPLES: usize = 3;

pub struct SelfConsistencyWorkflow {
    invoker: Invoker,
    samples: usize,
}

impl SelfConsistencyWorkflow {
    pub fn new(invoker: Invoker) -> Self {
        Self { invoker, samples: DEFAULT_SAMPLES }
    }

    pub fn with_samples(mut self, samples: usize) -> Self {
        self.samples = samples;
        self
    }

    pub async fn run(&self, prompt: &str, input: &str) -> Result<ResultEnvelope, WeaveError> {
        let model = self.invoker.config().model.clone();
        let filled = template::fill(prompt, &[("input", input)]);

        let requests: Vec<InvocationRequest> = (0..self.samples)
            .map(|_| InvocationRequest::text(filled.clone(), &model))
            .collect();
        let results = self.invoker.run_parallel(&requests).await;
        let candidates = label_results(&results, "Sample");

        info!("SELF-CONSISTENCY: {} samples collected", results.len());

        let schema = SchemaSpec::object(vec![
            FieldSpec::new("consensus", "string"),
            FieldSpec::with_hint("agreement", "string", "how strongly the samples agree"),
        ]);
        let consensus_prompt =
            template::fill(CONSENSUS_PROMPT, &[("candidates", candidates.as_str())]);
        let raw = self
            .invoker
            .invoke_schema(&InvocationRequest::schema(consensus_prompt, &model, schema))
            .await
            .into_result()?;

        let value = extract::parse_json(&raw)?;
        let consensus = extract::extract_field(&value, "consensus")?;
        let agreement =
            extract::extract_field(&value, "agreement").unwrap_or_else(|_| "unknown".into());

        Ok(ResultEnvelope::new("Self-Consistency", consensus)
            .meta("sample_count", self.samples.to_string())
            .meta("agreement", agreement)
            .with_verbose_details(candidates))
    }
}
