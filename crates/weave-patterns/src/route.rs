//! Classifier-based routing: one schema call picks a handler by name, the
//! chosen handler's prompt runs against the input.

use tracing::info;
use weave_core::{template, FieldSpec, InvocationRequest, ResultEnvelope, SchemaSpec, WeaveError};
use weave_llm::{extract, Invoker};

use crate::prompts::ROUTER_SYSTEM_PROMPT;

/// A named destination with its prompt template (`{{input}}` placeholder).
pub struct RouteHandler {
    pub name: String,
    pub prompt: String,
}

impl RouteHandler {
    pub fn new(name: impl Into<String>, prompt: impl Into<String>) -> Self {
        Self { name: name.into(), prompt: prompt.into() }
    }
}

pub struct RouterWorkflow {
    invoker: Invoker,
    handlers: Vec<RouteHandler>,
}

impl RouterWorkflow {
    pub fn new(invoker: Invoker, handlers: Vec<RouteHandler>) -> Self {
        Self { invoker, handlers }
    }

    pub async fn run(&self, input: &str) -> Result<ResultEnvelope, WeaveError> {
        let model = self.invoker.config().model.clone();

        let names: Vec<&str> = self.handlers.iter().map(|h| h.name.as_str()).collect();
        let classify_prompt = format!(
            "Available handlers: {}\n\nRequest:\n{input}",
            names.join(", ")
        );
        let schema = SchemaSpec::object(vec![
            FieldSpec::new("route", "string"),
            FieldSpec::with_hint("confidence", "number", "0.0 to 1.0"),
            FieldSpec::new("reasoning", "string"),
        ]);

        let raw = self
            .invoker
            .invoke_schema(
                &InvocationRequest::schema(classify_prompt, &model, schema)
                    .with_system_prompt(ROUTER_SYSTEM_PROMPT),
            )
            .await
            .into_result()?;

        let value = extract::parse_json(&raw)?;
        let route = extract::extract_field(&value, "route")?;
        let confidence =
            extract::extract_field(&value, "confidence").unwrap_or_else(|_| "unknown".into());

        info!("ROUTER: selected {route} (confidence {confidence})");

        let handler = self
            .handlers
            .iter()
            .find(|h| h.name == route)
            .ok_or_else(|| WeaveError::RouteNotMatched(route.clone()))?;

        let prompt = template::fill(&handler.prompt, &[("input", input)]);
        let output = self
            .invoker
            .invoke(&InvocationRequest::text(prompt, &model))
            .await
            .into_result()?;

        Ok(ResultEnvelope::new("Router", output)
            .meta("route", route)
            .meta("confidence", confidence))
    }
}
