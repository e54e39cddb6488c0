use std::time::Instant;

use async_openai::{
    config::OpenAIConfig,
    types::{
        ChatCompletionRequestMessage, ChatCompletionRequestSystemMessageArgs,
        ChatCompletionRequestUserMessageArgs, CreateChatCompletionRequestArgs, ResponseFormat,
    },
    Client,
};
use async_trait::async_trait;
use tracing::info;
use weave_core::{InvocationRequest, SchemaKind, SchemaSpec, WeaveError};

fn model_err(e: impl ToString) -> WeaveError {
    WeaveError::Model(e.to_string())
}

/// One round-trip to the model service: prompt in, body out. The retry and
/// timeout policy lives above this seam, in the invoker.
#[async_trait]
pub trait ModelClient: Send + Sync {
    async fn complete(&self, request: &InvocationRequest) -> Result<String, WeaveError>;
}

/// OpenAI-backed client. Schema-constrained requests are sent with JSON
/// response format and the field specification rendered into the system
/// message; the model's compliance with it is not enforced here.
pub struct OpenAiClient {
    client: Client<OpenAIConfig>,
}

impl OpenAiClient {
    pub fn new() -> Self {
        Self { client: Client::new() }
    }
}

impl Default for OpenAiClient {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ModelClient for OpenAiClient {
    async fn complete(&self, request: &InvocationRequest) -> Result<String, WeaveError> {
        let start = Instant::now();

        let mut messages: Vec<ChatCompletionRequestMessage> = Vec::new();

        let system_text = system_text_for(request);
        if !system_text.is_empty() {
            messages.push(ChatCompletionRequestMessage::System(
                ChatCompletionRequestSystemMessageArgs::default()
                    .content(system_text)
                    .build()
                    .map_err(model_err)?,
            ));
        }
        messages.push(ChatCompletionRequestMessage::User(
            ChatCompletionRequestUserMessageArgs::default()
                .content(request.prompt.clone())
                .build()
                .map_err(model_err)?,
        ));

        let mut args = CreateChatCompletionRequestArgs::default();
        args.model(&request.model).messages(messages);
        if request.schema.is_some() {
            args.response_format(ResponseFormat::JsonObject);
        }
        let chat_request = args.build().map_err(model_err)?;

        let response = self
            .client
            .chat()
            .create(chat_request)
            .await
            .map_err(model_err)?;

        let (input_tokens, output_tokens) = response
            .usage
            .as_ref()
            .map(|u| (u.prompt_tokens, u.completion_tokens))
            .unwrap_or((0, 0));

        let content = response
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| WeaveError::Model("no response content".into()))?;

        info!(
            "MODEL: {}ms, tokens: {}/{} (in/out)",
            start.elapsed().as_millis(),
            input_tokens,
            output_tokens
        );

        Ok(content)
    }
}

/// Combines the caller's system prompt with the rendered schema contract.
fn system_text_for(request: &InvocationRequest) -> String {
    let mut parts: Vec<String> = Vec::new();
    if let Some(system) = &request.system_prompt {
        parts.push(system.clone());
    }
    if let Some(schema) = &request.schema {
        parts.push(render_schema(schema));
    }
    parts.join("\n\n")
}

fn render_schema(schema: &SchemaSpec) -> String {
    let fields = schema
        .fields
        .iter()
        .map(|f| match &f.hint {
            Some(hint) => format!("- {} ({}): {}", f.name, f.ty, hint),
            None => format!("- {} ({})", f.name, f.ty),
        })
        .collect::<Vec<_>>()
        .join("\n");

    match &schema.kind {
        SchemaKind::Object => format!(
            "Respond with a single JSON object containing these fields:\n{fields}"
        ),
        SchemaKind::Array { field } => format!(
            "Respond with a JSON object whose \"{field}\" field is an array of objects, each containing these fields:\n{fields}"
        ),
    }
}
