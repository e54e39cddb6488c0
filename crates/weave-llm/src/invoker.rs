//! Resilient invocation layer: per-call timeout, bounded retry with fixed
//! backoff, and order-preserving fan-out.

use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use tokio::time::{sleep, timeout};
use tracing::{debug, info, warn};
use weave_config::WeaveConfig;
use weave_core::{ErrorKind, InvocationRequest, InvocationResult};

use crate::client::ModelClient;
use crate::extract;

const PREVIEW_CHARS: usize = 500;

/// Wraps a [`ModelClient`] with the retry/timeout policy. All workflow
/// patterns issue their calls through one of these.
#[derive(Clone)]
pub struct Invoker {
    client: Arc<dyn ModelClient>,
    config: WeaveConfig,
}

impl Invoker {
    pub fn new(client: Arc<dyn ModelClient>, config: WeaveConfig) -> Self {
        Self { client, config }
    }

    pub fn config(&self) -> &WeaveConfig {
        &self.config
    }

    /// Free-text invocation.
    pub async fn invoke(&self, request: &InvocationRequest) -> InvocationResult {
        self.attempt_loop(request, false).await
    }

    /// Schema-constrained invocation: a syntactically invalid JSON body is a
    /// retry trigger, same as a transport failure.
    pub async fn invoke_schema(&self, request: &InvocationRequest) -> InvocationResult {
        self.attempt_loop(request, true).await
    }

    async fn attempt_loop(&self, request: &InvocationRequest, require_json: bool) -> InvocationResult {
        let mut last_error = String::new();
        let mut last_kind = ErrorKind::InvocationExhausted;

        for attempt in 1..=self.config.max_retries {
            if self.config.verbose {
                debug!("INVOKE [{attempt}]: prompt: {}", preview(&request.prompt));
            }

            match self.single_attempt(request, require_json).await {
                Ok(body) => {
                    if self.config.verbose {
                        debug!("INVOKE [{attempt}]: response: {}", preview(&body));
                    }
                    return InvocationResult::ok(body);
                }
                Err((kind, message)) => {
                    warn!(
                        "INVOKE: attempt {attempt}/{} failed: {message}",
                        self.config.max_retries
                    );
                    last_error = message;
                    last_kind = kind;
                }
            }

            if attempt < self.config.max_retries {
                sleep(Duration::from_secs(self.config.backoff_secs)).await;
            }
        }

        info!("INVOKE: retries exhausted");
        InvocationResult::err(last_kind, last_error)
    }

    async fn single_attempt(
        &self,
        request: &InvocationRequest,
        require_json: bool,
    ) -> Result<String, (ErrorKind, String)> {
        let call = self.client.complete(request);
        let budget = Duration::from_secs(self.config.timeout_secs);

        let body = match timeout(budget, call).await {
            Ok(Ok(body)) => body,
            Ok(Err(e)) => return Err((ErrorKind::InvocationExhausted, e.to_string())),
            Err(_) => {
                return Err((
                    ErrorKind::InvocationExhausted,
                    format!("timed out after {}s", self.config.timeout_secs),
                ))
            }
        };

        if require_json {
            if let Err(e) = extract::parse_json(&body) {
                return Err((ErrorKind::InvalidJson, e.to_string()));
            }
        }

        Ok(body)
    }

    /// Fan-out/fan-in: launches every request before awaiting any of them and
    /// returns results in submission order regardless of completion order.
    /// A branch failure never cancels siblings; each slot carries its own
    /// success or recorded failure.
    pub async fn run_parallel(&self, requests: &[InvocationRequest]) -> Vec<InvocationResult> {
        info!("FAN-OUT: launching {} branches", requests.len());

        let branches = requests.iter().map(|request| async move {
            if request.schema.is_some() {
                self.invoke_schema(request).await
            } else {
                self.invoke(request).await
            }
        });

        let results = join_all(branches).await;

        let failures = results.iter().filter(|r| !r.ok).count();
        info!("FAN-IN: {} branches complete, {failures} failed", results.len());
        results
    }
}

fn preview(text: &str) -> String {
    text.chars().take(PREVIEW_CHARS).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;
    use weave_core::{FieldSpec, SchemaSpec, WeaveError};

    /// Pops one canned response per call and counts calls.
    struct ScriptedClient {
        responses: Mutex<VecDeque<Result<String, WeaveError>>>,
        calls: AtomicUsize,
    }

    impl ScriptedClient {
        fn new(responses: Vec<Result<String, WeaveError>>) -> Self {
            Self {
                responses: Mutex::new(responses.into_iter().collect()),
                calls: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl ModelClient for ScriptedClient {
        async fn complete(&self, _request: &InvocationRequest) -> Result<String, WeaveError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.responses
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or(Err(WeaveError::Model("script exhausted".into())))
        }
    }

    /// Sleeps for a per-prompt delay before echoing the prompt back.
    struct DelayClient;

    #[async_trait]
    impl ModelClient for DelayClient {
        async fn complete(&self, request: &InvocationRequest) -> Result<String, WeaveError> {
            let delay_ms: u64 = request.prompt.parse().unwrap();
            sleep(Duration::from_millis(delay_ms)).await;
            Ok(format!("done:{}", request.prompt))
        }
    }

    fn test_config() -> WeaveConfig {
        WeaveConfig { timeout_secs: 5, ..WeaveConfig::default() }
    }

    #[tokio::test(start_paused = true)]
    async fn succeeds_on_third_attempt_with_two_backoffs() {
        let client = Arc::new(ScriptedClient::new(vec![
            Err(WeaveError::Model("transient".into())),
            Err(WeaveError::Model("transient".into())),
            Ok("recovered".into()),
        ]));
        let invoker = Invoker::new(client.clone(), test_config());

        let started = tokio::time::Instant::now();
        let result = invoker
            .invoke(&InvocationRequest::text("hello", "test-model"))
            .await;

        assert!(result.ok);
        assert_eq!(result.raw_text, "recovered");
        assert_eq!(client.calls.load(Ordering::SeqCst), 3);
        // Two backoff delays of 2s each; no backoff after the final attempt.
        assert_eq!(started.elapsed(), Duration::from_secs(4));
    }

    #[tokio::test(start_paused = true)]
    async fn exhaustion_carries_the_last_error_text() {
        let client = Arc::new(ScriptedClient::new(vec![
            Err(WeaveError::Model("first".into())),
            Err(WeaveError::Model("second".into())),
            Err(WeaveError::Model("third".into())),
        ]));
        let invoker = Invoker::new(client, test_config());

        let result = invoker
            .invoke(&InvocationRequest::text("hello", "test-model"))
            .await;

        assert!(!result.ok);
        assert_eq!(result.error_kind, Some(ErrorKind::InvocationExhausted));
        assert!(result.raw_text.contains("third"));
    }

    #[tokio::test(start_paused = true)]
    async fn invalid_json_is_a_retry_trigger_for_schema_calls() {
        let client = Arc::new(ScriptedClient::new(vec![
            Ok("not json at all".into()),
            Ok("{\"route\": \"billing\"}".into()),
        ]));
        let invoker = Invoker::new(client.clone(), test_config());

        let schema = SchemaSpec::object(vec![FieldSpec::new("route", "string")]);
        let result = invoker
            .invoke_schema(&InvocationRequest::schema("classify", "test-model", schema))
            .await;

        assert!(result.ok);
        assert_eq!(client.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn unparseable_final_attempt_reports_invalid_json() {
        let client = Arc::new(ScriptedClient::new(vec![
            Ok("garbage 1".into()),
            Ok("garbage 2".into()),
            Ok("garbage 3".into()),
        ]));
        let invoker = Invoker::new(client, test_config());

        let schema = SchemaSpec::object(vec![FieldSpec::new("route", "string")]);
        let result = invoker
            .invoke_schema(&InvocationRequest::schema("classify", "test-model", schema))
            .await;

        assert!(!result.ok);
        assert_eq!(result.error_kind, Some(ErrorKind::InvalidJson));
    }

    #[tokio::test(start_paused = true)]
    async fn timeout_counts_as_a_failed_attempt() {
        let invoker = Invoker::new(
            Arc::new(DelayClient),
            WeaveConfig { timeout_secs: 1, max_retries: 2, ..WeaveConfig::default() },
        );

        // 10s of work against a 1s budget on every attempt.
        let result = invoker
            .invoke(&InvocationRequest::text("10000", "test-model"))
            .await;

        assert!(!result.ok);
        assert_eq!(result.error_kind, Some(ErrorKind::InvocationExhausted));
        assert!(result.raw_text.contains("timed out"));
    }

    #[tokio::test(start_paused = true)]
    async fn fan_in_order_matches_submission_order() {
        let invoker = Invoker::new(Arc::new(DelayClient), test_config());

        // Deliberately decreasing latencies so completion order inverts
        // submission order.
        let delays = ["400", "250", "300", "10", "120"];
        let requests: Vec<InvocationRequest> = delays
            .iter()
            .map(|d| InvocationRequest::text(*d, "test-model"))
            .collect();

        let results = invoker.run_parallel(&requests).await;

        assert_eq!(results.len(), delays.len());
        for (i, delay) in delays.iter().enumerate() {
            assert!(results[i].ok);
            assert_eq!(results[i].raw_text, format!("done:{delay}"));
        }
    }

    #[tokio::test(start_paused = true)]
    async fn branch_failure_does_not_cancel_siblings() {
        struct MixedClient;

        #[async_trait]
        impl ModelClient for MixedClient {
            async fn complete(&self, request: &InvocationRequest) -> Result<String, WeaveError> {
                if request.prompt == "fail" {
                    Err(WeaveError::Model("branch down".into()))
                } else {
                    Ok(request.prompt.clone())
                }
            }
        }

        let invoker = Invoker::new(
            Arc::new(MixedClient),
            WeaveConfig { max_retries: 1, ..WeaveConfig::default() },
        );

        let requests = vec![
            InvocationRequest::text("a", "test-model"),
            InvocationRequest::text("fail", "test-model"),
            InvocationRequest::text("c", "test-model"),
        ];
        let results = invoker.run_parallel(&requests).await;

        assert!(results[0].ok);
        assert!(!results[1].ok);
        assert_eq!(results[1].error_kind, Some(ErrorKind::InvocationExhausted));
        assert!(results[2].ok);
    }
}
