//! Scripted model clients for pattern tests.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use weave_config::WeaveConfig;
use weave_core::{InvocationRequest, WeaveError};
use weave_llm::{Invoker, ModelClient};

/// Returns canned responses in order and counts every call.
pub struct ScriptedClient {
    responses: Mutex<VecDeque<Result<String, WeaveError>>>,
    pub calls: AtomicUsize,
    pub prompts: Mutex<Vec<String>>,
}

impl ScriptedClient {
    pub fn new(responses: Vec<Result<String, WeaveError>>) -> Arc<Self> {
        Arc::new(Self {
            responses: Mutex::new(responses.into_iter().collect()),
            calls: AtomicUsize::new(0),
            prompts: Mutex::new(Vec::new()),
        })
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ModelClient for ScriptedClient {
    async fn complete(&self, request: &InvocationRequest) -> Result<String, WeaveError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.prompts.lock().unwrap().push(request.prompt.clone());
        self.responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(Err(WeaveError::Model("script exhausted".into())))
    }
}

/// An invoker with no backoff so failing-path tests stay fast.
pub fn test_invoker(client: Arc<ScriptedClient>) -> Invoker {
    let config = WeaveConfig { backoff_secs: 0, max_retries: 1, ..WeaveConfig::default() };
    Invoker::new(client, config)
}
