use anyhow::{anyhow, Result};
use async_trait::async_trait;
use computer_use::callbacks::{ApiResponse, Callbacks};
use computer_use::models::message::Message;
use computer_use::providers::base::{Completion, Provider, Usage};
use computer_use::sampling::{SamplingLoop, SamplingParams};
use serde_json::Value;
use std::sync::{Arc, Mutex};

// The provider mock in the library is only compiled for its own tests, so the
// driver keeps its own minimal recording doubles here.

/// Records every conversation it is asked to complete and answers with an empty turn
pub struct RecordingProvider {
    requests: Arc<Mutex<Vec<Vec<Message>>>>,
}

impl RecordingProvider {
    pub fn new(requests: Arc<Mutex<Vec<Vec<Message>>>>) -> Self {
        Self { requests }
    }
}

#[async_trait]
impl Provider for RecordingProvider {
    async fn complete(
        &self,
        _system: &str,
        messages: &[Message],
        _tools: &[Value],
    ) -> Result<Completion> {
        self.requests.lock().unwrap().push(messages.to_vec());
        Ok(Completion {
            message: Message::assistant().with_text("Hello"),
            usage: Usage::default(),
            response: ApiResponse::new(200, r#"{"content": [{"type": "text", "text": "Hello"}]}"#),
        })
    }
}

/// Fails every request the way a rejected API key would
pub struct FailingProvider;

#[async_trait]
impl Provider for FailingProvider {
    async fn complete(
        &self,
        _system: &str,
        _messages: &[Message],
        _tools: &[Value],
    ) -> Result<Completion> {
        Err(anyhow!("Request failed: 401 Unauthorized - invalid x-api-key"))
    }
}

type Calls = Arc<Mutex<Vec<(SamplingParams, Vec<Message>)>>>;

/// Records each invocation, then appends one assistant turn or fails
#[derive(Default)]
pub struct RecordingSamplingLoop {
    calls: Calls,
    fail: bool,
}

impl RecordingSamplingLoop {
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Default::default()
        }
    }

    pub fn calls(&self) -> Calls {
        Arc::clone(&self.calls)
    }
}

#[async_trait]
impl SamplingLoop for RecordingSamplingLoop {
    async fn run(
        &self,
        params: SamplingParams,
        messages: &mut Vec<Message>,
        _callbacks: &Callbacks,
    ) -> Result<()> {
        self.calls
            .lock()
            .unwrap()
            .push((params, messages.clone()));
        if self.fail {
            return Err(anyhow!("model stopped responding"));
        }
        messages.push(Message::assistant().with_text("Done."));
        Ok(())
    }
}
