use anyhow::Result;
use async_trait::async_trait;
use serde_json::{json, Value};
use std::sync::Arc;
use std::sync::Mutex;

use crate::callbacks::ApiResponse;
use crate::models::message::Message;
use crate::providers::base::{Completion, Provider, Usage};

/// A mock provider that returns pre-configured responses for testing
pub struct MockProvider {
    responses: Arc<Mutex<Vec<Message>>>,
    requests: Arc<Mutex<Vec<Vec<Message>>>>,
}

impl MockProvider {
    /// Create a new mock provider with a sequence of responses
    pub fn new(responses: Vec<Message>) -> Self {
        Self {
            responses: Arc::new(Mutex::new(responses)),
            requests: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Handle onto the conversations this provider has been asked to complete
    pub fn requests(&self) -> Arc<Mutex<Vec<Vec<Message>>>> {
        Arc::clone(&self.requests)
    }
}

#[async_trait]
impl Provider for MockProvider {
    async fn complete(
        &self,
        _system: &str,
        messages: &[Message],
        _tools: &[Value],
    ) -> Result<Completion> {
        self.requests.lock().unwrap().push(messages.to_vec());

        let mut responses = self.responses.lock().unwrap();
        // Return empty response if no more pre-configured responses
        let message = if responses.is_empty() {
            Message::assistant().with_text("")
        } else {
            responses.remove(0)
        };

        let body = json!({
            "role": "assistant",
            "content": message.content,
            "usage": {"input_tokens": 10, "output_tokens": 5}
        });
        Ok(Completion {
            message,
            usage: Usage::new(Some(10), Some(5)),
            response: ApiResponse::new(200, body.to_string()),
        })
    }
}
