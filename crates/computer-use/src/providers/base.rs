use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::callbacks::ApiResponse;
use crate::models::message::Message;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Usage {
    pub input_tokens: Option<u64>,
    pub output_tokens: Option<u64>,
}

impl Usage {
    pub fn new(input_tokens: Option<u64>, output_tokens: Option<u64>) -> Self {
        Self {
            input_tokens,
            output_tokens,
        }
    }

    /// Read the `usage` object of a messages API response body
    pub fn from_response(body: &Value) -> Self {
        let usage = &body["usage"];
        Self::new(
            usage.get("input_tokens").and_then(|v| v.as_u64()),
            usage.get("output_tokens").and_then(|v| v.as_u64()),
        )
    }
}

/// One model turn: the parsed message plus the raw response it came from
#[derive(Debug, Clone)]
pub struct Completion {
    pub message: Message,
    pub usage: Usage,
    pub response: ApiResponse,
}

/// Base trait for AI providers
#[async_trait]
pub trait Provider: Send + Sync {
    /// Generate the next message
    ///
    /// `tools` are passed through verbatim as the request's tool list; an empty
    /// `system` prompt is omitted from the request.
    async fn complete(
        &self,
        system: &str,
        messages: &[Message],
        tools: &[Value],
    ) -> Result<Completion>;
}
