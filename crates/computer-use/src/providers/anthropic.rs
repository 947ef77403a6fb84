use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use reqwest::StatusCode;
use serde_json::{json, Value};
use std::time::Duration;
use url::Url;

use super::base::{Completion, Provider, Usage};
use super::configs::AnthropicProviderConfig;
use crate::callbacks::ApiResponse;
use crate::models::content::MessageContent;
use crate::models::message::Message;

pub const ANTHROPIC_VERSION: &str = "2023-06-01";
pub const COMPUTER_USE_BETA: &str = "computer-use-2024-10-22";

pub struct AnthropicProvider {
    client: Client,
    endpoint: Url,
    config: AnthropicProviderConfig,
}

impl AnthropicProvider {
    pub fn new(config: AnthropicProviderConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(600)) // 10 minutes timeout
            .build()?;

        let endpoint = Url::parse(&format!(
            "{}/v1/messages",
            config.host.trim_end_matches('/')
        ))
        .with_context(|| format!("Invalid Anthropic host: {}", config.host))?;

        Ok(Self {
            client,
            endpoint,
            config,
        })
    }

    fn payload(&self, system: &str, messages: &[Message], tools: &[Value]) -> Value {
        let messages: Vec<Message> = messages.iter().map(Message::sendable).collect();
        let mut payload = json!({
            "model": self.config.model,
            "max_tokens": self.config.max_tokens,
            "messages": messages,
        });

        if !system.is_empty() {
            payload["system"] = json!(system);
        }
        if !tools.is_empty() {
            payload["tools"] = json!(tools);
        }
        payload
    }

    async fn post(&self, payload: Value) -> Result<ApiResponse> {
        let mut request = self
            .client
            .post(self.endpoint.clone())
            .header("x-api-key", &self.config.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION);
        if !self.config.betas.is_empty() {
            request = request.header("anthropic-beta", self.config.betas.join(","));
        }

        let response = request.json(&payload).send().await?;
        let status = response.status();
        let body = response.text().await?;

        match status {
            StatusCode::OK => Ok(ApiResponse::new(status.as_u16(), body)),
            status if status == StatusCode::TOO_MANY_REQUESTS || status.as_u16() >= 500 => {
                Err(anyhow!("Server error: {} - {}", status, body))
            }
            _ => Err(anyhow!("Request failed: {} - {}", status, body)),
        }
    }
}

#[async_trait]
impl Provider for AnthropicProvider {
    async fn complete(
        &self,
        system: &str,
        messages: &[Message],
        tools: &[Value],
    ) -> Result<Completion> {
        let payload = self.payload(system, messages, tools);
        let response = self.post(payload).await?;

        let body = response
            .json()
            .context("Invalid response format from Anthropic API")?;
        let content: Vec<MessageContent> = body
            .get("content")
            .cloned()
            .map(serde_json::from_value)
            .transpose()?
            .ok_or_else(|| anyhow!("Invalid response format from Anthropic API: missing content"))?;

        let message = Message {
            content,
            ..Message::assistant()
        };
        let usage = Usage::from_response(&body);

        Ok(Completion {
            message,
            usage,
            response,
        })
    }
}
