//! The contract between a driver and an agentic sampling loop
//!
//! A driver hands the loop its configuration, a conversation it may extend, and
//! a set of [`Callbacks`]. The loop owns every model and tool round trip until
//! the model stops requesting tools. [`AnthropicSamplingLoop`] is the loop
//! this crate ships; anything implementing [`SamplingLoop`] can stand in for it.
use anyhow::{bail, Result};
use async_trait::async_trait;
use chrono::Local;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use strum_macros::{Display, EnumString};

use crate::agent::Agent;
use crate::callbacks::Callbacks;
use crate::models::message::Message;
use crate::prompt::system_prompt;
use crate::providers::anthropic::COMPUTER_USE_BETA;
use crate::providers::configs::{AnthropicProviderConfig, ProviderConfig};
use crate::providers::factory::get_provider;
use crate::tools::ToolCollection;

/// Which hosted API serves the model
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum ApiProvider {
    Anthropic,
}

/// Everything a sampling loop needs besides the conversation and callbacks
#[derive(Debug, Clone)]
pub struct SamplingParams {
    pub model: String,
    pub provider: ApiProvider,
    pub system_prompt_suffix: String,
    pub api_key: String,
    /// Keep only this many of the most recent screenshots in the context
    pub only_n_most_recent_images: Option<usize>,
    pub max_tokens: u32,
}

#[async_trait]
pub trait SamplingLoop: Send + Sync {
    /// Run until the model stops requesting tools, appending every turn to `messages`
    async fn run(
        &self,
        params: SamplingParams,
        messages: &mut Vec<Message>,
        callbacks: &Callbacks,
    ) -> Result<()>;
}

/// Sampling loop backed by the Anthropic messages API and the computer use tools
pub struct AnthropicSamplingLoop {
    host: String,
    tools: Arc<ToolCollection>,
}

impl AnthropicSamplingLoop {
    pub fn new<S: Into<String>>(host: S, tools: ToolCollection) -> Self {
        Self {
            host: host.into(),
            tools: Arc::new(tools),
        }
    }
}

#[async_trait]
impl SamplingLoop for AnthropicSamplingLoop {
    async fn run(
        &self,
        params: SamplingParams,
        messages: &mut Vec<Message>,
        callbacks: &Callbacks,
    ) -> Result<()> {
        if messages.is_empty() {
            bail!("Cannot start sampling without any messages");
        }

        let config = match params.provider {
            ApiProvider::Anthropic => ProviderConfig::Anthropic(
                AnthropicProviderConfig::new(params.api_key, &params.model, params.max_tokens)
                    .with_host(&self.host)
                    .with_beta(COMPUTER_USE_BETA),
            ),
        };

        tracing::info!(model = %params.model, provider = %params.provider, "starting sampling loop");
        let agent = Agent::new(get_provider(config)?, Arc::clone(&self.tools))
            .with_system_prompt(system_prompt(Local::now(), &params.system_prompt_suffix))
            .with_image_limit(params.only_n_most_recent_images);

        agent.reply(messages, callbacks).await
    }
}
