use anyhow::{Context, Result};
use computer_use::models::message::Message;
use computer_use::providers::base::Provider;
use computer_use::providers::configs::ProviderConfig;
use computer_use::providers::factory::get_provider;
use computer_use::sampling::{SamplingLoop, SamplingParams};
use std::sync::Arc;

use crate::callbacks::setup_callbacks;
use crate::config::{get_api_key, Settings};
use crate::screenshot::ScreenshotSink;
use crate::telemetry::Telemetry;

#[cfg(test)]
mod mock;

pub type ProviderFactory = Box<dyn Fn(ProviderConfig) -> Result<Box<dyn Provider>> + Send + Sync>;

/// One run of the driver: a single instruction handed to the sampling loop
pub struct Session {
    settings: Settings,
    sampling: Box<dyn SamplingLoop>,
    provider_factory: ProviderFactory,
    sink: Arc<ScreenshotSink>,
    telemetry: Arc<Telemetry>,
}

impl Session {
    pub fn new(
        settings: Settings,
        sampling: Box<dyn SamplingLoop>,
        sink: Arc<ScreenshotSink>,
        telemetry: Arc<Telemetry>,
    ) -> Self {
        Self {
            settings,
            sampling,
            provider_factory: Box::new(get_provider),
            sink,
            telemetry,
        }
    }

    /// Replace how the provider for the initial direct call is built
    pub fn with_provider_factory<F>(mut self, factory: F) -> Self
    where
        F: Fn(ProviderConfig) -> Result<Box<dyn Provider>> + Send + Sync + 'static,
    {
        self.provider_factory = Box::new(factory);
        self
    }

    /// Run the instruction to completion and return the final conversation
    pub async fn run(&self, instruction: &str) -> Result<Vec<Message>> {
        let result = self.execute(instruction).await;
        if let Err(err) = &result {
            tracing::error!("Application error: {:#}", err);
        }
        result
    }

    async fn execute(&self, instruction: &str) -> Result<Vec<Message>> {
        let api_key = get_api_key()?;
        tracing::info!(
            "Starting Claude 'Computer Use'.\nInstructions provided: '{}'",
            instruction
        );

        let mut messages = vec![Message::user().with_text(instruction)];
        self.initial_call(api_key, &messages).await?;

        let callbacks = setup_callbacks(Arc::clone(&self.sink), Arc::clone(&self.telemetry));
        let params = SamplingParams {
            model: self.settings.model.clone(),
            provider: self.settings.provider,
            system_prompt_suffix: self.settings.system_prompt_suffix.clone(),
            api_key: get_api_key()?,
            only_n_most_recent_images: Some(self.settings.only_n_most_recent_images),
            max_tokens: self.settings.max_tokens,
        };
        self.sampling
            .run(params, &mut messages, &callbacks)
            .await
            .context("Sampling loop failed")?;

        Ok(messages)
    }

    /// A single direct call with the seed conversation; only its failure matters
    async fn initial_call(&self, api_key: String, messages: &[Message]) -> Result<()> {
        let config = ProviderConfig::Anthropic(self.settings.provider_config(api_key));
        let provider = (self.provider_factory)(config)?;
        provider
            .complete("", messages, &[])
            .await
            .context("Initial request to the model API failed")?;
        Ok(())
    }
}
