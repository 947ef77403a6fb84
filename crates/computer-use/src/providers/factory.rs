use super::{anthropic::AnthropicProvider, base::Provider, configs::ProviderConfig};
use anyhow::Result;

pub fn get_provider(config: ProviderConfig) -> Result<Box<dyn Provider>> {
    match config {
        ProviderConfig::Anthropic(anthropic_config) => {
            Ok(Box::new(AnthropicProvider::new(anthropic_config)?))
        }
    }
}
