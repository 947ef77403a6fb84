// Unified enum to wrap different provider configurations
#[derive(Debug, Clone)]
pub enum ProviderConfig {
    Anthropic(AnthropicProviderConfig),
}

#[derive(Debug, Clone)]
pub struct AnthropicProviderConfig {
    pub host: String,
    pub api_key: String,
    pub model: String,
    pub max_tokens: u32,
    /// Values for the `anthropic-beta` header
    pub betas: Vec<String>,
}

impl AnthropicProviderConfig {
    pub const DEFAULT_HOST: &'static str = "https://api.anthropic.com";

    pub fn new<K: Into<String>, M: Into<String>>(api_key: K, model: M, max_tokens: u32) -> Self {
        Self {
            host: Self::DEFAULT_HOST.to_string(),
            api_key: api_key.into(),
            model: model.into(),
            max_tokens,
            betas: Vec::new(),
        }
    }

    pub fn with_host<S: Into<String>>(mut self, host: S) -> Self {
        self.host = host.into();
        self
    }

    pub fn with_beta<S: Into<String>>(mut self, beta: S) -> Self {
        self.betas.push(beta.into());
        self
    }
}
