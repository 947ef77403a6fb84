use crate::error::{to_env_var, ConfigError};
use computer_use::providers::configs::AnthropicProviderConfig;
use computer_use::sampling::ApiProvider;
use computer_use::tools::Display;
use config::{Config, Environment};
use serde::Deserialize;
use std::env;
use std::path::PathBuf;

pub const API_KEY_ENV_VAR: &str = "ANTHROPIC_API_KEY";

/// Read the API key from the environment
///
/// The variable is read on every call; an empty value counts as unset.
pub fn get_api_key() -> Result<String, ConfigError> {
    env::var(API_KEY_ENV_VAR)
        .ok()
        .filter(|key| !key.is_empty())
        .ok_or_else(|| ConfigError::MissingEnvVar {
            env_var: API_KEY_ENV_VAR.to_string(),
        })
}

#[derive(Debug, Clone, Deserialize)]
pub struct DisplaySettings {
    #[serde(default = "default_display_width")]
    pub width: u32,
    #[serde(default = "default_display_height")]
    pub height: u32,
    #[serde(default)]
    pub number: Option<u32>,
}

impl Default for DisplaySettings {
    fn default() -> Self {
        Self {
            width: default_display_width(),
            height: default_display_height(),
            number: None,
        }
    }
}

impl DisplaySettings {
    pub fn to_display(&self) -> Display {
        Display {
            width: self.width,
            height: self.height,
            number: self.number,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    #[serde(default = "default_model")]
    pub model: String,
    #[serde(default = "default_provider")]
    pub provider: ApiProvider,
    #[serde(default = "default_api_host")]
    pub api_host: String,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    #[serde(default = "default_only_n_most_recent_images")]
    pub only_n_most_recent_images: usize,
    #[serde(default)]
    pub system_prompt_suffix: String,
    #[serde(default = "default_screenshots_dir")]
    pub screenshots_dir: PathBuf,
    #[serde(default = "default_log_level")]
    pub log_level: String,
    #[serde(default)]
    pub display: DisplaySettings,
    /// OTLP/HTTP collector for trace export; empty disables export
    #[serde(default = "default_otlp_endpoint")]
    pub otlp_endpoint: String,
}

impl Settings {
    pub fn new() -> Result<Self, ConfigError> {
        Self::load_and_validate()
    }

    fn load_and_validate() -> Result<Self, ConfigError> {
        let config = Config::builder()
            .set_default("model", default_model())?
            .set_default("api_host", default_api_host())?
            .set_default("log_level", default_log_level())?
            .set_default("otlp_endpoint", default_otlp_endpoint())?
            // Layer on the environment variables
            .add_source(
                Environment::with_prefix("COMPUTER_USE")
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        match config.try_deserialize::<Self>() {
            Ok(settings) => Ok(settings),
            Err(err) => {
                tracing::debug!("Configuration error: {:?}", &err);

                let error_str = err.to_string();
                if error_str.starts_with("missing field") {
                    let field = error_str
                        .trim_start_matches("missing field `")
                        .trim_end_matches('`');
                    Err(ConfigError::MissingEnvVar {
                        env_var: to_env_var(field),
                    })
                } else if let config::ConfigError::NotFound(field) = &err {
                    Err(ConfigError::MissingEnvVar {
                        env_var: to_env_var(field),
                    })
                } else {
                    Err(ConfigError::Other(err))
                }
            }
        }
    }

    pub fn otlp_endpoint(&self) -> Option<&str> {
        Some(self.otlp_endpoint.as_str()).filter(|endpoint| !endpoint.is_empty())
    }

    /// Provider config for a plain messages call, without any beta features
    pub fn provider_config(&self, api_key: String) -> AnthropicProviderConfig {
        AnthropicProviderConfig::new(api_key, &self.model, self.max_tokens)
            .with_host(&self.api_host)
    }
}

fn default_model() -> String {
    "claude-3-5-sonnet-20241022".to_string()
}

fn default_provider() -> ApiProvider {
    ApiProvider::Anthropic
}

fn default_api_host() -> String {
    AnthropicProviderConfig::DEFAULT_HOST.to_string()
}

fn default_max_tokens() -> u32 {
    4096
}

fn default_only_n_most_recent_images() -> usize {
    10
}

fn default_screenshots_dir() -> PathBuf {
    PathBuf::from("screenshots")
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_otlp_endpoint() -> String {
    "http://127.0.0.1:4318".to_string()
}

fn default_display_width() -> u32 {
    1024
}

fn default_display_height() -> u32 {
    768
}
