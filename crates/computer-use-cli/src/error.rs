use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Please set {env_var} in the environment")]
    MissingEnvVar { env_var: String },
    #[error("Configuration error: {0}")]
    Other(#[from] config::ConfigError),
}

#[derive(Error, Debug)]
pub enum ScreenshotError {
    #[error("Screenshot is not valid base64: {0}")]
    Decode(#[from] base64::DecodeError),
    #[error("Failed to write screenshot: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Error, Debug)]
pub enum ResponseError {
    #[error("API response is not valid JSON: {0}")]
    InvalidJson(#[from] serde_json::Error),
    #[error("API response has no `{0}` field")]
    MissingField(&'static str),
}

/// Map a settings field such as `display.width` to the variable that sets it
pub fn to_env_var(field_path: &str) -> String {
    let mut env_var = String::from("COMPUTER_USE");
    for part in field_path.split('.') {
        env_var.push_str("__");
        env_var.push_str(&part.to_uppercase());
    }
    env_var
}
