use anyhow::Result;
use serde_json::Value;

use crate::models::content::MessageContent;
use crate::tools::ToolResult;

/// Raw response from the model API, as received before any parsing
#[derive(Debug, Clone, PartialEq)]
pub struct ApiResponse {
    pub status: u16,
    body: String,
}

impl ApiResponse {
    pub fn new<S: Into<String>>(status: u16, body: S) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    /// The raw text body
    pub fn text(&self) -> &str {
        &self.body
    }

    pub fn json(&self) -> serde_json::Result<Value> {
        serde_json::from_str(&self.body)
    }
}

pub type OutputCallback = Box<dyn Fn(&MessageContent) + Send + Sync>;
pub type ToolOutputCallback = Box<dyn Fn(&ToolResult, &str) -> Result<()> + Send + Sync>;
pub type ApiResponseCallback = Box<dyn Fn(&ApiResponse) -> Result<()> + Send + Sync>;

/// The three hooks through which a sampling loop reports its progress.
///
/// * `output` receives every content block of every assistant turn.
/// * `tool_output` receives each tool result together with the id of the
///   tool use that produced it.
/// * `api_response` receives the raw response of every model call.
///
/// Errors returned by a hook abort the loop and surface to its caller.
pub struct Callbacks {
    pub output: OutputCallback,
    pub tool_output: ToolOutputCallback,
    pub api_response: ApiResponseCallback,
}

impl Callbacks {
    pub fn new<O, T, A>(output: O, tool_output: T, api_response: A) -> Self
    where
        O: Fn(&MessageContent) + Send + Sync + 'static,
        T: Fn(&ToolResult, &str) -> Result<()> + Send + Sync + 'static,
        A: Fn(&ApiResponse) -> Result<()> + Send + Sync + 'static,
    {
        Self {
            output: Box::new(output),
            tool_output: Box::new(tool_output),
            api_response: Box::new(api_response),
        }
    }

    /// Hooks that observe nothing
    pub fn noop() -> Self {
        Self::new(|_| {}, |_, _| Ok(()), |_| Ok(()))
    }
}
