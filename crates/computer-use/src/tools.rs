pub mod bash;
pub mod computer;
pub mod edit;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::errors::{ToolError, ToolOutcome};
use crate::models::content::{MessageContent, ToolResultContent};

pub use bash::BashTool;
pub use computer::{ComputerTool, Display};
pub use edit::EditTool;

/// What a tool hands back after running
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ToolResult {
    pub output: Option<String>,
    pub error: Option<String>,
    pub base64_image: Option<String>,
    /// Out-of-band note for the model, e.g. that the tool was restarted
    pub system: Option<String>,
}

impl ToolResult {
    pub fn output<S: Into<String>>(output: S) -> Self {
        Self {
            output: Some(output.into()),
            ..Default::default()
        }
    }

    pub fn error<S: Into<String>>(error: S) -> Self {
        Self {
            error: Some(error.into()),
            ..Default::default()
        }
    }

    pub fn system<S: Into<String>>(system: S) -> Self {
        Self {
            system: Some(system.into()),
            ..Default::default()
        }
    }

    pub fn with_image<S: Into<String>>(mut self, base64_image: S) -> Self {
        self.base64_image = Some(base64_image.into());
        self
    }

    fn with_system_prefix(&self, text: &str) -> String {
        match &self.system {
            Some(system) => format!("<system>{}</system>\n{}", system, text),
            None => text.to_string(),
        }
    }

    /// Convert into the tool_result block sent back to the model
    pub fn to_api_content(&self, tool_use_id: &str) -> MessageContent {
        if let Some(error) = &self.error {
            return MessageContent::tool_result(
                tool_use_id,
                vec![ToolResultContent::text(self.with_system_prefix(error))],
                true,
            );
        }

        let mut content = Vec::new();
        if let Some(output) = &self.output {
            content.push(ToolResultContent::text(self.with_system_prefix(output)));
        } else if self.system.is_some() {
            content.push(ToolResultContent::text(self.with_system_prefix("")));
        }
        if let Some(image) = &self.base64_image {
            content.push(ToolResultContent::png(image.clone()));
        }
        MessageContent::tool_result(tool_use_id, content, false)
    }
}

/// A tool the model can call, described to the API by `definition`
#[async_trait]
pub trait Tool: Send + Sync {
    /// The name the model uses to call this tool
    fn name(&self) -> &str;

    /// The tool parameter as sent in the request's `tools` list
    fn definition(&self) -> Value;

    async fn call(&self, input: Value) -> ToolOutcome<ToolResult>;
}

/// The set of tools offered to the model on each turn
#[derive(Default)]
pub struct ToolCollection {
    tools: Vec<Box<dyn Tool>>,
}

impl ToolCollection {
    pub fn new() -> Self {
        Self::default()
    }

    /// The computer, bash and editor tools for the given display
    pub fn computer_use(display: Display) -> Self {
        Self::new()
            .with_tool(ComputerTool::new(display))
            .with_tool(BashTool::new())
            .with_tool(EditTool::new())
    }

    pub fn with_tool<T: Tool + 'static>(mut self, tool: T) -> Self {
        self.tools.push(Box::new(tool));
        self
    }

    pub fn definitions(&self) -> Vec<Value> {
        self.tools.iter().map(|tool| tool.definition()).collect()
    }

    pub fn get(&self, name: &str) -> Option<&dyn Tool> {
        self.tools
            .iter()
            .find(|tool| tool.name() == name)
            .map(|v| &**v)
    }

    /// Run a tool by name; failures come back as an error result for the model
    pub async fn run(&self, name: &str, input: Value) -> ToolResult {
        let outcome = match self.get(name) {
            Some(tool) => tool.call(input).await,
            None => Err(ToolError::ToolNotFound(name.to_string())),
        };
        outcome.unwrap_or_else(|e| ToolResult::error(e.to_string()))
    }
}
