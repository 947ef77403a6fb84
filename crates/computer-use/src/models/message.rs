use super::content::{MessageContent, ToolResultContent};
use super::role::Role;
use serde_json::Value;

#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
/// A message to or from an LLM
pub struct Message {
    pub role: Role,
    pub content: Vec<MessageContent>,
}

impl Message {
    /// Create a new, empty user message
    pub fn user() -> Self {
        Message {
            role: Role::User,
            content: Vec::new(),
        }
    }

    /// Create a new, empty assistant message
    pub fn assistant() -> Self {
        Message {
            role: Role::Assistant,
            content: Vec::new(),
        }
    }

    /// Add any MessageContent to the message
    pub fn with_content(mut self, content: MessageContent) -> Self {
        self.content.push(content);
        self
    }

    /// Add text content to the message
    pub fn with_text<S: Into<String>>(self, text: S) -> Self {
        self.with_content(MessageContent::text(text))
    }

    /// Add a tool use request to the message
    pub fn with_tool_use<I, N>(self, id: I, name: N, input: Value) -> Self
    where
        I: Into<String>,
        N: Into<String>,
    {
        self.with_content(MessageContent::tool_use(id, name, input))
    }

    /// Add a tool result to the message
    pub fn with_tool_result<S: Into<String>>(
        self,
        tool_use_id: S,
        content: Vec<ToolResultContent>,
        is_error: bool,
    ) -> Self {
        self.with_content(MessageContent::tool_result(tool_use_id, content, is_error))
    }

    /// All text blocks joined by newlines
    pub fn text(&self) -> String {
        self.content
            .iter()
            .filter_map(|c| c.as_text())
            .collect::<Vec<_>>()
            .join("\n")
    }

    pub fn has_tool_use(&self) -> bool {
        self.content.iter().any(|c| c.as_tool_use().is_some())
    }

    /// Drop blocks that can't be sent back to the API
    pub fn sendable(&self) -> Self {
        Message {
            role: self.role,
            content: self
                .content
                .iter()
                .filter(|c| !c.is_unknown())
                .cloned()
                .collect(),
        }
    }
}
