use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextContent {
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageSource {
    #[serde(rename = "type")]
    pub kind: String,
    pub media_type: String,
    pub data: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageContent {
    pub source: ImageSource,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolUse {
    pub id: String,
    pub name: String,
    pub input: Value,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolResultBlock {
    pub tool_use_id: String,
    pub content: Vec<ToolResultContent>,
    #[serde(default)]
    pub is_error: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
/// Content allowed inside a tool result block
pub enum ToolResultContent {
    Text(TextContent),
    Image(ImageContent),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
/// Content passed inside a message, which can be both simple content and tool content
pub enum MessageContent {
    Text(TextContent),
    Image(ImageContent),
    ToolUse(ToolUse),
    ToolResult(ToolResultBlock),
    /// Any block type the API may return that we don't model (e.g. thinking)
    #[serde(other)]
    Unknown,
}

impl ImageContent {
    pub fn png<S: Into<String>>(data: S) -> Self {
        ImageContent {
            source: ImageSource {
                kind: "base64".to_string(),
                media_type: "image/png".to_string(),
                data: data.into(),
            },
        }
    }
}

impl ToolResultContent {
    pub fn text<S: Into<String>>(text: S) -> Self {
        ToolResultContent::Text(TextContent { text: text.into() })
    }

    pub fn png<S: Into<String>>(data: S) -> Self {
        ToolResultContent::Image(ImageContent::png(data))
    }

    pub fn is_image(&self) -> bool {
        matches!(self, ToolResultContent::Image(_))
    }
}

impl MessageContent {
    pub fn text<S: Into<String>>(text: S) -> Self {
        MessageContent::Text(TextContent { text: text.into() })
    }

    pub fn png<S: Into<String>>(data: S) -> Self {
        MessageContent::Image(ImageContent::png(data))
    }

    pub fn tool_use<I, N>(id: I, name: N, input: Value) -> Self
    where
        I: Into<String>,
        N: Into<String>,
    {
        MessageContent::ToolUse(ToolUse {
            id: id.into(),
            name: name.into(),
            input,
        })
    }

    pub fn tool_result<S: Into<String>>(
        tool_use_id: S,
        content: Vec<ToolResultContent>,
        is_error: bool,
    ) -> Self {
        MessageContent::ToolResult(ToolResultBlock {
            tool_use_id: tool_use_id.into(),
            content,
            is_error,
        })
    }

    /// Get the text content if this is a Text variant
    pub fn as_text(&self) -> Option<&str> {
        match self {
            MessageContent::Text(text) => Some(&text.text),
            _ => None,
        }
    }

    pub fn as_tool_use(&self) -> Option<&ToolUse> {
        match self {
            MessageContent::ToolUse(tool_use) => Some(tool_use),
            _ => None,
        }
    }

    pub fn as_tool_result(&self) -> Option<&ToolResultBlock> {
        match self {
            MessageContent::ToolResult(result) => Some(result),
            _ => None,
        }
    }

    pub fn is_unknown(&self) -> bool {
        matches!(self, MessageContent::Unknown)
    }
}
