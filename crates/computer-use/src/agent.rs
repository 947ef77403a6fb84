use anyhow::Result;
use std::sync::Arc;
use tracing::Instrument;

use crate::callbacks::Callbacks;
use crate::models::content::MessageContent;
use crate::models::message::Message;
use crate::providers::base::Provider;
use crate::tools::ToolCollection;

/// Old images are removed in chunks of this size
pub const IMAGE_REMOVAL_THRESHOLD: usize = 10;

/// Agent integrates a foundational LLM with the tools it needs to pilot a computer
pub struct Agent {
    provider: Box<dyn Provider>,
    tools: Arc<ToolCollection>,
    system_prompt: String,
    only_n_most_recent_images: Option<usize>,
}

impl Agent {
    pub fn new(provider: Box<dyn Provider>, tools: Arc<ToolCollection>) -> Self {
        Self {
            provider,
            tools,
            system_prompt: String::new(),
            only_n_most_recent_images: None,
        }
    }

    pub fn with_system_prompt<S: Into<String>>(mut self, system_prompt: S) -> Self {
        self.system_prompt = system_prompt.into();
        self
    }

    pub fn with_image_limit(mut self, only_n_most_recent_images: Option<usize>) -> Self {
        self.only_n_most_recent_images = only_n_most_recent_images;
        self
    }

    /// Drive the conversation until the model stops asking for tools.
    ///
    /// Every assistant turn and every tool result turn is appended to
    /// `messages`. Callback errors abort the loop and are returned as-is.
    pub async fn reply(&self, messages: &mut Vec<Message>, callbacks: &Callbacks) -> Result<()> {
        let definitions = self.tools.definitions();
        let mut turn = 0usize;

        loop {
            turn += 1;
            if let Some(keep) = self.only_n_most_recent_images {
                filter_to_n_most_recent_images(messages, keep, IMAGE_REMOVAL_THRESHOLD);
            }

            let completion = self
                .provider
                .complete(&self.system_prompt, messages, &definitions)
                .instrument(tracing::info_span!("llm_call", turn))
                .await?;
            (callbacks.api_response)(&completion.response)?;

            let response = completion.message;
            messages.push(response.sendable());

            let mut tool_results = Vec::new();
            for content in &response.content {
                (callbacks.output)(content);

                if let MessageContent::ToolUse(tool_use) = content {
                    let result = self
                        .tools
                        .run(&tool_use.name, tool_use.input.clone())
                        .instrument(tracing::info_span!("tool_call", tool = %tool_use.name, id = %tool_use.id))
                        .await;
                    tool_results.push(result.to_api_content(&tool_use.id));
                    (callbacks.tool_output)(&result, &tool_use.id)?;
                }
            }

            if tool_results.is_empty() {
                tracing::debug!(turns = turn, "model finished without requesting tools");
                return Ok(());
            }

            messages.push(Message {
                content: tool_results,
                ..Message::user()
            });
        }
    }
}

/// Drop all but the `images_to_keep` most recent screenshots from tool results.
///
/// Removal happens in multiples of `min_removal_threshold`; fewer surplus
/// images than that are left in place.
pub fn filter_to_n_most_recent_images(
    messages: &mut [Message],
    images_to_keep: usize,
    min_removal_threshold: usize,
) {
    let total_images: usize = messages
        .iter()
        .flat_map(|message| message.content.iter())
        .filter_map(|content| content.as_tool_result())
        .map(|result| result.content.iter().filter(|c| c.is_image()).count())
        .sum();

    let mut images_to_remove = total_images.saturating_sub(images_to_keep);
    if min_removal_threshold > 0 {
        images_to_remove -= images_to_remove % min_removal_threshold;
    }
    if images_to_remove == 0 {
        return;
    }

    for message in messages.iter_mut() {
        for content in message.content.iter_mut() {
            if let MessageContent::ToolResult(result) = content {
                result.content.retain(|item| {
                    if item.is_image() && images_to_remove > 0 {
                        images_to_remove -= 1;
                        false
                    } else {
                        true
                    }
                });
            }
        }
    }
}
