//! These models represent the objects passed between the driver, the agent loop and the LLM
//!
//! The internal structs serialize directly into the shape the Anthropic messages API
//! expects, so a conversation can be sent as-is. Block types we don't model are kept
//! as [`content::MessageContent::Unknown`] when parsing and dropped before resending.
pub mod content;
pub mod message;
pub mod role;
