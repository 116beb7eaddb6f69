//! LLM abstraction layer for nexus-rs
//!
//! The research chat treats the model as an untrusted planner. This crate
//! provides:
//!
//! - Message and completion types for provider communication
//! - The [`LLMProvider`] trait implemented by concrete backends
//! - [`ResearchLlm`], the `decide` / `compose` capability the orchestrator
//!   consumes
//! - An OpenAI-compatible provider (behind the `openai` feature)

pub mod capability;
pub mod completion;
pub mod error;
pub mod messages;
pub mod provider;
pub mod tools;

pub use capability::{Decision, ResearchLlm, ToolCallRequest};
pub use completion::{CompletionRequest, CompletionResponse, StopReason, TokenUsage};
pub use error::{LLMError, Result};
pub use messages::{ContentBlock, Message, MessageContent, Role};
pub use provider::LLMProvider;
pub use tools::ToolDefinition;

#[cfg(feature = "openai")]
pub mod providers;
