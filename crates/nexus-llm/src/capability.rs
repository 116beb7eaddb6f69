//! The research capability: `decide` and `compose` over a provider
//!
//! The orchestrator never looks at raw completions. It asks the model to
//! either pick tools or answer in prose ([`ResearchLlm::decide`]) and, once
//! evidence is gathered, to write the final answer without tools
//! ([`ResearchLlm::compose`]).

use crate::{
    CompletionRequest, ContentBlock, LLMProvider, Message, Result, StopReason, ToolDefinition,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, warn};

/// A tool invocation the model asked for
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCallRequest {
    /// Provider-assigned call id, echoed back with the result
    pub id: String,
    /// Registered tool name
    pub name: String,
    /// Raw arguments as produced by the model
    pub arguments: Value,
}

impl ToolCallRequest {
    /// Build a request
    pub fn new(id: impl Into<String>, name: impl Into<String>, arguments: Value) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            arguments,
        }
    }

    fn to_block(&self) -> ContentBlock {
        ContentBlock::ToolUse {
            id: self.id.clone(),
            name: self.name.clone(),
            input: self.arguments.clone(),
        }
    }
}

/// Outcome of a planning call
#[derive(Debug, Clone, PartialEq)]
pub enum Decision {
    /// The model selected one or more tools
    ToolCalls(Vec<ToolCallRequest>),
    /// The model answered directly
    Text(String),
}

impl Decision {
    /// The assistant message that records this decision in the history
    pub fn to_message(&self) -> Message {
        match self {
            Self::ToolCalls(calls) => {
                Message::assistant_blocks(calls.iter().map(ToolCallRequest::to_block).collect())
            }
            Self::Text(text) => Message::assistant(text.clone()),
        }
    }
}

/// Decide/compose wrapper around an [`LLMProvider`]
#[derive(Clone)]
pub struct ResearchLlm {
    provider: Arc<dyn LLMProvider>,
    model: String,
    max_tokens: usize,
    temperature: Option<f32>,
}

impl ResearchLlm {
    /// Wrap a provider for the given model
    pub fn new(provider: Arc<dyn LLMProvider>, model: impl Into<String>) -> Self {
        Self {
            provider,
            model: model.into(),
            max_tokens: 1024,
            temperature: None,
        }
    }

    /// Set the completion budget
    pub fn with_max_tokens(mut self, max_tokens: usize) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    /// Set the sampling temperature
    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    /// Model identifier sent with every request
    pub fn model(&self) -> &str {
        &self.model
    }

    /// Name of the underlying provider
    pub fn provider_name(&self) -> &str {
        self.provider.name()
    }

    fn request(&self, system: &str, messages: &[Message]) -> crate::completion::CompletionRequestBuilder {
        let builder = CompletionRequest::builder(self.model.clone())
            .system(system)
            .messages(messages.iter().cloned())
            .max_tokens(self.max_tokens);
        match self.temperature {
            Some(t) => builder.temperature(t),
            None => builder,
        }
    }

    /// Ask the model to either select tools or answer in prose.
    ///
    /// Any tool-use block wins over accompanying text, regardless of the
    /// reported stop reason.
    pub async fn decide(
        &self,
        system: &str,
        messages: &[Message],
        tools: &[ToolDefinition],
    ) -> Result<Decision> {
        let request = self.request(system, messages).tools(tools.to_vec()).build();
        let response = self.provider.complete(request).await?;

        let calls: Vec<ToolCallRequest> = response
            .message
            .tool_uses()
            .into_iter()
            .filter_map(|block| match block {
                ContentBlock::ToolUse { id, name, input } => {
                    Some(ToolCallRequest::new(id.clone(), name.clone(), input.clone()))
                }
                _ => None,
            })
            .collect();

        debug!(
            provider = self.provider.name(),
            stop_reason = ?response.stop_reason,
            tool_calls = calls.len(),
            tokens = response.usage.total(),
            "decide completed"
        );

        if calls.is_empty() {
            if response.stop_reason == StopReason::ToolUse {
                debug!("stop reason was tool_use but no tool calls were returned");
            }
            Ok(Decision::Text(response.message.text().unwrap_or_default()))
        } else {
            Ok(Decision::ToolCalls(calls))
        }
    }

    /// Ask for the final prose answer with no tools on offer
    pub async fn compose(&self, system: &str, messages: &[Message]) -> Result<String> {
        let request = self.request(system, messages).build();
        let response = self.provider.complete(request).await?;

        debug!(
            provider = self.provider.name(),
            stop_reason = ?response.stop_reason,
            tokens = response.usage.total(),
            "compose completed"
        );
        if response.stop_reason == StopReason::MaxTokens {
            warn!(max_tokens = self.max_tokens, "answer truncated at the token limit");
        }

        Ok(response.message.text().unwrap_or_default())
    }
}

impl std::fmt::Debug for ResearchLlm {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResearchLlm")
            .field("provider", &self.provider.name())
            .field("model", &self.model)
            .field("max_tokens", &self.max_tokens)
            .finish_non_exhaustive()
    }
}
