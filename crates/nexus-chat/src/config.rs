//! Chat configuration

use crate::error::{ChatError, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Settings for one [`crate::Orchestrator`]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatConfig {
    /// Model identifier sent to the provider
    pub model: String,
    /// Retrieved chunks per question
    pub top_k: usize,
    /// Decide/invoke rounds before the final compose call
    pub max_tool_rounds: usize,
    pub max_tokens: usize,
    pub temperature: Option<f32>,
    pub retrieval_timeout: Duration,
    /// Bound on each decide and compose call
    pub llm_timeout: Duration,
    /// Bound on each tool invocation
    pub tool_timeout: Duration,
    /// Bound on the whole turn
    pub turn_timeout: Duration,
    /// Plan a tool from keywords when the model answers a quantitative
    /// question without one
    pub router_fallback: bool,
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            model: "gpt-4o-mini".to_string(),
            top_k: 6,
            max_tool_rounds: 3,
            max_tokens: 2048,
            temperature: Some(0.2),
            retrieval_timeout: Duration::from_secs(10),
            llm_timeout: Duration::from_secs(60),
            tool_timeout: Duration::from_secs(90),
            turn_timeout: Duration::from_secs(300),
            router_fallback: true,
        }
    }
}

impl ChatConfig {
    /// Create a new configuration builder
    pub fn builder() -> ChatConfigBuilder {
        ChatConfigBuilder::default()
    }

    /// Defaults overridden by `NEXUS_MODEL` and `NEXUS_TOP_K`
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`ChatConfig::from_env`] with an injectable variable source
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let mut builder = Self::builder();
        if let Some(model) = lookup("NEXUS_MODEL") {
            builder = builder.model(model);
        }
        if let Some(top_k) = lookup("NEXUS_TOP_K") {
            let top_k = top_k
                .trim()
                .parse()
                .map_err(|e| ChatError::Config(format!("NEXUS_TOP_K: {e}")))?;
            builder = builder.top_k(top_k);
        }
        builder.build()
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.model.trim().is_empty() {
            return Err(ChatError::Config("model must not be empty".to_string()));
        }
        if self.top_k == 0 {
            return Err(ChatError::Config("top_k must be greater than 0".to_string()));
        }
        if self.max_tool_rounds == 0 {
            return Err(ChatError::Config(
                "max_tool_rounds must be greater than 0".to_string(),
            ));
        }
        if self.max_tokens == 0 {
            return Err(ChatError::Config(
                "max_tokens must be greater than 0".to_string(),
            ));
        }
        if let Some(t) = self.temperature.filter(|t| !(0.0..=2.0).contains(t)) {
            return Err(ChatError::Config(format!(
                "temperature must be between 0 and 2, got {t}"
            )));
        }
        for (name, timeout) in [
            ("retrieval_timeout", self.retrieval_timeout),
            ("llm_timeout", self.llm_timeout),
            ("tool_timeout", self.tool_timeout),
            ("turn_timeout", self.turn_timeout),
        ] {
            if timeout.is_zero() {
                return Err(ChatError::Config(format!("{name} must be greater than 0")));
            }
        }
        Ok(())
    }
}

/// Builder for [`ChatConfig`]
#[derive(Debug, Default)]
pub struct ChatConfigBuilder {
    config: Option<ChatConfig>,
}

impl ChatConfigBuilder {
    fn edit(mut self, f: impl FnOnce(&mut ChatConfig)) -> Self {
        f(self.config.get_or_insert_with(ChatConfig::default));
        self
    }

    pub fn model(self, model: impl Into<String>) -> Self {
        let model = model.into();
        self.edit(|c| c.model = model)
    }

    pub fn top_k(self, top_k: usize) -> Self {
        self.edit(|c| c.top_k = top_k)
    }

    pub fn max_tool_rounds(self, rounds: usize) -> Self {
        self.edit(|c| c.max_tool_rounds = rounds)
    }

    pub fn max_tokens(self, max_tokens: usize) -> Self {
        self.edit(|c| c.max_tokens = max_tokens)
    }

    pub fn temperature(self, temperature: Option<f32>) -> Self {
        self.edit(|c| c.temperature = temperature)
    }

    pub fn retrieval_timeout(self, timeout: Duration) -> Self {
        self.edit(|c| c.retrieval_timeout = timeout)
    }

    pub fn llm_timeout(self, timeout: Duration) -> Self {
        self.edit(|c| c.llm_timeout = timeout)
    }

    pub fn tool_timeout(self, timeout: Duration) -> Self {
        self.edit(|c| c.tool_timeout = timeout)
    }

    pub fn turn_timeout(self, timeout: Duration) -> Self {
        self.edit(|c| c.turn_timeout = timeout)
    }

    pub fn router_fallback(self, enabled: bool) -> Self {
        self.edit(|c| c.router_fallback = enabled)
    }

    /// Build and validate
    pub fn build(self) -> Result<ChatConfig> {
        let config = self.config.unwrap_or_default();
        config.validate()?;
        Ok(config)
    }
}
