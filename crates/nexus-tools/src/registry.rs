//! Name-keyed tool registry

use crate::{Tool, ToolError, ToolSchema};
use nexus_llm::ToolDefinition;
use serde::Serialize;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};
use std::time::{Duration, Instant};
use tracing::{info, warn};
use uuid::Uuid;

/// Outcome of one successful invocation
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ToolResult {
    /// Unique evidence id, cited by grounded answers
    pub id: String,
    pub tool_name: String,
    /// Arguments after coercion and defaults
    pub arguments: Value,
    pub output: Value,
    pub duration_ms: u64,
}

/// Registry of tools keyed by name
pub struct ToolRegistry {
    tools: RwLock<HashMap<String, Arc<dyn Tool>>>,
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self {
            tools: RwLock::new(HashMap::new()),
        }
    }
}

impl ToolRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a tool, returning any tool previously registered under the
    /// same name
    pub fn register(&self, tool: Arc<dyn Tool>) -> Option<Arc<dyn Tool>> {
        let mut tools = self.tools.write().unwrap_or_else(PoisonError::into_inner);
        tools.insert(tool.name().to_string(), tool)
    }

    /// Get a tool by name
    pub fn get(&self, name: &str) -> Option<Arc<dyn Tool>> {
        let tools = self.tools.read().unwrap_or_else(PoisonError::into_inner);
        tools.get(name).cloned()
    }

    /// Registered names, sorted
    pub fn names(&self) -> Vec<String> {
        let tools = self.tools.read().unwrap_or_else(PoisonError::into_inner);
        let mut names: Vec<String> = tools.keys().cloned().collect();
        names.sort();
        names
    }

    /// Schemas of every registered tool, sorted by name
    pub fn schemas(&self) -> Vec<ToolSchema> {
        let tools = self.tools.read().unwrap_or_else(PoisonError::into_inner);
        let mut schemas: Vec<ToolSchema> = tools.values().map(|t| t.schema().clone()).collect();
        schemas.sort_by(|a, b| a.name.cmp(&b.name));
        schemas
    }

    /// Provider-facing definitions, sorted by name
    pub fn definitions(&self) -> Vec<ToolDefinition> {
        self.schemas().iter().map(ToolSchema::to_definition).collect()
    }

    pub fn len(&self) -> usize {
        self.tools.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Look up, coerce arguments and run a tool
    pub async fn invoke(&self, name: &str, arguments: &Value) -> Result<ToolResult, ToolError> {
        let tool = self
            .get(name)
            .ok_or_else(|| ToolError::UnknownTool(name.to_string()))?;
        let args = tool.schema().coerce(arguments)?;
        let coerced = args.to_json();

        let start = Instant::now();
        let result = tool.invoke(args).await;
        let duration_ms = u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX);

        match result {
            Ok(output) => {
                info!(tool_name = name, duration_ms, "tool succeeded");
                Ok(ToolResult {
                    id: format!("tool:{}", Uuid::new_v4().simple()),
                    tool_name: name.to_string(),
                    arguments: coerced,
                    output,
                    duration_ms,
                })
            }
            Err(e) => {
                warn!(tool_name = name, duration_ms, error = %e, "tool failed");
                Err(e)
            }
        }
    }

    /// [`ToolRegistry::invoke`] bounded by a timeout
    pub async fn invoke_with_timeout(
        &self,
        name: &str,
        arguments: &Value,
        timeout: Duration,
    ) -> Result<ToolResult, ToolError> {
        tokio::time::timeout(timeout, self.invoke(name, arguments))
            .await
            .unwrap_or_else(|_| {
                warn!(tool_name = name, timeout_ms = timeout.as_millis() as u64, "tool timed out");
                Err(ToolError::Timeout {
                    tool: name.to_string(),
                    timeout_ms: timeout.as_millis() as u64,
                })
            })
    }
}
