//! Tool errors

use thiserror::Error;

/// Errors surfaced by the registry or by a tool body.
///
/// These are reported back to the orchestrator as failed tool results; they
/// never abort a chat turn on their own.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ToolError {
    /// No tool registered under this name
    #[error("unknown tool '{0}'")]
    UnknownTool(String),

    /// Arguments failed schema validation or coercion
    #[error("invalid arguments for '{tool}': {reason}")]
    InvalidArguments { tool: String, reason: String },

    /// The tool ran and failed
    #[error("'{tool}' failed: {reason}")]
    Execution { tool: String, reason: String },

    /// The tool did not finish in time
    #[error("'{tool}' timed out after {timeout_ms} ms")]
    Timeout { tool: String, timeout_ms: u64 },
}

impl ToolError {
    /// Shorthand for [`ToolError::InvalidArguments`]
    pub fn invalid(tool: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidArguments {
            tool: tool.into(),
            reason: reason.into(),
        }
    }

    /// Shorthand for [`ToolError::Execution`]
    pub fn execution(tool: impl Into<String>, reason: impl std::fmt::Display) -> Self {
        Self::Execution {
            tool: tool.into(),
            reason: reason.to_string(),
        }
    }

    /// Name of the tool involved
    pub fn tool_name(&self) -> &str {
        match self {
            Self::UnknownTool(tool)
            | Self::InvalidArguments { tool, .. }
            | Self::Execution { tool, .. }
            | Self::Timeout { tool, .. } => tool,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = ToolError::invalid("event_study_tool", "missing required parameter 'ticker'");
        assert_eq!(
            err.to_string(),
            "invalid arguments for 'event_study_tool': missing required parameter 'ticker'"
        );
        assert_eq!(err.tool_name(), "event_study_tool");

        let err = ToolError::Timeout {
            tool: "price_tool".into(),
            timeout_ms: 1500,
        };
        assert_eq!(err.to_string(), "'price_tool' timed out after 1500 ms");
    }
}
