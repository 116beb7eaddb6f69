//! Tool trait definition

use crate::{ToolArgs, ToolError, ToolSchema};
use async_trait::async_trait;
use serde_json::Value;

/// A named, schema-described operation the orchestrator can invoke.
///
/// `invoke` receives arguments that already passed [`ToolSchema::coerce`].
#[async_trait]
pub trait Tool: Send + Sync {
    /// Declared name, description and parameters
    fn schema(&self) -> &ToolSchema;

    /// Run the tool
    async fn invoke(&self, args: ToolArgs) -> Result<Value, ToolError>;

    /// Registered name
    fn name(&self) -> &str {
        &self.schema().name
    }

    /// Natural-language description shown to the model
    fn description(&self) -> &str {
        &self.schema().description
    }
}
