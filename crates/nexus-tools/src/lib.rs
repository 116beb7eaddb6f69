//! Tool framework for nexus-rs
//!
//! Tools declare a typed [`ToolSchema`]; the [`ToolRegistry`] coerces raw
//! model-produced JSON into [`ToolArgs`] against that schema before any tool
//! code runs, so malformed input never reaches an analysis routine.

pub mod args;
pub mod error;
pub mod registry;
pub mod schema;
pub mod tool;

pub use args::{ArgValue, ToolArgs};
pub use error::ToolError;
pub use registry::{ToolRegistry, ToolResult};
pub use schema::{ParamSpec, ParamType, ToolSchema};
pub use tool::Tool;
