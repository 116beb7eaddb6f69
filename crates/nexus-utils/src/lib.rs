//! Shared utilities for nexus-rs
//!
//! Process-wide concerns used by every binary in the workspace: tracing
//! setup and the environment-driven application configuration.

pub mod config;
pub mod logging;

pub use config::{AppConfig, ConfigError};
pub use logging::{LogFormat, init_tracing};
