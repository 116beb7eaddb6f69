//! Research tools exposed to the chat orchestrator

mod ecosystem;
mod event_study;
mod price;
mod volatility;

pub use ecosystem::EcosystemTool;
pub use event_study::EventStudyTool;
pub use price::PriceTool;
pub use volatility::VolatilityTool;

use crate::config::MarketConfig;
use crate::engine::EventStudyEngine;
use crate::error::MarketError;
use nexus_tools::{ToolError, ToolRegistry};
use std::sync::Arc;

/// Register the four market tools, sharing one engine and its cache
pub fn register_market_tools(
    registry: &ToolRegistry,
    engine: Arc<EventStudyEngine>,
    config: Arc<MarketConfig>,
) {
    registry.register(Arc::new(EventStudyTool::new(engine.clone(), config.clone())));
    registry.register(Arc::new(EcosystemTool::new(engine.clone(), config.clone())));
    registry.register(Arc::new(PriceTool::new(engine.clone(), config.clone())));
    registry.register(Arc::new(VolatilityTool::new(engine, config)));
}

/// Fraction to percent, rounded to `places`
pub(crate) fn pct(value: f64, places: i32) -> f64 {
    round(value * 100.0, places)
}

pub(crate) fn round(value: f64, places: i32) -> f64 {
    let factor = 10f64.powi(places);
    (value * factor).round() / factor
}

pub(crate) fn execution(tool: &str, error: MarketError) -> ToolError {
    match error {
        MarketError::Config(reason) => ToolError::invalid(tool, reason),
        other => ToolError::execution(tool, other),
    }
}

pub(crate) fn uppercase(tickers: &[String]) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    for t in tickers {
        let t = t.trim().to_uppercase();
        if !t.is_empty() && !out.contains(&t) {
            out.push(t);
        }
    }
    out
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_registers_all_tools() {
        let registry = ToolRegistry::new();
        register_market_tools(&registry, fixtures::engine(), fixtures::config());
        assert_eq!(
            registry.names(),
            vec!["ecosystem_tool", "event_study_tool", "price_tool", "volatility_tool"]
        );
        for schema in registry.schemas() {
            assert!(!schema.description.is_empty());
        }
    }

    #[test]
    fn test_rounding() {
        assert_eq!(pct(0.123_456, 2), 12.35);
        assert_eq!(round(-1.23456, 3), -1.235);
        assert_eq!(uppercase(&[" nvda".into(), "NVDA".into(), "amd".into()]), vec!["NVDA", "AMD"]);
    }
}
