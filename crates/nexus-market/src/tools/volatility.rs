//! Realised volatility

use super::pct;
use crate::config::MarketConfig;
use crate::engine::EventStudyEngine;
use crate::stats;
use async_trait::async_trait;
use chrono::{TimeDelta, Utc};
use nexus_tools::{ArgValue, ParamSpec, ParamType, Tool, ToolArgs, ToolError, ToolSchema};
use serde_json::{Value, json};
use std::sync::Arc;

const NAME: &str = "volatility_tool";
const SHORT_WINDOW: usize = 20;
const LONG_WINDOW: usize = 60;

pub struct VolatilityTool {
    engine: Arc<EventStudyEngine>,
    schema: ToolSchema,
}

impl VolatilityTool {
    pub fn new(engine: Arc<EventStudyEngine>, _config: Arc<MarketConfig>) -> Self {
        let schema = ToolSchema::new(
            NAME,
            "Get historical realized volatility (20-day and 60-day, annualized) for a semiconductor ticker: \
             current levels and their averages over the lookback period.",
        )
        .param(
            ParamSpec::optional("ticker", ParamType::String, "Stock ticker")
                .with_default(ArgValue::String("NVDA".to_string())),
        )
        .param(
            ParamSpec::optional(
                "lookback_days",
                ParamType::Integer,
                "Calendar days of history to use",
            )
            .with_default(ArgValue::Integer(730)),
        )
        .param(ParamSpec::optional(
            "end_date",
            ParamType::Date,
            "Last date YYYY-MM-DD (default: today)",
        ));

        Self { engine, schema }
    }
}

#[async_trait]
impl Tool for VolatilityTool {
    fn schema(&self) -> &ToolSchema {
        &self.schema
    }

    async fn invoke(&self, args: ToolArgs) -> Result<Value, ToolError> {
        let ticker = args.require_str("ticker")?.trim().to_uppercase();
        let lookback = args.require_i64("lookback_days")?;
        if !(LONG_WINDOW as i64..=3650).contains(&lookback) {
            return Err(ToolError::invalid(
                NAME,
                format!("lookback_days must be between {LONG_WINDOW} and 3650"),
            ));
        }
        let end = args.date("end_date").unwrap_or_else(|| Utc::now().date_naive());
        let start = end - TimeDelta::days(lookback);

        let prices = self
            .engine
            .fetch_prices(&ticker, start, end)
            .await
            .map_err(|e| ToolError::execution(NAME, e))?;
        let returns = prices.returns();

        let rv20 = stats::rolling_volatility(returns.values(), SHORT_WINDOW);
        let rv60 = stats::rolling_volatility(returns.values(), LONG_WINDOW);
        if rv20.is_empty() {
            return Err(ToolError::execution(
                NAME,
                format!(
                    "{ticker} has {} daily returns, need at least {SHORT_WINDOW}",
                    returns.len()
                ),
            ));
        }

        Ok(json!({
            "ticker": ticker,
            "spot_price": prices.latest().map(|(_, close)| super::round(close, 2)),
            "as_of": prices.last_date(),
            "historical_vol": {
                "current_rv20": rv20.last().map(|v| pct(*v, 1)),
                "current_rv60": rv60.last().map(|v| pct(*v, 1)),
                "average_rv20": stats::mean(&rv20).map(|v| pct(v, 1)),
                "average_rv60": stats::mean(&rv60).map(|v| pct(v, 1)),
            },
            "observations": returns.len(),
            "note": "Realized volatility from daily closes; implied volatility needs a live options chain and is not included.",
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::fixtures;

    async fn run(raw: Value) -> Result<Value, ToolError> {
        let tool = VolatilityTool::new(fixtures::engine(), fixtures::config());
        let args = tool.schema().coerce(&raw)?;
        tool.invoke(args).await
    }

    #[tokio::test]
    async fn test_realized_volatility() {
        let out = run(json!({"ticker": "spy", "end_date": "2023-06-30", "lookback_days": 365}))
            .await
            .unwrap();
        assert_eq!(out["ticker"], "SPY");
        assert_eq!(out["as_of"], "2023-06-30");

        // Uniform daily moves of +-1% annualise to roughly 9%.
        let current = out["historical_vol"]["current_rv20"].as_f64().unwrap();
        let average = out["historical_vol"]["average_rv60"].as_f64().unwrap();
        assert!((4.0..16.0).contains(&current), "rv20 = {current}");
        assert!((6.0..12.0).contains(&average), "rv60 = {average}");
    }

    #[tokio::test]
    async fn test_short_history_and_bad_lookback() {
        let err = run(json!({"end_date": "2022-01-20", "lookback_days": 60}))
            .await
            .unwrap_err();
        assert!(matches!(err, ToolError::Execution { .. }));

        let err = run(json!({"lookback_days": 5})).await.unwrap_err();
        assert!(matches!(err, ToolError::InvalidArguments { .. }));
    }
}
