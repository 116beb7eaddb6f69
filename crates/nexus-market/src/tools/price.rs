//! Prices, return summaries and correlations

use super::{pct, round, uppercase};
use crate::config::MarketConfig;
use crate::engine::EventStudyEngine;
use crate::series::{PriceSeries, align};
use crate::stats;
use async_trait::async_trait;
use chrono::Utc;
use futures::future::join_all;
use nexus_tools::{ArgValue, ParamSpec, ParamType, Tool, ToolArgs, ToolError, ToolSchema};
use serde_json::{Map, Value, json};
use std::sync::Arc;

const NAME: &str = "price_tool";

pub struct PriceTool {
    engine: Arc<EventStudyEngine>,
    schema: ToolSchema,
}

impl PriceTool {
    pub fn new(engine: Arc<EventStudyEngine>, config: Arc<MarketConfig>) -> Self {
        let schema = ToolSchema::new(
            NAME,
            "Get stock price data, return summaries (cumulative return, annualized volatility, max drawdown) \
             and correlation matrices for semiconductor ecosystem tickers.",
        )
        .param(ParamSpec::required(
            "tickers",
            ParamType::StringList,
            "List of ticker symbols (e.g. ['NVDA', 'AMD', 'TSM'])",
        ))
        .param(
            ParamSpec::optional("start_date", ParamType::Date, "Start date YYYY-MM-DD")
                .with_default(ArgValue::Date(config.start_date)),
        )
        .param(ParamSpec::optional(
            "end_date",
            ParamType::Date,
            "End date YYYY-MM-DD (default: today)",
        ));

        Self { engine, schema }
    }
}

#[async_trait]
impl Tool for PriceTool {
    fn schema(&self) -> &ToolSchema {
        &self.schema
    }

    async fn invoke(&self, args: ToolArgs) -> Result<Value, ToolError> {
        let tickers = uppercase(args.require_list("tickers")?);
        let start = args.require_date("start_date")?;
        let end = args.date("end_date").unwrap_or_else(|| Utc::now().date_naive());
        if end < start {
            return Err(ToolError::invalid(NAME, "end_date is before start_date"));
        }

        let fetched = join_all(tickers.iter().map(|t| self.engine.fetch_prices(t, start, end))).await;

        let mut available: Vec<PriceSeries> = Vec::new();
        let mut errors = Map::new();
        for (ticker, result) in tickers.iter().zip(fetched) {
            match result {
                Ok(series) if series.len() >= 2 => available.push(series),
                Ok(_) => {
                    errors.insert(ticker.clone(), json!("not enough price history"));
                }
                Err(e) => {
                    errors.insert(ticker.clone(), json!(e.to_string()));
                }
            }
        }

        if available.is_empty() {
            return Err(ToolError::execution(
                NAME,
                "no price data available for the requested tickers",
            ));
        }

        let mut latest = Map::new();
        let mut summary = Map::new();
        for series in &available {
            let returns = series.returns();
            latest.insert(
                series.ticker().to_string(),
                json!(series.latest().map(|(_, close)| round(close, 2))),
            );
            summary.insert(
                series.ticker().to_string(),
                json!({
                    "cumulative_return_pct": series.cumulative_return().map(|r| pct(r, 2)),
                    "annualized_vol_pct": stats::annualized_volatility(returns.values()).map(|v| pct(v, 2)),
                    "max_drawdown_pct": series.max_drawdown().map(|d| pct(d, 2)),
                }),
            );
        }

        let mut matrix = Map::new();
        for a in &available {
            let mut row = Map::new();
            for b in &available {
                let aligned = align(&a.returns(), &b.returns());
                let corr = if a.ticker() == b.ticker() {
                    Some(1.0)
                } else {
                    stats::correlation(&aligned.subject, &aligned.benchmark)
                };
                row.insert(b.ticker().to_string(), json!(corr.map(|c| round(c, 3))));
            }
            matrix.insert(a.ticker().to_string(), Value::Object(row));
        }

        let first = available.iter().filter_map(PriceSeries::first_date).min();
        let last = available.iter().filter_map(PriceSeries::last_date).max();
        let trading_days = available.iter().map(PriceSeries::len).max().unwrap_or(0);

        let mut out = json!({
            "latest_prices": latest,
            "return_summary": summary,
            "correlation_matrix": matrix,
            "data_range": match (first, last) {
                (Some(f), Some(l)) => format!("{f} to {l}"),
                _ => String::new(),
            },
            "trading_days": trading_days,
        });
        if !errors.is_empty() {
            out["unavailable"] = Value::Object(errors);
        }
        Ok(out)
    }
}
