//! CAR event study over the export-control reference events

use super::{execution, pct, round};
use crate::config::MarketConfig;
use crate::engine::EventStudyEngine;
use crate::events::{EventFilter, Severity, find_event};
use crate::event_study::EventSpec;
use async_trait::async_trait;
use nexus_tools::{ArgValue, ParamSpec, ParamType, Tool, ToolArgs, ToolError, ToolSchema};
use serde_json::{Value, json};
use std::sync::Arc;

const NAME: &str = "event_study_tool";

/// Widest event-window offset accepted from a caller, in trading days
const EVENT_WINDOW_LIMIT: i64 = 60;

pub struct EventStudyTool {
    engine: Arc<EventStudyEngine>,
    config: Arc<MarketConfig>,
    schema: ToolSchema,
}

impl EventStudyTool {
    pub fn new(engine: Arc<EventStudyEngine>, config: Arc<MarketConfig>) -> Self {
        let schema = ToolSchema::new(
            NAME,
            "Run Cumulative Abnormal Return (CAR) event study analysis on BIS export control events. \
             Uses a market model fitted over a 120-day estimation window with configurable event windows.",
        )
        .param(
            ParamSpec::optional("ticker", ParamType::String, "Stock ticker to analyze")
                .with_default(ArgValue::String("NVDA".to_string())),
        )
        .param(
            ParamSpec::optional("benchmark", ParamType::String, "Benchmark ticker")
                .with_default(ArgValue::String(config.benchmark.clone())),
        )
        .param(
            ParamSpec::optional(
                "event_window_start",
                ParamType::Integer,
                "Event window start in trading days relative to the event date",
            )
            .with_default(ArgValue::Integer(config.window.event_start))
            .between(-EVENT_WINDOW_LIMIT, EVENT_WINDOW_LIMIT),
        )
        .param(
            ParamSpec::optional(
                "event_window_end",
                ParamType::Integer,
                "Event window end in trading days relative to the event date",
            )
            .with_default(ArgValue::Integer(config.window.event_end))
            .between(-EVENT_WINDOW_LIMIT, EVENT_WINDOW_LIMIT),
        )
        .param(ParamSpec::optional(
            "severity_filter",
            ParamType::StringList,
            "Only events with these severities: Critical, High, Medium, Low",
        ))
        .param(ParamSpec::optional(
            "event_dates",
            ParamType::StringList,
            "Only these events, by date (YYYY-MM-DD)",
        ));

        Self {
            engine,
            config,
            schema,
        }
    }

    fn select_events(&self, args: &ToolArgs) -> Result<Vec<EventSpec>, ToolError> {
        let severities = args
            .list("severity_filter")
            .unwrap_or_default()
            .iter()
            .map(|s| s.parse::<Severity>().map_err(|e| ToolError::invalid(NAME, e)))
            .collect::<Result<Vec<_>, _>>()?;

        let mut events: Vec<EventSpec> = EventFilter::default()
            .severities(severities)
            .apply()
            .into_iter()
            .map(|e| e.spec())
            .collect();

        if let Some(dates) = args.list("event_dates") {
            for date in dates {
                if find_event(date).is_none() {
                    return Err(ToolError::invalid(NAME, format!("no reference event on '{date}'")));
                }
            }
            events.retain(|e| dates.iter().any(|d| d.trim() == e.id));
        }
        Ok(events)
    }
}

#[async_trait]
impl Tool for EventStudyTool {
    fn schema(&self) -> &ToolSchema {
        &self.schema
    }

    async fn invoke(&self, args: ToolArgs) -> Result<Value, ToolError> {
        let ticker = args.require_str("ticker")?.trim().to_uppercase();
        let benchmark = args.require_str("benchmark")?.trim().to_uppercase();
        let start = args.require_i64("event_window_start")?;
        let end = args.require_i64("event_window_end")?;

        let window = self.config.window.with_event_window(start, end);
        window
            .validate()
            .map_err(|e| ToolError::invalid(NAME, e.to_string()))?;

        let events = self.select_events(&args)?;
        if events.is_empty() {
            return Err(ToolError::execution(NAME, "no events match the filter criteria"));
        }

        let batch = self
            .engine
            .study_many(&ticker, &benchmark, &events, &window)
            .await
            .map_err(|e| execution(NAME, e))?;

        let Some(summary) = &batch.summary else {
            return Err(ToolError::execution(
                NAME,
                format!(
                    "no event studies could be computed for {ticker} ({} failed, {} outside the price data range)",
                    batch.failures.len(),
                    batch.skipped.len()
                ),
            ));
        };

        let results: Vec<Value> = batch
            .results
            .iter()
            .map(|r| {
                json!({
                    "event_date": r.event_id,
                    "event": r.event_title,
                    "car_pct": pct(r.car, 2),
                    "raw_return_pct": pct(r.raw_return, 2),
                    "benchmark_return_pct": pct(r.benchmark_return, 2),
                    "t_stat": round(r.t_statistic, 3),
                    "p_value": round(r.p_value, 4),
                    "significant": r.significant,
                    "window": format!("{} to {}", r.window_start, r.window_end),
                    "estimation_days": r.estimation_days,
                    "alpha": round(r.model.alpha, 6),
                    "beta": round(r.model.beta, 3),
                })
            })
            .collect();

        Ok(json!({
            "ticker": ticker,
            "benchmark": benchmark,
            "event_window": format!("({start}, {end})"),
            "events_analyzed": results.len(),
            "results": results,
            "failures": batch.failures,
            "skipped_events": batch.skipped,
            "summary": {
                "average_car_pct": pct(summary.average_car, 2),
                "significant_events": format!("{}/{}", summary.significant, summary.events),
                "best_car": pct(summary.best_car, 2),
                "best_event": summary.best_event,
                "worst_car": pct(summary.worst_car, 2),
                "worst_event": summary.worst_event,
            },
            "methodology": format!(
                "Market model (OLS, {}-day estimation window). Significance at p<0.05 (two-tailed t-test).",
                window.estimation_length
            ),
        }))
    }
}
