//! Ecosystem comparison with export-control context

use super::{execution, pct, round, uppercase};
use crate::comparator::{ComparisonRequest, EcosystemComparator};
use crate::config::MarketConfig;
use crate::engine::EventStudyEngine;
use crate::events::{EventFilter, find_event};
use crate::universe;
use async_trait::async_trait;
use chrono::Utc;
use nexus_tools::{ArgValue, ParamSpec, ParamType, Tool, ToolArgs, ToolError, ToolSchema};
use serde_json::{Map, Value, json};
use std::sync::Arc;

const NAME: &str = "ecosystem_tool";

pub struct EcosystemTool {
    comparator: EcosystemComparator,
    config: Arc<MarketConfig>,
    schema: ToolSchema,
}

impl EcosystemTool {
    pub fn new(engine: Arc<EventStudyEngine>, config: Arc<MarketConfig>) -> Self {
        let schema = ToolSchema::new(
            NAME,
            "Compare semiconductor ecosystem tickers against each other and a benchmark. Computes \
             cumulative returns, volatility, beta, correlations, CAR spreads, head-to-head win counts \
             and event-window impacts around export control events. Use for any 'compare X vs Y' question.",
        )
        .param(ParamSpec::required(
            "tickers",
            ParamType::StringList,
            "Tickers to compare (e.g. ['NVDA','AMD','TSM'])",
        ))
        .param(
            ParamSpec::optional("benchmark", ParamType::String, "Benchmark ticker")
                .with_default(ArgValue::String(config.benchmark.clone())),
        )
        .param(
            ParamSpec::optional("start_date", ParamType::Date, "Start date YYYY-MM-DD")
                .with_default(ArgValue::Date(config.start_date)),
        )
        .param(ParamSpec::optional(
            "end_date",
            ParamType::Date,
            "End date YYYY-MM-DD (default: today)",
        ))
        .param(
            ParamSpec::optional(
                "include_event_impact",
                ParamType::Boolean,
                "Include event-window returns and CARs for each ticker",
            )
            .with_default(ArgValue::Boolean(true)),
        );

        Self {
            comparator: EcosystemComparator::new(engine),
            config,
            schema,
        }
    }
}

#[async_trait]
impl Tool for EcosystemTool {
    fn schema(&self) -> &ToolSchema {
        &self.schema
    }

    async fn invoke(&self, args: ToolArgs) -> Result<Value, ToolError> {
        let tickers = uppercase(args.require_list("tickers")?);
        let benchmark = args.require_str("benchmark")?.trim().to_uppercase();
        let start = args.require_date("start_date")?;
        let end = args.date("end_date").unwrap_or_else(|| Utc::now().date_naive());
        let include_events = args.bool("include_event_impact").unwrap_or(true);

        let events = if include_events {
            EventFilter::default()
                .from(start)
                .to(end)
                .apply()
                .into_iter()
                .map(|e| e.spec())
                .collect()
        } else {
            Vec::new()
        };

        let request = ComparisonRequest::new(&tickers, start)
            .with_benchmark(&benchmark)
            .with_end(end)
            .with_events(events)
            .with_window(self.config.window)
            .with_correlation_window(self.config.correlation_window);

        let report = self
            .comparator
            .compare(&request)
            .await
            .map_err(|e| execution(NAME, e))?;

        if report.tickers.is_empty() {
            let reasons: Vec<String> = report
                .failures
                .iter()
                .map(|f| format!("{}: {}", f.ticker, f.reason))
                .collect();
            return Err(ToolError::execution(
                NAME,
                format!("could not load price data ({})", reasons.join("; ")),
            ));
        }

        let mut summaries = Map::new();
        let mut context = Map::new();
        let mut groups = Map::new();
        for s in &report.summaries {
            summaries.insert(
                s.ticker.clone(),
                json!({
                    "cumulative_return_pct": pct(s.cumulative_return, 2),
                    "annualized_vol_pct": s.annualized_volatility.map(|v| pct(v, 2)),
                    "beta": s.beta.map(|b| round(b, 3)),
                    "correlation": s.correlation.map(|c| round(c, 3)),
                    "trading_days": s.trading_days,
                }),
            );
            context.insert(
                s.ticker.clone(),
                json!({
                    "name": s.name.map_or_else(|| s.ticker.clone(), str::to_string),
                    "export_exposure": s.export_exposure.unwrap_or("Unknown"),
                }),
            );
            if let Some(group) = universe::group_of(&s.ticker) {
                groups.insert(s.ticker.clone(), json!(group));
            }
        }

        let event_impacts: Vec<Value> = report
            .events
            .iter()
            .map(|e| {
                let severity = find_event(&e.event_id).map(|ev| ev.severity.to_string());
                let returns: Map<String, Value> = e
                    .results
                    .iter()
                    .map(|r| (r.ticker.clone(), json!(pct(r.window_return, 2))))
                    .collect();
                let alphas: Map<String, Value> = e
                    .results
                    .iter()
                    .map(|r| (r.ticker.clone(), json!(pct(r.alpha, 2))))
                    .collect();
                let cars: Map<String, Value> = e
                    .results
                    .iter()
                    .map(|r| {
                        (
                            r.ticker.clone(),
                            json!({"car_pct": pct(r.car, 2), "significant": r.significant}),
                        )
                    })
                    .collect();
                json!({
                    "event_date": e.event_id,
                    "event": e.title,
                    "severity": severity,
                    "benchmark_return_pct": e.benchmark_return.map(|b| pct(b, 2)),
                    "returns_pct": returns,
                    "alpha_pct": alphas,
                    "car": cars,
                    "winner": e.winner,
                })
            })
            .collect();

        let pairs: Vec<Value> = report
            .pairs
            .iter()
            .map(|p| {
                let mut wins = Map::new();
                wins.insert(p.a.clone(), json!(p.a_wins));
                wins.insert(p.b.clone(), json!(p.b_wins));
                json!({
                    "pair": format!("{} vs {}", p.a, p.b),
                    "mean_car_spread_pct": p.mean_spread.map(|s| pct(s, 2)),
                    "raw_return_wins": wins,
                    "ties": p.ties,
                    "rolling_correlation": p.rolling_correlation.as_ref().map(|c| json!({
                        "window_days": c.window,
                        "latest": round(c.latest, 3),
                        "mean": round(c.mean, 3),
                        "min": round(c.min, 3),
                        "max": round(c.max, 3),
                    })),
                })
            })
            .collect();

        let severe_ids: Vec<&str> = report
            .events
            .iter()
            .filter(|e| find_event(&e.event_id).is_some_and(|ev| ev.severity.is_severe()))
            .map(|e| e.event_id.as_str())
            .collect();
        let severe = report.aggregate(&severe_ids).map(|agg| {
            json!({
                "events": agg.events,
                "average_return_pct": agg.average_window_return.iter()
                    .map(|(t, v)| (t.clone(), json!(pct(*v, 2))))
                    .collect::<Map<_, _>>(),
                "average_car_pct": agg.average_car.iter()
                    .map(|(t, v)| (t.clone(), json!(pct(*v, 2))))
                    .collect::<Map<_, _>>(),
                "wins": agg.wins,
            })
        });

        Ok(json!({
            "tickers": report.tickers,
            "benchmark": report.benchmark,
            "period": format!("{} to {}", report.start, report.end),
            "summary": summaries,
            "export_control_context": context,
            "ecosystem_groups": groups,
            "event_impacts": event_impacts,
            "pairs": pairs,
            "critical_high_events": severe,
            "failures": report.failures,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::fixtures;

    async fn run(raw: Value) -> Result<Value, ToolError> {
        let tool = EcosystemTool::new(fixtures::engine(), fixtures::config());
        let args = tool.schema().coerce(&raw)?;
        tool.invoke(args).await
    }

    #[tokio::test]
    async fn test_compare_pair() {
        let out = run(json!({
            "tickers": "NVDA, AMD",
            "start_date": "2023-01-01",
            "end_date": "2023-11-30"
        }))
        .await
        .unwrap();

        assert_eq!(out["tickers"], json!(["NVDA", "AMD"]));
        assert_eq!(out["ecosystem_groups"]["AMD"], "gpu_leaders");
        assert_eq!(out["export_control_context"]["NVDA"]["name"], "Nvidia");
        assert_eq!(out["pairs"][0]["pair"], "NVDA vs AMD");

        let impacts = out["event_impacts"].as_array().unwrap();
        let dates: Vec<_> = impacts.iter().map(|e| e["event_date"].as_str().unwrap()).collect();
        assert_eq!(dates, vec!["2023-05-24", "2023-10-17"]);
        assert_eq!(impacts[1]["severity"], "High");
        assert_eq!(out["critical_high_events"]["events"], 2);
        assert!(out["failures"].as_array().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_partial_failure_is_reported() {
        let out = run(json!({
            "tickers": ["NVDA", "ASML"],
            "start_date": "2022-06-01",
            "end_date": "2023-06-01",
            "include_event_impact": false
        }))
        .await
        .unwrap();

        assert_eq!(out["tickers"], json!(["NVDA"]));
        assert_eq!(out["failures"][0]["ticker"], "ASML");
        assert_eq!(out["failures"][0]["stage"], "fetch");
        assert!(out["event_impacts"].as_array().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_requires_tickers() {
        let err = run(json!({"benchmark": "SPY"})).await.unwrap_err();
        assert!(matches!(err, ToolError::InvalidArguments { .. }));
    }

    #[tokio::test]
    async fn test_all_tickers_missing() {
        let err = run(json!({"tickers": ["TSM", "ASML"], "end_date": "2023-06-01"}))
            .await
            .unwrap_err();
        assert!(matches!(err, ToolError::Execution { .. }));
        assert!(err.to_string().contains("TSM"));
    }
}
