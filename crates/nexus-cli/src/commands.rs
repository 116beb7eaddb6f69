//! Subcommand handlers

use crate::render;
use anyhow::{Context, Result};
use chrono::{NaiveDate, Utc};
use nexus_chat::{ChatConfig, Orchestrator, ResearchContext};
use nexus_llm::providers::OpenAIProvider;
use nexus_llm::{Message, ResearchLlm};
use nexus_market::{
    ComparisonRequest, EcosystemComparator, EventFilter, EventSpec, EventStudyEngine, EventSummary,
    EventType, ExportControlEvent, MarketConfig, Severity, YahooLoader, all_events, find_event,
};
use serde::Serialize;
use std::io::Write;
use std::path::Path;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::info;

/// Messages kept from earlier chat turns
const HISTORY_LIMIT: usize = 20;

fn print_json(value: &impl Serialize) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn market_config(benchmark: Option<String>) -> Result<MarketConfig> {
    let mut builder = MarketConfig::builder();
    if let Some(benchmark) = benchmark {
        builder = builder.benchmark(benchmark);
    }
    Ok(builder.build()?)
}

fn engine(config: &MarketConfig) -> Arc<EventStudyEngine> {
    let loader = Arc::new(YahooLoader::new(
        config.requests_per_second,
        config.request_timeout,
    ));
    Arc::new(EventStudyEngine::from_config(loader, config))
}

/// Reference events by id; every event when `ids` is empty
fn event_specs(ids: &[String]) -> Result<Vec<EventSpec>> {
    if ids.is_empty() {
        return Ok(all_events().iter().map(ExportControlEvent::spec).collect());
    }
    ids.iter()
        .map(|id| {
            find_event(id)
                .map(ExportControlEvent::spec)
                .with_context(|| format!("unknown event '{id}'"))
        })
        .collect()
}

pub async fn car(
    ticker: &str,
    event_ids: &[String],
    benchmark: Option<String>,
    (window_start, window_end): (i64, i64),
    json: bool,
) -> Result<()> {
    let config = market_config(benchmark)?;
    let window = config.window.with_event_window(window_start, window_end);
    let events = event_specs(event_ids)?;

    let ticker = ticker.trim().to_uppercase();
    info!(ticker = %ticker, events = events.len(), "running event study");
    let batch = engine(&config)
        .study_many(&ticker, &config.benchmark, &events, &window)
        .await?;

    if json {
        return print_json(&batch);
    }
    println!("{}", render::study_batch(&batch));
    Ok(())
}

pub async fn compare(
    tickers: &[String],
    since: Option<NaiveDate>,
    until: Option<NaiveDate>,
    benchmark: Option<String>,
    json: bool,
) -> Result<()> {
    let config = market_config(benchmark)?;
    let start = since.unwrap_or(config.start_date);
    let end = until.unwrap_or_else(|| Utc::now().date_naive());
    let events = EventFilter::default()
        .from(start)
        .to(end)
        .apply()
        .into_iter()
        .map(ExportControlEvent::spec)
        .collect();

    let request = ComparisonRequest::new(tickers, start)
        .with_benchmark(&config.benchmark)
        .with_end(end)
        .with_events(events)
        .with_window(config.window)
        .with_correlation_window(config.correlation_window);
    let report = EcosystemComparator::new(engine(&config))
        .compare(&request)
        .await?;

    if json {
        return print_json(&report);
    }
    println!("{}", render::comparison(&report));
    Ok(())
}

pub fn events(
    severities: Vec<Severity>,
    types: Vec<EventType>,
    from: Option<NaiveDate>,
    to: Option<NaiveDate>,
    json: bool,
) -> Result<()> {
    let mut filter = EventFilter::default().severities(severities).types(types);
    if let Some(from) = from {
        filter = filter.from(from);
    }
    if let Some(to) = to {
        filter = filter.to(to);
    }
    let events = filter.apply();
    let summary = EventSummary::of(&events);

    if json {
        return print_json(&serde_json::json!({ "summary": summary, "events": events }));
    }
    println!("{}", render::events(&events));
    println!(
        "{} events, {}",
        summary.total,
        summary
            .by_severity
            .iter()
            .map(|(severity, n)| format!("{n} {severity}"))
            .collect::<Vec<_>>()
            .join(", ")
    );
    Ok(())
}

async fn orchestrator(knowledge: Option<&Path>) -> Result<Orchestrator> {
    let chat = ChatConfig::from_env()?;
    let market = MarketConfig::default();
    let loader = Arc::new(YahooLoader::new(
        market.requests_per_second,
        market.request_timeout,
    ));
    let context = ResearchContext::initialize(loader, market, knowledge).await?;

    let provider = OpenAIProvider::from_env()
        .context("ask and chat need an OpenAI-compatible endpoint (set OPENAI_API_KEY)")?;
    let mut llm = ResearchLlm::new(Arc::new(provider), chat.model.clone())
        .with_max_tokens(chat.max_tokens);
    if let Some(temperature) = chat.temperature {
        llm = llm.with_temperature(temperature);
    }
    Ok(Orchestrator::new(llm, context, chat))
}

pub async fn ask(question: &str, knowledge: Option<&Path>, json: bool) -> Result<()> {
    let answer = orchestrator(knowledge).await?.answer(question, &[]).await;
    if json {
        return print_json(&answer);
    }
    println!("{}", render::answer(&answer));
    Ok(())
}

pub async fn chat(knowledge: Option<&Path>) -> Result<()> {
    let orchestrator = orchestrator(knowledge).await?;
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut history: Vec<Message> = Vec::new();

    println!("nexus research chat. Empty line or 'exit' to quit.");
    loop {
        print!("> ");
        std::io::stdout().flush()?;
        let Some(line) = lines.next_line().await? else {
            break;
        };
        let question = line.trim();
        if question.is_empty() || question.eq_ignore_ascii_case("exit") {
            break;
        }

        let answer = orchestrator.answer(question, &history).await;
        println!("\n{}\n", render::answer(&answer));

        history.push(Message::user(question));
        history.push(Message::assistant(answer.text));
        let excess = history.len().saturating_sub(HISTORY_LIMIT);
        history.drain(..excess);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_specs() {
        assert_eq!(event_specs(&[]).unwrap().len(), all_events().len());

        let specs = event_specs(&["event:2022-10-07".to_string()]).unwrap();
        assert_eq!(specs[0].id, "2022-10-07");

        let err = event_specs(&["1999-01-01".to_string()]).unwrap_err();
        assert!(err.to_string().contains("1999-01-01"));
    }

    #[test]
    fn test_market_config_benchmark_override() {
        assert_eq!(market_config(None).unwrap().benchmark, "SPY");
        assert_eq!(market_config(Some(" qqq ".to_string())).unwrap().benchmark, "QQQ");
    }
}
