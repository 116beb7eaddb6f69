//! Table rendering for terminal output

use comfy_table::presets::UTF8_FULL;
use comfy_table::{Cell, ContentArrangement, Table};
use nexus_chat::GroundedAnswer;
use nexus_market::{ComparisonReport, ExportControlEvent, StudyBatch};

fn table(header: &[&str]) -> Table {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(header.iter().map(Cell::new));
    table
}

fn pct(value: f64) -> String {
    format!("{:+.2}%", value * 100.0)
}

fn opt<T>(value: Option<T>, f: impl Fn(T) -> String) -> String {
    value.map_or_else(|| "-".to_string(), f)
}

pub fn study_batch(batch: &StudyBatch) -> String {
    let mut out = table(&[
        "Event", "Date", "Window", "CAR", "t", "p", "Sig", "Beta", "Est. days",
    ]);
    for car in &batch.results {
        out.add_row(vec![
            car.event_id.clone(),
            car.resolved_date.to_string(),
            format!("{} .. {}", car.window_start, car.window_end),
            pct(car.car),
            format!("{:.2}", car.t_statistic),
            format!("{:.3}", car.p_value),
            if car.significant { "yes" } else { "" }.to_string(),
            format!("{:.2}", car.model.beta),
            car.estimation_days.to_string(),
        ]);
    }

    let mut text = format!("{} vs {}\n{out}", batch.ticker, batch.benchmark);
    if let Some(summary) = &batch.summary {
        text.push_str(&format!(
            "\nAverage CAR {} over {} events, {} significant. Best {} ({}), worst {} ({})",
            pct(summary.average_car),
            summary.events,
            summary.significant,
            summary.best_event,
            pct(summary.best_car),
            summary.worst_event,
            pct(summary.worst_car),
        ));
    }
    for failure in &batch.failures {
        text.push_str(&format!("\n! {}: {}", failure.event_id, failure.reason));
    }
    if !batch.skipped.is_empty() {
        text.push_str(&format!("\nOutside the data range: {}", batch.skipped.join(", ")));
    }
    text
}

pub fn comparison(report: &ComparisonReport) -> String {
    let mut summaries = table(&["Ticker", "Group", "Exposure", "Return", "Ann. vol", "Beta", "Corr"]);
    for s in &report.summaries {
        summaries.add_row(vec![
            s.ticker.clone(),
            s.group.unwrap_or("-").to_string(),
            s.export_exposure.unwrap_or("-").to_string(),
            pct(s.cumulative_return),
            opt(s.annualized_volatility, pct),
            opt(s.beta, |b| format!("{b:.2}")),
            opt(s.correlation, |c| format!("{c:.2}")),
        ]);
    }

    let mut header = vec!["Event", "Date", "Benchmark"];
    header.extend(report.tickers.iter().map(String::as_str));
    header.push("Best");
    let mut events = table(&header);
    for event in &report.events {
        let mut row = vec![
            event.event_id.clone(),
            event.date.to_string(),
            opt(event.benchmark_return, pct),
        ];
        row.extend(
            report
                .tickers
                .iter()
                .map(|t| opt(event.result(t), |r| pct(r.car))),
        );
        row.push(event.winner.clone().unwrap_or_else(|| "-".to_string()));
        events.add_row(row);
    }

    let mut pairs = table(&["Pair", "Mean CAR spread", "Wins", "Ties", "Rolling corr"]);
    for pair in &report.pairs {
        pairs.add_row(vec![
            format!("{} vs {}", pair.a, pair.b),
            opt(pair.mean_spread, pct),
            format!("{}-{}", pair.a_wins, pair.b_wins),
            pair.ties.to_string(),
            opt(pair.rolling_correlation.as_ref(), |c| {
                format!("{:.2} (mean {:.2}, {}d)", c.latest, c.mean, c.window)
            }),
        ]);
    }

    let mut text = format!(
        "{} to {} against {}\n{summaries}\n{events}\n{pairs}",
        report.start, report.end, report.benchmark
    );
    for failure in &report.failures {
        let scope = failure
            .event_id
            .as_ref()
            .map_or_else(String::new, |id| format!(" @ {id}"));
        text.push_str(&format!("\n! {}{scope}: {}", failure.ticker, failure.reason));
    }
    text
}

pub fn events(events: &[&ExportControlEvent]) -> String {
    let mut out = table(&["Date", "Severity", "Type", "Title", "Chips"]);
    for e in events {
        out.add_row(vec![
            e.date.to_string(),
            e.severity.to_string(),
            e.event_type.to_string(),
            e.title.to_string(),
            e.chips_affected.join(", "),
        ]);
    }
    out.to_string()
}

pub fn answer(answer: &GroundedAnswer) -> String {
    let mut text = answer.text.clone();
    if !answer.tool_calls.is_empty() {
        let mut calls = table(&["Tool", "Source", "Status", "ms"]);
        for call in &answer.tool_calls {
            calls.add_row(vec![
                call.tool_name.clone(),
                format!("{:?}", call.source).to_lowercase(),
                call.error.clone().unwrap_or_else(|| "ok".to_string()),
                opt(call.duration_ms, |ms| ms.to_string()),
            ]);
        }
        text.push_str(&format!("\n\n{calls}"));
    }
    if !answer.citations.is_empty() {
        let cited: Vec<&str> = answer.citations.iter().map(String::as_str).collect();
        text.push_str(&format!("\nSources: {}", cited.join(", ")));
    }
    text
}
