//! Command-line interface for nexus-rs

mod commands;
mod render;

use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use nexus_market::{EventType, Severity};
use nexus_utils::{AppConfig, init_tracing};
use std::path::PathBuf;
use tracing::debug;

#[derive(Parser, Debug)]
#[command(name = "nexus")]
#[command(about = "Export-control event studies and grounded research chat", version)]
#[command(arg_required_else_help = true)]
#[command(
    after_help = "Examples:\n  nexus car NVDA --event 2022-10-07\n  nexus compare NVDA AMD TSM --since 2023-01-01\n  nexus events --severity high --from 2023-01-01\n  nexus ask \"Run CAR for NVDA around Oct 7 rules\"\n"
)]
struct Cli {
    /// Print JSON instead of tables
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Cumulative abnormal returns of one ticker around reference events
    Car {
        ticker: String,
        /// Event id (YYYY-MM-DD); repeat for several. Defaults to every event
        #[arg(long = "event")]
        events: Vec<String>,
        #[arg(long)]
        benchmark: Option<String>,
        /// First event-window day
        #[arg(long, default_value_t = -1, allow_negative_numbers = true)]
        window_start: i64,
        /// Last event-window day
        #[arg(long, default_value_t = 5)]
        window_end: i64,
    },
    /// Compare several tickers across the events in a period
    Compare {
        #[arg(required = true, num_args = 2..)]
        tickers: Vec<String>,
        #[arg(long)]
        since: Option<NaiveDate>,
        #[arg(long)]
        until: Option<NaiveDate>,
        #[arg(long)]
        benchmark: Option<String>,
    },
    /// List the reference events
    Events {
        #[arg(long)]
        severity: Vec<Severity>,
        #[arg(long = "type")]
        event_type: Vec<EventType>,
        #[arg(long)]
        from: Option<NaiveDate>,
        #[arg(long)]
        to: Option<NaiveDate>,
    },
    /// Answer one question with citations or tool evidence
    Ask {
        question: String,
        /// Extra case material as JSON lines
        #[arg(long)]
        knowledge: Option<PathBuf>,
    },
    /// Interactive research chat; history is kept for the session
    Chat {
        #[arg(long)]
        knowledge: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let app = AppConfig::from_env()?;
    init_tracing(app.log_format, &app.log_filter);

    let cli = Cli::parse();
    debug!(command = ?cli.command, environment = %app.environment, "starting nexus");

    match cli.command {
        Command::Car {
            ticker,
            events,
            benchmark,
            window_start,
            window_end,
        } => {
            commands::car(&ticker, &events, benchmark, (window_start, window_end), cli.json).await
        }
        Command::Compare {
            tickers,
            since,
            until,
            benchmark,
        } => commands::compare(&tickers, since, until, benchmark, cli.json).await,
        Command::Events {
            severity,
            event_type,
            from,
            to,
        } => commands::events(severity, event_type, from, to, cli.json),
        Command::Ask {
            question,
            knowledge,
        } => commands::ask(&question, knowledge.as_deref(), cli.json).await,
        Command::Chat { knowledge } => commands::chat(knowledge.as_deref()).await,
    }
}
