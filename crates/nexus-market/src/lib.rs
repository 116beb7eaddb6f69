//! Market-model event studies for export-control research
//!
//! Leaf-first:
//!
//! - [`series`] and [`stats`]: validated price/return series and the numeric
//!   helpers everything else builds on
//! - [`market_model`]: OLS fit of a ticker's returns on a benchmark's
//! - [`event_study`]: cumulative abnormal return (CAR) for one event, as a
//!   pure function
//! - [`engine`]: fetches series through a [`MarketDataLoader`] and memoizes
//!   results in a [`CarCache`]
//! - [`comparator`]: CARs, spreads, rolling correlations and win counts
//!   across a set of tickers, tolerating per-ticker failures
//! - [`tools`]: the research tools exposed to the chat orchestrator

pub mod api;
pub mod cache;
pub mod comparator;
pub mod config;
pub mod engine;
pub mod error;
pub mod event_study;
pub mod events;
pub mod loader;
pub mod market_model;
pub mod series;
pub mod stats;
pub mod tools;
pub mod universe;

#[cfg(test)]
mod testing;

pub use api::YahooLoader;
pub use cache::{CarCache, CarCacheKey};
pub use comparator::{ComparisonReport, ComparisonRequest, EcosystemComparator, TickerFailure};
pub use config::{MarketConfig, WindowConfig};
pub use engine::{EventFailure, EventStudyEngine, StudyBatch};
pub use error::{DataError, MarketError, Result, StudyError};
pub use event_study::{CarEvent, CarSummary, EventSpec, compute_car};
pub use events::{EventFilter, EventSummary, EventType, ExportControlEvent, Severity, all_events, find_event};
pub use loader::{MarketDataLoader, StaticLoader};
pub use market_model::MarketModelParameters;
pub use series::{PriceSeries, ReturnSeries};
pub use tools::{EcosystemTool, EventStudyTool, PriceTool, VolatilityTool, register_market_tools};
