//! Live market data sources

mod yahoo;

pub use yahoo::YahooLoader;
