//! Market data loader seam

use crate::error::DataError;
use crate::series::{PriceSeries, ReturnSeries};
use async_trait::async_trait;
use chrono::NaiveDate;
use std::collections::HashMap;

/// Source of daily price and return series.
///
/// Implementations report failures as [`DataError`] and never retry or
/// substitute data on their own.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait MarketDataLoader: Send + Sync {
    /// Adjusted closes with `start <= date <= end`
    async fn get_prices(
        &self,
        ticker: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<PriceSeries, DataError>;

    /// Simple daily returns with `start <= date <= end`
    async fn get_returns(
        &self,
        ticker: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<ReturnSeries, DataError> {
        Ok(self.get_prices(ticker, start, end).await?.returns())
    }
}

/// In-memory loader over preloaded series
#[derive(Debug, Clone, Default)]
pub struct StaticLoader {
    prices: HashMap<String, PriceSeries>,
    returns: HashMap<String, ReturnSeries>,
}

impl StaticLoader {
    pub fn new() -> Self {
        Self::default()
    }

    /// Serve this price series for its ticker
    pub fn with_prices(mut self, series: PriceSeries) -> Self {
        self.prices.insert(series.ticker().to_uppercase(), series);
        self
    }

    /// Serve this return series verbatim for its ticker
    pub fn with_returns(mut self, series: ReturnSeries) -> Self {
        self.returns.insert(series.ticker().to_uppercase(), series);
        self
    }

    fn missing(ticker: &str) -> DataError {
        DataError::unavailable(ticker, "no series loaded")
    }
}

#[async_trait]
impl MarketDataLoader for StaticLoader {
    async fn get_prices(
        &self,
        ticker: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<PriceSeries, DataError> {
        let key = ticker.to_uppercase();
        let series = match (self.prices.get(&key), self.returns.get(&key)) {
            (Some(prices), _) => prices.slice(start, end),
            (None, Some(returns)) => PriceSeries::from_returns(returns, 100.0)?.slice(start, end),
            (None, None) => return Err(Self::missing(ticker)),
        };
        if series.is_empty() {
            return Err(DataError::unavailable(ticker, format!("no data between {start} and {end}")));
        }
        Ok(series)
    }

    async fn get_returns(
        &self,
        ticker: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<ReturnSeries, DataError> {
        match self.returns.get(&ticker.to_uppercase()) {
            Some(returns) => {
                let series = returns.slice(start, end);
                if series.is_empty() {
                    Err(DataError::unavailable(ticker, format!("no data between {start} and {end}")))
                } else {
                    Ok(series)
                }
            }
            None => Ok(self.get_prices(ticker, start, end).await?.returns()),
        }
    }
}
