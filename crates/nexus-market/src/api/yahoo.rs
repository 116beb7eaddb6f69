//! Yahoo Finance loader

use crate::error::DataError;
use crate::loader::MarketDataLoader;
use crate::series::PriceSeries;
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate};
use governor::clock::DefaultClock;
use governor::state::{InMemoryState, NotKeyed};
use governor::{Quota, RateLimiter};
use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::Duration;
use time::OffsetDateTime;
use tracing::{debug, instrument, warn};
use yahoo_finance_api as yahoo;

type SharedRateLimiter = Arc<RateLimiter<NotKeyed, InMemoryState, DefaultClock>>;

const PROVIDER: &str = "yahoo";

/// Daily adjusted closes from Yahoo Finance, rate limited and time bounded
pub struct YahooLoader {
    rate_limiter: SharedRateLimiter,
    timeout: Duration,
}

impl YahooLoader {
    /// `requests_per_second` of zero is treated as one
    pub fn new(requests_per_second: u32, timeout: Duration) -> Self {
        let quota = Quota::per_second(NonZeroU32::new(requests_per_second).unwrap_or(NonZeroU32::MIN));
        Self {
            rate_limiter: Arc::new(RateLimiter::direct(quota)),
            timeout,
        }
    }

    fn to_offset(ticker: &str, date: NaiveDate) -> Result<OffsetDateTime, DataError> {
        let secs = date
            .and_hms_opt(0, 0, 0)
            .map(|dt| dt.and_utc().timestamp())
            .ok_or_else(|| DataError::unavailable(ticker, format!("invalid date {date}")))?;
        OffsetDateTime::from_unix_timestamp(secs)
            .map_err(|e| DataError::unavailable(ticker, format!("invalid timestamp: {e}")))
    }

    async fn fetch(
        &self,
        ticker: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<PriceSeries, DataError> {
        let connector = yahoo::YahooConnector::new()
            .map_err(|e| DataError::unavailable(ticker, e))?;

        // Yahoo's end bound is exclusive.
        let end_inclusive = end.succ_opt().unwrap_or(end);
        let response = connector
            .get_quote_history(
                ticker,
                Self::to_offset(ticker, start)?,
                Self::to_offset(ticker, end_inclusive)?,
            )
            .await
            .map_err(|e| classify(ticker, &e))?;

        let quotes = response.quotes().map_err(|e| classify(ticker, &e))?;

        let mut points: Vec<(NaiveDate, f64)> = quotes
            .iter()
            .filter_map(|q| {
                let date = DateTime::from_timestamp(q.timestamp as i64, 0)?.date_naive();
                (q.adjclose.is_finite() && q.adjclose > 0.0).then_some((date, q.adjclose))
            })
            .collect();
        // Intraday duplicates show up near the current session; keep the last.
        points.dedup_by(|later, earlier| {
            if later.0 == earlier.0 {
                earlier.1 = later.1;
                true
            } else {
                false
            }
        });

        if points.is_empty() {
            return Err(DataError::unavailable(ticker, "empty quote history"));
        }

        PriceSeries::new(ticker, points)
    }
}

fn classify(ticker: &str, error: &yahoo::YahooError) -> DataError {
    let message = error.to_string();
    if message.contains("429") || message.to_ascii_lowercase().contains("too many requests") {
        DataError::RateLimited {
            provider: PROVIDER.to_string(),
        }
    } else {
        DataError::unavailable(ticker, message)
    }
}

#[async_trait]
impl MarketDataLoader for YahooLoader {
    #[instrument(skip(self), fields(provider = PROVIDER))]
    async fn get_prices(
        &self,
        ticker: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<PriceSeries, DataError> {
        self.rate_limiter.until_ready().await;

        match tokio::time::timeout(self.timeout, self.fetch(ticker, start, end)).await {
            Ok(Ok(series)) => {
                debug!(points = series.len(), "fetched price history");
                Ok(series)
            }
            Ok(Err(e)) => {
                warn!(error = %e, "price fetch failed");
                Err(e)
            }
            Err(_) => Err(DataError::unavailable(
                ticker,
                format!("timed out after {} ms", self.timeout.as_millis()),
            )),
        }
    }
}
