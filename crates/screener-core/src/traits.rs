use crate::{Bar, ClassProbabilities, FundamentalsSnapshot, Headline, ScreenerError};
use async_trait::async_trait;
use chrono::{DateTime, Utc};

/// Default OHLCV lookback when no explicit date range is given.
pub const DEFAULT_LOOKBACK_DAYS: i64 = 200;

/// Contract with the external market-data provider.
///
/// `fetch_ohlcv` fails with `DataUnavailable` on an empty result and with
/// `RateLimited` when the provider is throttling; implementations retry the
/// latter with backoff before surfacing it. Any other failure propagates
/// immediately.
#[async_trait]
pub trait MarketDataGateway: Send + Sync {
    async fn fetch_ohlcv(
        &self,
        symbol: &str,
        start: Option<DateTime<Utc>>,
        end: Option<DateTime<Utc>>,
        lookback_days: i64,
    ) -> Result<Vec<Bar>, ScreenerError>;

    async fn fetch_fundamentals(&self, symbol: &str)
        -> Result<FundamentalsSnapshot, ScreenerError>;

    async fn fetch_recent_news(
        &self,
        symbol: &str,
        days: i64,
    ) -> Result<Vec<Headline>, ScreenerError>;
}

/// A news source yields a finite sequence of headlines for a symbol within
/// the last `days` days, or fails gracefully (callers degrade to empty).
#[async_trait]
pub trait NewsSource: Send + Sync {
    fn name(&self) -> &str;

    async fn recent_headlines(
        &self,
        symbol: &str,
        days: i64,
    ) -> Result<Vec<Headline>, ScreenerError>;
}

/// Three-class (negative/neutral/positive) headline classifier.
///
/// The heavy pretrained model lives behind this seam; the in-tree default is
/// a word-list scorer.
pub trait HeadlineClassifier: Send + Sync {
    fn classify(&self, headline: &str) -> ClassProbabilities;
}
