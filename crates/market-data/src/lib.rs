//! HTTP client for the market-data provider: OHLCV bars, fundamentals
//! snapshots, and recent news headlines, behind the `MarketDataGateway`
//! contract. Requests go through a sliding-window rate limiter; provider
//! throttling (HTTP 429) is retried with linear backoff before surfacing.

use async_trait::async_trait;
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use reqwest::Client;
use screener_core::{
    Bar, FundamentalsSnapshot, Headline, MarketDataGateway, ScreenerError,
};
use serde::Deserialize;
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;

pub mod universe;
pub use universe::{fallback_universe, fetch_universe};

const DEFAULT_BASE_URL: &str = "https://api.marketfeed.example.com";
const MAX_RATE_LIMIT_ATTEMPTS: u32 = 3;

/// Sliding-window rate limiter: at most `max_requests` per `window`.
#[derive(Clone)]
struct RequestThrottle {
    sent_at: Arc<Mutex<VecDeque<Instant>>>,
    max_requests: usize,
    window: Duration,
}

impl RequestThrottle {
    fn new(max_requests: usize, window: Duration) -> Self {
        Self {
            sent_at: Arc::new(Mutex::new(VecDeque::new())),
            max_requests,
            window,
        }
    }

    async fn acquire(&self) {
        loop {
            let mut sent = self.sent_at.lock().await;
            let now = Instant::now();

            while let Some(&oldest) = sent.front() {
                if now.duration_since(oldest) >= self.window {
                    sent.pop_front();
                } else {
                    break;
                }
            }

            if sent.len() < self.max_requests {
                sent.push_back(now);
                return;
            }

            // Non-empty here: len >= max_requests >= 1.
            let oldest = *sent.front().expect("throttle queue is non-empty");
            let wait = self.window.saturating_sub(now.duration_since(oldest))
                + Duration::from_millis(50);
            drop(sent);
            tracing::debug!("throttle: waiting {:.1}s for a request slot", wait.as_secs_f64());
            tokio::time::sleep(wait).await;
        }
    }
}

#[derive(Clone)]
pub struct MarketDataClient {
    api_key: String,
    base_url: String,
    client: Client,
    throttle: RequestThrottle,
    /// Base delay for rate-limit retries; multiplied by the attempt number.
    retry_base_delay: Duration,
}

impl MarketDataClient {
    pub fn new(api_key: String) -> Self {
        Self::with_base_url(api_key, DEFAULT_BASE_URL.to_string())
    }

    pub fn with_base_url(api_key: String, base_url: String) -> Self {
        // Requests per minute; free-tier users should set MARKET_DATA_RATE_LIMIT=5.
        let rate_limit: usize = std::env::var("MARKET_DATA_RATE_LIMIT")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(120)
            .max(1);

        let client = Client::builder()
            .timeout(Duration::from_secs(90))
            .build()
            .unwrap_or_else(|_| Client::new());

        Self {
            api_key,
            base_url,
            client,
            throttle: RequestThrottle::new(rate_limit, Duration::from_secs(60)),
            retry_base_delay: Duration::from_secs(2),
        }
    }

    /// Send a request through the throttle, retrying on HTTP 429 with
    /// `base_delay * attempt` backoff. Non-429 failures are surfaced
    /// immediately without retry.
    async fn send_request(
        &self,
        builder: reqwest::RequestBuilder,
    ) -> Result<reqwest::Response, ScreenerError> {
        let request = builder
            .build()
            .map_err(|e| ScreenerError::Gateway(e.to_string()))?;

        for attempt in 1..=MAX_RATE_LIMIT_ATTEMPTS {
            self.throttle.acquire().await;
            let req = request
                .try_clone()
                .ok_or_else(|| ScreenerError::Gateway("cannot clone request".to_string()))?;
            let response = self
                .client
                .execute(req)
                .await
                .map_err(|e| ScreenerError::Gateway(e.to_string()))?;

            if response.status().as_u16() != 429 {
                return Ok(response);
            }

            if attempt < MAX_RATE_LIMIT_ATTEMPTS {
                let wait = self.retry_base_delay * attempt;
                tracing::warn!(
                    "provider rate limit hit, waiting {:.0}s before retry {}/{}",
                    wait.as_secs_f64(),
                    attempt + 1,
                    MAX_RATE_LIMIT_ATTEMPTS
                );
                tokio::time::sleep(wait).await;
            }
        }

        Err(ScreenerError::RateLimited(format!(
            "provider still throttling after {MAX_RATE_LIMIT_ATTEMPTS} attempts"
        )))
    }

    async fn check_status(response: reqwest::Response) -> Result<reqwest::Response, ScreenerError> {
        if response.status().is_success() {
            return Ok(response);
        }
        Err(ScreenerError::Gateway(format!(
            "HTTP {}: {}",
            response.status(),
            response.text().await.unwrap_or_default()
        )))
    }
}

#[async_trait]
impl MarketDataGateway for MarketDataClient {
    async fn fetch_ohlcv(
        &self,
        symbol: &str,
        start: Option<DateTime<Utc>>,
        end: Option<DateTime<Utc>>,
        lookback_days: i64,
    ) -> Result<Vec<Bar>, ScreenerError> {
        let end = end.unwrap_or_else(Utc::now);
        let start = start.unwrap_or(end - ChronoDuration::days(lookback_days));

        let url = format!(
            "{}/v1/bars/{}/{}/{}",
            self.base_url,
            symbol,
            start.format("%Y-%m-%d"),
            end.format("%Y-%m-%d")
        );

        let response = self
            .send_request(self.client.get(&url).query(&[("apiKey", &self.api_key)]))
            .await?;
        let response = Self::check_status(response).await?;

        let body: BarsResponse = response
            .json()
            .await
            .map_err(|e| ScreenerError::Gateway(e.to_string()))?;

        let mut bars: Vec<Bar> = body
            .bars
            .into_iter()
            .filter_map(|b| {
                let timestamp = DateTime::from_timestamp_millis(b.t)?;
                Some(Bar {
                    timestamp,
                    open: b.o,
                    high: b.h,
                    low: b.l,
                    close: b.c,
                    volume: b.v,
                })
            })
            .collect();
        bars.sort_by_key(|b| b.timestamp);

        if bars.is_empty() {
            return Err(ScreenerError::DataUnavailable(format!(
                "no price data for {symbol}"
            )));
        }

        tracing::debug!("fetched {} bars for {}", bars.len(), symbol);
        Ok(bars)
    }

    async fn fetch_fundamentals(
        &self,
        symbol: &str,
    ) -> Result<FundamentalsSnapshot, ScreenerError> {
        let url = format!("{}/v1/fundamentals/{}", self.base_url, symbol);

        let response = self
            .send_request(self.client.get(&url).query(&[("apiKey", &self.api_key)]))
            .await?;
        let response = Self::check_status(response).await?;

        let body: FundamentalsResponse = response
            .json()
            .await
            .map_err(|e| ScreenerError::Gateway(e.to_string()))?;

        Ok(FundamentalsSnapshot {
            symbol: symbol.to_string(),
            forward_pe: body.forward_pe,
            trailing_pe: body.trailing_pe,
            pb_ratio: body.price_to_book,
            roe: body.return_on_equity,
            profit_margin: body.profit_margin,
            current_ratio: body.current_ratio,
            debt_to_equity: body.debt_to_equity,
        })
    }

    async fn fetch_recent_news(
        &self,
        symbol: &str,
        days: i64,
    ) -> Result<Vec<Headline>, ScreenerError> {
        let url = format!("{}/v1/news/{}", self.base_url, symbol);

        let response = self
            .send_request(
                self.client
                    .get(&url)
                    .query(&[("apiKey", self.api_key.clone()), ("days", days.to_string())]),
            )
            .await?;
        let response = Self::check_status(response).await?;

        let body: NewsResponse = response
            .json()
            .await
            .map_err(|e| ScreenerError::Gateway(e.to_string()))?;

        let cutoff = Utc::now() - ChronoDuration::days(days);
        let mut headlines: Vec<Headline> = body
            .articles
            .into_iter()
            .filter_map(|a| {
                let published_at = DateTime::parse_from_rfc3339(&a.published_at)
                    .ok()?
                    .with_timezone(&Utc);
                (published_at >= cutoff).then_some(Headline {
                    title: a.headline,
                    published_at,
                })
            })
            .collect();
        headlines.sort_by_key(|h| h.published_at);

        Ok(headlines)
    }
}

// Provider wire format.

#[derive(Debug, Deserialize)]
struct BarsResponse {
    #[serde(default)]
    bars: Vec<RawBar>,
}

#[derive(Debug, Deserialize)]
struct RawBar {
    t: i64,
    o: f64,
    h: f64,
    l: f64,
    c: f64,
    v: f64,
}

#[derive(Debug, Deserialize)]
struct FundamentalsResponse {
    forward_pe: Option<f64>,
    trailing_pe: Option<f64>,
    price_to_book: Option<f64>,
    return_on_equity: Option<f64>,
    profit_margin: Option<f64>,
    current_ratio: Option<f64>,
    debt_to_equity: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct NewsResponse {
    #[serde(default)]
    articles: Vec<RawArticle>,
}

#[derive(Debug, Deserialize)]
struct RawArticle {
    headline: String,
    published_at: String,
}
