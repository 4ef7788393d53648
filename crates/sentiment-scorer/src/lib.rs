//! Sentiment scorer: recent headlines per symbol, classified into three-class
//! probabilities and blended across weighted news sources.

use async_trait::async_trait;
use screener_core::{
    clamp_score, Headline, HeadlineClassifier, MarketDataGateway, NewsSource, ScreenerError,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

pub mod classifier;
pub use classifier::WordListClassifier;

pub const NEUTRAL_SCORE: f64 = 50.0;

/// Blend weights for a two-source setup.
pub const DEFAULT_PRIMARY_WEIGHT: f64 = 0.6;
pub const DEFAULT_SECONDARY_WEIGHT: f64 = 0.4;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SentimentConfig {
    /// How far back to pull headlines, in days.
    pub lookback_days: i64,
}

impl Default for SentimentConfig {
    fn default() -> Self {
        Self { lookback_days: 7 }
    }
}

/// A news source with its share of the blended score.
#[derive(Clone)]
pub struct WeightedSource {
    pub source: Arc<dyn NewsSource>,
    pub weight: f64,
}

/// Adapter exposing the market-data gateway's news endpoint as a source.
pub struct GatewayNewsSource {
    gateway: Arc<dyn MarketDataGateway>,
}

impl GatewayNewsSource {
    pub fn new(gateway: Arc<dyn MarketDataGateway>) -> Self {
        Self { gateway }
    }
}

#[async_trait]
impl NewsSource for GatewayNewsSource {
    fn name(&self) -> &str {
        "market-data"
    }

    async fn recent_headlines(
        &self,
        symbol: &str,
        days: i64,
    ) -> Result<Vec<Headline>, ScreenerError> {
        self.gateway.fetch_recent_news(symbol, days).await
    }
}

pub struct SentimentScorer {
    sources: Vec<WeightedSource>,
    classifier: Arc<dyn HeadlineClassifier>,
    config: SentimentConfig,
}

impl SentimentScorer {
    /// Single-source scorer over the gateway's news feed with the word-list
    /// classifier.
    pub fn new(gateway: Arc<dyn MarketDataGateway>) -> Self {
        Self::with_sources(
            vec![WeightedSource {
                source: Arc::new(GatewayNewsSource::new(gateway)),
                weight: 1.0,
            }],
            Arc::new(WordListClassifier::new()),
            SentimentConfig::default(),
        )
    }

    pub fn with_sources(
        sources: Vec<WeightedSource>,
        classifier: Arc<dyn HeadlineClassifier>,
        config: SentimentConfig,
    ) -> Self {
        Self { sources, classifier, config }
    }

    /// Mean headline score for one source's batch, or `None` when the batch
    /// is empty so the source drops out of the blend instead of diluting it.
    pub fn source_sentiment(&self, headlines: &[Headline]) -> Option<f64> {
        if headlines.is_empty() {
            return None;
        }
        let sum: f64 = headlines
            .iter()
            .map(|h| self.classifier.classify(&h.title).to_score())
            .sum();
        Some(sum / headlines.len() as f64)
    }

    /// Blend all sources for a symbol. A source that fails or returns nothing
    /// is excluded and its weight redistributed; if every source is empty the
    /// score is neutral. Never fails.
    pub async fn score(&self, symbol: &str) -> f64 {
        let mut weighted_sum = 0.0;
        let mut weight_total = 0.0;

        for weighted in &self.sources {
            if weighted.weight <= 0.0 {
                continue;
            }
            let headlines = match weighted
                .source
                .recent_headlines(symbol, self.config.lookback_days)
                .await
            {
                Ok(headlines) => headlines,
                Err(e) => {
                    tracing::warn!(
                        "news source {} failed for {symbol}: {e}",
                        weighted.source.name()
                    );
                    continue;
                }
            };

            if let Some(sentiment) = self.source_sentiment(&headlines) {
                tracing::debug!(
                    "{symbol}: {} headlines from {} -> {sentiment:.1}",
                    headlines.len(),
                    weighted.source.name()
                );
                weighted_sum += weighted.weight * sentiment;
                weight_total += weighted.weight;
            }
        }

        if weight_total == 0.0 {
            return NEUTRAL_SCORE;
        }
        clamp_score(weighted_sum / weight_total)
    }
}
