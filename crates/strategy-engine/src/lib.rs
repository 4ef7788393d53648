//! Composite screening strategy: runs the technical, fundamental and
//! sentiment scorers over a symbol universe, caches the batch, and answers
//! ranking queries against it.

use chrono::{Duration, Utc};
use dashmap::DashMap;
use fundamental_scorer::{FundamentalConfig, FundamentalScorer};
use screener_core::{
    clamp_score, normalize_symbol, AnalysisResult, Bar, MarketDataGateway, ScoreDimension,
    ScreenerError, DEFAULT_LOOKBACK_DAYS,
};
use sentiment_scorer::{
    GatewayNewsSource, SentimentConfig, SentimentScorer, WeightedSource, WordListClassifier,
};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use technical_scorer::{TechnicalConfig, TechnicalScorer};
use tokio::sync::RwLock;
use tokio::task::JoinSet;

/// Relative contribution of each sub-score to the composite.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CompositeWeights {
    pub technical: f64,
    pub fundamental: f64,
    pub sentiment: f64,
}

impl Default for CompositeWeights {
    fn default() -> Self {
        Self {
            technical: 0.4,
            fundamental: 0.4,
            sentiment: 0.2,
        }
    }
}

impl CompositeWeights {
    /// Weighted average of the three sub-scores, clamped to [0,100].
    pub fn combine(&self, technical: f64, fundamental: f64, sentiment: f64) -> f64 {
        let total = self.technical + self.fundamental + self.sentiment;
        if total <= 0.0 {
            return 50.0;
        }
        let sum = self.technical * technical
            + self.fundamental * fundamental
            + self.sentiment * sentiment;
        clamp_score(sum / total)
    }
}

#[derive(Debug, Clone)]
pub struct StrategyConfig {
    pub weights: CompositeWeights,
    /// How long a batch of analysis results stays servable before
    /// `get_analysis` re-runs the batch.
    pub freshness_window: Duration,
    pub lookback_days: i64,
    pub technical: TechnicalConfig,
    pub fundamental: FundamentalConfig,
    pub sentiment: SentimentConfig,
}

impl Default for StrategyConfig {
    fn default() -> Self {
        Self {
            weights: CompositeWeights::default(),
            freshness_window: Duration::hours(24),
            lookback_days: DEFAULT_LOOKBACK_DAYS,
            technical: TechnicalConfig::default(),
            fundamental: FundamentalConfig::default(),
            sentiment: SentimentConfig::default(),
        }
    }
}

#[derive(Default)]
struct AnalysisState {
    /// One slot per universe symbol; `None` marks a symbol whose data could
    /// not be analyzed in the last batch.
    results: HashMap<String, Option<AnalysisResult>>,
    last_update: Option<chrono::DateTime<Utc>>,
}

pub struct Strategy {
    symbols: Vec<String>,
    gateway: Arc<dyn MarketDataGateway>,
    technical: TechnicalScorer,
    fundamental: FundamentalScorer,
    sentiment: SentimentScorer,
    config: StrategyConfig,
    /// Price history per symbol; `None` records a fetch that came back empty
    /// or failed, so the batch doesn't hammer a dead symbol.
    price_cache: DashMap<String, Option<Vec<Bar>>>,
    state: RwLock<AnalysisState>,
}

impl Strategy {
    pub fn new(
        symbols: Vec<String>,
        gateway: Arc<dyn MarketDataGateway>,
    ) -> Result<Self, ScreenerError> {
        Self::with_config(symbols, gateway, StrategyConfig::default())
    }

    pub fn with_config(
        symbols: Vec<String>,
        gateway: Arc<dyn MarketDataGateway>,
        config: StrategyConfig,
    ) -> Result<Self, ScreenerError> {
        let mut symbols = symbols
            .iter()
            .map(|s| normalize_symbol(s))
            .collect::<Result<Vec<_>, _>>()?;
        // Normalization can collapse distinct inputs onto one symbol; keep
        // the first occurrence so each symbol is fetched and ranked once.
        let mut seen = HashSet::new();
        symbols.retain(|s| seen.insert(s.clone()));

        Ok(Self {
            technical: TechnicalScorer::new(config.technical.clone()),
            fundamental: FundamentalScorer::with_config(
                Arc::clone(&gateway),
                config.fundamental.clone(),
            ),
            sentiment: SentimentScorer::with_sources(
                vec![WeightedSource {
                    source: Arc::new(GatewayNewsSource::new(Arc::clone(&gateway))),
                    weight: 1.0,
                }],
                Arc::new(WordListClassifier::new()),
                config.sentiment.clone(),
            ),
            symbols,
            gateway,
            config,
            price_cache: DashMap::new(),
            state: RwLock::new(AnalysisState::default()),
        })
    }

    pub fn symbols(&self) -> &[String] {
        &self.symbols
    }

    /// Fetch price history for every universe symbol concurrently. A symbol
    /// whose fetch fails is recorded as unavailable; the batch continues.
    pub async fn fetch_all_data(&self) {
        tracing::info!("fetching price history for {} symbols", self.symbols.len());

        let mut set = JoinSet::new();
        for symbol in &self.symbols {
            let gateway = Arc::clone(&self.gateway);
            let symbol = symbol.clone();
            let lookback = self.config.lookback_days;
            set.spawn(async move {
                let bars = match gateway.fetch_ohlcv(&symbol, None, None, lookback).await {
                    Ok(bars) => Some(bars),
                    Err(e) => {
                        tracing::warn!("price history unavailable for {symbol}: {e}");
                        None
                    }
                };
                (symbol, bars)
            });
        }

        while let Some(joined) = set.join_next().await {
            match joined {
                Ok((symbol, bars)) => {
                    self.price_cache.insert(symbol, bars);
                }
                Err(e) => tracing::warn!("price fetch task panicked: {e}"),
            }
        }
    }

    /// Run all three scorers over one symbol. `Ok(None)` means the symbol's
    /// price history is unavailable; scorer-level problems degrade to
    /// neutral sub-scores instead.
    pub async fn analyze_stock(
        &self,
        symbol: &str,
    ) -> Result<Option<AnalysisResult>, ScreenerError> {
        let symbol = normalize_symbol(symbol)?;
        Ok(self.analyze_cached(&symbol).await)
    }

    /// Re-score the whole universe and atomically replace the served batch.
    pub async fn analyze_all_stocks(&self) {
        if self.price_cache.is_empty() {
            self.fetch_all_data().await;
        }

        let mut results = HashMap::with_capacity(self.symbols.len());
        for symbol in &self.symbols {
            let result = self.analyze_cached(symbol).await;
            results.insert(symbol.clone(), result);
        }

        let analyzed = results.values().filter(|r| r.is_some()).count();
        tracing::info!(
            "analyzed {analyzed}/{} symbols",
            self.symbols.len()
        );

        let mut state = self.state.write().await;
        state.results = results;
        state.last_update = Some(Utc::now());
    }

    /// Serve a symbol's latest result, re-running the batch first if the
    /// served one has gone stale.
    pub async fn get_analysis(
        &self,
        symbol: &str,
    ) -> Result<Option<AnalysisResult>, ScreenerError> {
        let symbol = normalize_symbol(symbol)?;
        self.ensure_fresh().await;
        let state = self.state.read().await;
        Ok(state.results.get(&symbol).cloned().flatten())
    }

    /// Drop all cached prices and results, then rebuild the batch from
    /// fresh data.
    pub async fn refresh_data(&self) {
        tracing::info!("refreshing data for {} symbols", self.symbols.len());
        self.price_cache.clear();
        {
            let mut state = self.state.write().await;
            state.results.clear();
            state.last_update = None;
        }
        self.analyze_all_stocks().await;
    }

    /// The top `n` symbols by the given dimension, highest first. Ties keep
    /// universe order; fewer than `n` analyzable symbols returns them all.
    pub async fn select_top_stocks(
        &self,
        dimension: ScoreDimension,
        n: usize,
    ) -> Vec<AnalysisResult> {
        self.ensure_fresh().await;

        let state = self.state.read().await;
        let mut ranked: Vec<AnalysisResult> = self
            .symbols
            .iter()
            .filter_map(|s| state.results.get(s).cloned().flatten())
            .collect();
        drop(state);

        // Stable sort: equal scores preserve universe order.
        ranked.sort_by(|a, b| {
            b.dimension(dimension)
                .partial_cmp(&a.dimension(dimension))
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        ranked.truncate(n);
        ranked
    }

    async fn ensure_fresh(&self) {
        let fresh = {
            let state = self.state.read().await;
            state
                .last_update
                .map(|t| Utc::now() - t < self.config.freshness_window)
                .unwrap_or(false)
        };
        if !fresh {
            tracing::debug!("served batch is stale, re-analyzing");
            self.analyze_all_stocks().await;
        }
    }

    async fn analyze_cached(&self, symbol: &str) -> Option<AnalysisResult> {
        let bars = self.cached_bars(symbol).await?;

        let technical = self.technical.score(&bars);
        let fundamental = self.fundamental.score(symbol).await;
        let sentiment = self.sentiment.score(symbol).await;
        let score = self
            .config
            .weights
            .combine(technical, fundamental, sentiment);

        tracing::debug!(
            "{symbol}: total {score:.1} (T {technical:.1} / F {fundamental:.1} / S {sentiment:.1})"
        );

        Some(AnalysisResult {
            symbol: symbol.to_string(),
            timestamp: Utc::now(),
            score,
            technical,
            fundamental,
            sentiment,
        })
    }

    async fn cached_bars(&self, symbol: &str) -> Option<Vec<Bar>> {
        if let Some(entry) = self.price_cache.get(symbol) {
            return entry.value().clone();
        }

        let fetched = match self
            .gateway
            .fetch_ohlcv(symbol, None, None, self.config.lookback_days)
            .await
        {
            Ok(bars) => Some(bars),
            Err(e) => {
                tracing::warn!("price history unavailable for {symbol}: {e}");
                None
            }
        };
        self.price_cache.insert(symbol.to_string(), fetched.clone());
        fetched
    }
}
