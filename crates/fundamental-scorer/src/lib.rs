//! Fundamental scorer: valuation/profitability/solvency ratios compared
//! against configurable benchmarks and reduced to a single 0-100 score.

use screener_core::{
    clamp_score, FundamentalMetric, FundamentalsSnapshot, MarketDataGateway, MetricConfig,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

pub const NEUTRAL_SCORE: f64 = 50.0;

/// How a metric with no usable value participates in the weighted aggregate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MissingMetricPolicy {
    /// Drop the metric from numerator and denominator, so neutral filler
    /// never dilutes strong signals.
    Exclude,
    /// Count the metric as a neutral 50 with its weight in the denominator.
    CountNeutral,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FundamentalConfig {
    pub metrics: Vec<(FundamentalMetric, MetricConfig)>,
    pub missing_policy: MissingMetricPolicy,
}

impl Default for FundamentalConfig {
    fn default() -> Self {
        Self {
            metrics: vec![
                (
                    FundamentalMetric::PeRatio,
                    MetricConfig { weight: -0.15, benchmark: 20.0 },
                ),
                (
                    FundamentalMetric::PbRatio,
                    MetricConfig { weight: -0.10, benchmark: 3.0 },
                ),
                (
                    FundamentalMetric::Roe,
                    MetricConfig { weight: 0.20, benchmark: 0.15 },
                ),
                (
                    FundamentalMetric::ProfitMargin,
                    MetricConfig { weight: 0.20, benchmark: 0.10 },
                ),
                (
                    FundamentalMetric::CurrentRatio,
                    MetricConfig { weight: 0.15, benchmark: 2.0 },
                ),
                (
                    FundamentalMetric::DebtToEquity,
                    MetricConfig { weight: -0.20, benchmark: 1.0 },
                ),
            ],
            missing_policy: MissingMetricPolicy::Exclude,
        }
    }
}

impl FundamentalConfig {
    /// Replace the `{weight, benchmark}` pair for one metric.
    pub fn set_metric(&mut self, metric: FundamentalMetric, config: MetricConfig) {
        if let Some(entry) = self.metrics.iter_mut().find(|(m, _)| *m == metric) {
            entry.1 = config;
        } else {
            self.metrics.push((metric, config));
        }
    }
}

/// Score one metric value against its benchmark on the 0-100 scale.
///
/// Higher-is-better: non-positive values score 0, otherwise
/// `min(100, value/benchmark * 50 + 50)`. Lower-is-better: values at or
/// below half the benchmark score 100, otherwise
/// `max(0, 100 - value/benchmark * 50)`.
pub fn metric_score(value: f64, config: &MetricConfig) -> f64 {
    if !value.is_finite() || config.benchmark <= 0.0 {
        return NEUTRAL_SCORE;
    }

    let ratio = value / config.benchmark;
    if config.higher_is_better() {
        if value <= 0.0 {
            0.0
        } else {
            (ratio * 50.0 + 50.0).min(100.0)
        }
    } else if ratio <= 0.5 {
        100.0
    } else {
        (100.0 - ratio * 50.0).max(0.0)
    }
}

pub struct FundamentalScorer {
    gateway: Arc<dyn MarketDataGateway>,
    config: FundamentalConfig,
}

impl FundamentalScorer {
    pub fn new(gateway: Arc<dyn MarketDataGateway>) -> Self {
        Self::with_config(gateway, FundamentalConfig::default())
    }

    pub fn with_config(gateway: Arc<dyn MarketDataGateway>, config: FundamentalConfig) -> Self {
        Self { gateway, config }
    }

    /// Score a symbol's fundamentals, fetching a fresh snapshot from the
    /// gateway. Never fails: any fetch or compute problem degrades to the
    /// neutral 50 with a warning.
    pub async fn score(&self, symbol: &str) -> f64 {
        match self.gateway.fetch_fundamentals(symbol).await {
            Ok(snapshot) => self.score_snapshot(&snapshot),
            Err(e) => {
                tracing::warn!("fundamental scoring for {symbol} degraded to neutral: {e}");
                NEUTRAL_SCORE
            }
        }
    }

    /// Weighted average of applicable metric scores, using the absolute
    /// weight as the averaging weight. Metrics with a missing, zero, or
    /// negative value follow the configured missing-metric policy; if no
    /// metric has usable data the score is neutral.
    pub fn score_snapshot(&self, snapshot: &FundamentalsSnapshot) -> f64 {
        let mut weighted_sum = 0.0;
        let mut weight_total = 0.0;

        for (metric, config) in &self.config.metrics {
            let weight = config.weight.abs();
            if weight == 0.0 {
                continue;
            }

            match snapshot.metric(*metric) {
                Some(value) if value > 0.0 && value.is_finite() => {
                    weighted_sum += weight * metric_score(value, config);
                    weight_total += weight;
                }
                _ => {
                    // Ratio metrics with value <= 0 carry no information.
                    if self.config.missing_policy == MissingMetricPolicy::CountNeutral {
                        weighted_sum += weight * NEUTRAL_SCORE;
                        weight_total += weight;
                    }
                }
            }
        }

        if weight_total == 0.0 {
            return NEUTRAL_SCORE;
        }
        clamp_score(weighted_sum / weight_total)
    }
}
