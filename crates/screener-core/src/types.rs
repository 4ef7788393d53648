use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::ScreenerError;

/// OHLCV bar data
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Bar {
    pub timestamp: DateTime<Utc>,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

/// Point-in-time company fundamentals for one symbol.
///
/// Fields are `None` where the data provider lacks coverage. The P/E ratio
/// is carried in both forward and trailing form; `pe_ratio()` applies the
/// forward-preferred fallback.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FundamentalsSnapshot {
    pub symbol: String,
    pub forward_pe: Option<f64>,
    pub trailing_pe: Option<f64>,
    pub pb_ratio: Option<f64>,
    pub roe: Option<f64>,
    pub profit_margin: Option<f64>,
    pub current_ratio: Option<f64>,
    pub debt_to_equity: Option<f64>,
}

impl FundamentalsSnapshot {
    /// Forward P/E when available, trailing P/E otherwise.
    pub fn pe_ratio(&self) -> Option<f64> {
        self.forward_pe.or(self.trailing_pe)
    }

    pub fn metric(&self, metric: FundamentalMetric) -> Option<f64> {
        match metric {
            FundamentalMetric::PeRatio => self.pe_ratio(),
            FundamentalMetric::PbRatio => self.pb_ratio,
            FundamentalMetric::Roe => self.roe,
            FundamentalMetric::ProfitMargin => self.profit_margin,
            FundamentalMetric::CurrentRatio => self.current_ratio,
            FundamentalMetric::DebtToEquity => self.debt_to_equity,
        }
    }
}

/// The closed set of fundamental ratios the scorer understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FundamentalMetric {
    PeRatio,
    PbRatio,
    Roe,
    ProfitMargin,
    CurrentRatio,
    DebtToEquity,
}

impl FundamentalMetric {
    pub fn name(&self) -> &'static str {
        match self {
            FundamentalMetric::PeRatio => "PE_Ratio",
            FundamentalMetric::PbRatio => "PB_Ratio",
            FundamentalMetric::Roe => "ROE",
            FundamentalMetric::ProfitMargin => "Profit_Margin",
            FundamentalMetric::CurrentRatio => "Current_Ratio",
            FundamentalMetric::DebtToEquity => "Debt_to_Equity",
        }
    }
}

/// Per-metric scoring configuration.
///
/// The sign of `weight` encodes polarity: positive means higher values are
/// better, negative means lower values are better. Weights need not sum to
/// one; aggregation normalizes by the sum of absolute weights actually
/// applied.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct MetricConfig {
    pub weight: f64,
    pub benchmark: f64,
}

impl MetricConfig {
    pub fn higher_is_better(&self) -> bool {
        self.weight >= 0.0
    }
}

/// A news headline with its publication time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Headline {
    pub title: String,
    pub published_at: DateTime<Utc>,
}

/// Three-class sentiment probabilities produced by a headline classifier.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ClassProbabilities {
    pub negative: f64,
    pub neutral: f64,
    pub positive: f64,
}

impl ClassProbabilities {
    /// Map class probabilities to a 0-100 scalar:
    /// `0 * P(neg) + 50 * P(neu) + 100 * P(pos)`.
    pub fn to_score(&self) -> f64 {
        50.0 * self.neutral + 100.0 * self.positive
    }
}

/// Per-symbol analysis output. All scores lie in [0, 100].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisResult {
    pub symbol: String,
    pub timestamp: DateTime<Utc>,
    pub score: f64,
    pub technical: f64,
    pub fundamental: f64,
    pub sentiment: f64,
}

impl AnalysisResult {
    pub fn dimension(&self, dimension: ScoreDimension) -> f64 {
        match dimension {
            ScoreDimension::Total => self.score,
            ScoreDimension::Technical => self.technical,
            ScoreDimension::Fundamental => self.fundamental,
            ScoreDimension::Sentiment => self.sentiment,
        }
    }
}

/// The four ranking dimensions exposed by the strategy engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ScoreDimension {
    Total,
    Technical,
    Fundamental,
    Sentiment,
}

impl fmt::Display for ScoreDimension {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ScoreDimension::Total => "total",
            ScoreDimension::Technical => "technical",
            ScoreDimension::Fundamental => "fundamental",
            ScoreDimension::Sentiment => "sentiment",
        };
        f.write_str(s)
    }
}

impl FromStr for ScoreDimension {
    type Err = ScreenerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "total" => Ok(ScoreDimension::Total),
            "technical" => Ok(ScoreDimension::Technical),
            "fundamental" => Ok(ScoreDimension::Fundamental),
            "sentiment" => Ok(ScoreDimension::Sentiment),
            other => Err(ScreenerError::InvalidArgument(format!(
                "unknown score dimension: {other}"
            ))),
        }
    }
}

/// Clamp a score to the [0, 100] contract.
pub fn clamp_score(score: f64) -> f64 {
    if score.is_nan() {
        50.0
    } else {
        score.clamp(0.0, 100.0)
    }
}

/// Normalize a ticker symbol: trim, uppercase, and validate the charset.
///
/// Tickers are opaque identifiers; only shape is checked (non-empty,
/// at most 10 chars, `A-Z`, `0-9`, `.` or `-`).
pub fn normalize_symbol(raw: &str) -> Result<String, ScreenerError> {
    let symbol = raw.trim().to_uppercase();
    if symbol.is_empty() || symbol.len() > 10 {
        return Err(ScreenerError::InvalidArgument(format!(
            "malformed symbol: {raw:?}"
        )));
    }
    if !symbol
        .chars()
        .all(|c| c.is_ascii_uppercase() || c.is_ascii_digit() || c == '.' || c == '-')
    {
        return Err(ScreenerError::InvalidArgument(format!(
            "malformed symbol: {raw:?}"
        )));
    }
    Ok(symbol)
}
