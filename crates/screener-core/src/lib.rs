//! Shared data model, error taxonomy, and external-collaborator traits for
//! the stock screener workspace.

pub mod error;
pub mod traits;
pub mod types;

pub use error::ScreenerError;
pub use traits::{
    HeadlineClassifier, MarketDataGateway, NewsSource, DEFAULT_LOOKBACK_DAYS,
};
pub use types::{
    clamp_score, normalize_symbol, AnalysisResult, Bar, ClassProbabilities, FundamentalMetric,
    FundamentalsSnapshot, Headline, MetricConfig, ScoreDimension,
};
