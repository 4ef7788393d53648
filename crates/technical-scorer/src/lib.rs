//! Technical scorer: trend/momentum indicators over an OHLCV series reduced
//! to a single 0-100 score.

pub mod indicators;
mod indicators_tests;
pub mod scorer;

pub use scorer::{
    IndicatorSet, SignalSet, SignalWeights, TechnicalConfig, TechnicalScorer, TechnicalSignal,
};
