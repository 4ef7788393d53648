use screener_core::{clamp_score, Bar, ScreenerError};
use serde::{Deserialize, Serialize};

use crate::indicators::*;

/// Named boolean conditions evaluated against the latest bar.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TechnicalSignal {
    RsiOversold,
    RsiOverbought,
    MacdBullish,
    AboveSma20,
    AboveSma50,
    AboveUpperBand,
    BelowLowerBand,
    StochOversold,
    StochOverbought,
}

impl TechnicalSignal {
    pub const ALL: [TechnicalSignal; 9] = [
        TechnicalSignal::RsiOversold,
        TechnicalSignal::RsiOverbought,
        TechnicalSignal::MacdBullish,
        TechnicalSignal::AboveSma20,
        TechnicalSignal::AboveSma50,
        TechnicalSignal::AboveUpperBand,
        TechnicalSignal::BelowLowerBand,
        TechnicalSignal::StochOversold,
        TechnicalSignal::StochOverbought,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            TechnicalSignal::RsiOversold => "RSI_Oversold",
            TechnicalSignal::RsiOverbought => "RSI_Overbought",
            TechnicalSignal::MacdBullish => "MACD_Crossover",
            TechnicalSignal::AboveSma20 => "Above_SMA20",
            TechnicalSignal::AboveSma50 => "Above_SMA50",
            TechnicalSignal::AboveUpperBand => "BB_Upper_Break",
            TechnicalSignal::BelowLowerBand => "BB_Lower_Break",
            TechnicalSignal::StochOversold => "Stoch_Oversold",
            TechnicalSignal::StochOverbought => "Stoch_Overbought",
        }
    }
}

/// Evaluated signal conditions for the latest bar.
#[derive(Debug, Clone, Default)]
pub struct SignalSet {
    signals: Vec<(TechnicalSignal, bool)>,
}

impl SignalSet {
    pub fn is_active(&self, signal: TechnicalSignal) -> bool {
        self.signals
            .iter()
            .any(|(s, active)| *s == signal && *active)
    }

    pub fn active(&self) -> impl Iterator<Item = TechnicalSignal> + '_ {
        self.signals
            .iter()
            .filter(|(_, active)| *active)
            .map(|(s, _)| *s)
    }

    pub fn iter(&self) -> impl Iterator<Item = (TechnicalSignal, bool)> + '_ {
        self.signals.iter().copied()
    }
}

/// Point value per signal. Buy-side signals carry heavier positive points;
/// overbought/bearish conditions subtract less — the strategy favors buy
/// signals.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SignalWeights {
    pub rsi_oversold: f64,
    pub rsi_overbought: f64,
    pub macd_bullish: f64,
    pub above_sma20: f64,
    pub above_sma50: f64,
    pub above_upper_band: f64,
    pub below_lower_band: f64,
    pub stoch_oversold: f64,
    pub stoch_overbought: f64,
}

impl Default for SignalWeights {
    fn default() -> Self {
        Self {
            rsi_oversold: 12.0,
            rsi_overbought: -8.0,
            macd_bullish: 10.0,
            above_sma20: 6.0,
            above_sma50: 6.0,
            above_upper_band: -6.0,
            below_lower_band: 8.0,
            stoch_oversold: 8.0,
            stoch_overbought: -5.0,
        }
    }
}

impl SignalWeights {
    pub fn points(&self, signal: TechnicalSignal) -> f64 {
        match signal {
            TechnicalSignal::RsiOversold => self.rsi_oversold,
            TechnicalSignal::RsiOverbought => self.rsi_overbought,
            TechnicalSignal::MacdBullish => self.macd_bullish,
            TechnicalSignal::AboveSma20 => self.above_sma20,
            TechnicalSignal::AboveSma50 => self.above_sma50,
            TechnicalSignal::AboveUpperBand => self.above_upper_band,
            TechnicalSignal::BelowLowerBand => self.below_lower_band,
            TechnicalSignal::StochOversold => self.stoch_oversold,
            TechnicalSignal::StochOverbought => self.stoch_overbought,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TechnicalConfig {
    pub weights: SignalWeights,
    /// Scale the raw signal sum by `min(1, ATR/close)` so thin signals in
    /// quiet markets stay near the neutral baseline.
    pub scale_by_volatility: bool,
    pub min_bars: usize,
}

impl Default for TechnicalConfig {
    fn default() -> Self {
        Self {
            weights: SignalWeights::default(),
            scale_by_volatility: true,
            min_bars: 50,
        }
    }
}

/// Derived indicator series for one price history, aligned to the input bars.
pub struct IndicatorSet {
    pub rsi: Vec<f64>,
    pub macd: Macd,
    pub sma_20: Vec<f64>,
    pub sma_50: Vec<f64>,
    pub bands: BollingerBands,
    pub stochastic: Stochastic,
    pub atr: Vec<f64>,
}

#[derive(Debug, Clone, Default)]
pub struct TechnicalScorer {
    config: TechnicalConfig,
}

impl TechnicalScorer {
    pub fn new(config: TechnicalConfig) -> Self {
        Self { config }
    }

    /// Compute the full indicator suite for a price series.
    pub fn indicators(&self, bars: &[Bar]) -> IndicatorSet {
        let closes: Vec<f64> = bars.iter().map(|b| b.close).collect();
        IndicatorSet {
            rsi: rsi(&closes, 14),
            macd: macd(&closes, 12, 26, 9),
            sma_20: sma(&closes, 20),
            sma_50: sma(&closes, 50),
            bands: bollinger_bands(&closes, 20, 2.0),
            stochastic: stochastic(bars, 14, 3),
            atr: atr(bars, 14),
        }
    }

    /// Evaluate the latest bar against the derived indicators.
    pub fn signals(&self, bars: &[Bar]) -> Result<SignalSet, ScreenerError> {
        if bars.len() < self.config.min_bars {
            return Err(ScreenerError::DataUnavailable(format!(
                "need at least {} bars, got {}",
                self.config.min_bars,
                bars.len()
            )));
        }

        let close = bars.last().map(|b| b.close).unwrap_or(f64::NAN);
        if !close.is_finite() {
            return Err(ScreenerError::Calculation(
                "latest close is not a finite number".to_string(),
            ));
        }

        let derived = self.indicators(bars);
        let last = |series: &[f64]| series.last().copied().unwrap_or(f64::NAN);

        let rsi_last = last(&derived.rsi);
        let macd_last = last(&derived.macd.line);
        let macd_signal_last = last(&derived.macd.signal);
        let sma20_last = last(&derived.sma_20);
        let sma50_last = last(&derived.sma_50);
        let upper_last = last(&derived.bands.upper);
        let lower_last = last(&derived.bands.lower);
        let k_last = last(&derived.stochastic.k);

        // An indicator still inside its lookback window is NaN; the
        // comparison is then false and the signal stays inactive.
        let mut signals = Vec::with_capacity(TechnicalSignal::ALL.len());
        for signal in TechnicalSignal::ALL {
            let active = match signal {
                TechnicalSignal::RsiOversold => rsi_last < 30.0,
                TechnicalSignal::RsiOverbought => rsi_last > 70.0,
                TechnicalSignal::MacdBullish => macd_last > macd_signal_last,
                TechnicalSignal::AboveSma20 => close > sma20_last,
                TechnicalSignal::AboveSma50 => close > sma50_last,
                TechnicalSignal::AboveUpperBand => close > upper_last,
                TechnicalSignal::BelowLowerBand => close < lower_last,
                TechnicalSignal::StochOversold => k_last < 20.0,
                TechnicalSignal::StochOverbought => k_last > 80.0,
            };
            signals.push((signal, active));
        }

        Ok(SignalSet { signals })
    }

    /// Score a price series on the 0-100 scale, 50 neutral.
    ///
    /// Never fails: insufficient or malformed data degrades to the neutral
    /// baseline with a warning.
    pub fn score(&self, bars: &[Bar]) -> f64 {
        match self.try_score(bars) {
            Ok(score) => score,
            Err(e) => {
                tracing::warn!("technical scoring degraded to neutral: {e}");
                50.0
            }
        }
    }

    fn try_score(&self, bars: &[Bar]) -> Result<f64, ScreenerError> {
        let signals = self.signals(bars)?;

        let raw_sum: f64 = signals
            .active()
            .map(|s| self.config.weights.points(s))
            .sum();

        let factor = if self.config.scale_by_volatility {
            self.volatility_factor(bars)
        } else {
            1.0
        };

        Ok(clamp_score(50.0 + raw_sum * factor))
    }

    /// `min(1, ATR/close)` for the latest bar; 1 when ATR is undefined.
    fn volatility_factor(&self, bars: &[Bar]) -> f64 {
        let atr_last = atr(bars, 14).last().copied().unwrap_or(f64::NAN);
        let close = bars.last().map(|b| b.close).unwrap_or(f64::NAN);
        if atr_last.is_finite() && close.is_finite() && close > 0.0 {
            (atr_last / close).min(1.0)
        } else {
            1.0
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};

    fn bars_from_closes(closes: &[f64]) -> Vec<Bar> {
        closes
            .iter()
            .enumerate()
            .map(|(i, &close)| Bar {
                timestamp: Utc::now() - Duration::days(closes.len() as i64 - i as i64),
                open: close,
                high: close + 1.0,
                low: close - 1.0,
                close,
                volume: 1_000_000.0,
            })
            .collect()
    }

    fn uptrend(len: usize) -> Vec<Bar> {
        bars_from_closes(&(0..len).map(|i| 100.0 + i as f64).collect::<Vec<_>>())
    }

    #[test]
    fn score_is_neutral_on_short_series() {
        let scorer = TechnicalScorer::default();
        assert_eq!(scorer.score(&uptrend(10)), 50.0);
        assert_eq!(scorer.score(&[]), 50.0);
    }

    #[test]
    fn score_stays_in_bounds_for_extreme_weights() {
        let mut config = TechnicalConfig::default();
        config.weights.macd_bullish = 1e9;
        config.weights.rsi_overbought = -1e9;
        config.scale_by_volatility = false;
        let scorer = TechnicalScorer::new(config);

        let score = scorer.score(&uptrend(60));
        assert!((0.0..=100.0).contains(&score));
    }

    #[test]
    fn uptrend_activates_trend_signals() {
        let scorer = TechnicalScorer::default();
        let signals = scorer.signals(&uptrend(60)).unwrap();

        assert!(signals.is_active(TechnicalSignal::AboveSma20));
        assert!(signals.is_active(TechnicalSignal::AboveSma50));
        assert!(signals.is_active(TechnicalSignal::RsiOverbought));
        assert!(!signals.is_active(TechnicalSignal::RsiOversold));
    }

    #[test]
    fn downtrend_activates_oversold_buy_signals() {
        let scorer = TechnicalScorer::default();
        let down_closes: Vec<f64> = (0..60).map(|i| 160.0 - i as f64).collect();
        let signals = scorer.signals(&bars_from_closes(&down_closes)).unwrap();

        assert!(signals.is_active(TechnicalSignal::RsiOversold));
        assert!(signals.is_active(TechnicalSignal::StochOversold));
        assert!(!signals.is_active(TechnicalSignal::MacdBullish));
        assert!(!signals.is_active(TechnicalSignal::AboveSma20));
    }

    #[test]
    fn buy_biased_weights_lift_score_above_baseline() {
        // The default point table favors buy-side conditions, so both a
        // steady uptrend and a deeply oversold decline land above neutral.
        let scorer = TechnicalScorer::new(TechnicalConfig {
            scale_by_volatility: false,
            ..Default::default()
        });

        assert!(scorer.score(&uptrend(60)) > 50.0);
        let down_closes: Vec<f64> = (0..60).map(|i| 160.0 - i as f64).collect();
        assert!(scorer.score(&bars_from_closes(&down_closes)) > 50.0);
    }

    #[test]
    fn volatility_scaling_pulls_score_toward_baseline() {
        let unscaled = TechnicalScorer::new(TechnicalConfig {
            scale_by_volatility: false,
            ..Default::default()
        });
        let scaled = TechnicalScorer::new(TechnicalConfig::default());

        let bars = uptrend(60);
        let raw = unscaled.score(&bars);
        let damped = scaled.score(&bars);

        // Daily ATR is a small fraction of price, so scaling compresses the
        // deviation from 50 without flipping its sign.
        assert!((damped - 50.0).abs() <= (raw - 50.0).abs());
        assert_eq!((damped - 50.0).signum(), (raw - 50.0).signum());
    }

    #[test]
    fn nan_close_degrades_to_neutral() {
        let mut bars = uptrend(60);
        bars.last_mut().unwrap().close = f64::NAN;
        let scorer = TechnicalScorer::default();
        assert_eq!(scorer.score(&bars), 50.0);
    }
}
