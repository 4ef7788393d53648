//! Standard technical indicators over daily bars.
//!
//! Every function returns a series aligned to its input: index `i` of the
//! output corresponds to bar `i`, with `f64::NAN` filling the initial
//! lookback window where the indicator is undefined. Callers check
//! `is_finite()` before acting on a value.

use screener_core::Bar;

/// Simple Moving Average
pub fn sma(data: &[f64], period: usize) -> Vec<f64> {
    let mut out = vec![f64::NAN; data.len()];
    if period == 0 || data.len() < period {
        return out;
    }

    let mut sum: f64 = data[..period].iter().sum();
    out[period - 1] = sum / period as f64;
    for i in period..data.len() {
        sum += data[i] - data[i - period];
        out[i] = sum / period as f64;
    }
    out
}

/// Exponential Moving Average, seeded with the SMA of the first `period` values.
pub fn ema(data: &[f64], period: usize) -> Vec<f64> {
    let mut out = vec![f64::NAN; data.len()];
    if period == 0 || data.len() < period {
        return out;
    }

    let multiplier = 2.0 / (period as f64 + 1.0);
    out[period - 1] = data[..period].iter().sum::<f64>() / period as f64;
    for i in period..data.len() {
        out[i] = (data[i] - out[i - 1]) * multiplier + out[i - 1];
    }
    out
}

/// Relative Strength Index with Wilder smoothing.
pub fn rsi(data: &[f64], period: usize) -> Vec<f64> {
    let mut out = vec![f64::NAN; data.len()];
    if period == 0 || data.len() < period + 1 {
        return out;
    }

    let mut avg_gain = 0.0;
    let mut avg_loss = 0.0;
    for i in 1..=period {
        let change = data[i] - data[i - 1];
        if change > 0.0 {
            avg_gain += change;
        } else {
            avg_loss -= change;
        }
    }
    avg_gain /= period as f64;
    avg_loss /= period as f64;
    out[period] = rsi_value(avg_gain, avg_loss);

    for i in period + 1..data.len() {
        let change = data[i] - data[i - 1];
        let (gain, loss) = if change > 0.0 {
            (change, 0.0)
        } else {
            (0.0, -change)
        };
        avg_gain = (avg_gain * (period - 1) as f64 + gain) / period as f64;
        avg_loss = (avg_loss * (period - 1) as f64 + loss) / period as f64;
        out[i] = rsi_value(avg_gain, avg_loss);
    }
    out
}

fn rsi_value(avg_gain: f64, avg_loss: f64) -> f64 {
    if avg_loss == 0.0 {
        100.0
    } else {
        100.0 - 100.0 / (1.0 + avg_gain / avg_loss)
    }
}

/// MACD line and its signal line.
pub struct Macd {
    pub line: Vec<f64>,
    pub signal: Vec<f64>,
}

pub fn macd(data: &[f64], fast: usize, slow: usize, signal_period: usize) -> Macd {
    let n = data.len();
    let mut line = vec![f64::NAN; n];
    let mut signal = vec![f64::NAN; n];

    if fast == 0 || slow == 0 || signal_period == 0 || slow <= fast {
        return Macd { line, signal };
    }

    let ema_fast = ema(data, fast);
    let ema_slow = ema(data, slow);
    for i in 0..n {
        if ema_fast[i].is_finite() && ema_slow[i].is_finite() {
            line[i] = ema_fast[i] - ema_slow[i];
        }
    }

    // Signal line is an EMA over the defined portion of the MACD line.
    if let Some(first) = line.iter().position(|v| v.is_finite()) {
        let defined: Vec<f64> = line[first..].to_vec();
        for (offset, value) in ema(&defined, signal_period).into_iter().enumerate() {
            signal[first + offset] = value;
        }
    }

    Macd { line, signal }
}

/// Bollinger Bands
pub struct BollingerBands {
    pub upper: Vec<f64>,
    pub middle: Vec<f64>,
    pub lower: Vec<f64>,
}

pub fn bollinger_bands(data: &[f64], period: usize, std_dev: f64) -> BollingerBands {
    let n = data.len();
    let middle = sma(data, period);
    let mut upper = vec![f64::NAN; n];
    let mut lower = vec![f64::NAN; n];

    if period == 0 || n < period {
        return BollingerBands { upper, middle, lower };
    }

    for i in period - 1..n {
        let window = &data[i + 1 - period..=i];
        let mean = middle[i];
        let variance =
            window.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / period as f64;
        let std = variance.sqrt();
        upper[i] = mean + std_dev * std;
        lower[i] = mean - std_dev * std;
    }

    BollingerBands { upper, middle, lower }
}

/// Stochastic Oscillator (%K and its %D smoothing).
pub struct Stochastic {
    pub k: Vec<f64>,
    pub d: Vec<f64>,
}

pub fn stochastic(bars: &[Bar], k_period: usize, d_period: usize) -> Stochastic {
    let n = bars.len();
    let mut k = vec![f64::NAN; n];
    let mut d = vec![f64::NAN; n];

    if k_period == 0 || n < k_period {
        return Stochastic { k, d };
    }

    for i in k_period - 1..n {
        let window = &bars[i + 1 - k_period..=i];
        let highest = window.iter().map(|b| b.high).fold(f64::NEG_INFINITY, f64::max);
        let lowest = window.iter().map(|b| b.low).fold(f64::INFINITY, f64::min);

        k[i] = if highest == lowest {
            50.0
        } else {
            100.0 * (bars[i].close - lowest) / (highest - lowest)
        };
    }

    if let Some(first) = k.iter().position(|v| v.is_finite()) {
        let defined: Vec<f64> = k[first..].to_vec();
        for (offset, value) in sma(&defined, d_period).into_iter().enumerate() {
            d[first + offset] = value;
        }
    }

    Stochastic { k, d }
}

/// Average True Range with Wilder smoothing.
pub fn atr(bars: &[Bar], period: usize) -> Vec<f64> {
    let mut out = vec![f64::NAN; bars.len()];
    if period == 0 || bars.len() < period + 1 {
        return out;
    }

    let true_range = |i: usize| -> f64 {
        let high_low = bars[i].high - bars[i].low;
        let high_close = (bars[i].high - bars[i - 1].close).abs();
        let low_close = (bars[i].low - bars[i - 1].close).abs();
        high_low.max(high_close).max(low_close)
    };

    let mut value = (1..=period).map(true_range).sum::<f64>() / period as f64;
    out[period] = value;
    for i in period + 1..bars.len() {
        value = (value * (period - 1) as f64 + true_range(i)) / period as f64;
        out[i] = value;
    }
    out
}
