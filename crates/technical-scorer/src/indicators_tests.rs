#[cfg(test)]
mod tests {
    use super::super::indicators::*;
    use chrono::Utc;
    use screener_core::Bar;

    // Helper function to create sample price data
    fn sample_prices() -> Vec<f64> {
        vec![
            44.34, 44.09, 44.15, 43.61, 44.33, 44.83, 45.10, 45.42, 45.84, 46.08,
            45.89, 46.03, 45.61, 46.28, 46.28, 46.00, 46.03, 46.41, 46.22, 45.64,
        ]
    }

    // Helper function to create sample bars
    fn sample_bars() -> Vec<Bar> {
        let prices = vec![
            (100.0, 102.0, 99.0, 101.0),
            (101.0, 103.0, 100.0, 102.0),
            (102.0, 104.0, 101.0, 103.0),
            (103.0, 105.0, 102.0, 104.0),
            (104.0, 106.0, 103.0, 105.0),
            (105.0, 107.0, 104.0, 106.0),
            (106.0, 108.0, 105.0, 107.0),
            (107.0, 109.0, 106.0, 108.0),
            (108.0, 110.0, 107.0, 109.0),
            (109.0, 111.0, 108.0, 110.0),
            (110.0, 112.0, 109.0, 111.0),
            (111.0, 113.0, 110.0, 112.0),
            (112.0, 114.0, 111.0, 113.0),
            (113.0, 115.0, 112.0, 114.0),
            (114.0, 116.0, 113.0, 115.0),
        ];

        prices
            .into_iter()
            .enumerate()
            .map(|(i, (open, high, low, close))| Bar {
                timestamp: Utc::now() - chrono::Duration::days(15 - i as i64),
                open,
                high,
                low,
                close,
                volume: 1_000_000.0,
            })
            .collect()
    }

    fn finite(series: &[f64]) -> Vec<f64> {
        series.iter().copied().filter(|v| v.is_finite()).collect()
    }

    #[test]
    fn test_sma_alignment_and_values() {
        let data = vec![1.0, 2.0, 3.0, 4.0, 5.0];
        let result = sma(&data, 3);

        assert_eq!(result.len(), data.len());
        // Lookback window is NaN-padded
        assert!(result[0].is_nan());
        assert!(result[1].is_nan());
        assert!((result[2] - 2.0).abs() < 0.001); // (1+2+3)/3
        assert!((result[3] - 3.0).abs() < 0.001); // (2+3+4)/3
        assert!((result[4] - 4.0).abs() < 0.001); // (3+4+5)/3
    }

    #[test]
    fn test_sma_insufficient_data() {
        let data = vec![1.0, 2.0];
        let result = sma(&data, 5);

        assert_eq!(result.len(), 2);
        assert!(result.iter().all(|v| v.is_nan()));
    }

    #[test]
    fn test_sma_real_prices() {
        let prices = sample_prices();
        let result = sma(&prices, 5);

        let expected_first = (44.34 + 44.09 + 44.15 + 43.61 + 44.33) / 5.0;
        assert!((result[4] - expected_first).abs() < 0.01);
    }

    #[test]
    fn test_ema_seeded_with_sma() {
        let data = vec![22.0, 24.0, 23.0, 25.0, 26.0];
        let result = ema(&data, 3);

        assert_eq!(result.len(), data.len());
        let first_sma = (22.0 + 24.0 + 23.0) / 3.0;
        assert!((result[2] - first_sma).abs() < 0.01);
        assert!(result[1].is_nan());
    }

    #[test]
    fn test_ema_empty_data() {
        let data: Vec<f64> = vec![];
        let result = ema(&data, 5);

        assert!(result.is_empty());
    }

    #[test]
    fn test_ema_increases_with_uptrend() {
        let data = vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0, 8.0, 9.0, 10.0];
        let result = finite(&ema(&data, 3));

        for i in 1..result.len() {
            assert!(result[i] > result[i - 1]);
        }
    }

    #[test]
    fn test_rsi_range() {
        let prices = sample_prices();
        let result = rsi(&prices, 14);

        let values = finite(&result);
        assert!(!values.is_empty());
        for value in values {
            assert!((0.0..=100.0).contains(&value));
        }
    }

    #[test]
    fn test_rsi_insufficient_data() {
        let data = vec![1.0, 2.0, 3.0];
        let result = rsi(&data, 14);

        assert!(result.iter().all(|v| v.is_nan()));
    }

    #[test]
    fn test_rsi_overbought_on_strong_uptrend() {
        let mut uptrend = vec![100.0];
        for i in 1..20 {
            uptrend.push(100.0 + i as f64);
        }

        let result = rsi(&uptrend, 14);
        assert!(result.last().unwrap() > &70.0);
    }

    #[test]
    fn test_macd_alignment() {
        let prices = sample_prices();
        let result = macd(&prices, 3, 6, 3);

        assert_eq!(result.line.len(), prices.len());
        assert_eq!(result.signal.len(), prices.len());
        assert!(!finite(&result.line).is_empty());
        assert!(!finite(&result.signal).is_empty());
        // Signal lags the MACD line by its own lookback
        let first_line = result.line.iter().position(|v| v.is_finite()).unwrap();
        let first_signal = result.signal.iter().position(|v| v.is_finite()).unwrap();
        assert!(first_signal >= first_line);
    }

    #[test]
    fn test_macd_rejects_inverted_periods() {
        let prices = sample_prices();
        let result = macd(&prices, 26, 12, 9);
        assert!(result.line.iter().all(|v| v.is_nan()));
    }

    #[test]
    fn test_bollinger_bands_alignment() {
        let prices = sample_prices();
        let result = bollinger_bands(&prices, 20, 2.0);

        assert_eq!(result.upper.len(), result.middle.len());
        assert_eq!(result.middle.len(), result.lower.len());
        assert_eq!(result.upper.len(), prices.len());
    }

    #[test]
    fn test_bollinger_bands_ordering() {
        let prices = sample_prices();
        let result = bollinger_bands(&prices, 10, 2.0);

        for i in 0..result.upper.len() {
            if result.middle[i].is_finite() {
                assert!(result.upper[i] > result.middle[i]);
                assert!(result.middle[i] > result.lower[i]);
            }
        }
    }

    #[test]
    fn test_bollinger_bands_narrow_on_constant_prices() {
        let prices = vec![100.0; 20];
        let result = bollinger_bands(&prices, 10, 2.0);

        for i in 9..result.upper.len() {
            let width = result.upper[i] - result.lower[i];
            assert!(width < 1.0);
        }
    }

    #[test]
    fn test_atr_positive() {
        let bars = sample_bars();
        let result = atr(&bars, 14);

        let values = finite(&result);
        assert!(!values.is_empty());
        for value in values {
            assert!(value > 0.0);
        }
    }

    #[test]
    fn test_atr_insufficient_data() {
        let bars = sample_bars()[..5].to_vec();
        let result = atr(&bars, 14);

        assert!(result.iter().all(|v| v.is_nan()));
    }

    #[test]
    fn test_atr_increases_with_volatility() {
        let bars = sample_bars();
        let normal_atr = finite(&atr(&bars, 5));

        let mut volatile_bars = sample_bars();
        for bar in &mut volatile_bars {
            bar.high += 10.0;
            bar.low -= 10.0;
        }
        let volatile_atr = finite(&atr(&volatile_bars, 5));

        assert!(volatile_atr[0] > normal_atr[0]);
    }

    #[test]
    fn test_stochastic_range() {
        let bars = sample_bars();
        let result = stochastic(&bars, 14, 3);

        for value in finite(&result.k) {
            assert!((0.0..=100.0).contains(&value));
        }
        for value in finite(&result.d) {
            assert!((0.0..=100.0).contains(&value));
        }
    }

    #[test]
    fn test_stochastic_insufficient_data() {
        let bars = sample_bars()[..5].to_vec();
        let result = stochastic(&bars, 14, 3);

        assert!(result.k.iter().all(|v| v.is_nan()));
    }

    #[test]
    fn test_stochastic_flat_window_is_midpoint() {
        let mut bars = sample_bars();
        for bar in &mut bars {
            bar.high = 100.0;
            bar.low = 100.0;
            bar.close = 100.0;
        }
        let result = stochastic(&bars, 5, 3);
        assert_eq!(*result.k.last().unwrap(), 50.0);
    }
}
