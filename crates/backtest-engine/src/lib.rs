//! Score-threshold backtester: replays the strategy's composite scores over
//! historical prices with a fixed-fraction position rule and reports summary
//! metrics.

use chrono::{DateTime, NaiveDate, Utc};
use screener_core::{MarketDataGateway, ScreenerError};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use strategy_engine::Strategy;

/// Trading days per year, for annualizing the Sharpe ratio.
const TRADING_DAYS: f64 = 252.0;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BacktestConfig {
    pub initial_capital: f64,
    /// Fraction of current cash committed per new position.
    pub position_fraction: f64,
    pub buy_threshold: f64,
    pub sell_threshold: f64,
    pub lookback_days: i64,
}

impl Default for BacktestConfig {
    fn default() -> Self {
        Self {
            initial_capital: 100_000.0,
            position_fraction: 0.1,
            buy_threshold: 70.0,
            sell_threshold: 30.0,
            lookback_days: 365,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TradeAction {
    Buy,
    Sell,
}

impl fmt::Display for TradeAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TradeAction::Buy => write!(f, "BUY"),
            TradeAction::Sell => write!(f, "SELL"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trade {
    pub date: NaiveDate,
    pub symbol: String,
    pub action: TradeAction,
    pub price: f64,
    pub shares: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EquityPoint {
    pub date: NaiveDate,
    pub value: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BacktestReport {
    pub total_return_pct: f64,
    /// Annualized Sharpe over daily equity returns; `None` when the curve
    /// has no variance.
    pub sharpe_ratio: Option<f64>,
    pub max_drawdown_pct: f64,
    pub trades: Vec<Trade>,
    pub equity_curve: Vec<EquityPoint>,
}

/// Daily percentage changes of a value series.
pub fn percentage_changes(values: &[f64]) -> Vec<f64> {
    values
        .windows(2)
        .map(|w| if w[0] != 0.0 { (w[1] - w[0]) / w[0] } else { 0.0 })
        .collect()
}

#[derive(Debug, Clone)]
struct Position {
    shares: f64,
}

struct Portfolio {
    cash: f64,
    positions: HashMap<String, Position>,
    trades: Vec<Trade>,
}

impl Portfolio {
    fn new(cash: f64) -> Self {
        Self {
            cash,
            positions: HashMap::new(),
            trades: Vec::new(),
        }
    }

    /// Threshold rule: open a fixed-fraction position on a buy score when
    /// flat, liquidate the whole position on a sell score. Whole shares only.
    fn apply_signal(
        &mut self,
        config: &BacktestConfig,
        date: NaiveDate,
        symbol: &str,
        score: f64,
        price: f64,
    ) {
        if price <= 0.0 {
            return;
        }

        if score > config.buy_threshold && !self.positions.contains_key(symbol) {
            let budget = self.cash * config.position_fraction;
            let shares = (budget / price).floor();
            let cost = shares * price;
            if shares > 0.0 && cost <= self.cash {
                self.positions
                    .insert(symbol.to_string(), Position { shares });
                self.cash -= cost;
                self.trades.push(Trade {
                    date,
                    symbol: symbol.to_string(),
                    action: TradeAction::Buy,
                    price,
                    shares,
                });
            }
        } else if score < config.sell_threshold {
            if let Some(position) = self.positions.remove(symbol) {
                self.cash += position.shares * price;
                self.trades.push(Trade {
                    date,
                    symbol: symbol.to_string(),
                    action: TradeAction::Sell,
                    price,
                    shares: position.shares,
                });
            }
        }
    }

    /// Cash plus positions marked to the given closing prices.
    fn market_value(&self, prices: &HashMap<String, f64>) -> f64 {
        let holdings: f64 = self
            .positions
            .iter()
            .filter_map(|(symbol, position)| {
                prices.get(symbol).map(|price| position.shares * price)
            })
            .sum();
        self.cash + holdings
    }
}

pub struct Backtester {
    strategy: Arc<Strategy>,
    gateway: Arc<dyn MarketDataGateway>,
    config: BacktestConfig,
}

impl Backtester {
    pub fn new(strategy: Arc<Strategy>, gateway: Arc<dyn MarketDataGateway>) -> Self {
        Self::with_config(strategy, gateway, BacktestConfig::default())
    }

    pub fn with_config(
        strategy: Arc<Strategy>,
        gateway: Arc<dyn MarketDataGateway>,
        config: BacktestConfig,
    ) -> Self {
        Self {
            strategy,
            gateway,
            config,
        }
    }

    /// Replay the strategy over the history of its universe.
    pub async fn run(
        &self,
        start: Option<DateTime<Utc>>,
        end: Option<DateTime<Utc>>,
    ) -> Result<BacktestReport, ScreenerError> {
        let symbols = self.strategy.symbols().to_vec();

        // Close price per symbol per calendar day; the first symbol with
        // data defines the replay calendar.
        let mut closes: HashMap<String, HashMap<NaiveDate, f64>> = HashMap::new();
        let mut dates: Vec<NaiveDate> = Vec::new();
        for symbol in &symbols {
            match self
                .gateway
                .fetch_ohlcv(symbol, start, end, self.config.lookback_days)
                .await
            {
                Ok(bars) => {
                    if dates.is_empty() {
                        dates = bars.iter().map(|b| b.timestamp.date_naive()).collect();
                        dates.dedup();
                    }
                    let by_date = bars
                        .iter()
                        .map(|b| (b.timestamp.date_naive(), b.close))
                        .collect();
                    closes.insert(symbol.clone(), by_date);
                }
                Err(e) => {
                    tracing::warn!("excluding {symbol} from backtest: {e}");
                }
            }
        }

        if dates.is_empty() {
            return Err(ScreenerError::DataUnavailable(
                "no price history for backtest".to_string(),
            ));
        }

        // Scores are point-in-time snapshots from the strategy; one batch
        // covers the whole replay.
        let mut scores: HashMap<String, f64> = HashMap::new();
        for symbol in &symbols {
            if let Some(result) = self.strategy.get_analysis(symbol).await? {
                scores.insert(symbol.clone(), result.score);
            }
        }

        let mut portfolio = Portfolio::new(self.config.initial_capital);
        let mut equity_curve = Vec::with_capacity(dates.len());
        let mut last_prices: HashMap<String, f64> = HashMap::new();

        for &date in &dates {
            for symbol in &symbols {
                if let Some(price) = closes.get(symbol).and_then(|m| m.get(&date)) {
                    last_prices.insert(symbol.clone(), *price);
                    if let Some(&score) = scores.get(symbol) {
                        portfolio.apply_signal(&self.config, date, symbol, score, *price);
                    }
                }
            }
            equity_curve.push(EquityPoint {
                date,
                value: portfolio.market_value(&last_prices),
            });
        }

        tracing::info!(
            "backtest finished: {} trades over {} days",
            portfolio.trades.len(),
            equity_curve.len()
        );

        Ok(compute_report(
            self.config.initial_capital,
            portfolio.trades,
            equity_curve,
        ))
    }
}

fn compute_report(
    initial_capital: f64,
    trades: Vec<Trade>,
    equity_curve: Vec<EquityPoint>,
) -> BacktestReport {
    let values: Vec<f64> = equity_curve.iter().map(|p| p.value).collect();
    let final_value = values.last().copied().unwrap_or(initial_capital);
    let total_return_pct = (final_value / initial_capital - 1.0) * 100.0;

    let returns = percentage_changes(&values);
    let sharpe_ratio = annualized_sharpe(&returns);

    let max = values.iter().copied().fold(f64::MIN, f64::max);
    let min = values.iter().copied().fold(f64::MAX, f64::min);
    let max_drawdown_pct = if values.is_empty() || max <= 0.0 {
        0.0
    } else {
        (max - min) / max * 100.0
    };

    BacktestReport {
        total_return_pct,
        sharpe_ratio,
        max_drawdown_pct,
        trades,
        equity_curve,
    }
}

/// Mean daily return over its sample standard deviation, annualized by
/// `sqrt(252)`. `None` for degenerate series.
fn annualized_sharpe(returns: &[f64]) -> Option<f64> {
    if returns.len() < 2 {
        return None;
    }
    let mean = returns.iter().sum::<f64>() / returns.len() as f64;
    let variance = returns
        .iter()
        .map(|r| (r - mean).powi(2))
        .sum::<f64>()
        / (returns.len() - 1) as f64;
    let std = variance.sqrt();
    if std == 0.0 {
        return None;
    }
    Some(mean / std * TRADING_DAYS.sqrt())
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use chrono::{Duration, TimeZone};
    use screener_core::{Bar, FundamentalsSnapshot, Headline};
    use strategy_engine::{CompositeWeights, StrategyConfig};

    fn date(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, day).unwrap()
    }

    fn config() -> BacktestConfig {
        BacktestConfig::default()
    }

    #[test]
    fn percentage_changes_basic() {
        let changes = percentage_changes(&[100.0, 110.0, 99.0]);
        assert!((changes[0] - 0.1).abs() < 1e-9);
        assert!((changes[1] + 0.1).abs() < 1e-9);
    }

    #[test]
    fn buy_commits_a_tenth_of_cash_in_whole_shares() {
        let mut portfolio = Portfolio::new(100_000.0);
        portfolio.apply_signal(&config(), date(1), "AAPL", 80.0, 99.0);

        let position = portfolio.positions.get("AAPL").unwrap();
        assert_eq!(position.shares, 101.0); // floor(10_000 / 99)
        assert!((portfolio.cash - (100_000.0 - 101.0 * 99.0)).abs() < 1e-9);
        assert_eq!(portfolio.trades.len(), 1);
        assert_eq!(portfolio.trades[0].action, TradeAction::Buy);
    }

    #[test]
    fn buy_is_skipped_while_a_position_is_open() {
        let mut portfolio = Portfolio::new(100_000.0);
        portfolio.apply_signal(&config(), date(1), "AAPL", 80.0, 100.0);
        portfolio.apply_signal(&config(), date(2), "AAPL", 90.0, 100.0);

        assert_eq!(portfolio.trades.len(), 1);
    }

    #[test]
    fn sell_liquidates_the_whole_position() {
        let mut portfolio = Portfolio::new(100_000.0);
        portfolio.apply_signal(&config(), date(1), "AAPL", 80.0, 100.0);
        portfolio.apply_signal(&config(), date(2), "AAPL", 20.0, 110.0);

        assert!(portfolio.positions.is_empty());
        assert_eq!(portfolio.trades.len(), 2);
        assert_eq!(portfolio.trades[1].action, TradeAction::Sell);
        // 100 shares bought at 100, sold at 110.
        assert!((portfolio.cash - 101_000.0).abs() < 1e-9);
    }

    #[test]
    fn neutral_score_does_nothing() {
        let mut portfolio = Portfolio::new(100_000.0);
        portfolio.apply_signal(&config(), date(1), "AAPL", 50.0, 100.0);

        assert!(portfolio.positions.is_empty());
        assert!(portfolio.trades.is_empty());
    }

    #[test]
    fn report_metrics_on_known_curve() {
        let curve = vec![
            EquityPoint { date: date(1), value: 100_000.0 },
            EquityPoint { date: date(2), value: 110_000.0 },
            EquityPoint { date: date(3), value: 105_000.0 },
        ];
        let report = compute_report(100_000.0, Vec::new(), curve);

        assert!((report.total_return_pct - 5.0).abs() < 1e-9);
        // Peak 110k, trough 100k.
        assert!((report.max_drawdown_pct - (10_000.0 / 110_000.0 * 100.0)).abs() < 1e-9);
        assert!(report.sharpe_ratio.is_some());
    }

    #[test]
    fn flat_curve_has_no_sharpe_and_no_drawdown() {
        let curve = vec![
            EquityPoint { date: date(1), value: 100_000.0 },
            EquityPoint { date: date(2), value: 100_000.0 },
            EquityPoint { date: date(3), value: 100_000.0 },
        ];
        let report = compute_report(100_000.0, Vec::new(), curve);

        assert_eq!(report.total_return_pct, 0.0);
        assert_eq!(report.max_drawdown_pct, 0.0);
        assert_eq!(report.sharpe_ratio, None);
    }

    /// Flat prices; "WIN" scores a buy through its fundamentals, "MEH"
    /// stays in hold territory.
    struct ScriptedGateway;

    #[async_trait]
    impl MarketDataGateway for ScriptedGateway {
        async fn fetch_ohlcv(
            &self,
            _symbol: &str,
            _start: Option<DateTime<Utc>>,
            _end: Option<DateTime<Utc>>,
            _lookback_days: i64,
        ) -> Result<Vec<Bar>, ScreenerError> {
            let start = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
            Ok((0..30)
                .map(|i| Bar {
                    timestamp: start + Duration::days(i),
                    open: 100.0,
                    high: 101.0,
                    low: 99.0,
                    close: 100.0,
                    volume: 1_000_000.0,
                })
                .collect())
        }

        async fn fetch_fundamentals(
            &self,
            symbol: &str,
        ) -> Result<FundamentalsSnapshot, ScreenerError> {
            let roe = match symbol {
                "WIN" => Some(0.15), // scores 100 against the 0.15 benchmark
                _ => Some(0.03),     // scores 60
            };
            Ok(FundamentalsSnapshot {
                symbol: symbol.to_string(),
                roe,
                ..Default::default()
            })
        }

        async fn fetch_recent_news(
            &self,
            _symbol: &str,
            _days: i64,
        ) -> Result<Vec<Headline>, ScreenerError> {
            Ok(Vec::new())
        }
    }

    #[tokio::test]
    async fn run_buys_only_the_high_scoring_symbol() {
        let gateway = Arc::new(ScriptedGateway);
        let strategy_config = StrategyConfig {
            // Rank purely on fundamentals so the scripted snapshots drive
            // the thresholds.
            weights: CompositeWeights {
                technical: 0.0,
                fundamental: 1.0,
                sentiment: 0.0,
            },
            ..Default::default()
        };
        let strategy = Arc::new(
            Strategy::with_config(
                vec!["WIN".to_string(), "MEH".to_string()],
                gateway.clone(),
                strategy_config,
            )
            .unwrap(),
        );

        let backtester = Backtester::new(strategy, gateway);
        let report = backtester.run(None, None).await.unwrap();

        assert_eq!(report.trades.len(), 1);
        assert_eq!(report.trades[0].symbol, "WIN");
        assert_eq!(report.trades[0].action, TradeAction::Buy);
        // Flat prices: no gain, no variance, no drawdown.
        assert!(report.total_return_pct.abs() < 1e-9);
        assert_eq!(report.sharpe_ratio, None);
        assert_eq!(report.max_drawdown_pct, 0.0);
        assert_eq!(report.equity_curve.len(), 30);
    }
}
