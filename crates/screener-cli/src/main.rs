//! Stock screener CLI.
//!
//! # Usage
//!
//! ```bash
//! # Rank the default universe by composite score
//! screener screen
//!
//! # Top 5 by technical score over a custom universe
//! screener screen -d technical -n 5 -s AAPL -s MSFT -s NVDA
//!
//! # Replay the strategy over the past year
//! screener backtest -s AAPL -s MSFT -s GOOGL
//! ```

use anyhow::Context;
use backtest_engine::{BacktestConfig, Backtester};
use chrono::{DateTime, NaiveDate, Utc};
use clap::{Parser, Subcommand};
use market_data::{fetch_universe, MarketDataClient};
use screener_core::{MarketDataGateway, ScoreDimension};
use std::sync::Arc;
use strategy_engine::Strategy;
use tracing::info;

#[derive(Parser)]
#[command(name = "screener")]
#[command(about = "Multi-factor stock screener", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Rank symbols by a score dimension
    Screen {
        /// Dimension to rank by (total, technical, fundamental, sentiment)
        #[arg(short, long, default_value = "total")]
        dimension: String,

        /// How many symbols to report
        #[arg(short = 'n', long, default_value = "10")]
        top: usize,

        /// Symbols to screen (repeatable; default: fetched index universe)
        #[arg(short, long)]
        symbol: Vec<String>,
    },

    /// Replay the strategy's signals over historical prices
    Backtest {
        /// Symbols to trade (repeatable)
        #[arg(short, long, required = true)]
        symbol: Vec<String>,

        /// Starting cash
        #[arg(long, default_value = "100000")]
        capital: f64,

        /// Replay start date (YYYY-MM-DD; default: lookback window)
        #[arg(short = 'f', long)]
        from: Option<String>,

        /// Days of history when no start date is given
        #[arg(long, default_value = "365")]
        lookback: i64,
    },
}

fn parse_date(input: &str) -> anyhow::Result<DateTime<Utc>> {
    let date = NaiveDate::parse_from_str(input, "%Y-%m-%d")
        .with_context(|| format!("invalid date: {input} (expected YYYY-MM-DD)"))?;
    Ok(date
        .and_hms_opt(0, 0, 0)
        .expect("midnight is always valid")
        .and_utc())
}

fn build_gateway() -> anyhow::Result<Arc<dyn MarketDataGateway>> {
    let api_key =
        std::env::var("MARKET_DATA_API_KEY").context("MARKET_DATA_API_KEY must be set")?;
    Ok(Arc::new(MarketDataClient::new(api_key)))
}

async fn run_screen(dimension: &str, top: usize, symbols: Vec<String>) -> anyhow::Result<()> {
    let dimension: ScoreDimension = dimension.parse()?;
    let symbols = if symbols.is_empty() {
        fetch_universe().await
    } else {
        symbols
    };
    info!("screening {} symbols", symbols.len());

    let strategy = Strategy::new(symbols, build_gateway()?)?;
    let ranked = strategy.select_top_stocks(dimension, top).await;

    if ranked.is_empty() {
        println!("No symbols could be analyzed.");
        return Ok(());
    }

    println!(
        "{:<4} {:<8} {:>7} {:>7} {:>7} {:>7}",
        "#", "SYMBOL", "TOTAL", "TECH", "FUND", "SENT"
    );
    for (i, result) in ranked.iter().enumerate() {
        println!(
            "{:<4} {:<8} {:>7.1} {:>7.1} {:>7.1} {:>7.1}",
            i + 1,
            result.symbol,
            result.score,
            result.technical,
            result.fundamental,
            result.sentiment
        );
    }
    Ok(())
}

async fn run_backtest(
    symbols: Vec<String>,
    capital: f64,
    from: Option<String>,
    lookback: i64,
) -> anyhow::Result<()> {
    let start = from.as_deref().map(parse_date).transpose()?;
    let gateway = build_gateway()?;
    let strategy = Arc::new(Strategy::new(symbols, Arc::clone(&gateway))?);

    let config = BacktestConfig {
        initial_capital: capital,
        lookback_days: lookback,
        ..Default::default()
    };
    let backtester = Backtester::with_config(strategy, gateway, config);
    let report = backtester.run(start, None).await?;

    println!("Backtest results");
    println!("  Total return:  {:>8.2} %", report.total_return_pct);
    match report.sharpe_ratio {
        Some(sharpe) => println!("  Sharpe ratio:  {:>8.2}", sharpe),
        None => println!("  Sharpe ratio:       n/a"),
    }
    println!("  Max drawdown:  {:>8.2} %", report.max_drawdown_pct);
    println!("  Trades:        {:>8}", report.trades.len());

    if !report.trades.is_empty() {
        println!();
        println!("{:<12} {:<8} {:<5} {:>10} {:>8}", "DATE", "SYMBOL", "SIDE", "PRICE", "SHARES");
        for trade in &report.trades {
            println!(
                "{:<12} {:<8} {:<5} {:>10.2} {:>8.0}",
                trade.date, trade.symbol, trade.action, trade.price, trade.shares
            );
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "screener_cli=info,strategy_engine=info,market_data=warn".into()),
        )
        .init();

    let cli = Cli::parse();
    match cli.command {
        Commands::Screen {
            dimension,
            top,
            symbol,
        } => run_screen(&dimension, top, symbol).await,
        Commands::Backtest {
            symbol,
            capital,
            from,
            lookback,
        } => run_backtest(symbol, capital, from, lookback).await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_date_accepts_iso_days() {
        let parsed = parse_date("2024-03-01").unwrap();
        assert_eq!(parsed.date_naive(), NaiveDate::from_ymd_opt(2024, 3, 1).unwrap());
    }

    #[test]
    fn parse_date_rejects_garbage() {
        assert!(parse_date("yesterday").is_err());
    }
}
