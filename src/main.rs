use std::sync::Arc;
use std::time::Duration;

use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::config::AppConfig;
use crate::data::{Candle, RankedCandidate};
use crate::orderbook::OrderBook;
use crate::rest_client::BinanceClient;
use crate::scanner::MarketScanner;

mod cache;
mod config;
mod data;
mod error;
mod indicators;
mod orderbook;
mod rest_client;
mod scanner;
mod tests;

const CHART_CANDLE_LIMIT: usize = 100;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();

    let config = AppConfig::from_env()?;
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(&config.log_level))
        .init();

    info!(
        "Starting scan: max price {}, top {}, chart symbol {}",
        config.scanner.max_price, config.scanner.top_count, config.chart.symbol
    );

    let client = Arc::new(BinanceClient::new(&config.exchange));
    let scanner = MarketScanner::new(Arc::clone(&client), config.scanner.clone());

    loop {
        run_cycle(&client, &scanner, &config).await;

        if !config.live_mode {
            break;
        }
        tokio::time::sleep(Duration::from_secs(config.refresh_secs)).await;
    }

    Ok(())
}

/// One full pipeline pass: ranked low-cap table, then the selected
/// symbol's chart summary and order-book pressure.
async fn run_cycle(client: &BinanceClient, scanner: &MarketScanner, config: &AppConfig) {
    let table = scanner.scan().await;
    render_table(&table);

    let candles = client
        .klines(&config.chart.symbol, config.chart.interval, CHART_CANDLE_LIMIT)
        .await;
    render_chart_summary(&config.chart.symbol, config.chart.interval.as_str(), &candles);

    let book = client
        .depth(&config.chart.symbol, config.chart.depth_limit)
        .await;
    render_order_book(&book);
}

fn render_table(rows: &[RankedCandidate]) {
    println!("\n== Top low-cap & pump detection ==");
    if rows.is_empty() {
        println!("Market snapshot unavailable or no symbols matched the filter.");
        return;
    }

    println!(
        "{:<14} {:>14} {:>9} {:>16} {:>7}  {}",
        "Symbol", "Price", "24h %", "Volume", "RSI", "Volume status"
    );
    for row in rows {
        let rsi = row
            .indicators
            .rsi
            .map(|v| format!("{:.1}", v))
            .unwrap_or_else(|| "-".to_string());
        let alert = if row.indicators.volume_spike {
            "PUMP DETECTED"
        } else {
            "calm"
        };

        println!(
            "{:<14} {:>14.8} {:>8.2}% {:>16.0} {:>7}  {}",
            row.ticker.symbol,
            row.ticker.last_price,
            row.ticker.price_change_percent,
            row.ticker.quote_volume,
            rsi,
            alert
        );
    }
}

fn render_chart_summary(symbol: &str, interval: &str, candles: &[Candle]) {
    println!("\n== {} ({}) ==", symbol, interval);
    if candles.len() < 2 {
        println!("Candle history unavailable.");
        return;
    }

    let last = &candles[candles.len() - 1];
    let prev = &candles[candles.len() - 2];
    let delta = (last.close - prev.close) / prev.close * 100.0;
    println!("Last close: {:.8} ({:+.2}% vs previous bar)", last.close, delta);

    match indicators::support_resistance(candles) {
        Some((support, resistance)) => {
            println!("Support (min 50):    {:.8}", support);
            println!("Resistance (max 50): {:.8}", resistance);
        }
        None => println!("Not enough bars for support/resistance levels."),
    }

    println!(
        "Chart: https://www.tradingview.com/chart/?symbol=BINANCE:{}",
        symbol
    );
}

fn render_order_book(book: &OrderBook) {
    println!("\n== Order book ==");
    let Some(ratio) = book.pressure_ratio() else {
        println!("Order book data unavailable.");
        return;
    };

    println!("Buy pressure: {:.0}%", ratio * 100.0);
    if let (Some(bid), Some(ask)) = (book.best_bid(), book.best_ask()) {
        println!("Best bid {:.8} / best ask {:.8}", bid, ask);
    }

    println!("Asks:");
    for level in book.asks.iter().rev() {
        println!("  {:>14.8} x {:.2}", level.price, level.quantity);
    }
    println!("Bids:");
    for level in &book.bids {
        println!("  {:>14.8} x {:.2}", level.price, level.quantity);
    }
}
