use crate::cache::TtlCache;
use crate::config::{AppConfig, ScannerConfig};
use crate::data::{Candle, IndicatorSnapshot, Interval, OrderBookLevel, Ticker};
use crate::error::MarketError;
use crate::indicators::{support_resistance, IndicatorEngine, TechnicalIndicators};
use crate::orderbook::OrderBook;
use crate::rest_client::{parse_depth_payload, parse_klines_payload, parse_ticker_payload};
use crate::scanner::{filter_and_rank, merge};
use chrono::{TimeZone, Utc};
use serde_json::json;
use std::collections::HashMap;
use std::str::FromStr;
use std::time::Duration;

fn candle(index: usize, close: f64, volume: f64) -> Candle {
    Candle {
        open_time: Utc.timestamp_millis_opt(index as i64 * 900_000).unwrap(),
        open: close,
        high: close,
        low: close,
        close,
        volume,
    }
}

fn series(closes: &[f64], volumes: &[f64]) -> Vec<Candle> {
    closes
        .iter()
        .zip(volumes)
        .enumerate()
        .map(|(i, (c, v))| candle(i, *c, *v))
        .collect()
}

fn constant_series(len: usize, close: f64, volume: f64) -> Vec<Candle> {
    (0..len).map(|i| candle(i, close, volume)).collect()
}

fn ticker(symbol: &str, price: f64, volume: f64) -> Ticker {
    Ticker {
        symbol: symbol.to_string(),
        last_price: price,
        price_change_percent: 0.0,
        quote_volume: volume,
    }
}

// --- Indicator engine ---

#[test]
fn indicators_absent_below_min_bars() {
    let candles = constant_series(29, 1.0, 100.0);
    let snapshot = IndicatorEngine::compute(&candles);
    assert_eq!(snapshot, IndicatorSnapshot::default());
    assert!(snapshot.rsi.is_none());
    assert!(snapshot.macd.is_none());
    assert!(!snapshot.volume_spike);
}

#[test]
fn constant_close_rsi_is_neutral() {
    let candles = constant_series(40, 0.005, 100.0);
    let snapshot = IndicatorEngine::compute(&candles);
    assert_eq!(snapshot.rsi, Some(50.0));
    assert_eq!(snapshot.macd, Some(0.0));
    assert!(!snapshot.volume_spike);
}

#[test]
fn rsi_saturates_on_all_gains() {
    let closes: Vec<f64> = (1..=40).map(|i| i as f64).collect();
    let volumes = vec![100.0; 40];
    let snapshot = IndicatorEngine::compute(&series(&closes, &volumes));
    let rsi = snapshot.rsi.expect("rsi present for 40 bars");
    assert_eq!(rsi, 100.0);
}

#[test]
fn rsi_stays_within_bounds() {
    let closes: Vec<f64> = (0..40)
        .map(|i| 1.0 + if i % 2 == 0 { 0.1 } else { -0.05 })
        .collect();
    let rsi = TechnicalIndicators::calculate_rsi(&closes, 14);
    assert!(!rsi.is_empty());
    for value in rsi {
        assert!((0.0..=100.0).contains(&value));
    }
}

#[test]
fn macd_line_is_aligned_at_latest_bar() {
    let closes: Vec<f64> = (0..40).map(|i| 100.0 + (i as f64 * 0.7).sin()).collect();
    let macd = TechnicalIndicators::calculate_macd_line(&closes, 12, 26);
    assert!(!macd.is_empty());

    let fast = TechnicalIndicators::calculate_ema(&closes, 12);
    let slow = TechnicalIndicators::calculate_ema(&closes, 26);
    let expected = fast.last().unwrap() - slow.last().unwrap();
    assert!((macd.last().unwrap() - expected).abs() < 1e-12);
}

#[test]
fn macd_empty_when_series_too_short_for_slow_ema() {
    let closes = vec![1.0; 20];
    assert!(TechnicalIndicators::calculate_macd_line(&closes, 12, 26).is_empty());
}

#[test]
fn volume_spike_requires_strictly_above_triple_mean() {
    // 19 quiet bars then one loud bar inside the trailing-20 window.
    let mut volumes = vec![1.0; 39];
    volumes.push(4.0); // mean 1.15, threshold 3.45
    let closes = vec![1.0; 40];
    assert!(IndicatorEngine::compute(&series(&closes, &volumes)).volume_spike);

    let mut volumes = vec![1.0; 39];
    volumes.push(3.0); // mean 1.1, threshold 3.3
    assert!(!IndicatorEngine::compute(&series(&closes, &volumes)).volume_spike);
}

#[test]
fn volume_spike_false_when_mean_is_zero() {
    let closes = vec![1.0; 40];
    let volumes = vec![0.0; 40];
    assert!(!IndicatorEngine::compute(&series(&closes, &volumes)).volume_spike);
}

#[test]
fn compute_is_pure_on_identical_input() {
    let closes: Vec<f64> = (0..50).map(|i| 1.0 + (i as f64 * 0.3).cos()).collect();
    let volumes: Vec<f64> = (0..50).map(|i| 100.0 + i as f64).collect();
    let candles = series(&closes, &volumes);
    assert_eq!(
        IndicatorEngine::compute(&candles),
        IndicatorEngine::compute(&candles)
    );
}

// --- Support / resistance ---

#[test]
fn support_resistance_needs_fifty_bars() {
    assert!(support_resistance(&constant_series(49, 1.0, 1.0)).is_none());
}

#[test]
fn support_resistance_uses_trailing_window_only() {
    let mut candles = constant_series(60, 10.0, 1.0);
    // Extremes outside the trailing 50 bars must be ignored.
    candles[2].low = 0.1;
    candles[3].high = 99.0;
    // Extremes inside the window.
    candles[30].low = 4.0;
    candles[55].high = 14.0;

    let (support, resistance) = support_resistance(&candles).unwrap();
    assert_eq!(support, 4.0);
    assert_eq!(resistance, 14.0);
    assert_eq!(support_resistance(&candles), Some((support, resistance)));
}

// --- Candidate selection & merge ---

fn scanner_config() -> ScannerConfig {
    AppConfig::default().scanner
}

#[test]
fn filter_keeps_only_subcent_quote_matches() {
    let snapshot = vec![
        ticker("AAAUSDT", 0.005, 100.0),
        ticker("BBBEUR", 0.009, 50.0),
        ticker("CCCUSDT", 0.01, 999.0),  // at threshold, excluded
        ticker("DDDUSDT", 2.5, 1000.0),  // too expensive
        ticker("EEEBTC", 0.001, 2000.0), // wrong quote
    ];

    let ranked = filter_and_rank(snapshot, &scanner_config());
    let symbols: Vec<&str> = ranked.iter().map(|t| t.symbol.as_str()).collect();
    assert_eq!(symbols, vec!["AAAUSDT", "BBBEUR"]);
}

#[test]
fn rank_is_volume_descending_and_capped() {
    let snapshot: Vec<Ticker> = (0..15)
        .map(|i| ticker(&format!("SYM{}USDT", i), 0.001, i as f64))
        .collect();

    let ranked = filter_and_rank(snapshot, &scanner_config());
    assert_eq!(ranked.len(), 10);
    assert_eq!(ranked[0].symbol, "SYM14USDT");
    for pair in ranked.windows(2) {
        assert!(pair[0].quote_volume >= pair[1].quote_volume);
    }
}

#[test]
fn merge_keeps_failed_candidate_with_absent_indicators() {
    let ranked: Vec<Ticker> = (0..10)
        .map(|i| ticker(&format!("SYM{}USDT", i), 0.001, (100 - i) as f64))
        .collect();

    let full: HashMap<String, IndicatorSnapshot> = ranked
        .iter()
        .map(|t| {
            (
                t.symbol.clone(),
                IndicatorSnapshot {
                    rsi: Some(55.0),
                    macd: Some(0.01),
                    volume_spike: false,
                },
            )
        })
        .collect();

    let mut partial = full.clone();
    partial.remove("SYM3USDT"); // candidate #3's fetch failed

    let baseline = merge(ranked.clone(), full);
    let degraded = merge(ranked, partial);

    assert_eq!(degraded.len(), 10);
    assert_eq!(degraded[3].indicators, IndicatorSnapshot::default());
    for (i, (a, b)) in baseline.iter().zip(&degraded).enumerate() {
        if i != 3 {
            assert_eq!(a, b);
        }
    }
}

#[test]
fn merge_preserves_rank_order() {
    let ranked = vec![
        ticker("AUSDT", 0.001, 300.0),
        ticker("BUSDT", 0.002, 200.0),
        ticker("CUSDT", 0.003, 100.0),
    ];
    let rows = merge(ranked, HashMap::new());
    let symbols: Vec<&str> = rows.iter().map(|r| r.ticker.symbol.as_str()).collect();
    assert_eq!(symbols, vec!["AUSDT", "BUSDT", "CUSDT"]);
}

// --- Order book pressure ---

#[test]
fn pressure_is_half_for_symmetric_book() {
    let level = OrderBookLevel {
        price: 1.0,
        quantity: 10.0,
    };
    let book = OrderBook::new(vec![level], vec![level]);
    assert_eq!(book.pressure_ratio(), Some(0.5));
}

#[test]
fn pressure_undefined_for_one_sided_book() {
    let level = OrderBookLevel {
        price: 1.0,
        quantity: 10.0,
    };
    assert_eq!(OrderBook::new(vec![], vec![level]).pressure_ratio(), None);
    assert_eq!(OrderBook::new(vec![level], vec![]).pressure_ratio(), None);
    assert_eq!(OrderBook::default().pressure_ratio(), None);
}

#[test]
fn pressure_undefined_for_zero_notional() {
    let empty_level = OrderBookLevel {
        price: 1.0,
        quantity: 0.0,
    };
    let book = OrderBook::new(vec![empty_level], vec![empty_level]);
    assert_eq!(book.pressure_ratio(), None);
}

#[test]
fn heavier_bid_side_pushes_ratio_up() {
    let book = OrderBook::new(
        vec![
            OrderBookLevel {
                price: 2.0,
                quantity: 30.0,
            },
            OrderBookLevel {
                price: 1.9,
                quantity: 10.0,
            },
        ],
        vec![OrderBookLevel {
            price: 2.1,
            quantity: 10.0,
        }],
    );
    assert_eq!(book.bid_notional(), 79.0);
    assert_eq!(book.ask_notional(), 21.0);
    assert_eq!(book.pressure_ratio(), Some(0.79));
}

// --- Payload parsing ---

#[test]
fn ticker_payload_parses_string_and_number_fields() {
    let payload = json!([
        {"symbol": "PEPEUSDT", "lastPrice": "0.00000121", "priceChangePercent": "-3.2", "quoteVolume": "1500000.5"},
        {"symbol": "SHIBEUR", "lastPrice": 0.00001, "priceChangePercent": 1.5, "quoteVolume": 42.0}
    ]);

    let tickers = parse_ticker_payload(&payload).unwrap();
    assert_eq!(tickers.len(), 2);
    assert_eq!(tickers[0].symbol, "PEPEUSDT");
    assert_eq!(tickers[0].last_price, 0.00000121);
    assert_eq!(tickers[1].quote_volume, 42.0);
}

#[test]
fn ticker_payload_rejects_error_object_and_missing_fields() {
    assert!(parse_ticker_payload(&json!({"code": -1100, "msg": "error"})).is_err());
    assert!(parse_ticker_payload(&json!([{"symbol": "XUSDT", "lastPrice": "1.0"}])).is_err());
}

#[test]
fn kline_payload_parses_positional_arrays() {
    let payload = json!([
        [1700000000000i64, "0.001", "0.002", "0.0009", "0.0015", "12345.6", 1700000899999i64, "18.5", 42, "6000.0", "9.1", "0"],
        [1700000900000i64, "0.0015", "0.0018", "0.0014", "0.0016", "9999.9", 1700001799999i64, "16.0", 40, "5000.0", "8.0", "0"]
    ]);

    let candles = parse_klines_payload(&payload).unwrap();
    assert_eq!(candles.len(), 2);
    assert_eq!(candles[0].open, 0.001);
    assert_eq!(candles[0].close, 0.0015);
    assert_eq!(candles[0].volume, 12345.6);
    assert_eq!(candles[0].open_time.timestamp_millis(), 1700000000000);
    assert!(candles[0].open_time < candles[1].open_time);
}

#[test]
fn kline_payload_rejects_error_object_and_skips_short_rows() {
    assert!(parse_klines_payload(&json!({"code": -1121, "msg": "Invalid symbol."})).is_err());

    let payload = json!([
        [1700000000000i64, "1.0"],
        [1700000900000i64, "1.0", "1.1", "0.9", "1.05", "500.0", 1700001799999i64]
    ]);
    let candles = parse_klines_payload(&payload).unwrap();
    assert_eq!(candles.len(), 1);
    assert_eq!(candles[0].close, 1.05);
}

#[test]
fn depth_payload_parses_level_pairs() {
    let payload = json!({
        "lastUpdateId": 1027024,
        "bids": [["4.00000000", "431.0"], ["3.99", "12.0"]],
        "asks": [["4.00000200", "12.0"]]
    });

    let book = parse_depth_payload(&payload).unwrap();
    assert_eq!(book.bids.len(), 2);
    assert_eq!(book.best_bid(), Some(4.0));
    assert_eq!(book.best_ask(), Some(4.000002));
}

#[test]
fn depth_payload_rejects_missing_sides_and_bad_pairs() {
    assert!(parse_depth_payload(&json!({"bids": [["1.0", "2.0"]]})).is_err());
    assert!(parse_depth_payload(&json!({"bids": [["1.0"]], "asks": []})).is_err());
}

// --- TTL cache ---

#[test]
fn cache_returns_value_within_ttl() {
    let cache: TtlCache<&str, u32> = TtlCache::new(Duration::from_secs(60));
    cache.insert("ticker", 7);
    assert_eq!(cache.get(&"ticker"), Some(7));
}

#[test]
fn cache_expires_entries() {
    let cache: TtlCache<&str, u32> = TtlCache::new(Duration::ZERO);
    cache.insert("ticker", 7);
    assert_eq!(cache.get(&"ticker"), None);
}

// --- Serialization ---

#[test]
fn interval_serializes_to_wire_strings() {
    assert_eq!(serde_json::to_value(Interval::M15).unwrap(), json!("15m"));
    let parsed: Interval = serde_json::from_value(json!("4h")).unwrap();
    assert_eq!(parsed, Interval::H4);
}

#[test]
fn candle_round_trips_through_serde() {
    let original = candle(3, 0.0012, 500.0);
    let encoded = serde_json::to_string(&original).unwrap();
    let decoded: Candle = serde_json::from_str(&encoded).unwrap();
    assert_eq!(decoded, original);
}

#[test]
fn config_round_trips_through_serde() {
    let original = AppConfig::default();
    let encoded = serde_json::to_string(&original).unwrap();
    let decoded: AppConfig = serde_json::from_str(&encoded).unwrap();

    assert!(decoded.validate().is_ok());
    assert_eq!(decoded.scanner.top_count, original.scanner.top_count);
    assert_eq!(decoded.scanner.max_price, original.scanner.max_price);
    assert_eq!(decoded.chart.interval, original.chart.interval);
    assert_eq!(decoded.exchange.base_url, original.exchange.base_url);
}

// --- Error conversions ---

#[test]
fn invalid_json_maps_to_malformed_payload() {
    let err = serde_json::from_str::<serde_json::Value>("not json").unwrap_err();
    assert!(matches!(
        MarketError::from(err),
        MarketError::MalformedPayload(_)
    ));
}

// --- Configuration ---

#[test]
fn default_config_validates() {
    assert!(AppConfig::default().validate().is_ok());
}

#[test]
fn validation_rejects_bad_values() {
    let mut config = AppConfig::default();
    config.scanner.top_count = 0;
    assert!(config.validate().is_err());

    let mut config = AppConfig::default();
    config.scanner.max_price = -1.0;
    assert!(config.validate().is_err());

    let mut config = AppConfig::default();
    config.scanner.quote_suffixes.clear();
    assert!(config.validate().is_err());

    let mut config = AppConfig::default();
    config.log_level = "verbose".to_string();
    assert!(config.validate().is_err());
}

#[test]
fn interval_round_trips_through_strings() {
    for s in ["1m", "5m", "15m", "1h", "4h", "1d"] {
        assert_eq!(Interval::from_str(s).unwrap().as_str(), s);
    }
    assert!(Interval::from_str("2h").is_err());
}
