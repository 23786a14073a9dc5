use crate::cache::TtlCache;
use crate::config::ExchangeConfig;
use crate::data::{Candle, Interval, OrderBookLevel, Ticker};
use crate::error::{MarketError, MarketResult};
use crate::orderbook::OrderBook;
use chrono::{TimeZone, Utc};
use reqwest::Client;
use serde_json::Value;
use std::time::Duration;
use tracing::warn;

/// Upstream caps kline requests at 1000 bars.
pub const KLINE_LIMIT_CAP: usize = 1000;

const TICKER_TIMEOUT: Duration = Duration::from_secs(5);
const SHORT_TIMEOUT: Duration = Duration::from_secs(2);
const TICKER_CACHE_TTL: Duration = Duration::from_secs(60);
const DEPTH_CACHE_TTL: Duration = Duration::from_secs(10);

/// Client for the three public Binance market-data endpoints. All
/// fetchers fail soft: a transport error or an error-shaped payload is
/// logged and degrades to an empty result, never an Err to the caller.
pub struct BinanceClient {
    client: Client,
    base_url: String,
    api_key: Option<String>,
    ticker_cache: TtlCache<(), Vec<Ticker>>,
    depth_cache: TtlCache<(String, usize), OrderBook>,
}

impl BinanceClient {
    pub fn new(config: &ExchangeConfig) -> Self {
        Self {
            client: Client::new(),
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
            ticker_cache: TtlCache::new(TICKER_CACHE_TTL),
            depth_cache: TtlCache::new(DEPTH_CACHE_TTL),
        }
    }

    /// Full 24h ticker snapshot for every traded symbol. Empty means
    /// the fetch failed, and an empty table should be rendered with a
    /// notice.
    pub async fn ticker_24h(&self) -> Vec<Ticker> {
        if let Some(cached) = self.ticker_cache.get(&()) {
            return cached;
        }

        let url = format!("{}/api/v3/ticker/24hr", self.base_url);
        match self.fetch_json(&url, TICKER_TIMEOUT).await {
            Ok(json) => match parse_ticker_payload(&json) {
                Ok(tickers) => {
                    self.ticker_cache.insert((), tickers.clone());
                    tickers
                }
                Err(e) => {
                    warn!("Discarding 24h ticker payload: {}", e);
                    Vec::new()
                }
            },
            Err(e) => {
                warn!("24h ticker fetch failed: {}", e);
                Vec::new()
            }
        }
    }

    /// Candle history for one symbol, oldest-first, at most `limit`
    /// bars. Empty means "unavailable", not "zero volume".
    pub async fn klines(&self, symbol: &str, interval: Interval, limit: usize) -> Vec<Candle> {
        if symbol.is_empty() {
            warn!("Refusing kline fetch for empty symbol");
            return Vec::new();
        }

        let limit = limit.clamp(1, KLINE_LIMIT_CAP);
        let url = format!(
            "{}/api/v3/klines?symbol={}&interval={}&limit={}",
            self.base_url, symbol, interval, limit
        );

        match self.fetch_json(&url, SHORT_TIMEOUT).await {
            Ok(json) => match parse_klines_payload(&json) {
                Ok(candles) => candles,
                Err(e) => {
                    warn!("Discarding kline payload for {}: {}", symbol, e);
                    Vec::new()
                }
            },
            Err(e) => {
                warn!("Kline fetch failed for {}: {}", symbol, e);
                Vec::new()
            }
        }
    }

    /// Order-book depth for one symbol, `limit` levels per side. The
    /// book is volatile, so the cache window is short.
    pub async fn depth(&self, symbol: &str, limit: usize) -> OrderBook {
        let key = (symbol.to_string(), limit);
        if let Some(cached) = self.depth_cache.get(&key) {
            return cached;
        }

        let url = format!(
            "{}/api/v3/depth?symbol={}&limit={}",
            self.base_url, symbol, limit
        );

        match self.fetch_json(&url, SHORT_TIMEOUT).await {
            Ok(json) => match parse_depth_payload(&json) {
                Ok(book) => {
                    self.depth_cache.insert(key, book.clone());
                    book
                }
                Err(e) => {
                    warn!("Discarding depth payload for {}: {}", symbol, e);
                    OrderBook::default()
                }
            },
            Err(e) => {
                warn!("Depth fetch failed for {}: {}", symbol, e);
                OrderBook::default()
            }
        }
    }

    async fn fetch_json(&self, url: &str, timeout: Duration) -> MarketResult<Value> {
        let mut request = self.client.get(url).timeout(timeout);
        if let Some(key) = &self.api_key {
            request = request.header("X-MBX-APIKEY", key);
        }

        let response = request.send().await?;
        if !response.status().is_success() {
            return Err(MarketError::Http(format!(
                "Status {} from {}",
                response.status(),
                url
            )));
        }

        let body = response.text().await?;
        Ok(serde_json::from_str(&body)?)
    }
}

/// Parse the 24h ticker array. Any shape deviation (non-array payload,
/// row missing a field, unparseable number) rejects the whole snapshot.
pub fn parse_ticker_payload(json: &Value) -> MarketResult<Vec<Ticker>> {
    let rows = json
        .as_array()
        .ok_or_else(|| MarketError::MalformedPayload("Ticker payload is not an array".into()))?;

    let mut tickers = Vec::with_capacity(rows.len());
    for row in rows {
        let symbol = row["symbol"]
            .as_str()
            .ok_or_else(|| MarketError::MalformedPayload("Ticker row missing symbol".into()))?;
        let last_price = field_as_f64(row, "lastPrice")?;
        let price_change_percent = field_as_f64(row, "priceChangePercent")?;
        let quote_volume = field_as_f64(row, "quoteVolume")?;

        tickers.push(Ticker {
            symbol: symbol.to_string(),
            last_price,
            price_change_percent,
            quote_volume,
        });
    }
    Ok(tickers)
}

/// Parse the positional kline arrays:
/// [openTime, open, high, low, close, volume, closeTime, ...ignored].
/// Binance signals errors as a JSON object, which fails the array check.
/// Rows shorter than six fields are skipped.
pub fn parse_klines_payload(json: &Value) -> MarketResult<Vec<Candle>> {
    let rows = json
        .as_array()
        .ok_or_else(|| MarketError::MalformedPayload("Kline payload is not an array".into()))?;

    let mut candles = Vec::with_capacity(rows.len());
    for row in rows {
        let Some(fields) = row.as_array() else {
            continue;
        };
        if fields.len() < 6 {
            continue;
        }

        let Some(open_ms) = fields[0].as_i64() else {
            continue;
        };
        let Some(open_time) = Utc.timestamp_millis_opt(open_ms).single() else {
            continue;
        };

        candles.push(Candle {
            open_time,
            open: value_as_f64(&fields[1])?,
            high: value_as_f64(&fields[2])?,
            low: value_as_f64(&fields[3])?,
            close: value_as_f64(&fields[4])?,
            volume: value_as_f64(&fields[5])?,
        });
    }
    Ok(candles)
}

/// Parse the depth payload: {"bids": [[price, qty], ...], "asks": ...}.
pub fn parse_depth_payload(json: &Value) -> MarketResult<OrderBook> {
    let bids = parse_levels(&json["bids"], "bids")?;
    let asks = parse_levels(&json["asks"], "asks")?;
    Ok(OrderBook::new(bids, asks))
}

fn parse_levels(json: &Value, side: &str) -> MarketResult<Vec<OrderBookLevel>> {
    let rows = json.as_array().ok_or_else(|| {
        MarketError::MalformedPayload(format!("Depth payload missing {} array", side))
    })?;

    let mut levels = Vec::with_capacity(rows.len());
    for row in rows {
        let pair = row.as_array().ok_or_else(|| {
            MarketError::MalformedPayload(format!("Level in {} is not a pair", side))
        })?;
        if pair.len() != 2 {
            return Err(MarketError::MalformedPayload(format!(
                "Level in {} is not a price-quantity pair",
                side
            )));
        }

        levels.push(OrderBookLevel {
            price: value_as_f64(&pair[0])?,
            quantity: value_as_f64(&pair[1])?,
        });
    }
    Ok(levels)
}

fn field_as_f64(row: &Value, field: &str) -> MarketResult<f64> {
    value_as_f64(&row[field])
        .map_err(|_| MarketError::MalformedPayload(format!("Missing or invalid field {}", field)))
}

/// Binance encodes most numbers as strings; accept both forms.
fn value_as_f64(value: &Value) -> MarketResult<f64> {
    match value {
        Value::Number(n) => n
            .as_f64()
            .ok_or_else(|| MarketError::MalformedPayload("Number out of f64 range".into())),
        Value::String(s) => s
            .parse::<f64>()
            .map_err(|_| MarketError::MalformedPayload(format!("Invalid numeric string {:?}", s))),
        other => Err(MarketError::MalformedPayload(format!(
            "Expected number or string, got {}",
            other
        ))),
    }
}
