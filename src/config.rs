use crate::data::Interval;
use crate::error::{MarketError, MarketResult};
use serde::{Deserialize, Serialize};
use std::env;
use std::str::FromStr;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExchangeConfig {
    /// Optional quota key sent as X-MBX-APIKEY. Every endpoint we read
    /// is public, so a missing key must never break a fetch.
    pub api_key: Option<String>,
    pub base_url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScannerConfig {
    pub max_price: f64,
    pub top_count: usize,
    pub quote_suffixes: Vec<String>,
    pub candle_interval: Interval,
    pub candle_limit: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChartConfig {
    pub symbol: String,
    pub interval: Interval,
    pub depth_limit: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub exchange: ExchangeConfig,
    pub scanner: ScannerConfig,
    pub chart: ChartConfig,
    pub live_mode: bool,
    pub refresh_secs: u64,
    pub log_level: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            exchange: ExchangeConfig {
                api_key: None,
                base_url: "https://api.binance.com".to_string(),
            },
            scanner: ScannerConfig {
                max_price: 0.01,
                top_count: 10,
                quote_suffixes: vec!["EUR".to_string(), "USDT".to_string()],
                candle_interval: Interval::M15,
                candle_limit: 50,
            },
            chart: ChartConfig {
                symbol: "PEPEUSDT".to_string(),
                interval: Interval::M15,
                depth_limit: 10,
            },
            live_mode: false,
            refresh_secs: 2,
            log_level: "info".to_string(),
        }
    }
}

impl AppConfig {
    /// Load configuration from environment variables, falling back to
    /// defaults for anything unset.
    pub fn from_env() -> MarketResult<Self> {
        let mut config = Self::default();

        config.exchange.api_key = env::var("BINANCE_API_KEY").ok().filter(|k| !k.is_empty());

        if let Ok(base_url) = env::var("BINANCE_BASE_URL") {
            config.exchange.base_url = base_url;
        }

        if let Ok(max_price) = env::var("SCAN_MAX_PRICE") {
            config.scanner.max_price = max_price
                .parse()
                .map_err(|_| MarketError::Configuration("Invalid SCAN_MAX_PRICE".to_string()))?;
        }

        if let Ok(top_count) = env::var("SCAN_TOP_COUNT") {
            config.scanner.top_count = top_count
                .parse()
                .map_err(|_| MarketError::Configuration("Invalid SCAN_TOP_COUNT".to_string()))?;
        }

        if let Ok(suffixes) = env::var("SCAN_QUOTE_SUFFIXES") {
            config.scanner.quote_suffixes = suffixes
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect();
        }

        if let Ok(symbol) = env::var("CHART_SYMBOL") {
            config.chart.symbol = symbol;
        }

        if let Ok(interval) = env::var("CHART_INTERVAL") {
            config.chart.interval = Interval::from_str(&interval)
                .map_err(|_| MarketError::Configuration("Invalid CHART_INTERVAL".to_string()))?;
        }

        if let Ok(depth_limit) = env::var("DEPTH_LIMIT") {
            config.chart.depth_limit = depth_limit
                .parse()
                .map_err(|_| MarketError::Configuration("Invalid DEPTH_LIMIT".to_string()))?;
        }

        config.live_mode = env::var("LIVE_MODE")
            .unwrap_or_else(|_| "false".to_string())
            .parse()
            .unwrap_or(false);

        if let Ok(refresh_secs) = env::var("REFRESH_SECS") {
            config.refresh_secs = refresh_secs
                .parse()
                .map_err(|_| MarketError::Configuration("Invalid REFRESH_SECS".to_string()))?;
        }

        if let Ok(log_level) = env::var("LOG_LEVEL") {
            config.log_level = log_level;
        }

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> MarketResult<()> {
        if self.exchange.base_url.is_empty() {
            return Err(MarketError::Configuration(
                "Base URL cannot be empty".to_string(),
            ));
        }

        if self.scanner.max_price <= 0.0 {
            return Err(MarketError::Configuration(
                "Price ceiling must be positive".to_string(),
            ));
        }

        if self.scanner.top_count == 0 {
            return Err(MarketError::Configuration(
                "Candidate count must be greater than 0".to_string(),
            ));
        }

        if self.scanner.quote_suffixes.is_empty() {
            return Err(MarketError::Configuration(
                "At least one quote suffix is required".to_string(),
            ));
        }

        if self.scanner.candle_limit == 0 {
            return Err(MarketError::Configuration(
                "Candle limit must be greater than 0".to_string(),
            ));
        }

        if self.chart.symbol.is_empty() {
            return Err(MarketError::Configuration(
                "Chart symbol cannot be empty".to_string(),
            ));
        }

        if self.chart.depth_limit == 0 {
            return Err(MarketError::Configuration(
                "Depth limit must be greater than 0".to_string(),
            ));
        }

        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.log_level.as_str()) {
            return Err(MarketError::Configuration(format!(
                "Invalid log level: {}",
                self.log_level
            )));
        }

        Ok(())
    }
}
