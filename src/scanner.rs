use crate::config::ScannerConfig;
use crate::data::{IndicatorSnapshot, RankedCandidate, Ticker};
use crate::indicators::IndicatorEngine;
use crate::rest_client::BinanceClient;
use futures_util::future::join_all;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, warn};

/// Selects the low-cap candidate set from the full ticker snapshot and
/// enriches it with per-symbol indicators, fanned out concurrently.
pub struct MarketScanner {
    client: Arc<BinanceClient>,
    config: ScannerConfig,
}

impl MarketScanner {
    pub fn new(client: Arc<BinanceClient>, config: ScannerConfig) -> Self {
        Self { client, config }
    }

    /// Run the full pipeline: snapshot, filter/rank, concurrent
    /// enrichment, merge. An empty vec means the snapshot itself was
    /// unavailable or nothing survived the filter.
    pub async fn scan(&self) -> Vec<RankedCandidate> {
        let snapshot = self.client.ticker_24h().await;
        self.scan_snapshot(snapshot).await
    }

    /// Same pipeline with the snapshot supplied by the caller.
    pub async fn scan_snapshot(&self, snapshot: Vec<Ticker>) -> Vec<RankedCandidate> {
        let ranked = filter_and_rank(snapshot, &self.config);
        debug!("{} candidates after filter/rank", ranked.len());

        let indicators = self.enrich(&ranked).await;
        merge(ranked, indicators)
    }

    /// One task per candidate fetches its candle series and computes
    /// indicators; the candidate cap bounds the pool. Workers share no
    /// mutable state, results are joined only after the barrier.
    async fn enrich(&self, ranked: &[Ticker]) -> HashMap<String, IndicatorSnapshot> {
        let handles: Vec<_> = ranked
            .iter()
            .map(|ticker| {
                let client = Arc::clone(&self.client);
                let symbol = ticker.symbol.clone();
                let interval = self.config.candle_interval;
                let limit = self.config.candle_limit;

                (
                    ticker.symbol.clone(),
                    tokio::spawn(async move {
                        let candles = client.klines(&symbol, interval, limit).await;
                        IndicatorEngine::compute(&candles)
                    }),
                )
            })
            .collect();

        let mut results = HashMap::with_capacity(handles.len());
        let (symbols, joins): (Vec<_>, Vec<_>) = handles.into_iter().unzip();

        for (symbol, joined) in symbols.into_iter().zip(join_all(joins).await) {
            let snapshot = match joined {
                Ok(snapshot) => snapshot,
                Err(e) => {
                    warn!("Enrichment task for {} failed: {}", symbol, e);
                    IndicatorSnapshot::default()
                }
            };
            results.insert(symbol, snapshot);
        }
        results
    }
}

/// Keep sub-threshold symbols quoted in one of the configured
/// currencies, rank by quote volume descending, truncate to the
/// configured count.
pub fn filter_and_rank(snapshot: Vec<Ticker>, config: &ScannerConfig) -> Vec<Ticker> {
    let mut candidates: Vec<Ticker> = snapshot
        .into_iter()
        .filter(|t| {
            t.last_price < config.max_price
                && config
                    .quote_suffixes
                    .iter()
                    .any(|suffix| t.symbol.ends_with(suffix))
        })
        .collect();

    candidates.sort_by(|a, b| b.quote_volume.total_cmp(&a.quote_volume));
    candidates.truncate(config.top_count);
    candidates
}

/// Left join: every ranked row stays, a missing indicator result
/// degrades that row to the default snapshot. Rank order is preserved,
/// never re-sorted by indicator values.
pub fn merge(
    ranked: Vec<Ticker>,
    mut indicators: HashMap<String, IndicatorSnapshot>,
) -> Vec<RankedCandidate> {
    ranked
        .into_iter()
        .map(|ticker| {
            let snapshot = indicators.remove(&ticker.symbol).unwrap_or_default();
            RankedCandidate {
                ticker,
                indicators: snapshot,
            }
        })
        .collect()
}
