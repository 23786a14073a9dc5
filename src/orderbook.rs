use crate::data::OrderBookLevel;

/// Top-of-book depth for one symbol, bids descending and asks ascending
/// by price, replaced wholesale on every fetch.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct OrderBook {
    pub bids: Vec<OrderBookLevel>,
    pub asks: Vec<OrderBookLevel>,
}

impl OrderBook {
    pub fn new(bids: Vec<OrderBookLevel>, asks: Vec<OrderBookLevel>) -> Self {
        Self { bids, asks }
    }

    pub fn is_empty(&self) -> bool {
        self.bids.is_empty() || self.asks.is_empty()
    }

    pub fn best_bid(&self) -> Option<f64> {
        self.bids.first().map(|level| level.price)
    }

    pub fn best_ask(&self) -> Option<f64> {
        self.asks.first().map(|level| level.price)
    }

    pub fn bid_notional(&self) -> f64 {
        Self::notional(&self.bids)
    }

    pub fn ask_notional(&self) -> f64 {
        Self::notional(&self.asks)
    }

    /// Fraction of total book notional sitting on the buy side. None
    /// when either side is empty or the book carries no value; callers
    /// suppress the metric instead of fabricating one.
    pub fn pressure_ratio(&self) -> Option<f64> {
        if self.is_empty() {
            return None;
        }

        let bid = self.bid_notional();
        let total = bid + self.ask_notional();
        if total == 0.0 {
            return None;
        }

        Some(bid / total)
    }

    fn notional(levels: &[OrderBookLevel]) -> f64 {
        levels
            .iter()
            .map(|level| level.price * level.quantity)
            .sum()
    }
}
