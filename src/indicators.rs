use crate::data::{Candle, IndicatorSnapshot};

pub const RSI_PERIOD: usize = 14;
pub const MACD_FAST: usize = 12;
pub const MACD_SLOW: usize = 26;

/// Below this many bars the indicator math is too noisy to be worth
/// showing; everything degrades to the all-absent snapshot.
pub const MIN_BARS: usize = 30;

const SPIKE_LOOKBACK: usize = 20;
const SPIKE_MULTIPLIER: f64 = 3.0;
const LEVEL_WINDOW: usize = 50;

pub struct TechnicalIndicators;

impl TechnicalIndicators {
    /// Exponential Moving Average, seeded with the SMA of the first
    /// `period` values. Empty if the input is shorter than `period`.
    pub fn calculate_ema(prices: &[f64], period: usize) -> Vec<f64> {
        if period == 0 || prices.len() < period {
            return Vec::new();
        }

        let mut ema = Vec::with_capacity(prices.len() - period + 1);
        let alpha = 2.0 / (period as f64 + 1.0);

        let initial_sma: f64 = prices[0..period].iter().sum::<f64>() / period as f64;
        ema.push(initial_sma);

        for i in period..prices.len() {
            let prev = *ema.last().unwrap();
            ema.push(alpha * prices[i] + (1.0 - alpha) * prev);
        }
        ema
    }

    /// Relative Strength Index with Wilder's smoothing. A flat window
    /// (no gains, no losses) yields the neutral 50 rather than dividing
    /// zero by zero.
    pub fn calculate_rsi(prices: &[f64], period: usize) -> Vec<f64> {
        if period == 0 || prices.len() < period + 1 {
            return Vec::new();
        }

        let mut gains = Vec::with_capacity(prices.len() - 1);
        let mut losses = Vec::with_capacity(prices.len() - 1);

        for i in 1..prices.len() {
            let change = prices[i] - prices[i - 1];
            gains.push(if change > 0.0 { change } else { 0.0 });
            losses.push(if change < 0.0 { -change } else { 0.0 });
        }

        let mut rsi = Vec::with_capacity(gains.len() - period + 1);
        let mut avg_gain: f64 = gains[0..period].iter().sum::<f64>() / period as f64;
        let mut avg_loss: f64 = losses[0..period].iter().sum::<f64>() / period as f64;
        rsi.push(Self::rsi_value(avg_gain, avg_loss));

        for i in period..gains.len() {
            avg_gain = (avg_gain * (period as f64 - 1.0) + gains[i]) / period as f64;
            avg_loss = (avg_loss * (period as f64 - 1.0) + losses[i]) / period as f64;
            rsi.push(Self::rsi_value(avg_gain, avg_loss));
        }

        rsi
    }

    fn rsi_value(avg_gain: f64, avg_loss: f64) -> f64 {
        if avg_loss == 0.0 {
            if avg_gain == 0.0 {
                50.0
            } else {
                100.0
            }
        } else {
            let rs = avg_gain / avg_loss;
            100.0 - (100.0 / (1.0 + rs))
        }
    }

    /// MACD line (fast EMA minus slow EMA), both series aligned at the
    /// most recent bar. Empty if the slow EMA has no values.
    pub fn calculate_macd_line(prices: &[f64], fast: usize, slow: usize) -> Vec<f64> {
        let ema_fast = Self::calculate_ema(prices, fast);
        let ema_slow = Self::calculate_ema(prices, slow);

        if ema_slow.is_empty() || ema_fast.len() < ema_slow.len() {
            return Vec::new();
        }

        let offset = ema_fast.len() - ema_slow.len();
        ema_slow
            .iter()
            .enumerate()
            .map(|(i, slow_val)| ema_fast[i + offset] - slow_val)
            .collect()
    }
}

pub struct IndicatorEngine;

impl IndicatorEngine {
    /// Derive RSI(14), the latest MACD(12,26) line value and the
    /// volume-spike flag from one candle series. Short series degrade
    /// to the default snapshot; nothing here can abort a batch.
    pub fn compute(candles: &[Candle]) -> IndicatorSnapshot {
        if candles.len() < MIN_BARS {
            return IndicatorSnapshot::default();
        }

        let closes: Vec<f64> = candles.iter().map(|c| c.close).collect();
        let volumes: Vec<f64> = candles.iter().map(|c| c.volume).collect();

        let rsi = TechnicalIndicators::calculate_rsi(&closes, RSI_PERIOD)
            .last()
            .copied();
        let macd = TechnicalIndicators::calculate_macd_line(&closes, MACD_FAST, MACD_SLOW)
            .last()
            .copied();

        IndicatorSnapshot {
            rsi,
            macd,
            volume_spike: Self::volume_spike(&volumes),
        }
    }

    /// Pump heuristic: latest volume above three times the trailing
    /// 20-bar mean. Thin symbols will false-positive; that is accepted.
    fn volume_spike(volumes: &[f64]) -> bool {
        if volumes.len() < SPIKE_LOOKBACK {
            return false;
        }

        let window = &volumes[volumes.len() - SPIKE_LOOKBACK..];
        let avg = window.iter().sum::<f64>() / SPIKE_LOOKBACK as f64;
        let last = volumes[volumes.len() - 1];

        avg > 0.0 && last > avg * SPIKE_MULTIPLIER
    }
}

/// Support and resistance over the trailing 50 bars: (min low, max high)
/// at the latest position. None when the window is not filled.
pub fn support_resistance(candles: &[Candle]) -> Option<(f64, f64)> {
    if candles.len() < LEVEL_WINDOW {
        return None;
    }

    let window = &candles[candles.len() - LEVEL_WINDOW..];
    let support = window.iter().map(|c| c.low).fold(f64::INFINITY, f64::min);
    let resistance = window
        .iter()
        .map(|c| c.high)
        .fold(f64::NEG_INFINITY, f64::max);
    Some((support, resistance))
}
