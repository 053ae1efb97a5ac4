use serde::{Deserialize, Serialize};

use super::{calculate_adx, calculate_atr, calculate_macd, calculate_rsi, calculate_vwap};
use crate::models::Candle;

/// Indicator periods shared by every strategy
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct IndicatorConfig {
    pub rsi_period: usize,
    pub atr_period: usize,
    pub adx_period: usize,
    pub ema_fast: usize,
    pub ema_slow: usize,
    pub macd_signal: usize,
    pub vwap_lookback: usize,
}

impl Default for IndicatorConfig {
    fn default() -> Self {
        Self {
            rsi_period: 14,
            atr_period: 14,
            adx_period: 14,
            ema_fast: 12,
            ema_slow: 26,
            macd_signal: 9,
            vwap_lookback: 60,
        }
    }
}

impl IndicatorConfig {
    /// Candles needed before every indicator can be defined
    pub fn warmup_candles(&self) -> usize {
        [
            self.rsi_period + 1,
            self.atr_period + 1,
            2 * self.adx_period,
            self.ema_slow,
            self.ema_fast,
        ]
        .into_iter()
        .max()
        .unwrap_or(0)
    }
}

/// Indicator values at the latest candle of a window
///
/// `None` marks an indicator that is not yet available for the window (too
/// short, or a zero denominator). Strategies must not enter on such cycles.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct IndicatorSnapshot {
    pub close: f64,
    pub rsi: Option<f64>,
    pub macd: Option<f64>,
    pub macd_signal: Option<f64>,
    pub ema_fast: Option<f64>,
    pub ema_slow: Option<f64>,
    pub atr: Option<f64>,
    pub adx: Option<f64>,
    pub plus_di: Option<f64>,
    pub minus_di: Option<f64>,
    pub vwap: Option<f64>,
}

impl IndicatorSnapshot {
    /// Compute every indicator over the window; pure and stateless
    pub fn compute(candles: &[Candle], config: &IndicatorConfig) -> Self {
        let Some(last) = candles.last() else {
            return Self::default();
        };

        let closes: Vec<f64> = candles.iter().map(|c| c.close).collect();
        let macd = calculate_macd(
            &closes,
            config.ema_fast,
            config.ema_slow,
            config.macd_signal,
        );
        let adx = calculate_adx(candles, config.adx_period);

        Self {
            close: last.close,
            rsi: calculate_rsi(&closes, config.rsi_period),
            macd: macd.map(|m| m.macd),
            macd_signal: macd.map(|m| m.signal),
            ema_fast: macd.map(|m| m.ema_fast),
            ema_slow: macd.map(|m| m.ema_slow),
            atr: calculate_atr(candles, config.atr_period),
            adx: adx.map(|(adx, _, _)| adx),
            plus_di: adx.map(|(_, plus_di, _)| plus_di),
            minus_di: adx.map(|(_, _, minus_di)| minus_di),
            vwap: calculate_vwap(candles, config.vwap_lookback),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn rising_candles(count: usize) -> Vec<Candle> {
        (0..count)
            .map(|i| {
                let base = 100.0 + i as f64;
                Candle {
                    timestamp: Utc::now() + chrono::Duration::minutes(i as i64),
                    open: base,
                    high: base + 1.5,
                    low: base - 0.5,
                    close: base + 1.0,
                    volume: 500.0,
                }
            })
            .collect()
    }

    #[test]
    fn test_warmup_candles() {
        let config = IndicatorConfig::default();
        // ADX: 2 * 14
        assert_eq!(config.warmup_candles(), 28);

        let config = IndicatorConfig {
            ema_slow: 40,
            ..Default::default()
        };
        assert_eq!(config.warmup_candles(), 40);
    }

    #[test]
    fn test_snapshot_short_window_is_undefined() {
        let candles = rising_candles(10);
        let snapshot = IndicatorSnapshot::compute(&candles, &IndicatorConfig::default());

        assert_eq!(snapshot.close, 110.0);
        assert!(snapshot.macd.is_none());
        assert!(snapshot.adx.is_none());
        assert!(snapshot.atr.is_none());
        assert!(snapshot.rsi.is_none());
        // VWAP only needs volume
        assert!(snapshot.vwap.is_some());
    }

    #[test]
    fn test_snapshot_full_window() {
        let candles = rising_candles(60);
        let snapshot = IndicatorSnapshot::compute(&candles, &IndicatorConfig::default());

        assert_eq!(snapshot.rsi, Some(100.0));
        assert!(snapshot.macd.unwrap() > 0.0);
        assert!(snapshot.ema_fast.unwrap() > snapshot.ema_slow.unwrap());
        assert_eq!(snapshot.atr, Some(2.0));
        assert!(snapshot.adx.unwrap() > 50.0);
        assert!(snapshot.vwap.unwrap() < snapshot.close);
    }

    #[test]
    fn test_snapshot_empty_window() {
        let snapshot = IndicatorSnapshot::compute(&[], &IndicatorConfig::default());
        assert_eq!(snapshot, IndicatorSnapshot::default());
    }
}
