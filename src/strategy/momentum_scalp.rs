use serde::{Deserialize, Serialize};

use super::Strategy;
use crate::indicators::{IndicatorConfig, IndicatorSnapshot};
use crate::models::Signal;

/// Thresholds for the near-expiry momentum scalp
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ScalpConfig {
    pub macd_near_zero: f64, // |MACD| must stay below this (trend just turning)
    pub adx_threshold: f64,
    pub rsi_midline: f64,
    pub min_candles: usize,
}

impl Default for ScalpConfig {
    fn default() -> Self {
        Self {
            macd_near_zero: 0.5,
            adx_threshold: 18.0,
            rsi_midline: 50.0,
            min_candles: 50,
        }
    }
}

/// Momentum scalp for fast-moving, near-expiry option contracts
///
/// Goes long when MACD has just crossed above its signal near the zero line,
/// the fast EMA leads the slow one, price trades above VWAP, RSI is above its
/// midline and ADX confirms a trend. Shorts on the mirrored conditions.
#[derive(Debug, Clone)]
pub struct MomentumScalpStrategy {
    config: ScalpConfig,
    indicators: IndicatorConfig,
}

impl MomentumScalpStrategy {
    pub fn new(config: ScalpConfig, indicators: IndicatorConfig) -> Self {
        Self { config, indicators }
    }

    pub fn config(&self) -> &ScalpConfig {
        &self.config
    }
}

impl Default for MomentumScalpStrategy {
    fn default() -> Self {
        Self::new(ScalpConfig::default(), IndicatorConfig::default())
    }
}

impl Strategy for MomentumScalpStrategy {
    fn evaluate(&self, snapshot: &IndicatorSnapshot, price: f64) -> Signal {
        let (Some(rsi), Some(macd), Some(signal), Some(ema_fast), Some(ema_slow), Some(vwap), Some(adx)) = (
            snapshot.rsi,
            snapshot.macd,
            snapshot.macd_signal,
            snapshot.ema_fast,
            snapshot.ema_slow,
            snapshot.vwap,
            snapshot.adx,
        ) else {
            return Signal::Hold;
        };

        let near_zero = macd.abs() < self.config.macd_near_zero;
        let trending = adx > self.config.adx_threshold;

        let long = macd > signal
            && near_zero
            && ema_fast > ema_slow
            && price > vwap
            && rsi > self.config.rsi_midline
            && trending;

        let short = macd < signal
            && near_zero
            && ema_fast < ema_slow
            && price < vwap
            && rsi < self.config.rsi_midline
            && trending;

        match (long, short) {
            (true, false) => Signal::EnterLong,
            (false, true) => Signal::EnterShort,
            (true, true) => {
                tracing::error!(
                    "Long and short conditions both true (macd={:.4}, signal={:.4}, rsi={:.2}), holding",
                    macd,
                    signal,
                    rsi
                );
                Signal::Hold
            }
            (false, false) => Signal::Hold,
        }
    }

    fn name(&self) -> &str {
        "MomentumScalpStrategy"
    }

    fn indicator_config(&self) -> &IndicatorConfig {
        &self.indicators
    }

    fn min_candles_required(&self) -> usize {
        self.config.min_candles.max(self.indicators.warmup_candles())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Candle;
    use chrono::Utc;

    fn bullish_snapshot() -> IndicatorSnapshot {
        IndicatorSnapshot {
            close: 105.0,
            rsi: Some(60.0),
            macd: Some(0.2),
            macd_signal: Some(0.1),
            ema_fast: Some(104.0),
            ema_slow: Some(103.0),
            atr: Some(2.0),
            adx: Some(25.0),
            plus_di: Some(30.0),
            minus_di: Some(10.0),
            vwap: Some(102.0),
        }
    }

    fn bearish_snapshot() -> IndicatorSnapshot {
        IndicatorSnapshot {
            close: 98.0,
            rsi: Some(40.0),
            macd: Some(-0.2),
            macd_signal: Some(-0.1),
            ema_fast: Some(99.0),
            ema_slow: Some(100.0),
            atr: Some(2.0),
            adx: Some(25.0),
            plus_di: Some(10.0),
            minus_di: Some(30.0),
            vwap: Some(101.0),
        }
    }

    #[test]
    fn test_enter_long() {
        let strategy = MomentumScalpStrategy::default();
        assert_eq!(strategy.evaluate(&bullish_snapshot(), 105.0), Signal::EnterLong);
    }

    #[test]
    fn test_enter_short() {
        let strategy = MomentumScalpStrategy::default();
        assert_eq!(strategy.evaluate(&bearish_snapshot(), 98.0), Signal::EnterShort);
    }

    #[test]
    fn test_macd_far_from_zero_holds() {
        let strategy = MomentumScalpStrategy::default();
        let snapshot = IndicatorSnapshot {
            macd: Some(0.9),
            macd_signal: Some(0.5),
            ..bullish_snapshot()
        };
        assert_eq!(strategy.evaluate(&snapshot, 105.0), Signal::Hold);
    }

    #[test]
    fn test_price_below_vwap_holds() {
        let strategy = MomentumScalpStrategy::default();
        assert_eq!(strategy.evaluate(&bullish_snapshot(), 101.0), Signal::Hold);
    }

    #[test]
    fn test_weak_trend_holds() {
        let strategy = MomentumScalpStrategy::default();
        let snapshot = IndicatorSnapshot {
            adx: Some(15.0),
            ..bullish_snapshot()
        };
        assert_eq!(strategy.evaluate(&snapshot, 105.0), Signal::Hold);
    }

    #[test]
    fn test_any_undefined_indicator_holds() {
        let strategy = MomentumScalpStrategy::default();

        let no_adx = IndicatorSnapshot {
            adx: None,
            ..bullish_snapshot()
        };
        assert_eq!(strategy.evaluate(&no_adx, 105.0), Signal::Hold);

        let no_vwap = IndicatorSnapshot {
            vwap: None,
            ..bearish_snapshot()
        };
        assert_eq!(strategy.evaluate(&no_vwap, 98.0), Signal::Hold);
    }

    #[test]
    fn test_min_candles_required() {
        let strategy = MomentumScalpStrategy::default();
        assert_eq!(strategy.min_candles_required(), 50);
    }

    #[test]
    fn test_analyze_rejects_short_window() {
        let strategy = MomentumScalpStrategy::default();
        let candles: Vec<Candle> = (0..10)
            .map(|i| Candle {
                timestamp: Utc::now() + chrono::Duration::minutes(i),
                open: 100.0,
                high: 101.0,
                low: 99.0,
                close: 100.0,
                volume: 10.0,
            })
            .collect();

        let result = strategy.analyze("TEST", &candles, 100.0);
        assert!(result.is_err());
        assert!(result
            .unwrap_err()
            .to_string()
            .contains("insufficient data"));
    }
}
