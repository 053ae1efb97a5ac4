use serde::{Deserialize, Serialize};

use super::Strategy;
use crate::indicators::{IndicatorConfig, IndicatorSnapshot};
use crate::models::Signal;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct BreakoutConfig {
    pub ema_fast: usize,
    pub ema_slow: usize,
    pub adx_period: usize,
    pub adx_threshold: f64,
}

impl Default for BreakoutConfig {
    fn default() -> Self {
        Self {
            ema_fast: 5,
            ema_slow: 9,
            adx_period: 14,
            adx_threshold: 25.0,
        }
    }
}

/// Long-only trend follower: fast EMA above slow EMA with a strong ADX
///
/// Exits are left entirely to the trailing stop.
#[derive(Debug, Clone)]
pub struct TrendBreakoutStrategy {
    config: BreakoutConfig,
    indicators: IndicatorConfig,
}

impl TrendBreakoutStrategy {
    pub fn new(config: BreakoutConfig) -> Self {
        let indicators = IndicatorConfig {
            ema_fast: config.ema_fast,
            ema_slow: config.ema_slow,
            adx_period: config.adx_period,
            ..IndicatorConfig::default()
        };
        Self { config, indicators }
    }
}

impl Default for TrendBreakoutStrategy {
    fn default() -> Self {
        Self::new(BreakoutConfig::default())
    }
}

impl Strategy for TrendBreakoutStrategy {
    fn evaluate(&self, snapshot: &IndicatorSnapshot, _price: f64) -> Signal {
        match (snapshot.ema_fast, snapshot.ema_slow, snapshot.adx) {
            (Some(fast), Some(slow), Some(adx))
                if fast > slow && adx > self.config.adx_threshold =>
            {
                Signal::EnterLong
            }
            _ => Signal::Hold,
        }
    }

    fn name(&self) -> &str {
        "TrendBreakoutStrategy"
    }

    fn indicator_config(&self) -> &IndicatorConfig {
        &self.indicators
    }

    fn min_candles_required(&self) -> usize {
        self.config.ema_slow.max(2 * self.config.adx_period)
    }
}
