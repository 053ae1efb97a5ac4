// Trading strategy module
pub mod momentum_scalp;
pub mod trend_breakout;

pub use momentum_scalp::{MomentumScalpStrategy, ScalpConfig};
pub use trend_breakout::{BreakoutConfig, TrendBreakoutStrategy};

use crate::error::BotError;
use crate::indicators::{IndicatorConfig, IndicatorSnapshot};
use crate::models::{Candle, Signal};
use crate::Result;

/// Base trait for all trading strategies
///
/// Strategies are pure: the same snapshot and price always give the same signal.
pub trait Strategy: Send + Sync {
    /// Turn the latest indicator values into an entry decision
    fn evaluate(&self, snapshot: &IndicatorSnapshot, price: f64) -> Signal;

    /// Get strategy name
    fn name(&self) -> &str;

    /// Indicator periods this strategy reads
    fn indicator_config(&self) -> &IndicatorConfig;

    /// Minimum candles required for this strategy
    fn min_candles_required(&self) -> usize {
        self.indicator_config().warmup_candles()
    }

    /// Compute indicators over the window and evaluate them
    ///
    /// Windows shorter than `min_candles_required` are reported as unavailable
    /// data so the caller can skip the cycle.
    fn analyze(
        &self,
        instrument: &str,
        candles: &[Candle],
        price: f64,
    ) -> Result<(Signal, IndicatorSnapshot)> {
        if candles.len() < self.min_candles_required() {
            return Err(BotError::DataUnavailable {
                instrument: instrument.to_string(),
                reason: format!(
                    "insufficient data: {} candles, need {}",
                    candles.len(),
                    self.min_candles_required()
                ),
            });
        }

        let snapshot = IndicatorSnapshot::compute(candles, self.indicator_config());
        Ok((self.evaluate(&snapshot, price), snapshot))
    }
}

/// Named strategy selectable from configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StrategyKind {
    MomentumScalp,
    TrendBreakout,
}

impl std::str::FromStr for StrategyKind {
    type Err = BotError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "momentum_scalp" | "scalp" => Ok(StrategyKind::MomentumScalp),
            "trend_breakout" | "breakout" => Ok(StrategyKind::TrendBreakout),
            other => Err(BotError::Config(format!("unknown strategy '{}'", other))),
        }
    }
}
