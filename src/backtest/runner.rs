use std::collections::HashMap;
use std::sync::Arc;

use crate::backtest::{BacktestMetrics, TradeLedger, TradeRecord};
use crate::error::BotError;
use crate::execution::{
    ExecutionAction, Executor, ExitReason, PositionManager, RiskPolicy, TradingEngine,
};
use crate::models::{Candle, Instrument, OrderOutcome};
use crate::strategy::Strategy;
use crate::Result;

/// Outcome of replaying one candle series
#[derive(Debug, Clone, PartialEq)]
pub struct BacktestResult {
    pub ledger: TradeLedger,
    pub metrics: BacktestMetrics,
    pub bars: usize,
}

/// Replays a stored candle series through the same engine the live bot uses
///
/// The order gateway is replaced by the trade ledger: every order is
/// accepted at the decision price. Bar `i` is evaluated on the window
/// `candles[..=i]` at its close.
pub struct BacktestRunner {
    policy: RiskPolicy,
    lot_size: f64,
    transaction_cost: f64, // Per side
}

impl BacktestRunner {
    pub fn new(policy: RiskPolicy, lot_size: f64, transaction_cost: f64) -> Self {
        Self {
            policy,
            lot_size,
            transaction_cost,
        }
    }

    /// Run a single pass over `candles`; deterministic for a given input
    pub fn run(
        &self,
        strategy: Arc<dyn Strategy>,
        instrument: &Instrument,
        candles: &[Candle],
    ) -> Result<BacktestResult> {
        let Some(last) = candles.last() else {
            return Err(BotError::DataUnavailable {
                instrument: instrument.symbol.clone(),
                reason: "empty candle series".to_string(),
            });
        };

        tracing::info!(
            instrument = %instrument.symbol,
            "Starting backtest: {} candles, {} needs {}",
            candles.len(),
            strategy.name(),
            strategy.min_candles_required()
        );

        let mut engine = TradingEngine::new(
            strategy,
            PositionManager::new(self.policy.clone(), self.transaction_cost),
            Executor::new(self.lot_size, false),
        );
        let mut ledger = TradeLedger::new();
        let filled = OrderOutcome::Accepted { order_id: None };

        for i in 0..candles.len() {
            let bar = &candles[i];
            let decision = match engine.decide(instrument, &candles[..=i], bar.close) {
                Ok(decision) => decision,
                Err(BotError::DataUnavailable { .. }) => continue,
                Err(e) => return Err(e),
            };

            if matches!(decision.action, ExecutionAction::Skip) {
                continue;
            }

            if let Some(closed) = engine.settle(&decision, &filled, bar.timestamp)? {
                if let Some(trade) = TradeRecord::from_position(&closed, self.transaction_cost) {
                    ledger.record(trade);
                }
            }
        }

        // Force-close whatever is still open at the final close, which
        // counts as one more bar held
        engine.mark_bar(instrument)?;
        let prices = HashMap::from([(instrument.symbol.clone(), last.close)]);
        for decision in
            engine.flatten_all(std::slice::from_ref(instrument), &prices, ExitReason::EndOfData)
        {
            if let Some(closed) = engine.settle(&decision, &filled, last.timestamp)? {
                tracing::info!(
                    instrument = %instrument.symbol,
                    "🟡 END OF DATA - closed at {:.2}",
                    last.close
                );
                if let Some(trade) = TradeRecord::from_position(&closed, self.transaction_cost) {
                    ledger.record(trade);
                }
            }
        }

        let metrics = BacktestMetrics::from_trades(ledger.trades());
        Ok(BacktestResult {
            ledger,
            metrics,
            bars: candles.len(),
        })
    }
}
