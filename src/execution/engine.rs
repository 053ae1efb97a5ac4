use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Arc;

use crate::error::BotError;
use crate::execution::{
    ExecutionAction, ExecutionDecision, Executor, ExitPlan, ExitReason, Position, PositionManager,
};
use crate::models::{Candle, Instrument, OrderOutcome, OrderType, Sentiment};
use crate::strategy::Strategy;
use crate::Result;

/// Synchronous per-cycle step shared by the live driver and the replay
///
/// Each cycle is two-phase: `decide` looks at the book and the market and
/// returns what to do, the caller submits the order, then `settle` commits
/// the outcome. Nothing is written to the book until the gateway accepts.
pub struct TradingEngine {
    strategy: Arc<dyn Strategy>,
    positions: PositionManager,
    executor: Executor,
}

impl TradingEngine {
    pub fn new(strategy: Arc<dyn Strategy>, positions: PositionManager, executor: Executor) -> Self {
        Self {
            strategy,
            positions,
            executor,
        }
    }

    pub fn strategy(&self) -> &dyn Strategy {
        self.strategy.as_ref()
    }

    pub fn positions(&self) -> &PositionManager {
        &self.positions
    }

    /// Decide the action for one instrument at `price`
    ///
    /// Open positions are managed from price alone. Without a position the
    /// strategy evaluates the candle window; a short window surfaces as
    /// `BotError::DataUnavailable`.
    pub fn decide(
        &mut self,
        instrument: &Instrument,
        candles: &[Candle],
        price: f64,
    ) -> Result<ExecutionDecision> {
        if self.positions.has_open_position(&instrument.symbol) {
            return self.manage_open_position(instrument, price);
        }

        let (signal, snapshot) = self.strategy.analyze(&instrument.symbol, candles, price)?;
        tracing::debug!(
            instrument = %instrument.symbol,
            ?signal,
            rsi = ?snapshot.rsi,
            macd = ?snapshot.macd,
            adx = ?snapshot.adx,
            vwap = ?snapshot.vwap,
            "Evaluated {}",
            self.strategy.name()
        );

        Ok(self.executor.process_signal(
            &self.positions,
            signal,
            instrument,
            price,
            &snapshot,
        ))
    }

    /// Count one more bar against an open position, if any
    pub fn mark_bar(&mut self, instrument: &Instrument) -> Result<()> {
        if self.positions.has_open_position(&instrument.symbol) {
            self.positions.mark_bar(&instrument.symbol)?;
        }
        Ok(())
    }

    /// Whether entries are checked against sentiment before submission
    pub fn uses_sentiment(&self) -> bool {
        self.executor.sentiment_veto()
    }

    /// Veto an entry decision that conflicts with `sentiment`
    pub fn apply_sentiment_veto(
        &self,
        decision: ExecutionDecision,
        sentiment: Sentiment,
    ) -> ExecutionDecision {
        self.executor.apply_sentiment_veto(decision, sentiment)
    }

    fn manage_open_position(
        &mut self,
        instrument: &Instrument,
        price: f64,
    ) -> Result<ExecutionDecision> {
        let symbol = instrument.symbol.as_str();
        self.positions.mark_bar(symbol)?;

        let pending = self
            .positions
            .get_open_position(symbol)
            .and_then(|p| p.pending_exit);

        // A rejected exit is retried at the current price
        let plan = match pending {
            Some(reason) => Some(ExitPlan { reason, price }),
            None => self.positions.should_exit(symbol, price)?,
        };

        match plan {
            Some(plan) => Ok(self.executor.process_exit(&self.positions, instrument, plan)),
            None => {
                let stop = self
                    .positions
                    .get_open_position(symbol)
                    .map(|p| p.stop_loss)
                    .unwrap_or_default();
                Ok(ExecutionDecision::skip(
                    instrument,
                    format!("Holding, stop at {:.2}", stop),
                ))
            }
        }
    }

    /// Commit the gateway outcome of a decision
    ///
    /// Returns the closed position when an exit was accepted.
    pub fn settle(
        &mut self,
        decision: &ExecutionDecision,
        outcome: &OrderOutcome,
        timestamp: DateTime<Utc>,
    ) -> Result<Option<Position>> {
        let symbol = decision.instrument.symbol.as_str();

        match (&decision.action, outcome) {
            (ExecutionAction::Skip, _) => Ok(None),

            (
                ExecutionAction::Enter {
                    side,
                    quantity,
                    price,
                    stop_loss,
                    take_profit,
                },
                OrderOutcome::Accepted { order_id },
            ) => {
                let position_id = self.positions.open_position_at(
                    symbol,
                    *side,
                    *price,
                    *quantity,
                    (*stop_loss, *take_profit),
                    timestamp,
                )?;
                tracing::info!(
                    instrument = symbol,
                    %position_id,
                    order_id = ?order_id,
                    "🟢 ENTRY {:?} {} @ {:.2} (SL {:.2}, TP {})",
                    side,
                    quantity,
                    price,
                    stop_loss,
                    take_profit.map_or("trailing".to_string(), |tp| format!("{:.2}", tp))
                );
                Ok(None)
            }

            (ExecutionAction::Enter { side, .. }, OrderOutcome::Rejected { reason }) => {
                tracing::warn!(
                    "❌ Entry {:?} not taken, staying flat: {}",
                    side,
                    rejection(symbol, reason)
                );
                Ok(None)
            }

            (ExecutionAction::Exit { price, reason, .. }, OrderOutcome::Accepted { .. }) => {
                let closed = self
                    .positions
                    .close_position_at(symbol, *price, *reason, timestamp)?;
                tracing::info!(
                    instrument = symbol,
                    position_id = %closed.id,
                    "🔴 EXIT {:?} @ {:.2} ({:?}), P&L {:.2} ({:+.2}%) after {} bars",
                    closed.side,
                    price,
                    reason,
                    closed.realized_pnl.unwrap_or_default(),
                    closed.pnl_pct(*price),
                    closed.bars_held
                );
                Ok(Some(closed))
            }

            (ExecutionAction::Exit { reason, .. }, OrderOutcome::Rejected { reason: why }) => {
                self.positions.mark_exit_pending(symbol, *reason)?;
                tracing::warn!(
                    "❌ Exit not taken, keeping position for retry: {}",
                    rejection(symbol, why)
                );
                Ok(None)
            }
        }
    }

    /// Exit decisions for every open position, as market orders
    ///
    /// Positions whose instrument has no entry in `prices` are left open.
    pub fn flatten_all(
        &self,
        instruments: &[Instrument],
        prices: &HashMap<String, f64>,
        reason: ExitReason,
    ) -> Vec<ExecutionDecision> {
        instruments
            .iter()
            .filter(|i| self.positions.has_open_position(&i.symbol))
            .filter_map(|instrument| {
                let Some(&price) = prices.get(&instrument.symbol) else {
                    tracing::warn!(
                        instrument = %instrument.symbol,
                        "No price to flatten with, leaving position open"
                    );
                    return None;
                };
                let mut decision = self.executor.process_exit(
                    &self.positions,
                    instrument,
                    ExitPlan { reason, price },
                );
                decision.order_type = OrderType::Market;
                Some(decision)
            })
            .collect()
    }
}

fn rejection(instrument: &str, reason: &str) -> BotError {
    BotError::OrderRejected {
        instrument: instrument.to_string(),
        reason: reason.to_string(),
    }
}
