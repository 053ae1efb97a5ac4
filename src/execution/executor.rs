use crate::execution::{ExitPlan, ExitReason, PositionManager};
use crate::indicators::IndicatorSnapshot;
use crate::models::{Instrument, OrderRequest, OrderType, Sentiment, Side, Signal};

#[derive(Debug, Clone, PartialEq)]
pub enum ExecutionAction {
    Enter {
        side: Side,
        quantity: f64,
        price: f64,
        stop_loss: f64,
        take_profit: Option<f64>,
    },
    Exit {
        side: Side,
        quantity: f64,
        price: f64,
        reason: ExitReason,
    },
    Skip,
}

#[derive(Debug, Clone)]
pub struct ExecutionDecision {
    pub instrument: Instrument,
    pub action: ExecutionAction,
    pub order_type: OrderType,
    pub reason: String,
}

impl ExecutionDecision {
    pub fn skip(instrument: &Instrument, reason: impl Into<String>) -> Self {
        Self {
            instrument: instrument.clone(),
            action: ExecutionAction::Skip,
            order_type: OrderType::Market,
            reason: reason.into(),
        }
    }

    /// Order to submit for this decision, `None` for a skip
    pub fn order(&self) -> Option<OrderRequest> {
        let (side, quantity) = match self.action {
            ExecutionAction::Enter { side, quantity, .. } => (side.entry_order(), quantity),
            ExecutionAction::Exit { side, quantity, .. } => (side.exit_order(), quantity),
            ExecutionAction::Skip => return None,
        };

        Some(OrderRequest {
            instrument: self.instrument.clone(),
            quantity,
            side,
            order_type: self.order_type,
        })
    }
}

/// Turns a strategy signal into an entry decision against the position book
pub struct Executor {
    lot_size: f64,
    sentiment_veto: bool,
}

impl Executor {
    pub fn new(lot_size: f64, sentiment_veto: bool) -> Self {
        Self {
            lot_size,
            sentiment_veto,
        }
    }

    pub fn lot_size(&self) -> f64 {
        self.lot_size
    }

    /// Process a signal and decide what to do
    pub fn process_signal(
        &self,
        pm: &PositionManager,
        signal: Signal,
        instrument: &Instrument,
        current_price: f64,
        snapshot: &IndicatorSnapshot,
    ) -> ExecutionDecision {
        let side = match signal {
            Signal::EnterLong => Side::Long,
            Signal::EnterShort => Side::Short,
            Signal::Hold => return ExecutionDecision::skip(instrument, "Hold signal"),
        };

        // Check 1: one position per instrument
        if pm.has_open_position(&instrument.symbol) {
            return ExecutionDecision::skip(instrument, "Already have open position");
        }

        // Check 2: risk levels
        let Some((stop_loss, take_profit)) =
            pm.policy().initial_levels(side, current_price, snapshot.atr)
        else {
            return ExecutionDecision::skip(instrument, "ATR undefined, cannot size bracket");
        };

        ExecutionDecision {
            instrument: instrument.clone(),
            action: ExecutionAction::Enter {
                side,
                quantity: self.lot_size,
                price: current_price,
                stop_loss,
                take_profit,
            },
            order_type: pm.policy().order_type(current_price),
            reason: format!("{:?} signal", signal),
        }
    }

    pub fn sentiment_veto(&self) -> bool {
        self.sentiment_veto
    }

    /// Turn an entry that conflicts with `sentiment` into a skip
    ///
    /// Exits and skips pass through untouched.
    pub fn apply_sentiment_veto(
        &self,
        decision: ExecutionDecision,
        sentiment: Sentiment,
    ) -> ExecutionDecision {
        let ExecutionAction::Enter { side, .. } = decision.action else {
            return decision;
        };
        if !self.sentiment_veto {
            return decision;
        }

        let conflicting = matches!(
            (side, sentiment),
            (Side::Long, Sentiment::Negative) | (Side::Short, Sentiment::Positive)
        );
        if conflicting {
            ExecutionDecision::skip(
                &decision.instrument,
                format!("{:?} signal vetoed by {:?} sentiment", side, sentiment),
            )
        } else {
            decision
        }
    }

    /// Build the exit decision for a position the manager flagged
    pub fn process_exit(
        &self,
        pm: &PositionManager,
        instrument: &Instrument,
        plan: ExitPlan,
    ) -> ExecutionDecision {
        let Some(position) = pm.get_open_position(&instrument.symbol) else {
            return ExecutionDecision::skip(instrument, "No position to close");
        };

        ExecutionDecision {
            instrument: instrument.clone(),
            action: ExecutionAction::Exit {
                side: position.side,
                quantity: position.quantity,
                price: plan.price,
                reason: plan.reason,
            },
            order_type: pm.policy().order_type(plan.price),
            reason: format!("{:?} at {:.2}", plan.reason, plan.price),
        }
    }
}
