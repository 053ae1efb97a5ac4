use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

use crate::models::{OrderType, Side};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PositionStatus {
    Open,
    Closed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExitReason {
    StopLoss,
    TakeProfit,
    TrailingStop,
    EndOfData, // Forced close at the last replayed bar
    Flatten,   // Operator shutdown
}

/// Fixed stop/target pair sized from ATR at entry
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct BracketConfig {
    pub atr_multiplier: f64,
    pub min_stop_points: f64,
    pub reward_risk: f64,
}

impl Default for BracketConfig {
    fn default() -> Self {
        Self {
            atr_multiplier: 1.5,
            min_stop_points: 10.0,
            reward_risk: 1.8,
        }
    }
}

/// Ratcheting stop: starts `initial_offset` away from entry and follows price
/// at `trail_offset` once it has moved `trigger` points in our favour
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct TrailingConfig {
    pub initial_offset: f64,
    pub trigger: f64,
    pub trail_offset: f64,
}

impl Default for TrailingConfig {
    fn default() -> Self {
        Self {
            initial_offset: 5.0,
            trigger: 1.0,
            trail_offset: 0.5,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum RiskPolicy {
    Bracket(BracketConfig),
    Trailing(TrailingConfig),
}

impl RiskPolicy {
    /// Initial (stop_loss, take_profit) for a fresh position
    ///
    /// The bracket variant needs ATR; `None` means it could not be sized.
    pub fn initial_levels(
        &self,
        side: Side,
        entry_price: f64,
        atr: Option<f64>,
    ) -> Option<(f64, Option<f64>)> {
        let dir = side.direction();
        match self {
            RiskPolicy::Bracket(cfg) => {
                let atr = atr?;
                let stop_distance = (atr * cfg.atr_multiplier).max(cfg.min_stop_points);
                let target_distance = stop_distance * cfg.reward_risk;
                Some((
                    entry_price - dir * stop_distance,
                    Some(entry_price + dir * target_distance),
                ))
            }
            RiskPolicy::Trailing(cfg) => Some((entry_price - dir * cfg.initial_offset, None)),
        }
    }

    /// Bracket orders go to market, trailing orders are limits at the decision price
    pub fn order_type(&self, price: f64) -> OrderType {
        match self {
            RiskPolicy::Bracket(_) => OrderType::Market,
            RiskPolicy::Trailing(_) => OrderType::Limit { price },
        }
    }
}

#[derive(Debug, Clone)]
pub struct Position {
    pub id: Uuid,
    pub instrument: String,
    pub side: Side,
    pub entry_price: f64,
    pub quantity: f64,
    pub entry_time: DateTime<Utc>,
    pub stop_loss: f64,
    pub take_profit: Option<f64>, // Bracket target; None for trailing positions
    pub bars_held: u32,
    pub pending_exit: Option<ExitReason>, // Previous exit order was rejected
    pub status: PositionStatus,
    pub realized_pnl: Option<f64>,
    pub exit_price: Option<f64>,
    pub exit_time: Option<DateTime<Utc>>,
    pub exit_reason: Option<ExitReason>,
}

impl Position {
    /// Signed P&L in percent of entry price
    pub fn pnl_pct(&self, price: f64) -> f64 {
        self.side.direction() * (price - self.entry_price) / self.entry_price * 100.0
    }
}

/// Exit decided for an open position
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ExitPlan {
    pub reason: ExitReason,
    pub price: f64,
}

/// Owns the open-position book, at most one position per instrument
pub struct PositionManager {
    positions: HashMap<String, Position>,
    policy: RiskPolicy,
    transaction_cost: f64, // Per side
    total_pnl: f64,
    closed_trades: usize,
}

impl PositionManager {
    pub fn new(policy: RiskPolicy, transaction_cost: f64) -> Self {
        Self {
            positions: HashMap::new(),
            policy,
            transaction_cost,
            total_pnl: 0.0,
            closed_trades: 0,
        }
    }

    pub fn policy(&self) -> &RiskPolicy {
        &self.policy
    }

    pub fn transaction_cost(&self) -> f64 {
        self.transaction_cost
    }

    /// Get total realized P&L
    pub fn total_pnl(&self) -> f64 {
        self.total_pnl
    }

    pub fn closed_trades(&self) -> usize {
        self.closed_trades
    }

    /// Check if we have open position for instrument
    pub fn has_open_position(&self, instrument: &str) -> bool {
        self.positions.contains_key(instrument)
    }

    pub fn get_open_position(&self, instrument: &str) -> Option<&Position> {
        self.positions.get(instrument)
    }

    /// Get all open positions, ordered by instrument
    pub fn open_positions(&self) -> Vec<&Position> {
        let mut open: Vec<&Position> = self.positions.values().collect();
        open.sort_by(|a, b| a.instrument.cmp(&b.instrument));
        open
    }

    fn get_position_mut(&mut self, instrument: &str) -> anyhow::Result<&mut Position> {
        self.positions
            .get_mut(instrument)
            .ok_or_else(|| anyhow::anyhow!("No open position for {}", instrument))
    }

    /// Record a new position with precomputed risk levels
    pub fn open_position_at(
        &mut self,
        instrument: &str,
        side: Side,
        entry_price: f64,
        quantity: f64,
        levels: (f64, Option<f64>),
        timestamp: DateTime<Utc>,
    ) -> anyhow::Result<Uuid> {
        if self.has_open_position(instrument) {
            anyhow::bail!("Already have open position for {}", instrument);
        }

        let (stop_loss, take_profit) = levels;
        let id = Uuid::new_v4();
        self.positions.insert(
            instrument.to_string(),
            Position {
                id,
                instrument: instrument.to_string(),
                side,
                entry_price,
                quantity,
                entry_time: timestamp,
                stop_loss,
                take_profit,
                bars_held: 0,
                pending_exit: None,
                status: PositionStatus::Open,
                realized_pnl: None,
                exit_price: None,
                exit_time: None,
                exit_reason: None,
            },
        );

        Ok(id)
    }

    /// Ratchet the trailing stop toward price; returns the new stop when it moved
    ///
    /// Never loosens: a candidate stop behind the current one is ignored.
    pub fn update_trailing_stop(
        &mut self,
        instrument: &str,
        current_price: f64,
    ) -> anyhow::Result<Option<f64>> {
        let RiskPolicy::Trailing(cfg) = self.policy.clone() else {
            return Ok(None);
        };
        let position = self.get_position_mut(instrument)?;
        let dir = position.side.direction();

        if dir * (current_price - position.entry_price) < cfg.trigger {
            return Ok(None);
        }

        let candidate = current_price - dir * cfg.trail_offset;
        if dir * (candidate - position.stop_loss) > 0.0 {
            position.stop_loss = candidate;
            return Ok(Some(candidate));
        }

        Ok(None)
    }

    /// Check if position should exit at the current price
    ///
    /// Trailing stops are updated first, then the stop/target levels are checked.
    pub fn should_exit(
        &mut self,
        instrument: &str,
        current_price: f64,
    ) -> anyhow::Result<Option<ExitPlan>> {
        if let Some(stop) = self.update_trailing_stop(instrument, current_price)? {
            tracing::info!(instrument, stop, price = current_price, "Trailing stop raised");
        }

        let trailing = matches!(self.policy, RiskPolicy::Trailing(_));
        let position = self.get_position_mut(instrument)?;
        let dir = position.side.direction();

        if dir * (current_price - position.stop_loss) <= 0.0 {
            let reason = if trailing {
                ExitReason::TrailingStop
            } else {
                ExitReason::StopLoss
            };
            return Ok(Some(ExitPlan {
                reason,
                price: position.stop_loss,
            }));
        }

        if let Some(tp) = position.take_profit {
            if dir * (current_price - tp) >= 0.0 {
                return Ok(Some(ExitPlan {
                    reason: ExitReason::TakeProfit,
                    price: tp,
                }));
            }
        }

        Ok(None)
    }

    /// Count one more evaluated bar against an open position
    pub fn mark_bar(&mut self, instrument: &str) -> anyhow::Result<u32> {
        let position = self.get_position_mut(instrument)?;
        position.bars_held += 1;
        Ok(position.bars_held)
    }

    /// Remember that the exit order was not accepted so the next cycle retries it
    pub fn mark_exit_pending(&mut self, instrument: &str, reason: ExitReason) -> anyhow::Result<()> {
        self.get_position_mut(instrument)?.pending_exit = Some(reason);
        Ok(())
    }

    /// Realized P&L for closing `position` at `exit_price`, net of both sides' cost
    pub fn realized_pnl(&self, position: &Position, exit_price: f64) -> f64 {
        (exit_price - position.entry_price) * position.quantity * position.side.direction()
            - 2.0 * self.transaction_cost
    }

    /// Unrealized P&L for the open position, before costs
    pub fn calculate_pnl(&self, instrument: &str, current_price: f64) -> anyhow::Result<f64> {
        let position = self
            .get_open_position(instrument)
            .ok_or_else(|| anyhow::anyhow!("No open position for {}", instrument))?;
        Ok((current_price - position.entry_price) * position.quantity * position.side.direction())
    }

    /// Close and remove the position, returning it with exit fields filled in
    pub fn close_position_at(
        &mut self,
        instrument: &str,
        exit_price: f64,
        reason: ExitReason,
        timestamp: DateTime<Utc>,
    ) -> anyhow::Result<Position> {
        let mut position = self
            .positions
            .remove(instrument)
            .ok_or_else(|| anyhow::anyhow!("No open position for {}", instrument))?;

        let pnl = self.realized_pnl(&position, exit_price);
        position.status = PositionStatus::Closed;
        position.realized_pnl = Some(pnl);
        position.exit_price = Some(exit_price);
        position.exit_time = Some(timestamp);
        position.exit_reason = Some(reason);
        position.pending_exit = None;

        self.total_pnl += pnl;
        self.closed_trades += 1;

        Ok(position)
    }
}
