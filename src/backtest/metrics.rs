use serde::{Deserialize, Serialize};

use crate::backtest::TradeRecord;

/// Summary statistics over a set of closed trades
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BacktestMetrics {
    // Trade Statistics
    pub total_trades: usize,
    pub winning_trades: usize,
    pub losing_trades: usize,
    pub win_rate: f64, // Percent

    // P&L
    pub total_pnl: f64,
    pub avg_pnl: f64,
    pub max_profit: f64,
    pub max_loss: f64,
    pub profit_factor: f64, // Gross wins / gross losses
    pub max_drawdown: f64,  // Peak-to-trough of cumulative P&L
    pub total_transaction_costs: f64,

    // Holding Period
    pub avg_holding_bars: f64,
    pub avg_holding_minutes: f64,
}

impl BacktestMetrics {
    /// Calculate metrics from trade records
    ///
    /// Break-even trades count as neither wins nor losses.
    pub fn from_trades(trades: &[TradeRecord]) -> Self {
        if trades.is_empty() {
            return Self::default();
        }

        let total_trades = trades.len();
        let pnls: Vec<f64> = trades.iter().map(|t| t.realized_pnl).collect();

        let winning_trades = pnls.iter().filter(|p| **p > 0.0).count();
        let losing_trades = pnls.iter().filter(|p| **p < 0.0).count();
        let win_rate = winning_trades as f64 / total_trades as f64 * 100.0;

        let total_pnl: f64 = pnls.iter().sum();
        let gross_wins: f64 = pnls.iter().filter(|p| **p > 0.0).sum();
        let gross_losses: f64 = pnls.iter().filter(|p| **p < 0.0).map(|p| -p).sum();

        let profit_factor = if gross_losses > 0.0 {
            gross_wins / gross_losses
        } else if gross_wins > 0.0 {
            f64::INFINITY
        } else {
            0.0
        };

        Self {
            total_trades,
            winning_trades,
            losing_trades,
            win_rate,
            total_pnl,
            avg_pnl: total_pnl / total_trades as f64,
            max_profit: pnls.iter().copied().fold(f64::NEG_INFINITY, f64::max),
            max_loss: pnls.iter().copied().fold(f64::INFINITY, f64::min),
            profit_factor,
            max_drawdown: Self::calculate_drawdown(&pnls),
            total_transaction_costs: trades.iter().map(|t| t.transaction_cost).sum(),
            avg_holding_bars: trades.iter().map(|t| t.holding_bars as f64).sum::<f64>()
                / total_trades as f64,
            avg_holding_minutes: trades.iter().map(|t| t.holding_minutes as f64).sum::<f64>()
                / total_trades as f64,
        }
    }

    /// Largest drop of cumulative P&L from its running peak
    fn calculate_drawdown(pnls: &[f64]) -> f64 {
        let mut peak = 0.0_f64;
        let mut cumulative = 0.0;
        let mut max_dd = 0.0;

        for pnl in pnls {
            cumulative += pnl;
            peak = peak.max(cumulative);
            max_dd = f64::max(max_dd, peak - cumulative);
        }

        max_dd
    }

    /// Print a formatted report to stdout
    pub fn print_report(&self, label: &str) {
        println!("\n{}", "=".repeat(70));
        println!("BACKTEST SUMMARY - {}", label);
        println!("{}", "=".repeat(70));

        if self.total_trades == 0 {
            println!("No trades executed");
            return;
        }

        println!("Total Trades:      {}", self.total_trades);
        println!("Winning Trades:    {}", self.winning_trades);
        println!("Losing Trades:     {}", self.losing_trades);
        println!("Win Rate:          {:.2}%", self.win_rate);
        println!();
        println!("Total P&L:         ₹{:.2}", self.total_pnl);
        println!("Average P&L:       ₹{:.2}", self.avg_pnl);
        println!("Max Profit:        ₹{:.2}", self.max_profit);
        println!("Max Loss:          ₹{:.2}", self.max_loss);
        println!("Profit Factor:     {:.2}", self.profit_factor);
        println!("Max Drawdown:      ₹{:.2}", self.max_drawdown);
        println!("Costs Paid:        ₹{:.2}", self.total_transaction_costs);
        println!(
            "Avg Holding:       {:.1} bars ({:.0} min)",
            self.avg_holding_bars, self.avg_holding_minutes
        );
        println!("{}", "=".repeat(70));
    }

    /// Print every trade's entry, exit, P&L and duration
    pub fn print_trades(trades: &[TradeRecord]) {
        if trades.is_empty() {
            return;
        }
        println!("Detailed Trades:");
        for (idx, trade) in trades.iter().enumerate() {
            println!("\nTrade {}:", idx + 1);
            println!("{}", trade);
        }
    }
}
