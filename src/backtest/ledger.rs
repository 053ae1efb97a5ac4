use chrono::{DateTime, Duration, Utc};
use csv::WriterBuilder;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};

use crate::execution::{ExitReason, Position};
use crate::models::{Side, EXCHANGE_UTC_OFFSET_SECS};
use crate::Result;

/// Record of a single closed trade
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradeRecord {
    pub instrument: String,
    pub side: Side,
    pub entry_time: DateTime<Utc>,
    pub exit_time: DateTime<Utc>,
    pub entry_price: f64,
    pub exit_price: f64,
    pub quantity: f64,
    pub realized_pnl: f64, // Net of both sides' transaction cost
    pub pnl_pct: f64,
    pub holding_bars: u32,
    pub holding_minutes: i64,
    pub exit_reason: ExitReason,
    pub transaction_cost: f64, // Entry + exit
}

impl TradeRecord {
    /// Build from a closed position; `None` while the position is still open
    pub fn from_position(position: &Position, cost_per_side: f64) -> Option<Self> {
        let (Some(exit_price), Some(exit_time), Some(realized_pnl), Some(exit_reason)) = (
            position.exit_price,
            position.exit_time,
            position.realized_pnl,
            position.exit_reason,
        ) else {
            return None;
        };

        Some(Self {
            instrument: position.instrument.clone(),
            side: position.side,
            entry_time: position.entry_time,
            exit_time,
            entry_price: position.entry_price,
            exit_price,
            quantity: position.quantity,
            realized_pnl,
            pnl_pct: position.pnl_pct(exit_price),
            holding_bars: position.bars_held,
            holding_minutes: (exit_time - position.entry_time).num_minutes(),
            exit_reason,
            transaction_cost: 2.0 * cost_per_side,
        })
    }
}

fn exchange_time(time: DateTime<Utc>) -> String {
    (time + Duration::seconds(EXCHANGE_UTC_OFFSET_SECS))
        .format("%Y-%m-%d %H:%M")
        .to_string()
}

/// Per-trade detail block, times in exchange-local wall clock
impl fmt::Display for TradeRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "  Entry: {} @ ₹{:.2} ({:?})",
            exchange_time(self.entry_time),
            self.entry_price,
            self.side
        )?;
        writeln!(
            f,
            "  Exit:  {} @ ₹{:.2} ({:?})",
            exchange_time(self.exit_time),
            self.exit_price,
            self.exit_reason
        )?;
        writeln!(f, "  P&L:   ₹{:.2} ({:.2}%)", self.realized_pnl, self.pnl_pct)?;
        write!(f, "  Duration: {} candles", self.holding_bars)
    }
}

/// In-memory trade accumulator; the order gateway of a replay
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TradeLedger {
    trades: Vec<TradeRecord>,
}

impl TradeLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, trade: TradeRecord) {
        self.trades.push(trade);
    }

    pub fn trades(&self) -> &[TradeRecord] {
        &self.trades
    }

    pub fn len(&self) -> usize {
        self.trades.len()
    }

    pub fn is_empty(&self) -> bool {
        self.trades.is_empty()
    }

    pub fn total_pnl(&self) -> f64 {
        self.trades.iter().map(|t| t.realized_pnl).sum()
    }

    pub fn into_trades(self) -> Vec<TradeRecord> {
        self.trades
    }
}

/// Append-only CSV trade ledger on disk
///
/// The header row is written only when the file is new or empty, so
/// successive runs keep appending to the same table.
pub struct LedgerWriter {
    writer: csv::Writer<File>,
    path: PathBuf,
    written: usize,
}

impl LedgerWriter {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let has_content = std::fs::metadata(&path)
            .map(|m| m.len() > 0)
            .unwrap_or(false);

        let file = OpenOptions::new().create(true).append(true).open(&path)?;
        let writer = WriterBuilder::new()
            .has_headers(!has_content)
            .from_writer(file);

        Ok(Self {
            writer,
            path,
            written: 0,
        })
    }

    pub fn append(&mut self, trade: &TradeRecord) -> Result<()> {
        self.writer.serialize(trade)?;
        self.writer.flush()?;
        self.written += 1;
        Ok(())
    }

    pub fn append_all(&mut self, trades: &[TradeRecord]) -> Result<()> {
        trades.iter().try_for_each(|t| self.append(t))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Rows appended through this writer
    pub fn written(&self) -> usize {
        self.written
    }

    /// Read every trade back from a ledger file
    pub fn read_all(path: impl AsRef<Path>) -> Result<Vec<TradeRecord>> {
        let mut reader = csv::Reader::from_path(path)?;
        let trades = reader
            .deserialize()
            .collect::<std::result::Result<Vec<TradeRecord>, csv::Error>>()?;
        Ok(trades)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::execution::{PositionManager, RiskPolicy, TrailingConfig};
    use chrono::Duration;

    fn closed_trade(exit_price: f64) -> TradeRecord {
        let mut pm = PositionManager::new(RiskPolicy::Trailing(TrailingConfig::default()), 90.0);
        let entry_time = DateTime::parse_from_rfc3339("2026-02-06T09:15:00+05:30")
            .unwrap()
            .with_timezone(&Utc);
        pm.open_position_at("NIFTY10FEB2625950CE", Side::Long, 100.0, 100.0, (95.0, None), entry_time)
            .unwrap();
        pm.mark_bar("NIFTY10FEB2625950CE").unwrap();
        pm.mark_bar("NIFTY10FEB2625950CE").unwrap();

        let closed = pm
            .close_position_at(
                "NIFTY10FEB2625950CE",
                exit_price,
                ExitReason::TrailingStop,
                entry_time + Duration::minutes(6),
            )
            .unwrap();
        TradeRecord::from_position(&closed, 90.0).unwrap()
    }

    #[test]
    fn test_trade_record_from_position() {
        let trade = closed_trade(104.5);

        // 4.5 * 100 - 180
        assert_eq!(trade.realized_pnl, 270.0);
        assert!((trade.pnl_pct - 4.5).abs() < 1e-9);
        assert_eq!(trade.holding_bars, 2);
        assert_eq!(trade.holding_minutes, 6);
        assert_eq!(trade.transaction_cost, 180.0);
    }

    #[test]
    fn test_trade_detail_block() {
        let trade = closed_trade(104.5);
        let detail = trade.to_string();
        let lines: Vec<&str> = detail.lines().collect();

        assert_eq!(lines.len(), 4);
        assert_eq!(lines[0], "  Entry: 2026-02-06 09:15 @ ₹100.00 (Long)");
        assert_eq!(lines[1], "  Exit:  2026-02-06 09:21 @ ₹104.50 (TrailingStop)");
        assert_eq!(lines[2], "  P&L:   ₹270.00 (4.50%)");
        assert_eq!(lines[3], "  Duration: 2 candles");
    }

    #[test]
    fn test_open_position_has_no_record() {
        let mut pm = PositionManager::new(RiskPolicy::Trailing(TrailingConfig::default()), 0.0);
        pm.open_position_at("NIFTY", Side::Long, 100.0, 1.0, (95.0, None), Utc::now())
            .unwrap();
        let open = pm.get_open_position("NIFTY").unwrap();
        assert!(TradeRecord::from_position(open, 0.0).is_none());
    }

    #[test]
    fn test_ledger_totals() {
        let mut ledger = TradeLedger::new();
        assert!(ledger.is_empty());

        ledger.record(closed_trade(104.5));
        ledger.record(closed_trade(99.0));

        assert_eq!(ledger.len(), 2);
        // 270 + (-100 - 180)
        assert_eq!(ledger.total_pnl(), -10.0);
    }

    #[test]
    fn test_writer_appends_across_opens() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ledger.csv");

        let mut writer = LedgerWriter::open(&path).unwrap();
        writer.append(&closed_trade(104.5)).unwrap();
        drop(writer);

        let mut writer = LedgerWriter::open(&path).unwrap();
        writer
            .append_all(&[closed_trade(99.0), closed_trade(101.0)])
            .unwrap();
        assert_eq!(writer.written(), 2);
        drop(writer);

        let contents = std::fs::read_to_string(&path).unwrap();
        assert_eq!(contents.matches("instrument,side").count(), 1, "header written once");

        let trades = LedgerWriter::read_all(&path).unwrap();
        assert_eq!(trades.len(), 3);
        assert_eq!(trades[0], closed_trade(104.5));
        assert_eq!(trades[1].exit_reason, ExitReason::TrailingStop);
    }
}
