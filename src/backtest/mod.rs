// Backtesting module: replay fold, trade ledger and stored/synthetic candle sources
pub mod csv_source;
pub mod ledger;
pub mod metrics;
pub mod runner;
pub mod synthetic;

pub use csv_source::{load_candle_series, parse_timestamp};
pub use ledger::{LedgerWriter, TradeLedger, TradeRecord};
pub use metrics::BacktestMetrics;
pub use runner::{BacktestResult, BacktestRunner};
pub use synthetic::{MarketScenario, SyntheticDataGenerator};
