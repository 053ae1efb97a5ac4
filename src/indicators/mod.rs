// Technical indicators module
// Implements RSI, MACD/EMA, ATR, ADX and VWAP over candle windows

pub mod adx;
pub mod atr;
pub mod macd;
pub mod moving_average;
pub mod rsi;
pub mod snapshot;
pub mod vwap;

pub use adx::calculate_adx;
pub use atr::{calculate_atr, true_ranges};
pub use macd::{calculate_macd, MacdReading};
pub use moving_average::{calculate_ema, calculate_sma, ema_series};
pub use rsi::calculate_rsi;
pub use snapshot::{IndicatorConfig, IndicatorSnapshot};
pub use vwap::calculate_vwap;
