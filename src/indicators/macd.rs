/// Moving Average Convergence Divergence (MACD)
///
/// MACD line = EMA(close, fast) - EMA(close, slow)
/// Signal line = EMA(MACD line, signal)
///
/// All EMAs are seeded with the first value of their input and carry no bias
/// adjustment (see `ema_series`).
use super::moving_average::ema_series;

/// Latest MACD reading together with the two EMAs it is built from
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MacdReading {
    pub macd: f64,
    pub signal: f64,
    pub ema_fast: f64,
    pub ema_slow: f64,
}

impl MacdReading {
    pub fn histogram(&self) -> f64 {
        self.macd - self.signal
    }
}

/// Calculate MACD at the last close
///
/// Returns None until the window holds at least `slow` closes.
pub fn calculate_macd(
    prices: &[f64],
    fast: usize,
    slow: usize,
    signal: usize,
) -> Option<MacdReading> {
    if fast == 0 || slow == 0 || signal == 0 || prices.len() < slow.max(fast) {
        return None;
    }

    let ema_fast = ema_series(prices, fast);
    let ema_slow = ema_series(prices, slow);

    let macd_line: Vec<f64> = ema_fast
        .iter()
        .zip(ema_slow.iter())
        .map(|(f, s)| f - s)
        .collect();
    let signal_line = ema_series(&macd_line, signal);

    Some(MacdReading {
        macd: *macd_line.last()?,
        signal: *signal_line.last()?,
        ema_fast: *ema_fast.last()?,
        ema_slow: *ema_slow.last()?,
    })
}
