use crate::models::Candle;

/// Volume-weighted average close over the most recent `lookback` candles
///
/// Uses whatever is available when the window is shorter than `lookback`.
/// Returns None when the candles carry no volume.
pub fn calculate_vwap(candles: &[Candle], lookback: usize) -> Option<f64> {
    if candles.is_empty() || lookback == 0 {
        return None;
    }

    let start = candles.len().saturating_sub(lookback);
    let (price_volume, volume) = candles[start..]
        .iter()
        .fold((0.0, 0.0), |(pv, v), c| (pv + c.close * c.volume, v + c.volume));

    if volume > 0.0 {
        Some(price_volume / volume)
    } else {
        None
    }
}
