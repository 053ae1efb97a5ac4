/// Calculate Relative Strength Index (RSI)
///
/// RSI measures the magnitude of recent price changes to evaluate
/// overbought or oversold conditions. Gains and losses are plain rolling
/// means over the last `period` close-to-close deltas (no re-smoothing).
///
/// Values:
/// - RSI > 70: Overbought
/// - RSI < 30: Oversold
///
/// A window with no losing delta reads 100. A completely flat window has
/// neither gains nor losses, so RSI is undefined there.
pub fn calculate_rsi(prices: &[f64], period: usize) -> Option<f64> {
    if period == 0 || prices.len() < period + 1 {
        return None;
    }

    let recent = &prices[prices.len() - period - 1..];

    let mut gain_sum = 0.0;
    let mut loss_sum = 0.0;
    for pair in recent.windows(2) {
        let change = pair[1] - pair[0];
        if change > 0.0 {
            gain_sum += change;
        } else {
            loss_sum += change.abs();
        }
    }

    let avg_gain = gain_sum / period as f64;
    let avg_loss = loss_sum / period as f64;

    if avg_loss == 0.0 {
        if avg_gain == 0.0 {
            return None;
        }
        return Some(100.0);
    }

    let rs = avg_gain / avg_loss;
    let rsi = 100.0 - (100.0 / (1.0 + rs));

    Some(rsi)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_rsi_calculation() {
        // Test with known values
        let prices = vec![
            44.0, 44.25, 44.5, 43.75, 44.0, 44.5, 45.0, 45.5, 45.25, 45.5, 46.0, 46.5, 46.25, 46.0,
            46.5,
        ];

        let rsi = calculate_rsi(&prices, 14);
        assert!(rsi.is_some());

        let rsi_value = rsi.unwrap();
        assert!(rsi_value > 0.0 && rsi_value < 100.0);
    }

    #[test]
    fn test_rsi_hand_computed() {
        // Deltas: +2, -1, +2, -1 -> avg gain 1.0, avg loss 0.5, RS 2
        let prices = vec![10.0, 12.0, 11.0, 13.0, 12.0];
        let rsi = calculate_rsi(&prices, 4).unwrap();
        assert_relative_eq!(rsi, 100.0 - 100.0 / 3.0, epsilon = 1e-9);
    }

    #[test]
    fn test_rsi_uses_only_trailing_period() {
        // Early crash must not leak into a 3-period RSI
        let prices = vec![200.0, 100.0, 101.0, 102.0, 103.0];
        assert_eq!(calculate_rsi(&prices, 3), Some(100.0));
    }

    #[test]
    fn test_rsi_insufficient_data() {
        let prices = vec![100.0, 102.0, 101.0];
        let rsi = calculate_rsi(&prices, 14);
        assert!(rsi.is_none());
    }

    #[test]
    fn test_rsi_all_gains() {
        let prices = vec![100.0, 101.0, 102.0, 103.0, 104.0, 105.0];
        let rsi = calculate_rsi(&prices, 5);
        assert!(rsi.is_some());
        assert_eq!(rsi.unwrap(), 100.0); // All gains = RSI 100
    }

    #[test]
    fn test_rsi_flat_window_is_undefined() {
        let prices = vec![100.0; 20];
        assert_eq!(calculate_rsi(&prices, 14), None);

        // A move outside the trailing window does not count
        let mut prices = vec![90.0];
        prices.extend(std::iter::repeat(100.0).take(15));
        assert_eq!(calculate_rsi(&prices, 14), None);
    }

    #[test]
    fn test_rsi_all_losses() {
        let prices = vec![105.0, 104.0, 103.0, 102.0, 101.0, 100.0];
        assert_eq!(calculate_rsi(&prices, 5), Some(0.0));
    }
}
