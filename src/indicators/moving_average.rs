/// Calculate Simple Moving Average (SMA) of the last `period` values
pub fn calculate_sma(values: &[f64], period: usize) -> Option<f64> {
    if period == 0 || values.len() < period {
        return None;
    }

    let sum: f64 = values.iter().rev().take(period).sum();
    Some(sum / period as f64)
}

/// Exponential moving average series for a span
///
/// Weighting is `alpha = 2 / (span + 1)`, seeded with the first value and
/// without bias adjustment, so `ema[0] == values[0]`.
pub fn ema_series(values: &[f64], span: usize) -> Vec<f64> {
    let mut series = Vec::with_capacity(values.len());
    let Some(&first) = values.first() else {
        return series;
    };

    let alpha = 2.0 / (span as f64 + 1.0);
    let mut ema = first;
    series.push(ema);

    for value in &values[1..] {
        ema = alpha * value + (1.0 - alpha) * ema;
        series.push(ema);
    }

    series
}

/// Calculate Exponential Moving Average (EMA) at the last value
///
/// Undefined until the window holds at least `span` values.
pub fn calculate_ema(values: &[f64], span: usize) -> Option<f64> {
    if span == 0 || values.len() < span {
        return None;
    }

    ema_series(values, span).last().copied()
}

/// Rolling mean over a series of optional values
///
/// Element `i` is defined only when the `period` values ending at `i` are all
/// defined.
pub(crate) fn rolling_mean(values: &[Option<f64>], period: usize) -> Vec<Option<f64>> {
    if period == 0 {
        return vec![None; values.len()];
    }

    values
        .iter()
        .enumerate()
        .map(|(i, _)| {
            if i + 1 < period {
                return None;
            }
            let window = &values[i + 1 - period..=i];
            let sum = window.iter().copied().sum::<Option<f64>>()?;
            Some(sum / period as f64)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_sma() {
        let prices = vec![100.0, 102.0, 104.0, 106.0, 108.0];
        let sma = calculate_sma(&prices, 5);
        assert_eq!(sma, Some(104.0));
    }

    #[test]
    fn test_sma_insufficient_data() {
        let prices = vec![100.0, 102.0];
        let sma = calculate_sma(&prices, 5);
        assert!(sma.is_none());
    }

    #[test]
    fn test_ema_seeded_with_first_value() {
        let prices = vec![10.0, 20.0, 30.0];
        let series = ema_series(&prices, 3);

        // alpha = 0.5
        assert_eq!(series[0], 10.0);
        assert_relative_eq!(series[1], 15.0);
        assert_relative_eq!(series[2], 22.5);
    }

    #[test]
    fn test_ema() {
        let prices = vec![100.0, 102.0, 104.0, 106.0, 108.0, 110.0];
        let ema = calculate_ema(&prices, 5);
        assert!(ema.is_some());
        // Lags a rising series
        assert!(ema.unwrap() < 110.0);
        assert!(ema.unwrap() > 100.0);

        assert!(calculate_ema(&prices, 7).is_none());
    }

    #[test]
    fn test_rolling_mean_propagates_gaps() {
        let values = vec![None, Some(2.0), Some(4.0), Some(6.0)];
        let means = rolling_mean(&values, 2);

        assert_eq!(means, vec![None, None, Some(3.0), Some(5.0)]);
    }
}
