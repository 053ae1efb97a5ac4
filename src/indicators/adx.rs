/// Average Directional Index (ADX) - Measures trend strength
///
/// ADX ranges from 0 to 100:
/// - ADX > 25: Strong trend (bull or bear)
/// - ADX 20-25: Moderate trend
/// - ADX < 20: Weak trend / choppy / ranging market
///
/// Also returns +DI and -DI to determine trend direction:
/// - +DI > -DI: Uptrend
/// - -DI > +DI: Downtrend
///
/// Smoothing uses plain rolling means of TR, +DM, -DM and DX rather than
/// Wilder's recursive formula. Trade history was produced with this variant,
/// so the numbers must stay comparable.
use super::atr::true_ranges;
use super::moving_average::rolling_mean;
use crate::models::Candle;

/// Calculate ADX, +DI, and -DI for trend strength and direction
///
/// Returns (adx, plus_di, minus_di) or None if insufficient data or if any DX
/// inside the final window is undefined (+DI and -DI both zero)
pub fn calculate_adx(candles: &[Candle], period: usize) -> Option<(f64, f64, f64)> {
    // TR/DM start at the second candle, then DI and DX each need a full period
    if period == 0 || candles.len() < 2 * period {
        return None;
    }

    // Step 1: True Range (TR) and Directional Movement (+DM, -DM)
    let trs: Vec<Option<f64>> = true_ranges(candles).into_iter().map(Some).collect();
    let mut plus_dms = Vec::with_capacity(trs.len());
    let mut minus_dms = Vec::with_capacity(trs.len());

    for pair in candles.windows(2) {
        let up_move = pair[1].high - pair[0].high;
        let down_move = pair[0].low - pair[1].low;

        let plus_dm = if up_move > down_move && up_move > 0.0 {
            up_move
        } else {
            0.0
        };

        let minus_dm = if down_move > up_move && down_move > 0.0 {
            down_move
        } else {
            0.0
        };

        plus_dms.push(Some(plus_dm));
        minus_dms.push(Some(minus_dm));
    }

    // Step 2: Smooth TR and DM with rolling means
    let smoothed_tr = rolling_mean(&trs, period);
    let smoothed_plus_dm = rolling_mean(&plus_dms, period);
    let smoothed_minus_dm = rolling_mean(&minus_dms, period);

    // Step 3: +DI, -DI and DX per bar
    let mut plus_dis = Vec::with_capacity(trs.len());
    let mut minus_dis = Vec::with_capacity(trs.len());
    let mut dxs = Vec::with_capacity(trs.len());

    for i in 0..trs.len() {
        let di = match (smoothed_tr[i], smoothed_plus_dm[i], smoothed_minus_dm[i]) {
            (Some(tr), Some(pdm), Some(mdm)) if tr > 0.0 => {
                Some((100.0 * pdm / tr, 100.0 * mdm / tr))
            }
            _ => None,
        };

        let dx = di.and_then(|(plus_di, minus_di)| {
            let di_sum = plus_di + minus_di;
            if di_sum > 0.0 {
                Some(100.0 * (plus_di - minus_di).abs() / di_sum)
            } else {
                None
            }
        });

        plus_dis.push(di.map(|d| d.0));
        minus_dis.push(di.map(|d| d.1));
        dxs.push(dx);
    }

    // Step 4: ADX is the rolling mean of DX
    let adx = *rolling_mean(&dxs, period).last()?;

    Some((adx?, (*plus_dis.last()?)?, (*minus_dis.last()?)?))
}
