use crate::models::Candle;
use chrono::{DateTime, Duration, TimeZone, Utc};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Market scenario types for synthetic data generation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MarketScenario {
    /// Steady climb with light noise
    Uptrend,
    /// Steady decline with light noise
    Downtrend,
    /// Mean-reverting chop around the base price
    Sideways,
    /// Flat, then a single rally, then a retrace below the rally's high
    Swing,
    /// Large random moves
    Volatile,
}

impl std::str::FromStr for MarketScenario {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "uptrend" => Ok(MarketScenario::Uptrend),
            "downtrend" => Ok(MarketScenario::Downtrend),
            "sideways" => Ok(MarketScenario::Sideways),
            "swing" => Ok(MarketScenario::Swing),
            "volatile" => Ok(MarketScenario::Volatile),
            other => Err(format!("unknown scenario '{}'", other)),
        }
    }
}

/// Generates seeded, reproducible option-premium candles
pub struct SyntheticDataGenerator {
    rng: StdRng,
    base_price: f64,
    base_volume: f64,
    start_time: DateTime<Utc>,
}

impl SyntheticDataGenerator {
    /// Create a new generator with a seed for reproducibility
    pub fn new(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
            base_price: 100.0,
            base_volume: 5_000.0,
            // 09:15 IST session open
            start_time: Utc.with_ymd_and_hms(2026, 2, 6, 3, 45, 0).single().unwrap_or_default(),
        }
    }

    pub fn with_base_price(mut self, base_price: f64) -> Self {
        self.base_price = base_price;
        self
    }

    /// Generate candles for a specific market scenario
    pub fn generate(
        &mut self,
        scenario: MarketScenario,
        num_candles: usize,
        interval_minutes: i64,
    ) -> Vec<Candle> {
        let mut price = self.base_price;
        let mut candles = Vec::with_capacity(num_candles);

        for i in 0..num_candles {
            let timestamp = self.start_time + Duration::minutes(i as i64 * interval_minutes);
            price = self.next_price(scenario, price, i, num_candles);
            candles.push(self.create_candle(price, timestamp));
        }

        candles
    }

    fn next_price(&mut self, scenario: MarketScenario, price: f64, i: usize, n: usize) -> f64 {
        let next = match scenario {
            MarketScenario::Uptrend => price * (1.0 + 0.004 + self.rng.gen_range(-0.002..0.002)),
            MarketScenario::Downtrend => {
                price * (1.0 - 0.004 + self.rng.gen_range(-0.002..0.002))
            }
            MarketScenario::Sideways => {
                // 10% pull back to the mean plus noise
                let reversion = (self.base_price - price) * 0.1;
                price + reversion + price * self.rng.gen_range(-0.01..0.01)
            }
            MarketScenario::Swing => {
                let noise = price * self.rng.gen_range(-0.001..0.001);
                if i < n / 3 {
                    self.base_price + noise
                } else if i < 2 * n / 3 {
                    price + self.base_price * 0.01 + noise
                } else {
                    price - self.base_price * 0.015 + noise
                }
            }
            MarketScenario::Volatile => price * (1.0 + self.rng.gen_range(-0.05..0.05)),
        };

        // Premiums never go to zero
        next.max(self.base_price * 0.05)
    }

    /// Helper to create a candle from price and timestamp
    fn create_candle(&mut self, price: f64, timestamp: DateTime<Utc>) -> Candle {
        let noise_pct = 0.003; // ±0.3% intrabar movement

        let high = price * (1.0 + self.rng.gen_range(0.0..noise_pct));
        let low = price * (1.0 - self.rng.gen_range(0.0..noise_pct));
        let open = (price * (1.0 + self.rng.gen_range(-noise_pct..noise_pct))).clamp(low, high);
        let volume = (self.base_volume * self.rng.gen_range(0.7..1.3)).round();

        Candle {
            timestamp,
            open,
            high,
            low,
            close: price,
            volume,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_uptrend() {
        let mut gen = SyntheticDataGenerator::new(42);
        let candles = gen.generate(MarketScenario::Uptrend, 200, 3);

        assert_eq!(candles.len(), 200);
        let first = candles.first().unwrap().close;
        let last = candles.last().unwrap().close;
        assert!(last > first, "Uptrend should end higher: {} -> {}", first, last);
    }

    #[test]
    fn test_generate_downtrend() {
        let mut gen = SyntheticDataGenerator::new(42);
        let candles = gen.generate(MarketScenario::Downtrend, 200, 3);

        let first = candles.first().unwrap().close;
        let last = candles.last().unwrap().close;
        assert!(last < first, "Downtrend should end lower: {} -> {}", first, last);
    }

    #[test]
    fn test_generate_sideways() {
        let base = 250.0;
        let mut gen = SyntheticDataGenerator::new(42).with_base_price(base);
        let candles = gen.generate(MarketScenario::Sideways, 300, 3);

        for candle in &candles {
            assert!(
                candle.close > base * 0.85 && candle.close < base * 1.15,
                "Sideways should stay near base: {} vs {}",
                candle.close,
                base
            );
        }
    }

    #[test]
    fn test_scenario_names() {
        assert_eq!("swing".parse::<MarketScenario>(), Ok(MarketScenario::Swing));
        assert_eq!("Uptrend".parse::<MarketScenario>(), Ok(MarketScenario::Uptrend));
        assert!("crash".parse::<MarketScenario>().is_err());
    }

    #[test]
    fn test_swing_peaks_in_middle() {
        let mut gen = SyntheticDataGenerator::new(7);
        let candles = gen.generate(MarketScenario::Swing, 90, 3);

        let peak = candles
            .iter()
            .enumerate()
            .max_by(|a, b| a.1.close.total_cmp(&b.1.close))
            .map(|(i, _)| i)
            .unwrap();
        assert!((55..=62).contains(&peak), "peak at {}", peak);
    }

    #[test]
    fn test_same_seed_same_series() {
        let a = SyntheticDataGenerator::new(99).generate(MarketScenario::Volatile, 50, 1);
        let b = SyntheticDataGenerator::new(99).generate(MarketScenario::Volatile, 50, 1);
        assert_eq!(a, b);
    }

    #[test]
    fn test_ohlc_consistency() {
        let mut gen = SyntheticDataGenerator::new(42);
        let candles = gen.generate(MarketScenario::Volatile, 100, 5);

        for candle in &candles {
            assert!(candle.is_valid());
            assert!(candle.high >= candle.close, "High should be >= close");
            assert!(candle.high >= candle.open, "High should be >= open");
            assert!(candle.low <= candle.close, "Low should be <= close");
            assert!(candle.low <= candle.open, "Low should be <= open");
        }
    }

    #[test]
    fn test_timestamps_are_sequential() {
        let mut gen = SyntheticDataGenerator::new(42);
        let candles = gen.generate(MarketScenario::Uptrend, 100, 5);

        for pair in candles.windows(2) {
            assert_eq!((pair[1].timestamp - pair[0].timestamp).num_minutes(), 5);
        }
    }
}
