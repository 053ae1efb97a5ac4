use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Exchange wall clock (IST) ahead of UTC
pub const EXCHANGE_UTC_OFFSET_SECS: i64 = 5 * 3600 + 30 * 60;

/// Option contract type of a tradeable instrument
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "UPPERCASE")]
pub enum OptionType {
    Call,
    Put,
}

/// A tradeable instrument as listed in static configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Instrument {
    pub symbol: String,
    pub token: String, // Exchange token used by the broker API
    #[serde(default = "default_exchange")]
    pub exchange: String,
    #[serde(default)]
    pub strike: Option<f64>,
    #[serde(default)]
    pub option_type: Option<OptionType>,
}

fn default_exchange() -> String {
    "NFO".to_string()
}

impl Instrument {
    pub fn new(symbol: &str, token: &str) -> Self {
        Self {
            symbol: symbol.to_string(),
            token: token.to_string(),
            exchange: default_exchange(),
            strike: None,
            option_type: None,
        }
    }
}

/// OHLCV candlestick data
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Candle {
    pub timestamp: DateTime<Utc>,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

impl Candle {
    /// Finite, non-negative prices and volume with a consistent high/low range
    pub fn is_valid(&self) -> bool {
        let fields = [self.open, self.high, self.low, self.close, self.volume];
        fields.iter().all(|v| v.is_finite() && *v >= 0.0) && self.high >= self.low
    }
}

/// Candle interval understood by the broker API
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Interval {
    OneMinute,
    ThreeMinute,
    FiveMinute,
    FifteenMinute,
}

impl Interval {
    pub fn minutes(&self) -> i64 {
        match self {
            Interval::OneMinute => 1,
            Interval::ThreeMinute => 3,
            Interval::FiveMinute => 5,
            Interval::FifteenMinute => 15,
        }
    }

    pub fn as_api_str(&self) -> &'static str {
        match self {
            Interval::OneMinute => "ONE_MINUTE",
            Interval::ThreeMinute => "THREE_MINUTE",
            Interval::FiveMinute => "FIVE_MINUTE",
            Interval::FifteenMinute => "FIFTEEN_MINUTE",
        }
    }
}

/// Trading signal produced by a strategy
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum Signal {
    EnterLong,
    EnterShort,
    Hold,
}

/// Direction of an open position
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum Side {
    Long,
    Short,
}

impl Side {
    /// +1 for long, -1 for short; multiplies price deltas into P&L
    pub fn direction(&self) -> f64 {
        match self {
            Side::Long => 1.0,
            Side::Short => -1.0,
        }
    }

    pub fn entry_order(&self) -> OrderSide {
        match self {
            Side::Long => OrderSide::Buy,
            Side::Short => OrderSide::Sell,
        }
    }

    pub fn exit_order(&self) -> OrderSide {
        match self {
            Side::Long => OrderSide::Sell,
            Side::Short => OrderSide::Buy,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "UPPERCASE")]
pub enum OrderSide {
    Buy,
    Sell,
}

impl fmt::Display for OrderSide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OrderSide::Buy => write!(f, "BUY"),
            OrderSide::Sell => write!(f, "SELL"),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub enum OrderType {
    Market,
    Limit { price: f64 },
}

/// Request handed to an order gateway
#[derive(Debug, Clone, PartialEq)]
pub struct OrderRequest {
    pub instrument: Instrument,
    pub quantity: f64,
    pub side: OrderSide,
    pub order_type: OrderType,
}

/// Gateway answer: acceptance only, no fill confirmation
#[derive(Debug, Clone, PartialEq)]
pub enum OrderOutcome {
    Accepted { order_id: Option<String> },
    Rejected { reason: String },
}

impl OrderOutcome {
    pub fn is_accepted(&self) -> bool {
        matches!(self, OrderOutcome::Accepted { .. })
    }

}

/// Short-term sentiment label from the sentiment oracle
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
pub enum Sentiment {
    Positive,
    Negative,
    #[default]
    Neutral,
}

impl Sentiment {
    /// Parse a one-word model reply; anything unexpected is neutral
    pub fn from_reply(reply: &str) -> Self {
        match reply.trim().to_uppercase().as_str() {
            "POS" | "POSITIVE" => Sentiment::Positive,
            "NEG" | "NEGATIVE" => Sentiment::Negative,
            _ => Sentiment::Neutral,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_instrument_creation() {
        let instrument = Instrument::new("BANKNIFTY27MAR2551600CE", "59523");

        assert_eq!(instrument.symbol, "BANKNIFTY27MAR2551600CE");
        assert_eq!(instrument.exchange, "NFO");
        assert!(instrument.option_type.is_none());
    }

    #[test]
    fn test_candle_validity() {
        let mut candle = Candle {
            timestamp: Utc::now(),
            open: 100.0,
            high: 101.0,
            low: 99.0,
            close: 100.5,
            volume: 0.0,
        };
        assert!(candle.is_valid());

        candle.volume = -1.0;
        assert!(!candle.is_valid());

        candle.volume = 10.0;
        candle.close = f64::NAN;
        assert!(!candle.is_valid());
    }

    #[test]
    fn test_side_orders() {
        assert_eq!(Side::Long.entry_order(), OrderSide::Buy);
        assert_eq!(Side::Long.exit_order(), OrderSide::Sell);
        assert_eq!(Side::Short.entry_order(), OrderSide::Sell);
        assert_eq!(Side::Short.exit_order(), OrderSide::Buy);
        assert_eq!(Side::Short.direction(), -1.0);
    }

    #[test]
    fn test_sentiment_parsing() {
        assert_eq!(Sentiment::from_reply(" pos\n"), Sentiment::Positive);
        assert_eq!(Sentiment::from_reply("NEG"), Sentiment::Negative);
        assert_eq!(Sentiment::from_reply("NEU"), Sentiment::Neutral);
        assert_eq!(Sentiment::from_reply("I think it's bullish"), Sentiment::Neutral);
    }

    #[test]
    fn test_exchange_offset_is_ist() {
        let ist = DateTime::parse_from_rfc3339("2026-02-06T09:15:00+05:30").unwrap();
        assert_eq!(
            i64::from(ist.offset().local_minus_utc()),
            EXCHANGE_UTC_OFFSET_SECS
        );
    }

    #[test]
    fn test_interval_api_names() {
        assert_eq!(Interval::ThreeMinute.as_api_str(), "THREE_MINUTE");
        assert_eq!(Interval::FiveMinute.minutes(), 5);
    }
}
