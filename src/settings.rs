use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use crate::error::BotError;
use crate::execution::{BracketConfig, DriverConfig, RiskPolicy, TrailingConfig};
use crate::indicators::IndicatorConfig;
use crate::models::{Instrument, Interval};
use crate::strategy::{
    BreakoutConfig, MomentumScalpStrategy, ScalpConfig, Strategy, StrategyKind,
    TrendBreakoutStrategy,
};
use crate::Result;

pub const DEFAULT_CONFIG_FILE: &str = "scalpbot.toml";
pub const ENV_PREFIX: &str = "SCALPBOT";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct BrokerSettings {
    pub base_url: String,
    pub api_key: String,
    pub client_code: String,
    pub password: String,
    pub totp: String, // Current one-time code, supplied through the environment
    pub local_ip: String,
    pub public_ip: String,
    pub mac_address: String,
}

impl Default for BrokerSettings {
    fn default() -> Self {
        Self {
            base_url: "https://apiconnect.angelbroking.com".to_string(),
            api_key: String::new(),
            client_code: String::new(),
            password: String::new(),
            totp: String::new(),
            local_ip: "127.0.0.1".to_string(),
            public_ip: "127.0.0.1".to_string(),
            mac_address: "00:00:00:00:00:00".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SentimentSettings {
    pub enabled: bool,
    pub base_url: String,
    pub api_key: String,
    pub model: String,
    pub veto_conflicting: bool,
}

impl Default for SentimentSettings {
    fn default() -> Self {
        Self {
            enabled: false,
            base_url: "https://generativelanguage.googleapis.com".to_string(),
            api_key: String::new(),
            model: "gemini-1.5-flash".to_string(),
            veto_conflicting: true,
        }
    }
}

/// Static configuration for the live bot and the backtester
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Settings {
    pub instruments: Vec<Instrument>,
    pub lot_size: f64,
    pub strategy: StrategyKind,
    pub interval: Interval,
    pub history_days: i64,
    pub indicators: IndicatorConfig,
    pub scalp: ScalpConfig,
    pub breakout: BreakoutConfig,
    pub bracket: BracketConfig,
    pub trailing: TrailingConfig,
    pub transaction_cost: f64, // Per side
    pub poll_interval_secs: u64,
    pub error_backoff_secs: u64,
    pub broker: BrokerSettings,
    pub sentiment: SentimentSettings,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            instruments: Vec::new(),
            lot_size: 30.0,
            strategy: StrategyKind::MomentumScalp,
            interval: Interval::OneMinute,
            history_days: 1,
            indicators: IndicatorConfig::default(),
            scalp: ScalpConfig::default(),
            breakout: BreakoutConfig::default(),
            bracket: BracketConfig::default(),
            trailing: TrailingConfig::default(),
            transaction_cost: 0.0,
            poll_interval_secs: 5,
            error_backoff_secs: 2,
            broker: BrokerSettings::default(),
            sentiment: SentimentSettings::default(),
        }
    }
}

impl Settings {
    /// Load from an optional TOML file, then `SCALPBOT__*` environment overrides
    ///
    /// An explicit `path` must exist; the default file is optional.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let file = match path {
            Some(p) => ::config::File::from(p).required(true),
            None => ::config::File::with_name(DEFAULT_CONFIG_FILE).required(false),
        };

        let settings: Settings = ::config::Config::builder()
            .add_source(file)
            .add_source(
                ::config::Environment::with_prefix(ENV_PREFIX)
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()?;

        settings.validate()?;
        Ok(settings)
    }

    /// Reject values the engine cannot run with
    pub fn validate(&self) -> Result<()> {
        let ind = &self.indicators;
        let periods = [
            ("indicators.rsi_period", ind.rsi_period),
            ("indicators.atr_period", ind.atr_period),
            ("indicators.adx_period", ind.adx_period),
            ("indicators.ema_fast", ind.ema_fast),
            ("indicators.ema_slow", ind.ema_slow),
            ("indicators.macd_signal", ind.macd_signal),
            ("indicators.vwap_lookback", ind.vwap_lookback),
            ("breakout.ema_fast", self.breakout.ema_fast),
            ("breakout.ema_slow", self.breakout.ema_slow),
            ("breakout.adx_period", self.breakout.adx_period),
        ];
        if let Some((name, _)) = periods.iter().find(|(_, p)| *p == 0) {
            return Err(BotError::Config(format!("{} must be positive", name)));
        }

        let ema_pairs = [
            ("indicators", ind.ema_fast, ind.ema_slow),
            ("breakout", self.breakout.ema_fast, self.breakout.ema_slow),
        ];
        if let Some((section, _, _)) = ema_pairs.iter().find(|(_, fast, slow)| fast >= slow) {
            return Err(BotError::Config(format!(
                "{}.ema_fast must be shorter than ema_slow",
                section
            )));
        }

        let positives = [
            ("lot_size", self.lot_size),
            ("bracket.atr_multiplier", self.bracket.atr_multiplier),
            ("bracket.reward_risk", self.bracket.reward_risk),
            ("trailing.initial_offset", self.trailing.initial_offset),
            ("trailing.trail_offset", self.trailing.trail_offset),
            ("scalp.macd_near_zero", self.scalp.macd_near_zero),
        ];
        if let Some((name, _)) = positives.iter().find(|(_, v)| !(v.is_finite() && *v > 0.0)) {
            return Err(BotError::Config(format!("{} must be positive", name)));
        }

        if self.transaction_cost < 0.0 || self.bracket.min_stop_points < 0.0 || self.trailing.trigger < 0.0 {
            return Err(BotError::Config(
                "costs, stop floors and triggers cannot be negative".to_string(),
            ));
        }

        if self.history_days <= 0 || self.poll_interval_secs == 0 {
            return Err(BotError::Config(
                "history_days and poll_interval_secs must be positive".to_string(),
            ));
        }

        Ok(())
    }

    /// Extra checks before the live loop starts
    pub fn validate_live(&self, paper: bool) -> Result<()> {
        if self.instruments.is_empty() {
            return Err(BotError::Config("no instruments configured".to_string()));
        }

        let broker = &self.broker;
        let missing = [
            ("broker.api_key", &broker.api_key),
            ("broker.client_code", &broker.client_code),
            ("broker.password", &broker.password),
            ("broker.totp", &broker.totp),
        ];
        if !paper {
            if let Some((name, _)) = missing.iter().find(|(_, v)| v.trim().is_empty()) {
                return Err(BotError::Config(format!("{} is not set", name)));
            }
        }

        if self.sentiment.enabled && self.sentiment.api_key.trim().is_empty() {
            return Err(BotError::Config(
                "sentiment is enabled but sentiment.api_key is not set".to_string(),
            ));
        }

        Ok(())
    }

    pub fn build_strategy(&self) -> Arc<dyn Strategy> {
        match self.strategy {
            StrategyKind::MomentumScalp => Arc::new(MomentumScalpStrategy::new(
                self.scalp.clone(),
                self.indicators.clone(),
            )),
            StrategyKind::TrendBreakout => {
                Arc::new(TrendBreakoutStrategy::new(self.breakout.clone()))
            }
        }
    }

    /// The scalp trades fixed brackets, the breakout trails its stop
    pub fn risk_policy(&self) -> RiskPolicy {
        match self.strategy {
            StrategyKind::MomentumScalp => RiskPolicy::Bracket(self.bracket.clone()),
            StrategyKind::TrendBreakout => RiskPolicy::Trailing(self.trailing.clone()),
        }
    }

    pub fn driver_config(&self) -> DriverConfig {
        DriverConfig {
            interval: self.interval,
            history: chrono::Duration::days(self.history_days),
            poll_interval: Duration::from_secs(self.poll_interval_secs),
            error_backoff: Duration::from_secs(self.error_backoff_secs),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults_are_valid() {
        let settings = Settings::default();
        assert!(settings.validate().is_ok());
        assert_eq!(settings.lot_size, 30.0);
        assert_eq!(settings.risk_policy(), RiskPolicy::Bracket(BracketConfig::default()));
        assert_eq!(settings.build_strategy().name(), "MomentumScalpStrategy");
    }

    #[test]
    fn test_zero_period_rejected() {
        let mut settings = Settings::default();
        settings.indicators.adx_period = 0;

        let err = settings.validate().unwrap_err();
        assert!(err.is_fatal());
        assert!(err.to_string().contains("adx_period"));
    }

    #[test]
    fn test_breakout_ema_order_checked() {
        let mut settings = Settings::default();
        settings.breakout.ema_fast = 9;
        settings.breakout.ema_slow = 5;

        let err = settings.validate().unwrap_err();
        assert!(err.is_fatal());
        assert!(err.to_string().contains("breakout.ema_fast"));

        settings.breakout.ema_slow = 9;
        assert!(settings.validate().is_err());
    }

    #[test]
    fn test_negative_lot_rejected() {
        let settings = Settings {
            lot_size: -1.0,
            ..Default::default()
        };
        assert!(settings.validate().is_err());
    }

    #[test]
    fn test_live_requires_instruments_and_credentials() {
        let mut settings = Settings::default();
        assert!(settings.validate_live(true).is_err());

        settings.instruments.push(Instrument::new("BANKNIFTY27MAR2551600CE", "59523"));
        assert!(settings.validate_live(true).is_ok());

        let err = settings.validate_live(false).unwrap_err();
        assert!(err.to_string().contains("broker.api_key"));
    }

    #[test]
    fn test_load_from_toml_file() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(
            file,
            r#"
lot_size = 100
strategy = "trend_breakout"
interval = "THREE_MINUTE"
transaction_cost = 90

[[instruments]]
symbol = "NIFTY06FEB2523500CE"
token = "43210"
strike = 23500
option_type = "CALL"

[trailing]
trigger = 2.0
"#
        )
        .unwrap();

        let settings = Settings::load(Some(file.path())).unwrap();

        assert_eq!(settings.lot_size, 100.0);
        assert_eq!(settings.strategy, StrategyKind::TrendBreakout);
        assert_eq!(settings.interval, Interval::ThreeMinute);
        assert_eq!(settings.instruments.len(), 1);
        assert_eq!(settings.instruments[0].exchange, "NFO");
        assert_eq!(settings.trailing.trigger, 2.0);
        // Unset fields keep their defaults
        assert_eq!(settings.trailing.trail_offset, 0.5);
        assert_eq!(settings.build_strategy().min_candles_required(), 28);
    }

    #[test]
    fn test_missing_explicit_file_is_fatal() {
        let err = Settings::load(Some(Path::new("/nonexistent/scalpbot.toml"))).unwrap_err();
        assert!(err.is_fatal());
    }
}
