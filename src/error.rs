use thiserror::Error;

/// Errors surfaced by the trading core and its collaborators
///
/// The variants follow how each failure is recovered:
/// - `DataUnavailable`: skip the instrument for this cycle
/// - `OrderRejected`: log it, leave the position book untouched
/// - `Config` / `Auth`: fatal at startup
#[derive(Debug, Error)]
pub enum BotError {
    #[error("no data for {instrument}: {reason}")]
    DataUnavailable { instrument: String, reason: String },

    #[error("order rejected for {instrument}: {reason}")]
    OrderRejected { instrument: String, reason: String },

    #[error("configuration error: {0}")]
    Config(String),

    #[error("authentication failed: {0}")]
    Auth(String),

    #[error("broker API error: {0}")]
    Api(String),

    #[error(transparent)]
    Http(#[from] reqwest::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Csv(#[from] csv::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl From<::config::ConfigError> for BotError {
    fn from(e: ::config::ConfigError) -> Self {
        BotError::Config(e.to_string())
    }
}

impl BotError {
    /// True for errors that must stop the process before the polling loop starts
    pub fn is_fatal(&self) -> bool {
        matches!(self, BotError::Config(_) | BotError::Auth(_))
    }
}
