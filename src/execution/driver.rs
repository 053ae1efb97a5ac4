use chrono::Utc;
use std::collections::HashMap;
use std::future::Future;
use std::time::Duration;

use crate::error::BotError;
use crate::execution::{
    CandleSource, ExecutionAction, ExitReason, OrderGateway, SentimentOracle, TradingEngine,
};
use crate::models::{Instrument, Interval, OrderOutcome, Sentiment};
use crate::Result;

#[derive(Debug, Clone)]
pub struct DriverConfig {
    pub interval: Interval,
    pub history: chrono::Duration, // How far back each candle fetch reaches
    pub poll_interval: Duration,
    pub error_backoff: Duration,
}

impl Default for DriverConfig {
    fn default() -> Self {
        Self {
            interval: Interval::ThreeMinute,
            history: chrono::Duration::days(1),
            poll_interval: Duration::from_secs(5),
            error_backoff: Duration::from_secs(2),
        }
    }
}

/// What happened to one instrument during a cycle
#[derive(Debug, Clone, PartialEq)]
pub enum InstrumentOutcome {
    NoData(String),
    Held,
    Entered,
    Exited,
    Rejected(String),
}

/// Tally of one pass over all instruments
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CycleReport {
    pub entries: usize,
    pub exits: usize,
    pub held: usize,
    pub skipped: usize,
    pub rejected: usize,
    pub faults: usize,
}

/// Oracle used when sentiment is disabled
pub struct NoSentiment;

impl SentimentOracle for NoSentiment {
    async fn classify(&self, _instrument: &Instrument) -> Sentiment {
        Sentiment::Neutral
    }
}

/// Polls every instrument in turn, sleeping between passes
///
/// Owns all scheduling, backoff and fault isolation; the trading logic
/// itself lives in the synchronous `TradingEngine`.
pub struct PollingDriver<S, G, O = NoSentiment> {
    source: S,
    gateway: G,
    sentiment: Option<O>,
    engine: TradingEngine,
    instruments: Vec<Instrument>,
    config: DriverConfig,
}

impl<S: CandleSource, G: OrderGateway> PollingDriver<S, G, NoSentiment> {
    pub fn new(
        source: S,
        gateway: G,
        engine: TradingEngine,
        instruments: Vec<Instrument>,
        config: DriverConfig,
    ) -> Self {
        Self {
            source,
            gateway,
            sentiment: None,
            engine,
            instruments,
            config,
        }
    }

    pub fn with_sentiment<O: SentimentOracle>(self, oracle: O) -> PollingDriver<S, G, O> {
        PollingDriver {
            source: self.source,
            gateway: self.gateway,
            sentiment: Some(oracle),
            engine: self.engine,
            instruments: self.instruments,
            config: self.config,
        }
    }
}

impl<S: CandleSource, G: OrderGateway, O: SentimentOracle> PollingDriver<S, G, O> {
    pub fn engine(&self) -> &TradingEngine {
        &self.engine
    }

    pub fn gateway(&self) -> &G {
        &self.gateway
    }

    /// Run until `shutdown` resolves, then flatten every open position
    pub async fn run(&mut self, shutdown: impl Future<Output = ()>) -> usize {
        tokio::pin!(shutdown);
        let mut cycle: u64 = 0;

        loop {
            cycle += 1;
            let report = self.run_cycle().await;
            tracing::debug!(cycle, ?report, "Cycle complete");

            let pause = if report.faults > 0 {
                self.config.error_backoff
            } else {
                self.config.poll_interval
            };

            tokio::select! {
                _ = &mut shutdown => {
                    tracing::info!("⚠️  Shutdown requested after {} cycles", cycle);
                    break;
                }
                _ = tokio::time::sleep(pause) => {}
            }
        }

        self.flatten_all().await
    }

    /// One sequential pass over all instruments
    ///
    /// A fault on one instrument is logged and counted; the others still run.
    pub async fn run_cycle(&mut self) -> CycleReport {
        let mut report = CycleReport::default();
        let instruments = self.instruments.clone();

        for instrument in &instruments {
            match self.process_instrument(instrument).await {
                Ok(InstrumentOutcome::Entered) => report.entries += 1,
                Ok(InstrumentOutcome::Exited) => report.exits += 1,
                Ok(InstrumentOutcome::Held) => report.held += 1,
                Ok(InstrumentOutcome::NoData(reason)) => {
                    tracing::info!(instrument = %instrument.symbol, "Skipping: {}", reason);
                    report.skipped += 1;
                }
                Ok(InstrumentOutcome::Rejected(_)) => report.rejected += 1,
                Err(e) => {
                    tracing::error!(instrument = %instrument.symbol, "Cycle fault: {}", e);
                    report.faults += 1;
                }
            }
        }

        report
    }

    async fn process_instrument(&mut self, instrument: &Instrument) -> Result<InstrumentOutcome> {
        let Some(price) = self.source.last_price(instrument).await? else {
            return Ok(InstrumentOutcome::NoData("no last traded price".to_string()));
        };

        let now = Utc::now();
        let candles = match self
            .source
            .fetch_candles(instrument, self.config.interval, now - self.config.history, now)
            .await?
        {
            Some(candles) if !candles.is_empty() => candles,
            _ => return Ok(InstrumentOutcome::NoData("no candle data".to_string())),
        };

        let decision = match self.engine.decide(instrument, &candles, price) {
            Ok(decision) => decision,
            Err(BotError::DataUnavailable { reason, .. }) => {
                return Ok(InstrumentOutcome::NoData(reason))
            }
            Err(e) => return Err(e),
        };

        // Sentiment only matters for a pending entry
        let decision = match &self.sentiment {
            Some(oracle)
                if self.engine.uses_sentiment()
                    && matches!(decision.action, ExecutionAction::Enter { .. }) =>
            {
                let sentiment = oracle.classify(instrument).await;
                tracing::debug!(instrument = %instrument.symbol, ?sentiment, "Sentiment");
                self.engine.apply_sentiment_veto(decision, sentiment)
            }
            _ => decision,
        };

        let Some(order) = decision.order() else {
            tracing::debug!(instrument = %instrument.symbol, price, "{}", decision.reason);
            return Ok(InstrumentOutcome::Held);
        };

        let outcome = self.gateway.submit(&order).await;
        self.engine.settle(&decision, &outcome, Utc::now())?;

        Ok(match (&decision.action, outcome) {
            (_, OrderOutcome::Rejected { reason }) => InstrumentOutcome::Rejected(reason),
            (ExecutionAction::Exit { .. }, _) => InstrumentOutcome::Exited,
            _ => InstrumentOutcome::Entered,
        })
    }

    /// Submit market exits for every open position; returns how many closed
    pub async fn flatten_all(&mut self) -> usize {
        let open: Vec<Instrument> = self
            .instruments
            .iter()
            .filter(|i| self.engine.positions().has_open_position(&i.symbol))
            .cloned()
            .collect();

        if open.is_empty() {
            return 0;
        }
        tracing::info!("Flattening {} open positions", open.len());

        let mut prices = HashMap::new();
        for instrument in &open {
            match self.source.last_price(instrument).await {
                Ok(Some(price)) => {
                    prices.insert(instrument.symbol.clone(), price);
                }
                Ok(None) => {}
                Err(e) => {
                    tracing::warn!(instrument = %instrument.symbol, "Price lookup failed: {}", e)
                }
            }
        }

        let mut closed = 0;
        for decision in self.engine.flatten_all(&open, &prices, ExitReason::Flatten) {
            let Some(order) = decision.order() else {
                continue;
            };
            let outcome = self.gateway.submit(&order).await;
            match self.engine.settle(&decision, &outcome, Utc::now()) {
                Ok(Some(_)) => closed += 1,
                Ok(None) => {}
                Err(e) => {
                    tracing::error!(instrument = %decision.instrument.symbol, "Flatten failed: {}", e)
                }
            }
        }

        closed
    }
}
