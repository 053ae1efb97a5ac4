use chrono::{DateTime, Utc};
use std::sync::Mutex;

use crate::models::{Candle, Instrument, Interval, OrderOutcome, OrderRequest, Sentiment};
use crate::Result;

/// Supplies candles and last prices for the polling driver
///
/// `Ok(None)` is "no data": the driver skips the instrument for the cycle.
/// `Err` is a fault: logged, and the driver backs off before the next pass.
#[allow(async_fn_in_trait)]
pub trait CandleSource {
    async fn fetch_candles(
        &self,
        instrument: &Instrument,
        interval: Interval,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Option<Vec<Candle>>>;

    async fn last_price(&self, instrument: &Instrument) -> Result<Option<f64>>;
}

/// Accepts or rejects orders; no fill confirmation beyond acceptance
#[allow(async_fn_in_trait)]
pub trait OrderGateway {
    async fn submit(&self, order: &OrderRequest) -> OrderOutcome;
}

/// Optional sentiment input; failures must come back as `Neutral`
#[allow(async_fn_in_trait)]
pub trait SentimentOracle {
    async fn classify(&self, instrument: &Instrument) -> Sentiment;
}

/// Paper trading: accepts every order without touching the broker
#[derive(Default)]
pub struct PaperGateway {
    submitted: Mutex<Vec<OrderRequest>>,
}

impl PaperGateway {
    pub fn new() -> Self {
        Self::default()
    }

    /// Orders accepted so far, oldest first
    pub fn submitted(&self) -> Vec<OrderRequest> {
        self.submitted
            .lock()
            .map(|orders| orders.clone())
            .unwrap_or_default()
    }
}

impl OrderGateway for PaperGateway {
    async fn submit(&self, order: &OrderRequest) -> OrderOutcome {
        tracing::info!(
            instrument = %order.instrument.symbol,
            side = %order.side,
            quantity = order.quantity,
            "📝 Paper order: {:?}",
            order.order_type
        );

        let mut orders = match self.submitted.lock() {
            Ok(orders) => orders,
            Err(poisoned) => poisoned.into_inner(),
        };
        orders.push(order.clone());

        OrderOutcome::Accepted {
            order_id: Some(format!("PAPER-{}", orders.len())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{OrderSide, OrderType};

    #[tokio::test]
    async fn test_paper_gateway_accepts_everything() {
        let gateway = PaperGateway::new();
        let order = OrderRequest {
            instrument: Instrument::new("NIFTY", "1"),
            quantity: 30.0,
            side: OrderSide::Buy,
            order_type: OrderType::Market,
        };

        let first = gateway.submit(&order).await;
        let second = gateway.submit(&order).await;

        assert_eq!(
            first,
            OrderOutcome::Accepted {
                order_id: Some("PAPER-1".to_string())
            }
        );
        assert!(second.is_accepted());
        assert_eq!(gateway.submitted().len(), 2);
    }
}
