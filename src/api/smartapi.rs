use chrono::{DateTime, Utc};
use governor::{Quota, RateLimiter};
use reqwest::Client;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::{json, Value};
use std::num::NonZeroU32;
use std::sync::Arc;
use tokio::time::{sleep, Duration};

use crate::error::BotError;
use crate::execution::{CandleSource, OrderGateway};
use crate::models::{
    Candle, Instrument, Interval, OrderOutcome, OrderRequest, OrderType, EXCHANGE_UTC_OFFSET_SECS,
};
use crate::settings::BrokerSettings;
use crate::Result;

const LOGIN_PATH: &str = "/rest/auth/angelbroking/user/v1/loginByPassword";
const CANDLE_PATH: &str = "/rest/secure/angelbroking/historical/v1/getCandleData";
const LTP_PATH: &str = "/rest/secure/angelbroking/order/v1/getLtpData";
const ORDER_PATH: &str = "/rest/secure/angelbroking/order/v1/placeOrder";

const MAX_RETRIES: u32 = 3;
const RETRY_PAUSE: Duration = Duration::from_secs(2);
const RATE_LIMIT_PER_SEC: u32 = 3;
const DATE_FORMAT: &str = "%Y-%m-%d %H:%M";

type SmartApiRateLimiter = RateLimiter<
    governor::state::direct::NotKeyed,
    governor::state::InMemoryState,
    governor::clock::DefaultClock,
>;

/// Response envelope shared by every SmartAPI endpoint
#[derive(Debug, Deserialize)]
struct ApiEnvelope<T> {
    #[serde(default)]
    status: bool,
    #[serde(default)]
    message: String,
    #[serde(default)]
    errorcode: String,
    data: Option<T>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SessionData {
    jwt_token: String,
    #[serde(default)]
    feed_token: Option<String>,
}

#[derive(Debug, Deserialize)]
struct LtpData {
    ltp: f64,
}

#[derive(Debug, Deserialize)]
struct OrderData {
    #[serde(default)]
    orderid: Option<String>,
}

#[derive(Debug, Serialize)]
struct OrderParams<'a> {
    variety: &'static str,
    tradingsymbol: &'a str,
    symboltoken: &'a str,
    transactiontype: String,
    exchange: &'a str,
    ordertype: &'static str,
    producttype: &'static str,
    duration: &'static str,
    price: String,
    quantity: String,
}

/// Authenticated broker session
#[derive(Debug, Clone)]
pub struct Session {
    pub jwt_token: String,
    pub feed_token: Option<String>,
}

/// REST client for the Angel One SmartAPI broker
///
/// Acts as both the live candle source and the live order gateway.
#[derive(Clone)]
pub struct SmartApiClient {
    client: Client,
    credentials: BrokerSettings,
    session: Option<Session>,
    rate_limiter: Arc<SmartApiRateLimiter>,
    retry_pause: Duration,
}

impl SmartApiClient {
    pub fn new(credentials: BrokerSettings) -> Result<Self> {
        let client = Client::builder().timeout(Duration::from_secs(15)).build()?;

        // SmartAPI throttles historical requests at a few per second
        let quota =
            Quota::per_second(NonZeroU32::new(RATE_LIMIT_PER_SEC).unwrap_or(NonZeroU32::MIN));

        Ok(Self {
            client,
            credentials,
            session: None,
            rate_limiter: Arc::new(RateLimiter::direct(quota)),
            retry_pause: RETRY_PAUSE,
        })
    }

    /// Override the pause between candle fetch attempts
    pub fn with_retry_pause(mut self, pause: Duration) -> Self {
        self.retry_pause = pause;
        self
    }

    pub fn session(&self) -> Option<&Session> {
        self.session.as_ref()
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.credentials.base_url.trim_end_matches('/'), path)
    }

    /// Password + TOTP login; any failure is an authentication error
    pub async fn login(&mut self) -> Result<&Session> {
        let body = json!({
            "clientcode": self.credentials.client_code,
            "password": self.credentials.password,
            "totp": self.credentials.totp,
        });

        let envelope: ApiEnvelope<SessionData> = self
            .post(LOGIN_PATH, &body, false)
            .await
            .map_err(|e| BotError::Auth(e.to_string()))?;

        let data = match envelope {
            ApiEnvelope {
                status: true,
                data: Some(data),
                ..
            } => data,
            ApiEnvelope {
                message, errorcode, ..
            } => {
                return Err(BotError::Auth(format!(
                    "login rejected: {} ({})",
                    message, errorcode
                )))
            }
        };

        tracing::info!(client = %self.credentials.client_code, "✅ SmartAPI login successful");
        Ok(self.session.insert(Session {
            jwt_token: data.jwt_token,
            feed_token: data.feed_token,
        }))
    }

    async fn post<T: DeserializeOwned>(
        &self,
        path: &str,
        body: &Value,
        authenticated: bool,
    ) -> Result<ApiEnvelope<T>> {
        self.rate_limiter.until_ready().await;

        let creds = &self.credentials;
        let mut request = self
            .client
            .post(self.url(path))
            .header("Content-Type", "application/json")
            .header("Accept", "application/json")
            .header("X-UserType", "USER")
            .header("X-SourceID", "WEB")
            .header("X-ClientLocalIP", &creds.local_ip)
            .header("X-ClientPublicIP", &creds.public_ip)
            .header("X-MACAddress", &creds.mac_address)
            .header("X-PrivateKey", &creds.api_key)
            .json(body);

        if authenticated {
            let session = self
                .session
                .as_ref()
                .ok_or_else(|| BotError::Auth("not logged in".to_string()))?;
            request = request.bearer_auth(&session.jwt_token);
        }

        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(BotError::Api(format!("{} from {}: {}", status, path, text)));
        }

        Ok(response.json().await?)
    }

    async fn fetch_candles_once(
        &self,
        instrument: &Instrument,
        interval: Interval,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Option<Vec<Candle>>> {
        let body = json!({
            "exchange": instrument.exchange,
            "symboltoken": instrument.token,
            "interval": interval.as_api_str(),
            "fromdate": format_exchange_time(from),
            "todate": format_exchange_time(to),
        });

        let envelope: ApiEnvelope<Vec<Vec<Value>>> = self.post(CANDLE_PATH, &body, true).await?;
        if !envelope.status {
            tracing::warn!(
                instrument = %instrument.symbol,
                "Candle request refused: {} ({})",
                envelope.message,
                envelope.errorcode
            );
            return Ok(None);
        }

        let rows = envelope.data.unwrap_or_default();
        let total = rows.len();
        let candles: Vec<Candle> = rows.iter().filter_map(|row| parse_candle_row(row)).collect();
        if candles.len() < total {
            tracing::debug!(
                instrument = %instrument.symbol,
                "Dropped {} malformed candle rows",
                total - candles.len()
            );
        }

        Ok((!candles.is_empty()).then_some(candles))
    }
}

impl CandleSource for SmartApiClient {
    /// Up to three attempts with a fixed pause; transport errors that
    /// persist through every attempt are returned, empty answers are "no data"
    async fn fetch_candles(
        &self,
        instrument: &Instrument,
        interval: Interval,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Option<Vec<Candle>>> {
        let mut last_error = None;

        for attempt in 1..=MAX_RETRIES {
            match self.fetch_candles_once(instrument, interval, from, to).await {
                Ok(Some(candles)) => return Ok(Some(candles)),
                Ok(None) => {
                    last_error = None;
                    tracing::warn!(
                        instrument = %instrument.symbol,
                        "Attempt {}/{}: no candle data",
                        attempt,
                        MAX_RETRIES
                    );
                }
                Err(e) => {
                    tracing::warn!(
                        instrument = %instrument.symbol,
                        "Attempt {}/{} failed: {}",
                        attempt,
                        MAX_RETRIES,
                        e
                    );
                    last_error = Some(e);
                }
            }

            if attempt < MAX_RETRIES {
                sleep(self.retry_pause).await;
            }
        }

        match last_error {
            Some(e) => Err(e),
            None => Ok(None),
        }
    }

    async fn last_price(&self, instrument: &Instrument) -> Result<Option<f64>> {
        let body = json!({
            "exchange": instrument.exchange,
            "tradingsymbol": instrument.symbol,
            "symboltoken": instrument.token,
        });

        let envelope: ApiEnvelope<LtpData> = self.post(LTP_PATH, &body, true).await?;
        Ok(envelope
            .data
            .filter(|_| envelope.status)
            .map(|d| d.ltp)
            .filter(|ltp| ltp.is_finite() && *ltp > 0.0))
    }
}

impl OrderGateway for SmartApiClient {
    async fn submit(&self, order: &OrderRequest) -> OrderOutcome {
        let (ordertype, price) = match order.order_type {
            OrderType::Market => ("MARKET", 0.0),
            OrderType::Limit { price } => ("LIMIT", price),
        };

        let params = OrderParams {
            variety: "NORMAL",
            tradingsymbol: &order.instrument.symbol,
            symboltoken: &order.instrument.token,
            transactiontype: order.side.to_string(),
            exchange: &order.instrument.exchange,
            ordertype,
            producttype: "INTRADAY",
            duration: "DAY",
            price: format!("{:.2}", price),
            quantity: format!("{}", order.quantity.round() as i64),
        };

        let body = match serde_json::to_value(&params) {
            Ok(body) => body,
            Err(e) => {
                return OrderOutcome::Rejected {
                    reason: e.to_string(),
                }
            }
        };

        match self.post::<OrderData>(ORDER_PATH, &body, true).await {
            Ok(ApiEnvelope {
                status: true, data, ..
            }) => OrderOutcome::Accepted {
                order_id: data.and_then(|d| d.orderid),
            },
            Ok(ApiEnvelope {
                message, errorcode, ..
            }) => OrderOutcome::Rejected {
                reason: format!("{} ({})", message, errorcode),
            },
            Err(e) => OrderOutcome::Rejected {
                reason: e.to_string(),
            },
        }
    }
}

/// Broker request times are exchange-local wall clock
fn format_exchange_time(time: DateTime<Utc>) -> String {
    (time + chrono::Duration::seconds(EXCHANGE_UTC_OFFSET_SECS))
        .format(DATE_FORMAT)
        .to_string()
}

/// `[timestamp, open, high, low, close, volume]`; numbers may arrive as strings
fn parse_candle_row(row: &[Value]) -> Option<Candle> {
    let [ts, open, high, low, close, volume] = row else {
        return None;
    };

    let number = |v: &Value| match v {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    };

    let timestamp = DateTime::parse_from_rfc3339(ts.as_str()?)
        .ok()?
        .with_timezone(&Utc);

    let candle = Candle {
        timestamp,
        open: number(open)?,
        high: number(high)?,
        low: number(low)?,
        close: number(close)?,
        volume: number(volume)?,
    };

    candle.is_valid().then_some(candle)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::OrderSide;
    use mockito::Matcher;

    fn credentials(base_url: String) -> BrokerSettings {
        BrokerSettings {
            base_url,
            api_key: "key".to_string(),
            client_code: "A123".to_string(),
            password: "1234".to_string(),
            totp: "654321".to_string(),
            ..Default::default()
        }
    }

    async fn logged_in(server: &mut mockito::Server) -> SmartApiClient {
        server
            .mock("POST", LOGIN_PATH)
            .match_header("X-PrivateKey", "key")
            .match_body(Matcher::PartialJson(json!({"clientcode": "A123", "totp": "654321"})))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"status":true,"message":"SUCCESS","errorcode":"","data":{"jwtToken":"jwt-abc","refreshToken":"r","feedToken":"feed"}}"#)
            .create_async()
            .await;

        let mut client = SmartApiClient::new(credentials(server.url()))
            .unwrap()
            .with_retry_pause(Duration::from_millis(1));
        client.login().await.unwrap();
        client
    }

    fn instrument() -> Instrument {
        Instrument::new("BANKNIFTY27MAR2551600CE", "59523")
    }

    #[test]
    fn test_parse_candle_row_coerces_strings() {
        let row = vec![
            json!("2025-03-27T09:15:00+05:30"),
            json!("101.5"),
            json!(103.0),
            json!(100.0),
            json!(102.25),
            json!(1500),
        ];
        let candle = parse_candle_row(&row).unwrap();
        assert_eq!(candle.open, 101.5);
        assert_eq!(candle.volume, 1500.0);
        assert_eq!(candle.timestamp.to_rfc3339(), "2025-03-27T03:45:00+00:00");

        let bad = vec![json!("2025-03-27T09:15:00+05:30"), json!("n/a"), json!(1), json!(1), json!(1), json!(1)];
        assert!(parse_candle_row(&bad).is_none());
        assert!(parse_candle_row(&row[..5]).is_none());
    }

    #[test]
    fn test_exchange_time_format() {
        let utc = DateTime::parse_from_rfc3339("2025-03-27T03:45:00Z")
            .unwrap()
            .with_timezone(&Utc);
        assert_eq!(format_exchange_time(utc), "2025-03-27 09:15");
    }

    #[tokio::test]
    async fn test_login_stores_session() {
        let mut server = mockito::Server::new_async().await;
        let client = logged_in(&mut server).await;
        assert_eq!(client.session().unwrap().jwt_token, "jwt-abc");
    }

    #[tokio::test]
    async fn test_login_rejected_is_auth_error() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", LOGIN_PATH)
            .with_status(200)
            .with_body(r#"{"status":false,"message":"Invalid totp","errorcode":"AB1050","data":null}"#)
            .create_async()
            .await;

        let mut client = SmartApiClient::new(credentials(server.url())).unwrap();
        let err = client.login().await.unwrap_err();
        assert!(err.is_fatal());
        assert!(err.to_string().contains("Invalid totp"));
    }

    #[tokio::test]
    async fn test_fetch_candles() {
        let mut server = mockito::Server::new_async().await;
        let client = logged_in(&mut server).await;

        let mock = server
            .mock("POST", CANDLE_PATH)
            .match_header("authorization", "Bearer jwt-abc")
            .match_body(Matcher::PartialJson(json!({"symboltoken": "59523", "interval": "ONE_MINUTE"})))
            .with_status(200)
            .with_body(r#"{"status":true,"message":"SUCCESS","errorcode":"","data":[
                ["2025-03-27T09:15:00+05:30",100,102,99,101,1000],
                ["2025-03-27T09:16:00+05:30",101,"bad",100,101.5,800],
                ["2025-03-27T09:17:00+05:30",101.5,103,101,102.5,1200]
            ]}"#)
            .create_async()
            .await;

        let now = Utc::now();
        let candles = client
            .fetch_candles(&instrument(), Interval::OneMinute, now - chrono::Duration::days(1), now)
            .await
            .unwrap()
            .unwrap();

        mock.assert_async().await;
        assert_eq!(candles.len(), 2);
        assert_eq!(candles[1].close, 102.5);
    }

    #[tokio::test]
    async fn test_empty_candles_is_no_data_after_retries() {
        let mut server = mockito::Server::new_async().await;
        let client = logged_in(&mut server).await;

        let mock = server
            .mock("POST", CANDLE_PATH)
            .with_status(200)
            .with_body(r#"{"status":true,"message":"SUCCESS","errorcode":"","data":[]}"#)
            .expect(3)
            .create_async()
            .await;

        let now = Utc::now();
        let result = client
            .fetch_candles(&instrument(), Interval::OneMinute, now, now)
            .await
            .unwrap();

        mock.assert_async().await;
        assert!(result.is_none());
    }

    #[tokio::test]
    async fn test_server_error_surfaces_after_retries() {
        let mut server = mockito::Server::new_async().await;
        let client = logged_in(&mut server).await;

        server
            .mock("POST", CANDLE_PATH)
            .with_status(503)
            .expect(3)
            .create_async()
            .await;

        let now = Utc::now();
        let result = client
            .fetch_candles(&instrument(), Interval::OneMinute, now, now)
            .await;
        assert!(matches!(result, Err(BotError::Api(_))));
    }

    #[tokio::test]
    async fn test_last_price() {
        let mut server = mockito::Server::new_async().await;
        let client = logged_in(&mut server).await;

        server
            .mock("POST", LTP_PATH)
            .match_body(Matcher::PartialJson(json!({"tradingsymbol": "BANKNIFTY27MAR2551600CE"})))
            .with_status(200)
            .with_body(r#"{"status":true,"message":"SUCCESS","errorcode":"","data":{"exchange":"NFO","tradingsymbol":"BANKNIFTY27MAR2551600CE","symboltoken":"59523","ltp":245.35}}"#)
            .create_async()
            .await;

        assert_eq!(client.last_price(&instrument()).await.unwrap(), Some(245.35));
    }

    #[tokio::test]
    async fn test_place_limit_order() {
        let mut server = mockito::Server::new_async().await;
        let client = logged_in(&mut server).await;

        server
            .mock("POST", ORDER_PATH)
            .match_body(Matcher::PartialJson(json!({
                "transactiontype": "SELL",
                "ordertype": "LIMIT",
                "producttype": "INTRADAY",
                "price": "100.50",
                "quantity": "100"
            })))
            .with_status(200)
            .with_body(r#"{"status":true,"message":"SUCCESS","errorcode":"","data":{"script":"X","orderid":"250327000123"}}"#)
            .create_async()
            .await;

        let order = OrderRequest {
            instrument: instrument(),
            quantity: 100.0,
            side: OrderSide::Sell,
            order_type: OrderType::Limit { price: 100.5 },
        };

        assert_eq!(
            client.submit(&order).await,
            OrderOutcome::Accepted {
                order_id: Some("250327000123".to_string())
            }
        );
    }

    #[tokio::test]
    async fn test_order_refused_is_rejection() {
        let mut server = mockito::Server::new_async().await;
        let client = logged_in(&mut server).await;

        server
            .mock("POST", ORDER_PATH)
            .with_status(200)
            .with_body(r#"{"status":false,"message":"Insufficient funds","errorcode":"AB4008","data":null}"#)
            .create_async()
            .await;

        let order = OrderRequest {
            instrument: instrument(),
            quantity: 30.0,
            side: OrderSide::Buy,
            order_type: OrderType::Market,
        };

        match client.submit(&order).await {
            OrderOutcome::Rejected { reason } => assert!(reason.contains("Insufficient funds")),
            other => panic!("expected rejection, got {:?}", other),
        }
    }
}
