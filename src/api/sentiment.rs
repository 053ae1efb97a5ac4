use reqwest::Client;
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;

use crate::execution::SentimentOracle;
use crate::models::{Instrument, Sentiment};
use crate::settings::SentimentSettings;
use crate::Result;

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Content,
}

#[derive(Debug, Deserialize)]
struct Content {
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Debug, Deserialize)]
struct Part {
    #[serde(default)]
    text: String,
}

/// Short-term sentiment from a hosted language model
///
/// Placeholder signal: the reply is not checked for accuracy, only parsed.
pub struct LlmSentimentClient {
    client: Client,
    settings: SentimentSettings,
}

impl LlmSentimentClient {
    pub fn new(settings: SentimentSettings) -> Result<Self> {
        let client = Client::builder().timeout(Duration::from_secs(10)).build()?;
        Ok(Self { client, settings })
    }

    fn build_prompt(symbol: &str) -> String {
        format!(
            "You are an intraday options trader.\n\
             Classify short-term sentiment for {}.\n\
             Reply with only one word: POS, NEG, or NEU.",
            symbol
        )
    }

    async fn request(&self, symbol: &str) -> Result<String> {
        let url = format!(
            "{}/v1beta/models/{}:generateContent",
            self.settings.base_url.trim_end_matches('/'),
            self.settings.model
        );
        let body = json!({
            "contents": [{ "parts": [{ "text": Self::build_prompt(symbol) }] }]
        });

        let response: GenerateResponse = self
            .client
            .post(&url)
            .query(&[("key", self.settings.api_key.as_str())])
            .json(&body)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        Ok(response
            .candidates
            .into_iter()
            .next()
            .and_then(|c| c.content.parts.into_iter().next())
            .map(|p| p.text)
            .unwrap_or_default())
    }
}

impl SentimentOracle for LlmSentimentClient {
    async fn classify(&self, instrument: &Instrument) -> Sentiment {
        match self.request(&instrument.symbol).await {
            Ok(reply) => {
                let sentiment = Sentiment::from_reply(&reply);
                tracing::debug!(instrument = %instrument.symbol, reply = %reply.trim(), ?sentiment, "Sentiment");
                sentiment
            }
            Err(e) => {
                tracing::warn!(instrument = %instrument.symbol, "Sentiment request failed: {}", e);
                Sentiment::Neutral
            }
        }
    }
}
