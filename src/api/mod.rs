pub mod sentiment;
pub mod smartapi;

pub use sentiment::LlmSentimentClient;
pub use smartapi::{Session, SmartApiClient};
