// Order execution module: position book, per-cycle engine and polling driver
pub mod driver;
pub mod engine;
pub mod executor;
pub mod gateway;
pub mod position_manager;

pub use driver::{CycleReport, DriverConfig, InstrumentOutcome, NoSentiment, PollingDriver};
pub use engine::TradingEngine;
pub use executor::{ExecutionAction, ExecutionDecision, Executor};
pub use gateway::{CandleSource, OrderGateway, PaperGateway, SentimentOracle};
pub use position_manager::{
    BracketConfig, ExitPlan, ExitReason, Position, PositionManager, PositionStatus, RiskPolicy,
    TrailingConfig,
};
