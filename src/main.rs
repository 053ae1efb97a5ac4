use anyhow::Context;
use clap::Parser;
use scalpbot::api::{LlmSentimentClient, SmartApiClient};
use scalpbot::execution::{
    CandleSource, Executor, OrderGateway, PaperGateway, PollingDriver, PositionManager,
    TradingEngine,
};
use scalpbot::settings::Settings;
use std::path::PathBuf;

/// Intraday options bot polling the SmartAPI broker
#[derive(Parser)]
#[command(name = "scalpbot", version, about)]
struct Args {
    /// TOML settings file (defaults to ./scalpbot.toml when present)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Accept every order locally instead of sending it to the broker
    #[arg(long)]
    paper: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    setup_logging();

    let args = Args::parse();

    tracing::info!("🚀 ScalpBot starting");

    let settings = Settings::load(args.config.as_deref()).context("failed to load settings")?;
    settings
        .validate_live(args.paper)
        .context("settings are not usable for trading")?;

    log_configuration(&settings, args.paper);

    // Market data always comes from the broker, so paper mode logs in too
    let mut broker =
        SmartApiClient::new(settings.broker.clone()).context("failed to build broker client")?;
    broker.login().await.context("broker login failed")?;
    tracing::info!("✅ Logged in as {}", settings.broker.client_code);

    let engine = build_engine(&settings);

    let closed = if args.paper {
        tracing::info!("📝 Paper trading: orders stay local");
        run_driver(&settings, broker, PaperGateway::new(), engine).await?
    } else {
        tracing::info!("💰 Live trading: orders go to the broker");
        run_driver(&settings, broker.clone(), broker, engine).await?
    };

    tracing::info!("🛑 ScalpBot stopped ({} positions flattened)", closed);
    Ok(())
}

fn setup_logging() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("scalpbot=info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

fn log_configuration(settings: &Settings, paper: bool) {
    tracing::info!("\n📊 Configuration:");
    tracing::info!("  Mode: {}", if paper { "paper" } else { "live" });
    tracing::info!("  Strategy: {:?}", settings.strategy);
    tracing::info!("  Risk: {:?}", settings.risk_policy());
    tracing::info!("  Interval: {}", settings.interval.as_api_str());
    tracing::info!("  Lot size: {}", settings.lot_size);
    tracing::info!("  Poll: every {}s", settings.poll_interval_secs);
    tracing::info!("  Sentiment: {}", settings.sentiment.enabled);
    for instrument in &settings.instruments {
        tracing::info!("  📈 {} ({})", instrument.symbol, instrument.token);
    }
}

fn build_engine(settings: &Settings) -> TradingEngine {
    let veto = settings.sentiment.enabled && settings.sentiment.veto_conflicting;
    TradingEngine::new(
        settings.build_strategy(),
        PositionManager::new(settings.risk_policy(), settings.transaction_cost),
        Executor::new(settings.lot_size, veto),
    )
}

/// Poll until Ctrl+C, then flatten; returns the number of positions closed
async fn run_driver<S, G>(
    settings: &Settings,
    source: S,
    gateway: G,
    engine: TradingEngine,
) -> anyhow::Result<usize>
where
    S: CandleSource,
    G: OrderGateway,
{
    let mut driver = PollingDriver::new(
        source,
        gateway,
        engine,
        settings.instruments.clone(),
        settings.driver_config(),
    );

    let shutdown = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to listen for Ctrl+C: {}", e);
        }
    };

    let closed = if settings.sentiment.enabled {
        let oracle = LlmSentimentClient::new(settings.sentiment.clone())
            .context("failed to build sentiment client")?;
        driver.with_sentiment(oracle).run(shutdown).await
    } else {
        driver.run(shutdown).await
    };

    Ok(closed)
}
