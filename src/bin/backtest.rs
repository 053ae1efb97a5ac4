use anyhow::Context;
use clap::Parser;
use scalpbot::backtest::{
    load_candle_series, BacktestMetrics, BacktestRunner, LedgerWriter, MarketScenario,
    SyntheticDataGenerator, TradeRecord,
};
use scalpbot::models::Instrument;
use scalpbot::settings::Settings;
use scalpbot::strategy::StrategyKind;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Replay stored option candles through the trading engine
#[derive(Parser)]
#[command(name = "backtest", version, about)]
struct Args {
    /// Directory holding the candle CSV files
    #[arg(long, default_value = ".")]
    data_dir: PathBuf,

    /// File name prefix of the candle files to replay
    #[arg(long, default_value = "NIFTY_")]
    pattern: String,

    /// CSV trade ledger to append to
    #[arg(long, default_value = "trade_ledger.csv")]
    ledger: PathBuf,

    /// momentum_scalp or trend_breakout
    #[arg(long, default_value = "trend_breakout")]
    strategy: StrategyKind,

    /// Replay N synthetic candles per scenario instead of files
    #[arg(long)]
    synthetic: Option<usize>,

    /// Limit the synthetic run to one scenario (uptrend, downtrend, sideways, swing, volatile)
    #[arg(long)]
    scenario: Option<MarketScenario>,

    /// Starting premium of synthetic series
    #[arg(long, default_value_t = 100.0)]
    base_price: f64,

    /// TOML settings file for indicator and risk parameters
    #[arg(long)]
    config: Option<PathBuf>,

    /// Transaction cost per side
    #[arg(long, default_value_t = 90.0)]
    cost: f64,

    /// Quantity per trade
    #[arg(long, default_value_t = 100.0)]
    quantity: f64,
}

fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("scalpbot=warn"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let args = Args::parse();

    let mut settings =
        Settings::load(args.config.as_deref()).context("failed to load settings")?;
    settings.strategy = args.strategy;
    settings.lot_size = args.quantity;
    settings.transaction_cost = args.cost;
    settings.validate().context("invalid backtest settings")?;

    println!("\n╔═══════════════════════════════════════════════════════╗");
    println!("║          SCALPBOT BACKTESTING SUITE                   ║");
    println!("╚═══════════════════════════════════════════════════════╝");
    println!(
        "Strategy: {:?} | Quantity: {} | Cost/side: ₹{:.2}",
        settings.strategy, settings.lot_size, settings.transaction_cost
    );

    let runner = BacktestRunner::new(
        settings.risk_policy(),
        settings.lot_size,
        settings.transaction_cost,
    );

    let trades = match args.synthetic {
        Some(n) => run_synthetic(&runner, &settings, n, args.scenario, args.base_price),
        None => run_files(&runner, &settings, &args.data_dir, &args.pattern)?,
    };

    BacktestMetrics::from_trades(&trades).print_report("ALL DATA");

    if !trades.is_empty() {
        let mut writer = LedgerWriter::open(&args.ledger)
            .with_context(|| format!("failed to open ledger {}", args.ledger.display()))?;
        writer.append_all(&trades)?;
        println!(
            "\n✅ {} trades appended to {}",
            writer.written(),
            writer.path().display()
        );
    }

    Ok(())
}

/// Candle files matching `pattern`, sorted by name
fn discover_files(data_dir: &Path, pattern: &str) -> anyhow::Result<Vec<PathBuf>> {
    let mut files: Vec<PathBuf> = std::fs::read_dir(data_dir)
        .with_context(|| format!("cannot read {}", data_dir.display()))?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|path| {
            let name = path.file_name().map(|n| n.to_string_lossy()).unwrap_or_default();
            name.starts_with(pattern) && name.ends_with(".csv")
        })
        .collect();
    files.sort();
    Ok(files)
}

/// `NIFTY_3MIN_2026-02-06_CALL.csv` groups under `3MIN_CALL`
fn group_key(path: &Path) -> String {
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let parts: Vec<&str> = stem.split('_').collect();

    let interval = parts
        .iter()
        .find(|p| p.ends_with("MIN"))
        .copied()
        .unwrap_or("OTHER");
    let side = if parts.contains(&"CALL") {
        "CALL"
    } else if parts.contains(&"PUT") {
        "PUT"
    } else {
        "MIXED"
    };

    format!("{}_{}", interval, side)
}

fn run_files(
    runner: &BacktestRunner,
    settings: &Settings,
    data_dir: &Path,
    pattern: &str,
) -> anyhow::Result<Vec<TradeRecord>> {
    let files = discover_files(data_dir, pattern)?;
    if files.is_empty() {
        anyhow::bail!(
            "no files starting with '{}' in {}",
            pattern,
            data_dir.display()
        );
    }
    println!("📁 Found {} candle files", files.len());

    let mut groups: BTreeMap<String, Vec<TradeRecord>> = BTreeMap::new();

    for file in &files {
        let label = file
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();

        let series = match load_candle_series(file) {
            Ok(series) => series,
            Err(e) => {
                eprintln!("❌ {}: {}", label, e);
                continue;
            }
        };

        let mut file_trades = Vec::new();
        for (symbol, candles) in &series {
            let instrument = Instrument::new(symbol, "");
            match runner.run(settings.build_strategy(), &instrument, candles) {
                Ok(result) => file_trades.extend(result.ledger.into_trades()),
                Err(e) => eprintln!("❌ {} {}: {}", label, symbol, e),
            }
        }

        BacktestMetrics::from_trades(&file_trades).print_report(&label);
        BacktestMetrics::print_trades(&file_trades);
        groups.entry(group_key(file)).or_default().extend(file_trades);
    }

    for (key, trades) in &groups {
        BacktestMetrics::from_trades(trades).print_report(&format!("{} COMBINED", key));
    }

    Ok(groups.into_values().flatten().collect())
}

fn run_synthetic(
    runner: &BacktestRunner,
    settings: &Settings,
    n: usize,
    only: Option<MarketScenario>,
    base_price: f64,
) -> Vec<TradeRecord> {
    let scenarios = [
        (MarketScenario::Uptrend, "📈 Uptrend"),
        (MarketScenario::Downtrend, "📉 Downtrend"),
        (MarketScenario::Sideways, "↔️  Sideways"),
        (MarketScenario::Swing, "🔁 Swing"),
        (MarketScenario::Volatile, "⚡ Volatile"),
    ];
    let instrument = Instrument::new("SYNTH", "");
    let interval = settings.interval.minutes();

    let mut all_metrics = Vec::new();
    let mut all_trades = Vec::new();

    for (scenario, name) in scenarios {
        if only.is_some_and(|o| o != scenario) {
            continue;
        }
        let candles = SyntheticDataGenerator::new(42)
            .with_base_price(base_price)
            .generate(scenario, n, interval);

        match runner.run(settings.build_strategy(), &instrument, &candles) {
            Ok(result) => {
                result.metrics.print_report(name);
                BacktestMetrics::print_trades(result.ledger.trades());
                all_metrics.push((name, result.metrics));
                all_trades.extend(result.ledger.into_trades());
            }
            Err(e) => eprintln!("❌ Backtest failed for {}: {}", name, e),
        }
    }

    print_summary_comparison(&all_metrics);
    all_trades
}

fn print_summary_comparison(results: &[(&str, BacktestMetrics)]) {
    println!("\n╔═══════════════════════════════════════════════════════╗");
    println!("║              SCENARIO COMPARISON                      ║");
    println!("╚═══════════════════════════════════════════════════════╝\n");

    println!(
        "{:<20} {:>12} {:>8} {:>8} {:>12}",
        "Scenario", "P&L", "Trades", "Win%", "Drawdown"
    );
    println!("{}", "─".repeat(64));

    for (name, metrics) in results {
        println!(
            "{:<20} {:>12.2} {:>8} {:>8.1} {:>12.2}",
            name, metrics.total_pnl, metrics.total_trades, metrics.win_rate, metrics.max_drawdown
        );
    }

    if let Some((best, metrics)) = results
        .iter()
        .max_by(|a, b| a.1.total_pnl.total_cmp(&b.1.total_pnl))
    {
        println!("\n🏆 Best Scenario: {} (₹{:+.2})", best, metrics.total_pnl);
    }
    if let Some((worst, metrics)) = results
        .iter()
        .min_by(|a, b| a.1.total_pnl.total_cmp(&b.1.total_pnl))
    {
        println!("⚠️  Worst Scenario: {} (₹{:+.2})", worst, metrics.total_pnl);
    }

    println!("\n═══════════════════════════════════════════════════════\n");
}
