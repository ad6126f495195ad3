//! SwingLab CLI — backtest, screen, and evaluate commands.
//!
//! Commands:
//! - `backtest` — run a backtest from a TOML config and save its artifacts
//! - `screen` — rank buy candidates on the latest session in the bar table
//! - `evaluate` — check stored open positions against the latest session

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use log::{info, warn};

use swinglab_core::book::PositionEvent;
use swinglab_core::engine::EngineConfig;
use swinglab_core::features::{FeatureEngine, FeatureSet};
use swinglab_core::live::{evaluate_open_positions, screen_latest, LatestScreen, PositionStore};
use swinglab_runner::{load_bars, run_backtest, save_artifacts, BacktestResult, RunConfig};

#[derive(Parser)]
#[command(
    name = "swinglab",
    about = "SwingLab CLI — regime-adaptive swing trading backtester and screener"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

/// Where the bars and thresholds come from: a config file, or a bare data
/// file with default settings.
#[derive(clap::Args)]
struct Source {
    /// Path to a TOML run config.
    #[arg(long, conflicts_with = "data")]
    config: Option<PathBuf>,

    /// Bar table (CSV or Parquet), used with default settings and the
    /// live regime thresholds.
    #[arg(long)]
    data: Option<PathBuf>,

    /// Benchmark ticker (overrides the config).
    #[arg(long)]
    benchmark: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Execute a backtest from a TOML config file.
    Backtest {
        /// Path to a TOML config file.
        #[arg(long)]
        config: PathBuf,

        /// Output directory for artifacts.
        #[arg(long, default_value = "results")]
        output_dir: PathBuf,

        /// Skip writing artifacts.
        #[arg(long, default_value_t = false)]
        no_save: bool,
    },
    /// Screen the latest session for buy candidates.
    Screen {
        #[command(flatten)]
        source: Source,

        /// Print JSON instead of a table.
        #[arg(long, default_value_t = false)]
        json: bool,
    },
    /// Evaluate stored open positions against the latest session.
    Evaluate {
        #[command(flatten)]
        source: Source,

        /// Position store (JSON). Missing files start empty.
        #[arg(long, default_value = "positions.json")]
        state: PathBuf,

        /// Report events without rewriting the store.
        #[arg(long, default_value_t = false)]
        dry_run: bool,

        /// Print JSON instead of a table.
        #[arg(long, default_value_t = false)]
        json: bool,
    },
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let cli = Cli::parse();

    match cli.command {
        Commands::Backtest {
            config,
            output_dir,
            no_save,
        } => run_backtest_cmd(&config, &output_dir, no_save),
        Commands::Screen { source, json } => run_screen(&source, json),
        Commands::Evaluate {
            source,
            state,
            dry_run,
            json,
        } => run_evaluate(&source, &state, dry_run, json),
    }
}

fn run_backtest_cmd(config_path: &Path, output_dir: &Path, no_save: bool) -> Result<()> {
    let config = RunConfig::from_file(config_path)?;
    let result = run_backtest(&config)?;

    print_summary(&result);

    if !no_save {
        match save_artifacts(&result, output_dir) {
            Ok(run_dir) => println!("Artifacts saved to: {}", run_dir.display()),
            Err(e) => warn!("failed to save artifacts: {e:#}"),
        }
    }
    Ok(())
}

fn run_screen(source: &Source, json: bool) -> Result<()> {
    let (engine, features) = prepare(source)?;
    let screen = screen_latest(&features, &engine)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&screen)?);
    } else {
        print_screen(&screen);
    }
    Ok(())
}

fn run_evaluate(source: &Source, state: &Path, dry_run: bool, json: bool) -> Result<()> {
    let (engine, features) = prepare(source)?;
    let mut store = PositionStore::load(state)?;
    if store.is_empty() {
        info!("no open positions in {}", state.display());
    }

    let Some(today) = features.last_row_date() else {
        bail!("no feature rows to evaluate against");
    };
    let events = evaluate_open_positions(&mut store, features.rows_on(today), &engine)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&events)?);
    } else {
        print_events(today, &events, store.len());
    }

    if !dry_run {
        if let Err(e) = store.save(state) {
            warn!("failed to save position store: {e}");
        }
    }
    Ok(())
}

/// Resolve the config, load bars and compute features.
fn prepare(source: &Source) -> Result<(EngineConfig, FeatureSet)> {
    let mut config = match (&source.config, &source.data) {
        (Some(path), _) => RunConfig::from_file(path)?,
        (None, Some(data)) => {
            let mut c = RunConfig::default();
            c.data.path = data.clone();
            c.regime.preset = "live".into();
            c
        }
        (None, None) => bail!("one of --config or --data is required"),
    };
    if let Some(b) = &source.benchmark {
        config.data.benchmark = b.clone();
    }
    config.validate()?;

    let engine = config.engine_config()?;
    let loaded = load_bars(&config.data)?;
    let features = FeatureEngine::new()
        .compute(&loaded.bars, &config.data.benchmark)
        .with_context(|| format!("computing features from {}", config.data.path.display()))?;
    Ok((engine, features))
}

fn print_summary(result: &BacktestResult) {
    let m = &result.metrics;
    println!();
    println!("=== Backtest Result ===");
    match (result.start_date, result.end_date) {
        (Some(a), Some(b)) => println!("Period:         {a} to {b}"),
        _ => println!("Period:         (no trading dates)"),
    }
    println!("Benchmark:      {}", result.benchmark);
    println!("Trades:         {}", m.trade_count);
    println!("Open at end:    {}", result.final_positions.len());
    println!();
    println!("--- Performance ---");
    println!("Total Return:   {:.2}%", m.total_return * 100.0);
    println!("Benchmark:      {:.2}%", result.benchmark_return * 100.0);
    println!("CAGR:           {:.2}%", m.cagr * 100.0);
    println!("Sharpe:         {:.3}", m.sharpe);
    println!("Sortino:        {:.3}", m.sortino);
    println!("Calmar:         {:.3}", m.calmar);
    println!("Max Drawdown:   {:.2}%", m.max_drawdown * 100.0);
    println!("Win Rate:       {:.1}%", m.win_rate * 100.0);
    println!("Profit Factor:  {:.2}", m.profit_factor);
    println!("Avg Hold Days:  {:.1}", m.avg_holding_days);
    println!("Max Consec Win: {}", m.max_consecutive_wins);
    println!("Max Consec Loss:{}", m.max_consecutive_losses);
    println!();
    println!("--- Regimes ---");
    for (regime, days) in &result.regime_counts {
        println!("{:<16}{days}", format!("{regime}:"));
    }
    if let Some(mc) = &result.monte_carlo {
        println!();
        println!(
            "Monte Carlo:    {:.0}th percentile drawdown {:.2}% ({} paths x {} sessions)",
            mc.percentile * 100.0,
            mc.drawdown_at_percentile * 100.0,
            mc.simulations,
            mc.horizon
        );
    }
    for w in &result.warnings {
        println!("WARNING: {w}");
    }
    println!();
}

fn print_screen(screen: &LatestScreen) {
    println!();
    println!("=== Screen {} ({} market) ===", screen.date, screen.regime);
    if screen.plans.is_empty() {
        println!("No candidates.");
        println!();
        return;
    }
    println!(
        "{:<8} {:>8} {:>12} {:>12} {:>12} {:>10}",
        "Ticker", "Score", "Entry", "Take Profit", "Stop Loss", "ATR"
    );
    println!("{}", "-".repeat(67));
    for p in &screen.plans {
        println!(
            "{:<8} {:>8.3} {:>12.2} {:>12.2} {:>12.2} {:>10.2}",
            p.ticker, p.score, p.entry, p.take_profit, p.stop_loss, p.atr
        );
    }
    println!();
}

fn print_events(date: chrono::NaiveDate, events: &[(String, PositionEvent)], held: usize) {
    println!();
    println!("=== Evaluate {date} ===");
    if events.is_empty() {
        println!("No events.");
    }
    for (ticker, event) in events {
        match event {
            PositionEvent::Exit { trade } => println!(
                "{ticker:<8} SELL ALL  {} shares at {:.2} ({}, {:+.2}%)",
                trade.shares,
                trade.exit_price,
                trade.exit_type,
                trade.return_pct()
            ),
            PositionEvent::PartialExit { trade, remaining } => println!(
                "{ticker:<8} SELL PART {} shares at {:.2} ({}), {remaining} left",
                trade.shares, trade.exit_price, trade.exit_type
            ),
            PositionEvent::Deferred {
                exit_type,
                signal_date,
                ..
            } => println!("{ticker:<8} DEFERRED  {exit_type} signalled {signal_date}, sell at next open"),
            PositionEvent::Pyramid { shares, price, .. } => {
                println!("{ticker:<8} ADD       {shares} shares at {price:.2}")
            }
            PositionEvent::Updated {
                trailing_stop,
                highest_price,
                stop_loss,
                take_profit,
            } => println!(
                "{ticker:<8} UPDATE    trail {trailing_stop:.2} high {highest_price:.2} sl {stop_loss:.2} tp {take_profit:.2}"
            ),
        }
    }
    println!("Positions held: {held}");
    println!();
}
