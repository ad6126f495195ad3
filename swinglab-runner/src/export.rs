//! Reporting and export — JSON, CSV, and Markdown artifact generation.
//!
//! A saved run is a directory containing:
//! - `manifest.json`: the full `BacktestResult`, schema-versioned
//! - `trades.csv`: the trade log with a `return_pct` column
//! - `equity.csv`: equity components per date, with the benchmark alongside
//! - `metrics.csv`: flat `key,value` metrics
//! - `report.md`: human-readable summary
//!
//! Manifests written by a newer schema version are rejected on load.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use chrono::NaiveDate;

use swinglab_core::domain::{Regime, Trade};

use crate::metrics::fmt_f64;
use crate::runner::{BacktestResult, SCHEMA_VERSION};

// ─── JSON export ────────────────────────────────────────────────────

/// Serialize a `BacktestResult` to pretty JSON.
pub fn export_json(result: &BacktestResult) -> Result<String> {
    serde_json::to_string_pretty(result).context("failed to serialize BacktestResult to JSON")
}

/// Deserialize a `BacktestResult` from JSON, rejecting unknown schema versions.
pub fn import_json(json: &str) -> Result<BacktestResult> {
    let result: BacktestResult =
        serde_json::from_str(json).context("failed to deserialize BacktestResult from JSON")?;
    if result.schema_version > SCHEMA_VERSION {
        bail!(
            "unsupported schema version {} (max supported: {})",
            result.schema_version,
            SCHEMA_VERSION
        );
    }
    Ok(result)
}

// ─── CSV export ─────────────────────────────────────────────────────

/// Columns: ticker, entry_date, exit_date, entry_price, exit_price, shares,
/// profit, return_pct, holding_days, exit_type, partial
pub fn export_trades_csv(trades: &[Trade]) -> Result<String> {
    let mut wtr = csv::Writer::from_writer(vec![]);
    wtr.write_record([
        "ticker",
        "entry_date",
        "exit_date",
        "entry_price",
        "exit_price",
        "shares",
        "profit",
        "return_pct",
        "holding_days",
        "exit_type",
        "partial",
    ])?;

    for t in trades {
        wtr.write_record([
            t.ticker.clone(),
            t.entry_date.to_string(),
            t.exit_date.to_string(),
            format!("{:.4}", t.entry_price),
            format!("{:.4}", t.exit_price),
            t.shares.to_string(),
            format!("{:.2}", t.profit),
            format!("{:.4}", t.return_pct()),
            t.holding_days.to_string(),
            t.exit_type.to_string(),
            t.partial.to_string(),
        ])?;
    }

    let data = wtr.into_inner().context("failed to flush CSV writer")?;
    String::from_utf8(data).context("CSV output is not valid UTF-8")
}

/// Equity components per sampled date, plus the rebased benchmark (blank
/// where the benchmark has no value).
pub fn export_equity_csv(result: &BacktestResult) -> Result<String> {
    let bench: BTreeMap<NaiveDate, f64> = result
        .benchmark_curve
        .iter()
        .map(|p| (p.date, p.equity))
        .collect();

    let mut wtr = csv::Writer::from_writer(vec![]);
    wtr.write_record([
        "date",
        "total_equity",
        "working_capital",
        "market_value",
        "pending",
        "reserve_capital",
        "profit_vault",
        "benchmark",
    ])?;
    for s in &result.equity_curve {
        wtr.write_record([
            s.date.to_string(),
            format!("{:.2}", s.total_equity),
            format!("{:.2}", s.working_capital),
            format!("{:.2}", s.market_value),
            format!("{:.2}", s.pending),
            format!("{:.2}", s.reserve_capital),
            format!("{:.2}", s.profit_vault),
            bench.get(&s.date).map(|v| format!("{v:.2}")).unwrap_or_default(),
        ])?;
    }
    let data = wtr.into_inner().context("failed to flush CSV writer")?;
    String::from_utf8(data).context("CSV output is not valid UTF-8")
}

/// Metrics and run-level figures as `key,value` rows.
pub fn export_metrics_csv(result: &BacktestResult) -> Result<String> {
    let mut rows = result.metrics.to_pairs();
    rows.push(("final_equity", format!("{:.2}", result.final_equity())));
    rows.push(("benchmark_return", fmt_f64(result.benchmark_return)));
    if let Some(mc) = &result.monte_carlo {
        rows.push(("mc_drawdown_at_percentile", fmt_f64(mc.drawdown_at_percentile)));
    }

    let mut wtr = csv::Writer::from_writer(vec![]);
    wtr.write_record(["key", "value"])?;
    for (key, value) in rows {
        wtr.write_record([key, value.as_str()])?;
    }
    let data = wtr.into_inner().context("failed to flush CSV writer")?;
    String::from_utf8(data).context("CSV output is not valid UTF-8")
}

// ─── Artifact bundle ────────────────────────────────────────────────

/// Save the full artifact set for a run under
/// `output_dir/{run_id prefix}_{timestamp}/` and return that directory.
pub fn save_artifacts(result: &BacktestResult, output_dir: &Path) -> Result<PathBuf> {
    let short_id = &result.run_id[..12.min(result.run_id.len())];
    let dirname = format!(
        "{}_{}",
        short_id,
        chrono::Local::now().format("%Y%m%d_%H%M%S")
    );
    let run_dir = output_dir.join(dirname);
    std::fs::create_dir_all(&run_dir)
        .with_context(|| format!("failed to create artifact dir: {}", run_dir.display()))?;

    let files = [
        ("manifest.json", export_json(result)?),
        ("trades.csv", export_trades_csv(&result.trades)?),
        ("equity.csv", export_equity_csv(result)?),
        ("metrics.csv", export_metrics_csv(result)?),
        ("report.md", generate_report(result)),
    ];
    for (name, contents) in files {
        let path = run_dir.join(name);
        std::fs::write(&path, contents)
            .with_context(|| format!("failed to write {}", path.display()))?;
    }

    Ok(run_dir)
}

/// Load a `BacktestResult` from an artifact directory's manifest.json.
pub fn load_artifacts(dir: &Path) -> Result<BacktestResult> {
    let manifest_path = dir.join("manifest.json");
    let json = std::fs::read_to_string(&manifest_path)
        .with_context(|| format!("failed to read {}", manifest_path.display()))?;
    import_json(&json)
}

// ─── Markdown reports ───────────────────────────────────────────────

/// Generate a Markdown report for a single backtest run.
pub fn generate_report(result: &BacktestResult) -> String {
    let mut md = String::with_capacity(4096);
    let m = &result.metrics;
    let period = match (result.start_date, result.end_date) {
        (Some(a), Some(b)) => format!("{a} to {b}"),
        _ => "no trading dates".to_string(),
    };

    md.push_str("# Backtest Report\n\n");

    md.push_str("## Metadata\n\n");
    md.push_str("| Field | Value |\n");
    md.push_str("| --- | --- |\n");
    md.push_str(&format!("| Run ID | {} |\n", result.run_id));
    md.push_str(&format!("| Period | {period} |\n"));
    md.push_str(&format!("| Benchmark | {} |\n", result.benchmark));
    md.push_str(&format!("| Initial Capital | {:.0} |\n", result.initial_capital));
    md.push_str(&format!("| Final Equity | {:.0} |\n", result.final_equity()));
    md.push_str(&format!("| Dataset Hash | {} |\n", result.dataset_hash));
    md.push('\n');

    md.push_str("## Performance\n\n");
    md.push_str("| Metric | Strategy | Benchmark |\n");
    md.push_str("| --- | --- | --- |\n");
    md.push_str(&format!(
        "| Total Return | {} | {} |\n",
        pct(m.total_return),
        pct(result.benchmark_return)
    ));
    md.push_str(&format!("| CAGR | {} | |\n", pct(m.cagr)));
    md.push_str(&format!("| Sharpe | {} | |\n", ratio(m.sharpe)));
    md.push_str(&format!("| Sortino | {} | |\n", ratio(m.sortino)));
    md.push_str(&format!("| Max Drawdown | {} | |\n", pct(m.max_drawdown)));
    md.push_str(&format!("| Calmar | {} | |\n", ratio(m.calmar)));
    md.push('\n');

    md.push_str("## Trades\n\n");
    md.push_str("| Metric | Value |\n");
    md.push_str("| --- | --- |\n");
    md.push_str(&format!("| Trades | {} |\n", m.trade_count));
    md.push_str(&format!("| Win Rate | {} |\n", pct(m.win_rate)));
    md.push_str(&format!("| Profit Factor | {} |\n", ratio(m.profit_factor)));
    md.push_str(&format!("| Avg Holding Days | {:.1} |\n", m.avg_holding_days));
    md.push_str(&format!("| Max Consecutive Wins | {} |\n", m.max_consecutive_wins));
    md.push_str(&format!(
        "| Max Consecutive Losses | {} |\n",
        m.max_consecutive_losses
    ));
    md.push('\n');

    if !result.trades.is_empty() {
        md.push_str("### Exits by Type\n\n");
        md.push_str("| Exit | Count | Profit |\n");
        md.push_str("| --- | --- | --- |\n");
        let mut by_type: BTreeMap<&str, (usize, f64)> = BTreeMap::new();
        for t in &result.trades {
            let e = by_type.entry(t.exit_type.as_str()).or_default();
            e.0 += 1;
            e.1 += t.profit;
        }
        for (kind, (count, profit)) in by_type {
            md.push_str(&format!("| {kind} | {count} | {profit:.0} |\n"));
        }
        md.push('\n');
    }

    md.push_str("## Regimes\n\n");
    md.push_str("| Regime | Dates |\n");
    md.push_str("| --- | --- |\n");
    for regime in Regime::ALL {
        let n = result.regime_counts.get(&regime).copied().unwrap_or(0);
        md.push_str(&format!("| {} | {n} |\n", regime.as_str()));
    }
    md.push('\n');

    md.push_str("## Capital\n\n");
    md.push_str("| Bucket | Value |\n");
    md.push_str("| --- | --- |\n");
    let c = &result.final_capital;
    md.push_str(&format!("| Working Capital | {:.0} |\n", c.working_capital));
    md.push_str(&format!("| Reserve | {:.0} |\n", c.reserve_capital));
    md.push_str(&format!("| Profit Vault | {:.0} |\n", c.profit_vault));
    md.push_str(&format!("| Pending Settlement | {:.0} |\n", result.final_pending));
    md.push_str(&format!("| Open Positions | {} |\n", result.final_positions.len()));
    md.push('\n');

    if let Some(mc) = &result.monte_carlo {
        md.push_str("## Monte Carlo\n\n");
        md.push_str(&format!(
            "{} paths of {} sessions (seed {}): {:.0}th percentile drawdown {}, median drawdown {}, worst {}.\n\n",
            mc.simulations,
            mc.horizon,
            mc.seed,
            mc.percentile * 100.0,
            pct(mc.drawdown_at_percentile),
            pct(mc.median_drawdown),
            pct(mc.worst_drawdown)
        ));
    }

    if !result.warnings.is_empty() {
        md.push_str("## Warnings\n\n");
        for w in &result.warnings {
            md.push_str(&format!("- {w}\n"));
        }
        md.push('\n');
    }

    md
}

fn pct(v: f64) -> String {
    if v.is_finite() {
        format!("{:.2}%", v * 100.0)
    } else {
        fmt_f64(v)
    }
}

fn ratio(v: f64) -> String {
    if v.is_finite() {
        format!("{v:.2}")
    } else {
        fmt_f64(v)
    }
}
