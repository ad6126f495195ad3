//! Worked examples: entry levels and partial take-profit, gap stop,
//! trailing stop, and regime classification.

use chrono::NaiveDate;
use std::collections::BTreeMap;

use swinglab_core::book::{PositionBook, PositionEvent};
use swinglab_core::domain::{
    Bar, ExitType, FeatureRow, MarketSnapshot, Position, PositionState, Regime,
};
use swinglab_core::engine::{Backtest, EngineConfig};
use swinglab_core::features::FeatureSet;
use swinglab_core::regime::RegimeThresholds;

// ── Helpers ──────────────────────────────────────────────────────────

fn date(m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, m, d).unwrap()
}

fn bull_market(date: NaiveDate) -> MarketSnapshot {
    MarketSnapshot {
        date,
        close: 1250.0,
        ma50: 1200.0,
        ma200: 1150.0,
        rsi: 62.0,
        adx: 30.0,
        boll_width: 0.15,
    }
}

/// A row that passes every canonical bull filter at `close`.
fn breakout_row(ticker: &str, date: NaiveDate, ohlc: (f64, f64, f64, f64), atr: f64) -> FeatureRow {
    let (open, high, low, close) = ohlc;
    FeatureRow {
        bar: Bar::ohlcv(ticker, date, open, high, low, close, 1_000_000.0),
        sma_5: close * 0.95,
        sma_50: close * 0.9,
        sma_200: close * 0.8,
        rsi_14: 65.0,
        macd: 0.8,
        macd_signal: 0.3,
        boll_upper: close * 1.1,
        boll_lower: close * 0.9,
        boll_width: 0.2,
        atr_14: atr,
        volume_ma20: 1_000_000.0,
        volume_spike: 1.5,
        mfi_14: 60.0,
        obv: 2_000_000.0,
        obv_prev: 1_000_000.0,
        market: bull_market(date),
    }
}

fn book_with(position: Position) -> PositionBook {
    PositionBook::from_positions([position])
}

fn evaluate(
    book: &mut PositionBook,
    row: &FeatureRow,
    cfg: &EngineConfig,
) -> Vec<(String, PositionEvent)> {
    let rows: BTreeMap<&str, &FeatureRow> = [(row.ticker(), row)].into_iter().collect();
    book.evaluate(row.date(), |t| rows.get(t).copied(), Regime::Bull, cfg, None)
}

// ── A. Entry levels and partial take-profit ──────────────────────────

#[test]
fn scenario_a_entry_then_partial_take_profit() {
    let mut cfg = EngineConfig::default();
    cfg.regimes.bull.atr_multiplier = 1.5;

    // Friday entry, Monday is the next session (3 calendar days held).
    let fri = date(5, 3);
    let mon = date(5, 6);
    let rows = vec![
        breakout_row("FPT", fri, (99.0, 101.0, 98.0, 100.0), 4.0),
        breakout_row("FPT", mon, (104.0, 108.0, 103.0, 107.0), 4.0),
    ];
    let market: BTreeMap<_, _> = [(fri, bull_market(fri)), (mon, bull_market(mon))].into();
    let closes: BTreeMap<_, _> = [(fri, 1250.0), (mon, 1250.0)].into();
    let set = FeatureSet::from_parts(rows, market, "VNINDEX", closes);

    let mut bt = Backtest::new(cfg, &set, None, None).unwrap();
    let day1 = bt.step().unwrap();
    assert_eq!(day1.regime, Regime::Bull);
    assert_eq!(day1.entries, vec!["FPT".to_string()]);

    let pos = bt.book().get("FPT").unwrap().clone();
    assert_eq!(pos.entry_price, 100.0);
    assert!((pos.take_profit - 106.0).abs() < 1e-9);
    assert!((pos.stop_loss - 94.0).abs() < 1e-9);
    assert_eq!(pos.shares, 10_000);

    let day2 = bt.step().unwrap();
    assert_eq!(day2.trades.len(), 1);
    let trade = &day2.trades[0];
    assert_eq!(trade.exit_type, ExitType::TakeProfit);
    assert!(trade.partial);
    assert!((trade.exit_price - 106.0).abs() < 1e-9);
    assert_eq!(trade.shares, 4_000);

    let pos = bt.book().get("FPT").unwrap();
    assert_eq!(pos.state, PositionState::PartialExit);
    assert_eq!(pos.shares, 6_000);
    assert!((pos.take_profit - 121.9).abs() < 1e-9);
    assert!((pos.stop_loss - 100.0).abs() < 1e-9);

    let result = bt.finish();
    assert_eq!(result.trades.len(), 1);
    assert_eq!(result.final_positions.len(), 1);
}

// ── B. Gap below the stop ────────────────────────────────────────────

#[test]
fn scenario_b_gap_stop_fills_at_open() {
    let cfg = EngineConfig::default();
    let mut book = book_with(Position::open(
        "HPG",
        date(5, 3),
        100.0,
        1_000,
        106.0,
        94.0,
        cfg.trailing_pct,
        date(6, 17),
    ));
    let row = breakout_row("HPG", date(5, 6), (90.0, 92.0, 89.0, 91.0), 4.0);
    let events = evaluate(&mut book, &row, &cfg);

    let PositionEvent::Exit { trade } = &events[0].1 else {
        panic!("expected full exit, got {:?}", events[0].1);
    };
    assert_eq!(trade.exit_type, ExitType::GapStopLoss);
    assert_eq!(trade.exit_price, 90.0);
    assert!((trade.return_pct() - -10.0).abs() < 1e-9);
    assert!(trade.profit < 0.0);
    assert!(!book.contains("HPG"));
}

// ── C. Trailing stop ─────────────────────────────────────────────────

#[test]
fn scenario_c_trailing_stop_exits_at_close() {
    let cfg = EngineConfig::default();
    let mut book = book_with(Position::open(
        "MWG",
        date(5, 3),
        100.0,
        1_000,
        140.0,
        94.0,
        0.05,
        date(6, 17),
    ));

    let run_up = breakout_row("MWG", date(5, 10), (127.0, 130.0, 126.0, 128.0), 4.0);
    let events = evaluate(&mut book, &run_up, &cfg);
    assert!(matches!(events[0].1, PositionEvent::Updated { .. }));
    let pos = book.get("MWG").unwrap();
    assert_eq!(pos.highest_price, 130.0);
    assert!((pos.trailing_stop - 123.5).abs() < 1e-9);

    let pullback = breakout_row("MWG", date(5, 13), (124.0, 125.0, 121.5, 122.0), 4.0);
    let events = evaluate(&mut book, &pullback, &cfg);
    let trade = events[0].1.trade().unwrap();
    assert_eq!(trade.exit_type, ExitType::TrailingStop);
    assert_eq!(trade.exit_price, 122.0);
    assert!(!trade.partial);
    assert!(book.is_empty());
}

// ── D. Regime ────────────────────────────────────────────────────────

#[test]
fn scenario_d_bull_market() {
    let snapshot = MarketSnapshot {
        date: date(5, 6),
        close: 1200.0,
        ma50: 1150.0,
        ma200: 1100.0,
        rsi: 60.0,
        adx: 22.0,
        boll_width: 0.1,
    };
    for name in ["canonical", "engine", "live"] {
        let thresholds = RegimeThresholds::preset(name).unwrap();
        assert_eq!(thresholds.classify(&snapshot), Regime::Bull, "preset {name}");
    }
    assert_eq!(swinglab_core::regime::classify(&snapshot), Regime::Bull);
}
