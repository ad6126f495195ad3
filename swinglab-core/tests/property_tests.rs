//! Property tests for engine invariants.
//!
//! Uses proptest to verify:
//! 1. Ratchet monotonicity: the trailing stop never loosens
//! 2. Regime exhaustiveness: every snapshot maps to exactly one regime
//! 3. Cash conservation: reconcile never creates or destroys cash
//! 4. Run invariants: minimum holding, non-negative equity, book
//!    membership, determinism
//! 5. Day by day: equity equals initial capital plus realized and open
//!    P&L, and a held position's trailing stop never drops

use chrono::{Days, NaiveDate};
use proptest::prelude::*;
use std::collections::BTreeMap;

use swinglab_core::calendar::TradingCalendar;
use swinglab_core::domain::{Bar, FeatureRow, MarketSnapshot, Position, PositionState, Regime};
use swinglab_core::engine::{run_backtest, Backtest, EngineConfig};
use swinglab_core::features::FeatureSet;
use swinglab_core::ledger::{CapitalLedger, CapitalMode};
use swinglab_core::regime::RegimeThresholds;

// ── Strategies (proptest) ────────────────────────────────────────────

fn arb_price() -> impl Strategy<Value = f64> {
    (10.0..500.0_f64).prop_map(|p| (p * 100.0).round() / 100.0)
}

fn arb_snapshot() -> impl Strategy<Value = MarketSnapshot> {
    (
        prop_oneof![900.0..1500.0_f64, Just(f64::NAN)],
        900.0..1500.0_f64,
        900.0..1500.0_f64,
        0.0..100.0_f64,
        5.0..60.0_f64,
        0.0..0.8_f64,
    )
        .prop_map(|(close, ma50, ma200, rsi, adx, boll_width)| MarketSnapshot {
            date: NaiveDate::from_ymd_opt(2024, 1, 2).unwrap(),
            close,
            ma50,
            ma200,
            rsi,
            adx,
            boll_width,
        })
}

/// One simulated session for one ticker.
#[derive(Debug, Clone)]
struct Step {
    ret: f64,
    gap: f64,
    range: f64,
    rsi: f64,
    mfi: f64,
    obv_up: bool,
    volume: f64,
    momentum: f64,
}

fn arb_step() -> impl Strategy<Value = Step> {
    (
        -0.06..0.06_f64,
        -0.04..0.04_f64,
        0.0..0.04_f64,
        20.0..80.0_f64,
        10.0..80.0_f64,
        any::<bool>(),
        prop_oneof![Just(5_000.0), 400_000.0..3_000_000.0_f64],
        -0.02..0.06_f64,
    )
        .prop_map(|(ret, gap, range, rsi, mfi, obv_up, volume, momentum)| Step {
            ret,
            gap,
            range,
            rsi,
            mfi,
            obv_up,
            volume,
            momentum,
        })
}

fn market_for(kind: u8, date: NaiveDate) -> MarketSnapshot {
    let (close, rsi, adx, boll_width) = match kind % 3 {
        0 => (1250.0, 62.0, 30.0, 0.15),
        1 => (1190.0, 50.0, 18.0, 0.1),
        _ => (1100.0, 35.0, 35.0, 0.5),
    };
    MarketSnapshot {
        date,
        close,
        ma50: 1200.0,
        ma200: 1150.0,
        rsi,
        adx,
        boll_width,
    }
}

fn build_set(paths: &[Vec<Step>], regimes: &[u8]) -> FeatureSet {
    let start = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
    let dates: Vec<NaiveDate> = (0..regimes.len() as u64)
        .map(|i| start.checked_add_days(Days::new(i + i / 5 * 2)).unwrap())
        .collect();

    let mut rows = Vec::new();
    for (t, path) in paths.iter().enumerate() {
        let ticker = format!("T{t:02}");
        let mut prev = 50.0 + 10.0 * t as f64;
        let mut obv = 1_000_000.0;
        for (i, (step, &date)) in path.iter().zip(&dates).enumerate() {
            let open = prev * (1.0 + step.gap);
            let close = (prev * (1.0 + step.ret)).max(1.0);
            let high = open.max(close) * (1.0 + step.range);
            let low = open.min(close) * (1.0 - step.range);
            let obv_prev = obv;
            obv += if step.obv_up { step.volume } else { -step.volume };
            rows.push(FeatureRow {
                bar: Bar::ohlcv(&ticker, date, open, high, low, close, step.volume),
                sma_5: close / (1.0 + step.momentum),
                sma_50: close * 0.92,
                sma_200: close * 0.85,
                rsi_14: step.rsi,
                macd: 0.4,
                macd_signal: 0.1,
                boll_upper: close * 1.08,
                boll_lower: close * 0.92,
                boll_width: 0.16,
                atr_14: close * 0.03,
                volume_ma20: 1_000_000.0,
                volume_spike: step.volume / 1_000_000.0,
                mfi_14: step.mfi,
                obv,
                obv_prev,
                market: market_for(regimes[i], date),
            });
            prev = close;
        }
    }

    let market: BTreeMap<_, _> = dates
        .iter()
        .zip(regimes)
        .map(|(d, k)| (*d, market_for(*k, *d)))
        .collect();
    let closes = market.iter().map(|(d, m)| (*d, m.close)).collect();
    FeatureSet::from_parts(rows, market, "VNINDEX", closes)
}

fn arb_universe() -> impl Strategy<Value = (Vec<Vec<Step>>, Vec<u8>)> {
    (20usize..40).prop_flat_map(|days| {
        (
            prop::collection::vec(prop::collection::vec(arb_step(), days), 2..5),
            prop::collection::vec(prop_oneof![3 => Just(0u8), 1 => Just(1u8), 1 => Just(2u8)], days),
        )
    })
}

// ── 1. Ratchet monotonicity ──────────────────────────────────────────

proptest! {
    /// Highs and pyramid proposals in any order never lower the trailing stop.
    #[test]
    fn trailing_stop_never_loosens(
        entry in arb_price(),
        moves in prop::collection::vec((any::<bool>(), 0.5..1.5_f64), 1..50),
    ) {
        let date = NaiveDate::from_ymd_opt(2024, 1, 2).unwrap();
        let mut pos = Position::open("ACB", date, entry, 100, entry * 1.1, entry * 0.9, 0.05, date);
        let mut last = pos.trailing_stop;
        for (is_high, factor) in moves {
            if is_high {
                pos.observe_high(entry * factor, 0.05);
            } else {
                pos.ratchet_trailing(entry * factor);
            }
            prop_assert!(pos.trailing_stop >= last);
            prop_assert!(pos.highest_price >= entry);
            last = pos.trailing_stop;
        }
    }
}

// ── 2. Regime exhaustiveness ─────────────────────────────────────────

proptest! {
    #[test]
    fn every_snapshot_has_one_regime(snapshot in arb_snapshot()) {
        for name in ["canonical", "engine", "live"] {
            let thresholds = RegimeThresholds::preset(name).unwrap();
            let regime = thresholds.classify(&snapshot);
            prop_assert!(Regime::ALL.contains(&regime));
            prop_assert_eq!(regime, thresholds.classify(&snapshot));
            if !snapshot.close.is_finite() {
                prop_assert_eq!(regime, Regime::Bear);
            }
        }
    }
}

// ── 3. Cash conservation ─────────────────────────────────────────────

proptest! {
    /// Only debits and recorded sales change total cash; settle and
    /// reconcile move it between buckets.
    #[test]
    fn ledger_conserves_cash(
        initial in 1_000.0..1_000_000.0_f64,
        base_fraction in 0.5..1.0_f64,
        ops in prop::collection::vec((0u8..4, 0.0..1.0_f64, 0usize..10), 1..60),
    ) {
        let start = NaiveDate::from_ymd_opt(2024, 3, 1).unwrap();
        let dates: Vec<_> = (0..10).map(|i| start.checked_add_days(Days::new(i)).unwrap()).collect();
        let mode = if base_fraction > 0.75 { CapitalMode::Vault } else { CapitalMode::Reinvest };
        let mut ledger = CapitalLedger::new(initial, initial * base_fraction, mode, 0.001, TradingCalendar::new(dates.clone()));
        let mut held: Vec<Position> = Vec::new();
        let mut expected = ledger.cash_total();

        for (op, amount, day) in ops {
            let date = dates[day];
            match op {
                0 => {
                    let cost = ledger.available_working_capital() * amount;
                    if ledger.debit(cost).is_ok() {
                        expected -= cost;
                        held.push(Position::open("SSI", date, cost.max(1.0), 1, 0.0, 0.0, 0.05, date));
                    }
                }
                1 => {
                    let proceeds = initial * amount * 0.1;
                    ledger.record_pending_settlement(date, proceeds);
                    expected += proceeds;
                    held.pop();
                }
                2 => {
                    ledger.settle(date);
                }
                _ => {
                    ledger.reconcile(held.iter());
                }
            }
            let s = ledger.state();
            prop_assert!((ledger.cash_total() - expected).abs() < 1e-6 * expected.abs().max(1.0));
            prop_assert!(s.working_capital >= -1e-9);
            prop_assert!(s.profit_vault >= -1e-9);
        }
    }
}

// ── 4. Run invariants ────────────────────────────────────────────────

proptest! {
    #![proptest_config(ProptestConfig::with_cases(48))]

    #[test]
    fn backtest_invariants((paths, regimes) in arb_universe()) {
        let set = build_set(&paths, &regimes);
        let cfg = EngineConfig::default();
        let result = run_backtest(cfg.clone(), &set, None, None).unwrap();

        // The curve covers the whole calendar.
        prop_assert_eq!(result.equity_curve.len(), regimes.len());
        prop_assert_eq!(result.date_count, regimes.len());

        for sample in &result.equity_curve {
            prop_assert!(sample.total_equity >= 0.0);
            prop_assert!(sample.working_capital >= -1e-6);
        }

        for trade in &result.trades {
            prop_assert!(trade.holding_days >= cfg.min_holding_days);
            prop_assert!(trade.shares > 0);
            prop_assert!(trade.exit_date > trade.entry_date);
        }

        // Nothing closed lingers in the book; at most one position per ticker.
        let mut seen = std::collections::BTreeSet::new();
        for pos in &result.final_positions {
            prop_assert!(pos.shares > 0);
            prop_assert!(pos.state != PositionState::Closed);
            prop_assert!(seen.insert(pos.ticker.clone()));
            prop_assert!(pos.trailing_stop <= pos.highest_price);
        }

        // Identical inputs, identical outputs.
        let again = run_backtest(cfg, &set, None, None).unwrap();
        prop_assert_eq!(&result.trades, &again.trades);
        prop_assert_eq!(&result.equity_curve, &again.equity_curve);
    }
}

// ── 5. Day-by-day accounting ─────────────────────────────────────────

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn equity_and_stops_hold_every_date((paths, regimes) in arb_universe()) {
        let set = build_set(&paths, &regimes);
        let cfg = EngineConfig::default();
        let initial = cfg.capital.initial_capital;
        let commission_buy = cfg.costs.commission_buy;
        let mut bt = Backtest::new(cfg, &set, None, None).unwrap();

        let mut realized = 0.0;
        let mut stops: BTreeMap<String, (NaiveDate, f64)> = BTreeMap::new();
        while let Some(report) = bt.step() {
            realized += report.trades.iter().map(|t| t.profit).sum::<f64>();

            // Cash paid for every open lot, commission included, is what
            // the open positions are carried against.
            let mut open_pnl = 0.0;
            let mut market_value = 0.0;
            let mut next_stops = BTreeMap::new();
            for pos in bt.book().positions() {
                let close = set.row(report.date, &pos.ticker).unwrap().close();
                market_value += pos.shares as f64 * close;
                open_pnl += pos.shares as f64 * (close - pos.avg_cost * (1.0 + commission_buy));

                if let Some(&(entered, prev)) = stops.get(&pos.ticker) {
                    if entered == pos.entry_date {
                        prop_assert!(
                            pos.trailing_stop >= prev,
                            "{} trail fell from {} to {} on {}",
                            pos.ticker, prev, pos.trailing_stop, report.date
                        );
                    }
                }
                next_stops.insert(pos.ticker.clone(), (pos.entry_date, pos.trailing_stop));
            }
            stops = next_stops;

            let equity = &report.equity;
            let tolerance = 1e-6 * equity.total_equity.abs().max(1.0);
            prop_assert!((equity.market_value - market_value).abs() <= tolerance);
            prop_assert!(
                (equity.total_equity - (initial + realized + open_pnl)).abs() <= tolerance,
                "{}: equity {} vs initial {} + realized {} + open {}",
                report.date, equity.total_equity, initial, realized, open_pnl
            );
            prop_assert!(equity.total_equity >= 0.0);
        }
    }
}
