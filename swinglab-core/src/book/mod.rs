//! Position book — open positions keyed by ticker and the per-date exit loop.
//!
//! For each held ticker with a bar today the book, in order:
//! 1. executes a deferred exit at the open (once the minimum hold is met),
//! 2. ratchets the highest price and trailing stop,
//! 3. detects gap, intraday and forced exits (see [`exit`]),
//! 4. adds to a Bull-market winner when nothing fired (backtest only),
//! 5. executes the exit, deferring it when the day's volume is too thin.
//!
//! Sale proceeds go to the ledger as pending settlements. Without a ledger
//! (live mode) exits are still recorded but no cash moves and no pyramid fires.

pub mod costs;
pub mod exit;
pub mod liquidity;

pub use costs::CostModel;
pub use exit::ExitSignal;
pub use liquidity::LiquidityPolicy;

use std::collections::BTreeMap;

use chrono::NaiveDate;
use log::debug;
use serde::{Deserialize, Serialize};

use crate::domain::{DeferredExit, ExitType, FeatureRow, Position, PositionState, Regime, Trade};
use crate::engine::config::EngineConfig;
use crate::ledger::CapitalLedger;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum BookError {
    #[error("a position in {0} is already open")]
    AlreadyOpen(String),

    #[error("position in {0} has no shares")]
    Empty(String),
}

/// What happened to one position on one date.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum PositionEvent {
    /// The whole remaining holding was sold.
    Exit { trade: Trade },
    /// A profit-take sold part of the holding.
    PartialExit { trade: Trade, remaining: u64 },
    /// An exit fired but the session could not absorb the sale.
    Deferred {
        exit_type: ExitType,
        partial: bool,
        signal_date: NaiveDate,
    },
    /// Shares added to a winner.
    Pyramid { shares: u64, price: f64, cost: f64 },
    /// No exit; the stops or targets moved.
    Updated {
        trailing_stop: f64,
        highest_price: f64,
        stop_loss: f64,
        take_profit: f64,
    },
}

impl PositionEvent {
    pub fn trade(&self) -> Option<&Trade> {
        match self {
            PositionEvent::Exit { trade } | PositionEvent::PartialExit { trade, .. } => Some(trade),
            _ => None,
        }
    }

    fn updated(pos: &Position) -> Self {
        PositionEvent::Updated {
            trailing_stop: pos.trailing_stop,
            highest_price: pos.highest_price,
            stop_loss: pos.stop_loss,
            take_profit: pos.take_profit,
        }
    }
}

/// Shares sold by a partial profit-take: the configured fraction rounded
/// down to the lot. Falls back to the whole holding when that rounds to
/// nothing or to everything.
pub fn partial_size(shares: u64, fraction: f64, lot_size: u64) -> u64 {
    let lot = lot_size.max(1);
    let raw = (shares as f64 * fraction / lot as f64).floor() as u64 * lot;
    if raw == 0 || raw >= shares {
        shares
    } else {
        raw
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PositionBook {
    positions: BTreeMap<String, Position>,
}

impl PositionBook {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_positions(positions: impl IntoIterator<Item = Position>) -> Self {
        Self {
            positions: positions
                .into_iter()
                .map(|p| (p.ticker.clone(), p))
                .collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.positions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }

    pub fn contains(&self, ticker: &str) -> bool {
        self.positions.contains_key(ticker)
    }

    pub fn get(&self, ticker: &str) -> Option<&Position> {
        self.positions.get(ticker)
    }

    /// Positions in ticker order.
    pub fn positions(&self) -> impl Iterator<Item = &Position> {
        self.positions.values()
    }

    pub fn into_positions(self) -> BTreeMap<String, Position> {
        self.positions
    }

    /// Add a freshly opened position. One position per ticker.
    pub fn open(&mut self, position: Position) -> Result<(), BookError> {
        if position.shares == 0 {
            return Err(BookError::Empty(position.ticker));
        }
        if self.positions.contains_key(&position.ticker) {
            return Err(BookError::AlreadyOpen(position.ticker));
        }
        self.positions.insert(position.ticker.clone(), position);
        Ok(())
    }

    /// Run the exit loop for `date`. Tickers with no row today are left untouched.
    ///
    /// Events are returned in ticker order.
    pub fn evaluate<'a>(
        &mut self,
        date: NaiveDate,
        row_lookup: impl Fn(&str) -> Option<&'a FeatureRow>,
        regime: Regime,
        cfg: &EngineConfig,
        mut ledger: Option<&mut CapitalLedger>,
    ) -> Vec<(String, PositionEvent)> {
        let mut events = Vec::new();
        let mut closed = Vec::new();

        for (ticker, pos) in self.positions.iter_mut() {
            let Some(row) = row_lookup(ticker) else {
                continue;
            };
            let holding = pos.holding_days(date);

            if let Some(deferred) = pos.deferred_exit.clone() {
                let open = row.bar.open;
                if holding >= cfg.min_holding_days && open.is_finite() && open > 0.0 {
                    let signal = ExitSignal {
                        exit_type: deferred.exit_type,
                        price: open,
                        partial: deferred.partial && !pos.partial_taken,
                    };
                    debug!(
                        "{date} {ticker}: executing {} deferred from {}",
                        deferred.exit_type, deferred.signal_date
                    );
                    if let Some(event) =
                        execute(pos, signal, date, row, cfg, ledger.as_deref_mut(), false)
                    {
                        events.push((ticker.clone(), event));
                    }
                }
                if pos.state == PositionState::Closed {
                    closed.push(ticker.clone());
                }
                continue;
            }

            let moved = exit::ratchet(pos, &row.bar, cfg.trailing_pct);

            match exit::detect_exit(pos, row, holding, regime, cfg) {
                Some(signal) if holding >= cfg.min_holding_days => {
                    match execute(pos, signal, date, row, cfg, ledger.as_deref_mut(), true) {
                        Some(event) => events.push((ticker.clone(), event)),
                        None if moved => events.push((ticker.clone(), PositionEvent::updated(pos))),
                        None => {}
                    }
                }
                Some(signal) => {
                    debug!(
                        "{date} {ticker}: {} held back, {holding} days held",
                        signal.exit_type
                    );
                    if moved {
                        events.push((ticker.clone(), PositionEvent::updated(pos)));
                    }
                }
                None => {
                    let pyramid = match ledger.as_deref_mut() {
                        Some(ledger) => pyramid(pos, row, holding, regime, cfg, ledger),
                        None => None,
                    };
                    match pyramid {
                        Some(event) => events.push((ticker.clone(), event)),
                        None if moved => events.push((ticker.clone(), PositionEvent::updated(pos))),
                        None => {}
                    }
                }
            }

            if pos.state == PositionState::Closed {
                closed.push(ticker.clone());
            }
        }

        for ticker in closed {
            self.positions.remove(&ticker);
        }
        events
    }
}

/// Sell per `signal`. Returns `None` when the sale is skipped because net
/// proceeds are not positive; the position is left as it was and the exit
/// is re-evaluated on a later date.
fn execute(
    pos: &mut Position,
    signal: ExitSignal,
    date: NaiveDate,
    row: &FeatureRow,
    cfg: &EngineConfig,
    ledger: Option<&mut CapitalLedger>,
    check_liquidity: bool,
) -> Option<PositionEvent> {
    let sell = if signal.partial {
        partial_size(pos.shares, cfg.partial_fraction, cfg.lot_size)
    } else {
        pos.shares
    };
    let is_partial = sell < pos.shares;

    if check_liquidity && !cfg.liquidity.absorbs(sell, row.bar.volume) {
        debug!(
            "{date} {}: {} of {sell} shares deferred, volume {}",
            pos.ticker, signal.exit_type, row.bar.volume
        );
        pos.deferred_exit = Some(DeferredExit {
            exit_type: signal.exit_type,
            partial: signal.partial,
            signal_date: date,
        });
        return Some(PositionEvent::Deferred {
            exit_type: signal.exit_type,
            partial: signal.partial,
            signal_date: date,
        });
    }

    let net = cfg.costs.net_proceeds(sell, signal.price);
    if !(net > 0.0) {
        debug!(
            "{date} {}: skipped {} at {}, net proceeds {net}",
            pos.ticker, signal.exit_type, signal.price
        );
        return None;
    }

    let trade = Trade {
        ticker: pos.ticker.clone(),
        entry_date: pos.entry_date,
        exit_date: date,
        entry_price: pos.entry_price,
        exit_price: signal.price,
        shares: sell,
        profit: net - cfg.costs.buy_cost(sell, pos.avg_cost),
        holding_days: pos.holding_days(date),
        exit_type: signal.exit_type,
        partial: is_partial,
    };
    if let Some(ledger) = ledger {
        ledger.record_pending_settlement(date, net);
    }
    debug!(
        "{date} {}: {} {sell} @ {:.2}, profit {:.0}",
        pos.ticker, signal.exit_type, signal.price, trade.profit
    );

    if is_partial {
        pos.apply_partial_exit(sell, signal.price, cfg.tp_step);
        Some(PositionEvent::PartialExit {
            trade,
            remaining: pos.shares,
        })
    } else {
        pos.shares = 0;
        pos.deferred_exit = None;
        pos.state = PositionState::Closed;
        Some(PositionEvent::Exit { trade })
    }
}

/// Add to a Bull-market winner early in its life.
fn pyramid(
    pos: &mut Position,
    row: &FeatureRow,
    holding: i64,
    regime: Regime,
    cfg: &EngineConfig,
    ledger: &mut CapitalLedger,
) -> Option<PositionEvent> {
    let rules = &cfg.pyramid;
    let close = row.close();
    let profit = pos.profit_pct(close);
    let eligible = regime == Regime::Bull
        && (rules.min_holding_days..=rules.max_holding_days).contains(&holding)
        && profit > rules.min_profit
        && profit < rules.max_profit
        && pos.pyramid_count < cfg.regime_params(regime).pyramid_limit;
    if !eligible {
        return None;
    }

    let lot = cfg.lot_size.max(1);
    let add = (pos.shares as f64 * rules.add_fraction / lot as f64).floor() as u64 * lot;
    if add == 0 {
        return None;
    }
    let cost = cfg.costs.buy_cost(add, close);
    if ledger.available_working_capital() < cost || ledger.debit(cost).is_err() {
        return None;
    }

    pos.apply_pyramid(add, close);
    pos.take_profit = pos.take_profit.max(close * rules.tp_multiplier);
    pos.ratchet_trailing(close * (1.0 - cfg.trailing_pct * rules.trailing_tighten));
    debug!("{} pyramid +{add} @ {close:.2}", pos.ticker);
    Some(PositionEvent::Pyramid {
        shares: add,
        price: close,
        cost,
    })
}
