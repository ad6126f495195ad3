//! SwingLab Core — features, regime, screening, capital, positions, and the daily loop.
//!
//! This crate contains the whole simulation:
//! - Domain types (bars, feature rows, positions, trades, capital samples)
//! - Indicators and the per-ticker feature engine (parallel across tickers)
//! - Market regime classification and rule-table candidate screening
//! - Capital ledger with T+2 settlement and a profit vault
//! - Position book with gap, intraday, trailing and forced exits
//! - Sequential per-date backtest loop with a checkpoint hook
//! - Live mode: screen the latest session, re-check held positions

pub mod book;
pub mod calendar;
pub mod data;
pub mod domain;
pub mod engine;
pub mod features;
pub mod indicators;
pub mod ledger;
pub mod live;
pub mod regime;
pub mod screener;
