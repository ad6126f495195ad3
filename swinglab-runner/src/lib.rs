//! SwingLab Runner — configuration, data loading, metrics, and artifacts.
//!
//! This crate builds on `swinglab-core` to provide:
//! - TOML run configuration with regime and screener presets
//! - Bar loading with ticker filters and dataset fingerprinting
//! - Single-backtest runner with benchmark comparison
//! - Performance metrics and a seeded Monte Carlo drawdown projection
//! - JSON / CSV / Markdown export

pub mod config;
pub mod data_loader;
pub mod export;
pub mod metrics;
pub mod monte_carlo;
pub mod runner;

pub use config::{ConfigError, RunConfig, RunId};
pub use data_loader::{load_bars, LoadError, LoadedData};
pub use export::{load_artifacts, save_artifacts};
pub use metrics::PerformanceMetrics;
pub use monte_carlo::{MonteCarloConfig, MonteCarloResult};
pub use runner::{run_backtest, run_backtest_from_features, BacktestResult, RunError, SCHEMA_VERSION};
