//! TOML run configuration.
//!
//! ```toml
//! [data]
//! path = "bars.parquet"
//! benchmark = "VNINDEX"
//! exclude_tickers = ["ROS"]
//!
//! [backtest]
//! start = "2023-01-03"
//! end = "2024-12-31"
//! initial_capital = 1_000_000_000
//! capital_mode = "vault"
//!
//! [regime]
//! preset = "engine"
//!
//! [screener]
//! preset = "sideway_soft"
//! max_candidates = 15
//!
//! [monte_carlo]
//! enabled = true
//! seed = 7
//! ```
//!
//! Every section is optional. `[engine]` accepts any `EngineConfig` field;
//! the `[backtest]`, `[regime]` and `[screener]` sections are applied on top
//! of it.

use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use swinglab_core::engine::{EngineConfig, EngineError};
use swinglab_core::ledger::CapitalMode;
use swinglab_core::regime::RegimeThresholds;
use swinglab_core::screener::RuleTable;

use crate::monte_carlo::MonteCarloConfig;

/// Unique identifier for a backtest run (content-addressable hash).
pub type RunId = String;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("unknown regime preset '{0}' (expected canonical, engine or live)")]
    UnknownRegimePreset(String),

    #[error("unknown screener preset '{0}' (expected canonical or sideway_soft)")]
    UnknownScreenerPreset(String),

    #[error("invalid config: {0}")]
    Invalid(String),

    #[error(transparent)]
    Engine(#[from] EngineError),

    #[error("failed to serialize config: {0}")]
    Serialize(#[from] serde_json::Error),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DataSection {
    /// CSV or Parquet bar table.
    pub path: PathBuf,
    pub benchmark: String,
    /// Restrict the universe to these tickers (empty keeps all).
    pub tickers: Vec<String>,
    pub exclude_tickers: Vec<String>,
}

impl Default for DataSection {
    fn default() -> Self {
        Self {
            path: PathBuf::new(),
            benchmark: "VNINDEX".into(),
            tickers: Vec::new(),
            exclude_tickers: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BacktestSection {
    pub start: Option<NaiveDate>,
    pub end: Option<NaiveDate>,
    pub initial_capital: f64,
    /// Working-capital target; defaults to the initial capital.
    pub base_capital: Option<f64>,
    pub capital_mode: CapitalMode,
    pub equity_stride: usize,
}

impl Default for BacktestSection {
    fn default() -> Self {
        Self {
            start: None,
            end: None,
            initial_capital: 1_000_000_000.0,
            base_capital: None,
            capital_mode: CapitalMode::Vault,
            equity_stride: 1,
        }
    }
}

/// Regime thresholds: a named preset, or explicit values that replace it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RegimeSection {
    pub preset: String,
    pub thresholds: Option<RegimeThresholds>,
}

impl Default for RegimeSection {
    fn default() -> Self {
        Self {
            preset: "canonical".into(),
            thresholds: None,
        }
    }
}

impl RegimeSection {
    pub fn resolve(&self) -> Result<RegimeThresholds, ConfigError> {
        if let Some(t) = self.thresholds {
            return Ok(t);
        }
        RegimeThresholds::preset(&self.preset)
            .ok_or_else(|| ConfigError::UnknownRegimePreset(self.preset.clone()))
    }
}

/// Screener rule-table preset plus scalar overrides.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScreenerSection {
    pub preset: String,
    pub min_volume_ma20: Option<f64>,
    pub min_volume: Option<f64>,
    pub max_candidates: Option<usize>,
}

impl Default for ScreenerSection {
    fn default() -> Self {
        Self {
            preset: "canonical".into(),
            min_volume_ma20: None,
            min_volume: None,
            max_candidates: None,
        }
    }
}

/// Complete, reproducible description of one backtest run.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RunConfig {
    pub data: DataSection,
    pub backtest: BacktestSection,
    pub engine: EngineConfig,
    pub regime: RegimeSection,
    pub screener: ScreenerSection,
    pub monte_carlo: MonteCarloConfig,
}

impl RunConfig {
    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(s)?)
    }

    /// Read a config file. A relative data path is resolved against the
    /// config file's directory.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let mut config = Self::from_toml_str(&text)?;
        if config.data.path.is_relative() {
            if let Some(dir) = path.parent() {
                config.data.path = dir.join(&config.data.path);
            }
        }
        Ok(config)
    }

    /// The engine configuration with every section applied.
    pub fn engine_config(&self) -> Result<EngineConfig, ConfigError> {
        let mut engine = self.engine.clone();

        let b = &self.backtest;
        engine.capital.initial_capital = b.initial_capital;
        engine.capital.base_capital = b.base_capital.unwrap_or(b.initial_capital);
        engine.capital.mode = b.capital_mode;
        engine.equity_stride = b.equity_stride;

        engine.regime = self.regime.resolve()?;

        let s = &self.screener;
        engine.screener.rules = RuleTable::preset(&s.preset)
            .ok_or_else(|| ConfigError::UnknownScreenerPreset(s.preset.clone()))?;
        if let Some(v) = s.min_volume_ma20 {
            engine.screener.min_volume_ma20 = v;
        }
        if let Some(v) = s.min_volume {
            engine.screener.min_volume = v;
        }
        if let Some(v) = s.max_candidates {
            engine.screener.max_candidates = v;
        }

        engine.validate()?;
        Ok(engine)
    }

    /// Reject configurations that cannot run, naming every problem found.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut problems = Vec::new();

        if self.data.path.as_os_str().is_empty() {
            problems.push("data.path is required".to_string());
        }
        if self.data.benchmark.trim().is_empty() {
            problems.push("data.benchmark must not be empty".to_string());
        }
        if let (Some(start), Some(end)) = (self.backtest.start, self.backtest.end) {
            if start > end {
                problems.push(format!("backtest.start {start} is after backtest.end {end}"));
            }
        }
        if self.backtest.equity_stride == 0 {
            problems.push("backtest.equity_stride must be at least 1".to_string());
        }
        let mc = &self.monte_carlo;
        if mc.enabled {
            if mc.simulations == 0 {
                problems.push("monte_carlo.simulations must be at least 1".to_string());
            }
            if mc.horizon == 0 {
                problems.push("monte_carlo.horizon must be at least 1".to_string());
            }
            if !(mc.percentile > 0.0 && mc.percentile < 1.0) {
                problems.push(format!(
                    "monte_carlo.percentile must be in (0, 1), got {}",
                    mc.percentile
                ));
            }
        }

        if !problems.is_empty() {
            return Err(ConfigError::Invalid(problems.join("; ")));
        }
        self.engine_config().map(|_| ())
    }

    /// Deterministic hash of the canonical JSON form of this config.
    ///
    /// Two runs with identical configs share a `RunId`.
    pub fn run_id(&self) -> Result<RunId, ConfigError> {
        let json = serde_json::to_string(self)?;
        Ok(blake3::hash(json.as_bytes()).to_hex().to_string())
    }
}
