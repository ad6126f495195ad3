//! Bar loading for the runner.
//!
//! Reads the configured bar table (CSV or Parquet) through the core ingest
//! layer, applies the ticker include/exclude lists, and fingerprints the
//! result. The benchmark ticker is always kept.

use std::collections::BTreeSet;

use log::{info, warn};
use thiserror::Error;

use swinglab_core::data::{read_bars, IngestError};
use swinglab_core::domain::Bar;

use crate::config::DataSection;

#[derive(Debug, Error)]
pub enum LoadError {
    #[error(transparent)]
    Ingest(#[from] IngestError),

    #[error("benchmark ticker {0} not present in the bar data")]
    MissingBenchmark(String),

    #[error("no bars left after applying the ticker filters")]
    Empty,
}

/// Filtered bars plus provenance.
#[derive(Debug, Clone)]
pub struct LoadedData {
    /// Sorted by (ticker, date).
    pub bars: Vec<Bar>,
    /// Tickers present after filtering, benchmark excluded.
    pub tickers: Vec<String>,
    /// BLAKE3 over every kept bar.
    pub dataset_hash: String,
}

/// Load and filter the bar table described by `data`.
pub fn load_bars(data: &DataSection) -> Result<LoadedData, LoadError> {
    let raw = read_bars(&data.path)?;
    let total = raw.len();
    let benchmark = data.benchmark.trim().to_uppercase();
    let mut bars = filter_bars(raw, &benchmark, &data.tickers, &data.exclude_tickers);

    if !bars.iter().any(|b| b.ticker == benchmark) {
        return Err(LoadError::MissingBenchmark(benchmark));
    }
    if bars.len() == total {
        info!("loaded {total} bars from {}", data.path.display());
    } else {
        info!(
            "loaded {total} bars from {}, kept {} after ticker filters",
            data.path.display(),
            bars.len()
        );
    }

    bars.sort_by(|a, b| a.ticker.cmp(&b.ticker).then(a.date.cmp(&b.date)));

    let tickers: Vec<String> = bars
        .iter()
        .map(|b| b.ticker.as_str())
        .filter(|t| *t != benchmark)
        .collect::<BTreeSet<_>>()
        .into_iter()
        .map(String::from)
        .collect();
    if tickers.is_empty() {
        return Err(LoadError::Empty);
    }
    for wanted in &data.tickers {
        let wanted = wanted.trim().to_uppercase();
        if wanted != benchmark && !tickers.contains(&wanted) {
            warn!("requested ticker {wanted} has no bars");
        }
    }

    let dataset_hash = dataset_hash(&bars);
    Ok(LoadedData {
        bars,
        tickers,
        dataset_hash,
    })
}

/// Keep the benchmark, the listed tickers (all when the list is empty), and
/// drop the excluded ones. Names compare case-insensitively.
pub fn filter_bars(bars: Vec<Bar>, benchmark: &str, include: &[String], exclude: &[String]) -> Vec<Bar> {
    let norm = |list: &[String]| -> BTreeSet<String> {
        list.iter().map(|t| t.trim().to_uppercase()).collect()
    };
    let include = norm(include);
    let exclude = norm(exclude);

    bars.into_iter()
        .filter(|b| {
            b.ticker == benchmark
                || ((include.is_empty() || include.contains(&b.ticker))
                    && !exclude.contains(&b.ticker))
        })
        .collect()
}

/// Deterministic BLAKE3 hash over ticker, date and every numeric column,
/// in the order given.
pub fn dataset_hash(bars: &[Bar]) -> String {
    let mut hasher = blake3::Hasher::new();
    for bar in bars {
        hasher.update(bar.ticker.as_bytes());
        hasher.update(bar.date.to_string().as_bytes());
        for v in [
            bar.open,
            bar.high,
            bar.low,
            bar.close,
            bar.volume,
            bar.buy_pressure,
            bar.sell_pressure,
            bar.foreign_buy,
            bar.foreign_sell,
            bar.foreign_net,
        ] {
            hasher.update(&v.to_le_bytes());
        }
    }
    hasher.finalize().to_hex().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use std::path::Path;

    fn bar(ticker: &str, day: u32, close: f64) -> Bar {
        let date = NaiveDate::from_ymd_opt(2024, 1, day).unwrap();
        Bar::ohlcv(ticker, date, close, close + 1.0, close - 1.0, close, 1_000_000.0)
    }

    fn write_csv(dir: &Path) -> std::path::PathBuf {
        let path = dir.join("bars.csv");
        std::fs::write(
            &path,
            "ticker,date,open,high,low,close,volume\n\
             vnindex,2024-01-03,1100,1110,1090,1105,900000000\n\
             fpt,2024-01-03,95,97,94,96,1500000\n\
             mwg,2024-01-03,45,46,44,45.5,2100000\n\
             ros,2024-01-03,3,3.1,2.9,3,9000000\n\
             vnindex,2024-01-02,1090,1100,1080,1098,850000000\n\
             fpt,2024-01-02,94,96,93,95,1400000\n",
        )
        .unwrap();
        path
    }

    #[test]
    fn filters_keep_benchmark_and_respect_lists() {
        let bars = vec![bar("VNINDEX", 2, 1100.0), bar("FPT", 2, 95.0), bar("ROS", 2, 3.0)];
        let kept = filter_bars(bars.clone(), "VNINDEX", &["fpt".into()], &[]);
        assert_eq!(kept.len(), 2);

        let kept = filter_bars(bars, "VNINDEX", &[], &["Ros ".into()]);
        let names: Vec<_> = kept.iter().map(|b| b.ticker.as_str()).collect();
        assert_eq!(names, ["VNINDEX", "FPT"]);
    }

    #[test]
    fn load_bars_sorts_filters_and_hashes() {
        let dir = tempfile::tempdir().unwrap();
        let data = DataSection {
            path: write_csv(dir.path()),
            exclude_tickers: vec!["ROS".into()],
            ..DataSection::default()
        };
        let loaded = load_bars(&data).unwrap();
        assert_eq!(loaded.tickers, ["FPT", "MWG"]);
        assert_eq!(loaded.bars.len(), 5);
        assert_eq!(loaded.bars[0].ticker, "FPT");
        assert!(loaded.bars[0].date < loaded.bars[1].date);
        assert_eq!(loaded.dataset_hash.len(), 64);

        let again = load_bars(&data).unwrap();
        assert_eq!(loaded.dataset_hash, again.dataset_hash);

        let everything = load_bars(&DataSection {
            path: data.path.clone(),
            ..DataSection::default()
        })
        .unwrap();
        assert_ne!(everything.dataset_hash, loaded.dataset_hash);
    }

    #[test]
    fn missing_benchmark_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let data = DataSection {
            path: write_csv(dir.path()),
            benchmark: "VN30".into(),
            ..DataSection::default()
        };
        assert!(matches!(load_bars(&data), Err(LoadError::MissingBenchmark(b)) if b == "VN30"));
    }

    #[test]
    fn filtering_everything_away_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let data = DataSection {
            path: write_csv(dir.path()),
            tickers: vec!["HPG".into()],
            ..DataSection::default()
        };
        assert!(matches!(load_bars(&data), Err(LoadError::Empty)));
    }

    #[test]
    fn unsupported_extension_surfaces_ingest_error() {
        let data = DataSection {
            path: "bars.xlsx".into(),
            ..DataSection::default()
        };
        assert!(matches!(load_bars(&data), Err(LoadError::Ingest(_))));
    }
}
