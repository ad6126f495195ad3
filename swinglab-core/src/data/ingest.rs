//! Bar table ingest: CSV / Parquet files → polars `DataFrame` → `Vec<Bar>`.
//!
//! Dates may arrive as a polars `Date` column or as ISO `YYYY-MM-DD` strings.
//! Numeric columns of any integer or float type are cast to `f64`. Ticker
//! names are trimmed and upper-cased.

use std::fs;
use std::path::Path;

use chrono::NaiveDate;
use polars::prelude::*;

use super::schema::{BarSchema, SchemaError};
use crate::domain::Bar;

#[derive(Debug, thiserror::Error)]
pub enum IngestError {
    #[error("{0}")]
    Schema(#[from] SchemaError),

    #[error("unsupported file extension for {0} (expected .csv or .parquet)")]
    UnsupportedFormat(String),

    #[error("failed to read {path}: {reason}")]
    Read { path: String, reason: String },

    #[error("column {column}: {reason}")]
    Column { column: String, reason: String },

    #[error("row {row}: invalid date {value:?}")]
    InvalidDate { row: usize, value: String },
}

/// Read a bar table, dispatching on the file extension.
pub fn read_bars(path: &Path) -> Result<Vec<Bar>, IngestError> {
    let df = read_frame(path)?;
    frame_to_bars(&df)
}

/// Read a CSV or Parquet file into a frame without interpreting it.
pub fn read_frame(path: &Path) -> Result<DataFrame, IngestError> {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase());
    let read_err = |e: PolarsError| IngestError::Read {
        path: path.display().to_string(),
        reason: e.to_string(),
    };
    match ext.as_deref() {
        Some("csv") => CsvReadOptions::default()
            .with_has_header(true)
            .with_parse_options(CsvParseOptions::default().with_try_parse_dates(true))
            .try_into_reader_with_file_path(Some(path.to_path_buf()))
            .and_then(|reader| reader.finish())
            .map_err(read_err),
        Some("parquet") => {
            let file = fs::File::open(path).map_err(|e| IngestError::Read {
                path: path.display().to_string(),
                reason: e.to_string(),
            })?;
            ParquetReader::new(file).finish().map_err(read_err)
        }
        _ => Err(IngestError::UnsupportedFormat(path.display().to_string())),
    }
}

/// Convert a validated frame to bars, in frame order.
pub fn frame_to_bars(df: &DataFrame) -> Result<Vec<Bar>, IngestError> {
    BarSchema::validate(df)?;

    let n = df.height();
    let tickers = df
        .column("ticker")
        .and_then(|c| c.cast(&DataType::String))
        .map_err(|e| column_err("ticker", e))?;
    let tickers = tickers.str().map_err(|e| column_err("ticker", e))?;
    let dates = read_dates(df)?;

    let open = float_column(df, "open")?;
    let high = float_column(df, "high")?;
    let low = float_column(df, "low")?;
    let close = float_column(df, "close")?;
    let volume = float_column(df, "volume")?;
    let mut flows = Vec::with_capacity(BarSchema::OPTIONAL.len());
    for name in BarSchema::OPTIONAL {
        flows.push(if df.schema().contains(name) {
            float_column(df, name)?
        } else {
            vec![0.0; n]
        });
    }

    let mut bars = Vec::with_capacity(n);
    for i in 0..n {
        let ticker = tickers.get(i).unwrap_or_default().trim().to_uppercase();
        bars.push(Bar {
            ticker,
            date: dates[i],
            open: open[i],
            high: high[i],
            low: low[i],
            close: close[i],
            volume: volume[i],
            buy_pressure: flows[0][i],
            sell_pressure: flows[1][i],
            foreign_buy: flows[2][i],
            foreign_sell: flows[3][i],
            foreign_net: flows[4][i],
        });
    }
    Ok(bars)
}

/// Build a canonical frame from bars (the inverse of `frame_to_bars`).
pub fn bars_to_frame(bars: &[Bar]) -> Result<DataFrame, IngestError> {
    let epoch = NaiveDate::from_ymd_opt(1970, 1, 1).unwrap_or_default();
    let days: Vec<i32> = bars
        .iter()
        .map(|b| (b.date - epoch).num_days() as i32)
        .collect();
    let tickers: Vec<&str> = bars.iter().map(|b| b.ticker.as_str()).collect();
    let col = |name: &str, f: fn(&Bar) -> f64| -> Column {
        Column::new(name.into(), bars.iter().map(f).collect::<Vec<f64>>())
    };

    DataFrame::new(vec![
        Column::new("ticker".into(), tickers),
        Column::new("date".into(), days)
            .cast(&DataType::Date)
            .map_err(|e| column_err("date", e))?,
        col("open", |b| b.open),
        col("high", |b| b.high),
        col("low", |b| b.low),
        col("close", |b| b.close),
        col("volume", |b| b.volume),
        col("buy_pressure", |b| b.buy_pressure),
        col("sell_pressure", |b| b.sell_pressure),
        col("foreign_buy", |b| b.foreign_buy),
        col("foreign_sell", |b| b.foreign_sell),
        col("foreign_net", |b| b.foreign_net),
    ])
    .map_err(|e| column_err("frame", e))
}

fn column_err(column: &str, e: PolarsError) -> IngestError {
    IngestError::Column {
        column: column.to_string(),
        reason: e.to_string(),
    }
}

/// Cast a numeric column to f64. Nulls become NaN (void bars).
fn float_column(df: &DataFrame, name: &str) -> Result<Vec<f64>, IngestError> {
    let cast = df
        .column(name)
        .and_then(|c| c.cast(&DataType::Float64))
        .map_err(|e| column_err(name, e))?;
    let ca = cast.f64().map_err(|e| column_err(name, e))?;
    Ok(ca.into_iter().map(|v| v.unwrap_or(f64::NAN)).collect())
}

fn read_dates(df: &DataFrame) -> Result<Vec<NaiveDate>, IngestError> {
    let column = df.column("date").map_err(|e| column_err("date", e))?;
    let epoch = NaiveDate::from_ymd_opt(1970, 1, 1).unwrap_or_default();

    if column.dtype() == &DataType::String {
        let ca = column.str().map_err(|e| column_err("date", e))?;
        return ca
            .into_iter()
            .enumerate()
            .map(|(row, v)| {
                let raw = v.unwrap_or_default();
                NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d").map_err(|_| {
                    IngestError::InvalidDate {
                        row,
                        value: raw.to_string(),
                    }
                })
            })
            .collect();
    }

    let physical = column
        .cast(&DataType::Int32)
        .map_err(|e| column_err("date", e))?;
    let ca = physical.i32().map_err(|e| column_err("date", e))?;
    ca.into_iter()
        .enumerate()
        .map(|(row, v)| {
            v.map(|days| epoch + chrono::Duration::days(days as i64))
                .ok_or(IngestError::InvalidDate {
                    row,
                    value: "null".into(),
                })
        })
        .collect()
}
