//! Data loading utilities for the forja CLI.
//!
//! Panels come from long-format CSV files: one row per timestamp and symbol,
//! every other column a numeric feature or label.

use anyhow::{Context, Result, anyhow, bail};
use chrono::{DateTime, NaiveDate, NaiveDateTime};
use forja::Panel;
use forja::expr::is_label_column;
use forja::traits::{CLOSE_COLUMN, RETURN_COLUMN};
use ndarray::Array2;
use polars::prelude::*;
use std::collections::{BTreeSet, HashMap};
use std::path::Path;
use tracing::{debug, info};

const TIMESTAMP_COLUMNS: [&str; 3] = ["timestamp", "datetime", "date"];
const SYMBOL_COLUMNS: [&str; 2] = ["symbol", "asset"];

const DATETIME_FORMATS: [&str; 3] = ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M"];

/// Load a panel from a long-format CSV file.
pub(crate) fn load_panel(path: &Path) -> Result<Panel> {
    let df = CsvReadOptions::default()
        .with_has_header(true)
        .try_into_reader_with_file_path(Some(path.to_path_buf()))?
        .finish()
        .with_context(|| format!("Failed to read {}", path.display()))?;
    debug!(rows = df.height(), columns = df.width(), "read csv");

    let panel = panel_from_frame(&df)?;
    let (rows, assets) = panel.shape();
    info!(
        path = %path.display(),
        rows,
        assets,
        columns = panel.column_names().len(),
        labels = panel.label_names().len(),
        "loaded panel"
    );
    Ok(panel)
}

/// Pivot a long-format frame into a panel.
///
/// `return` is derived from `Close` when the file does not carry it.
pub(crate) fn panel_from_frame(df: &DataFrame) -> Result<Panel> {
    let names: Vec<String> = df
        .get_column_names()
        .into_iter()
        .map(|name| name.to_string())
        .collect();
    let ts_name = find_column(&names, &TIMESTAMP_COLUMNS)?;
    let symbol_name = find_column(&names, &SYMBOL_COLUMNS)?;

    let ts_col = df.column(&ts_name)?.cast(&DataType::String)?;
    let timestamps = ts_col
        .as_materialized_series()
        .str()?
        .into_iter()
        .enumerate()
        .map(|(row, value)| {
            let value = value.ok_or_else(|| anyhow!("Missing timestamp in row {}", row + 1))?;
            parse_timestamp(value)
        })
        .collect::<Result<Vec<_>>>()?;

    let symbol_col = df.column(&symbol_name)?.cast(&DataType::String)?;
    let symbols = symbol_col
        .as_materialized_series()
        .str()?
        .into_iter()
        .enumerate()
        .map(|(row, value)| {
            value
                .map(str::to_string)
                .ok_or_else(|| anyhow!("Missing symbol in row {}", row + 1))
        })
        .collect::<Result<Vec<_>>>()?;

    let index: Vec<NaiveDateTime> = timestamps
        .iter()
        .copied()
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect();
    let assets: Vec<String> = symbols
        .iter()
        .cloned()
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect();
    let row_of: HashMap<NaiveDateTime, usize> =
        index.iter().enumerate().map(|(i, t)| (*t, i)).collect();
    let col_of: HashMap<&str, usize> = assets
        .iter()
        .enumerate()
        .map(|(j, a)| (a.as_str(), j))
        .collect();

    let mut cells = Vec::with_capacity(df.height());
    let mut seen = vec![false; index.len() * assets.len()];
    for (ts, symbol) in timestamps.iter().zip(&symbols) {
        let (t, j) = (row_of[ts], col_of[symbol.as_str()]);
        if std::mem::replace(&mut seen[t * assets.len() + j], true) {
            bail!("Duplicate row for {} at {}", symbol, ts);
        }
        cells.push((t, j));
    }

    let mut panel = Panel::new(index, assets)?;
    let shape = panel.shape();
    for name in names.iter().filter(|n| **n != ts_name && **n != symbol_name) {
        let column = df
            .column(name)?
            .cast(&DataType::Float64)
            .with_context(|| format!("Column {} is not numeric", name))?;
        let mut values = Array2::from_elem(shape, f64::NAN);
        for (&(t, j), value) in cells.iter().zip(column.as_materialized_series().f64()?) {
            values[[t, j]] = value.unwrap_or(f64::NAN);
        }
        if is_label_column(name) {
            panel.insert_label(name.as_str(), values)?;
        } else {
            panel.insert_column(name.as_str(), values)?;
        }
    }

    if !panel.has_column(RETURN_COLUMN)
        && let Some(close) = panel.column(CLOSE_COLUMN)
    {
        let returns = simple_returns(close);
        debug!("derived {} from {}", RETURN_COLUMN, CLOSE_COLUMN);
        panel.insert_column(RETURN_COLUMN, returns)?;
    }
    Ok(panel)
}

fn find_column(names: &[String], candidates: &[&str]) -> Result<String> {
    names
        .iter()
        .find(|name| candidates.contains(&name.to_ascii_lowercase().as_str()))
        .cloned()
        .ok_or_else(|| anyhow!("Missing column: expected one of {}", candidates.join(", ")))
}

/// One-period simple returns; the first row and gaps are NaN.
fn simple_returns(close: &Array2<f64>) -> Array2<f64> {
    let mut returns = Array2::from_elem(close.dim(), f64::NAN);
    for t in 1..close.nrows() {
        for j in 0..close.ncols() {
            let (prev, cur) = (close[[t - 1, j]], close[[t, j]]);
            let r = cur / prev - 1.0;
            if r.is_finite() {
                returns[[t, j]] = r;
            }
        }
    }
    returns
}

/// Parse a timestamp.
///
/// Accepts `YYYY-MM-DD`, the usual date-time layouts, RFC 3339 and Unix
/// epochs in seconds or milliseconds.
pub(crate) fn parse_timestamp(value: &str) -> Result<NaiveDateTime> {
    let value = value.trim();
    for format in DATETIME_FORMATS {
        if let Ok(ts) = NaiveDateTime::parse_from_str(value, format) {
            return Ok(ts);
        }
    }
    if let Ok(date) = NaiveDate::parse_from_str(value, "%Y-%m-%d") {
        return date
            .and_hms_opt(0, 0, 0)
            .ok_or_else(|| anyhow!("Invalid date: {}", value));
    }
    if let Ok(ts) = DateTime::parse_from_rfc3339(value) {
        return Ok(ts.naive_utc());
    }
    if let Ok(epoch) = value.parse::<i64>() {
        let parsed = if epoch.abs() >= 100_000_000_000 {
            DateTime::from_timestamp_millis(epoch)
        } else {
            DateTime::from_timestamp(epoch, 0)
        };
        return parsed
            .map(|ts| ts.naive_utc())
            .ok_or_else(|| anyhow!("Epoch out of range: {}", value));
    }
    bail!("Invalid timestamp format: {}", value)
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use chrono::{Datelike, Timelike};
    use std::fmt::Write as _;
    use std::fs;

    /// Write a daily long-format panel where Volume leads the next return.
    pub(crate) fn write_sample_csv(path: &Path, rows: usize, assets: usize) {
        let start = NaiveDate::from_ymd_opt(2023, 1, 1).unwrap();
        let mut csv = String::from("timestamp,symbol,Close,Volume\n");
        let mut close = vec![100.0_f64; assets];
        for t in 0..rows {
            let date = start + chrono::Duration::days(t as i64);
            for (j, price) in close.iter_mut().enumerate() {
                let signal = ((t * 7 + j * 3) % 11) as f64 - 5.0;
                let volume = 1000.0 + 50.0 * signal;
                writeln!(csv, "{},S{},{:.6},{}", date, j, price, volume).unwrap();
                *price *= 1.0 + 0.002 * signal;
            }
        }
        fs::write(path, csv).unwrap();
    }

    #[test]
    fn test_parse_timestamp() {
        let date = parse_timestamp("2024-01-15").unwrap();
        assert_eq!((date.year(), date.month(), date.day()), (2024, 1, 15));
        assert_eq!(date.hour(), 0);

        let hourly = parse_timestamp("2024-01-15 13:00:00").unwrap();
        assert_eq!(hourly.hour(), 13);
        assert_eq!(parse_timestamp("2024-01-15T13:00:00").unwrap(), hourly);
        assert_eq!(parse_timestamp("2024-01-15 13:00").unwrap(), hourly);
        assert_eq!(parse_timestamp("2024-01-15T13:00:00Z").unwrap(), hourly);

        let epoch = parse_timestamp("1705323600").unwrap();
        assert_eq!(epoch, hourly);
        assert_eq!(parse_timestamp("1705323600000").unwrap(), hourly);
    }

    #[test]
    fn test_parse_timestamp_invalid() {
        assert!(parse_timestamp("invalid").is_err());
        assert!(parse_timestamp("2024-13-40").is_err());
    }

    #[test]
    fn test_load_panel() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("panel.csv");
        fs::write(
            &path,
            "timestamp,symbol,Close,Volume,fwd_ret\n\
             2024-01-02,BBB,50.0,10,0.1\n\
             2024-01-01,AAA,100.0,5,0.2\n\
             2024-01-01,BBB,40.0,8,\n\
             2024-01-02,AAA,110.0,,0.3\n\
             2024-01-03,AAA,99.0,7,0.4\n",
        )
        .unwrap();

        let panel = load_panel(&path).unwrap();
        assert_eq!(panel.shape(), (3, 2));
        assert_eq!(panel.assets(), ["AAA".to_string(), "BBB".to_string()]);
        assert_eq!(panel.column_names(), vec!["Close", "Volume", "return"]);
        assert_eq!(panel.label_names(), vec!["fwd_ret"]);

        let volume = panel.column("Volume").unwrap();
        assert!(volume[[1, 0]].is_nan());
        assert_eq!(volume[[1, 1]], 10.0);
        assert!(volume[[2, 1]].is_nan());

        let returns = panel.column(RETURN_COLUMN).unwrap();
        assert!(returns[[0, 0]].is_nan());
        assert!((returns[[1, 0]] - 0.1).abs() < 1e-12);
        assert!((returns[[1, 1]] - 0.25).abs() < 1e-12);
        assert!(returns[[2, 1]].is_nan());

        let label = panel.label("fwd_ret").unwrap();
        assert!(label[[0, 1]].is_nan());
        assert_eq!(label[[2, 0]], 0.4);
    }

    #[test]
    fn test_existing_return_is_kept() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("panel.csv");
        fs::write(
            &path,
            "date,asset,Close,return\n2024-01-01,A,1.0,0.5\n2024-01-02,A,2.0,0.7\n",
        )
        .unwrap();

        let panel = load_panel(&path).unwrap();
        assert_eq!(panel.column(RETURN_COLUMN).unwrap()[[0, 0]], 0.5);
    }

    #[test]
    fn test_duplicate_rows_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("panel.csv");
        fs::write(
            &path,
            "timestamp,symbol,Close\n2024-01-01,A,1.0\n2024-01-01,A,2.0\n",
        )
        .unwrap();

        let err = load_panel(&path).unwrap_err();
        assert!(err.to_string().contains("Duplicate row"));
    }

    #[test]
    fn test_sample_panel() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sample.csv");
        write_sample_csv(&path, 30, 3);
        let panel = load_panel(&path).unwrap();
        assert_eq!(panel.shape(), (30, 3));
        assert!(panel.has_column(RETURN_COLUMN));
    }

    #[test]
    fn test_missing_symbol_column() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("panel.csv");
        fs::write(&path, "timestamp,Close\n2024-01-01,1.0\n").unwrap();
        assert!(load_panel(&path).is_err());
    }
}
