use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::Path;

use crate::error::BotError;
use crate::models::{Candle, EXCHANGE_UTC_OFFSET_SECS};
use crate::Result;

/// One row of a stored candle file; numbers stay raw so bad rows can be skipped
#[derive(Debug, Deserialize)]
struct CsvRow {
    #[serde(rename = "Datetime")]
    datetime: String,
    #[serde(rename = "Open")]
    open: String,
    #[serde(rename = "High")]
    high: String,
    #[serde(rename = "Low")]
    low: String,
    #[serde(rename = "Close")]
    close: String,
    #[serde(rename = "Volume")]
    volume: String,
    #[serde(rename = "Symbol", default)]
    symbol: Option<String>,
}

impl CsvRow {
    fn to_candle(&self) -> Option<Candle> {
        let num = |s: &str| s.trim().parse::<f64>().ok();
        let candle = Candle {
            timestamp: parse_timestamp(&self.datetime)?,
            open: num(&self.open)?,
            high: num(&self.high)?,
            low: num(&self.low)?,
            close: num(&self.close)?,
            volume: num(&self.volume)?,
        };
        candle.is_valid().then_some(candle)
    }
}

/// Accepts RFC 3339, `YYYY-MM-DD HH:MM:SS+05:30`, or naive exchange-local time
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Some(ts.with_timezone(&Utc));
    }
    if let Ok(ts) = DateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S%:z") {
        return Some(ts.with_timezone(&Utc));
    }

    ["%Y-%m-%d %H:%M:%S", "%Y-%m-%d %H:%M"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
        .map(|naive| {
            Utc.from_utc_datetime(&naive) - chrono::Duration::seconds(EXCHANGE_UTC_OFFSET_SECS)
        })
}

/// Load every series in a candle file, keyed by symbol
///
/// Files without a `Symbol` column hold one series named after the file.
/// Rows with missing or non-numeric fields are skipped; each series comes
/// back time-ordered with duplicate timestamps removed.
pub fn load_candle_series(path: impl AsRef<Path>) -> Result<BTreeMap<String, Vec<Candle>>> {
    let path = path.as_ref();
    let default_symbol = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "UNKNOWN".to_string());

    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .flexible(true)
        .from_path(path)?;

    let mut series: BTreeMap<String, Vec<Candle>> = BTreeMap::new();
    let mut skipped = 0usize;

    for row in reader.deserialize::<CsvRow>() {
        let row = match row {
            Ok(row) => row,
            Err(e) => {
                tracing::debug!("Skipping unreadable row in {}: {}", path.display(), e);
                skipped += 1;
                continue;
            }
        };

        match row.to_candle() {
            Some(candle) => {
                let symbol = row
                    .symbol
                    .filter(|s| !s.is_empty())
                    .unwrap_or_else(|| default_symbol.clone());
                series.entry(symbol).or_default().push(candle);
            }
            None => skipped += 1,
        }
    }

    if skipped > 0 {
        tracing::warn!("Skipped {} malformed rows in {}", skipped, path.display());
    }

    for candles in series.values_mut() {
        candles.sort_by_key(|c| c.timestamp);
        candles.dedup_by_key(|c| c.timestamp);
    }

    if series.is_empty() {
        return Err(BotError::DataUnavailable {
            instrument: default_symbol,
            reason: format!("no valid candles in {}", path.display()),
        });
    }

    Ok(series)
}
