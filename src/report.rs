//! CSV input and pattern reports
//!
//! Candles are read from `open_time,open,high,low,close,volume` files. `open_time` may be
//! RFC 3339, `YYYY-MM-DD HH:MM:SS[.f]` (taken as UTC) or epoch milliseconds.
//! Reports list one row per pattern in detection order.

use std::fs::File;
use std::io::{self, BufReader, BufWriter};
use std::path::Path;

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{detectors::Pattern, series::Bar, PatternError};

#[derive(Debug, thiserror::Error)]
pub enum ReportError {
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error(transparent)]
    Pattern(#[from] PatternError),

    #[error("Unparseable open_time {value:?} on row {row}")]
    Timestamp { row: usize, value: String },
}

// ============================================================
// CANDLE INPUT
// ============================================================

#[derive(Debug, Deserialize)]
struct CsvBar {
    open_time: String,
    open: f64,
    high: f64,
    low: f64,
    close: f64,
    volume: f64,
}

/// Parse an `open_time` cell
pub fn parse_timestamp(value: &str) -> Option<DateTime<Utc>> {
    let value = value.trim();
    if let Ok(t) = DateTime::parse_from_rfc3339(value) {
        return Some(t.with_timezone(&Utc));
    }
    for format in ["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f"] {
        if let Ok(t) = NaiveDateTime::parse_from_str(value, format) {
            return Some(t.and_utc());
        }
    }
    value
        .parse::<i64>()
        .ok()
        .and_then(DateTime::<Utc>::from_timestamp_millis)
}

/// Read candles from CSV. Ordering and finiteness are checked later, when the series is built.
pub fn read_bars<R: io::Read>(reader: R) -> Result<Vec<Bar>, ReportError> {
    let mut rdr = csv::ReaderBuilder::new()
        .has_headers(true)
        .trim(csv::Trim::All)
        .from_reader(reader);

    let mut bars = Vec::new();
    for (row, record) in rdr.deserialize::<CsvBar>().enumerate() {
        let record = record?;
        let timestamp =
            parse_timestamp(&record.open_time).ok_or_else(|| ReportError::Timestamp {
                row: row + 1,
                value: record.open_time.clone(),
            })?;
        bars.push(Bar {
            timestamp,
            open: record.open,
            high: record.high,
            low: record.low,
            close: record.close,
            volume: record.volume,
        });
    }

    tracing::debug!(rows = bars.len(), "candles loaded");
    Ok(bars)
}

pub fn read_bars_file(path: impl AsRef<Path>) -> Result<Vec<Bar>, ReportError> {
    read_bars(BufReader::new(File::open(path)?))
}

/// Write candles with an RFC 3339 `open_time` column
pub fn write_bars<W: io::Write>(writer: W, bars: &[Bar]) -> Result<(), ReportError> {
    let mut wtr = csv::Writer::from_writer(writer);
    for bar in bars {
        wtr.serialize(bar)?;
    }
    wtr.flush()?;
    Ok(())
}

pub fn write_bars_file(path: impl AsRef<Path>, bars: &[Bar]) -> Result<(), ReportError> {
    write_bars(BufWriter::new(File::create(path)?), bars)
}

// ============================================================
// PATTERN REPORT
// ============================================================

/// Which patterns make it into a report
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReportOptions {
    /// Keep only the first N rows
    pub max_patterns: Option<usize>,
    pub valid_only: bool,
}

/// One report line. Breakout columns are empty for invalid patterns.
///
/// `cup_duration` counts cup candles with both rims included (`cup_end_idx - cup_start_idx + 1`),
/// so it runs one above the configured cup limits, which bound `end - start`.
/// `handle_duration` counts the candles after the cup end (`handle_end_idx - cup_end_idx`),
/// since the handle shares its first candle with the cup.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReportRow {
    pub pattern_id: String,
    pub status: String,
    pub reason: Option<String>,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub cup_start_idx: usize,
    pub cup_end_idx: usize,
    pub handle_end_idx: usize,
    pub cup_depth: f64,
    pub cup_duration: usize,
    pub handle_depth: f64,
    pub handle_duration: usize,
    pub r_squared_cup: f64,
    pub left_rim_price: f64,
    pub right_rim_price: f64,
    pub cup_bottom_price: f64,
    pub handle_high_price: f64,
    pub breakout_price: Option<f64>,
    pub breakout_candle_timestamp: Option<DateTime<Utc>>,
}

impl ReportRow {
    pub fn new(pattern_id: String, pattern: &Pattern) -> Self {
        let cup = pattern.cup();
        let handle = pattern.handle();
        let breakout = pattern.breakout();
        Self {
            pattern_id,
            status: pattern.status().to_string(),
            reason: pattern.reason().map(|r| r.to_string()),
            start_time: pattern.start_time(),
            end_time: pattern.end_time(),
            cup_start_idx: cup.start_idx,
            cup_end_idx: cup.end_idx,
            handle_end_idx: handle.end_idx,
            cup_depth: cup.depth,
            cup_duration: cup.duration(),
            handle_depth: handle.depth(),
            handle_duration: handle.duration(),
            r_squared_cup: cup.r_squared,
            left_rim_price: cup.left_rim_price,
            right_rim_price: cup.right_rim_price,
            cup_bottom_price: cup.cup_bottom_price,
            handle_high_price: handle.high,
            breakout_price: breakout.map(|b| b.price),
            breakout_candle_timestamp: breakout.map(|b| b.timestamp),
        }
    }
}

/// Select and number the rows of a report (`01`, `02`, ...)
pub fn report_rows(patterns: &[Pattern], options: ReportOptions) -> Vec<ReportRow> {
    patterns
        .iter()
        .filter(|p| !options.valid_only || p.is_valid())
        .take(options.max_patterns.unwrap_or(usize::MAX))
        .enumerate()
        .map(|(i, p)| ReportRow::new(format!("{:02}", i + 1), p))
        .collect()
}

/// Write a report, returning the number of rows written
pub fn write_report<W: io::Write>(
    writer: W,
    patterns: &[Pattern],
    options: ReportOptions,
) -> Result<usize, ReportError> {
    let rows = report_rows(patterns, options);
    let mut wtr = csv::Writer::from_writer(writer);
    for row in &rows {
        wtr.serialize(row)?;
    }
    wtr.flush()?;
    Ok(rows.len())
}

pub fn write_report_file(
    path: impl AsRef<Path>,
    patterns: &[Pattern],
    options: ReportOptions,
) -> Result<usize, ReportError> {
    write_report(BufWriter::new(File::create(path)?), patterns, options)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detectors::{Breakout, CupCandidate, FitCoefficients, HandleCandidate, InvalidReason};
    use chrono::{Duration, TimeZone};

    fn t(minute: i64) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap() + Duration::minutes(minute)
    }

    fn patterns() -> Vec<Pattern> {
        let cup = CupCandidate {
            start_idx: 50,
            end_idx: 149,
            bottom_idx: 99,
            left_rim_price: 108.0,
            right_rim_price: 108.0,
            cup_bottom_price: 40.0,
            depth: 68.0,
            r_squared: 0.98,
            fit_coefficients: FitCoefficients {
                a: 0.02,
                b: -2.0,
                c: 100.0,
            },
        };
        let handle = HandleCandidate {
            start_idx: 149,
            end_idx: 163,
            high: 108.0,
            low: 88.5,
            retrace_amount: 0.0,
        };
        let breakout = Breakout {
            index: 173,
            timestamp: t(173),
            price: 144.0,
            threshold: 108.0,
            atr: 17.0,
        };
        vec![
            Pattern::Invalid {
                cup,
                handle: HandleCandidate {
                    end_idx: 154,
                    ..handle
                },
                reason: InvalidReason::NoBreakout,
                start_time: t(50),
                end_time: t(154),
            },
            Pattern::Valid {
                cup,
                handle,
                breakout,
                start_time: t(50),
                end_time: t(173),
            },
        ]
    }

    #[test]
    fn test_parse_timestamp_formats() {
        let expected = Utc.with_ymd_and_hms(2024, 1, 1, 0, 1, 0).unwrap();
        assert_eq!(parse_timestamp("2024-01-01T00:01:00Z"), Some(expected));
        assert_eq!(parse_timestamp("2024-01-01 00:01:00"), Some(expected));
        assert_eq!(parse_timestamp("1704067260000"), Some(expected));
        assert_eq!(parse_timestamp("yesterday"), None);
    }

    #[test]
    fn test_read_bars() {
        let data = "\
open_time,open,high,low,close,volume
2024-01-01 00:00:00,100.0,101.0,99.0,100.5,10
2024-01-01 00:01:00,100.5,102.0,100.0,101.5,12
";
        let bars = read_bars(data.as_bytes()).unwrap();
        assert_eq!(bars.len(), 2);
        assert_eq!(bars[1].timestamp, t(1));
        assert_eq!(bars[1].close, 101.5);
    }

    #[test]
    fn test_read_bars_bad_timestamp() {
        let data = "open_time,open,high,low,close,volume\nnope,1,1,1,1,1\n";
        assert!(matches!(
            read_bars(data.as_bytes()),
            Err(ReportError::Timestamp { row: 1, .. })
        ));
    }

    #[test]
    fn test_bars_round_trip() {
        let bars = vec![Bar {
            timestamp: t(5),
            open: 1.0,
            high: 2.0,
            low: 0.5,
            close: 1.5,
            volume: 3.0,
        }];
        let mut out = Vec::new();
        write_bars(&mut out, &bars).unwrap();
        assert_eq!(read_bars(out.as_slice()).unwrap(), bars);
    }

    #[test]
    fn test_report_rows() {
        let rows = report_rows(&patterns(), ReportOptions::default());
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].pattern_id, "01");
        assert_eq!(rows[0].status, "Invalid");
        assert_eq!(rows[0].breakout_price, None);
        assert_eq!(rows[1].cup_duration, 100);
        assert_eq!(rows[1].handle_duration, 14);
        assert_eq!(rows[1].handle_depth, 19.5);
        assert_eq!(rows[1].breakout_candle_timestamp, Some(t(173)));

        let valid = report_rows(
            &patterns(),
            ReportOptions {
                valid_only: true,
                ..ReportOptions::default()
            },
        );
        assert_eq!(valid.len(), 1);
        assert_eq!(valid[0].pattern_id, "01");
        assert_eq!(valid[0].status, "Valid");

        let capped = report_rows(
            &patterns(),
            ReportOptions {
                max_patterns: Some(1),
                valid_only: false,
            },
        );
        assert_eq!(capped.len(), 1);
    }

    #[test]
    fn test_duration_columns_count_differently() {
        let rows = report_rows(&patterns(), ReportOptions::default());
        for row in &rows {
            assert_eq!(row.cup_duration, row.cup_end_idx - row.cup_start_idx + 1);
            assert_eq!(row.handle_duration, row.handle_end_idx - row.cup_end_idx);
        }
        assert_eq!((rows[0].cup_duration, rows[0].handle_duration), (100, 5));
    }

    #[test]
    fn test_write_report_columns() {
        let mut out = Vec::new();
        let written = write_report(&mut out, &patterns(), ReportOptions::default()).unwrap();
        assert_eq!(written, 2);

        let text = String::from_utf8(out).unwrap();
        let mut lines = text.lines();
        assert_eq!(
            lines.next().unwrap(),
            "pattern_id,status,reason,start_time,end_time,cup_start_idx,cup_end_idx,\
             handle_end_idx,cup_depth,cup_duration,handle_depth,handle_duration,r_squared_cup,\
             left_rim_price,right_rim_price,cup_bottom_price,handle_high_price,breakout_price,\
             breakout_candle_timestamp"
        );
        let invalid = lines.next().unwrap();
        assert!(invalid.starts_with("01,Invalid,no valid breakout candle found after handle,"));
        assert!(invalid.ends_with(",,"));
        assert!(lines.next().unwrap().starts_with("02,Valid,,"));
    }
}
