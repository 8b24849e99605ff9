//! Minute and hourly tables.
//!
//! ## Minute table contract
//!
//! | Column                 | Notes                                          |
//! |------------------------|------------------------------------------------|
//! | `timeStamp`            | also `timestamp` / `data`; else first column   |
//! | `<tag>`                | raw totalizer                                  |
//! | `<tag>_H`, `<tag>_L`   | split counter words (paired only when both)    |
//! | `<tag>_rect_0` ...     | derived columns, parsed back by suffix         |
//!
//! Rows must be strictly increasing in time. Cells that do not parse as a
//! finite number are undefined.

use std::fmt;
use std::fs::File;
use std::io::{Read, Write};
use std::path::Path;

use chrono::{DateTime, Utc};
use ftr_core::{FrameError, HourlyFrame, MinuteFrame};
use tracing::debug;

use crate::format::{detect_format, format_timestamp, parse_timestamp, CsvFormat};

/// Header written for the timestamp column.
pub const TIMESTAMP_COLUMN: &str = "timeStamp";

const TIMESTAMP_ALIASES: &[&str] = &["timestamp", "data"];

// ---------------------------------------------------------------------------
// Error type
// ---------------------------------------------------------------------------

#[derive(Debug)]
pub enum TableError {
    /// An I/O or CSV-library error.
    Io(String),
    /// No header, or a header with no data rows.
    EmptyInput,
    /// A timestamp cell could not be parsed.
    BadTimestamp { row: usize, raw: String },
    /// Timestamps are not strictly increasing.
    NonMonotonic {
        row: usize,
        prev: DateTime<Utc>,
        cur: DateTime<Utc>,
    },
    Frame(FrameError),
}

impl fmt::Display for TableError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TableError::Io(msg) => write!(f, "table io error: {msg}"),
            TableError::EmptyInput => write!(f, "table has no data rows"),
            TableError::BadTimestamp { row, raw } => {
                write!(f, "row {row}: cannot parse timestamp from '{raw}'")
            }
            TableError::NonMonotonic { row, prev, cur } => write!(
                f,
                "row {row}: timestamp {} is not after previous {}",
                format_timestamp(cur),
                format_timestamp(prev)
            ),
            TableError::Frame(e) => write!(f, "{e}"),
        }
    }
}

impl std::error::Error for TableError {}

impl From<FrameError> for TableError {
    fn from(e: FrameError) -> Self {
        TableError::Frame(e)
    }
}

impl From<csv::Error> for TableError {
    fn from(e: csv::Error) -> Self {
        TableError::Io(e.to_string())
    }
}

// ---------------------------------------------------------------------------
// Read
// ---------------------------------------------------------------------------

pub fn read_minute_table(path: &Path) -> Result<MinuteFrame, TableError> {
    let mut file = File::open(path)
        .map_err(|e| TableError::Io(format!("open '{}': {e}", path.display())))?;
    let mut buf = String::new();
    file.read_to_string(&mut buf)
        .map_err(|e| TableError::Io(format!("read '{}': {e}", path.display())))?;
    read_minute_table_str(&buf)
}

/// Parse a minute table from text. The dialect is detected from the header.
pub fn read_minute_table_str(src: &str) -> Result<MinuteFrame, TableError> {
    let src = src.trim_start_matches('\u{feff}');
    let header_line = src.lines().next().ok_or(TableError::EmptyInput)?;
    let format = detect_format(header_line);

    let mut rdr = csv::ReaderBuilder::new()
        .delimiter(format.delimiter())
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(src.as_bytes());

    let headers: Vec<String> = rdr.headers()?.iter().map(str::to_string).collect();
    if headers.is_empty() {
        return Err(TableError::EmptyInput);
    }
    let ts_idx = timestamp_index(&headers);

    let mut timestamps: Vec<DateTime<Utc>> = Vec::new();
    let mut columns: Vec<Vec<Option<f64>>> = vec![Vec::new(); headers.len()];

    for (i, rec) in rdr.records().enumerate() {
        let rec = rec?;
        // 1-based data row, header is row 0
        let row = i + 1;
        if rec.iter().all(str::is_empty) {
            continue;
        }

        let raw_ts = rec.get(ts_idx).unwrap_or_default();
        let ts = parse_timestamp(raw_ts).ok_or_else(|| TableError::BadTimestamp {
            row,
            raw: raw_ts.to_string(),
        })?;
        if let Some(prev) = timestamps.last() {
            if ts <= *prev {
                return Err(TableError::NonMonotonic {
                    row,
                    prev: *prev,
                    cur: ts,
                });
            }
        }
        timestamps.push(ts);

        for (c, col) in columns.iter_mut().enumerate() {
            if c == ts_idx {
                continue;
            }
            col.push(rec.get(c).and_then(|v| format.parse_number(v)));
        }
    }

    if timestamps.is_empty() {
        return Err(TableError::EmptyInput);
    }

    let named: Vec<(String, Vec<Option<f64>>)> = headers
        .into_iter()
        .zip(columns)
        .enumerate()
        .filter(|(c, (name, _))| *c != ts_idx && !name.is_empty())
        .map(|(_, pair)| pair)
        .collect();

    debug!(
        rows = timestamps.len(),
        columns = named.len(),
        format = ?format,
        "minute table parsed"
    );
    Ok(MinuteFrame::from_named_columns(timestamps, named)?)
}

fn timestamp_index(headers: &[String]) -> usize {
    headers
        .iter()
        .position(|h| h == TIMESTAMP_COLUMN)
        .or_else(|| {
            headers.iter().position(|h| {
                TIMESTAMP_ALIASES
                    .iter()
                    .any(|a| h.eq_ignore_ascii_case(a))
            })
        })
        .unwrap_or(0)
}

// ---------------------------------------------------------------------------
// Write
// ---------------------------------------------------------------------------

fn create(path: &Path) -> Result<File, TableError> {
    File::create(path).map_err(|e| TableError::Io(format!("create '{}': {e}", path.display())))
}

pub fn write_minute_table(
    path: &Path,
    frame: &MinuteFrame,
    format: CsvFormat,
) -> Result<(), TableError> {
    write_minute_table_to(create(path)?, frame, format)
}

/// Timestamp column first, then every frame column in insertion order.
pub fn write_minute_table_to<W: Write>(
    w: W,
    frame: &MinuteFrame,
    format: CsvFormat,
) -> Result<(), TableError> {
    let mut wtr = csv::WriterBuilder::new()
        .delimiter(format.delimiter())
        .from_writer(w);

    let mut header = vec![TIMESTAMP_COLUMN.to_string()];
    header.extend(frame.keys().map(|k| k.column_name()));
    wtr.write_record(&header)?;

    let cols: Vec<&[Option<f64>]> = frame.iter().map(|(_, c)| c).collect();
    for (i, ts) in frame.timestamps().iter().enumerate() {
        let mut row = Vec::with_capacity(cols.len() + 1);
        row.push(format_timestamp(ts));
        row.extend(cols.iter().map(|c| format.format_number(c[i])));
        wtr.write_record(&row)?;
    }
    wtr.flush()
        .map_err(|e| TableError::Io(format!("flush: {e}")))?;
    Ok(())
}

pub fn write_hourly_table(
    path: &Path,
    hourly: &HourlyFrame,
    format: CsvFormat,
) -> Result<(), TableError> {
    write_hourly_table_to(create(path)?, hourly, format)
}

/// One row per hour: `timeStamp`, then cons / corrected / flag per tag.
pub fn write_hourly_table_to<W: Write>(
    w: W,
    hourly: &HourlyFrame,
    format: CsvFormat,
) -> Result<(), TableError> {
    let mut wtr = csv::WriterBuilder::new()
        .delimiter(format.delimiter())
        .from_writer(w);

    let mut header = vec![TIMESTAMP_COLUMN.to_string()];
    header.extend(hourly.column_names());
    wtr.write_record(&header)?;

    for (h, hour) in hourly.hours.iter().enumerate() {
        let mut row = vec![format_timestamp(hour)];
        for cols in hourly.tags.values() {
            row.push(format.format_number(cols.cons.get(h).copied()));
            row.push(format.format_number(cols.corrected.get(h).copied()));
            let flag = cols.has_corrections.get(h).copied().unwrap_or(false);
            row.push(flag.to_string());
        }
        wtr.write_record(&row)?;
    }
    wtr.flush()
        .map_err(|e| TableError::Io(format!("flush: {e}")))?;
    Ok(())
}
