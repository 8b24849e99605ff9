//! ftr-io
//!
//! CSV boundary for minute and hourly tables.
//!
//! Responsibilities:
//! - detect the dialect (`,`/`.` or `;`/`,`) and parse a minute table into a
//!   [`ftr_core::MinuteFrame`], mapping suffixed column names to typed keys
//! - write minute and hourly tables in either dialect
//! - locate the newest input file in a directory
//!
//! This crate does **not** correct anything; it only moves tables between
//! disk and [`ftr_core`] types.

pub mod files;
pub mod format;
pub mod table;

pub use files::{latest_matching, timestamped_name};
pub use format::{detect_format, parse_timestamp, CsvFormat};
pub use table::{
    read_minute_table, read_minute_table_str, write_hourly_table, write_hourly_table_to,
    write_minute_table, write_minute_table_to, TableError, TIMESTAMP_COLUMN,
};
