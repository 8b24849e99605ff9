//! Dialects, numbers and timestamps.

use chrono::{DateTime, NaiveDateTime, Utc};

/// CSV dialect.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CsvFormat {
    /// `,` separator, `.` decimal point.
    Standard,
    /// `;` separator, `,` decimal comma.
    European,
}

impl CsvFormat {
    pub fn delimiter(&self) -> u8 {
        match self {
            CsvFormat::Standard => b',',
            CsvFormat::European => b';',
        }
    }

    /// Lenient numeric parse. Empty, non-numeric and non-finite fields are
    /// undefined.
    pub fn parse_number(&self, raw: &str) -> Option<f64> {
        let t = raw.trim();
        if t.is_empty() {
            return None;
        }
        let v = match self {
            CsvFormat::Standard => t.parse::<f64>().ok(),
            CsvFormat::European => t.replace(',', ".").parse::<f64>().ok(),
        }?;
        v.is_finite().then_some(v)
    }

    /// Render a value; undefined renders as an empty field.
    pub fn format_number(&self, v: Option<f64>) -> String {
        match v {
            Some(x) if x.is_finite() => {
                let s = format!("{x}");
                match self {
                    CsvFormat::Standard => s,
                    CsvFormat::European => s.replace('.', ","),
                }
            }
            _ => String::new(),
        }
    }
}

/// `;` anywhere in the header line means European.
pub fn detect_format(header_line: &str) -> CsvFormat {
    if header_line.contains(';') {
        CsvFormat::European
    } else {
        CsvFormat::Standard
    }
}

const NAIVE_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
];

const OFFSET_FORMATS: &[&str] = &["%Y-%m-%d %H:%M:%S%:z", "%Y-%m-%d %H:%M:%S%z"];

/// Parse a timestamp cell. Naive times are taken as UTC; offsets are honoured.
/// Bare integers are epoch seconds.
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let t = raw.trim();
    if t.is_empty() {
        return None;
    }
    if let Ok(secs) = t.parse::<i64>() {
        return DateTime::from_timestamp(secs, 0);
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(t) {
        return Some(dt.with_timezone(&Utc));
    }
    for f in OFFSET_FORMATS {
        if let Ok(dt) = DateTime::parse_from_str(t, f) {
            return Some(dt.with_timezone(&Utc));
        }
    }
    NAIVE_FORMATS
        .iter()
        .find_map(|f| NaiveDateTime::parse_from_str(t, f).ok())
        .map(|n| n.and_utc())
}

/// Written timestamp form.
pub fn format_timestamp(ts: &DateTime<Utc>) -> String {
    ts.format("%Y-%m-%d %H:%M:%S").to_string()
}
