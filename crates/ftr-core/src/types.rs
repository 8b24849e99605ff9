use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One value per minute, aligned to the owning frame's timestamps.
/// `None` means undefined (absent, NaN or non-numeric at the boundary).
pub type Column = Vec<Option<f64>>;

pub const SUFFIX_HIGH: &str = "_H";
pub const SUFFIX_LOW: &str = "_L";
pub const SUFFIX_RECT: &str = "_rect_0";
pub const SUFFIX_CONS: &str = "_cons";
pub const SUFFIX_ANOM: &str = "_anom";

// ---------------------------------------------------------------------------
// Column keys
// ---------------------------------------------------------------------------

/// Which totalizer a derived column was computed from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Basis {
    /// The combined/raw counter.
    Raw,
    /// The `_rect_0` carry-forward total.
    Rectified,
}

/// Processing stage of a column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Stage {
    /// Raw (or combined) cumulative counter.
    Total,
    /// High 16-bit word of a split counter.
    High,
    /// Low 16-bit word of a split counter.
    Low,
    /// Carry-forward rectified counter.
    Rectified,
    /// Forward difference of a counter.
    Consumption(Basis),
    /// Sparse replacement consumption values.
    Anomaly(Basis),
}

impl Stage {
    pub fn is_derived(&self) -> bool {
        matches!(
            self,
            Stage::Rectified | Stage::Consumption(_) | Stage::Anomaly(_)
        )
    }
}

/// Typed address of a column: which tag, which stage.
///
/// The `_H` / `_L` / `_rect_0` / `_cons` / `_anom` suffix convention only
/// exists at the serialization boundary ([`ColumnKey::column_name`] and
/// [`ColumnKey::parse`]).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ColumnKey {
    pub tag: String,
    pub stage: Stage,
}

impl ColumnKey {
    pub fn new<S: Into<String>>(tag: S, stage: Stage) -> Self {
        Self {
            tag: tag.into(),
            stage,
        }
    }

    pub fn total<S: Into<String>>(tag: S) -> Self {
        Self::new(tag, Stage::Total)
    }

    pub fn rectified<S: Into<String>>(tag: S) -> Self {
        Self::new(tag, Stage::Rectified)
    }

    /// External column name under the suffix convention.
    pub fn column_name(&self) -> String {
        let tag = self.tag.as_str();
        match self.stage {
            Stage::Total => tag.to_string(),
            Stage::High => format!("{tag}{SUFFIX_HIGH}"),
            Stage::Low => format!("{tag}{SUFFIX_LOW}"),
            Stage::Rectified => format!("{tag}{SUFFIX_RECT}"),
            Stage::Consumption(Basis::Raw) => format!("{tag}{SUFFIX_CONS}"),
            Stage::Consumption(Basis::Rectified) => format!("{tag}{SUFFIX_RECT}{SUFFIX_CONS}"),
            Stage::Anomaly(Basis::Raw) => format!("{tag}{SUFFIX_ANOM}"),
            Stage::Anomaly(Basis::Rectified) => format!("{tag}{SUFFIX_RECT}{SUFFIX_ANOM}"),
        }
    }

    /// Parse an external column name by suffix stripping.
    ///
    /// `_anom` / `_cons` are stripped first, then `_rect_0` optionally, so both
    /// `X_rect_0_cons` and `X_cons` resolve to tag `X`. High/low words cannot be
    /// told apart from a tag that happens to end in `_H` without seeing the
    /// whole header; [`MinuteFrame::from_named_columns`] does that pairing.
    pub fn parse(name: &str) -> Self {
        if let Some(base) = name.strip_suffix(SUFFIX_ANOM) {
            let (tag, basis) = split_basis(base);
            return Self::new(tag, Stage::Anomaly(basis));
        }
        if let Some(base) = name.strip_suffix(SUFFIX_CONS) {
            let (tag, basis) = split_basis(base);
            return Self::new(tag, Stage::Consumption(basis));
        }
        if let Some(tag) = name.strip_suffix(SUFFIX_RECT) {
            return Self::new(tag, Stage::Rectified);
        }
        Self::total(name)
    }
}

fn split_basis(base: &str) -> (&str, Basis) {
    match base.strip_suffix(SUFFIX_RECT) {
        Some(tag) => (tag, Basis::Rectified),
        None => (base, Basis::Raw),
    }
}

impl fmt::Display for ColumnKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.column_name())
    }
}

// ---------------------------------------------------------------------------
// Frame
// ---------------------------------------------------------------------------

/// Errors produced when building or extending a [`MinuteFrame`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FrameError {
    /// A column does not have one value per timestamp.
    LengthMismatch {
        column: String,
        expected: usize,
        actual: usize,
    },
}

impl fmt::Display for FrameError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FrameError::LengthMismatch {
                column,
                expected,
                actual,
            } => write!(
                f,
                "column '{column}' has {actual} values, frame has {expected} timestamps"
            ),
        }
    }
}

impl std::error::Error for FrameError {}

/// A batch of aligned minute columns sharing one timestamp index.
///
/// Column insertion order is remembered so that serialized output keeps the
/// input columns first and appends derived columns after them.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MinuteFrame {
    timestamps: Vec<DateTime<Utc>>,
    columns: BTreeMap<ColumnKey, Column>,
    order: Vec<ColumnKey>,
}

impl MinuteFrame {
    pub fn new(timestamps: Vec<DateTime<Utc>>) -> Self {
        Self {
            timestamps,
            columns: BTreeMap::new(),
            order: Vec::new(),
        }
    }

    /// Build a frame from externally named columns, resolving split counter
    /// words: `<tag>_H` is only a high word when `<tag>_L` is also present
    /// (and vice versa); otherwise the name is parsed as-is.
    pub fn from_named_columns(
        timestamps: Vec<DateTime<Utc>>,
        named: Vec<(String, Column)>,
    ) -> Result<Self, FrameError> {
        let names: BTreeSet<String> = named.iter().map(|(n, _)| n.clone()).collect();
        let mut frame = Self::new(timestamps);

        for (name, values) in named {
            let key = resolve_word_key(&name, &names).unwrap_or_else(|| ColumnKey::parse(&name));
            frame.insert(key, values)?;
        }

        Ok(frame)
    }

    pub fn timestamps(&self) -> &[DateTime<Utc>] {
        &self.timestamps
    }

    pub fn len(&self) -> usize {
        self.timestamps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.timestamps.is_empty()
    }

    /// Insert or replace a column. Replacing keeps the original position.
    pub fn insert(&mut self, key: ColumnKey, values: Column) -> Result<(), FrameError> {
        if values.len() != self.timestamps.len() {
            return Err(FrameError::LengthMismatch {
                column: key.column_name(),
                expected: self.timestamps.len(),
                actual: values.len(),
            });
        }
        if !self.columns.contains_key(&key) {
            self.order.push(key.clone());
        }
        self.columns.insert(key, values);
        Ok(())
    }

    pub fn get(&self, key: &ColumnKey) -> Option<&[Option<f64>]> {
        self.columns.get(key).map(|c| c.as_slice())
    }

    pub fn contains(&self, key: &ColumnKey) -> bool {
        self.columns.contains_key(key)
    }

    pub fn remove(&mut self, key: &ColumnKey) -> Option<Column> {
        let removed = self.columns.remove(key)?;
        self.order.retain(|k| k != key);
        Some(removed)
    }

    /// Column keys in insertion order.
    pub fn keys(&self) -> impl Iterator<Item = &ColumnKey> {
        self.order.iter()
    }

    /// `(key, values)` pairs in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&ColumnKey, &[Option<f64>])> {
        self.order
            .iter()
            .filter_map(|k| self.columns.get(k).map(|c| (k, c.as_slice())))
    }

    /// Tags that have a column at `stage`, in insertion order.
    pub fn tags_at(&self, stage: Stage) -> Vec<String> {
        self.order
            .iter()
            .filter(|k| k.stage == stage)
            .map(|k| k.tag.clone())
            .collect()
    }

    /// Drop every rectified/consumption/anomaly column. Derived columns are
    /// recomputed on each run and never read back as input.
    pub fn drop_derived(&mut self) -> usize {
        let derived: Vec<ColumnKey> = self
            .order
            .iter()
            .filter(|k| k.stage.is_derived())
            .cloned()
            .collect();
        for key in &derived {
            self.remove(key);
        }
        derived.len()
    }
}

fn resolve_word_key(name: &str, names: &BTreeSet<String>) -> Option<ColumnKey> {
    if let Some(base) = name.strip_suffix(SUFFIX_HIGH) {
        if names.contains(&format!("{base}{SUFFIX_LOW}")) {
            return Some(ColumnKey::new(base, Stage::High));
        }
    }
    if let Some(base) = name.strip_suffix(SUFFIX_LOW) {
        if names.contains(&format!("{base}{SUFFIX_HIGH}")) {
            return Some(ColumnKey::new(base, Stage::Low));
        }
    }
    None
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
