//! Output naming and input discovery.

use std::path::{Path, PathBuf};
use std::time::SystemTime;

use chrono::NaiveDateTime;

use crate::table::TableError;

/// `<prefix>_<YYYYmmdd_HHMMSS>.<ext>`
pub fn timestamped_name(prefix: &str, at: NaiveDateTime, ext: &str) -> String {
    format!("{prefix}_{}.{ext}", at.format("%Y%m%d_%H%M%S"))
}

/// Newest file in `dir` whose name starts with `prefix` and ends with
/// `.<ext>`, by modification time. Ties break on file name so the pick is
/// stable. `Ok(None)` when nothing matches.
pub fn latest_matching(dir: &Path, prefix: &str, ext: &str) -> Result<Option<PathBuf>, TableError> {
    let entries = std::fs::read_dir(dir)
        .map_err(|e| TableError::Io(format!("read dir '{}': {e}", dir.display())))?;
    let suffix = format!(".{ext}");

    let mut best: Option<(SystemTime, String, PathBuf)> = None;
    for entry in entries {
        let entry = entry.map_err(|e| TableError::Io(format!("read dir entry: {e}")))?;
        let name = entry.file_name().to_string_lossy().into_owned();
        if !(name.starts_with(prefix) && name.ends_with(&suffix)) {
            continue;
        }
        let meta = entry
            .metadata()
            .map_err(|e| TableError::Io(format!("stat '{name}': {e}")))?;
        if !meta.is_file() {
            continue;
        }
        let mtime = meta.modified().unwrap_or(SystemTime::UNIX_EPOCH);
        let candidate = (mtime, name, entry.path());
        if best
            .as_ref()
            .map_or(true, |b| (&candidate.0, &candidate.1) > (&b.0, &b.1))
        {
            best = Some(candidate);
        }
    }
    Ok(best.map(|(_, _, p)| p))
}
