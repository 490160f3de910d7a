use anyhow::{Context, Result};
use chrono::NaiveDateTime;
use std::fs;
use std::path::{Path, PathBuf};

use crate::model::CellLog;

/// Filename for one session file. The timestamp keeps files from separate
/// sessions from colliding.
pub fn log_file_name(stopped_at: NaiveDateTime) -> String {
    format!("celllog_{}.json", stopped_at.format("%Y-%m-%dT%H:%M:%S%.3f"))
}

/// Serialize a whole session to disk in one shot. Either the complete
/// document lands or the write errors; there is no partial-then-append
/// protocol and no retry.
pub fn write_log(dir: &Path, log: &CellLog, stopped_at: NaiveDateTime) -> Result<PathBuf> {
    fs::create_dir_all(dir)
        .with_context(|| format!("creating output directory {}", dir.display()))?;
    let path = dir.join(log_file_name(stopped_at));
    let json = serde_json::to_string_pretty(log).context("serializing cell log")?;
    fs::write(&path, json).with_context(|| format!("writing {}", path.display()))?;
    Ok(path)
}
