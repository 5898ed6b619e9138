// ============================================================================
// Night Journal
// ============================================================================

use std::collections::BTreeSet;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};

use tracing::{info, warn};

use crate::error::{StreamError, StreamResult};

/// Persisted set of nights already fully streamed: one integer per line,
/// read fully at startup, appended to (never rewritten) after each night
/// completes.  This is the sole durability mechanism — a journaled night is
/// never re-streamed, and a crash mid-night re-streams that night from
/// scratch on the next run.
#[derive(Debug)]
pub struct NightJournal {
    path: PathBuf,
    nights: BTreeSet<i64>,
}

impl NightJournal {
    pub fn load(path: &Path) -> StreamResult<Self> {
        let mut nights = BTreeSet::new();
        if path.is_file() {
            info!(path = %path.display(), "reading nights done");
            let contents = std::fs::read_to_string(path)?;
            for line in contents.lines() {
                let line = line.trim();
                if line.is_empty() {
                    continue;
                }
                let night: i64 = line.parse().map_err(|_| {
                    StreamError::Journal(format!(
                        "bad journal line '{line}' in {}",
                        path.display()
                    ))
                })?;
                nights.insert(night);
            }
        } else {
            warn!(path = %path.display(), "no nights-done journal, starting empty");
        }
        Ok(Self {
            path: path.to_path_buf(),
            nights,
        })
    }

    pub fn contains(&self, night: i64) -> bool {
        self.nights.contains(&night)
    }

    pub fn len(&self) -> usize {
        self.nights.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nights.is_empty()
    }

    /// Append `night` and persist it immediately.
    pub fn record(&mut self, night: i64) -> StreamResult<()> {
        if !self.nights.insert(night) {
            return Ok(());
        }
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(|e| {
                StreamError::Journal(format!("opening {}: {e}", self.path.display()))
            })?;
        writeln!(file, "{night}")
            .and_then(|_| file.sync_data())
            .map_err(|e| {
                StreamError::Journal(format!("appending to {}: {e}", self.path.display()))
            })?;
        Ok(())
    }
}
