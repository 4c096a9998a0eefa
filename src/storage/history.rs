// src/storage/history.rs — One JSON file per finished session

use std::io::Write;
use std::path::{Path, PathBuf};

use crate::core::types::SearchSession;
use crate::infra::errors::ScoutError;

/// Characters of the original query used in the file name.
const SLUG_CHARS: usize = 30;

pub struct HistoryRecorder {
    dir: PathBuf,
}

impl HistoryRecorder {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Write `session` as a new file, creating the directory if needed.
    /// Existing files are never overwritten.
    pub fn append(&self, session: &SearchSession) -> Result<PathBuf, ScoutError> {
        std::fs::create_dir_all(&self.dir)?;

        let stem = file_stem(session);
        let json = serde_json::to_string_pretty(session).map_err(|e| ScoutError::Other(e.into()))?;

        let mut attempt = 1;
        loop {
            let name = if attempt == 1 {
                format!("{stem}.json")
            } else {
                format!("{stem}_{attempt}.json")
            };
            let path = self.dir.join(name);

            match std::fs::OpenOptions::new()
                .write(true)
                .create_new(true)
                .open(&path)
            {
                Ok(mut f) => {
                    f.write_all(json.as_bytes())?;
                    f.flush()?;
                    tracing::info!("Search history saved: {}", path.display());
                    return Ok(path);
                }
                Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => attempt += 1,
                Err(e) => return Err(e.into()),
            }
        }
    }
}

/// `session_<YYYYmmdd_HHMMSS_mmm>[_<slug>]`
fn file_stem(session: &SearchSession) -> String {
    let ts = session.timestamp.format("%Y%m%d_%H%M%S_%3f");
    let head: String = session.query.chars().take(SLUG_CHARS).collect();
    let slug = slug::slugify(head).replace('-', "_");
    if slug.is_empty() {
        format!("session_{ts}")
    } else {
        format!("session_{ts}_{slug}")
    }
}
