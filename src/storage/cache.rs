// src/storage/cache.rs — JSON-file cache of relevant patents
//
// One JSON object keyed by normalized publication number. Loaded once at
// session start, flushed once at session end via temp file + rename.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::core::types::PatentRecord;
use crate::infra::errors::ScoutError;

/// Snapshot of a relevant patent plus the query that surfaced it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheEntry {
    pub title: String,
    #[serde(rename = "abstract")]
    pub snippet: String,
    pub assignee: String,
    pub date: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub link: Option<String>,
    pub source_query: String,
    pub cached_at: DateTime<Utc>,
}

impl CacheEntry {
    pub fn from_record(record: &PatentRecord, source_query: &str, cached_at: DateTime<Utc>) -> Self {
        Self {
            title: record.title.clone(),
            snippet: record.snippet.clone(),
            assignee: record.assignee.clone(),
            date: record.publication_date.clone(),
            link: record.link.clone(),
            source_query: source_query.to_string(),
            cached_at,
        }
    }
}

pub struct CacheStore {
    path: PathBuf,
    entries: BTreeMap<String, CacheEntry>,
}

impl CacheStore {
    /// Load the cache file. Missing or corrupt files yield an empty cache;
    /// corruption is logged as a warning.
    pub fn load(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let entries = match read_entries(&path) {
            Ok(entries) => entries,
            Err(e) => {
                tracing::warn!("{}. Starting with an empty cache.", e);
                BTreeMap::new()
            }
        };
        tracing::debug!(path = %path.display(), entries = entries.len(), "cache loaded");
        Self { path, entries }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Number of entries first surfaced by `query`.
    pub fn count_for_query(&self, query: &str) -> usize {
        self.entries
            .values()
            .filter(|e| e.source_query == query)
            .count()
    }

    /// Merge entries, overwriting existing ones with the same identifier.
    /// Returns how many were written.
    pub fn upsert(&mut self, entries: impl IntoIterator<Item = (String, CacheEntry)>) -> usize {
        let mut written = 0;
        for (id, entry) in entries {
            self.entries.insert(id, entry);
            written += 1;
        }
        written
    }

    /// Entries ordered newest first, then by identifier.
    pub fn list(&self) -> Vec<(&str, &CacheEntry)> {
        let mut items: Vec<(&str, &CacheEntry)> = self
            .entries
            .iter()
            .map(|(id, e)| (id.as_str(), e))
            .collect();
        items.sort_by(|a, b| b.1.cached_at.cmp(&a.1.cached_at).then(a.0.cmp(b.0)));
        items
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Atomically write the full mapping back (temp file + rename).
    pub fn flush(&self) -> Result<(), ScoutError> {
        let dir = match self.path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
            _ => PathBuf::from("."),
        };
        std::fs::create_dir_all(&dir)?;

        let file_name = self
            .path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("patent_cache.json");
        let tmp = dir.join(format!(".{file_name}.tmp"));

        let json = serde_json::to_string_pretty(&self.entries)
            .map_err(|e| ScoutError::Other(e.into()))?;

        let mut f = std::fs::File::create(&tmp)?;
        f.write_all(json.as_bytes())?;
        f.flush()?;
        f.sync_all()?;
        std::fs::rename(&tmp, &self.path)?;

        tracing::debug!(path = %self.path.display(), entries = self.entries.len(), "cache flushed");
        Ok(())
    }
}

fn read_entries(path: &Path) -> Result<BTreeMap<String, CacheEntry>, ScoutError> {
    let content = match std::fs::read_to_string(path) {
        Ok(c) => c,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(BTreeMap::new()),
        Err(e) => {
            return Err(ScoutError::CacheCorrupt {
                path: path.to_path_buf(),
                message: e.to_string(),
            })
        }
    };

    if content.trim().is_empty() {
        return Ok(BTreeMap::new());
    }

    serde_json::from_str(&content).map_err(|e| ScoutError::CacheCorrupt {
        path: path.to_path_buf(),
        message: e.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use std::sync::{Arc, Mutex};
    use tempfile::TempDir;

    /// In-memory sink for formatted log lines.
    #[derive(Clone, Default)]
    struct CapturedLog(Arc<Mutex<Vec<u8>>>);

    impl std::io::Write for CapturedLog {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    fn entry(title: &str, query: &str, secs: i64) -> CacheEntry {
        CacheEntry {
            title: title.into(),
            snippet: "abstract".into(),
            assignee: "ACME".into(),
            date: "2021-01-01".into(),
            link: None,
            source_query: query.into(),
            cached_at: Utc.timestamp_opt(secs, 0).unwrap(),
        }
    }

    #[test]
    fn test_missing_file_is_empty() {
        let dir = TempDir::new().unwrap();
        let cache = CacheStore::load(dir.path().join("none.json"));
        assert!(cache.is_empty());
    }

    #[test]
    fn test_read_entries_reports_corruption() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("cache.json");
        std::fs::write(&path, "{ not json").unwrap();
        let err = read_entries(&path).unwrap_err();
        assert!(matches!(err, ScoutError::CacheCorrupt { .. }));
    }

    #[test]
    fn test_corrupt_file_loads_empty_and_warns() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("cache.json");
        std::fs::write(&path, "{ not json").unwrap();

        let log = CapturedLog::default();
        let writer = log.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_writer(move || writer.clone())
            .with_ansi(false)
            .with_max_level(tracing::Level::WARN)
            .finish();
        let cache = tracing::subscriber::with_default(subscriber, || CacheStore::load(&path));

        assert!(cache.is_empty());
        let output = String::from_utf8(log.0.lock().unwrap().clone()).unwrap();
        assert!(output.contains("WARN"), "no warning logged: {output}");
        assert!(output.contains("is corrupt"), "unexpected warning: {output}");
    }

    #[test]
    fn test_blank_file_is_empty_not_corrupt() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("cache.json");
        std::fs::write(&path, "  \n").unwrap();
        assert!(read_entries(&path).unwrap().is_empty());
    }

    #[test]
    fn test_entry_json_shape() {
        let json = serde_json::to_value(entry("Lidar", "q", 0)).unwrap();
        for key in ["title", "abstract", "assignee", "date", "source_query", "cached_at"] {
            assert!(json.get(key).is_some(), "missing {key}");
        }
        assert!(json.get("link").is_none());
    }

    #[test]
    fn test_list_newest_first() {
        let dir = TempDir::new().unwrap();
        let mut cache = CacheStore::load(dir.path().join("c.json"));
        cache.upsert([
            ("A".to_string(), entry("old", "q", 10)),
            ("B".to_string(), entry("new", "q", 20)),
        ]);
        let ids: Vec<&str> = cache.list().iter().map(|(id, _)| *id).collect();
        assert_eq!(ids, vec!["B", "A"]);
    }

    #[test]
    fn test_count_for_query() {
        let dir = TempDir::new().unwrap();
        let mut cache = CacheStore::load(dir.path().join("c.json"));
        cache.upsert([
            ("A".to_string(), entry("a", "lidar", 1)),
            ("B".to_string(), entry("b", "radar", 1)),
            ("C".to_string(), entry("c", "lidar", 1)),
        ]);
        assert_eq!(cache.count_for_query("lidar"), 2);
        assert_eq!(cache.count_for_query("sonar"), 0);
    }

    #[test]
    fn test_flush_leaves_no_temp_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("c.json");
        let mut cache = CacheStore::load(&path);
        cache.upsert([("A".to_string(), entry("a", "q", 1))]);
        cache.flush().unwrap();
        assert!(path.exists());
        assert!(!dir.path().join(".c.json.tmp").exists());
    }

    #[test]
    fn test_clear() {
        let dir = TempDir::new().unwrap();
        let mut cache = CacheStore::load(dir.path().join("c.json"));
        cache.upsert([("A".to_string(), entry("a", "q", 1))]);
        cache.clear();
        assert_eq!(cache.len(), 0);
    }
}
