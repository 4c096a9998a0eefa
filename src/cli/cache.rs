// src/cli/cache.rs — Inspect and clear the relevant-patent cache

use crate::infra::config::Config;
use crate::storage::cache::{CacheEntry, CacheStore};
use crate::util::truncate_str;

/// Print every cached patent, newest first.
pub fn show_cache(config: &Config) -> anyhow::Result<()> {
    let cache = CacheStore::load(&config.storage.cache_path);
    if cache.is_empty() {
        println!("Cache is empty ({})", cache.path().display());
        return Ok(());
    }

    println!(
        "{} cached patent(s) in {}",
        cache.len(),
        cache.path().display()
    );
    println!();
    for (id, entry) in cache.list() {
        println!("{}", format_entry(id, entry));
    }
    Ok(())
}

/// Remove all entries and write the empty cache back.
pub fn clear_cache(config: &Config) -> anyhow::Result<()> {
    let mut cache = CacheStore::load(&config.storage.cache_path);
    let removed = cache.len();
    cache.clear();
    cache.flush()?;
    tracing::info!("Cleared {} cached patent(s)", removed);
    println!("Cleared {} cached patent(s)", removed);
    Ok(())
}

fn format_entry(id: &str, entry: &CacheEntry) -> String {
    let mut line = format!("  {}  {}", id, truncate_str(&entry.title, 100));
    if !entry.assignee.is_empty() {
        line.push_str(&format!(" ({})", entry.assignee));
    }
    line.push_str(&format!(
        "\n      query: {}  cached: {}",
        entry.source_query,
        entry.cached_at.format("%Y-%m-%d %H:%M")
    ));
    line
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use tempfile::TempDir;

    #[test]
    fn test_format_entry() {
        let entry = CacheEntry {
            title: "Lidar".into(),
            snippet: String::new(),
            assignee: "ACME".into(),
            date: "2020-01-01".into(),
            link: None,
            source_query: "lidar".into(),
            cached_at: Utc.with_ymd_and_hms(2026, 5, 2, 8, 15, 0).unwrap(),
        };
        assert_eq!(
            format_entry("US1A", &entry),
            "  US1A  Lidar (ACME)\n      query: lidar  cached: 2026-05-02 08:15"
        );
    }

    #[test]
    fn test_clear_cache_writes_empty_object() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("cache.json");
        std::fs::write(
            &path,
            r#"{"US1A":{"title":"t","abstract":"a","assignee":"x","date":"d","source_query":"q","cached_at":"2026-01-01T00:00:00Z"}}"#,
        )
        .unwrap();

        let mut config = Config::default();
        config.storage.cache_path = path.clone();
        clear_cache(&config).unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        assert_eq!(content.trim(), "{}");
    }
}
