//! Day-keyed listing cache.
//!
//! One record per (server, listing kind, calendar day), so staleness is
//! bounded by the remainder of the current day. A record is either fully
//! present and valid JSON or treated as absent; corrupt files trigger a
//! live re-fetch instead of an error.

use std::cell::RefCell;
use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;

use chrono::Local;
use tracing::{debug, warn};

use crate::error::Result;

/// Read/write access to cached listing payloads. Injected into the
/// acquisition flow so tests can substitute an in-memory store.
pub trait ListingCache {
    /// Cached payload for `kind`, if present and valid.
    fn load(&self, kind: &str) -> Option<String>;
    /// Persist `payload` for `kind`. Best-effort: failures are logged.
    fn store(&self, kind: &str, payload: &str);
}

/// Return the cached payload for `kind`, or fetch, store and return it.
///
/// With `bypass` set (`--nocache`) the cache is not consulted but the fresh
/// payload is still written through, so the next run benefits.
pub fn get_or_fetch<F>(
    cache: &dyn ListingCache,
    kind: &str,
    bypass: bool,
    fetch: F,
) -> Result<String>
where
    F: FnOnce() -> Result<String>,
{
    if !bypass {
        if let Some(payload) = cache.load(kind) {
            return Ok(payload);
        }
    }
    let payload = fetch()?;
    cache.store(kind, &payload);
    Ok(payload)
}

/// Disk-backed cache, one JSON file per (server, kind, day):
/// `cache-<server_key>-<kind>-<YYYY-MM-DD>.json`.
pub struct DiskCache {
    dir: PathBuf,
    server_key: String,
    day: String,
}

impl DiskCache {
    pub fn new(dir: PathBuf, server_key: &str) -> Self {
        Self {
            dir,
            server_key: server_key.to_string(),
            day: Local::now().format("%Y-%m-%d").to_string(),
        }
    }

    fn record_path(&self, kind: &str) -> PathBuf {
        self.dir
            .join(format!("cache-{}-{}-{}.json", self.server_key, kind, self.day))
    }

    // Write to a temp sibling and rename, so a record is never half-written.
    fn try_store(&self, kind: &str, payload: &str) -> std::io::Result<()> {
        fs::create_dir_all(&self.dir)?;
        let path = self.record_path(kind);
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, payload)?;
        fs::rename(&tmp, &path)
    }
}

impl ListingCache for DiskCache {
    fn load(&self, kind: &str) -> Option<String> {
        let path = self.record_path(kind);
        let content = fs::read_to_string(&path).ok()?;
        if serde_json::from_str::<serde_json::Value>(&content).is_err() {
            warn!("discarding corrupt cache record {}", path.display());
            return None;
        }
        debug!("cache hit for {kind} ({})", path.display());
        Some(content)
    }

    fn store(&self, kind: &str, payload: &str) {
        if let Err(e) = self.try_store(kind, payload) {
            warn!("failed to write cache record for {kind}: {e}");
        }
    }
}

/// In-memory cache for tests.
#[derive(Default)]
pub struct MemoryCache {
    records: RefCell<HashMap<String, String>>,
}

impl ListingCache for MemoryCache {
    fn load(&self, kind: &str) -> Option<String> {
        self.records.borrow().get(kind).cloned()
    }

    fn store(&self, kind: &str, payload: &str) {
        self.records
            .borrow_mut()
            .insert(kind.to_string(), payload.to_string());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    fn fetch_counter<'a>(
        counter: &'a Cell<u32>,
        payload: &'a str,
    ) -> impl FnOnce() -> Result<String> + 'a {
        move || {
            counter.set(counter.get() + 1);
            Ok(payload.to_string())
        }
    }

    #[test]
    fn second_read_skips_the_fetch() {
        let dir = tempfile::tempdir().expect("tempdir");
        let cache = DiskCache::new(dir.path().to_path_buf(), "tv.example.com");
        let fetches = Cell::new(0);

        let first =
            get_or_fetch(&cache, "live_streams", false, fetch_counter(&fetches, r#"[{"a":1}]"#))
                .expect("first fetch");
        let second = get_or_fetch(&cache, "live_streams", false, || {
            panic!("must not fetch on a warm cache")
        })
        .expect("cached read");

        assert_eq!(fetches.get(), 1);
        assert_eq!(first, second);
    }

    #[test]
    fn bypass_refetches_but_writes_through() {
        let dir = tempfile::tempdir().expect("tempdir");
        let cache = DiskCache::new(dir.path().to_path_buf(), "tv.example.com");
        let fetches = Cell::new(0);

        get_or_fetch(&cache, "live_streams", false, fetch_counter(&fetches, r#"["old"]"#))
            .expect("seed");
        let fresh =
            get_or_fetch(&cache, "live_streams", true, fetch_counter(&fetches, r#"["new"]"#))
                .expect("bypass fetch");

        assert_eq!(fetches.get(), 2);
        assert_eq!(fresh, r#"["new"]"#);
        // the bypass write-through replaced the record
        assert_eq!(cache.load("live_streams").as_deref(), Some(r#"["new"]"#));
    }

    #[test]
    fn corrupt_record_is_a_miss() {
        let dir = tempfile::tempdir().expect("tempdir");
        let cache = DiskCache::new(dir.path().to_path_buf(), "tv.example.com");

        cache.store("live_streams", r#"[{"ok":true}]"#);
        let path = cache.record_path("live_streams");
        fs::write(&path, r#"[{"ok":tru"#).expect("truncate record");

        assert!(cache.load("live_streams").is_none());

        // and get_or_fetch falls back to a live fetch
        let fetches = Cell::new(0);
        let payload =
            get_or_fetch(&cache, "live_streams", false, fetch_counter(&fetches, r#"[{"ok":1}]"#))
                .expect("refetch");
        assert_eq!(fetches.get(), 1);
        assert_eq!(payload, r#"[{"ok":1}]"#);
    }

    #[test]
    fn records_are_separated_by_kind() {
        let cache = MemoryCache::default();
        cache.store("live_streams", "[1]");
        cache.store("live_categories", "[2]");

        assert_eq!(cache.load("live_streams").as_deref(), Some("[1]"));
        assert_eq!(cache.load("live_categories").as_deref(), Some("[2]"));
        assert!(cache.load("vod_streams").is_none());
    }
}
