//! Process-wide memoization cache.
//!
//! The [`Cache`] maps string keys to arbitrary typed payloads. It has no
//! eviction, no size bound and no expiry: callers that need freshness store
//! a [`Stamped`] payload and decide staleness themselves, since different
//! plugins want different rules.
//!
//! [`DiskMemo`] is the file-backed counterpart used to carry memoized
//! results across runs. It is best-effort: unreadable or corrupt entries
//! read as misses.

use std::any::Any;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, PoisonError, RwLock};

use chrono::{DateTime, Duration, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::debug;

type Payload = Arc<dyn Any + Send + Sync>;

// =============================================================================
// In-memory cache
// =============================================================================

/// A concurrent key → value store shared by all plugins of a build.
///
/// Cloning is cheap and yields a handle to the same entries. Concurrent
/// `set` calls on one key are last-write-wins.
#[derive(Clone, Default)]
pub struct Cache {
    entries: Arc<RwLock<HashMap<String, Payload>>>,
}

impl Cache {
    /// Create a new empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// Get the untyped payload stored under `key`.
    pub fn get_any(&self, key: &str) -> Option<Payload> {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key)
            .cloned()
    }

    /// Get the payload under `key` if it exists and has type `T`.
    pub fn get<T: Any + Send + Sync>(&self, key: &str) -> Option<Arc<T>> {
        self.get_any(key)?.downcast::<T>().ok()
    }

    /// Store `value` under `key`, replacing any previous payload.
    pub fn set<T: Any + Send + Sync>(&self, key: impl Into<String>, value: T) {
        self.entries
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key.into(), Arc::new(value) as Payload);
    }

    /// Return the cached `T` under `key`, computing and storing it on a miss.
    ///
    /// `compute` runs outside the lock, so two workers missing on the same
    /// key may both compute; the later write wins.
    pub fn get_or_insert_with<T, F>(&self, key: &str, compute: F) -> Arc<T>
    where
        T: Any + Send + Sync,
        F: FnOnce() -> T,
    {
        if let Some(hit) = self.get::<T>(key) {
            return hit;
        }
        let value = Arc::new(compute());
        self.entries
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key.to_string(), value.clone() as Payload);
        value
    }

    pub fn contains(&self, key: &str) -> bool {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl std::fmt::Debug for Cache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Cache").field("entries", &self.len()).finish()
    }
}

// =============================================================================
// Freshness
// =============================================================================

/// A payload with the time it was produced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Stamped<T> {
    pub stored_at: DateTime<Utc>,
    pub value: T,
}

impl<T> Stamped<T> {
    /// Stamp `value` with the current time.
    pub fn now(value: T) -> Self {
        Self::at(Utc::now(), value)
    }

    pub fn at(stored_at: DateTime<Utc>, value: T) -> Self {
        Self { stored_at, value }
    }

    /// True while `now - stored_at` is below `ttl`.
    pub fn is_fresh(&self, ttl: Duration, now: DateTime<Utc>) -> bool {
        now.signed_duration_since(self.stored_at) < ttl
    }
}

// =============================================================================
// On-disk memo
// =============================================================================

/// JSON files under a directory, one per key.
#[derive(Debug, Clone)]
pub struct DiskMemo {
    dir: PathBuf,
}

impl DiskMemo {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Path of the file backing `key`.
    pub fn path_for(&self, key: &str) -> PathBuf {
        let name: String = key
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() || c == '-' { c } else { '_' })
            .collect();
        self.dir.join(format!("{name}.json"))
    }

    /// Read the payload for `key`; any failure reads as a miss.
    pub fn load<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let path = self.path_for(key);
        let text = std::fs::read_to_string(&path).ok()?;
        match serde_json::from_str(&text) {
            Ok(value) => Some(value),
            Err(e) => {
                debug!("ignoring unreadable memo {}: {e}", path.display());
                None
            }
        }
    }

    /// Write the payload for `key`, creating the directory as needed.
    pub fn store<T: Serialize>(&self, key: &str, value: &T) -> std::io::Result<()> {
        std::fs::create_dir_all(&self.dir)?;
        let text = serde_json::to_string_pretty(value)?;
        std::fs::write(self.path_for(key), text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_then_get() {
        let cache = Cache::new();
        cache.set("k", 42_i32);

        assert_eq!(cache.get::<i32>("k").as_deref(), Some(&42));
        assert!(cache.get::<i32>("missing").is_none());
        assert!(cache.get_any("missing").is_none());
    }

    #[test]
    fn test_get_wrong_type_is_a_miss() {
        let cache = Cache::new();
        cache.set("k", "text".to_string());

        assert!(cache.get::<i32>("k").is_none());
        assert!(cache.contains("k"));
    }

    #[test]
    fn test_last_write_wins() {
        let cache = Cache::new();
        cache.set("k", 1_u8);
        cache.set("k", 2_u8);
        assert_eq!(cache.get::<u8>("k").as_deref(), Some(&2));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_clones_share_entries() {
        let cache = Cache::new();
        let handle = cache.clone();
        handle.set("shared", vec![1, 2, 3]);
        assert_eq!(cache.get::<Vec<i32>>("shared").as_deref(), Some(&vec![1, 2, 3]));
    }

    #[test]
    fn test_get_or_insert_with_computes_once() {
        let cache = Cache::new();
        let mut calls = 0;
        let first = cache.get_or_insert_with("index", || {
            calls += 1;
            "built".to_string()
        });
        let second = cache.get_or_insert_with("index", || "rebuilt".to_string());

        assert_eq!(calls, 1);
        assert_eq!(*first, "built");
        assert_eq!(*second, "built");
    }

    #[test]
    fn test_concurrent_writers() {
        let cache = Cache::new();
        std::thread::scope(|scope| {
            for i in 0..8 {
                let cache = cache.clone();
                scope.spawn(move || cache.set(format!("key-{i}"), i));
            }
        });
        assert_eq!(cache.len(), 8);
        assert_eq!(cache.get::<i32>("key-5").as_deref(), Some(&5));
    }

    #[test]
    fn test_stamped_freshness() {
        let stored = Utc::now() - Duration::minutes(30);
        let stamped = Stamped::at(stored, "payload");

        assert!(stamped.is_fresh(Duration::hours(1), Utc::now()));
        assert!(!stamped.is_fresh(Duration::minutes(10), Utc::now()));
    }

    #[test]
    fn test_disk_memo_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let memo = DiskMemo::new(dir.path().join("memo"));
        let stamped = Stamped::now(vec!["a".to_string()]);

        memo.store("blogroll:https://x.example/feed", &stamped).unwrap();
        let loaded: Option<Stamped<Vec<String>>> = memo.load("blogroll:https://x.example/feed");

        assert_eq!(loaded, Some(stamped));
        assert!(memo.load::<Stamped<Vec<String>>>("other").is_none());
    }

    #[test]
    fn test_disk_memo_corrupt_file_is_a_miss() {
        let dir = tempfile::tempdir().unwrap();
        let memo = DiskMemo::new(dir.path());
        std::fs::write(memo.path_for("bad"), "{not json").unwrap();

        assert!(memo.load::<Stamped<String>>("bad").is_none());
    }
}
