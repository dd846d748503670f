use std::{fmt, sync::Arc};

use chrono::{DateTime, Duration, Utc};
use indexmap::IndexMap;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::{
    clock::{Clock, SystemClock},
    model::{CheckMode, VerificationResult},
    normalizer::content_digest,
};

/// Default lifetime of a cached result.
pub const DEFAULT_TTL_SECS: i64 = 24 * 60 * 60;
/// Default capacity before least-recently-used eviction kicks in.
pub const DEFAULT_MAX_ENTRIES: usize = 10_000;

/// Cache key: content digest plus the mode whose result shape is stored.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CacheKey {
    /// Hex digest of the normalized text.
    pub digest: String,
    /// Mode of the stored result.
    pub mode: CheckMode,
}

impl CacheKey {
    /// Builds the key for normalized `text` checked in `mode`.
    #[must_use]
    pub fn for_text(text: &str, mode: CheckMode) -> Self {
        Self {
            digest: content_digest(text),
            mode,
        }
    }
}

/// Stored verification result with its validity window.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheEntry {
    /// Cached pipeline output.
    pub result: VerificationResult,
    /// When the entry was written.
    pub stored_at: DateTime<Utc>,
    /// First instant at which the entry is no longer served.
    pub expires_at: DateTime<Utc>,
}

impl CacheEntry {
    fn is_live(&self, now: DateTime<Utc>) -> bool {
        now < self.expires_at
    }
}

/// Content-addressed result cache with TTL expiry and an LRU capacity bound.
///
/// Insertion order of the map doubles as recency order: hits and stores move
/// the entry to the back, eviction pops from the front.
pub struct ContentCache {
    entries: Mutex<IndexMap<CacheKey, CacheEntry>>,
    ttl: Duration,
    max_entries: usize,
    clock: Arc<dyn Clock>,
}

impl fmt::Debug for ContentCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ContentCache")
            .field("entries", &self.entries.lock().len())
            .field("ttl", &self.ttl)
            .field("max_entries", &self.max_entries)
            .finish()
    }
}

impl Default for ContentCache {
    fn default() -> Self {
        Self::new(
            Duration::seconds(DEFAULT_TTL_SECS),
            DEFAULT_MAX_ENTRIES,
            Arc::new(SystemClock),
        )
    }
}

impl ContentCache {
    /// Creates a cache with the given TTL, capacity, and clock.
    #[must_use]
    pub fn new(ttl: Duration, max_entries: usize, clock: Arc<dyn Clock>) -> Self {
        Self {
            entries: Mutex::new(IndexMap::new()),
            ttl,
            max_entries: max_entries.max(1),
            clock,
        }
    }

    /// Returns the cached result if present and unexpired. An expired entry is
    /// removed as a side effect.
    #[must_use]
    pub fn lookup(&self, key: &CacheKey) -> Option<VerificationResult> {
        let now = self.clock.now();
        let mut entries = self.entries.lock();
        let entry = entries.shift_remove(key)?;
        if !entry.is_live(now) {
            return None;
        }
        let result = entry.result.clone();
        entries.insert(key.clone(), entry);
        Some(result)
    }

    /// Overwrites any entry for `key`, sweeps expired entries, then evicts
    /// the least recently used ones beyond capacity.
    pub fn store(&self, key: CacheKey, result: VerificationResult) {
        let now = self.clock.now();
        let mut entries = self.entries.lock();
        entries.shift_remove(&key);
        entries.retain(|_, entry| entry.is_live(now));
        entries.insert(
            key,
            CacheEntry {
                result,
                stored_at: now,
                expires_at: now + self.ttl,
            },
        );
        while entries.len() > self.max_entries {
            entries.shift_remove_index(0);
        }
    }

    /// Removes every expired entry, returning how many were dropped.
    pub fn sweep(&self) -> usize {
        let now = self.clock.now();
        let mut entries = self.entries.lock();
        let before = entries.len();
        entries.retain(|_, entry| entry.is_live(now));
        before - entries.len()
    }

    /// Number of entries currently held, expired or not.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    /// True when nothing is cached.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{clock::ManualClock, model::FactCheckIssue};

    fn cache_with_clock(max_entries: usize) -> (ContentCache, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::default());
        let cache = ContentCache::new(Duration::hours(24), max_entries, clock.clone());
        (cache, clock)
    }

    fn realtime(suggestion: &str) -> VerificationResult {
        VerificationResult::Realtime(vec![FactCheckIssue {
            text: "Tokyo".into(),
            issue_description: "wrong".into(),
            confidence: crate::model::Confidence::High,
            suggestion: suggestion.into(),
        }])
    }

    #[test]
    fn hit_within_ttl_and_shared_across_case() {
        let (cache, clock) = cache_with_clock(8);
        cache.store(
            CacheKey::for_text("The Wall", CheckMode::Realtime),
            realtime("China"),
        );
        clock.advance(Duration::hours(23));
        let hit = cache.lookup(&CacheKey::for_text(" the wall ", CheckMode::Realtime));
        assert_eq!(hit, Some(realtime("China")));
        assert!(cache
            .lookup(&CacheKey::for_text("the wall", CheckMode::Detailed))
            .is_none());
    }

    #[test]
    fn expired_entry_is_absent_and_removed() {
        let (cache, clock) = cache_with_clock(8);
        let key = CacheKey::for_text("the wall", CheckMode::Realtime);
        cache.store(key.clone(), realtime("China"));
        clock.advance(Duration::hours(24));
        assert!(cache.lookup(&key).is_none());
        assert!(cache.is_empty());
    }

    #[test]
    fn store_overwrites_and_sweeps_expired() {
        let (cache, clock) = cache_with_clock(8);
        let old = CacheKey::for_text("old text", CheckMode::Realtime);
        let fresh = CacheKey::for_text("fresh text", CheckMode::Realtime);
        cache.store(old.clone(), realtime("a"));
        clock.advance(Duration::hours(25));
        cache.store(fresh.clone(), realtime("b"));
        cache.store(fresh.clone(), realtime("c"));
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.lookup(&fresh), Some(realtime("c")));
    }

    #[test]
    fn evicts_least_recently_used_beyond_capacity() {
        let (cache, _clock) = cache_with_clock(2);
        let first = CacheKey::for_text("first", CheckMode::Realtime);
        let second = CacheKey::for_text("second", CheckMode::Realtime);
        let third = CacheKey::for_text("third", CheckMode::Realtime);
        cache.store(first.clone(), realtime("1"));
        cache.store(second.clone(), realtime("2"));
        assert!(cache.lookup(&first).is_some());
        cache.store(third.clone(), realtime("3"));
        assert_eq!(cache.len(), 2);
        assert!(cache.lookup(&second).is_none());
        assert!(cache.lookup(&first).is_some());
        assert!(cache.lookup(&third).is_some());
    }

    #[test]
    fn expired_entries_go_before_live_ones_are_evicted() {
        let (cache, clock) = cache_with_clock(2);
        let first = CacheKey::for_text("first", CheckMode::Realtime);
        let second = CacheKey::for_text("second", CheckMode::Realtime);
        let third = CacheKey::for_text("third", CheckMode::Realtime);
        cache.store(first.clone(), realtime("1"));
        clock.advance(Duration::hours(12));
        cache.store(second.clone(), realtime("2"));
        clock.advance(Duration::hours(1));
        assert!(cache.lookup(&first).is_some());
        clock.advance(Duration::hours(12));
        cache.store(third.clone(), realtime("3"));
        assert_eq!(cache.len(), 2);
        assert!(cache.lookup(&second).is_some());
        assert!(cache.lookup(&third).is_some());
        assert!(cache.lookup(&first).is_none());
    }

    #[test]
    fn sweep_reports_dropped_entries() {
        let (cache, clock) = cache_with_clock(8);
        cache.store(CacheKey::for_text("a", CheckMode::Realtime), realtime("1"));
        cache.store(CacheKey::for_text("a", CheckMode::Detailed), realtime("2"));
        assert_eq!(cache.sweep(), 0);
        clock.advance(Duration::hours(24));
        assert_eq!(cache.sweep(), 2);
        assert!(cache.is_empty());
    }
}
