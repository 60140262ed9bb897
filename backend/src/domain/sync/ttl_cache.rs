//! Short-lived side cache of per-source flight snapshots.
//!
//! Entries expire lazily: an expired entry is only dropped when a read finds
//! it. There is no background sweep, so the map holds at most the distinct
//! keys written within one TTL window plus expired keys never read again.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use chrono::{DateTime, NaiveDate, TimeDelta, Utc};
use mockable::Clock;
use serde::Serialize;
use utoipa::ToSchema;

/// Cache key: flight number, departure date, and the adapter that fetched it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CacheKey {
    pub flight_number: String,
    pub date: NaiveDate,
    pub source: String,
}

impl CacheKey {
    /// Build a key.
    pub fn new(
        flight_number: impl Into<String>,
        date: NaiveDate,
        source: impl Into<String>,
    ) -> Self {
        Self {
            flight_number: flight_number.into(),
            date,
            source: source.into(),
        }
    }
}

/// Optional filters for scoped clearing; an empty scope matches everything.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CacheScope {
    pub source: Option<String>,
    pub flight_number: Option<String>,
}

impl CacheScope {
    fn matches(&self, key: &CacheKey) -> bool {
        self.source.as_ref().is_none_or(|source| *source == key.source)
            && self
                .flight_number
                .as_ref()
                .is_none_or(|number| *number == key.flight_number)
    }
}

/// One sampled cache entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CacheEntrySample {
    pub flight_number: String,
    pub date: NaiveDate,
    pub source: String,
    pub cached_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

/// Cache counters and a bounded sample of entries.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CacheStats {
    pub entries: usize,
    pub hits: u64,
    pub misses: u64,
    pub ttl_seconds: u64,
    pub sample: Vec<CacheEntrySample>,
}

#[derive(Debug, Clone)]
struct CacheEntry<T> {
    data: T,
    timestamp: DateTime<Utc>,
    expires_at: DateTime<Utc>,
}

struct CacheInner<T> {
    ttl: Duration,
    entries: HashMap<CacheKey, CacheEntry<T>>,
}

/// Keyed store with per-entry expiry.
pub struct TtlCache<T> {
    clock: Arc<dyn Clock>,
    inner: Mutex<CacheInner<T>>,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl<T: Clone> TtlCache<T> {
    /// Create an empty cache.
    pub fn new(ttl: Duration, clock: Arc<dyn Clock>) -> Self {
        Self {
            clock,
            inner: Mutex::new(CacheInner {
                ttl,
                entries: HashMap::new(),
            }),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    /// Store `data`, replacing any entry under the same key.
    pub fn set(&self, key: CacheKey, data: T) {
        let now = self.clock.utc();
        let mut inner = self.lock_inner();
        let expires_at = TimeDelta::from_std(inner.ttl)
            .ok()
            .and_then(|ttl| now.checked_add_signed(ttl))
            .unwrap_or(DateTime::<Utc>::MAX_UTC);
        inner.entries.insert(
            key,
            CacheEntry {
                data,
                timestamp: now,
                expires_at,
            },
        );
    }

    /// Return the entry if it has not expired; expired entries are evicted.
    ///
    /// An entry is still valid at exactly its expiry instant.
    pub fn get(&self, key: &CacheKey) -> Option<T> {
        let now = self.clock.utc();
        let mut inner = self.lock_inner();
        let fresh = match inner.entries.get(key) {
            Some(entry) if now <= entry.expires_at => Some(entry.data.clone()),
            Some(_) => {
                inner.entries.remove(key);
                None
            }
            None => None,
        };
        drop(inner);

        let counter = if fresh.is_some() {
            &self.hits
        } else {
            &self.misses
        };
        counter.fetch_add(1, Ordering::Relaxed);
        fresh
    }

    /// Drop every entry and return how many were removed.
    pub fn clear(&self) -> usize {
        let mut inner = self.lock_inner();
        let removed = inner.entries.len();
        inner.entries.clear();
        removed
    }

    /// Drop entries matching `scope` and return how many were removed.
    pub fn clear_matching(&self, scope: &CacheScope) -> usize {
        let mut inner = self.lock_inner();
        let before = inner.entries.len();
        inner.entries.retain(|key, _| !scope.matches(key));
        before - inner.entries.len()
    }

    /// Number of stored entries, including expired ones not yet read.
    pub fn len(&self) -> usize {
        self.lock_inner().entries.len()
    }

    /// Whether the cache holds no entries.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Change the TTL applied to subsequent writes.
    pub fn set_ttl(&self, ttl: Duration) {
        self.lock_inner().ttl = ttl;
    }

    /// Current TTL.
    pub fn ttl(&self) -> Duration {
        self.lock_inner().ttl
    }

    /// Counters plus up to `sample_size` entries ordered by key.
    pub fn stats(&self, sample_size: usize) -> CacheStats {
        let inner = self.lock_inner();
        let mut keys: Vec<&CacheKey> = inner.entries.keys().collect();
        keys.sort();
        let sample = keys
            .into_iter()
            .take(sample_size)
            .filter_map(|key| {
                inner.entries.get(key).map(|entry| CacheEntrySample {
                    flight_number: key.flight_number.clone(),
                    date: key.date,
                    source: key.source.clone(),
                    cached_at: entry.timestamp,
                    expires_at: entry.expires_at,
                })
            })
            .collect();

        CacheStats {
            entries: inner.entries.len(),
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            ttl_seconds: inner.ttl.as_secs(),
            sample,
        }
    }

    fn lock_inner(&self) -> MutexGuard<'_, CacheInner<T>> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    //! Expiry and scoping behaviour under a mutable clock.

    use super::*;
    use chrono::TimeZone;
    use rstest::{fixture, rstest};

    use crate::test_support::MutableClock;

    #[fixture]
    fn clock() -> Arc<MutableClock> {
        Arc::new(MutableClock::new(
            Utc.with_ymd_and_hms(2026, 2, 25, 8, 0, 0)
                .single()
                .expect("valid clock start"),
        ))
    }

    #[fixture]
    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 2, 25).expect("valid date")
    }

    fn cache(clock: &Arc<MutableClock>) -> TtlCache<String> {
        TtlCache::new(Duration::from_secs(300), clock.clone())
    }

    #[rstest]
    fn returns_value_before_expiry(clock: Arc<MutableClock>, date: NaiveDate) {
        let cache = cache(&clock);
        let key = CacheKey::new("LH001", date, "Lufthansa");
        cache.set(key.clone(), "snapshot".to_owned());

        clock.advance(Duration::from_secs(300));
        assert_eq!(cache.get(&key), Some("snapshot".to_owned()));
    }

    #[rstest]
    fn evicts_on_read_after_expiry(clock: Arc<MutableClock>, date: NaiveDate) {
        let cache = cache(&clock);
        let key = CacheKey::new("LH001", date, "Lufthansa");
        cache.set(key.clone(), "snapshot".to_owned());

        clock.advance(Duration::from_secs(301));
        assert_eq!(cache.len(), 1, "no background sweep");
        assert_eq!(cache.get(&key), None);

        let stats = cache.stats(10);
        assert_eq!(stats.entries, 0);
        assert_eq!(stats.misses, 1);
    }

    #[rstest]
    fn keys_are_source_qualified(clock: Arc<MutableClock>, date: NaiveDate) {
        let cache = cache(&clock);
        cache.set(CacheKey::new("LH001", date, "Lufthansa"), "a".to_owned());

        assert_eq!(cache.get(&CacheKey::new("LH001", date, "Aggregator")), None);
        assert_eq!(
            cache.get(&CacheKey::new("LH001", date, "Lufthansa")),
            Some("a".to_owned())
        );
    }

    #[rstest]
    fn overwrite_refreshes_expiry(clock: Arc<MutableClock>, date: NaiveDate) {
        let cache = cache(&clock);
        let key = CacheKey::new("LH001", date, "Lufthansa");
        cache.set(key.clone(), "old".to_owned());
        clock.advance(Duration::from_secs(200));
        cache.set(key.clone(), "new".to_owned());
        clock.advance(Duration::from_secs(200));

        assert_eq!(cache.get(&key), Some("new".to_owned()));
    }

    #[rstest]
    fn scoped_clear_only_removes_matching_entries(clock: Arc<MutableClock>, date: NaiveDate) {
        let cache = cache(&clock);
        cache.set(CacheKey::new("LH001", date, "Lufthansa"), "a".to_owned());
        cache.set(CacheKey::new("LH002", date, "Lufthansa"), "b".to_owned());
        cache.set(CacheKey::new("BA100", date, "British"), "c".to_owned());

        let removed = cache.clear_matching(&CacheScope {
            source: Some("Lufthansa".to_owned()),
            flight_number: None,
        });

        assert_eq!(removed, 2);
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.clear(), 1);
        assert!(cache.is_empty());
    }

    #[rstest]
    fn stats_report_hits_ttl_and_sorted_sample(clock: Arc<MutableClock>, date: NaiveDate) {
        let cache = cache(&clock);
        cache.set(CacheKey::new("LH002", date, "Lufthansa"), "b".to_owned());
        cache.set(CacheKey::new("LH001", date, "Lufthansa"), "a".to_owned());
        let _hit = cache.get(&CacheKey::new("LH001", date, "Lufthansa"));

        let stats = cache.stats(1);
        assert_eq!(stats.entries, 2);
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.ttl_seconds, 300);
        assert_eq!(stats.sample.len(), 1);
        assert_eq!(
            stats.sample.first().map(|entry| entry.flight_number.as_str()),
            Some("LH001")
        );
    }

    #[rstest]
    fn new_ttl_applies_to_later_writes(clock: Arc<MutableClock>, date: NaiveDate) {
        let cache = cache(&clock);
        cache.set_ttl(Duration::from_secs(10));
        let key = CacheKey::new("LH001", date, "Lufthansa");
        cache.set(key.clone(), "a".to_owned());

        clock.advance(Duration::from_secs(11));
        assert_eq!(cache.get(&key), None);
    }
}
