//! Bounded TTL cache of validation outcomes.
//!
//! Both successful and failed validations are remembered, keyed by the full
//! token string. An entry is usable for `ttl` after insertion; older entries
//! are reported as absent even before [`ValidationCache::sweep`] removes them.
//! Successful outcomes are also absent once their claims expire, and revoked
//! markers once the revoked token's own expiry has passed.
//! When the cache is full, inserting a new key evicts the oldest fifth of the
//! entries.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::RwLock;
use time::OffsetDateTime;

use crate::TokenResult;
use crate::claims::Claims;
use crate::error::TokenError;

/// Cached result of a validation.
pub type CachedOutcome = TokenResult<Claims>;

#[derive(Debug, Clone)]
struct CacheEntry {
    outcome: CachedOutcome,
    inserted_at: OffsetDateTime,
    /// Natural expiry of a revoked token, set on `Blacklisted` markers.
    revoked_until: Option<OffsetDateTime>,
}

impl CacheEntry {
    /// Whether the token behind this entry has expired at `now`.
    fn outlived(&self, now: OffsetDateTime) -> bool {
        match (&self.outcome, self.revoked_until) {
            (Ok(claims), _) => claims.is_expired_at(now),
            // Same boundary as `RevocationStore::contains_at`
            (Err(_), Some(expires_at)) => now > expires_at,
            (Err(_), None) => false,
        }
    }
}

// =============================================================================
// Statistics
// =============================================================================

/// A point-in-time snapshot of cache statistics.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct CacheStats {
    /// Lookups answered from the cache.
    pub hits: u64,
    /// Lookups that found nothing usable.
    pub misses: u64,
    /// Entries removed to make room for new ones.
    pub evictions: u64,
    /// Entries removed by a sweep after outliving the TTL.
    pub expirations: u64,
    /// Current number of entries.
    pub size: usize,
}

impl CacheStats {
    /// Calculate hit ratio.
    #[must_use]
    pub fn hit_ratio(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

// =============================================================================
// Validation Cache
// =============================================================================

/// Thread-safe bounded cache of validation outcomes.
#[derive(Debug)]
pub struct ValidationCache {
    entries: RwLock<HashMap<String, CacheEntry>>,
    ttl: time::Duration,
    max_entries: usize,
    hits: AtomicU64,
    misses: AtomicU64,
    evictions: AtomicU64,
    expirations: AtomicU64,
}

impl ValidationCache {
    /// Creates a cache holding at most `max_entries` outcomes for `ttl` each.
    ///
    /// A capacity of zero is raised to one.
    #[must_use]
    pub fn new(max_entries: usize, ttl: std::time::Duration) -> Self {
        let max_entries = max_entries.max(1);
        Self {
            entries: RwLock::new(HashMap::with_capacity(max_entries.min(1024))),
            ttl: time::Duration::try_from(ttl).unwrap_or(time::Duration::MAX),
            max_entries,
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            evictions: AtomicU64::new(0),
            expirations: AtomicU64::new(0),
        }
    }

    fn is_stale(&self, entry: &CacheEntry, now: OffsetDateTime) -> bool {
        now - entry.inserted_at > self.ttl
    }

    fn is_usable(&self, entry: &CacheEntry, now: OffsetDateTime) -> bool {
        !self.is_stale(entry, now) && !entry.outlived(now)
    }

    /// Looks up the outcome cached for `token`.
    #[must_use]
    pub fn get(&self, token: &str) -> Option<CachedOutcome> {
        self.get_at(token, OffsetDateTime::now_utc())
    }

    /// Like [`get`](Self::get), evaluated at `now`.
    ///
    /// Entries older than the TTL, and entries whose token has expired, are
    /// treated as absent but left in place.
    #[must_use]
    pub fn get_at(&self, token: &str, now: OffsetDateTime) -> Option<CachedOutcome> {
        let entries = self.entries.read();
        match entries.get(token) {
            Some(entry) if self.is_usable(entry, now) => {
                self.hits.fetch_add(1, Ordering::Relaxed);
                Some(entry.outcome.clone())
            }
            _ => {
                self.misses.fetch_add(1, Ordering::Relaxed);
                None
            }
        }
    }

    /// Stores `outcome` for `token`, replacing any previous entry.
    pub fn put(&self, token: &str, outcome: CachedOutcome) {
        self.put_at(token, outcome, OffsetDateTime::now_utc());
    }

    /// Like [`put`](Self::put), with `now` as the insertion time.
    ///
    /// A live `Blacklisted` entry is never replaced, so a validation that
    /// started before a revoke cannot resurrect the token in the cache.
    /// Claims already expired at `now` are not stored.
    pub fn put_at(&self, token: &str, outcome: CachedOutcome, now: OffsetDateTime) {
        self.insert_at(
            token,
            CacheEntry {
                outcome,
                inserted_at: now,
                revoked_until: None,
            },
        );
    }

    fn insert_at(&self, token: &str, entry: CacheEntry) {
        let now = entry.inserted_at;
        let mut entries = self.entries.write();

        if let Some(existing) = entries.get(token) {
            if matches!(existing.outcome, Err(TokenError::Blacklisted))
                && self.is_usable(existing, now)
            {
                return;
            }
        }
        if entry.outlived(now) {
            return;
        }

        if !entries.contains_key(token) && entries.len() >= self.max_entries {
            let evicted = Self::evict_oldest(&mut entries);
            self.evictions.fetch_add(evicted as u64, Ordering::Relaxed);
            tracing::debug!(
                evicted,
                remaining = entries.len(),
                "Validation cache at capacity, evicted oldest entries"
            );
        }

        entries.insert(token.to_owned(), entry);
    }

    /// Removes the oldest fifth of the entries (at least one).
    fn evict_oldest(entries: &mut HashMap<String, CacheEntry>) -> usize {
        let count = (entries.len() / 5).max(1);

        let mut by_age: Vec<(OffsetDateTime, &String)> = entries
            .iter()
            .map(|(key, entry)| (entry.inserted_at, key))
            .collect();
        if count < by_age.len() {
            by_age.select_nth_unstable_by_key(count, |(inserted_at, _)| *inserted_at);
            by_age.truncate(count);
        }
        let victims: Vec<String> = by_age.into_iter().map(|(_, key)| key.clone()).collect();

        for key in &victims {
            entries.remove(key);
        }
        victims.len()
    }

    /// Records `token` as revoked for the cache TTL or until `expires_at`,
    /// whichever comes first.
    pub fn mark_revoked(&self, token: &str, expires_at: OffsetDateTime) {
        self.mark_revoked_at(token, expires_at, OffsetDateTime::now_utc());
    }

    /// Like [`mark_revoked`](Self::mark_revoked), with `now` as the insertion time.
    pub fn mark_revoked_at(&self, token: &str, expires_at: OffsetDateTime, now: OffsetDateTime) {
        self.insert_at(
            token,
            CacheEntry {
                outcome: Err(TokenError::Blacklisted),
                inserted_at: now,
                revoked_until: Some(expires_at),
            },
        );
    }

    /// Drops the entry for `token`, if any.
    pub fn invalidate(&self, token: &str) {
        self.entries.write().remove(token);
    }

    /// Removes every entry older than the TTL at `now`, along with entries
    /// whose token has expired.
    ///
    /// Returns the number of entries removed.
    pub fn sweep(&self, now: OffsetDateTime) -> usize {
        let mut entries = self.entries.write();
        let before = entries.len();
        entries.retain(|_, entry| self.is_usable(entry, now));
        let removed = before - entries.len();
        self.expirations.fetch_add(removed as u64, Ordering::Relaxed);
        removed
    }

    /// Removes all entries.
    pub fn clear(&self) {
        self.entries.write().clear();
    }

    /// Current number of entries, stale ones included.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    /// Check if cache is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    /// Maximum number of entries.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.max_entries
    }

    /// How long an entry stays usable.
    #[must_use]
    pub fn ttl(&self) -> std::time::Duration {
        std::time::Duration::try_from(self.ttl).unwrap_or(std::time::Duration::MAX)
    }

    /// Get cache statistics.
    #[must_use]
    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            evictions: self.evictions.load(Ordering::Relaxed),
            expirations: self.expirations.load(Ordering::Relaxed),
            size: self.len(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::claims::TokenType;
    use std::time::Duration as StdDuration;
    use time::Duration;
    use time::macros::datetime;

    const T0: OffsetDateTime = datetime!(2026-05-10 08:00 UTC);

    fn claims(subject: &str) -> Claims {
        Claims {
            subject: subject.to_string(),
            token_type: TokenType::Access,
            session_id: String::new(),
            token_id: format!("id-{subject}"),
            issued_at: T0,
            not_before: T0,
            expires_at: T0 + Duration::hours(1),
            custom: HashMap::new(),
        }
    }

    #[test]
    fn test_put_and_get() {
        let cache = ValidationCache::new(10, StdDuration::from_secs(60));
        cache.put_at("tok-a", Ok(claims("alice")), T0);
        cache.put_at("tok-b", Err(TokenError::SignatureInvalid), T0);

        let hit = cache.get_at("tok-a", T0 + Duration::seconds(1)).unwrap();
        assert_eq!(hit.unwrap().subject, "alice");

        let negative = cache.get_at("tok-b", T0).unwrap();
        assert_eq!(negative.unwrap_err(), TokenError::SignatureInvalid);

        assert!(cache.get_at("tok-c", T0).is_none());

        let stats = cache.stats();
        assert_eq!(stats.hits, 2);
        assert_eq!(stats.misses, 1);
        assert_eq!(stats.size, 2);
    }

    #[test]
    fn test_never_returns_stale_entry() {
        let cache = ValidationCache::new(10, StdDuration::from_secs(60));
        cache.put_at("tok-a", Ok(claims("alice")), T0);

        assert!(cache.get_at("tok-a", T0 + Duration::seconds(60)).is_some());
        assert!(cache.get_at("tok-a", T0 + Duration::seconds(61)).is_none());

        // Stale entries linger until swept
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_stale_check_independent_of_eviction() {
        let cache = ValidationCache::new(2, StdDuration::from_secs(10));
        cache.put_at("old", Ok(claims("old")), T0);
        cache.put_at("new", Ok(claims("new")), T0 + Duration::seconds(9));

        let later = T0 + Duration::seconds(11);
        assert!(cache.get_at("old", later).is_none());
        assert!(cache.get_at("new", later).is_some());
    }

    #[test]
    fn test_capacity_eviction_removes_oldest() {
        let cache = ValidationCache::new(10, StdDuration::from_secs(3600));
        for i in 0..10 {
            cache.put_at(
                &format!("tok-{i}"),
                Ok(claims("user")),
                T0 + Duration::seconds(i),
            );
        }
        assert_eq!(cache.len(), 10);

        cache.put_at("tok-new", Ok(claims("user")), T0 + Duration::seconds(20));

        // 20% of 10 evicted, then one inserted
        assert_eq!(cache.len(), 9);
        assert_eq!(cache.stats().evictions, 2);
        let now = T0 + Duration::seconds(21);
        assert!(cache.get_at("tok-0", now).is_none());
        assert!(cache.get_at("tok-1", now).is_none());
        assert!(cache.get_at("tok-2", now).is_some());
        assert!(cache.get_at("tok-new", now).is_some());
    }

    #[test]
    fn test_eviction_at_least_one() {
        let cache = ValidationCache::new(3, StdDuration::from_secs(3600));
        cache.put_at("a", Ok(claims("a")), T0);
        cache.put_at("b", Ok(claims("b")), T0 + Duration::seconds(1));
        cache.put_at("c", Ok(claims("c")), T0 + Duration::seconds(2));
        cache.put_at("d", Ok(claims("d")), T0 + Duration::seconds(3));

        assert_eq!(cache.len(), 3);
        assert!(cache.get_at("a", T0 + Duration::seconds(4)).is_none());
        assert!(cache.get_at("d", T0 + Duration::seconds(4)).is_some());
    }

    #[test]
    fn test_overwrite_at_capacity_does_not_evict() {
        let cache = ValidationCache::new(2, StdDuration::from_secs(3600));
        cache.put_at("a", Ok(claims("a")), T0);
        cache.put_at("b", Ok(claims("b")), T0);
        cache.put_at("a", Err(TokenError::Blacklisted), T0 + Duration::seconds(1));

        assert_eq!(cache.len(), 2);
        assert_eq!(cache.stats().evictions, 0);
        assert_eq!(
            cache.get_at("a", T0 + Duration::seconds(1)).unwrap(),
            Err(TokenError::Blacklisted)
        );
    }

    #[test]
    fn test_revoked_marker_not_overwritten() {
        let cache = ValidationCache::new(10, StdDuration::from_secs(60));
        cache.put_at("tok-a", Ok(claims("alice")), T0);
        cache.put_at("tok-a", Err(TokenError::Blacklisted), T0);

        // A late success from an earlier validation is ignored
        cache.put_at("tok-a", Ok(claims("alice")), T0 + Duration::seconds(1));
        assert_eq!(
            cache.get_at("tok-a", T0 + Duration::seconds(2)).unwrap(),
            Err(TokenError::Blacklisted)
        );

        // Once stale, the marker can be replaced
        cache.put_at("tok-a", Err(TokenError::Expired), T0 + Duration::seconds(61));
        assert_eq!(
            cache.get_at("tok-a", T0 + Duration::seconds(62)).unwrap(),
            Err(TokenError::Expired)
        );

        cache.mark_revoked_at("tok-b", T0 + Duration::hours(1), T0);
        assert_eq!(cache.get_at("tok-b", T0).unwrap(), Err(TokenError::Blacklisted));
    }

    #[test]
    fn test_revoked_marker_ends_at_token_expiry() {
        let cache = ValidationCache::new(10, StdDuration::from_secs(300));
        let expires_at = T0 + Duration::seconds(20);
        cache.mark_revoked_at("tok-a", expires_at, T0);

        // Inclusive boundary, as in the revocation store
        assert!(cache.get_at("tok-a", expires_at).is_some());
        assert!(cache.get_at("tok-a", expires_at + Duration::milliseconds(1)).is_none());

        // An outlived marker no longer blocks a new outcome
        let later = expires_at + Duration::seconds(1);
        cache.put_at("tok-a", Err(TokenError::SignatureInvalid), later);
        assert_eq!(
            cache.get_at("tok-a", later).unwrap(),
            Err(TokenError::SignatureInvalid)
        );
    }

    #[test]
    fn test_expired_claims_are_a_miss() {
        let cache = ValidationCache::new(10, StdDuration::from_secs(7200));
        cache.put_at("tok-a", Ok(claims("alice")), T0);

        let expiry = T0 + Duration::hours(1);
        assert!(cache.get_at("tok-a", expiry - Duration::seconds(1)).is_some());
        assert!(cache.get_at("tok-a", expiry).is_none());

        let stats = cache.stats();
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.misses, 1);

        // Claims already expired at insertion are not stored
        cache.put_at("tok-b", Ok(claims("bob")), expiry);
        assert!(cache.get_at("tok-b", T0).is_none());
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_sweep_removes_outlived_entries() {
        let cache = ValidationCache::new(10, StdDuration::from_secs(7200));
        cache.put_at("tok-a", Ok(claims("alice")), T0);
        cache.mark_revoked_at("tok-b", T0 + Duration::seconds(10), T0);
        cache.put_at("tok-c", Err(TokenError::SignatureInvalid), T0);

        let removed = cache.sweep(T0 + Duration::hours(1));
        assert_eq!(removed, 2);
        assert!(cache.get_at("tok-c", T0 + Duration::hours(1)).is_some());
    }

    #[test]
    fn test_invalidate() {
        let cache = ValidationCache::new(10, StdDuration::from_secs(60));
        cache.put_at("tok-a", Ok(claims("alice")), T0);
        assert!(cache.get_at("tok-a", T0).is_some());

        cache.invalidate("tok-a");
        assert!(cache.get_at("tok-a", T0).is_none());
        assert!(cache.is_empty());

        // Invalidating a missing key is a no-op
        cache.invalidate("tok-a");
    }

    #[test]
    fn test_sweep_removes_stale() {
        let cache = ValidationCache::new(100, StdDuration::from_secs(30));
        for i in 0..5 {
            cache.put_at(&format!("old-{i}"), Ok(claims("u")), T0);
            cache.put_at(
                &format!("fresh-{i}"),
                Ok(claims("u")),
                T0 + Duration::seconds(40),
            );
        }

        let removed = cache.sweep(T0 + Duration::seconds(45));
        assert_eq!(removed, 5);
        assert_eq!(cache.len(), 5);
        assert_eq!(cache.stats().expirations, 5);
    }

    #[test]
    fn test_accessors_and_hit_ratio() {
        let cache = ValidationCache::new(0, StdDuration::from_secs(5));
        assert_eq!(cache.capacity(), 1);
        assert_eq!(cache.ttl(), StdDuration::from_secs(5));
        assert_eq!(cache.stats().hit_ratio(), 0.0);

        cache.put_at("a", Ok(claims("a")), T0);
        let _ = cache.get_at("a", T0);
        let _ = cache.get_at("b", T0);
        assert!((cache.stats().hit_ratio() - 0.5).abs() < f64::EPSILON);

        cache.clear();
        assert!(cache.is_empty());
    }
}
