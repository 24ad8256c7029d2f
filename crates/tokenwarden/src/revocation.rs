//! Sharded revocation store.
//!
//! Revoked tokens are kept until their natural expiry, after which they can
//! no longer pass validation anyway. Each entry remembers that expiry so the
//! store never grows without bound: expired entries are dropped lazily on
//! lookup and in bulk by [`RevocationStore::sweep`].
//!
//! The key space is split across a fixed number of shards, each behind its own
//! reader/writer lock, so revocations of unrelated tokens do not contend.

use std::collections::HashMap;
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

use parking_lot::RwLock;
use time::OffsetDateTime;

/// Default number of shards.
pub const DEFAULT_SHARDS: usize = 16;

#[derive(Debug, Default)]
struct Shard {
    entries: RwLock<HashMap<String, OffsetDateTime>>,
}

/// Process-local blacklist of revoked tokens.
#[derive(Debug)]
pub struct RevocationStore {
    shards: Box<[Shard]>,
}

impl RevocationStore {
    /// Creates a store with `shards` shards. A count of zero is raised to one.
    #[must_use]
    pub fn new(shards: usize) -> Self {
        let shards = (0..shards.max(1)).map(|_| Shard::default()).collect();
        Self { shards }
    }

    /// Number of shards. Fixed for the lifetime of the store.
    #[must_use]
    pub fn shard_count(&self) -> usize {
        self.shards.len()
    }

    fn shard_index(&self, token: &str) -> usize {
        let mut hasher = DefaultHasher::new();
        token.hash(&mut hasher);
        // Remainder is below the shard count, which is a usize
        (hasher.finish() % self.shards.len() as u64) as usize
    }

    fn shard(&self, token: &str) -> &Shard {
        &self.shards[self.shard_index(token)]
    }

    /// Records `token` as revoked until `expires_at`.
    ///
    /// Re-adding a token overwrites its recorded expiry.
    pub fn add(&self, token: &str, expires_at: OffsetDateTime) {
        self.shard(token)
            .entries
            .write()
            .insert(token.to_owned(), expires_at);
    }

    /// Returns `true` if `token` is revoked and not yet past its recorded expiry.
    #[must_use]
    pub fn contains(&self, token: &str) -> bool {
        self.contains_at(token, OffsetDateTime::now_utc())
    }

    /// Like [`contains`](Self::contains), evaluated at `now`.
    ///
    /// An entry found past its expiry is removed before returning `false`.
    #[must_use]
    pub fn contains_at(&self, token: &str, now: OffsetDateTime) -> bool {
        self.expiry_at(token, now).is_some()
    }

    /// Returns the recorded expiry of `token` if it is revoked at `now`.
    ///
    /// An entry found past its expiry is removed before returning `None`.
    #[must_use]
    pub fn expiry_at(&self, token: &str, now: OffsetDateTime) -> Option<OffsetDateTime> {
        let shard = self.shard(token);

        let recorded = shard.entries.read().get(token).copied();
        match recorded {
            None => return None,
            Some(expires_at) if now <= expires_at => return Some(expires_at),
            Some(_) => {}
        }

        // The entry may have been re-added with a later expiry since the read
        let mut entries = shard.entries.write();
        match entries.get(token).copied() {
            Some(expires_at) if now > expires_at => {
                entries.remove(token);
                tracing::trace!("Dropped expired revocation entry");
                None
            }
            recorded => recorded,
        }
    }

    /// Removes every entry whose expiry is before `now`.
    ///
    /// Shards are processed one at a time; each shard's write lock is held only
    /// while that shard is swept. Returns the number of entries removed.
    pub fn sweep(&self, now: OffsetDateTime) -> usize {
        self.shards
            .iter()
            .map(|shard| {
                let mut entries = shard.entries.write();
                let before = entries.len();
                entries.retain(|_, expires_at| *expires_at >= now);
                before - entries.len()
            })
            .sum()
    }

    /// Number of entries across all shards, including expired ones not yet
    /// removed. A snapshot; concurrent writers may change it immediately.
    #[must_use]
    pub fn len(&self) -> usize {
        self.shards
            .iter()
            .map(|shard| shard.entries.read().len())
            .sum()
    }

    /// Returns `true` if no shard holds an entry.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.shards
            .iter()
            .all(|shard| shard.entries.read().is_empty())
    }
}

impl Default for RevocationStore {
    fn default() -> Self {
        Self::new(DEFAULT_SHARDS)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use time::Duration;
    use time::macros::datetime;

    const NOW: OffsetDateTime = datetime!(2026-03-01 09:00 UTC);

    #[test]
    fn test_add_then_contains() {
        let store = RevocationStore::default();
        assert_eq!(store.shard_count(), DEFAULT_SHARDS);
        assert!(store.is_empty());

        store.add("token-a", NOW + Duration::minutes(10));
        assert!(store.contains_at("token-a", NOW));
        assert!(!store.contains_at("token-b", NOW));
        assert_eq!(store.len(), 1);
        assert!(!store.is_empty());
    }

    #[test]
    fn test_contains_drops_expired_entry() {
        let store = RevocationStore::new(4);
        let expires_at = NOW + Duration::seconds(1);
        store.add("token-a", expires_at);

        // Still revoked at the expiry instant itself
        assert!(store.contains_at("token-a", expires_at));
        assert_eq!(store.len(), 1);

        assert!(!store.contains_at("token-a", expires_at + Duration::milliseconds(1)));
        assert_eq!(store.len(), 0);
    }

    #[test]
    fn test_expiry_at_reports_recorded_expiry() {
        let store = RevocationStore::new(4);
        let expires_at = NOW + Duration::minutes(5);
        store.add("token-a", expires_at);

        assert_eq!(store.expiry_at("token-a", NOW), Some(expires_at));
        assert_eq!(store.expiry_at("token-b", NOW), None);
        assert_eq!(store.expiry_at("token-a", expires_at + Duration::seconds(1)), None);
        assert!(store.is_empty());
    }

    #[test]
    fn test_contains_without_sweep() {
        let store = RevocationStore::default();
        store.add(
            "short-lived",
            OffsetDateTime::now_utc() + Duration::milliseconds(50),
        );
        assert!(store.contains("short-lived"));

        std::thread::sleep(std::time::Duration::from_millis(80));
        assert!(!store.contains("short-lived"));
        assert!(store.is_empty());
    }

    #[test]
    fn test_readd_extends_expiry() {
        let store = RevocationStore::new(1);
        store.add("token-a", NOW);
        store.add("token-a", NOW + Duration::hours(1));

        assert!(store.contains_at("token-a", NOW + Duration::minutes(30)));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_sweep_removes_only_expired() {
        let store = RevocationStore::new(8);
        for i in 0..50 {
            store.add(&format!("expired-{i}"), NOW - Duration::seconds(1));
            store.add(&format!("live-{i}"), NOW + Duration::minutes(5));
        }
        store.add("boundary", NOW);
        assert_eq!(store.len(), 101);

        let removed = store.sweep(NOW);
        assert_eq!(removed, 50);
        assert_eq!(store.len(), 51);
        assert!(store.contains_at("live-7", NOW));
        assert!(store.contains_at("boundary", NOW));
        assert!(!store.contains_at("expired-7", NOW));

        assert_eq!(store.sweep(NOW), 0);
    }

    #[test]
    fn test_zero_shards_raised_to_one() {
        let store = RevocationStore::new(0);
        assert_eq!(store.shard_count(), 1);
        store.add("token", NOW + Duration::minutes(1));
        assert!(store.contains_at("token", NOW));
    }

    #[test]
    fn test_shard_index_is_stable_and_spread() {
        let store = RevocationStore::new(16);
        assert_eq!(store.shard_index("abc.def.ghi"), store.shard_index("abc.def.ghi"));

        // Tokens sharing a long common prefix must not pile into one shard
        let used: std::collections::HashSet<usize> = (0..256)
            .map(|i| store.shard_index(&format!("eyJhbGciOiJIUzI1NiJ9.payload.{i}")))
            .collect();
        assert!(used.len() > 8);
    }

    #[test]
    fn test_concurrent_add_and_contains() {
        let store = Arc::new(RevocationStore::new(8));
        let expires_at = OffsetDateTime::now_utc() + Duration::minutes(5);

        std::thread::scope(|s| {
            for t in 0..4 {
                let store = Arc::clone(&store);
                s.spawn(move || {
                    for i in 0..500 {
                        let token = format!("t{t}-{i}");
                        store.add(&token, expires_at);
                        assert!(store.contains(&token));
                    }
                });
            }
        });

        assert_eq!(store.len(), 2000);
    }
}
