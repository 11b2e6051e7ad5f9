//! Cache storage and public API.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::RwLock;
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::trace;

use super::sweeper;

/// Sweep interval used when none is given.
pub const DEFAULT_SWEEP_INTERVAL: Duration = Duration::from_secs(1);

/// Roughly 30 years; stands in for TTLs too large to add to an `Instant`.
const FAR_FUTURE: Duration = Duration::from_secs(86400 * 365 * 30);

/// A stored value together with the instant it stops being visible.
#[derive(Debug, Clone)]
struct CacheEntry<V> {
    value: V,
    expires_at: Instant,
}

impl<V> CacheEntry<V> {
    fn is_expired(&self, now: Instant) -> bool {
        now >= self.expires_at
    }
}

/// Map contents plus the flag gating the sweep worker.
struct Entries<V> {
    map: HashMap<String, CacheEntry<V>>,
    /// True iff `map` is non-empty (as of the last mutation or sweep).
    active: bool,
}

/// State shared between the cache handle and its sweep worker.
pub(super) struct Shared<V> {
    state: RwLock<Entries<V>>,
    pub(super) wake: Notify,
    pub(super) sweep_interval: Duration,
}

impl<V> Shared<V> {
    pub(super) fn is_active(&self) -> bool {
        self.state.read().active
    }

    /// Physically remove every entry expired at `now`.
    ///
    /// Returns the number of removed entries and the number left behind.
    pub(super) fn sweep(&self, now: Instant) -> (usize, usize) {
        let mut state = self.state.write();
        let before = state.map.len();
        state.map.retain(|_, entry| !entry.is_expired(now));
        let left = state.map.len();
        state.active = left > 0;
        (before - left, left)
    }

    fn activate(&self, state: &mut Entries<V>) {
        if !state.active {
            state.active = true;
            self.wake.notify_one();
            trace!("Cache populated, waking sweeper");
        }
    }
}

/// An in-memory, TTL-only key/value cache.
///
/// Every entry carries an absolute expiry instant. Reads treat an entry as
/// absent from that instant on, while a background worker physically removes
/// expired entries once per sweep interval. The worker only runs while the
/// cache holds entries.
///
/// The cache is not persistent and has no size bound; keep stored values
/// small. Dropping the cache stops its sweep worker.
///
/// Must be created from within a Tokio runtime, since the sweep worker is a
/// spawned task.
pub struct Cache<V> {
    shared: Arc<Shared<V>>,
    sweeper: JoinHandle<()>,
}

impl<V> Cache<V>
where
    V: Clone + Send + Sync + 'static,
{
    /// Create an empty cache swept every `sweep_interval`.
    ///
    /// A zero interval falls back to [`DEFAULT_SWEEP_INTERVAL`].
    pub fn new(sweep_interval: Duration) -> Self {
        let sweep_interval = if sweep_interval.is_zero() {
            DEFAULT_SWEEP_INTERVAL
        } else {
            sweep_interval
        };

        let shared = Arc::new(Shared {
            state: RwLock::new(Entries {
                map: HashMap::new(),
                active: false,
            }),
            wake: Notify::new(),
            sweep_interval,
        });
        let sweeper = tokio::spawn(sweeper::run(Arc::clone(&shared)));

        Self { shared, sweeper }
    }

    /// Store `value` under `key` for `ttl`, replacing any previous entry.
    ///
    /// A zero `ttl` means "use the sweep interval".
    pub fn set(&self, key: impl Into<String>, value: V, ttl: Duration) {
        let expires_at = self.expiry_from(Instant::now(), ttl);
        let mut state = self.shared.state.write();
        state.map.insert(key.into(), CacheEntry { value, expires_at });
        self.shared.activate(&mut state);
    }

    /// Get the value for `key` if it is present and not yet expired.
    pub fn get(&self, key: &str) -> Option<V> {
        let now = Instant::now();
        let state = self.shared.state.read();
        state
            .map
            .get(key)
            .filter(|entry| !entry.is_expired(now))
            .map(|entry| entry.value.clone())
    }

    /// Check whether `key` is physically stored, ignoring its expiry.
    ///
    /// Between an entry's expiry and the next sweep pass this returns `true`
    /// while [`get`](Self::get) already returns `None`. Use `get` to test
    /// presence when the answer has to be correct.
    pub fn exists(&self, key: &str) -> bool {
        self.shared.state.read().map.contains_key(key)
    }

    /// Remove `key`. Removing a missing key is a no-op.
    pub fn delete(&self, key: &str) {
        self.shared.state.write().map.remove(key);
    }

    /// Remove every entry. The sweeper parks until the next `set`.
    pub fn clear(&self) {
        let mut state = self.shared.state.write();
        state.map.clear();
        state.active = false;
    }

    /// Return the live value for `key`, or store the one built by `make`.
    ///
    /// Lookup and insertion happen under a single write lock, so concurrent
    /// callers racing on the same missing key all observe the same value.
    /// An expired entry counts as missing and is replaced. `make` receives
    /// the expiry instant of the entry it is building.
    pub fn get_or_insert_with<F>(&self, key: &str, ttl: Duration, make: F) -> V
    where
        F: FnOnce(Instant) -> V,
    {
        let now = Instant::now();
        let mut state = self.shared.state.write();

        if let Some(entry) = state.map.get(key) {
            if !entry.is_expired(now) {
                return entry.value.clone();
            }
        }

        let expires_at = self.expiry_from(now, ttl);
        let value = make(expires_at);
        state.map.insert(
            key.to_owned(),
            CacheEntry {
                value: value.clone(),
                expires_at,
            },
        );
        self.shared.activate(&mut state);
        value
    }

    /// Number of physically stored entries, including expired ones not yet swept.
    pub fn len(&self) -> usize {
        self.shared.state.read().map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Whether the sweep worker is currently running passes.
    pub fn is_active(&self) -> bool {
        self.shared.is_active()
    }

    pub fn sweep_interval(&self) -> Duration {
        self.shared.sweep_interval
    }

    /// Expiry instant for an entry stored at `now`.
    fn expiry_from(&self, now: Instant, ttl: Duration) -> Instant {
        let ttl = if ttl.is_zero() {
            self.shared.sweep_interval
        } else {
            ttl
        };
        now.checked_add(ttl).unwrap_or_else(|| now + FAR_FUTURE)
    }
}

impl<V> Default for Cache<V>
where
    V: Clone + Send + Sync + 'static,
{
    fn default() -> Self {
        Self::new(DEFAULT_SWEEP_INTERVAL)
    }
}

impl<V> Drop for Cache<V> {
    fn drop(&mut self) {
        self.sweeper.abort();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SWEEP: Duration = Duration::from_millis(50);

    #[tokio::test(start_paused = true)]
    async fn test_missing_key_is_absent() {
        let cache: Cache<String> = Cache::new(SWEEP);

        assert_eq!(cache.get("nope"), None);
        assert!(!cache.exists("nope"));
        assert!(cache.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_set_then_get() {
        let cache = Cache::new(SWEEP);
        cache.set("name", "pine".to_string(), Duration::from_secs(5));

        assert_eq!(cache.get("name"), Some("pine".to_string()));
        assert!(cache.exists("name"));
        assert_eq!(cache.len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_last_writer_wins() {
        let cache = Cache::new(SWEEP);
        cache.set("k", 1u32, Duration::from_secs(1));
        cache.set("k", 2u32, Duration::from_secs(1));

        assert_eq!(cache.get("k"), Some(2));
        assert_eq!(cache.len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_get_hides_expired_entry_before_sweep() {
        // Sweep far in the future so only the read-time check can hide the entry
        let cache = Cache::new(Duration::from_secs(3600));
        cache.set("k", 7u32, Duration::from_millis(100));

        tokio::time::sleep(Duration::from_millis(100)).await;

        assert_eq!(cache.get("k"), None);
        assert!(cache.exists("k"), "entry stays physically present until swept");
    }

    #[tokio::test(start_paused = true)]
    async fn test_exists_cleared_within_one_sweep_interval() {
        let cache = Cache::new(SWEEP);
        let ttl = Duration::from_millis(100);
        cache.set("k", 7u32, ttl);

        tokio::time::sleep(ttl + SWEEP + Duration::from_millis(10)).await;

        assert!(!cache.exists("k"));
        assert!(cache.is_empty());
        assert!(!cache.is_active());
    }

    #[tokio::test(start_paused = true)]
    async fn test_zero_ttl_uses_sweep_interval() {
        let cache = Cache::new(Duration::from_millis(200));
        cache.set("k", 1u32, Duration::ZERO);

        tokio::time::sleep(Duration::from_millis(150)).await;
        assert_eq!(cache.get("k"), Some(1));

        tokio::time::sleep(Duration::from_millis(60)).await;
        assert_eq!(cache.get("k"), None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_zero_interval_falls_back_to_default() {
        let cache: Cache<u32> = Cache::new(Duration::ZERO);
        assert_eq!(cache.sweep_interval(), DEFAULT_SWEEP_INTERVAL);

        let cache: Cache<u32> = Cache::new(SWEEP);
        assert_eq!(cache.sweep_interval(), SWEEP);
    }

    #[tokio::test(start_paused = true)]
    async fn test_huge_ttl_does_not_panic() {
        let cache = Cache::new(SWEEP);
        cache.set("forever", 1u32, Duration::MAX);
        let created = cache.get_or_insert_with("lazy", Duration::MAX, |_| 2u32);

        tokio::time::sleep(Duration::from_secs(60)).await;

        assert_eq!(cache.get("forever"), Some(1));
        assert_eq!(created, 2);
        assert_eq!(cache.get("lazy"), Some(2));
        assert!(cache.is_active());
    }

    #[tokio::test(start_paused = true)]
    async fn test_delete() {
        let cache = Cache::new(SWEEP);
        cache.set("a", 1u32, Duration::from_secs(1));
        cache.set("b", 2u32, Duration::from_secs(1));

        cache.delete("a");
        cache.delete("missing");

        assert_eq!(cache.get("a"), None);
        assert!(!cache.exists("a"));
        assert_eq!(cache.get("b"), Some(2));
    }

    #[tokio::test(start_paused = true)]
    async fn test_clear_resets_and_reactivates() {
        let cache = Cache::new(SWEEP);
        cache.set("a", 1u32, Duration::from_secs(1));
        cache.set("b", 2u32, Duration::from_secs(1));
        assert!(cache.is_active());

        cache.clear();

        assert_eq!(cache.get("a"), None);
        assert!(!cache.exists("b"));
        assert!(!cache.is_active());

        cache.set("c", 3u32, Duration::from_secs(1));
        assert!(cache.is_active());
        assert_eq!(cache.get("c"), Some(3));
    }

    #[tokio::test(start_paused = true)]
    async fn test_sweeper_parks_and_resumes() {
        let cache = Cache::new(SWEEP);
        assert!(!cache.is_active());

        cache.set("first", 1u32, Duration::from_millis(20));
        assert!(cache.is_active());

        tokio::time::sleep(SWEEP * 2).await;
        assert!(!cache.is_active());
        assert!(cache.is_empty());

        cache.set("second", 2u32, Duration::from_millis(20));
        assert!(cache.is_active());

        tokio::time::sleep(SWEEP * 2).await;
        assert!(!cache.exists("second"));
        assert!(!cache.is_active());
    }

    #[tokio::test(start_paused = true)]
    async fn test_get_or_insert_with_reuses_live_entry() {
        let cache = Cache::new(SWEEP);

        let first = cache.get_or_insert_with("k", Duration::from_secs(1), |_| 1u32);
        let second = cache.get_or_insert_with("k", Duration::from_secs(1), |_| 2u32);

        assert_eq!(first, 1);
        assert_eq!(second, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_get_or_insert_with_replaces_expired_entry() {
        let cache = Cache::new(Duration::from_secs(3600));
        let ttl = Duration::from_millis(100);
        let start = Instant::now();

        let first = cache.get_or_insert_with("k", ttl, |expires_at| expires_at);
        assert_eq!(first, start + ttl);

        tokio::time::sleep(ttl).await;

        let second = cache.get_or_insert_with("k", ttl, |expires_at| expires_at);
        assert_eq!(second, start + ttl * 2);
        assert_eq!(cache.len(), 1);
    }

    #[tokio::test]
    async fn test_drop_stops_sweeper() {
        let cache = Cache::new(SWEEP);
        cache.set("k", 1u32, Duration::from_secs(1));
        let shared = Arc::downgrade(&cache.shared);

        drop(cache);
        for _ in 0..10 {
            tokio::task::yield_now().await;
        }

        assert!(shared.upgrade().is_none());
    }
}
