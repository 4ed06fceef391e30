//! Identity cache keyed by construction key
//!
//! Provides [`InstanceCache`], a process-lifetime store of shareable instances.
//! Unlike a resource cache it never evicts: once a key has a committed
//! instance, every later lookup returns that same instance.

use cocis_types::{ConstructionError, ConstructionResult};
use dashmap::DashMap;
use parking_lot::{Condvar, Mutex};
use std::collections::HashMap;
use std::fmt::{self, Debug};
use std::hash::Hash;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Statistics for cache monitoring
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    /// Number of committed entries
    pub entry_count: u64,
    /// Lookups answered from a committed entry
    pub hits: u64,
    /// Producer invocations
    pub misses: u64,
    /// Callers that waited on another caller's in-flight producer
    pub waits: u64,
    /// Producer invocations that failed
    pub failures: u64,
}

/// Outcome slot for one in-flight production
struct Flight<V> {
    outcome: Mutex<Option<ConstructionResult<V>>>,
    ready: Condvar,
}

impl<V: Clone> Flight<V> {
    fn new() -> Self {
        Self {
            outcome: Mutex::new(None),
            ready: Condvar::new(),
        }
    }

    fn complete(&self, outcome: ConstructionResult<V>) {
        *self.outcome.lock() = Some(outcome);
        self.ready.notify_all();
    }

    fn wait(&self) -> ConstructionResult<V> {
        let mut outcome = self.outcome.lock();
        loop {
            if let Some(result) = outcome.as_ref() {
                return result.clone();
            }
            self.ready.wait(&mut outcome);
        }
    }
}

enum Role<V> {
    Leader(Arc<Flight<V>>),
    Waiter(Arc<Flight<V>>),
}

/// Identity cache with at-most-once production per key
///
/// # Concurrency
/// - Committed entries are read without blocking.
/// - For a key with no entry, exactly one caller (the leader) runs the
///   producer; concurrent callers for the same key block until the leader
///   finishes and then receive the leader's result, success or failure.
/// - A failed production commits nothing, so a later call retries.
///
/// A producer must not call `get_or_create` for its own key.
pub struct InstanceCache<K, V> {
    entries: DashMap<K, V>,
    inflight: Mutex<HashMap<K, Arc<Flight<V>>>>,
    hits: AtomicU64,
    misses: AtomicU64,
    waits: AtomicU64,
    failures: AtomicU64,
}

impl<K, V> InstanceCache<K, V>
where
    K: Eq + Hash + Clone + Debug,
    V: Clone,
{
    /// Create empty cache
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::with_capacity(0)
    }

    /// Create empty cache with room for `capacity` entries
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            entries: DashMap::with_capacity(capacity),
            inflight: Mutex::new(HashMap::new()),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            waits: AtomicU64::new(0),
            failures: AtomicU64::new(0),
        }
    }

    /// Return the instance for `key`, producing it on first use
    ///
    /// # Errors
    /// Returns the producer's error to the leader and to every caller that
    /// waited on the same in-flight production.
    pub fn get_or_create<F>(&self, key: K, producer: F) -> ConstructionResult<V>
    where
        F: FnOnce() -> ConstructionResult<V>,
    {
        if let Some(value) = self.lookup(&key) {
            return Ok(value);
        }

        let role = {
            let mut inflight = self.inflight.lock();
            // Re-check under the lock: the leader commits before it clears
            // its flight, so a missing flight with no entry means vacant.
            if let Some(value) = self.lookup(&key) {
                return Ok(value);
            }
            match inflight.get(&key) {
                Some(flight) => Role::Waiter(Arc::clone(flight)),
                None => {
                    let flight = Arc::new(Flight::new());
                    inflight.insert(key.clone(), Arc::clone(&flight));
                    Role::Leader(flight)
                }
            }
        };

        match role {
            Role::Waiter(flight) => {
                self.waits.fetch_add(1, Ordering::Relaxed);
                tracing::debug!(?key, "waiting on in-flight production");
                flight.wait()
            }
            Role::Leader(flight) => {
                self.misses.fetch_add(1, Ordering::Relaxed);
                tracing::debug!(?key, "cache miss, invoking producer");
                let guard = LeaderGuard {
                    cache: self,
                    key: Some(key),
                    flight,
                };
                let outcome = producer();
                guard.finish(outcome)
            }
        }
    }

    /// Committed instance for `key`, if any
    #[inline]
    #[must_use]
    pub fn get(&self, key: &K) -> Option<V> {
        self.entries.get(key).map(|entry| entry.value().clone())
    }

    /// Check whether `key` has a committed instance
    #[inline]
    #[must_use]
    pub fn contains(&self, key: &K) -> bool {
        self.entries.contains_key(key)
    }

    /// Number of committed entries
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if no entry is committed
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Snapshot of committed keys (unordered)
    #[must_use]
    pub fn keys(&self) -> Vec<K> {
        self.entries.iter().map(|entry| entry.key().clone()).collect()
    }

    /// Get cache statistics
    #[must_use]
    pub fn stats(&self) -> CacheStats {
        CacheStats {
            entry_count: self.entries.len() as u64,
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            waits: self.waits.load(Ordering::Relaxed),
            failures: self.failures.load(Ordering::Relaxed),
        }
    }

    fn lookup(&self, key: &K) -> Option<V> {
        let value = self.get(key)?;
        self.hits.fetch_add(1, Ordering::Relaxed);
        Some(value)
    }
}

/// Completes a leader's flight even if the producer unwinds
struct LeaderGuard<'a, K, V>
where
    K: Eq + Hash + Clone + Debug,
    V: Clone,
{
    cache: &'a InstanceCache<K, V>,
    key: Option<K>,
    flight: Arc<Flight<V>>,
}

impl<K, V> LeaderGuard<'_, K, V>
where
    K: Eq + Hash + Clone + Debug,
    V: Clone,
{
    fn finish(mut self, outcome: ConstructionResult<V>) -> ConstructionResult<V> {
        if let Some(key) = self.key.take() {
            match &outcome {
                Ok(value) => {
                    self.cache.entries.insert(key.clone(), value.clone());
                }
                Err(err) => {
                    self.cache.failures.fetch_add(1, Ordering::Relaxed);
                    tracing::warn!(?key, error = %err, "producer failed, nothing committed");
                }
            }
            self.cache.inflight.lock().remove(&key);
            self.flight.complete(outcome.clone());
        }
        outcome
    }
}

impl<K, V> Drop for LeaderGuard<'_, K, V>
where
    K: Eq + Hash + Clone + Debug,
    V: Clone,
{
    fn drop(&mut self) {
        if let Some(key) = self.key.take() {
            self.cache.failures.fetch_add(1, Ordering::Relaxed);
            self.cache.inflight.lock().remove(&key);
            self.flight.complete(Err(ConstructionError::producer_failed(
                format!("{key:?}"),
                "producer panicked",
            )));
        }
    }
}

impl<K, V> Default for InstanceCache<K, V>
where
    K: Eq + Hash + Clone + Debug,
    V: Clone,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<K, V> Debug for InstanceCache<K, V>
where
    K: Eq + Hash + Clone + Debug,
    V: Clone,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InstanceCache")
            .field("stats", &self.stats())
            .finish_non_exhaustive()
    }
}
