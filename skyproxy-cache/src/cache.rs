//! In-memory single-flight TTL cache.

use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

use futures::future::{BoxFuture, FutureExt, Shared};
use parking_lot::Mutex;
use serde::Serialize;
use tokio::sync::oneshot;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use skyproxy_core::clock::{SharedClock, SystemClock};

use crate::config::CacheConfig;
use crate::error::CacheError;

type Outcome<V, E> = Result<V, CacheError<E>>;

/// Handle to a running fetch. Every waiter polls a clone of the same
/// shared future, so all of them resolve to the same outcome.
type InFlight<V, E> = Shared<BoxFuture<'static, Outcome<V, E>>>;

/// Stored value with its absolute expiry.
struct CacheEntry<V> {
    value: V,
    expires_at: Instant,
}

impl<V> CacheEntry<V> {
    /// `now == expires_at` counts as expired.
    fn is_fresh(&self, now: Instant) -> bool {
        now < self.expires_at
    }
}

/// Stored entries and running fetches share one lock so that a fetch is
/// promoted to an entry atomically.
struct Slots<V, E> {
    entries: HashMap<String, CacheEntry<V>>,
    in_flight: HashMap<String, InFlight<V, E>>,
}

#[derive(Default)]
struct Counters {
    hits: AtomicU64,
    misses: AtomicU64,
    coalesced: AtomicU64,
    failures: AtomicU64,
}

/// Receives the fetch future once the caller has released the lock.
type Starter<V, E> = oneshot::Sender<BoxFuture<'static, Result<V, E>>>;

enum Lookup<V, E> {
    Hit(V),
    Wait(InFlight<V, E>),
    Start(InFlight<V, E>, Starter<V, E>),
}

/// TTL cache that runs at most one fetch per key at a time.
///
/// # Concurrency
///
/// - A fresh entry is returned without touching the fetch closure.
/// - On a miss the first caller starts the fetch on the tokio runtime;
///   callers arriving while it runs attach to it instead of fetching again.
/// - The fetch always runs to completion, even if every caller stops
///   waiting, and its success is stored for the next caller.
/// - Failures are never stored; the next call fetches again.
///
/// Lookups must happen inside a tokio runtime.
pub struct SingleFlightCache<V, E> {
    slots: Arc<Mutex<Slots<V, E>>>,
    counters: Arc<Counters>,
    config: CacheConfig,
    clock: SharedClock,
}

impl<V, E> SingleFlightCache<V, E>
where
    V: Clone + Send + Sync + 'static,
    E: Clone + Send + Sync + fmt::Display + 'static,
{
    /// Creates a cache with default configuration.
    pub fn new() -> Self {
        Self::with_config(CacheConfig::default())
    }

    /// Creates a cache with custom configuration.
    pub fn with_config(config: CacheConfig) -> Self {
        Self::with_clock(config, SystemClock::shared())
    }

    /// Creates a cache that reads time from `clock`.
    pub fn with_clock(config: CacheConfig, clock: SharedClock) -> Self {
        Self {
            slots: Arc::new(Mutex::new(Slots {
                entries: HashMap::new(),
                in_flight: HashMap::new(),
            })),
            counters: Arc::new(Counters::default()),
            config,
            clock,
        }
    }

    /// Returns the configuration.
    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    /// Returns the fresh value for `key`, or runs `fetch` to produce it.
    ///
    /// `fetch` is only invoked when there is neither a fresh entry nor a
    /// fetch already in flight for `key`. It is called with no lock held,
    /// so it may read this cache.
    pub async fn get_or_fetch<F, Fut>(&self, key: &str, fetch: F) -> Outcome<V, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<V, E>> + Send + 'static,
    {
        match self.lookup_or_start(key) {
            Lookup::Hit(value) => Ok(value),
            Lookup::Wait(flight) => self.wait(flight).await,
            Lookup::Start(flight, starter) => {
                let _ = starter.send(fetch().boxed());
                self.wait(flight).await
            }
        }
    }

    /// Like [`get_or_fetch`](Self::get_or_fetch), but stops waiting with
    /// [`CacheError::Cancelled`] once `cancel` fires.
    ///
    /// Cancelling only releases this caller. A fetch this caller started
    /// keeps running and still populates the cache.
    pub async fn get_or_fetch_cancellable<F, Fut>(
        &self,
        key: &str,
        fetch: F,
        cancel: &CancellationToken,
    ) -> Outcome<V, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<V, E>> + Send + 'static,
    {
        if cancel.is_cancelled() {
            return Err(CacheError::Cancelled);
        }

        let flight = match self.lookup_or_start(key) {
            Lookup::Hit(value) => return Ok(value),
            Lookup::Wait(flight) => flight,
            Lookup::Start(flight, starter) => {
                let _ = starter.send(fetch().boxed());
                flight
            }
        };

        tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                debug!(key, "Waiter cancelled, in-flight fetch continues");
                Err(CacheError::Cancelled)
            }
            outcome = self.wait(flight) => outcome,
        }
    }

    /// Returns the value for `key` if it is stored and fresh. Never fetches.
    pub fn peek(&self, key: &str) -> Option<V> {
        let now = self.clock.now();
        let slots = self.slots.lock();
        slots
            .entries
            .get(key)
            .filter(|entry| entry.is_fresh(now))
            .map(|entry| entry.value.clone())
    }

    /// Returns true while a fetch for `key` is running.
    pub fn is_in_flight(&self, key: &str) -> bool {
        self.slots.lock().in_flight.contains_key(key)
    }

    /// Drops the stored entry for `key`. A running fetch is left alone.
    pub fn invalidate(&self, key: &str) -> bool {
        self.slots.lock().entries.remove(key).is_some()
    }

    /// Drops every stored entry. Running fetches are left alone.
    pub fn clear(&self) {
        self.slots.lock().entries.clear();
    }

    /// Removes expired entries and returns how many were dropped.
    pub fn purge_expired(&self) -> usize {
        let now = self.clock.now();
        let mut slots = self.slots.lock();
        let before = slots.entries.len();
        slots.entries.retain(|_, entry| entry.is_fresh(now));
        before - slots.entries.len()
    }

    /// Returns the number of stored entries, fresh or not.
    pub fn len(&self) -> usize {
        self.slots.lock().entries.len()
    }

    /// Returns true if nothing is stored.
    pub fn is_empty(&self) -> bool {
        self.slots.lock().entries.is_empty()
    }

    /// Returns cache statistics.
    pub fn stats(&self) -> CacheStats {
        let now = self.clock.now();
        let slots = self.slots.lock();
        let fresh = slots.entries.values().filter(|e| e.is_fresh(now)).count();
        CacheStats {
            hits: self.counters.hits.load(Ordering::Relaxed),
            misses: self.counters.misses.load(Ordering::Relaxed),
            coalesced: self.counters.coalesced.load(Ordering::Relaxed),
            fetch_failures: self.counters.failures.load(Ordering::Relaxed),
            stored_entries: slots.entries.len(),
            fresh_entries: fresh,
            in_flight: slots.in_flight.len(),
            ttl_seconds: self.config.ttl_seconds,
        }
    }

    /// Decides under the lock whether `key` is a hit, a join, or a new fetch.
    ///
    /// A new fetch is registered as a task waiting on the returned starter,
    /// so the caller's closure only runs after the lock is released and may
    /// itself touch this cache.
    fn lookup_or_start(&self, key: &str) -> Lookup<V, E> {
        let now = self.clock.now();
        let mut slots = self.slots.lock();

        if let Some(entry) = slots.entries.get(key) {
            if entry.is_fresh(now) {
                self.counters.hits.fetch_add(1, Ordering::Relaxed);
                return Lookup::Hit(entry.value.clone());
            }
        }

        if let Some(flight) = slots.in_flight.get(key) {
            self.counters.coalesced.fetch_add(1, Ordering::Relaxed);
            debug!(key, "Joining in-flight fetch");
            return Lookup::Wait(flight.clone());
        }

        self.counters.misses.fetch_add(1, Ordering::Relaxed);
        debug!(key, "Cache miss, starting fetch");

        // Registered before the lock is released, so the spawned task cannot
        // finish and deregister ahead of its own registration.
        let (starter, start) = oneshot::channel();
        let flight = self.spawn_fetch(key.to_owned(), start);
        slots.in_flight.insert(key.to_owned(), flight.clone());
        Lookup::Start(flight, starter)
    }

    fn spawn_fetch(
        &self,
        key: String,
        start: oneshot::Receiver<BoxFuture<'static, Result<V, E>>>,
    ) -> InFlight<V, E> {
        let slots = Arc::clone(&self.slots);
        let counters = Arc::clone(&self.counters);
        let clock = Arc::clone(&self.clock);
        let ttl = self.config.ttl();

        let task = tokio::spawn(async move {
            let outcome = match start.await {
                Ok(fut) => match AssertUnwindSafe(fut).catch_unwind().await {
                    Ok(Ok(value)) => Ok(value),
                    Ok(Err(err)) => Err(CacheError::Fetch(err)),
                    Err(panic) => Err(CacheError::Aborted(panic_message(panic.as_ref()))),
                },
                // The caller unwound before handing over its future.
                Err(_) => Err(CacheError::Aborted("fetch was never started".into())),
            };

            let stored = {
                let mut slots = slots.lock();
                slots.in_flight.remove(&key);
                match (&outcome, clock.now().checked_add(ttl)) {
                    (Ok(value), Some(expires_at)) => {
                        slots.entries.insert(
                            key.clone(),
                            CacheEntry {
                                value: value.clone(),
                                expires_at,
                            },
                        );
                        true
                    }
                    _ => false,
                }
            };

            match &outcome {
                Ok(_) if stored => {
                    debug!(key = %key, ttl_seconds = ttl.as_secs(), "Fetched value cached")
                }
                Ok(_) => warn!(
                    key = %key,
                    ttl_seconds = ttl.as_secs(),
                    "TTL out of clock range, fetched value not cached"
                ),
                Err(err) => {
                    counters.failures.fetch_add(1, Ordering::Relaxed);
                    warn!(key = %key, error = %err, "Fetch failed, nothing cached");
                }
            }

            outcome
        });

        async move {
            task.await
                .unwrap_or_else(|join_err| Err(CacheError::Aborted(join_err.to_string())))
        }
        .boxed()
        .shared()
    }

    async fn wait(&self, flight: InFlight<V, E>) -> Outcome<V, E> {
        match self.config.wait_timeout() {
            Some(limit) => tokio::time::timeout(limit, flight)
                .await
                .unwrap_or_else(|_| Err(CacheError::WaitTimeout(limit))),
            None => flight.await,
        }
    }
}

impl<V, E> Default for SingleFlightCache<V, E>
where
    V: Clone + Send + Sync + 'static,
    E: Clone + Send + Sync + fmt::Display + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<V, E> fmt::Debug for SingleFlightCache<V, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SingleFlightCache")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(msg) = panic.downcast_ref::<&str>() {
        (*msg).to_string()
    } else if let Some(msg) = panic.downcast_ref::<String>() {
        msg.clone()
    } else {
        "fetch panicked".to_string()
    }
}

/// Cache statistics.
#[derive(Clone, Debug, Serialize)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    /// Lookups that attached to a fetch already in flight
    pub coalesced: u64,
    pub fetch_failures: u64,
    pub stored_entries: usize,
    pub fresh_entries: usize,
    pub in_flight: usize,
    pub ttl_seconds: u64,
}

impl CacheStats {
    /// Share of lookups answered without waiting on a fetch.
    pub fn hit_ratio(&self) -> f64 {
        let total = self.hits + self.misses + self.coalesced;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}
