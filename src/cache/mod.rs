use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::time::{Duration, Instant};

use futures::future::{BoxFuture, FutureExt, Shared};
use log::debug;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use tokio::sync::Mutex;

use crate::error::ApiError;

/// How long an entry that is no longer fresh is kept for `peek`.
pub const DEFAULT_GC_TIME: Duration = Duration::from_secs(5 * 60);
pub const DEFAULT_MAX_ENTRIES: usize = 256;

/// Identifies one cached read: a resource namespace plus its serialized parameters.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct QueryKey {
    resource: String,
    params: String,
}

impl QueryKey {
    /// Fails when `params` cannot be serialized, so two unserializable
    /// parameter sets never collapse into one key.
    pub fn new<P: Serialize + ?Sized>(resource: &str, params: &P) -> Result<Self, ApiError> {
        let params = serde_json::to_string(params)
            .map_err(|e| ApiError::InvalidRequest(format!("unserializable {} parameters: {}", resource, e)))?;
        Ok(Self {
            resource: resource.to_string(),
            params,
        })
    }

    pub fn resource(resource: &str) -> Self {
        Self {
            resource: resource.to_string(),
            params: String::new(),
        }
    }

    pub fn namespace(&self) -> &str {
        &self.resource
    }

    /// `files` matches `files` and `files/...`, never `filesystem`.
    pub fn matches(&self, prefix: &str) -> bool {
        self.resource == prefix
            || self
                .resource
                .strip_prefix(prefix)
                .is_some_and(|rest| rest.starts_with('/'))
    }
}

impl fmt::Display for QueryKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.params.is_empty() {
            write!(f, "{}", self.resource)
        } else {
            write!(f, "{}:{}", self.resource, self.params)
        }
    }
}

type InFlightFuture = Shared<BoxFuture<'static, Result<Value, ApiError>>>;

struct InFlight {
    future: InFlightFuture,
    invalidated: bool,
}

struct Entry {
    value: Value,
    fetched_at: Instant,
    stale: bool,
    /// Insertion order, for capacity eviction.
    seq: u64,
}

#[derive(Default)]
struct CacheState {
    entries: HashMap<QueryKey, Entry>,
    in_flight: HashMap<QueryKey, InFlight>,
    next_seq: u64,
}

/// Keyed store of the last known result of every read.
///
/// Values are kept as JSON so one cache serves every resource type. Entries
/// younger than the freshness window are served without calling the fetcher;
/// concurrent reads of a missing or stale key share a single fetch.
/// Entries that are stale and older than the GC window are dropped, and the
/// oldest entries go first once the store exceeds its capacity.
pub struct QueryCache {
    stale_time: Duration,
    gc_time: Duration,
    max_entries: usize,
    state: Mutex<CacheState>,
}

impl QueryCache {
    pub fn new(stale_time: Duration) -> Self {
        Self {
            stale_time,
            gc_time: DEFAULT_GC_TIME,
            max_entries: DEFAULT_MAX_ENTRIES,
            state: Mutex::new(CacheState::default()),
        }
    }

    pub fn with_gc_time(mut self, gc_time: Duration) -> Self {
        self.gc_time = gc_time;
        self
    }

    pub fn with_max_entries(mut self, max_entries: usize) -> Self {
        self.max_entries = max_entries.max(1);
        self
    }

    pub fn stale_time(&self) -> Duration {
        self.stale_time
    }

    pub async fn get_or_fetch<T, F, Fut>(&self, key: QueryKey, fetch: F) -> Result<T, ApiError>
    where
        T: Serialize + DeserializeOwned + Send + 'static,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, ApiError>> + Send + 'static,
    {
        let future = {
            let mut state = self.state.lock().await;
            if let Some(entry) = state.entries.get(&key) {
                if !entry.stale && entry.fetched_at.elapsed() < self.stale_time {
                    metrics::counter!("docs_cache_hits_total").increment(1);
                    debug!("cache hit {}", key);
                    return decode(entry.value.clone());
                }
            }
            match state.in_flight.get(&key) {
                Some(flight) => {
                    debug!("joining in-flight {}", key);
                    flight.future.clone()
                }
                None => {
                    metrics::counter!("docs_cache_misses_total").increment(1);
                    debug!("cache miss {}", key);
                    let pending = fetch();
                    let future = async move {
                        let value = pending.await?;
                        Ok(serde_json::to_value(value)?)
                    }
                    .boxed()
                    .shared();
                    state.in_flight.insert(
                        key.clone(),
                        InFlight {
                            future: future.clone(),
                            invalidated: false,
                        },
                    );
                    future
                }
            }
        };

        let result = future.clone().await;

        {
            // Whoever finishes first settles the flight; a cancelled leader is covered by the others.
            let mut state = self.state.lock().await;
            let ours = state
                .in_flight
                .get(&key)
                .is_some_and(|flight| flight.future.ptr_eq(&future));
            if ours {
                let invalidated = state
                    .in_flight
                    .remove(&key)
                    .map(|flight| flight.invalidated)
                    .unwrap_or(false);
                if let Ok(value) = &result {
                    let seq = state.next_seq;
                    state.next_seq += 1;
                    state.entries.insert(
                        key,
                        Entry {
                            value: value.clone(),
                            fetched_at: Instant::now(),
                            stale: invalidated,
                            seq,
                        },
                    );
                    self.collect(&mut state);
                }
            }
        }

        decode(result?)
    }

    /// Last stored value regardless of freshness.
    pub async fn peek<T: DeserializeOwned>(&self, key: &QueryKey) -> Option<T> {
        let state = self.state.lock().await;
        let value = state.entries.get(key)?.value.clone();
        serde_json::from_value(value).ok()
    }

    /// `None` when nothing is cached under `key`.
    pub async fn is_stale(&self, key: &QueryKey) -> Option<bool> {
        let state = self.state.lock().await;
        state
            .entries
            .get(key)
            .map(|entry| entry.stale || entry.fetched_at.elapsed() >= self.stale_time)
    }

    /// Marks every entry under `prefix` stale, including reads still in flight.
    /// Returns how many stored entries were affected.
    pub async fn invalidate(&self, prefix: &str) -> usize {
        let mut state = self.state.lock().await;
        let mut count = 0;
        for (key, entry) in state.entries.iter_mut() {
            if key.matches(prefix) {
                entry.stale = true;
                count += 1;
            }
        }
        for (key, flight) in state.in_flight.iter_mut() {
            if key.matches(prefix) {
                flight.invalidated = true;
            }
        }
        debug!("invalidated {} entries under {}", count, prefix);
        self.collect(&mut state);
        count
    }

    pub async fn invalidate_all(&self) {
        let mut state = self.state.lock().await;
        for entry in state.entries.values_mut() {
            entry.stale = true;
        }
        for flight in state.in_flight.values_mut() {
            flight.invalidated = true;
        }
    }

    /// Drops every entry and forgets reads still in flight, so their late
    /// results are never stored. Callers already awaiting them still get them.
    pub async fn clear(&self) {
        let mut state = self.state.lock().await;
        state.entries.clear();
        state.in_flight.clear();
    }

    pub async fn len(&self) -> usize {
        self.state.lock().await.entries.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

impl QueryCache {
    fn collect(&self, state: &mut CacheState) {
        let before = state.entries.len();
        let (stale_time, gc_time) = (self.stale_time, self.gc_time);
        state.entries.retain(|_, entry| {
            let age = entry.fetched_at.elapsed();
            !((entry.stale || age >= stale_time) && age >= gc_time)
        });
        if state.entries.len() > self.max_entries {
            let mut by_age: Vec<(u64, QueryKey)> = state
                .entries
                .iter()
                .map(|(key, entry)| (entry.seq, key.clone()))
                .collect();
            by_age.sort_unstable_by_key(|(seq, _)| *seq);
            let excess = state.entries.len() - self.max_entries;
            for (_, key) in by_age.into_iter().take(excess) {
                state.entries.remove(&key);
            }
        }
        let dropped = before - state.entries.len();
        if dropped > 0 {
            debug!("collected {} cache entries", dropped);
        }
    }
}

fn decode<T: DeserializeOwned>(value: Value) -> Result<T, ApiError> {
    Ok(serde_json::from_value(value)?)
}
