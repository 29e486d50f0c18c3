//! Request deduplication and caching keyed by resource + parameters.
//!
//! Each [`QueryKey`] moves through `Idle -> Loading -> Success | Error`.
//! Concurrent requests for one key share a single fetch, fresh results are
//! served from memory, and observers follow a key through a
//! [`watch::Receiver`] that stops updating once dropped.

use std::{
    collections::HashMap,
    fmt,
    future::Future,
    sync::{Arc, Mutex, MutexGuard},
    time::Duration,
};

use futures::{
    FutureExt,
    future::{BoxFuture, Shared},
};
use tokio::{sync::watch, time::Instant};

use crate::error::{ApiError, Result};

/// Identifies one cacheable request, e.g. `weather?city=London`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct QueryKey {
    resource: String,
    params: Vec<(String, String)>,
}

impl QueryKey {
    pub fn new(resource: impl Into<String>) -> Self {
        Self { resource: resource.into(), params: Vec::new() }
    }

    pub fn param(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.params.push((name.into(), value.into()));
        self
    }

    pub fn optional_param(self, name: impl Into<String>, value: Option<&str>) -> Self {
        match value.filter(|v| !v.is_empty()) {
            Some(v) => self.param(name, v),
            None => self,
        }
    }

    /// Key of the current-weather query for a city.
    pub fn weather(city: &str, country: Option<&str>) -> Self {
        Self::new("weather").param("city", city).optional_param("country", country)
    }

    pub fn resource(&self) -> &str {
        &self.resource
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.params.iter().find(|(n, _)| n == name).map(|(_, v)| v.as_str())
    }
}

impl fmt::Display for QueryKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.resource)?;
        for (i, (name, value)) in self.params.iter().enumerate() {
            let sep = if i == 0 { '?' } else { '&' };
            write!(f, "{sep}{name}={value}")?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryStatus {
    Idle,
    Loading,
    Success,
    Error,
}

/// Snapshot of one key.
///
/// A refetch of a key that already holds data keeps `status` and `data`
/// and only raises `is_fetching`.
#[derive(Debug)]
pub struct QueryState<T> {
    pub status: QueryStatus,
    pub data: Option<Arc<T>>,
    pub error: Option<ApiError>,
    pub is_fetching: bool,
    pub updated_at: Option<Instant>,
}

impl<T> QueryState<T> {
    pub fn idle() -> Self {
        Self { status: QueryStatus::Idle, data: None, error: None, is_fetching: false, updated_at: None }
    }

    pub fn is_loading(&self) -> bool {
        self.status == QueryStatus::Loading
    }

    pub fn is_error(&self) -> bool {
        self.status == QueryStatus::Error
    }

    /// Successful data younger than `stale_time`.
    pub fn fresh_data(&self, stale_time: Duration, now: Instant) -> Option<Arc<T>> {
        if self.status != QueryStatus::Success {
            return None;
        }
        let updated_at = self.updated_at?;
        (now.saturating_duration_since(updated_at) < stale_time)
            .then(|| self.data.clone())
            .flatten()
    }
}

impl<T> Clone for QueryState<T> {
    fn clone(&self) -> Self {
        Self {
            status: self.status,
            data: self.data.clone(),
            error: self.error.clone(),
            is_fetching: self.is_fetching,
            updated_at: self.updated_at,
        }
    }
}

impl<T> Default for QueryState<T> {
    fn default() -> Self {
        Self::idle()
    }
}

type SharedFetch<T> = Shared<BoxFuture<'static, Result<Arc<T>>>>;

struct Entry<T> {
    state: watch::Sender<QueryState<T>>,
    in_flight: Option<(u64, SharedFetch<T>)>,
    invalidated: bool,
}

impl<T> Entry<T> {
    fn new() -> Self {
        let (state, _) = watch::channel(QueryState::idle());
        Self { state, in_flight: None, invalidated: false }
    }

    /// Observed, fetching, or holding a result younger than `stale_time`.
    fn in_use(&self, stale_time: Duration, now: Instant) -> bool {
        self.state.receiver_count() > 0
            || self.in_flight.is_some()
            || self
                .state
                .borrow()
                .updated_at
                .is_some_and(|at| now.saturating_duration_since(at) < stale_time)
    }
}

struct Inner<T> {
    entries: HashMap<QueryKey, Entry<T>>,
    next_fetch_id: u64,
}

enum Lookup<T> {
    Cached(Arc<T>),
    Pending(SharedFetch<T>),
}

/// Per-key cache of fetch results. Cloning shares the same cache.
pub struct QueryCache<T> {
    inner: Arc<Mutex<Inner<T>>>,
    stale_time: Duration,
}

impl<T> Clone for QueryCache<T> {
    fn clone(&self) -> Self {
        Self { inner: Arc::clone(&self.inner), stale_time: self.stale_time }
    }
}

impl<T> fmt::Debug for QueryCache<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("QueryCache").field("stale_time", &self.stale_time).finish_non_exhaustive()
    }
}

impl<T: Send + Sync + 'static> QueryCache<T> {
    pub fn new(stale_time: Duration) -> Self {
        Self {
            inner: Arc::new(Mutex::new(Inner { entries: HashMap::new(), next_fetch_id: 0 })),
            stale_time,
        }
    }

    pub fn stale_time(&self) -> Duration {
        self.stale_time
    }

    /// Follow a key's state transitions. Dropping the receiver unsubscribes.
    pub fn subscribe(&self, key: &QueryKey) -> watch::Receiver<QueryState<T>> {
        let mut inner = lock(&self.inner);
        inner.entries.entry(key.clone()).or_insert_with(Entry::new).state.subscribe()
    }

    /// Current state of a key without triggering a fetch.
    pub fn peek(&self, key: &QueryKey) -> QueryState<T> {
        let inner = lock(&self.inner);
        inner.entries.get(key).map(|e| e.state.borrow().clone()).unwrap_or_default()
    }

    /// Return fresh cached data, join the key's in-flight request, or start one.
    ///
    /// The request runs on its own task, so its result is cached even if the
    /// caller stops waiting.
    pub async fn fetch<F, Fut>(&self, key: QueryKey, fetcher: F) -> Result<Arc<T>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T>> + Send + 'static,
    {
        match self.start(key, fetcher) {
            Lookup::Cached(data) => Ok(data),
            Lookup::Pending(fetch) => fetch.await,
        }
    }

    /// Like [`fetch`](Self::fetch) without waiting; observe the result
    /// through [`subscribe`](Self::subscribe). Must run inside a tokio runtime.
    pub fn prefetch<F, Fut>(&self, key: QueryKey, fetcher: F)
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T>> + Send + 'static,
    {
        let _ = self.start(key, fetcher);
    }

    /// Mark a key stale so the next request refetches it.
    pub fn invalidate(&self, key: &QueryKey) {
        let mut inner = lock(&self.inner);
        if let Some(entry) = inner.entries.get_mut(key) {
            entry.invalidated = true;
        }
    }

    /// Forget every key. Results of requests still in flight are discarded.
    pub fn clear(&self) {
        let mut inner = lock(&self.inner);
        tracing::debug!(entries = inner.entries.len(), "Clearing query cache");
        inner.entries.clear();
    }

    fn start<F, Fut>(&self, key: QueryKey, fetcher: F) -> Lookup<T>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T>> + Send + 'static,
    {
        let now = Instant::now();
        let mut inner = lock(&self.inner);

        let stale_time = self.stale_time;
        let before = inner.entries.len();
        inner.entries.retain(|k, e| *k == key || e.in_use(stale_time, now));
        if inner.entries.len() < before {
            tracing::debug!(evicted = before - inner.entries.len(), "Evicted unused queries");
        }

        let fetch_id = inner.next_fetch_id;
        let entry = inner.entries.entry(key.clone()).or_insert_with(Entry::new);

        if let Some((_, fetch)) = &entry.in_flight {
            tracing::debug!(%key, "Joining in-flight request");
            return Lookup::Pending(fetch.clone());
        }

        if !entry.invalidated {
            if let Some(data) = entry.state.borrow().fresh_data(self.stale_time, now) {
                tracing::debug!(%key, "Query cache hit");
                return Lookup::Cached(data);
            }
        }

        tracing::debug!(%key, "Query cache miss, fetching");
        entry.invalidated = false;
        entry.state.send_modify(|s| {
            s.is_fetching = true;
            if s.data.is_none() {
                s.status = QueryStatus::Loading;
                s.error = None;
            }
        });

        let task = {
            let fut = fetcher();
            let inner = Arc::clone(&self.inner);
            let key = key.clone();
            tokio::spawn(async move {
                let result = fut.await.map(Arc::new);
                settle(&inner, &key, fetch_id, &result);
                result
            })
        };

        let fetch = {
            let inner = Arc::clone(&self.inner);
            async move {
                match task.await {
                    Ok(result) => result,
                    Err(e) => {
                        tracing::warn!(%key, error = %e, "Fetch task did not complete");
                        let result = Err(ApiError::Cancelled);
                        settle(&inner, &key, fetch_id, &result);
                        result
                    }
                }
            }
            .boxed()
            .shared()
        };

        entry.in_flight = Some((fetch_id, fetch.clone()));
        inner.next_fetch_id += 1;

        Lookup::Pending(fetch)
    }
}

/// Record a finished fetch, unless the entry was cleared or replaced meanwhile.
fn settle<T>(inner: &Mutex<Inner<T>>, key: &QueryKey, fetch_id: u64, result: &Result<Arc<T>>) {
    let mut inner = lock(inner);
    let Some(entry) = inner.entries.get_mut(key) else {
        tracing::debug!(%key, "Discarding result for cleared query");
        return;
    };
    if !matches!(&entry.in_flight, Some((id, _)) if *id == fetch_id) {
        return;
    }

    entry.in_flight = None;
    let now = Instant::now();
    entry.state.send_modify(|s| {
        s.is_fetching = false;
        s.updated_at = Some(now);
        match result {
            Ok(data) => {
                s.status = QueryStatus::Success;
                s.data = Some(Arc::clone(data));
                s.error = None;
            }
            Err(e) => {
                tracing::debug!(%key, error = %e, "Query failed");
                s.status = QueryStatus::Error;
                s.error = Some(e.clone());
            }
        }
    });
}

fn lock<T>(inner: &Mutex<Inner<T>>) -> MutexGuard<'_, Inner<T>> {
    inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}
