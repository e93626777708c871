//! Single-flight build cache.
//!
//! At most one build runs per key. Concurrent callers join the running build
//! through a shared future and all observe its one result. Successes are
//! memoized until invalidated; failures are evicted so the next request retries.
//!
//! Builds run on their own tokio task. A caller that stops waiting does not
//! cancel the build; it still finishes and fills the cache.

use crate::error::BuildError;
use futures::future::{BoxFuture, Shared};
use futures::FutureExt;
use std::collections::HashMap;
use std::future::Future;
use std::hash::Hash;
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

type SharedBuild<V> = Shared<BoxFuture<'static, Result<V, BuildError>>>;

/// Observable state of one key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryState {
    Pending,
    Ready,
    /// A result exists but the next request rebuilds.
    Invalid,
}

enum Entry<V> {
    Pending {
        /// Distinguishes this build from a later one for the same key.
        generation: u64,
        future: SharedBuild<V>,
        /// Invalidated while running. New requests start a fresh build;
        /// callers already joined still get this one.
        stale: bool,
    },
    Done {
        value: V,
        valid: bool,
    },
}

struct Inner<K, V> {
    entries: Mutex<HashMap<K, Entry<V>>>,
    generation: AtomicU64,
}

impl<K: Eq + Hash + Clone, V: Clone> Inner<K, V> {
    fn lock(&self) -> MutexGuard<'_, HashMap<K, Entry<V>>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Record the outcome of the build started as `generation`.
    fn complete(&self, key: &K, generation: u64, result: &Result<V, BuildError>) {
        let mut entries = self.lock();
        let stale = match entries.get(key) {
            Some(Entry::Pending {
                generation: current,
                stale,
                ..
            }) if *current == generation => *stale,
            _ => return,
        };
        match result {
            Ok(value) => {
                entries.insert(
                    key.clone(),
                    Entry::Done {
                        value: value.clone(),
                        valid: !stale,
                    },
                );
            }
            Err(_) => {
                entries.remove(key);
            }
        }
    }
}

/// Keyed single-flight executor with memoization.
pub struct SingleFlight<K, V> {
    inner: Arc<Inner<K, V>>,
}

impl<K, V> Clone for SingleFlight<K, V> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<K, V> Default for SingleFlight<K, V> {
    fn default() -> Self {
        Self {
            inner: Arc::new(Inner {
                entries: Mutex::new(HashMap::new()),
                generation: AtomicU64::new(0),
            }),
        }
    }
}

impl<K, V> std::fmt::Debug for SingleFlight<K, V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SingleFlight").finish_non_exhaustive()
    }
}

impl<K, V> SingleFlight<K, V>
where
    K: Eq + Hash + Clone + AsRef<Path> + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the memoized result for `key`, join its running build, or start one.
    ///
    /// `build` is invoked only when a new build starts, and only creates the
    /// future: it must not call back into this cache synchronously.
    /// Must be called within a tokio runtime.
    pub async fn get_or_build<F, Fut>(&self, key: K, build: F) -> Result<V, BuildError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<V, BuildError>> + Send + 'static,
    {
        let (future, started) = {
            let mut entries = self.inner.lock();
            match entries.get(&key) {
                Some(Entry::Done { value, valid: true }) => return Ok(value.clone()),
                Some(Entry::Pending {
                    future,
                    stale: false,
                    ..
                }) => {
                    tracing::trace!(file = %key.as_ref().display(), "joining in-flight build");
                    (future.clone(), false)
                }
                _ => {
                    // A replaced stale build still runs for the callers that
                    // joined it; `complete` ignores its generation
                    let generation = self.inner.generation.fetch_add(1, Ordering::Relaxed);
                    let future = self.start(key.clone(), generation, build());
                    entries.insert(
                        key,
                        Entry::Pending {
                            generation,
                            future: future.clone(),
                            stale: false,
                        },
                    );
                    (future, true)
                }
            }
        };

        if started {
            // Drives the build to completion even if every caller goes away
            tokio::spawn(future.clone());
        }
        future.await
    }

    fn start<Fut>(&self, key: K, generation: u64, build: Fut) -> SharedBuild<V>
    where
        Fut: Future<Output = Result<V, BuildError>> + Send + 'static,
    {
        tracing::debug!(file = %key.as_ref().display(), generation, "starting build");
        let task = tokio::spawn(build);
        let inner = Arc::clone(&self.inner);
        async move {
            let result = match task.await {
                Ok(result) => result,
                Err(e) => Err(BuildError::Cancelled {
                    file: key.as_ref().to_path_buf(),
                    message: e.to_string(),
                }),
            };
            if let Err(e) = &result {
                tracing::debug!(file = %key.as_ref().display(), error = %e, "build failed, evicting");
            }
            inner.complete(&key, generation, &result);
            result
        }
        .boxed()
        .shared()
    }

    /// Mark `key` for rebuild. A running build is not cancelled, but the next
    /// request starts a new one instead of joining it.
    ///
    /// Returns whether the key was present.
    pub fn invalidate(&self, key: &K) -> bool {
        let mut entries = self.inner.lock();
        match entries.get_mut(key) {
            Some(Entry::Pending { stale, .. }) => {
                *stale = true;
                true
            }
            Some(Entry::Done { valid, .. }) => {
                *valid = false;
                true
            }
            None => false,
        }
    }

    /// Invalidate every key matching `pred`. Returns how many were present.
    pub fn invalidate_where(&self, pred: impl Fn(&K) -> bool) -> usize {
        let mut entries = self.inner.lock();
        let mut count = 0;
        for (key, entry) in entries.iter_mut() {
            if !pred(key) {
                continue;
            }
            count += 1;
            match entry {
                Entry::Pending { stale, .. } => *stale = true,
                Entry::Done { valid, .. } => *valid = false,
            }
        }
        count
    }

    /// Like [`invalidate_where`](Self::invalidate_where), but valid results for
    /// which `unchanged` holds are kept. Returns how many were invalidated.
    pub fn invalidate_where_changed(
        &self,
        pred: impl Fn(&K) -> bool,
        unchanged: impl Fn(&V) -> bool,
    ) -> usize {
        let mut entries = self.inner.lock();
        let mut count = 0;
        for (key, entry) in entries.iter_mut() {
            if !pred(key) {
                continue;
            }
            match entry {
                Entry::Done { value, valid: true } if unchanged(value) => continue,
                Entry::Pending { stale, .. } => *stale = true,
                Entry::Done { valid, .. } => *valid = false,
            }
            count += 1;
        }
        count
    }

    #[must_use]
    pub fn state(&self, key: &K) -> Option<EntryState> {
        self.inner.lock().get(key).map(|entry| match entry {
            Entry::Pending { .. } => EntryState::Pending,
            Entry::Done { valid: true, .. } => EntryState::Ready,
            Entry::Done { valid: false, .. } => EntryState::Invalid,
        })
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.lock().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
