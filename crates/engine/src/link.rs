//! Fetch cache for remote documents
//!
//! `DataLink` owns two process-wide tables for one configured connection:
//!
//! - the cache: path -> `{ timestamp, snapshot }`, fresh while
//!   `timestamp + expires > now` (strict)
//! - the in-flight table: path -> shared pending read, at most one per path
//!
//! ## Read protocol
//!
//! 1. Fresh cache entry: return it, no read.
//! 2. Pending read for the path: join it.
//! 3. Otherwise: register a new shared read in the in-flight table before
//!    it is first polled, then await it.
//!
//! The read settles itself: on completion it stores the snapshot (success
//! only) and removes its in-flight entry, whichever requester happens to
//! drive it. When a tokio runtime is available the read is also spawned,
//! so it completes even if every requester stops waiting.
//!
//! Locks are never held across an `.await`.

use crate::config::LinkConfig;
use crate::reference::{QueryReference, Reference};
use doclink_core::{DocPath, PathRef, Query, QuerySnapshot, Result, Snapshot};
use futures_util::future::{BoxFuture, FutureExt, Shared};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use tracing::{debug, trace, warn};

type SharedRead = Shared<BoxFuture<'static, Result<Snapshot>>>;

/// Cached snapshot with the time it was stored
#[derive(Debug, Clone)]
pub struct CacheEntry {
    /// Milliseconds since epoch at which the entry was stored
    pub timestamp: u64,
    /// Cached snapshot
    pub snapshot: Snapshot,
}

impl CacheEntry {
    /// Whether the entry is still fresh at `now`
    pub fn is_fresh(&self, expires_ms: u64, now: u64) -> bool {
        self.timestamp.saturating_add(expires_ms) > now
    }
}

/// Cache counters snapshot
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    /// Requests answered from a fresh entry
    pub hits: u64,
    /// Requests that joined a pending read
    pub joins: u64,
    /// Reads issued to the document source
    pub reads: u64,
    /// Reads that failed
    pub failures: u64,
    /// Cache entries currently stored
    pub entries: usize,
    /// Reads currently pending
    pub in_flight: usize,
}

/// Metric counters - Relaxed ordering, purely observational
#[derive(Debug, Default)]
struct Counters {
    hits: AtomicU64,
    joins: AtomicU64,
    reads: AtomicU64,
    failures: AtomicU64,
}

pub(crate) struct LinkInner {
    pub(crate) config: LinkConfig,
    entries: Mutex<HashMap<DocPath, CacheEntry>>,
    in_flight: Mutex<HashMap<DocPath, SharedRead>>,
    counters: Counters,
}

impl LinkInner {
    fn fresh_entry(&self, path: &DocPath) -> Option<Snapshot> {
        let now = self.config.clock.now_millis();
        let entries = self.entries.lock();
        entries
            .get(path)
            .filter(|entry| entry.is_fresh(self.config.expires_ms(), now))
            .map(|entry| entry.snapshot.clone())
    }

    fn store(&self, snapshot: &Snapshot) {
        let timestamp = self.config.clock.now_millis();
        self.entries.lock().insert(
            snapshot.path().clone(),
            CacheEntry {
                timestamp,
                snapshot: snapshot.clone(),
            },
        );
    }

    /// Record the outcome of a read and retire its in-flight entry.
    ///
    /// The cache is written before the in-flight entry is removed, so no
    /// requester can observe neither and issue a duplicate read.
    fn settle(&self, path: &DocPath, result: &Result<Snapshot>) {
        match result {
            Ok(snapshot) => {
                self.store(snapshot);
                debug!(target: "doclink::cache", path = %path, exists = snapshot.exists(), "Read settled");
            }
            Err(e) => {
                self.counters.failures.fetch_add(1, Ordering::Relaxed);
                warn!(target: "doclink::cache", path = %path, error = %e, "Read failed");
            }
        }
        self.in_flight.lock().remove(path);
    }
}

/// Request-deduplicating, time-to-live cache over a document source
///
/// Cheap to clone; clones share both tables.
#[derive(Clone)]
pub struct DataLink {
    pub(crate) inner: Arc<LinkInner>,
}

impl DataLink {
    /// Create a link from its configuration
    pub fn new(config: LinkConfig) -> Self {
        debug!(
            target: "doclink::cache",
            expires_ms = config.expires_ms(),
            max_depth = config.max_depth(),
            "Link created"
        );
        Self {
            inner: Arc::new(LinkInner {
                config,
                entries: Mutex::new(HashMap::new()),
                in_flight: Mutex::new(HashMap::new()),
                counters: Counters::default(),
            }),
        }
    }

    /// Configuration in effect
    pub fn config(&self) -> &LinkConfig {
        &self.inner.config
    }

    /// Fetch the snapshot at `path`, from cache when fresh
    ///
    /// # Errors
    ///
    /// Propagates the source's read failure to every requester that was
    /// waiting on the same read. Failures are not cached.
    pub async fn fetch(&self, path: &DocPath) -> Result<Snapshot> {
        if let Some(snapshot) = self.inner.fresh_entry(path) {
            self.inner.counters.hits.fetch_add(1, Ordering::Relaxed);
            trace!(target: "doclink::cache", path = %path, "Cache hit");
            return Ok(snapshot);
        }
        self.pending_read(path).await
    }

    /// Join the pending read for `path`, or register a new one
    fn pending_read(&self, path: &DocPath) -> SharedRead {
        let mut in_flight = self.inner.in_flight.lock();
        if let Some(read) = in_flight.get(path) {
            self.inner.counters.joins.fetch_add(1, Ordering::Relaxed);
            trace!(target: "doclink::cache", path = %path, "Joined pending read");
            return read.clone();
        }

        self.inner.counters.reads.fetch_add(1, Ordering::Relaxed);
        debug!(target: "doclink::cache", path = %path, "Issuing read");

        let source_read = self.inner.config.source.get(path);
        let link: Weak<LinkInner> = Arc::downgrade(&self.inner);
        let key = path.clone();
        let read = async move {
            let result = source_read.await;
            if let Some(link) = link.upgrade() {
                link.settle(&key, &result);
            }
            result
        }
        .boxed()
        .shared();

        in_flight.insert(path.clone(), read.clone());
        drop(in_flight);

        if let Ok(runtime) = tokio::runtime::Handle::try_current() {
            runtime.spawn(read.clone());
        }
        read
    }

    /// Execute `query` and warm the cache with every returned document
    ///
    /// Does not consult or modify the in-flight table.
    pub async fn fetch_query(&self, query: &dyn Query) -> Result<QuerySnapshot> {
        let snapshot = query.get().await.map_err(|e| {
            warn!(target: "doclink::cache", query = ?query, error = %e, "Query failed");
            e
        })?;
        for doc in &snapshot.docs {
            self.inner.store(doc);
        }
        debug!(target: "doclink::cache", documents = snapshot.docs.len(), "Cache warmed from query");
        Ok(snapshot)
    }

    /// Cached entry for `path`, fresh or stale
    pub fn cached(&self, path: &DocPath) -> Option<CacheEntry> {
        self.inner.entries.lock().get(path).cloned()
    }

    /// Whether a read for `path` is currently pending
    pub fn is_in_flight(&self, path: &DocPath) -> bool {
        self.inner.in_flight.lock().contains_key(path)
    }

    /// Drop every cache entry; pending reads are left alone
    pub fn clear_cache(&self) {
        let cleared = {
            let mut entries = self.inner.entries.lock();
            let count = entries.len();
            entries.clear();
            count
        };
        debug!(target: "doclink::cache", cleared, "Cache cleared");
    }

    /// Counter snapshot
    pub fn stats(&self) -> CacheStats {
        let counters = &self.inner.counters;
        CacheStats {
            hits: counters.hits.load(Ordering::Relaxed),
            joins: counters.joins.load(Ordering::Relaxed),
            reads: counters.reads.load(Ordering::Relaxed),
            failures: counters.failures.load(Ordering::Relaxed),
            entries: self.inner.entries.lock().len(),
            in_flight: self.inner.in_flight.lock().len(),
        }
    }

    /// Handle for a single document
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidPath` if a raw path string is malformed.
    pub fn reference(&self, target: impl Into<PathRef>) -> Result<Reference> {
        let path = target.into().into_path()?;
        Ok(Reference::new(self.clone(), path))
    }

    /// Handle for a single document, addressed by raw path
    pub fn reference_from_path(&self, path: &str) -> Result<Reference> {
        self.reference(PathRef::from(path))
    }

    /// Handle for a query
    pub fn query(&self, query: Arc<dyn Query>) -> QueryReference {
        QueryReference::new(self.clone(), query)
    }
}

impl std::fmt::Debug for DataLink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DataLink")
            .field("config", &self.inner.config)
            .field("stats", &self.stats())
            .finish()
    }
}
