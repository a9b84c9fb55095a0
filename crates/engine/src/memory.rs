//! In-memory document store
//!
//! Implements every store contract (`DocumentSource`, `Query`,
//! `DocumentStore`) over a process-local map. Writes push to registered
//! listeners synchronously, the way a real store delivers server updates.
//!
//! Besides serving demos, the store exposes the knobs the test suites need:
//! per-path read counters, one-shot read/query failures, a gate that holds
//! every read until released, push errors, and teardown counters.

use dashmap::DashMap;
use doclink_core::{
    ChangeKind, DocPath, DocumentCallback, DocumentChange, DocumentSource, DocumentStore, Error,
    ListenOptions, ListenerRegistration, Query, QueryCallback, QuerySnapshot, Result, Snapshot,
    Value,
};
use futures_util::future::{BoxFuture, FutureExt};
use parking_lot::{Mutex, RwLock};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::watch;
use tracing::trace;

struct DocListener {
    path: DocPath,
    callback: Arc<DocumentCallback>,
}

struct QueryListener {
    collection: String,
    callback: Arc<QueryCallback>,
}

struct StoreInner {
    docs: RwLock<BTreeMap<DocPath, BTreeMap<String, Value>>>,
    reads: DashMap<String, usize>,
    read_failures: DashMap<String, String>,
    query_failures: DashMap<String, String>,
    teardown_failure: Mutex<Option<String>>,
    gate: watch::Sender<bool>,
    doc_listeners: DashMap<u64, DocListener>,
    query_listeners: DashMap<u64, QueryListener>,
    next_listener: AtomicU64,
    teardowns: AtomicUsize,
}

impl StoreInner {
    fn snapshot(&self, path: &DocPath) -> Snapshot {
        match self.docs.read().get(path) {
            Some(fields) => Snapshot::new(path.clone(), fields.clone()),
            None => Snapshot::missing(path.clone()),
        }
    }

    fn collection(&self, collection: &str) -> Vec<Snapshot> {
        self.docs
            .read()
            .iter()
            .filter(|(path, _)| path.parent() == Some(collection))
            .map(|(path, fields)| Snapshot::new(path.clone(), fields.clone()))
            .collect()
    }

    fn teardown(&self, removed: bool) -> Result<()> {
        if removed {
            self.teardowns.fetch_add(1, Ordering::SeqCst);
        }
        match self.teardown_failure.lock().take() {
            Some(message) => Err(Error::Teardown(message)),
            None => Ok(()),
        }
    }

    fn document_callbacks(&self, path: &DocPath) -> Vec<Arc<DocumentCallback>> {
        self.doc_listeners
            .iter()
            .filter(|entry| &entry.path == path)
            .map(|entry| Arc::clone(&entry.callback))
            .collect()
    }

    fn query_callbacks(&self, collection: &str) -> Vec<Arc<QueryCallback>> {
        self.query_listeners
            .iter()
            .filter(|entry| entry.collection == collection)
            .map(|entry| Arc::clone(&entry.callback))
            .collect()
    }

    /// Push the current state of `path` to its document and collection
    /// listeners. `before` is the collection listing prior to the write.
    fn publish(&self, path: &DocPath, before: &[Snapshot]) {
        let snapshot = self.snapshot(path);
        for callback in self.document_callbacks(path) {
            callback(Ok(snapshot.clone()));
        }

        let Some(collection) = path.parent() else {
            return;
        };
        let callbacks = self.query_callbacks(collection);
        if callbacks.is_empty() {
            return;
        }
        let after = self.collection(collection);
        let old_index = before.iter().position(|doc| doc.path() == path);
        let new_index = after.iter().position(|doc| doc.path() == path);
        let kind = match (old_index, new_index) {
            (None, Some(_)) => ChangeKind::Added,
            (Some(_), Some(_)) => ChangeKind::Modified,
            (Some(_), None) => ChangeKind::Removed,
            (None, None) => return,
        };
        let result = QuerySnapshot {
            docs: after,
            changes: vec![DocumentChange {
                kind,
                old_index,
                new_index,
                doc: snapshot,
            }],
        };
        for callback in callbacks {
            callback(Ok(result.clone()));
        }
    }
}

/// Process-local document store
///
/// Cheap to clone; clones share state.
#[derive(Clone)]
pub struct MemoryStore {
    inner: Arc<StoreInner>,
}

impl MemoryStore {
    /// Empty store
    pub fn new() -> Self {
        let (gate, _) = watch::channel(false);
        Self {
            inner: Arc::new(StoreInner {
                docs: RwLock::new(BTreeMap::new()),
                reads: DashMap::new(),
                read_failures: DashMap::new(),
                query_failures: DashMap::new(),
                teardown_failure: Mutex::new(None),
                gate,
                doc_listeners: DashMap::new(),
                query_listeners: DashMap::new(),
                next_listener: AtomicU64::new(0),
                teardowns: AtomicUsize::new(0),
            }),
        }
    }

    /// Write a document, replacing its fields, and push to listeners
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidPath` for a malformed path.
    pub fn insert<'a>(
        &self,
        path: &str,
        fields: impl IntoIterator<Item = (&'a str, Value)>,
    ) -> Result<()> {
        let path = DocPath::new(path)?;
        let fields = fields
            .into_iter()
            .map(|(k, v)| (k.to_string(), v))
            .collect();
        let before = self.listing_before(&path);
        self.inner.docs.write().insert(path.clone(), fields);
        self.inner.publish(&path, &before);
        Ok(())
    }

    /// Delete a document and push to listeners
    pub fn remove(&self, path: &str) -> Result<()> {
        let path = DocPath::new(path)?;
        let before = self.listing_before(&path);
        self.inner.docs.write().remove(&path);
        self.inner.publish(&path, &before);
        Ok(())
    }

    fn listing_before(&self, path: &DocPath) -> Vec<Snapshot> {
        path.parent()
            .map(|collection| self.inner.collection(collection))
            .unwrap_or_default()
    }

    /// Current snapshot of a document, without counting a read
    pub fn snapshot(&self, path: &str) -> Result<Snapshot> {
        Ok(self.inner.snapshot(&DocPath::new(path)?))
    }

    /// Query over every document directly inside `collection`
    pub fn collection_query(&self, collection: &str) -> Arc<dyn Query> {
        Arc::new(MemoryQuery {
            store: Arc::clone(&self.inner),
            collection: collection.to_string(),
        })
    }

    /// Reads issued for `path`
    pub fn read_count(&self, path: &str) -> usize {
        self.inner.reads.get(path).map(|count| *count).unwrap_or(0)
    }

    /// Reads issued across all paths
    pub fn total_reads(&self) -> usize {
        self.inner.reads.iter().map(|entry| *entry.value()).sum()
    }

    /// Make the next read of `path` fail
    pub fn fail_next_read(&self, path: &str, message: &str) {
        self.inner
            .read_failures
            .insert(path.to_string(), message.to_string());
    }

    /// Make the next execution of a query over `collection` fail
    pub fn fail_next_query(&self, collection: &str, message: &str) {
        self.inner
            .query_failures
            .insert(collection.to_string(), message.to_string());
    }

    /// Make the next listener teardown report an error
    pub fn fail_next_teardown(&self, message: &str) {
        *self.inner.teardown_failure.lock() = Some(message.to_string());
    }

    /// Hold every read until `resume_reads`
    pub fn pause_reads(&self) {
        self.inner.gate.send_replace(true);
    }

    /// Release held reads
    pub fn resume_reads(&self) {
        self.inner.gate.send_replace(false);
    }

    /// Push an error to every listener of `path`
    pub fn push_error(&self, path: &str, message: &str) -> Result<()> {
        let path = DocPath::new(path)?;
        for callback in self.inner.document_callbacks(&path) {
            callback(Err(Error::Push(message.to_string())));
        }
        Ok(())
    }

    /// Push an error to every listener of queries over `collection`
    pub fn push_query_error(&self, collection: &str, message: &str) {
        for callback in self.inner.query_callbacks(collection) {
            callback(Err(Error::Push(message.to_string())));
        }
    }

    /// Registered push listeners, documents and queries together
    pub fn listener_count(&self) -> usize {
        self.inner.doc_listeners.len() + self.inner.query_listeners.len()
    }

    /// Listener teardowns performed
    pub fn teardown_count(&self) -> usize {
        self.inner.teardowns.load(Ordering::SeqCst)
    }

    fn next_listener_id(&self) -> u64 {
        self.inner.next_listener.fetch_add(1, Ordering::Relaxed)
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for MemoryStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MemoryStore")
            .field("documents", &self.inner.docs.read().len())
            .field("listeners", &self.listener_count())
            .finish()
    }
}

impl DocumentSource for MemoryStore {
    fn get(&self, path: &DocPath) -> BoxFuture<'static, Result<Snapshot>> {
        *self.inner.reads.entry(path.to_string()).or_insert(0) += 1;
        trace!(target: "doclink::memory", path = %path, "Read");
        let inner = Arc::clone(&self.inner);
        let mut gate = self.inner.gate.subscribe();
        let path = path.clone();
        async move {
            while *gate.borrow_and_update() {
                if gate.changed().await.is_err() {
                    break;
                }
            }
            if let Some((_, message)) = inner.read_failures.remove(path.as_str()) {
                return Err(Error::read(path, message));
            }
            Ok(inner.snapshot(&path))
        }
        .boxed()
    }
}

impl DocumentStore for MemoryStore {
    fn listen_document(
        &self,
        path: &DocPath,
        _options: ListenOptions,
        callback: DocumentCallback,
    ) -> Result<ListenerRegistration> {
        let id = self.next_listener_id();
        let callback = Arc::new(callback);
        self.inner.doc_listeners.insert(
            id,
            DocListener {
                path: path.clone(),
                callback: Arc::clone(&callback),
            },
        );
        callback(Ok(self.inner.snapshot(path)));

        let inner = Arc::clone(&self.inner);
        Ok(ListenerRegistration::new(move || {
            let removed = inner.doc_listeners.remove(&id).is_some();
            inner.teardown(removed)
        }))
    }

    fn collection(&self, path: &str) -> Result<Arc<dyn Query>> {
        if path.is_empty() || path.split('/').any(str::is_empty) {
            return Err(Error::InvalidPath(path.to_string()));
        }
        Ok(self.collection_query(path))
    }
}

/// Query over one collection of a `MemoryStore`
pub struct MemoryQuery {
    store: Arc<StoreInner>,
    collection: String,
}

impl MemoryQuery {
    /// Collection the query selects from
    pub fn collection(&self) -> &str {
        &self.collection
    }
}

impl fmt::Debug for MemoryQuery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MemoryQuery")
            .field("collection", &self.collection)
            .finish()
    }
}

impl Query for MemoryQuery {
    fn get(&self) -> BoxFuture<'static, Result<QuerySnapshot>> {
        let store = Arc::clone(&self.store);
        let collection = self.collection.clone();
        async move {
            if let Some((_, message)) = store.query_failures.remove(&collection) {
                return Err(Error::query(message));
            }
            Ok(QuerySnapshot::initial(store.collection(&collection)))
        }
        .boxed()
    }

    fn listen(
        &self,
        _options: ListenOptions,
        callback: QueryCallback,
    ) -> Result<ListenerRegistration> {
        let id = self.store.next_listener.fetch_add(1, Ordering::Relaxed);
        let callback = Arc::new(callback);
        self.store.query_listeners.insert(
            id,
            QueryListener {
                collection: self.collection.clone(),
                callback: Arc::clone(&callback),
            },
        );
        callback(Ok(QuerySnapshot::initial(
            self.store.collection(&self.collection),
        )));

        let store = Arc::clone(&self.store);
        Ok(ListenerRegistration::new(move || {
            let removed = store.query_listeners.remove(&id).is_some();
            store.teardown(removed)
        }))
    }
}
