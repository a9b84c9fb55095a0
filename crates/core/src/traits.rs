//! Store collaborator contracts
//!
//! doclink never talks to a database directly. The embedding application
//! supplies implementations of these traits:
//!
//! - `DocumentSource`: one-shot document reads (the configurable `fetch`)
//! - `Query`: query execution and query push subscriptions
//! - `DocumentStore`: a source that can also push document updates and
//!   resolve collection paths into queries
//!
//! Thread safety: implementations are shared behind `Arc` and must be
//! `Send + Sync`. Returned futures are `'static` so reads can outlive the
//! caller that issued them.

use crate::error::Result;
use crate::path::DocPath;
use crate::snapshot::{QuerySnapshot, Snapshot};
use futures_util::future::BoxFuture;
use std::fmt;
use std::sync::Arc;

/// Callback invoked once per pushed document update
pub type DocumentCallback = Box<dyn Fn(Result<Snapshot>) + Send + Sync>;

/// Callback invoked once per pushed query update
pub type QueryCallback = Box<dyn Fn(Result<QuerySnapshot>) + Send + Sync>;

/// Options forwarded to the store when registering a push listener
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ListenOptions {
    /// Also push updates that only change metadata
    pub include_metadata_changes: bool,
}

impl ListenOptions {
    /// Options with metadata-only updates enabled
    pub fn with_metadata_changes() -> Self {
        Self {
            include_metadata_changes: true,
        }
    }
}

/// Handle to a registered push listener
///
/// Wraps the store's teardown function. `remove` consumes the handle, so
/// the teardown can run at most once.
pub struct ListenerRegistration {
    teardown: Box<dyn FnOnce() -> Result<()> + Send>,
}

impl ListenerRegistration {
    /// Wrap a store teardown function
    pub fn new(teardown: impl FnOnce() -> Result<()> + Send + 'static) -> Self {
        Self {
            teardown: Box::new(teardown),
        }
    }

    /// Sever the push registration; no callback runs after this returns
    ///
    /// # Errors
    ///
    /// Propagates whatever the store reports while tearing down.
    pub fn remove(self) -> Result<()> {
        (self.teardown)()
    }
}

impl fmt::Debug for ListenerRegistration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ListenerRegistration").finish_non_exhaustive()
    }
}

/// One-shot document read primitive
pub trait DocumentSource: Send + Sync {
    /// Read the document at `path`
    ///
    /// One round trip per call; implementations do no caching of their own.
    /// A missing document is `Ok` with `exists() == false`, not an error.
    fn get(&self, path: &DocPath) -> BoxFuture<'static, Result<Snapshot>>;
}

/// Executable, listenable query
pub trait Query: Send + Sync + fmt::Debug {
    /// Execute the query once
    fn get(&self) -> BoxFuture<'static, Result<QuerySnapshot>>;

    /// Register a push listener for the query's result set
    fn listen(&self, options: ListenOptions, callback: QueryCallback)
        -> Result<ListenerRegistration>;
}

/// Document source with push delivery
pub trait DocumentStore: DocumentSource {
    /// Register a push listener for the document at `path`
    fn listen_document(
        &self,
        path: &DocPath,
        options: ListenOptions,
        callback: DocumentCallback,
    ) -> Result<ListenerRegistration>;

    /// Query selecting every document of the collection at `path`
    fn collection(&self, path: &str) -> Result<Arc<dyn Query>>;
}

/// Query addressing input: a built query or a collection path
#[derive(Debug, Clone)]
pub enum QueryRef {
    /// Already-built query
    Query(Arc<dyn Query>),
    /// Collection path, resolved through `DocumentStore::collection`
    Collection(String),
}

impl QueryRef {
    /// Resolve against `store`
    pub fn resolve(self, store: &dyn DocumentStore) -> Result<Arc<dyn Query>> {
        match self {
            QueryRef::Query(query) => Ok(query),
            QueryRef::Collection(path) => store.collection(&path),
        }
    }
}

impl From<Arc<dyn Query>> for QueryRef {
    fn from(query: Arc<dyn Query>) -> Self {
        QueryRef::Query(query)
    }
}

impl From<&Arc<dyn Query>> for QueryRef {
    fn from(query: &Arc<dyn Query>) -> Self {
        QueryRef::Query(Arc::clone(query))
    }
}

impl From<&str> for QueryRef {
    fn from(path: &str) -> Self {
        QueryRef::Collection(path.to_string())
    }
}

impl From<String> for QueryRef {
    fn from(path: String) -> Self {
        QueryRef::Collection(path)
    }
}
