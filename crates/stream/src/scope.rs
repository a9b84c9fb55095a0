//! Per-consumer subscription scopes
//!
//! A `StreamScope` is handed to one consumer (a component, a request, a
//! session). Every subscription opened through it is recorded, and
//! `teardown` closes all of them at once. Scopes are independent: tearing
//! one down never touches subscriptions owned by another.
//!
//! Dropping a scope tears it down.

use crate::document::DocumentSubscription;
use crate::feed::Closeable;
use crate::query::QuerySubscription;
use doclink_core::{DocumentStore, ListenOptions, PathRef, QueryRef, Result};
use doclink_engine::DataLink;
use parking_lot::Mutex;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, warn};

/// Subscription set owned by one consumer
pub struct StreamScope {
    id: u64,
    store: Arc<dyn DocumentStore>,
    link: DataLink,
    subscriptions: Mutex<Vec<Arc<dyn Closeable>>>,
}

impl StreamScope {
    /// Empty scope over `store`, mapping through `link`
    pub fn new(id: u64, store: Arc<dyn DocumentStore>, link: DataLink) -> Self {
        Self {
            id,
            store,
            link,
            subscriptions: Mutex::new(Vec::new()),
        }
    }

    /// Scope identifier, unique per plugin
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Subscribe to a document
    ///
    /// `target` is a path string or an existing document reference.
    ///
    /// # Errors
    ///
    /// `Error::InvalidPath` for a malformed path, or a listen failure.
    pub fn document(
        &self,
        target: impl Into<PathRef>,
        options: ListenOptions,
    ) -> Result<DocumentSubscription> {
        let path = target.into().into_path()?;
        let subscription = DocumentSubscription::open(&self.store, &self.link, path, options)?;
        self.track(subscription.closeable());
        Ok(subscription)
    }

    /// Subscribe to a query
    ///
    /// `target` is a built query or a collection path.
    pub fn query(
        &self,
        target: impl Into<QueryRef>,
        options: ListenOptions,
    ) -> Result<QuerySubscription> {
        let query = target.into().resolve(self.store.as_ref())?;
        let subscription = QuerySubscription::open(query, &self.link, options)?;
        self.track(subscription.closeable());
        Ok(subscription)
    }

    fn track(&self, subscription: Arc<dyn Closeable>) {
        let mut subscriptions = self.subscriptions.lock();
        subscriptions.push(subscription);
        debug!(target: "doclink::stream", scope = self.id, open = subscriptions.len(), "Subscription tracked");
    }

    /// Subscriptions recorded since the last teardown
    pub fn len(&self) -> usize {
        self.subscriptions.lock().len()
    }

    /// Whether nothing is recorded
    pub fn is_empty(&self) -> bool {
        self.subscriptions.lock().is_empty()
    }

    /// Close every recorded subscription and forget them
    ///
    /// Subscriptions already closed (unsubscribed by hand, or terminated by
    /// a push error) are skipped quietly. Every subscription is attempted
    /// even when one fails, and the set is empty afterwards.
    ///
    /// # Errors
    ///
    /// The first teardown failure reported by the store.
    pub fn teardown(&self) -> Result<()> {
        let subscriptions = std::mem::take(&mut *self.subscriptions.lock());
        let count = subscriptions.len();
        let mut first_error = None;

        for subscription in subscriptions {
            match subscription.close() {
                Ok(()) => {}
                Err(e) if e.is_already_closed() => {}
                Err(e) => {
                    warn!(
                        target: "doclink::stream",
                        scope = self.id,
                        subscription = subscription.label(),
                        error = %e,
                        "Teardown failed"
                    );
                    first_error.get_or_insert(e);
                }
            }
        }

        debug!(target: "doclink::stream", scope = self.id, count, "Scope torn down");
        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}

impl Drop for StreamScope {
    fn drop(&mut self) {
        if self.subscriptions.get_mut().is_empty() {
            return;
        }
        if let Err(e) = self.teardown() {
            warn!(target: "doclink::stream", scope = self.id, error = %e, "Teardown on drop failed");
        }
    }
}

impl fmt::Debug for StreamScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StreamScope")
            .field("id", &self.id)
            .field("subscriptions", &self.len())
            .finish()
    }
}
