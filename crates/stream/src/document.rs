//! Live subscription to one document

use crate::event::SubscriptionStream;
use crate::feed::{Closeable, Feed};
use doclink_core::{
    DocPath, DocumentCallback, DocumentStore, ListenOptions, MappedValue, Result, Snapshot,
};
use doclink_engine::DataLink;
use std::sync::Arc;

/// Push subscription to a single document path
///
/// Every update is run through the link's mapper before it reaches the
/// observers, so references arrive resolved. Cloning shares the
/// underlying registration.
#[derive(Clone)]
pub struct DocumentSubscription {
    path: DocPath,
    feed: Arc<Feed<MappedValue>>,
}

impl DocumentSubscription {
    /// Register with `store` and start delivering mapped updates
    ///
    /// # Errors
    ///
    /// `Error::Listen` without a tokio runtime, or whatever the store
    /// reports while registering.
    pub fn open(
        store: &Arc<dyn DocumentStore>,
        link: &DataLink,
        path: DocPath,
        options: ListenOptions,
    ) -> Result<Self> {
        let link = link.clone();
        let feed = Feed::start(
            path.to_string(),
            |callback: DocumentCallback| store.listen_document(&path, options, callback),
            move |snapshot: Snapshot| {
                let link = link.clone();
                async move { link.map_document(&snapshot).await }
            },
        )?;
        Ok(Self { path, feed })
    }

    /// Subscribed path
    pub fn path(&self) -> &DocPath {
        &self.path
    }

    /// Attach an observer
    ///
    /// Updates pushed before this call are not replayed.
    pub fn observe(&self) -> SubscriptionStream<MappedValue> {
        self.feed.observe()
    }

    /// Sever the push registration
    ///
    /// Closing an already-closed subscription is a no-op.
    ///
    /// # Errors
    ///
    /// Propagates a failed store teardown. The subscription is closed
    /// either way.
    pub fn unsubscribe(&self) -> Result<()> {
        match self.feed.close() {
            Err(e) if e.is_already_closed() => Ok(()),
            other => other,
        }
    }

    /// Whether the subscription has been closed
    pub fn is_closed(&self) -> bool {
        self.feed.is_closed()
    }

    /// Observers currently attached
    pub fn observer_count(&self) -> usize {
        self.feed.observer_count()
    }

    pub(crate) fn closeable(&self) -> Arc<dyn Closeable> {
        self.feed.clone()
    }
}

impl std::fmt::Debug for DocumentSubscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DocumentSubscription")
            .field("path", &self.path)
            .field("closed", &self.is_closed())
            .finish()
    }
}
