//! Live subscription to a query result set

use crate::event::SubscriptionStream;
use crate::feed::{Closeable, Feed};
use doclink_core::{
    ListenOptions, MappedQuerySnapshot, Query, QueryCallback, QuerySnapshot, Result,
};
use doclink_engine::DataLink;
use std::sync::Arc;

/// Push subscription to a query
///
/// Each pushed result is mapped document by document, change records
/// included, before delivery.
#[derive(Clone)]
pub struct QuerySubscription {
    query: Arc<dyn Query>,
    feed: Arc<Feed<MappedQuerySnapshot>>,
}

impl QuerySubscription {
    /// Register with `query` and start delivering mapped results
    ///
    /// # Errors
    ///
    /// `Error::Listen` without a tokio runtime, or whatever the query
    /// reports while registering.
    pub fn open(query: Arc<dyn Query>, link: &DataLink, options: ListenOptions) -> Result<Self> {
        let link = link.clone();
        let feed = Feed::start(
            format!("{query:?}"),
            |callback: QueryCallback| query.listen(options, callback),
            move |snapshot: QuerySnapshot| {
                let link = link.clone();
                async move { link.map_query(&snapshot).await }
            },
        )?;
        Ok(Self { query, feed })
    }

    /// Subscribed query
    pub fn query(&self) -> &Arc<dyn Query> {
        &self.query
    }

    /// Attach an observer; earlier results are not replayed
    pub fn observe(&self) -> SubscriptionStream<MappedQuerySnapshot> {
        self.feed.observe()
    }

    /// Sever the push registration; a second call is a no-op
    ///
    /// # Errors
    ///
    /// Propagates a failed store teardown.
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

impl std::fmt::Debug for QuerySubscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QuerySubscription")
            .field("query", &self.query)
            .field("closed", &self.is_closed())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::SubscriptionEvent;
    use doclink_core::{ChangeKind, DocumentRef, Field, Value};
    use doclink_engine::{LinkConfig, MemoryStore};

    fn setup() -> (MemoryStore, DataLink) {
        let store = MemoryStore::new();
        let link = DataLink::new(LinkConfig::new(Arc::new(store.clone())));
        (store, link)
    }

    #[tokio::test]
    async fn test_initial_result_then_changes() {
        let (store, link) = setup();
        store.insert("posts/a", [("title", Value::from("first"))]).unwrap();

        let sub = QuerySubscription::open(store.collection_query("posts"), &link, ListenOptions::default()).unwrap();
        let mut events = sub.observe();

        let initial = events.recv().await.unwrap().into_next().unwrap();
        assert_eq!(initial.len(), 1);
        assert_eq!(initial.changes()[0].kind, ChangeKind::Added);

        store.insert("posts/b", [("title", Value::from("second"))]).unwrap();
        let next = events.recv().await.unwrap().into_next().unwrap();
        assert_eq!(next.len(), 2);
        assert_eq!(next.changes().len(), 1);
        assert_eq!(next.changes()[0].kind, ChangeKind::Added);
        assert_eq!(next.changes()[0].new_index, Some(1));

        store.remove("posts/a").unwrap();
        let removed = events.recv().await.unwrap().into_next().unwrap();
        assert_eq!(removed.len(), 1);
        assert_eq!(removed.changes()[0].kind, ChangeKind::Removed);
        assert_eq!(removed.changes()[0].old_index, Some(0));
    }

    #[tokio::test]
    async fn test_query_references_resolved() {
        let (store, link) = setup();
        store.insert("users/2", [("name", Value::from("Grace"))]).unwrap();
        store
            .insert("posts/a", [("author", Value::Reference(DocumentRef::parse("users/2").unwrap()))])
            .unwrap();

        let sub = QuerySubscription::open(store.collection_query("posts"), &link, ListenOptions::default()).unwrap();
        let mut events = sub.observe();

        let result = events.recv().await.unwrap().into_next().unwrap();
        let author = result.docs()[0].get("author").and_then(Field::as_document).unwrap();
        assert_eq!(author.get("name"), Some(&Field::Value(Value::from("Grace"))));
        assert_eq!(result.changes()[0].doc, result.docs()[0]);
    }

    #[tokio::test]
    async fn test_query_push_error_closes() {
        let (store, link) = setup();
        let sub = QuerySubscription::open(store.collection_query("posts"), &link, ListenOptions::default()).unwrap();
        let mut events = sub.observe();
        assert!(events.recv().await.unwrap().into_next().is_some());

        store.push_query_error("posts", "index missing");

        assert!(matches!(events.recv().await, Some(SubscriptionEvent::Error(_))));
        assert!(events.recv().await.is_none());
        assert!(sub.is_closed());
        assert_eq!(store.listener_count(), 0);
    }

    #[tokio::test]
    async fn test_unsubscribe_is_idempotent() {
        let (store, link) = setup();
        let sub = QuerySubscription::open(store.collection_query("posts"), &link, ListenOptions::default()).unwrap();
        sub.unsubscribe().unwrap();
        sub.clone().unsubscribe().unwrap();
        assert_eq!(store.teardown_count(), 1);
    }
}
