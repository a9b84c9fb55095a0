//! User-facing document and query handles
//!
//! Handles own no cache entries; the cache belongs to the `DataLink` and is
//! keyed by path, so any number of handles for the same path share it.

use crate::link::DataLink;
use crate::projection::Projection;
use doclink_core::{
    DocPath, DocumentRef, Field, MappedQuerySnapshot, MappedValue, PathRef, Query, Result, Stored,
};
use parking_lot::Mutex;
use serde::de::DeserializeOwned;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::debug;

/// Handle for a single document
///
/// The projection keeps its identity across fetches, so observers bound to
/// it see every update.
#[derive(Debug)]
pub struct Reference {
    link: DataLink,
    path: DocPath,
    projection: Arc<Projection>,
    mapped: Mutex<Option<MappedValue>>,
}

impl Reference {
    pub(crate) fn new(link: DataLink, path: DocPath) -> Self {
        Self {
            link,
            path,
            projection: Arc::new(Projection::new()),
            mapped: Mutex::new(None),
        }
    }

    /// Document path
    pub fn path(&self) -> &DocPath {
        &self.path
    }

    /// Document id, derived from the path
    pub fn id(&self) -> &str {
        self.path.id()
    }

    /// Reference marker for this document
    pub fn to_document_ref(&self) -> DocumentRef {
        DocumentRef::new(self.path.clone())
    }

    /// Observable projection
    pub fn projection(&self) -> &Arc<Projection> {
        &self.projection
    }

    /// Current projection contents
    pub fn data(&self) -> BTreeMap<String, Field> {
        self.projection.data()
    }

    /// Most recent mapped value, if a fetch has succeeded
    pub fn mapped(&self) -> Option<MappedValue> {
        self.mapped.lock().clone()
    }

    /// Fetch, resolve references, and copy the result into the projection
    ///
    /// Fields are written one at a time; fields absent from the new value
    /// keep whatever they held before.
    ///
    /// # Errors
    ///
    /// On failure the projection is left untouched.
    pub async fn fetch(&self) -> Result<BTreeMap<String, Field>> {
        let snapshot = self.link.fetch(&self.path).await?;
        let mapped = self.link.map_document(&snapshot).await?;
        let mut changed = 0usize;
        for (key, value) in mapped.entries() {
            if self.projection.set(&key, value) {
                changed += 1;
            }
        }
        debug!(target: "doclink::handle", path = %self.path, changed, "Projection updated");
        *self.mapped.lock() = Some(mapped);
        Ok(self.projection.data())
    }

    /// Fetch and decode into a model type
    pub async fn fetch_as<T: DeserializeOwned>(&self) -> Result<Stored<T>> {
        self.fetch().await?;
        match self.mapped() {
            Some(mapped) => Stored::from_mapped(&mapped),
            None => Ok(Stored::placeholder()),
        }
    }
}

impl From<&Reference> for PathRef {
    fn from(reference: &Reference) -> Self {
        PathRef::Existing(reference.to_document_ref())
    }
}

/// Handle for a query
#[derive(Debug, Clone)]
pub struct QueryReference {
    link: DataLink,
    query: Arc<dyn Query>,
}

impl QueryReference {
    pub(crate) fn new(link: DataLink, query: Arc<dyn Query>) -> Self {
        Self { link, query }
    }

    /// Underlying query
    pub fn query(&self) -> &Arc<dyn Query> {
        &self.query
    }

    /// Execute, warm the cache, and map every document and change
    pub async fn fetch(&self) -> Result<MappedQuerySnapshot> {
        let snapshot = self.link.fetch_query(self.query.as_ref()).await?;
        self.link.map_query(&snapshot).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::LinkConfig;
    use crate::memory::MemoryStore;
    use doclink_core::{Error, ManualClock, Value, BLANK_KEY, ID_KEY};
    use serde::Deserialize;

    fn setup() -> (MemoryStore, Arc<ManualClock>, DataLink) {
        let store = MemoryStore::new();
        let clock = Arc::new(ManualClock::new(0));
        let link = DataLink::new(
            LinkConfig::new(Arc::new(store.clone()))
                .with_expires(1000)
                .with_clock(clock.clone()),
        );
        (store, clock, link)
    }

    #[test]
    fn test_id_derived_from_path() {
        let (_store, _clock, link) = setup();
        let reference = link.reference_from_path("teams/red/members/42").unwrap();
        assert_eq!(reference.id(), "42");
    }

    #[test]
    fn test_reference_from_existing_handle() {
        let (_store, _clock, link) = setup();
        let first = link.reference_from_path("users/1").unwrap();
        let second = link.reference(&first).unwrap();
        assert_eq!(second.path(), first.path());
    }

    #[test]
    fn test_invalid_path_rejected() {
        let (_store, _clock, link) = setup();
        assert!(matches!(
            link.reference_from_path("users//1"),
            Err(Error::InvalidPath(_))
        ));
    }

    #[test]
    fn test_blank_before_fetch() {
        let (_store, _clock, link) = setup();
        let reference = link.reference_from_path("users/1").unwrap();
        assert!(reference.projection().is_blank());
        assert!(reference.mapped().is_none());
    }

    #[tokio::test]
    async fn test_fetch_fills_projection() {
        let (store, _clock, link) = setup();
        store.insert("users/1", [("name", Value::from("Ada"))]).unwrap();
        let reference = link.reference_from_path("users/1").unwrap();

        let data = reference.fetch().await.unwrap();

        assert_eq!(data.get(BLANK_KEY), Some(&Field::Value(Value::Bool(false))));
        assert_eq!(data.get(ID_KEY), Some(&Field::Value(Value::from("1"))));
        assert_eq!(data.get("name"), Some(&Field::Value(Value::from("Ada"))));
    }

    #[tokio::test]
    async fn test_projection_identity_preserved() {
        let (store, clock, link) = setup();
        store.insert("users/1", [("name", Value::from("Ada"))]).unwrap();
        let reference = link.reference_from_path("users/1").unwrap();
        let bound = Arc::clone(reference.projection());

        reference.fetch().await.unwrap();
        store.insert("users/1", [("name", Value::from("Ada L."))]).unwrap();
        clock.set(2000);
        reference.fetch().await.unwrap();

        assert!(Arc::ptr_eq(&bound, reference.projection()));
        assert_eq!(bound.get("name"), Some(Field::Value(Value::from("Ada L."))));
    }

    #[tokio::test]
    async fn test_failed_fetch_leaves_projection() {
        let (store, _clock, link) = setup();
        store.fail_next_read("users/1", "offline");
        let reference = link.reference_from_path("users/1").unwrap();

        assert!(reference.fetch().await.is_err());
        assert!(reference.projection().is_blank());
    }

    #[derive(Debug, Deserialize, PartialEq)]
    struct User {
        name: String,
    }

    #[tokio::test]
    async fn test_fetch_as_decodes() {
        let (store, _clock, link) = setup();
        store.insert("users/1", [("name", Value::from("Ada"))]).unwrap();
        let reference = link.reference_from_path("users/1").unwrap();

        let stored: Stored<User> = reference.fetch_as().await.unwrap();
        assert_eq!(stored.id(), Some("1"));
        assert_eq!(stored.value(), Some(&User { name: "Ada".into() }));
    }

    #[tokio::test]
    async fn test_query_reference_fetch() {
        let (store, _clock, link) = setup();
        store.insert("users/1", [("name", Value::from("Ada"))]).unwrap();
        store.insert("users/2", [("name", Value::from("Grace"))]).unwrap();
        let query = link.query(store.collection_query("users"));

        let result = query.fetch().await.unwrap();
        let ids: Vec<_> = result.docs().iter().filter_map(|d| d.id()).collect();
        assert_eq!(ids, vec!["1", "2"]);
        assert_eq!(result.changes().len(), 2);
    }
}
