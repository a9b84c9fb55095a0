//! Reference graph mapper
//!
//! Turns a `Snapshot` into a `MappedValue`:
//!
//! - missing document: `Blank`, fields are not looked at
//! - every top-level field holding a reference marker is fetched through the
//!   link's cache, mapped recursively, and replaced by the mapped target
//! - every other field is copied through untouched (nested maps and arrays
//!   are not traversed)
//!
//! Sibling references resolve concurrently and fail fast: if any of them
//! fails the whole document fails, nothing partial is returned.
//!
//! ## Cycles
//!
//! Each resolution carries the chain of paths above it. A reference back
//! into that chain fails with `Error::ReferenceCycle`; a chain longer than
//! `max_depth` fails with `Error::DepthExceeded`. Two fields pointing at the
//! same document (a diamond) are not a cycle.

use crate::link::DataLink;
use doclink_core::{
    DocPath, Error, Field, MappedDocumentChange, MappedQuerySnapshot, MappedValue, QuerySnapshot,
    Result, Snapshot, Value,
};
use futures_util::future::{try_join_all, BoxFuture, FutureExt};
use std::collections::BTreeMap;
use tracing::{debug, trace};

impl DataLink {
    /// Resolve every reference in `snapshot`
    ///
    /// Pure: `snapshot` is left as it was.
    ///
    /// # Errors
    ///
    /// Fails if any referenced document cannot be read, or on a cycle or
    /// depth overflow.
    pub async fn map_document(&self, snapshot: &Snapshot) -> Result<MappedValue> {
        self.resolve(snapshot, &[]).await
    }

    /// Map every document and every change record of a query result
    pub async fn map_query(&self, snapshot: &QuerySnapshot) -> Result<MappedQuerySnapshot> {
        let docs = try_join_all(snapshot.docs.iter().map(|doc| self.map_document(doc)));
        let changes = try_join_all(snapshot.changes.iter().map(|change| async move {
            Ok::<_, Error>(MappedDocumentChange {
                kind: change.kind,
                old_index: change.old_index,
                new_index: change.new_index,
                doc: self.map_document(&change.doc).await?,
            })
        }));
        let (docs, changes) = futures_util::try_join!(docs, changes)?;
        Ok(MappedQuerySnapshot::new(docs, changes))
    }

    fn resolve<'a>(
        &'a self,
        snapshot: &'a Snapshot,
        chain: &'a [DocPath],
    ) -> BoxFuture<'a, Result<MappedValue>> {
        async move {
            if !snapshot.exists() {
                trace!(target: "doclink::mapper", path = %snapshot.path(), "Blank document");
                return Ok(MappedValue::Blank);
            }

            let max_depth = self.inner.config.max_depth();
            if chain.len() > max_depth {
                return Err(Error::DepthExceeded {
                    path: snapshot.path().clone(),
                    depth: max_depth,
                });
            }

            let mut lineage = chain.to_vec();
            lineage.push(snapshot.path().clone());
            let lineage = lineage.as_slice();

            let resolved = try_join_all(
                snapshot
                    .references()
                    .map(|(key, target)| self.resolve_reference(key, target, lineage)),
            )
            .await?;

            let mut fields: BTreeMap<String, Field> = snapshot
                .fields()
                .iter()
                .filter(|(_, value)| !matches!(value, Value::Reference(_)))
                .map(|(key, value)| (key.clone(), Field::Value(value.clone())))
                .collect();
            let references = resolved.len();
            fields.extend(
                resolved
                    .into_iter()
                    .map(|(key, mapped)| (key, Field::Document(mapped))),
            );

            if references > 0 {
                debug!(
                    target: "doclink::mapper",
                    path = %snapshot.path(),
                    references,
                    depth = chain.len(),
                    "Resolved references"
                );
            }
            Ok(MappedValue::document(snapshot.id(), fields))
        }
        .boxed()
    }

    async fn resolve_reference(
        &self,
        key: &str,
        target: &DocPath,
        lineage: &[DocPath],
    ) -> Result<(String, MappedValue)> {
        if lineage.contains(target) {
            return Err(Error::ReferenceCycle {
                path: target.clone(),
            });
        }
        let snapshot = self.fetch(target).await?;
        let mapped = self.resolve(&snapshot, lineage).await?;
        Ok((key.to_string(), mapped))
    }
}

#[cfg(test)]
mod tests {
    use crate::config::LinkConfig;
    use crate::link::DataLink;
    use crate::memory::MemoryStore;
    use doclink_core::{
        DocPath, DocumentRef, Error, Field, ManualClock, MappedValue, Snapshot, Value,
    };
    use std::collections::BTreeMap;
    use std::sync::Arc;

    fn path(raw: &str) -> DocPath {
        DocPath::new(raw).unwrap()
    }

    fn reference(raw: &str) -> Value {
        Value::Reference(DocumentRef::parse(raw).unwrap())
    }

    fn link_over(store: &MemoryStore) -> DataLink {
        DataLink::new(
            LinkConfig::new(Arc::new(store.clone()))
                .with_expires(1000)
                .with_clock(Arc::new(ManualClock::new(0))),
        )
    }

    #[tokio::test]
    async fn test_blank_ignores_fields() {
        let store = MemoryStore::new();
        let link = link_over(&store);
        let mapped = link
            .map_document(&Snapshot::missing(path("users/9")))
            .await
            .unwrap();
        assert_eq!(mapped, MappedValue::Blank);
        assert_eq!(store.total_reads(), 0);
    }

    #[tokio::test]
    async fn test_plain_fields_pass_through() {
        let store = MemoryStore::new();
        let link = link_over(&store);
        let mut nested = BTreeMap::new();
        nested.insert("inner".to_string(), reference("users/2"));
        let snap = Snapshot::new(path("users/1"), BTreeMap::new())
            .with_field("name", "Ada")
            .with_field("meta", Value::Map(nested.clone()));

        let mapped = link.map_document(&snap).await.unwrap();

        assert_eq!(mapped.id(), Some("1"));
        assert_eq!(mapped.get("name"), Some(&Field::Value(Value::from("Ada"))));
        assert_eq!(mapped.get("meta"), Some(&Field::Value(Value::Map(nested))));
        assert_eq!(store.total_reads(), 0);
    }

    #[tokio::test]
    async fn test_reference_resolved_recursively() {
        let store = MemoryStore::new();
        store.insert("users/3", [("name", Value::from("Root"))]).unwrap();
        store.insert("users/2", [("name", Value::from("Grace")), ("boss", reference("users/3"))]).unwrap();
        let link = link_over(&store);
        let snap = Snapshot::new(path("users/1"), BTreeMap::new())
            .with_field("manager", DocumentRef::parse("users/2").unwrap());

        let mapped = link.map_document(&snap).await.unwrap();

        let manager = mapped.get("manager").and_then(Field::as_document).unwrap();
        assert_eq!(manager.id(), Some("2"));
        let boss = manager.get("boss").and_then(Field::as_document).unwrap();
        assert_eq!(boss.get("name"), Some(&Field::Value(Value::from("Root"))));
    }

    #[tokio::test]
    async fn test_dangling_reference_maps_to_blank() {
        let store = MemoryStore::new();
        let link = link_over(&store);
        let snap = Snapshot::new(path("users/1"), BTreeMap::new())
            .with_field("manager", DocumentRef::parse("users/404").unwrap());

        let mapped = link.map_document(&snap).await.unwrap();
        assert_eq!(
            mapped.get("manager"),
            Some(&Field::Document(MappedValue::Blank))
        );
    }

    #[tokio::test]
    async fn test_input_snapshot_untouched() {
        let store = MemoryStore::new();
        store.insert("users/2", [("name", Value::from("Grace"))]).unwrap();
        let link = link_over(&store);
        let snap = Snapshot::new(path("users/1"), BTreeMap::new())
            .with_field("manager", DocumentRef::parse("users/2").unwrap());
        let before = snap.clone();

        link.map_document(&snap).await.unwrap();
        assert_eq!(snap, before);
    }

    #[tokio::test]
    async fn test_cycle_detected() {
        let store = MemoryStore::new();
        store.insert("a/1", [("next", reference("a/2"))]).unwrap();
        store.insert("a/2", [("next", reference("a/1"))]).unwrap();
        let link = link_over(&store);
        let snap = store.snapshot("a/1").unwrap();

        let err = link.map_document(&snap).await.unwrap_err();
        assert_eq!(err, Error::ReferenceCycle { path: path("a/1") });
    }

    #[tokio::test]
    async fn test_self_reference_is_cycle() {
        let store = MemoryStore::new();
        store.insert("a/1", [("me", reference("a/1"))]).unwrap();
        let link = link_over(&store);

        let err = link.map_document(&store.snapshot("a/1").unwrap()).await.unwrap_err();
        assert!(matches!(err, Error::ReferenceCycle { .. }));
    }

    #[tokio::test]
    async fn test_diamond_is_not_cycle() {
        let store = MemoryStore::new();
        store.insert("d/shared", [("v", Value::Int(1))]).unwrap();
        store.insert("d/root", [("left", reference("d/shared")), ("right", reference("d/shared"))]).unwrap();
        let link = link_over(&store);

        let mapped = link.map_document(&store.snapshot("d/root").unwrap()).await.unwrap();
        assert_eq!(mapped.get("left"), mapped.get("right"));
        assert_eq!(store.read_count("d/shared"), 1);
    }

    #[tokio::test]
    async fn test_depth_bound() {
        let store = MemoryStore::new();
        for i in 0..5 {
            store.insert(&format!("chain/{i}"), [("next", reference(&format!("chain/{}", i + 1)))]).unwrap();
        }
        store.insert("chain/5", [("end", Value::Bool(true))]).unwrap();
        let link = DataLink::new(LinkConfig::new(Arc::new(store.clone())).with_max_depth(3));

        let err = link.map_document(&store.snapshot("chain/0").unwrap()).await.unwrap_err();
        assert!(matches!(err, Error::DepthExceeded { depth: 3, .. }));

        let deep = DataLink::new(LinkConfig::new(Arc::new(store.clone())).with_max_depth(5));
        assert!(deep.map_document(&store.snapshot("chain/0").unwrap()).await.is_ok());
    }

    #[tokio::test]
    async fn test_failed_reference_aborts_document() {
        let store = MemoryStore::new();
        store.insert("users/2", [("name", Value::from("Grace"))]).unwrap();
        store.insert("users/3", [("name", Value::from("Linus"))]).unwrap();
        store.fail_next_read("users/3", "timeout");
        let link = link_over(&store);
        let snap = Snapshot::new(path("users/1"), BTreeMap::new())
            .with_field("a", DocumentRef::parse("users/2").unwrap())
            .with_field("b", DocumentRef::parse("users/3").unwrap());

        let err = link.map_document(&snap).await.unwrap_err();
        assert!(matches!(err, Error::Read { ref path, .. } if path.as_str() == "users/3"));
    }

    #[tokio::test]
    async fn test_map_query_maps_docs_and_changes() {
        let store = MemoryStore::new();
        store.insert("users/2", [("name", Value::from("Grace"))]).unwrap();
        store.insert("posts/a", [("author", reference("users/2"))]).unwrap();
        store.insert("posts/b", [("author", reference("users/2"))]).unwrap();
        let link = link_over(&store);

        let raw = link
            .fetch_query(store.collection_query("posts").as_ref())
            .await
            .unwrap();
        let mapped = link.map_query(&raw).await.unwrap();

        assert_eq!(mapped.len(), 2);
        assert_eq!(mapped.changes().len(), 2);
        for doc in mapped.docs() {
            let author = doc.get("author").and_then(Field::as_document).unwrap();
            assert_eq!(author.id(), Some("2"));
        }
        assert_eq!(mapped.changes()[0].doc, mapped.docs()[0]);
    }
}
