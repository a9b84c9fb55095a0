//! Raw read results from the document store
//!
//! A `Snapshot` is what a single document read returns: an existence flag,
//! the path (and thereby the id), and the field bag. Fields may still hold
//! reference markers; see `MappedValue` for the resolved form.

use crate::path::DocPath;
use crate::value::Value;
use std::collections::BTreeMap;

/// Result of a single document read
#[derive(Debug, Clone, PartialEq)]
pub struct Snapshot {
    path: DocPath,
    exists: bool,
    fields: BTreeMap<String, Value>,
}

impl Snapshot {
    /// Snapshot of an existing document
    pub fn new(path: DocPath, fields: BTreeMap<String, Value>) -> Self {
        Self {
            path,
            exists: true,
            fields,
        }
    }

    /// Snapshot of a document that does not exist
    pub fn missing(path: DocPath) -> Self {
        Self {
            path,
            exists: false,
            fields: BTreeMap::new(),
        }
    }

    /// Builder-style field insertion
    pub fn with_field(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.fields.insert(key.into(), value.into());
        self
    }

    /// Document path
    pub fn path(&self) -> &DocPath {
        &self.path
    }

    /// Document id (last path segment)
    pub fn id(&self) -> &str {
        self.path.id()
    }

    /// Whether the document exists
    pub fn exists(&self) -> bool {
        self.exists
    }

    /// Field bag
    pub fn fields(&self) -> &BTreeMap<String, Value> {
        &self.fields
    }

    /// Single field lookup
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.fields.get(key)
    }

    /// Iterate over fields holding reference markers
    pub fn references(&self) -> impl Iterator<Item = (&str, &DocPath)> {
        self.fields
            .iter()
            .filter_map(|(key, value)| value.as_reference().map(|r| (key.as_str(), r.path())))
    }
}

/// Kind of change carried by a `DocumentChange`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChangeKind {
    /// Document entered the result set
    Added,
    /// Document in the result set changed
    Modified,
    /// Document left the result set
    Removed,
}

/// One entry of a query result's change list
#[derive(Debug, Clone, PartialEq)]
pub struct DocumentChange {
    /// What happened
    pub kind: ChangeKind,
    /// Position before the change (`None` for `Added`)
    pub old_index: Option<usize>,
    /// Position after the change (`None` for `Removed`)
    pub new_index: Option<usize>,
    /// Affected document
    pub doc: Snapshot,
}

/// Result of a query execution or a query push
#[derive(Debug, Clone, PartialEq, Default)]
pub struct QuerySnapshot {
    /// Documents currently in the result set
    pub docs: Vec<Snapshot>,
    /// Changes since the previous result
    pub changes: Vec<DocumentChange>,
}

impl QuerySnapshot {
    /// Build a snapshot whose change list marks every document as added
    pub fn initial(docs: Vec<Snapshot>) -> Self {
        let changes = docs
            .iter()
            .enumerate()
            .map(|(index, doc)| DocumentChange {
                kind: ChangeKind::Added,
                old_index: None,
                new_index: Some(index),
                doc: doc.clone(),
            })
            .collect();
        Self { docs, changes }
    }

    /// Number of documents
    pub fn len(&self) -> usize {
        self.docs.len()
    }

    /// Whether the result set is empty
    pub fn is_empty(&self) -> bool {
        self.docs.is_empty()
    }
}
