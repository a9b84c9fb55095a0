//! Materialized, consumer-facing documents
//!
//! A `MappedValue` is what consumers see: either `Blank` (the document does
//! not exist) or a frozen document whose reference fields have been replaced
//! by the mapped form of their targets. Documents are shared behind `Arc`
//! and expose no mutating API.

use crate::snapshot::ChangeKind;
use crate::value::Value;
use std::collections::BTreeMap;
use std::sync::Arc;

/// Key under which the blank flag appears in `entries()`
pub const BLANK_KEY: &str = "blank";
/// Key under which the document id appears in `entries()`
pub const ID_KEY: &str = "id";

/// A resolved field
#[derive(Debug, Clone, PartialEq)]
pub enum Field {
    /// Field copied through from the snapshot
    Value(Value),
    /// Resolved reference
    Document(MappedValue),
}

impl Field {
    /// Plain value, if this field was not a reference
    pub fn as_value(&self) -> Option<&Value> {
        match self {
            Field::Value(v) => Some(v),
            Field::Document(_) => None,
        }
    }

    /// Resolved document, if this field was a reference
    pub fn as_document(&self) -> Option<&MappedValue> {
        match self {
            Field::Document(m) => Some(m),
            Field::Value(_) => None,
        }
    }

    /// Plain JSON rendering
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Field::Value(v) => v.to_json(),
            Field::Document(m) => m.to_json(),
        }
    }
}

impl From<Value> for Field {
    fn from(value: Value) -> Self {
        Field::Value(value)
    }
}

impl From<MappedValue> for Field {
    fn from(mapped: MappedValue) -> Self {
        Field::Document(mapped)
    }
}

/// Frozen body of an existing mapped document
#[derive(Debug, PartialEq)]
pub struct MappedDocument {
    id: String,
    fields: BTreeMap<String, Field>,
}

impl MappedDocument {
    /// Document id
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Resolved fields
    pub fn fields(&self) -> &BTreeMap<String, Field> {
        &self.fields
    }
}

/// Fully resolved, immutable document
#[derive(Debug, Clone, PartialEq)]
pub enum MappedValue {
    /// The document does not exist
    Blank,
    /// The document exists
    Document(Arc<MappedDocument>),
}

impl MappedValue {
    /// Freeze an existing document
    pub fn document(id: impl Into<String>, fields: BTreeMap<String, Field>) -> Self {
        MappedValue::Document(Arc::new(MappedDocument {
            id: id.into(),
            fields,
        }))
    }

    /// Whether the document does not exist
    pub fn is_blank(&self) -> bool {
        matches!(self, MappedValue::Blank)
    }

    /// Document id, `None` when blank
    pub fn id(&self) -> Option<&str> {
        match self {
            MappedValue::Blank => None,
            MappedValue::Document(doc) => Some(doc.id()),
        }
    }

    /// Field lookup, `None` when blank or absent
    pub fn get(&self, key: &str) -> Option<&Field> {
        match self {
            MappedValue::Blank => None,
            MappedValue::Document(doc) => doc.fields.get(key),
        }
    }

    /// Resolved fields, `None` when blank
    pub fn fields(&self) -> Option<&BTreeMap<String, Field>> {
        match self {
            MappedValue::Blank => None,
            MappedValue::Document(doc) => Some(&doc.fields),
        }
    }

    /// Consumer view: `blank`, then `id` and every field when not blank
    pub fn entries(&self) -> Vec<(String, Field)> {
        match self {
            MappedValue::Blank => vec![(BLANK_KEY.to_string(), Field::Value(Value::Bool(true)))],
            MappedValue::Document(doc) => {
                let mut entries = Vec::with_capacity(doc.fields.len() + 2);
                entries.push((BLANK_KEY.to_string(), Field::Value(Value::Bool(false))));
                entries.push((ID_KEY.to_string(), Field::Value(Value::String(doc.id.clone()))));
                entries.extend(doc.fields.iter().map(|(k, v)| (k.clone(), v.clone())));
                entries
            }
        }
    }

    /// Plain JSON rendering of `entries()`
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::Value::Object(
            self.entries()
                .into_iter()
                .map(|(k, v)| (k, v.to_json()))
                .collect(),
        )
    }
}

/// Change record whose document has been mapped
#[derive(Debug, Clone, PartialEq)]
pub struct MappedDocumentChange {
    /// What happened
    pub kind: ChangeKind,
    /// Position before the change
    pub old_index: Option<usize>,
    /// Position after the change
    pub new_index: Option<usize>,
    /// Mapped document
    pub doc: MappedValue,
}

/// Query result whose documents and changes have all been mapped
///
/// Both collections are read-only slices.
#[derive(Debug, Clone, PartialEq)]
pub struct MappedQuerySnapshot {
    docs: Arc<[MappedValue]>,
    changes: Arc<[MappedDocumentChange]>,
}

impl MappedQuerySnapshot {
    /// Freeze mapped documents and changes
    pub fn new(docs: Vec<MappedValue>, changes: Vec<MappedDocumentChange>) -> Self {
        Self {
            docs: docs.into(),
            changes: changes.into(),
        }
    }

    /// Mapped documents
    pub fn docs(&self) -> &[MappedValue] {
        &self.docs
    }

    /// Mapped changes
    pub fn changes(&self) -> &[MappedDocumentChange] {
        &self.changes
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

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_blank_entries() {
        let entries = MappedValue::Blank.entries();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].0, BLANK_KEY);
        assert_eq!(MappedValue::Blank.to_json(), json!({"blank": true}));
    }

    #[test]
    fn test_document_json_nests() {
        let inner = MappedValue::document("2", BTreeMap::new());
        let mut fields = BTreeMap::new();
        fields.insert("manager".to_string(), Field::Document(inner));
        fields.insert("name".to_string(), Field::Value(Value::from("Ada")));
        let outer = MappedValue::document("1", fields);

        assert_eq!(
            outer.to_json(),
            json!({
                "blank": false,
                "id": "1",
                "name": "Ada",
                "manager": {"blank": false, "id": "2"}
            })
        );
        assert_eq!(outer.id(), Some("1"));
        assert!(outer.get("manager").unwrap().as_document().is_some());
    }

    #[test]
    fn test_clones_share_body() {
        let doc = MappedValue::document("x", BTreeMap::new());
        let copy = doc.clone();
        match (&doc, &copy) {
            (MappedValue::Document(a), MappedValue::Document(b)) => assert!(Arc::ptr_eq(a, b)),
            _ => panic!("expected documents"),
        }
    }
}
