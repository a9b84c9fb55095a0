//! Typed views over mapped documents
//!
//! `Stored<T>` is either a blank placeholder or an existing document whose
//! fields decode into `T` through serde. Decoding from a `MappedValue`
//! sees resolved references as nested objects; decoding straight from a
//! `Snapshot` is shallow and sees references as path strings.

use crate::error::{Error, Result};
use crate::mapped::{MappedValue, BLANK_KEY, ID_KEY};
use crate::snapshot::Snapshot;
use serde::de::DeserializeOwned;

/// A document that may not exist yet
#[derive(Debug, Clone, PartialEq)]
pub enum Stored<T> {
    /// Nothing stored (or not fetched yet)
    Blank,
    /// Stored document
    Document {
        /// Document id
        id: String,
        /// Decoded fields
        value: T,
    },
}

impl<T> Stored<T> {
    /// Placeholder used before the first fetch
    pub fn placeholder() -> Self {
        Stored::Blank
    }

    /// Whether this is a blank placeholder
    pub fn is_blank(&self) -> bool {
        matches!(self, Stored::Blank)
    }

    /// Document id, `None` when blank
    pub fn id(&self) -> Option<&str> {
        match self {
            Stored::Blank => None,
            Stored::Document { id, .. } => Some(id),
        }
    }

    /// Decoded fields, `None` when blank
    pub fn value(&self) -> Option<&T> {
        match self {
            Stored::Blank => None,
            Stored::Document { value, .. } => Some(value),
        }
    }
}

impl<T: DeserializeOwned> Stored<T> {
    /// Decode a mapped value, with resolved references as nested objects
    ///
    /// # Errors
    ///
    /// Returns `Error::Decode` if the fields do not match `T`.
    pub fn from_mapped(mapped: &MappedValue) -> Result<Self> {
        let Some(id) = mapped.id() else {
            return Ok(Stored::Blank);
        };
        let mut object = match mapped.to_json() {
            serde_json::Value::Object(object) => object,
            other => return Err(Error::Decode(format!("expected object, got {other}"))),
        };
        object.remove(BLANK_KEY);
        object.remove(ID_KEY);
        let value = serde_json::from_value(serde_json::Value::Object(object))?;
        Ok(Stored::Document {
            id: id.to_string(),
            value,
        })
    }

    /// Decode a raw snapshot without resolving references
    ///
    /// # Errors
    ///
    /// Returns `Error::Decode` if the fields do not match `T`.
    pub fn from_document(snapshot: &Snapshot) -> Result<Self> {
        if !snapshot.exists() {
            return Ok(Stored::Blank);
        }
        let object = snapshot
            .fields()
            .iter()
            .map(|(k, v)| (k.clone(), v.to_json()))
            .collect();
        let value = serde_json::from_value(serde_json::Value::Object(object))?;
        Ok(Stored::Document {
            id: snapshot.id().to_string(),
            value,
        })
    }
}
