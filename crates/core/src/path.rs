//! Document paths and reference markers
//!
//! - `DocPath`: validated slash-separated document path (`users/1`)
//! - `DocumentRef`: reference marker stored inside a document's fields
//! - `PathRef`: "a path string or an existing reference", normalized once

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Path separator used by document paths
pub const PATH_SEPARATOR: char = '/';

/// Validated document path
///
/// ## Invariants
///
/// - Never empty
/// - No empty segments (`a//b`, leading or trailing `/` are rejected)
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct DocPath(String);

impl DocPath {
    /// Parse and validate a path
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidPath` for empty paths or empty segments.
    pub fn new(raw: impl Into<String>) -> Result<Self> {
        let raw = raw.into();
        if raw.is_empty() || raw.split(PATH_SEPARATOR).any(str::is_empty) {
            return Err(Error::InvalidPath(raw));
        }
        Ok(DocPath(raw))
    }

    /// Full path as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Last segment of the path
    pub fn id(&self) -> &str {
        self.0.rsplit(PATH_SEPARATOR).next().unwrap_or(&self.0)
    }

    /// Path without its last segment, if any
    ///
    /// For a document path this is the collection it lives in.
    pub fn parent(&self) -> Option<&str> {
        self.0.rsplit_once(PATH_SEPARATOR).map(|(parent, _)| parent)
    }

    /// Iterate over the path segments
    pub fn segments(&self) -> impl Iterator<Item = &str> {
        self.0.split(PATH_SEPARATOR)
    }

    /// Append a segment, producing a child path
    pub fn child(&self, segment: &str) -> Result<Self> {
        DocPath::new(format!("{}{}{}", self.0, PATH_SEPARATOR, segment))
    }
}

impl fmt::Display for DocPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for DocPath {
    type Error = Error;

    fn try_from(raw: String) -> Result<Self> {
        DocPath::new(raw)
    }
}

impl TryFrom<&str> for DocPath {
    type Error = Error;

    fn try_from(raw: &str) -> Result<Self> {
        DocPath::new(raw)
    }
}

impl From<DocPath> for String {
    fn from(path: DocPath) -> Self {
        path.0
    }
}

impl AsRef<str> for DocPath {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Reference marker pointing at another document
///
/// Appears inside a snapshot's field bag. It is a pointer, never data;
/// the mapper replaces it with the mapped form of its target.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DocumentRef {
    path: DocPath,
}

impl DocumentRef {
    /// Reference the document at `path`
    pub fn new(path: DocPath) -> Self {
        Self { path }
    }

    /// Parse `raw` and reference it
    pub fn parse(raw: &str) -> Result<Self> {
        DocPath::new(raw).map(Self::new)
    }

    /// Target path
    pub fn path(&self) -> &DocPath {
        &self.path
    }

    /// Target document id
    pub fn id(&self) -> &str {
        self.path.id()
    }
}

impl From<DocPath> for DocumentRef {
    fn from(path: DocPath) -> Self {
        DocumentRef::new(path)
    }
}

/// Addressing input accepted by handles and subscriptions
///
/// Normalized to a `DocPath` once, at construction of whatever consumes it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PathRef {
    /// Raw, unvalidated path string
    Path(String),
    /// Already-built reference
    Existing(DocumentRef),
}

impl PathRef {
    /// Normalize to a validated path
    pub fn into_path(self) -> Result<DocPath> {
        match self {
            PathRef::Path(raw) => DocPath::new(raw),
            PathRef::Existing(reference) => Ok(reference.path),
        }
    }
}

impl From<&str> for PathRef {
    fn from(raw: &str) -> Self {
        PathRef::Path(raw.to_string())
    }
}

impl From<String> for PathRef {
    fn from(raw: String) -> Self {
        PathRef::Path(raw)
    }
}

impl From<DocumentRef> for PathRef {
    fn from(reference: DocumentRef) -> Self {
        PathRef::Existing(reference)
    }
}

impl From<&DocumentRef> for PathRef {
    fn from(reference: &DocumentRef) -> Self {
        PathRef::Existing(reference.clone())
    }
}

impl From<DocPath> for PathRef {
    fn from(path: DocPath) -> Self {
        PathRef::Existing(DocumentRef::new(path))
    }
}

impl From<&DocPath> for PathRef {
    fn from(path: &DocPath) -> Self {
        PathRef::Existing(DocumentRef::new(path.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_id_is_last_segment() {
        let path = DocPath::new("users/1/posts/abc").unwrap();
        assert_eq!(path.id(), "abc");
        assert_eq!(path.parent(), Some("users/1/posts"));
    }

    #[test]
    fn test_single_segment() {
        let path = DocPath::new("root").unwrap();
        assert_eq!(path.id(), "root");
        assert_eq!(path.parent(), None);
    }

    #[test]
    fn test_rejects_empty_segments() {
        assert!(DocPath::new("").is_err());
        assert!(DocPath::new("users//1").is_err());
        assert!(DocPath::new("/users/1").is_err());
        assert!(DocPath::new("users/1/").is_err());
    }

    #[test]
    fn test_child() {
        let path = DocPath::new("users").unwrap().child("7").unwrap();
        assert_eq!(path.as_str(), "users/7");
        assert!(path.child("").is_err());
    }

    #[test]
    fn test_path_ref_normalizes() {
        let from_str: PathRef = "users/2".into();
        let from_ref: PathRef = DocumentRef::parse("users/2").unwrap().into();
        assert_eq!(from_str.into_path().unwrap(), from_ref.into_path().unwrap());
    }

    #[test]
    fn test_path_ref_rejects_bad_string() {
        let bad: PathRef = "a//b".into();
        assert!(matches!(bad.into_path(), Err(Error::InvalidPath(_))));
    }

    #[test]
    fn test_serde_roundtrip_validates() {
        let json = serde_json::to_string(&DocPath::new("a/b").unwrap()).unwrap();
        assert_eq!(json, "\"a/b\"");
        assert!(serde_json::from_str::<DocPath>("\"a//b\"").is_err());
    }

    proptest! {
        #[test]
        fn prop_id_matches_last_segment(segments in proptest::collection::vec("[a-z0-9]{1,8}", 1..6)) {
            let raw = segments.join("/");
            let path = DocPath::new(raw).unwrap();
            prop_assert_eq!(path.id(), segments.last().unwrap().as_str());
            prop_assert_eq!(path.segments().count(), segments.len());
        }
    }
}
