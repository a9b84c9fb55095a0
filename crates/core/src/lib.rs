//! Core types and traits for doclink
//!
//! This crate defines the foundational types used throughout the system:
//! - DocPath / DocumentRef / PathRef: document addressing and reference markers
//! - Value: field values, including reference markers
//! - Snapshot / QuerySnapshot: raw store read results
//! - MappedValue / MappedQuerySnapshot: resolved, frozen consumer views
//! - Error: error type hierarchy
//! - Clock: millisecond time source for cache freshness
//! - Traits: store collaborator contracts (DocumentSource, Query, DocumentStore)
//! - Stored<T>: typed decoding of mapped documents

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod clock;
pub mod error;
pub mod mapped;
pub mod model;
pub mod path;
pub mod snapshot;
pub mod traits;
pub mod value;

pub use clock::{Clock, ManualClock, SystemClock};
pub use error::{Error, Result};
pub use mapped::{
    Field, MappedDocument, MappedDocumentChange, MappedQuerySnapshot, MappedValue, BLANK_KEY,
    ID_KEY,
};
pub use model::Stored;
pub use path::{DocPath, DocumentRef, PathRef, PATH_SEPARATOR};
pub use snapshot::{ChangeKind, DocumentChange, QuerySnapshot, Snapshot};
pub use traits::{
    DocumentCallback, DocumentSource, DocumentStore, ListenOptions, ListenerRegistration, Query,
    QueryCallback, QueryRef,
};
pub use value::Value;

pub use futures_util::future::BoxFuture;
