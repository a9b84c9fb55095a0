//! Fetch cache and reference resolution for doclink
//!
//! This crate holds the one-shot read path:
//! - DataLink: per-path TTL cache with in-flight request deduplication
//! - Mapper: recursive reference resolution (`DataLink::map_document`)
//! - Reference / QueryReference: user-facing handles
//! - Projection: observable, identity-stable view of a handle's document
//! - LinkConfig / LinkSettings: configuration
//! - MemoryStore: in-memory implementation of the store contracts
//!
//! The link is the only component that touches the cache tables; handles
//! and subscriptions go through it.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod config;
pub mod link;
pub mod mapper;
pub mod memory;
pub mod projection;
pub mod reference;

pub use config::{
    LinkConfig, LinkSettings, CONFIG_FILE_NAME, DEFAULT_EXPIRES_MS, DEFAULT_KEYNAME,
    DEFAULT_MAX_DEPTH,
};
pub use link::{CacheEntry, CacheStats, DataLink};
pub use memory::{MemoryQuery, MemoryStore};
pub use projection::{Projection, ProjectionObserver};
pub use reference::{QueryReference, Reference};
