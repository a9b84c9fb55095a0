//! doclink - cached, reference-resolving access to document stores
//!
//! doclink sits between an application and a document database. It gives
//! consumers three things:
//!
//! - one-shot reads through a per-path TTL cache that collapses concurrent
//!   requests for the same path into a single store read
//! - a mapper that replaces reference fields with the documents they point
//!   at, recursively
//! - live document and query subscriptions, grouped into per-consumer
//!   scopes that tear down together
//!
//! # Quick Start
//!
//! ```ignore
//! use doclink::{DataLink, LinkConfig, MemoryStore};
//!
//! let store = MemoryStore::new();
//! let link = DataLink::new(LinkConfig::new(Arc::new(store.clone())).with_expires(1000));
//!
//! let user = link.reference("users/1")?;
//! let fields = user.fetch().await?;
//! ```
//!
//! # Architecture
//!
//! - `doclink-core`: paths, values, snapshots, errors, store traits
//! - `doclink-engine`: the cache (`DataLink`), mapper, handles, config
//! - `doclink-stream`: subscriptions and scopes
//! - `doclink-api`: host plugins

pub use doclink_api::*;
pub use doclink_core::*;
pub use doclink_engine::*;
pub use doclink_stream::*;
