//! Host integration for doclink
//!
//! This crate wires the cache and the live subscriptions into a host
//! application:
//! - **LinkPlugin**: one shared `DataLink` defined under a property name
//!   (default `$firelink`)
//! - **StreamPlugin**: a factory of per-consumer `StreamScope`s defined
//!   under its own property name (default `$firestream`)
//! - **PropertyHost**: the seam both plugins install through
//!
//! ## Lifecycle
//!
//! A consumer calls `StreamPlugin::scope()` when it is created, opens
//! subscriptions through the scope, and calls `StreamScope::teardown()`
//! (or drops the scope) when it is destroyed.
//!
//! ## Quick Start
//!
//! ```ignore
//! use doclink_api::{LinkPlugin, PropertyTable, StreamPlugin};
//!
//! let links = LinkPlugin::new(LinkConfig::new(source));
//! let streams = StreamPlugin::new(store, links.link().clone());
//! let mut host = PropertyTable::new();
//! links.install(&mut host)?;
//! streams.install(&mut host)?;
//!
//! let scope = streams.scope();
//! let user = scope.document("users/1", ListenOptions::default())?;
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod host;
pub mod plugin;

pub use host::{HostProperty, PropertyHost, PropertyTable};
pub use plugin::{LinkPlugin, StreamPlugin, DEFAULT_STREAM_KEYNAME};
