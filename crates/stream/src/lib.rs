//! Live subscriptions for doclink
//!
//! This crate keeps consumers current with the store:
//! - DocumentSubscription / QuerySubscription: push feeds whose updates are
//!   mapped (references resolved) before delivery
//! - StreamScope: per-consumer subscription set with bulk teardown
//! - SubscriptionEvent / SubscriptionStream: what observers receive
//!
//! Subscriptions need a tokio runtime: each one runs a small task that maps
//! pushes in arrival order.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod document;
pub mod event;
mod feed;
pub mod query;
pub mod scope;

pub use document::DocumentSubscription;
pub use event::{SubscriptionEvent, SubscriptionStream};
pub use query::QuerySubscription;
pub use scope::StreamScope;
