//! Link and stream plugins
//!
//! `LinkPlugin` puts one `DataLink` on the host so every consumer shares the
//! same cache. `StreamPlugin` puts a scope factory there instead: each
//! consumer asks it for a `StreamScope` when it is created and tears the
//! scope down when it is destroyed.

use crate::host::{HostProperty, PropertyHost};
use doclink_core::{DocumentStore, Result};
use doclink_engine::{DataLink, LinkConfig};
use doclink_stream::StreamScope;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, info};

/// Default property name for the stream plugin
pub const DEFAULT_STREAM_KEYNAME: &str = "$firestream";

/// Exposes a shared `DataLink` on a host
#[derive(Debug, Clone)]
pub struct LinkPlugin {
    link: DataLink,
    keyname: String,
}

impl LinkPlugin {
    /// Build the link from `config`; the property name is the config's keyname
    pub fn new(config: LinkConfig) -> Self {
        let keyname = config.keyname().to_string();
        Self {
            link: DataLink::new(config),
            keyname,
        }
    }

    /// The shared link
    pub fn link(&self) -> &DataLink {
        &self.link
    }

    /// Property name the link is installed under
    pub fn keyname(&self) -> &str {
        &self.keyname
    }

    /// Define the link on `host`
    ///
    /// # Errors
    ///
    /// `Error::Config` if the keyname is already taken.
    pub fn install(&self, host: &mut dyn PropertyHost) -> Result<()> {
        host.define(&self.keyname, HostProperty::Link(self.link.clone()))?;
        info!(target: "doclink::plugin", keyname = %self.keyname, "Link installed");
        Ok(())
    }
}

struct StreamPluginInner {
    store: Arc<dyn DocumentStore>,
    link: DataLink,
    keyname: String,
    next_scope: AtomicU64,
}

/// Hands out per-consumer subscription scopes
///
/// Cheap to clone; clones share the scope counter.
#[derive(Clone)]
pub struct StreamPlugin {
    inner: Arc<StreamPluginInner>,
}

impl StreamPlugin {
    /// Plugin over `store`, mapping pushes through `link`
    pub fn new(store: Arc<dyn DocumentStore>, link: DataLink) -> Self {
        Self {
            inner: Arc::new(StreamPluginInner {
                store,
                link,
                keyname: DEFAULT_STREAM_KEYNAME.to_string(),
                next_scope: AtomicU64::new(1),
            }),
        }
    }

    /// Same plugin under another property name
    pub fn with_keyname(self, keyname: impl Into<String>) -> Self {
        Self {
            inner: Arc::new(StreamPluginInner {
                store: Arc::clone(&self.inner.store),
                link: self.inner.link.clone(),
                keyname: keyname.into(),
                next_scope: AtomicU64::new(self.inner.next_scope.load(Ordering::Relaxed)),
            }),
        }
    }

    /// Property name the plugin is installed under
    pub fn keyname(&self) -> &str {
        &self.inner.keyname
    }

    /// Link whose mapper is applied to pushes
    pub fn link(&self) -> &DataLink {
        &self.inner.link
    }

    /// Fresh, empty scope for one consumer
    pub fn scope(&self) -> StreamScope {
        let id = self.inner.next_scope.fetch_add(1, Ordering::Relaxed);
        debug!(target: "doclink::plugin", scope = id, "Scope created");
        StreamScope::new(id, Arc::clone(&self.inner.store), self.inner.link.clone())
    }

    /// Define the scope factory on `host`
    ///
    /// # Errors
    ///
    /// `Error::Config` if the keyname is already taken.
    pub fn install(&self, host: &mut dyn PropertyHost) -> Result<()> {
        host.define(self.keyname(), HostProperty::Streams(self.clone()))?;
        info!(target: "doclink::plugin", keyname = %self.keyname(), "Streams installed");
        Ok(())
    }
}

impl fmt::Debug for StreamPlugin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StreamPlugin")
            .field("keyname", &self.inner.keyname)
            .finish_non_exhaustive()
    }
}
