//! Host property tables
//!
//! Plugins expose themselves by defining a named property on whatever
//! object the host application shares with its consumers. `PropertyHost`
//! is that seam; `PropertyTable` is a plain map-backed implementation.

use crate::plugin::StreamPlugin;
use doclink_core::{Error, Result};
use doclink_engine::DataLink;
use std::collections::BTreeMap;

/// Value a plugin defines on its host
#[derive(Debug, Clone)]
pub enum HostProperty {
    /// Shared fetch cache and mapper
    Link(DataLink),
    /// Scope factory for live subscriptions
    Streams(StreamPlugin),
}

impl HostProperty {
    /// The link, if this property holds one
    pub fn as_link(&self) -> Option<&DataLink> {
        match self {
            HostProperty::Link(link) => Some(link),
            HostProperty::Streams(_) => None,
        }
    }

    /// The stream plugin, if this property holds one
    pub fn as_streams(&self) -> Option<&StreamPlugin> {
        match self {
            HostProperty::Streams(plugin) => Some(plugin),
            HostProperty::Link(_) => None,
        }
    }
}

/// Object that plugins install named properties on
pub trait PropertyHost {
    /// Define `key`; fails if the key is already defined
    fn define(&mut self, key: &str, property: HostProperty) -> Result<()>;

    /// Look up a defined property
    fn property(&self, key: &str) -> Option<&HostProperty>;
}

/// Map-backed `PropertyHost`
#[derive(Debug, Default)]
pub struct PropertyTable {
    properties: BTreeMap<String, HostProperty>,
}

impl PropertyTable {
    /// Empty table
    pub fn new() -> Self {
        Self::default()
    }

    /// Defined keys, sorted
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.properties.keys().map(String::as_str)
    }

    /// The link defined under `key`
    pub fn link(&self, key: &str) -> Option<&DataLink> {
        self.property(key).and_then(HostProperty::as_link)
    }

    /// The stream plugin defined under `key`
    pub fn streams(&self, key: &str) -> Option<&StreamPlugin> {
        self.property(key).and_then(HostProperty::as_streams)
    }
}

impl PropertyHost for PropertyTable {
    fn define(&mut self, key: &str, property: HostProperty) -> Result<()> {
        if self.properties.contains_key(key) {
            return Err(Error::config(format!("property {key} is already defined")));
        }
        self.properties.insert(key.to_string(), property);
        Ok(())
    }

    fn property(&self, key: &str) -> Option<&HostProperty> {
        self.properties.get(key)
    }
}
