//! Link configuration
//!
//! Two layers, same model as the rest of the workspace:
//! - `LinkSettings`: plain serde data, loadable from `doclink.toml` or JSON
//! - `LinkConfig`: runtime configuration carrying the read primitive and
//!   the clock alongside the settings

use doclink_core::{Clock, DocumentSource, Error, Result, SystemClock};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::sync::Arc;

/// Conventional config file name
pub const CONFIG_FILE_NAME: &str = "doclink.toml";

/// Default cache freshness window in milliseconds
pub const DEFAULT_EXPIRES_MS: u64 = 60_000;

/// Default host property name for the link
pub const DEFAULT_KEYNAME: &str = "$firelink";

/// Default bound on reference resolution depth
pub const DEFAULT_MAX_DEPTH: usize = 32;

/// Serializable link settings.
///
/// # Example
///
/// ```toml
/// # Cache freshness window in milliseconds
/// expires = 60000
/// # Property name under which the link is exposed to consumers
/// keyname = "$firelink"
/// # Maximum reference hops resolved below a document
/// max_depth = 32
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct LinkSettings {
    /// Cache freshness window in milliseconds
    #[serde(default = "default_expires", rename = "expires")]
    pub expires_ms: u64,
    /// Host property name
    #[serde(default = "default_keyname")]
    pub keyname: String,
    /// Maximum reference hops resolved below a document
    #[serde(default = "default_max_depth")]
    pub max_depth: usize,
}

fn default_expires() -> u64 {
    DEFAULT_EXPIRES_MS
}

fn default_keyname() -> String {
    DEFAULT_KEYNAME.to_string()
}

fn default_max_depth() -> usize {
    DEFAULT_MAX_DEPTH
}

impl Default for LinkSettings {
    fn default() -> Self {
        Self {
            expires_ms: default_expires(),
            keyname: default_keyname(),
            max_depth: default_max_depth(),
        }
    }
}

impl LinkSettings {
    /// Check invariants the runtime relies on
    ///
    /// # Errors
    ///
    /// Returns `Error::Config` for an empty keyname or a zero depth bound.
    pub fn validate(&self) -> Result<()> {
        if self.keyname.trim().is_empty() {
            return Err(Error::config("keyname must not be empty"));
        }
        if self.max_depth == 0 {
            return Err(Error::config("max_depth must be at least 1"));
        }
        Ok(())
    }

    /// Parse and validate TOML settings
    pub fn from_toml(content: &str) -> Result<Self> {
        let settings: LinkSettings = toml::from_str(content)
            .map_err(|e| Error::config(format!("Failed to parse settings: {}", e)))?;
        settings.validate()?;
        Ok(settings)
    }

    /// Parse and validate JSON settings
    pub fn from_json(content: &str) -> Result<Self> {
        let settings: LinkSettings = serde_json::from_str(content)
            .map_err(|e| Error::config(format!("Failed to parse settings: {}", e)))?;
        settings.validate()?;
        Ok(settings)
    }

    /// Read settings from a TOML file
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            Error::config(format!(
                "Failed to read config file '{}': {}",
                path.display(),
                e
            ))
        })?;
        Self::from_toml(&content)
    }

    /// Render as TOML
    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self)
            .map_err(|e| Error::config(format!("Failed to serialize settings: {}", e)))
    }
}

/// Runtime configuration for a `DataLink`
#[derive(Clone)]
pub struct LinkConfig {
    pub(crate) settings: LinkSettings,
    pub(crate) source: Arc<dyn DocumentSource>,
    pub(crate) clock: Arc<dyn Clock>,
}

impl LinkConfig {
    /// Configuration reading documents through `source`, default settings
    pub fn new(source: Arc<dyn DocumentSource>) -> Self {
        Self {
            settings: LinkSettings::default(),
            source,
            clock: Arc::new(SystemClock::new()),
        }
    }

    /// Configuration from loaded settings
    ///
    /// # Errors
    ///
    /// Returns `Error::Config` if the settings are invalid.
    pub fn from_settings(settings: LinkSettings, source: Arc<dyn DocumentSource>) -> Result<Self> {
        settings.validate()?;
        Ok(Self {
            settings,
            ..Self::new(source)
        })
    }

    /// Set the freshness window
    pub fn with_expires(mut self, expires_ms: u64) -> Self {
        self.settings.expires_ms = expires_ms;
        self
    }

    /// Set the host property name
    pub fn with_keyname(mut self, keyname: impl Into<String>) -> Self {
        self.settings.keyname = keyname.into();
        self
    }

    /// Set the reference depth bound
    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.settings.max_depth = max_depth;
        self
    }

    /// Override the document read primitive
    pub fn with_source(mut self, source: Arc<dyn DocumentSource>) -> Self {
        self.source = source;
        self
    }

    /// Replace the clock
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Settings in effect
    pub fn settings(&self) -> &LinkSettings {
        &self.settings
    }

    /// Freshness window in milliseconds
    pub fn expires_ms(&self) -> u64 {
        self.settings.expires_ms
    }

    /// Host property name
    pub fn keyname(&self) -> &str {
        &self.settings.keyname
    }

    /// Reference depth bound
    pub fn max_depth(&self) -> usize {
        self.settings.max_depth
    }
}

impl fmt::Debug for LinkConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LinkConfig")
            .field("settings", &self.settings)
            .field("clock", &self.clock)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryStore;
    use tempfile::TempDir;

    #[test]
    fn default_settings() {
        let settings = LinkSettings::default();
        assert_eq!(settings.expires_ms, DEFAULT_EXPIRES_MS);
        assert_eq!(settings.keyname, "$firelink");
        assert_eq!(settings.max_depth, DEFAULT_MAX_DEPTH);
    }

    #[test]
    fn parse_toml_uses_expires_name() {
        let settings = LinkSettings::from_toml("expires = 1000\nkeyname = \"$db\"").unwrap();
        assert_eq!(settings.expires_ms, 1000);
        assert_eq!(settings.keyname, "$db");
        assert_eq!(settings.max_depth, DEFAULT_MAX_DEPTH);
    }

    #[test]
    fn parse_json() {
        let settings = LinkSettings::from_json(r#"{"expires": 250}"#).unwrap();
        assert_eq!(settings.expires_ms, 250);
    }

    #[test]
    fn parse_invalid_returns_error() {
        assert!(matches!(
            LinkSettings::from_toml("expires = \"soon\""),
            Err(Error::Config(_))
        ));
        assert!(LinkSettings::from_toml("keyname = \"  \"").is_err());
        assert!(LinkSettings::from_toml("max_depth = 0").is_err());
    }

    #[test]
    fn toml_roundtrip_through_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(CONFIG_FILE_NAME);
        let settings = LinkSettings {
            expires_ms: 5,
            ..LinkSettings::default()
        };
        std::fs::write(&path, settings.to_toml().unwrap()).unwrap();
        assert_eq!(LinkSettings::from_file(&path).unwrap(), settings);
    }

    #[test]
    fn missing_file_is_config_error() {
        let dir = TempDir::new().unwrap();
        let result = LinkSettings::from_file(&dir.path().join("absent.toml"));
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[test]
    fn builder_overrides() {
        let store = MemoryStore::new();
        let config = LinkConfig::new(Arc::new(store))
            .with_expires(1000)
            .with_keyname("$links")
            .with_max_depth(4);
        assert_eq!(config.expires_ms(), 1000);
        assert_eq!(config.keyname(), "$links");
        assert_eq!(config.max_depth(), 4);
    }

    #[test]
    fn from_settings_validates() {
        let store = MemoryStore::new();
        let bad = LinkSettings {
            max_depth: 0,
            ..LinkSettings::default()
        };
        assert!(LinkConfig::from_settings(bad, Arc::new(store)).is_err());
    }
}
