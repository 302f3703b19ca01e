//! Engine configuration
//!
//! Configuration can be built in code, loaded from TOML and overridden from
//! `LICHTBLICK_*` environment variables:
//!
//! ```toml
//! opposing_clear = "awaited"
//! max_comment_chars = 2000
//! anonymous_author = "Gast"
//!
//! [capability_presets]
//! comments = "unsupported"
//! ```

use crate::capability::CapabilityFlag;
use crate::errors::{SyncError, SyncResult};
use crate::types::Feature;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Prefix for environment overrides
pub const ENV_PREFIX: &str = "LICHTBLICK_";

/// How the best-effort clear of an opposing remote reaction is issued.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OpposingClearPolicy {
    /// Spawn it in the background; the toggle returns without waiting
    #[default]
    Detached,
    /// Issue it inline before the toggle returns; failures are still ignored
    Awaited,
}

/// Sync engine configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    /// Opposing-reaction clear strategy
    pub opposing_clear: OpposingClearPolicy,

    /// Maximum comment length in characters, after trimming
    pub max_comment_chars: usize,

    /// Author shown for comments submitted without a name
    pub anonymous_author: String,

    /// Capabilities known up front (e.g. a deployment without comments)
    pub capability_presets: BTreeMap<Feature, CapabilityFlag>,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            opposing_clear: OpposingClearPolicy::Detached,
            max_comment_chars: 4096,
            anonymous_author: "Unknown".to_string(),
            capability_presets: BTreeMap::new(),
        }
    }
}

impl SyncConfig {
    /// Create a configuration builder
    pub fn builder() -> SyncConfigBuilder {
        SyncConfigBuilder::default()
    }

    /// Parse and validate a TOML document
    pub fn from_toml_str(source: &str) -> SyncResult<Self> {
        let config: Self = toml::from_str(source)
            .map_err(|e| SyncError::config(format!("invalid TOML: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    /// Apply `LICHTBLICK_*` overrides from the process environment
    pub fn merge_with_env(&mut self) -> SyncResult<()> {
        self.apply_overrides(std::env::vars())
    }

    /// Apply `LICHTBLICK_*` overrides from key/value pairs.
    ///
    /// Recognised keys: `OPPOSING_CLEAR`, `MAX_COMMENT_CHARS`,
    /// `ANONYMOUS_AUTHOR` and `CAPABILITY_<FEATURE>`. Other keys with the
    /// prefix are rejected; keys without it are ignored.
    pub fn apply_overrides<K, V>(&mut self, vars: impl IntoIterator<Item = (K, V)>) -> SyncResult<()>
    where
        K: AsRef<str>,
        V: AsRef<str>,
    {
        for (key, value) in vars {
            let Some(key) = key.as_ref().strip_prefix(ENV_PREFIX) else {
                continue;
            };
            let value = value.as_ref().trim();
            match key {
                "OPPOSING_CLEAR" => {
                    self.opposing_clear = match value.to_ascii_lowercase().as_str() {
                        "detached" => OpposingClearPolicy::Detached,
                        "awaited" => OpposingClearPolicy::Awaited,
                        other => {
                            return Err(SyncError::config(format!(
                                "unknown opposing clear policy `{other}`"
                            )))
                        }
                    };
                }
                "MAX_COMMENT_CHARS" => {
                    self.max_comment_chars = value.parse().map_err(|e| {
                        SyncError::config(format!("MAX_COMMENT_CHARS `{value}`: {e}"))
                    })?;
                }
                "ANONYMOUS_AUTHOR" => self.anonymous_author = value.to_string(),
                other => {
                    let feature = other
                        .strip_prefix("CAPABILITY_")
                        .ok_or_else(|| SyncError::config(format!("unknown key {ENV_PREFIX}{other}")))?
                        .parse::<Feature>()
                        .map_err(SyncError::config)?;
                    let flag = match value.to_ascii_lowercase().as_str() {
                        "supported" => CapabilityFlag::Supported,
                        "unsupported" => CapabilityFlag::Unsupported,
                        "unknown" => CapabilityFlag::Unknown,
                        other => {
                            return Err(SyncError::config(format!(
                                "unknown capability flag `{other}`"
                            )))
                        }
                    };
                    self.capability_presets.insert(feature, flag);
                }
            }
        }
        self.validate()
    }

    /// Check value ranges
    pub fn validate(&self) -> SyncResult<()> {
        if self.max_comment_chars == 0 {
            return Err(SyncError::config("max_comment_chars must be positive"));
        }
        if self.anonymous_author.trim().is_empty() {
            return Err(SyncError::config("anonymous_author must not be blank"));
        }
        Ok(())
    }
}

/// Builder for [`SyncConfig`]
#[derive(Debug, Default)]
pub struct SyncConfigBuilder {
    config: SyncConfig,
}

impl SyncConfigBuilder {
    /// Set the opposing clear policy
    pub fn opposing_clear(mut self, policy: OpposingClearPolicy) -> Self {
        self.config.opposing_clear = policy;
        self
    }

    /// Set the maximum comment length
    pub fn max_comment_chars(mut self, max: usize) -> Self {
        self.config.max_comment_chars = max;
        self
    }

    /// Set the fallback author name
    pub fn anonymous_author(mut self, author: impl Into<String>) -> Self {
        self.config.anonymous_author = author.into();
        self
    }

    /// Declare a capability as known up front
    pub fn capability(mut self, feature: Feature, flag: CapabilityFlag) -> Self {
        self.config.capability_presets.insert(feature, flag);
        self
    }

    /// Validate and build
    pub fn build(self) -> SyncResult<SyncConfig> {
        self.config.validate()?;
        Ok(self.config)
    }
}
