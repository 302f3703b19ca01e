//! Lazily discovered backend capabilities
//!
//! Each [`Feature`] starts as [`CapabilityFlag::Unknown`] and resolves on the
//! first definitive server response. Resolved flags never change again for
//! the lifetime of the session, so a backend without an endpoint costs at
//! most one failing round-trip per feature.

use crate::types::Feature;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::{info, warn};

/// Tri-state support flag for one feature.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CapabilityFlag {
    /// No definitive response seen yet
    #[default]
    Unknown,
    /// The backend implements the feature
    Supported,
    /// The backend lacks the feature; operate local-only
    Unsupported,
}

impl CapabilityFlag {
    /// Whether the flag has left `Unknown`
    #[must_use]
    pub fn is_resolved(&self) -> bool {
        !matches!(self, Self::Unknown)
    }

    /// Whether remote calls for the feature may still be attempted
    #[must_use]
    pub fn allows_remote(&self) -> bool {
        !matches!(self, Self::Unsupported)
    }
}

/// What a single server response says about a feature.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProbeOutcome {
    /// The endpoint answered meaningfully
    ConfirmedSupported,
    /// The endpoint does not exist
    ConfirmedUnsupported,
    /// Network or server failure; says nothing about the feature
    Inconclusive,
}

/// All flags at a point in time, for rendering.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CapabilitySnapshot {
    /// Like endpoint support
    pub like: CapabilityFlag,
    /// Dislike endpoint support
    pub dislike: CapabilityFlag,
    /// Comments endpoint support
    pub comments: CapabilityFlag,
}

impl CapabilitySnapshot {
    /// Flag for a single feature
    #[must_use]
    pub fn get(&self, feature: Feature) -> CapabilityFlag {
        match feature {
            Feature::Like => self.like,
            Feature::Dislike => self.dislike,
            Feature::Comments => self.comments,
        }
    }
}

/// Session-scoped registry of capability flags.
#[derive(Debug, Default)]
pub struct CapabilityRegistry {
    flags: RwLock<HashMap<Feature, CapabilityFlag>>,
}

impl CapabilityRegistry {
    /// Create a registry with every feature unknown
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a registry with some features already resolved.
    ///
    /// `Unknown` presets are ignored.
    pub fn with_presets<'a>(presets: impl IntoIterator<Item = (&'a Feature, &'a CapabilityFlag)>) -> Self {
        let flags = presets
            .into_iter()
            .filter(|(_, flag)| flag.is_resolved())
            .map(|(feature, flag)| (*feature, *flag))
            .collect();
        Self {
            flags: RwLock::new(flags),
        }
    }

    /// Current flag for a feature. Never mutates.
    pub fn probe(&self, feature: Feature) -> CapabilityFlag {
        self.flags.read().get(&feature).copied().unwrap_or_default()
    }

    /// Fold a server outcome into the registry and return the resulting flag.
    ///
    /// Only confirmed outcomes move a flag away from `Unknown`; a resolved
    /// flag is never changed, even by a contradicting outcome.
    pub fn record_outcome(&self, feature: Feature, outcome: ProbeOutcome) -> CapabilityFlag {
        let resolved = match outcome {
            ProbeOutcome::ConfirmedSupported => CapabilityFlag::Supported,
            ProbeOutcome::ConfirmedUnsupported => CapabilityFlag::Unsupported,
            ProbeOutcome::Inconclusive => return self.probe(feature),
        };

        let mut flags = self.flags.write();
        let current = flags.entry(feature).or_default();
        match *current {
            CapabilityFlag::Unknown => {
                *current = resolved;
                info!(feature = %feature, flag = ?resolved, "Backend capability resolved");
            }
            existing if existing != resolved => {
                warn!(
                    feature = %feature,
                    existing = ?existing,
                    observed = ?resolved,
                    "Ignoring outcome that contradicts resolved capability"
                );
            }
            _ => {}
        }
        *current
    }

    /// All flags at once
    pub fn snapshot(&self) -> CapabilitySnapshot {
        CapabilitySnapshot {
            like: self.probe(Feature::Like),
            dislike: self.probe(Feature::Dislike),
            comments: self.probe(Feature::Comments),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_starts_unknown() {
        let registry = CapabilityRegistry::new();
        for feature in Feature::ALL {
            assert_eq!(registry.probe(feature), CapabilityFlag::Unknown);
        }
    }

    #[test]
    fn test_inconclusive_leaves_flag_untouched() {
        let registry = CapabilityRegistry::new();
        let flag = registry.record_outcome(Feature::Like, ProbeOutcome::Inconclusive);
        assert_eq!(flag, CapabilityFlag::Unknown);

        registry.record_outcome(Feature::Like, ProbeOutcome::ConfirmedSupported);
        let flag = registry.record_outcome(Feature::Like, ProbeOutcome::Inconclusive);
        assert_eq!(flag, CapabilityFlag::Supported);
    }

    #[test]
    fn test_resolved_flags_are_sticky() {
        let registry = CapabilityRegistry::new();
        registry.record_outcome(Feature::Comments, ProbeOutcome::ConfirmedUnsupported);
        let flag = registry.record_outcome(Feature::Comments, ProbeOutcome::ConfirmedSupported);
        assert_eq!(flag, CapabilityFlag::Unsupported);

        registry.record_outcome(Feature::Like, ProbeOutcome::ConfirmedSupported);
        let flag = registry.record_outcome(Feature::Like, ProbeOutcome::ConfirmedUnsupported);
        assert_eq!(flag, CapabilityFlag::Supported);
    }

    #[test]
    fn test_features_resolve_independently() {
        let registry = CapabilityRegistry::new();
        registry.record_outcome(Feature::Like, ProbeOutcome::ConfirmedUnsupported);

        let snapshot = registry.snapshot();
        assert_eq!(snapshot.like, CapabilityFlag::Unsupported);
        assert_eq!(snapshot.get(Feature::Dislike), CapabilityFlag::Unknown);
        assert_eq!(snapshot.get(Feature::Comments), CapabilityFlag::Unknown);
    }

    #[test]
    fn test_presets_skip_unknown() {
        let presets: HashMap<Feature, CapabilityFlag> = [
            (Feature::Comments, CapabilityFlag::Unsupported),
            (Feature::Like, CapabilityFlag::Unknown),
        ]
        .into_iter()
        .collect();
        let registry = CapabilityRegistry::with_presets(&presets);

        assert_eq!(registry.probe(Feature::Comments), CapabilityFlag::Unsupported);
        assert_eq!(registry.probe(Feature::Like), CapabilityFlag::Unknown);
        assert!(!registry.probe(Feature::Comments).allows_remote());
    }
}
