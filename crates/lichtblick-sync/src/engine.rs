//! # SyncEngine: Session Facade
//!
//! [`SyncEngine`] is the single entry point the UI talks to. It owns the
//! per-session state (capabilities, reactions, comment cache), the backend
//! client and the set of detached background requests.
//!
//! ## Usage
//!
//! ```rust,ignore
//! let engine = SyncEngine::new(client, SyncConfig::default())?;
//! engine.sync_visible_posts(&feed);
//!
//! let outcome = engine.toggle_like(&post_id).await?;
//! let view = engine.comments(&post_id).await;
//! ```
//!
//! Every method takes `&self`; the engine can be shared behind an `Arc` and
//! driven from concurrent UI tasks. Operations on different posts never
//! block each other across an await point.
//!
//! Detached opposing clears run on the ambient Tokio runtime. Under any
//! other executor they are awaited before the toggle returns.

use crate::api::ApiClient;
use crate::capability::{CapabilityFlag, CapabilityRegistry, CapabilitySnapshot};
use crate::comments::{normalize_comment, CacheStatistics, CommentCache, CommentsView, SubmitOutcome};
use crate::config::SyncConfig;
use crate::controller::{OptimisticController, ToggleOutcome};
use crate::errors::SyncResult;
use crate::reactions::{ReactionState, ReactionStore};
use crate::tasks::BackgroundTasks;
use crate::types::{Feature, PostId, ReactionKind};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, info};

/// A post as delivered by the feed, carrying its initial reaction state.
///
/// Deserializes straight from the feed payload; fields the engine does not
/// use are ignored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PostSeed {
    /// Post identifier
    pub id: PostId,
    /// Server-reported reactions
    #[serde(flatten)]
    pub reactions: ReactionState,
}

impl PostSeed {
    /// Seed for a post with the given reactions
    pub fn new(id: impl Into<PostId>, reactions: ReactionState) -> Self {
        Self {
            id: id.into(),
            reactions,
        }
    }
}

/// Shared per-session state.
#[derive(Debug, Default)]
pub struct SyncSession {
    capabilities: Arc<CapabilityRegistry>,
    reactions: ReactionStore,
    comments: CommentCache,
}

impl SyncSession {
    /// Create a session with the given capability registry
    pub fn new(capabilities: CapabilityRegistry) -> Self {
        Self {
            capabilities: Arc::new(capabilities),
            reactions: ReactionStore::new(),
            comments: CommentCache::new(),
        }
    }

    /// Capability registry
    pub fn capabilities(&self) -> &CapabilityRegistry {
        &self.capabilities
    }

    /// Reaction store
    pub fn reactions(&self) -> &ReactionStore {
        &self.reactions
    }

    /// Comment cache
    pub fn comments(&self) -> &CommentCache {
        &self.comments
    }
}

/// Capability-adaptive sync engine over an [`ApiClient`].
pub struct SyncEngine<C: ?Sized> {
    api: Arc<C>,
    session: SyncSession,
    config: SyncConfig,
    background: BackgroundTasks,
}

impl<C: ApiClient + 'static> SyncEngine<C> {
    /// Create an engine that owns `api`
    pub fn new(api: C, config: SyncConfig) -> SyncResult<Self> {
        Self::with_shared_client(Arc::new(api), config)
    }
}

impl<C> SyncEngine<C>
where
    C: ApiClient + ?Sized + 'static,
{
    /// Create an engine over a shared client, e.g. `Arc<dyn ApiClient>`
    pub fn with_shared_client(api: Arc<C>, config: SyncConfig) -> SyncResult<Self> {
        config.validate()?;
        let capabilities = CapabilityRegistry::with_presets(&config.capability_presets);
        info!(
            opposing_clear = ?config.opposing_clear,
            presets = config.capability_presets.len(),
            "Sync engine created"
        );
        Ok(Self {
            api,
            session: SyncSession::new(capabilities),
            config,
            background: BackgroundTasks::new(),
        })
    }

    /// Active configuration
    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    /// Shared session state
    pub fn session(&self) -> &SyncSession {
        &self.session
    }

    // ---- Visible posts ----

    /// Start tracking a post. An already tracked post keeps its state.
    pub fn track_post(&self, seed: &PostSeed) -> ReactionState {
        let initial = ReactionState::new(
            seed.reactions.like_count,
            seed.reactions.is_liked,
            seed.reactions.dislike_count,
            seed.reactions.is_disliked,
        );
        self.session.reactions.track(&seed.id, initial)
    }

    /// Replace the visible set with `seeds`.
    ///
    /// New posts are tracked, posts no longer visible are forgotten together
    /// with their comments. Returns the forgotten ids.
    pub fn sync_visible_posts(&self, seeds: &[PostSeed]) -> Vec<PostId> {
        for seed in seeds {
            self.track_post(seed);
        }
        let visible: HashSet<&PostId> = seeds.iter().map(|seed| &seed.id).collect();
        let removed = self.session.reactions.retain(|id| visible.contains(id));
        for post_id in &removed {
            self.session.comments.forget(post_id);
        }
        debug!(visible = visible.len(), removed = removed.len(), "Synced visible posts");
        removed
    }

    /// Stop tracking a post; pending toggles on it are discarded
    pub fn forget_post(&self, post_id: &PostId) -> bool {
        self.session.comments.forget(post_id);
        self.session.reactions.remove(post_id).is_some()
    }

    // ---- Reactions ----

    /// Current reactions of a post, tracking it with zero counts if unseen
    pub fn reaction_snapshot(&self, post_id: &PostId) -> ReactionState {
        self.session.reactions.get(post_id)
    }

    /// Flip the current user's like
    pub async fn toggle_like(&self, post_id: &PostId) -> SyncResult<ToggleOutcome> {
        self.toggle(post_id, ReactionKind::Like).await
    }

    /// Flip the current user's dislike
    pub async fn toggle_dislike(&self, post_id: &PostId) -> SyncResult<ToggleOutcome> {
        self.toggle(post_id, ReactionKind::Dislike).await
    }

    /// Flip a reaction of either kind
    pub async fn toggle(&self, post_id: &PostId, kind: ReactionKind) -> SyncResult<ToggleOutcome> {
        OptimisticController::new(
            &self.api,
            &self.session.capabilities,
            &self.session.reactions,
            &self.background,
            self.config.opposing_clear,
        )
        .toggle(post_id, kind)
        .await
    }

    // ---- Comments ----

    /// Comments of a post, remote when possible
    pub async fn comments(&self, post_id: &PostId) -> CommentsView {
        self.session
            .comments
            .list(self.api.as_ref(), &self.session.capabilities, post_id)
            .await
    }

    /// Validate and submit a comment.
    ///
    /// Empty or over-long text is rejected before any I/O; a blank author is
    /// replaced by the configured anonymous name.
    pub async fn submit_comment(
        &self,
        post_id: &PostId,
        text: &str,
        author: &str,
    ) -> SyncResult<SubmitOutcome> {
        let (text, author) = normalize_comment(
            text,
            author,
            self.config.max_comment_chars,
            &self.config.anonymous_author,
        )?;
        self.session
            .comments
            .add(
                self.api.as_ref(),
                &self.session.capabilities,
                post_id,
                text,
                author,
            )
            .await
    }

    /// Drop the cached remote snapshot of a post's comments
    pub fn invalidate_comments(&self, post_id: &PostId) -> bool {
        self.session.comments.invalidate(post_id)
    }

    /// Comment cache counters
    pub fn comment_statistics(&self) -> CacheStatistics {
        self.session.comments.statistics()
    }

    // ---- Capabilities ----

    /// Current flag of one feature
    pub fn capability(&self, feature: Feature) -> CapabilityFlag {
        self.session.capabilities.probe(feature)
    }

    /// Current flags of all features
    pub fn capabilities(&self) -> CapabilitySnapshot {
        self.session.capabilities.snapshot()
    }

    // ---- Background work ----

    /// Wait for detached background requests to finish
    pub async fn settle(&self) {
        self.background.settle().await;
    }

    /// Number of detached requests not yet reaped
    pub fn pending_background(&self) -> usize {
        self.background.pending()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_post_seed_from_feed_payload() {
        let json = r#"{
            "id": "42",
            "email": "ana@example.org",
            "url": "https://cdn.example.org/42.jpg",
            "caption": "Morgenlicht",
            "likes": 3,
            "is_liked": true
        }"#;
        let seed: PostSeed = serde_json::from_str(json).unwrap();
        assert_eq!(seed.id, PostId::from("42"));
        assert_eq!(seed.reactions, ReactionState::new(3, true, 0, false));
    }

    #[test]
    fn test_session_defaults_to_unknown_capabilities() {
        let session = SyncSession::default();
        assert_eq!(
            session.capabilities().snapshot(),
            CapabilitySnapshot::default()
        );
        assert!(session.reactions().is_empty());
        assert_eq!(session.comments().statistics(), CacheStatistics::default());
    }
}
