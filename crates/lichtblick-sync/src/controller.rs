//! Optimistic reaction toggles
//!
//! A toggle runs in four phases:
//!
//! 1. capture the pre-state and derive the target flag
//! 2. apply the change locally so the UI updates immediately
//! 3. confirm with the backend, unless the feature is known unsupported
//! 4. reconcile: keep on success or missing endpoint, compensate on failure
//!
//! The controller is built per call from the engine's shared state, so it
//! holds no state of its own.

use crate::api::{ApiClient, ApiResponse};
use crate::capability::CapabilityRegistry;
use crate::config::OpposingClearPolicy;
use crate::errors::{SyncError, SyncResult};
use crate::reactions::{ReactionState, ReactionStore};
use crate::tasks::BackgroundTasks;
use crate::types::{PostId, ReactionKind};
use std::sync::Arc;
use tracing::{debug, warn};

/// How a toggle ended up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToggleResolution {
    /// The backend accepted the change
    Confirmed,
    /// The feature is unsupported; the change lives only on this device
    LocalOnly,
    /// The post stopped being tracked while the request was in flight
    Discarded,
}

/// Result of a successful toggle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ToggleOutcome {
    /// How the toggle was resolved
    pub resolution: ToggleResolution,
    /// State after the toggle; `None` once the post is no longer tracked
    pub state: Option<ReactionState>,
}

impl ToggleOutcome {
    fn new(resolution: ToggleResolution, state: Option<ReactionState>) -> Self {
        Self { resolution, state }
    }
}

/// Per-call handler that runs one optimistic toggle.
pub struct OptimisticController<'a, C: ?Sized> {
    api: &'a Arc<C>,
    capabilities: &'a Arc<CapabilityRegistry>,
    reactions: &'a ReactionStore,
    background: &'a BackgroundTasks,
    opposing_clear: OpposingClearPolicy,
}

impl<'a, C> OptimisticController<'a, C>
where
    C: ApiClient + ?Sized + 'static,
{
    pub(crate) fn new(
        api: &'a Arc<C>,
        capabilities: &'a Arc<CapabilityRegistry>,
        reactions: &'a ReactionStore,
        background: &'a BackgroundTasks,
        opposing_clear: OpposingClearPolicy,
    ) -> Self {
        Self {
            api,
            capabilities,
            reactions,
            background,
            opposing_clear,
        }
    }

    /// Flip `kind` on a post.
    ///
    /// On failure the local change is compensated before the error is
    /// returned, so the store never shows an unconfirmed reaction on a
    /// backend that supports it.
    pub async fn toggle(&self, post_id: &PostId, kind: ReactionKind) -> SyncResult<ToggleOutcome> {
        let feature = kind.feature();

        let before = self.reactions.get(post_id);
        let target = !before.is_active(kind);

        let optimistic = self.reactions.apply(post_id, kind, target);
        debug!(
            post_id = %post_id,
            reaction = %kind,
            target,
            likes = optimistic.like_count,
            dislikes = optimistic.dislike_count,
            "Applied optimistic reaction"
        );

        if !self.capabilities.probe(feature).allows_remote() {
            return Ok(ToggleOutcome::new(
                ToggleResolution::LocalOnly,
                Some(optimistic),
            ));
        }

        let response = self.api.set_reaction(post_id, kind, target).await;
        let status = response.status_label();
        self.capabilities
            .record_outcome(feature, response.probe_outcome());

        if !self.reactions.contains(post_id) {
            debug!(post_id = %post_id, reaction = %kind, status, "Post untracked while reaction was in flight");
            return Ok(ToggleOutcome::new(ToggleResolution::Discarded, None));
        }

        match response {
            ApiResponse::Ok(()) => {
                let opposite = kind.opposite();
                if target && before.is_active(opposite) {
                    self.clear_opposing(post_id, opposite).await;
                }
                Ok(ToggleOutcome::new(
                    ToggleResolution::Confirmed,
                    self.reactions.snapshot(post_id),
                ))
            }
            ApiResponse::Unsupported => {
                debug!(post_id = %post_id, reaction = %kind, "Reaction endpoint missing, keeping local change");
                Ok(ToggleOutcome::new(
                    ToggleResolution::LocalOnly,
                    self.reactions.snapshot(post_id),
                ))
            }
            ApiResponse::NotFound => {
                self.rollback(post_id, kind, target, &before);
                Err(SyncError::PostNotFound {
                    post_id: post_id.clone(),
                    feature,
                })
            }
            ApiResponse::Error(message) => {
                warn!(post_id = %post_id, reaction = %kind, error = %message, "Reaction request failed, rolling back");
                self.rollback(post_id, kind, target, &before);
                Err(SyncError::transient(feature, message))
            }
        }
    }

    fn rollback(&self, post_id: &PostId, kind: ReactionKind, target: bool, before: &ReactionState) {
        let restored = self
            .reactions
            .update_existing(post_id, |state| state.compensate(kind, target, before));
        debug!(post_id = %post_id, reaction = %kind, restored = ?restored, "Rolled back optimistic reaction");
    }

    /// Best-effort removal of the opposing reaction on the server.
    ///
    /// Local state already reflects the clear, and a failure here is only
    /// logged.
    async fn clear_opposing(&self, post_id: &PostId, opposite: ReactionKind) {
        let feature = opposite.feature();
        if !self.capabilities.probe(feature).allows_remote() {
            return;
        }

        let api = Arc::clone(self.api);
        let capabilities = Arc::clone(self.capabilities);
        let post_id = post_id.clone();
        let request = async move {
            let response = api.set_reaction(&post_id, opposite, false).await;
            capabilities.record_outcome(feature, response.probe_outcome());
            match response {
                ApiResponse::Ok(()) => {
                    debug!(post_id = %post_id, reaction = %opposite, "Cleared opposing reaction");
                }
                ApiResponse::Unsupported => {
                    debug!(post_id = %post_id, reaction = %opposite, "Opposing reaction endpoint missing");
                }
                ApiResponse::NotFound | ApiResponse::Error(_) => {
                    warn!(
                        post_id = %post_id,
                        reaction = %opposite,
                        status = response.status_label(),
                        "Failed to clear opposing reaction"
                    );
                }
            }
        };

        match self.opposing_clear {
            OpposingClearPolicy::Detached => {
                if let Err(request) = self.background.spawn(request) {
                    debug!("No Tokio runtime for a detached clear, awaiting it inline");
                    request.await;
                }
            }
            OpposingClearPolicy::Awaited => request.await,
        }
    }
}
