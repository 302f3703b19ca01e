//! In-memory backend for driving the sync engine in tests
//!
//! `MockBackend` implements [`ApiClient`] with deterministic, controllable
//! behaviour:
//! - per-feature availability (available, missing endpoint, failing)
//! - one-shot scripted answers that take precedence over the configured
//!   behaviour
//! - posts that answer "not found"
//! - a log of every call in arrival order
//! - a pause gate that holds calls in flight until released
//!
//! Clones share state, so a test can keep a handle while the engine owns
//! another.

use async_trait::async_trait;
use lichtblick_sync::{ApiClient, ApiResponse, Feature, PostId, ReactionKind, RemoteComment};
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Arc;
use tokio::sync::Semaphore;
use tracing::trace;

/// How the backend treats one feature.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum FeatureBehavior {
    /// Endpoint exists and works
    #[default]
    Available,
    /// Endpoint does not exist
    Missing,
    /// Endpoint exists but every call fails with the message
    Failing(String),
}

/// A one-shot answer for the next call of a feature.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Scripted {
    /// Process the call normally
    Ok,
    /// Answer "post not found"
    NotFound,
    /// Answer "endpoint missing"
    Unsupported,
    /// Fail with the message
    Error(String),
}

/// A call received by the backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApiCall {
    /// `set_reaction`
    SetReaction {
        /// Target post
        post_id: PostId,
        /// Reaction kind
        kind: ReactionKind,
        /// Requested flag
        enabled: bool,
    },
    /// `list_comments`
    ListComments {
        /// Target post
        post_id: PostId,
    },
    /// `add_comment`
    AddComment {
        /// Target post
        post_id: PostId,
        /// Submitted text
        text: String,
    },
}

impl ApiCall {
    /// Feature this call exercises
    pub fn feature(&self) -> Feature {
        match self {
            Self::SetReaction { kind, .. } => kind.feature(),
            Self::ListComments { .. } | Self::AddComment { .. } => Feature::Comments,
        }
    }
}

#[derive(Debug, Default)]
struct MockState {
    behaviors: HashMap<Feature, FeatureBehavior>,
    scripted: HashMap<Feature, VecDeque<Scripted>>,
    missing_posts: HashSet<PostId>,
    calls: Vec<ApiCall>,
    reactions: HashMap<(PostId, ReactionKind), bool>,
    comments: HashMap<PostId, Vec<RemoteComment>>,
    next_comment_id: u64,
    gate: Option<Arc<Semaphore>>,
}

impl MockState {
    /// Resolve the answer for a call, consuming a scripted one if queued
    fn decide(&mut self, feature: Feature, post_id: &PostId) -> Scripted {
        if let Some(next) = self.scripted.get_mut(&feature).and_then(VecDeque::pop_front) {
            return next;
        }
        match self.behaviors.get(&feature).cloned().unwrap_or_default() {
            FeatureBehavior::Missing => Scripted::Unsupported,
            FeatureBehavior::Failing(message) => Scripted::Error(message),
            FeatureBehavior::Available if self.missing_posts.contains(post_id) => {
                Scripted::NotFound
            }
            FeatureBehavior::Available => Scripted::Ok,
        }
    }
}

/// Controllable in-memory backend
#[derive(Debug, Clone, Default)]
pub struct MockBackend {
    state: Arc<Mutex<MockState>>,
}

impl MockBackend {
    /// Backend with every feature available
    pub fn new() -> Self {
        Self::default()
    }

    /// Backend missing every optional endpoint
    pub fn legacy() -> Self {
        let backend = Self::new();
        for feature in Feature::ALL {
            backend.set_feature(feature, FeatureBehavior::Missing);
        }
        backend
    }

    /// Builder form of [`Self::set_feature`]
    pub fn with_feature(self, feature: Feature, behavior: FeatureBehavior) -> Self {
        self.set_feature(feature, behavior);
        self
    }

    /// Change how a feature behaves from now on
    pub fn set_feature(&self, feature: Feature, behavior: FeatureBehavior) {
        self.state.lock().behaviors.insert(feature, behavior);
    }

    /// Queue a one-shot answer for the next call of `feature`
    pub fn script(&self, feature: Feature, answer: Scripted) {
        self.state
            .lock()
            .scripted
            .entry(feature)
            .or_default()
            .push_back(answer);
    }

    /// Make an available endpoint answer "not found" for a post
    pub fn remove_post(&self, post_id: &PostId) {
        self.state.lock().missing_posts.insert(post_id.clone());
    }

    /// Put a comment on the server; returns its id
    pub fn seed_comment(&self, post_id: &PostId, author: &str, text: &str) -> String {
        let mut state = self.state.lock();
        push_comment(&mut state, post_id, author, text)
    }

    /// Server-side reaction flag of the current user
    pub fn server_reaction(&self, post_id: &PostId, kind: ReactionKind) -> bool {
        self.state
            .lock()
            .reactions
            .get(&(post_id.clone(), kind))
            .copied()
            .unwrap_or(false)
    }

    /// Comments stored on the server for a post
    pub fn server_comments(&self, post_id: &PostId) -> Vec<RemoteComment> {
        self.state
            .lock()
            .comments
            .get(post_id)
            .cloned()
            .unwrap_or_default()
    }

    // ---- Call log ----

    /// Every call received so far
    pub fn calls(&self) -> Vec<ApiCall> {
        self.state.lock().calls.clone()
    }

    /// Calls that exercised `feature`
    pub fn calls_for(&self, feature: Feature) -> Vec<ApiCall> {
        self.state
            .lock()
            .calls
            .iter()
            .filter(|call| call.feature() == feature)
            .cloned()
            .collect()
    }

    /// Number of calls that exercised `feature`
    pub fn call_count(&self, feature: Feature) -> usize {
        self.calls_for(feature).len()
    }

    /// Total number of calls
    pub fn total_calls(&self) -> usize {
        self.state.lock().calls.len()
    }

    /// Forget the call log
    pub fn clear_calls(&self) {
        self.state.lock().calls.clear();
    }

    /// Yield until at least `count` calls have arrived
    pub async fn wait_for_calls(&self, count: usize) {
        while self.total_calls() < count {
            tokio::task::yield_now().await;
        }
    }

    // ---- Pause gate ----

    /// Hold every subsequent call in flight until released
    pub fn pause(&self) {
        self.state.lock().gate = Some(Arc::new(Semaphore::new(0)));
    }

    /// Let `count` held calls proceed
    pub fn release(&self, count: usize) {
        if let Some(gate) = &self.state.lock().gate {
            gate.add_permits(count);
        }
    }

    /// Release everything and stop holding calls
    pub fn resume(&self) {
        if let Some(gate) = self.state.lock().gate.take() {
            gate.close();
        }
    }

    /// Log the call, then wait at the gate if paused
    async fn arrive(&self, call: ApiCall) {
        trace!(call = ?call, "Mock backend received call");
        let gate = {
            let mut state = self.state.lock();
            state.calls.push(call);
            state.gate.clone()
        };
        if let Some(gate) = gate {
            // A closed gate means resumed
            if let Ok(permit) = gate.acquire().await {
                permit.forget();
            }
        }
    }
}

fn push_comment(state: &mut MockState, post_id: &PostId, author: &str, text: &str) -> String {
    state.next_comment_id += 1;
    let id = format!("srv-{}", state.next_comment_id);
    state
        .comments
        .entry(post_id.clone())
        .or_default()
        .push(RemoteComment {
            id: id.clone(),
            author: author.to_string(),
            text: text.to_string(),
            created_at: Some(format!("2025-01-01T00:00:{:02}", state.next_comment_id % 60)),
        });
    id
}

fn reply<T>(answer: Scripted, on_ok: impl FnOnce() -> T) -> ApiResponse<T> {
    match answer {
        Scripted::Ok => ApiResponse::Ok(on_ok()),
        Scripted::NotFound => ApiResponse::NotFound,
        Scripted::Unsupported => ApiResponse::Unsupported,
        Scripted::Error(message) => ApiResponse::Error(message),
    }
}

#[async_trait]
impl ApiClient for MockBackend {
    async fn set_reaction(
        &self,
        post_id: &PostId,
        kind: ReactionKind,
        enabled: bool,
    ) -> ApiResponse<()> {
        self.arrive(ApiCall::SetReaction {
            post_id: post_id.clone(),
            kind,
            enabled,
        })
        .await;

        let mut state = self.state.lock();
        let answer = state.decide(kind.feature(), post_id);
        reply(answer, || {
            state.reactions.insert((post_id.clone(), kind), enabled);
        })
    }

    async fn list_comments(&self, post_id: &PostId) -> ApiResponse<Vec<RemoteComment>> {
        self.arrive(ApiCall::ListComments {
            post_id: post_id.clone(),
        })
        .await;

        let mut state = self.state.lock();
        let answer = state.decide(Feature::Comments, post_id);
        reply(answer, || {
            state.comments.get(post_id).cloned().unwrap_or_default()
        })
    }

    async fn add_comment(&self, post_id: &PostId, text: &str) -> ApiResponse<Option<String>> {
        self.arrive(ApiCall::AddComment {
            post_id: post_id.clone(),
            text: text.to_string(),
        })
        .await;

        let mut state = self.state.lock();
        let answer = state.decide(Feature::Comments, post_id);
        reply(answer, || Some(push_comment(&mut state, post_id, "mock-user", text)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_scripted_answer_is_one_shot() {
        let backend = MockBackend::new();
        let post = PostId::from("p1");
        backend.script(Feature::Like, Scripted::Error("boom".into()));

        let first = backend.set_reaction(&post, ReactionKind::Like, true).await;
        assert_eq!(first, ApiResponse::Error("boom".into()));
        assert!(!backend.server_reaction(&post, ReactionKind::Like));

        let second = backend.set_reaction(&post, ReactionKind::Like, true).await;
        assert_eq!(second, ApiResponse::Ok(()));
        assert!(backend.server_reaction(&post, ReactionKind::Like));
    }

    #[tokio::test]
    async fn test_missing_feature_answers_unsupported() {
        let backend = MockBackend::new().with_feature(Feature::Comments, FeatureBehavior::Missing);
        let post = PostId::from("p1");

        assert_eq!(backend.list_comments(&post).await, ApiResponse::Unsupported);
        assert_eq!(backend.call_count(Feature::Comments), 1);
        assert_eq!(backend.call_count(Feature::Like), 0);
    }

    #[tokio::test]
    async fn test_added_comments_are_listed() {
        let backend = MockBackend::new();
        let post = PostId::from("p1");
        backend.seed_comment(&post, "ana", "first");

        let id = backend.add_comment(&post, "second").await;
        assert_eq!(id, ApiResponse::Ok(Some("srv-2".to_string())));

        let ApiResponse::Ok(listed) = backend.list_comments(&post).await else {
            panic!("listing should succeed");
        };
        let texts: Vec<_> = listed.iter().map(|c| c.text.as_str()).collect();
        assert_eq!(texts, ["first", "second"]);
    }

    #[tokio::test]
    async fn test_pause_holds_calls_until_released() {
        let backend = MockBackend::new();
        let post = PostId::from("p1");
        backend.pause();

        let call = backend.set_reaction(&post, ReactionKind::Dislike, true);
        let control = async {
            backend.wait_for_calls(1).await;
            assert!(!backend.server_reaction(&post, ReactionKind::Dislike));
            backend.release(1);
        };
        let (answer, ()) = futures::join!(call, control);

        assert_eq!(answer, ApiResponse::Ok(()));
        assert!(backend.server_reaction(&post, ReactionKind::Dislike));
    }
}
