//! Common fixtures for engine tests

use crate::mock_backend::MockBackend;
use lichtblick_sync::{PostId, PostSeed, ReactionState, SyncConfig, SyncEngine};

/// Post id from a literal
pub fn post(id: &str) -> PostId {
    PostId::from(id)
}

/// Seed with explicit reaction values
pub fn seed(id: &str, likes: u64, is_liked: bool, dislikes: u64, is_disliked: bool) -> PostSeed {
    PostSeed::new(id, ReactionState::new(likes, is_liked, dislikes, is_disliked))
}

/// Seed without any reactions
pub fn fresh(id: &str) -> PostSeed {
    PostSeed::new(id, ReactionState::default())
}

/// Feed of `count` fresh posts named `p0`, `p1`, ...
pub fn feed(count: usize) -> Vec<PostSeed> {
    (0..count).map(|i| fresh(&format!("p{i}"))).collect()
}

/// Engine over `backend` with default configuration
pub fn engine(backend: &MockBackend) -> SyncEngine<MockBackend> {
    engine_with(backend, SyncConfig::default())
}

/// Engine over `backend` with the given configuration
pub fn engine_with(backend: &MockBackend, config: SyncConfig) -> SyncEngine<MockBackend> {
    SyncEngine::new(backend.clone(), config).expect("test configuration is valid")
}
