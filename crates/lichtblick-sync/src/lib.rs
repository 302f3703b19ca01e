//! Lichtblick-Sync: Optimistic Reactions and Comments
//!
//! This crate keeps a photo feed's likes, dislikes and comments responsive
//! against backends that may or may not implement each feature.
//!
//! # Architecture Overview
//!
//! - [`CapabilityRegistry`]: per-feature tri-state flags, resolved lazily by
//!   the first definitive server answer and sticky afterwards
//! - [`ReactionStore`]: per-post counters and flags with like/dislike
//!   exclusivity
//! - [`CommentCache`]: remote snapshots plus a local log for backends
//!   without comments
//! - [`OptimisticController`]: apply locally, confirm remotely, compensate on
//!   failure
//! - [`SyncEngine`]: the facade the UI calls
//!
//! All backend I/O goes through the [`ApiClient`] trait.
//!
//! # Design Principles
//!
//! - **Optimistic first**: local state changes before the network answers
//! - **Capability-adaptive**: a missing endpoint degrades the feature to
//!   local-only instead of failing
//! - **Explicit outcomes**: expected backend answers are values, failures are
//!   categorized [`SyncError`]s
//!
//! # Usage
//!
//! ```rust,ignore
//! use lichtblick_sync::{PostId, SyncConfig, SyncEngine};
//!
//! let engine = SyncEngine::new(client, SyncConfig::default())?;
//! engine.sync_visible_posts(&feed);
//!
//! let post = PostId::from("42");
//! engine.toggle_like(&post).await?;
//! engine.submit_comment(&post, "Schönes Licht", "ana").await?;
//! ```

#![forbid(unsafe_code)]
#![deny(missing_docs)]

pub mod api;
pub mod capability;
pub mod comments;
pub mod config;
pub mod controller;
pub mod engine;
pub mod errors;
pub mod reactions;
mod tasks;
pub mod types;

pub use api::{classify_http_status, ApiClient, ApiResponse, HttpClass, RemoteComment};
pub use capability::{CapabilityFlag, CapabilityRegistry, CapabilitySnapshot, ProbeOutcome};
pub use comments::{
    normalize_comment, CacheStatistics, CommentCache, CommentEntry, CommentId, CommentOrigin,
    CommentsView, SubmitOutcome,
};
pub use config::{OpposingClearPolicy, SyncConfig, SyncConfigBuilder, ENV_PREFIX};
pub use controller::{OptimisticController, ToggleOutcome, ToggleResolution};
pub use engine::{PostSeed, SyncEngine, SyncSession};
pub use errors::{ErrorCategory, Severity, SyncError, SyncResult};
pub use reactions::{ReactionState, ReactionStore};
pub use types::{Feature, PostId, ReactionKind};
