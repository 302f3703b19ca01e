//! Comment cache with local-only fallback
//!
//! Comments come from one of two places:
//! - the server, fetched once per cache miss and kept until invalidated
//! - a session-local append log, used once the backend has shown it has no
//!   comment endpoints
//!
//! The cache follows the per-call handler pattern: async operations take the
//! API client and the capability registry as arguments instead of storing
//! them.

use crate::api::{ApiClient, ApiResponse, RemoteComment};
use crate::capability::CapabilityRegistry;
use crate::errors::{SyncError, SyncResult};
use crate::types::{Feature, PostId};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use tracing::{debug, warn};

/// Identifier of a comment.
///
/// Remote and local ids live in separate spaces; a remote id never equals a
/// local one.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CommentId {
    /// Issued by the server
    Remote(String),
    /// Synthesized from the session's sequence counter
    Local(u64),
}

impl CommentId {
    /// Whether the id was synthesized locally
    #[must_use]
    pub fn is_local(&self) -> bool {
        matches!(self, Self::Local(_))
    }
}

impl fmt::Display for CommentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Remote(id) => f.write_str(id),
            Self::Local(seq) => write!(f, "local-{seq}"),
        }
    }
}

/// A comment ready for display
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommentEntry {
    /// Comment identifier
    pub id: CommentId,
    /// Post the comment belongs to
    pub post_id: PostId,
    /// Author display name
    pub author: String,
    /// Comment body, trimmed and non-empty
    pub text: String,
    /// Server timestamp, absent for local comments
    pub created_at: Option<String>,
}

impl CommentEntry {
    fn from_remote(post_id: &PostId, comment: RemoteComment) -> Self {
        Self {
            id: CommentId::Remote(comment.id),
            post_id: post_id.clone(),
            author: comment.author,
            text: comment.text,
            created_at: comment.created_at,
        }
    }
}

/// Where a listing came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommentOrigin {
    /// Server data (fresh or cached)
    Remote,
    /// The local log, because comments are unsupported
    Local,
    /// The local log, because the server could not be reached
    Fallback,
}

/// Comments of one post plus their origin
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommentsView {
    /// Comments, oldest first
    pub entries: Vec<CommentEntry>,
    /// Source of `entries`
    pub origin: CommentOrigin,
}

/// Result of a successful submission
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmitOutcome {
    /// Stored by the server; the next listing fetches it
    Posted {
        /// Id assigned by the server, if it returned one
        remote_id: Option<String>,
    },
    /// Appended to the local log
    StoredLocally(CommentEntry),
    /// The post was forgotten while the request was in flight; nothing was
    /// stored
    Discarded,
}

/// Cache counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheStatistics {
    /// Listings served from the cached remote snapshot
    pub hits: u64,
    /// Listings that required a remote fetch
    pub misses: u64,
    /// Cached snapshots dropped
    pub invalidations: u64,
}

#[derive(Debug, Default)]
struct CacheState {
    remote: HashMap<PostId, Vec<CommentEntry>>,
    local: HashMap<PostId, Vec<CommentEntry>>,
    flights: HashMap<PostId, Flight>,
    clock: u64,
    next_local_id: u64,
    stats: CacheStatistics,
}

impl CacheState {
    fn tick(&mut self) -> u64 {
        self.clock += 1;
        self.clock
    }

    fn push_local(&mut self, post_id: &PostId, author: &str, text: &str) -> CommentEntry {
        self.next_local_id += 1;
        let entry = CommentEntry {
            id: CommentId::Local(self.next_local_id),
            post_id: post_id.clone(),
            author: author.to_string(),
            text: text.to_string(),
            created_at: None,
        };
        self.local
            .entry(post_id.clone())
            .or_default()
            .push(entry.clone());
        entry
    }
}

/// Bookkeeping for a post with remote requests in flight.
///
/// Only posts with outstanding requests have one, so the map stays bounded
/// by the number of concurrent requests.
#[derive(Debug, Default)]
struct Flight {
    outstanding: usize,
    invalidated_at: u64,
    forgotten_at: u64,
}

/// A remote request in flight for one post, stamped with the cache clock.
struct RequestTicket<'a> {
    cache: &'a CommentCache,
    post_id: PostId,
    stamp: u64,
}

impl Drop for RequestTicket<'_> {
    fn drop(&mut self) {
        let mut state = self.cache.state.lock();
        let settled = match state.flights.get_mut(&self.post_id) {
            Some(flight) => {
                flight.outstanding = flight.outstanding.saturating_sub(1);
                flight.outstanding == 0
            }
            None => false,
        };
        if settled {
            state.flights.remove(&self.post_id);
        }
    }
}

/// Per-post comment storage
#[derive(Debug, Default)]
pub struct CommentCache {
    state: Mutex<CacheState>,
}

impl CommentCache {
    /// Create an empty cache
    pub fn new() -> Self {
        Self::default()
    }

    /// List the comments of a post.
    ///
    /// Fetches from the server on a cache miss unless comments are known to
    /// be unsupported. A transient failure falls back to the local log and
    /// leaves the cache empty so the next call retries.
    pub async fn list<C>(
        &self,
        api: &C,
        capabilities: &CapabilityRegistry,
        post_id: &PostId,
    ) -> CommentsView
    where
        C: ApiClient + ?Sized,
    {
        if capabilities.probe(Feature::Comments).allows_remote() {
            if let Some(entries) = self.cached(post_id) {
                return CommentsView {
                    entries,
                    origin: CommentOrigin::Remote,
                };
            }

            let ticket = self.begin_request(post_id);
            let response = api.list_comments(post_id).await;
            let status = response.status_label();
            capabilities.record_outcome(Feature::Comments, response.probe_outcome());
            match response {
                ApiResponse::Ok(comments) => {
                    let entries: Vec<CommentEntry> = comments
                        .into_iter()
                        .map(|c| CommentEntry::from_remote(post_id, c))
                        .collect();
                    if !self.store_remote_if_current(&ticket, entries.clone()) {
                        debug!(post_id = %post_id, "Comment snapshot went stale in flight, not caching");
                    }
                    return CommentsView {
                        entries,
                        origin: CommentOrigin::Remote,
                    };
                }
                ApiResponse::Unsupported => {
                    debug!(post_id = %post_id, "Comments unsupported, serving local log");
                }
                ApiResponse::NotFound | ApiResponse::Error(_) => {
                    warn!(post_id = %post_id, status, "Comment fetch failed, serving local log");
                    return CommentsView {
                        entries: self.local(post_id),
                        origin: CommentOrigin::Fallback,
                    };
                }
            }
        }

        CommentsView {
            entries: self.local(post_id),
            origin: CommentOrigin::Local,
        }
    }

    /// Submit a comment.
    ///
    /// `text` and `author` must already be normalized by the caller (see
    /// [`normalize_comment`]). An empty `text` is still rejected here
    /// before any I/O.
    pub async fn add<C>(
        &self,
        api: &C,
        capabilities: &CapabilityRegistry,
        post_id: &PostId,
        text: &str,
        author: &str,
    ) -> SyncResult<SubmitOutcome>
    where
        C: ApiClient + ?Sized,
    {
        if text.trim().is_empty() {
            return Err(SyncError::validation("Comment text must not be empty"));
        }

        if capabilities.probe(Feature::Comments).allows_remote() {
            let ticket = self.begin_request(post_id);
            let response = api.add_comment(post_id, text).await;
            capabilities.record_outcome(Feature::Comments, response.probe_outcome());
            match response {
                ApiResponse::Ok(remote_id) => {
                    self.invalidate(post_id);
                    debug!(post_id = %post_id, remote_id = ?remote_id, "Comment posted");
                    return Ok(SubmitOutcome::Posted { remote_id });
                }
                ApiResponse::Unsupported => {
                    let Some(entry) = self.append_local_if_tracked(&ticket, author, text) else {
                        debug!(post_id = %post_id, "Post forgotten while comment was in flight, dropping it");
                        return Ok(SubmitOutcome::Discarded);
                    };
                    debug!(post_id = %post_id, "Comments unsupported, keeping comment locally");
                    return Ok(SubmitOutcome::StoredLocally(entry));
                }
                ApiResponse::NotFound => {
                    return Err(SyncError::PostNotFound {
                        post_id: post_id.clone(),
                        feature: Feature::Comments,
                    });
                }
                ApiResponse::Error(message) => {
                    warn!(post_id = %post_id, error = %message, "Comment submission failed");
                    return Err(SyncError::transient(Feature::Comments, message));
                }
            }
        }

        Ok(SubmitOutcome::StoredLocally(
            self.append_local(post_id, author, text),
        ))
    }

    /// Cached remote snapshot, counting the hit or miss
    pub fn cached(&self, post_id: &PostId) -> Option<Vec<CommentEntry>> {
        let mut state = self.state.lock();
        match state.remote.get(post_id).cloned() {
            Some(entries) => {
                state.stats.hits += 1;
                Some(entries)
            }
            None => {
                state.stats.misses += 1;
                None
            }
        }
    }

    /// Replace the cached remote snapshot of a post
    pub fn store_remote(&self, post_id: &PostId, entries: Vec<CommentEntry>) {
        self.state.lock().remote.insert(post_id.clone(), entries);
    }

    fn begin_request(&self, post_id: &PostId) -> RequestTicket<'_> {
        let mut state = self.state.lock();
        let stamp = state.tick();
        state.flights.entry(post_id.clone()).or_default().outstanding += 1;
        RequestTicket {
            cache: self,
            post_id: post_id.clone(),
            stamp,
        }
    }

    /// Cache a fetched snapshot unless the post was invalidated or forgotten
    /// after the request started
    fn store_remote_if_current(&self, ticket: &RequestTicket<'_>, entries: Vec<CommentEntry>) -> bool {
        let mut state = self.state.lock();
        let current = state.flights.get(&ticket.post_id).map_or(true, |flight| {
            ticket.stamp > flight.invalidated_at.max(flight.forgotten_at)
        });
        if current {
            state.remote.insert(ticket.post_id.clone(), entries);
        }
        current
    }

    /// Append to the local log unless the post was forgotten after the
    /// request started
    fn append_local_if_tracked(
        &self,
        ticket: &RequestTicket<'_>,
        author: &str,
        text: &str,
    ) -> Option<CommentEntry> {
        let mut state = self.state.lock();
        let forgotten = state
            .flights
            .get(&ticket.post_id)
            .is_some_and(|flight| flight.forgotten_at > ticket.stamp);
        (!forgotten).then(|| state.push_local(&ticket.post_id, author, text))
    }

    /// Drop the cached remote snapshot so the next listing re-fetches
    pub fn invalidate(&self, post_id: &PostId) -> bool {
        let mut state = self.state.lock();
        let now = state.tick();
        if let Some(flight) = state.flights.get_mut(post_id) {
            flight.invalidated_at = now;
        }
        let dropped = state.remote.remove(post_id).is_some();
        if dropped {
            state.stats.invalidations += 1;
        }
        dropped
    }

    /// Append to the local log with a fresh local id
    pub fn append_local(&self, post_id: &PostId, author: &str, text: &str) -> CommentEntry {
        self.state.lock().push_local(post_id, author, text)
    }

    /// Local log of a post
    pub fn local(&self, post_id: &PostId) -> Vec<CommentEntry> {
        self.state
            .lock()
            .local
            .get(post_id)
            .cloned()
            .unwrap_or_default()
    }

    /// Discard everything held for a post
    pub fn forget(&self, post_id: &PostId) {
        let mut state = self.state.lock();
        let now = state.tick();
        if let Some(flight) = state.flights.get_mut(post_id) {
            flight.forgotten_at = now;
        }
        state.remote.remove(post_id);
        state.local.remove(post_id);
    }

    /// Cache counters
    pub fn statistics(&self) -> CacheStatistics {
        self.state.lock().stats
    }
}

/// Trim and check a comment before it reaches the cache.
///
/// Returns the trimmed text and the author to store, substituting
/// `anonymous_author` for a blank author.
pub fn normalize_comment<'a>(
    text: &'a str,
    author: &'a str,
    max_chars: usize,
    anonymous_author: &'a str,
) -> SyncResult<(&'a str, &'a str)> {
    let text = text.trim();
    if text.is_empty() {
        return Err(SyncError::validation("Comment text must not be empty"));
    }
    let len = text.chars().count();
    if len > max_chars {
        return Err(SyncError::validation(format!(
            "Comment is {len} characters, limit is {max_chars}"
        )));
    }
    let author = match author.trim() {
        "" => anonymous_author,
        trimmed => trimmed,
    };
    Ok((text, author))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn post(id: &str) -> PostId {
        PostId::from(id)
    }

    #[test]
    fn test_local_ids_are_sequential_across_posts() {
        let cache = CommentCache::new();
        let a = cache.append_local(&post("p1"), "ana", "first");
        let b = cache.append_local(&post("p2"), "ben", "second");
        assert_eq!(a.id, CommentId::Local(1));
        assert_eq!(b.id, CommentId::Local(2));
        assert_eq!(b.id.to_string(), "local-2");
    }

    #[test]
    fn test_local_and_remote_ids_never_match() {
        assert_ne!(CommentId::Remote("1".into()), CommentId::Local(1));
        // Same rendering, different id spaces
        assert_ne!(CommentId::Remote("local-1".into()), CommentId::Local(1));
        assert!(!CommentId::Remote("local-1".into()).is_local());
    }

    #[test]
    fn test_local_log_preserves_insertion_order() {
        let cache = CommentCache::new();
        for text in ["one", "two", "three"] {
            cache.append_local(&post("p1"), "ana", text);
        }
        let texts: Vec<String> = cache.local(&post("p1")).into_iter().map(|c| c.text).collect();
        assert_eq!(texts, ["one", "two", "three"]);
    }

    #[test]
    fn test_statistics_track_hits_misses_invalidations() {
        let cache = CommentCache::new();
        assert!(cache.cached(&post("p1")).is_none());
        cache.store_remote(&post("p1"), Vec::new());
        assert!(cache.cached(&post("p1")).is_some());
        assert!(cache.invalidate(&post("p1")));
        assert!(!cache.invalidate(&post("p1")));

        let stats = cache.statistics();
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.misses, 1);
        assert_eq!(stats.invalidations, 1);
    }

    #[test]
    fn test_stale_fetch_is_not_cached() {
        let cache = CommentCache::new();
        let ticket = cache.begin_request(&post("p1"));
        cache.invalidate(&post("p1"));
        assert!(!cache.store_remote_if_current(&ticket, Vec::new()));
        drop(ticket);

        let ticket = cache.begin_request(&post("p1"));
        assert!(cache.store_remote_if_current(&ticket, Vec::new()));
    }

    #[test]
    fn test_invalidate_does_not_block_local_append() {
        let cache = CommentCache::new();
        let ticket = cache.begin_request(&post("p1"));
        cache.invalidate(&post("p1"));
        assert!(cache.append_local_if_tracked(&ticket, "ana", "hi").is_some());

        cache.forget(&post("p1"));
        assert!(cache.append_local_if_tracked(&ticket, "ana", "again").is_none());
        assert!(cache.local(&post("p1")).is_empty());
    }

    #[test]
    fn test_request_bookkeeping_is_released() {
        let cache = CommentCache::new();
        for i in 0..32 {
            let id = post(&format!("p{i}"));
            cache.invalidate(&id);
            cache.forget(&id);
        }
        assert!(cache.state.lock().flights.is_empty());

        let first = cache.begin_request(&post("p1"));
        let second = cache.begin_request(&post("p1"));
        cache.forget(&post("p1"));
        drop(first);
        assert_eq!(cache.state.lock().flights.len(), 1);
        drop(second);
        assert!(cache.state.lock().flights.is_empty());
    }

    #[test]
    fn test_forget_drops_both_sources() {
        let cache = CommentCache::new();
        cache.store_remote(&post("p1"), Vec::new());
        cache.append_local(&post("p1"), "ana", "hi");
        cache.forget(&post("p1"));
        assert!(cache.local(&post("p1")).is_empty());
        assert!(cache.cached(&post("p1")).is_none());
    }

    #[test]
    fn test_normalize_comment() {
        assert_eq!(
            normalize_comment("  hallo  ", " ana ", 10, "Unknown").unwrap(),
            ("hallo", "ana")
        );
        assert_eq!(
            normalize_comment("hallo", "   ", 10, "Unknown").unwrap(),
            ("hallo", "Unknown")
        );
        assert!(normalize_comment(" \n\t ", "ana", 10, "Unknown").is_err());

        let err = normalize_comment("ääääää", "ana", 5, "Unknown").unwrap_err();
        assert_eq!(err.to_string(), "Comment is 6 characters, limit is 5");
    }
}
