//! Per-post reaction state with like/dislike exclusivity
//!
//! [`ReactionState::apply`] is the only transition. It is pure, idempotent
//! and keeps both invariants by construction:
//! - `is_liked` and `is_disliked` are never both set
//! - counts saturate at zero instead of underflowing
//!
//! [`ReactionStore`] owns one state per visible post and hands out copies.

use crate::types::{PostId, ReactionKind};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Reaction counters and the current user's flags for one post.
///
/// Field names follow the feed payload, and every field defaults when the
/// server omits it.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(default)]
pub struct ReactionState {
    /// Number of likes
    #[serde(rename = "likes")]
    pub like_count: u64,
    /// Whether the current user likes the post
    pub is_liked: bool,
    /// Number of dislikes
    #[serde(rename = "dislikes")]
    pub dislike_count: u64,
    /// Whether the current user dislikes the post
    pub is_disliked: bool,
}

impl ReactionState {
    /// Build a state from raw values.
    ///
    /// If the server claims both flags, the like wins and the dislike flag is
    /// dropped (its count is left as reported).
    pub fn new(like_count: u64, is_liked: bool, dislike_count: u64, is_disliked: bool) -> Self {
        Self {
            like_count,
            is_liked,
            dislike_count,
            is_disliked: is_disliked && !is_liked,
        }
    }

    /// Whether the user currently holds `kind`
    #[must_use]
    pub fn is_active(&self, kind: ReactionKind) -> bool {
        match kind {
            ReactionKind::Like => self.is_liked,
            ReactionKind::Dislike => self.is_disliked,
        }
    }

    /// Counter for `kind`
    #[must_use]
    pub fn count(&self, kind: ReactionKind) -> u64 {
        match kind {
            ReactionKind::Like => self.like_count,
            ReactionKind::Dislike => self.dislike_count,
        }
    }

    /// Both flags are never set together
    #[must_use]
    pub fn is_consistent(&self) -> bool {
        !(self.is_liked && self.is_disliked)
    }

    /// Move `kind` to `enable`. Returns `false` when already there.
    ///
    /// Enabling one reaction clears the opposing one.
    pub fn apply(&mut self, kind: ReactionKind, enable: bool) -> bool {
        if self.is_active(kind) == enable {
            return false;
        }
        if enable {
            self.set(kind, true);
            let opposite = kind.opposite();
            if self.is_active(opposite) {
                self.set(opposite, false);
            }
        } else {
            self.set(kind, false);
        }
        debug_assert!(self.is_consistent(), "exclusivity broken: {self:?}");
        true
    }

    /// Undo a `kind → target` transition that started from `before`.
    ///
    /// Reverses the reaction itself and, if that transition cleared the
    /// opposing reaction, re-enables it. On an untouched state this restores
    /// `before` exactly.
    pub fn compensate(&mut self, kind: ReactionKind, target: bool, before: &ReactionState) {
        self.apply(kind, !target);
        let opposite = kind.opposite();
        if target && before.is_active(opposite) {
            self.apply(opposite, true);
        }
    }

    fn set(&mut self, kind: ReactionKind, active: bool) {
        let (flag, count) = match kind {
            ReactionKind::Like => (&mut self.is_liked, &mut self.like_count),
            ReactionKind::Dislike => (&mut self.is_disliked, &mut self.dislike_count),
        };
        *flag = active;
        *count = if active {
            count.saturating_add(1)
        } else {
            count.saturating_sub(1)
        };
    }
}

/// Authoritative reaction view for every tracked post.
#[derive(Debug, Default)]
pub struct ReactionStore {
    entries: Mutex<HashMap<PostId, ReactionState>>,
}

impl ReactionStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Current state, creating a default entry if the post is untracked
    pub fn get(&self, post_id: &PostId) -> ReactionState {
        *self.entries.lock().entry(post_id.clone()).or_default()
    }

    /// Copy of the state, without creating an entry
    pub fn snapshot(&self, post_id: &PostId) -> Option<ReactionState> {
        self.entries.lock().get(post_id).copied()
    }

    /// Start tracking a post that entered the visible set.
    ///
    /// An existing entry wins over `initial`, so a feed refresh never
    /// overwrites optimistic state.
    pub fn track(&self, post_id: &PostId, initial: ReactionState) -> ReactionState {
        *self.entries.lock().entry(post_id.clone()).or_insert(initial)
    }

    /// Whether the post is tracked
    pub fn contains(&self, post_id: &PostId) -> bool {
        self.entries.lock().contains_key(post_id)
    }

    /// Discard a post's state
    pub fn remove(&self, post_id: &PostId) -> Option<ReactionState> {
        self.entries.lock().remove(post_id)
    }

    /// Drop every post for which `keep` returns false; returns the removed ids
    pub fn retain(&self, mut keep: impl FnMut(&PostId) -> bool) -> Vec<PostId> {
        let mut entries = self.entries.lock();
        let removed: Vec<PostId> = entries.keys().filter(|id| !keep(id)).cloned().collect();
        for id in &removed {
            entries.remove(id);
        }
        removed
    }

    /// Number of tracked posts
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    /// Whether no post is tracked
    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }

    /// Set or clear the like, creating the entry if needed
    pub fn apply_like(&self, post_id: &PostId, enable: bool) -> ReactionState {
        self.apply(post_id, ReactionKind::Like, enable)
    }

    /// Set or clear the dislike, creating the entry if needed
    pub fn apply_dislike(&self, post_id: &PostId, enable: bool) -> ReactionState {
        self.apply(post_id, ReactionKind::Dislike, enable)
    }

    /// Set or clear `kind`, creating the entry if needed
    pub fn apply(&self, post_id: &PostId, kind: ReactionKind, enable: bool) -> ReactionState {
        let mut entries = self.entries.lock();
        let state = entries.entry(post_id.clone()).or_default();
        state.apply(kind, enable);
        *state
    }

    /// Run `f` on an existing entry only. Discarded posts stay discarded.
    pub fn update_existing(
        &self,
        post_id: &PostId,
        f: impl FnOnce(&mut ReactionState),
    ) -> Option<ReactionState> {
        let mut entries = self.entries.lock();
        let state = entries.get_mut(post_id)?;
        f(state);
        Some(*state)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn post(id: &str) -> PostId {
        PostId::from(id)
    }

    #[test]
    fn test_like_clears_dislike() {
        let mut state = ReactionState::new(3, false, 2, true);
        assert!(state.apply(ReactionKind::Like, true));
        assert_eq!(state, ReactionState::new(4, true, 1, false));
    }

    #[test]
    fn test_dislike_clears_like() {
        let mut state = ReactionState::new(3, true, 0, false);
        assert!(state.apply(ReactionKind::Dislike, true));
        assert_eq!(state, ReactionState::new(2, false, 1, true));
    }

    #[test]
    fn test_apply_is_idempotent() {
        let mut state = ReactionState::new(5, true, 1, false);
        assert!(!state.apply(ReactionKind::Like, true));
        assert!(!state.apply(ReactionKind::Dislike, false));
        assert_eq!(state, ReactionState::new(5, true, 1, false));
    }

    #[test]
    fn test_counts_floor_at_zero() {
        // Server reported the flag without counting it
        let mut state = ReactionState::new(0, true, 0, false);
        state.apply(ReactionKind::Like, false);
        assert_eq!(state.like_count, 0);
        assert!(!state.is_liked);

        let mut state = ReactionState::new(0, false, 0, true);
        state.apply(ReactionKind::Like, true);
        assert_eq!(state, ReactionState::new(1, true, 0, false));
    }

    #[test]
    fn test_contradicting_seed_prefers_like() {
        let state = ReactionState::new(1, true, 1, true);
        assert!(state.is_consistent());
        assert!(state.is_liked);
        assert!(!state.is_disliked);
    }

    #[test]
    fn test_compensate_restores_cleared_opposite() {
        let before = ReactionState::new(3, false, 2, true);
        let mut state = before;
        state.apply(ReactionKind::Like, true);
        state.compensate(ReactionKind::Like, true, &before);
        assert_eq!(state, before);
    }

    #[test]
    fn test_store_get_is_read_through() {
        let store = ReactionStore::new();
        assert!(store.snapshot(&post("a")).is_none());
        assert_eq!(store.get(&post("a")), ReactionState::default());
        assert!(store.contains(&post("a")));
    }

    #[test]
    fn test_track_keeps_existing_entry() {
        let store = ReactionStore::new();
        store.track(&post("a"), ReactionState::new(1, false, 0, false));
        store.apply_like(&post("a"), true);

        let state = store.track(&post("a"), ReactionState::new(1, false, 0, false));
        assert_eq!(state, ReactionState::new(2, true, 0, false));
    }

    #[test]
    fn test_update_existing_never_recreates() {
        let store = ReactionStore::new();
        store.apply_dislike(&post("gone"), true);
        store.remove(&post("gone"));

        let result = store.update_existing(&post("gone"), |state| {
            state.apply(ReactionKind::Dislike, false);
        });
        assert!(result.is_none());
        assert!(store.is_empty());
    }

    #[test]
    fn test_retain_reports_removed_posts() {
        let store = ReactionStore::new();
        for id in ["a", "b", "c"] {
            store.get(&post(id));
        }
        let mut removed = store.retain(|id| id.as_str() == "b");
        removed.sort();
        assert_eq!(removed, vec![post("a"), post("c")]);
        assert_eq!(store.len(), 1);
    }

    fn arb_kind() -> impl Strategy<Value = ReactionKind> {
        prop_oneof![Just(ReactionKind::Like), Just(ReactionKind::Dislike)]
    }

    /// States whose counts include the user's own reaction
    fn arb_state() -> impl Strategy<Value = ReactionState> {
        (0u64..50, any::<bool>(), 0u64..50, any::<bool>())
            .prop_map(|(likes, liked, dislikes, disliked)| {
                ReactionState::new(
                    likes + u64::from(liked),
                    liked,
                    dislikes + u64::from(disliked),
                    disliked,
                )
            })
    }

    proptest! {
        /// Exclusivity holds after any sequence of applies
        #[test]
        fn exclusivity_holds(
            start in arb_state(),
            ops in prop::collection::vec((arb_kind(), any::<bool>()), 0..64),
        ) {
            let mut state = start;
            for (kind, enable) in ops {
                state.apply(kind, enable);
                prop_assert!(state.is_consistent());
            }
        }

        /// Disabling a reaction whose count is already zero keeps the count
        /// at zero and still clears the flag
        #[test]
        fn disable_floors_at_zero(
            start in arb_state(),
            kind in arb_kind(),
            ops in prop::collection::vec((arb_kind(), any::<bool>()), 0..32),
        ) {
            let mut state = start;
            for (op_kind, enable) in ops {
                state.apply(op_kind, enable);
            }
            // Server reported the flag without counting it
            state.apply(kind, true);
            match kind {
                ReactionKind::Like => state.like_count = 0,
                ReactionKind::Dislike => state.dislike_count = 0,
            }

            prop_assert!(state.apply(kind, false));
            prop_assert_eq!(state.count(kind), 0);
            prop_assert!(!state.is_active(kind));
            prop_assert!(state.is_consistent());
        }

        /// Re-applying the same target changes nothing
        #[test]
        fn apply_idempotent(start in arb_state(), kind in arb_kind(), enable in any::<bool>()) {
            let mut once = start;
            once.apply(kind, enable);
            let mut twice = once;
            prop_assert!(!twice.apply(kind, enable));
            prop_assert_eq!(once, twice);
        }

        /// Compensating a toggle restores the pre-state exactly
        #[test]
        fn compensate_round_trips(start in arb_state(), kind in arb_kind()) {
            let target = !start.is_active(kind);
            let mut state = start;
            state.apply(kind, target);
            state.compensate(kind, target, &start);
            prop_assert_eq!(state, start);
        }
    }
}
