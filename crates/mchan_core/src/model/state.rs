//! Forum state root.
//!
//! # Responsibility
//! - Own every board's post collection plus reconciliation metadata.
//! - Serve as the single unit of persistence.
//!
//! # Invariants
//! - `boards` always contains an entry for every `Board::ALL` member.
//! - Posts in a board are sorted ascending by `post_no`, numbers unique.
//! - `meta.last_reconciled_message_id` only moves forward.

use crate::model::board::Board;
use crate::model::post::Post;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Persisted envelope version understood by this crate.
pub const STATE_VERSION: u32 = 1;

/// Posts owned by one board.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoardPosts {
    pub posts: Vec<Post>,
}

/// Reconciliation metadata.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StateMeta {
    /// Highest external message id whose blocks have been reconciled.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_reconciled_message_id: Option<u64>,
}

/// Versioned forum state root.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ForumState {
    pub version: u32,
    pub boards: BTreeMap<Board, BoardPosts>,
    pub meta: StateMeta,
}

impl Default for ForumState {
    fn default() -> Self {
        Self::new()
    }
}

impl ForumState {
    /// Creates an empty state with every board present.
    pub fn new() -> Self {
        Self {
            version: STATE_VERSION,
            boards: Board::ALL
                .into_iter()
                .map(|board| (board, BoardPosts::default()))
                .collect(),
            meta: StateMeta::default(),
        }
    }

    /// Posts of `board`, sorted by `post_no`.
    pub fn posts(&self, board: Board) -> &[Post] {
        self.boards
            .get(&board)
            .map(|entry| entry.posts.as_slice())
            .unwrap_or(&[])
    }

    pub(crate) fn posts_mut(&mut self, board: Board) -> &mut Vec<Post> {
        &mut self.boards.entry(board).or_default().posts
    }

    /// Looks up one post.
    pub fn find_post(&self, board: Board, post_no: u32) -> Option<&Post> {
        self.posts(board).iter().find(|post| post.post_no == post_no)
    }

    /// Looks up one post for mutation.
    pub fn find_post_mut(&mut self, board: Board, post_no: u32) -> Option<&mut Post> {
        self.posts_mut(board)
            .iter_mut()
            .find(|post| post.post_no == post_no)
    }

    /// Returns whether `(board, post_no)` exists.
    pub fn contains_post(&self, board: Board, post_no: u32) -> bool {
        self.find_post(board, post_no).is_some()
    }

    /// `max(post_no) + 1` for `board`, `1` when the board is empty.
    ///
    /// `None` when the board already holds post `u32::MAX`.
    pub fn next_post_no(&self, board: Board) -> Option<u32> {
        self.posts(board)
            .iter()
            .map(|post| post.post_no)
            .max()
            .unwrap_or(0)
            .checked_add(1)
    }

    /// Total number of posts across boards.
    pub fn post_count(&self) -> usize {
        self.boards.values().map(|entry| entry.posts.len()).sum()
    }

    /// Advances the reconciled-message high-water mark.
    pub fn advance_high_water_mark(&mut self, message_id: u64) {
        let next = match self.meta.last_reconciled_message_id {
            Some(previous) => previous.max(message_id),
            None => message_id,
        };
        self.meta.last_reconciled_message_id = Some(next);
    }
}

pub(crate) fn sort_posts(posts: &mut [Post]) {
    posts.sort_by_key(|post| post.post_no);
}
