//! Post and floor records.
//!
//! # Responsibility
//! - Define the canonical post/floor shapes shared by reconcile, persist and
//!   prompt layers.
//! - Provide numbering helpers derived from current floors.
//!
//! # Invariants
//! - `floors` is sorted ascending by `floor_no` with no duplicates.
//! - `updated_at_ms` never goes backwards.
//! - Floors are immutable once stored.

use crate::model::board::Board;
use serde::{Deserialize, Serialize};

/// Who authored a floor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FloorSource {
    /// Written by the external generator.
    Ai,
    /// Written by the human participant.
    User,
    /// Seeded locally from a preset catalog.
    Local,
}

impl FloorSource {
    /// Stable persisted name.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Ai => "ai",
            Self::User => "user",
            Self::Local => "local",
        }
    }

    /// Parses a persisted name.
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "ai" => Some(Self::Ai),
            "user" => Some(Self::User),
            "local" => Some(Self::Local),
            _ => None,
        }
    }
}

/// One reply within a post.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Floor {
    /// Position within the post, assigned by the reconciler.
    pub floor_no: u32,
    pub content: String,
    pub created_at_ms: i64,
    pub source: FloorSource,
    /// Deduplication token derived from the origin message and position.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub origin_key: Option<String>,
    /// Floor number claimed by the generator. Provenance only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub origin_floor_tag_no: Option<u32>,
}

/// Floor payload before a number is assigned.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewFloor {
    pub content: String,
    pub created_at_ms: i64,
    pub source: FloorSource,
    pub origin_key: Option<String>,
    pub origin_floor_tag_no: Option<u32>,
}

impl NewFloor {
    /// Builds a floor payload without origin metadata.
    pub fn new(content: impl Into<String>, source: FloorSource, created_at_ms: i64) -> Self {
        Self {
            content: content.into(),
            created_at_ms,
            source,
            origin_key: None,
            origin_floor_tag_no: None,
        }
    }

    pub(crate) fn into_floor(self, floor_no: u32) -> Floor {
        Floor {
            floor_no,
            content: self.content,
            created_at_ms: self.created_at_ms,
            source: self.source,
            origin_key: self.origin_key,
            origin_floor_tag_no: self.origin_floor_tag_no,
        }
    }
}

/// A titled thread identified by `(board, post_no)`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Post {
    pub board: Board,
    pub post_no: u32,
    pub title: String,
    pub body: String,
    pub created_at_ms: i64,
    pub updated_at_ms: i64,
    pub floors: Vec<Floor>,
}

impl Post {
    /// Creates an empty post. Blank `title` falls back to the default title.
    pub fn new(board: Board, post_no: u32, title: &str, body: &str, now_ms: i64) -> Self {
        let title = title.trim();
        Self {
            board,
            post_no,
            title: if title.is_empty() {
                default_post_title(board, post_no)
            } else {
                title.to_string()
            },
            body: body.trim().to_string(),
            created_at_ms: now_ms,
            updated_at_ms: now_ms,
            floors: Vec::new(),
        }
    }

    /// Highest stored floor number, `0` when the post has no floors.
    pub fn last_floor_no(&self) -> u32 {
        self.floors.iter().map(|floor| floor.floor_no).max().unwrap_or(0)
    }

    /// Number the next appended floor will receive, `None` once the number
    /// space is used up.
    pub fn next_floor_no(&self) -> Option<u32> {
        self.last_floor_no().checked_add(1)
    }

    /// Returns whether a floor already carries `origin_key`.
    pub fn has_origin_key(&self, origin_key: &str) -> bool {
        self.floors
            .iter()
            .any(|floor| floor.origin_key.as_deref() == Some(origin_key))
    }

    /// Refreshes `updated_at_ms` without moving it backwards.
    pub(crate) fn touch(&mut self, now_ms: i64) {
        self.updated_at_ms = self.updated_at_ms.max(now_ms);
    }
}

/// Title used when a post is created without one.
pub fn default_post_title(board: Board, post_no: u32) -> String {
    format!("{} 帖子{post_no}", board.name())
}

#[cfg(test)]
mod tests {
    use super::{default_post_title, Floor, FloorSource, Post};
    use crate::model::board::Board;

    fn floor(floor_no: u32) -> Floor {
        Floor {
            floor_no,
            content: format!("floor {floor_no}"),
            created_at_ms: 0,
            source: FloorSource::Local,
            origin_key: None,
            origin_floor_tag_no: None,
        }
    }

    #[test]
    fn next_floor_no_follows_max_not_count() {
        let mut post = Post::new(Board::General, 1, "t", "", 0);
        assert_eq!(post.next_floor_no(), Some(1));
        post.floors = vec![floor(1), floor(4)];
        assert_eq!(post.last_floor_no(), 4);
        assert_eq!(post.next_floor_no(), Some(5));
    }

    #[test]
    fn next_floor_no_is_none_at_top_of_range() {
        let mut post = Post::new(Board::General, 1, "t", "", 0);
        post.floors = vec![floor(u32::MAX)];
        assert_eq!(post.last_floor_no(), u32::MAX);
        assert_eq!(post.next_floor_no(), None);
    }

    #[test]
    fn blank_title_uses_default() {
        let post = Post::new(Board::Help, 7, "   ", " body ", 10);
        assert_eq!(post.title, default_post_title(Board::Help, 7));
        assert_eq!(post.title, "求助区 帖子7");
        assert_eq!(post.body, "body");
    }

    #[test]
    fn touch_never_moves_backwards() {
        let mut post = Post::new(Board::General, 1, "t", "", 100);
        post.touch(50);
        assert_eq!(post.updated_at_ms, 100);
        post.touch(150);
        assert_eq!(post.updated_at_ms, 150);
    }

    #[test]
    fn floor_serializes_with_camel_case_and_omits_missing_origin() {
        let json = serde_json::to_value(floor(2)).unwrap();
        assert_eq!(json["floorNo"], 2);
        assert_eq!(json["source"], "local");
        assert!(json.get("originKey").is_none());
    }
}
