//! Merge parsed blocks into forum state.
//!
//! # Responsibility
//! - Create or patch posts addressed by `(board, post_no)`.
//! - Append floors with reconciler-assigned numbers.
//! - Absorb re-deliveries of the same origin message via origin keys.
//!
//! # Invariants
//! - Next floor number is always `max(floor_no) + 1`; suggestions that differ
//!   are overridden.
//! - A floor whose origin key already exists on the post is never appended
//!   again.
//! - The reconciled-message high-water mark never regresses.
//! - A post whose floor numbers are used up takes no further floors; the
//!   append is skipped, never wrapped.

use crate::model::board::Board;
use crate::model::now_epoch_ms;
use crate::model::post::{Floor, FloorSource, NewFloor, Post};
use crate::model::state::{sort_posts, ForumState};
use crate::parser::ParsedPostBlock;
use log::{info, warn};

/// Optional title/body replacement for an existing post.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PostPatch {
    pub title: Option<String>,
    pub body: Option<String>,
}

impl PostPatch {
    fn title(&self) -> Option<&str> {
        non_blank(self.title.as_deref())
    }

    fn body(&self) -> Option<&str> {
        non_blank(self.body.as_deref())
    }
}

/// Counts reported by `apply_parsed_blocks`. Informational only.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ApplyReport {
    pub created_posts: usize,
    pub appended_floors: usize,
    /// Floors dropped because their post had no floor numbers left.
    pub skipped_floors: usize,
}

/// Returns the post for `(board, post_no)`, creating it when absent.
///
/// New posts take title/body from `patch` (blank values fall back to the
/// default title and an empty body). Existing posts only take non-blank
/// trimmed values, and `updated_at_ms` is refreshed whenever a patch is given.
pub fn upsert_post<'a>(
    state: &'a mut ForumState,
    board: Board,
    post_no: u32,
    patch: Option<&PostPatch>,
) -> &'a mut Post {
    let now = now_epoch_ms();
    let posts = state.posts_mut(board);

    let index = match posts.iter().position(|post| post.post_no == post_no) {
        Some(index) => {
            if let Some(patch) = patch {
                let post = &mut posts[index];
                if let Some(title) = patch.title() {
                    post.title = title.to_string();
                }
                if let Some(body) = patch.body() {
                    post.body = body.to_string();
                }
                post.touch(now);
            }
            index
        }
        None => {
            let title = patch.and_then(PostPatch::title).unwrap_or("");
            let body = patch.and_then(PostPatch::body).unwrap_or("");
            posts.push(Post::new(board, post_no, title, body, now));
            sort_posts(posts);
            posts
                .iter()
                .position(|post| post.post_no == post_no)
                .unwrap_or(posts.len() - 1)
        }
    };

    &mut posts[index]
}

/// Appends one floor to `post` and returns the stored copy.
///
/// `suggested_floor_no` is honored only when it equals the computed next
/// number. Returns `None` without touching `post` when its last floor is
/// already `u32::MAX`.
pub fn append_floor(
    post: &mut Post,
    floor: NewFloor,
    suggested_floor_no: Option<u32>,
) -> Option<Floor> {
    let Some(next) = post.next_floor_no() else {
        warn!(
            "event=append_floor module=reconcile status=skipped reason=floor_numbers_exhausted board={} post_no={}",
            post.board, post.post_no
        );
        return None;
    };
    let floor_no = match suggested_floor_no {
        Some(suggested) if suggested == next => suggested,
        _ => next,
    };

    let stored = floor.into_floor(floor_no);
    post.floors.push(stored.clone());
    post.floors.sort_by_key(|floor| floor.floor_no);
    post.touch(stored.created_at_ms.max(now_epoch_ms()));
    Some(stored)
}

/// Deterministic per-floor identity within one origin message.
pub fn origin_key(
    message_id: u64,
    board: Board,
    post_no: u32,
    block_index: usize,
    floor_index: usize,
) -> String {
    format!(
        "msg:{message_id}:post:{}:{post_no}:floor:{block_index}:{floor_index}",
        board.name()
    )
}

/// Merges `blocks` into `state` in order.
///
/// With `origin_message_id`, every floor gets an origin key and already-seen
/// keys are skipped, so replaying the same message is a no-op. Without it no
/// dedup check is done.
pub fn apply_parsed_blocks(
    state: &mut ForumState,
    blocks: &[ParsedPostBlock],
    source: FloorSource,
    origin_message_id: Option<u64>,
) -> ApplyReport {
    let mut report = ApplyReport::default();

    for (block_index, block) in blocks.iter().enumerate() {
        let existed = state.contains_post(block.board, block.post_no);
        let patch = PostPatch {
            title: block.title.clone(),
            body: block.body.clone(),
        };
        let post = upsert_post(state, block.board, block.post_no, Some(&patch));
        if !existed {
            report.created_posts += 1;
        }

        for (floor_index, parsed) in block.floors.iter().enumerate() {
            let key = origin_message_id.map(|message_id| {
                origin_key(
                    message_id,
                    block.board,
                    block.post_no,
                    block_index,
                    floor_index,
                )
            });
            if let Some(key) = key.as_deref() {
                if post.has_origin_key(key) {
                    continue;
                }
            }

            let appended = append_floor(
                post,
                NewFloor {
                    content: parsed.content.clone(),
                    created_at_ms: now_epoch_ms(),
                    source,
                    origin_key: key,
                    origin_floor_tag_no: parsed.floor_tag_no,
                },
                None,
            );
            match appended {
                Some(_) => report.appended_floors += 1,
                None => report.skipped_floors += 1,
            }
        }
    }

    if let Some(message_id) = origin_message_id {
        state.advance_high_water_mark(message_id);
    }

    info!(
        "event=apply_blocks module=reconcile status=ok source={} blocks={} created_posts={} appended_floors={} skipped_floors={} origin={}",
        source.as_str(),
        blocks.len(),
        report.created_posts,
        report.appended_floors,
        report.skipped_floors,
        origin_message_id.map_or_else(|| "none".to_string(), |id| id.to_string())
    );
    report
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|value| !value.is_empty())
}
