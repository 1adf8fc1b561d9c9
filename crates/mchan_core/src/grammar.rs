//! Tag grammar shared by the parser and prompt builders.
//!
//! # Responsibility
//! - Name outer post tags, floor tags and the fixed inner tags.
//! - Normalize and escape tag content.
//!
//! # Invariants
//! - Outer tag names embed the post number, so two sibling blocks never share
//!   a tag name unless they target the same post.
//! - Escaped content never contains ASCII `<` or `>`.

use crate::model::board::Board;

/// Top-level wrapper the generator must emit around its blocks.
pub const SENTINEL_TAG: &str = "匿名版";
/// Inner title tag.
pub const TITLE_TAG: &str = "标题";
/// Inner body tag.
pub const BODY_TAG: &str = "正文";
/// Separator between board name and post number in outer tag names.
pub const POST_TAG_INFIX: &str = "帖子";
/// Prefix of numbered floor tags.
pub const FLOOR_TAG_PREFIX: &str = "楼层";

/// Outer tag name for one post, e.g. `综合讨论区帖子3`.
pub fn post_tag_name(board: Board, post_no: u32) -> String {
    format!("{}{POST_TAG_INFIX}{post_no}", board.name())
}

/// Floor tag name, e.g. `楼层12`.
pub fn floor_tag_name(floor_no: u32) -> String {
    format!("{FLOOR_TAG_PREFIX}{floor_no}")
}

pub fn open_tag(name: &str) -> String {
    format!("<{name}>")
}

pub fn close_tag(name: &str) -> String {
    format!("</{name}>")
}

/// Wraps `content` in an opening/closing pair of `name`.
pub fn wrap_tag(name: &str, content: &str) -> String {
    format!("<{name}>{content}</{name}>")
}

/// Normalizes line endings to LF and trims outer whitespace.
pub fn normalize_content(text: &str) -> String {
    text.replace("\r\n", "\n").trim().to_string()
}

/// Replaces tag delimiters with their full-width forms.
pub fn escape_tag_content(text: &str) -> String {
    text.chars()
        .map(|ch| match ch {
            '<' => '＜',
            '>' => '＞',
            other => other,
        })
        .collect()
}
