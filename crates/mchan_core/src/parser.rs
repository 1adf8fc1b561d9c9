//! Tagged-block parser for generator output.
//!
//! # Responsibility
//! - Extract post blocks (`<Board帖子N>…</Board帖子N>`) and their title, body
//!   and numbered floors from arbitrary free text.
//!
//! # Invariants
//! - Pure function of the input text and the fixed board list.
//! - Malformed fragments are skipped, never fatal.
//! - Floors are only scanned inside the slice bounded by their own block.
//! - When non-blank `<匿名版>` regions exist, text outside them is ignored.

use crate::grammar::{
    close_tag, normalize_content, BODY_TAG, FLOOR_TAG_PREFIX, POST_TAG_INFIX, SENTINEL_TAG,
    TITLE_TAG,
};
use crate::model::board::Board;
use log::debug;
use once_cell::sync::Lazy;
use regex::Regex;

static POST_OPEN_RE: Lazy<Regex> = Lazy::new(|| {
    let boards = Board::ALL
        .iter()
        .map(|board| regex::escape(board.name()))
        .collect::<Vec<_>>()
        .join("|");
    Regex::new(&format!(
        "<(?P<board>{boards}){POST_TAG_INFIX}(?P<no>[0-9]+)>"
    ))
    .expect("valid post open regex")
});
static FLOOR_OPEN_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(&format!("<{FLOOR_TAG_PREFIX}(?P<no>[0-9]+)>")).expect("valid floor open regex")
});
static TITLE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(&format!("(?s)<{TITLE_TAG}>(.*?)</{TITLE_TAG}>")).expect("valid title regex")
});
static BODY_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(&format!("(?s)<{BODY_TAG}>(.*?)</{BODY_TAG}>")).expect("valid body regex")
});
static SENTINEL_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(&format!("(?s)<{SENTINEL_TAG}>(.*?)</{SENTINEL_TAG}>"))
        .expect("valid sentinel regex")
});

/// One floor as written by the generator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedFloor {
    /// Number from the floor tag. Provenance only.
    pub floor_tag_no: Option<u32>,
    /// Normalized, non-empty content.
    pub content: String,
}

/// One post block in text order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedPostBlock {
    pub board: Board,
    pub post_no: u32,
    pub title: Option<String>,
    pub body: Option<String>,
    pub floors: Vec<ParsedFloor>,
}

/// Parses every well-formed post block in `text`.
pub fn parse_tagged_blocks(text: &str) -> Vec<ParsedPostBlock> {
    let normalized = normalize_content(text);
    if normalized.is_empty() {
        return Vec::new();
    }

    let regions = sentinel_regions(&normalized);
    let mut blocks = Vec::new();
    let mut skipped = 0usize;
    let mut ignored_outside = 0usize;
    if regions.is_empty() {
        scan_blocks(&normalized, &mut blocks, &mut skipped);
    } else {
        for region in &regions {
            scan_blocks(region, &mut blocks, &mut skipped);
        }
        ignored_outside = count_openers_outside(&normalized, &regions);
    }

    debug!(
        "event=parse_blocks module=parser status=ok regions={} blocks={} skipped={} ignored_outside={}",
        regions.len(),
        blocks.len(),
        skipped,
        ignored_outside
    );
    blocks
}

/// Post opening tags in `text` that fall outside every sentinel region.
fn count_openers_outside(text: &str, regions: &[&str]) -> usize {
    let total = POST_OPEN_RE.find_iter(text).count();
    let inside: usize = regions
        .iter()
        .map(|region| POST_OPEN_RE.find_iter(region).count())
        .sum();
    total.saturating_sub(inside)
}

fn sentinel_regions(text: &str) -> Vec<&str> {
    SENTINEL_RE
        .captures_iter(text)
        .filter_map(|caps| caps.get(1))
        .map(|m| m.as_str())
        .filter(|region| !region.trim().is_empty())
        .collect()
}

fn scan_blocks(text: &str, blocks: &mut Vec<ParsedPostBlock>, skipped: &mut usize) {
    let mut cursor = 0;
    while let Some(caps) = POST_OPEN_RE.captures_at(text, cursor) {
        let (Some(open), Some(board_match), Some(no_match)) =
            (caps.get(0), caps.name("board"), caps.name("no"))
        else {
            break;
        };

        let tag_name = &text[open.start() + 1..open.end() - 1];
        let closing = close_tag(tag_name);
        let Some(inner_len) = text[open.end()..].find(closing.as_str()) else {
            // Unclosed block: resume right after its opening tag.
            *skipped += 1;
            cursor = open.end();
            continue;
        };
        let inner = &text[open.end()..open.end() + inner_len];
        cursor = open.end() + inner_len + closing.len();

        let Some(board) = Board::from_name(board_match.as_str()) else {
            *skipped += 1;
            continue;
        };
        let post_no = match no_match.as_str().parse::<u32>() {
            Ok(value) if value > 0 => value,
            _ => {
                *skipped += 1;
                continue;
            }
        };

        blocks.push(ParsedPostBlock {
            board,
            post_no,
            title: first_capture(&TITLE_RE, inner),
            body: first_capture(&BODY_RE, inner),
            floors: scan_floors(inner),
        });
    }
}

fn scan_floors(inner: &str) -> Vec<ParsedFloor> {
    let mut floors = Vec::new();
    let mut cursor = 0;
    while let Some(caps) = FLOOR_OPEN_RE.captures_at(inner, cursor) {
        let (Some(open), Some(no_match)) = (caps.get(0), caps.name("no")) else {
            break;
        };

        let tag_name = &inner[open.start() + 1..open.end() - 1];
        let closing = close_tag(tag_name);
        let Some(content_len) = inner[open.end()..].find(closing.as_str()) else {
            cursor = open.end();
            continue;
        };
        let raw = &inner[open.end()..open.end() + content_len];
        cursor = open.end() + content_len + closing.len();

        let content = normalize_content(raw);
        if content.is_empty() {
            continue;
        }
        floors.push(ParsedFloor {
            floor_tag_no: no_match.as_str().parse::<u32>().ok(),
            content,
        });
    }
    floors
}

fn first_capture(re: &Regex, inner: &str) -> Option<String> {
    re.captures(inner)
        .and_then(|caps| caps.get(1))
        .map(|m| normalize_content(m.as_str()))
        .filter(|value| !value.is_empty())
}
