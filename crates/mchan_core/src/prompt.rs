//! Prompt builders that ask the generator for tagged output.
//!
//! # Responsibility
//! - Render instruction text that encodes the tag grammar for four flows:
//!   reply, AI follow-up, new post, and continue-with-context.
//! - Compute the exact floor range the generator must fill.
//!
//! # Invariants
//! - Every builder is a pure function of its arguments.
//! - Reply-style builders return `None` when the post has no floor numbers
//!   left; a range near `u32::MAX` is shortened, never wrapped.
//! - The only literal `<匿名版>` region in a prompt is the output template, so
//!   feeding a prompt back through the parser sees the template alone.
//! - Quoted context is escaped and rendered outside the template.

use crate::grammar::{
    close_tag, escape_tag_content, floor_tag_name, open_tag, post_tag_name, wrap_tag, BODY_TAG,
    SENTINEL_TAG, TITLE_TAG,
};
use crate::model::board::Board;
use crate::model::post::Post;
use serde::Deserialize;

const DEFAULT_FLOOR_BATCH: usize = 6;
const DEFAULT_CONTEXT_MAX_FLOORS: usize = 30;

/// Tunables shared by the builders.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct PromptOptions {
    /// Floors requested per reply-style prompt.
    pub floor_batch: usize,
    /// Most recent floors quoted as context.
    pub context_max_floors: usize,
}

impl Default for PromptOptions {
    fn default() -> Self {
        Self {
            floor_batch: DEFAULT_FLOOR_BATCH,
            context_max_floors: DEFAULT_CONTEXT_MAX_FLOORS,
        }
    }
}

impl PromptOptions {
    fn batch(&self) -> u32 {
        u32::try_from(self.floor_batch.max(1)).unwrap_or(u32::MAX)
    }

    fn context_limit(&self) -> usize {
        self.context_max_floors.max(1)
    }
}

/// Inclusive floor range a prompt asks for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FloorRange {
    pub start: u32,
    pub end: u32,
}

impl FloorRange {
    /// `last + 1 ..= last + count`, cut off at `u32::MAX`.
    ///
    /// `None` when `last_floor_no` is already `u32::MAX`.
    pub fn after(last_floor_no: u32, count: u32) -> Option<Self> {
        let start = last_floor_no.checked_add(1)?;
        Some(Self {
            start,
            end: start.saturating_add(count.max(1) - 1),
        })
    }

    /// The single first floor of a new post.
    pub fn first() -> Self {
        Self { start: 1, end: 1 }
    }

    /// Number of floors in the range, always at least one.
    pub fn count(&self) -> u32 {
        self.end - self.start + 1
    }
}

/// Reply to an existing post without quoting it.
#[derive(Debug, Clone, Copy)]
pub struct ReplyPromptArgs<'a> {
    pub board: Board,
    pub post_no: u32,
    pub last_floor_no: u32,
    pub user_instruction: Option<&'a str>,
}

/// AI follow-up after the human just posted a floor on `post`.
#[derive(Debug, Clone, Copy)]
pub struct FollowupPromptArgs<'a> {
    pub post: &'a Post,
    pub style_hint: Option<&'a str>,
}

/// Brand-new post with a fixed number.
#[derive(Debug, Clone, Copy)]
pub struct NewPostPromptArgs<'a> {
    pub board: Board,
    pub post_no: u32,
    pub user_instruction: Option<&'a str>,
}

/// Continue an existing post, quoting its recent floors.
#[derive(Debug, Clone, Copy)]
pub struct ContinuePromptArgs<'a> {
    pub post: &'a Post,
    pub user_instruction: Option<&'a str>,
}

pub fn build_reply_prompt(
    args: &ReplyPromptArgs<'_>,
    options: &PromptOptions,
) -> Option<String> {
    let range = FloorRange::after(args.last_floor_no, options.batch())?;
    let mut lines = vec![
        format!(
            "用户正在浏览匿名版「{}」的帖子 {}，你需要为它生成回复楼层。",
            args.board, args.post_no
        ),
        format!(
            "当前最后楼层是 {}。请生成 {} 个新楼层（楼层号从 {} 到 {}）。",
            args.last_floor_no,
            range.count(),
            range.start,
            range.end
        ),
    ];
    push_instruction(&mut lines, "用户补充要求", args.user_instruction);
    push_output_contract(&mut lines);
    push_floor_template(
        &mut lines,
        args.board,
        args.post_no,
        None,
        range,
        "（在这里写楼层内容）",
    );
    Some(join_lines(lines))
}

/// Follow-up builder. Quotes the post so the generator keeps the same format.
pub fn build_followup_prompt(
    args: &FollowupPromptArgs<'_>,
    options: &PromptOptions,
) -> Option<String> {
    let post = args.post;
    let range = FloorRange::after(post.last_floor_no(), options.batch())?;
    let mut lines = vec![
        format!(
            "用户刚在匿名版「{}」的帖子 {} 里发言，你需要模仿其他匿名用户继续回复。",
            post.board, post.post_no
        ),
        format!(
            "你要生成 {} 个新楼层（楼层号从 {} 到 {}）。",
            range.count(),
            range.start,
            range.end
        ),
    ];
    push_instruction(&mut lines, "额外要求", args.style_hint);
    push_context(&mut lines, post, options.context_limit());
    push_output_contract(&mut lines);
    lines.push("- 回复要像真实匿名版：可以短句、口语，偶尔用 ＞＞No.楼层号 引用".to_string());
    push_floor_template(
        &mut lines,
        post.board,
        post.post_no,
        None,
        range,
        "（以匿名用户口吻写内容）",
    );
    Some(join_lines(lines))
}

/// New-post builder. Asks for title, body and the first floor.
pub fn build_new_post_prompt(args: &NewPostPromptArgs<'_>) -> String {
    let mut lines = vec![format!(
        "用户正在为匿名版「{}」创建一个新帖子，帖子序号必须是 {}（不要改序号）。",
        args.board, args.post_no
    )];
    push_instruction(&mut lines, "用户补充要求", args.user_instruction);
    push_output_contract(&mut lines);
    push_floor_template(
        &mut lines,
        args.board,
        args.post_no,
        Some(("（在这里写标题）", "（在这里写正文）")),
        FloorRange::first(),
        "（在这里写首楼内容）",
    );
    join_lines(lines)
}

/// Continue builder. Like the reply builder but quotes recent context.
pub fn build_continue_prompt(
    args: &ContinuePromptArgs<'_>,
    options: &PromptOptions,
) -> Option<String> {
    let post = args.post;
    let range = FloorRange::after(post.last_floor_no(), options.batch())?;
    let mut lines = vec![
        format!(
            "请继续匿名版「{}」的帖子 {}「{}」。",
            post.board,
            post.post_no,
            escape_tag_content(&post.title)
        ),
        format!(
            "当前最后楼层是 {}。请生成 {} 个新楼层（楼层号从 {} 到 {}），内容要接得上已有楼层。",
            post.last_floor_no(),
            range.count(),
            range.start,
            range.end
        ),
    ];
    push_instruction(&mut lines, "用户补充要求", args.user_instruction);
    push_context(&mut lines, post, options.context_limit());
    push_output_contract(&mut lines);
    push_floor_template(
        &mut lines,
        post.board,
        post.post_no,
        None,
        range,
        "（在这里写楼层内容）",
    );
    Some(join_lines(lines))
}

/// Renders `post` in the tag grammar with at most `max_floors` recent floors.
///
/// Returns the block and whether older floors were omitted.
pub fn render_context_block(post: &Post, max_floors: usize) -> (String, bool) {
    let max_floors = max_floors.max(1);
    let truncated = post.floors.len() > max_floors;
    let selected = &post.floors[post.floors.len().saturating_sub(max_floors)..];

    let tag = post_tag_name(post.board, post.post_no);
    let mut lines = Vec::with_capacity(selected.len() + 4);
    lines.push(open_tag(&tag));
    lines.push(wrap_tag(TITLE_TAG, &escape_tag_content(&post.title)));
    lines.push(wrap_tag(BODY_TAG, &escape_tag_content(&post.body)));
    for floor in selected {
        lines.push(wrap_tag(
            &floor_tag_name(floor.floor_no),
            &escape_tag_content(&floor.content),
        ));
    }
    lines.push(close_tag(&tag));
    (lines.join("\n"), truncated)
}

fn push_instruction(lines: &mut Vec<String>, label: &str, instruction: Option<&str>) {
    if let Some(instruction) = instruction.map(str::trim).filter(|value| !value.is_empty()) {
        lines.push(format!("{label}：{instruction}"));
    }
}

fn push_context(lines: &mut Vec<String>, post: &Post, max_floors: usize) {
    let (block, truncated) = render_context_block(post, max_floors);
    lines.push("引用（帖子标题/正文/已有楼层，作为上文与格式示例）：".to_string());
    if truncated {
        lines.push(format!("（上文已截断：仅包含最近{max_floors}楼）"));
    }
    lines.push(block);
}

fn push_output_contract(lines: &mut Vec<String>) {
    lines.push("输出要求：".to_string());
    lines.push(format!(
        "- 必须严格只输出下方模板中的标签结构，整体用{SENTINEL_TAG}标签包裹"
    ));
    lines.push("- 不要输出任何额外文字/解释".to_string());
    lines.push("- 不要输出 Markdown 代码块/反引号".to_string());
    lines.push("- 标题/正文/楼层内容中避免出现 < 或 >（如必须使用请改用全角＜＞）".to_string());
}

fn push_floor_template(
    lines: &mut Vec<String>,
    board: Board,
    post_no: u32,
    title_and_body: Option<(&str, &str)>,
    range: FloorRange,
    placeholder: &str,
) {
    let tag = post_tag_name(board, post_no);
    lines.push(open_tag(SENTINEL_TAG));
    lines.push(open_tag(&tag));
    if let Some((title, body)) = title_and_body {
        lines.push(wrap_tag(TITLE_TAG, title));
        lines.push(wrap_tag(BODY_TAG, body));
    }
    for floor_no in range.start..=range.end {
        lines.push(wrap_tag(&floor_tag_name(floor_no), placeholder));
    }
    lines.push(close_tag(&tag));
    lines.push(close_tag(SENTINEL_TAG));
}

fn join_lines(lines: Vec<String>) -> String {
    lines
        .into_iter()
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}
