//! Seed catalogs merged into forum state.
//!
//! # Responsibility
//! - Describe static board → post → floor catalogs.
//! - Merge a catalog additively or after clearing each board.
//!
//! # Invariants
//! - Existing post numbers are never overwritten.
//! - Seeded floors are numbered `1..=n` in catalog order with `local` source.

use crate::model::board::Board;
use crate::model::now_epoch_ms;
use crate::model::post::{FloorSource, NewFloor, Post};
use crate::model::state::{sort_posts, ForumState};
use crate::reconcile::append_floor;
use log::info;
use serde::Deserialize;
use std::collections::BTreeMap;

/// One seeded post.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PresetPost {
    pub post_no: u32,
    pub title: String,
    #[serde(default)]
    pub body: String,
    #[serde(default)]
    pub floors: Vec<String>,
}

/// Seed catalog keyed by board name.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(transparent)]
pub struct Preset {
    pub boards: BTreeMap<Board, Vec<PresetPost>>,
}

impl Preset {
    /// Parses a JSON catalog such as `{"公告区": [{"postNo": 1, ...}]}`.
    pub fn from_json(raw: &str) -> serde_json::Result<Self> {
        serde_json::from_str(raw)
    }
}

/// How a preset combines with existing posts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PresetMode {
    /// Keep existing posts; only add missing post numbers.
    Append,
    /// Clear every board first.
    Overwrite,
}

/// Counts reported by `apply_preset`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PresetReport {
    pub created_posts: usize,
    pub seeded_floors: usize,
    pub skipped_posts: usize,
}

/// Merges `preset` into `state`.
pub fn apply_preset(state: &mut ForumState, preset: &Preset, mode: PresetMode) -> PresetReport {
    let now = now_epoch_ms();
    let mut report = PresetReport::default();

    for board in Board::ALL {
        let posts = state.posts_mut(board);
        if mode == PresetMode::Overwrite {
            posts.clear();
        }

        for seed in preset.boards.get(&board).into_iter().flatten() {
            if seed.post_no == 0 || posts.iter().any(|post| post.post_no == seed.post_no) {
                report.skipped_posts += 1;
                continue;
            }

            let mut post = Post::new(board, seed.post_no, &seed.title, &seed.body, now);
            for content in seed.floors.iter().filter(|c| !c.trim().is_empty()) {
                let seeded = append_floor(
                    &mut post,
                    NewFloor::new(content.trim(), FloorSource::Local, now),
                    None,
                );
                if seeded.is_some() {
                    report.seeded_floors += 1;
                }
            }
            post.updated_at_ms = now;
            posts.push(post);
            report.created_posts += 1;
        }
        sort_posts(posts);
    }

    info!(
        "event=apply_preset module=preset status=ok mode={:?} created_posts={} seeded_floors={} skipped_posts={}",
        mode, report.created_posts, report.seeded_floors, report.skipped_posts
    );
    report
}

/// Small built-in catalog used when no preset file is supplied.
pub fn default_preset() -> Preset {
    fn post(post_no: u32, title: &str, body: &str, floors: &[&str]) -> PresetPost {
        PresetPost {
            post_no,
            title: title.to_string(),
            body: body.to_string(),
            floors: floors.iter().map(|floor| floor.to_string()).collect(),
        }
    }

    let mut boards = BTreeMap::new();
    boards.insert(
        Board::Announcements,
        vec![post(
            1,
            "置顶：匿名版守则（简版）",
            "这里是自建匿名版。请勿泄露现实身份信息；版内一切内容均为故事设定。",
            &["欢迎使用。本版由使用者自行搭建，跟官方无关，也不负责售后。"],
        )],
    );
    boards.insert(
        Board::Newcomers,
        vec![post(
            1,
            "[急] 手机太老了，后台开几个应用再开APP就烫得吓人，会影响功能吗？",
            "刚下载，想试试效果。结果手机背面烫得能煎鸡蛋，APP还特别卡。在线等，挺急的。",
            &[
                "楼主什么机型？建议外挂个散热背夹，这APP优化极差。",
                "先杀后台，还卡就老老实实换手机吧。",
                "别硬撑，电池鼓包可不是闹着玩的。",
            ],
        )],
    );
    boards.insert(
        Board::General,
        vec![post(
            1,
            "【悲报】最新版本的耗电量也太异常了",
            "只开了十分钟，手机就烫得不行。夏天根本没法用啊。",
            &[
                "＞＞1 高性能=高发热，这点代价是必须的吧。",
                "我在手机背面贴了退热贴，建议你也试试。",
            ],
        )],
    );
    boards.insert(Board::Showcase, Vec::new());
    boards.insert(
        Board::Help,
        vec![post(
            1,
            "误操作把自己的手机摔碎了，数据还能救吗？",
            "手一滑屏幕全碎，开机只有震动没有画面。",
            &[
                "数据备份了吗？要是账号丢了那才是真悲剧。",
                "先接显示器试试，能亮就赶紧导出。",
            ],
        )],
    );
    Preset { boards }
}

#[cfg(test)]
mod tests {
    use super::{apply_preset, default_preset, Preset, PresetMode};
    use crate::model::board::Board;
    use crate::model::state::ForumState;
    use crate::reconcile::upsert_post;

    #[test]
    fn append_seeds_missing_posts_with_numbered_local_floors() {
        let mut state = ForumState::new();
        let report = apply_preset(&mut state, &default_preset(), PresetMode::Append);
        assert_eq!(report.created_posts, 4);

        let post = state.find_post(Board::Newcomers, 1).unwrap();
        let numbers: Vec<_> = post.floors.iter().map(|f| f.floor_no).collect();
        assert_eq!(numbers, vec![1, 2, 3]);
    }

    #[test]
    fn append_never_overwrites_existing_post() {
        let mut state = ForumState::new();
        upsert_post(&mut state, Board::Announcements, 1, None);
        let report = apply_preset(&mut state, &default_preset(), PresetMode::Append);
        assert_eq!(report.skipped_posts, 1);
        let post = state.find_post(Board::Announcements, 1).unwrap();
        assert_eq!(post.title, "公告区 帖子1");
        assert!(post.floors.is_empty());
    }

    #[test]
    fn overwrite_clears_boards_first() {
        let mut state = ForumState::new();
        upsert_post(&mut state, Board::Showcase, 8, None);
        upsert_post(&mut state, Board::Announcements, 1, None);
        apply_preset(&mut state, &default_preset(), PresetMode::Overwrite);
        assert!(state.posts(Board::Showcase).is_empty());
        assert_eq!(
            state.find_post(Board::Announcements, 1).unwrap().title,
            "置顶：匿名版守则（简版）"
        );
    }

    #[test]
    fn preset_parses_from_json() {
        let preset = Preset::from_json(
            r#"{"求助区": [{"postNo": 3, "title": "t", "floors": ["a", "  ", "b"]}]}"#,
        )
        .unwrap();
        let mut state = ForumState::new();
        let report = apply_preset(&mut state, &preset, PresetMode::Append);
        assert_eq!(report.created_posts, 1);
        assert_eq!(report.seeded_floors, 2);
        assert_eq!(state.find_post(Board::Help, 3).unwrap().body, "");
    }

    #[test]
    fn unknown_board_in_json_is_rejected() {
        assert!(Preset::from_json(r#"{"灌水区": []}"#).is_err());
    }
}
