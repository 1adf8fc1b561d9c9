//! Board enumeration.
//!
//! # Responsibility
//! - Define the closed set of forum boards.
//! - Provide the static ordered list used for validation and grammar
//!   alternation building.
//!
//! # Invariants
//! - `Board::ALL` order is the canonical display/serialization order.
//! - Boards are not user-extensible at runtime.

use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};

/// Fixed forum category partitioning posts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Board {
    /// `公告区`
    #[serde(rename = "公告区")]
    Announcements,
    /// `新手引导区`
    #[serde(rename = "新手引导区")]
    Newcomers,
    /// `综合讨论区`
    #[serde(rename = "综合讨论区")]
    General,
    /// `成果展示区`
    #[serde(rename = "成果展示区")]
    Showcase,
    /// `求助区`
    #[serde(rename = "求助区")]
    Help,
}

impl Board {
    /// All boards in canonical order.
    pub const ALL: [Board; 5] = [
        Board::Announcements,
        Board::Newcomers,
        Board::General,
        Board::Showcase,
        Board::Help,
    ];

    /// Returns the board name as it appears in tag names and persisted keys.
    pub fn name(self) -> &'static str {
        match self {
            Self::Announcements => "公告区",
            Self::Newcomers => "新手引导区",
            Self::General => "综合讨论区",
            Self::Showcase => "成果展示区",
            Self::Help => "求助区",
        }
    }

    /// Resolves an exact board name. Surrounding whitespace is not accepted.
    pub fn from_name(value: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|board| board.name() == value)
    }
}

impl Display for Board {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}
