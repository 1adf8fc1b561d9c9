//! Forum domain model.
//!
//! # Responsibility
//! - Define boards, posts, floors and the persisted state root.
//!
//! # Invariants
//! - The board set is closed.
//! - Posts and floors are never deleted by core code.

pub mod board;
pub mod post;
pub mod state;

use std::time::{SystemTime, UNIX_EPOCH};

/// Current wall-clock time in epoch milliseconds.
///
/// Returns `0` if the system clock reports a time before the epoch.
pub fn now_epoch_ms() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| i64::try_from(elapsed.as_millis()).unwrap_or(i64::MAX))
        .unwrap_or(0)
}
