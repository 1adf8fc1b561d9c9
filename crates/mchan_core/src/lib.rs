//! Core of the anonymous forum ("匿名版") tagged-block protocol.
//!
//! Generator text is parsed into post blocks, reconciled into a persisted
//! multi-board model, and prompt builders ask the generator for more text in
//! the same grammar.

pub mod db;
pub mod grammar;
pub mod logging;
pub mod model;
pub mod parser;
pub mod persist;
pub mod preset;
pub mod prompt;
pub mod reconcile;
pub mod service;
pub mod store;

pub use logging::{default_log_level, init_logging, logging_status, LoggingError};
pub use model::board::Board;
pub use model::post::{default_post_title, Floor, FloorSource, NewFloor, Post};
pub use model::state::{BoardPosts, ForumState, StateMeta, STATE_VERSION};
pub use parser::{parse_tagged_blocks, ParsedFloor, ParsedPostBlock};
pub use persist::{decode_state, encode_state, load_state, save_state, storage_key};
pub use preset::{apply_preset, default_preset, Preset, PresetMode, PresetPost, PresetReport};
pub use prompt::{
    build_continue_prompt, build_followup_prompt, build_new_post_prompt, build_reply_prompt,
    render_context_block, ContinuePromptArgs, FloorRange, FollowupPromptArgs, NewPostPromptArgs,
    PromptOptions, ReplyPromptArgs,
};
pub use reconcile::{
    append_floor, apply_parsed_blocks, origin_key, upsert_post, ApplyReport, PostPatch,
};
pub use service::forum_service::{ForumService, ServiceError, ServiceResult};
pub use service::generator::{Generator, GeneratorError, GeneratorReply};
pub use store::{KvStore, MemoryKvStore, SqliteKvStore, StoreError, StoreResult};

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

#[cfg(test)]
mod tests {
    use super::core_version;

    #[test]
    fn version_is_not_empty() {
        assert!(!core_version().is_empty());
    }
}
