//! Session-scoped forum service.
//!
//! # Responsibility
//! - Load one scope's state, run one mutation, save it back.
//! - Wire parser, reconciler, presets and prompt builders into use-case APIs.
//!
//! # Invariants
//! - State is saved after every mutating call.
//! - A mutating call that fails, including at save time, leaves `state()`
//!   exactly as it was before the call.
//! - Callers serialize access per scope; the service holds no locks.

use crate::model::board::Board;
use crate::model::now_epoch_ms;
use crate::model::post::{Floor, FloorSource, NewFloor, Post};
use crate::model::state::ForumState;
use crate::parser::parse_tagged_blocks;
use crate::persist::{load_state, save_state};
use crate::preset::{apply_preset, Preset, PresetMode, PresetReport};
use crate::prompt::{
    build_continue_prompt, build_followup_prompt, build_new_post_prompt, build_reply_prompt,
    ContinuePromptArgs, FollowupPromptArgs, NewPostPromptArgs, PromptOptions, ReplyPromptArgs,
};
use crate::reconcile::{append_floor, apply_parsed_blocks, upsert_post, ApplyReport, PostPatch};
use crate::service::generator::{Generator, GeneratorError};
use crate::store::{KvStore, StoreError};
use log::{info, warn};
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Service error for forum use-cases.
#[derive(Debug)]
pub enum ServiceError {
    /// Addressed post does not exist.
    PostNotFound { board: Board, post_no: u32 },
    /// Floor content is blank after trim.
    EmptyContent,
    /// Board already holds post `u32::MAX`; no new post number exists.
    PostNumbersExhausted { board: Board },
    /// Post already holds floor `u32::MAX`; no new floor number exists.
    FloorNumbersExhausted { board: Board, post_no: u32 },
    /// Persistence failure while saving.
    Store(StoreError),
    /// Transport failure while exchanging with the generator.
    Generator(GeneratorError),
}

impl Display for ServiceError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::PostNotFound { board, post_no } => {
                write!(f, "post not found: {board} #{post_no}")
            }
            Self::EmptyContent => write!(f, "floor content must not be blank"),
            Self::PostNumbersExhausted { board } => {
                write!(f, "no post numbers left on {board}")
            }
            Self::FloorNumbersExhausted { board, post_no } => {
                write!(f, "no floor numbers left on {board} #{post_no}")
            }
            Self::Store(err) => write!(f, "{err}"),
            Self::Generator(err) => write!(f, "{err}"),
        }
    }
}

impl Error for ServiceError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Store(err) => Some(err),
            Self::Generator(err) => Some(err),
            _ => None,
        }
    }
}

impl From<StoreError> for ServiceError {
    fn from(value: StoreError) -> Self {
        Self::Store(value)
    }
}

impl From<GeneratorError> for ServiceError {
    fn from(value: GeneratorError) -> Self {
        Self::Generator(value)
    }
}

pub type ServiceResult<T> = Result<T, ServiceError>;

/// Forum facade over one session scope of a `KvStore`.
pub struct ForumService<S: KvStore> {
    store: S,
    scope: String,
    options: PromptOptions,
    state: ForumState,
}

impl<S: KvStore> ForumService<S> {
    /// Loads `scope` from `store`. Corrupted values start an empty state.
    pub fn open(store: S, scope: impl Into<String>) -> Self {
        Self::with_options(store, scope, PromptOptions::default())
    }

    /// Same as `open` with explicit prompt options.
    pub fn with_options(store: S, scope: impl Into<String>, options: PromptOptions) -> Self {
        let scope = scope.into();
        let state = load_state(&store, &scope);
        info!(
            "event=session_open module=service status=ok posts={} last_message={}",
            state.post_count(),
            state
                .meta
                .last_reconciled_message_id
                .map_or_else(|| "none".to_string(), |id| id.to_string())
        );
        Self {
            store,
            scope,
            options,
            state,
        }
    }

    pub fn state(&self) -> &ForumState {
        &self.state
    }

    pub fn scope(&self) -> &str {
        &self.scope
    }

    pub fn options(&self) -> &PromptOptions {
        &self.options
    }

    /// Consumes the service, returning the underlying store.
    pub fn into_store(self) -> S {
        self.store
    }

    /// Parses `text`, reconciles it and saves.
    pub fn ingest(
        &mut self,
        text: &str,
        source: FloorSource,
        origin_message_id: Option<u64>,
    ) -> ServiceResult<ApplyReport> {
        let blocks = parse_tagged_blocks(text);
        self.commit(|state| Ok(apply_parsed_blocks(state, &blocks, source, origin_message_id)))
    }

    /// Appends a human-authored floor to an existing post and saves.
    pub fn post_user_floor(
        &mut self,
        board: Board,
        post_no: u32,
        content: &str,
    ) -> ServiceResult<Floor> {
        let content = content.trim();
        if content.is_empty() {
            return Err(ServiceError::EmptyContent);
        }
        self.commit(|state| {
            let post = state
                .find_post_mut(board, post_no)
                .ok_or(ServiceError::PostNotFound { board, post_no })?;
            append_floor(
                post,
                NewFloor::new(content, FloorSource::User, now_epoch_ms()),
                None,
            )
            .ok_or(ServiceError::FloorNumbersExhausted { board, post_no })
        })
    }

    /// Creates a post locally under the next free number and saves.
    pub fn create_local_post(
        &mut self,
        board: Board,
        title: &str,
        body: &str,
    ) -> ServiceResult<Post> {
        let post_no = self
            .state
            .next_post_no(board)
            .ok_or(ServiceError::PostNumbersExhausted { board })?;
        let patch = PostPatch {
            title: Some(title.to_string()),
            body: Some(body.to_string()),
        };
        self.commit(|state| Ok(upsert_post(state, board, post_no, Some(&patch)).clone()))
    }

    /// Merges a seed catalog and saves.
    pub fn seed(&mut self, preset: &Preset, mode: PresetMode) -> ServiceResult<PresetReport> {
        self.commit(|state| Ok(apply_preset(state, preset, mode)))
    }

    /// Reply prompt for an existing post.
    pub fn reply_prompt(
        &self,
        board: Board,
        post_no: u32,
        user_instruction: Option<&str>,
    ) -> ServiceResult<String> {
        let post = self.require_post(board, post_no)?;
        build_reply_prompt(
            &ReplyPromptArgs {
                board,
                post_no,
                last_floor_no: post.last_floor_no(),
                user_instruction,
            },
            &self.options,
        )
        .ok_or(ServiceError::FloorNumbersExhausted { board, post_no })
    }

    /// Follow-up prompt after a human floor.
    pub fn followup_prompt(
        &self,
        board: Board,
        post_no: u32,
        style_hint: Option<&str>,
    ) -> ServiceResult<String> {
        let post = self.require_post(board, post_no)?;
        build_followup_prompt(&FollowupPromptArgs { post, style_hint }, &self.options)
            .ok_or(ServiceError::FloorNumbersExhausted { board, post_no })
    }

    /// Continue-with-context prompt for an existing post.
    pub fn continue_prompt(
        &self,
        board: Board,
        post_no: u32,
        user_instruction: Option<&str>,
    ) -> ServiceResult<String> {
        let post = self.require_post(board, post_no)?;
        build_continue_prompt(
            &ContinuePromptArgs {
                post,
                user_instruction,
            },
            &self.options,
        )
        .ok_or(ServiceError::FloorNumbersExhausted { board, post_no })
    }

    /// New-post prompt for the next free number on `board`.
    pub fn new_post_prompt(
        &self,
        board: Board,
        user_instruction: Option<&str>,
    ) -> ServiceResult<String> {
        let post_no = self
            .state
            .next_post_no(board)
            .ok_or(ServiceError::PostNumbersExhausted { board })?;
        Ok(build_new_post_prompt(&NewPostPromptArgs {
            board,
            post_no,
            user_instruction,
        }))
    }

    /// Sends `prompt` to `generator` and ingests its reply as AI floors.
    pub fn exchange<G: Generator + ?Sized>(
        &mut self,
        generator: &mut G,
        prompt: &str,
    ) -> ServiceResult<ApplyReport> {
        let reply = generator.generate(prompt)?;
        self.ingest(&reply.text, FloorSource::Ai, Some(reply.message_id))
    }

    fn require_post(&self, board: Board, post_no: u32) -> ServiceResult<&Post> {
        self.state
            .find_post(board, post_no)
            .ok_or(ServiceError::PostNotFound { board, post_no })
    }

    /// Runs `mutate` on the state and saves, restoring the prior state if
    /// either step fails.
    fn commit<T>(
        &mut self,
        mutate: impl FnOnce(&mut ForumState) -> ServiceResult<T>,
    ) -> ServiceResult<T> {
        let snapshot = self.state.clone();
        let outcome = mutate(&mut self.state).and_then(|value| {
            save_state(&self.store, &self.scope, &self.state)?;
            Ok(value)
        });
        if let Err(err) = &outcome {
            warn!(
                "event=state_commit module=service status=rolled_back error={}",
                err
            );
            self.state = snapshot;
        }
        outcome
    }
}
