//! Forum state persistence adapter.
//!
//! # Responsibility
//! - Encode the state root into the versioned JSON envelope.
//! - Decode persisted values defensively, salvaging records field by field.
//! - Load/save through a caller-scoped key on a `KvStore`.
//!
//! # Invariants
//! - Loading never fails: missing, malformed or unsupported values yield an
//!   empty state.
//! - Decoded posts are sorted by `post_no`, floors by `floor_no`, both
//!   without duplicate numbers.

use crate::model::board::Board;
use crate::model::now_epoch_ms;
use crate::model::post::{default_post_title, Floor, FloorSource, Post};
use crate::model::state::{ForumState, STATE_VERSION};
use crate::store::{KvStore, StoreError, StoreResult};
use log::{info, warn};
use serde_json::{Map, Value};

const STORAGE_KEY_PREFIX: &str = "mchan.v1";
const DEFAULT_SCOPE: &str = "global";
const LEGACY_HIGH_WATER_KEY: &str = "lastParsedAssistantMessageId";

/// Store key for one session scope; blank scopes share `global`.
pub fn storage_key(scope: &str) -> String {
    let scope = scope.trim();
    let scope = if scope.is_empty() { DEFAULT_SCOPE } else { scope };
    format!("{STORAGE_KEY_PREFIX}:{scope}")
}

/// Loads the state for `scope`, falling back to an empty state on any problem.
pub fn load_state<S: KvStore + ?Sized>(store: &S, scope: &str) -> ForumState {
    let key = storage_key(scope);
    match store.get(&key) {
        Ok(Some(raw)) => decode_state(&raw),
        Ok(None) => {
            info!("event=state_load module=persist status=empty reason=missing");
            ForumState::new()
        }
        Err(err) => {
            warn!(
                "event=state_load module=persist status=fallback reason=store_error error={}",
                err
            );
            ForumState::new()
        }
    }
}

/// Saves the full state for `scope`.
pub fn save_state<S: KvStore + ?Sized>(
    store: &S,
    scope: &str,
    state: &ForumState,
) -> StoreResult<()> {
    let raw = encode_state(state)?;
    store.set(&storage_key(scope), &raw)?;
    info!(
        "event=state_save module=persist status=ok posts={} bytes={}",
        state.post_count(),
        raw.len()
    );
    Ok(())
}

/// Serializes the state envelope.
pub fn encode_state(state: &ForumState) -> StoreResult<String> {
    serde_json::to_string(state)
        .map_err(|err| StoreError::Backend(format!("state encoding failed: {err}")))
}

/// Decodes a persisted envelope, salvaging what it can.
pub fn decode_state(raw: &str) -> ForumState {
    let parsed: Value = match serde_json::from_str(raw) {
        Ok(value) => value,
        Err(_) => return fallback("malformed_json"),
    };
    let Some(root) = parsed.as_object() else {
        return fallback("non_object_root");
    };
    if root.get("version").and_then(as_integer) != Some(i64::from(STATE_VERSION)) {
        return fallback("unsupported_version");
    }

    let now = now_epoch_ms();
    let mut state = ForumState::new();
    if let Some(boards) = root.get("boards").and_then(Value::as_object) {
        for board in Board::ALL {
            let Some(posts) = boards
                .get(board.name())
                .and_then(Value::as_object)
                .and_then(|entry| entry.get("posts"))
                .and_then(Value::as_array)
            else {
                continue;
            };

            let mut decoded: Vec<Post> = posts
                .iter()
                .filter_map(Value::as_object)
                .map(|post| decode_post(board, post, now))
                .collect();
            decoded.sort_by_key(|post| post.post_no);
            decoded.dedup_by_key(|post| post.post_no);
            state.posts_mut(board).extend(decoded);
        }
    }

    if let Some(meta) = root.get("meta").and_then(Value::as_object) {
        state.meta.last_reconciled_message_id = meta
            .get("lastReconciledMessageId")
            .or_else(|| meta.get(LEGACY_HIGH_WATER_KEY))
            .and_then(as_message_id);
    }

    state
}

fn decode_post(board: Board, post: &Map<String, Value>, now: i64) -> Post {
    let post_no = post.get("postNo").and_then(as_positive_u32).unwrap_or(1);
    let created_at_ms = post.get("createdAtMs").and_then(as_epoch_ms).unwrap_or(now);
    let mut floors: Vec<Floor> = post
        .get("floors")
        .and_then(Value::as_array)
        .map(|floors| {
            floors
                .iter()
                .filter_map(Value::as_object)
                .map(|floor| decode_floor(floor, now))
                .collect()
        })
        .unwrap_or_default();
    floors.sort_by_key(|floor| floor.floor_no);
    floors.dedup_by_key(|floor| floor.floor_no);

    Post {
        board,
        post_no,
        title: post
            .get("title")
            .and_then(Value::as_str)
            .map(str::to_string)
            .unwrap_or_else(|| default_post_title(board, post_no)),
        body: post
            .get("body")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string(),
        created_at_ms,
        updated_at_ms: post
            .get("updatedAtMs")
            .and_then(as_epoch_ms)
            .unwrap_or(created_at_ms),
        floors,
    }
}

fn decode_floor(floor: &Map<String, Value>, now: i64) -> Floor {
    Floor {
        floor_no: floor.get("floorNo").and_then(as_positive_u32).unwrap_or(1),
        content: floor
            .get("content")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string(),
        created_at_ms: floor.get("createdAtMs").and_then(as_epoch_ms).unwrap_or(now),
        source: floor
            .get("source")
            .and_then(Value::as_str)
            .and_then(FloorSource::parse)
            .unwrap_or(FloorSource::Local),
        origin_key: floor
            .get("originKey")
            .and_then(Value::as_str)
            .map(str::to_string),
        origin_floor_tag_no: floor
            .get("originFloorTagNo")
            .and_then(as_integer)
            .and_then(|value| u32::try_from(value).ok()),
    }
}

fn fallback(reason: &str) -> ForumState {
    warn!("event=state_load module=persist status=fallback reason={reason}");
    ForumState::new()
}

/// Integral JSON number, accepting integral floats such as `3.0`.
fn as_integer(value: &Value) -> Option<i64> {
    if let Some(value) = value.as_i64() {
        return Some(value);
    }
    let float = value.as_f64()?;
    if float.is_finite() && float.fract() == 0.0 && float.abs() < i64::MAX as f64 {
        Some(float as i64)
    } else {
        None
    }
}

fn as_positive_u32(value: &Value) -> Option<u32> {
    as_integer(value)
        .filter(|value| *value > 0)
        .and_then(|value| u32::try_from(value).ok())
}

fn as_epoch_ms(value: &Value) -> Option<i64> {
    if let Some(value) = as_integer(value) {
        return Some(value);
    }
    value
        .as_f64()
        .filter(|float| float.is_finite() && float.abs() < i64::MAX as f64)
        .map(|float| float.trunc() as i64)
}

fn as_message_id(value: &Value) -> Option<u64> {
    as_integer(value).and_then(|value| u64::try_from(value).ok())
}
