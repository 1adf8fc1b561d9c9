use mchan_core::db::open_db_in_memory;
use mchan_core::{
    default_preset, load_state, parse_tagged_blocks, Board, FloorSource, ForumService,
    Generator, GeneratorError, GeneratorReply, KvStore, MemoryKvStore, PresetMode,
    PromptOptions, ServiceError, SqliteKvStore, StoreError, StoreResult,
};

/// Replays canned replies and records the prompts it received.
struct ScriptedGenerator {
    replies: Vec<GeneratorReply>,
    prompts: Vec<String>,
}

impl ScriptedGenerator {
    fn new(replies: Vec<(u64, &str)>) -> Self {
        Self {
            replies: replies
                .into_iter()
                .rev()
                .map(|(message_id, text)| GeneratorReply {
                    text: text.to_string(),
                    message_id,
                })
                .collect(),
            prompts: Vec::new(),
        }
    }
}

impl Generator for ScriptedGenerator {
    fn generate(&mut self, prompt: &str) -> Result<GeneratorReply, GeneratorError> {
        self.prompts.push(prompt.to_string());
        self.replies
            .pop()
            .ok_or_else(|| GeneratorError::new("script exhausted"))
    }
}

/// Reads like an empty store and refuses every write.
struct ReadOnlyStore;

impl KvStore for ReadOnlyStore {
    fn get(&self, _key: &str) -> StoreResult<Option<String>> {
        Ok(None)
    }

    fn set(&self, _key: &str, _value: &str) -> StoreResult<()> {
        Err(StoreError::Backend("read-only".to_string()))
    }
}

const REPLY: &str = "好的，以下是回复：\n<匿名版><求助区帖子1>\
                     <楼层3>试试安全模式</楼层3><楼层4>楼上正解</楼层4>\
                     </求助区帖子1></匿名版>";

#[test]
fn seeded_session_survives_reopen() {
    let store = MemoryKvStore::new();
    {
        let mut service = ForumService::open(&store, "chat-1");
        let report = service.seed(&default_preset(), PresetMode::Append).unwrap();
        assert_eq!(report.created_posts, 4);
    }

    let reopened = ForumService::open(&store, "chat-1");
    assert_eq!(reopened.state().post_count(), 4);
    assert_eq!(ForumService::open(&store, "chat-2").state().post_count(), 0);
}

#[test]
fn exchange_ingests_reply_once_per_message() {
    let store = MemoryKvStore::new();
    let mut service = ForumService::open(&store, "chat");
    service.seed(&default_preset(), PresetMode::Append).unwrap();

    let prompt = service.reply_prompt(Board::Help, 1, None).unwrap();
    let mut generator = ScriptedGenerator::new(vec![(21, REPLY), (21, REPLY)]);

    let first = service.exchange(&mut generator, &prompt).unwrap();
    let second = service.exchange(&mut generator, &prompt).unwrap();
    assert_eq!(first.appended_floors, 2);
    assert_eq!(second.appended_floors, 0);
    assert_eq!(generator.prompts.len(), 2);

    let post = service.state().find_post(Board::Help, 1).unwrap();
    let numbers: Vec<_> = post.floors.iter().map(|floor| floor.floor_no).collect();
    assert_eq!(numbers, vec![1, 2, 3, 4]);
    assert_eq!(post.floors[2].source, FloorSource::Ai);
    assert_eq!(service.state().meta.last_reconciled_message_id, Some(21));

    assert_eq!(&load_state(&store, "chat"), service.state());
}

#[test]
fn exchange_surfaces_generator_failure_without_saving() {
    let store = MemoryKvStore::new();
    let mut service = ForumService::open(&store, "chat");
    let mut generator = ScriptedGenerator::new(Vec::new());

    let err = service.exchange(&mut generator, "prompt").unwrap_err();
    assert!(matches!(err, ServiceError::Generator(_)));
    assert!(store.is_empty());
}

#[test]
fn user_floor_then_followup_prompt_targets_next_range() {
    let store = MemoryKvStore::new();
    let options = PromptOptions {
        floor_batch: 2,
        context_max_floors: 10,
    };
    let mut service = ForumService::with_options(&store, "chat", options);
    service.seed(&default_preset(), PresetMode::Append).unwrap();

    let floor = service
        .post_user_floor(Board::General, 1, "  我也遇到了  ")
        .unwrap();
    assert_eq!(floor.floor_no, 3);
    assert_eq!(floor.content, "我也遇到了");
    assert_eq!(floor.source, FloorSource::User);

    let prompt = service
        .followup_prompt(Board::General, 1, Some("语气轻松"))
        .unwrap();
    let blocks = parse_tagged_blocks(&prompt);
    let tags: Vec<_> = blocks[0]
        .floors
        .iter()
        .map(|floor| floor.floor_tag_no)
        .collect();
    assert_eq!(tags, vec![Some(4), Some(5)]);
}

#[test]
fn user_floor_rejects_blank_content_and_missing_post() {
    let store = MemoryKvStore::new();
    let mut service = ForumService::open(&store, "chat");
    service.seed(&default_preset(), PresetMode::Append).unwrap();

    assert!(matches!(
        service.post_user_floor(Board::General, 1, " \n "),
        Err(ServiceError::EmptyContent)
    ));
    assert!(matches!(
        service.post_user_floor(Board::Showcase, 1, "hello"),
        Err(ServiceError::PostNotFound {
            board: Board::Showcase,
            post_no: 1
        })
    ));
    assert!(matches!(
        service.continue_prompt(Board::Showcase, 3, None),
        Err(ServiceError::PostNotFound { .. })
    ));
}

#[test]
fn new_post_flow_uses_next_free_number() {
    let store = MemoryKvStore::new();
    let mut service = ForumService::open(&store, "chat");
    service.seed(&default_preset(), PresetMode::Append).unwrap();

    let prompt = service
        .new_post_prompt(Board::General, Some("聊聊散热"))
        .unwrap();
    assert!(prompt.contains("<综合讨论区帖子2>"));

    let mut generator = ScriptedGenerator::new(vec![(
        5,
        "<匿名版><综合讨论区帖子2><标题>散热背夹推荐</标题><正文>求推荐</正文>\
         <楼层1>半导体的好用</楼层1></综合讨论区帖子2></匿名版>",
    )]);
    let report = service.exchange(&mut generator, &prompt).unwrap();
    assert_eq!(report.created_posts, 1);

    let post = service.state().find_post(Board::General, 2).unwrap();
    assert_eq!(post.title, "散热背夹推荐");
    assert_eq!(post.floors.len(), 1);
}

#[test]
fn local_post_takes_next_number_and_default_title() {
    let store = MemoryKvStore::new();
    let mut service = ForumService::open(&store, "chat");

    let first = service.create_local_post(Board::Showcase, "  ", "body").unwrap();
    let second = service.create_local_post(Board::Showcase, "mine", "").unwrap();
    assert_eq!(first.post_no, 1);
    assert_eq!(first.title, "成果展示区 帖子1");
    assert_eq!(second.post_no, 2);
    assert_eq!(second.title, "mine");
}

#[test]
fn sqlite_backed_service_persists_across_sessions() {
    let conn = open_db_in_memory().unwrap();
    {
        let mut service = ForumService::open(SqliteKvStore::new(&conn), "chat");
        service
            .ingest(REPLY, FloorSource::Ai, Some(3))
            .unwrap();
    }

    let service = ForumService::open(SqliteKvStore::new(&conn), "chat");
    let post = service.state().find_post(Board::Help, 1).unwrap();
    assert_eq!(post.floors.len(), 2);
    assert_eq!(service.scope(), "chat");
    assert_eq!(
        SqliteKvStore::new(&conn).keys().unwrap(),
        vec!["mchan.v1:chat".to_string()]
    );
}

#[test]
fn post_number_space_exhaustion_is_reported_not_wrapped() {
    let store = MemoryKvStore::new();
    let mut service = ForumService::open(&store, "chat");
    let report = service
        .ingest(
            "<公告区帖子4294967295><楼层1>x</楼层1></公告区帖子4294967295>",
            FloorSource::Ai,
            Some(1),
        )
        .unwrap();
    assert_eq!(report.created_posts, 1);

    assert!(matches!(
        service.new_post_prompt(Board::Announcements, None),
        Err(ServiceError::PostNumbersExhausted {
            board: Board::Announcements
        })
    ));
    let before = service.state().clone();
    assert!(matches!(
        service.create_local_post(Board::Announcements, "t", "b"),
        Err(ServiceError::PostNumbersExhausted { .. })
    ));
    assert_eq!(service.state(), &before);

    // Other boards keep their own numbering.
    assert!(service.new_post_prompt(Board::Help, None).is_ok());
}

#[test]
fn floor_number_space_exhaustion_is_reported_by_service() {
    let store = MemoryKvStore::new();
    store
        .set(
            "mchan.v1:chat",
            r#"{"version":1,"boards":{"求助区":{"posts":[{"postNo":2,"title":"t",
               "floors":[{"floorNo":4294967295,"content":"last","source":"user"}]}]}}}"#,
        )
        .unwrap();
    let mut service = ForumService::open(&store, "chat");
    let before = service.state().clone();

    assert!(matches!(
        service.post_user_floor(Board::Help, 2, "one more"),
        Err(ServiceError::FloorNumbersExhausted {
            board: Board::Help,
            post_no: 2
        })
    ));
    assert_eq!(service.state(), &before);
    for result in [
        service.reply_prompt(Board::Help, 2, None),
        service.followup_prompt(Board::Help, 2, None),
        service.continue_prompt(Board::Help, 2, None),
    ] {
        assert!(matches!(
            result,
            Err(ServiceError::FloorNumbersExhausted { .. })
        ));
    }
}

#[test]
fn failed_save_leaves_state_untouched() {
    let mut service = ForumService::open(ReadOnlyStore, "chat");

    let err = service.ingest(REPLY, FloorSource::Ai, Some(4)).unwrap_err();
    assert!(matches!(err, ServiceError::Store(_)));
    assert_eq!(service.state().post_count(), 0);
    assert_eq!(service.state().meta.last_reconciled_message_id, None);

    assert!(service.create_local_post(Board::General, "t", "").is_err());
    assert!(service.seed(&default_preset(), PresetMode::Append).is_err());
    assert_eq!(service.state().post_count(), 0);
}
