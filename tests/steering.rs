//! End-to-end engine tests over a scripted protocol client: routing,
//! dedup, filtering counters, retry behavior, and live config updates.

use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use steerbot::client::{ChatClient, ChatEntity, InboundMessage, LinkButton, MediaKind};
use steerbot::error::ClientError;
use steerbot::steering::{
    RegistryOptions, TaskConfig, TaskPatch, TaskRegistry, TaskStore,
};
use tokio::sync::mpsc;
use tokio::time::Duration;

const SELF_ID: i64 = 999;

#[derive(Debug, Clone, PartialEq, Eq)]
struct SentRecord {
    chat_id: i64,
    kind: &'static str,
    text: String,
}

/// Scripted protocol client: resolves from a fixed chat table, replays queued
/// send outcomes (defaulting to success), and records deliveries.
struct MockClient {
    chats: HashMap<String, i64>,
    outcomes: Mutex<VecDeque<Result<(), ClientError>>>,
    sent: Mutex<Vec<SentRecord>>,
    attempts: AtomicUsize,
}

impl MockClient {
    fn new(chats: &[(&str, i64)]) -> Self {
        Self {
            chats: chats
                .iter()
                .map(|(name, id)| ((*name).to_string(), *id))
                .collect(),
            outcomes: Mutex::new(VecDeque::new()),
            sent: Mutex::new(Vec::new()),
            attempts: AtomicUsize::new(0),
        }
    }

    fn script(&self, outcomes: Vec<Result<(), ClientError>>) {
        self.outcomes.lock().unwrap().extend(outcomes);
    }

    fn sent(&self) -> Vec<SentRecord> {
        self.sent.lock().unwrap().clone()
    }

    fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }

    fn next_outcome(&self) -> Result<(), ClientError> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        self.outcomes.lock().unwrap().pop_front().unwrap_or(Ok(()))
    }

    fn record(&self, chat_id: i64, kind: &'static str, text: &str) -> Result<(), ClientError> {
        let outcome = self.next_outcome();
        if outcome.is_ok() {
            self.sent.lock().unwrap().push(SentRecord {
                chat_id,
                kind,
                text: text.to_string(),
            });
        }
        outcome
    }
}

#[async_trait]
impl ChatClient for MockClient {
    async fn me(&self) -> Result<i64, ClientError> {
        Ok(SELF_ID)
    }

    async fn resolve(&self, identifier: &str) -> Result<ChatEntity, ClientError> {
        if let Some(id) = self.chats.get(identifier) {
            return Ok(ChatEntity {
                id: *id,
                title: identifier.to_string(),
            });
        }
        if let Ok(id) = identifier.parse::<i64>() {
            return Ok(ChatEntity {
                id,
                title: identifier.to_string(),
            });
        }
        Err(ClientError::NotFound(identifier.to_string()))
    }

    async fn send_message(
        &self,
        chat_id: i64,
        text: &str,
        _buttons: &[LinkButton],
        _link_preview: bool,
    ) -> Result<(), ClientError> {
        self.record(chat_id, "send", text)
    }

    async fn copy_message(
        &self,
        chat_id: i64,
        _message: &InboundMessage,
        text: &str,
        _buttons: &[LinkButton],
    ) -> Result<(), ClientError> {
        self.record(chat_id, "copy", text)
    }

    async fn forward_message(
        &self,
        chat_id: i64,
        message: &InboundMessage,
    ) -> Result<(), ClientError> {
        self.record(chat_id, "forward", &message.text)
    }

    async fn listen(&self, _tx: mpsc::Sender<InboundMessage>) -> anyhow::Result<()> {
        Ok(())
    }
}

struct Engine {
    registry: Arc<TaskRegistry>,
    client: Arc<MockClient>,
    events: mpsc::Sender<InboundMessage>,
    _dir: tempfile::TempDir,
}

async fn engine_with(tasks: Vec<TaskConfig>, chats: &[(&str, i64)]) -> Engine {
    let dir = tempfile::tempdir().expect("tempdir");
    let store = TaskStore::new(dir.path().join("steering_tasks.json"));
    store.save(&tasks).expect("seed store");

    let client = Arc::new(MockClient::new(chats));
    let options = RegistryOptions {
        validation_timeout: Duration::from_secs(5),
        restart_settle: Duration::from_millis(10),
        min_send_interval: Duration::from_millis(100),
        ..RegistryOptions::default()
    };
    let registry = Arc::new(
        TaskRegistry::new(
            Arc::clone(&client) as Arc<dyn ChatClient>,
            store,
            None,
            options,
        )
        .expect("registry"),
    );
    registry.start_enabled().await;

    let (events, events_rx) = mpsc::channel(64);
    let router = Arc::clone(&registry);
    tokio::spawn(async move { router.dispatch(events_rx).await });

    Engine {
        registry,
        client,
        events,
        _dir: dir,
    }
}

fn text_message(chat_id: i64, message_id: i64, text: &str) -> InboundMessage {
    InboundMessage {
        chat_id,
        message_id,
        sender_id: Some(1),
        text: text.to_string(),
        media: None,
    }
}

/// Advance paused time far enough for intake, retry backoffs, and pacing to
/// drain.
async fn settle() {
    tokio::time::sleep(Duration::from_secs(300)).await;
}

/// Poll (in paused time) until the task has forwarded `count` messages,
/// returning how much virtual time that took.
async fn time_to_forward(engine: &Engine, task_id: &str, count: u64) -> Duration {
    let start = tokio::time::Instant::now();
    loop {
        let (_, forwarded, _) = forwarded_count(engine, task_id).await;
        if forwarded >= count {
            return start.elapsed();
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
}

async fn forwarded_count(engine: &Engine, task_id: &str) -> (u64, u64, u64) {
    let overview = engine.registry.get_all_stats().await;
    let task = overview.get(task_id).expect("task present");
    let stats = task.stats.as_ref().expect("running task has stats");
    (
        stats.messages_processed,
        stats.messages_forwarded,
        stats.messages_failed,
    )
}

#[tokio::test(flavor = "current_thread", start_paused = true)]
async fn duplicate_message_is_delivered_once() {
    let task = TaskConfig::new("t1", "Mirror", "@src", "@dst");
    let engine = engine_with(vec![task], &[("@src", 100), ("@dst", 200)]).await;

    let message = text_message(100, 1, "hello");
    engine.events.send(message.clone()).await.unwrap();
    engine.events.send(message).await.unwrap();
    settle().await;

    assert_eq!(engine.client.sent().len(), 1);
    assert_eq!(forwarded_count(&engine, "t1").await, (1, 1, 0));
}

#[tokio::test(flavor = "current_thread", start_paused = true)]
async fn messages_route_only_to_their_source_task() {
    let first = TaskConfig::new("t1", "First", "@a", "@a-out");
    let second = TaskConfig::new("t2", "Second", "@b", "@b-out");
    let engine = engine_with(
        vec![first, second],
        &[("@a", 100), ("@a-out", 201), ("@b", 101), ("@b-out", 202)],
    )
    .await;

    engine.events.send(text_message(100, 1, "only for t1")).await.unwrap();
    settle().await;

    let sent = engine.client.sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].chat_id, 201);
    assert_eq!(forwarded_count(&engine, "t1").await, (1, 1, 0));
    assert_eq!(forwarded_count(&engine, "t2").await, (0, 0, 0));
}

#[tokio::test(flavor = "current_thread", start_paused = true)]
async fn own_messages_are_never_forwarded() {
    let task = TaskConfig::new("t1", "Mirror", "@src", "@dst");
    let engine = engine_with(vec![task], &[("@src", 100), ("@dst", 200)]).await;

    let mut message = text_message(100, 1, "from the bot itself");
    message.sender_id = Some(SELF_ID);
    engine.events.send(message).await.unwrap();
    settle().await;

    assert!(engine.client.sent().is_empty());
    assert_eq!(forwarded_count(&engine, "t1").await, (0, 0, 0));
}

#[tokio::test(flavor = "current_thread", start_paused = true)]
async fn disabled_media_kind_counts_processed_but_not_forwarded() {
    let mut task = TaskConfig::new("t1", "Mirror", "@src", "@dst");
    task.forward_photos = false;
    let engine = engine_with(vec![task], &[("@src", 100), ("@dst", 200)]).await;

    let message = InboundMessage {
        chat_id: 100,
        message_id: 1,
        sender_id: Some(1),
        text: "caption".to_string(),
        media: Some(MediaKind::Photo),
    };
    engine.events.send(message).await.unwrap();
    settle().await;

    assert!(engine.client.sent().is_empty());
    assert_eq!(forwarded_count(&engine, "t1").await, (1, 0, 0));
}

#[tokio::test(flavor = "current_thread", start_paused = true)]
async fn flood_wait_is_recovered_without_a_failure() {
    let task = TaskConfig::new("t1", "Mirror", "@src", "@dst");
    let engine = engine_with(vec![task], &[("@src", 100), ("@dst", 200)]).await;

    engine
        .client
        .script(vec![Err(ClientError::FloodWait(5)), Ok(())]);
    engine.events.send(text_message(100, 1, "retry me")).await.unwrap();
    settle().await;

    assert_eq!(engine.client.sent().len(), 1);
    assert_eq!(engine.client.attempts(), 2);
    assert_eq!(forwarded_count(&engine, "t1").await, (1, 1, 0));
}

#[tokio::test(flavor = "current_thread", start_paused = true)]
async fn persistent_rpc_failure_records_exactly_one_failure() {
    let mut task = TaskConfig::new("t1", "Mirror", "@src", "@dst");
    task.max_retries = 3;
    let engine = engine_with(vec![task], &[("@src", 100), ("@dst", 200)]).await;

    engine.client.script(vec![
        Err(ClientError::Rpc("500: internal".into())),
        Err(ClientError::Rpc("500: internal".into())),
        Err(ClientError::Rpc("500: internal".into())),
    ]);
    engine.events.send(text_message(100, 1, "doomed")).await.unwrap();
    settle().await;

    assert!(engine.client.sent().is_empty());
    assert_eq!(engine.client.attempts(), 3);
    assert_eq!(forwarded_count(&engine, "t1").await, (1, 0, 1));
}

#[tokio::test(flavor = "current_thread", start_paused = true)]
async fn filter_updates_apply_to_a_running_task_without_restart() {
    let task = TaskConfig::new("t1", "Mirror", "@src", "@dst");
    let engine = engine_with(vec![task], &[("@src", 100), ("@dst", 200)]).await;

    engine.events.send(text_message(100, 1, "spam offer")).await.unwrap();
    settle().await;
    assert_eq!(engine.client.sent().len(), 1);

    let patch = TaskPatch {
        blacklist_enabled: Some(true),
        blacklist_words: Some("spam".to_string()),
        ..TaskPatch::default()
    };
    engine.registry.update_task("t1", patch).await.unwrap();

    engine.events.send(text_message(100, 2, "more spam here")).await.unwrap();
    settle().await;

    assert_eq!(engine.client.sent().len(), 1);
    assert_eq!(forwarded_count(&engine, "t1").await, (2, 1, 0));
}

#[tokio::test(flavor = "current_thread", start_paused = true)]
async fn forward_delay_update_paces_the_next_delivery_without_restart() {
    let task = TaskConfig::new("t1", "Mirror", "@src", "@dst");
    let engine = engine_with(vec![task], &[("@src", 100), ("@dst", 200)]).await;

    // Default delay of 1.0s paces text at 0.3s.
    engine.events.send(text_message(100, 1, "first")).await.unwrap();
    let baseline = time_to_forward(&engine, "t1", 1).await;
    assert!(baseline < Duration::from_secs(1));

    let patch = TaskPatch {
        forward_delay: Some(5.0),
        ..TaskPatch::default()
    };
    engine.registry.update_task("t1", patch).await.unwrap();

    // The very next delivery paces at the new delay (5.0s scaled by the
    // 0.3 text multiplier), with no restart in between.
    engine.events.send(text_message(100, 2, "second")).await.unwrap();
    let paced = time_to_forward(&engine, "t1", 2).await;
    assert!(paced >= Duration::from_secs_f64(1.5));
    assert!(paced < Duration::from_secs(5));
}

#[tokio::test(flavor = "current_thread", start_paused = true)]
async fn source_chat_change_takes_routing_effect_only_after_restart() {
    let task = TaskConfig::new("t1", "Mirror", "@old", "@dst");
    let engine = engine_with(
        vec![task],
        &[("@old", 100), ("@new", 101), ("@dst", 200)],
    )
    .await;

    let patch = TaskPatch {
        source_chat: Some("@new".to_string()),
        ..TaskPatch::default()
    };
    engine.registry.update_task("t1", patch).await.unwrap();

    // Still routed from the old source until restarted.
    engine.events.send(text_message(101, 1, "too early")).await.unwrap();
    engine.events.send(text_message(100, 2, "still routed")).await.unwrap();
    settle().await;
    assert_eq!(engine.client.sent().len(), 1);
    assert_eq!(engine.client.sent()[0].text, "still routed");

    assert!(engine.registry.restart_task("t1").await);

    engine.events.send(text_message(101, 3, "now routed")).await.unwrap();
    engine.events.send(text_message(100, 4, "old source dropped")).await.unwrap();
    settle().await;

    let sent = engine.client.sent();
    assert_eq!(sent.len(), 2);
    assert_eq!(sent[1].text, "now routed");
}

#[tokio::test(flavor = "current_thread", start_paused = true)]
async fn forward_mode_preserves_attribution_path() {
    let mut task = TaskConfig::new("t1", "Mirror", "@src", "@dst");
    task.forward_mode = steerbot::steering::ForwardMode::Forward;
    let engine = engine_with(vec![task], &[("@src", 100), ("@dst", 200)]).await;

    engine.events.send(text_message(100, 1, "as-is")).await.unwrap();
    settle().await;

    let sent = engine.client.sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].kind, "forward");
    assert_eq!(sent[0].chat_id, 200);
}

#[tokio::test(flavor = "current_thread", start_paused = true)]
async fn add_task_persists_and_rejects_duplicates() {
    let engine = engine_with(Vec::new(), &[("@src", 100), ("@dst", 200)]).await;

    let task = TaskConfig::new("fresh", "Fresh", "@src", "@dst");
    engine.registry.add_task(task.clone()).await.unwrap();
    let err = engine.registry.add_task(task).await.unwrap_err();
    assert!(err.to_string().contains("already exists"));

    // A task added at runtime starts on demand and receives traffic.
    assert!(engine.registry.start_task("fresh").await);
    engine.events.send(text_message(100, 1, "routed")).await.unwrap();
    settle().await;
    assert_eq!(engine.client.sent().len(), 1);
}

#[tokio::test(flavor = "current_thread", start_paused = true)]
async fn unresolvable_target_fails_without_retries() {
    let task = TaskConfig::new("t1", "Mirror", "@src", "@missing");
    let engine = engine_with(vec![task], &[("@src", 100)]).await;

    // Target validation fails, so the task never comes up and no traffic
    // is delivered.
    assert!(!engine.registry.start_task("t1").await);
    engine.events.send(text_message(100, 1, "nowhere to go")).await.unwrap();
    settle().await;
    assert!(engine.client.sent().is_empty());
}
