use crate::client::{ChatClient, InboundMessage, resolve_identifier};
use crate::config::{Config, LegacyForwardingConfig, PacingConfig};
use crate::error::{ClientError, RegistryError};
use crate::steering::delivery::DeliveryExecutor;
use crate::steering::dedup::DedupWindow;
use crate::steering::limiter::RateLimiter;
use crate::steering::stats::TaskStats;
use crate::steering::store::TaskStore;
use crate::steering::task::{self, DEDUP_CAPACITY, TaskRuntime};
use crate::steering::types::{TaskConfig, TaskPatch};
use anyhow::Result;
use arc_swap::ArcSwap;
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tokio::sync::{Mutex, OnceCell, mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::{Duration, timeout};

/// Buffered messages per task intake; the dispatcher drops on overflow so a
/// slow task never blocks routing for the others.
const INTAKE_BUFFER: usize = 256;

// ── Options ──────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct RegistryOptions {
    pub pacing: PacingConfig,
    /// Bound on chat-access validation during task start.
    pub validation_timeout: Duration,
    /// Settle delay between stop and start during restart.
    pub restart_settle: Duration,
    /// Minimum interval between sends for one task.
    pub min_send_interval: Duration,
}

impl Default for RegistryOptions {
    fn default() -> Self {
        Self {
            pacing: PacingConfig::default(),
            validation_timeout: Duration::from_secs(20),
            restart_settle: Duration::from_millis(500),
            min_send_interval: Duration::from_millis(1000),
        }
    }
}

impl RegistryOptions {
    pub fn from_config(config: &Config) -> Self {
        Self {
            pacing: config.pacing.clone(),
            validation_timeout: Duration::from_secs(config.reliability.validation_timeout_secs),
            restart_settle: Duration::from_millis(config.reliability.restart_settle_ms),
            min_send_interval: Duration::from_millis(config.reliability.min_send_interval_ms),
        }
    }
}

// ── Snapshot types ───────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    Running,
    Stopped,
}

impl TaskStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Running => "running",
            Self::Stopped => "stopped",
        }
    }
}

/// Point-in-time view of one task for `get_all_stats`.
#[derive(Debug, Clone, Serialize)]
pub struct TaskOverview {
    pub name: String,
    pub status: TaskStatus,
    pub source_chat: String,
    pub target_chat: String,
    pub stats: Option<TaskStats>,
}

// ── Internal slots ───────────────────────────────────────────────

struct RunningTask {
    source_id: i64,
    stop: watch::Sender<bool>,
    handle: JoinHandle<()>,
    stats: Arc<Mutex<TaskStats>>,
}

struct TaskSlot {
    config: Arc<ArcSwap<TaskConfig>>,
    running: Option<RunningTask>,
}

#[derive(Default)]
struct Slots {
    /// Persisted order: insertion order of `add`, as loaded from the store.
    order: Vec<String>,
    tasks: HashMap<String, TaskSlot>,
}

struct RouteEntry {
    task_id: String,
    intake: mpsc::Sender<InboundMessage>,
}

// ── Registry ─────────────────────────────────────────────────────

/// Owns the shared protocol client, the set of steering tasks, and the
/// persisted task store. All configuration mutation funnels through this API;
/// the registry is the store's only writer.
pub struct TaskRegistry {
    client: Arc<dyn ChatClient>,
    store: TaskStore,
    options: RegistryOptions,
    slots: Mutex<Slots>,
    router: Mutex<HashMap<i64, Vec<RouteEntry>>>,
    self_id: OnceCell<i64>,
}

impl TaskRegistry {
    /// Load (or seed from legacy settings) the persisted task list and build
    /// the registry. Invalid records are skipped with a warning rather than
    /// failing startup.
    pub fn new(
        client: Arc<dyn ChatClient>,
        store: TaskStore,
        legacy: Option<&LegacyForwardingConfig>,
        options: RegistryOptions,
    ) -> Result<Self> {
        let mut slots = Slots::default();
        for config in store.load_or_seed(legacy)? {
            if let Err(e) = config.validate() {
                tracing::warn!(task_id = %config.task_id, "skipping invalid task record: {e}");
                continue;
            }
            if slots.tasks.contains_key(&config.task_id) {
                tracing::warn!(task_id = %config.task_id, "skipping duplicate task record");
                continue;
            }
            slots.order.push(config.task_id.clone());
            slots.tasks.insert(
                config.task_id.clone(),
                TaskSlot {
                    config: Arc::new(ArcSwap::from_pointee(config)),
                    running: None,
                },
            );
        }
        tracing::info!(count = slots.order.len(), "loaded steering task configurations");

        Ok(Self {
            client,
            store,
            options,
            slots: Mutex::new(slots),
            router: Mutex::new(HashMap::new()),
            self_id: OnceCell::new(),
        })
    }

    // ── Mutation API ─────────────────────────────────────────────

    pub async fn add_task(&self, config: TaskConfig) -> Result<(), RegistryError> {
        config.validate()?;

        let mut slots = self.slots.lock().await;
        if slots.tasks.contains_key(&config.task_id) {
            return Err(RegistryError::DuplicateTask(config.task_id));
        }

        let task_id = config.task_id.clone();
        slots.order.push(task_id.clone());
        slots.tasks.insert(
            task_id.clone(),
            TaskSlot {
                config: Arc::new(ArcSwap::from_pointee(config)),
                running: None,
            },
        );

        if let Err(e) = self.persist(&slots) {
            // Roll back so a failed write leaves no phantom task behind.
            slots.order.retain(|id| *id != task_id);
            slots.tasks.remove(&task_id);
            return Err(e);
        }

        tracing::info!(task_id = %task_id, "steering task added");
        Ok(())
    }

    pub async fn remove_task(&self, task_id: &str) -> Result<(), RegistryError> {
        let running = {
            let mut slots = self.slots.lock().await;
            let slot = slots
                .tasks
                .get_mut(task_id)
                .ok_or_else(|| RegistryError::NotFound(task_id.to_string()))?;
            slot.running.take()
        };
        if let Some(running) = running {
            self.shut_down(task_id, running).await;
        }

        let mut slots = self.slots.lock().await;
        let Some(slot) = slots.tasks.remove(task_id) else {
            return Err(RegistryError::NotFound(task_id.to_string()));
        };
        let index = slots.order.iter().position(|id| id == task_id);
        slots.order.retain(|id| id != task_id);

        if let Err(e) = self.persist(&slots) {
            if let Some(index) = index {
                slots.order.insert(index, task_id.to_string());
            } else {
                slots.order.push(task_id.to_string());
            }
            slots.tasks.insert(task_id.to_string(), slot);
            return Err(e);
        }

        tracing::info!(task_id = %task_id, "steering task removed");
        Ok(())
    }

    /// Merge a patch into the task's config, persist, and swap the live
    /// snapshot. A running task observes the new config on its next message,
    /// except for `source_chat`: routing keeps the old source until an
    /// explicit restart.
    pub async fn update_task(&self, task_id: &str, patch: TaskPatch) -> Result<(), RegistryError> {
        let slots = self.slots.lock().await;
        let slot = slots
            .tasks
            .get(task_id)
            .ok_or_else(|| RegistryError::NotFound(task_id.to_string()))?;

        let mut updated = (*slot.config.load_full()).clone();
        let source_changed = patch.apply(&mut updated);
        updated.validate()?;

        // Persist first: either the write succeeds and the live task picks
        // the config up, or the update is rejected outright.
        let records: Vec<TaskConfig> = slots
            .order
            .iter()
            .filter_map(|id| slots.tasks.get(id))
            .map(|s| (*s.config.load_full()).clone())
            .map(|c| if c.task_id == task_id { updated.clone() } else { c })
            .collect();
        self.store
            .save(&records)
            .map_err(|e| RegistryError::Persist(e.to_string()))?;

        slot.config.store(Arc::new(updated));
        if source_changed && slot.running.is_some() {
            tracing::warn!(
                task_id = %task_id,
                "source_chat changed on a running task; restart required to re-route"
            );
        }
        tracing::info!(task_id = %task_id, "steering task updated");
        Ok(())
    }

    // ── Lifecycle API ────────────────────────────────────────────

    /// Start a task: validate chat access (bounded), bind its intake route,
    /// and spawn its intake loop. Returns `false` when the task is unknown,
    /// already running, or validation fails; the task stays stopped.
    pub async fn start_task(&self, task_id: &str) -> bool {
        let config_handle = {
            let slots = self.slots.lock().await;
            let Some(slot) = slots.tasks.get(task_id) else {
                tracing::warn!(task_id = %task_id, "cannot start unknown task");
                return false;
            };
            if slot.running.is_some() {
                tracing::warn!(task_id = %task_id, "task is already running");
                return false;
            }
            Arc::clone(&slot.config)
        };
        let config = config_handle.load_full();

        let Some(source) = self.validate_chat(task_id, &config.source_chat).await else {
            return false;
        };
        if self.validate_chat(task_id, &config.target_chat).await.is_none() {
            return false;
        }
        let self_id = match self.self_id().await {
            Ok(id) => id,
            Err(e) => {
                tracing::warn!(task_id = %task_id, "failed to identify own account: {e}");
                return false;
            }
        };

        let stats = Arc::new(Mutex::new(TaskStats::new()));
        let (intake_tx, intake_rx) = mpsc::channel(INTAKE_BUFFER);
        let (stop_tx, stop_rx) = watch::channel(false);
        let runtime = Arc::new(TaskRuntime {
            config: Arc::clone(&config_handle),
            stats: Arc::clone(&stats),
            dedup: Mutex::new(DedupWindow::new(DEDUP_CAPACITY)),
            limiter: RateLimiter::new(self.options.min_send_interval),
            executor: Arc::new(DeliveryExecutor::new(
                Arc::clone(&self.client),
                self.options.pacing.clone(),
            )),
            self_id,
        });
        let handle = tokio::spawn(task::run(runtime, intake_rx, stop_rx));

        let mut slots = self.slots.lock().await;
        let Some(slot) = slots.tasks.get_mut(task_id) else {
            // Removed while we were validating.
            let _ = stop_tx.send(true);
            return false;
        };
        if slot.running.is_some() {
            let _ = stop_tx.send(true);
            return false;
        }

        self.router
            .lock()
            .await
            .entry(source.id)
            .or_default()
            .push(RouteEntry {
                task_id: task_id.to_string(),
                intake: intake_tx,
            });
        slot.running = Some(RunningTask {
            source_id: source.id,
            stop: stop_tx,
            handle,
            stats,
        });

        tracing::info!(
            task_id = %task_id,
            source = %config.source_chat,
            target = %config.target_chat,
            "steering task started"
        );
        true
    }

    /// Stop a task: unbind its route, signal stop, and wait briefly for the
    /// intake loop to drain. Returns `false` when the task is unknown or not
    /// running.
    pub async fn stop_task(&self, task_id: &str) -> bool {
        let running = {
            let mut slots = self.slots.lock().await;
            let Some(slot) = slots.tasks.get_mut(task_id) else {
                tracing::warn!(task_id = %task_id, "cannot stop unknown task");
                return false;
            };
            match slot.running.take() {
                Some(running) => running,
                None => {
                    tracing::warn!(task_id = %task_id, "task is not running");
                    return false;
                }
            }
        };

        self.shut_down(task_id, running).await;
        tracing::info!(task_id = %task_id, "steering task stopped");
        true
    }

    /// Stop, settle, start. Also the documented path for a `source_chat`
    /// change to take routing effect.
    pub async fn restart_task(&self, task_id: &str) -> bool {
        let _ = self.stop_task(task_id).await;
        tokio::time::sleep(self.options.restart_settle).await;
        self.start_task(task_id).await
    }

    /// Start every enabled task, returning how many came up.
    pub async fn start_enabled(&self) -> usize {
        let candidates: Vec<String> = {
            let slots = self.slots.lock().await;
            slots
                .order
                .iter()
                .filter(|id| {
                    slots
                        .tasks
                        .get(*id)
                        .is_some_and(|slot| slot.config.load().enabled)
                })
                .cloned()
                .collect()
        };

        let mut started = 0;
        for task_id in candidates {
            if self.start_task(&task_id).await {
                started += 1;
            }
        }
        started
    }

    /// Stop every running task (shutdown path).
    pub async fn stop_all(&self) {
        let running: Vec<String> = {
            let slots = self.slots.lock().await;
            slots
                .order
                .iter()
                .filter(|id| slots.tasks.get(*id).is_some_and(|s| s.running.is_some()))
                .cloned()
                .collect()
        };
        for task_id in running {
            let _ = self.stop_task(&task_id).await;
        }
    }

    // ── Query API ────────────────────────────────────────────────

    pub async fn get_task(&self, task_id: &str) -> Option<TaskConfig> {
        let slots = self.slots.lock().await;
        slots
            .tasks
            .get(task_id)
            .map(|slot| (*slot.config.load_full()).clone())
    }

    /// Point-in-time snapshot of every task's config summary, running state,
    /// and statistics. Stopped tasks report no stats.
    pub async fn get_all_stats(&self) -> BTreeMap<String, TaskOverview> {
        let slots = self.slots.lock().await;
        let mut overview = BTreeMap::new();

        for (task_id, slot) in &slots.tasks {
            let config = slot.config.load();
            let (status, stats) = match &slot.running {
                Some(running) => (
                    TaskStatus::Running,
                    Some(running.stats.lock().await.clone()),
                ),
                None => (TaskStatus::Stopped, None),
            };
            overview.insert(
                task_id.clone(),
                TaskOverview {
                    name: config.name.clone(),
                    status,
                    source_chat: config.source_chat.clone(),
                    target_chat: config.target_chat.clone(),
                    stats,
                },
            );
        }

        overview
    }

    // ── Event routing ────────────────────────────────────────────

    /// Route inbound messages to the tasks registered for their source chat
    /// until the channel closes. Messages for chats with no running task are
    /// dropped; a full intake drops the message for that task only.
    pub async fn dispatch(&self, mut events: mpsc::Receiver<InboundMessage>) {
        while let Some(message) = events.recv().await {
            let router = self.router.lock().await;
            let Some(entries) = router.get(&message.chat_id) else {
                continue;
            };
            for entry in entries {
                if entry.intake.try_send(message.clone()).is_err() {
                    tracing::debug!(
                        task_id = %entry.task_id,
                        chat_id = message.chat_id,
                        "intake unavailable; message dropped for this task"
                    );
                }
            }
        }
    }

    // ── Internals ────────────────────────────────────────────────

    async fn self_id(&self) -> Result<i64, ClientError> {
        self.self_id
            .get_or_try_init(|| async { self.client.me().await })
            .await
            .copied()
    }

    async fn validate_chat(
        &self,
        task_id: &str,
        identifier: &str,
    ) -> Option<crate::client::ChatEntity> {
        match timeout(
            self.options.validation_timeout,
            resolve_identifier(self.client.as_ref(), identifier),
        )
        .await
        {
            Ok(Ok(entity)) => Some(entity),
            Ok(Err(e)) => {
                tracing::warn!(task_id = %task_id, chat = %identifier, "chat validation failed: {e}");
                None
            }
            Err(_) => {
                tracing::warn!(task_id = %task_id, chat = %identifier, "chat validation timed out");
                None
            }
        }
    }

    async fn shut_down(&self, task_id: &str, running: RunningTask) {
        {
            let mut router = self.router.lock().await;
            if let Some(entries) = router.get_mut(&running.source_id) {
                entries.retain(|entry| entry.task_id != task_id);
                if entries.is_empty() {
                    router.remove(&running.source_id);
                }
            }
        }

        let _ = running.stop.send(true);
        if timeout(Duration::from_secs(5), running.handle).await.is_err() {
            tracing::warn!(task_id = %task_id, "intake loop slow to exit");
        }
    }

    fn persist(&self, slots: &Slots) -> Result<(), RegistryError> {
        let records: Vec<TaskConfig> = slots
            .order
            .iter()
            .filter_map(|id| slots.tasks.get(id))
            .map(|slot| (*slot.config.load_full()).clone())
            .collect();
        self.store
            .save(&records)
            .map_err(|e| RegistryError::Persist(e.to_string()))
    }
}
