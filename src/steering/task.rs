use crate::client::InboundMessage;
use crate::error::DeliveryError;
use crate::steering::delivery::DeliveryExecutor;
use crate::steering::dedup::DedupWindow;
use crate::steering::filter::{self, FilterVerdict};
use crate::steering::limiter::RateLimiter;
use crate::steering::stats::TaskStats;
use crate::steering::types::TaskConfig;
use arc_swap::ArcSwap;
use std::sync::Arc;
use tokio::sync::{Mutex, mpsc, watch};

/// Redelivery window covered per task; old keys are evicted FIFO.
pub(crate) const DEDUP_CAPACITY: usize = 4096;

/// Shared state of one running steering task. The dedup window and stats are
/// owned here exclusively; the config pointer is swapped by the registry's
/// update path and loaded lock-free per message.
pub(crate) struct TaskRuntime {
    pub config: Arc<ArcSwap<TaskConfig>>,
    pub stats: Arc<Mutex<TaskStats>>,
    pub dedup: Mutex<DedupWindow>,
    pub limiter: RateLimiter,
    pub executor: Arc<DeliveryExecutor>,
    /// Id of the bot's own account; its messages are skipped to prevent
    /// forwarding loops.
    pub self_id: i64,
}

/// Intake loop: consumes routed inbound messages and spawns one independent
/// processing unit per message, so a slow delivery never blocks intake.
/// Exits when the stop signal fires or the intake channel closes.
pub(crate) async fn run(
    runtime: Arc<TaskRuntime>,
    mut intake: mpsc::Receiver<InboundMessage>,
    stop: watch::Receiver<bool>,
) {
    let mut stop_rx = stop.clone();

    loop {
        tokio::select! {
            changed = stop_rx.changed() => {
                if changed.is_err() || *stop_rx.borrow() {
                    break;
                }
            }
            received = intake.recv() => {
                let Some(message) = received else { break };
                let runtime = Arc::clone(&runtime);
                let stop = stop.clone();
                tokio::spawn(async move {
                    process_message(runtime, message, stop).await;
                });
            }
        }
    }

    let task_id = runtime.config.load().task_id.clone();
    tracing::debug!(task_id = %task_id, "intake loop exited");
}

/// Per-message pipeline: guard, dedup, self-skip, counters, filter, delivery
/// through the rate limiter, stats update. Processing errors never change
/// task state.
pub(crate) async fn process_message(
    runtime: Arc<TaskRuntime>,
    message: InboundMessage,
    mut stop: watch::Receiver<bool>,
) {
    let config = runtime.config.load_full();
    if !config.enabled {
        return;
    }

    {
        let mut dedup = runtime.dedup.lock().await;
        if !dedup.insert(message.chat_id, message.message_id) {
            tracing::debug!(
                task_id = %config.task_id,
                chat_id = message.chat_id,
                message_id = message.message_id,
                "duplicate message discarded"
            );
            return;
        }
    }

    if message.sender_id == Some(runtime.self_id) {
        return;
    }

    runtime.stats.lock().await.record_processed();

    match filter::evaluate(&config, &message) {
        FilterVerdict::Reject(reason) => {
            tracing::debug!(task_id = %config.task_id, %reason, "message filtered");
            return;
        }
        FilterVerdict::Pass => {}
    }

    runtime.limiter.acquire().await;

    match runtime.executor.deliver(&config, &message, &mut stop).await {
        Ok(()) => {
            runtime.stats.lock().await.record_forwarded();
            tracing::info!(
                task_id = %config.task_id,
                message_id = message.message_id,
                "message forwarded"
            );
        }
        Err(DeliveryError::Cancelled) => {
            tracing::debug!(task_id = %config.task_id, "delivery abandoned on stop");
        }
        Err(e) => {
            runtime.stats.lock().await.record_failure(e.to_string());
            tracing::error!(task_id = %config.task_id, "delivery failed: {e}");
        }
    }
}
