use crate::client::{ChatClient, InboundMessage, resolve_identifier, split};
use crate::config::PacingConfig;
use crate::error::{ClientError, DeliveryError};
use crate::steering::transform;
use crate::steering::types::{ForwardMode, TaskConfig};
use std::sync::Arc;
use tokio::sync::watch;
use tokio::time::{Duration, sleep};

/// Performs copy-or-forward delivery of one message to the task's target,
/// with flood-wait handling, exponential backoff, and post-send pacing.
/// A failed message never stops the task; the caller records the outcome.
pub struct DeliveryExecutor {
    client: Arc<dyn ChatClient>,
    pacing: PacingConfig,
}

impl DeliveryExecutor {
    pub fn new(client: Arc<dyn ChatClient>, pacing: PacingConfig) -> Self {
        Self { client, pacing }
    }

    /// Deliver `message` according to `config`, or fail after exhausting
    /// retries. Every sleep races the stop signal so an in-flight delivery
    /// abandons within one backoff interval of a task stop.
    pub async fn deliver(
        &self,
        config: &TaskConfig,
        message: &InboundMessage,
        stop: &mut watch::Receiver<bool>,
    ) -> Result<(), DeliveryError> {
        // Zero configured retries means the message is never attempted.
        let attempts = config.max_retries;
        let mut last_error = String::from("no delivery attempts configured");

        for attempt in 0..attempts {
            match self.attempt(config, message).await {
                Ok(()) => {
                    self.pace(config, message, stop).await;
                    return Ok(());
                }
                Err(ClientError::NotFound(_)) => {
                    return Err(DeliveryError::TargetUnresolved(config.target_chat.clone()));
                }
                Err(ClientError::FloodWait(secs)) => {
                    let wait = secs.min(self.pacing.flood_wait_cap_secs);
                    tracing::warn!(
                        task_id = %config.task_id,
                        wait,
                        attempt,
                        "flood wait before retry"
                    );
                    last_error = format!("flood wait {secs}s");
                    if sleep_or_stop(Duration::from_secs(wait), stop).await {
                        return Err(DeliveryError::Cancelled);
                    }
                }
                Err(e) => {
                    last_error = e.to_string();
                    if attempt + 1 < attempts {
                        let backoff = Duration::from_secs(1u64 << attempt.min(6));
                        tracing::warn!(
                            task_id = %config.task_id,
                            attempt,
                            backoff_secs = backoff.as_secs(),
                            "delivery failed: {last_error}"
                        );
                        if sleep_or_stop(backoff, stop).await {
                            return Err(DeliveryError::Cancelled);
                        }
                    }
                }
            }
        }

        Err(DeliveryError::RetriesExhausted {
            attempts,
            last_error,
        })
    }

    async fn attempt(
        &self,
        config: &TaskConfig,
        message: &InboundMessage,
    ) -> Result<(), ClientError> {
        let target = resolve_identifier(self.client.as_ref(), &config.target_chat)
            .await?
            .id;

        match config.forward_mode {
            ForwardMode::Forward => self.client.forward_message(target, message).await,
            ForwardMode::Copy => self.send_copy(target, config, message).await,
        }
    }

    async fn send_copy(
        &self,
        target: i64,
        config: &TaskConfig,
        message: &InboundMessage,
    ) -> Result<(), ClientError> {
        let text = transform::transform(config, &message.text);
        let buttons = config.buttons();

        if message.is_plain_text() {
            let pieces = split::split_outbound(&text, self.client.max_message_length());
            if pieces.is_empty() {
                // Cleaning consumed the whole message; nothing to send.
                tracing::debug!(task_id = %config.task_id, "copy reduced to empty text");
                return Ok(());
            }
            for (index, piece) in pieces.iter().enumerate() {
                let last = index + 1 == pieces.len();
                let piece_buttons = if last { buttons.as_slice() } else { &[] };
                self.client
                    .send_message(target, piece, piece_buttons, config.link_preview)
                    .await?;
            }
            Ok(())
        } else {
            self.client
                .copy_message(target, message, &text, &buttons)
                .await
        }
    }

    /// Post-success pacing: `forward_delay` scaled down for plain text and up
    /// for media, to avoid bursts toward one target.
    async fn pace(
        &self,
        config: &TaskConfig,
        message: &InboundMessage,
        stop: &mut watch::Receiver<bool>,
    ) {
        if config.forward_delay <= 0.0 {
            return;
        }

        let delay = if message.is_plain_text() {
            (config.forward_delay * self.pacing.text_multiplier)
                .max(self.pacing.min_text_delay_secs)
        } else {
            config.forward_delay * self.pacing.media_multiplier
        };
        // Multipliers come from config; a negative or non-finite product
        // would panic `Duration::from_secs_f64`.
        let delay = if delay.is_finite() { delay.max(0.0) } else { 0.0 };

        let _ = sleep_or_stop(Duration::from_secs_f64(delay), stop).await;
    }
}

/// Sleep for `duration` unless the stop signal fires first. Returns `true`
/// when the task is stopping.
pub(crate) async fn sleep_or_stop(
    duration: Duration,
    stop: &mut watch::Receiver<bool>,
) -> bool {
    if *stop.borrow() {
        return true;
    }

    tokio::select! {
        () = sleep(duration) => false,
        changed = stop.changed() => match changed {
            Ok(()) => *stop.borrow(),
            // Sender dropped: the task is being torn down.
            Err(_) => true,
        },
    }
}
