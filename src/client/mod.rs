pub mod split;
pub mod telegram;

use crate::error::ClientError;
use async_trait::async_trait;

/// Classification of an inbound message into exactly one media kind.
///
/// `Music` is audio carrying a title tag; untitled audio is `Audio`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaKind {
    Photo,
    Video,
    Gif,
    Sticker,
    Voice,
    RoundVideo,
    Music,
    Audio,
    File,
    Contact,
    Location,
    Poll,
    Game,
}

/// A message received from the chat protocol.
///
/// `text` holds the message text or the media caption; empty when neither is
/// present. `sender_id` is `None` for anonymous/channel posts.
#[derive(Debug, Clone)]
pub struct InboundMessage {
    pub chat_id: i64,
    pub message_id: i64,
    pub sender_id: Option<i64>,
    pub text: String,
    pub media: Option<MediaKind>,
}

impl InboundMessage {
    pub fn is_plain_text(&self) -> bool {
        self.media.is_none()
    }
}

/// A resolved chat entity.
#[derive(Debug, Clone)]
pub struct ChatEntity {
    pub id: i64,
    pub title: String,
}

/// Inline URL button attached to copy-mode deliveries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkButton {
    pub text: String,
    pub url: String,
}

/// Core protocol-client trait — the engine depends only on this seam.
#[async_trait]
pub trait ChatClient: Send + Sync {
    /// Numeric id of the authenticated account.
    async fn me(&self) -> Result<i64, ClientError>;

    /// Resolve a chat identifier (numeric id or handle) to an entity.
    async fn resolve(&self, identifier: &str) -> Result<ChatEntity, ClientError>;

    /// Send a new text message.
    async fn send_message(
        &self,
        chat_id: i64,
        text: &str,
        buttons: &[LinkButton],
        link_preview: bool,
    ) -> Result<(), ClientError>;

    /// Re-emit a message as new content (copy mode). `text` is the already
    /// transformed text/caption.
    async fn copy_message(
        &self,
        chat_id: i64,
        message: &InboundMessage,
        text: &str,
        buttons: &[LinkButton],
    ) -> Result<(), ClientError>;

    /// Re-send the original message preserving attribution (forward mode).
    async fn forward_message(
        &self,
        chat_id: i64,
        message: &InboundMessage,
    ) -> Result<(), ClientError>;

    /// Push inbound messages into `tx` until the receiver closes (long-running).
    async fn listen(
        &self,
        tx: tokio::sync::mpsc::Sender<InboundMessage>,
    ) -> anyhow::Result<()>;

    fn max_message_length(&self) -> usize {
        usize::MAX
    }
}

/// Resolve a chat identifier with the fallback chain used for configured
/// chats: the identifier as given, then (for channel ids written with the
/// protocol's `-100` prefix) the bare numeric id.
pub async fn resolve_identifier(
    client: &dyn ChatClient,
    raw: &str,
) -> Result<ChatEntity, ClientError> {
    let raw = raw.trim();
    let mut candidates = vec![raw.to_string()];
    if let Some(bare) = raw.strip_prefix("-100")
        && !bare.is_empty()
        && bare.chars().all(|c| c.is_ascii_digit())
    {
        candidates.push(bare.to_string());
    }

    let mut last_error = ClientError::NotFound(raw.to_string());
    for candidate in candidates {
        match client.resolve(&candidate).await {
            Ok(entity) => return Ok(entity),
            Err(e) => last_error = e,
        }
    }
    Err(last_error)
}
