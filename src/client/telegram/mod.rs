pub mod handler;

#[cfg(test)]
mod tests;

use crate::client::{InboundMessage, MediaKind};
use crate::error::ClientError;
use serde_json::Value;

/// Telegram Bot API client — long-polls for updates and performs the
/// send/copy/forward RPCs used by the delivery executor.
pub struct TelegramClient {
    bot_token: String,
    poll_timeout_secs: u64,
    client: reqwest::Client,
}

impl TelegramClient {
    pub fn new(bot_token: String, poll_timeout_secs: u64) -> Self {
        Self {
            bot_token,
            poll_timeout_secs,
            client: reqwest::Client::new(),
        }
    }

    fn api_url(&self, method: &str) -> String {
        format!("https://api.telegram.org/bot{}/{method}", self.bot_token)
    }

    /// Invoke a Bot API method, returning its `result` payload or a
    /// classified error.
    async fn call(&self, method: &str, body: &Value) -> Result<Value, ClientError> {
        let resp = self
            .client
            .post(self.api_url(method))
            .json(body)
            .send()
            .await?;

        let payload: Value = resp.json().await?;
        if payload.get("ok").and_then(Value::as_bool) == Some(true) {
            return Ok(payload.get("result").cloned().unwrap_or(Value::Null));
        }

        Err(classify_api_error(&payload))
    }

    fn poll_timeout_secs(&self) -> u64 {
        self.poll_timeout_secs
    }
}

/// Map a Bot API error payload onto the engine's error taxonomy.
///
/// A 429 with `parameters.retry_after` is the protocol's flood-control
/// signal; a "chat not found" description means the identifier does not
/// resolve; everything else is a generic RPC failure.
fn classify_api_error(payload: &Value) -> ClientError {
    let code = payload.get("error_code").and_then(Value::as_i64).unwrap_or(0);
    let description = payload
        .get("description")
        .and_then(Value::as_str)
        .unwrap_or("unknown error");

    if code == 429 {
        let retry_after = payload
            .get("parameters")
            .and_then(|p| p.get("retry_after"))
            .and_then(Value::as_u64)
            .unwrap_or(1);
        return ClientError::FloodWait(retry_after);
    }

    if description.to_lowercase().contains("chat not found") {
        return ClientError::NotFound(description.to_string());
    }

    ClientError::Rpc(format!("{code}: {description}"))
}

/// Normalize a configured chat identifier into the form the Bot API accepts:
/// numeric ids pass through, `t.me` links and bare handles become `@handle`.
fn normalize_identifier(identifier: &str) -> Value {
    let identifier = identifier.trim();

    if let Ok(id) = identifier.parse::<i64>() {
        return Value::from(id);
    }

    let handle = identifier
        .strip_prefix("https://t.me/")
        .or_else(|| identifier.strip_prefix("http://t.me/"))
        .or_else(|| identifier.strip_prefix("t.me/"))
        .unwrap_or(identifier);
    let handle = handle.trim_matches('/');

    if let Some(bare) = handle.strip_prefix('@') {
        Value::from(format!("@{bare}"))
    } else {
        Value::from(format!("@{handle}"))
    }
}

/// Body for `copyMessage`. The caption is always set, even when empty:
/// omitting the field makes the protocol keep the original caption, which
/// would undo caption cleaning.
fn copy_body(
    chat_id: i64,
    message: &InboundMessage,
    text: &str,
    buttons: &[crate::client::LinkButton],
) -> Value {
    let mut body = serde_json::json!({
        "chat_id": chat_id,
        "from_chat_id": message.chat_id,
        "message_id": message.message_id,
        "caption": text,
    });
    if let Some(markup) = inline_keyboard(buttons) {
        body["reply_markup"] = markup;
    }
    body
}

/// Build the `reply_markup` payload for up to three inline URL buttons:
/// the first two share a row, the third gets its own.
fn inline_keyboard(buttons: &[crate::client::LinkButton]) -> Option<Value> {
    if buttons.is_empty() {
        return None;
    }

    let mut rows: Vec<Value> = Vec::new();
    let mut first_row: Vec<Value> = Vec::new();

    for (index, button) in buttons.iter().take(3).enumerate() {
        let rendered = serde_json::json!({ "text": button.text, "url": button.url });
        if index < 2 {
            first_row.push(rendered);
        } else {
            rows.push(Value::Array(vec![rendered]));
        }
    }

    if !first_row.is_empty() {
        rows.insert(0, Value::Array(first_row));
    }

    Some(serde_json::json!({ "inline_keyboard": rows }))
}

/// Map an update's `message`/`channel_post` object onto the engine's message
/// model. Returns `None` for service messages with no chat or id.
fn parse_message(message: &Value) -> Option<InboundMessage> {
    let chat_id = message.get("chat")?.get("id")?.as_i64()?;
    let message_id = message.get("message_id")?.as_i64()?;
    let sender_id = message
        .get("from")
        .and_then(|f| f.get("id"))
        .and_then(Value::as_i64);

    let text = message
        .get("text")
        .or_else(|| message.get("caption"))
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string();

    Some(InboundMessage {
        chat_id,
        message_id,
        sender_id,
        text,
        media: classify_media(message),
    })
}

/// Classify into exactly one media kind. `animation` is checked before
/// `document`/`video` because gif updates carry both fields.
fn classify_media(message: &Value) -> Option<MediaKind> {
    let has = |field: &str| message.get(field).is_some_and(|v| !v.is_null());

    if has("animation") {
        return Some(MediaKind::Gif);
    }
    if has("photo") {
        return Some(MediaKind::Photo);
    }
    if has("sticker") {
        return Some(MediaKind::Sticker);
    }
    if has("video_note") {
        return Some(MediaKind::RoundVideo);
    }
    if has("voice") {
        return Some(MediaKind::Voice);
    }
    if has("video") {
        return Some(MediaKind::Video);
    }
    if has("audio") {
        let titled = message
            .get("audio")
            .and_then(|a| a.get("title"))
            .and_then(Value::as_str)
            .is_some_and(|t| !t.is_empty());
        return Some(if titled { MediaKind::Music } else { MediaKind::Audio });
    }
    if has("document") {
        return Some(MediaKind::File);
    }
    if has("contact") {
        return Some(MediaKind::Contact);
    }
    if has("location") || has("venue") {
        return Some(MediaKind::Location);
    }
    if has("poll") {
        return Some(MediaKind::Poll);
    }
    if has("game") {
        return Some(MediaKind::Game);
    }

    None
}
