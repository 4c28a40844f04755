use super::{TelegramClient, copy_body, inline_keyboard, normalize_identifier, parse_message};
use crate::client::{ChatClient, ChatEntity, InboundMessage, LinkButton};
use crate::error::ClientError;
use async_trait::async_trait;
use serde_json::Value;

#[async_trait]
impl ChatClient for TelegramClient {
    fn max_message_length(&self) -> usize {
        4096
    }

    async fn me(&self) -> Result<i64, ClientError> {
        let result = self.call("getMe", &serde_json::json!({})).await?;
        result
            .get("id")
            .and_then(Value::as_i64)
            .ok_or_else(|| ClientError::Rpc("getMe returned no id".to_string()))
    }

    async fn resolve(&self, identifier: &str) -> Result<ChatEntity, ClientError> {
        let chat_id = normalize_identifier(identifier);
        let result = self
            .call("getChat", &serde_json::json!({ "chat_id": chat_id }))
            .await?;

        let id = result
            .get("id")
            .and_then(Value::as_i64)
            .ok_or_else(|| ClientError::NotFound(identifier.to_string()))?;
        let title = result
            .get("title")
            .or_else(|| result.get("username"))
            .or_else(|| result.get("first_name"))
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();

        Ok(ChatEntity { id, title })
    }

    async fn send_message(
        &self,
        chat_id: i64,
        text: &str,
        buttons: &[LinkButton],
        link_preview: bool,
    ) -> Result<(), ClientError> {
        let mut body = serde_json::json!({
            "chat_id": chat_id,
            "text": text,
            "disable_web_page_preview": !link_preview,
        });
        if let Some(markup) = inline_keyboard(buttons) {
            body["reply_markup"] = markup;
        }

        self.call("sendMessage", &body).await?;
        Ok(())
    }

    async fn copy_message(
        &self,
        chat_id: i64,
        message: &InboundMessage,
        text: &str,
        buttons: &[LinkButton],
    ) -> Result<(), ClientError> {
        let body = copy_body(chat_id, message, text, buttons);
        self.call("copyMessage", &body).await?;
        Ok(())
    }

    async fn forward_message(
        &self,
        chat_id: i64,
        message: &InboundMessage,
    ) -> Result<(), ClientError> {
        let body = serde_json::json!({
            "chat_id": chat_id,
            "from_chat_id": message.chat_id,
            "message_id": message.message_id,
        });

        self.call("forwardMessage", &body).await?;
        Ok(())
    }

    async fn listen(
        &self,
        tx: tokio::sync::mpsc::Sender<InboundMessage>,
    ) -> anyhow::Result<()> {
        let mut offset: i64 = 0;

        tracing::info!("telegram client listening for updates");

        loop {
            let body = serde_json::json!({
                "offset": offset,
                "timeout": self.poll_timeout_secs(),
                "allowed_updates": ["message", "channel_post"],
            });

            let updates = match self.call("getUpdates", &body).await {
                Ok(Value::Array(updates)) => updates,
                Ok(_) => Vec::new(),
                Err(ClientError::FloodWait(secs)) => {
                    tracing::warn!(secs, "telegram poll flood wait");
                    tokio::time::sleep(std::time::Duration::from_secs(secs.min(60))).await;
                    continue;
                }
                Err(e) => {
                    tracing::warn!("telegram poll error: {e}");
                    tokio::time::sleep(std::time::Duration::from_secs(5)).await;
                    continue;
                }
            };

            for update in &updates {
                if let Some(update_id) = update.get("update_id").and_then(Value::as_i64) {
                    offset = update_id + 1;
                }

                let Some(message) = update
                    .get("message")
                    .or_else(|| update.get("channel_post"))
                else {
                    continue;
                };

                let Some(inbound) = parse_message(message) else {
                    continue;
                };

                if tx.send(inbound).await.is_err() {
                    // Receiver closed: the engine is shutting down.
                    return Ok(());
                }
            }
        }
    }
}
