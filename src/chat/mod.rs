pub mod client;
pub mod types;

use async_trait::async_trait;
use std::sync::Arc;

pub use client::ChatClient;
pub use types::{Attachment, ChatMessage, FileUpload, WebhookData, WebhookEvent};

/// The slice of the chat platform API the bot needs
#[async_trait]
pub trait ChatApi: Send + Sync {
    async fn get_message(&self, id: &str) -> anyhow::Result<ChatMessage>;

    async fn fetch_attachment(&self, url: &str) -> anyhow::Result<Attachment>;

    async fn send_text(&self, room_id: &str, text: &str) -> anyhow::Result<()>;

    async fn send_file(&self, room_id: &str, text: &str, file: FileUpload) -> anyhow::Result<()>;
}

#[derive(Debug, thiserror::Error)]
pub enum AttachmentError {
    #[error("message has no attachment")]
    Missing,

    #[error("attachment has content type '{got}', expected one of {expected:?}")]
    WrongType {
        expected: &'static [&'static str],
        got: String,
    },

    #[error("failed to download attachment: {0}")]
    Fetch(String),
}

/// Download the first attachment of a message, checking its content type
/// before anything is written anywhere.
pub async fn fetch_first_attachment(
    chat: &dyn ChatApi,
    message: &ChatMessage,
    accepted: &'static [&'static str],
) -> Result<Attachment, AttachmentError> {
    let url = message.files.first().ok_or(AttachmentError::Missing)?;

    let attachment = chat
        .fetch_attachment(url)
        .await
        .map_err(|e| AttachmentError::Fetch(e.to_string()))?;

    let mime = attachment.mime();
    if !accepted.contains(&mime.as_str()) {
        return Err(AttachmentError::WrongType {
            expected: accepted,
            got: mime,
        });
    }
    Ok(attachment)
}

/// Sends replies into the room a command came from. Delivery failures are
/// logged, never propagated: a lost status line must not stop a run.
#[derive(Clone)]
pub struct RoomNotifier {
    chat: Arc<dyn ChatApi>,
    room_id: String,
}

impl RoomNotifier {
    pub fn new(chat: Arc<dyn ChatApi>, room_id: impl Into<String>) -> Self {
        Self {
            chat,
            room_id: room_id.into(),
        }
    }

    pub fn room_id(&self) -> &str {
        &self.room_id
    }

    pub async fn say(&self, text: impl AsRef<str>) {
        if let Err(e) = self.chat.send_text(&self.room_id, text.as_ref()).await {
            tracing::warn!("Failed to send message to room {}: {}", self.room_id, e);
        }
    }

    /// Returns whether the upload went through
    pub async fn send_file(&self, text: &str, file: FileUpload) -> bool {
        let filename = file.filename.clone();
        match self.chat.send_file(&self.room_id, text, file).await {
            Ok(()) => true,
            Err(e) => {
                tracing::warn!("Failed to upload {} to room {}: {}", filename, self.room_id, e);
                false
            }
        }
    }
}
