use serde::{Deserialize, Serialize};

/// Webhook notification posted by the chat platform when the bot is mentioned
#[derive(Debug, Clone, Deserialize)]
pub struct WebhookEvent {
    #[serde(default)]
    pub resource: Option<String>,
    #[serde(default)]
    pub event: Option<String>,
    pub data: WebhookData,
}

impl WebhookEvent {
    /// Only new messages carry commands. Events that omit the fields are
    /// treated as message notifications.
    pub fn is_message_created(&self) -> bool {
        self.resource.as_deref().map_or(true, |r| r == "messages")
            && self.event.as_deref().map_or(true, |e| e == "created")
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WebhookData {
    /// Message ID; the text itself must be fetched separately
    pub id: String,
    pub room_id: String,
    #[serde(default)]
    pub person_email: Option<String>,
}

/// A chat message as returned by `GET /messages/{id}`
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatMessage {
    pub id: String,
    pub room_id: String,
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub person_email: String,
    /// Attachment content URLs
    #[serde(default)]
    pub files: Vec<String>,
}

/// Downloaded attachment
#[derive(Debug, Clone)]
pub struct Attachment {
    pub content_type: String,
    pub filename: Option<String>,
    pub bytes: Vec<u8>,
}

impl Attachment {
    /// Content type without parameters, lowercased
    pub fn mime(&self) -> String {
        self.content_type
            .split(';')
            .next()
            .unwrap_or_default()
            .trim()
            .to_ascii_lowercase()
    }
}

/// File to post into a room
#[derive(Debug, Clone)]
pub struct FileUpload {
    pub filename: String,
    pub content_type: String,
    pub bytes: Vec<u8>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(super) struct MessageCreate<'a> {
    pub room_id: &'a str,
    pub text: &'a str,
}
