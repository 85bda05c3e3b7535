use axum::{
    extract::{rejection::JsonRejection, State},
    Json,
};
use std::sync::Arc;

use crate::chat::WebhookEvent;
use crate::AppState;

use super::{ApiError, MessageResponse};

/// Receive a chat webhook notification.
/// Answers right away; the command itself runs in the background.
pub async fn receive(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<WebhookEvent>, JsonRejection>,
) -> Result<Json<MessageResponse>, ApiError> {
    let Json(event) = payload.map_err(|e| ApiError::bad_request(e.body_text()))?;

    if !event.is_message_created() {
        tracing::debug!(
            "Ignoring webhook event {:?}/{:?}",
            event.resource,
            event.event
        );
        return Ok(MessageResponse::new("ignored"));
    }

    let commands = state.commands.clone();
    let message_id = event.data.id.clone();
    tokio::spawn(async move {
        if let Err(e) = commands.handle(event.data).await {
            tracing::warn!("Failed to handle message {}: {}", message_id, e);
        }
    });

    Ok(MessageResponse::new("accepted"))
}
