pub mod commands;
pub mod upload;

use std::sync::Arc;

use crate::chat::{AttachmentError, ChatApi, ChatMessage, RoomNotifier, WebhookData};
use crate::device::{read_serial, SessionFactory};
use crate::pipeline::{ConfigRun, RunSettings};
use crate::replies;
use crate::utils::is_valid_address;

pub use commands::{Command, SenderPolicy};
use upload::{receive_archive, UploadError};

/// Turns webhook notifications into bot actions
pub struct CommandService {
    chat: Arc<dyn ChatApi>,
    sessions: Arc<dyn SessionFactory>,
    policy: SenderPolicy,
    settings: Arc<RunSettings>,
}

impl CommandService {
    pub fn new(
        chat: Arc<dyn ChatApi>,
        sessions: Arc<dyn SessionFactory>,
        policy: SenderPolicy,
        settings: RunSettings,
    ) -> Self {
        Self {
            chat,
            sessions,
            policy,
            settings: Arc::new(settings),
        }
    }

    /// Handle one "message created" notification.
    /// Messages from the bot itself or from outside the allowed domain are dropped.
    pub async fn handle(&self, data: WebhookData) -> anyhow::Result<()> {
        if let Some(email) = &data.person_email {
            if self.policy.is_self(email) {
                return Ok(());
            }
        }

        let message = self.chat.get_message(&data.id).await?;
        if !self.policy.allows(&message.person_email) {
            tracing::debug!("Ignoring message {} from {}", message.id, message.person_email);
            return Ok(());
        }

        let room = if message.room_id.is_empty() {
            data.room_id.clone()
        } else {
            message.room_id.clone()
        };
        let notifier = RoomNotifier::new(self.chat.clone(), room);
        let command = Command::parse(message.text.as_deref().unwrap_or_default());
        tracing::info!("Command {:?} from {}", command, message.person_email);

        match command {
            Command::Serial(address) => self.serial(&notifier, address).await,
            Command::Upload => self.upload(&notifier, &message).await,
            Command::Config => self.config(&notifier, &message).await,
            Command::Unknown => notifier.say(replies::UNKNOWN_COMMAND).await,
        }
        Ok(())
    }

    async fn serial(&self, notifier: &RoomNotifier, address: Option<String>) {
        let Some(address) = address.filter(|a| is_valid_address(a)) else {
            notifier.say(replies::SERIAL_NO_ADDRESS).await;
            return;
        };

        notifier.say(replies::serial_checking(&address)).await;
        match read_serial(self.sessions.as_ref(), &address).await {
            Ok(serial) => notifier.say(replies::serial_result(&address, &serial)).await,
            Err(e) => {
                tracing::warn!("Serial lookup for {} failed: {}", address, e);
                notifier.say(replies::serial_failed(&address)).await;
            }
        }
    }

    async fn upload(&self, notifier: &RoomNotifier, message: &ChatMessage) {
        let target = &self.settings.source_dir;
        match receive_archive(self.chat.as_ref(), message, target).await {
            Ok(_) => {
                notifier
                    .say(replies::upload_done(&target.display().to_string()))
                    .await
            }
            Err(UploadError::Attachment(AttachmentError::WrongType { got, .. })) => {
                tracing::info!("Rejected upload with content type {}", got);
                notifier.say(replies::UPLOAD_WRONG_TYPE).await;
            }
            Err(e) => {
                tracing::warn!("Upload failed: {}", e);
                notifier.say(replies::MISSING_FILE).await;
            }
        }
    }

    async fn config(&self, notifier: &RoomNotifier, message: &ChatMessage) {
        let mut run = ConfigRun::new(
            self.chat.clone(),
            self.sessions.clone(),
            self.settings.clone(),
            notifier.room_id(),
        );
        if let Err(e) = run.execute(message).await {
            tracing::warn!("Run {} aborted during {:?}: {}", run.id(), run.stage(), e);
            notifier.say(e.reply(&self.settings)).await;
        }
    }
}
