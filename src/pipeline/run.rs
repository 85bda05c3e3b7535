use std::path::PathBuf;
use std::sync::Arc;
use uuid::Uuid;

use super::configure::configure_all;
use super::discovery::{discover, DiscoveryError};
use super::inventory::{reconcile, Inventory, InventoryError};
use super::package::{package, Packaged};
use super::serials::collect_serials;
use super::workspace::RunWorkspace;
use crate::chat::{fetch_first_attachment, AttachmentError, ChatApi, ChatMessage, RoomNotifier};
use crate::config::Config;
use crate::device::SessionFactory;
use crate::replies;

/// Content types accepted for the inventory attachment
pub const INVENTORY_TYPES: &[&str] = &["text/plain"];

/// File the latest inventory is kept in
pub const INVENTORY_FILENAME: &str = "devices.yml";

/// Everything a `/config` run needs from the server configuration
#[derive(Debug, Clone)]
pub struct RunSettings {
    pub core_device: String,
    pub core_vlan: String,
    pub core_exclude: String,
    pub source_dir: PathBuf,
    pub inventory_dir: PathBuf,
    pub running_dir: PathBuf,
    pub max_sessions: usize,
}

impl RunSettings {
    pub fn from_config(cfg: &Config) -> Self {
        Self {
            core_device: cfg.core_device.clone(),
            core_vlan: cfg.core_vlan.clone(),
            core_exclude: cfg.core_exclude.clone(),
            source_dir: cfg.source_config_dir.clone(),
            inventory_dir: cfg.inventory_dir.clone(),
            running_dir: cfg.running_config_dir.clone(),
            max_sessions: cfg.max_concurrent_sessions,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStage {
    ReceivingInventory,
    Discovering,
    CollectingSerials,
    Reconciling,
    Configuring,
    Packaging,
    Reporting,
    Done,
}

#[derive(Debug, thiserror::Error)]
pub enum RunError {
    #[error(transparent)]
    Attachment(#[from] AttachmentError),

    #[error("could not save inventory: {0}")]
    SaveInventory(#[source] std::io::Error),

    #[error(transparent)]
    Inventory(#[from] InventoryError),

    #[error(transparent)]
    Discovery(#[from] DiscoveryError),

    #[error("could not create run workspace: {0}")]
    Workspace(#[source] std::io::Error),
}

impl RunError {
    /// What the operator is told when the run is aborted
    pub fn reply(&self, settings: &RunSettings) -> String {
        match self {
            RunError::Attachment(AttachmentError::WrongType { .. }) => {
                replies::CONFIG_WRONG_TYPE.to_string()
            }
            RunError::Attachment(_) => replies::MISSING_FILE.to_string(),
            RunError::SaveInventory(_) | RunError::Inventory(_) => {
                replies::inventory_invalid(&self.to_string())
            }
            RunError::Discovery(_) => replies::core_unreachable(&settings.core_device),
            RunError::Workspace(_) => replies::CONFIG_NO_WORKSPACE.to_string(),
        }
    }
}

/// One `/config` request, from inventory attachment to running-config archive
pub struct ConfigRun {
    id: Uuid,
    chat: Arc<dyn ChatApi>,
    sessions: Arc<dyn SessionFactory>,
    settings: Arc<RunSettings>,
    notifier: RoomNotifier,
    stage: RunStage,
}

impl ConfigRun {
    pub fn new(
        chat: Arc<dyn ChatApi>,
        sessions: Arc<dyn SessionFactory>,
        settings: Arc<RunSettings>,
        room_id: &str,
    ) -> Self {
        let notifier = RoomNotifier::new(chat.clone(), room_id);
        Self {
            id: Uuid::new_v4(),
            chat,
            sessions,
            settings,
            notifier,
            stage: RunStage::ReceivingInventory,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn stage(&self) -> RunStage {
        self.stage
    }

    fn enter(&mut self, stage: RunStage) {
        tracing::info!("Run {}: {:?} -> {:?}", self.id, self.stage, stage);
        self.stage = stage;
    }

    /// Drive the run to completion. An aborted run has not posted its
    /// failure yet; callers report it with `RunError::reply`.
    pub async fn execute(&mut self, message: &ChatMessage) -> Result<(), RunError> {
        let inventory = self.receive_inventory(message).await?;
        self.notifier.say(replies::CONFIG_RECEIVED).await;
        self.notifier.say(replies::CONFIG_CHECKING).await;

        self.enter(RunStage::Discovering);
        let settings = self.settings.clone();
        let addresses = discover(
            self.sessions.as_ref(),
            &settings.core_device,
            &settings.core_vlan,
            &settings.core_exclude,
        )
        .await?;
        self.notifier.say(replies::detected(&addresses)).await;

        self.enter(RunStage::CollectingSerials);
        let serials = collect_serials(self.sessions.clone(), &addresses, settings.max_sessions).await;
        self.notifier.say(replies::serial_mappings(&serials)).await;

        self.enter(RunStage::Reconciling);
        let reconciliation = reconcile(&serials, &inventory);
        if !reconciliation.ambiguous.is_empty() {
            self.notifier.say(replies::ambiguous(&reconciliation.ambiguous)).await;
        }
        if reconciliation.targets.is_empty() {
            self.notifier.say(replies::CONFIG_NO_MATCHES).await;
            self.enter(RunStage::Done);
            return Ok(());
        }
        self.notifier.say(replies::CONFIG_PRELIM_DONE).await;

        self.enter(RunStage::Configuring);
        let workspace = RunWorkspace::create(&settings.running_dir, &self.id.to_string())
            .map_err(RunError::Workspace)?;
        let report = configure_all(
            self.sessions.clone(),
            &reconciliation.targets,
            &settings.source_dir,
            &workspace,
            settings.max_sessions,
        )
        .await;

        self.enter(RunStage::Packaging);
        let packaged = package(&workspace).await;

        self.enter(RunStage::Reporting);
        let failed = report.failed();
        if failed.is_empty() {
            self.notifier.say(replies::CONFIG_ALL_OK).await;
        } else {
            self.notifier.say(replies::failed(&failed)).await;
            let partial = report.partially_applied();
            if !partial.is_empty() {
                self.notifier.say(replies::partially_applied(&partial)).await;
            }
        }

        match packaged {
            Packaged::Artifact(artifact) => match artifact.to_upload().await {
                Ok(upload) => {
                    tracing::info!("Run {}: uploading {} running configs", self.id, artifact.file_count);
                    self.notifier.send_file(replies::CONFIG_ARCHIVE, upload).await;
                }
                Err(e) => {
                    tracing::warn!("Failed to read archive {}: {}", artifact.path.display(), e);
                    self.notifier.say(replies::CONFIG_NO_ARCHIVE).await;
                }
            },
            Packaged::NoArtifact => self.notifier.say(replies::CONFIG_NO_ARCHIVE).await,
        }

        drop(workspace);
        self.enter(RunStage::Done);
        Ok(())
    }

    /// Fetch, persist, and parse the inventory attachment
    async fn receive_inventory(&mut self, message: &ChatMessage) -> Result<Inventory, RunError> {
        let attachment = fetch_first_attachment(self.chat.as_ref(), message, INVENTORY_TYPES).await?;

        let dir = &self.settings.inventory_dir;
        tokio::fs::create_dir_all(dir)
            .await
            .map_err(RunError::SaveInventory)?;
        tokio::fs::write(dir.join(INVENTORY_FILENAME), &attachment.bytes)
            .await
            .map_err(RunError::SaveInventory)?;

        let inventory = Inventory::parse(&attachment.bytes)?;
        tracing::info!(
            "Run {}: inventory {} lists {} devices",
            self.id,
            attachment.filename.as_deref().unwrap_or(INVENTORY_FILENAME),
            inventory.len()
        );
        Ok(inventory)
    }
}
