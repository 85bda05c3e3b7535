use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use super::fanout::fan_out;
use super::workspace::RunWorkspace;
use crate::device::{CredentialRole, DeviceSession, SessionError, SessionFactory};

/// How far a device got through configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Stage {
    NotStarted,
    HostnameSet,
    ConfigMerged,
    Snapshotted,
    Done,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::NotStarted => "not started",
            Stage::HostnameSet => "hostname set",
            Stage::ConfigMerged => "config merged",
            Stage::Snapshotted => "snapshotted",
            Stage::Done => "done",
        };
        f.write_str(name)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigureError {
    #[error("payload {} is missing or unreadable: {source}", path.display())]
    MissingPayload {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{step} failed: {source}")]
    Session {
        step: &'static str,
        #[source]
        source: SessionError,
    },

    #[error("could not write running config: {0}")]
    Snapshot(#[from] std::io::Error),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeviceOutcome {
    Done,
    /// `at` is the last stage the device reached before the failure
    Failed { at: Stage, reason: String },
}

/// Per-hostname outcome of one configuration batch
#[derive(Debug, Clone, Default)]
pub struct ConfigureReport {
    outcomes: BTreeMap<String, DeviceOutcome>,
}

impl ConfigureReport {
    pub fn len(&self) -> usize {
        self.outcomes.len()
    }

    pub fn failed(&self) -> BTreeSet<String> {
        self.outcomes
            .iter()
            .filter(|(_, o)| matches!(o, DeviceOutcome::Failed { .. }))
            .map(|(h, _)| h.clone())
            .collect()
    }

    /// Failed devices that were already renamed
    pub fn partially_applied(&self) -> BTreeSet<String> {
        self.outcomes
            .iter()
            .filter(|(_, o)| matches!(o, DeviceOutcome::Failed { at, .. } if *at >= Stage::HostnameSet))
            .map(|(h, _)| h.clone())
            .collect()
    }

    pub fn succeeded(&self) -> BTreeSet<String> {
        self.outcomes
            .iter()
            .filter(|(_, o)| matches!(o, DeviceOutcome::Done))
            .map(|(h, _)| h.clone())
            .collect()
    }
}

/// Configure every `address → hostname` target, snapshotting each device's
/// running config into the workspace.
///
/// Never fails as a whole: a device either ends up in the report's failed set
/// or has a snapshot, and one device's failure never touches another.
pub async fn configure_all(
    factory: Arc<dyn SessionFactory>,
    targets: &BTreeMap<String, String>,
    source_dir: &Path,
    workspace: &RunWorkspace,
    limit: usize,
) -> ConfigureReport {
    let units = targets.iter().map(|(address, hostname)| (address.clone(), hostname.clone()));

    let results = fan_out(units, limit, |(address, hostname)| {
        let factory = factory.clone();
        let payload = source_dir.join(format!("{}.txt", hostname));
        let snapshot = workspace.snapshot_path(&hostname);
        async move { configure_device(factory.as_ref(), &address, &hostname, &payload, &snapshot).await }
    })
    .await;

    let mut report = ConfigureReport::default();
    for ((_, hostname), outcome) in results {
        let outcome = outcome.unwrap_or_else(|| {
            // A worker that died may have left a snapshot behind
            let _ = std::fs::remove_file(workspace.snapshot_path(&hostname));
            DeviceOutcome::Failed {
                at: Stage::NotStarted,
                reason: "worker task failed".to_string(),
            }
        });
        report.outcomes.insert(hostname, outcome);
    }

    tracing::info!(
        "Configured {} of {} devices",
        report.succeeded().len(),
        report.len()
    );
    report
}

async fn configure_device(
    factory: &dyn SessionFactory,
    address: &str,
    hostname: &str,
    payload_path: &Path,
    snapshot_path: &Path,
) -> DeviceOutcome {
    let payload = match tokio::fs::read_to_string(payload_path).await {
        Ok(payload) => payload,
        Err(source) => {
            let e = ConfigureError::MissingPayload {
                path: payload_path.to_path_buf(),
                source,
            };
            tracing::warn!("Skipping {} ({}): {}", hostname, address, e);
            return DeviceOutcome::Failed {
                at: Stage::NotStarted,
                reason: e.to_string(),
            };
        }
    };

    let mut session = factory.session(address, CredentialRole::Device);
    if let Err(source) = session.open().await {
        let e = ConfigureError::Session { step: "open", source };
        tracing::warn!("Failed to configure {} ({}): {}", hostname, address, e);
        return DeviceOutcome::Failed {
            at: Stage::NotStarted,
            reason: e.to_string(),
        };
    }

    let mut stage = Stage::NotStarted;
    let result = apply(session.as_mut(), hostname, &payload, snapshot_path, &mut stage).await;
    let closed = session.close().await;

    let result = match (result, closed) {
        (Ok(()), Ok(())) => {
            stage = Stage::Done;
            Ok(())
        }
        (Ok(()), Err(source)) => {
            // A snapshot only stands for a device that finished cleanly
            let _ = tokio::fs::remove_file(snapshot_path).await;
            Err(ConfigureError::Session { step: "close", source })
        }
        (Err(e), closed) => {
            if let Err(c) = closed {
                tracing::debug!("Closing session to {} ({}) failed: {}", hostname, address, c);
            }
            Err(e)
        }
    };

    match result {
        Ok(()) => {
            tracing::info!("Configured {} ({}): {}", hostname, address, stage);
            DeviceOutcome::Done
        }
        Err(e) => {
            tracing::warn!("Failed to configure {} ({}) after {}: {}", hostname, address, stage, e);
            DeviceOutcome::Failed {
                at: stage,
                reason: e.to_string(),
            }
        }
    }
}

async fn apply(
    session: &mut dyn DeviceSession,
    hostname: &str,
    payload: &str,
    snapshot_path: &Path,
    stage: &mut Stage,
) -> Result<(), ConfigureError> {
    let params = HashMap::from([("hostname".to_string(), hostname.to_string())]);
    session
        .load_template("set_hostname", &params)
        .await
        .map_err(step("set hostname"))?;
    session.commit().await.map_err(step("commit hostname"))?;
    *stage = Stage::HostnameSet;

    session
        .load_merge_candidate(payload)
        .await
        .map_err(step("load config"))?;
    session.commit().await.map_err(step("commit config"))?;
    *stage = Stage::ConfigMerged;

    let running = session.get_config().await.map_err(step("get running config"))?;
    if let Err(e) = tokio::fs::write(snapshot_path, running.as_bytes()).await {
        let _ = tokio::fs::remove_file(snapshot_path).await;
        return Err(e.into());
    }
    *stage = Stage::Snapshotted;
    Ok(())
}

fn step(step: &'static str) -> impl FnOnce(SessionError) -> ConfigureError {
    move |source| ConfigureError::Session { step, source }
}

#[cfg(test)]
impl ConfigureReport {
    pub fn outcome(&self, hostname: &str) -> Option<&DeviceOutcome> {
        self.outcomes.get(hostname)
    }
}
