pub mod ssh;
pub mod templates;

use async_trait::async_trait;
use std::collections::HashMap;

pub use ssh::SshSessionFactory;

/// Which account a session logs in with
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CredentialRole {
    /// The core switch that owns the staging VLAN's ARP table
    Core,
    /// A staged device being identified or configured
    Device,
}

/// Facts reported by a device
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Facts {
    pub hostname: String,
    pub serial_number: String,
    pub model: String,
    pub os_version: String,
}

#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("connection to {host} failed: {reason}")]
    Connect { host: String, reason: String },

    #[error("authentication failed for user '{user}'")]
    Auth { user: String },

    #[error("session is not open")]
    NotOpen,

    #[error("command '{command}' failed: {reason}")]
    Command { command: String, reason: String },

    #[error("device rejected configuration: {0}")]
    Rejected(String),

    #[error("template error: {0}")]
    Template(String),

    #[error("facts unavailable: {0}")]
    Facts(String),

    #[error("session task failed: {0}")]
    Task(String),
}

/// A management session to one device.
///
/// Configuration is staged with `load_template`/`load_merge_candidate` and
/// applied by `commit`, which also clears the candidate.
#[async_trait]
pub trait DeviceSession: Send {
    fn address(&self) -> &str;

    async fn open(&mut self) -> Result<(), SessionError>;

    async fn close(&mut self) -> Result<(), SessionError>;

    async fn get_facts(&mut self) -> Result<Facts, SessionError>;

    /// Current running configuration, verbatim
    async fn get_config(&mut self) -> Result<String, SessionError>;

    /// Run show commands, returning output keyed by command
    async fn cli(&mut self, commands: &[String]) -> Result<HashMap<String, String>, SessionError>;

    async fn load_template(
        &mut self,
        name: &str,
        params: &HashMap<String, String>,
    ) -> Result<(), SessionError>;

    async fn load_merge_candidate(&mut self, config: &str) -> Result<(), SessionError>;

    async fn commit(&mut self) -> Result<(), SessionError>;
}

/// Builds one session per device address per operation
pub trait SessionFactory: Send + Sync {
    fn session(&self, address: &str, role: CredentialRole) -> Box<dyn DeviceSession>;
}

/// Open a device session, read its chassis serial, and close it again.
/// The session is closed on the failure path too.
pub async fn read_serial(factory: &dyn SessionFactory, address: &str) -> Result<String, SessionError> {
    let mut session = factory.session(address, CredentialRole::Device);
    session.open().await?;

    let facts = session.get_facts().await;
    if let Err(e) = session.close().await {
        tracing::debug!("Closing session to {} failed: {}", address, e);
    }

    let facts = facts?;
    tracing::debug!(
        "{} reports hostname '{}' model '{}' version '{}'",
        address,
        facts.hostname,
        facts.model,
        facts.os_version
    );
    let serial = facts.serial_number;
    if serial.trim().is_empty() {
        return Err(SessionError::Facts("device reported an empty serial number".to_string()));
    }
    Ok(serial)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{FakeDevice, FakeSessionFactory};

    #[tokio::test]
    async fn test_read_serial() {
        let factory = FakeSessionFactory::new().with_device("10.0.0.1", FakeDevice::new("FOC1234"));
        assert_eq!(read_serial(&factory, "10.0.0.1").await.unwrap(), "FOC1234");
        assert_eq!(factory.events_for("10.0.0.1"), vec!["open", "get_facts", "close"]);
    }

    #[tokio::test]
    async fn test_read_serial_closes_on_facts_failure() {
        let factory = FakeSessionFactory::new()
            .with_device("10.0.0.1", FakeDevice::new("FOC1234").failing_facts());
        assert!(read_serial(&factory, "10.0.0.1").await.is_err());
        assert_eq!(factory.events_for("10.0.0.1"), vec!["open", "get_facts", "close"]);
    }

    #[tokio::test]
    async fn test_read_serial_rejects_blank_serial() {
        let factory = FakeSessionFactory::new().with_device("10.0.0.1", FakeDevice::new("  "));
        let err = read_serial(&factory, "10.0.0.1").await.unwrap_err();
        assert!(matches!(err, SessionError::Facts(_)));
    }

    #[tokio::test]
    async fn test_read_serial_unreachable() {
        let factory = FakeSessionFactory::new();
        let err = read_serial(&factory, "10.9.9.9").await.unwrap_err();
        assert!(matches!(err, SessionError::Connect { .. }));
    }
}
