//! In-memory stand-ins for devices and the chat platform.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::chat::{Attachment, ChatApi, ChatMessage, FileUpload};
use crate::device::{templates, CredentialRole, DeviceSession, Facts, SessionError, SessionFactory};

/// Scripted behaviour of one fake device
#[derive(Debug, Clone)]
pub struct FakeDevice {
    serial: String,
    running: String,
    fail_open: bool,
    fail_facts: bool,
    fail_get_config: bool,
    fail_close: bool,
    fail_commit: Option<usize>,
    arp_table: Option<String>,
}

impl FakeDevice {
    pub fn new(serial: &str) -> Self {
        Self {
            serial: serial.to_string(),
            running: "!\ninterface Vlan1\n no ip address\n!\nend\n".to_string(),
            fail_open: false,
            fail_facts: false,
            fail_get_config: false,
            fail_close: false,
            fail_commit: None,
            arp_table: None,
        }
    }

    pub fn failing_open(mut self) -> Self {
        self.fail_open = true;
        self
    }

    pub fn failing_facts(mut self) -> Self {
        self.fail_facts = true;
        self
    }

    pub fn failing_get_config(mut self) -> Self {
        self.fail_get_config = true;
        self
    }

    pub fn failing_close(mut self) -> Self {
        self.fail_close = true;
        self
    }

    /// Fail the nth commit of a session (1-based)
    pub fn failing_commit(mut self, nth: usize) -> Self {
        self.fail_commit = Some(nth);
        self
    }

    /// Answer `show ip arp` queries from this table, applying any
    /// `| exclude a|b` alternation the way IOS does
    pub fn with_arp_table(mut self, output: &str) -> Self {
        self.arp_table = Some(output.to_string());
        self
    }

    fn show_ip_arp(&self, command: &str) -> Option<String> {
        let table = self.arp_table.as_ref()?;
        let query = command.strip_prefix("show ip arp")?;
        let excluded: Vec<&str> = match query.split_once("| exclude ") {
            Some((_, pattern)) => pattern.split('|').collect(),
            None => Vec::new(),
        };
        Some(
            table
                .split_inclusive('\n')
                .filter(|line| !excluded.iter().any(|p| line.contains(p)))
                .collect(),
        )
    }
}

#[derive(Default)]
struct Shared {
    events: Mutex<Vec<(String, String)>>,
    roles: Mutex<Vec<(String, CredentialRole)>>,
    in_flight: AtomicUsize,
    peak: AtomicUsize,
}

#[derive(Clone, Default)]
pub struct FakeSessionFactory {
    devices: HashMap<String, FakeDevice>,
    shared: Arc<Shared>,
    open_delay: Option<Duration>,
}

impl FakeSessionFactory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_device(mut self, address: &str, device: FakeDevice) -> Self {
        self.devices.insert(address.to_string(), device);
        self
    }

    pub fn with_open_delay(mut self, delay: Duration) -> Self {
        self.open_delay = Some(delay);
        self
    }

    pub fn events_for(&self, address: &str) -> Vec<String> {
        self.shared
            .events
            .lock()
            .unwrap()
            .iter()
            .filter(|(a, _)| a == address)
            .map(|(_, e)| e.clone())
            .collect()
    }

    pub fn roles(&self) -> Vec<(String, CredentialRole)> {
        self.shared.roles.lock().unwrap().clone()
    }

    /// Highest number of sessions open at the same time
    pub fn peak_sessions(&self) -> usize {
        self.shared.peak.load(Ordering::SeqCst)
    }
}

impl SessionFactory for FakeSessionFactory {
    fn session(&self, address: &str, role: CredentialRole) -> Box<dyn DeviceSession> {
        self.shared
            .roles
            .lock()
            .unwrap()
            .push((address.to_string(), role));
        Box::new(FakeSession {
            address: address.to_string(),
            device: self.devices.get(address).cloned(),
            shared: self.shared.clone(),
            open_delay: self.open_delay,
            open: false,
            hostname: "Switch".to_string(),
            candidate: Vec::new(),
            merged: Vec::new(),
            commits: 0,
        })
    }
}

struct FakeSession {
    address: String,
    device: Option<FakeDevice>,
    shared: Arc<Shared>,
    open_delay: Option<Duration>,
    open: bool,
    hostname: String,
    candidate: Vec<String>,
    merged: Vec<String>,
    commits: usize,
}

impl FakeSession {
    fn record(&self, event: &str) {
        self.shared
            .events
            .lock()
            .unwrap()
            .push((self.address.clone(), event.to_string()));
    }

    fn device(&self) -> Result<&FakeDevice, SessionError> {
        if !self.open {
            return Err(SessionError::NotOpen);
        }
        self.device.as_ref().ok_or(SessionError::NotOpen)
    }
}

#[async_trait]
impl DeviceSession for FakeSession {
    fn address(&self) -> &str {
        &self.address
    }

    async fn open(&mut self) -> Result<(), SessionError> {
        self.record("open");
        let refused = || SessionError::Connect {
            host: self.address.clone(),
            reason: "connection refused".to_string(),
        };
        match &self.device {
            Some(d) if !d.fail_open => {}
            _ => return Err(refused()),
        }
        let now = self.shared.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.shared.peak.fetch_max(now, Ordering::SeqCst);
        if let Some(delay) = self.open_delay {
            tokio::time::sleep(delay).await;
        }
        self.open = true;
        Ok(())
    }

    async fn close(&mut self) -> Result<(), SessionError> {
        self.record("close");
        if self.open {
            self.open = false;
            self.shared.in_flight.fetch_sub(1, Ordering::SeqCst);
        }
        match &self.device {
            Some(d) if d.fail_close => Err(SessionError::Command {
                command: "exit".to_string(),
                reason: "channel reset".to_string(),
            }),
            _ => Ok(()),
        }
    }

    async fn get_facts(&mut self) -> Result<Facts, SessionError> {
        self.record("get_facts");
        let device = self.device()?;
        if device.fail_facts {
            return Err(SessionError::Facts("show version timed out".to_string()));
        }
        Ok(Facts {
            hostname: self.hostname.clone(),
            serial_number: device.serial.clone(),
            ..Default::default()
        })
    }

    async fn get_config(&mut self) -> Result<String, SessionError> {
        self.record("get_config");
        let device = self.device()?;
        if device.fail_get_config {
            return Err(SessionError::Command {
                command: "show running-config".to_string(),
                reason: "channel closed".to_string(),
            });
        }
        let mut running = format!("hostname {}\n", self.hostname);
        for line in &self.merged {
            running.push_str(line);
            running.push('\n');
        }
        running.push_str(&device.running);
        Ok(running)
    }

    async fn cli(&mut self, commands: &[String]) -> Result<HashMap<String, String>, SessionError> {
        self.record("cli");
        let device = self.device()?;
        commands
            .iter()
            .map(|c| {
                device
                    .show_ip_arp(c)
                    .map(|out| (c.clone(), out))
                    .ok_or_else(|| SessionError::Command {
                        command: c.clone(),
                        reason: "% Invalid input detected".to_string(),
                    })
            })
            .collect()
    }

    async fn load_template(
        &mut self,
        name: &str,
        params: &HashMap<String, String>,
    ) -> Result<(), SessionError> {
        self.record(&format!("load_template:{}", name));
        self.device()?;
        let rendered = templates::render(name, params)?;
        self.candidate.extend(rendered.lines().map(str::to_string));
        Ok(())
    }

    async fn load_merge_candidate(&mut self, config: &str) -> Result<(), SessionError> {
        self.record("load_merge_candidate");
        self.device()?;
        self.candidate.extend(config.lines().map(str::to_string));
        Ok(())
    }

    async fn commit(&mut self) -> Result<(), SessionError> {
        self.record("commit");
        let fail_commit = self.device()?.fail_commit;
        self.commits += 1;
        if fail_commit == Some(self.commits) {
            self.candidate.clear();
            return Err(SessionError::Rejected("% Invalid input detected".to_string()));
        }
        for line in std::mem::take(&mut self.candidate) {
            match line.strip_prefix("hostname ") {
                Some(name) => self.hostname = name.trim().to_string(),
                None => self.merged.push(line),
            }
        }
        Ok(())
    }
}

/// Something the bot sent to the chat platform
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Sent {
    Text {
        room: String,
        text: String,
    },
    File {
        room: String,
        text: String,
        filename: String,
        content_type: String,
        bytes: Vec<u8>,
    },
}

impl Sent {
    pub fn text(room: &str, text: &str) -> Self {
        Sent::Text {
            room: room.to_string(),
            text: text.to_string(),
        }
    }
}

#[derive(Default)]
pub struct FakeChat {
    messages: HashMap<String, ChatMessage>,
    attachments: HashMap<String, Attachment>,
    sent: Mutex<Vec<Sent>>,
    fail_sends: bool,
}

impl FakeChat {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_message(mut self, message: ChatMessage) -> Self {
        self.messages.insert(message.id.clone(), message);
        self
    }

    pub fn with_attachment(mut self, url: &str, content_type: &str, bytes: &[u8]) -> Self {
        self.attachments.insert(
            url.to_string(),
            Attachment {
                content_type: content_type.to_string(),
                filename: None,
                bytes: bytes.to_vec(),
            },
        );
        self
    }

    pub fn failing_sends(mut self) -> Self {
        self.fail_sends = true;
        self
    }

    pub fn sent(&self) -> Vec<Sent> {
        self.sent.lock().unwrap().clone()
    }

    /// Text of every message and upload caption, in order
    pub fn texts(&self) -> Vec<String> {
        self.sent()
            .into_iter()
            .map(|s| match s {
                Sent::Text { text, .. } | Sent::File { text, .. } => text,
            })
            .collect()
    }

    pub fn files(&self) -> Vec<(String, Vec<u8>)> {
        self.sent()
            .into_iter()
            .filter_map(|s| match s {
                Sent::File { filename, bytes, .. } => Some((filename, bytes)),
                Sent::Text { .. } => None,
            })
            .collect()
    }
}

#[async_trait]
impl ChatApi for FakeChat {
    async fn get_message(&self, id: &str) -> anyhow::Result<ChatMessage> {
        self.messages
            .get(id)
            .cloned()
            .ok_or_else(|| anyhow::anyhow!("Chat API error 404: message {} not found", id))
    }

    async fn fetch_attachment(&self, url: &str) -> anyhow::Result<Attachment> {
        self.attachments
            .get(url)
            .cloned()
            .ok_or_else(|| anyhow::anyhow!("Chat API error 404: {} not found", url))
    }

    async fn send_text(&self, room_id: &str, text: &str) -> anyhow::Result<()> {
        if self.fail_sends {
            return Err(anyhow::anyhow!("Chat API error 503"));
        }
        self.sent.lock().unwrap().push(Sent::text(room_id, text));
        Ok(())
    }

    async fn send_file(&self, room_id: &str, text: &str, file: FileUpload) -> anyhow::Result<()> {
        if self.fail_sends {
            return Err(anyhow::anyhow!("Chat API error 503"));
        }
        self.sent.lock().unwrap().push(Sent::File {
            room: room_id.to_string(),
            text: text.to_string(),
            filename: file.filename,
            content_type: file.content_type,
            bytes: file.bytes,
        });
        Ok(())
    }
}
