use anyhow::Context;
use serde::Deserialize;
use std::env;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// ARP rows always end in their VLAN interface, so nothing is excluded by default
pub const DEFAULT_CORE_EXCLUDE: &str = "";

/// Config holds all application configuration
#[derive(Debug, Clone)]
pub struct Config {
    pub listen_addr: String,
    pub chat_api_url: String,
    pub access_token: String,
    pub bot_email: String,
    pub allowed_domain: String,
    pub core_device: String,
    pub core_vlan: String,
    pub core_exclude: String,
    pub source_config_dir: PathBuf,
    pub inventory_dir: PathBuf,
    pub running_config_dir: PathBuf,
    pub credentials_file: PathBuf,
    pub max_concurrent_sessions: usize,
    pub connect_timeout: Duration,
    pub command_timeout: Duration,
}

impl Config {
    /// Load configuration from environment variables with defaults
    pub fn load() -> Self {
        Self {
            listen_addr: get_env("LISTEN_ADDR", "0.0.0.0:8080"),
            chat_api_url: get_env("CHAT_API_URL", "https://webexapis.com/v1"),
            access_token: get_env("CHAT_ACCESS_TOKEN", ""),
            bot_email: get_env("BOT_EMAIL", ""),
            allowed_domain: get_env("ALLOWED_DOMAIN", ""),
            core_device: get_env("CORE_DEVICE", "127.0.0.1"),
            core_vlan: get_env("CORE_VLAN", "1"),
            core_exclude: get_env("CORE_EXCLUDE", DEFAULT_CORE_EXCLUDE),
            source_config_dir: get_env("SOURCE_CONFIG_DIR", "/data/configs").into(),
            inventory_dir: get_env("INVENTORY_DIR", "/data/inventory").into(),
            running_config_dir: get_env("RUNNING_CONFIG_DIR", "/data/running").into(),
            credentials_file: get_env("CREDENTIALS_FILE", "/data/credentials.json").into(),
            max_concurrent_sessions: get_env("MAX_CONCURRENT_SESSIONS", "16")
                .parse()
                .unwrap_or(16),
            connect_timeout: Duration::from_secs(
                get_env("SESSION_CONNECT_TIMEOUT_SECS", "1").parse().unwrap_or(1),
            ),
            command_timeout: Duration::from_secs(
                get_env("SESSION_COMMAND_TIMEOUT_SECS", "30").parse().unwrap_or(30),
            ),
        }
    }
}

fn get_env(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}

/// Login pairs for the staged devices and for the core switch.
///
/// The file is JSON: `{"username", "password", "autoname", "autopass"}`,
/// where `autoname`/`autopass` are the core-switch account.
#[derive(Clone, Deserialize)]
pub struct Credentials {
    pub username: String,
    pub password: String,
    pub autoname: String,
    pub autopass: String,
}

impl Credentials {
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("reading credentials file {}", path.display()))?;
        serde_json::from_str(&raw)
            .with_context(|| format!("parsing credentials file {}", path.display()))
    }
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("autoname", &self.autoname)
            .finish_non_exhaustive()
    }
}
