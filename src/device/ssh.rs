use async_trait::async_trait;
use std::collections::HashMap;
use std::io::{Read, Write};
use std::net::{TcpStream, ToSocketAddrs};
use std::time::Duration;

use super::{templates, CredentialRole, DeviceSession, Facts, SessionError, SessionFactory};
use crate::config::Credentials;

/// Keyboard-interactive prompt handler that always responds with the password
struct PasswordPrompt {
    password: String,
}

impl ssh2::KeyboardInteractivePrompt for PasswordPrompt {
    fn prompt<'a>(
        &mut self,
        _username: &str,
        _instructions: &str,
        prompts: &[ssh2::Prompt<'a>],
    ) -> Vec<String> {
        prompts.iter().map(|_| self.password.clone()).collect()
    }
}

/// Builds Cisco IOS sessions over SSH, picking the account by role
pub struct SshSessionFactory {
    credentials: Credentials,
    connect_timeout: Duration,
    command_timeout: Duration,
}

impl SshSessionFactory {
    pub fn new(credentials: Credentials, connect_timeout: Duration, command_timeout: Duration) -> Self {
        Self {
            credentials,
            connect_timeout,
            command_timeout,
        }
    }
}

impl SessionFactory for SshSessionFactory {
    fn session(&self, address: &str, role: CredentialRole) -> Box<dyn DeviceSession> {
        let (user, pass) = match role {
            CredentialRole::Core => (&self.credentials.autoname, &self.credentials.autopass),
            CredentialRole::Device => (&self.credentials.username, &self.credentials.password),
        };
        Box::new(IosSession {
            host: address.to_string(),
            user: user.clone(),
            pass: pass.clone(),
            connect_timeout: self.connect_timeout,
            command_timeout: self.command_timeout,
            session: None,
            candidate: Vec::new(),
        })
    }
}

/// Cisco IOS CLI over SSH. Candidate lines are buffered locally and pushed
/// through an interactive shell on commit.
pub struct IosSession {
    host: String,
    user: String,
    pass: String,
    connect_timeout: Duration,
    command_timeout: Duration,
    session: Option<ssh2::Session>,
    candidate: Vec<String>,
}

impl IosSession {
    /// Run blocking ssh2 work on the open session in the blocking pool.
    async fn with_session<T, F>(&mut self, f: F) -> Result<T, SessionError>
    where
        T: Send + 'static,
        F: FnOnce(&ssh2::Session) -> Result<T, SessionError> + Send + 'static,
    {
        let session = self.session.take().ok_or(SessionError::NotOpen)?;
        let (session, result) = tokio::task::spawn_blocking(move || {
            let result = f(&session);
            (session, result)
        })
        .await
        .map_err(|e| SessionError::Task(e.to_string()))?;
        self.session = Some(session);
        result
    }
}

#[async_trait]
impl DeviceSession for IosSession {
    fn address(&self) -> &str {
        &self.host
    }

    async fn open(&mut self) -> Result<(), SessionError> {
        let host = self.host.clone();
        let user = self.user.clone();
        let pass = self.pass.clone();
        let connect_timeout = self.connect_timeout;
        let command_timeout = self.command_timeout;

        let session = tokio::task::spawn_blocking(move || {
            ssh_connect(&host, &user, &pass, connect_timeout, command_timeout)
        })
        .await
        .map_err(|e| SessionError::Task(e.to_string()))??;

        tracing::debug!("SSH session open to {}", self.host);
        self.session = Some(session);
        Ok(())
    }

    async fn close(&mut self) -> Result<(), SessionError> {
        self.candidate.clear();
        let Some(session) = self.session.take() else {
            return Ok(());
        };
        tokio::task::spawn_blocking(move || {
            session
                .disconnect(None, "session closed", None)
                .map_err(|e| SessionError::Command {
                    command: "disconnect".to_string(),
                    reason: e.to_string(),
                })
        })
        .await
        .map_err(|e| SessionError::Task(e.to_string()))?
    }

    async fn get_facts(&mut self) -> Result<Facts, SessionError> {
        let output = self.with_session(|s| exec_command(s, "show version")).await?;
        parse_show_version(&output)
    }

    async fn get_config(&mut self) -> Result<String, SessionError> {
        let output = self
            .with_session(|s| exec_command(s, "show running-config"))
            .await?;
        Ok(strip_running_preamble(&output).to_string())
    }

    async fn cli(&mut self, commands: &[String]) -> Result<HashMap<String, String>, SessionError> {
        let commands = commands.to_vec();
        self.with_session(move |s| {
            let mut outputs = HashMap::new();
            for command in commands {
                let output = exec_command(s, &command)?;
                outputs.insert(command, output);
            }
            Ok(outputs)
        })
        .await
    }

    async fn load_template(
        &mut self,
        name: &str,
        params: &HashMap<String, String>,
    ) -> Result<(), SessionError> {
        let rendered = templates::render(name, params)?;
        self.load_merge_candidate(&rendered).await
    }

    async fn load_merge_candidate(&mut self, config: &str) -> Result<(), SessionError> {
        if self.session.is_none() {
            return Err(SessionError::NotOpen);
        }
        self.candidate.extend(candidate_lines(config));
        Ok(())
    }

    async fn commit(&mut self) -> Result<(), SessionError> {
        let lines = std::mem::take(&mut self.candidate);
        if lines.is_empty() {
            return Ok(());
        }
        let count = lines.len();
        self.with_session(move |s| push_config(s, &lines)).await?;
        tracing::debug!("Committed {} lines to {}", count, self.host);
        Ok(())
    }
}

/// Create an SSH session and authenticate with password + keyboard-interactive.
/// This is blocking, so call from a spawn_blocking context.
fn ssh_connect(
    host: &str,
    user: &str,
    pass: &str,
    connect_timeout: Duration,
    command_timeout: Duration,
) -> Result<ssh2::Session, SessionError> {
    let connect_err = |reason: String| SessionError::Connect {
        host: host.to_string(),
        reason,
    };

    let addr = (host, 22)
        .to_socket_addrs()
        .map_err(|e| connect_err(format!("invalid address: {}", e)))?
        .next()
        .ok_or_else(|| connect_err("address did not resolve".to_string()))?;

    let tcp = TcpStream::connect_timeout(&addr, connect_timeout)
        .map_err(|e| connect_err(format!("TCP connection failed: {}", e)))?;
    tcp.set_read_timeout(Some(command_timeout)).ok();
    tcp.set_write_timeout(Some(command_timeout)).ok();

    let mut session = ssh2::Session::new()
        .map_err(|e| connect_err(format!("failed to create SSH session: {}", e)))?;
    session.set_tcp_stream(tcp);
    session.set_timeout(command_timeout.as_millis().min(u32::MAX as u128) as u32);
    session
        .handshake()
        .map_err(|e| connect_err(format!("SSH handshake failed: {}", e)))?;

    // Try password auth first
    match session.userauth_password(user, pass) {
        Ok(_) if session.authenticated() => return Ok(session),
        _ => {}
    }

    // Keyboard-interactive is what many IOS AAA setups offer
    let mut prompter = PasswordPrompt {
        password: pass.to_string(),
    };
    let _ = session.userauth_keyboard_interactive(user, &mut prompter);

    if session.authenticated() {
        Ok(session)
    } else {
        Err(SessionError::Auth {
            user: user.to_string(),
        })
    }
}

/// Run a single exec command on the session and return its output
fn exec_command(session: &ssh2::Session, command: &str) -> Result<String, SessionError> {
    let command_err = |reason: String| SessionError::Command {
        command: command.to_string(),
        reason,
    };

    let mut channel = session
        .channel_session()
        .map_err(|e| command_err(format!("failed to open channel: {}", e)))?;
    channel
        .exec(command)
        .map_err(|e| command_err(format!("failed to execute: {}", e)))?;

    let mut raw = Vec::new();
    channel
        .read_to_end(&mut raw)
        .map_err(|e| command_err(format!("failed to read output: {}", e)))?;
    let _ = channel.wait_close();

    let output = String::from_utf8_lossy(&raw).into_owned();
    if let Some(line) = find_rejection(&output) {
        return Err(command_err(line));
    }
    Ok(output)
}

/// Push candidate lines through config mode on a PTY shell and save them
fn push_config(session: &ssh2::Session, lines: &[String]) -> Result<String, SessionError> {
    let shell_err = |reason: String| SessionError::Command {
        command: "configure terminal".to_string(),
        reason,
    };

    let mut channel = session
        .channel_session()
        .map_err(|e| shell_err(format!("failed to open channel: {}", e)))?;
    channel
        .request_pty("vt100", None, None)
        .map_err(|e| shell_err(format!("failed to request PTY: {}", e)))?;
    channel
        .shell()
        .map_err(|e| shell_err(format!("failed to start shell: {}", e)))?;

    channel
        .write_all(commit_script(lines).as_bytes())
        .and_then(|_| channel.flush())
        .map_err(|e| shell_err(format!("failed to send configuration: {}", e)))?;

    let mut raw = Vec::new();
    channel
        .read_to_end(&mut raw)
        .map_err(|e| shell_err(format!("failed to read session output: {}", e)))?;
    let _ = channel.wait_close();

    let output = String::from_utf8_lossy(&raw).into_owned();
    match find_rejection(&output) {
        Some(line) => Err(SessionError::Rejected(line)),
        None => Ok(output),
    }
}

fn commit_script(lines: &[String]) -> String {
    let mut script = String::from("terminal length 0\nconfigure terminal\n");
    for line in lines {
        script.push_str(line);
        script.push('\n');
    }
    script.push_str("end\nwrite memory\nexit\n");
    script
}

/// Lines of a config payload worth sending; `end` is left to the commit script
fn candidate_lines(config: &str) -> impl Iterator<Item = String> + '_ {
    config
        .lines()
        .map(|line| line.trim_end_matches('\r'))
        .filter(|line| !line.trim().is_empty())
        .filter(|line| !line.trim().eq_ignore_ascii_case("end"))
        .map(|line| line.to_string())
}

/// First IOS parser error in CLI output, if any
fn find_rejection(output: &str) -> Option<String> {
    const PREFIXES: &[&str] = &[
        "% Invalid input",
        "% Incomplete command",
        "% Ambiguous command",
        "% Unknown command",
    ];
    output
        .lines()
        .map(str::trim)
        .find(|line| PREFIXES.iter().any(|p| line.starts_with(p)))
        .map(|line| line.to_string())
}

/// Drop the "Building configuration..." banner IOS prints before the config,
/// along with exec timestamp lines that change on every run
fn strip_running_preamble(output: &str) -> &str {
    let mut offset = 0;
    for line in output.split_inclusive('\n') {
        let trimmed = line.trim();
        if trimmed.is_empty()
            || trimmed.starts_with("Building configuration")
            || trimmed.starts_with("Current configuration")
            || trimmed.starts_with("Load for ")
            || trimmed.starts_with("Time source is ")
        {
            offset += line.len();
        } else {
            break;
        }
    }
    &output[offset..]
}

fn parse_show_version(output: &str) -> Result<Facts, SessionError> {
    let capture = |pattern: &str| -> Option<String> {
        regex_lite::Regex::new(pattern)
            .ok()?
            .captures(output)?
            .get(1)
            .map(|m| m.as_str().to_string())
    };

    let serial_number = capture(r"Processor board ID (\S+)")
        .or_else(|| capture(r"System [Ss]erial [Nn]umber\s*:\s*(\S+)"))
        .ok_or_else(|| SessionError::Facts("no serial number in 'show version' output".to_string()))?;

    Ok(Facts {
        hostname: capture(r"(?m)^(\S+) uptime is").unwrap_or_default(),
        serial_number,
        model: capture(r"Model [Nn]umber\s*:\s*(\S+)")
            .or_else(|| capture(r"(?m)^[Cc]isco (\S+) .*processor"))
            .unwrap_or_default(),
        os_version: capture(r"Version ([^,\s]+)").unwrap_or_default(),
    })
}
