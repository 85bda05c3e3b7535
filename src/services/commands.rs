/// A chat command, recognised by substring anywhere in the message text
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// `/serial <address>`; `None` when no address followed the command
    Serial(Option<String>),
    Upload,
    Config,
    Unknown,
}

impl Command {
    /// `/serial` wins over `/upload`, which wins over `/config`
    pub fn parse(text: &str) -> Self {
        if let Some(idx) = text.find("/serial") {
            let rest = &text[idx + "/serial".len()..];
            let address = rest.split_whitespace().next().map(str::to_string);
            return Command::Serial(address);
        }
        if text.contains("/upload") {
            return Command::Upload;
        }
        if text.contains("/config") {
            return Command::Config;
        }
        Command::Unknown
    }
}

/// Who the bot takes commands from
#[derive(Debug, Clone)]
pub struct SenderPolicy {
    bot_email: String,
    allowed_domain: String,
}

impl SenderPolicy {
    pub fn new(bot_email: impl Into<String>, allowed_domain: impl Into<String>) -> Self {
        Self {
            bot_email: bot_email.into().trim().to_ascii_lowercase(),
            allowed_domain: allowed_domain
                .into()
                .trim()
                .trim_start_matches('@')
                .to_ascii_lowercase(),
        }
    }

    /// The bot's own messages are never commands
    pub fn is_self(&self, email: &str) -> bool {
        !self.bot_email.is_empty() && email.trim().eq_ignore_ascii_case(&self.bot_email)
    }

    /// Senders must be in the allowed email domain (or a subdomain of it).
    /// An empty allowed domain admits nobody.
    pub fn allows(&self, email: &str) -> bool {
        if self.allowed_domain.is_empty() || self.is_self(email) {
            return false;
        }
        let Some((_, domain)) = email.trim().rsplit_once('@') else {
            return false;
        };
        let domain = domain.to_ascii_lowercase();
        domain == self.allowed_domain || domain.ends_with(&format!(".{}", self.allowed_domain))
    }
}
