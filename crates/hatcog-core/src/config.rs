use std::path::PathBuf;

use crate::constants::DEFAULT_DAEMON_ADDR;

/// Who the session talks to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Target {
    /// A channel, stored with its leading `#`
    Channel(String),
    /// A private conversation with one nick
    Private(String),
}

impl Target {
    /// Build from the command line: `--private <nick>` wins over the
    /// positional channel, which may be given with or without `#`.
    pub fn from_args(channel: Option<&str>, private: Option<&str>) -> Option<Self> {
        if let Some(nick) = private.filter(|n| !n.is_empty()) {
            return Some(Self::Private(nick.to_string()));
        }
        let channel = channel?.trim_start_matches('#');
        if channel.is_empty() {
            return None;
        }
        Some(Self::Channel(format!("#{channel}")))
    }

    /// Where outbound messages go.
    pub fn name(&self) -> &str {
        match self {
            Self::Channel(name) | Self::Private(name) => name,
        }
    }

    /// Local command that opens the conversation.
    pub fn join_line(&self) -> String {
        match self {
            Self::Channel(name) => format!("/join {name}"),
            Self::Private(nick) => format!("/private {nick}"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub daemon_addr: String,
    pub target: Option<Target>,
    pub password: Option<String>,
    pub timestamps: bool,
    pub patterns_path: Option<PathBuf>,
}

impl ClientConfig {
    /// Lines sent right after connecting: identify first, then join.
    pub fn startup_lines(&self) -> Vec<String> {
        let mut lines = Vec::new();
        if let Some(password) = self.password.as_deref().filter(|p| !p.is_empty()) {
            lines.push(format!("/pw {password}"));
        }
        if let Some(target) = &self.target {
            lines.push(target.join_line());
        }
        lines
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            daemon_addr: DEFAULT_DAEMON_ADDR.to_string(),
            target: None,
            password: None,
            timestamps: false,
            patterns_path: None,
        }
    }
}
