use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::Path;

use serde::Deserialize;

use crate::template::{Template, TemplateError};

#[derive(Debug, thiserror::Error)]
pub enum PatternError {
    #[error("failed to read pattern file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid pattern file: {0}")]
    Json(#[from] serde_json::Error),
    #[error("invalid template for {key:?}: {source}")]
    Template {
        key: String,
        #[source]
        source: TemplateError,
    },
}

/// How the inbound template for a command was chosen.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Selection {
    /// The command has its own template
    Exact,
    /// Default template, and the command is known to need nothing better
    KnownDefault,
    /// Default template for a command nobody described
    Unhandled,
}

/// Serialized form of the pattern table. Every section falls back to the
/// built-in value when absent, so a file may override only what it needs.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PatternConfig {
    pub inbound: HashMap<String, String>,
    pub default: String,
    pub ignore: Vec<String>,
    pub known_default: Vec<String>,
    pub outbound: HashMap<String, String>,
    pub default_command: String,
    pub default_message: String,
}

impl Default for PatternConfig {
    fn default() -> Self {
        let inbound = [
            ("NOTICE", "{content}"),
            ("NICK", "* {user} is now known as {content}"),
            ("JOIN", "* {user} joined the channel"),
            ("PART", "* {user} left the channel"),
            ("PRIVMSG", "[{user}] {content}"),
            ("QUIT", "{user} has quit"),
            ("MODE", "Mode set to {content}"),
            // Message of the day
            ("372", "{content}"),
            ("332", "Topic: {content}"),
            // NAMES reply
            ("353", "Users in {channel}: {content}"),
            // IRC operators online
            ("252", "{content} {arg1}"),
            ("333", "Topic set by {arg2}"),
            ("328", "Channel url: {content}"),
        ];
        let outbound = [
            ("pw", "PRIVMSG NickServ :identify {msg}"),
            ("me", "PRIVMSG {channel} :\u{1}ACTION {nick} {msg}\u{1}"),
        ];

        Self {
            inbound: owned_pairs(&inbound),
            default: "{content}".to_string(),
            // Server extensions, connection counts, end of NAMES / MOTD
            ignore: owned_list(&["005", "253", "254", "255", "366", "376"]),
            known_default: owned_list(&[
                "001", "002", "003", "004", "250", "251", "265", "266", "375", "PING",
            ]),
            outbound: owned_pairs(&outbound),
            default_command: "{cmd} {msg}".to_string(),
            default_message: "PRIVMSG {channel} :{msg}".to_string(),
        }
    }
}

/// Immutable lookup tables for both translation directions, built once at
/// startup and shared by reference.
#[derive(Debug, Clone)]
pub struct PatternTable {
    inbound: HashMap<String, Template>,
    default: Template,
    ignore: HashSet<String>,
    known_default: HashSet<String>,
    outbound: HashMap<String, Template>,
    default_command: Template,
    default_message: Template,
}

impl PatternTable {
    /// The stock tables for an IRC daemon feed.
    pub fn builtin() -> Result<Self, PatternError> {
        Self::from_config(PatternConfig::default())
    }

    pub fn from_config(config: PatternConfig) -> Result<Self, PatternError> {
        let inbound = compile_map(config.inbound, str::to_uppercase)?;
        let outbound = compile_map(config.outbound, str::to_lowercase)?;

        Ok(Self {
            inbound,
            default: compile("default", &config.default)?,
            ignore: config.ignore.iter().map(|c| c.to_uppercase()).collect(),
            known_default: config.known_default.iter().map(|c| c.to_uppercase()).collect(),
            outbound,
            default_command: compile("default_command", &config.default_command)?,
            default_message: compile("default_message", &config.default_message)?,
        })
    }

    pub fn from_json(json: &str) -> Result<Self, PatternError> {
        let config: PatternConfig = serde_json::from_str(json)?;
        Self::from_config(config)
    }

    pub fn load(path: &Path) -> Result<Self, PatternError> {
        let json = fs::read_to_string(path).map_err(|source| PatternError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_json(&json)
    }

    pub fn is_ignored(&self, command: &str) -> bool {
        self.ignore.contains(&command.to_uppercase())
    }

    pub fn inbound_for(&self, command: &str) -> (&Template, Selection) {
        let command = command.to_uppercase();
        if let Some(template) = self.inbound.get(&command) {
            (template, Selection::Exact)
        } else if self.known_default.contains(&command) {
            (&self.default, Selection::KnownDefault)
        } else {
            (&self.default, Selection::Unhandled)
        }
    }

    /// Template for a local command, given without its `/` prefix.
    pub fn outbound_for(&self, command: &str) -> &Template {
        self.outbound
            .get(&command.to_lowercase())
            .unwrap_or(&self.default_command)
    }

    pub fn default_message(&self) -> &Template {
        &self.default_message
    }
}

fn compile(key: &str, source: &str) -> Result<Template, PatternError> {
    Template::parse(source).map_err(|source| PatternError::Template {
        key: key.to_string(),
        source,
    })
}

fn compile_map(
    raw: HashMap<String, String>,
    normalize: fn(&str) -> String,
) -> Result<HashMap<String, Template>, PatternError> {
    raw.into_iter()
        .map(|(key, source)| {
            let template = compile(&key, &source)?;
            Ok((normalize(&key), template))
        })
        .collect()
}

fn owned_pairs(pairs: &[(&str, &str)]) -> HashMap<String, String> {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

fn owned_list(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_table_selection() {
        let table = PatternTable::builtin().unwrap();
        assert_eq!(table.inbound_for("join").1, Selection::Exact);
        assert_eq!(table.inbound_for("001").1, Selection::KnownDefault);
        assert_eq!(table.inbound_for("999").1, Selection::Unhandled);
        assert_eq!(table.inbound_for("999").0.as_str(), "{content}");
    }

    #[test]
    fn test_ignore_list() {
        let table = PatternTable::builtin().unwrap();
        for code in ["005", "253", "254", "255", "366", "376"] {
            assert!(table.is_ignored(code), "{code} should be ignored");
        }
        assert!(!table.is_ignored("PRIVMSG"));
    }

    #[test]
    fn test_outbound_lookup_strips_case() {
        let table = PatternTable::builtin().unwrap();
        assert_eq!(table.outbound_for("ME").as_str(), "PRIVMSG {channel} :\u{1}ACTION {nick} {msg}\u{1}");
        assert_eq!(table.outbound_for("join").as_str(), "{cmd} {msg}");
        assert_eq!(table.default_message().as_str(), "PRIVMSG {channel} :{msg}");
    }

    #[test]
    fn test_from_json_overrides_sections() {
        let table = PatternTable::from_json(
            r#"{"inbound": {"join": "--> {user}"}, "ignore": ["PING"]}"#,
        )
        .unwrap();
        assert_eq!(table.inbound_for("JOIN").0.as_str(), "--> {user}");
        assert_eq!(table.inbound_for("PART").1, Selection::Unhandled);
        assert!(table.is_ignored("ping"));
        assert_eq!(table.outbound_for("pw").as_str(), "PRIVMSG NickServ :identify {msg}");
    }

    #[test]
    fn test_from_json_rejects_bad_template() {
        let err = PatternTable::from_json(r#"{"default": "{content"}"#).unwrap_err();
        assert!(matches!(err, PatternError::Template { ref key, .. } if key == "default"));
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"default_message": "SAY {{channel}} {{msg}}"}}"#).unwrap();
        let table = PatternTable::load(file.path()).unwrap();
        assert_eq!(table.default_message().as_str(), "SAY {channel} {msg}");

        let missing = PatternTable::load(Path::new("/nonexistent/patterns.json"));
        assert!(matches!(missing, Err(PatternError::Io { .. })));
    }
}
