use std::collections::BTreeMap;

use serde_json::{Map, Value};

const CTCP_ACTION: &str = "\u{1}ACTION ";
const CTCP_DELIM: char = '\u{1}';
/// Caret notation for DEL
const CARET_DEL: &str = "^?";

#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    #[error("invalid JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("expected a JSON object, got {0}")]
    NotAnObject(&'static str),
    #[error("event has no command")]
    MissingCommand,
}

/// One occurrence reported by the daemon, decoded from a JSON line.
///
/// Field names in the wire record are matched case-insensitively. Besides
/// the five well-known fields, any other scalar field is kept in `extra`
/// under its lowercased name so templates can reference it. Every text
/// value passes through [`printable`], so decoded fields never carry
/// terminal control sequences.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Event {
    /// Upper-cased command or numeric reply code
    pub command: String,
    pub user: String,
    pub content: String,
    pub channel: String,
    pub args: Vec<String>,
    pub extra: BTreeMap<String, String>,
}

impl Event {
    pub fn parse(line: &str) -> Result<Self, DecodeError> {
        match serde_json::from_str::<Value>(line)? {
            Value::Object(map) => Self::from_fields(map),
            other => Err(DecodeError::NotAnObject(json_kind(&other))),
        }
    }

    fn from_fields(map: Map<String, Value>) -> Result<Self, DecodeError> {
        let mut fields: BTreeMap<String, Value> = map
            .into_iter()
            .map(|(key, value)| (key.to_lowercase(), value))
            .collect();

        let command = fields
            .remove("command")
            .map(|v| scalar_text(&v))
            .filter(|c| !c.is_empty())
            .ok_or(DecodeError::MissingCommand)?
            .to_uppercase();

        let user = take_text(&mut fields, "user");
        let content = take_text(&mut fields, "content");
        let channel = take_text(&mut fields, "channel");
        let args = match fields.remove("args") {
            Some(Value::Array(items)) => items.iter().map(scalar_text).collect(),
            Some(Value::Null) | None => Vec::new(),
            Some(other) => vec![scalar_text(&other)],
        };

        let extra = fields
            .into_iter()
            .filter(|(_, v)| !matches!(v, Value::Array(_) | Value::Object(_)))
            .map(|(k, v)| (k, scalar_text(&v)))
            .collect();

        Ok(Self {
            command,
            user,
            content,
            channel,
            args,
            extra,
        })
    }

    /// Look up a field by (lowercase) name; `argN` addresses `args[N]`.
    pub fn field(&self, name: &str) -> Option<&str> {
        match name {
            "command" => Some(self.command.as_str()),
            "user" => Some(self.user.as_str()),
            "content" => Some(self.content.as_str()),
            "channel" => Some(self.channel.as_str()),
            _ => {
                if let Some(index) = name.strip_prefix("arg").and_then(|n| n.parse::<usize>().ok()) {
                    return self.args.get(index).map(String::as_str);
                }
                self.extra.get(name).map(String::as_str)
            }
        }
    }

    pub fn handler_name(&self) -> String {
        handler_name(&self.command)
    }

    /// Text of a CTCP ACTION (`/me`) message, if this content is one.
    pub fn action_text(&self) -> Option<&str> {
        action_text(&self.content)
    }
}

/// Name of the handler consulted for a command: `on_` + lowercased command.
pub fn handler_name(command: &str) -> String {
    format!("on_{}", command.to_lowercase())
}

pub fn action_text(content: &str) -> Option<&str> {
    content
        .strip_prefix(CTCP_ACTION)
        .map(|rest| rest.trim_end_matches(CTCP_DELIM))
}

fn take_text(fields: &mut BTreeMap<String, Value>, key: &str) -> String {
    fields.remove(key).map(|v| scalar_text(&v)).unwrap_or_default()
}

/// Make remote text safe to write to a terminal.
///
/// C0 controls and DEL become caret notation (`ESC` shows as `^[`), tabs
/// become spaces, C1 controls are dropped. `\x01` survives for CTCP.
pub fn printable(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            CTCP_DELIM => out.push(c),
            '\t' => out.push(' '),
            '\u{0}'..='\u{1f}' => {
                out.push('^');
                out.push(char::from(c as u8 + b'@'));
            }
            '\u{7f}' => out.push_str(CARET_DEL),
            '\u{80}'..='\u{9f}' => {}
            _ => out.push(c),
        }
    }
    out
}

fn scalar_text(value: &Value) -> String {
    match value {
        Value::String(s) => printable(s),
        Value::Null => String::new(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        other => other.to_string(),
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_matches_keys_case_insensitively() {
        let event = Event::parse(
            r##"{"Command":"privmsg","User":"alice","Content":"hi","Channel":"#test","Args":["#test"]}"##,
        )
        .unwrap();
        assert_eq!(event.command, "PRIVMSG");
        assert_eq!(event.user, "alice");
        assert_eq!(event.content, "hi");
        assert_eq!(event.channel, "#test");
        assert_eq!(event.args, vec!["#test"]);
    }

    #[test]
    fn test_missing_args_is_empty() {
        let event = Event::parse(r#"{"command":"NOTICE","content":"x"}"#).unwrap();
        assert!(event.args.is_empty());
        let event = Event::parse(r#"{"command":"NOTICE","args":null}"#).unwrap();
        assert!(event.args.is_empty());
        assert_eq!(event.user, "");
    }

    #[test]
    fn test_positional_args_are_addressable() {
        let event = Event::parse(r#"{"command":"333","args":["a0","a1","a2"]}"#).unwrap();
        assert_eq!(event.field("arg0"), Some("a0"));
        assert_eq!(event.field("arg1"), Some("a1"));
        assert_eq!(event.field("arg2"), Some("a2"));
        assert_eq!(event.field("arg3"), None);
    }

    #[test]
    fn test_extra_fields_are_kept() {
        let event = Event::parse(r#"{"command":"JOIN","Host":"example.org","Port":6667}"#).unwrap();
        assert_eq!(event.field("host"), Some("example.org"));
        assert_eq!(event.field("port"), Some("6667"));
        assert_eq!(event.field("nope"), None);
    }

    #[test]
    fn test_decode_failures() {
        assert!(matches!(Event::parse("not json"), Err(DecodeError::Json(_))));
        assert!(matches!(Event::parse("[1,2]"), Err(DecodeError::NotAnObject("an array"))));
        assert!(matches!(
            Event::parse(r#"{"user":"bob"}"#),
            Err(DecodeError::MissingCommand)
        ));
    }

    #[test]
    fn test_handler_name_is_lowercased() {
        let event = Event::parse(r#"{"command":"join"}"#).unwrap();
        assert_eq!(event.handler_name(), "on_join");
        assert_eq!(handler_name("353"), "on_353");
    }

    #[test]
    fn test_control_sequences_are_neutralized() {
        let event = Event::parse(
            r#"{"command":"PRIVMSG","user":"mal\u001blory","content":"hi\u001b[2J\u001b]52;c;cm0gLXJmIH4=\u0007\u009b","args":["a\tb\u007f"]}"#,
        )
        .unwrap();
        assert_eq!(event.user, "mal^[lory");
        assert_eq!(event.content, "hi^[[2J^[]52;c;cm0gLXJmIH4=^G");
        assert_eq!(event.args, vec!["a b^?"]);
        assert!(!event.content.contains('\u{1b}'));
        assert!(!event.content.contains('\u{7}'));

        let event = Event::parse(r#"{"command":"PRIVMSG","content":"\u0001ACTION waves\u0001"}"#).unwrap();
        assert_eq!(event.action_text(), Some("waves"));
    }

    #[test]
    fn test_action_text() {
        assert_eq!(action_text("\u{1}ACTION waves\u{1}"), Some("waves"));
        assert_eq!(action_text("waves"), None);
    }
}
