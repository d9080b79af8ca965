use std::collections::HashMap;

use chrono::Local;

use crate::constants::COMMAND_PREFIX;
use crate::event::{handler_name, printable, DecodeError, Event};
use crate::patterns::{PatternTable, Selection};
use crate::template::RenderError;

/// What a handler decided about the templated display line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HandlerOutcome {
    /// The templated line stands
    Keep,
    /// Show this instead
    Replace(String),
    /// Show nothing; the handler dealt with the event
    Suppress,
}

pub type Handler<C> = Box<dyn Fn(&mut C, &Event) -> HandlerOutcome>;

/// Per-command callbacks, keyed by handler name (`on_join`, `on_353`, ...).
/// A command with no entry keeps its templated line.
pub struct HandlerRegistry<C> {
    handlers: HashMap<String, Handler<C>>,
}

impl<C> HandlerRegistry<C> {
    pub fn new() -> Self {
        Self {
            handlers: HashMap::new(),
        }
    }

    /// Register `handler` for `command`, replacing any previous one.
    pub fn on<F>(&mut self, command: &str, handler: F) -> &mut Self
    where
        F: Fn(&mut C, &Event) -> HandlerOutcome + 'static,
    {
        self.handlers.insert(handler_name(command), Box::new(handler));
        self
    }

    pub fn lookup(&self, command: &str) -> Option<&Handler<C>> {
        self.handlers.get(&handler_name(command))
    }

}

impl<C> Default for HandlerRegistry<C> {
    fn default() -> Self {
        Self::new()
    }
}

/// Non-fatal observations made while translating one line.
#[derive(Debug)]
pub enum Diagnostic {
    /// No template and not a known-default command
    Unhandled(String),
    /// The line was not a decodable event; its raw text is displayed
    Undecodable(DecodeError),
}

#[derive(Debug, Default)]
pub struct Translation {
    pub display: Option<String>,
    pub diagnostic: Option<Diagnostic>,
}

impl Translation {
    fn nothing() -> Self {
        Self::default()
    }
}

#[derive(Debug, thiserror::Error)]
pub enum TranslateError {
    #[error("cannot render {command}: {source}")]
    Render {
        command: String,
        #[source]
        source: RenderError,
    },
}

/// Values available to outbound templates besides `{cmd}` and `{msg}`.
#[derive(Debug, Clone, Copy)]
pub struct OutboundContext<'a> {
    pub channel: &'a str,
    pub nick: Option<&'a str>,
}

/// Turns daemon event lines into display lines, and user input into wire
/// commands, according to a [`PatternTable`].
#[derive(Debug, Clone)]
pub struct Translator {
    patterns: PatternTable,
    timestamps: bool,
}

impl Translator {
    pub fn new(patterns: PatternTable) -> Self {
        Self {
            patterns,
            timestamps: false,
        }
    }

    /// Prefix every templated line with the local `HH:MM` time.
    pub fn with_timestamps(mut self, enabled: bool) -> Self {
        self.timestamps = enabled;
        self
    }

    pub fn patterns(&self) -> &PatternTable {
        &self.patterns
    }

    /// Translate one inbound line with no handlers.
    pub fn translate_in(&self, line: &str) -> Result<Translation, TranslateError> {
        self.dispatch(line, &HandlerRegistry::<()>::new(), &mut ())
    }

    /// Translate one inbound line, giving the matching handler in `handlers`
    /// the final say over what is displayed.
    pub fn dispatch<C>(
        &self,
        line: &str,
        handlers: &HandlerRegistry<C>,
        context: &mut C,
    ) -> Result<Translation, TranslateError> {
        let line = line.trim();
        if line.is_empty() {
            return Ok(Translation::nothing());
        }
        tracing::debug!(line, "inbound");

        let event = match Event::parse(line) {
            Ok(event) => event,
            Err(e) => {
                tracing::warn!(error = %e, line, "undecodable event");
                return Ok(Translation {
                    display: Some(printable(line)),
                    diagnostic: Some(Diagnostic::Undecodable(e)),
                });
            }
        };

        if self.patterns.is_ignored(&event.command) {
            return Ok(Translation::nothing());
        }

        let (template, selection) = self.patterns.inbound_for(&event.command);
        let diagnostic = match selection {
            Selection::Unhandled => {
                tracing::debug!(command = %event.command, "unhandled command");
                Some(Diagnostic::Unhandled(event.command.clone()))
            }
            Selection::Exact | Selection::KnownDefault => None,
        };

        let rendered = template
            .render(|name| event.field(name))
            .map(|text| self.stamp(text));

        let outcome = match handlers.lookup(&event.command) {
            Some(handler) => handler(context, &event),
            None => HandlerOutcome::Keep,
        };

        let display = match outcome {
            HandlerOutcome::Suppress => None,
            HandlerOutcome::Replace(text) => Some(text),
            HandlerOutcome::Keep => {
                let text = rendered.map_err(|source| TranslateError::Render {
                    command: event.command.clone(),
                    source,
                })?;
                Some(text)
            }
        };

        Ok(Translation {
            display: display.filter(|text| !text.is_empty()),
            diagnostic,
        })
    }

    /// Translate one line of user input into a wire command. Blank input
    /// produces nothing.
    pub fn translate_out(
        &self,
        context: &OutboundContext<'_>,
        line: &str,
    ) -> Result<Option<String>, RenderError> {
        let line = line.trim();
        if line.is_empty() {
            return Ok(None);
        }

        let (template, cmd, msg) = match line.strip_prefix(COMMAND_PREFIX) {
            Some(rest) => {
                let (cmd, msg) = rest.split_once(' ').unwrap_or((rest, ""));
                (self.patterns.outbound_for(cmd), cmd, msg)
            }
            None => (self.patterns.default_message(), "", line),
        };

        let wire = template.render(|name| match name {
            "cmd" => Some(cmd),
            "msg" => Some(msg),
            "channel" => Some(context.channel),
            "nick" => context.nick,
            _ => None,
        })?;
        let wire = wire.trim_end();
        if wire.is_empty() {
            return Ok(None);
        }
        tracing::debug!(wire, "outbound");
        Ok(Some(wire.to_string()))
    }

    fn stamp(&self, text: String) -> String {
        if self.timestamps && !text.is_empty() {
            format!("{} {}", Local::now().format("%H:%M"), text)
        } else {
            text
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn translator() -> Translator {
        Translator::new(PatternTable::builtin().unwrap())
    }

    fn display(line: &str) -> Option<String> {
        translator().translate_in(line).unwrap().display
    }

    #[derive(Default)]
    struct Seen {
        joins: Vec<String>,
    }

    #[test]
    fn test_ignored_commands_produce_nothing() {
        for code in ["005", "253", "254", "255", "366", "376"] {
            let line = format!(
                r##"{{"command":"{code}","user":"srv","content":"anything","channel":"#x","args":["a"]}}"##
            );
            let translation = translator().translate_in(&line).unwrap();
            assert!(translation.display.is_none(), "{code} was displayed");
            assert!(translation.diagnostic.is_none());
        }
    }

    #[test]
    fn test_templates_reference_args() {
        assert_eq!(
            display(r##"{"command":"333","content":"","args":["me","#chan","alice"]}"##),
            Some("Topic set by alice".to_string())
        );
        assert_eq!(
            display(r#"{"command":"252","content":"7","args":["me","operators online"]}"#),
            Some("7 operators online".to_string())
        );
    }

    #[test]
    fn test_exact_template() {
        assert_eq!(
            display(r##"{"command":"PRIVMSG","user":"alice","content":"hi","channel":"#test","args":[]}"##),
            Some("[alice] hi".to_string())
        );
    }

    #[test]
    fn test_unhandled_command_uses_default() {
        let translation = translator()
            .translate_in(r#"{"command":"999","content":"strange"}"#)
            .unwrap();
        assert_eq!(translation.display.as_deref(), Some("strange"));
        assert!(matches!(translation.diagnostic, Some(Diagnostic::Unhandled(ref c)) if c == "999"));

        let known = translator()
            .translate_in(r#"{"command":"001","content":"Welcome"}"#)
            .unwrap();
        assert_eq!(known.display.as_deref(), Some("Welcome"));
        assert!(known.diagnostic.is_none());
    }

    #[test]
    fn test_undecodable_line_is_shown_raw() {
        let translation = translator().translate_in("  not json at all \n").unwrap();
        assert_eq!(translation.display.as_deref(), Some("not json at all"));
        assert!(matches!(translation.diagnostic, Some(Diagnostic::Undecodable(_))));

        let translation = translator().translate_in("oops\x1b[2J\x07").unwrap();
        assert_eq!(translation.display.as_deref(), Some("oops^[[2J^G"));
    }

    #[test]
    fn test_blank_line_is_nothing() {
        let translation = translator().translate_in("   ").unwrap();
        assert!(translation.display.is_none());
        assert!(translation.diagnostic.is_none());
    }

    #[test]
    fn test_missing_field_is_render_error() {
        let err = translator()
            .translate_in(r#"{"command":"333","args":["only-one"]}"#)
            .unwrap_err();
        let TranslateError::Render { command, source } = err;
        assert_eq!(command, "333");
        assert_eq!(source.field, "arg2");
    }

    #[test]
    fn test_timestamp_prefix() {
        let line = translator()
            .with_timestamps(true)
            .translate_in(r#"{"command":"NOTICE","content":"hello"}"#)
            .unwrap()
            .display
            .unwrap();
        let (stamp, rest) = line.split_once(' ').unwrap();
        assert_eq!(stamp.len(), 5);
        assert_eq!(&stamp[2..3], ":");
        assert_eq!(rest, "hello");
    }

    #[test]
    fn test_handler_outcomes() {
        let mut handlers: HandlerRegistry<Seen> = HandlerRegistry::new();
        handlers
            .on("JOIN", |seen, event| {
                seen.joins.push(event.user.clone());
                HandlerOutcome::Suppress
            })
            .on("nick", |_, event| HandlerOutcome::Replace(format!("-> {}", event.content)))
            .on("part", |_, _| HandlerOutcome::Keep);
        assert!(handlers.lookup("join").is_some());
        assert!(handlers.lookup("QUIT").is_none());

        let translator = translator();
        let mut seen = Seen::default();

        let joined = translator
            .dispatch(r#"{"command":"JOIN","user":"alice"}"#, &handlers, &mut seen)
            .unwrap();
        assert!(joined.display.is_none());
        assert_eq!(seen.joins, vec!["alice"]);

        let renamed = translator
            .dispatch(r#"{"command":"NICK","user":"a","content":"b"}"#, &handlers, &mut seen)
            .unwrap();
        assert_eq!(renamed.display.as_deref(), Some("-> b"));

        let parted = translator
            .dispatch(r#"{"command":"PART","user":"alice"}"#, &handlers, &mut seen)
            .unwrap();
        assert_eq!(parted.display.as_deref(), Some("* alice left the channel"));
    }

    #[test]
    fn test_handler_runs_even_when_template_fails() {
        let mut handlers: HandlerRegistry<u32> = HandlerRegistry::new();
        handlers.on("333", |calls, _| {
            *calls += 1;
            HandlerOutcome::Suppress
        });
        let mut calls = 0;
        let translation = translator()
            .dispatch(r#"{"command":"333"}"#, &handlers, &mut calls)
            .unwrap();
        assert_eq!(calls, 1);
        assert!(translation.display.is_none());
    }

    #[test]
    fn test_me_action_wire_shape() {
        let context = OutboundContext {
            channel: "#test",
            nick: Some("bob"),
        };
        assert_eq!(
            translator().translate_out(&context, "/me waves").unwrap().as_deref(),
            Some("PRIVMSG #test :\x01ACTION bob waves\x01")
        );
    }

    #[test]
    fn test_outbound_commands() {
        let context = OutboundContext {
            channel: "#test",
            nick: None,
        };
        let translator = translator();
        assert_eq!(
            translator.translate_out(&context, "/pw hunter2").unwrap().as_deref(),
            Some("PRIVMSG NickServ :identify hunter2")
        );
        assert_eq!(
            translator.translate_out(&context, "/join #rust").unwrap().as_deref(),
            Some("join #rust")
        );
        assert_eq!(
            translator.translate_out(&context, "/names").unwrap().as_deref(),
            Some("names")
        );
        assert_eq!(
            translator.translate_out(&context, "hello world  ").unwrap().as_deref(),
            Some("PRIVMSG #test :hello world")
        );
        assert_eq!(translator.translate_out(&context, " \t ").unwrap(), None);
    }

    #[test]
    fn test_me_without_nick_is_render_error() {
        let context = OutboundContext {
            channel: "#test",
            nick: None,
        };
        let err = translator().translate_out(&context, "/me waves").unwrap_err();
        assert_eq!(err.field, "nick");
    }
}
