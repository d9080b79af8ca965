use std::collections::BTreeSet;

use hatcog_core::constants::LARGE_CHANNEL_THRESHOLD;
use hatcog_core::{Event, HandlerOutcome, HandlerRegistry, Presence, Target};

use crate::format::{clock, format_message};

/// State of one chat conversation, passed to every inbound handler.
pub(crate) struct ChatSession {
    pub(crate) target: Target,
    /// Our nick once the daemon has told us
    pub(crate) nick: Option<String>,
    pub(crate) presence: Presence,
    /// Shown in the status bar; the channel name until a 328 reply
    pub(crate) label: String,
    pub(crate) host: Option<String>,
    pub(crate) ping: Option<String>,
    /// Commands that fell back to the default template
    pub(crate) unhandled: BTreeSet<String>,
    pub(crate) threshold: usize,
}

impl ChatSession {
    pub(crate) fn new(target: Target) -> Self {
        let label = target.name().to_string();
        Self {
            target,
            nick: None,
            presence: Presence::new(),
            label,
            host: None,
            ping: None,
            unhandled: BTreeSet::new(),
            threshold: LARGE_CHANNEL_THRESHOLD,
        }
    }

    pub(crate) fn channel(&self) -> &str {
        self.target.name()
    }

    pub(crate) fn display_nick(&self) -> &str {
        self.nick.as_deref().unwrap_or("me")
    }

    fn is_large(&self) -> bool {
        self.presence.count() > self.threshold
    }

    /// Suppress membership chatter in big channels.
    fn membership_outcome(&self) -> HandlerOutcome {
        if self.is_large() {
            HandlerOutcome::Suppress
        } else {
            HandlerOutcome::Keep
        }
    }

    /// A chat line in the session's style, coloring `name` consistently.
    pub(crate) fn message_line(&mut self, name: &str, content: &str) -> String {
        let color = self.presence.color_for(name);
        format_message(&clock(), name, color, content, self.nick.as_deref())
    }

    /// Status bar content: nick, channel label, member counts, host or ping.
    pub(crate) fn status(&mut self) -> Status {
        Status {
            nick: self.display_nick().to_string(),
            label: self.label.clone(),
            users: self.presence.count(),
            active: self.presence.active_count(),
            server: self.ping.clone().or_else(|| self.host.clone()),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub(crate) struct Status {
    pub(crate) nick: String,
    pub(crate) label: String,
    pub(crate) users: usize,
    pub(crate) active: usize,
    pub(crate) server: Option<String>,
}

pub(crate) fn handlers() -> HandlerRegistry<ChatSession> {
    let mut registry = HandlerRegistry::new();
    registry
        .on("NICK", on_nick)
        .on("PRIVMSG", on_privmsg)
        .on("JOIN", on_join)
        .on("PART", on_part)
        .on("QUIT", on_part)
        .on("353", on_names)
        .on("002", on_host)
        .on("328", on_channel_url)
        .on("MODE", on_mode)
        .on("PING", on_ping);
    registry
}

fn on_nick(session: &mut ChatSession, event: &Event) -> HandlerOutcome {
    let own = event.user.is_empty() || session.nick.as_deref() == Some(event.user.as_str());
    if own {
        if let Some(old) = session.nick.take() {
            session.presence.rename(&old, &event.content);
        }
        session.nick = Some(event.content.clone());
        return HandlerOutcome::Replace(format!("You are now known as {}", event.content));
    }
    session.presence.rename(&event.user, &event.content);
    HandlerOutcome::Keep
}

fn on_privmsg(session: &mut ChatSession, event: &Event) -> HandlerOutcome {
    session.presence.mark_active(&event.user);
    HandlerOutcome::Replace(session.message_line(&event.user, &event.content))
}

fn on_join(session: &mut ChatSession, event: &Event) -> HandlerOutcome {
    session.presence.add(&event.user);
    session.membership_outcome()
}

fn on_part(session: &mut ChatSession, event: &Event) -> HandlerOutcome {
    session.presence.remove(&event.user);
    session.membership_outcome()
}

fn on_names(session: &mut ChatSession, event: &Event) -> HandlerOutcome {
    session.presence.add_all(&event.content);
    session.membership_outcome()
}

/// "Your host is irc.example.org, running version x" -> "irc.example.org"
fn on_host(session: &mut ChatSession, event: &Event) -> HandlerOutcome {
    let first = event.content.split(',').next().unwrap_or_default();
    let host = first.replace("Your host is ", "").trim().to_string();
    if !host.is_empty() {
        session.host = Some(host);
    }
    HandlerOutcome::Keep
}

fn on_channel_url(session: &mut ChatSession, event: &Event) -> HandlerOutcome {
    session.label = format!("{} ({})", session.channel(), event.content);
    HandlerOutcome::Suppress
}

fn on_mode(_: &mut ChatSession, event: &Event) -> HandlerOutcome {
    if event.content.is_empty() {
        HandlerOutcome::Suppress
    } else {
        HandlerOutcome::Keep
    }
}

fn on_ping(session: &mut ChatSession, event: &Event) -> HandlerOutcome {
    session.ping = Some(event.content.clone());
    HandlerOutcome::Suppress
}
