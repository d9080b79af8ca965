use chrono::Local;
use hatcog_core::constants::NAME_WIDTH;
use hatcog_core::event::action_text;
use unicode_width::UnicodeWidthStr;

use crate::{BOLD, RED, RESET, YELLOW};

pub(crate) fn clock() -> String {
    Local::now().format("%H:%M").to_string()
}

/// Right-align `text` in `width` terminal columns.
pub(crate) fn lpad(width: usize, text: &str) -> String {
    let pad = width.saturating_sub(text.width());
    format!("{}{text}", " ".repeat(pad))
}

fn colored(color: u8, text: &str) -> String {
    format!("\x1b[38;5;{color}m{text}{RESET}")
}

/// Bold the first mention of our own nick.
fn highlight(content: &str, nick: Option<&str>) -> String {
    match nick.filter(|n| !n.is_empty()).and_then(|n| content.find(n).map(|pos| (n, pos))) {
        Some((nick, pos)) => {
            let after = &content[pos + nick.len()..];
            format!("{}{BOLD}{nick}{RESET}{after}", &content[..pos])
        }
        None => content.to_string(),
    }
}

/// One chat line: `HH:MM`, the sender right-aligned in their color, then
/// the text. Our own name is bold instead of colored. CTCP ACTION
/// content renders as `* name text`.
pub(crate) fn format_message(
    time: &str,
    name: &str,
    color: u8,
    content: &str,
    own_nick: Option<&str>,
) -> String {
    let is_me = own_nick == Some(name);
    let paint = |text: &str| {
        if is_me {
            format!("{BOLD}{text}{RESET}")
        } else {
            colored(color, text)
        }
    };

    if let Some(action) = action_text(content) {
        let action = action.strip_prefix(name).map(str::trim_start).unwrap_or(action);
        let star = paint(&lpad(NAME_WIDTH, "*"));
        return format!("{time} {star} {} {action}", paint(name));
    }

    let body = if is_me {
        content.to_string()
    } else {
        highlight(content, own_nick)
    };
    format!("{time} {} {body}", paint(&lpad(NAME_WIDTH, name)))
}

pub(crate) fn system(msg: &str) -> String {
    format!("{YELLOW}{msg}{RESET}")
}

pub(crate) fn error(msg: &str) -> String {
    format!("{RED}error:{RESET} {msg}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lpad() {
        assert_eq!(lpad(5, "ab"), "   ab");
        assert_eq!(lpad(2, "abcd"), "abcd");
        assert_eq!(lpad(4, "日本"), "日本");
    }

    #[test]
    fn test_message_from_other_is_colored() {
        let line = format_message("12:34", "alice", 33, "hello", Some("bob"));
        assert!(line.starts_with("12:34 "));
        assert!(line.contains(&format!("\x1b[38;5;33m{}", lpad(NAME_WIDTH, "alice"))));
        assert!(line.ends_with(" hello"));
    }

    #[test]
    fn test_own_nick_highlighted() {
        let line = format_message("12:34", "alice", 33, "hi bob, hi bob", Some("bob"));
        assert!(line.ends_with(&format!("hi {BOLD}bob{RESET}, hi bob")));
    }

    #[test]
    fn test_own_message_is_bold() {
        let line = format_message("12:34", "bob", 33, "hi", Some("bob"));
        assert!(line.contains(&format!("{BOLD}{}{RESET}", lpad(NAME_WIDTH, "bob"))));
        assert!(!line.contains("\x1b[38;5;"));
    }

    #[test]
    fn test_action() {
        let line = format_message("12:34", "bob", 33, "\u{1}ACTION bob waves\u{1}", None);
        assert!(line.ends_with("bob\x1b[0m waves"));
        assert!(line.contains('*'));

        let line = format_message("12:34", "bob", 33, "\u{1}ACTION waves\u{1}", None);
        assert!(line.ends_with("bob\x1b[0m waves"));
    }

    #[test]
    fn test_system_and_error() {
        assert_eq!(system("hi"), format!("{YELLOW}hi{RESET}"));
        assert!(error("boom").ends_with(" boom"));
    }
}
