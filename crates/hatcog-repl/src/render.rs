use std::collections::VecDeque;
use std::io::{self, Write};
use std::process::{Command, Stdio};

use crossterm::terminal::{self, ClearType};
use crossterm::{cursor, queue};
use hatcog_core::constants::{SCROLLBACK_LINES, VERSION};
use hatcog_core::LineEditor;
use unicode_width::{UnicodeWidthChar, UnicodeWidthStr};

use crate::session::Status;
use crate::{RESET, REVERSE};

const PROMPT: &str = "> ";
const PROMPT_WIDTH: usize = 2;

/// Chat output printed line by line above a two line footer: the status
/// bar and the input prompt. Keeps the recent output for redraws and the
/// pager.
pub(crate) struct Screen<W: Write> {
    out: W,
    width: usize,
    rows: usize,
    scrollback: VecDeque<String>,
    footer_drawn: bool,
}

impl<W: Write> Screen<W> {
    pub(crate) fn new(out: W, (width, rows): (u16, u16)) -> Self {
        Self {
            out,
            width: width.max(10) as usize,
            rows: rows.max(3) as usize,
            scrollback: VecDeque::new(),
            footer_drawn: false,
        }
    }

    pub(crate) fn scrollback(&self) -> impl Iterator<Item = &str> {
        self.scrollback.iter().map(String::as_str)
    }

    pub(crate) fn print_above_input(
        &mut self,
        text: &str,
        status: &Status,
        editor: &LineEditor,
    ) -> io::Result<()> {
        self.clear_footer()?;
        for line in text.split('\n') {
            write!(self.out, "{line}\r\n")?;
            self.remember(line);
        }
        self.redraw_input(status, editor)
    }

    pub(crate) fn redraw_input(&mut self, status: &Status, editor: &LineEditor) -> io::Result<()> {
        self.clear_footer()?;
        let bar = status_bar(status, self.width);
        write!(self.out, "{REVERSE}{bar}{RESET}\r\n")?;

        let room = self.width.saturating_sub(PROMPT_WIDTH + 1);
        let (visible, column) = visible_input(editor.buffer(), editor.cursor_column(), room);
        write!(self.out, "{PROMPT}{visible}")?;
        queue!(
            self.out,
            cursor::MoveToColumn((PROMPT_WIDTH + column) as u16)
        )?;
        self.footer_drawn = true;
        self.out.flush()
    }

    /// Start over on a cleared terminal of the given size, reprinting as
    /// much scrollback as fits.
    pub(crate) fn rebuild(
        &mut self,
        (width, rows): (u16, u16),
        host: Option<&str>,
        status: &Status,
        editor: &LineEditor,
    ) -> io::Result<()> {
        self.width = width.max(10) as usize;
        self.rows = rows.max(3) as usize;
        queue!(self.out, terminal::Clear(ClearType::All), cursor::MoveTo(0, 0))?;
        self.footer_drawn = false;

        write!(self.out, "{REVERSE}{}{RESET}\r\n", header(host, self.width))?;
        let fits = self.rows.saturating_sub(3);
        let skip = self.scrollback.len().saturating_sub(fits);
        for line in self.scrollback.iter().skip(skip) {
            write!(self.out, "{line}\r\n")?;
        }
        self.redraw_input(status, editor)
    }

    /// Remove the footer so normal output can continue where it was.
    pub(crate) fn clear_footer(&mut self) -> io::Result<()> {
        if !self.footer_drawn {
            return Ok(());
        }
        queue!(
            self.out,
            cursor::MoveUp(1),
            cursor::MoveToColumn(0),
            terminal::Clear(ClearType::FromCursorDown)
        )?;
        self.footer_drawn = false;
        Ok(())
    }

    fn remember(&mut self, line: &str) {
        if self.scrollback.len() == SCROLLBACK_LINES {
            self.scrollback.pop_front();
        }
        self.scrollback.push_back(line.to_string());
    }

    #[cfg(test)]
    fn output(&self) -> &W {
        &self.out
    }
}

fn header(host: Option<&str>, width: usize) -> String {
    let left = format!("+ {VERSION} +");
    spread(&left, "", host.unwrap_or_default(), width)
}

/// `nick` left, channel label centered, counts and server right.
pub(crate) fn status_bar(status: &Status, width: usize) -> String {
    let mut right = format!("{} users, {} active", status.users, status.active);
    if let Some(server) = &status.server {
        right = format!("{right} | {server}");
    }
    spread(&status.nick, &status.label, &right, width)
}

fn spread(left: &str, center: &str, right: &str, width: usize) -> String {
    let used = left.width() + center.width() + right.width();
    if used + 2 > width {
        return truncate(&format!("{left} {center} {right}"), width);
    }
    let spare = width - used;
    let before = (width.saturating_sub(center.width()) / 2).saturating_sub(left.width()).clamp(1, spare - 1);
    let after = spare - before;
    format!("{left}{}{center}{}{right}", " ".repeat(before), " ".repeat(after))
}

fn truncate(text: &str, width: usize) -> String {
    let mut used = 0;
    let mut out = String::new();
    for c in text.chars() {
        let w = c.width().unwrap_or(0);
        if used + w > width {
            break;
        }
        used += w;
        out.push(c);
    }
    out.push_str(&" ".repeat(width - used));
    out
}

/// The part of `buffer` to show in `room` columns so the cursor stays in
/// view, and the cursor column inside that part.
pub(crate) fn visible_input(buffer: &str, cursor_column: usize, room: usize) -> (&str, usize) {
    if room == 0 || cursor_column < room {
        let end = fit_end(buffer, room);
        return (&buffer[..end], cursor_column);
    }
    // drop whole chars from the left until the cursor fits
    let excess = cursor_column + 1 - room;
    let mut dropped = 0;
    let mut start = 0;
    for (i, c) in buffer.char_indices() {
        if dropped >= excess {
            start = i;
            break;
        }
        dropped += c.width().unwrap_or(0);
        start = i + c.len_utf8();
    }
    let rest = &buffer[start..];
    let end = fit_end(rest, room);
    (&rest[..end], cursor_column - dropped)
}

fn fit_end(text: &str, room: usize) -> usize {
    let mut used = 0;
    for (i, c) in text.char_indices() {
        let w = c.width().unwrap_or(0);
        if used + w > room {
            return i;
        }
        used += w;
    }
    text.len()
}

/// `$PAGER`, or `less -R` when unset.
pub(crate) fn pager_command() -> String {
    std::env::var("PAGER")
        .ok()
        .filter(|p| !p.trim().is_empty())
        .unwrap_or_else(|| "less -R".to_string())
}

/// Show `lines` in `pager` and wait for it to exit. The caller leaves raw
/// mode first. Blocks the calling worker thread, so inside tokio it needs
/// the multi-threaded runtime.
pub(crate) fn page<'a>(pager: &str, lines: impl Iterator<Item = &'a str>) -> io::Result<()> {
    let mut words = pager.split_whitespace();
    let program = words.next().unwrap_or("less");

    tokio::task::block_in_place(|| {
        let mut child = Command::new(program)
            .args(words)
            .stdin(Stdio::piped())
            .spawn()?;
        if let Some(mut stdin) = child.stdin.take() {
            for line in lines {
                // the pager may quit before reading everything
                if writeln!(stdin, "{line}").is_err() {
                    break;
                }
            }
        }
        child.wait()?;
        Ok(())
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use hatcog_core::{Key, Presence};

    fn status() -> Status {
        Status {
            nick: "bob".to_string(),
            label: "#test".to_string(),
            users: 3,
            active: 1,
            server: None,
        }
    }

    fn written(screen: &Screen<Vec<u8>>) -> String {
        String::from_utf8_lossy(screen.output()).into_owned()
    }

    #[test]
    fn test_status_bar_layout() {
        let bar = status_bar(&status(), 40);
        assert_eq!(bar.width(), 40);
        assert!(bar.starts_with("bob "));
        assert!(bar.ends_with("3 users, 1 active"));
        assert!(bar.contains("#test"));
    }

    #[test]
    fn test_status_bar_truncates_when_narrow() {
        let bar = status_bar(&status(), 12);
        assert_eq!(bar.width(), 12);
        assert!(bar.starts_with("bob #test"));
    }

    #[test]
    fn test_visible_input_scrolls_to_cursor() {
        assert_eq!(visible_input("hello", 5, 10), ("hello", 5));
        let (shown, column) = visible_input("abcdefghij", 10, 5);
        assert_eq!(shown, "ghij");
        assert_eq!(column, 4);
        let (shown, column) = visible_input("abcdefghij", 2, 5);
        assert_eq!(shown, "abcde");
        assert_eq!(column, 2);
    }

    #[test]
    fn test_print_keeps_scrollback() {
        let mut screen = Screen::new(Vec::new(), (40, 10));
        let editor = LineEditor::new();
        screen.print_above_input("one\ntwo", &status(), &editor).unwrap();
        screen.print_above_input("three", &status(), &editor).unwrap();
        assert_eq!(screen.scrollback().collect::<Vec<_>>(), vec!["one", "two", "three"]);
        let out = written(&screen);
        assert!(out.contains("one\r\ntwo\r\n"));
        assert!(out.contains("> "));
    }

    #[test]
    fn test_scrollback_is_bounded() {
        let mut screen = Screen::new(Vec::new(), (40, 10));
        let editor = LineEditor::new();
        for i in 0..SCROLLBACK_LINES + 5 {
            screen.print_above_input(&format!("line {i}"), &status(), &editor).unwrap();
        }
        assert_eq!(screen.scrollback().count(), SCROLLBACK_LINES);
        assert_eq!(screen.scrollback().next(), Some("line 5"));
    }

    #[test]
    fn test_redraw_shows_input() {
        let mut screen = Screen::new(Vec::new(), (40, 10));
        let mut editor = LineEditor::new();
        for byte in b"hi there" {
            editor.handle_key(Key::Byte(*byte), &Presence::new());
        }
        screen.redraw_input(&status(), &editor).unwrap();
        assert!(written(&screen).contains("> hi there"));
    }

    #[test]
    fn test_rebuild_reprints_tail() {
        let mut screen = Screen::new(Vec::new(), (40, 5));
        let editor = LineEditor::new();
        for line in ["a1", "b2", "c3", "d4"] {
            screen.print_above_input(line, &status(), &editor).unwrap();
        }
        let before = screen.output().len();
        screen.rebuild((40, 5), Some("irc.example.org"), &status(), &editor).unwrap();
        let after = String::from_utf8_lossy(&screen.output()[before..]).into_owned();
        assert!(after.contains("irc.example.org"));
        assert!(after.contains("c3\r\nd4\r\n"));
        assert!(!after.contains("b2"));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_page_runs_on_runtime_worker() {
        let lines = ["one", "two"];
        page("true", lines.iter().copied()).unwrap();
        assert!(page("hatcog-no-such-pager", lines.iter().copied()).is_err());
    }
}
