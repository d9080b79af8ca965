use unicode_segmentation::UnicodeSegmentation;
use unicode_width::UnicodeWidthStr;

/// Longest UTF-8 encoding of a single char
const MAX_SEQUENCE: usize = 4;

/// Resolves the partial word under the cursor to a full nickname.
pub trait NickCompleter {
    /// Completed nick, or `prefix` unchanged when nothing matches.
    fn complete(&self, prefix: &str) -> String;
}

impl NickCompleter for crate::presence::Presence {
    fn complete(&self, prefix: &str) -> String {
        self.first_match(prefix, None).to_string()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Key {
    /// One raw byte of typed text; multi-byte characters arrive byte by byte
    Byte(u8),
    Left,
    Right,
    Home,
    End,
    Backspace,
    Enter,
    Up,
    Down,
    Tab,
    /// Ctrl-D / Ctrl-C
    Interrupt,
    Resize,
    PageScroll,
    Other,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RebuildReason {
    Resize,
    /// Scrollback must be shown in the pager first
    PageScroll,
}

/// Everything needed to resume editing on a fresh display surface.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EditSnapshot {
    pub buffer: String,
    pub cursor: usize,
    pub previous: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EditOutcome {
    Continue,
    Line(String),
    Quit,
    Rebuild {
        reason: RebuildReason,
        snapshot: EditSnapshot,
    },
}

/// Input line state machine.
///
/// `cursor` is a byte offset into `buffer` that always sits on a char
/// boundary and never exceeds `buffer.len()`. Typed bytes collect in
/// `pending` until they form one complete character.
#[derive(Debug, Clone, Default)]
pub struct LineEditor {
    buffer: String,
    cursor: usize,
    pending: Vec<u8>,
    previous: String,
}

impl LineEditor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Continue an edit interrupted by a rebuild.
    pub fn resume(snapshot: EditSnapshot) -> Self {
        let EditSnapshot {
            buffer,
            cursor,
            previous,
        } = snapshot;
        let cursor = if cursor <= buffer.len() && buffer.is_char_boundary(cursor) {
            cursor
        } else {
            buffer.len()
        };
        Self {
            buffer,
            cursor,
            pending: Vec::new(),
            previous,
        }
    }

    pub fn buffer(&self) -> &str {
        &self.buffer
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn previous(&self) -> &str {
        &self.previous
    }

    /// Whether a multi-byte character is partially typed.
    pub fn is_composing(&self) -> bool {
        !self.pending.is_empty()
    }

    /// Terminal columns taken by the text left of the cursor.
    pub fn cursor_column(&self) -> usize {
        self.buffer[..self.cursor].width()
    }

    pub fn snapshot(&self) -> EditSnapshot {
        EditSnapshot {
            buffer: self.buffer.clone(),
            cursor: self.cursor,
            previous: self.previous.clone(),
        }
    }

    pub fn handle_key(&mut self, key: Key, completer: &dyn NickCompleter) -> EditOutcome {
        if let Key::Byte(byte) = key {
            self.feed_byte(byte);
            return EditOutcome::Continue;
        }
        self.pending.clear();

        match key {
            Key::Left => self.move_left(),
            Key::Right => self.move_right(),
            Key::Home => self.cursor = 0,
            Key::End => self.cursor = self.buffer.len(),
            Key::Backspace => self.delete_back(),
            Key::Enter => return EditOutcome::Line(self.submit()),
            Key::Up => {
                self.buffer = self.previous.clone();
                self.cursor = self.buffer.len();
            }
            Key::Down => {
                self.buffer.clear();
                self.cursor = 0;
            }
            Key::Tab => self.complete(completer),
            Key::Interrupt => return EditOutcome::Quit,
            Key::Resize => return self.rebuild(RebuildReason::Resize),
            Key::PageScroll => return self.rebuild(RebuildReason::PageScroll),
            Key::Byte(_) | Key::Other => {}
        }
        EditOutcome::Continue
    }

    fn feed_byte(&mut self, byte: u8) {
        if self.pending.is_empty() && (byte < 0x20 || byte == 0x7f) {
            return;
        }
        self.pending.push(byte);

        match std::str::from_utf8(&self.pending) {
            Ok(text) => {
                let text = text.to_owned();
                self.pending.clear();
                self.insert_str(&text);
            }
            Err(e) if e.error_len().is_none() && self.pending.len() < MAX_SEQUENCE => {}
            Err(_) => {
                let restart = self.pending.len() > 1;
                tracing::trace!(bytes = ?self.pending, "discarding invalid input sequence");
                self.pending.clear();
                // the byte that broke the sequence may start a new one
                if restart {
                    self.feed_byte(byte);
                }
            }
        }
    }

    fn insert_str(&mut self, text: &str) {
        self.buffer.insert_str(self.cursor, text);
        self.cursor += text.len();
    }

    fn move_left(&mut self) {
        self.cursor = self.prev_boundary();
    }

    fn move_right(&mut self) {
        self.cursor = self.next_boundary();
    }

    fn delete_back(&mut self) {
        if self.cursor == 0 {
            return;
        }
        let prev = self.prev_boundary();
        self.buffer.drain(prev..self.cursor);
        self.cursor = prev;
    }

    fn submit(&mut self) -> String {
        let line = std::mem::take(&mut self.buffer);
        self.cursor = 0;
        self.previous = line.clone();
        line
    }

    fn complete(&mut self, completer: &dyn NickCompleter) {
        let before = &self.buffer[..self.cursor];
        let start = before
            .char_indices()
            .rev()
            .find(|(_, c)| c.is_whitespace())
            .map(|(i, c)| i + c.len_utf8())
            .unwrap_or(0);
        let token = &self.buffer[start..self.cursor];
        if token.is_empty() {
            return;
        }
        let resolved = completer.complete(token);
        if resolved == token {
            return;
        }
        self.buffer.replace_range(start..self.cursor, &resolved);
        self.cursor = start + resolved.len();
    }

    fn rebuild(&self, reason: RebuildReason) -> EditOutcome {
        EditOutcome::Rebuild {
            reason,
            snapshot: self.snapshot(),
        }
    }

    fn prev_boundary(&self) -> usize {
        self.buffer[..self.cursor]
            .grapheme_indices(true)
            .next_back()
            .map(|(i, _)| i)
            .unwrap_or(0)
    }

    fn next_boundary(&self) -> usize {
        self.buffer[self.cursor..]
            .graphemes(true)
            .next()
            .map(|g| self.cursor + g.len())
            .unwrap_or(self.cursor)
    }
}
