use crossterm::event::{Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use hatcog_core::Key;

/// Editor keys for one terminal event. Typed characters become their UTF-8
/// bytes so the editor assembles them itself.
pub(crate) fn translate(event: &Event) -> Vec<Key> {
    match event {
        Event::Key(key) => translate_key(key),
        Event::Paste(text) => text.bytes().map(Key::Byte).collect(),
        Event::Resize(..) => vec![Key::Resize],
        _ => Vec::new(),
    }
}

fn translate_key(key: &KeyEvent) -> Vec<Key> {
    if key.kind != KeyEventKind::Press {
        return Vec::new();
    }
    let key = match key.code {
        KeyCode::Char('c' | 'd') if key.modifiers.contains(KeyModifiers::CONTROL) => Key::Interrupt,
        KeyCode::Char(_) if key.modifiers.contains(KeyModifiers::CONTROL) => Key::Other,
        KeyCode::Char(c) => {
            let mut buf = [0u8; 4];
            return c.encode_utf8(&mut buf).bytes().map(Key::Byte).collect();
        }
        KeyCode::Left => Key::Left,
        KeyCode::Right => Key::Right,
        KeyCode::Home => Key::Home,
        KeyCode::End => Key::End,
        KeyCode::Backspace => Key::Backspace,
        KeyCode::Enter => Key::Enter,
        KeyCode::Up => Key::Up,
        KeyCode::Down => Key::Down,
        KeyCode::Tab => Key::Tab,
        KeyCode::PageUp | KeyCode::PageDown => Key::PageScroll,
        _ => Key::Other,
    };
    vec![key]
}

#[cfg(test)]
mod tests {
    use super::*;

    fn press(code: KeyCode, modifiers: KeyModifiers) -> Event {
        Event::Key(KeyEvent::new(code, modifiers))
    }

    #[test]
    fn test_chars_become_utf8_bytes() {
        assert_eq!(
            translate(&press(KeyCode::Char('a'), KeyModifiers::NONE)),
            vec![Key::Byte(b'a')]
        );
        assert_eq!(
            translate(&press(KeyCode::Char('\u{20ac}'), KeyModifiers::NONE)),
            vec![Key::Byte(0xe2), Key::Byte(0x82), Key::Byte(0xac)]
        );
    }

    #[test]
    fn test_control_keys() {
        assert_eq!(translate(&press(KeyCode::Char('d'), KeyModifiers::CONTROL)), vec![Key::Interrupt]);
        assert_eq!(translate(&press(KeyCode::Char('c'), KeyModifiers::CONTROL)), vec![Key::Interrupt]);
        assert_eq!(translate(&press(KeyCode::Char('x'), KeyModifiers::CONTROL)), vec![Key::Other]);
        assert_eq!(translate(&press(KeyCode::PageUp, KeyModifiers::NONE)), vec![Key::PageScroll]);
        assert_eq!(translate(&press(KeyCode::Tab, KeyModifiers::NONE)), vec![Key::Tab]);
        assert_eq!(translate(&press(KeyCode::F(1), KeyModifiers::NONE)), vec![Key::Other]);
    }

    #[test]
    fn test_resize_and_release() {
        assert_eq!(translate(&Event::Resize(80, 24)), vec![Key::Resize]);
        let release = KeyEvent::new_with_kind(KeyCode::Char('a'), KeyModifiers::NONE, KeyEventKind::Release);
        assert!(translate(&Event::Key(release)).is_empty());
        assert!(translate(&Event::FocusGained).is_empty());
    }
}
