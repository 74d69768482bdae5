//! Input encoding for remote shells.
//!
//! Converts semantic key events into the byte sequences an `xterm` remote
//! shell expects, and recognises the reserved chords that steer focus locally
//! and must never reach a bridge.

use neurossh_types::{Key, KeyEvent, Modifiers};

/// Locally handled commands bound to reserved chords
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FocusCommand {
    FocusSidebar,
    FocusTerminal,
    PreviousTab,
    NextTab,
    ToggleBroadcast,
}

const RESERVED: &[(KeyEvent, FocusCommand)] = &[
    (KeyEvent::ctrl(Key::Char('h')), FocusCommand::FocusSidebar),
    (KeyEvent::ctrl(Key::Char('l')), FocusCommand::FocusTerminal),
    (KeyEvent::ctrl(Key::PageUp), FocusCommand::PreviousTab),
    (KeyEvent::ctrl(Key::PageDown), FocusCommand::NextTab),
    (KeyEvent::ctrl(Key::Char('b')), FocusCommand::ToggleBroadcast),
];

/// Fixed escape sequences for navigation and function keys
const KEY_TABLE: &[(Key, &[u8])] = &[
    (Key::BackTab, b"\x1b[Z"),
    (Key::Up, b"\x1b[A"),
    (Key::Down, b"\x1b[B"),
    (Key::Right, b"\x1b[C"),
    (Key::Left, b"\x1b[D"),
    (Key::Insert, b"\x1b[2~"),
    (Key::Delete, b"\x1b[3~"),
    (Key::Home, b"\x1b[H"),
    (Key::End, b"\x1b[F"),
    (Key::PageUp, b"\x1b[5~"),
    (Key::PageDown, b"\x1b[6~"),
    (Key::F(1), b"\x1bOP"),
    (Key::F(2), b"\x1bOQ"),
    (Key::F(3), b"\x1bOR"),
    (Key::F(4), b"\x1bOS"),
    (Key::F(5), b"\x1b[15~"),
    (Key::F(6), b"\x1b[17~"),
    (Key::F(7), b"\x1b[18~"),
    (Key::F(8), b"\x1b[19~"),
    (Key::F(9), b"\x1b[20~"),
    (Key::F(10), b"\x1b[21~"),
    (Key::F(11), b"\x1b[23~"),
    (Key::F(12), b"\x1b[24~"),
];

/// Return the local command bound to `event`, if it is a reserved chord.
pub fn reserved_command(event: &KeyEvent) -> Option<FocusCommand> {
    let normalized = normalize(event);
    RESERVED
        .iter()
        .find(|(chord, _)| *chord == normalized)
        .map(|(_, command)| *command)
}

/// Convert a key event to bytes for the remote shell.
///
/// Returns None for reserved chords and for keys outside the table.
pub fn translate(event: &KeyEvent) -> Option<Vec<u8>> {
    if reserved_command(event).is_some() {
        return None;
    }

    let bytes = match event.key {
        Key::Char(ch) => encode_char(ch, event.modifiers),
        Key::Enter => vec![b'\r'],
        Key::Backspace => vec![0x7f],
        Key::Tab => vec![b'\t'],
        Key::Esc => vec![0x1b],
        other => {
            return KEY_TABLE
                .iter()
                .find(|(key, _)| *key == other)
                .map(|(_, seq)| seq.to_vec());
        }
    };

    Some(with_alt_prefix(event.modifiers, bytes))
}

/// Compare chords case-insensitively and ignore shift on letters
fn normalize(event: &KeyEvent) -> KeyEvent {
    match event.key {
        Key::Char(ch) if ch.is_ascii_alphabetic() => KeyEvent::new(
            Key::Char(ch.to_ascii_lowercase()),
            Modifiers {
                shift: false,
                ..event.modifiers
            },
        ),
        _ => *event,
    }
}

fn encode_char(ch: char, modifiers: Modifiers) -> Vec<u8> {
    if modifiers.ctrl {
        if let Some(code) = control_code(ch) {
            return vec![code];
        }
    }
    let mut buffer = [0u8; 4];
    ch.encode_utf8(&mut buffer).as_bytes().to_vec()
}

// Ctrl+letter produces control codes (1-26)
fn control_code(ch: char) -> Option<u8> {
    let lowercase = ch.to_ascii_lowercase();
    match lowercase {
        'a'..='z' => Some(lowercase as u8 - b'a' + 1),
        ' ' | '@' | '2' => Some(0x00),
        '[' | '3' => Some(0x1b),
        '\\' | '4' => Some(0x1c),
        ']' | '5' => Some(0x1d),
        '^' | '6' => Some(0x1e),
        '_' | '7' | '-' => Some(0x1f),
        _ => None,
    }
}

fn with_alt_prefix(modifiers: Modifiers, bytes: Vec<u8>) -> Vec<u8> {
    if !modifiers.alt {
        return bytes;
    }
    let mut prefixed = Vec::with_capacity(bytes.len() + 1);
    prefixed.push(0x1b);
    prefixed.extend(bytes);
    prefixed
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bytes(event: KeyEvent) -> Vec<u8> {
        translate(&event).unwrap()
    }

    #[test]
    fn test_basic_keys() {
        assert_eq!(bytes(KeyEvent::plain(Key::Enter)), b"\r");
        assert_eq!(bytes(KeyEvent::plain(Key::Backspace)), vec![0x7f]);
        assert_eq!(bytes(KeyEvent::plain(Key::Tab)), b"\t");
        assert_eq!(bytes(KeyEvent::plain(Key::Esc)), vec![0x1b]);
        assert_eq!(bytes(KeyEvent::plain(Key::BackTab)), b"\x1b[Z");
        assert_eq!(bytes(KeyEvent::char('x')), vec![0x78]);
        assert_eq!(bytes(KeyEvent::char('é')), "é".as_bytes());
    }

    #[test]
    fn test_table_sequences_are_fixed_and_distinct() {
        let mut seen = std::collections::HashSet::new();
        for (key, expected) in KEY_TABLE {
            let first = bytes(KeyEvent::plain(*key));
            let second = bytes(KeyEvent::plain(*key));
            assert_eq!(first, *expected);
            assert_eq!(first, second);
            assert!(seen.insert(first), "duplicate sequence for {:?}", key);
        }
        assert_eq!(bytes(KeyEvent::plain(Key::F(1))), b"\x1bOP");
        assert_eq!(bytes(KeyEvent::plain(Key::F(12))), b"\x1b[24~");
        assert_eq!(translate(&KeyEvent::plain(Key::F(13))), None);
    }

    #[test]
    fn test_control_and_alt_combinations() {
        assert_eq!(bytes(KeyEvent::ctrl(Key::Char('c'))), vec![0x03]);
        assert_eq!(bytes(KeyEvent::ctrl(Key::Char('D'))), vec![0x04]);
        assert_eq!(bytes(KeyEvent::new(Key::Char('f'), Modifiers::ALT)), b"\x1bf");
        assert_eq!(
            bytes(KeyEvent::new(Key::Backspace, Modifiers::ALT)),
            vec![0x1b, 0x7f]
        );
    }

    #[test]
    fn test_reserved_chords_never_translate() {
        for (chord, command) in RESERVED {
            assert_eq!(reserved_command(chord), Some(*command));
            assert_eq!(translate(chord), None);
        }
        let shifted = KeyEvent::new(
            Key::Char('L'),
            Modifiers {
                ctrl: true,
                shift: true,
                alt: false,
            },
        );
        assert_eq!(reserved_command(&shifted), Some(FocusCommand::FocusTerminal));
        assert_eq!(reserved_command(&KeyEvent::char('h')), None);
    }
}
