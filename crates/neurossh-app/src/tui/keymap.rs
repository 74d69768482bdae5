//! Fixed key bindings for the UI and conversion from crossterm key events.

use crossterm::event::{KeyCode, KeyEvent as CtKeyEvent, KeyEventKind, KeyModifiers};
use neurossh_types::{Key, KeyEvent, Modifiers};

/// Which pane must have focus for a binding to fire
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scope {
    Global,
    Sidebar,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Quit,
    Connect,
    CursorUp,
    CursorDown,
    CloseTab,
    SaveTranscript,
    DeleteEntry,
    Reload,
    ToggleHelp,
}

impl Action {
    pub fn describe(&self) -> &'static str {
        match self {
            Action::Quit => "Quit",
            Action::Connect => "Connect to session",
            Action::CursorUp => "Move up",
            Action::CursorDown => "Move down",
            Action::CloseTab => "Close active tab",
            Action::SaveTranscript => "Save screen to file",
            Action::DeleteEntry => "Delete session or folder",
            Action::Reload => "Reload sessions",
            Action::ToggleHelp => "Toggle help",
        }
    }
}

const BINDINGS: &[(KeyEvent, Scope, Action)] = &[
    (KeyEvent::ctrl(Key::Char('w')), Scope::Global, Action::CloseTab),
    (KeyEvent::ctrl(Key::Char('s')), Scope::Global, Action::SaveTranscript),
    (KeyEvent::char('q'), Scope::Sidebar, Action::Quit),
    (KeyEvent::plain(Key::Enter), Scope::Sidebar, Action::Connect),
    (KeyEvent::char('j'), Scope::Sidebar, Action::CursorDown),
    (KeyEvent::plain(Key::Down), Scope::Sidebar, Action::CursorDown),
    (KeyEvent::char('k'), Scope::Sidebar, Action::CursorUp),
    (KeyEvent::plain(Key::Up), Scope::Sidebar, Action::CursorUp),
    (KeyEvent::char('d'), Scope::Sidebar, Action::DeleteEntry),
    (KeyEvent::char('r'), Scope::Sidebar, Action::Reload),
    // With the terminal focused F1 goes to the remote shell
    (KeyEvent::plain(Key::F(1)), Scope::Sidebar, Action::ToggleHelp),
];

/// Help rows for the reserved terminal chords, which the tab manager handles
const RESERVED_HELP: &[(&str, &str)] = &[
    ("Ctrl+H", "Focus sidebar"),
    ("Ctrl+L", "Focus terminal"),
    ("Ctrl+PgUp / Ctrl+PgDn", "Previous / next tab"),
    ("Ctrl+B", "Toggle broadcast to all tabs"),
];

/// The action bound to `event`, given whether the sidebar has focus
pub fn action_for(event: &KeyEvent, sidebar_focused: bool) -> Option<Action> {
    BINDINGS
        .iter()
        .find(|(chord, scope, _)| {
            chord == event && (*scope == Scope::Global || sidebar_focused)
        })
        .map(|(_, _, action)| *action)
}

/// `(chord, description)` rows for the help overlay
pub fn help_rows() -> Vec<(String, &'static str)> {
    let mut rows: Vec<(String, &'static str)> = Vec::new();
    for (chord, _, action) in BINDINGS {
        let label = chord_label(chord);
        match rows.iter_mut().find(|(_, text)| *text == action.describe()) {
            Some((existing, _)) => {
                existing.push_str(" / ");
                existing.push_str(&label);
            }
            None => rows.push((label, action.describe())),
        }
    }
    rows.extend(RESERVED_HELP.iter().map(|(chord, text)| (chord.to_string(), *text)));
    rows
}

fn chord_label(event: &KeyEvent) -> String {
    let key = match event.key {
        Key::Char(ch) => ch.to_ascii_uppercase().to_string(),
        Key::Enter => "Enter".to_string(),
        Key::Up => "Up".to_string(),
        Key::Down => "Down".to_string(),
        Key::F(n) => format!("F{}", n),
        other => format!("{:?}", other),
    };
    if event.modifiers.ctrl {
        format!("Ctrl+{}", key)
    } else {
        key
    }
}

/// Convert a crossterm key press; releases and unknown keys give None
pub fn from_crossterm(event: CtKeyEvent) -> Option<KeyEvent> {
    if event.kind == KeyEventKind::Release {
        return None;
    }

    let key = match event.code {
        KeyCode::Char(ch) => Key::Char(ch),
        KeyCode::Enter => Key::Enter,
        KeyCode::Backspace => Key::Backspace,
        KeyCode::Tab => Key::Tab,
        KeyCode::BackTab => Key::BackTab,
        KeyCode::Esc => Key::Esc,
        KeyCode::Up => Key::Up,
        KeyCode::Down => Key::Down,
        KeyCode::Left => Key::Left,
        KeyCode::Right => Key::Right,
        KeyCode::Home => Key::Home,
        KeyCode::End => Key::End,
        KeyCode::PageUp => Key::PageUp,
        KeyCode::PageDown => Key::PageDown,
        KeyCode::Insert => Key::Insert,
        KeyCode::Delete => Key::Delete,
        KeyCode::F(n) => Key::F(n),
        _ => return None,
    };

    let modifiers = Modifiers {
        ctrl: event.modifiers.contains(KeyModifiers::CONTROL),
        alt: event.modifiers.contains(KeyModifiers::ALT),
        // The character already carries shift
        shift: event.modifiers.contains(KeyModifiers::SHIFT) && !matches!(key, Key::Char(_)),
    };
    Some(KeyEvent::new(key, modifiers))
}
