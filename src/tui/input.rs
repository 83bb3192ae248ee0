//! Input handling and keybindings.

use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};

use super::state::{AppState, Popup};

/// Result of handling a key event. Actions that touch the collectors are
/// carried out by the app; pure navigation is applied to the state here.
#[derive(Debug, PartialEq, Eq)]
pub enum KeyAction {
    /// No action, continue.
    None,
    /// Quit the application.
    Quit,
    /// Replace the shown source's baseline with its last snapshot.
    Rebase,
    /// Toggle absolute/relative for the shown source.
    ToggleMode,
    /// Toggle absolute/relative for every source.
    ToggleModeAll,
    /// Flip enabled/disabled for the source at this index.
    ToggleEnabled(usize),
}

/// Handles key input and updates state.
pub fn handle_key(state: &mut AppState, key: KeyEvent) -> KeyAction {
    if key.code == KeyCode::Char('c') && key.modifiers.contains(KeyModifiers::CONTROL) {
        return KeyAction::Quit;
    }
    match state.popup {
        Popup::None => handle_normal_mode(state, key),
        Popup::Help => handle_help(state, key),
        Popup::Sources { selected } => handle_source_list(state, key, selected),
    }
}

/// Handles keys in normal mode.
fn handle_normal_mode(state: &mut AppState, key: KeyEvent) -> KeyAction {
    match key.code {
        KeyCode::Char('q') | KeyCode::Char('Q') => KeyAction::Quit,

        KeyCode::Tab | KeyCode::Right => {
            state.next_source();
            KeyAction::None
        }
        KeyCode::BackTab | KeyCode::Left => {
            state.prev_source();
            KeyAction::None
        }

        KeyCode::Char('z') => KeyAction::Rebase,
        KeyCode::Char('r') | KeyCode::Char('t') => KeyAction::ToggleMode,
        KeyCode::Char('R') => KeyAction::ToggleModeAll,
        KeyCode::Char('e') => match state.current_source() {
            Some(_) => KeyAction::ToggleEnabled(state.current),
            None => KeyAction::None,
        },

        KeyCode::Char('s') => {
            state.open_source_list();
            KeyAction::None
        }
        KeyCode::Char('h') | KeyCode::Char('?') => {
            state.toggle_help();
            KeyAction::None
        }
        _ => KeyAction::None,
    }
}

fn handle_help(state: &mut AppState, key: KeyEvent) -> KeyAction {
    match key.code {
        KeyCode::Char('q') => KeyAction::Quit,
        KeyCode::Esc | KeyCode::Char('h') | KeyCode::Char('?') => {
            state.close_popup();
            KeyAction::None
        }
        _ => KeyAction::None,
    }
}

fn handle_source_list(state: &mut AppState, key: KeyEvent, selected: usize) -> KeyAction {
    let last = state.sources.len().saturating_sub(1);
    match key.code {
        KeyCode::Esc | KeyCode::Char('s') => {
            state.close_popup();
            KeyAction::None
        }
        KeyCode::Up | KeyCode::Char('k') => {
            state.popup = Popup::Sources {
                selected: selected.saturating_sub(1),
            };
            KeyAction::None
        }
        KeyCode::Down | KeyCode::Char('j') => {
            state.popup = Popup::Sources {
                selected: (selected + 1).min(last),
            };
            KeyAction::None
        }
        KeyCode::Char('e') | KeyCode::Char(' ') if selected < state.sources.len() => {
            KeyAction::ToggleEnabled(selected)
        }
        KeyCode::Enter => {
            if state.is_enabled(selected) {
                state.current = selected;
            }
            state.close_popup();
            KeyAction::None
        }
        _ => KeyAction::None,
    }
}
