//! Key bindings (arrows and vim-style) and pointer → grid cell translation.

use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};

/// Action from a key press.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Up,
    Down,
    Left,
    Right,
    Select,
    Pause,
    Restart,
    Quit,
    None,
}

/// Map key event to game action. Supports both arrows/space and vim (hjkl).
pub fn key_to_action(key: KeyEvent) -> Action {
    let KeyEvent {
        code, modifiers, ..
    } = key;
    if modifiers == KeyModifiers::CONTROL && code == KeyCode::Char('c') {
        return Action::Quit;
    }
    if !(modifiers.is_empty() || modifiers == KeyModifiers::SHIFT) {
        return Action::None;
    }
    match code {
        KeyCode::Char('q') | KeyCode::Esc => Action::Quit,
        KeyCode::Char('p') => Action::Pause,
        KeyCode::Char('r') | KeyCode::Char('R') => Action::Restart,
        KeyCode::Up | KeyCode::Char('k') => Action::Up,
        KeyCode::Down | KeyCode::Char('j') => Action::Down,
        KeyCode::Left | KeyCode::Char('h') => Action::Left,
        KeyCode::Right | KeyCode::Char('l') => Action::Right,
        KeyCode::Enter | KeyCode::Char(' ') => Action::Select,
        _ => Action::None,
    }
}

/// Board-relative pointer position → (col, row), by integer division by the cell size.
/// Anything outside the `width × height` board gives `None`.
pub fn pixel_to_cell(
    px: i32,
    py: i32,
    cell_w: i32,
    cell_h: i32,
    width: usize,
    height: usize,
) -> Option<(usize, usize)> {
    if px < 0 || py < 0 || cell_w <= 0 || cell_h <= 0 {
        return None;
    }
    let (col, row) = ((px / cell_w) as usize, (py / cell_h) as usize);
    (col < width && row < height).then_some((col, row))
}
