use crossterm::event::{KeyCode, KeyEvent, KeyEventKind, KeyModifiers};

use crate::error::{AppError, Result};

/// Workspace shortcuts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyAction {
    /// Ctrl/Cmd+S
    Save,
    /// Ctrl/Cmd+Shift+S
    SaveAll,
}

/// Map a key press to a workspace action. Ctrl and Cmd (super) are
/// interchangeable.
pub fn action_for(key: &KeyEvent) -> Option<KeyAction> {
    if key.kind == KeyEventKind::Release {
        return None;
    }
    let primary = key
        .modifiers
        .intersects(KeyModifiers::CONTROL | KeyModifiers::SUPER);
    if !primary {
        return None;
    }
    match key.code {
        KeyCode::Char('s') if key.modifiers.contains(KeyModifiers::SHIFT) => Some(KeyAction::SaveAll),
        // Some terminals report Shift only through the upper-case letter.
        KeyCode::Char('S') => Some(KeyAction::SaveAll),
        KeyCode::Char('s') => Some(KeyAction::Save),
        _ => None,
    }
}

/// Parse a chord like `ctrl+shift+s` or `cmd+s`. Letter case is ignored;
/// only an explicit `shift` adds the modifier.
pub fn parse_chord(chord: &str) -> Result<KeyEvent> {
    let mut modifiers = KeyModifiers::NONE;
    let mut code = None;

    for part in chord.split('+').map(str::trim) {
        match part.to_ascii_lowercase().as_str() {
            "ctrl" | "control" => modifiers |= KeyModifiers::CONTROL,
            "cmd" | "super" | "meta" => modifiers |= KeyModifiers::SUPER,
            "shift" => modifiers |= KeyModifiers::SHIFT,
            "alt" | "option" => modifiers |= KeyModifiers::ALT,
            _ => {
                if code.is_some() {
                    return Err(AppError::Command(format!("more than one key in {:?}", chord)));
                }
                let mut chars = part.chars();
                code = match (chars.next(), chars.next()) {
                    (Some(c), None) => Some(KeyCode::Char(c.to_ascii_lowercase())),
                    _ => return Err(AppError::Command(format!("unknown key {:?}", part))),
                };
            }
        }
    }

    let code = code.ok_or_else(|| AppError::Command(format!("no key in {:?}", chord)))?;
    Ok(KeyEvent::new(code, modifiers))
}
