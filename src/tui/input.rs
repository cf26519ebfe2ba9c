use crossterm::event::{KeyCode, KeyEvent, KeyEventKind, KeyModifiers};

use super::app::{App, Focus};

/// Dispatch a key event into the TUI application.
///
/// Order of operations:
/// 1) Ignore non-press events
/// 2) Global bindings (Ctrl+C quits, Tab flips focus)
/// 3) Input bindings (Enter sends, Ctrl+U clears, the rest edits)
///
/// Returns `true` if the key was handled (consumed).
pub fn dispatch_key(app: &mut App, key: KeyEvent) -> bool {
    // Only process key presses; ignore repeats/releases to avoid accidental double actions.
    if key.kind != KeyEventKind::Press {
        return false;
    }

    match (key.code, key.modifiers) {
        (KeyCode::Char('c'), m) if m.contains(KeyModifiers::CONTROL) => {
            app.should_quit = true;
            return true;
        }
        (KeyCode::Tab, KeyModifiers::NONE) => {
            app.toggle_focus();
            return true;
        }
        _ => {}
    }

    match app.focus {
        Focus::Input => match (key.code, key.modifiers) {
            (KeyCode::Enter, KeyModifiers::NONE) => {
                app.submit();
                true
            }
            (KeyCode::Char('u'), m) if m.contains(KeyModifiers::CONTROL) => {
                app.clear_entry();
                true
            }
            _ => app.handle_entry_key(&key),
        },
        // The transcript has no bindings of its own.
        Focus::Transcript => false,
    }
}
