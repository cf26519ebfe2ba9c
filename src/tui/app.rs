use std::collections::HashMap;

use anyhow::Result;
use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use ratatui::style::{Modifier, Style};
use ratatui_textarea::{Input, TextArea};
use tracing::warn;

use super::bridge::{UiBridge, CHAT_VIEW};
use crate::format::{self, DisplayLine};
use crate::net::IrcSender;

/// Which region receives keystrokes.
///
/// Starts at `Input`. `Tab` flips between the two; nothing else moves it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Focus {
    Transcript,
    Input,
}

impl Focus {
    pub fn toggled(self) -> Self {
        match self {
            Focus::Transcript => Focus::Input,
            Focus::Input => Focus::Transcript,
        }
    }

    pub fn shows_cursor(self) -> bool {
        self == Focus::Input
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ViewError {
    #[error("unknown view: {0}")]
    NotFound(String),
}

/// Append-only text content of a named view.
#[derive(Debug, Default)]
pub struct TextView {
    pub lines: Vec<DisplayLine>,
}

/// Sends what the user typed and echoes it back into the transcript.
///
/// Holds its own handles so the render loop never reaches into connection state.
#[derive(Debug, Clone)]
pub struct Composer {
    channel: String,
    nick: String,
    sender: IrcSender,
    bridge: UiBridge,
}

impl Composer {
    pub fn new(channel: &str, nick: &str, sender: IrcSender, bridge: UiBridge) -> Self {
        Self {
            channel: channel.to_string(),
            nick: nick.to_string(),
            sender,
            bridge,
        }
    }

    /// Send `buffer` to the channel and schedule the local echo.
    ///
    /// Returns `false` without doing anything when the buffer is blank.
    pub fn submit(&self, buffer: &str) -> Result<bool> {
        if buffer.trim().is_empty() {
            return Ok(false);
        }

        self.sender.privmsg(&self.channel, &format!("{buffer} "))?;
        self.bridge
            .post(format::message_line(&self.nick, buffer), CHAT_VIEW)?;
        Ok(true)
    }

    pub fn bridge(&self) -> &UiBridge {
        &self.bridge
    }
}

pub struct App {
    pub channel: String,
    pub focus: Focus,
    pub views: HashMap<String, TextView>,

    // Input region
    pub entry: TextArea<'static>,
    composer: Composer,

    pub connected: bool,

    // Exit control
    pub should_quit: bool,
}

impl App {
    pub fn new(channel: &str, composer: Composer) -> Self {
        let mut views = HashMap::new();
        views.insert(CHAT_VIEW.to_string(), TextView::default());

        Self {
            channel: channel.to_string(),
            focus: Focus::Input,
            views,
            entry: new_entry(),
            composer,
            connected: true,
            should_quit: false,
        }
    }

    pub fn view(&self, name: &str) -> Result<&TextView, ViewError> {
        self.views
            .get(name)
            .ok_or_else(|| ViewError::NotFound(name.to_string()))
    }

    /// Append to a text view. Only the render loop calls this, via the bridge.
    pub fn append(&mut self, name: &str, line: DisplayLine) -> Result<(), ViewError> {
        let view = self
            .views
            .get_mut(name)
            .ok_or_else(|| ViewError::NotFound(name.to_string()))?;
        view.lines.push(line);
        Ok(())
    }

    pub fn toggle_focus(&mut self) {
        self.focus = self.focus.toggled();
    }

    /// Current content of the input region.
    pub fn entry_text(&self) -> String {
        self.entry.lines().join(" ")
    }

    pub fn clear_entry(&mut self) {
        self.entry = new_entry();
    }

    /// Send the input buffer. Blank input is left alone.
    pub fn submit(&mut self) {
        let buffer = self.entry_text();
        match self.composer.submit(&buffer) {
            Ok(true) => self.clear_entry(),
            Ok(false) => {}
            Err(err) => {
                warn!(error = %err, "could not send message");
                // Keep the text so it can be re-sent once we're back.
                let _ = self
                    .composer
                    .bridge()
                    .post(format::notice_line(&format!("not sent: {err}")), CHAT_VIEW);
            }
        }
    }

    pub fn handle_entry_key(&mut self, key: &KeyEvent) -> bool {
        match to_textarea_input(key) {
            Some(input) => {
                self.entry.input(input);
                true
            }
            None => false,
        }
    }
}

fn new_entry() -> TextArea<'static> {
    let mut entry = TextArea::default();
    // The prompt row is a single line; no highlight needed.
    entry.set_cursor_line_style(Style::default());
    entry.set_cursor_style(Style::default().add_modifier(Modifier::REVERSED));
    entry
}

/// Map editing keys onto the text area. Enter/Tab are bindings, not text.
pub fn to_textarea_input(key: &KeyEvent) -> Option<Input> {
    let ctrl = key.modifiers.contains(KeyModifiers::CONTROL);
    let alt = key.modifiers.contains(KeyModifiers::ALT);

    let key = match key.code {
        KeyCode::Char(c) => ratatui_textarea::Key::Char(c),
        KeyCode::Backspace => ratatui_textarea::Key::Backspace,
        KeyCode::Delete => ratatui_textarea::Key::Delete,
        KeyCode::Left => ratatui_textarea::Key::Left,
        KeyCode::Right => ratatui_textarea::Key::Right,
        KeyCode::Home => ratatui_textarea::Key::Home,
        KeyCode::End => ratatui_textarea::Key::End,
        _ => return None,
    };

    Some(Input { key, ctrl, alt })
}
