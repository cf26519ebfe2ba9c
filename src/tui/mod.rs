//! Full-screen chat UI.
//!
//! The render loop is the only place view state changes. Everything produced
//! elsewhere (network handlers, the composer's echo) arrives through `bridge`.
//!
//! Modules:
//! - `app`: view state, focus, and the composer
//! - `bridge`: queue of pending view updates, drained once per frame
//! - `input`: key dispatch
//! - `view`: rendering/layout (ratatui)
//! - `runtime`: terminal enter/restore

pub mod app;
pub mod bridge;
pub mod input;
pub mod runtime;
pub mod view;

use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use crossterm::event::{self, Event};
use tracing::info;

use app::App;
use bridge::UpdateQueue;

/// Run the chat UI until the user quits.
///
/// Per tick: apply every queued update, draw, then wait for input up to the tick
/// rate. Returns `Ok` only on an explicit quit; terminal errors are fatal.
pub fn run_tui(mut app: App, updates: UpdateQueue) -> Result<()> {
    let mut terminal = runtime::enter()?;
    let result = event_loop(&mut terminal, &mut app, &updates);
    runtime::restore(&mut terminal);
    result
}

fn event_loop(terminal: &mut runtime::Tui, app: &mut App, updates: &UpdateQueue) -> Result<()> {
    let tick_rate = Duration::from_millis(33);
    let mut last_tick = Instant::now();

    loop {
        updates.drain(app);

        terminal
            .draw(|f| view::draw(f, app))
            .context("Failed to draw frame")?;

        let timeout = tick_rate.saturating_sub(last_tick.elapsed());
        if event::poll(timeout).context("Failed to poll events")? {
            if let Event::Key(key) = event::read().context("Failed to read event")? {
                input::dispatch_key(app, key);
            }
        }

        if last_tick.elapsed() >= tick_rate {
            last_tick = Instant::now();
        }

        if app.should_quit {
            info!("quit requested");
            return Ok(());
        }
    }
}
