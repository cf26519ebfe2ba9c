use std::sync::mpsc::{self, Receiver, Sender, TryRecvError};

use tracing::warn;

use super::app::App;
use crate::format::{self, DisplayLine};

/// Name of the transcript view.
pub const CHAT_VIEW: &str = "chat";

/// The only way to get text onto the screen from outside the render loop.
///
/// Model:
/// - Any thread calls `post(...)` on a cloned `UiBridge`.
/// - The update is queued, never applied in place.
/// - The render loop calls `UpdateQueue::drain` once per frame, before drawing,
///   and applies every pending update on its own thread.
///
/// Updates from one caller arrive in the order they were posted. Updates from
/// handlers running concurrently interleave in whatever order they were queued.
#[derive(Debug, Clone)]
pub struct UiBridge {
    tx: Sender<UiUpdate>,
}

/// Receiving end, owned by the render loop.
#[derive(Debug)]
pub struct UpdateQueue {
    rx: Receiver<UiUpdate>,
}

#[derive(Debug)]
pub enum UiUpdate {
    Append { view: String, line: DisplayLine },
    ConnectionLost { reason: String },
}

#[derive(Debug, thiserror::Error)]
pub enum BridgeError {
    #[error("render loop has stopped")]
    Closed,
}

pub fn channel() -> (UiBridge, UpdateQueue) {
    let (tx, rx) = mpsc::channel::<UiUpdate>();
    (UiBridge { tx }, UpdateQueue { rx })
}

impl UiBridge {
    /// Schedule `line` to be appended to `view` on the render thread.
    pub fn post(&self, line: DisplayLine, view: &str) -> Result<(), BridgeError> {
        self.send(UiUpdate::Append {
            view: view.to_string(),
            line,
        })
    }

    pub fn connection_lost(&self, reason: impl Into<String>) -> Result<(), BridgeError> {
        self.send(UiUpdate::ConnectionLost {
            reason: reason.into(),
        })
    }

    fn send(&self, update: UiUpdate) -> Result<(), BridgeError> {
        self.tx.send(update).map_err(|_| BridgeError::Closed)
    }
}

impl UpdateQueue {
    /// Apply all pending updates to the app. Non-blocking.
    ///
    /// Returns how many updates were taken off the queue.
    pub fn drain(&self, app: &mut App) -> usize {
        let mut applied = 0;
        loop {
            match self.rx.try_recv() {
                Ok(update) => {
                    apply_update(app, update);
                    applied += 1;
                }
                Err(TryRecvError::Empty) => break,
                // Every sender is gone; nothing more will arrive.
                Err(TryRecvError::Disconnected) => break,
            }
        }
        applied
    }
}

fn apply_update(app: &mut App, update: UiUpdate) {
    match update {
        UiUpdate::Append { view, line } => {
            if let Err(err) = app.append(&view, line) {
                warn!(error = %err, "dropping scheduled update");
            }
        }
        UiUpdate::ConnectionLost { reason } => {
            app.connected = false;
            let line = format::notice_line(&format!("disconnected: {reason}"));
            if let Err(err) = app.append(CHAT_VIEW, line) {
                warn!(error = %err, "dropping scheduled update");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tui::app::tests::harness;

    fn chat(app: &App) -> Vec<String> {
        app.view(CHAT_VIEW)
            .unwrap()
            .lines
            .iter()
            .map(|l| l.text.clone())
            .collect()
    }

    #[test]
    fn posted_lines_apply_in_order_on_drain() {
        let mut h = harness();

        h.bridge.post(DisplayLine::now("one"), CHAT_VIEW).unwrap();
        h.bridge.post(DisplayLine::now("two"), CHAT_VIEW).unwrap();
        assert!(chat(&h.app).is_empty());

        assert_eq!(h.queue.drain(&mut h.app), 2);
        assert_eq!(chat(&h.app), vec!["one", "two"]);
        assert_eq!(h.queue.drain(&mut h.app), 0);
    }

    #[test]
    fn posts_from_other_threads_land_on_drain() {
        let mut h = harness();

        let workers: Vec<_> = (0..4)
            .map(|i| {
                let bridge = h.bridge.clone();
                std::thread::spawn(move || {
                    for j in 0..10 {
                        bridge
                            .post(DisplayLine::now(format!("{i}:{j}")), CHAT_VIEW)
                            .unwrap();
                    }
                })
            })
            .collect();
        for w in workers {
            w.join().unwrap();
        }

        assert_eq!(h.queue.drain(&mut h.app), 40);
        let lines = chat(&h.app);
        // Per-sender order survives even though senders interleave.
        for i in 0..4 {
            let mine: Vec<_> = lines
                .iter()
                .filter(|l| l.starts_with(&format!("{i}:")))
                .cloned()
                .collect();
            let expected: Vec<_> = (0..10).map(|j| format!("{i}:{j}")).collect();
            assert_eq!(mine, expected);
        }
    }

    #[test]
    fn unknown_view_is_dropped_without_touching_transcript() {
        let mut h = harness();

        h.bridge.post(DisplayLine::now("lost"), "gone").unwrap();
        h.bridge.post(DisplayLine::now("kept"), CHAT_VIEW).unwrap();

        assert_eq!(h.queue.drain(&mut h.app), 2);
        assert_eq!(chat(&h.app), vec!["kept"]);
    }

    #[test]
    fn connection_lost_marks_app_and_adds_notice() {
        let mut h = harness();

        h.bridge.connection_lost("connection closed by server").unwrap();
        h.queue.drain(&mut h.app);

        assert!(!h.app.connected);
        assert_eq!(chat(&h.app), vec!["-- disconnected: connection closed by server"]);
    }

    #[test]
    fn post_fails_once_render_loop_is_gone() {
        let (bridge, queue) = channel();
        drop(queue);

        assert!(matches!(
            bridge.post(DisplayLine::now("x"), CHAT_VIEW),
            Err(BridgeError::Closed)
        ));
    }
}
