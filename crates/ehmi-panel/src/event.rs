//! Terminal input — crossterm's event stream forwarded from a background
//! task.
//!
//! The panel has no animation, so nothing here runs on a timer: a frame is
//! drawn when input arrives, when the session changes something, or when
//! the terminal needs repainting.

use crossterm::event::{Event as CrosstermEvent, EventStream, KeyEvent, KeyEventKind};
use futures::StreamExt;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::warn;

/// Terminal input the panel reacts to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TermEvent {
    Key(KeyEvent),
    /// The screen contents are stale: resize or focus regained.
    Repaint,
}

impl TermEvent {
    /// Keep key presses and anything that invalidates the screen.
    /// Key release/repeat and mouse events are dropped.
    fn from_crossterm(event: CrosstermEvent) -> Option<Self> {
        match event {
            CrosstermEvent::Key(key) if key.kind == KeyEventKind::Press => Some(Self::Key(key)),
            CrosstermEvent::Resize(..) | CrosstermEvent::FocusGained => Some(Self::Repaint),
            _ => None,
        }
    }
}

/// Owns the input task. Dropping it stops the task.
pub struct TermInput {
    rx: mpsc::UnboundedReceiver<TermEvent>,
    cancel: CancellationToken,
}

impl TermInput {
    pub fn spawn() -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        let cancel = CancellationToken::new();

        let task_cancel = cancel.clone();
        tokio::spawn(async move {
            let mut stream = EventStream::new();
            loop {
                let next = tokio::select! {
                    () = task_cancel.cancelled() => break,
                    next = stream.next() => next,
                };
                let event = match next {
                    Some(Ok(event)) => event,
                    Some(Err(e)) => {
                        warn!(error = %e, "terminal input error");
                        break;
                    }
                    None => break,
                };
                if let Some(event) = TermEvent::from_crossterm(event) {
                    if tx.send(event).is_err() {
                        break;
                    }
                }
            }
        });

        Self { rx, cancel }
    }

    /// Next input event; `None` once the terminal stream has ended.
    pub async fn next(&mut self) -> Option<TermEvent> {
        self.rx.recv().await
    }
}

impl Drop for TermInput {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}
