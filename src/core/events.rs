//! Unified event handling system

use crossterm::event::{Event as CrosstermEvent, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use futures::{Stream, StreamExt};
use std::time::Duration;
use tokio::sync::{broadcast, mpsc};

use crate::core::state::SnapshotStore;

/// All possible events in the dashboard
#[derive(Debug, Clone)]
pub enum Event {
    // Input events
    Key(KeyEvent),
    Resize(u16, u16),

    /// Render tick
    Tick,

    /// The sampling engine published a snapshot with this sequence number
    SnapshotUpdated(u64),

    /// Terminal input ended
    Quit,
}

/// Result of handling an event
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventResult {
    Continue,
    Quit,
}

pub struct EventHandler {
    rx: mpsc::UnboundedReceiver<Event>,
    tx: mpsc::UnboundedSender<Event>,
}

impl EventHandler {
    pub fn new() -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self { rx, tx }
    }

    pub fn sender(&self) -> mpsc::UnboundedSender<Event> {
        self.tx.clone()
    }

    /// Start all event source tasks
    pub fn spawn_sources(&self, store: &SnapshotStore, render_interval: Duration) {
        tokio::spawn(Self::terminal_events(self.sender()));
        tokio::spawn(Self::tick_events(self.sender(), render_interval));
        tokio::spawn(Self::snapshot_events(self.sender(), store.subscribe()));
    }

    async fn terminal_events(tx: mpsc::UnboundedSender<Event>) {
        Self::forward_terminal(crossterm::event::EventStream::new(), tx).await;
    }

    /// Forward input until the terminal goes away, then ask the app to quit.
    async fn forward_terminal<S>(reader: S, tx: mpsc::UnboundedSender<Event>)
    where
        S: Stream<Item = std::io::Result<CrosstermEvent>>,
    {
        let mut reader = std::pin::pin!(reader);
        while let Some(event_result) = reader.next().await {
            let event = match event_result {
                Ok(CrosstermEvent::Key(key)) if key.kind == KeyEventKind::Press => Event::Key(key),
                Ok(CrosstermEvent::Resize(w, h)) => Event::Resize(w, h),
                Ok(_) => continue,
                Err(e) => {
                    tracing::warn!("Terminal event stream failed: {}", e);
                    break;
                }
            };
            if tx.send(event).is_err() {
                return;
            }
        }
        // No more input can ever arrive
        let _ = tx.send(Event::Quit);
    }

    async fn tick_events(tx: mpsc::UnboundedSender<Event>, interval: Duration) {
        let mut ticker = tokio::time::interval(interval);
        loop {
            ticker.tick().await;
            if tx.send(Event::Tick).is_err() {
                break;
            }
        }
    }

    async fn snapshot_events(tx: mpsc::UnboundedSender<Event>, mut rx: broadcast::Receiver<u64>) {
        loop {
            let sequence = match rx.recv().await {
                Ok(sequence) => sequence,
                // A slow UI only needs the latest snapshot, which it reads from the store
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    tracing::debug!("Skipped {} snapshot notifications", skipped);
                    continue;
                }
                Err(broadcast::error::RecvError::Closed) => break,
            };
            if tx.send(Event::SnapshotUpdated(sequence)).is_err() {
                break;
            }
        }
    }

    pub async fn next(&mut self) -> Option<Event> {
        self.rx.recv().await
    }
}

impl Default for EventHandler {
    fn default() -> Self {
        Self::new()
    }
}

/// Key binding helper
pub struct KeyBinding {
    pub key: KeyCode,
    pub modifiers: KeyModifiers,
}

impl KeyBinding {
    pub fn new(key: KeyCode) -> Self {
        Self {
            key,
            modifiers: KeyModifiers::NONE,
        }
    }

    pub fn ctrl(key: KeyCode) -> Self {
        Self {
            key,
            modifiers: KeyModifiers::CONTROL,
        }
    }

    pub fn matches(&self, event: &KeyEvent) -> bool {
        event.code == self.key && event.modifiers == self.modifiers
    }
}

/// Standard key bindings
pub struct KeyBindings;

impl KeyBindings {
    pub fn quit() -> KeyBinding {
        KeyBinding::new(KeyCode::Char('q'))
    }

    pub fn quit_alt() -> KeyBinding {
        KeyBinding::ctrl(KeyCode::Char('c'))
    }

    pub fn escape() -> KeyBinding {
        KeyBinding::new(KeyCode::Esc)
    }

    pub fn details() -> KeyBinding {
        KeyBinding::new(KeyCode::Char('d'))
    }

    pub fn redraw() -> KeyBinding {
        KeyBinding::new(KeyCode::Char('r'))
    }
}
