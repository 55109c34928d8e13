//! Main application orchestrator

use anyhow::Result;
use crossterm::event::KeyEvent;
use ratatui::{backend::CrosstermBackend, Terminal};
use std::io::Stdout;

use crate::config::Config;
use crate::core::events::{Event, EventHandler, EventResult, KeyBindings};
use crate::core::state::SnapshotStore;
use crate::core::view::ViewState;
use crate::ui::renderer::Renderer;

/// What a key press asks the dashboard to do
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum KeyAction {
    Quit,
    ToggleDetails,
    Redraw,
    Ignore,
}

fn key_action(key: &KeyEvent) -> KeyAction {
    if KeyBindings::quit().matches(key)
        || KeyBindings::quit_alt().matches(key)
        || KeyBindings::escape().matches(key)
    {
        KeyAction::Quit
    } else if KeyBindings::details().matches(key) {
        KeyAction::ToggleDetails
    } else if KeyBindings::redraw().matches(key) {
        KeyAction::Redraw
    } else {
        KeyAction::Ignore
    }
}

/// The loop's own failure is the one worth reporting; a restore failure only
/// surfaces when the loop succeeded.
fn prefer_loop_error(result: Result<()>, restored: Result<()>) -> Result<()> {
    match (result, restored) {
        (Err(e), Err(restore)) => {
            tracing::error!("Failed to restore terminal: {:#}", restore);
            Err(e)
        }
        (Err(e), Ok(())) => Err(e),
        (Ok(()), restored) => restored,
    }
}

pub struct App {
    terminal: Terminal<CrosstermBackend<Stdout>>,
    store: SnapshotStore,
    view: ViewState,
    config: Config,
}

impl App {
    pub fn new(store: SnapshotStore, config: Config) -> Result<Self> {
        let backend = CrosstermBackend::new(std::io::stdout());
        let terminal = Terminal::new(backend)?;
        let view = ViewState::new(&config.display);

        Ok(Self {
            terminal,
            store,
            view,
            config,
        })
    }

    pub async fn run(&mut self) -> Result<()> {
        self.setup_terminal()?;

        let mut event_handler = EventHandler::new();
        event_handler.spawn_sources(
            &self.store,
            std::time::Duration::from_millis(self.config.display.render_interval_ms.max(16)),
        );

        // Whatever the engine has already published, or the placeholder
        self.view.observe(self.store.current());
        let result = match self.render() {
            Ok(()) => self.event_loop(&mut event_handler).await,
            Err(e) => Err(e),
        };

        // Restore the terminal even when the loop failed
        prefer_loop_error(result, self.shutdown())
    }

    fn setup_terminal(&mut self) -> Result<()> {
        crossterm::terminal::enable_raw_mode()?;
        crossterm::execute!(
            std::io::stdout(),
            crossterm::terminal::EnterAlternateScreen,
            crossterm::cursor::Hide,
        )?;
        Ok(())
    }

    fn shutdown(&mut self) -> Result<()> {
        crossterm::terminal::disable_raw_mode()?;
        crossterm::execute!(
            std::io::stdout(),
            crossterm::terminal::LeaveAlternateScreen,
            crossterm::cursor::Show,
        )?;
        Ok(())
    }

    async fn event_loop(&mut self, event_handler: &mut EventHandler) -> Result<()> {
        loop {
            let Some(event) = event_handler.next().await else {
                break;
            };

            match self.handle_event(event)? {
                EventResult::Continue => {}
                EventResult::Quit => break,
            }
        }
        Ok(())
    }

    fn handle_event(&mut self, event: Event) -> Result<EventResult> {
        match event {
            Event::Key(key) => self.handle_key(key),
            Event::Resize(..) => {
                self.terminal.autoresize()?;
                self.render()?;
                Ok(EventResult::Continue)
            }
            Event::Tick => {
                // Catch up on anything a lagged notification channel dropped
                self.view.observe(self.store.current());
                self.render()?;
                Ok(EventResult::Continue)
            }
            Event::SnapshotUpdated(sequence) => {
                tracing::trace!("Snapshot #{} published", sequence);
                if self.view.observe(self.store.current()) {
                    self.render()?;
                }
                Ok(EventResult::Continue)
            }
            Event::Quit => Ok(EventResult::Quit),
        }
    }

    fn handle_key(&mut self, key: KeyEvent) -> Result<EventResult> {
        match key_action(&key) {
            KeyAction::Quit => return Ok(EventResult::Quit),
            KeyAction::ToggleDetails => {
                self.view.show_details = !self.view.show_details;
            }
            KeyAction::Redraw => {
                self.terminal.clear()?;
            }
            KeyAction::Ignore => return Ok(EventResult::Continue),
        }
        self.render()?;
        Ok(EventResult::Continue)
    }

    fn render(&mut self) -> Result<()> {
        let view = &self.view;
        self.terminal.draw(|frame| Renderer::render(frame, view))?;
        Ok(())
    }
}
