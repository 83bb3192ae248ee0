//! Main TUI application.

use std::io;
use std::time::Duration;

use crossterm::execute;
use crossterm::terminal::{
    EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode,
};
use ratatui::Terminal;
use ratatui::backend::CrosstermBackend;
use tracing::{debug, warn};

use crate::collector::{CollectorRegistry, CommandError, GlobalStatus};

use super::event::{Event, EventHandler};
use super::input::{KeyAction, handle_key};
use super::render::render;
use super::state::{AppState, ServerInfo};

/// Main TUI application.
pub struct App {
    registry: CollectorRegistry,
    status: Option<GlobalStatus>,
    state: AppState,
    should_quit: bool,
}

impl App {
    /// Creates a new App showing the registry's sources.
    ///
    /// `status` is used to refresh the server uptime in the header.
    pub fn new(registry: CollectorRegistry, status: Option<GlobalStatus>, server: ServerInfo) -> Self {
        let state = AppState::new(registry.sources(), server);
        Self {
            registry,
            status,
            state,
            should_quit: false,
        }
    }

    /// Runs the TUI until the user quits. Returns the registry so the caller
    /// can shut it down and restore instrumentation.
    pub fn run(mut self, redraw: Duration) -> io::Result<CollectorRegistry> {
        enable_raw_mode()?;
        let mut stdout = io::stdout();
        execute!(stdout, EnterAlternateScreen)?;
        let backend = CrosstermBackend::new(stdout);
        let mut terminal = Terminal::new(backend)?;

        self.refresh_uptime();
        let result =
            EventHandler::new(redraw).and_then(|events| self.event_loop(&mut terminal, &events));

        disable_raw_mode()?;
        execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
        terminal.show_cursor()?;

        result.map(|()| self.registry)
    }

    fn event_loop(
        &mut self,
        terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
        events: &EventHandler,
    ) -> io::Result<()> {
        loop {
            let bundle = self
                .state
                .current_source()
                .and_then(|id| self.registry.latest(id));
            terminal.draw(|frame| render(frame, &self.state, bundle.as_deref()))?;

            match events.next() {
                Ok(Event::Redraw) => self.refresh_uptime(),
                Ok(Event::Key(key)) => {
                    self.state.status_message = None;
                    let action = handle_key(&mut self.state, key);
                    self.apply(action);
                }
                Ok(Event::Resize) => {}
                Err(_) => self.should_quit = true,
            }

            if self.should_quit {
                return Ok(());
            }
        }
    }

    /// Carries out actions that go to the collectors.
    fn apply(&mut self, action: KeyAction) {
        match action {
            KeyAction::None => {}
            KeyAction::Quit => self.should_quit = true,
            KeyAction::Rebase => {
                let Some(id) = self.state.current_source() else {
                    return;
                };
                match self.registry.force_rebase(id) {
                    Ok(true) => {}
                    Ok(false) => {
                        self.state.status_message = Some(format!("{}: nothing fetched yet", id));
                    }
                    Err(e) => self.state.status_message = Some(format!("{}: {}", id, e)),
                }
            }
            KeyAction::ToggleMode => {
                if let Some(id) = self.state.current_source()
                    && let Err(e) = self.registry.toggle_mode(id)
                {
                    self.state.status_message = Some(format!("{}: {}", id, e));
                }
            }
            KeyAction::ToggleModeAll => {
                let current = self
                    .state
                    .current_source()
                    .and_then(|id| self.registry.latest(id));
                if let Some(bundle) = current {
                    let mode = bundle.mode.toggled();
                    self.state.status_message = Some(match self.registry.set_mode_all(mode) {
                        Ok(()) => format!("all sources: {}", mode.as_str()),
                        Err(e) => format!("all sources: {} ({})", mode.as_str(), e),
                    });
                }
            }
            KeyAction::ToggleEnabled(idx) => {
                let Some(&id) = self.state.sources.get(idx) else {
                    return;
                };
                let enabled = !self.state.is_enabled(idx);
                let what = if enabled { "enabled" } else { "disabled" };
                match self.registry.set_enabled(id, enabled) {
                    Ok(()) => {
                        self.state.set_enabled(idx, enabled);
                        self.state.status_message = Some(format!("{} {}", id, what));
                    }
                    Err(CommandError::Busy) => {
                        self.state.set_enabled(idx, enabled);
                        self.state.status_message =
                            Some(format!("{} {} ({})", id, what, CommandError::Busy));
                    }
                    Err(e) => self.state.status_message = Some(format!("{}: {}", id, e)),
                }
            }
        }
    }

    fn refresh_uptime(&mut self) {
        let Some(status) = &self.status else {
            return;
        };
        match status.get("Uptime") {
            Ok(uptime) => self.state.server.uptime_secs = uptime,
            Err(e) => {
                debug!("uptime lookup failed: {}", e);
                if self.state.server.uptime_secs.take().is_some() {
                    warn!("lost server status: {}", e);
                }
            }
        }
    }
}
