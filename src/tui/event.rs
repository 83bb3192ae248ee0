//! Terminal input for the TUI.
//!
//! A dedicated thread blocks on crossterm and forwards key presses and
//! resizes; when nothing arrives within the redraw period it sends
//! `Redraw` so the screen picks up freshly published bundles.

use std::io;
use std::sync::mpsc::{self, Receiver};
use std::thread;
use std::time::Duration;

use crossterm::event::{self, Event as CrosstermEvent, KeyEvent, KeyEventKind};
use tracing::debug;

/// What the UI loop reacts to.
#[derive(Debug)]
pub enum Event {
    /// Redraw period elapsed without input.
    Redraw,
    /// Key press (repeats and releases are dropped).
    Key(KeyEvent),
    Resize,
}

/// Receiving end of the input thread.
///
/// The thread exits on its next send once this handle is dropped.
pub struct EventHandler {
    rx: Receiver<Event>,
}

impl EventHandler {
    /// Starts the input thread. The screen is redrawn at least every
    /// `redraw`, independent of the collectors' poll interval.
    pub fn new(redraw: Duration) -> io::Result<Self> {
        let (tx, rx) = mpsc::channel();

        thread::Builder::new()
            .name("psglot-input".to_string())
            .spawn(move || {
                loop {
                    let event = match event::poll(redraw) {
                        Ok(false) => Event::Redraw,
                        Ok(true) => match event::read() {
                            Ok(CrosstermEvent::Key(key)) if key.kind == KeyEventKind::Press => {
                                Event::Key(key)
                            }
                            Ok(CrosstermEvent::Resize(_, _)) => Event::Resize,
                            Ok(_) => continue,
                            Err(e) => {
                                debug!("terminal read failed: {}", e);
                                break;
                            }
                        },
                        Err(e) => {
                            debug!("terminal poll failed: {}", e);
                            break;
                        }
                    };
                    if tx.send(event).is_err() {
                        break;
                    }
                }
            })?;

        Ok(Self { rx })
    }

    /// Blocks until the next event. Fails once the input thread is gone.
    pub fn next(&self) -> Result<Event, mpsc::RecvError> {
        self.rx.recv()
    }
}
