//! Terminal User Interface for psglot.
//!
//! Shows one source at a time, top-like: ranked rows, a totals line and a
//! description of the source's mode and health.

mod app;
mod event;
mod input;
mod render;
mod state;
mod style;

pub use app::App;
pub use state::{AppState, ServerInfo};
