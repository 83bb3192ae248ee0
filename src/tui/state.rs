//! Application state management.

use crate::collector::SourceId;

/// Active popup. Only one popup can be open at a time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Popup {
    #[default]
    None,
    Help,
    /// Source list with the highlighted row index.
    Sources { selected: usize },
}

/// Server identification shown in the header.
#[derive(Debug, Clone, Default)]
pub struct ServerInfo {
    /// `user@host:port`, or `demo`.
    pub endpoint: String,
    pub version: Option<String>,
    pub uptime_secs: Option<u64>,
}

/// UI state: which source is shown and which popup is open.
#[derive(Debug, Clone)]
pub struct AppState {
    pub sources: Vec<SourceId>,
    pub enabled: Vec<bool>,
    /// Index into `sources` of the shown source.
    pub current: usize,
    pub popup: Popup,
    pub server: ServerInfo,
    /// One-shot message shown in the status line.
    pub status_message: Option<String>,
}

impl AppState {
    pub fn new(sources: Vec<SourceId>, server: ServerInfo) -> Self {
        let enabled = vec![true; sources.len()];
        Self {
            sources,
            enabled,
            current: 0,
            popup: Popup::None,
            server,
            status_message: None,
        }
    }

    /// The shown source, if any source is registered.
    pub fn current_source(&self) -> Option<SourceId> {
        self.sources.get(self.current).copied()
    }

    /// Moves to the next enabled source, wrapping around.
    pub fn next_source(&mut self) {
        self.step(1);
    }

    /// Moves to the previous enabled source, wrapping around.
    pub fn prev_source(&mut self) {
        self.step(self.sources.len().saturating_sub(1));
    }

    fn step(&mut self, by: usize) {
        let n = self.sources.len();
        if n == 0 {
            return;
        }
        let mut idx = self.current;
        for _ in 0..n {
            idx = (idx + by) % n;
            if self.enabled[idx] {
                self.current = idx;
                return;
            }
        }
    }

    /// Records a new enabled flag for `idx`. If the shown source was
    /// disabled, moves on to the next enabled one.
    pub fn set_enabled(&mut self, idx: usize, enabled: bool) {
        let Some(flag) = self.enabled.get_mut(idx) else {
            return;
        };
        *flag = enabled;
        if !enabled && idx == self.current {
            self.next_source();
        }
    }

    pub fn is_enabled(&self, idx: usize) -> bool {
        self.enabled.get(idx).copied().unwrap_or(false)
    }

    pub fn toggle_help(&mut self) {
        self.popup = match self.popup {
            Popup::Help => Popup::None,
            _ => Popup::Help,
        };
    }

    pub fn open_source_list(&mut self) {
        self.popup = Popup::Sources {
            selected: self.current,
        };
    }

    pub fn close_popup(&mut self) {
        self.popup = Popup::None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn state() -> AppState {
        AppState::new(vec!["statements", "file_io", "mutex"], ServerInfo::default())
    }

    #[test]
    fn cycles_with_wraparound() {
        let mut s = state();
        s.next_source();
        assert_eq!(s.current_source(), Some("file_io"));
        s.next_source();
        s.next_source();
        assert_eq!(s.current_source(), Some("statements"));
        s.prev_source();
        assert_eq!(s.current_source(), Some("mutex"));
    }

    #[test]
    fn disabled_sources_are_skipped() {
        let mut s = state();
        s.set_enabled(1, false);
        s.next_source();
        assert_eq!(s.current_source(), Some("mutex"));
        s.prev_source();
        assert_eq!(s.current_source(), Some("statements"));
    }

    #[test]
    fn disabling_current_moves_on() {
        let mut s = state();
        s.set_enabled(0, false);
        assert_eq!(s.current_source(), Some("file_io"));

        // With everything disabled the view stays put.
        s.set_enabled(1, false);
        s.set_enabled(2, false);
        assert_eq!(s.current_source(), Some("mutex"));
        s.next_source();
        assert_eq!(s.current_source(), Some("mutex"));
    }

    #[test]
    fn popups_are_exclusive() {
        let mut s = state();
        s.toggle_help();
        assert_eq!(s.popup, Popup::Help);
        s.open_source_list();
        assert_eq!(s.popup, Popup::Sources { selected: 0 });
        s.toggle_help();
        assert_eq!(s.popup, Popup::Help);
        s.toggle_help();
        assert_eq!(s.popup, Popup::None);
    }

    #[test]
    fn empty_source_list() {
        let mut s = AppState::new(Vec::new(), ServerInfo::default());
        s.next_source();
        assert_eq!(s.current_source(), None);
    }
}
