//! Main rendering logic for TUI.

use ratatui::Frame;
use ratatui::layout::{Constraint, Layout, Rect};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, Clear, Paragraph};

use crate::collector::SourceHealth;
use crate::fmt::{FmtStyle, format_duration, truncate};
use crate::view::ViewBundle;

use super::state::{AppState, Popup};
use super::style::Styles;

const HELP: &[(&str, &str)] = &[
    ("q, Ctrl-C", "quit"),
    ("Tab, Right", "next source"),
    ("Shift-Tab, Left", "previous source"),
    ("z", "reset baseline of the shown source"),
    ("r, t", "toggle relative/absolute for the shown source"),
    ("R", "toggle relative/absolute for all sources"),
    ("e", "enable/disable the shown source"),
    ("s", "source list (Space/e toggles, Enter shows)"),
    ("h, ?", "this help"),
];

/// Main render function.
pub fn render(frame: &mut Frame, state: &AppState, bundle: Option<&ViewBundle>) {
    let area = frame.area();

    let chunks = Layout::vertical([
        Constraint::Length(1), // Header
        Constraint::Length(1), // Description
        Constraint::Length(1), // Headings
        Constraint::Min(1),    // Rows
        Constraint::Length(1), // Totals
        Constraint::Length(1), // Status
    ])
    .split(area);

    render_header(frame, chunks[0], state, bundle);

    match bundle {
        Some(bundle) => {
            render_description(frame, chunks[1], bundle);
            frame.render_widget(
                Paragraph::new(bundle.headings()).style(Styles::table_header()),
                chunks[2],
            );
            render_rows(frame, chunks[3], bundle);
            frame.render_widget(
                Paragraph::new(bundle.total_row_content()).style(Styles::totals()),
                chunks[4],
            );
        }
        None => {
            frame.render_widget(
                Paragraph::new("no sources registered").style(Styles::dim()),
                chunks[1],
            );
        }
    }

    render_status(frame, chunks[5], state);

    match state.popup {
        Popup::None => {}
        Popup::Help => render_help(frame, area),
        Popup::Sources { selected } => render_source_list(frame, area, state, selected),
    }
}

fn render_header(frame: &mut Frame, area: Rect, state: &AppState, bundle: Option<&ViewBundle>) {
    let server = &state.server;
    let mut text = format!(" psglot  {}", server.endpoint);
    if let Some(version) = &server.version {
        text.push_str(&format!("  MySQL {}", version));
    }
    if let Some(uptime) = server.uptime_secs {
        text.push_str(&format!("  up {}", format_duration(uptime, FmtStyle::Detail)));
    }
    if let Some(bundle) = bundle {
        text.push_str(&format!(
            "  [{}] {}",
            bundle.mode.as_str(),
            bundle.schema.id
        ));
        if let Some(at) = bundle.collected_at {
            text.push_str(&format!("  {}", at.format("%H:%M:%S")));
        }
    }
    frame.render_widget(Paragraph::new(text).style(Styles::header()), area);
}

fn render_description(frame: &mut Frame, area: Rect, bundle: &ViewBundle) {
    let style = match bundle.health {
        SourceHealth::Healthy => Styles::default(),
        SourceHealth::Stale { .. } => Styles::stale(),
        SourceHealth::Failed { .. } => Styles::failed(),
    };
    let text = truncate(&bundle.description(), area.width as usize);
    frame.render_widget(Paragraph::new(text).style(style), area);
}

/// Ranked rows, padded with empty rows to fill the area.
fn render_rows(frame: &mut Frame, area: Rect, bundle: &ViewBundle) {
    let height = area.height as usize;
    let mut lines: Vec<Line> = bundle
        .row_content()
        .into_iter()
        .take(height)
        .map(Line::from)
        .collect();
    let filler = bundle.empty_row_content();
    while lines.len() < height {
        lines.push(Line::from(filler.clone()));
    }
    frame.render_widget(Paragraph::new(lines).style(Styles::default()), area);
}

fn render_status(frame: &mut Frame, area: Rect, state: &AppState) {
    let line = match &state.status_message {
        Some(msg) => Line::from(Span::styled(msg.clone(), Styles::stale())),
        None => Line::from(vec![
            Span::styled("h", Styles::help_key()),
            Span::styled(" help  ", Styles::dim()),
            Span::styled("Tab", Styles::help_key()),
            Span::styled(" next  ", Styles::dim()),
            Span::styled("z", Styles::help_key()),
            Span::styled(" rebase  ", Styles::dim()),
            Span::styled("r", Styles::help_key()),
            Span::styled(" mode  ", Styles::dim()),
            Span::styled("q", Styles::help_key()),
            Span::styled(" quit", Styles::dim()),
        ]),
    };
    frame.render_widget(Paragraph::new(line), area);
}

/// Centered popup area, clamped to the screen.
fn popup_area(area: Rect, width: u16, height: u16) -> Rect {
    let width = width.min(area.width);
    let height = height.min(area.height);
    let x = area.x + (area.width.saturating_sub(width)) / 2;
    let y = area.y + (area.height.saturating_sub(height)) / 2;
    Rect::new(x, y, width, height)
}

fn render_help(frame: &mut Frame, area: Rect) {
    let popup = popup_area(area, 64, HELP.len() as u16 + 2);
    frame.render_widget(Clear, popup);

    let lines: Vec<Line> = HELP
        .iter()
        .map(|(keys, what)| {
            Line::from(vec![
                Span::styled(format!(" {:<16}", keys), Styles::help_key()),
                Span::raw(*what),
            ])
        })
        .collect();
    let block = Block::default()
        .title(" Help ")
        .borders(Borders::ALL)
        .border_style(Styles::popup_border());
    frame.render_widget(Paragraph::new(lines).block(block), popup);
}

fn render_source_list(frame: &mut Frame, area: Rect, state: &AppState, selected: usize) {
    let popup = popup_area(area, 40, state.sources.len() as u16 + 2);
    frame.render_widget(Clear, popup);

    let lines: Vec<Line> = state
        .sources
        .iter()
        .enumerate()
        .map(|(i, id)| {
            let mark = if state.is_enabled(i) { "[x]" } else { "[ ]" };
            let shown = if i == state.current { "*" } else { " " };
            let text = format!(" {} {} {}", mark, shown, id);
            if i == selected {
                Line::from(Span::styled(text, Styles::selected()))
            } else {
                Line::from(text)
            }
        })
        .collect();
    let block = Block::default()
        .title(" Sources ")
        .borders(Borders::ALL)
        .border_style(Styles::popup_border());
    frame.render_widget(Paragraph::new(lines).block(block), popup);
}
