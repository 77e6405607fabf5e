use ratatui::{
    layout::{Constraint, Direction, Layout, Rect},
    style::Style,
    text::{Line, Span},
    widgets::Paragraph,
    Frame,
};

use super::styles;
use crate::app::{App, InputMode};

/// Compute the display width of a list of spans
fn spans_width(spans: &[Span]) -> usize {
    spans.iter().map(|s| s.content.chars().count()).sum()
}

/// Calculate how many rows the top bar needs
pub fn top_bar_height(app: &App) -> u16 {
    if app.registry.len() > 1 {
        2 // tabs row + repo info row
    } else {
        1
    }
}

/// Render the top status bar
///
/// Multi-tab layout (2 rows):
///   Row 1: Tab 1 │ Tab 2 │ Tab 3
///   Row 2: repo · branch                      L2 · watching
pub fn render_top_bar(f: &mut Frame, area: Rect, app: &App) {
    let view = app.view();
    let panel_bg = styles::panel_style();
    let has_tabs = app.registry.len() > 1;

    let row_count = top_bar_height(app);
    let rows = Layout::default()
        .direction(Direction::Vertical)
        .constraints((0..row_count).map(|_| Constraint::Length(1)).collect::<Vec<_>>())
        .split(area);

    let mut row_idx: usize = 0;

    // ── Tab row (multi-tab only) ──
    if has_tabs {
        let mut tab_spans: Vec<Span> = Vec::new();
        let count = app.registry.len();
        for (i, v) in app.registry.iter().enumerate() {
            let label = format!(" {} ", v.tab_name());
            if i == app.registry.active_index() {
                tab_spans.push(Span::styled(label, styles::badge_style(styles::BLUE)));
            } else {
                tab_spans.push(Span::styled(label, styles::dim_style()));
            }
            if i < count - 1 {
                tab_spans.push(Span::styled(" │ ", Style::default().fg(styles::BORDER)));
            }
        }
        f.render_widget(Paragraph::new(Line::from(tab_spans)).style(panel_bg), rows[row_idx]);
        row_idx += 1;
    }

    // ── Repo info row: repo · branch (left), level + flags (right) ──
    let branch = view
        .snapshot
        .as_ref()
        .map(|s| s.head.branch.clone().unwrap_or_else(|| "(detached)".into()))
        .unwrap_or_default();
    let left: Vec<Span> = vec![
        Span::styled(
            format!(" {}", view.tab_name()),
            Style::default()
                .fg(styles::CYAN)
                .add_modifier(ratatui::style::Modifier::BOLD),
        ),
        Span::styled(" · ", Style::default().fg(styles::BORDER)),
        Span::styled(branch, Style::default().fg(styles::GREEN)),
    ];

    let mut right: Vec<Span> = Vec::new();
    if view.loading {
        right.push(Span::styled("loading… ", Style::default().fg(styles::YELLOW)));
    }
    if let Some(level) = view.expansion.visibility_level {
        right.push(Span::styled(format!(" L{} ", level.get()), styles::badge_style(styles::PURPLE)));
        right.push(Span::raw(" "));
    }
    if app.watching {
        right.push(Span::styled("● watching ", Style::default().fg(styles::GREEN)));
    }

    let pad = (area.width as usize).saturating_sub(spans_width(&left) + spans_width(&right));
    let mut spans = left;
    spans.push(Span::raw(" ".repeat(pad)));
    spans.extend(right);
    f.render_widget(Paragraph::new(Line::from(spans)).style(panel_bg), rows[row_idx]);
}

struct Hint {
    key: String,
    label: String,
}

impl Hint {
    fn new(key: &str, label: &str) -> Self {
        Self { key: key.to_string(), label: label.to_string() }
    }

    fn indicator(label: String) -> Self {
        Self { key: String::new(), label }
    }

    fn width(&self) -> usize {
        self.key.chars().count() + self.label.chars().count()
    }
}

/// Build the normal-mode hint list
fn build_hints(app: &App) -> Vec<Hint> {
    let view = app.view();
    let mut hints = vec![
        Hint::new("j/k", " nav "),
        Hint::new("[/]", " sections "),
        Hint::new("Tab", " toggle "),
        Hint::new("S-Tab", " full "),
        Hint::new("1-4", " level "),
        Hint::new("s", " stage "),
        Hint::new("u", " unstage "),
        Hint::new("x", " discard "),
        Hint::new("S/U", " all "),
        Hint::new("v", " visual "),
        Hint::new("r", " refresh "),
        Hint::new("w", " watch "),
    ];

    // Tab switching, only with several tabs open
    if app.registry.len() > 1 {
        hints.push(Hint::new("^n/^p", " tabs "));
    }
    hints.push(Hint::new("q", " quit "));

    if let Some((lo, hi)) = view.selection_range() {
        hints.push(Hint::indicator(format!(" [visual: {} lines] ", hi - lo + 1)));
    }

    hints
}

/// Pack hints into rows that fit within `width`, returns vec of Lines
fn pack_hint_lines(hints: &[Hint], width: usize) -> Vec<Line<'static>> {
    let mut lines: Vec<Line<'static>> = Vec::new();
    let mut current_spans: Vec<Span<'static>> = Vec::new();
    let mut current_w: usize = 1; // leading space

    for hint in hints {
        let hw = hint.width();
        if current_w + hw > width && !current_spans.is_empty() {
            // Wrap to next line
            lines.push(Line::from(current_spans));
            current_spans = Vec::new();
            current_w = 1;
        }
        if current_spans.is_empty() {
            current_spans.push(Span::raw(" "));
        }
        if !hint.key.is_empty() {
            current_spans.push(Span::styled(hint.key.clone(), styles::key_hint_style()));
        }
        let label_style = if hint.key.is_empty() {
            Style::default().fg(styles::PURPLE)
        } else {
            styles::dim_style()
        };
        current_spans.push(Span::styled(hint.label.clone(), label_style));
        current_w += hw;
    }
    if !current_spans.is_empty() {
        lines.push(Line::from(current_spans));
    }
    if lines.is_empty() {
        lines.push(Line::from(vec![Span::raw(" ")]));
    }
    lines
}

/// Calculate how many rows the bottom bar needs
pub fn bottom_bar_height(app: &App, width: u16) -> u16 {
    match &app.input_mode {
        InputMode::Confirm(_) => 1,
        InputMode::Normal => {
            let hints = build_hints(app);
            let lines = pack_hint_lines(&hints, width as usize);
            (lines.len() as u16).max(1)
        }
    }
}

/// Render the bottom keybinding hints bar
pub fn render_bottom_bar(f: &mut Frame, area: Rect, app: &App) {
    let panel_bg = styles::panel_style();

    match &app.input_mode {
        InputMode::Confirm(planned) => {
            let spans = vec![
                Span::styled(" ⚠ ", styles::badge_style(styles::YELLOW)),
                Span::styled(format!(" {} ", planned.prompt()), Style::default().fg(styles::YELLOW)),
            ];
            f.render_widget(Paragraph::new(Line::from(spans)).style(panel_bg), area);
        }
        InputMode::Normal => {
            let lines = pack_hint_lines(&build_hints(app), area.width as usize);

            let rows = Layout::default()
                .direction(Direction::Vertical)
                .constraints(lines.iter().map(|_| Constraint::Length(1)).collect::<Vec<_>>())
                .split(area);

            for (i, line) in lines.into_iter().enumerate() {
                f.render_widget(Paragraph::new(line).style(panel_bg), rows[i]);
            }
        }
    }
}

/// Render the notification overlay in the top-right corner
pub fn render_notification(f: &mut Frame, area: Rect, message: &str) {
    let notif_width = message.chars().count() as u16 + 4;
    let notif_x = area.x + area.width.saturating_sub(notif_width + 2);
    let notif_y = area.y + 2;

    let notif_area = Rect {
        x: notif_x,
        y: notif_y.min(area.bottom().saturating_sub(1)),
        width: notif_width.min(area.width),
        height: 1,
    };

    let accent = if message.starts_with("Error") {
        styles::RED
    } else {
        styles::GREEN
    };
    let notif = Paragraph::new(Line::from(vec![
        Span::styled(" ● ", Style::default().fg(accent)),
        Span::styled(message, Style::default().fg(styles::TEXT)),
        Span::raw(" "),
    ]))
    .style(Style::default().bg(styles::PANEL).fg(styles::TEXT));

    f.render_widget(notif, notif_area);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hints_wrap_to_width() {
        let hints = vec![Hint::new("j/k", " nav "), Hint::new("s", " stage "), Hint::new("q", " quit ")];
        assert_eq!(pack_hint_lines(&hints, 80).len(), 1);
        assert_eq!(pack_hint_lines(&hints, 10).len(), 3);
        assert_eq!(pack_hint_lines(&[], 10).len(), 1);
    }
}
