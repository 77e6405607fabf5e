use ratatui::{
    layout::Rect,
    style::Style,
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph},
    Frame,
};

use super::styles;
use crate::app::{App, StatusView};

/// Render the status lines of the active view
pub fn render(f: &mut Frame, area: Rect, app: &App) {
    let view = app.view();
    if view.snapshot.is_none() {
        render_loading(f, area, view);
        return;
    }

    let signs = app.config.display.signs;
    let selection = view.selection_range();
    let first = view.scroll + 1;
    let last = view.scroll + area.height as usize;

    let mut lines: Vec<Line> = Vec::with_capacity(area.height as usize);
    for (i, line) in view.rendered.lines.iter().enumerate() {
        let number = i + 1;
        if number < first {
            continue;
        }
        if number > last {
            break;
        }

        let highlight = if number == view.cursor {
            Some(styles::cursor_style())
        } else if selection.is_some_and(|(lo, hi)| (lo..=hi).contains(&number)) {
            Some(styles::visual_style())
        } else {
            None
        };
        let patch = |style: Style| match highlight {
            Some(h) => style.patch(h),
            None => style,
        };

        let mut spans: Vec<Span> = Vec::with_capacity(2);
        if signs {
            let glyph = line.sign.map(|s| s.glyph()).unwrap_or(" ");
            spans.push(Span::styled(format!("{glyph} "), patch(styles::sign_style())));
        }
        spans.push(Span::styled(line.text.as_str(), patch(styles::line_style(&line.kind))));

        let mut rendered = Line::from(spans);
        if let Some(h) = highlight {
            // Carry the highlight to the right edge
            rendered = rendered.style(h);
        }
        lines.push(rendered);
    }

    let block = Block::default()
        .borders(Borders::NONE)
        .style(styles::default_style());
    f.render_widget(Paragraph::new(lines).block(block), area);
}

fn render_loading(f: &mut Frame, area: Rect, view: &StatusView) {
    let block = Block::default()
        .borders(Borders::NONE)
        .style(styles::default_style());

    let message = if view.loading {
        "  Loading status…"
    } else {
        "  Status unavailable (press r to retry)"
    };
    let text = Paragraph::new(vec![
        Line::from(""),
        Line::from(Span::styled(message, styles::dim_style())),
    ])
    .block(block);

    f.render_widget(text, area);
}
