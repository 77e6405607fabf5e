mod status_bar;
mod status_view;
mod styles;

use crate::app::App;
use ratatui::layout::{Constraint, Direction, Layout};
use ratatui::Frame;

/// Rows left for the status lines in a terminal of the given size
pub fn content_height(app: &App, width: u16, height: u16) -> u16 {
    height
        .saturating_sub(status_bar::top_bar_height(app))
        .saturating_sub(status_bar::bottom_bar_height(app, width))
}

/// Render the entire UI
pub fn draw(f: &mut Frame, app: &App) {
    let top_height = status_bar::top_bar_height(app);
    let bottom_height = status_bar::bottom_bar_height(app, f.area().width);

    let outer = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(top_height),    // top bar
            Constraint::Min(1),                // status lines
            Constraint::Length(bottom_height), // bottom bar (dynamic rows)
        ])
        .split(f.area());

    status_bar::render_top_bar(f, outer[0], app);
    status_view::render(f, outer[1], app);
    status_bar::render_bottom_bar(f, outer[2], app);

    if let Some(ref msg) = app.notification {
        status_bar::render_notification(f, f.area(), msg);
    }
}
