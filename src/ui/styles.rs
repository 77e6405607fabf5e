use ratatui::style::{Color, Modifier, Style};

use crate::status::{FileStatus, LineKind};

// ── Background colors ──
pub const BG: Color = Color::Rgb(12, 12, 12);
pub const PANEL: Color = Color::Rgb(26, 26, 26);
pub const BORDER: Color = Color::Rgb(42, 42, 42);
pub const CURSOR_BG: Color = Color::Rgb(26, 42, 58);
pub const VISUAL_BG: Color = Color::Rgb(44, 36, 70);

// ── Text colors ──
pub const TEXT: Color = Color::Rgb(200, 200, 200);
pub const DIM: Color = Color::Rgb(102, 102, 102);
pub const MUTED: Color = Color::Rgb(136, 136, 136);
pub const BRIGHT: Color = Color::Rgb(232, 232, 232);

// ── Accent colors ──
pub const BLUE: Color = Color::Rgb(96, 165, 250);
pub const CYAN: Color = Color::Rgb(34, 211, 238);
pub const GREEN: Color = Color::Rgb(74, 222, 128);
pub const YELLOW: Color = Color::Rgb(250, 204, 21);
pub const RED: Color = Color::Rgb(248, 113, 113);
pub const PURPLE: Color = Color::Rgb(167, 139, 250);

// ── Diff colors ──
pub const ADD_BG: Color = Color::Rgb(16, 62, 40);
pub const ADD_TEXT: Color = Color::Rgb(120, 240, 160);
pub const DEL_BG: Color = Color::Rgb(68, 16, 24);
pub const DEL_TEXT: Color = Color::Rgb(255, 140, 140);
pub const HUNK_BG: Color = Color::Rgb(28, 28, 60);

// ── Composed styles ──

pub fn default_style() -> Style {
    Style::default().fg(TEXT).bg(BG)
}

pub fn panel_style() -> Style {
    Style::default().bg(PANEL)
}

pub fn dim_style() -> Style {
    Style::default().fg(DIM)
}

pub fn key_hint_style() -> Style {
    Style::default().fg(MUTED).add_modifier(Modifier::BOLD)
}

fn file_style(status: &FileStatus) -> Style {
    let color = match status {
        FileStatus::Added | FileStatus::Copied(_) => GREEN,
        FileStatus::Deleted => RED,
        FileStatus::Renamed(_) | FileStatus::TypeChanged => PURPLE,
        FileStatus::Untracked => MUTED,
        FileStatus::Conflicted => RED,
        FileStatus::Modified => YELLOW,
    };
    Style::default().fg(color)
}

/// Base style of a status-view line, before cursor or selection highlight
pub fn line_style(kind: &LineKind) -> Style {
    match kind {
        LineKind::Blank => Style::default(),
        LineKind::HeadInfo => Style::default().fg(BRIGHT),
        LineKind::SectionHeader => Style::default().fg(BLUE).add_modifier(Modifier::BOLD),
        LineKind::File(status) => file_style(status),
        LineKind::HunkHeader => Style::default().fg(PURPLE).bg(HUNK_BG),
        LineKind::Added => Style::default().fg(ADD_TEXT).bg(ADD_BG),
        LineKind::Removed => Style::default().fg(DEL_TEXT).bg(DEL_BG),
        LineKind::Context => Style::default().fg(TEXT),
        LineKind::Marker | LineKind::Placeholder => {
            Style::default().fg(DIM).add_modifier(Modifier::ITALIC)
        }
        LineKind::Commit | LineKind::RebaseCommit => Style::default().fg(TEXT),
        LineKind::CommitBody | LineKind::SubmoduleDetail => Style::default().fg(MUTED),
        LineKind::Stash => Style::default().fg(CYAN),
        LineKind::Submodule => Style::default().fg(CYAN),
        LineKind::Worktree => Style::default().fg(GREEN),
    }
}

pub fn sign_style() -> Style {
    Style::default().fg(MUTED)
}

pub fn cursor_style() -> Style {
    Style::default().bg(CURSOR_BG).add_modifier(Modifier::BOLD)
}

pub fn visual_style() -> Style {
    Style::default().bg(VISUAL_BG)
}

/// Badge on a bar: dark text on an accent background
pub fn badge_style(bg: Color) -> Style {
    Style::default().fg(BG).bg(bg).add_modifier(Modifier::BOLD)
}
