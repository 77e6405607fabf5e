mod app;
mod config;
mod git;
mod logging;
mod status;
mod ui;
mod watch;

use anyhow::Result;
use app::{App, AppEvent, InputMode, UserAction};
use clap::Parser;
use crossterm::{
    event::{self, Event, KeyCode, KeyEvent, KeyModifiers},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::prelude::*;
use serde::Serialize;
use status::{RenderedStatus, VisibilityLevel};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::mpsc::{self, Receiver, Sender};
use std::time::Duration;
use watch::FileWatcher;

/// Terminal git status view with staging of files, hunks and lines
#[derive(Parser)]
#[command(name = "es", version, about)]
struct Cli {
    /// Repository paths to open (defaults to current directory)
    paths: Vec<String>,

    /// Initial visibility level: 1 headers, 2 items, 3 hunk headers, 4 everything
    #[arg(long, value_parser = clap::value_parser!(u8).range(1..=4))]
    level: Option<u8>,

    /// Print the rendered status and exit
    #[arg(long)]
    dump: bool,

    /// With --dump, print lines and line maps as JSON
    #[arg(long, requires = "dump")]
    json: bool,

    /// Log file (defaults to the user cache directory)
    #[arg(long)]
    log_file: Option<PathBuf>,

    /// Log at debug level
    #[arg(short, long)]
    verbose: bool,

    /// Start without watching the working tree
    #[arg(long)]
    no_watch: bool,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let log_path = cli.log_file.clone().unwrap_or_else(logging::default_log_path);
    if let Err(e) = logging::init(&log_path, cli.verbose) {
        eprintln!("warning: logging disabled: {e:#}");
    }

    let (tx, rx) = mpsc::channel::<AppEvent>();
    let level = cli.level.map(VisibilityLevel::new);
    let mut app = App::new_with_args(&cli.paths, level, tx.clone())?;
    tracing::info!(repos = app.registry.len(), "starting");

    if cli.dump {
        return dump(&mut app, cli.json);
    }

    app.refresh_all();

    // Terminal setup
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let watch = app.config.watch.enabled && !cli.no_watch;
    let result = run_app(&mut terminal, &mut app, &tx, rx, watch);

    // Cleanup
    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;

    if let Err(err) = result {
        tracing::error!(error = %err, "event loop failed");
        eprintln!("Error: {:?}", err);
    }

    // Print resume hint if multiple tabs were open
    if app.registry.len() > 1 {
        eprintln!("\x1b[2mes {}\x1b[0m", app.registry.repo_roots().join(" "));
    }

    Ok(())
}

#[derive(Serialize)]
struct DumpedStatus<'a> {
    repo: &'a str,
    status: &'a RenderedStatus,
}

/// Load every repository synchronously and print what the view would show
fn dump(app: &mut App, json: bool) -> Result<()> {
    let recent = app.config.status.recent_commit_count;
    for repo in app.registry.repo_roots() {
        let snapshot = git::load_snapshot(&repo, recent)?;
        let Some(view) = app.registry.get_mut(&repo) else {
            continue;
        };
        if let Some(generation) = view.begin_refresh() {
            for key in view.apply_snapshot(generation, snapshot) {
                let orig_path = view
                    .snapshot
                    .as_ref()
                    .and_then(|s| s.orig_path(&key))
                    .map(str::to_string);
                let diff = git::diff_lines(&repo, &key, orig_path.as_deref());
                view.apply_diff(generation, key, diff)?;
            }
        }
    }

    if json {
        let out: Vec<DumpedStatus<'_>> = app
            .registry
            .iter()
            .map(|view| DumpedStatus {
                repo: &view.repo_root,
                status: &view.rendered,
            })
            .collect();
        println!("{}", serde_json::to_string_pretty(&out)?);
        return Ok(());
    }

    let signs = app.config.display.signs;
    for (i, view) in app.registry.iter().enumerate() {
        if app.registry.len() > 1 {
            if i > 0 {
                println!();
            }
            println!("# {}", view.repo_root);
        }
        for line in &view.rendered.lines {
            if signs {
                let glyph = line.sign.map(|s| s.glyph()).unwrap_or(" ");
                println!("{} {}", glyph, line.text);
            } else {
                println!("{}", line.text);
            }
        }
    }
    Ok(())
}

/// One watcher per open repository, each feeding `FilesChanged` events
fn start_watchers(app: &App, tx: &Sender<AppEvent>) -> Vec<FileWatcher> {
    let debounce_ms = app.config.watch.debounce_ms;
    let mut watchers = Vec::new();
    for repo in app.registry.repo_roots() {
        let tx = tx.clone();
        let repo_for_events = repo.clone();
        let watcher = FileWatcher::new(Path::new(&repo), debounce_ms, move |paths| {
            let _ = tx.send(AppEvent::FilesChanged {
                repo: repo_for_events.clone(),
                count: paths.len(),
            });
        });
        match watcher {
            Ok(w) => watchers.push(w),
            Err(e) => tracing::warn!(repo = %repo, error = %e, "could not watch repository"),
        }
    }
    watchers
}

fn run_app(
    terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
    app: &mut App,
    tx: &Sender<AppEvent>,
    rx: Receiver<AppEvent>,
    watch: bool,
) -> Result<()> {
    let mut watchers = if watch {
        start_watchers(app, tx)
    } else {
        Vec::new()
    };
    app.watching = !watchers.is_empty();

    loop {
        // Worker results are applied here, never on the worker threads
        while let Ok(event) = rx.try_recv() {
            app.handle_event(event);
        }

        let size = terminal.size()?;
        app.viewport_height = ui::content_height(app, size.width, size.height) as usize;
        let height = app.viewport_height;
        app.view_mut().ensure_visible(height);

        terminal.draw(|f| ui::draw(f, app))?;

        if event::poll(Duration::from_millis(100))? {
            if let Event::Key(key) = event::read()? {
                match &app.input_mode {
                    InputMode::Confirm(_) => handle_confirm_input(app, key),
                    InputMode::Normal => handle_normal_input(app, key, tx, &mut watchers),
                }
            }
        }

        // Tick for auto-clearing notifications
        app.tick();

        if app.should_quit {
            return Ok(());
        }
    }
}

fn handle_normal_input(
    app: &mut App,
    key: KeyEvent,
    tx: &Sender<AppEvent>,
    watchers: &mut Vec<FileWatcher>,
) {
    let ctrl = key.modifiers.contains(KeyModifiers::CONTROL);
    let alt = key.modifiers.contains(KeyModifiers::ALT);
    let half_page = (app.viewport_height / 2).max(1) as isize;

    match key.code {
        KeyCode::Char('q') => app.should_quit = true,
        KeyCode::Char('c') if ctrl => app.should_quit = true,

        // Movement
        KeyCode::Char('d') if ctrl => app.view_mut().move_by(half_page),
        KeyCode::Char('u') if ctrl => app.view_mut().move_by(-half_page),
        KeyCode::Char('j') | KeyCode::Down => app.view_mut().move_by(1),
        KeyCode::Char('k') | KeyCode::Up => app.view_mut().move_by(-1),
        KeyCode::Char('g') | KeyCode::Home => app.view_mut().goto_top(),
        KeyCode::Char('G') | KeyCode::End => app.view_mut().goto_bottom(),
        KeyCode::Char(']') => app.view_mut().next_section(),
        KeyCode::Char('[') => app.view_mut().prev_section(),

        // Tabs
        KeyCode::Char('n') if ctrl => app.registry.next(),
        KeyCode::Char('p') if ctrl => app.registry.prev(),

        // Expansion
        KeyCode::Tab => app.with_view(|v| v.toggle_at_cursor()),
        KeyCode::BackTab => app.with_view(|v| v.expand_fully_at_cursor()),
        KeyCode::Char(c @ '1'..='4') => {
            let level = VisibilityLevel::new(c as u8 - b'0');
            app.with_view(|v| v.set_level(level, alt));
        }

        // Staging
        KeyCode::Char('s') => app.run_action(UserAction::Stage),
        KeyCode::Char('u') => app.run_action(UserAction::Unstage),
        KeyCode::Char('x') => app.run_action(UserAction::Discard),
        KeyCode::Char('S') => app.stage_all(),
        KeyCode::Char('U') => app.unstage_all(),

        // Visual selection
        KeyCode::Char('v') => app.view_mut().toggle_visual(),
        KeyCode::Esc => app.view_mut().visual_anchor = None,

        KeyCode::Char('r') => {
            app.refresh_active();
            app.notify("Refreshing…");
        }

        // Toggle watch mode
        KeyCode::Char('w') => {
            if app.watching {
                watchers.clear();
                app.watching = false;
                app.notify("Watch stopped");
            } else {
                *watchers = start_watchers(app, tx);
                app.watching = !watchers.is_empty();
                if app.watching {
                    app.notify("Watching for changes...");
                } else {
                    app.notify("Watch error: see log");
                }
            }
        }

        _ => {}
    }
}

fn handle_confirm_input(app: &mut App, key: KeyEvent) {
    match key.code {
        KeyCode::Char('y') => app.confirm(),
        KeyCode::Char('n') | KeyCode::Esc => app.cancel_confirm(),
        _ => {} // Ignore all other keys in confirm mode
    }
}
