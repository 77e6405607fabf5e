use anyhow::Result;
use notify::{RecommendedWatcher, RecursiveMode};
use notify_debouncer_mini::{new_debouncer, DebouncedEvent, DebouncedEventKind};
use std::path::{Component, Path};
use std::time::Duration;

/// A debounced file watcher over a git working tree
pub struct FileWatcher {
    _watcher: notify_debouncer_mini::Debouncer<RecommendedWatcher>,
}

impl FileWatcher {
    /// Start watching `root`. `on_change` receives the relevant changed paths
    /// of each debounced batch, on the watcher's own thread.
    pub fn new<F>(root: &Path, debounce_ms: u64, on_change: F) -> Result<Self>
    where
        F: Fn(Vec<String>) + Send + 'static,
    {
        let mut debouncer = new_debouncer(
            Duration::from_millis(debounce_ms),
            move |result: std::result::Result<Vec<DebouncedEvent>, notify::Error>| match result {
                Ok(events) => {
                    let paths: Vec<String> = events
                        .iter()
                        .filter(|e| e.kind == DebouncedEventKind::Any)
                        .filter(|e| is_relevant(&e.path))
                        .map(|e| e.path.to_string_lossy().to_string())
                        .collect();

                    if !paths.is_empty() {
                        on_change(paths);
                    }
                }
                Err(e) => tracing::warn!(error = %e, "file watcher error"),
            },
        )?;

        debouncer.watcher().watch(root, RecursiveMode::Recursive)?;
        tracing::debug!(root = %root.display(), debounce_ms, "file watcher started");

        Ok(FileWatcher {
            _watcher: debouncer,
        })
    }
}

/// Whether a change can affect status output. Inside `.git/` only the index,
/// HEAD and refs matter; objects, logs and lock files are noise.
pub fn is_relevant(path: &Path) -> bool {
    let mut components = path.components();
    while let Some(component) = components.next() {
        if component == Component::Normal(".git".as_ref()) {
            let rest: Vec<_> = components.map(|c| c.as_os_str()).collect();
            return match rest.first().and_then(|c| c.to_str()) {
                Some("index") | Some("HEAD") => rest.len() == 1,
                Some("refs") => true,
                Some("rebase-merge") => true,
                _ => false,
            };
        }
    }
    true
}
