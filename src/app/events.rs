use anyhow::Result;
use std::sync::mpsc::Sender;

use crate::git;
use crate::status::{FileKey, StatusSnapshot};

/// Results delivered to the UI thread. Workers never touch view state.
#[derive(Debug)]
pub enum AppEvent {
    StatusLoaded {
        repo: String,
        generation: u64,
        result: Result<StatusSnapshot>,
    },
    DiffLoaded {
        repo: String,
        generation: u64,
        key: FileKey,
        result: Result<Vec<String>>,
    },
    FilesChanged {
        repo: String,
        count: usize,
    },
}

/// Load a status snapshot on a worker thread
pub fn spawn_snapshot(tx: &Sender<AppEvent>, repo: &str, generation: u64, recent_count: usize) {
    let tx = tx.clone();
    let repo = repo.to_string();
    std::thread::spawn(move || {
        let result = git::load_snapshot(&repo, recent_count);
        let _ = tx.send(AppEvent::StatusLoaded {
            repo,
            generation,
            result,
        });
    });
}

/// Fetch one file's diff on a worker thread. `orig_path` is the source of a
/// renamed entry.
pub fn spawn_diff(
    tx: &Sender<AppEvent>,
    repo: &str,
    generation: u64,
    key: FileKey,
    orig_path: Option<String>,
) {
    let tx = tx.clone();
    let repo = repo.to_string();
    std::thread::spawn(move || {
        let result = git::diff_lines(&repo, &key, orig_path.as_deref());
        let _ = tx.send(AppEvent::DiffLoaded {
            repo,
            generation,
            key,
            result,
        });
    });
}
