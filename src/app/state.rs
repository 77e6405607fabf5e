use anyhow::{Context, Result};
use std::collections::HashSet;
use std::sync::mpsc::Sender;

use super::events::{self, AppEvent};
use super::registry::StatusRegistry;
use crate::config::{self, EsConfig, UntrackedFilter};
use crate::git::{self, PatchAction};
use crate::status::{
    capture, reconcile, render, resolve, target_at, visual_selection, ActionTarget,
    CapturedCursor, DiffCache, Expansion, ExpansionCommand, ExpansionState, FileEntry, FileKey, LineInfo,
    RenderOptions, RenderedStatus, SectionKind, StatusSnapshot, VisibilityLevel, VisibilityScope,
};

// ── Enums ──

/// What the user asked to do with the thing under the cursor
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UserAction {
    Stage,
    Unstage,
    Discard,
}

impl UserAction {
    fn verb(&self) -> &'static str {
        match self {
            UserAction::Stage => "stage",
            UserAction::Unstage => "unstage",
            UserAction::Discard => "discard",
        }
    }

    fn past(&self) -> &'static str {
        match self {
            UserAction::Stage => "Staged",
            UserAction::Unstage => "Unstaged",
            UserAction::Discard => "Discarded",
        }
    }

    fn patch_action(&self, section: SectionKind) -> PatchAction {
        match self {
            UserAction::Stage => PatchAction::Stage,
            UserAction::Unstage => PatchAction::Unstage,
            UserAction::Discard => PatchAction::Discard {
                staged: section == SectionKind::Staged,
            },
        }
    }
}

/// A git operation ready to run
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GitOp {
    ApplyPatch { patch: String, action: PatchAction },
    StageFiles(Vec<String>),
    UnstageFiles(Vec<String>),
    DiscardFiles(Vec<FileKey>),
    StageAll,
    UnstageAll,
}

impl GitOp {
    pub fn run(&self, repo_root: &str) -> Result<()> {
        match self {
            GitOp::ApplyPatch { patch, action } => git::apply_patch(repo_root, patch, *action),
            GitOp::StageFiles(paths) => paths
                .iter()
                .try_for_each(|p| git::stage_file(repo_root, p)),
            GitOp::UnstageFiles(paths) => paths
                .iter()
                .try_for_each(|p| git::unstage_file(repo_root, p)),
            GitOp::DiscardFiles(keys) => keys
                .iter()
                .try_for_each(|k| git::discard_file(repo_root, k)),
            GitOp::StageAll => git::stage_all(repo_root),
            GitOp::UnstageAll => git::unstage_all(repo_root),
        }
    }
}

/// An operation plus what it is about, for prompts and notifications
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlannedOp {
    pub op: GitOp,
    pub action: UserAction,
    pub target: String,
}

impl PlannedOp {
    pub fn needs_confirm(&self) -> bool {
        self.action == UserAction::Discard
    }

    pub fn prompt(&self) -> String {
        format!("Discard {}? (y/n)", self.target)
    }

    pub fn done_message(&self) -> String {
        format!("{} {}", self.action.past(), self.target)
    }
}

/// Whether keys navigate or answer a y/n prompt
#[derive(Debug, Clone, PartialEq)]
pub enum InputMode {
    Normal,
    Confirm(PlannedOp),
}

fn plural(n: usize, word: &str) -> String {
    format!("{} {}{}", n, word, if n == 1 { "" } else { "s" })
}

// ── Per-Repository View ──

/// Status view of one repository
pub struct StatusView {
    pub repo_root: String,
    /// `None` until the first snapshot arrives
    pub snapshot: Option<StatusSnapshot>,
    pub expansion: ExpansionState,
    pub diffs: DiffCache,
    pub rendered: RenderedStatus,

    /// 1-based line under the cursor
    pub cursor: usize,
    /// 0-based index of the first visible line
    pub scroll: usize,
    /// Line where a visual selection started
    pub visual_anchor: Option<usize>,

    /// Diff fetches in flight for the current generation
    pub pending: HashSet<FileKey>,
    /// Bumped on every refresh; results tagged with an older value are dropped
    pub generation: u64,
    pub loading: bool,
    /// A refresh was requested while one was in flight
    pub refresh_queued: bool,

    options: RenderOptions,
    untracked_filter: UntrackedFilter,
    initial_level: VisibilityLevel,
    initial_collapsed: Vec<SectionKind>,
    initialized: bool,
}

impl StatusView {
    pub fn new(repo_root: String, config: &EsConfig, level: Option<VisibilityLevel>) -> Self {
        Self {
            repo_root,
            snapshot: None,
            expansion: ExpansionState::default(),
            diffs: DiffCache::new(),
            rendered: RenderedStatus::default(),
            cursor: 1,
            scroll: 0,
            visual_anchor: None,
            pending: HashSet::new(),
            generation: 0,
            loading: false,
            refresh_queued: false,
            options: RenderOptions {
                show_counts: config.display.show_counts,
            },
            untracked_filter: config.untracked_filter(),
            initial_level: level.unwrap_or_else(|| config.default_level()),
            initial_collapsed: config.collapsed_sections(),
            initialized: false,
        }
    }

    /// Short name for display in tab bar (last path component)
    pub fn tab_name(&self) -> String {
        std::path::Path::new(&self.repo_root)
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| self.repo_root.clone())
    }

    // ── Refresh ──

    /// Start a snapshot load. Returns the generation to tag it with, or
    /// `None` when a load is already running (it gets re-run afterwards).
    pub fn begin_refresh(&mut self) -> Option<u64> {
        if self.loading {
            self.refresh_queued = true;
            return None;
        }
        self.generation += 1;
        self.loading = true;
        Some(self.generation)
    }

    /// A snapshot load failed. Fetches tagged with the abandoned generation
    /// are forgotten; returns the diffs to request again.
    pub fn load_failed(&mut self, generation: u64) -> Vec<FileKey> {
        if generation != self.generation {
            return Vec::new();
        }
        self.loading = false;
        self.pending.clear();
        self.missing_diffs()
    }

    /// Install a fresh snapshot: capture the cursor, prune state for vanished
    /// entries, re-render and restore the cursor. Returns the files whose
    /// diffs must be (re)fetched.
    pub fn apply_snapshot(&mut self, generation: u64, mut snapshot: StatusSnapshot) -> Vec<FileKey> {
        if generation != self.generation {
            tracing::debug!(generation, current = self.generation, "dropping stale snapshot");
            return Vec::new();
        }
        self.loading = false;
        self.untracked_filter.apply(&mut snapshot);

        let captured = self.capture_cursor();
        if !self.initialized {
            self.apply_initial_layout(&snapshot);
            self.initialized = true;
        }
        reconcile(&mut self.expansion, &mut self.diffs, &snapshot);
        self.snapshot = Some(snapshot);
        self.rerender(captured);

        // Cached diffs stay visible until their refetch lands
        let mut keys: Vec<FileKey> = self.expansion.expanded_files().cloned().collect();
        keys.sort();
        self.pending = keys.iter().cloned().collect();
        keys
    }

    fn apply_initial_layout(&mut self, snapshot: &StatusSnapshot) {
        if self.initial_level != VisibilityLevel::ITEMS {
            self.expansion.apply(ExpansionCommand::SetVisibilityLevel {
                level: self.initial_level,
                scope: global_scope(snapshot),
            });
        }
        for section in &self.initial_collapsed {
            if !self.expansion.section_collapsed(*section) {
                self.expansion.apply(ExpansionCommand::ToggleSectionCollapse {
                    section: *section,
                    files: snapshot.section_file_keys(*section),
                });
            }
        }
    }

    /// Cache a fetched diff. Results from an older generation are ignored;
    /// a diff for a collapsed file is cached without expanding it.
    pub fn apply_diff(
        &mut self,
        generation: u64,
        key: FileKey,
        result: Result<Vec<String>>,
    ) -> Result<()> {
        if generation != self.generation {
            tracing::debug!(%key, generation, "dropping stale diff");
            return Ok(());
        }
        self.pending.remove(&key);
        let lines = result.with_context(|| format!("Failed to load diff for {}", key.path))?;

        let known = self
            .snapshot
            .as_ref()
            .is_some_and(|s| s.file_keys().contains(&key));
        if !known {
            return Ok(());
        }

        let captured = self.capture_cursor();
        self.diffs.insert(key, git::parse(&lines));
        self.rerender(captured);
        Ok(())
    }

    // ── Expansion ──

    /// Apply an expansion command and return the diffs that now need fetching
    pub fn dispatch(&mut self, command: ExpansionCommand) -> Vec<FileKey> {
        let captured = self.capture_cursor();
        self.expansion.apply(command);

        let expansion = &self.expansion;
        self.diffs.retain(|key, _| expansion.file_expansion(key).is_expanded());

        self.rerender(captured);
        self.missing_diffs()
    }

    fn missing_diffs(&mut self) -> Vec<FileKey> {
        let Some(snapshot) = self.snapshot.as_ref() else {
            return Vec::new();
        };
        let valid: HashSet<FileKey> = snapshot.file_keys().into_iter().collect();
        let mut keys: Vec<FileKey> = self
            .expansion
            .expanded_files()
            .filter(|k| valid.contains(*k) && !self.diffs.contains_key(*k) && !self.pending.contains(*k))
            .cloned()
            .collect();
        keys.sort();
        self.pending.extend(keys.iter().cloned());
        keys
    }

    /// File-like entry owning `line`, if any
    fn file_key_at(&self, line: usize) -> Option<FileKey> {
        match self.rendered.info(line)? {
            LineInfo::File { section, path }
            | LineInfo::HunkHeader { section, path, .. }
            | LineInfo::DiffLine { section, path, .. } => Some(FileKey::new(*section, path)),
            LineInfo::Submodule { path } => Some(FileKey::new(SectionKind::Submodules, path)),
            _ => None,
        }
    }

    fn toggle_command(&self) -> Option<ExpansionCommand> {
        let snapshot = self.snapshot.as_ref()?;
        let command = match self.rendered.info(self.cursor)? {
            LineInfo::Section { section } => ExpansionCommand::ToggleSectionCollapse {
                section: *section,
                files: snapshot.section_file_keys(*section),
            },
            LineInfo::File { section, path } => {
                ExpansionCommand::ToggleFileExpand(FileKey::new(*section, path))
            }
            LineInfo::Submodule { path } => {
                ExpansionCommand::ToggleFileExpand(FileKey::new(SectionKind::Submodules, path))
            }
            LineInfo::HunkHeader {
                section,
                path,
                hunk_index,
                ..
            }
            | LineInfo::DiffLine {
                section,
                path,
                hunk_index,
                ..
            } => {
                let key = FileKey::new(*section, path);
                if self.expansion.file_expansion(&key) == Expansion::Full {
                    let hunk_count = self.diffs.get(&key).map_or(0, |d| d.hunk_count());
                    ExpansionCommand::ToggleHunkInFullFile {
                        key,
                        hunk_index: *hunk_index,
                        hunk_count,
                    }
                } else {
                    ExpansionCommand::ToggleHunkExpand(key, *hunk_index)
                }
            }
            LineInfo::Commit { hash, .. } => ExpansionCommand::ToggleCommitExpand(hash.clone()),
            LineInfo::Stash { .. } | LineInfo::Worktree { .. } | LineInfo::RebaseCommit { .. } => {
                return None
            }
        };
        Some(command)
    }

    /// Toggle whatever is under the cursor
    pub fn toggle_at_cursor(&mut self) -> Vec<FileKey> {
        match self.toggle_command() {
            Some(command) => self.dispatch(command),
            None => Vec::new(),
        }
    }

    pub fn expand_fully_at_cursor(&mut self) -> Vec<FileKey> {
        match self.file_key_at(self.cursor) {
            Some(key) => self.dispatch(ExpansionCommand::ExpandFileFully(key)),
            None => Vec::new(),
        }
    }

    /// Apply a visibility level to the section under the cursor, or everywhere
    pub fn set_level(&mut self, level: VisibilityLevel, global: bool) -> Vec<FileKey> {
        let Some(snapshot) = self.snapshot.as_ref() else {
            return Vec::new();
        };
        let scope = match self.rendered.section_at(self.cursor) {
            Some(section) if !global => VisibilityScope {
                sections: vec![section],
                files: snapshot.section_file_keys(section),
                commits: snapshot
                    .commits(section)
                    .iter()
                    .map(|c| c.hash.clone())
                    .collect(),
                global: false,
            },
            _ => global_scope(snapshot),
        };
        self.dispatch(ExpansionCommand::SetVisibilityLevel { level, scope })
    }

    // ── Rendering & Cursor ──

    fn capture_cursor(&self) -> CapturedCursor {
        capture(&self.rendered.line_map, &self.rendered.section_headers, self.cursor)
    }

    fn rerender(&mut self, captured: CapturedCursor) {
        let Some(snapshot) = self.snapshot.as_ref() else {
            return;
        };
        self.rendered = render(snapshot, &self.expansion, &self.diffs, self.options);
        // Nothing to anchor to: the cursor stays where it was
        if let Some(line) = resolve(&captured, &self.rendered.line_map, &self.rendered.section_headers) {
            self.cursor = line;
        }
        self.cursor = self.cursor.clamp(1, self.rendered.len().max(1));
        if let Some(anchor) = self.visual_anchor {
            self.visual_anchor = Some(anchor.clamp(1, self.rendered.len().max(1)));
        }
    }

    pub fn move_by(&mut self, delta: isize) {
        let max = self.rendered.len().max(1);
        self.cursor = self.cursor.saturating_add_signed(delta).clamp(1, max);
    }

    pub fn goto_top(&mut self) {
        self.cursor = 1;
    }

    pub fn goto_bottom(&mut self) {
        self.cursor = self.rendered.len().max(1);
    }

    pub fn next_section(&mut self) {
        if let Some((&line, _)) = self.rendered.section_headers.range(self.cursor + 1..).next() {
            self.cursor = line;
        }
    }

    pub fn prev_section(&mut self) {
        if let Some((&line, _)) = self.rendered.section_headers.range(..self.cursor).next_back() {
            self.cursor = line;
        }
    }

    /// Adjust scroll so the cursor is inside a viewport of `height` lines
    pub fn ensure_visible(&mut self, height: usize) {
        let height = height.max(1);
        let index = self.cursor.saturating_sub(1);
        if index < self.scroll {
            self.scroll = index;
        } else if index >= self.scroll + height {
            self.scroll = index + 1 - height;
        }
    }

    pub fn toggle_visual(&mut self) {
        self.visual_anchor = match self.visual_anchor {
            Some(_) => None,
            None => Some(self.cursor),
        };
    }

    /// Inclusive 1-based line range of the visual selection
    pub fn selection_range(&self) -> Option<(usize, usize)> {
        self.visual_anchor
            .map(|anchor| (anchor.min(self.cursor), anchor.max(self.cursor)))
    }

    // ── Staging ──

    /// Work out what `action` does at the cursor (or on the visual selection).
    /// `Err` carries the message to show instead.
    pub fn plan(&self, action: UserAction) -> std::result::Result<PlannedOp, String> {
        let snapshot = self.snapshot.as_ref().ok_or("Status not loaded yet")?;
        let map = &self.rendered.line_map;

        let target = match self.visual_anchor {
            Some(anchor) => visual_selection(map, anchor, self.cursor)
                .map(ActionTarget::Lines)
                .ok_or("No changes selected")?,
            None => target_at(map, self.cursor).ok_or("Nothing to act on here")?,
        };

        let section = match &target {
            ActionTarget::Section(section) => *section,
            ActionTarget::File(key) | ActionTarget::Hunk { key, .. } => key.section,
            ActionTarget::Lines(selection) => selection.key.section,
        };
        check_action(action, section)?;

        // Untracked and unmerged files only move as a whole
        let whole_file = matches!(section, SectionKind::Untracked | SectionKind::Conflicted);
        let target = match target {
            ActionTarget::Hunk { key, .. } if whole_file => ActionTarget::File(key),
            ActionTarget::Lines(selection) if whole_file => ActionTarget::File(selection.key),
            other => other,
        };

        let planned = |op: GitOp, target: String| PlannedOp { op, action, target };

        match target {
            ActionTarget::Section(section) => {
                let files = snapshot.files(section);
                if files.is_empty() {
                    return Err("Nothing to act on here".into());
                }
                let paths: Vec<String> = files.iter().flat_map(FileEntry::touched_paths).collect();
                Ok(planned(whole_file_op(action, section, paths), plural(files.len(), "file")))
            }
            ActionTarget::File(key) => {
                let paths = match snapshot.file(&key) {
                    Some(entry) => entry.touched_paths(),
                    None => vec![key.path.clone()],
                };
                Ok(planned(whole_file_op(action, section, paths), key.path))
            }
            ActionTarget::Hunk { key, hunk_index } => {
                let doc = self.diffs.get(&key).ok_or("Diff not loaded yet")?;
                let lines = git::build_full_hunk_patch(doc, hunk_index).ok_or("No such hunk")?;
                let op = GitOp::ApplyPatch {
                    patch: git::patch_text(&lines),
                    action: action.patch_action(section),
                };
                Ok(planned(op, format!("hunk {} of {}", hunk_index, key.path)))
            }
            ActionTarget::Lines(selection) => {
                let doc = self.diffs.get(&selection.key).ok_or("Diff not loaded yet")?;
                let patch_action = action.patch_action(section);
                let lines = git::build_partial_hunk_patch(
                    doc,
                    selection.hunk_index,
                    &selection.indices,
                    patch_action.reverse(),
                )
                .ok_or("No changes selected")?;
                let op = GitOp::ApplyPatch {
                    patch: git::patch_text(&lines),
                    action: patch_action,
                };
                let target = format!("{} in {}", plural(selection.indices.len(), "line"), selection.key.path);
                Ok(planned(op, target))
            }
        }
    }
}

fn whole_file_op(action: UserAction, section: SectionKind, paths: Vec<String>) -> GitOp {
    match action {
        UserAction::Stage => GitOp::StageFiles(paths),
        UserAction::Unstage => GitOp::UnstageFiles(paths),
        UserAction::Discard => GitOp::DiscardFiles(
            paths.into_iter().map(|p| FileKey::new(section, p)).collect(),
        ),
    }
}

fn check_action(action: UserAction, section: SectionKind) -> std::result::Result<(), String> {
    use SectionKind::*;
    match (action, section) {
        (UserAction::Stage, Untracked | Unstaged | Conflicted)
        | (UserAction::Unstage, Staged)
        | (UserAction::Discard, Untracked | Unstaged | Staged) => Ok(()),
        (UserAction::Stage, Staged) => Err("Already staged".into()),
        (UserAction::Unstage, Untracked | Unstaged | Conflicted) => Err("Not staged".into()),
        (UserAction::Discard, Conflicted) => Err("Resolve the conflict before discarding".into()),
        (action, section) => Err(format!("Cannot {} {} entries", action.verb(), section)),
    }
}

/// Scope covering every section, file and commit of a snapshot
fn global_scope(snapshot: &StatusSnapshot) -> VisibilityScope {
    VisibilityScope {
        sections: SectionKind::ALL.to_vec(),
        files: snapshot.file_keys(),
        commits: snapshot.commit_hashes().map(str::to_string).collect(),
        global: true,
    }
}

// ── Main App State ──

pub struct App {
    /// Open status views (one per repo)
    pub registry: StatusRegistry,

    /// Whether we're navigating or answering a confirmation
    pub input_mode: InputMode,

    /// Should the app quit?
    pub should_quit: bool,

    /// Whether watch mode is active
    pub watching: bool,

    /// Last notification message
    pub notification: Option<String>,

    /// Ticks since last notification (for auto-clearing)
    pub notification_ticks: u8,

    /// Lines available for the status view, set before each draw
    pub viewport_height: usize,

    /// Application configuration (loaded from .es-config.toml)
    pub config: EsConfig,

    tx: Sender<AppEvent>,
}

impl App {
    /// Create the app from CLI path arguments.
    /// If no paths provided, uses current directory.
    pub fn new_with_args(
        paths: &[String],
        level: Option<VisibilityLevel>,
        tx: Sender<AppEvent>,
    ) -> Result<Self> {
        let roots = if paths.is_empty() {
            vec![git::get_repo_root()?]
        } else {
            let mut roots = Vec::new();
            for path in paths {
                let canonical = std::fs::canonicalize(path)
                    .with_context(|| format!("Path not found: {}", path))?;
                let dir = canonical.to_string_lossy().to_string();
                let repo_root = git::get_repo_root_in(&dir)
                    .with_context(|| format!("Not a git repository: {}", path))?;
                roots.push(repo_root);
            }
            roots
        };

        // Load config from the first repo root
        let es_config = config::load_config(roots.first().map(String::as_str).unwrap_or("."));

        let mut registry = StatusRegistry::default();
        for root in roots {
            registry.open(StatusView::new(root, &es_config, level));
        }
        // Start on the first tab
        while registry.active_index() != 0 {
            registry.next();
        }

        Ok(App {
            registry,
            input_mode: InputMode::Normal,
            should_quit: false,
            watching: false,
            notification: None,
            notification_ticks: 0,
            viewport_height: 0,
            config: es_config,
            tx,
        })
    }

    pub fn view(&self) -> &StatusView {
        self.registry.active()
    }

    pub fn view_mut(&mut self) -> &mut StatusView {
        self.registry.active_mut()
    }

    // ── Loading ──

    /// Start a background snapshot load for `repo`
    pub fn refresh(&mut self, repo: &str) {
        let recent = self.config.status.recent_commit_count;
        if let Some(view) = self.registry.get_mut(repo) {
            if let Some(generation) = view.begin_refresh() {
                tracing::debug!(repo, generation, "refreshing status");
                events::spawn_snapshot(&self.tx, repo, generation, recent);
            }
        }
    }

    pub fn refresh_all(&mut self) {
        for repo in self.registry.repo_roots() {
            self.refresh(&repo);
        }
    }

    pub fn refresh_active(&mut self) {
        let repo = self.view().repo_root.clone();
        self.refresh(&repo);
    }

    fn request_diffs(&self, repo: &str, generation: u64, keys: Vec<FileKey>) {
        let snapshot = self.registry.get(repo).and_then(|v| v.snapshot.as_ref());
        for key in keys {
            let orig_path = snapshot.and_then(|s| s.orig_path(&key)).map(str::to_string);
            events::spawn_diff(&self.tx, repo, generation, key, orig_path);
        }
    }

    /// Apply a worker result on the UI thread
    pub fn handle_event(&mut self, event: AppEvent) {
        match event {
            AppEvent::StatusLoaded {
                repo,
                generation,
                result,
            } => {
                let Some(view) = self.registry.get_mut(&repo) else {
                    return;
                };
                match result {
                    Ok(snapshot) => {
                        let keys = view.apply_snapshot(generation, snapshot);
                        let queued = std::mem::take(&mut view.refresh_queued);
                        let current = view.generation;
                        self.request_diffs(&repo, current, keys);
                        if queued {
                            self.refresh(&repo);
                        }
                    }
                    Err(e) => {
                        let keys = view.load_failed(generation);
                        let queued = std::mem::take(&mut view.refresh_queued);
                        let current = view.generation;
                        tracing::error!(repo = %repo, error = %e, "status load failed");
                        self.request_diffs(&repo, current, keys);
                        self.notify(&format!("Error: {e:#}"));
                        if queued {
                            self.refresh(&repo);
                        }
                    }
                }
            }
            AppEvent::DiffLoaded {
                repo,
                generation,
                key,
                result,
            } => {
                let Some(view) = self.registry.get_mut(&repo) else {
                    return;
                };
                if let Err(e) = view.apply_diff(generation, key, result) {
                    tracing::warn!(repo = %repo, error = %e, "diff load failed");
                    self.notify(&format!("Error: {e:#}"));
                }
            }
            AppEvent::FilesChanged { repo, count } => {
                tracing::debug!(repo = %repo, count, "files changed");
                self.refresh(&repo);
            }
        }
    }

    /// Run `f` on the active view and fetch whatever diffs it asks for
    pub fn with_view(&mut self, f: impl FnOnce(&mut StatusView) -> Vec<FileKey>) {
        let view = self.registry.active_mut();
        let keys = f(view);
        let repo = view.repo_root.clone();
        let generation = view.generation;
        self.request_diffs(&repo, generation, keys);
    }

    // ── Staging ──

    pub fn run_action(&mut self, action: UserAction) {
        match self.view().plan(action) {
            Err(msg) => self.notify(&msg),
            Ok(planned) if planned.needs_confirm() => {
                self.input_mode = InputMode::Confirm(planned);
            }
            Ok(planned) => self.execute(planned),
        }
    }

    pub fn stage_all(&mut self) {
        self.execute(PlannedOp {
            op: GitOp::StageAll,
            action: UserAction::Stage,
            target: "all tracked changes".into(),
        });
    }

    pub fn unstage_all(&mut self) {
        self.execute(PlannedOp {
            op: GitOp::UnstageAll,
            action: UserAction::Unstage,
            target: "everything".into(),
        });
    }

    fn execute(&mut self, planned: PlannedOp) {
        let repo = self.view().repo_root.clone();
        tracing::info!(repo = %repo, op = ?planned.op, "running git operation");
        match planned.op.run(&repo) {
            Ok(()) => {
                self.notify(&planned.done_message());
                self.view_mut().visual_anchor = None;
            }
            Err(e) => {
                tracing::error!(error = %e, "git operation failed");
                self.notify(&format!("Error: {e:#}"));
            }
        }
        self.refresh(&repo);
    }

    /// Answer `y` to the pending confirmation
    pub fn confirm(&mut self) {
        if let InputMode::Confirm(planned) = std::mem::replace(&mut self.input_mode, InputMode::Normal) {
            self.execute(planned);
        }
    }

    pub fn cancel_confirm(&mut self) {
        self.input_mode = InputMode::Normal;
        self.notify("Cancelled");
    }

    // ── Notifications ──

    pub fn notify(&mut self, msg: &str) {
        self.notification = Some(msg.to_string());
        self.notification_ticks = 0;
    }

    /// Called on every event loop iteration to auto-clear notifications
    pub fn tick(&mut self) {
        if self.notification.is_some() {
            self.notification_ticks += 1;
            if self.notification_ticks > 20 {
                self.notification = None;
                self.notification_ticks = 0;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::status::{CommitEntry, FileEntry, FileStatus, HeadInfo, LineKind};

    const A_DIFF: &str = "diff --git a/a.rs b/a.rs\n\
                          index 111..222 100644\n\
                          --- a/a.rs\n\
                          +++ b/a.rs\n\
                          @@ -1,3 +1,3 @@\n \
                          keep\n\
                          -old\n\
                          +new\n \
                          tail";

    fn file(path: &str, status: FileStatus) -> FileEntry {
        FileEntry {
            path: path.to_string(),
            orig_path: None,
            status,
        }
    }

    fn make_snapshot() -> StatusSnapshot {
        StatusSnapshot {
            untracked: vec![file("new.txt", FileStatus::Untracked)],
            unstaged: vec![file("a.rs", FileStatus::Modified), file("b.rs", FileStatus::Modified)],
            staged: vec![file("c.rs", FileStatus::Added)],
            recent: vec![CommitEntry {
                hash: "abcdef1234".into(),
                short_hash: "abcdef1".into(),
                subject: "Initial".into(),
                body: vec!["details".into()],
            }],
            ..Default::default()
        }
    }

    fn unstaged(path: &str) -> FileKey {
        FileKey::new(SectionKind::Unstaged, path)
    }

    fn diff_lines(raw: &str) -> Result<Vec<String>> {
        Ok(raw.lines().map(str::to_string).collect())
    }

    /// A view with the standard snapshot loaded
    fn loaded_view() -> StatusView {
        let mut view = StatusView::new("/repo".into(), &EsConfig::default(), None);
        let generation = view.begin_refresh().unwrap();
        let keys = view.apply_snapshot(generation, make_snapshot());
        assert!(keys.is_empty());
        view
    }

    fn line_of(view: &StatusView, text: &str) -> usize {
        view.rendered
            .lines
            .iter()
            .position(|l| l.text == text)
            .map(|i| i + 1)
            .unwrap_or_else(|| panic!("no line {text:?}"))
    }

    /// Expand a.rs to hunk headers and deliver its diff
    fn expand_a(view: &mut StatusView) {
        view.cursor = line_of(view, "modified   a.rs");
        let keys = view.toggle_at_cursor();
        assert_eq!(keys, vec![unstaged("a.rs")]);
        view.apply_diff(view.generation, unstaged("a.rs"), diff_lines(A_DIFF)).unwrap();
    }

    /// Also open the single hunk of a.rs
    fn open_hunk_a(view: &mut StatusView) {
        expand_a(view);
        view.cursor = line_of(view, "@@ -1,3 +1,3 @@");
        assert!(view.toggle_at_cursor().is_empty());
    }

    #[test]
    fn unstaging_a_renamed_file_takes_its_source_along() {
        let mut snapshot = make_snapshot();
        snapshot.staged.push(FileEntry {
            path: "new.rs".into(),
            orig_path: Some("old.rs".into()),
            status: FileStatus::Renamed("old.rs".into()),
        });
        let mut view = StatusView::new("/repo".into(), &EsConfig::default(), None);
        let generation = view.begin_refresh().unwrap();
        view.apply_snapshot(generation, snapshot);

        view.cursor = line_of(&view, "renamed    old.rs -> new.rs");
        let planned = view.plan(UserAction::Unstage).unwrap();
        assert_eq!(planned.op, GitOp::UnstageFiles(vec!["new.rs".into(), "old.rs".into()]));
        assert_eq!(planned.target, "new.rs");
    }

    #[test]
    fn first_snapshot_renders_items() {
        let view = loaded_view();
        assert!(!view.loading);
        assert!(view.rendered.lines.iter().any(|l| l.text == "modified   a.rs"));
    }

    #[test]
    fn refresh_while_loading_is_queued() {
        let mut view = StatusView::new("/repo".into(), &EsConfig::default(), None);
        assert_eq!(view.begin_refresh(), Some(1));
        assert_eq!(view.begin_refresh(), None);
        assert!(view.refresh_queued);
    }

    fn app_with(view: StatusView) -> (App, std::sync::mpsc::Receiver<AppEvent>) {
        let (tx, rx) = std::sync::mpsc::channel();
        let mut registry = StatusRegistry::default();
        registry.open(view);
        let app = App {
            registry,
            input_mode: InputMode::Normal,
            should_quit: false,
            watching: false,
            notification: None,
            notification_ticks: 0,
            viewport_height: 0,
            config: EsConfig::default(),
            tx,
        };
        (app, rx)
    }

    #[test]
    fn failed_load_refetches_diffs_abandoned_with_its_generation() {
        let mut view = loaded_view();
        view.cursor = line_of(&view, "modified   a.rs");
        assert_eq!(view.toggle_at_cursor(), vec![unstaged("a.rs")]);

        let generation = view.begin_refresh().unwrap();
        view.apply_diff(generation - 1, unstaged("a.rs"), diff_lines(A_DIFF)).unwrap();
        assert!(view.diffs.is_empty());

        assert_eq!(view.load_failed(generation), vec![unstaged("a.rs")]);
        assert!(!view.loading);
        assert!(view.pending.contains(&unstaged("a.rs")));

        // A later failure report for an older load changes nothing
        assert!(view.load_failed(generation - 1).is_empty());
    }

    #[test]
    fn failed_load_runs_the_queued_refresh() {
        let mut view = loaded_view();
        let generation = view.begin_refresh().unwrap();
        assert_eq!(view.begin_refresh(), None);

        let (mut app, _rx) = app_with(view);
        app.handle_event(AppEvent::StatusLoaded {
            repo: "/repo".into(),
            generation,
            result: Err(anyhow::anyhow!("index.lock exists")),
        });

        let view = app.view();
        assert!(!view.refresh_queued);
        assert!(view.loading);
        assert_eq!(view.generation, generation + 1);
        assert!(app.notification.as_deref().is_some_and(|n| n.starts_with("Error")));
    }

    #[test]
    fn cursor_stays_put_when_nothing_can_anchor_it() {
        let head_only = StatusSnapshot {
            head: HeadInfo {
                branch: Some("main".into()),
                upstream: Some("origin/main".into()),
                ..Default::default()
            },
            ..Default::default()
        };
        let mut view = StatusView::new("/repo".into(), &EsConfig::default(), None);
        let generation = view.begin_refresh().unwrap();
        view.apply_snapshot(generation, head_only.clone());
        assert_eq!(view.rendered.len(), 2);
        assert!(view.rendered.line_map.is_empty());

        view.cursor = 2;
        let generation = view.begin_refresh().unwrap();
        view.apply_snapshot(generation, head_only);
        assert_eq!(view.cursor, 2);
    }

    #[test]
    fn cursor_is_clamped_when_the_render_shrinks() {
        let mut view = loaded_view();
        view.cursor = view.rendered.len() + 5;
        let generation = view.begin_refresh().unwrap();
        view.apply_snapshot(generation, make_snapshot());
        assert!(view.cursor <= view.rendered.len());
    }

    #[test]
    fn stale_snapshot_is_dropped() {
        let mut view = loaded_view();
        let old = view.generation;
        view.begin_refresh();
        let mut newer = make_snapshot();
        newer.unstaged.clear();
        view.apply_snapshot(old, newer);
        assert_eq!(view.snapshot.as_ref().unwrap().unstaged.len(), 2);
    }

    #[test]
    fn expanding_requests_diff_once_and_shows_placeholder() {
        let mut view = loaded_view();
        view.cursor = line_of(&view, "modified   a.rs");
        assert_eq!(view.toggle_at_cursor(), vec![unstaged("a.rs")]);
        assert_eq!(view.rendered.lines[view.cursor].kind, LineKind::Placeholder);

        // Re-rendering for an unrelated command does not request it again
        view.cursor = line_of(&view, "modified   b.rs");
        assert_eq!(view.toggle_at_cursor(), vec![unstaged("b.rs")]);
    }

    #[test]
    fn diff_arrival_keeps_cursor_on_file() {
        let mut view = loaded_view();
        expand_a(&mut view);
        assert_eq!(view.cursor, line_of(&view, "modified   a.rs"));
        assert!(view.rendered.lines.iter().any(|l| l.text == "@@ -1,3 +1,3 @@"));
    }

    #[test]
    fn diff_for_collapsed_file_does_not_expand_it() {
        let mut view = loaded_view();
        view.pending.insert(unstaged("b.rs"));
        view.apply_diff(view.generation, unstaged("b.rs"), diff_lines(A_DIFF)).unwrap();
        assert_eq!(view.expansion.file_expansion(&unstaged("b.rs")), Expansion::Collapsed);
        assert!(!view.rendered.lines.iter().any(|l| l.kind == LineKind::HunkHeader));
    }

    #[test]
    fn stale_diff_is_ignored() {
        let mut view = loaded_view();
        view.cursor = line_of(&view, "modified   a.rs");
        view.toggle_at_cursor();
        let old = view.generation;
        view.begin_refresh();
        view.apply_diff(old, unstaged("a.rs"), diff_lines(A_DIFF)).unwrap();
        assert!(view.diffs.is_empty());
    }

    #[test]
    fn failed_diff_clears_pending_and_errors() {
        let mut view = loaded_view();
        view.cursor = line_of(&view, "modified   a.rs");
        view.toggle_at_cursor();
        let err = view.apply_diff(view.generation, unstaged("a.rs"), Err(anyhow::anyhow!("boom")));
        assert!(err.is_err());
        assert!(view.pending.is_empty());
    }

    #[test]
    fn collapsing_evicts_cached_diff() {
        let mut view = loaded_view();
        expand_a(&mut view);
        assert!(view.diffs.contains_key(&unstaged("a.rs")));
        view.cursor = line_of(&view, "modified   a.rs");
        view.toggle_at_cursor();
        assert!(!view.diffs.contains_key(&unstaged("a.rs")));
    }

    #[test]
    fn snapshot_refetches_expanded_diffs_and_keeps_stale_copy() {
        let mut view = loaded_view();
        expand_a(&mut view);
        let generation = view.begin_refresh().unwrap();
        let keys = view.apply_snapshot(generation, make_snapshot());
        assert_eq!(keys, vec![unstaged("a.rs")]);
        assert!(view.diffs.contains_key(&unstaged("a.rs")));
        assert!(view.pending.contains(&unstaged("a.rs")));
    }

    #[test]
    fn cursor_follows_file_into_staged_section() {
        let mut view = loaded_view();
        view.cursor = line_of(&view, "modified   b.rs");
        let generation = view.begin_refresh().unwrap();
        let mut next = make_snapshot();
        next.unstaged.retain(|f| f.path != "b.rs");
        next.staged.push(file("b.rs", FileStatus::Modified));
        view.apply_snapshot(generation, next);
        // b.rs left the unstaged section: the nearest unstaged sibling wins
        assert_eq!(view.cursor, line_of(&view, "modified   a.rs"));
    }

    #[test]
    fn vanished_file_state_is_pruned() {
        let mut view = loaded_view();
        expand_a(&mut view);
        let generation = view.begin_refresh().unwrap();
        let mut next = make_snapshot();
        next.unstaged.retain(|f| f.path != "a.rs");
        view.apply_snapshot(generation, next);
        assert!(!view.expansion.files.contains_key(&unstaged("a.rs")));
        assert!(view.diffs.is_empty());
    }

    #[test]
    fn toggling_section_header_collapses_section() {
        let mut view = loaded_view();
        view.cursor = line_of(&view, "Unstaged changes (2)");
        view.toggle_at_cursor();
        assert!(view.expansion.section_collapsed(SectionKind::Unstaged));
        assert_eq!(view.cursor, line_of(&view, "Unstaged changes (2)"));
        assert!(!view.rendered.lines.iter().any(|l| l.text == "modified   a.rs"));
    }

    #[test]
    fn commit_toggle_shows_body() {
        let mut view = loaded_view();
        view.cursor = line_of(&view, "abcdef1 Initial");
        view.toggle_at_cursor();
        assert!(view.rendered.lines.iter().any(|l| l.text == "    details"));
    }

    #[test]
    fn initial_level_four_expands_everything() {
        let mut view = StatusView::new("/repo".into(), &EsConfig::default(), Some(VisibilityLevel::EVERYTHING));
        let generation = view.begin_refresh().unwrap();
        let keys = view.apply_snapshot(generation, make_snapshot());
        assert_eq!(keys.len(), 4);
        assert!(view.expansion.commit_expanded("abcdef1234"));
    }

    #[test]
    fn configured_sections_start_collapsed() {
        let mut config = EsConfig::default();
        config.status.collapsed_sections = vec!["recent".into()];
        let mut view = StatusView::new("/repo".into(), &config, None);
        let generation = view.begin_refresh().unwrap();
        view.apply_snapshot(generation, make_snapshot());
        assert!(view.expansion.section_collapsed(SectionKind::Recent));
    }

    #[test]
    fn section_level_only_touches_that_section() {
        let mut view = loaded_view();
        view.cursor = line_of(&view, "modified   a.rs");
        let keys = view.set_level(VisibilityLevel::DIFF_HEADERS, false);
        assert_eq!(keys, vec![unstaged("a.rs"), unstaged("b.rs")]);
        assert_eq!(
            view.expansion.file_expansion(&FileKey::new(SectionKind::Staged, "c.rs")),
            Expansion::Collapsed
        );
        assert_eq!(view.expansion.visibility_level, None);
    }

    #[test]
    fn hunk_toggle_in_full_file_switches_to_headers() {
        let mut view = loaded_view();
        view.cursor = line_of(&view, "modified   a.rs");
        view.expand_fully_at_cursor();
        view.apply_diff(view.generation, unstaged("a.rs"), diff_lines(A_DIFF)).unwrap();
        view.cursor = line_of(&view, "@@ -1,3 +1,3 @@");
        view.toggle_at_cursor();
        assert_eq!(view.expansion.file_expansion(&unstaged("a.rs")), Expansion::Headers);
        assert!(!view.expansion.hunk_expanded(&unstaged("a.rs"), 1));
    }

    #[test]
    fn navigation_between_sections() {
        let mut view = loaded_view();
        view.goto_top();
        view.next_section();
        assert_eq!(view.cursor, line_of(&view, "Untracked files (1)"));
        view.next_section();
        assert_eq!(view.cursor, line_of(&view, "Unstaged changes (2)"));
        view.prev_section();
        assert_eq!(view.cursor, line_of(&view, "Untracked files (1)"));
        view.goto_bottom();
        assert_eq!(view.cursor, view.rendered.len());
        view.move_by(5);
        assert_eq!(view.cursor, view.rendered.len());
        view.move_by(-1000);
        assert_eq!(view.cursor, 1);
    }

    #[test]
    fn ensure_visible_scrolls_both_ways() {
        let mut view = loaded_view();
        view.cursor = 10;
        view.ensure_visible(4);
        assert_eq!(view.scroll, 6);
        view.cursor = 2;
        view.ensure_visible(4);
        assert_eq!(view.scroll, 1);
    }

    // ── plan ──

    #[test]
    fn stage_file_under_cursor() {
        let mut view = loaded_view();
        view.cursor = line_of(&view, "modified   a.rs");
        let planned = view.plan(UserAction::Stage).unwrap();
        assert_eq!(planned.op, GitOp::StageFiles(vec!["a.rs".into()]));
        assert_eq!(planned.done_message(), "Staged a.rs");
        assert!(!planned.needs_confirm());
    }

    #[test]
    fn unstaging_unstaged_file_is_refused() {
        let mut view = loaded_view();
        view.cursor = line_of(&view, "modified   a.rs");
        assert_eq!(view.plan(UserAction::Unstage), Err("Not staged".to_string()));
    }

    #[test]
    fn stage_hunk_builds_full_patch() {
        let mut view = loaded_view();
        expand_a(&mut view);
        view.cursor = line_of(&view, "@@ -1,3 +1,3 @@");
        let planned = view.plan(UserAction::Stage).unwrap();
        match planned.op {
            GitOp::ApplyPatch { patch, action } => {
                assert_eq!(action, PatchAction::Stage);
                assert!(patch.starts_with("diff --git a/a.rs b/a.rs\n"));
                assert!(patch.ends_with(" tail\n"));
            }
            other => panic!("unexpected op {other:?}"),
        }
        assert_eq!(planned.target, "hunk 1 of a.rs");
    }

    #[test]
    fn visual_selection_builds_partial_patch() {
        let mut view = loaded_view();
        open_hunk_a(&mut view);
        // Select only "+new"
        view.cursor = line_of(&view, "+new");
        view.toggle_visual();
        let planned = view.plan(UserAction::Stage).unwrap();
        let GitOp::ApplyPatch { patch, .. } = planned.op else {
            panic!("expected a patch");
        };
        assert!(patch.contains("@@ -1,3 +1,4 @@\n keep\n old\n+new\n tail\n"));
        assert_eq!(planned.target, "1 line in a.rs");
    }

    #[test]
    fn visual_selection_of_context_only_is_no_changes() {
        let mut view = loaded_view();
        open_hunk_a(&mut view);
        view.cursor = line_of(&view, " keep");
        view.toggle_visual();
        assert_eq!(view.plan(UserAction::Stage), Err("No changes selected".to_string()));
    }

    #[test]
    fn discard_requires_confirmation() {
        let mut view = loaded_view();
        view.cursor = line_of(&view, "new.txt");
        let planned = view.plan(UserAction::Discard).unwrap();
        assert!(planned.needs_confirm());
        assert_eq!(planned.prompt(), "Discard new.txt? (y/n)");
        assert_eq!(
            planned.op,
            GitOp::DiscardFiles(vec![FileKey::new(SectionKind::Untracked, "new.txt")])
        );
    }

    #[test]
    fn staging_a_section_takes_every_file() {
        let mut view = loaded_view();
        view.cursor = line_of(&view, "Unstaged changes (2)");
        let planned = view.plan(UserAction::Stage).unwrap();
        assert_eq!(planned.op, GitOp::StageFiles(vec!["a.rs".into(), "b.rs".into()]));
        assert_eq!(planned.target, "2 files");
    }

    #[test]
    fn hunk_without_cached_diff_is_refused() {
        let mut view = loaded_view();
        expand_a(&mut view);
        view.cursor = line_of(&view, "@@ -1,3 +1,3 @@");
        view.diffs.clear();
        assert_eq!(view.plan(UserAction::Stage), Err("Diff not loaded yet".to_string()));
    }
}
