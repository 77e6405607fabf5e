use serde::Serialize;
use std::fmt;

/// A named grouping of status-view content
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SectionKind {
    Rebase,
    Untracked,
    Conflicted,
    Unstaged,
    Staged,
    Stashes,
    UnpulledUpstream,
    UnpushedUpstream,
    UnpulledPushRemote,
    UnpushedPushRemote,
    Recent,
    Submodules,
    Worktrees,
}

impl SectionKind {
    /// Render order, top to bottom
    pub const ALL: [SectionKind; 13] = [
        SectionKind::Rebase,
        SectionKind::Untracked,
        SectionKind::Conflicted,
        SectionKind::Unstaged,
        SectionKind::Staged,
        SectionKind::Stashes,
        SectionKind::UnpulledUpstream,
        SectionKind::UnpushedUpstream,
        SectionKind::UnpulledPushRemote,
        SectionKind::UnpushedPushRemote,
        SectionKind::Recent,
        SectionKind::Submodules,
        SectionKind::Worktrees,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            SectionKind::Rebase => "rebase",
            SectionKind::Untracked => "untracked",
            SectionKind::Conflicted => "conflicted",
            SectionKind::Unstaged => "unstaged",
            SectionKind::Staged => "staged",
            SectionKind::Stashes => "stashes",
            SectionKind::UnpulledUpstream => "unpulled_upstream",
            SectionKind::UnpushedUpstream => "unpushed_upstream",
            SectionKind::UnpulledPushRemote => "unpulled_pushremote",
            SectionKind::UnpushedPushRemote => "unpushed_pushremote",
            SectionKind::Recent => "recent",
            SectionKind::Submodules => "submodule",
            SectionKind::Worktrees => "worktrees",
        }
    }

    pub fn from_name(name: &str) -> Option<SectionKind> {
        SectionKind::ALL.into_iter().find(|s| s.as_str() == name)
    }

    /// Sections whose items are files with diffs
    pub fn has_file_diffs(&self) -> bool {
        matches!(
            self,
            SectionKind::Untracked
                | SectionKind::Conflicted
                | SectionKind::Unstaged
                | SectionKind::Staged
        )
    }

    /// Sections whose items are commits
    pub fn has_commits(&self) -> bool {
        matches!(
            self,
            SectionKind::UnpulledUpstream
                | SectionKind::UnpushedUpstream
                | SectionKind::UnpulledPushRemote
                | SectionKind::UnpushedPushRemote
                | SectionKind::Recent
        )
    }
}

impl fmt::Display for SectionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Identity of an expandable file: `"<section>:<path>"`.
/// Submodule pseudo-diffs use the `submodule` section.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct FileKey {
    pub section: SectionKind,
    pub path: String,
}

impl FileKey {
    pub fn new(section: SectionKind, path: impl Into<String>) -> Self {
        Self {
            section,
            path: path.into(),
        }
    }
}

impl fmt::Display for FileKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.section, self.path)
    }
}

/// File change status in git
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FileStatus {
    Added,
    Modified,
    Deleted,
    Renamed(String), // old path
    Copied(String),
    TypeChanged,
    Untracked,
    Conflicted,
}

impl FileStatus {
    pub fn label(&self) -> &'static str {
        match self {
            FileStatus::Added => "new file",
            FileStatus::Modified => "modified",
            FileStatus::Deleted => "deleted",
            FileStatus::Renamed(_) => "renamed",
            FileStatus::Copied(_) => "copied",
            FileStatus::TypeChanged => "typechange",
            FileStatus::Untracked => "",
            FileStatus::Conflicted => "unmerged",
        }
    }

    /// Map a porcelain status letter (`M`, `A`, `D`, ...) to a status
    pub fn from_code(code: char, orig_path: Option<&str>) -> Option<FileStatus> {
        let status = match code {
            'M' => FileStatus::Modified,
            'A' => FileStatus::Added,
            'D' => FileStatus::Deleted,
            'T' => FileStatus::TypeChanged,
            'R' => FileStatus::Renamed(orig_path.unwrap_or_default().to_string()),
            'C' => FileStatus::Copied(orig_path.unwrap_or_default().to_string()),
            'U' => FileStatus::Conflicted,
            _ => return None,
        };
        Some(status)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileEntry {
    pub path: String,
    pub orig_path: Option<String>,
    pub status: FileStatus,
}

impl FileEntry {
    /// Paths a whole-file operation has to touch. A rename brings its source
    /// along, otherwise the source's deletion stays behind in the index.
    pub fn touched_paths(&self) -> Vec<String> {
        match &self.status {
            FileStatus::Renamed(orig) if !orig.is_empty() && *orig != self.path => {
                vec![self.path.clone(), orig.clone()]
            }
            _ => vec![self.path.clone()],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommitEntry {
    pub hash: String,
    pub short_hash: String,
    pub subject: String,
    pub body: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StashEntry {
    /// e.g. `stash@{0}`
    pub stash_ref: String,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubmoduleEntry {
    pub path: String,
    pub oid: String,
    /// Leading flag of `git submodule status`: ' ', '+', '-' or 'U'
    pub state: char,
    pub describe: Option<String>,
}

/// A git worktree entry
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorktreeEntry {
    pub path: String,
    pub branch: String,
}

/// One line of an in-progress rebase todo list
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RebaseEntry {
    pub action: String,
    pub hash: String,
    pub subject: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HeadInfo {
    /// None when detached
    pub branch: Option<String>,
    /// None before the first commit
    pub oid: Option<String>,
    pub upstream: Option<String>,
    pub push_remote: Option<String>,
    pub ahead: usize,
    pub behind: usize,
}

/// Everything the status view shows, fetched in one refresh
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StatusSnapshot {
    pub head: HeadInfo,
    pub untracked: Vec<FileEntry>,
    pub unstaged: Vec<FileEntry>,
    pub staged: Vec<FileEntry>,
    pub conflicted: Vec<FileEntry>,
    pub stashes: Vec<StashEntry>,
    pub unpulled_upstream: Vec<CommitEntry>,
    pub unpushed_upstream: Vec<CommitEntry>,
    pub unpulled_push_remote: Vec<CommitEntry>,
    pub unpushed_push_remote: Vec<CommitEntry>,
    pub recent: Vec<CommitEntry>,
    pub submodules: Vec<SubmoduleEntry>,
    pub worktrees: Vec<WorktreeEntry>,
    pub rebase: Vec<RebaseEntry>,
}

impl StatusSnapshot {
    pub fn files(&self, section: SectionKind) -> &[FileEntry] {
        match section {
            SectionKind::Untracked => &self.untracked,
            SectionKind::Unstaged => &self.unstaged,
            SectionKind::Staged => &self.staged,
            SectionKind::Conflicted => &self.conflicted,
            _ => &[],
        }
    }

    pub fn commits(&self, section: SectionKind) -> &[CommitEntry] {
        match section {
            SectionKind::UnpulledUpstream => &self.unpulled_upstream,
            SectionKind::UnpushedUpstream => &self.unpushed_upstream,
            SectionKind::UnpulledPushRemote => &self.unpulled_push_remote,
            SectionKind::UnpushedPushRemote => &self.unpushed_push_remote,
            SectionKind::Recent => &self.recent,
            _ => &[],
        }
    }

    /// Number of items a section would list
    pub fn item_count(&self, section: SectionKind) -> usize {
        match section {
            SectionKind::Rebase => self.rebase.len(),
            SectionKind::Stashes => self.stashes.len(),
            SectionKind::Submodules => self.submodules.len(),
            SectionKind::Worktrees => self.worktrees.len(),
            s if s.has_file_diffs() => self.files(s).len(),
            s => self.commits(s).len(),
        }
    }

    /// Keys of every expandable file-like entry, submodules included
    pub fn file_keys(&self) -> Vec<FileKey> {
        let mut keys = Vec::new();
        for section in SectionKind::ALL {
            if section.has_file_diffs() {
                keys.extend(self.files(section).iter().map(|f| FileKey::new(section, &f.path)));
            }
        }
        keys.extend(
            self.submodules
                .iter()
                .map(|s| FileKey::new(SectionKind::Submodules, &s.path)),
        );
        keys
    }

    /// Keys of the expandable entries in one section
    pub fn section_file_keys(&self, section: SectionKind) -> Vec<FileKey> {
        if section == SectionKind::Submodules {
            return self
                .submodules
                .iter()
                .map(|s| FileKey::new(section, &s.path))
                .collect();
        }
        self.files(section)
            .iter()
            .map(|f| FileKey::new(section, &f.path))
            .collect()
    }

    pub fn file(&self, key: &FileKey) -> Option<&FileEntry> {
        self.files(key.section).iter().find(|f| f.path == key.path)
    }

    /// Source path of a renamed or copied entry
    pub fn orig_path(&self, key: &FileKey) -> Option<&str> {
        self.file(key)?.orig_path.as_deref()
    }

    /// Hashes across every commit-list section
    pub fn commit_hashes(&self) -> impl Iterator<Item = &str> {
        SectionKind::ALL
            .into_iter()
            .filter(|s| s.has_commits())
            .flat_map(move |s| self.commits(s).iter().map(|c| c.hash.as_str()))
    }
}
