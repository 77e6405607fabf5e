//! Expansion state of the status view as a command-driven reducer.
//!
//! Every command is total: unknown keys are initialized on first reference
//! (files collapsed, sections expanded, commits collapsed).

use std::collections::{BTreeMap, HashMap};

use super::model::{FileKey, SectionKind};

/// How much of a file's diff is visible
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Expansion {
    #[default]
    Collapsed,
    /// Hunk headers visible; hunk bodies only where individually expanded
    Headers,
    Full,
}

impl Expansion {
    pub fn is_expanded(&self) -> bool {
        !matches!(self, Expansion::Collapsed)
    }
}

/// Sub-state kept while a containing section is collapsed
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Remembered {
    pub expanded: Expansion,
    pub hunks: BTreeMap<usize, bool>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct FileExpansion {
    pub expanded: Expansion,
    /// 1-based hunk index -> expanded; only read in `Headers` mode
    pub hunks: BTreeMap<usize, bool>,
    pub remembered: Option<Remembered>,
}

impl FileExpansion {
    pub fn hunk_expanded(&self, hunk_index: usize) -> bool {
        match self.expanded {
            Expansion::Collapsed => false,
            Expansion::Full => true,
            Expansion::Headers => self.hunks.get(&hunk_index).copied().unwrap_or(false),
        }
    }

    fn snapshot(&self) -> Remembered {
        Remembered {
            expanded: self.expanded,
            hunks: self.hunks.clone(),
        }
    }

    fn restore(&mut self, remembered: Remembered) {
        self.expanded = remembered.expanded;
        self.hunks = remembered.hunks;
        self.remembered = None;
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SectionState {
    pub collapsed: bool,
    pub remembered_files: Option<HashMap<FileKey, FileExpansion>>,
}

/// Coarse visibility override, 1 (headers only) through 4 (everything)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct VisibilityLevel(u8);

impl VisibilityLevel {
    pub const HEADERS: VisibilityLevel = VisibilityLevel(1);
    pub const ITEMS: VisibilityLevel = VisibilityLevel(2);
    pub const DIFF_HEADERS: VisibilityLevel = VisibilityLevel(3);
    pub const EVERYTHING: VisibilityLevel = VisibilityLevel(4);

    /// Clamp any integer into 1..=4
    pub fn new(level: u8) -> Self {
        VisibilityLevel(level.clamp(Self::HEADERS.0, Self::EVERYTHING.0))
    }

    pub fn get(&self) -> u8 {
        self.0
    }
}

/// What a visibility level applies to
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct VisibilityScope {
    pub sections: Vec<SectionKind>,
    pub files: Vec<FileKey>,
    pub commits: Vec<String>,
    pub global: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExpansionCommand {
    ToggleFileExpand(FileKey),
    ToggleHunkExpand(FileKey, usize),
    /// Collapse (or expand) one hunk of a fully expanded file by switching the
    /// file to headers mode with every other hunk expanded
    ToggleHunkInFullFile {
        key: FileKey,
        hunk_index: usize,
        hunk_count: usize,
    },
    ExpandFileFully(FileKey),
    ToggleCommitExpand(String),
    ToggleSectionCollapse {
        section: SectionKind,
        files: Vec<FileKey>,
    },
    SetVisibilityLevel {
        level: VisibilityLevel,
        scope: VisibilityScope,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ExpansionState {
    pub files: HashMap<FileKey, FileExpansion>,
    pub commits: HashMap<String, bool>,
    pub sections: HashMap<SectionKind, SectionState>,
    /// Last globally applied level, for display
    pub visibility_level: Option<VisibilityLevel>,
}

impl ExpansionState {
    pub fn apply(&mut self, command: ExpansionCommand) {
        match command {
            ExpansionCommand::ToggleFileExpand(key) => self.toggle_file(key),
            ExpansionCommand::ToggleHunkExpand(key, hunk_index) => {
                let entry = self.files.entry(key).or_default();
                if entry.expanded == Expansion::Headers {
                    let flag = entry.hunks.entry(hunk_index).or_insert(false);
                    *flag = !*flag;
                }
            }
            ExpansionCommand::ToggleHunkInFullFile {
                key,
                hunk_index,
                hunk_count,
            } => {
                let entry = self.files.entry(key).or_default();
                if entry.expanded == Expansion::Full {
                    entry.expanded = Expansion::Headers;
                    entry.hunks = (1..=hunk_count).map(|i| (i, i != hunk_index)).collect();
                }
            }
            ExpansionCommand::ExpandFileFully(key) => {
                let entry = self.files.entry(key).or_default();
                entry.expanded = Expansion::Full;
                entry.remembered = None;
            }
            ExpansionCommand::ToggleCommitExpand(hash) => {
                let flag = self.commits.entry(hash).or_insert(false);
                *flag = !*flag;
            }
            ExpansionCommand::ToggleSectionCollapse { section, files } => {
                self.toggle_section(section, files)
            }
            ExpansionCommand::SetVisibilityLevel { level, scope } => {
                self.set_visibility(level, scope)
            }
        }
    }

    pub fn file(&self, key: &FileKey) -> FileExpansion {
        self.files.get(key).cloned().unwrap_or_default()
    }

    pub fn file_expansion(&self, key: &FileKey) -> Expansion {
        self.files.get(key).map(|f| f.expanded).unwrap_or_default()
    }

    pub fn commit_expanded(&self, hash: &str) -> bool {
        self.commits.get(hash).copied().unwrap_or(false)
    }

    pub fn section_collapsed(&self, section: SectionKind) -> bool {
        self.sections.get(&section).map(|s| s.collapsed).unwrap_or(false)
    }

    /// Files whose current state shows any diff content
    pub fn expanded_files(&self) -> impl Iterator<Item = &FileKey> {
        self.files
            .iter()
            .filter(|(_, f)| f.expanded.is_expanded())
            .map(|(k, _)| k)
    }

    fn toggle_file(&mut self, key: FileKey) {
        let entry = self.files.entry(key).or_default();
        match entry.expanded {
            Expansion::Collapsed => match entry.remembered.take() {
                Some(remembered) => entry.restore(remembered),
                None => {
                    entry.expanded = Expansion::Headers;
                    entry.hunks.clear();
                }
            },
            Expansion::Headers | Expansion::Full => {
                entry.expanded = Expansion::Collapsed;
                entry.hunks.clear();
            }
        }
    }

    fn toggle_section(&mut self, section: SectionKind, files: Vec<FileKey>) {
        let state = self.sections.entry(section).or_default();
        if state.collapsed {
            state.collapsed = false;
            let remembered = state.remembered_files.take().unwrap_or_default();
            for (key, saved) in remembered {
                let entry = self.files.entry(key).or_default();
                entry.restore(saved.snapshot());
            }
        } else {
            state.collapsed = true;
            let mut remembered = HashMap::new();
            for key in files {
                let entry = self.files.entry(key.clone()).or_default();
                let saved = FileExpansion {
                    expanded: entry.expanded,
                    hunks: entry.hunks.clone(),
                    remembered: None,
                };
                entry.remembered = Some(entry.snapshot());
                entry.expanded = Expansion::Collapsed;
                entry.hunks.clear();
                remembered.insert(key, saved);
            }
            state.remembered_files = Some(remembered);
        }
    }

    fn set_visibility(&mut self, level: VisibilityLevel, scope: VisibilityScope) {
        let (section_collapsed, file_state, commit_state) = match level {
            VisibilityLevel::HEADERS => (true, Expansion::Collapsed, false),
            VisibilityLevel::ITEMS => (false, Expansion::Collapsed, false),
            VisibilityLevel::DIFF_HEADERS => (false, Expansion::Headers, false),
            _ => (false, Expansion::Full, true),
        };

        for section in scope.sections {
            let state = self.sections.entry(section).or_default();
            state.collapsed = section_collapsed;
            state.remembered_files = None;
        }
        for key in scope.files {
            let entry = self.files.entry(key).or_default();
            entry.expanded = file_state;
            entry.hunks.clear();
            entry.remembered = None;
        }
        for hash in scope.commits {
            self.commits.insert(hash, commit_state);
        }
        if scope.global {
            self.visibility_level = Some(level);
        }
    }
}

#[cfg(test)]
impl ExpansionState {
    /// Reducer form: command -> state -> state
    pub fn reduce(mut self, command: ExpansionCommand) -> Self {
        self.apply(command);
        self
    }

    pub fn hunk_expanded(&self, key: &FileKey, hunk_index: usize) -> bool {
        self.files
            .get(key)
            .map(|f| f.hunk_expanded(hunk_index))
            .unwrap_or(false)
    }
}
