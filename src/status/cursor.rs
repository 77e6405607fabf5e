//! Keeping the cursor on the same thing across re-renders.
//!
//! Before a render, [`capture`] records what the cursor points at in terms of
//! files, hunks and commits. After the render, [`resolve`] finds that thing
//! (or the closest surviving relative) in the new line map.

use serde::Serialize;
use std::collections::BTreeMap;

use super::model::SectionKind;

/// What a rendered line stands for
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum LineInfo {
    Section {
        section: SectionKind,
    },
    File {
        section: SectionKind,
        path: String,
    },
    HunkHeader {
        section: SectionKind,
        path: String,
        hunk_index: usize,
        /// 1-based index into the document's display lines
        display_index: usize,
    },
    DiffLine {
        section: SectionKind,
        path: String,
        hunk_index: usize,
        display_index: usize,
    },
    Commit {
        section: SectionKind,
        hash: String,
    },
    Stash {
        stash_ref: String,
    },
    Submodule {
        path: String,
    },
    Worktree {
        path: String,
    },
    RebaseCommit {
        hash: String,
    },
}

impl LineInfo {
    pub fn section(&self) -> SectionKind {
        match self {
            LineInfo::Section { section }
            | LineInfo::File { section, .. }
            | LineInfo::HunkHeader { section, .. }
            | LineInfo::DiffLine { section, .. }
            | LineInfo::Commit { section, .. } => *section,
            LineInfo::Stash { .. } => SectionKind::Stashes,
            LineInfo::Submodule { .. } => SectionKind::Submodules,
            LineInfo::Worktree { .. } => SectionKind::Worktrees,
            LineInfo::RebaseCommit { .. } => SectionKind::Rebase,
        }
    }

    /// Top-level items of a section (not section headers, hunks or diff lines)
    pub fn is_item(&self) -> bool {
        !matches!(
            self,
            LineInfo::Section { .. } | LineInfo::HunkHeader { .. } | LineInfo::DiffLine { .. }
        )
    }

    fn in_hunk(&self, want_section: SectionKind, want_path: &str, want_hunk: usize) -> bool {
        match self {
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
            } => *section == want_section && path == want_path && *hunk_index == want_hunk,
            _ => false,
        }
    }
}

/// 1-based output line -> what it shows
pub type LineMap = BTreeMap<usize, LineInfo>;

/// 1-based output line -> section whose header sits there
pub type SectionHeaderMap = BTreeMap<usize, SectionKind>;

/// Render-independent description of the cursor target
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CursorIdentity {
    Section {
        section: SectionKind,
    },
    File {
        section: SectionKind,
        path: String,
    },
    HunkHeader {
        section: SectionKind,
        path: String,
        hunk_index: usize,
    },
    DiffLine {
        section: SectionKind,
        path: String,
        hunk_index: usize,
        offset: usize,
    },
    Commit {
        section: SectionKind,
        hash: String,
    },
    Stash {
        stash_ref: String,
    },
    Submodule {
        path: String,
    },
    Worktree {
        path: String,
    },
    RebaseCommit {
        hash: String,
    },
    Fallback {
        raw_line: usize,
    },
}

impl CursorIdentity {
    fn section(&self) -> Option<SectionKind> {
        match self {
            CursorIdentity::Section { section }
            | CursorIdentity::File { section, .. }
            | CursorIdentity::HunkHeader { section, .. }
            | CursorIdentity::DiffLine { section, .. }
            | CursorIdentity::Commit { section, .. } => Some(*section),
            CursorIdentity::Stash { .. } => Some(SectionKind::Stashes),
            CursorIdentity::Submodule { .. } => Some(SectionKind::Submodules),
            CursorIdentity::Worktree { .. } => Some(SectionKind::Worktrees),
            CursorIdentity::RebaseCommit { .. } => Some(SectionKind::Rebase),
            CursorIdentity::Fallback { .. } => None,
        }
    }
}

/// Identity plus the raw line it was captured on
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CapturedCursor {
    pub identity: CursorIdentity,
    pub line: usize,
}

/// Describe what `line` shows in the current render
pub fn capture(line_map: &LineMap, headers: &SectionHeaderMap, line: usize) -> CapturedCursor {
    if let Some(section) = headers.get(&line) {
        return CapturedCursor {
            identity: CursorIdentity::Section { section: *section },
            line,
        };
    }

    let identity = match line_map.get(&line) {
        None => CursorIdentity::Fallback { raw_line: line },
        Some(LineInfo::Section { section }) => CursorIdentity::Section { section: *section },
        Some(LineInfo::File { section, path }) => CursorIdentity::File {
            section: *section,
            path: path.clone(),
        },
        Some(LineInfo::HunkHeader {
            section,
            path,
            hunk_index,
            ..
        }) => CursorIdentity::HunkHeader {
            section: *section,
            path: path.clone(),
            hunk_index: *hunk_index,
        },
        Some(LineInfo::DiffLine {
            section,
            path,
            hunk_index,
            ..
        }) => CursorIdentity::DiffLine {
            section: *section,
            path: path.clone(),
            hunk_index: *hunk_index,
            offset: offset_from_hunk_header(line_map, line, *section, path, *hunk_index),
        },
        Some(LineInfo::Commit { section, hash }) => CursorIdentity::Commit {
            section: *section,
            hash: hash.clone(),
        },
        Some(LineInfo::Stash { stash_ref }) => CursorIdentity::Stash {
            stash_ref: stash_ref.clone(),
        },
        Some(LineInfo::Submodule { path }) => CursorIdentity::Submodule { path: path.clone() },
        Some(LineInfo::Worktree { path }) => CursorIdentity::Worktree { path: path.clone() },
        Some(LineInfo::RebaseCommit { hash }) => CursorIdentity::RebaseCommit { hash: hash.clone() },
    };

    CapturedCursor { identity, line }
}

/// Distance from `line` up to its hunk header. If the header is missing, the
/// distance up to the first line outside the hunk is used instead.
fn offset_from_hunk_header(
    line_map: &LineMap,
    line: usize,
    section: SectionKind,
    path: &str,
    hunk_index: usize,
) -> usize {
    let mut current = line;
    while current > 1 {
        current -= 1;
        match line_map.get(&current) {
            Some(info @ LineInfo::HunkHeader { .. }) if info.in_hunk(section, path, hunk_index) => {
                return line - current;
            }
            Some(info) if info.in_hunk(section, path, hunk_index) => continue,
            _ => return line - current,
        }
    }
    line - current
}

/// Find the best line for `captured` in a freshly rendered line map.
///
/// Tries, in order: the same entity; the owning file of a hunk or diff line;
/// the nearest item of the same section; the same path or commit in any
/// section; the section's header; the nearest section header; the first
/// mapped line. Returns `None` only when `line_map` is empty.
pub fn resolve(
    captured: &CapturedCursor,
    line_map: &LineMap,
    headers: &SectionHeaderMap,
) -> Option<usize> {
    if line_map.is_empty() {
        return None;
    }

    let identity = &captured.identity;

    if let Some(line) = exact_match(identity, line_map, headers) {
        return Some(line);
    }

    if let CursorIdentity::HunkHeader { section, path, .. }
    | CursorIdentity::DiffLine { section, path, .. } = identity
    {
        if let Some(line) = find_file(line_map, Some(*section), path) {
            return Some(line);
        }
    }

    if let Some(section) = identity.section() {
        if let Some(line) = nearest_item_in_section(line_map, section, captured.line) {
            return Some(line);
        }
    }

    if let Some(line) = same_entity_any_section(identity, line_map) {
        return Some(line);
    }

    if let Some(section) = identity.section() {
        if let Some(line) = header_line(headers, section) {
            return Some(line);
        }
    }

    if let Some(line) = nearest_header(headers, captured.line) {
        return Some(line);
    }

    tracing::debug!(?identity, "cursor fell back to first mapped line");
    line_map.keys().next().copied()
}

fn exact_match(
    identity: &CursorIdentity,
    line_map: &LineMap,
    headers: &SectionHeaderMap,
) -> Option<usize> {
    match identity {
        CursorIdentity::Section { section } => header_line(headers, *section),
        CursorIdentity::File { section, path } => find_file(line_map, Some(*section), path),
        CursorIdentity::HunkHeader {
            section,
            path,
            hunk_index,
        } => find_hunk_header(line_map, *section, path, *hunk_index),
        CursorIdentity::DiffLine {
            section,
            path,
            hunk_index,
            offset,
        } => {
            let header = find_hunk_header(line_map, *section, path, *hunk_index)?;
            let mut last = header;
            while line_map
                .get(&(last + 1))
                .is_some_and(|info| info.in_hunk(*section, path, *hunk_index))
            {
                last += 1;
            }
            Some((header + offset).min(last))
        }
        CursorIdentity::Commit { section, hash } => find_line(line_map, |info| {
            matches!(info, LineInfo::Commit { section: s, hash: h } if s == section && h == hash)
        }),
        CursorIdentity::Stash { stash_ref } => find_line(line_map, |info| {
            matches!(info, LineInfo::Stash { stash_ref: r } if r == stash_ref)
        }),
        CursorIdentity::Submodule { path } => find_line(line_map, |info| {
            matches!(info, LineInfo::Submodule { path: p } if p == path)
        }),
        CursorIdentity::Worktree { path } => find_line(line_map, |info| {
            matches!(info, LineInfo::Worktree { path: p } if p == path)
        }),
        CursorIdentity::RebaseCommit { hash } => find_line(line_map, |info| {
            matches!(info, LineInfo::RebaseCommit { hash: h } if h == hash)
        }),
        CursorIdentity::Fallback { .. } => None,
    }
}

fn find_line(line_map: &LineMap, pred: impl Fn(&LineInfo) -> bool) -> Option<usize> {
    line_map
        .iter()
        .find(|(_, info)| pred(info))
        .map(|(line, _)| *line)
}

fn find_file(line_map: &LineMap, section: Option<SectionKind>, path: &str) -> Option<usize> {
    find_line(line_map, |info| match info {
        LineInfo::File { section: s, path: p } => p == path && section.map_or(true, |want| *s == want),
        _ => false,
    })
}

fn find_hunk_header(
    line_map: &LineMap,
    section: SectionKind,
    path: &str,
    hunk_index: usize,
) -> Option<usize> {
    find_line(line_map, |info| {
        matches!(info, LineInfo::HunkHeader { .. }) && info.in_hunk(section, path, hunk_index)
    })
}

/// Closest item of `section` to `origin`; ties go to the smaller line
fn nearest_item_in_section(line_map: &LineMap, section: SectionKind, origin: usize) -> Option<usize> {
    line_map
        .iter()
        .filter(|(_, info)| info.is_item() && info.section() == section)
        .map(|(line, _)| *line)
        .min_by_key(|line| (line.abs_diff(origin), *line))
}

fn same_entity_any_section(identity: &CursorIdentity, line_map: &LineMap) -> Option<usize> {
    match identity {
        CursorIdentity::File { path, .. }
        | CursorIdentity::HunkHeader { path, .. }
        | CursorIdentity::DiffLine { path, .. } => find_file(line_map, None, path),
        CursorIdentity::Commit { hash, .. } | CursorIdentity::RebaseCommit { hash } => {
            find_line(line_map, |info| match info {
                LineInfo::Commit { hash: h, .. } | LineInfo::RebaseCommit { hash: h } => h == hash,
                _ => false,
            })
        }
        _ => None,
    }
}

fn header_line(headers: &SectionHeaderMap, section: SectionKind) -> Option<usize> {
    headers
        .iter()
        .find(|(_, s)| **s == section)
        .map(|(line, _)| *line)
}

fn nearest_header(headers: &SectionHeaderMap, origin: usize) -> Option<usize> {
    let origin = origin.max(1);
    headers
        .keys()
        .copied()
        .min_by_key(|line| (line.abs_diff(origin), *line))
}
