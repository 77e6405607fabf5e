use std::collections::BTreeSet;

use super::cursor::{LineInfo, LineMap};
use super::model::{FileKey, SectionKind};

/// Lines picked inside one hunk, as 1-based display-line indices
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HunkSelection {
    pub key: FileKey,
    pub hunk_index: usize,
    pub indices: BTreeSet<usize>,
}

/// What a stage/unstage/discard under the cursor applies to
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ActionTarget {
    Section(SectionKind),
    File(FileKey),
    Hunk { key: FileKey, hunk_index: usize },
    Lines(HunkSelection),
}

/// Target of an action with no visual selection. A diff line acts on its
/// whole hunk.
pub fn target_at(line_map: &LineMap, line: usize) -> Option<ActionTarget> {
    match line_map.get(&line)? {
        LineInfo::Section { section } => Some(ActionTarget::Section(*section)),
        LineInfo::File { section, path } => Some(ActionTarget::File(FileKey::new(*section, path))),
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
        } => Some(ActionTarget::Hunk {
            key: FileKey::new(*section, path),
            hunk_index: *hunk_index,
        }),
        LineInfo::Submodule { path } => Some(ActionTarget::File(FileKey::new(
            SectionKind::Submodules,
            path,
        ))),
        _ => None,
    }
}

/// Map a visual range (inclusive, either order) to the selected lines of
/// the first hunk it touches. Lines of other hunks are ignored.
///
/// `None` when the range covers no diff content lines.
pub fn visual_selection(line_map: &LineMap, start: usize, end: usize) -> Option<HunkSelection> {
    let (lo, hi) = if start <= end { (start, end) } else { (end, start) };

    let mut selection: Option<HunkSelection> = None;
    for info in line_map.range(lo..=hi).map(|(_, info)| info) {
        let (section, path, hunk_index, display_index, is_content) = match info {
            LineInfo::HunkHeader {
                section,
                path,
                hunk_index,
                display_index,
            } => (*section, path, *hunk_index, *display_index, false),
            LineInfo::DiffLine {
                section,
                path,
                hunk_index,
                display_index,
            } => (*section, path, *hunk_index, *display_index, true),
            _ => continue,
        };

        let current = selection.get_or_insert_with(|| HunkSelection {
            key: FileKey::new(section, path),
            hunk_index,
            indices: BTreeSet::new(),
        });
        if current.key.section != section || current.key.path != *path || current.hunk_index != hunk_index {
            continue;
        }
        if is_content {
            current.indices.insert(display_index);
        }
    }

    selection.filter(|s| !s.indices.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn diff_line(path: &str, hunk_index: usize, display_index: usize) -> LineInfo {
        LineInfo::DiffLine {
            section: SectionKind::Unstaged,
            path: path.into(),
            hunk_index,
            display_index,
        }
    }

    fn hunk_header(path: &str, hunk_index: usize, display_index: usize) -> LineInfo {
        LineInfo::HunkHeader {
            section: SectionKind::Unstaged,
            path: path.into(),
            hunk_index,
            display_index,
        }
    }

    /// Unstaged section with a.rs expanded: hunk 1 (3 lines), hunk 2 (2 lines)
    fn make_map() -> LineMap {
        let mut map = LineMap::new();
        map.insert(1, LineInfo::Section { section: SectionKind::Unstaged });
        map.insert(2, LineInfo::File { section: SectionKind::Unstaged, path: "a.rs".into() });
        map.insert(3, hunk_header("a.rs", 1, 1));
        map.insert(4, diff_line("a.rs", 1, 2));
        map.insert(5, diff_line("a.rs", 1, 3));
        map.insert(6, diff_line("a.rs", 1, 4));
        map.insert(7, hunk_header("a.rs", 2, 5));
        map.insert(8, diff_line("a.rs", 2, 6));
        map.insert(9, diff_line("a.rs", 2, 7));
        map
    }

    fn indices(values: &[usize]) -> BTreeSet<usize> {
        values.iter().copied().collect()
    }

    #[test]
    fn range_inside_one_hunk() {
        let sel = visual_selection(&make_map(), 4, 5).unwrap();
        assert_eq!(sel.key, FileKey::new(SectionKind::Unstaged, "a.rs"));
        assert_eq!(sel.hunk_index, 1);
        assert_eq!(sel.indices, indices(&[2, 3]));
    }

    #[test]
    fn reversed_range_is_normalized() {
        assert_eq!(visual_selection(&make_map(), 5, 4), visual_selection(&make_map(), 4, 5));
    }

    #[test]
    fn range_spanning_hunks_keeps_first() {
        let sel = visual_selection(&make_map(), 5, 9).unwrap();
        assert_eq!(sel.hunk_index, 1);
        assert_eq!(sel.indices, indices(&[3, 4]));
    }

    #[test]
    fn range_starting_on_header_includes_its_lines() {
        let sel = visual_selection(&make_map(), 7, 8).unwrap();
        assert_eq!(sel.hunk_index, 2);
        assert_eq!(sel.indices, indices(&[6]));
    }

    #[test]
    fn range_without_content_lines_is_none() {
        assert_eq!(visual_selection(&make_map(), 1, 3), None);
        assert_eq!(visual_selection(&make_map(), 20, 30), None);
    }

    #[test]
    fn target_of_diff_line_is_its_hunk() {
        assert_eq!(
            target_at(&make_map(), 8),
            Some(ActionTarget::Hunk {
                key: FileKey::new(SectionKind::Unstaged, "a.rs"),
                hunk_index: 2,
            })
        );
    }

    #[test]
    fn target_of_file_and_section() {
        assert_eq!(
            target_at(&make_map(), 2),
            Some(ActionTarget::File(FileKey::new(SectionKind::Unstaged, "a.rs")))
        );
        assert_eq!(target_at(&make_map(), 1), Some(ActionTarget::Section(SectionKind::Unstaged)));
        assert_eq!(target_at(&make_map(), 42), None);
    }
}
