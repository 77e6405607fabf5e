use serde::Serialize;

use super::cursor::{LineInfo, LineMap, SectionHeaderMap};
use super::expansion::{Expansion, ExpansionState};
use super::model::{FileEntry, FileKey, FileStatus, SectionKind, StatusSnapshot};
use super::DiffCache;

/// Expanded / collapsed glyph for a line
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Sign {
    Expanded,
    Collapsed,
}

impl Sign {
    fn from_flag(expanded: bool) -> Self {
        if expanded {
            Sign::Expanded
        } else {
            Sign::Collapsed
        }
    }

    pub fn glyph(&self) -> &'static str {
        match self {
            Sign::Expanded => "▾",
            Sign::Collapsed => "▸",
        }
    }
}

/// Styling class of a rendered line
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LineKind {
    Blank,
    HeadInfo,
    SectionHeader,
    File(FileStatus),
    HunkHeader,
    Added,
    Removed,
    Context,
    /// "\ No newline at end of file"
    Marker,
    Commit,
    CommitBody,
    Stash,
    Submodule,
    SubmoduleDetail,
    Worktree,
    RebaseCommit,
    Placeholder,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DisplayLine {
    pub text: String,
    pub kind: LineKind,
    pub sign: Option<Sign>,
}

/// Output of a render: lines plus what each line means
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RenderedStatus {
    pub lines: Vec<DisplayLine>,
    pub line_map: LineMap,
    pub section_headers: SectionHeaderMap,
}

impl RenderedStatus {
    pub fn len(&self) -> usize {
        self.lines.len()
    }

    /// Info for a 1-based line
    pub fn info(&self, line: usize) -> Option<&LineInfo> {
        self.line_map.get(&line)
    }

    /// Section a 1-based line belongs to: its own, or the closest header above it
    pub fn section_at(&self, line: usize) -> Option<SectionKind> {
        if let Some(info) = self.line_map.get(&line) {
            return Some(info.section());
        }
        self.section_headers
            .range(..=line)
            .next_back()
            .map(|(_, section)| *section)
    }

    fn push(&mut self, text: String, kind: LineKind, sign: Option<Sign>, info: Option<LineInfo>) {
        self.lines.push(DisplayLine { text, kind, sign });
        let line = self.lines.len();
        if let Some(info) = info {
            if let LineInfo::Section { section } = info {
                self.section_headers.insert(line, section);
            }
            self.line_map.insert(line, info);
        }
    }

    fn blank(&mut self) {
        self.push(String::new(), LineKind::Blank, None, None);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RenderOptions {
    pub show_counts: bool,
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self { show_counts: true }
    }
}

/// Derive display lines and line maps from a snapshot and expansion state.
/// Pure: the same inputs always render the same output.
pub fn render(
    snapshot: &StatusSnapshot,
    expansion: &ExpansionState,
    diffs: &DiffCache,
    options: RenderOptions,
) -> RenderedStatus {
    let mut out = RenderedStatus::default();

    render_head(&mut out, snapshot);

    for section in SectionKind::ALL {
        let count = snapshot.item_count(section);
        if count == 0 {
            continue;
        }

        let collapsed = expansion.section_collapsed(section);
        let title = section_title(section, snapshot);
        let text = if options.show_counts {
            format!("{title} ({count})")
        } else {
            title
        };
        out.push(
            text,
            LineKind::SectionHeader,
            Some(Sign::from_flag(!collapsed)),
            Some(LineInfo::Section { section }),
        );

        if !collapsed {
            render_items(&mut out, section, snapshot, expansion, diffs);
        }
        out.blank();
    }

    // Drop the trailing separator
    if out.lines.last().is_some_and(|l| l.kind == LineKind::Blank) {
        out.lines.pop();
    }

    out
}

fn render_head(out: &mut RenderedStatus, snapshot: &StatusSnapshot) {
    let head = &snapshot.head;
    let branch = head.branch.as_deref().unwrap_or("(detached)");
    let subject = snapshot
        .recent
        .first()
        .map(|c| c.subject.as_str())
        .unwrap_or("");
    let oid = head
        .oid
        .as_deref()
        .map(|o| o.chars().take(7).collect::<String>())
        .unwrap_or_else(|| "(initial)".to_string());
    out.push(
        format!("Head:     {branch} {oid} {subject}").trim_end().to_string(),
        LineKind::HeadInfo,
        None,
        None,
    );

    if let Some(ref upstream) = head.upstream {
        let ab = match (head.ahead, head.behind) {
            (0, 0) => String::new(),
            (a, b) => format!(" [+{a}/-{b}]"),
        };
        out.push(format!("Merge:    {upstream}{ab}"), LineKind::HeadInfo, None, None);
    }
    if let Some(ref push) = head.push_remote {
        if head.upstream.as_ref() != Some(push) {
            out.push(format!("Push:     {push}"), LineKind::HeadInfo, None, None);
        }
    }
    out.blank();
}

fn section_title(section: SectionKind, snapshot: &StatusSnapshot) -> String {
    let upstream = snapshot.head.upstream.as_deref().unwrap_or("upstream");
    let push = snapshot.head.push_remote.as_deref().unwrap_or("push-remote");
    match section {
        SectionKind::Rebase => "Rebasing".to_string(),
        SectionKind::Untracked => "Untracked files".to_string(),
        SectionKind::Conflicted => "Unmerged paths".to_string(),
        SectionKind::Unstaged => "Unstaged changes".to_string(),
        SectionKind::Staged => "Staged changes".to_string(),
        SectionKind::Stashes => "Stashes".to_string(),
        SectionKind::UnpulledUpstream => format!("Unpulled from {upstream}"),
        SectionKind::UnpushedUpstream => format!("Unpushed to {upstream}"),
        SectionKind::UnpulledPushRemote => format!("Unpulled from {push}"),
        SectionKind::UnpushedPushRemote => format!("Unpushed to {push}"),
        SectionKind::Recent => "Recent commits".to_string(),
        SectionKind::Submodules => "Submodules".to_string(),
        SectionKind::Worktrees => "Worktrees".to_string(),
    }
}

fn render_items(
    out: &mut RenderedStatus,
    section: SectionKind,
    snapshot: &StatusSnapshot,
    expansion: &ExpansionState,
    diffs: &DiffCache,
) {
    match section {
        SectionKind::Rebase => {
            for entry in &snapshot.rebase {
                let short: String = entry.hash.chars().take(7).collect();
                out.push(
                    format!("{} {} {}", entry.action, short, entry.subject),
                    LineKind::RebaseCommit,
                    None,
                    Some(LineInfo::RebaseCommit {
                        hash: entry.hash.clone(),
                    }),
                );
            }
        }
        SectionKind::Stashes => {
            for stash in &snapshot.stashes {
                out.push(
                    format!("{} {}", stash.stash_ref, stash.message),
                    LineKind::Stash,
                    None,
                    Some(LineInfo::Stash {
                        stash_ref: stash.stash_ref.clone(),
                    }),
                );
            }
        }
        SectionKind::Submodules => {
            for sub in &snapshot.submodules {
                let key = FileKey::new(section, &sub.path);
                let expanded = expansion.file_expansion(&key).is_expanded();
                let info = LineInfo::Submodule {
                    path: sub.path.clone(),
                };
                let describe = sub
                    .describe
                    .as_deref()
                    .map(|d| format!(" ({d})"))
                    .unwrap_or_default();
                out.push(
                    format!("{}{}", sub.path, describe),
                    LineKind::Submodule,
                    Some(Sign::from_flag(expanded)),
                    Some(info.clone()),
                );
                if expanded {
                    match diffs.get(&key) {
                        Some(doc) if doc.header_lines.is_empty() => {
                            out.push("    (no changes)".into(), LineKind::Placeholder, None, Some(info))
                        }
                        Some(doc) => {
                            for line in &doc.header_lines {
                                out.push(
                                    format!("    {line}"),
                                    LineKind::SubmoduleDetail,
                                    None,
                                    Some(info.clone()),
                                );
                            }
                        }
                        None => out.push("    loading…".into(), LineKind::Placeholder, None, None),
                    }
                }
            }
        }
        SectionKind::Worktrees => {
            for wt in &snapshot.worktrees {
                out.push(
                    format!("{:<20} {}", wt.branch, wt.path),
                    LineKind::Worktree,
                    None,
                    Some(LineInfo::Worktree {
                        path: wt.path.clone(),
                    }),
                );
            }
        }
        s if s.has_file_diffs() => {
            for file in snapshot.files(s) {
                render_file(out, s, file, expansion, diffs);
            }
        }
        s => {
            for commit in snapshot.commits(s) {
                let expanded = expansion.commit_expanded(&commit.hash);
                let info = LineInfo::Commit {
                    section: s,
                    hash: commit.hash.clone(),
                };
                let sign = (!commit.body.is_empty()).then(|| Sign::from_flag(expanded));
                out.push(
                    format!("{} {}", commit.short_hash, commit.subject),
                    LineKind::Commit,
                    sign,
                    Some(info.clone()),
                );
                if expanded {
                    for line in &commit.body {
                        out.push(format!("    {line}"), LineKind::CommitBody, None, Some(info.clone()));
                    }
                }
            }
        }
    }
}

fn file_label(file: &FileEntry) -> String {
    match &file.status {
        FileStatus::Untracked => file.path.clone(),
        FileStatus::Renamed(old) | FileStatus::Copied(old) if !old.is_empty() => {
            format!("{:<11}{} -> {}", file.status.label(), old, file.path)
        }
        status => format!("{:<11}{}", status.label(), file.path),
    }
}

fn render_file(
    out: &mut RenderedStatus,
    section: SectionKind,
    file: &FileEntry,
    expansion: &ExpansionState,
    diffs: &DiffCache,
) {
    let key = FileKey::new(section, &file.path);
    let state = expansion.file(&key);
    let expanded = state.expanded.is_expanded();

    out.push(
        file_label(file),
        LineKind::File(file.status.clone()),
        Some(Sign::from_flag(expanded)),
        Some(LineInfo::File {
            section,
            path: file.path.clone(),
        }),
    );

    if !expanded {
        return;
    }

    let doc = match diffs.get(&key) {
        Some(doc) => doc,
        None => {
            out.push("    loading…".into(), LineKind::Placeholder, None, None);
            return;
        }
    };

    if !doc.is_expandable() {
        out.push("    (no textual changes)".into(), LineKind::Placeholder, None, None);
        return;
    }

    let mut display_index = 0usize;
    for (i, hunk) in doc.hunks.iter().enumerate() {
        let hunk_index = i + 1;
        display_index += 1;
        let hunk_open = state.hunk_expanded(hunk_index);
        let sign = match state.expanded {
            Expansion::Full => Some(Sign::Expanded),
            _ => Some(Sign::from_flag(hunk_open)),
        };
        out.push(
            hunk.header.clone(),
            LineKind::HunkHeader,
            sign,
            Some(LineInfo::HunkHeader {
                section,
                path: file.path.clone(),
                hunk_index,
                display_index,
            }),
        );

        for line in &hunk.content_lines {
            display_index += 1;
            if !hunk_open {
                continue;
            }
            let kind = match line.chars().next() {
                Some('+') => LineKind::Added,
                Some('-') => LineKind::Removed,
                Some('\\') => LineKind::Marker,
                _ => LineKind::Context,
            };
            out.push(
                line.clone(),
                kind,
                None,
                Some(LineInfo::DiffLine {
                    section,
                    path: file.path.clone(),
                    hunk_index,
                    display_index,
                }),
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::git::diff::parse_text;
    use crate::status::expansion::ExpansionCommand;
    use crate::status::model::{CommitEntry, HeadInfo, StashEntry};

    fn file(path: &str, status: FileStatus) -> FileEntry {
        FileEntry {
            path: path.to_string(),
            orig_path: None,
            status,
        }
    }

    fn make_snapshot() -> StatusSnapshot {
        StatusSnapshot {
            head: HeadInfo {
                branch: Some("main".into()),
                oid: Some("0123456789abcdef".into()),
                upstream: Some("origin/main".into()),
                ..Default::default()
            },
            untracked: vec![file("new.txt", FileStatus::Untracked)],
            unstaged: vec![file("a.rs", FileStatus::Modified), file("b.rs", FileStatus::Deleted)],
            stashes: vec![StashEntry {
                stash_ref: "stash@{0}".into(),
                message: "WIP on main".into(),
            }],
            recent: vec![CommitEntry {
                hash: "0123456789abcdef".into(),
                short_hash: "0123456".into(),
                subject: "Initial".into(),
                body: vec!["Longer description".into()],
            }],
            ..Default::default()
        }
    }

    fn doc() -> crate::git::diff::DiffDocument {
        parse_text(
            "diff --git a/a.rs b/a.rs\n--- a/a.rs\n+++ b/a.rs\n\
             @@ -1,2 +1,2 @@\n-old\n+new\n ctx\n\
             @@ -10 +10 @@\n-x\n+y",
        )
    }

    fn key(path: &str) -> FileKey {
        FileKey::new(SectionKind::Unstaged, path)
    }

    fn texts(rendered: &RenderedStatus) -> Vec<&str> {
        rendered.lines.iter().map(|l| l.text.as_str()).collect()
    }

    #[test]
    fn renders_head_and_non_empty_sections() {
        let rendered = render(
            &make_snapshot(),
            &ExpansionState::default(),
            &DiffCache::new(),
            RenderOptions::default(),
        );
        assert_eq!(
            texts(&rendered),
            vec![
                "Head:     main 0123456 Initial",
                "Merge:    origin/main",
                "",
                "Untracked files (1)",
                "new.txt",
                "",
                "Unstaged changes (2)",
                "modified   a.rs",
                "deleted    b.rs",
                "",
                "Stashes (1)",
                "stash@{0} WIP on main",
                "",
                "Recent commits (1)",
                "0123456 Initial",
            ]
        );
        assert_eq!(rendered.section_headers.get(&4), Some(&SectionKind::Untracked));
        assert_eq!(rendered.section_headers.get(&7), Some(&SectionKind::Unstaged));
        assert_eq!(rendered.info(8), Some(&LineInfo::File { section: SectionKind::Unstaged, path: "a.rs".into() }));
        assert_eq!(rendered.info(3), None);
    }

    #[test]
    fn collapsed_section_renders_only_header() {
        let expansion = ExpansionState::default().reduce(ExpansionCommand::ToggleSectionCollapse {
            section: SectionKind::Unstaged,
            files: vec![key("a.rs"), key("b.rs")],
        });
        let rendered = render(&make_snapshot(), &expansion, &DiffCache::new(), RenderOptions::default());
        let unstaged = rendered.lines.iter().position(|l| l.text.starts_with("Unstaged")).unwrap();
        assert_eq!(rendered.lines[unstaged].sign, Some(Sign::Collapsed));
        assert_eq!(rendered.lines[unstaged + 1].kind, LineKind::Blank);
    }

    #[test]
    fn headers_mode_shows_hunk_headers_and_expanded_hunks_only() {
        let expansion = ExpansionState::default()
            .reduce(ExpansionCommand::ToggleFileExpand(key("a.rs")))
            .reduce(ExpansionCommand::ToggleHunkExpand(key("a.rs"), 2));
        let mut diffs = DiffCache::new();
        diffs.insert(key("a.rs"), doc());

        let rendered = render(&make_snapshot(), &expansion, &diffs, RenderOptions::default());
        let start = rendered.lines.iter().position(|l| l.text == "modified   a.rs").unwrap();
        let slice: Vec<&str> = rendered.lines[start..start + 5].iter().map(|l| l.text.as_str()).collect();
        assert_eq!(slice, vec!["modified   a.rs", "@@ -1,2 +1,2 @@", "@@ -10 +10 @@", "-x", "+y"]);

        // line numbers are 1-based: the second hunk's "+y" sits at start + 5
        assert_eq!(
            rendered.info(start + 5),
            Some(&LineInfo::DiffLine {
                section: SectionKind::Unstaged,
                path: "a.rs".into(),
                hunk_index: 2,
                display_index: 7,
            })
        );
        assert_eq!(rendered.lines[start + 1].sign, Some(Sign::Collapsed));
        assert_eq!(rendered.lines[start + 2].sign, Some(Sign::Expanded));
    }

    #[test]
    fn display_indices_match_document() {
        let d = doc();
        let expansion = ExpansionState::default().reduce(ExpansionCommand::ExpandFileFully(key("a.rs")));
        let mut diffs = DiffCache::new();
        diffs.insert(key("a.rs"), d.clone());
        let rendered = render(&make_snapshot(), &expansion, &diffs, RenderOptions::default());

        for (line, info) in &rendered.line_map {
            if let LineInfo::HunkHeader { display_index, .. } | LineInfo::DiffLine { display_index, .. } = info {
                assert_eq!(rendered.lines[line - 1].text, d.display_lines[display_index - 1]);
            }
        }
    }

    #[test]
    fn expanded_file_without_cached_diff_shows_placeholder() {
        let expansion = ExpansionState::default().reduce(ExpansionCommand::ToggleFileExpand(key("a.rs")));
        let rendered = render(&make_snapshot(), &expansion, &DiffCache::new(), RenderOptions::default());
        let start = rendered.lines.iter().position(|l| l.text == "modified   a.rs").unwrap();
        assert_eq!(rendered.lines[start + 1].kind, LineKind::Placeholder);
        assert_eq!(rendered.info(start + 2), None);
    }

    #[test]
    fn cached_diff_for_collapsed_file_stays_hidden() {
        let mut diffs = DiffCache::new();
        diffs.insert(key("a.rs"), doc());
        let rendered = render(&make_snapshot(), &ExpansionState::default(), &diffs, RenderOptions::default());
        assert!(!rendered.lines.iter().any(|l| l.kind == LineKind::HunkHeader));
    }

    #[test]
    fn expanded_commit_shows_body() {
        let expansion = ExpansionState::default().reduce(ExpansionCommand::ToggleCommitExpand("0123456789abcdef".into()));
        let rendered = render(&make_snapshot(), &expansion, &DiffCache::new(), RenderOptions::default());
        let last = rendered.lines.last().unwrap();
        assert_eq!(last.text, "    Longer description");
        assert_eq!(last.kind, LineKind::CommitBody);
        assert!(matches!(rendered.info(rendered.len()), Some(LineInfo::Commit { .. })));
    }

    #[test]
    fn section_at_walks_up_to_header() {
        let rendered = render(
            &make_snapshot(),
            &ExpansionState::default(),
            &DiffCache::new(),
            RenderOptions::default(),
        );
        assert_eq!(rendered.section_at(9), Some(SectionKind::Unstaged));
        assert_eq!(rendered.section_at(10), Some(SectionKind::Unstaged));
        assert_eq!(rendered.section_at(1), None);
    }

    #[test]
    fn render_is_deterministic() {
        let expansion = ExpansionState::default().reduce(ExpansionCommand::ExpandFileFully(key("a.rs")));
        let mut diffs = DiffCache::new();
        diffs.insert(key("a.rs"), doc());
        let a = render(&make_snapshot(), &expansion, &diffs, RenderOptions::default());
        let b = render(&make_snapshot(), &expansion, &diffs, RenderOptions::default());
        assert_eq!(a, b);
    }

    #[test]
    fn counts_can_be_hidden() {
        let rendered = render(
            &make_snapshot(),
            &ExpansionState::default(),
            &DiffCache::new(),
            RenderOptions { show_counts: false },
        );
        assert!(rendered.lines.iter().any(|l| l.text == "Unstaged changes"));
    }
}
