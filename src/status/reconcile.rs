use std::collections::HashSet;

use super::expansion::ExpansionState;
use super::model::{FileKey, StatusSnapshot};
use super::DiffCache;

/// How much a reconciliation pass removed
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Pruned {
    pub files: usize,
    pub diffs: usize,
    pub commits: usize,
}

impl Pruned {
    pub fn is_empty(&self) -> bool {
        self.files == 0 && self.diffs == 0 && self.commits == 0
    }
}

/// Drop expansion entries, remembered section state and cached diffs for
/// files and commits that are no longer part of `snapshot`.
///
/// A file that moved between sections has a different key and is pruned
/// under its old one. Running this twice on the same snapshot is a no-op.
pub fn reconcile(
    state: &mut ExpansionState,
    diffs: &mut DiffCache,
    snapshot: &StatusSnapshot,
) -> Pruned {
    let valid_files: HashSet<FileKey> = snapshot.file_keys().into_iter().collect();
    let valid_commits: HashSet<&str> = snapshot.commit_hashes().collect();

    let mut pruned = Pruned::default();

    let before = state.files.len();
    state.files.retain(|key, _| valid_files.contains(key));
    pruned.files = before - state.files.len();

    for section in state.sections.values_mut() {
        if let Some(ref mut remembered) = section.remembered_files {
            let before = remembered.len();
            remembered.retain(|key, _| valid_files.contains(key));
            pruned.files += before - remembered.len();
        }
    }

    let before = diffs.len();
    diffs.retain(|key, _| valid_files.contains(key));
    pruned.diffs = before - diffs.len();

    let before = state.commits.len();
    state.commits.retain(|hash, _| valid_commits.contains(hash.as_str()));
    pruned.commits = before - state.commits.len();

    if !pruned.is_empty() {
        tracing::debug!(
            files = pruned.files,
            diffs = pruned.diffs,
            commits = pruned.commits,
            "pruned stale expansion state"
        );
    }

    pruned
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::git::diff::parse_text;
    use crate::status::expansion::ExpansionCommand;
    use crate::status::model::{
        CommitEntry, FileEntry, FileStatus, SectionKind, SubmoduleEntry,
    };

    fn file(path: &str) -> FileEntry {
        FileEntry {
            path: path.to_string(),
            orig_path: None,
            status: FileStatus::Modified,
        }
    }

    fn commit(hash: &str) -> CommitEntry {
        CommitEntry {
            hash: hash.to_string(),
            short_hash: hash.chars().take(7).collect(),
            subject: format!("subject {hash}"),
            body: Vec::new(),
        }
    }

    fn make_snapshot() -> StatusSnapshot {
        StatusSnapshot {
            unstaged: vec![file("a.rs"), file("b.rs")],
            staged: vec![file("c.rs")],
            recent: vec![commit("1111111aaaa")],
            unpushed_upstream: vec![commit("2222222bbbb")],
            submodules: vec![SubmoduleEntry {
                path: "vendor/lib".into(),
                oid: "abc".into(),
                state: '+',
                describe: None,
            }],
            ..Default::default()
        }
    }

    fn unstaged(path: &str) -> FileKey {
        FileKey::new(SectionKind::Unstaged, path)
    }

    fn expanded_state(keys: &[FileKey], commits: &[&str]) -> ExpansionState {
        let mut state = ExpansionState::default();
        for key in keys {
            state.apply(ExpansionCommand::ToggleFileExpand(key.clone()));
        }
        for hash in commits {
            state.apply(ExpansionCommand::ToggleCommitExpand(hash.to_string()));
        }
        state
    }

    #[test]
    fn removes_files_missing_from_snapshot() {
        let gone = unstaged("gone.rs");
        let mut state = expanded_state(&[unstaged("a.rs"), gone.clone()], &[]);
        let mut diffs = DiffCache::new();
        diffs.insert(gone.clone(), parse_text("@@ -1 +1 @@\n-a\n+b"));
        diffs.insert(unstaged("a.rs"), parse_text("@@ -1 +1 @@\n-a\n+b"));

        let pruned = reconcile(&mut state, &mut diffs, &make_snapshot());

        assert_eq!(pruned, Pruned { files: 1, diffs: 1, commits: 0 });
        assert!(!state.files.contains_key(&gone));
        assert!(state.files.contains_key(&unstaged("a.rs")));
        assert!(!diffs.contains_key(&gone));
    }

    #[test]
    fn file_moving_sections_drops_old_key() {
        // c.rs was unstaged, is now staged
        let old = unstaged("c.rs");
        let mut state = expanded_state(&[old.clone()], &[]);
        reconcile(&mut state, &mut DiffCache::new(), &make_snapshot());
        assert!(!state.files.contains_key(&old));
        assert_eq!(
            state.file_expansion(&FileKey::new(SectionKind::Staged, "c.rs")),
            crate::status::expansion::Expansion::Collapsed
        );
    }

    #[test]
    fn submodule_keys_survive() {
        let key = FileKey::new(SectionKind::Submodules, "vendor/lib");
        let mut state = expanded_state(&[key.clone()], &[]);
        let pruned = reconcile(&mut state, &mut DiffCache::new(), &make_snapshot());
        assert!(pruned.is_empty());
        assert!(state.files.contains_key(&key));
    }

    #[test]
    fn removes_commits_missing_from_every_list() {
        let mut state = expanded_state(&[], &["1111111aaaa", "2222222bbbb", "deadbeef"]);
        let pruned = reconcile(&mut state, &mut DiffCache::new(), &make_snapshot());
        assert_eq!(pruned.commits, 1);
        assert!(state.commit_expanded("1111111aaaa"));
        assert!(state.commit_expanded("2222222bbbb"));
        assert!(!state.commits.contains_key("deadbeef"));
    }

    #[test]
    fn prunes_remembered_section_state() {
        let mut state = expanded_state(&[unstaged("a.rs"), unstaged("gone.rs")], &[]);
        state.apply(ExpansionCommand::ToggleSectionCollapse {
            section: SectionKind::Unstaged,
            files: vec![unstaged("a.rs"), unstaged("gone.rs")],
        });
        reconcile(&mut state, &mut DiffCache::new(), &make_snapshot());

        let remembered = state.sections[&SectionKind::Unstaged]
            .remembered_files
            .as_ref()
            .unwrap();
        assert!(remembered.contains_key(&unstaged("a.rs")));
        assert!(!remembered.contains_key(&unstaged("gone.rs")));

        // Re-expanding the section must not resurrect the vanished file
        state.apply(ExpansionCommand::ToggleSectionCollapse {
            section: SectionKind::Unstaged,
            files: vec![unstaged("a.rs"), unstaged("b.rs")],
        });
        assert!(!state.files.contains_key(&unstaged("gone.rs")));
    }

    #[test]
    fn second_pass_is_a_no_op() {
        let mut state = expanded_state(
            &[unstaged("a.rs"), unstaged("x.rs")],
            &["1111111aaaa", "ffff"],
        );
        let mut diffs = DiffCache::new();
        diffs.insert(unstaged("x.rs"), parse_text("@@ -1 +1 @@\n-a\n+b"));
        let snapshot = make_snapshot();

        reconcile(&mut state, &mut diffs, &snapshot);
        let after_first = state.clone();
        let again = reconcile(&mut state, &mut diffs, &snapshot);

        assert!(again.is_empty());
        assert_eq!(state, after_first);
    }

    #[test]
    fn empty_snapshot_prunes_everything() {
        let mut state = expanded_state(&[unstaged("a.rs")], &["1111111aaaa"]);
        let pruned = reconcile(&mut state, &mut DiffCache::new(), &StatusSnapshot::default());
        assert_eq!(pruned.files, 1);
        assert_eq!(pruned.commits, 1);
        assert!(state.files.is_empty());
        assert!(state.commits.is_empty());
    }
}
