use anyhow::{Context, Result};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use crate::status::{
    CommitEntry, FileEntry, FileKey, FileStatus, HeadInfo, RebaseEntry, SectionKind, StashEntry,
    StatusSnapshot, SubmoduleEntry, WorktreeEntry,
};

const FIELD_SEP: char = '\x1f';
const RECORD_SEP: char = '\x1e';
const LOG_FORMAT: &str = "--format=%H%x1f%h%x1f%s%x1f%b%x1e";

// ── Repo Info ──

/// Get the repository root directory
pub fn get_repo_root() -> Result<String> {
    let output = Command::new("git")
        .args(["rev-parse", "--show-toplevel"])
        .output()
        .context("Failed to run git")?;

    if !output.status.success() {
        anyhow::bail!("Not in a git repository");
    }

    Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
}

/// Get the repository root directory for a specific path
pub fn get_repo_root_in(dir: &str) -> Result<String> {
    let output = Command::new("git")
        .args(["rev-parse", "--show-toplevel"])
        .current_dir(dir)
        .output()
        .context(format!("Failed to run git in '{}'", dir))?;

    if !output.status.success() {
        anyhow::bail!("Not a git repository: {}", dir);
    }

    Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
}

/// Absolute path of the repository's git directory
fn git_dir(repo_root: &str) -> Result<PathBuf> {
    let dir = run_git(repo_root, &["rev-parse", "--git-dir"])?;
    let path = PathBuf::from(dir.trim());
    Ok(if path.is_absolute() {
        path
    } else {
        Path::new(repo_root).join(path)
    })
}

/// Run git and return stdout, failing on a non-zero exit
fn run_git(repo_root: &str, args: &[&str]) -> Result<String> {
    let output = Command::new("git")
        .args(args)
        .current_dir(repo_root)
        .output()
        .with_context(|| format!("Failed to run git {}", args.join(" ")))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        anyhow::bail!("git {} failed: {}", args.first().unwrap_or(&""), stderr.trim());
    }

    Ok(String::from_utf8_lossy(&output.stdout).to_string())
}

/// Trimmed stdout on success, `None` otherwise
fn try_git(repo_root: &str, args: &[&str]) -> Option<String> {
    let out = Command::new("git")
        .args(args)
        .current_dir(repo_root)
        .output()
        .ok()?;
    if out.status.success() {
        Some(String::from_utf8_lossy(&out.stdout).trim().to_string())
    } else {
        None
    }
}

/// A secondary list that is allowed to fail: log and show nothing
fn or_empty<T>(what: &str, result: Result<Vec<T>>) -> Vec<T> {
    result.unwrap_or_else(|e| {
        tracing::warn!(error = %e, "failed to load {what}");
        Vec::new()
    })
}

// ── Snapshot ──

/// Head info and file lists from `git status --porcelain=v2 --branch -z`
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PorcelainStatus {
    pub head: HeadInfo,
    pub untracked: Vec<FileEntry>,
    pub unstaged: Vec<FileEntry>,
    pub staged: Vec<FileEntry>,
    pub conflicted: Vec<FileEntry>,
}

pub fn parse_porcelain_v2(raw: &str) -> PorcelainStatus {
    let mut status = PorcelainStatus::default();
    let mut records = raw.split('\0').filter(|r| !r.is_empty());

    while let Some(record) = records.next() {
        if let Some(header) = record.strip_prefix("# ") {
            parse_branch_header(header, &mut status.head);
            continue;
        }

        let kind = record.chars().next().unwrap_or(' ');
        match kind {
            '1' => {
                let fields: Vec<&str> = record.splitn(9, ' ').collect();
                if let (Some(xy), Some(path)) = (fields.get(1), fields.get(8)) {
                    push_changes(&mut status, xy, path, None);
                }
            }
            '2' => {
                let fields: Vec<&str> = record.splitn(10, ' ').collect();
                // With -z the original path is the following record
                let orig = records.next();
                if let (Some(xy), Some(path)) = (fields.get(1), fields.get(9)) {
                    push_changes(&mut status, xy, path, orig);
                }
            }
            'u' => {
                let fields: Vec<&str> = record.splitn(11, ' ').collect();
                if let Some(path) = fields.get(10) {
                    status.conflicted.push(FileEntry {
                        path: path.to_string(),
                        orig_path: None,
                        status: FileStatus::Conflicted,
                    });
                }
            }
            '?' => {
                if let Some(path) = record.get(2..) {
                    status.untracked.push(FileEntry {
                        path: path.to_string(),
                        orig_path: None,
                        status: FileStatus::Untracked,
                    });
                }
            }
            _ => {}
        }
    }

    status
}

fn parse_branch_header(header: &str, head: &mut HeadInfo) {
    let Some((key, value)) = header.split_once(' ') else {
        return;
    };
    match key {
        "branch.oid" if value != "(initial)" => head.oid = Some(value.to_string()),
        "branch.head" if value != "(detached)" => head.branch = Some(value.to_string()),
        "branch.upstream" => head.upstream = Some(value.to_string()),
        "branch.ab" => {
            for part in value.split_whitespace() {
                if let Some(n) = part.strip_prefix('+') {
                    head.ahead = n.parse().unwrap_or(0);
                } else if let Some(n) = part.strip_prefix('-') {
                    head.behind = n.parse().unwrap_or(0);
                }
            }
        }
        _ => {}
    }
}

fn push_changes(status: &mut PorcelainStatus, xy: &str, path: &str, orig: Option<&str>) {
    let mut codes = xy.chars();
    let index = codes.next().unwrap_or('.');
    let worktree = codes.next().unwrap_or('.');

    if let Some(file_status) = FileStatus::from_code(index, orig) {
        status.staged.push(FileEntry {
            path: path.to_string(),
            orig_path: orig.map(str::to_string),
            status: file_status,
        });
    }
    if let Some(file_status) = FileStatus::from_code(worktree, None) {
        status.unstaged.push(FileEntry {
            path: path.to_string(),
            orig_path: None,
            status: file_status,
        });
    }
}

/// Parse `git log` output produced with [`LOG_FORMAT`]
pub fn parse_log(raw: &str) -> Vec<CommitEntry> {
    raw.split(RECORD_SEP)
        .map(|record| record.trim_start_matches('\n'))
        .filter(|record| !record.trim().is_empty())
        .filter_map(|record| {
            let mut fields = record.splitn(4, FIELD_SEP);
            let hash = fields.next()?.to_string();
            let short_hash = fields.next()?.to_string();
            let subject = fields.next().unwrap_or_default().to_string();
            let body = fields
                .next()
                .unwrap_or_default()
                .trim_end()
                .lines()
                .map(str::to_string)
                .collect();
            Some(CommitEntry {
                hash,
                short_hash,
                subject,
                body,
            })
        })
        .collect()
}

pub fn parse_stash_list(raw: &str) -> Vec<StashEntry> {
    raw.lines()
        .filter_map(|line| {
            let (stash_ref, message) = line.split_once(FIELD_SEP)?;
            Some(StashEntry {
                stash_ref: stash_ref.to_string(),
                message: message.to_string(),
            })
        })
        .collect()
}

/// Parse `git submodule status`: `<flag><oid> <path>[ (<describe>)]`
pub fn parse_submodule_status(raw: &str) -> Vec<SubmoduleEntry> {
    raw.lines()
        .filter(|line| line.len() > 1)
        .filter_map(|line| {
            let state = line.chars().next()?;
            let (oid, rest) = line.get(1..)?.split_once(' ')?;
            let (path, describe) = match rest.strip_suffix(')').and_then(|r| r.rsplit_once(" (")) {
                Some((path, describe)) => (path, Some(describe.to_string())),
                None => (rest, None),
            };
            Some(SubmoduleEntry {
                path: path.to_string(),
                oid: oid.to_string(),
                state,
                describe,
            })
        })
        .collect()
}

/// Parse `git worktree list --porcelain`
pub fn parse_worktrees(raw: &str) -> Vec<WorktreeEntry> {
    let mut worktrees = Vec::new();
    let mut current_path = String::new();
    let mut current_branch = String::new();

    let mut flush = |path: &mut String, branch: &mut String| {
        if !path.is_empty() {
            worktrees.push(WorktreeEntry {
                path: std::mem::take(path),
                branch: if branch.is_empty() {
                    "(detached)".to_string()
                } else {
                    std::mem::take(branch)
                },
            });
        }
        branch.clear();
    };

    for line in raw.lines() {
        if let Some(path) = line.strip_prefix("worktree ") {
            flush(&mut current_path, &mut current_branch);
            current_path = path.to_string();
        } else if let Some(branch) = line.strip_prefix("branch refs/heads/") {
            current_branch = branch.to_string();
        } else if line == "detached" {
            current_branch = "(detached)".to_string();
        }
    }
    flush(&mut current_path, &mut current_branch);

    worktrees
}

/// Commit lines of a rebase todo list; comments and non-commit commands are skipped
pub fn parse_rebase_todo(raw: &str) -> Vec<RebaseEntry> {
    raw.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .filter_map(|line| {
            let mut parts = line.splitn(3, ' ');
            let action = match parts.next()? {
                "p" | "pick" => "pick",
                "r" | "reword" => "reword",
                "e" | "edit" => "edit",
                "s" | "squash" => "squash",
                "f" | "fixup" => "fixup",
                "d" | "drop" => "drop",
                _ => return None,
            };
            let hash = parts.next()?.to_string();
            let subject = parts.next().unwrap_or_default().to_string();
            Some(RebaseEntry {
                action: action.to_string(),
                hash,
                subject,
            })
        })
        .collect()
}

fn log_range(repo_root: &str, range: &str) -> Result<Vec<CommitEntry>> {
    Ok(parse_log(&run_git(repo_root, &["log", LOG_FORMAT, range, "--"])?))
}

fn rebase_todo(repo_root: &str) -> Result<Vec<RebaseEntry>> {
    let todo = git_dir(repo_root)?.join("rebase-merge").join("git-rebase-todo");
    if !todo.exists() {
        return Ok(Vec::new());
    }
    let raw = std::fs::read_to_string(&todo)
        .with_context(|| format!("Failed to read {}", todo.display()))?;
    Ok(parse_rebase_todo(&raw))
}

/// Fetch everything the status view shows. Only the status call itself is
/// fatal; the other lists degrade to empty with a warning.
pub fn load_snapshot(repo_root: &str, recent_count: usize) -> Result<StatusSnapshot> {
    let raw = run_git(repo_root, &["status", "--porcelain=v2", "--branch", "--untracked-files=all", "-z"])?;
    let PorcelainStatus {
        mut head,
        untracked,
        unstaged,
        staged,
        conflicted,
    } = parse_porcelain_v2(&raw);

    head.push_remote =
        try_git(repo_root, &["rev-parse", "--abbrev-ref", "@{push}"]).filter(|p| !p.is_empty());

    let mut snapshot = StatusSnapshot {
        untracked,
        unstaged,
        staged,
        conflicted,
        ..Default::default()
    };

    if head.oid.is_some() {
        if let Some(ref upstream) = head.upstream {
            snapshot.unpulled_upstream =
                or_empty("unpulled commits", log_range(repo_root, &format!("HEAD..{upstream}")));
            snapshot.unpushed_upstream =
                or_empty("unpushed commits", log_range(repo_root, &format!("{upstream}..HEAD")));
        }
        if let Some(ref push) = head.push_remote {
            if head.upstream.as_ref() != Some(push) {
                snapshot.unpulled_push_remote = or_empty(
                    "unpulled push-remote commits",
                    log_range(repo_root, &format!("HEAD..{push}")),
                );
                snapshot.unpushed_push_remote = or_empty(
                    "unpushed push-remote commits",
                    log_range(repo_root, &format!("{push}..HEAD")),
                );
            }
        }
        let count = format!("-n{recent_count}");
        snapshot.recent = or_empty(
            "recent commits",
            run_git(repo_root, &["log", LOG_FORMAT, &count, "--"]).map(|raw| parse_log(&raw)),
        );
    }

    snapshot.stashes = or_empty(
        "stashes",
        run_git(repo_root, &["stash", "list", "--format=%gd%x1f%s"]).map(|raw| parse_stash_list(&raw)),
    );
    snapshot.submodules = or_empty(
        "submodules",
        run_git(repo_root, &["submodule", "status"]).map(|raw| parse_submodule_status(&raw)),
    );
    let worktrees = or_empty(
        "worktrees",
        run_git(repo_root, &["worktree", "list", "--porcelain"]).map(|raw| parse_worktrees(&raw)),
    );
    // A lone main worktree is not worth a section
    if worktrees.len() > 1 {
        snapshot.worktrees = worktrees;
    }
    snapshot.rebase = or_empty("rebase todo", rebase_todo(repo_root));
    snapshot.head = head;

    tracing::debug!(
        repo = repo_root,
        untracked = snapshot.untracked.len(),
        unstaged = snapshot.unstaged.len(),
        staged = snapshot.staged.len(),
        "loaded status snapshot"
    );

    Ok(snapshot)
}

// ── Diff ──

/// Raw diff lines for one expandable entry.
///
/// `orig_path` is the source of a staged rename or copy. It joins the
/// pathspec so `-M` can pair both sides.
pub fn diff_lines(repo_root: &str, key: &FileKey, orig_path: Option<&str>) -> Result<Vec<String>> {
    let path = key.path.as_str();
    let output = match key.section {
        SectionKind::Staged => {
            let mut args = vec!["diff", "--cached", "-M", "--no-color", "--no-ext-diff", "--"];
            args.extend(orig_path.filter(|orig| !orig.is_empty() && *orig != path));
            args.push(path);
            Command::new("git").args(&args).current_dir(repo_root).output()
        }
        SectionKind::Unstaged | SectionKind::Conflicted => Command::new("git")
            .args(["diff", "--no-color", "--no-ext-diff", "--", path])
            .current_dir(repo_root)
            .output(),
        SectionKind::Untracked => Command::new("git")
            .args(["diff", "--no-index", "--no-color", "--no-ext-diff", "--", "/dev/null", path])
            .current_dir(repo_root)
            .output(),
        SectionKind::Submodules => Command::new("git")
            .args(["diff", "--submodule=log", "--no-color", "--", path])
            .current_dir(repo_root)
            .output(),
        other => anyhow::bail!("No diff for {} entries", other),
    }
    .context("Failed to run git diff")?;

    // --no-index exits 1 when the files differ
    let ok = output.status.success()
        || (key.section == SectionKind::Untracked && output.status.code() == Some(1));
    if !ok {
        let stderr = String::from_utf8_lossy(&output.stderr);
        anyhow::bail!("git diff failed for {}: {}", key, stderr.trim());
    }

    Ok(String::from_utf8_lossy(&output.stdout)
        .lines()
        .map(str::to_string)
        .collect())
}

// ── Staging ──

/// What a synthesized patch is applied for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PatchAction {
    Stage,
    Unstage,
    /// Throw changes away; `staged` discards from index and worktree both
    Discard { staged: bool },
}

impl PatchAction {
    /// Whether the patch is built for reverse application
    pub fn reverse(&self) -> bool {
        !matches!(self, PatchAction::Stage)
    }

    fn apply_args(&self) -> &'static [&'static str] {
        match self {
            PatchAction::Stage => &["apply", "--cached"],
            PatchAction::Unstage => &["apply", "--cached", "--reverse"],
            PatchAction::Discard { staged: false } => &["apply", "--reverse"],
            PatchAction::Discard { staged: true } => &["apply", "--reverse", "--index"],
        }
    }

    pub fn verb(&self) -> &'static str {
        match self {
            PatchAction::Stage => "stage",
            PatchAction::Unstage => "unstage",
            PatchAction::Discard { .. } => "discard",
        }
    }
}

/// Pipe a patch to `git apply` with the flags for `action`
pub fn apply_patch(repo_root: &str, patch: &str, action: PatchAction) -> Result<()> {
    let args = action.apply_args();
    tracing::debug!(?action, bytes = patch.len(), "applying patch");

    let mut child = Command::new("git")
        .args(args)
        .current_dir(repo_root)
        .stdin(Stdio::piped())
        .stdout(Stdio::null())
        .stderr(Stdio::piped())
        .spawn()
        .context("Failed to spawn git apply")?;

    if let Some(ref mut stdin) = child.stdin {
        stdin.write_all(patch.as_bytes())?;
    }
    // Close stdin so git sees EOF
    drop(child.stdin.take());

    let output = child.wait_with_output()?;
    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        anyhow::bail!("Failed to {} patch: {}", action.verb(), stderr.trim());
    }

    Ok(())
}

/// Stage a single file
pub fn stage_file(repo_root: &str, file_path: &str) -> Result<()> {
    run_git(repo_root, &["add", "--", file_path]).map(|_| ())
}

/// Unstage a single file. Before the first commit there is no HEAD to reset to.
pub fn unstage_file(repo_root: &str, file_path: &str) -> Result<()> {
    match run_git(repo_root, &["reset", "-q", "HEAD", "--", file_path]) {
        Ok(_) => Ok(()),
        Err(e) => {
            tracing::debug!(error = %e, "reset failed, falling back to rm --cached");
            run_git(repo_root, &["rm", "--cached", "-q", "--", file_path]).map(|_| ())
        }
    }
}

/// Stage every tracked modification
pub fn stage_all(repo_root: &str) -> Result<()> {
    run_git(repo_root, &["add", "-u"]).map(|_| ())
}

pub fn unstage_all(repo_root: &str) -> Result<()> {
    match run_git(repo_root, &["reset", "-q", "HEAD"]) {
        Ok(_) => Ok(()),
        Err(_) => run_git(repo_root, &["rm", "--cached", "-r", "-q", "."]).map(|_| ()),
    }
}

/// Discard a file's changes. Untracked files are deleted.
pub fn discard_file(repo_root: &str, key: &FileKey) -> Result<()> {
    match key.section {
        SectionKind::Untracked => {
            let path = Path::new(repo_root).join(&key.path);
            if path.is_dir() {
                std::fs::remove_dir_all(&path)
            } else {
                std::fs::remove_file(&path)
            }
            .with_context(|| format!("Failed to remove {}", path.display()))
        }
        SectionKind::Unstaged => run_git(repo_root, &["checkout", "--", &key.path]).map(|_| ()),
        SectionKind::Staged => {
            unstage_file(repo_root, &key.path)?;
            // Newly added files have nothing in HEAD and stay behind untracked
            let in_head = format!("HEAD:{}", key.path);
            if try_git(repo_root, &["cat-file", "-e", &in_head]).is_some() {
                run_git(repo_root, &["checkout", "HEAD", "--", &key.path])?;
            }
            Ok(())
        }
        other => anyhow::bail!("Cannot discard {} entries", other),
    }
}
