pub mod diff;
pub mod patch;
mod status;

pub use diff::{parse, DiffDocument};
pub use patch::{build_full_hunk_patch, build_partial_hunk_patch, patch_text};
pub use status::{
    apply_patch, diff_lines, discard_file, get_repo_root, get_repo_root_in, load_snapshot,
    stage_all, stage_file, unstage_all, unstage_file, PatchAction,
};
