pub mod cursor;
pub mod expansion;
pub mod model;
pub mod reconcile;
pub mod render;
pub mod selection;

use std::collections::HashMap;

use crate::git::DiffDocument;

pub use cursor::{capture, resolve, CapturedCursor, LineInfo};
pub use expansion::{
    Expansion, ExpansionCommand, ExpansionState, VisibilityLevel, VisibilityScope,
};
pub use model::{
    CommitEntry, FileEntry, FileKey, FileStatus, HeadInfo, RebaseEntry, SectionKind, StashEntry,
    StatusSnapshot, SubmoduleEntry, WorktreeEntry,
};
pub use reconcile::reconcile;
pub use render::{render, LineKind, RenderOptions, RenderedStatus};
pub use selection::{target_at, visual_selection, ActionTarget};

/// Parsed diffs of expanded files
pub type DiffCache = HashMap<FileKey, DiffDocument>;
