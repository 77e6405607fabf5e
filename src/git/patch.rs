use std::collections::BTreeSet;

use super::diff::DiffDocument;

/// Marker git emits after a line that lacks a trailing newline
const NO_NEWLINE_MARKER: char = '\\';

/// Patch for a whole hunk: the file preamble, the hunk header, and its content.
/// `hunk_index` is 1-based; out of range yields `None`.
pub fn build_full_hunk_patch(doc: &DiffDocument, hunk_index: usize) -> Option<Vec<String>> {
    let hunk = doc.hunk(hunk_index)?;
    let mut patch = doc.header_lines.clone();
    patch.push(hunk.header.clone());
    patch.extend(hunk.content_lines.iter().cloned());
    Some(patch)
}

/// Patch for only the selected lines of one hunk.
///
/// `selected` holds 1-based indices into `doc.display_lines`. With
/// `reverse = false` the patch is meant to be applied forward (staging):
/// unselected additions are dropped and unselected deletions become context.
/// With `reverse = true` it is meant to be applied in reverse (unstaging,
/// discarding): unselected additions become context and unselected deletions
/// are dropped. The header keeps the original start lines and gets recounted.
///
/// Returns `None` when the result would contain no change at all.
pub fn build_partial_hunk_patch(
    doc: &DiffDocument,
    hunk_index: usize,
    selected: &BTreeSet<usize>,
    reverse: bool,
) -> Option<Vec<String>> {
    let hunk = doc.hunk(hunk_index)?;
    let offset = doc.hunk_display_offset(hunk_index)?;
    let range = match hunk.range() {
        Some(range) => range,
        None => {
            tracing::warn!(header = %hunk.header, "unparseable hunk header, refusing partial patch");
            return None;
        }
    };

    let mut body: Vec<String> = Vec::with_capacity(hunk.content_lines.len());
    let mut old_count = 0usize;
    let mut new_count = 0usize;
    let mut has_change = false;
    // Whether the previous source line made it into the output
    let mut prev_kept = false;

    for (i, line) in hunk.content_lines.iter().enumerate() {
        let display_index = offset + 1 + i;
        let is_selected = selected.contains(&display_index);
        let text = line.get(1..).unwrap_or("");

        match line.chars().next() {
            Some('+') => {
                if is_selected {
                    body.push(line.clone());
                    new_count += 1;
                    has_change = true;
                    prev_kept = true;
                } else if reverse {
                    body.push(format!(" {text}"));
                    old_count += 1;
                    new_count += 1;
                    prev_kept = true;
                } else {
                    prev_kept = false;
                }
            }
            Some('-') => {
                if is_selected {
                    body.push(line.clone());
                    old_count += 1;
                    has_change = true;
                    prev_kept = true;
                } else if !reverse {
                    body.push(format!(" {text}"));
                    old_count += 1;
                    new_count += 1;
                    prev_kept = true;
                } else {
                    prev_kept = false;
                }
            }
            Some(NO_NEWLINE_MARKER) => {
                // Belongs to the line before it; not counted
                if prev_kept {
                    body.push(line.clone());
                }
            }
            // Context; some tools strip the space off blank context lines
            _ => {
                body.push(format!(" {text}"));
                old_count += 1;
                new_count += 1;
                prev_kept = true;
            }
        }
    }

    if !has_change {
        return None;
    }

    let header = super::diff::HunkRange {
        old_start: range.old_start,
        old_count,
        new_start: range.new_start,
        new_count,
    }
    .header();

    let mut patch = doc.header_lines.clone();
    patch.push(header);
    patch.extend(body);
    Some(patch)
}

/// Join patch lines into the text `git apply` reads on stdin
pub fn patch_text(lines: &[String]) -> String {
    let mut text = lines.join("\n");
    text.push('\n');
    text
}
