/// One `@@ -a,b +c,d @@` region of a unified diff
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Hunk {
    pub header: String,
    /// Content lines, each still carrying its `' '`, `'+'` or `'-'` prefix
    pub content_lines: Vec<String>,
}

impl Hunk {
    /// Parsed line ranges of the header, if the header is well formed
    pub fn range(&self) -> Option<HunkRange> {
        parse_hunk_header(&self.header)
    }
}

/// A single file's diff: preamble, hunks, and the flattened display view
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DiffDocument {
    /// `diff --git` / `index` / `---` / `+++` preamble
    pub header_lines: Vec<String>,
    pub hunks: Vec<Hunk>,
    /// Hunk headers and content, flattened in hunk order
    pub display_lines: Vec<String>,
}

impl DiffDocument {
    /// Hunk by 1-based index
    pub fn hunk(&self, hunk_index: usize) -> Option<&Hunk> {
        hunk_index.checked_sub(1).and_then(|i| self.hunks.get(i))
    }

    pub fn hunk_count(&self) -> usize {
        self.hunks.len()
    }

    /// A document with no hunks has nothing to expand
    pub fn is_expandable(&self) -> bool {
        !self.hunks.is_empty()
    }

    /// 1-based position of a hunk's header line within `display_lines`
    pub fn hunk_display_offset(&self, hunk_index: usize) -> Option<usize> {
        if hunk_index == 0 || hunk_index > self.hunks.len() {
            return None;
        }
        let preceding: usize = self.hunks[..hunk_index - 1]
            .iter()
            .map(|h| 1 + h.content_lines.len())
            .sum();
        Some(preceding + 1)
    }
}

/// Line ranges from a hunk header
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HunkRange {
    pub old_start: usize,
    pub old_count: usize,
    pub new_start: usize,
    pub new_count: usize,
}

impl HunkRange {
    pub fn header(&self) -> String {
        format!(
            "@@ -{},{} +{},{} @@",
            self.old_start, self.old_count, self.new_start, self.new_count
        )
    }
}

/// Split raw `git diff` output for one file into header and hunks.
///
/// Input without any `@@` line yields a document with everything in
/// `header_lines` and zero hunks.
pub fn parse(raw_lines: &[String]) -> DiffDocument {
    let mut doc = DiffDocument::default();
    let mut current: Option<Hunk> = None;

    for line in raw_lines {
        if line.starts_with("@@") {
            if let Some(hunk) = current.take() {
                doc.hunks.push(hunk);
            }
            current = Some(Hunk {
                header: line.clone(),
                content_lines: Vec::new(),
            });
            continue;
        }

        match current {
            Some(ref mut hunk) => hunk.content_lines.push(line.clone()),
            None => doc.header_lines.push(line.clone()),
        }
    }

    if let Some(hunk) = current {
        doc.hunks.push(hunk);
    }

    for hunk in &doc.hunks {
        doc.display_lines.push(hunk.header.clone());
        doc.display_lines.extend(hunk.content_lines.iter().cloned());
    }

    doc
}

/// Convenience for raw `git diff` stdout
#[cfg(test)]
pub fn parse_text(raw: &str) -> DiffDocument {
    let lines: Vec<String> = raw.lines().map(str::to_string).collect();
    parse(&lines)
}

/// Parse a hunk header like "@@ -10,4 +10,15 @@ fn foo()".
/// Either count may be omitted and then defaults to 1.
pub fn parse_hunk_header(line: &str) -> Option<HunkRange> {
    let after_first = line.strip_prefix("@@ ")?;
    let end_idx = after_first.find(" @@")?;
    let range_str = &after_first[..end_idx];

    let mut parts = range_str.split_whitespace();
    let old = parts.next()?.strip_prefix('-')?;
    let new = parts.next()?.strip_prefix('+')?;

    let (old_start, old_count) = parse_range(old)?;
    let (new_start, new_count) = parse_range(new)?;

    Some(HunkRange {
        old_start,
        old_count,
        new_start,
        new_count,
    })
}

/// Parse "start,count" or just "start" (count defaults to 1)
fn parse_range(s: &str) -> Option<(usize, usize)> {
    if let Some((start, count)) = s.split_once(',') {
        Some((start.parse().ok()?, count.parse().ok()?))
    } else {
        Some((s.parse().ok()?, 1))
    }
}
